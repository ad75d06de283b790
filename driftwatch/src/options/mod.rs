use clap::{ColorChoice, Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// How to print results
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Exit with status 2 when drift is found, like `diff`
    #[arg(long, global = true, default_value_t = false)]
    pub exit_code: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One line per drifted field, followed by a summary
    Text,
    /// Machine readable JSON
    Json,
    /// An RFC 6902 JSON Patch from desired to actual (detect commands only)
    Patch,
}

impl Options {
    /// Whether log output on stderr should be colored.
    pub fn use_color(&self) -> bool {
        use std::io::IsTerminal as _;
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stderr().is_terminal(),
        }
    }
}
