mod application;
mod logging;
mod options;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use options::Options;

fn main() {
    let args = Args::parse();
    application::handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<i32> {
    let mut logging = logging::set_up(logging::Options {
        verbose: args.options.verbose,
        color: args.options.use_color(),
    })?;
    let options = &args.options;

    let r: Result<i32> = match &args.command {
        Commands::Detect {
            desired,
            actual,
            resource_id,
        } => application::detect(options, desired, actual, resource_id),
        Commands::DetectDeployment { desired, actual } => {
            application::detect_deployment(options, desired, actual)
        }
        Commands::Compare { desired, actual } => application::compare(options, desired, actual),
        Commands::Normalize { file } => application::normalize(options, file),
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(0)
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(0)
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "driftwatch", &mut std::io::stdout());
            Ok(0)
        }
    };

    logging.tear_down()?;
    r
}

/// Driftwatch: find where infrastructure has drifted from its desired configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Strictly compare two state files of a single resource
    ///
    /// Values are compared as they are: `80` and `"80"` differ, and so do
    /// lists in a different order. Each drifted field is reported as added,
    /// removed or modified.
    Detect {
        /// JSON file with the desired state (an object, or `null` for none)
        desired: PathBuf,

        /// JSON file with the actual state
        actual: PathBuf,

        /// Resource id to attach to the reported drift
        #[arg(long, default_value = "")]
        resource_id: String,
    },

    /// Strictly compare two state documents covering many resources
    DetectDeployment {
        /// State document with the desired state
        desired: PathBuf,

        /// State document with the actual state
        actual: PathBuf,
    },

    /// Compare two state files after normalizing them
    ///
    /// Numeric strings become numbers, other strings are lowercased and
    /// trimmed, and lists are sorted, so only meaningful differences remain.
    Compare {
        /// JSON file with the desired state
        desired: PathBuf,

        /// JSON file with the actual state
        actual: PathBuf,
    },

    /// Print the normalized form of a state file
    Normalize {
        /// JSON file with a state tree
        file: PathBuf,
    },

    /// Generate markdown documentation for driftwatch
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for driftwatch
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for driftwatch
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
