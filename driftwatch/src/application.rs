use std::path::Path;
use std::process::exit;

use anyhow::Result;
use driftwatch_core::{patch, state, Comparator, DriftEngine, Normalizer, StateDocument};
use tracing::info;

use crate::options::{Format, Options};
use crate::report;

/// Exit status when `--exit-code` is given and drift was found.
pub const EXIT_DRIFT: i32 = 2;

/// Handle a Result, printing the error and exiting with code 1 on failure.
/// A successful result carries the exit status.
pub fn handle_result(r: Result<i32>) {
    match r {
        Ok(0) => {}
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("driftwatch error: {:?}", e);
            exit(1);
        }
    }
}

fn exit_status(options: &Options, drift_found: bool) -> i32 {
    if options.exit_code && drift_found {
        EXIT_DRIFT
    } else {
        0
    }
}

pub fn detect(options: &Options, desired: &Path, actual: &Path, resource_id: &str) -> Result<i32> {
    let desired = state::load_tree(desired)?;
    let actual = state::load_tree(actual)?;

    let mut engine = DriftEngine::new();
    engine.detect_drift(&desired, &actual, resource_id);
    let summary = engine.summary();
    info!(drifts = summary.total_drifts, "detected drift");

    report::write_drift(
        &mut std::io::stdout().lock(),
        options.format,
        engine.records(),
        &summary,
    )?;
    Ok(exit_status(options, !summary.is_clean()))
}

pub fn detect_deployment(options: &Options, desired: &Path, actual: &Path) -> Result<i32> {
    let desired = StateDocument::load(desired)?;
    let actual = StateDocument::load(actual)?;

    let mut engine = DriftEngine::new();
    engine.detect_deployment(&desired, &actual)?;
    let summary = engine.summary();

    let mut out = std::io::stdout().lock();
    match options.format {
        Format::Patch => {
            report::write_patch(&mut out, &patch::deployment_patch(&desired, &actual))?
        }
        format => report::write_drift(&mut out, format, engine.records(), &summary)?,
    }
    Ok(exit_status(options, !summary.is_clean()))
}

pub fn compare(options: &Options, desired: &Path, actual: &Path) -> Result<i32> {
    let desired = state::load_tree(desired)?;
    let actual = state::load_tree(actual)?;

    let differences = Comparator::new().compare(&desired, &actual);
    info!(differences = differences.len(), "compared normalized state");

    report::write_differences(&mut std::io::stdout().lock(), options.format, &differences)?;
    Ok(exit_status(options, !differences.is_empty()))
}

pub fn normalize(options: &Options, file: &Path) -> Result<i32> {
    let tree = state::load_tree(file)?;
    let normalized = Normalizer::new().normalize(&tree);
    report::write_tree(&mut std::io::stdout().lock(), options.format, &normalized)?;
    Ok(0)
}
