//! Rendering of results on stdout.

use std::io::Write;

use anyhow::{bail, Result};
use driftwatch_core::value::tree_to_json;
use driftwatch_core::{
    patch, DriftRecord, DriftSummary, DriftTarget, FieldDifference, StateTree, Value,
};
use json_patch::Patch;

use crate::options::Format;

fn display(value: &Value) -> String {
    value.to_json().to_string()
}

pub(crate) fn write_drift(
    out: &mut impl Write,
    format: Format,
    records: &[DriftRecord],
    summary: &DriftSummary,
) -> Result<()> {
    match format {
        Format::Text => {
            for r in records {
                let location = match r.target {
                    DriftTarget::ResourceType => format!("{} (resource type)", r.resource),
                    DriftTarget::Property if r.resource.is_empty() => r.field.clone(),
                    DriftTarget::Property => format!("{}.{}", r.resource, r.field),
                };
                writeln!(
                    out,
                    "{} {}: desired {}, actual {}",
                    r.kind,
                    location,
                    display(&r.desired),
                    display(&r.actual)
                )?;
            }
            writeln!(
                out,
                "{} drift(s) in {} resource(s): {} modified, {} added, {} removed",
                summary.total_drifts,
                summary.resources_affected,
                summary.by_type.modified,
                summary.by_type.added,
                summary.by_type.removed
            )?;
        }
        Format::Json => {
            let report = serde_json::json!({
                "drifts": records,
                "summary": summary,
            });
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        Format::Patch => write_patch(out, &patch::to_patch(records))?,
    }
    Ok(())
}

pub(crate) fn write_patch(out: &mut impl Write, patch: &Patch) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, patch)?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn write_differences(
    out: &mut impl Write,
    format: Format,
    differences: &[FieldDifference],
) -> Result<()> {
    match format {
        Format::Text => {
            for d in differences {
                writeln!(
                    out,
                    "{}: {} -> {}",
                    d.field,
                    display(&d.desired),
                    display(&d.actual)
                )?;
            }
            writeln!(out, "{} difference(s)", differences.len())?;
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, differences)?;
            writeln!(out)?;
        }
        Format::Patch => bail!("--format patch is only supported by the detect commands"),
    }
    Ok(())
}

pub(crate) fn write_tree(out: &mut impl Write, format: Format, tree: &StateTree) -> Result<()> {
    match format {
        Format::Text | Format::Json => {
            serde_json::to_writer_pretty(&mut *out, &tree_to_json(tree))?;
            writeln!(out)?;
        }
        Format::Patch => bail!("--format patch is only supported by the detect commands"),
    }
    Ok(())
}
