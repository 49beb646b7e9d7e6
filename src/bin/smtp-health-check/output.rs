use std::io::Write;

use anyhow::{Context, Result};
#[cfg(not(feature = "with-serde"))]
use anyhow::bail;
use smtp_health::ResultSet;

use crate::args::Format;

/// Writes the report and returns the exit code for the monitoring agent.
pub fn write_report<W: Write>(results: &ResultSet, format: Format, out: &mut W) -> Result<i32> {
    match format {
        Format::Text => results.render(out).context("write report"),
        Format::Json => write_json(results, out),
    }
}

#[cfg(feature = "with-serde")]
fn write_json<W: Write>(results: &ResultSet, out: &mut W) -> Result<i32> {
    let s = serde_json::to_string_pretty(results)?;
    writeln!(out, "{s}").context("write report")?;
    Ok(results.exit_code())
}

#[cfg(not(feature = "with-serde"))]
fn write_json<W: Write>(_: &ResultSet, _: &mut W) -> Result<i32> {
    bail!("format=json requires the 'with-serde' feature")
}
