//! End-of-run report rendering

use crate::{
    error::{AppError, Result},
    runner::{PhaseReport, RunReport},
    transfer::TransferOutcome,
};
use colored::*;
use std::fmt::Write as _;

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format report: {}", e))
}

/// Human readable elapsed time
fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.0}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.1}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Human readable byte count using binary units
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_phase(phase: &PhaseReport, use_color: bool) -> String {
    let outcome = phase.outcome.describe().to_string();
    let outcome = if !use_color {
        outcome
    } else {
        match phase.outcome {
            TransferOutcome::Failed(_) => outcome.red().to_string(),
            _ => outcome.green().to_string(),
        }
    };

    format!(
        "{:<8}  {} in {} ({} chunks, {:.1} Mbit/s overall), {}",
        phase.direction.label(),
        format_bytes(phase.bytes),
        format_duration(phase.elapsed.as_secs_f64() * 1000.0),
        phase.chunks,
        phase.average_mbps(),
        outcome,
    )
}

/// Render the final report: one line per phase followed by the summary block
pub fn format_run_report(report: &RunReport, use_color: bool) -> Result<String> {
    let mut output = String::new();

    let title = format!("Throughput results for {} ({})", report.server, report.plan);
    let border = "═".repeat(title.chars().count() + 4);
    if use_color {
        writeln!(output, "{}", border.bright_black()).map_err(fmt_err)?;
        writeln!(output, "  {}", title.bold().bright_blue()).map_err(fmt_err)?;
        writeln!(output, "{}", border.bright_black()).map_err(fmt_err)?;
    } else {
        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}", title).map_err(fmt_err)?;
        writeln!(output, "{}", border).map_err(fmt_err)?;
    }

    for phase in &report.phases {
        writeln!(output, "{}", format_phase(phase, use_color)).map_err(fmt_err)?;
    }

    writeln!(output).map_err(fmt_err)?;
    write!(output, "{}", report.summary).map_err(fmt_err)?;

    let failed = report.failed_phases();
    if !failed.is_empty() {
        writeln!(output).map_err(fmt_err)?;
        let warning = format!("{} phase(s) ended with a transfer error", failed.len());
        if use_color {
            write!(output, "\n{}", warning.yellow()).map_err(fmt_err)?;
        } else {
            write!(output, "\n{}", warning).map_err(fmt_err)?;
        }
    }

    Ok(output)
}
