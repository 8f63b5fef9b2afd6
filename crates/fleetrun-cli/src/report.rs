//! Terminal output: progress lines and the end-of-run report.

use std::io::{self, Write};

use chrono::Local;
use fleetrun_core::{DispatchReport, DispatchResult, HostStatus};
use fleetrun_dispatch::RunOutcome;

/// `[n/N] HH:MM:SS [STATUS] host`, plus the reason when it did not succeed.
pub fn progress_line(result: &DispatchResult, completed: usize, total: usize) -> String {
    let mut line = format!(
        "[{}/{}] {} [{}] {}",
        completed,
        total,
        result.finished_at.with_timezone(&Local).format("%H:%M:%S"),
        result.status.label(),
        result.host
    );
    if let Some(reason) = reason(result) {
        line.push(' ');
        line.push_str(&reason);
    }
    line
}

fn reason(result: &DispatchResult) -> Option<String> {
    match (result.status, result.exit_code, &result.error) {
        (HostStatus::Success, _, _) => None,
        (_, _, Some(error)) => Some(error.clone()),
        (HostStatus::Failed, Some(code), None) => Some(format!("exited with code {}", code)),
        _ => None,
    }
}

/// Per-host output, ordered by host.
pub fn write_report(out: &mut impl Write, report: &DispatchReport) -> io::Result<()> {
    for result in report.iter() {
        writeln!(out, "=== {} [{}] ===", result.host, result.status.label())?;
        if !result.output.is_empty() {
            out.write_all(result.output.as_bytes())?;
            if !result.output.ends_with('\n') {
                writeln!(out)?;
            }
        }
        if let Some(reason) = reason(result) {
            writeln!(out, "({})", reason)?;
        }
    }
    Ok(())
}

pub fn summary_line(report: &DispatchReport) -> String {
    let mut line = format!(
        "{} hosts: {} succeeded, {} failed",
        report.len(),
        report.succeeded(),
        report.failed()
    );
    if report.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

/// Report on stdout; summary and archive location on stderr.
pub fn print_report(outcome: &RunOutcome) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_report(&mut out, &outcome.report).and_then(|_| out.flush()) {
        // Broken pipe and friends: nothing useful left to print to.
        tracing::debug!(error = %e, "Failed to write report");
    }

    eprintln!("{}", summary_line(&outcome.report));
    if let Some(path) = &outcome.archived_to {
        eprintln!("logs kept in {}", path.display());
    }
}
