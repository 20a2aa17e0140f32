//! Human-readable dispatch output.

use std::fmt::Write;

use sendcmd_client::{DispatchReport, HostReport};

/// One status line per host, followed by an indented line per failed command.
///
/// ```text
/// 10.0.0.5:52000  ok
/// 10.0.0.6:52000  1 failed
///     make: non-zero exit (exited with status 2)
/// 10.0.0.7:52000  unreachable: connect timed out after 5000ms
/// ```
pub fn render_report(report: &DispatchReport) -> String {
    let mut out = String::new();
    for host in report {
        render_host(&mut out, host);
    }
    out
}

fn render_host(out: &mut String, host: &HostReport) {
    let addr = host.target.addr();
    match &host.outcome {
        Err(err) => {
            let _ = writeln!(out, "{}  unreachable: {}", addr, err);
        }
        Ok(result) => {
            let status = if result.is_clean() {
                "ok".to_string()
            } else {
                format!("{} failed", result.errors.len())
            };
            let exiting = if result.exit_requested { " (server exiting)" } else { "" };
            let _ = writeln!(out, "{}  {}{}", addr, status, exiting);

            for record in &result.errors {
                let _ = writeln!(out, "    {}: {} ({})", record.command, record.kind, record.message);
            }
        }
    }
}

/// One-line summary for the end of a run.
pub fn summary(report: &DispatchReport) -> String {
    let failed = report.failures().count();
    format!(
        "{} host(s): {} ok, {} failed, {} unreachable",
        report.len(),
        report.len() - failed,
        failed - report.unreachable_count(),
        report.unreachable_count()
    )
}
