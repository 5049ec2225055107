//! Report writer: console summary plus JSON and HTML artifacts.
//!
//! Both savers are pure formatting over `RunReport`; the write is the only
//! side effect. The exit-code contract lives with the CLI, which consumes
//! `RunReport::is_success`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::model::RunReport;

pub fn print_summary(report: &RunReport) {
    println!();
    println!("Results:");
    println!("  Total:   {}", report.total);
    println!("  Passed:  {}", report.passed.to_string().green());
    println!("  Failed:  {}", report.failed.to_string().red());
    println!("  Skipped: {}", report.skipped.to_string().yellow());
    println!("  Errors:  {}", report.errors.to_string().red());
    println!("  Pass rate: {:.1}%", report.pass_rate());
}

pub fn save_json(report: &RunReport, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn save_html(report: &RunReport, path: &Path) -> Result<()> {
    fs::write(path, render_html(report))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn render_html(report: &RunReport) -> String {
    let mut rows = String::new();
    for result in &report.results {
        rows.push_str(&format!(
            "<tr class=\"{status}\"><td>{status}</td><td>{id}</td><td>{kind}</td>\
             <td>{claim}</td><td>{reason}</td><td>{duration} ms</td></tr>\n",
            status = result.status,
            id = escape(&result.id),
            kind = result.kind,
            claim = escape(&result.claim),
            reason = escape(&result.reason),
            duration = result.duration_ms,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>doccheck report</title>
<style>
  body {{ font-family: sans-serif; margin: 2rem; }}
  table {{ border-collapse: collapse; width: 100%; }}
  th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }}
  tr.pass td:first-child {{ color: #1a7f37; }}
  tr.fail td:first-child {{ color: #cf222e; }}
  tr.error td:first-child {{ color: #cf222e; font-weight: bold; }}
  tr.skip td:first-child {{ color: #9a6700; }}
</style>
</head>
<body>
<h1>Documentation conformance report</h1>
<p>Started {started} | Completed {completed}</p>
<p>Total {total} | Passed {passed} | Failed {failed} | Skipped {skipped} | Errors {errors}
 | Pass rate {rate:.1}%</p>
<table>
<thead><tr><th>Status</th><th>Id</th><th>Kind</th><th>Claim</th><th>Reason</th><th>Duration</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</body>
</html>
"#,
        started = report.started_at.to_rfc3339(),
        completed = report.completed_at.to_rfc3339(),
        total = report.total,
        passed = report.passed,
        failed = report.failed,
        skipped = report.skipped,
        errors = report.errors,
        rate = report.pass_rate(),
        rows = rows,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
