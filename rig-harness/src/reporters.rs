//! Rendering and persisting a [`Report`].
//!
//! Three formats are produced:
//!
//! - text: indented `--- FAIL: name (0.12s)` tree, printed to stdout
//! - TAP: one line per root test, written to `test.tap`
//! - JSON: the whole report, written to `reports/report.json`

use std::fmt::Write as _;
use std::path::PathBuf;

use rig_types::{NodeReport, Outcome, Report};

use crate::config::OutputConfig;
use crate::error::SuiteError;

const INDENT: &str = "    ";

/// Render the report as an indented tree.
///
/// Failed nodes are always shown, together with their output. Passed and
/// skipped nodes are shown only when `verbose` is set.
pub fn render_text(report: &Report, verbose: bool) -> String {
    let mut out = String::new();
    for root in report.roots() {
        render_node(&mut out, report, root, verbose, 0);
    }
    let counts = report.counts();
    let status = if report.is_success() { "PASS" } else { "FAIL" };
    let _ = writeln!(
        out,
        "{status}: {} passed, {} failed, {} skipped",
        counts.passed,
        counts.failed,
        counts.skipped + counts.fail_fast
    );
    out
}

fn render_node(out: &mut String, report: &Report, node: &NodeReport, verbose: bool, level: usize) {
    let shown = match node.outcome {
        Outcome::Failed => true,
        Outcome::Filtered => false,
        _ => verbose,
    };
    if !shown {
        return;
    }
    let indent = INDENT.repeat(level);
    let _ = writeln!(
        out,
        "{indent}--- {}: {} ({:.2}s)",
        node.outcome,
        node.name,
        node.elapsed.as_secs_f64()
    );
    for line in node.output.lines() {
        let _ = writeln!(out, "{indent}{INDENT}{line}");
    }
    for child in report.children_of(&node.name) {
        render_node(out, report, child, verbose, level + 1);
    }
}

/// Render the root tests as a TAP version 12 stream.
///
/// Filtered roots are left out of the plan. Output of a failed root and its
/// failed descendants becomes `#` diagnostics.
pub fn render_tap(report: &Report) -> String {
    let roots: Vec<&NodeReport> = report
        .roots()
        .filter(|n| n.outcome != Outcome::Filtered)
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "1..{}", roots.len());
    for (i, root) in roots.iter().enumerate() {
        let number = i + 1;
        match root.outcome {
            Outcome::Failed => {
                let _ = writeln!(out, "not ok {number} - {}", root.name);
                tap_diagnostics(&mut out, report, root);
            }
            Outcome::Skipped | Outcome::FailFast => {
                let reason = root.output.lines().next().unwrap_or_default();
                let _ = writeln!(out, "ok {number} - {} # SKIP {reason}", root.name);
            }
            _ => {
                let _ = writeln!(out, "ok {number} - {}", root.name);
            }
        }
    }
    out
}

fn tap_diagnostics(out: &mut String, report: &Report, node: &NodeReport) {
    for line in node.output.lines() {
        let _ = writeln!(out, "# {line}");
    }
    for child in report.children_of(&node.name) {
        if child.outcome.is_failed() {
            let _ = writeln!(out, "# --- FAIL: {}", child.name);
            tap_diagnostics(out, report, child);
        }
    }
}

/// Serialize the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`SuiteError::Encode`] if serialization fails.
pub fn render_json(report: &Report) -> Result<String, SuiteError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the enabled report files under `config.dir`.
///
/// Returns the paths written.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be written.
pub async fn write_outputs(config: &OutputConfig, report: &Report) -> Result<Vec<PathBuf>, SuiteError> {
    let mut written = Vec::new();
    tokio::fs::create_dir_all(&config.dir).await?;

    if config.tap {
        let path = config.dir.join("test.tap");
        tokio::fs::write(&path, render_tap(report)).await?;
        written.push(path);
    }
    if config.json {
        let dir = config.dir.join("reports");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join("report.json");
        tokio::fs::write(&path, render_json(report)?).await?;
        written.push(path);
    }

    for path in &written {
        tracing::debug!("Wrote {}", path.display());
    }
    Ok(written)
}
