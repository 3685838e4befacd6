//! Rendering of a probe report
//!
//! Text output keeps the shape callers parse: a `(cnfprobe)` header line
//! with any error message appended, then one line holding the paths joined
//! by the delimiter.

use crate::session::{ProbeReport, ReportSummary};

/// First token of text output; callers skip everything before it
pub const HEADER: &str = "(cnfprobe)";

pub fn render_text(report: &ProbeReport) -> String {
    format!(
        "{HEADER}{}\n{}\n",
        report.error.as_deref().unwrap_or(""),
        report.paths.rendered()
    )
}

pub fn render_json(report: &ProbeReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ReportSummary::from(report))
}
