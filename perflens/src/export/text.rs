//! Plain-text rendering of a report and its recommendations for terminal
//! consumers.

#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;

use crate::analysis::Recommendation;
use crate::domain::AdapterKind;
use crate::report::ProfileReport;

/// Render a hotspot summary: session header plus the top `n` entries with
/// each adapter's view.
#[must_use]
pub fn render_summary(report: &ProfileReport, n: usize) -> String {
    let mut out = String::new();
    let session = &report.session;

    let _ = writeln!(out, "session  {}", session.session_id);
    let _ = writeln!(out, "duration {}", session.duration);
    let adapters: Vec<&str> = session.adapters_enabled.iter().map(|k| k.as_str()).collect();
    let _ = writeln!(out, "adapters {}", adapters.join(", "));
    for fault in &session.adapters_failed {
        let _ = writeln!(out, "warning  {} adapter failed: {}", fault.adapter_kind, fault.message);
    }
    if let Some(ref error) = session.error {
        let _ = writeln!(out, "error    target failed (partial profile): {error}");
    }
    if session.timed_out {
        let _ = writeln!(out, "warning  session exceeded its advisory timeout");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "HOTSPOTS (top {n})");
    let _ = writeln!(out, "{}", "-".repeat(64));
    if report.is_empty() {
        let _ = writeln!(out, "  (no locations observed)");
    }
    for entry in report.top_hotspots(n) {
        let _ = writeln!(out, "  {}", entry.location);
        for stat in &entry.stats {
            let detail = match stat.adapter_kind {
                AdapterKind::AllocTracking => format!(
                    "{:+.2} MB over {} samples",
                    stat.total_value as f64 / (1024.0 * 1024.0),
                    stat.hit_count
                ),
                AdapterKind::CallTiming | AdapterKind::StmtTiming => format!(
                    "{:.2} ms self over {} hits",
                    stat.total_value as f64 / 1_000_000.0,
                    stat.hit_count
                ),
            };
            let line = stat
                .location
                .line
                .map(|l| format!(" (line {l})"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "    {:<14} {:>5.1}%  {detail}{line}",
                stat.adapter_kind.as_str(),
                stat.percent_of_total
            );
        }
    }
    out
}

/// Render recommendations as a numbered list, most urgent first.
#[must_use]
pub fn render_recommendations(recommendations: &[Recommendation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RECOMMENDATIONS");
    let _ = writeln!(out, "{}", "-".repeat(64));
    if recommendations.is_empty() {
        let _ = writeln!(out, "  (no inefficiency patterns detected)");
    }
    for (idx, rec) in recommendations.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. [{}] {} (impact: {})",
            idx + 1,
            rec.severity,
            rec.title,
            rec.estimated_impact
        );
        let _ = writeln!(out, "     {}", rec.description);
    }
    out
}
