//! Recommendation synthesis: findings → ranked, human-actionable advice.
//!
//! A pure transform over the matcher's output. Each pattern kind maps to
//! one canned template parameterized by the finding's evidence; findings
//! that target the same location with the same pattern collapse into a
//! single recommendation (the highest-confidence one wins).

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::patterns::{Confidence, Finding, PatternKind};
use crate::domain::CodeLocation;

/// How urgently a recommendation should be acted on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Qualitative payoff tier for acting on a recommendation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Minor,
    Moderate,
    Major,
}

impl fmt::Display for ImpactTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImpactTier::Minor => "minor",
            ImpactTier::Moderate => "moderate",
            ImpactTier::Major => "major",
        };
        f.write_str(s)
    }
}

/// One ranked optimization suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub target_locations: Vec<CodeLocation>,
    pub severity: Severity,
    pub estimated_impact: ImpactTier,
}

/// Share of total time above which a high-confidence finding is critical.
const CRITICAL_SHARE_PERCENT: f64 = 30.0;
/// Share of total time above which impact is at least moderate.
const MODERATE_SHARE_PERCENT: f64 = 10.0;

/// Convert findings into deduplicated, stably ordered recommendations.
///
/// Expects the findings in matcher order (catalogue priority, confidence
/// descending), which makes "first seen wins" equal to "highest confidence
/// wins" during deduplication.
#[must_use]
pub fn synthesize(findings: &[Finding]) -> Vec<Recommendation> {
    let mut seen: HashSet<(PatternKind, CodeLocation)> = HashSet::new();
    let mut recs: Vec<Recommendation> = findings
        .iter()
        .filter(|f| seen.insert((f.pattern, f.primary_location().clone())))
        .map(render)
        .collect();

    recs.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.estimated_impact.cmp(&a.estimated_impact))
            .then_with(|| a.target_locations.cmp(&b.target_locations))
    });
    recs
}

fn render(finding: &Finding) -> Recommendation {
    let share = finding.evidence_value("percent_of_total");
    let severity = if finding.confidence == Confidence::High && share > CRITICAL_SHARE_PERCENT {
        Severity::Critical
    } else if finding.confidence >= Confidence::Medium {
        Severity::Warning
    } else {
        Severity::Info
    };
    let estimated_impact = if share > CRITICAL_SHARE_PERCENT {
        ImpactTier::Major
    } else if share > MODERATE_SHARE_PERCENT {
        ImpactTier::Moderate
    } else {
        ImpactTier::Minor
    };

    let target = finding.primary_location();
    let (title, description) = match finding.pattern {
        PatternKind::ExponentialRecursion => (
            format!("Add memoization to {target}"),
            format!(
                "{target} was called {} times through only {} distinct call site(s), \
                 recursing up to {} frames deep ({share:.1}% of measured time). The call \
                 tree grows exponentially with input size; cache previously computed \
                 results (memoization) or rewrite the recursion iteratively.",
                finding.evidence_value("hit_count") as u64,
                finding.evidence_value("distinct_callers") as u64,
                finding.evidence_value("max_recursion_depth") as u64,
            ),
        ),
        PatternKind::UnboundedGrowth => (
            format!("Bound the memory growth of {target}"),
            format!(
                "Allocated memory grew {:.1} MB across {} samples ({:.1} MB/s) with no \
                 observed releases. Process the data in bounded batches, drop items once \
                 consumed, or switch to a streaming approach.",
                finding.evidence_value("net_growth_bytes") / (1024.0 * 1024.0),
                finding.evidence_value("samples") as u64,
                finding.evidence_value("growth_rate_bytes_per_sec") / (1024.0 * 1024.0),
            ),
        ),
        PatternKind::RedundantSequentialCalls => (
            format!("Batch the repeated calls to {target}"),
            format!(
                "{target} ran {} times from a single call site at a uniform ~{:.0} µs per \
                 call. Batch the requests into one call, hoist the work out of the loop, \
                 or cache the result.",
                finding.evidence_value("hit_count") as u64,
                finding.evidence_value("per_hit_ns") / 1_000.0,
            ),
        ),
        PatternKind::LineDominance => (
            format!("Optimize the dominant statement at {target}"),
            format!(
                "One statement accounts for {:.1}% of its function's measured time over \
                 {} executions. Precompute invariant parts, move the work out of the hot \
                 path, or pick a cheaper operation.",
                finding.evidence_value("share_of_function_percent"),
                finding.evidence_value("hit_count") as u64,
            ),
        ),
        PatternKind::QuadraticSuspect => (
            format!("Reduce nested iteration around {target}"),
            format!(
                "{target} executed {} times against {} outer iterations (~{:.0}x per outer \
                 pass), a multiplicative pattern that scales quadratically or worse. Use an \
                 index or hash lookup, or restructure the nesting.",
                finding.evidence_value("inner_hits") as u64,
                finding.evidence_value("outer_hits") as u64,
                finding.evidence_value("ratio"),
            ),
        ),
    };

    Recommendation {
        title,
        description,
        target_locations: finding.locations.clone(),
        severity,
        estimated_impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn finding(
        pattern: PatternKind,
        name: &str,
        confidence: Confidence,
        share: f64,
    ) -> Finding {
        Finding {
            pattern,
            locations: vec![CodeLocation::function(name)],
            evidence: BTreeMap::from([
                ("percent_of_total".into(), share),
                ("hit_count".into(), 1000.0),
                ("distinct_callers".into(), 2.0),
                ("max_recursion_depth".into(), 25.0),
            ]),
            confidence,
        }
    }

    #[test]
    fn high_confidence_hot_finding_is_critical() {
        let recs = synthesize(&[finding(
            PatternKind::ExponentialRecursion,
            "demo::fib",
            Confidence::High,
            95.0,
        )]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].severity, Severity::Critical);
        assert_eq!(recs[0].estimated_impact, ImpactTier::Major);
        assert!(recs[0].title.contains("memoization"));
        assert!(recs[0].title.contains("demo::fib"));
    }

    #[test]
    fn medium_confidence_is_warning_low_is_info() {
        let recs = synthesize(&[
            finding(PatternKind::LineDominance, "a", Confidence::Medium, 5.0),
            finding(PatternKind::LineDominance, "b", Confidence::Low, 5.0),
        ]);
        assert_eq!(recs[0].severity, Severity::Warning);
        assert_eq!(recs[1].severity, Severity::Info);
    }

    #[test]
    fn same_pattern_and_location_deduplicates() {
        let recs = synthesize(&[
            finding(PatternKind::LineDominance, "demo::load", Confidence::High, 40.0),
            finding(PatternKind::LineDominance, "demo::load", Confidence::Low, 40.0),
        ]);
        assert_eq!(recs.len(), 1);
        // First (highest-confidence) finding won
        assert_eq!(recs[0].severity, Severity::Critical);
    }

    #[test]
    fn ordering_is_severity_then_impact_then_location() {
        let recs = synthesize(&[
            finding(PatternKind::LineDominance, "low", Confidence::Low, 2.0),
            finding(PatternKind::QuadraticSuspect, "deep", Confidence::High, 50.0),
            finding(PatternKind::RedundantSequentialCalls, "mid", Confidence::Medium, 15.0),
        ]);
        assert_eq!(recs[0].severity, Severity::Critical);
        assert_eq!(recs[1].severity, Severity::Warning);
        assert_eq!(recs[2].severity, Severity::Info);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let input = [
            finding(PatternKind::UnboundedGrowth, "demo::grow", Confidence::Medium, 20.0),
            finding(PatternKind::LineDominance, "demo::load", Confidence::Low, 3.0),
        ];
        assert_eq!(synthesize(&input), synthesize(&input));
    }
}
