//! Inefficiency pattern detection over a merged profile report.
//!
//! Each pattern is an independent rule over the report's statistics;
//! several may fire on the same location. Rules are pure and deterministic:
//! the same report always yields the same findings in the same order.
//!
//! # Catalogue (priority order)
//!
//! | pattern | signature |
//! |---|---|
//! | `exponential_recursion` | self-recursive location whose hit count dwarfs its distinct call sites |
//! | `unbounded_growth` | allocation series rising monotonically with no releases |
//! | `redundant_sequential_calls` | many uniform-cost calls from a single call site |
//! | `line_dominance` | one statement owning most of its function's measured time |
//! | `quadratic_suspect` | inner hit count scaling multiplicatively with an outer one |
//!
//! Confidence grades how cleanly a rule's thresholds were exceeded, so
//! false-positive tolerance is a property of the table below rather than
//! of free-form heuristics.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::LocationStat;
use crate::domain::{AdapterKind, CodeLocation};
use crate::report::{ProfileReport, ReportEntry};

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Minimum hits before recursion is considered runaway.
pub const RECURSION_MIN_HITS: u64 = 64;
/// Minimum hits-per-distinct-call-site ratio for runaway recursion.
pub const RECURSION_MIN_FANOUT: f64 = 32.0;
/// Minimum allocation samples for a growth verdict.
pub const GROWTH_MIN_SAMPLES: u64 = 3;
/// Minimum net growth in bytes before the growth pattern fires.
pub const GROWTH_MIN_BYTES: i64 = 1 << 20;
/// Minimum calls from a single site to suggest batching.
pub const REDUNDANT_MIN_CALLS: u64 = 50;
/// Maximum per-hit cost spread (coefficient of variation) for "similar
/// cost" calls.
pub const REDUNDANT_MAX_CV: f64 = 0.5;
/// Share of its function's statement time a single line must own.
pub const DOMINANCE_MIN_SHARE: f64 = 0.40;
/// Minimum outer-location hits before multiplicative scaling is judged.
pub const QUADRATIC_MIN_OUTER_HITS: u64 = 16;

// =============================================================================
// FINDING MODEL
// =============================================================================

/// The closed taxonomy of detectable inefficiency signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternKind {
    ExponentialRecursion,
    UnboundedGrowth,
    RedundantSequentialCalls,
    LineDominance,
    QuadraticSuspect,
}

impl PatternKind {
    /// Ranking priority; lower outranks higher when patterns compete for
    /// the same location.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            PatternKind::ExponentialRecursion => 0,
            PatternKind::UnboundedGrowth => 1,
            PatternKind::RedundantSequentialCalls => 2,
            PatternKind::LineDominance => 3,
            PatternKind::QuadraticSuspect => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::ExponentialRecursion => "exponential_recursion",
            PatternKind::UnboundedGrowth => "unbounded_growth",
            PatternKind::RedundantSequentialCalls => "redundant_sequential_calls",
            PatternKind::LineDominance => "line_dominance",
            PatternKind::QuadraticSuspect => "quadratic_suspect",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How cleanly a rule's thresholds were exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A detected inefficiency signature with the numeric signals that
/// triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub pattern: PatternKind,
    /// Primary location first; supporting locations (caller, outer loop)
    /// follow.
    pub locations: Vec<CodeLocation>,
    pub evidence: BTreeMap<String, f64>,
    pub confidence: Confidence,
}

impl Finding {
    #[must_use]
    pub fn primary_location(&self) -> &CodeLocation {
        &self.locations[0]
    }

    #[must_use]
    pub fn evidence_value(&self, key: &str) -> f64 {
        self.evidence.get(key).copied().unwrap_or(0.0)
    }
}

/// Threshold-excess grading: under 2x is barely over the line, 10x and
/// beyond is unambiguous.
#[must_use]
pub fn confidence_from_excess(excess: f64) -> Confidence {
    if excess >= 10.0 {
        Confidence::High
    } else if excess >= 2.0 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

// =============================================================================
// MATCHER
// =============================================================================

/// Scan a report for the full pattern catalogue.
///
/// Stateless and idempotent: findings are a pure derived view of the
/// report.
#[must_use]
pub fn match_report(report: &ProfileReport) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in report.entries() {
        find_exponential_recursion(entry, &mut findings);
        find_unbounded_growth(report, entry, &mut findings);
        find_redundant_calls(entry, &mut findings);
        find_line_dominance(entry, &mut findings);
        find_quadratic_lines(entry, &mut findings);
    }
    find_quadratic_call_edges(report, &mut findings);

    findings.sort_by(|a, b| {
        a.pattern
            .priority()
            .cmp(&b.pattern.priority())
            .then_with(|| b.confidence.cmp(&a.confidence))
            .then_with(|| a.locations.cmp(&b.locations))
    });
    findings
}

fn find_exponential_recursion(entry: &ReportEntry, findings: &mut Vec<Finding>) {
    let Some(stat) = entry.stat(AdapterKind::CallTiming) else { return };
    if !stat.recursive || stat.hit_count < RECURSION_MIN_HITS {
        return;
    }
    let fanout = stat.hit_count as f64 / f64::from(stat.distinct_callers.max(1));
    if fanout < RECURSION_MIN_FANOUT {
        return;
    }
    let excess =
        (stat.hit_count as f64 / RECURSION_MIN_HITS as f64).min(fanout / RECURSION_MIN_FANOUT);
    findings.push(Finding {
        pattern: PatternKind::ExponentialRecursion,
        locations: vec![entry.location.clone()],
        evidence: BTreeMap::from([
            ("hit_count".into(), stat.hit_count as f64),
            ("distinct_callers".into(), f64::from(stat.distinct_callers)),
            ("fanout".into(), fanout),
            ("max_recursion_depth".into(), f64::from(stat.max_recursion_depth)),
            ("percent_of_total".into(), stat.percent_of_total),
        ]),
        confidence: confidence_from_excess(excess),
    });
}

fn find_unbounded_growth(report: &ProfileReport, entry: &ReportEntry, findings: &mut Vec<Finding>) {
    for stat in entry.stats_for(AdapterKind::AllocTracking) {
        if stat.hit_count < GROWTH_MIN_SAMPLES
            || stat.negative_deltas > 0
            || stat.total_value < GROWTH_MIN_BYTES
        {
            continue;
        }
        let increases =
            stat.series.windows(2).filter(|w| w[1] > w[0]).count() + usize::from(!stat.series.is_empty());
        if increases < GROWTH_MIN_SAMPLES as usize {
            continue;
        }
        let secs = report.session.duration.as_seconds();
        let rate = if secs > 0.0 { stat.total_value as f64 / secs } else { 0.0 };
        let excess = stat.total_value as f64 / GROWTH_MIN_BYTES as f64;
        findings.push(Finding {
            pattern: PatternKind::UnboundedGrowth,
            locations: vec![stat.location.clone()],
            evidence: BTreeMap::from([
                ("samples".into(), stat.hit_count as f64),
                ("monotonic_samples".into(), increases as f64),
                ("net_growth_bytes".into(), stat.total_value as f64),
                ("growth_rate_bytes_per_sec".into(), rate),
                ("percent_of_total".into(), stat.percent_of_total),
            ]),
            confidence: confidence_from_excess(excess),
        });
    }
}

fn find_redundant_calls(entry: &ReportEntry, findings: &mut Vec<Finding>) {
    let Some(stat) = entry.stat(AdapterKind::CallTiming) else { return };
    if stat.recursive
        || stat.hit_count < REDUNDANT_MIN_CALLS
        || stat.distinct_callers != 1
        || stat.per_hit_cv > REDUNDANT_MAX_CV
    {
        return;
    }
    let mut locations = vec![entry.location.clone()];
    locations.extend(stat.callers.first().cloned());
    let excess = stat.hit_count as f64 / REDUNDANT_MIN_CALLS as f64;
    findings.push(Finding {
        pattern: PatternKind::RedundantSequentialCalls,
        locations,
        evidence: BTreeMap::from([
            ("hit_count".into(), stat.hit_count as f64),
            ("per_hit_ns".into(), stat.per_hit_value),
            ("per_hit_cv".into(), stat.per_hit_cv),
            ("percent_of_total".into(), stat.percent_of_total),
        ]),
        confidence: confidence_from_excess(excess),
    });
}

fn find_line_dominance(entry: &ReportEntry, findings: &mut Vec<Finding>) {
    let lines: Vec<&LocationStat> = entry
        .stats_for(AdapterKind::StmtTiming)
        .filter(|s| s.location.line.is_some())
        .collect();
    // A single measured line trivially owns all of its function's time.
    if lines.len() < 2 {
        return;
    }
    let function_total: i64 = lines.iter().map(|s| s.total_value).sum();
    if function_total <= 0 {
        return;
    }
    for stat in lines {
        let share = stat.total_value as f64 / function_total as f64;
        if share <= DOMINANCE_MIN_SHARE {
            continue;
        }
        findings.push(Finding {
            pattern: PatternKind::LineDominance,
            locations: vec![stat.location.clone(), entry.location.function_identity()],
            evidence: BTreeMap::from([
                ("share_of_function_percent".into(), share * 100.0),
                ("line_total_ns".into(), stat.total_value as f64),
                ("function_total_ns".into(), function_total as f64),
                ("hit_count".into(), stat.hit_count as f64),
                ("percent_of_total".into(), stat.percent_of_total),
            ]),
            confidence: confidence_from_excess(share / DOMINANCE_MIN_SHARE),
        });
    }
}

/// Multiplicative scaling between two measured lines of one function: an
/// exact n² nest shows inner/outer ≈ outer, which is 2x the outer/2
/// threshold (Medium); anything past that is worse than quadratic.
fn find_quadratic_lines(entry: &ReportEntry, findings: &mut Vec<Finding>) {
    let lines: Vec<&LocationStat> = entry
        .stats_for(AdapterKind::StmtTiming)
        .filter(|s| s.location.line.is_some())
        .collect();
    for &outer in &lines {
        if outer.hit_count < QUADRATIC_MIN_OUTER_HITS {
            continue;
        }
        for &inner in &lines {
            if inner.location.line <= outer.location.line {
                continue;
            }
            push_quadratic_finding(outer, inner, findings);
        }
    }
}

/// Same rule over caller→callee edges, for call-granularity nests.
fn find_quadratic_call_edges(report: &ProfileReport, findings: &mut Vec<Finding>) {
    for entry in report.entries() {
        let Some(inner) = entry.stat(AdapterKind::CallTiming) else { continue };
        if inner.distinct_callers != 1 {
            continue;
        }
        let Some(caller) = inner.callers.first() else { continue };
        let Some(outer) = report
            .get(&caller.qualified_name)
            .and_then(|e| e.stat(AdapterKind::CallTiming))
        else {
            continue;
        };
        if outer.hit_count < QUADRATIC_MIN_OUTER_HITS || outer.recursive {
            continue;
        }
        push_quadratic_finding(outer, inner, findings);
    }
}

fn push_quadratic_finding(outer: &LocationStat, inner: &LocationStat, findings: &mut Vec<Finding>) {
    let threshold_ratio = outer.hit_count as f64 / 2.0;
    let ratio = inner.hit_count as f64 / outer.hit_count as f64;
    if ratio < threshold_ratio {
        return;
    }
    findings.push(Finding {
        pattern: PatternKind::QuadraticSuspect,
        locations: vec![inner.location.clone(), outer.location.clone()],
        evidence: BTreeMap::from([
            ("outer_hits".into(), outer.hit_count as f64),
            ("inner_hits".into(), inner.hit_count as f64),
            ("ratio".into(), ratio),
            ("percent_of_total".into(), inner.percent_of_total),
        ]),
        confidence: confidence_from_excess(ratio / threshold_ratio),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DurationNs;
    use crate::report::{merge, SessionMeta};
    use std::collections::BTreeMap as Tables;

    fn meta(adapters: Vec<AdapterKind>) -> SessionMeta {
        SessionMeta {
            session_id: "pattern-test".into(),
            started_at_unix: 1_700_000_000,
            duration: DurationNs(2_000_000_000),
            adapters_enabled: adapters,
            adapters_failed: Vec::new(),
            error: None,
            timed_out: false,
        }
    }

    fn blank(kind: AdapterKind, location: CodeLocation) -> LocationStat {
        LocationStat {
            location,
            adapter_kind: kind,
            total_value: 1_000_000,
            cumulative_value: 1_000_000,
            hit_count: 1,
            per_hit_value: 1_000_000.0,
            percent_of_total: 10.0,
            distinct_callers: 0,
            callers: Vec::new(),
            recursive: false,
            max_recursion_depth: 1,
            per_hit_cv: 0.0,
            series: Vec::new(),
            negative_deltas: 0,
        }
    }

    fn call_stat(name: &str, hits: u64, callers: &[&str]) -> LocationStat {
        LocationStat {
            hit_count: hits,
            distinct_callers: u32::try_from(callers.len()).unwrap(),
            callers: callers.iter().map(|c| CodeLocation::function(*c)).collect(),
            ..blank(AdapterKind::CallTiming, CodeLocation::function(name))
        }
    }

    fn line_stat(name: &str, line: u32, hits: u64, total: i64) -> LocationStat {
        LocationStat {
            hit_count: hits,
            total_value: total,
            cumulative_value: total,
            ..blank(AdapterKind::StmtTiming, CodeLocation::statement(name, line))
        }
    }

    fn alloc_stat(name: &str, deltas: &[i64]) -> LocationStat {
        let mut total = 0i64;
        let series: Vec<i64> = deltas
            .iter()
            .map(|d| {
                total += d;
                total
            })
            .collect();
        LocationStat {
            hit_count: deltas.len() as u64,
            total_value: total,
            cumulative_value: total,
            negative_deltas: deltas.iter().filter(|d| **d < 0).count() as u64,
            series,
            ..blank(AdapterKind::AllocTracking, CodeLocation::function(name))
        }
    }

    fn report_of(tables: Tables<AdapterKind, Vec<LocationStat>>) -> ProfileReport {
        let adapters: Vec<AdapterKind> = tables.keys().copied().collect();
        merge(meta(adapters), tables).unwrap()
    }

    fn only(findings: &[Finding], pattern: PatternKind) -> Vec<&Finding> {
        findings.iter().filter(|f| f.pattern == pattern).collect()
    }

    #[test]
    fn runaway_recursion_is_detected_with_high_confidence() {
        // Naive fib(25): ~240k calls, two call sites (itself + the driver)
        let mut stat = call_stat("demo::fib", 242_785, &["demo::fib", "demo::run"]);
        stat.recursive = true;
        stat.max_recursion_depth = 25;
        stat.percent_of_total = 95.0;
        let report =
            report_of(Tables::from([(AdapterKind::CallTiming, vec![stat])]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::ExponentialRecursion);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].confidence, Confidence::High);
        assert_eq!(hits[0].primary_location(), &CodeLocation::function("demo::fib"));
        assert_eq!(hits[0].evidence_value("hit_count"), 242_785.0);
    }

    #[test]
    fn shallow_recursion_stays_quiet() {
        let mut stat = call_stat("demo::walk", 12, &["demo::walk", "demo::run"]);
        stat.recursive = true;
        let report =
            report_of(Tables::from([(AdapterKind::CallTiming, vec![stat])]));
        assert!(only(&match_report(&report), PatternKind::ExponentialRecursion).is_empty());
    }

    #[test]
    fn monotonic_allocation_growth_is_detected() {
        let stat = alloc_stat("demo::grow", &[2 << 20, 2 << 20, 2 << 20, 2 << 20]);
        let report =
            report_of(Tables::from([(AdapterKind::AllocTracking, vec![stat])]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::UnboundedGrowth);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].evidence_value("monotonic_samples") >= 3.0);
        assert!(hits[0].evidence_value("growth_rate_bytes_per_sec") > 0.0);
    }

    #[test]
    fn growth_with_releases_stays_quiet() {
        let stat = alloc_stat("demo::churn", &[4 << 20, -(3 << 20), 4 << 20, -(3 << 20)]);
        let report =
            report_of(Tables::from([(AdapterKind::AllocTracking, vec![stat])]));
        assert!(only(&match_report(&report), PatternKind::UnboundedGrowth).is_empty());
    }

    #[test]
    fn chatty_single_site_calls_suggest_batching() {
        let mut stat = call_stat("demo::query", 200, &["demo::sync_all"]);
        stat.per_hit_cv = 0.1;
        let report =
            report_of(Tables::from([(AdapterKind::CallTiming, vec![stat])]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::RedundantSequentialCalls);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].confidence, Confidence::Medium); // 4x over N=50
        assert_eq!(hits[0].locations[1], CodeLocation::function("demo::sync_all"));
    }

    #[test]
    fn multi_site_calls_are_not_batching_candidates() {
        let stat = call_stat("demo::query", 200, &["demo::sync_all", "demo::report"]);
        let report =
            report_of(Tables::from([(AdapterKind::CallTiming, vec![stat])]));
        assert!(only(&match_report(&report), PatternKind::RedundantSequentialCalls).is_empty());
    }

    #[test]
    fn dominant_line_is_flagged_within_its_function() {
        let stats = vec![
            line_stat("demo::load", 10, 100, 9_000_000),
            line_stat("demo::load", 11, 100, 1_000_000),
        ];
        let report = report_of(Tables::from([(AdapterKind::StmtTiming, stats)]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::LineDominance);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].primary_location(), &CodeLocation::statement("demo::load", 10));
        assert!((hits[0].evidence_value("share_of_function_percent") - 90.0).abs() < 1e-6);
    }

    #[test]
    fn single_measured_line_is_not_dominance() {
        let stats = vec![line_stat("demo::load", 10, 100, 9_000_000)];
        let report = report_of(Tables::from([(AdapterKind::StmtTiming, stats)]));
        assert!(only(&match_report(&report), PatternKind::LineDominance).is_empty());
    }

    #[test]
    fn multiplicative_line_scaling_is_quadratic_suspect() {
        let stats = vec![
            line_stat("demo::pairs", 20, 64, 1_000_000),
            line_stat("demo::pairs", 21, 4_096, 1_000_000),
        ];
        let report = report_of(Tables::from([(AdapterKind::StmtTiming, stats)]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::QuadraticSuspect);
        assert_eq!(hits.len(), 1);
        // Exact n² nest: ratio 64 against threshold 32
        assert_eq!(hits[0].confidence, Confidence::Medium);
        assert_eq!(hits[0].locations[1], CodeLocation::statement("demo::pairs", 20));
    }

    #[test]
    fn linear_nesting_is_not_quadratic() {
        let stats = vec![
            line_stat("demo::pairs", 20, 64, 1_000_000),
            line_stat("demo::pairs", 21, 640, 1_000_000),
        ];
        let report = report_of(Tables::from([(AdapterKind::StmtTiming, stats)]));
        assert!(only(&match_report(&report), PatternKind::QuadraticSuspect).is_empty());
    }

    #[test]
    fn quadratic_call_edge_is_detected() {
        let outer = call_stat("demo::outer", 100, &["demo::run"]);
        let inner = call_stat("demo::lookup", 10_000, &["demo::outer"]);
        let report =
            report_of(Tables::from([(AdapterKind::CallTiming, vec![outer, inner])]));
        let findings = match_report(&report);

        let hits = only(&findings, PatternKind::QuadraticSuspect);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].primary_location(), &CodeLocation::function("demo::lookup"));
    }

    #[test]
    fn matching_is_idempotent_and_ordered() {
        let mut rec = call_stat("demo::fib", 100_000, &["demo::fib", "demo::run"]);
        rec.recursive = true;
        let mut chatty = call_stat("demo::query", 300, &["demo::sync_all"]);
        chatty.per_hit_cv = 0.05;
        let grow = alloc_stat("demo::grow", &[4 << 20, 4 << 20, 4 << 20]);

        let tables = Tables::from([
            (AdapterKind::CallTiming, vec![rec, chatty]),
            (AdapterKind::AllocTracking, vec![grow]),
        ]);
        let report = report_of(tables);

        let first = match_report(&report);
        let second = match_report(&report);
        assert_eq!(first, second);

        // Catalogue priority order: recursion before growth before batching
        let priorities: Vec<u8> = first.iter().map(|f| f.pattern.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert_eq!(first[0].pattern, PatternKind::ExponentialRecursion);
    }
}
