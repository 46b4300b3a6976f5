//! The unified profile report and the cross-adapter merger.
//!
//! A report is the result of exactly one session: per-adapter stat tables
//! keyed by a common code-location identity, plus session metadata. Once
//! built it is read-only; findings and recommendations are derived views
//! recomputed from it on demand.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::LocationStat;
use crate::domain::{AdapterFault, AdapterKind, CodeLocation, DurationNs, MergeError};

/// Metadata for one profiling session.
///
/// `adapters_enabled` lists every source the caller asked for;
/// `adapters_failed` records which of those delivered nothing, so partial
/// coverage is always explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub started_at_unix: u64,
    pub duration: DurationNs,
    pub adapters_enabled: Vec<AdapterKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adapters_failed: Vec<AdapterFault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
}

/// One report entry: every adapter's view of one function.
///
/// `location` is the reconciled identity: it keeps a concrete line only
/// when all stats agree on a single line; any mix of granularities falls
/// back to function identity, with the line detail preserved inside the
/// individual stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub location: CodeLocation,
    pub stats: Vec<LocationStat>,
}

impl ReportEntry {
    /// Highest share any adapter attributes to this entry; the hotspot
    /// ranking key.
    #[must_use]
    pub fn badness(&self) -> f64 {
        self.stats.iter().map(|s| s.percent_of_total).fold(0.0, f64::max)
    }

    /// This entry's stat for one adapter at function granularity, if that
    /// adapter observed it. Line-level stats are excluded.
    #[must_use]
    pub fn stat(&self, kind: AdapterKind) -> Option<&LocationStat> {
        self.stats.iter().find(|s| s.adapter_kind == kind && s.location.line.is_none())
    }

    /// All of this entry's stats for one adapter (line-level included).
    pub fn stats_for(&self, kind: AdapterKind) -> impl Iterator<Item = &LocationStat> {
        self.stats.iter().filter(move |s| s.adapter_kind == kind)
    }
}

/// The unified result of one profiling session.
///
/// Entries are totally ordered by [`ReportEntry::badness`] descending
/// (ties by name), so top-N hotspot queries are stable.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub session: SessionMeta,
    entries: Vec<ReportEntry>,
}

impl ProfileReport {
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Look up an entry by qualified function name.
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.location.qualified_name == qualified_name)
    }

    /// The `n` worst entries, hottest first.
    #[must_use]
    pub fn top_hotspots(&self, n: usize) -> &[ReportEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge per-adapter stat tables into one report.
///
/// Identity resolution: stats merge into one entry iff their qualified
/// names match; line numbers never split an entry. Fails only when the
/// session enabled no adapters at all — any non-empty subset is valid.
///
/// # Errors
/// [`MergeError::IncompleteSession`] when `session.adapters_enabled` is
/// empty.
pub fn merge(
    session: SessionMeta,
    tables: BTreeMap<AdapterKind, Vec<LocationStat>>,
) -> Result<ProfileReport, MergeError> {
    if session.adapters_enabled.is_empty() {
        return Err(MergeError::IncompleteSession);
    }

    let mut grouped: HashMap<String, Vec<LocationStat>> = HashMap::new();
    for stats in tables.into_values() {
        for stat in stats {
            grouped.entry(stat.location.qualified_name.clone()).or_default().push(stat);
        }
    }

    let mut entries: Vec<ReportEntry> = grouped
        .into_iter()
        .map(|(name, mut stats)| {
            stats.sort_by(|a, b| {
                a.adapter_kind.cmp(&b.adapter_kind).then_with(|| a.location.cmp(&b.location))
            });
            let location = reconcile_identity(&name, &stats);
            ReportEntry { location, stats }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.badness()
            .partial_cmp(&a.badness())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.location.cmp(&b.location))
    });

    Ok(ProfileReport { session, entries })
}

/// Pick the entry identity for a set of same-name stats: keep a line only
/// when every stat agrees on that one line.
fn reconcile_identity(name: &str, stats: &[LocationStat]) -> CodeLocation {
    let mut lines = stats.iter().map(|s| s.location.line);
    let first = lines.next().flatten();
    if first.is_some() && lines.all(|l| l == first) {
        CodeLocation { qualified_name: name.to_owned(), line: first }
    } else {
        if stats.iter().any(|s| s.location.line.is_some()) {
            debug!("{name}: mixed line granularity across sources, keeping function identity");
        }
        CodeLocation::function(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_meta(adapters: Vec<AdapterKind>) -> SessionMeta {
        SessionMeta {
            session_id: "test-session".into(),
            started_at_unix: 1_700_000_000,
            duration: DurationNs(1_000_000_000),
            adapters_enabled: adapters,
            adapters_failed: Vec::new(),
            error: None,
            timed_out: false,
        }
    }

    fn bare_stat(
        kind: AdapterKind,
        name: &str,
        line: Option<u32>,
        percent: f64,
    ) -> LocationStat {
        LocationStat {
            location: CodeLocation { qualified_name: name.into(), line },
            adapter_kind: kind,
            total_value: 1_000,
            cumulative_value: 1_000,
            hit_count: 1,
            per_hit_value: 1_000.0,
            percent_of_total: percent,
            distinct_callers: 0,
            callers: Vec::new(),
            recursive: false,
            max_recursion_depth: 1,
            per_hit_cv: 0.0,
            series: Vec::new(),
            negative_deltas: 0,
        }
    }

    #[test]
    fn merge_requires_at_least_one_adapter() {
        let err = merge(test_meta(Vec::new()), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, MergeError::IncompleteSession));
    }

    #[test]
    fn line_and_function_stats_share_one_entry() {
        let mut tables = BTreeMap::new();
        tables.insert(
            AdapterKind::CallTiming,
            vec![bare_stat(AdapterKind::CallTiming, "app::load", None, 60.0)],
        );
        tables.insert(
            AdapterKind::StmtTiming,
            vec![
                bare_stat(AdapterKind::StmtTiming, "app::load", Some(10), 70.0),
                bare_stat(AdapterKind::StmtTiming, "app::load", Some(11), 30.0),
            ],
        );
        let report = merge(
            test_meta(vec![AdapterKind::CallTiming, AdapterKind::StmtTiming]),
            tables,
        )
        .unwrap();

        assert_eq!(report.len(), 1);
        let entry = report.get("app::load").unwrap();
        // Mixed granularity falls back to function identity
        assert_eq!(entry.location, CodeLocation::function("app::load"));
        assert_eq!(entry.stats.len(), 3);
        assert_eq!(entry.stats_for(AdapterKind::StmtTiming).count(), 2);
        assert!(entry.stat(AdapterKind::CallTiming).is_some());
        assert!(entry.stat(AdapterKind::StmtTiming).is_none());
    }

    #[test]
    fn agreeing_line_identity_is_preserved() {
        let mut tables = BTreeMap::new();
        tables.insert(
            AdapterKind::StmtTiming,
            vec![bare_stat(AdapterKind::StmtTiming, "app::hot", Some(42), 100.0)],
        );
        let report = merge(test_meta(vec![AdapterKind::StmtTiming]), tables).unwrap();
        assert_eq!(
            report.entries()[0].location,
            CodeLocation::statement("app::hot", 42)
        );
    }

    #[test]
    fn entries_rank_by_worst_adapter_share() {
        let mut tables = BTreeMap::new();
        tables.insert(
            AdapterKind::CallTiming,
            vec![
                bare_stat(AdapterKind::CallTiming, "mild", None, 30.0),
                bare_stat(AdapterKind::CallTiming, "hot", None, 70.0),
            ],
        );
        tables.insert(
            AdapterKind::AllocTracking,
            vec![bare_stat(AdapterKind::AllocTracking, "mild", None, 90.0)],
        );
        let report = merge(
            test_meta(vec![AdapterKind::CallTiming, AdapterKind::AllocTracking]),
            tables,
        )
        .unwrap();

        // "mild" wins: its allocation share (90) beats "hot"'s time share (70)
        assert_eq!(report.entries()[0].location.qualified_name, "mild");
        assert_eq!(report.entries()[1].location.qualified_name, "hot");
        assert_eq!(report.top_hotspots(1).len(), 1);
        assert_eq!(report.top_hotspots(10).len(), 2);
    }

    #[test]
    fn missing_adapter_stat_means_unobserved() {
        let mut tables = BTreeMap::new();
        tables.insert(
            AdapterKind::CallTiming,
            vec![bare_stat(AdapterKind::CallTiming, "app::seen", None, 100.0)],
        );
        let report = merge(
            test_meta(vec![AdapterKind::CallTiming, AdapterKind::AllocTracking]),
            tables,
        )
        .unwrap();
        let entry = report.get("app::seen").unwrap();
        assert!(entry.stat(AdapterKind::AllocTracking).is_none());
    }
}
