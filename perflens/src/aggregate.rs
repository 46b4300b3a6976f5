//! Measurement reduction: one adapter's raw event stream → a normalized
//! per-location statistic table.
//!
//! # Self time under recursion
//!
//! Timing streams are replayed against a frame stack: a location's self
//! time is the time it spends on top of the stack, and inclusive time is
//! attributed only to the *outermost* frame at each location. A naive sum
//! of inclusive times reports far more than 100% for deep or exponential
//! recursion (every inner frame re-counts its ancestors' window); the
//! outermost-frame rule keeps per-adapter percentages summing to ≤ 100%.
//!
//! # Robustness
//!
//! Streams from a target that failed mid-run are still reducible: frames
//! left open at stream end are force-closed at the last observed timestamp.
//! Unmatched exits and payloads that are invalid for the adapter kind are
//! dropped with a diagnostic, never propagated.

// Percentage and per-hit calculations intentionally convert counts to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::adapters::{EventPayload, RawEvent};
use crate::domain::{AdapterKind, CodeLocation};

/// Maximum caller locations stored per stat.
///
/// Bounds memory when a function is called from many sites; the distinct
/// count is still exact. Eight is enough for the pattern rules, which only
/// need the sole caller of single-site calls.
pub const MAX_TRACKED_CALLERS: usize = 8;

/// Per-location, per-adapter reduced statistic.
///
/// `total_value` is self time in nanoseconds for timing adapters and net
/// byte delta for the allocation adapter. The trailing fields are
/// structural signals the pattern matcher reads straight off the report:
/// caller fan-in, recursion shape, per-hit cost spread, and (allocation
/// only) the running-total series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStat {
    #[serde(flatten)]
    pub location: CodeLocation,
    pub adapter_kind: AdapterKind,
    pub total_value: i64,
    /// Inclusive time of outermost frames (timing); equals `total_value`
    /// for the allocation adapter.
    pub cumulative_value: i64,
    pub hit_count: u64,
    pub per_hit_value: f64,
    pub percent_of_total: f64,
    pub distinct_callers: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callers: Vec<CodeLocation>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub max_recursion_depth: u32,
    /// Coefficient of variation of per-call inclusive cost (timing only).
    #[serde(default)]
    pub per_hit_cv: f64,
    /// Running totals after each sample (allocation only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<i64>,
    #[serde(default)]
    pub negative_deltas: u64,
}

/// Reduce one adapter's event stream for one session. Pure: same stream,
/// same table.
#[must_use]
pub fn reduce(kind: AdapterKind, events: &[RawEvent]) -> Vec<LocationStat> {
    if kind.is_timing() {
        reduce_spans(kind, events)
    } else {
        reduce_samples(kind, events)
    }
}

// =============================================================================
// SPAN REPLAY (timing adapters)
// =============================================================================

struct OpenFrame {
    location: CodeLocation,
    entered_at: u64,
    /// Start of the current self-time segment (advances when a child opens
    /// or closes).
    cursor: u64,
    self_ns: u64,
    /// No frame at the same location sits deeper in the stack.
    outermost: bool,
}

#[derive(Default)]
struct SpanAcc {
    hits: u64,
    self_ns: u64,
    cum_ns: u64,
    live_depth: u32,
    max_depth: u32,
    recursive: bool,
    callers: BTreeSet<CodeLocation>,
    // Welford accumulator over per-call inclusive durations
    closed_calls: u64,
    mean: f64,
    m2: f64,
}

impl SpanAcc {
    fn close_frame(&mut self, frame: &OpenFrame, closed_at: u64) {
        self.self_ns += frame.self_ns;
        self.live_depth = self.live_depth.saturating_sub(1);
        let inclusive = closed_at.saturating_sub(frame.entered_at);
        if frame.outermost {
            self.cum_ns += inclusive;
        }
        self.closed_calls += 1;
        let x = inclusive as f64;
        let delta = x - self.mean;
        self.mean += delta / self.closed_calls as f64;
        self.m2 += delta * (x - self.mean);
    }
}

fn reduce_spans(kind: AdapterKind, events: &[RawEvent]) -> Vec<LocationStat> {
    let mut stack: Vec<OpenFrame> = Vec::new();
    let mut accs: HashMap<CodeLocation, SpanAcc> = HashMap::new();
    let mut last_ts: u64 = 0;
    let mut dropped: usize = 0;

    for event in events {
        let ts = event.timestamp.0;
        last_ts = last_ts.max(ts);
        match event.payload {
            EventPayload::Enter => {
                if let Some(top) = stack.last_mut() {
                    top.self_ns += ts.saturating_sub(top.cursor);
                }
                let caller = stack.last().map(|f| f.location.clone());
                let acc = accs.entry(event.location.clone()).or_default();
                acc.hits += 1;
                let outermost = acc.live_depth == 0;
                if !outermost {
                    acc.recursive = true;
                }
                acc.live_depth += 1;
                acc.max_depth = acc.max_depth.max(acc.live_depth);
                if let Some(caller) = caller {
                    acc.callers.insert(caller);
                }
                stack.push(OpenFrame {
                    location: event.location.clone(),
                    entered_at: ts,
                    cursor: ts,
                    self_ns: 0,
                    outermost,
                });
            }
            EventPayload::Exit => match stack.last() {
                Some(top) if top.location == event.location => {
                    let mut frame = stack.pop().expect("top frame just observed");
                    frame.self_ns += ts.saturating_sub(frame.cursor);
                    if let Some(acc) = accs.get_mut(&frame.location) {
                        acc.close_frame(&frame, ts);
                    }
                    if let Some(top) = stack.last_mut() {
                        top.cursor = ts;
                    }
                }
                _ => dropped += 1,
            },
            EventPayload::Sample { .. } => dropped += 1,
        }
    }

    // Target may have raised with frames still open; close them at the last
    // observed timestamp so partial sessions still reduce.
    if !stack.is_empty() {
        debug!("{kind}: force-closing {} open frame(s) at stream end", stack.len());
    }
    while let Some(mut frame) = stack.pop() {
        frame.self_ns += last_ts.saturating_sub(frame.cursor);
        if let Some(acc) = accs.get_mut(&frame.location) {
            acc.close_frame(&frame, last_ts);
        }
        if let Some(top) = stack.last_mut() {
            top.cursor = last_ts;
        }
    }

    if dropped > 0 {
        warn!("{kind}: dropped {dropped} malformed event(s) (unmatched exit or foreign payload)");
    }

    let total_self: u64 = accs.values().map(|a| a.self_ns).sum();
    let mut stats: Vec<LocationStat> = accs
        .into_iter()
        .filter_map(|(location, acc)| {
            if acc.hits == 0 {
                // Malformed source output; surfacing it would divide by zero.
                warn!("{kind}: dropping {location}: observed with zero hits");
                return None;
            }
            let percent = if total_self > 0 {
                (acc.self_ns as f64 / total_self as f64) * 100.0
            } else {
                0.0
            };
            let cv = if acc.closed_calls >= 2 && acc.mean > 0.0 {
                (acc.m2 / (acc.closed_calls - 1) as f64).sqrt() / acc.mean
            } else {
                0.0
            };
            Some(LocationStat {
                location,
                adapter_kind: kind,
                total_value: i64::try_from(acc.self_ns).unwrap_or(i64::MAX),
                cumulative_value: i64::try_from(acc.cum_ns).unwrap_or(i64::MAX),
                hit_count: acc.hits,
                per_hit_value: acc.self_ns as f64 / acc.hits as f64,
                percent_of_total: percent,
                distinct_callers: u32::try_from(acc.callers.len()).unwrap_or(u32::MAX),
                callers: acc.callers.into_iter().take(MAX_TRACKED_CALLERS).collect(),
                recursive: acc.recursive,
                max_recursion_depth: acc.max_depth,
                per_hit_cv: cv,
                series: Vec::new(),
                negative_deltas: 0,
            })
        })
        .collect();
    stats.sort_by(|a, b| a.location.cmp(&b.location));
    stats
}

// =============================================================================
// SAMPLE REDUCTION (allocation adapter)
// =============================================================================

#[derive(Default)]
struct SampleAcc {
    hits: u64,
    total: i64,
    series: Vec<i64>,
    negatives: u64,
}

fn reduce_samples(kind: AdapterKind, events: &[RawEvent]) -> Vec<LocationStat> {
    let mut accs: HashMap<CodeLocation, SampleAcc> = HashMap::new();
    let mut dropped: usize = 0;

    for event in events {
        match event.payload {
            EventPayload::Sample { delta_bytes } => {
                let acc = accs.entry(event.location.clone()).or_default();
                acc.hits += 1;
                acc.total += delta_bytes;
                acc.series.push(acc.total);
                if delta_bytes < 0 {
                    acc.negatives += 1;
                }
            }
            EventPayload::Enter | EventPayload::Exit => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!("{kind}: dropped {dropped} malformed event(s) (span markers in a sample stream)");
    }

    let positive_total: i64 = accs.values().map(|a| a.total.max(0)).sum();
    let mut stats: Vec<LocationStat> = accs
        .into_iter()
        .filter_map(|(location, acc)| {
            if acc.hits == 0 {
                warn!("{kind}: dropping {location}: observed with zero hits");
                return None;
            }
            let percent = if positive_total > 0 {
                (acc.total.max(0) as f64 / positive_total as f64) * 100.0
            } else {
                0.0
            };
            Some(LocationStat {
                location,
                adapter_kind: kind,
                total_value: acc.total,
                cumulative_value: acc.total,
                hit_count: acc.hits,
                per_hit_value: acc.total as f64 / acc.hits as f64,
                percent_of_total: percent,
                distinct_callers: 0,
                callers: Vec::new(),
                recursive: false,
                max_recursion_depth: 0,
                per_hit_cv: 0.0,
                series: acc.series,
                negative_deltas: acc.negatives,
            })
        })
        .collect();
    stats.sort_by(|a, b| a.location.cmp(&b.location));
    stats
}
