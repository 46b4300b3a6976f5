//! Allocation tracking via periodic RSS sampling.
//!
//! Unlike the timing adapters this source does not interpose on the target:
//! a background thread samples the process's resident set size from
//! `/proc/self/statm` on a fixed interval and emits the byte delta between
//! consecutive samples. Samples are attributed to a configured label
//! (process granularity) since an out-of-band sampler cannot resolve code
//! locations.
//!
//! A final sample is always taken at `stop`, so even a target that finishes
//! inside one interval yields a usable delta.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::warn;

use crate::adapters::{EventPayload, InstrumentationAdapter, RawEvent};
use crate::domain::{AdapterError, AdapterKind, CodeLocation, Timestamp};

/// Default sampling interval. Matches the granularity a session of a few
/// hundred milliseconds needs to produce the three-sample minimum the
/// growth pattern requires.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Allocation-sampling instrumentation source.
#[derive(Debug)]
pub struct AllocTrackingAdapter {
    label: CodeLocation,
    interval: Duration,
    sampler: Option<Sampler>,
}

#[derive(Debug)]
struct Sampler {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Vec<RawEvent>>,
}

impl AllocTrackingAdapter {
    /// `label` names the unit of work the samples are attributed to, e.g.
    /// the target's qualified entry point.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: CodeLocation::function(label),
            interval: DEFAULT_SAMPLE_INTERVAL,
            sampler: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl InstrumentationAdapter for AllocTrackingAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::AllocTracking
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        // Probe /proc up front so an unreadable source fails here, where the
        // coordinator can record the fault, instead of inside the thread.
        let mut previous = read_rss_bytes()?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let label = self.label.clone();
        let interval = self.interval;

        let thread = std::thread::Builder::new()
            .name("perflens-alloc-sampler".into())
            .spawn(move || {
                let origin = Instant::now();
                let mut events = Vec::new();
                loop {
                    if !stop_flag.load(Ordering::Acquire) {
                        std::thread::sleep(interval);
                    }
                    match read_rss_bytes() {
                        Ok(rss) => {
                            let ns =
                                u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
                            events.push(RawEvent {
                                location: label.clone(),
                                timestamp: Timestamp(ns),
                                payload: EventPayload::Sample { delta_bytes: rss - previous },
                            });
                            previous = rss;
                        }
                        Err(e) => warn!("alloc sampler: dropping sample: {e}"),
                    }
                    // Checked after sampling so stop always lands one final
                    // sample, even when the target finished inside one
                    // interval.
                    if stop_flag.load(Ordering::Acquire) {
                        return events;
                    }
                }
            })
            .map_err(AdapterError::Io)?;

        self.sampler = Some(Sampler { stop, thread });
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<RawEvent>, AdapterError> {
        let Some(sampler) = self.sampler.take() else {
            return Ok(Vec::new());
        };
        sampler.stop.store(true, Ordering::Release);
        sampler
            .thread
            .join()
            .map_err(|_| AdapterError::Unavailable("sampler thread panicked".into()))
    }
}

/// Resident set size of this process in bytes.
fn read_rss_bytes() -> Result<i64, AdapterError> {
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    parse_statm_rss(&statm, page_size())
}

/// Second field of /proc/<pid>/statm is the resident page count.
fn parse_statm_rss(statm: &str, page_size: i64) -> Result<i64, AdapterError> {
    let pages = statm
        .split_whitespace()
        .nth(1)
        .and_then(|f| f.parse::<i64>().ok())
        .ok_or_else(|| AdapterError::Malformed(format!("unparseable statm line: {statm:?}")))?;
    Ok(pages * page_size)
}

#[allow(unsafe_code)]
fn page_size() -> i64 {
    // SAFETY: sysconf has no preconditions; _SC_PAGESIZE is always valid.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_statm_resident_field() {
        let rss = parse_statm_rss("12345 678 90 1 0 2 0\n", 4096).unwrap();
        assert_eq!(rss, 678 * 4096);
    }

    #[test]
    fn rejects_malformed_statm() {
        assert!(parse_statm_rss("not numbers", 4096).is_err());
        assert!(parse_statm_rss("", 4096).is_err());
    }

    #[test]
    fn sampler_produces_final_sample_on_stop() {
        let mut adapter = AllocTrackingAdapter::new("test::workload")
            .with_interval(Duration::from_millis(1));
        adapter.start().unwrap();
        // Allocate something visible while the sampler runs
        let ballast: Vec<u8> = vec![1; 4 << 20];
        std::thread::sleep(Duration::from_millis(10));
        let events = adapter.stop().unwrap();
        drop(ballast);

        assert!(!events.is_empty());
        assert!(events
            .iter()
            .all(|e| matches!(e.payload, EventPayload::Sample { .. })));
        assert!(events
            .iter()
            .all(|e| e.location == CodeLocation::function("test::workload")));
    }
}
