//! Instrumentation adapters: the measurement sources a session consumes.
//!
//! Each adapter is an independent source of [`RawEvent`]s for one execution
//! of a target unit of work. The coordinator starts every enabled adapter
//! before the target runs and stops each one afterwards, collecting its
//! event stream for reduction.
//!
//! The set of kinds is closed (see [`AdapterKind`]); this module ships one
//! reference implementation per kind:
//!
//! - [`CallTimingAdapter`]: marker-based function spans (enter/exit)
//! - [`StmtTimingAdapter`]: marker-based statement spans (line-scoped)
//! - [`AllocTrackingAdapter`]: periodic RSS sampling on a background thread
//!
//! Adapters must be composable: any subset may be active simultaneously
//! without corrupting each other's measurements. The reference adapters
//! achieve this by giving every adapter its own channel and its own clock
//! origin — nothing is shared between sources.

pub mod alloc_tracking;
pub mod call_timing;
pub mod stmt_timing;

pub use alloc_tracking::AllocTrackingAdapter;
pub use call_timing::{CallSpan, CallTimer, CallTimingAdapter};
pub use stmt_timing::{StmtSpan, StmtTimingAdapter, StmtTracer};

use crate::domain::{AdapterError, AdapterKind, CodeLocation, Timestamp};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// What a single raw event carries.
///
/// Timing adapters emit paired `Enter`/`Exit` markers; the allocation
/// adapter emits point-in-time `Sample` deltas. Which payloads are valid is
/// determined by the adapter kind and checked during reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    /// Control flow entered the location.
    Enter,
    /// Control flow left the location.
    Exit,
    /// A sampled measurement delta; bytes for the allocation adapter
    /// (negative = memory released).
    Sample { delta_bytes: i64 },
}

/// One raw measurement event, owned by the aggregator that reduces the
/// stream and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub location: CodeLocation,
    /// Nanoseconds since the owning adapter's start.
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

/// One instrumentation source.
///
/// `start`/`stop` must be safe to call while other adapters are active;
/// implementations must not share mutable state across sources.
pub trait InstrumentationAdapter: Send {
    fn kind(&self) -> AdapterKind;

    /// Arm the source. Events observed before `start` are not recorded.
    fn start(&mut self) -> Result<(), AdapterError>;

    /// Disarm the source and surrender the event stream for this session.
    fn stop(&mut self) -> Result<Vec<RawEvent>, AdapterError>;
}

/// Shared recording machinery for the marker-based timing adapters.
///
/// A cheap cloneable handle (see [`CallTimer`]/[`StmtTracer`]) records
/// events into an unbounded channel; `stop` drains whatever accumulated.
/// While the adapter is not armed the handles are no-ops, so instrumented
/// code runs unchanged outside a session.
#[derive(Debug)]
pub(crate) struct MarkerChannel {
    armed: AtomicBool,
    origin: Mutex<Option<Instant>>,
    tx: Sender<RawEvent>,
    rx: Receiver<RawEvent>,
}

impl MarkerChannel {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { armed: AtomicBool::new(false), origin: Mutex::new(None), tx, rx }
    }

    pub(crate) fn arm(&self) {
        // Recover the guard even if a panicking target poisoned the lock
        *self.origin.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Instant::now());
        self.armed.store(true, Ordering::Release);
    }

    pub(crate) fn disarm_and_drain(&self) -> Vec<RawEvent> {
        self.armed.store(false, Ordering::Release);
        self.rx.try_iter().collect()
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Nanoseconds since `arm`; zero when the clock is not running.
    pub(crate) fn now(&self) -> Timestamp {
        let origin = self.origin.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ns = (*origin)
            .map(|o| u64::try_from(o.elapsed().as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp(ns)
    }

    pub(crate) fn record(&self, location: CodeLocation, payload: EventPayload) {
        // Events outside the armed window (e.g. a span guard dropped after
        // stop) belong to no session and are discarded.
        if !self.is_armed() {
            return;
        }
        // Sends only fail when the receiver is gone, which cannot outlive us.
        let _ = self.tx.send(RawEvent { location, timestamp: self.now(), payload });
    }
}
