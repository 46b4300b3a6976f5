//! Marker-based call timing.
//!
//! The workload is instrumented explicitly: it holds a [`CallTimer`] handle
//! and opens a [`CallSpan`] at each function entry. The guard records an
//! `Enter` marker on creation and the matching `Exit` on drop, so early
//! returns and panics still close the span. Because the markers run inline
//! with the target, this source is inherently serialized with the workload
//! (it interposes on execution rather than observing it from outside).

use std::sync::Arc;

use crate::adapters::{EventPayload, InstrumentationAdapter, MarkerChannel, RawEvent};
use crate::domain::{AdapterError, AdapterKind, CodeLocation};

/// Call-timing instrumentation source.
///
/// Create the adapter, take as many [`CallTimer`] handles as the workload
/// needs, then hand the adapter to the session coordinator.
#[derive(Debug)]
pub struct CallTimingAdapter {
    channel: Arc<MarkerChannel>,
}

impl CallTimingAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { channel: Arc::new(MarkerChannel::new()) }
    }

    /// A cheap cloneable handle for instrumenting the workload.
    #[must_use]
    pub fn timer(&self) -> CallTimer {
        CallTimer { channel: Arc::clone(&self.channel) }
    }
}

impl Default for CallTimingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationAdapter for CallTimingAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::CallTiming
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        self.channel.arm();
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<RawEvent>, AdapterError> {
        Ok(self.channel.disarm_and_drain())
    }
}

/// Handle the workload uses to mark function entry.
#[derive(Debug, Clone)]
pub struct CallTimer {
    channel: Arc<MarkerChannel>,
}

impl CallTimer {
    /// Open a span for `qualified_name`; the span closes when the guard
    /// drops. A no-op while the adapter is not armed.
    #[must_use = "the span closes when the guard drops"]
    pub fn enter(&self, qualified_name: &str) -> CallSpan {
        let location = CodeLocation::function(qualified_name);
        let armed = self.channel.is_armed();
        if armed {
            self.channel.record(location.clone(), EventPayload::Enter);
        }
        CallSpan { channel: Arc::clone(&self.channel), location, armed }
    }
}

/// RAII guard for one timed call.
#[derive(Debug)]
pub struct CallSpan {
    channel: Arc<MarkerChannel>,
    location: CodeLocation,
    armed: bool,
}

impl Drop for CallSpan {
    fn drop(&mut self) {
        // Only close spans we opened: a span created before `start` must not
        // emit a dangling Exit into the next session's stream.
        if self.armed {
            self.channel.record(self.location.clone(), EventPayload::Exit);
        }
    }
}
