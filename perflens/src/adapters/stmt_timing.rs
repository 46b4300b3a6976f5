//! Marker-based statement timing.
//!
//! Line-granularity sibling of the call timer: the workload opens a
//! [`StmtSpan`] around individual statements it wants timed, tagged with
//! the enclosing function's qualified name and the source line. Statement
//! spans from one function reduce into per-line stats that the pattern
//! matcher compares against each other (line dominance, nested-loop
//! scaling).

use std::sync::Arc;

use crate::adapters::{EventPayload, InstrumentationAdapter, MarkerChannel, RawEvent};
use crate::domain::{AdapterError, AdapterKind, CodeLocation};

/// Statement-timing instrumentation source.
#[derive(Debug)]
pub struct StmtTimingAdapter {
    channel: Arc<MarkerChannel>,
}

impl StmtTimingAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { channel: Arc::new(MarkerChannel::new()) }
    }

    /// A cheap cloneable handle for instrumenting the workload.
    #[must_use]
    pub fn tracer(&self) -> StmtTracer {
        StmtTracer { channel: Arc::clone(&self.channel) }
    }
}

impl Default for StmtTimingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationAdapter for StmtTimingAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::StmtTiming
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        self.channel.arm();
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<RawEvent>, AdapterError> {
        Ok(self.channel.disarm_and_drain())
    }
}

/// Handle the workload uses to mark timed statements.
#[derive(Debug, Clone)]
pub struct StmtTracer {
    channel: Arc<MarkerChannel>,
}

impl StmtTracer {
    /// Open a span for the statement at `qualified_name`:`line`; closes when
    /// the guard drops. A no-op while the adapter is not armed.
    #[must_use = "the span closes when the guard drops"]
    pub fn statement(&self, qualified_name: &str, line: u32) -> StmtSpan {
        let location = CodeLocation::statement(qualified_name, line);
        let armed = self.channel.is_armed();
        if armed {
            self.channel.record(location.clone(), EventPayload::Enter);
        }
        StmtSpan { channel: Arc::clone(&self.channel), location, armed }
    }
}

/// RAII guard for one timed statement execution.
#[derive(Debug)]
pub struct StmtSpan {
    channel: Arc<MarkerChannel>,
    location: CodeLocation,
    armed: bool,
}

impl Drop for StmtSpan {
    fn drop(&mut self) {
        if self.armed {
            self.channel.record(self.location.clone(), EventPayload::Exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_spans_carry_line_identity() {
        let mut adapter = StmtTimingAdapter::new();
        let tracer = adapter.tracer();
        adapter.start().unwrap();
        for _ in 0..3 {
            let _s = tracer.statement("app::load", 17);
        }
        let events = adapter.stop().unwrap();
        assert_eq!(events.len(), 6);
        assert!(events
            .iter()
            .all(|e| e.location == CodeLocation::statement("app::load", 17)));
    }
}
