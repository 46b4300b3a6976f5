//! Session coordination: one profiling run from target invocation to
//! finished report.
//!
//! A [`ProfileSession`] owns the enabled adapters and drives the pipeline
//! through an explicit state machine:
//!
//! ```text
//! Idle ──start_session──▶ Running ──▶ Reducing ──▶ Merged ──▶ Matched ──▶ Complete
//!                            │
//!                            └──(fatal error)──▶ Failed
//! ```
//!
//! Interposition on call/statement markers is a process-global resource:
//! only one session may hold live hooks at a time. The coordinator models
//! this as an exclusive lease acquired for the `Running` state and released
//! on every exit path; a concurrent `start_session` anywhere in the process
//! fails with [`SessionError::SessionInProgress`] instead of queuing.
//!
//! The target runs exactly once per session. Its failure (error return or
//! panic) never aborts the pipeline — adapters captured whatever happened
//! up to that point, and a partial profile with the error recorded in
//! metadata beats no profile.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};
use uuid::Uuid;

use crate::adapters::{InstrumentationAdapter, RawEvent};
use crate::aggregate::{reduce, LocationStat};
use crate::analysis::{match_report, synthesize, Finding, Recommendation};
use crate::domain::{AdapterFault, AdapterKind, DurationNs, MergeError, SessionError};
use crate::report::{merge, ProfileReport, SessionMeta};

/// Lifecycle state of a profiling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Reducing,
    Merged,
    Matched,
    Complete,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "Idle",
            SessionState::Running => "Running",
            SessionState::Reducing => "Reducing",
            SessionState::Merged => "Merged",
            SessionState::Matched => "Matched",
            SessionState::Complete => "Complete",
            SessionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Process-wide flag guarding the live instrumentation hooks.
static HOOK_LEASE: AtomicBool = AtomicBool::new(false);

/// Exclusive hold on the instrumentation hooks for one `Running` window.
/// Dropping releases; early returns and panics release through Drop.
struct InstrumentationLease;

impl InstrumentationLease {
    fn acquire() -> Result<Self, SessionError> {
        if HOOK_LEASE
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(Self)
        } else {
            Err(SessionError::SessionInProgress)
        }
    }
}

impl Drop for InstrumentationLease {
    fn drop(&mut self) {
        HOOK_LEASE.store(false, Ordering::Release);
    }
}

/// Coordinates one profiling session at a time.
pub struct ProfileSession {
    adapters: Vec<Box<dyn InstrumentationAdapter>>,
    timeout: Option<Duration>,
    state: SessionState,
    report: Option<ProfileReport>,
    findings: Vec<Finding>,
    recommendations: Vec<Recommendation>,
}

impl ProfileSession {
    #[must_use]
    pub fn new(adapters: Vec<Box<dyn InstrumentationAdapter>>) -> Self {
        Self {
            adapters,
            timeout: None,
            state: SessionState::Idle,
            report: None,
            findings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Advisory session timeout: an overrunning target is never interrupted
    /// (half-finished instrumentation streams are unsafe to reduce), but the
    /// session is flagged `timed_out` in its metadata.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one session: invoke `target` exactly once with all enabled
    /// adapters active, then reduce, merge, match and synthesize.
    ///
    /// A session that previously finished (Complete or Failed) starts over
    /// with a fresh session id and a fresh report.
    ///
    /// # Errors
    ///
    /// [`MergeError::IncompleteSession`] (wrapped) when no adapters are
    /// enabled — the target is not invoked in that case.
    /// [`SessionError::SessionInProgress`] when another session holds the
    /// instrumentation hooks.
    pub fn start_session<F>(&mut self, target: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        // Nothing to measure with: refuse before the target ever runs.
        if self.adapters.is_empty() {
            return Err(SessionError::Merge(MergeError::IncompleteSession));
        }

        let lease = InstrumentationLease::acquire()?;
        let session_id = Uuid::new_v4().to_string();
        let started_at_unix =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        self.report = None;
        self.findings.clear();
        self.recommendations.clear();

        let enabled: Vec<AdapterKind> = self.adapters.iter().map(|a| a.kind()).collect();
        let mut faults: Vec<AdapterFault> = Vec::new();
        let mut active: Vec<bool> = Vec::with_capacity(self.adapters.len());

        self.state = SessionState::Running;
        info!("session {session_id}: starting with adapters {enabled:?}");
        for adapter in &mut self.adapters {
            match adapter.start() {
                Ok(()) => active.push(true),
                Err(e) => {
                    warn!("session {session_id}: {} adapter failed to start: {e}", adapter.kind());
                    faults.push(AdapterFault::new(adapter.kind(), &e));
                    active.push(false);
                }
            }
        }

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(target));
        let duration = started.elapsed();
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(panic) => Some(panic_message(&panic)),
        };
        if let Some(ref e) = error {
            warn!("session {session_id}: target failed, keeping partial profile: {e}");
        }

        // The target is done either way; whatever the adapters captured is
        // worth reducing.
        self.state = SessionState::Reducing;
        let mut streams: Vec<(AdapterKind, Vec<RawEvent>)> = Vec::new();
        for (adapter, was_active) in self.adapters.iter_mut().zip(active) {
            if !was_active {
                continue;
            }
            match adapter.stop() {
                Ok(events) => streams.push((adapter.kind(), events)),
                Err(e) => {
                    warn!("session {session_id}: {} adapter failed to stop: {e}", adapter.kind());
                    faults.push(AdapterFault::new(adapter.kind(), &e));
                }
            }
        }
        // Hooks are quiet from here on; let the next session have them.
        drop(lease);

        let timed_out = self.timeout.is_some_and(|t| duration > t);
        if timed_out {
            warn!("session {session_id}: exceeded advisory timeout of {:?}", self.timeout);
        }

        // Per-adapter reduction passes share nothing; run them side by side.
        let mut tables: BTreeMap<AdapterKind, Vec<LocationStat>> = BTreeMap::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = streams
                .iter()
                .map(|(kind, events)| {
                    let kind = *kind;
                    (kind, scope.spawn(move || reduce(kind, events)))
                })
                .collect();
            for (kind, handle) in handles {
                let stats = handle.join().unwrap_or_default();
                tables.entry(kind).or_default().extend(stats);
            }
        });

        let meta = SessionMeta {
            session_id,
            started_at_unix,
            duration: DurationNs::from_std(duration),
            adapters_enabled: enabled,
            adapters_failed: faults,
            error,
            timed_out,
        };

        let report = match merge(meta, tables) {
            Ok(report) => report,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };
        self.state = SessionState::Merged;

        self.findings = match_report(&report);
        self.state = SessionState::Matched;

        self.recommendations = synthesize(&self.findings);
        self.report = Some(report);
        self.state = SessionState::Complete;
        Ok(())
    }

    /// The merged report.
    ///
    /// # Errors
    /// [`SessionError::SessionNotComplete`] unless the session is Complete.
    pub fn report(&self) -> Result<&ProfileReport, SessionError> {
        match (&self.report, self.state) {
            (Some(report), SessionState::Complete) => Ok(report),
            _ => Err(SessionError::SessionNotComplete(self.state)),
        }
    }

    /// The matcher's findings, in catalogue order.
    ///
    /// # Errors
    /// [`SessionError::SessionNotComplete`] unless the session is Complete.
    pub fn findings(&self) -> Result<&[Finding], SessionError> {
        match self.state {
            SessionState::Complete => Ok(&self.findings),
            _ => Err(SessionError::SessionNotComplete(self.state)),
        }
    }

    /// The synthesized recommendations, ranked.
    ///
    /// # Errors
    /// [`SessionError::SessionNotComplete`] unless the session is Complete.
    pub fn recommendations(&self) -> Result<&[Recommendation], SessionError> {
        match self.state {
            SessionState::Complete => Ok(&self.recommendations),
            _ => Err(SessionError::SessionNotComplete(self.state)),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("target panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("target panicked: {s}")
    } else {
        "target panicked".to_owned()
    }
}
