//! # perflens - Coordinated Multi-Source Profiler
//!
//! perflens runs several independent measurement strategies against one
//! execution of a unit of work, reconciles their outputs into a single
//! report keyed by code location, and derives optimization recommendations
//! from recognizable inefficiency patterns in that report.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Target Unit of Work                       │
//! │                  (runs exactly once per session)                │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ marker spans / periodic samples
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Instrumentation Adapters                        │
//! │  • call-timing: function enter/exit markers                     │
//! │  • stmt-timing: statement-scoped markers                        │
//! │  • alloc-tracking: RSS sampling on a background thread          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ raw event streams (one per adapter)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    perflens (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  Aggregate   │──▶│    Merge     │──▶│   Analysis   │      │
//! │  │ (per source) │   │ (one report) │   │ (patterns →  │      │
//! │  └──────────────┘   └──────────────┘   │  recommend)  │      │
//! │         ▲                   │           └──────────────┘      │
//! │         │                   ▼                                  │
//! │  ┌──────────────┐   ┌──────────────┐                         │
//! │  │   Session    │   │    Export    │                         │
//! │  │ (coordinator)│   │ (JSON, text) │                         │
//! │  └──────────────┘   └──────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`session`]: the execution coordinator — state machine, instrumentation
//!   lease, exactly-once target invocation
//! - [`adapters`]: the closed set of measurement sources and their raw
//!   event model
//! - [`aggregate`]: per-adapter stream reduction (recursion-safe self time)
//! - [`report`]: the unified profile report and cross-adapter merger
//! - [`analysis`]: pattern matching and recommendation synthesis
//! - [`export`]: JSON persistence with round-trip guarantees, text summary
//! - [`domain`]: core domain types (locations, adapter kinds, errors)
//! - [`cli`] / [`demo`]: command-line front end and built-in workloads
//!
//! ## Measurement Isolation
//!
//! Each adapter owns its channel and its clock origin; the timing adapters
//! interpose on execution while the allocation sampler observes from a
//! separate thread. One session at a time holds the process-wide
//! instrumentation lease, so concurrent sessions cannot corrupt each
//! other's hooks.
//!
//! ## Typical Usage
//!
//! ```no_run
//! use perflens::adapters::CallTimingAdapter;
//! use perflens::session::ProfileSession;
//!
//! # fn main() -> anyhow::Result<()> {
//! let adapter = CallTimingAdapter::new();
//! let timer = adapter.timer();
//!
//! let mut session = ProfileSession::new(vec![Box::new(adapter)]);
//! session.start_session(|| {
//!     let _span = timer.enter("app::load");
//!     // ... the workload ...
//!     Ok(())
//! })?;
//!
//! for entry in session.report()?.top_hotspots(10) {
//!     println!("{}", entry.location);
//! }
//! for rec in session.recommendations()? {
//!     println!("[{}] {}", rec.severity, rec.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod aggregate;
pub mod analysis;
pub mod cli;
pub mod demo;
pub mod domain;
pub mod export;
pub mod report;
pub mod session;
