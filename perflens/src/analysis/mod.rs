//! Post-processing of a merged report: pattern detection and
//! recommendation synthesis.
//!
//! Both stages are pure derived views of a [`crate::report::ProfileReport`]
//! and can be recomputed at any time (e.g. when re-analyzing a saved
//! report).

pub mod patterns;
pub mod recommend;

pub use patterns::{match_report, Confidence, Finding, PatternKind};
pub use recommend::{synthesize, ImpactTier, Recommendation, Severity};
