//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a raw nanosecond
//! count where a duration is expected, and make function signatures more
//! expressive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement source kind.
///
/// The set of instrumentation sources is closed: the merger's identity
/// reconciliation and the pattern rules are written against exactly these
/// three kinds. A new source means a new variant, not runtime registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Function-granularity call timing (enter/exit markers).
    CallTiming,
    /// Periodic allocation sampling (byte deltas).
    AllocTracking,
    /// Statement-granularity timing (line-scoped markers).
    StmtTiming,
}

impl AdapterKind {
    /// All kinds, in merge/display order.
    pub const ALL: [AdapterKind; 3] =
        [AdapterKind::CallTiming, AdapterKind::AllocTracking, AdapterKind::StmtTiming];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterKind::CallTiming => "call-timing",
            AdapterKind::AllocTracking => "alloc-tracking",
            AdapterKind::StmtTiming => "stmt-timing",
        }
    }

    /// Whether this kind produces enter/exit span markers (as opposed to
    /// point-in-time samples).
    #[must_use]
    pub fn is_timing(self) -> bool {
        matches!(self, AdapterKind::CallTiming | AdapterKind::StmtTiming)
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a measurable unit: a qualified function name plus an optional
/// source line.
///
/// Two locations are equal iff both the name and the line match. `line` is
/// `None` for sources that can only resolve function granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeLocation {
    pub qualified_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl CodeLocation {
    #[must_use]
    pub fn function(qualified_name: impl Into<String>) -> Self {
        Self { qualified_name: qualified_name.into(), line: None }
    }

    #[must_use]
    pub fn statement(qualified_name: impl Into<String>, line: u32) -> Self {
        Self { qualified_name: qualified_name.into(), line: Some(line) }
    }

    /// The function-granularity identity of this location (line dropped).
    #[must_use]
    pub fn function_identity(&self) -> CodeLocation {
        CodeLocation { qualified_name: self.qualified_name.clone(), line: None }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.qualified_name),
            None => f.write_str(&self.qualified_name),
        }
    }
}

/// Timestamp in nanoseconds relative to the owning adapter's start.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}

/// Duration in nanoseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DurationNs(pub u64);

impl DurationNs {
    #[must_use]
    pub fn from_std(d: std::time::Duration) -> Self {
        Self(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

impl fmt::Display for DurationNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else {
            write!(f, "{ms:.2}ms")
        }
    }
}
