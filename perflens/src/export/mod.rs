//! Report persistence.
//!
//! A [`ProfileReport`] serializes to a flat JSON document: session metadata
//! plus one record per stat (qualified name, line, adapter kind, values).
//! Loading re-merges the records through the same deterministic merger that
//! built the report, so a round trip reproduces location identity, stat
//! values and entry ordering exactly.

pub mod text;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::LocationStat;
use crate::analysis::Recommendation;
use crate::domain::{AdapterKind, ExportError};
use crate::report::{merge, ProfileReport, SessionMeta};

/// The on-disk shape of a report: metadata plus a flat stat record list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub session: SessionMeta,
    pub stats: Vec<LocationStat>,
}

impl ReportDocument {
    #[must_use]
    pub fn from_report(report: &ProfileReport) -> Self {
        Self {
            session: report.session.clone(),
            stats: report.entries().iter().flat_map(|e| e.stats.iter().cloned()).collect(),
        }
    }

    /// Rebuild the report by re-merging the stat records.
    ///
    /// # Errors
    /// [`ExportError::InvalidDocument`] when the document lists no enabled
    /// adapters (such a report cannot have existed).
    pub fn into_report(self) -> Result<ProfileReport, ExportError> {
        let mut tables: BTreeMap<AdapterKind, Vec<LocationStat>> = BTreeMap::new();
        for stat in self.stats {
            tables.entry(stat.adapter_kind).or_default().push(stat);
        }
        merge(self.session, tables).map_err(|e| ExportError::InvalidDocument(e.to_string()))
    }
}

/// Write a report as pretty-printed JSON.
///
/// Accepts any writer, so tests can round-trip through an in-memory buffer
/// and the CLI can stream straight to a file.
///
/// # Errors
/// [`ExportError::Json`] on serialization failure.
pub fn export_report<W: Write>(report: &ProfileReport, writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &ReportDocument::from_report(report))?;
    Ok(())
}

/// Read a report back from JSON.
///
/// # Errors
/// [`ExportError::Json`] on malformed JSON, [`ExportError::InvalidDocument`]
/// on a structurally impossible report.
pub fn import_report<R: Read>(reader: R) -> Result<ProfileReport, ExportError> {
    let document: ReportDocument = serde_json::from_reader(reader)?;
    document.into_report()
}

/// Save a report to `path`.
///
/// # Errors
/// [`ExportError::Io`] / [`ExportError::Json`] on failure.
pub fn save_report(report: &ProfileReport, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    export_report(report, std::io::BufWriter::new(file))
}

/// Load a report from `path`.
///
/// # Errors
/// [`ExportError::Io`] / [`ExportError::Json`] /
/// [`ExportError::InvalidDocument`] on failure.
pub fn load_report(path: impl AsRef<Path>) -> Result<ProfileReport, ExportError> {
    let file = std::fs::File::open(path)?;
    import_report(std::io::BufReader::new(file))
}

/// Write recommendations as pretty-printed JSON.
///
/// # Errors
/// [`ExportError::Json`] on serialization failure.
pub fn export_recommendations<W: Write>(
    recommendations: &[Recommendation],
    writer: W,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, recommendations)?;
    Ok(())
}

/// Read recommendations back from JSON.
///
/// # Errors
/// [`ExportError::Json`] on malformed JSON.
pub fn import_recommendations<R: Read>(reader: R) -> Result<Vec<Recommendation>, ExportError> {
    Ok(serde_json::from_reader(reader)?)
}
