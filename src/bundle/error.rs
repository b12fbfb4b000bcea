//! Errors that abort a bundling run.
//!
//! Per-attachment fetch failures are not here: they are counted as skipped
//! and never abort.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::host::{HostError, MappingError};

/// Reasons a run ends in `Aborted`.
#[derive(Debug, Error)]
pub enum BundleError {
    /// No record is selected.
    #[error("no record selected")]
    NoRecordSelected,

    /// The column mapping is incomplete for the selected record.
    #[error("column mapping incomplete: {0}")]
    MappingIncomplete(#[from] MappingError),

    /// Download access could not be obtained.
    #[error("could not obtain attachment access: {0}")]
    Access(#[source] HostError),

    /// The archive could not be serialized.
    #[error("archive serialization failed: {0}")]
    Archive(#[from] ArchiveError),

    /// The archive could not be delivered.
    #[error("archive delivery failed: {0}")]
    Delivery(#[source] HostError),
}

impl BundleError {
    /// True for problems the user fixes by selecting a record or mapping columns.
    #[must_use]
    pub fn is_user_configuration(&self) -> bool {
        matches!(self, Self::NoRecordSelected | Self::MappingIncomplete(_))
    }
}
