//! User-facing status texts (French, as shown by the widget).
//!
//! Only totals reach the user. Per-file errors stay in the log.

use std::fmt;

use tracing::error;

use crate::bundle::{AttemptOutcome, BundleError, BundleResult, BundleStatus, ProgressEvent};
use crate::host::ResolvedMapping;

/// Shown in the preview when the record has no identity value.
const UNNAMED_PREVIEW: &str = "sans nom";

/// Terminal or preview message for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    /// Record selected and mapping complete.
    Preview {
        /// Attachments referenced by the record.
        files: usize,
        /// Identity value as entered, or `None`.
        identity: Option<String>,
    },
    /// The widget columns are not configured.
    NotConfigured,
    /// Every attachment made it into the archive.
    Success {
        /// Files in the archive.
        files: usize,
        /// Archive base name.
        archive_name: String,
    },
    /// Some attachments were skipped.
    PartialSuccess {
        /// Files in the archive.
        files: usize,
        /// Files that could not be fetched.
        skipped: usize,
        /// Archive base name.
        archive_name: String,
    },
    /// No attachment referenced.
    NoFilesFound,
    /// No attachment could be fetched.
    Failed,
    /// A mapped column is missing.
    MappingIncomplete,
    /// No record is selected.
    NoRecordSelected,
    /// Access, archive or delivery failure.
    ArchiveError,
}

impl StatusMessage {
    /// Preview for a freshly selected record.
    #[must_use]
    pub fn preview(mapping: Option<&ResolvedMapping>) -> Self {
        match mapping {
            Some(mapping) => Self::Preview {
                files: mapping.total_attachments(),
                identity: mapping.identity.clone(),
            },
            None => Self::NotConfigured,
        }
    }

    /// Message for a completed run.
    #[must_use]
    pub fn from_result(result: &BundleResult) -> Self {
        match result.status {
            BundleStatus::Success => Self::Success {
                files: result.processed,
                archive_name: result.archive_name.clone(),
            },
            BundleStatus::PartialSuccess => Self::PartialSuccess {
                files: result.processed,
                skipped: result.skipped,
                archive_name: result.archive_name.clone(),
            },
            BundleStatus::NoFilesFound => Self::NoFilesFound,
            BundleStatus::Failed => Self::Failed,
        }
    }

    /// Message for an aborted run. Fatal causes are logged here.
    #[must_use]
    pub fn from_error(err: &BundleError) -> Self {
        match err {
            BundleError::NoRecordSelected => Self::NoRecordSelected,
            BundleError::MappingIncomplete(_) => Self::MappingIncomplete,
            BundleError::Access(_) | BundleError::Archive(_) | BundleError::Delivery(_) => {
                error!(error = %err, "bundling aborted");
                Self::ArchiveError
            }
        }
    }

    /// True for the ❌ messages.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::ArchiveError)
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview { files, identity } => write!(
                f,
                "📎 {files} fichier(s) → {}.zip",
                identity.as_deref().unwrap_or(UNNAMED_PREVIEW)
            ),
            Self::NotConfigured => {
                f.write_str("⚙️ Configurez les colonnes dans les paramètres du widget")
            }
            Self::Success {
                files,
                archive_name,
            } => write!(f, "✅ {files} fichier(s) téléchargé(s) dans {archive_name}.zip"),
            Self::PartialSuccess {
                files,
                skipped,
                archive_name,
            } => write!(
                f,
                "⚠️ {files} fichier(s) téléchargé(s) dans {archive_name}.zip, {skipped} ignoré(s)"
            ),
            Self::NoFilesFound => f.write_str("⚠️ Aucune pièce jointe à télécharger"),
            Self::Failed => f.write_str("❌ Aucun fichier n'a pu être téléchargé"),
            Self::MappingIncomplete => f.write_str("⚠️ Veuillez mapper toutes les colonnes"),
            Self::NoRecordSelected => f.write_str("⚠️ Aucun enregistrement sélectionné"),
            Self::ArchiveError => f.write_str("❌ Erreur lors de la création du ZIP"),
        }
    }
}

/// Button text for a progress event, `None` when nothing changes.
#[must_use]
pub fn progress_text(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Started { .. } => Some("Création du ZIP…".to_string()),
        ProgressEvent::Attempted {
            done,
            total,
            outcome: AttemptOutcome::Converted,
        } => Some(format!("Conversion {done}/{total}…")),
        ProgressEvent::Attempted { done, total, .. } => Some(format!("Ajout {done}/{total}…")),
        ProgressEvent::Archiving { .. } => Some("Génération du ZIP…".to_string()),
        ProgressEvent::Finished { .. } => None,
    }
}
