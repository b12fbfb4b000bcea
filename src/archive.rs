//! ZIP serialization of named assets.
//!
//! Entries use Deflate at level 6 with a fixed timestamp (1980-01-01 00:00)
//! and fixed permissions, so the same input always yields the same bytes.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::{debug, instrument};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::bundle::NamedAsset;

/// Deflate level for archive entries.
pub const COMPRESSION_LEVEL: i32 = 6;

/// Errors from archive serialization.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing to archive.
    #[error("no files to archive")]
    Empty,

    /// The ZIP writer rejected an entry.
    #[error("ZIP error for entry '{entry}': {source}")]
    Zip {
        /// Entry being written, empty when finishing the archive.
        entry: String,
        /// Underlying error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Writing entry data failed.
    #[error("I/O error for entry '{entry}': {source}")]
    Io {
        /// Entry being written.
        entry: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    fn zip(entry: &str, source: zip::result::ZipError) -> Self {
        Self::Zip {
            entry: entry.to_string(),
            source,
        }
    }

    fn io(entry: &str, source: std::io::Error) -> Self {
        Self::Io {
            entry: entry.to_string(),
            source,
        }
    }
}

/// Serializes assets into one in-memory ZIP archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveEmitter;

impl ArchiveEmitter {
    /// Creates an emitter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes `assets` in order and returns the archive bytes.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Empty`] for an empty slice; [`ArchiveError::Zip`] or
    /// [`ArchiveError::Io`] when serialization fails.
    #[instrument(skip_all, fields(entries = assets.len()))]
    pub fn emit(&self, assets: &[NamedAsset]) -> Result<Vec<u8>, ArchiveError> {
        if assets.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for asset in assets {
            writer
                .start_file(asset.filename.as_str(), options)
                .map_err(|e| ArchiveError::zip(&asset.filename, e))?;
            writer
                .write_all(&asset.bytes)
                .map_err(|e| ArchiveError::io(&asset.filename, e))?;
        }
        let bytes = writer
            .finish()
            .map_err(|e| ArchiveError::zip("", e))?
            .into_inner();

        debug!(bytes = bytes.len(), "archive serialized");
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    fn assets() -> Vec<NamedAsset> {
        vec![
            NamedAsset::new("Contrat_Dupont.pdf", b"%PDF-1.4 contract".to_vec()),
            NamedAsset::new("Photo_Dupont_1.pdf", vec![0u8; 2048]),
            NamedAsset::new("Photo_Dupont_2.txt", b"notes".to_vec()),
        ]
    }

    #[test]
    fn test_emit_rejects_empty_input() {
        assert!(matches!(
            ArchiveEmitter::new().emit(&[]),
            Err(ArchiveError::Empty)
        ));
    }

    #[test]
    fn test_emit_is_deterministic() {
        let first = ArchiveEmitter::new().emit(&assets()).unwrap();
        let second = ArchiveEmitter::new().emit(&assets()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_emit_preserves_order_names_and_bytes() {
        let bytes = ArchiveEmitter::new().emit(&assets()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 3);
        let expected = assets();
        for (index, asset) in expected.iter().enumerate() {
            let mut entry = archive.by_index(index).unwrap();
            assert_eq!(entry.name(), asset.filename);
            assert_eq!(entry.compression(), CompressionMethod::Deflated);
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            assert_eq!(content, asset.bytes);
        }
    }

    #[test]
    fn test_emit_uses_fixed_timestamp() {
        let bytes = ArchiveEmitter::new().emit(&assets()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let entry = archive.by_index(0).unwrap();
        let modified = entry.last_modified();
        assert_eq!(
            (modified.year(), modified.month(), modified.day()),
            (1980, 1, 1)
        );
    }
}
