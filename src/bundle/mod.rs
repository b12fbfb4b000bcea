//! Bundle building: fetch, normalize and name every attachment of a
//! mapping, then serialize the archive.
//!
//! # Ordering
//!
//! Columns are walked in mapping order and attachments in cell order. With
//! `concurrency > 1` fetches run ahead through an order-preserving buffered
//! stream, so names, archive contents and progress events are identical for
//! every concurrency value.
//!
//! # Example
//!
//! ```no_run
//! use bundler_core::bundle::{BundleBuilder, NoopProgress};
//! use bundler_core::fetch::HttpFetcher;
//! use bundler_core::host::{AccessGrant, ColumnSlot, ResolvedMapping, StaticAccess, AttachmentId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = BundleBuilder::new(HttpFetcher::new()?);
//! let mapping = ResolvedMapping::new(
//!     vec![ColumnSlot::new("Contrat", vec![AttachmentId(12)])],
//!     Some("Dupont".to_string()),
//! );
//! let access = StaticAccess::new(AccessGrant::query_token("https://h/api/docs/d", "t"));
//! let result = builder.build(&mapping, &access, &NoopProgress).await?;
//! println!("{:?}: {} file(s)", result.status, result.processed);
//! # Ok(())
//! # }
//! ```

mod error;
mod progress;

pub use error::BundleError;
pub use progress::{AttemptOutcome, NoopProgress, ProgressEvent, ProgressSink};

use std::pin::pin;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, instrument, warn};

use crate::archive::ArchiveEmitter;
use crate::fetch::{AttachmentSource, FetchError};
use crate::host::{AccessGrant, AccessProvider, AttachmentId, Delivery, ResolvedMapping};
use crate::naming::{EntryName, NamingPolicy, UniqueNames};
use crate::normalize::{NormalizedAsset, Normalizer};

/// Default number of attachments fetched ahead.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound for fetch read-ahead.
pub const MAX_CONCURRENCY: usize = 16;

/// One attachment reference, positioned inside the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Host attachment id.
    pub id: AttachmentId,
    /// 0-based slot index.
    pub column_index: usize,
    /// 0-based position inside the cell.
    pub position: usize,
    /// Real column name of the slot.
    pub column_name: String,
    /// Whether the cell holds more than one attachment.
    pub cell_has_multiple: bool,
}

/// Flattens a mapping into references, in mapping then cell order.
#[must_use]
pub fn attachment_refs(mapping: &ResolvedMapping) -> Vec<AttachmentRef> {
    mapping
        .slots
        .iter()
        .enumerate()
        .flat_map(|(column_index, slot)| {
            let cell_has_multiple = slot.attachments.len() > 1;
            slot.attachments
                .iter()
                .enumerate()
                .map(move |(position, id)| AttachmentRef {
                    id: *id,
                    column_index,
                    position,
                    column_name: slot.column_name.clone(),
                    cell_has_multiple,
                })
        })
        .collect()
}

/// A file ready for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAsset {
    /// Entry name, unique within the archive.
    pub filename: String,
    /// Entry content.
    pub bytes: Vec<u8>,
}

impl NamedAsset {
    /// Creates a named asset.
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Terminal status of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    /// Every attachment made it into the archive.
    Success,
    /// Some attachments were skipped, at least one made it.
    PartialSuccess,
    /// The mapping references no attachment.
    NoFilesFound,
    /// Attachments were referenced but none could be fetched.
    Failed,
}

impl BundleStatus {
    /// Derives the status from the run counters.
    #[must_use]
    pub fn from_counts(total: usize, processed: usize) -> Self {
        match (total, processed) {
            (0, _) => Self::NoFilesFound,
            (_, 0) => Self::Failed,
            (t, p) if p < t => Self::PartialSuccess,
            _ => Self::Success,
        }
    }

    /// True when an archive exists for delivery.
    #[must_use]
    pub fn has_archive(self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct BundleResult {
    /// Terminal status.
    pub status: BundleStatus,
    /// Attachments referenced by the mapping.
    pub total: usize,
    /// Attachments placed in the archive.
    pub processed: usize,
    /// Attachments whose fetch failed.
    pub skipped: usize,
    /// Processed attachments converted to PDF.
    pub converted: usize,
    /// Archive base name, without `.zip`.
    pub archive_name: String,
    /// Archive entries, in order.
    pub assets: Vec<NamedAsset>,
    /// Serialized archive. Taken by [`BundleBuilder::build_and_deliver`].
    pub archive: Option<Vec<u8>>,
    /// Where the archive was delivered, once it was.
    pub delivered_to: Option<String>,
}

impl BundleResult {
    fn empty(archive_name: String) -> Self {
        Self {
            status: BundleStatus::NoFilesFound,
            total: 0,
            processed: 0,
            skipped: 0,
            converted: 0,
            archive_name,
            assets: Vec::new(),
            archive: None,
            delivered_to: None,
        }
    }

    /// Delivered filename, `{archive_name}.zip`.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.archive_name)
    }
}

/// Builds one archive per run from a resolved mapping.
#[derive(Debug, Clone)]
pub struct BundleBuilder<S> {
    source: S,
    normalizer: Normalizer,
    naming: NamingPolicy,
    emitter: ArchiveEmitter,
    concurrency: usize,
}

impl<S: AttachmentSource> BundleBuilder<S> {
    /// Creates a builder with default normalization and naming.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            normalizer: Normalizer::default(),
            naming: NamingPolicy::default(),
            emitter: ArchiveEmitter::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Replaces the normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replaces the naming policy.
    #[must_use]
    pub fn with_naming_policy(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    /// Sets fetch read-ahead, clamped to `1..=16`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Returns the naming policy.
    #[must_use]
    pub fn naming_policy(&self) -> &NamingPolicy {
        &self.naming
    }

    /// Runs fetch, normalize and naming for every attachment, then archives.
    ///
    /// An empty mapping completes as [`BundleStatus::NoFilesFound`] without
    /// asking for access. Skipped attachments never abort the run.
    ///
    /// # Errors
    ///
    /// [`BundleError::Access`] when no grant can be obtained,
    /// [`BundleError::Archive`] when serialization fails.
    #[instrument(skip_all, fields(slots = mapping.slots.len(), concurrency = self.concurrency))]
    pub async fn build(
        &self,
        mapping: &ResolvedMapping,
        access: &dyn AccessProvider,
        progress: &dyn ProgressSink,
    ) -> Result<BundleResult, BundleError> {
        let archive_name = self.naming.archive_name(mapping.identity.as_deref());
        let refs = attachment_refs(mapping);
        let total = refs.len();
        let mut result = BundleResult::empty(archive_name);
        result.total = total;

        if total == 0 {
            info!("no attachments referenced");
            progress.on_event(&ProgressEvent::Finished {
                status: BundleStatus::NoFilesFound,
            });
            return Ok(result);
        }

        progress.on_event(&ProgressEvent::Started { total });
        let grant = access.access_grant().await.map_err(BundleError::Access)?;
        info!(total, archive = %result.archive_name, "bundling attachments");

        let mut names = UniqueNames::with_separator(self.naming.separator());
        let mut attempts = pin!(
            stream::iter(&refs)
                .map(|reference| self.attempt(reference, &grant))
                .buffered(self.concurrency)
        );

        while let Some((reference, attempt)) = attempts.next().await {
            let outcome = match attempt {
                Ok(normalized) => {
                    let name = self.naming.entry_name(&EntryName {
                        column_name: &reference.column_name,
                        identity: mapping.identity.as_deref(),
                        column_index: reference.column_index,
                        position: reference.position,
                        cell_has_multiple: reference.cell_has_multiple,
                        extension: &normalized.extension,
                        original_name: normalized.filename_hint.as_deref(),
                    });
                    let filename = names.claim(name);
                    result.processed += 1;
                    if normalized.converted {
                        result.converted += 1;
                    }
                    result.assets.push(NamedAsset::new(filename, normalized.bytes));
                    if normalized.converted {
                        AttemptOutcome::Converted
                    } else {
                        AttemptOutcome::Added
                    }
                }
                Err(error) => {
                    warn!(
                        attachment = %reference.id,
                        column = %reference.column_name,
                        error = %error,
                        "attachment skipped"
                    );
                    result.skipped += 1;
                    AttemptOutcome::Skipped
                }
            };
            progress.on_event(&ProgressEvent::Attempted {
                done: result.processed + result.skipped,
                total,
                outcome,
            });
        }

        result.status = BundleStatus::from_counts(total, result.processed);
        if result.status.has_archive() {
            progress.on_event(&ProgressEvent::Archiving {
                files: result.assets.len(),
            });
            result.archive = Some(self.emitter.emit(&result.assets)?);
        }

        info!(
            status = ?result.status,
            processed = result.processed,
            skipped = result.skipped,
            converted = result.converted,
            "bundle built"
        );
        progress.on_event(&ProgressEvent::Finished {
            status: result.status,
        });
        Ok(result)
    }

    /// Builds, then hands the archive to `delivery` when one exists.
    ///
    /// The archive bytes move into the delivery; `delivered_to` records the
    /// location. `NoFilesFound` and `Failed` deliver nothing.
    ///
    /// # Errors
    ///
    /// Everything [`build`](Self::build) returns, plus
    /// [`BundleError::Delivery`].
    pub async fn build_and_deliver(
        &self,
        mapping: &ResolvedMapping,
        access: &dyn AccessProvider,
        delivery: &dyn Delivery,
        progress: &dyn ProgressSink,
    ) -> Result<BundleResult, BundleError> {
        let mut result = self.build(mapping, access, progress).await?;
        if let Some(bytes) = result.archive.take() {
            let location = delivery
                .deliver(&result.archive_file_name(), bytes)
                .await
                .map_err(BundleError::Delivery)?;
            info!(location = %location, "archive delivered");
            result.delivered_to = Some(location);
        }
        Ok(result)
    }

    async fn attempt<'r>(
        &self,
        reference: &'r AttachmentRef,
        grant: &AccessGrant,
    ) -> (&'r AttachmentRef, Result<NormalizedAsset, FetchError>) {
        let fetched = match self.source.fetch(reference.id, grant).await {
            Ok(asset) => asset,
            Err(error) => return (reference, Err(error)),
        };
        (reference, Ok(self.normalizer.normalize(fetched).await))
    }
}
