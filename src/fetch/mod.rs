//! Attachment fetching.
//!
//! One [`AttachmentSource::fetch`] call resolves one attachment id into its
//! bytes, declared media type and optional filename hint. Every failure is a
//! [`FetchError`] the bundle builder may skip; a failed attachment never aborts
//! the run.
//!
//! # Example
//!
//! ```no_run
//! use bundler_core::fetch::{AttachmentSource, HttpFetcher};
//! use bundler_core::host::{AccessGrant, AttachmentId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new()?;
//! let grant = AccessGrant::query_token("https://docs.example.com/api/docs/abc", "token");
//! let asset = fetcher.fetch(AttachmentId(12), &grant).await?;
//! println!("{} bytes, type {:?}", asset.bytes.len(), asset.media_type);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod headers;
mod retry;

pub use client::{HttpFetcher, redact_url};
pub use error::FetchError;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};

use async_trait::async_trait;

use crate::host::{AccessGrant, AttachmentId};

/// Connect timeout for attachment downloads.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall request timeout for attachment downloads.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Raw result of resolving one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    /// Body bytes as served.
    pub bytes: Vec<u8>,
    /// Declared media type, lowercased and without parameters.
    pub media_type: Option<String>,
    /// Filename announced by the server, if any.
    pub filename_hint: Option<String>,
}

impl FetchedAsset {
    /// Creates an asset.
    #[must_use]
    pub fn new(bytes: Vec<u8>, media_type: Option<&str>, filename_hint: Option<&str>) -> Self {
        Self {
            bytes,
            media_type: media_type.and_then(headers::media_type_of),
            filename_hint: filename_hint.map(ToString::to_string),
        }
    }
}

/// Resolves attachment ids into bytes.
///
/// # Object Safety
///
/// Uses `async_trait` so builders can hold `Box<dyn AttachmentSource>` and
/// tests can substitute in-memory sources.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Fetches one attachment.
    async fn fetch(&self, id: AttachmentId, grant: &AccessGrant)
    -> Result<FetchedAsset, FetchError>;
}

#[async_trait]
impl<S: AttachmentSource + ?Sized> AttachmentSource for std::sync::Arc<S> {
    async fn fetch(
        &self,
        id: AttachmentId,
        grant: &AccessGrant,
    ) -> Result<FetchedAsset, FetchError> {
        (**self).fetch(id, grant).await
    }
}

#[async_trait]
impl<S: AttachmentSource + ?Sized> AttachmentSource for Box<S> {
    async fn fetch(
        &self,
        id: AttachmentId,
        grant: &AccessGrant,
    ) -> Result<FetchedAsset, FetchError> {
        (**self).fetch(id, grant).await
    }
}
