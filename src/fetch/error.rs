//! Error types for attachment fetching.
//!
//! URLs stored in these errors are always redacted (see
//! [`redact_url`](super::redact_url)) so that tokens never reach logs or
//! user-facing messages.

use thiserror::Error;

use crate::host::AttachmentId;

/// Errors that can occur while fetching one attachment.
///
/// All variants are skippable: the bundle builder counts the attachment as
/// skipped and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching attachment {attachment} from {url}: {source}")]
    Network {
        /// The attachment being fetched.
        attachment: AttachmentId,
        /// The redacted request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching attachment {attachment} from {url}")]
    Timeout {
        /// The attachment being fetched.
        attachment: AttachmentId,
        /// The redacted request URL.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching attachment {attachment} from {url}")]
    HttpStatus {
        /// The attachment being fetched.
        attachment: AttachmentId,
        /// The redacted request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be read to the end.
    #[error("failed reading body of attachment {attachment} from {url}: {source}")]
    Body {
        /// The attachment being fetched.
        attachment: AttachmentId,
        /// The redacted request URL.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error.
    pub fn network(attachment: AttachmentId, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            attachment,
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(attachment: AttachmentId, url: impl Into<String>) -> Self {
        Self::Timeout {
            attachment,
            url: url.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(attachment: AttachmentId, url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            attachment,
            url: url.into(),
            status,
        }
    }

    /// Creates a body read error.
    pub fn body(attachment: AttachmentId, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Body {
            attachment,
            url: url.into(),
            source,
        }
    }

    /// The attachment that failed.
    #[must_use]
    pub fn attachment(&self) -> AttachmentId {
        match self {
            Self::Network { attachment, .. }
            | Self::Timeout { attachment, .. }
            | Self::HttpStatus { attachment, .. }
            | Self::Body { attachment, .. } => *attachment,
        }
    }

    /// Whether the builder may skip this attachment and continue.
    ///
    /// Always true today; kept as a method so callers do not hard-code it.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        true
    }
}
