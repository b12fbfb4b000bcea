//! Error types for host collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// The widget bindings cannot be resolved against the selected record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// No attachment column is bound.
    #[error("no attachment column is mapped")]
    NoAttachmentColumns,

    /// The identity/name column is not bound.
    #[error("the archive name column is not mapped")]
    IdentityUnbound,

    /// A bound column does not exist in the record.
    #[error("mapped column '{column}' does not exist in the record")]
    UnknownColumn {
        /// The missing column name.
        column: String,
    },
}

impl MappingError {
    /// Creates an unknown-column error.
    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
        }
    }
}

/// Errors raised by host collaborators (record loading, access grants, delivery).
#[derive(Debug, Error)]
pub enum HostError {
    /// Network-level failure talking to the host API.
    #[error("network error calling {url}: {source}")]
    Network {
        /// Request URL (credentials redacted).
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The host API answered with a non-success status.
    #[error("HTTP {status} calling {url}")]
    HttpStatus {
        /// Request URL (credentials redacted).
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The host API answered with a body that could not be understood.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Request URL (credentials redacted).
        url: String,
        /// What was wrong with the body.
        message: String,
    },

    /// The requested record does not exist.
    #[error("record {row_id} not found in table {table}")]
    RecordNotFound {
        /// Table id.
        table: String,
        /// Row id.
        row_id: i64,
    },

    /// A configured host URL is malformed.
    #[error("invalid host URL: {url}")]
    InvalidUrl {
        /// The malformed URL.
        url: String,
    },

    /// File system error while delivering an archive.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a record-not-found error.
    pub fn record_not_found(table: impl Into<String>, row_id: i64) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            row_id,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
