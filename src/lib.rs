//! Attachment Bundler Core Library
//!
//! Turns the attachments referenced by one spreadsheet record into a single
//! ZIP archive: every attachment is fetched, raster images are converted to
//! one-page PDFs, entries get deterministic names derived from their column
//! and the record's identity value, and the archive is handed to a delivery
//! collaborator.
//!
//! # Architecture
//!
//! - [`naming`] - Entry and archive naming policy
//! - [`normalize`] - Image-to-PDF conversion and extension inference
//! - [`fetch`] - HTTP attachment fetching with retry
//! - [`bundle`] - Orchestration of one bundling run
//! - [`archive`] - ZIP serialization
//! - [`host`] - Records, widget bindings, access grants and delivery
//! - [`controller`] - Single-flight state machine driving the builder
//! - [`status`] - User-facing status texts

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod bundle;
pub mod controller;
pub mod fetch;
pub mod host;
pub mod naming;
pub mod normalize;
pub mod status;
mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveEmitter, ArchiveError};
pub use bundle::{
    BundleBuilder, BundleError, BundleResult, BundleStatus, NamedAsset, ProgressEvent,
    ProgressSink,
};
pub use controller::{BundleController, ControllerMessage, ControllerOutcome};
pub use fetch::{AttachmentSource, FetchError, FetchedAsset, HttpFetcher, RetryPolicy};
pub use host::{
    AccessGrant, AccessProvider, AttachmentId, Delivery, GristClient, Record, ResolvedMapping,
    WidgetBindings, resolve_mapping,
};
pub use naming::NamingPolicy;
pub use normalize::{NormalizePolicy, Normalizer};
pub use status::StatusMessage;
