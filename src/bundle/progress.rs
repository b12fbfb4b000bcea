//! Progress events emitted while a bundle is built.

use super::BundleStatus;

/// What happened to one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Added with its original bytes.
    Added,
    /// Converted to PDF, then added.
    Converted,
    /// Fetch failed; not in the archive.
    Skipped,
}

/// One step of a bundling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The run started with `total` attachments.
    Started {
        /// Attachments referenced by the mapping.
        total: usize,
    },
    /// One attachment was attempted. `done` counts processed plus skipped.
    Attempted {
        /// Attachments attempted so far.
        done: usize,
        /// Attachments referenced by the mapping.
        total: usize,
        /// Result of this attempt.
        outcome: AttemptOutcome,
    },
    /// The archive is being serialized.
    Archiving {
        /// Entries written to the archive.
        files: usize,
    },
    /// The run reached a terminal status.
    Finished {
        /// Terminal status.
        status: BundleStatus,
    },
}

/// Observer of [`ProgressEvent`]s.
///
/// Closures taking `&ProgressEvent` implement it directly.
pub trait ProgressSink: Send + Sync {
    /// Receives one event. Must not block.
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event);
    }
}

/// Sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}
