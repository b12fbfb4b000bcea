//! Single-flight controller driving the bundle builder.
//!
//! Two inbound messages: [`ControllerMessage::RecordChanged`] updates the
//! selection and yields a preview, [`ControllerMessage::BuildRequested`]
//! runs one bundle. A build request arriving while another run is in flight
//! is ignored, never queued.
//!
//! The state lock is never held across an await. Dropping an in-flight
//! `handle` future resets the controller to idle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument};

use crate::bundle::{BundleBuilder, BundleError, BundleResult, ProgressSink};
use crate::fetch::AttachmentSource;
use crate::host::{AccessProvider, Delivery, MappingError, Record, ResolvedMapping};
use crate::status::StatusMessage;

/// Inbound messages.
#[derive(Debug, Clone)]
pub enum ControllerMessage {
    /// A record was selected; `mapping` is its resolution against the bindings.
    RecordChanged {
        /// The selected record.
        record: Record,
        /// Resolved mapping, or why it could not be resolved.
        mapping: Result<ResolvedMapping, MappingError>,
    },
    /// The user asked for the archive.
    BuildRequested,
}

/// Result of handling one message.
#[derive(Debug)]
pub enum ControllerOutcome {
    /// Selection updated; preview text for the status line.
    RecordUpdated(StatusMessage),
    /// Build request dropped because a run is in flight.
    Ignored,
    /// The run completed (whatever its terminal status).
    Finished {
        /// Everything the run produced.
        result: BundleResult,
        /// Status line text.
        status: StatusMessage,
    },
    /// The run was aborted.
    Aborted {
        /// Cause.
        error: BundleError,
        /// Status line text.
        status: StatusMessage,
    },
}

impl ControllerOutcome {
    /// Status text to show, if the outcome carries one.
    #[must_use]
    pub fn status(&self) -> Option<&StatusMessage> {
        match self {
            Self::RecordUpdated(status)
            | Self::Finished { status, .. }
            | Self::Aborted { status, .. } => Some(status),
            Self::Ignored => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
}

#[derive(Debug)]
struct Selection {
    record_id: i64,
    mapping: Result<ResolvedMapping, MappingError>,
}

#[derive(Debug)]
struct State {
    selection: Option<Selection>,
    phase: Phase,
}

/// Resets the phase to idle when the run ends or its future is dropped.
struct RunGuard<'a> {
    state: &'a Mutex<State>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).phase = Phase::Idle;
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the selection and the Idle/Running state machine.
pub struct BundleController<S> {
    builder: BundleBuilder<S>,
    access: Arc<dyn AccessProvider>,
    delivery: Arc<dyn Delivery>,
    state: Mutex<State>,
}

impl<S: AttachmentSource> BundleController<S> {
    /// Creates an idle controller with no selection.
    pub fn new(
        builder: BundleBuilder<S>,
        access: Arc<dyn AccessProvider>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            builder,
            access,
            delivery,
            state: Mutex::new(State {
                selection: None,
                phase: Phase::Idle,
            }),
        }
    }

    /// True while a run is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.state).phase == Phase::Running
    }

    /// Handles one message.
    #[instrument(skip_all)]
    pub async fn handle(
        &self,
        message: ControllerMessage,
        progress: &dyn ProgressSink,
    ) -> ControllerOutcome {
        match message {
            ControllerMessage::RecordChanged { record, mapping } => self.select(record, mapping),
            ControllerMessage::BuildRequested => self.build(progress).await,
        }
    }

    fn select(
        &self,
        record: Record,
        mapping: Result<ResolvedMapping, MappingError>,
    ) -> ControllerOutcome {
        let preview = StatusMessage::preview(mapping.as_ref().ok());
        debug!(record = record.id, preview = %preview, "record selected");
        lock(&self.state).selection = Some(Selection {
            record_id: record.id,
            mapping,
        });
        ControllerOutcome::RecordUpdated(preview)
    }

    async fn build(&self, progress: &dyn ProgressSink) -> ControllerOutcome {
        let snapshot = {
            let mut state = lock(&self.state);
            if state.phase == Phase::Running {
                debug!("build already in flight, request ignored");
                return ControllerOutcome::Ignored;
            }
            state.phase = Phase::Running;
            state
                .selection
                .as_ref()
                .map(|selection| (selection.record_id, selection.mapping.clone()))
        };
        let _guard = RunGuard { state: &self.state };

        let outcome = match snapshot {
            None => Err(BundleError::NoRecordSelected),
            Some((_, Err(mapping_error))) => Err(BundleError::MappingIncomplete(mapping_error)),
            Some((record_id, Ok(mapping))) => {
                info!(record = record_id, "build requested");
                self.builder
                    .build_and_deliver(
                        &mapping,
                        self.access.as_ref(),
                        self.delivery.as_ref(),
                        progress,
                    )
                    .await
            }
        };

        match outcome {
            Ok(result) => ControllerOutcome::Finished {
                status: StatusMessage::from_result(&result),
                result,
            },
            Err(error) => ControllerOutcome::Aborted {
                status: StatusMessage::from_error(&error),
                error,
            },
        }
    }
}
