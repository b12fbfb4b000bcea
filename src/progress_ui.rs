//! Spinner rendering bundle progress events.

use std::time::Duration;

use bundler_core::bundle::{ProgressEvent, ProgressSink};
use bundler_core::status::progress_text;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress sink drawing a spinner on stderr.
///
/// A disabled sink uses a hidden bar, so events are still accepted.
pub(crate) struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    pub(crate) fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    #[cfg(test)]
    pub(crate) fn message(&self) -> String {
        self.bar.message()
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for SpinnerSink {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(text) = progress_text(event) {
            self.bar.set_message(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundler_core::bundle::{AttemptOutcome, BundleStatus};

    #[test]
    fn test_hidden_spinner_tracks_latest_text() {
        let sink = SpinnerSink::new(false);

        sink.on_event(&ProgressEvent::Started { total: 2 });
        assert_eq!(sink.message(), "Création du ZIP…");

        sink.on_event(&ProgressEvent::Attempted {
            done: 1,
            total: 2,
            outcome: AttemptOutcome::Converted,
        });
        assert_eq!(sink.message(), "Conversion 1/2…");

        sink.on_event(&ProgressEvent::Finished {
            status: BundleStatus::Success,
        });
        assert_eq!(sink.message(), "Conversion 1/2…");
        sink.finish();
    }
}
