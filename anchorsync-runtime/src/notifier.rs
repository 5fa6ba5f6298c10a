use std::sync::Mutex;

use anchorsync_core::Notifier;

/// Writes every notification to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, subtitle: &str) {
        tracing::info!(title, subtitle, "notification");
    }
}

/// Keeps every notification in order, for tests and the simulator's summary.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(t, _)| t == title)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, subtitle: &str) {
        tracing::debug!(title, subtitle, "notification");
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((title.to_string(), subtitle.to_string()));
    }
}
