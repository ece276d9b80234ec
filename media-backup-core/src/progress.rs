//! Progress reporting helpers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{info, warn};

use crate::contract::ProgressSink;

/// Logs transfer progress through `tracing`, once per whole percent.
pub struct TracingProgress {
    label: String,
    last_percent: AtomicU8,
}

impl TracingProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_percent: AtomicU8::new(u8::MAX),
        }
    }
}

impl ProgressSink for TracingProgress {
    fn on_progress(&self, uploaded: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            ((uploaded as u128 * 100) / total as u128) as u8
        };
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            info!(file = %self.label, uploaded, total, percent, "Upload progress");
        }
    }
}

/// Deliver progress to `sink`, ignoring any panic raised inside it.
pub(crate) fn notify(sink: Option<&dyn ProgressSink>, uploaded: u64, total: u64) {
    let Some(sink) = sink else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| sink.on_progress(uploaded, total))).is_err() {
        warn!(uploaded, total, "Progress sink panicked; ignoring");
    }
}
