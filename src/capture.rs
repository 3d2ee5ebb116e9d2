//! Run-scoped log capture.
//!
//! Everything the pipeline says during a run goes through a [`RunLog`]: the
//! message is emitted through `tracing` for the operator and recorded in a
//! shared buffer that is drained into the run's report exactly once, on every
//! exit path.

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// One captured log line.
#[derive(Debug, Clone)]
pub struct CapturedLog {
    pub level: &'static str,
    pub message: String,
}

/// Shared capture target handed to every pipeline stage.
///
/// Cheap to clone; all clones feed the same buffer. Debug-level chatter is
/// emitted but not captured, so probe-by-probe noise stays out of the report.
#[derive(Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<CapturedLog>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push("notice", message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.push("warning", message);
    }

    pub fn err(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.push("err", message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        debug!("{}", message.into());
    }

    fn push(&self, level: &'static str, message: String) {
        self.entries
            .lock()
            .expect("run log lock poisoned")
            .push(CapturedLog { level, message });
    }

    /// Take everything captured so far, in insertion order.
    pub fn drain(&self) -> Vec<CapturedLog> {
        std::mem::take(&mut *self.entries.lock().expect("run log lock poisoned"))
    }
}
