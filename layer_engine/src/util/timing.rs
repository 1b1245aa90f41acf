use std::borrow::Cow;
use std::time::Instant;

use log::{self, Level};

/// Logs the elapsed time of a scope when dropped.
pub struct ScopedTimer {
    label: Option<Cow<'static, str>>,
    level: Level,
    start: Option<Instant>,
}

impl ScopedTimer {
    pub fn with_level(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        Self {
            label: Some(label.into()),
            level,
            start: Some(Instant::now()),
        }
    }

    pub fn info(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Info)
    }

    /// Only builds the label when debug logging is on.
    pub fn debug_lazy<F>(label_gen: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if log::log_enabled!(Level::Debug) {
            Self::with_level(label_gen(), Level::Debug)
        } else {
            Self {
                label: None,
                level: Level::Debug,
                start: None,
            }
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let (Some(label), Some(start)) = (&self.label, self.start) {
            let duration = start.elapsed().as_millis();
            log::log!(self.level, "{} took {} ms", label, duration);
        }
    }
}
