//! Event Sink (§4.B). A thin, non-blocking-preferred wrapper over `tracing`:
//! a single formatted line is the atomic unit, the level filter is settable
//! at runtime, and lines dropped below the configured threshold are counted
//! rather than allocated and queued.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Critical = 4,
}

impl Level {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            _ => Level::Critical,
        }
    }
}

/// Leveled, thread-safe event sink. `component` is a short tag (≤16 bytes
/// per §3's `Event` entity) identifying the emitting subsystem, e.g. `"FCC"`
/// for Flight Control or `"ENG"` for Engine Control.
#[derive(Debug)]
pub struct EventSink {
    filter: AtomicU8,
    dropped: AtomicU64,
}

impl EventSink {
    pub fn new(filter: Level) -> Self {
        Self {
            filter: AtomicU8::new(filter as u8),
            dropped: AtomicU64::new(0),
        }
    }

    /// Install the process-wide `tracing` subscriber. Call once at startup;
    /// a launcher that already installed its own subscriber may skip this.
    pub fn init_global_subscriber() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    pub fn set_level(&self, level: Level) {
        self.filter.store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.filter.load(Ordering::Relaxed))
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Emit one event. If `level` is below the configured filter, the line
    /// is dropped and counted rather than formatted.
    pub fn event(&self, level: Level, component: &str, message: &str) {
        if level < self.level() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match level {
            Level::Debug => tracing::debug!(component, "{}", message),
            Level::Info => tracing::info!(component, "{}", message),
            Level::Warn => tracing::warn!(component, "{}", message),
            Level::Error => tracing::error!(component, "{}", message),
            Level::Critical => tracing::error!(component, critical = true, "{}", message),
        }
    }

    pub fn debug(&self, component: &str, message: &str) {
        self.event(Level::Debug, component, message)
    }
    pub fn info(&self, component: &str, message: &str) {
        self.event(Level::Info, component, message)
    }
    pub fn warn(&self, component: &str, message: &str) {
        self.event(Level::Warn, component, message)
    }
    pub fn error(&self, component: &str, message: &str) {
        self.event(Level::Error, component, message)
    }
    pub fn critical(&self, component: &str, message: &str) {
        self.event(Level::Critical, component, message)
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_below_filter_are_counted_not_emitted() {
        let sink = EventSink::new(Level::Warn);
        sink.info("TEST", "should be dropped");
        sink.info("TEST", "also dropped");
        assert_eq!(sink.dropped_count(), 2);
        sink.warn("TEST", "should pass");
        assert_eq!(sink.dropped_count(), 2);
    }

    #[test]
    fn level_is_settable_at_runtime() {
        let sink = EventSink::new(Level::Error);
        sink.warn("TEST", "dropped at Error filter");
        assert_eq!(sink.dropped_count(), 1);
        sink.set_level(Level::Debug);
        sink.warn("TEST", "passes now");
        assert_eq!(sink.dropped_count(), 1);
    }
}
