//! Import log destinations.
//!
//! The importer writes its progress through a [`LogSink`] handed to it by the
//! caller. Which sink is used comes from configuration:
//!
//! ```text
//! screen  -> ScreenSink      (stdout, one prefixed line per entry)
//! logger  -> TracingSink     (tracing events, target "csvimport")
//! quiet   -> NullSink
//! serve   -> LogBroadcaster  (stdout + SSE subscribers)
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Target of the events emitted by [`TracingSink`].
pub const LOG_TARGET: &str = "csvimport";

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level, rendered as indentation on screen.
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Screen rendering: indentation, level prefix, message.
    pub fn render(&self) -> String {
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, self.level.prefix(), self.message)
    }
}

/// Where import progress goes.
pub trait LogSink: Send + Sync {
    fn log(&self, entry: LogEntry);

    fn info(&self, message: String) {
        self.log(LogEntry::info(message));
    }

    fn success(&self, message: String) {
        self.log(LogEntry::success(message));
    }

    fn warning(&self, message: String) {
        self.log(LogEntry::warning(message));
    }

    fn error(&self, message: String) {
        self.log(LogEntry::error(message));
    }
}

/// Prints entries to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenSink;

impl LogSink for ScreenSink {
    fn log(&self, entry: LogEntry) {
        println!("{}", entry.render());
    }
}

/// Hands entries to `tracing`. Formatting and filtering are up to the
/// installed subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, entry: LogEntry) {
        let LogEntry { level, message, indent } = entry;
        match level {
            LogLevel::Info => tracing::info!(target: LOG_TARGET, indent, "{}", message),
            LogLevel::Success => {
                tracing::info!(target: LOG_TARGET, indent, success = true, "{}", message)
            }
            LogLevel::Warning => tracing::warn!(target: LOG_TARGET, indent, "{}", message),
            LogLevel::Error => tracing::error!(target: LOG_TARGET, indent, "{}", message),
        }
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _entry: LogEntry) {}
}

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    echo: bool,
}

impl LogBroadcaster {
    /// Broadcaster that also prints every entry to stdout.
    pub fn new() -> Self {
        Self::with_echo(true)
    }

    pub fn with_echo(echo: bool) -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender, echo }
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for LogBroadcaster {
    fn log(&self, entry: LogEntry) {
        if self.echo {
            println!("{}", entry.render());
        }
        // No receivers is fine.
        let _ = self.sender.send(entry);
    }
}

/// Keeps entries in memory. Handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: std::sync::Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LogEntry::warning("Row 3 skipped").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "Row 3 skipped");
        assert_eq!(json["indent"], 1);
    }

    #[test]
    fn test_render_prefixes() {
        assert_eq!(LogEntry::info("Import Item 1").render(), "    Import Item 1");
        assert_eq!(LogEntry::success("done").with_indent(1).render(), "      ✓ done");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_emits_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingSink.warning("Row 2 has 1 columns".to_string());
            TracingSink.error("Database Error: disk full".to_string());
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "WARN");
        assert_eq!(lines[0]["target"], LOG_TARGET);
        assert_eq!(lines[0]["fields"]["message"], "Row 2 has 1 columns");
        assert_eq!(lines[1]["level"], "ERROR");
        assert_eq!(lines[1]["fields"]["message"], "Database Error: disk full");
    }

    #[test]
    fn test_broadcaster_reaches_subscribers() {
        let broadcaster = LogBroadcaster::with_echo(false);
        let mut rx = broadcaster.subscribe();

        broadcaster.info("Import Item 1".to_string());

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry, LogEntry::info("Import Item 1"));
    }

    #[test]
    fn test_broadcaster_without_subscribers() {
        LogBroadcaster::with_echo(false).error("nobody listening".to_string());
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.info("first".to_string());
        sink.warning("second".to_string());

        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(sink.entries()[1].level, LogLevel::Warning);
    }
}
