//! Import log broadcasting.
//!
//! Every log line goes to stderr and to a broadcast channel, so a report
//! layer (or a test) can follow a run as it happens.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Identifier of the import entry this line is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), entry: None }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), entry: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), entry: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), entry: None }
    }

    pub fn for_entry(mut self, identifier: impl Into<String>) -> Self {
        self.entry = Some(identifier.into());
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to stderr and all subscribers
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "  ✓",
            LogLevel::Warning => "  ⚠",
            LogLevel::Error => "  ✗",
        };
        match entry.entry {
            Some(ref id) => eprintln!("{} [{}] {}", prefix, id, entry.message),
            None => eprintln!("{} {}", prefix, entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_for(entry: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg).for_entry(entry));
}

pub fn log_success_for(entry: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg).for_entry(entry));
}

pub fn log_warning_for(entry: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg).for_entry(entry));
}

pub fn log_error_for(entry: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg).for_entry(entry));
}
