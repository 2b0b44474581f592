//! Structured log entries read from execution engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic output.
    Debug,
    /// Normal output.
    #[default]
    Info,
    /// Warning output.
    Warn,
    /// Error output.
    Error,
}

/// One line of execution output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Stage that produced the line.
    pub stage: String,
    /// Task that produced the line.
    pub task: String,
    /// Severity.
    pub level: LogLevel,
    /// Line content without trailing newline.
    pub message: String,
}

impl LogEntry {
    /// Creates an info-level entry.
    #[must_use]
    pub fn info(
        timestamp: DateTime<Utc>,
        stage: impl Into<String>,
        task: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            stage: stage.into(),
            task: task.into(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Sets the severity.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}
