//! Refresh event log: one JSON line per backend call made by the dashboard.
//!
//! Records what was asked for (query parameters), how it ended (`applied`,
//! `failed`, `superseded`) and how long it took. Used by `spendboard log` and
//! for diagnosing failures the user only saw as a generic message.
//!
//! Log file: `~/.spendboard/refresh-log.jsonl` unless configured otherwise.
//! Writing is best-effort; a log that cannot be written never fails a refresh.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::LoggingConfig;

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// Which backend call an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Options,
    Statistics,
    Export,
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The response was used (rendered, stored or written).
    Applied,
    /// The call failed; `message` says why.
    Failed,
    /// A newer request was issued before this one finished; result dropped.
    Superseded,
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// A single line in the refresh log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshEvent {
    pub timestamp: String,
    pub kind: EventKind,
    /// Pipeline sequence number (statistics calls only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sequence: Option<u64>,
    pub outcome: EventOutcome,
    pub latency_ms: u64,
    /// Query parameters sent (statistics calls only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub params: Option<serde_json::Value>,
    /// Error detail for failed calls.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl RefreshEvent {
    /// New event stamped with the current time.
    pub fn now(kind: EventKind, outcome: EventOutcome, latency_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            sequence: None,
            outcome,
            latency_ms,
            params: None,
            message: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Handle to the refresh log file. A disabled log ignores writes.
#[derive(Debug, Clone, Default)]
pub struct RefreshLog {
    path: Option<PathBuf>,
}

impl RefreshLog {
    /// Log writing to `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Log that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Resolve the log from the `[logging]` config section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        match &config.path {
            Some(path) => Self::at(path),
            None => Self {
                path: default_log_path(),
            },
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an event. Failures are ignored.
    pub fn record(&self, event: &RefreshEvent) {
        let _ = self.append(event);
    }

    fn append(&self, event: &RefreshEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{json}")?;

        Ok(())
    }

    /// Read every event, skipping malformed lines.
    pub fn read_all(&self) -> Vec<RefreshEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<RefreshEvent>(&line).ok())
            .collect()
    }

    /// The last `limit` events, oldest first.
    pub fn read_recent(&self, limit: usize) -> Vec<RefreshEvent> {
        let mut events = self.read_all();
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
        events
    }
}

/// Default log location: `~/.spendboard/refresh-log.jsonl`.
pub fn default_log_path() -> Option<PathBuf> {
    crate::config::data_dir().map(|dir| dir.join("refresh-log.jsonl"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
