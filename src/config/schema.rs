/// Configuration schema and defaults.
///
/// Sections: `[server]`, `[logging]`, `[display]`. Every field has a built-in
/// default, so a config file only needs the keys it wants to change.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level spendboard configuration.
///
/// Maps to `~/.spendboard/config.toml` and `.spendboard.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpendboardConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

/// Where the statistics backend lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend base URL, without the `/api/...` path.
    pub base_url: String,
    /// Request timeout in milliseconds. Unset means the HTTP client default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Refresh event log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether refresh events are appended to the JSONL log.
    pub enabled: bool,
    /// Override for the log location (default `~/.spendboard/refresh-log.jsonl`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

/// Terminal rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Colored output. `NO_COLOR` in the environment also disables it.
    pub color: bool,
    /// Width of the widest bar in chart tables, in characters.
    pub bar_width: usize,
    /// Maximum rows shown per breakdown chart.
    pub max_rows: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            bar_width: 30,
            max_rows: 15,
        }
    }
}

impl SpendboardConfig {
    /// Annotated default config written by `spendboard config init`.
    pub fn default_toml() -> &'static str {
        r#"# spendboard configuration
#
# Layers (later wins): built-in defaults, ~/.spendboard/config.toml,
# ./.spendboard.toml, SPENDBOARD_* environment variables.

[server]
# Base URL of the statistics backend.
base_url = "http://127.0.0.1:5000"
# Request timeout in milliseconds. Leave unset to use the HTTP client default.
# timeout_ms = 30000

[logging]
# Append every refresh to ~/.spendboard/refresh-log.jsonl.
enabled = true
# path = "/tmp/spendboard-refresh.jsonl"

[display]
color = true
bar_width = 30
max_rows = 15
"#
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_to_defaults() {
        let parsed: SpendboardConfig = toml::from_str(SpendboardConfig::default_toml()).unwrap();
        assert_eq!(parsed, SpendboardConfig::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: SpendboardConfig = toml::from_str(
            r#"
[server]
timeout_ms = 2500
"#,
        )
        .unwrap();
        assert_eq!(parsed.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(parsed.server.timeout_ms, Some(2500));
        assert!(parsed.logging.enabled);
        assert_eq!(parsed.display.max_rows, 15);
    }

    #[test]
    fn default_serializes_without_unset_options() {
        let text = toml::to_string_pretty(&SpendboardConfig::default()).unwrap();
        assert!(!text.contains("timeout_ms"));
        assert!(text.contains("base_url"));
    }
}
