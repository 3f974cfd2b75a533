/// Layered configuration.
///
/// 1. **Built-in defaults**: [`schema::SpendboardConfig::default()`]
/// 2. **User global config**: `~/.spendboard/config.toml`
/// 3. **Project local config**: `.spendboard.toml` in the current directory
/// 4. **Environment variables**: `SPENDBOARD_*` overrides (highest precedence)
///
/// File layers are merged key by key: a file that only sets
/// `server.timeout_ms` leaves every other value from the lower layers alone.
/// Unreadable or malformed files are skipped.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::SpendboardConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
pub fn load() -> SpendboardConfig {
    let mut merged = defaults_value();

    for path in [global_config_path(), project_config_path()]
        .into_iter()
        .flatten()
    {
        if let Some(layer) = load_toml_file(&path) {
            merge_tables(&mut merged, layer);
        }
    }

    // A merged tree that no longer fits the schema (wrong value type in one
    // file) falls back to defaults rather than failing the command.
    let mut config: SpendboardConfig = merged.try_into().unwrap_or_default();
    apply_env_overrides(&mut config);
    config
}

/// The built-in defaults as a TOML value tree.
fn defaults_value() -> toml::Value {
    toml::Value::try_from(SpendboardConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Read a TOML file as a raw value tree, `None` if missing or malformed.
fn load_toml_file(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Recursively merge `overlay` into `base`; overlay keys win.
fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.spendboard`, home of the global config and the refresh log.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".spendboard"))
}

fn global_config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".spendboard.toml"))
}

/// Path of the global config file, for display.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Path of the project config file, for display.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// - `SPENDBOARD_URL`: backend base URL
/// - `SPENDBOARD_TIMEOUT_MS`: request timeout (`0` clears it)
/// - `SPENDBOARD_LOG`: refresh log on/off (`1`/`true`/`yes`/`on`)
/// - `SPENDBOARD_LOG_PATH`: refresh log location
/// - `NO_COLOR`: disables colored output when set to anything
fn apply_env_overrides(config: &mut SpendboardConfig) {
    if let Ok(val) = std::env::var("SPENDBOARD_URL")
        && !val.is_empty()
    {
        config.server.base_url = val;
    }
    if let Ok(val) = std::env::var("SPENDBOARD_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.server.timeout_ms = (ms > 0).then_some(ms);
    }
    if let Ok(val) = std::env::var("SPENDBOARD_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("SPENDBOARD_LOG_PATH")
        && !val.is_empty()
    {
        config.logging.path = Some(val);
    }
    if std::env::var_os("NO_COLOR").is_some() {
        config.display.color = false;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the annotated default config to `~/.spendboard/config.toml`.
///
/// Fails if the file exists unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.spendboard/ directory")?;
    }

    fs::write(&path, SpendboardConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a dotted key (e.g. `server.base_url`) in the global config file.
///
/// Starts from the existing file, or from the defaults when there is none.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let mut root = if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        let existing: toml::Value =
            toml::from_str(&content).context("failed to parse config as TOML value")?;
        // Keys absent from the file still have to be settable.
        let mut root = defaults_value();
        merge_tables(&mut root, existing);
        root
    } else {
        defaults_value()
    };

    set_toml_value(&mut root, key, value)?;

    // Reject values that would make the whole file unloadable.
    let _: SpendboardConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML tree using a dotted key path.
///
/// The new value takes the type of the value it replaces; unknown leaves in
/// an existing section are stored as strings, except a small set of known
/// optional numeric keys.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => toml::Value::Integer(parse_integer(key, raw_value)?),
        None if OPTIONAL_INTEGER_KEYS.contains(&key) => {
            toml::Value::Integer(parse_integer(key, raw_value)?)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Keys that are integers but absent from the defaults because they are unset.
const OPTIONAL_INTEGER_KEYS: &[&str] = &["server.timeout_ms"];

fn parse_integer(key: &str, raw_value: &str) -> Result<i64> {
    raw_value
        .parse()
        .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))
}

/// Overwrite the global config with the defaults.
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// The effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
