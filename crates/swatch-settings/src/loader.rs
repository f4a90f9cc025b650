//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SwatchSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `SWATCH_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use swatch_core::TrackerScope;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::SwatchSettings;

/// Resolve the path to the settings file (`~/.swatch/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".swatch").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SwatchSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SwatchSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<SwatchSettings> {
    let defaults = serde_json::to_value(SwatchSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &SwatchSettings) -> Result<()> {
    if settings.push.interval_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "push.intervalMs must be greater than zero".into(),
        ));
    }
    if settings.server.max_connections == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxConnections must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Apply `SWATCH_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut SwatchSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_overrides(settings: &mut SwatchSettings, lookup: impl Fn(&str) -> Option<String>) {
    let vars = EnvLookup(lookup);

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = vars.string("SWATCH_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = vars.parsed("SWATCH_PORT", |s| parse_u16_range(s, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = vars.parsed("SWATCH_MAX_CONNECTIONS", |s| parse_usize_range(s, 1, 100_000)) {
        settings.server.max_connections = v;
    }
    if let Some(v) = vars.parsed("SWATCH_SHUTDOWN_TIMEOUT_SECS", |s| parse_u64_range(s, 0, 3600)) {
        settings.server.shutdown_timeout_secs = v;
    }

    // ── Push ────────────────────────────────────────────────────────
    if let Some(v) = vars.parsed("SWATCH_PUSH_INTERVAL_MS", |s| parse_u64_range(s, 1, 86_400_000)) {
        settings.push.interval_ms = v;
    }
    if let Some(v) = vars.parsed("SWATCH_TRACKER_SCOPE", parse_tracker_scope) {
        settings.push.tracker_scope = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = vars.string("SWATCH_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = vars.parsed("SWATCH_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
}

struct EnvLookup<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvLookup<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a tracker scope name (`per_session`/`per-session` or `shared`).
pub fn parse_tracker_scope(val: &str) -> Option<TrackerScope> {
    match val.to_lowercase().replace('-', "_").as_str() {
        "per_session" => Some(TrackerScope::PerSession),
        "shared" => Some(TrackerScope::Shared),
        _ => None,
    }
}
