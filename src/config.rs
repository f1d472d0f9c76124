//! Client configuration
//!
//! Values come from, in order of precedence:
//! 1. Environment variables (`LANGUAGE_DETECTION_*`)
//! 2. An optional JSON configuration file
//! 3. Built-in defaults

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mirrors unused for longer than this are dropped from the worker.
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 60_000;

pub const ENV_ENABLED: &str = "LANGUAGE_DETECTION_ENABLED";
pub const ENV_IDLE_EVICTION: &str = "LANGUAGE_DETECTION_IDLE_EVICTION";
pub const ENV_IDLE_MS: &str = "LANGUAGE_DETECTION_IDLE_MS";

/// Locations handed to the worker's bootstrap host. Opaque to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerAssets {
    pub bootstrap: String,
    pub model_json: String,
    pub weights: String,
}

/// Knobs applied inside the worker when answering detection requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionSettings {
    /// Master switch checked by the service facade.
    pub enabled: bool,
    /// Texts with fewer non-whitespace chars are not classified.
    pub min_content_chars: usize,
    /// Only this many leading chars are handed to the classifier.
    pub max_content_chars: usize,
    /// Guesses below this confidence are discarded.
    pub min_confidence: f32,
    /// Upper bound on the ranked list returned by `detect_languages`.
    pub max_guesses: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_content_chars: 20,
            max_content_chars: 100_000,
            min_confidence: 0.2,
            max_guesses: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Diagnostic tag for the worker instance.
    pub label: String,
    pub assets: WorkerAssets,
    /// When false, mirrors live until their document is disposed.
    pub idle_eviction: bool,
    pub idle_threshold_ms: u64,
    pub detection: DetectionSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            label: "language-detection".to_string(),
            assets: WorkerAssets::default(),
            idle_eviction: true,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            detection: DetectionSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    /// Loads a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Builds the configuration from an optional file, then applies
    /// environment overrides.
    pub fn from_env_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides looked up by variable name. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_ENABLED) {
            match parse_bool(&value) {
                Some(enabled) => self.detection.enabled = enabled,
                None => warn!("Ignoring invalid {}='{}'", ENV_ENABLED, value),
            }
        }
        if let Some(value) = lookup(ENV_IDLE_EVICTION) {
            match parse_bool(&value) {
                Some(enabled) => self.idle_eviction = enabled,
                None => warn!("Ignoring invalid {}='{}'", ENV_IDLE_EVICTION, value),
            }
        }
        if let Some(value) = lookup(ENV_IDLE_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.idle_threshold_ms = ms,
                _ => warn!("Ignoring invalid {}='{}'", ENV_IDLE_MS, value),
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.idle_eviction);
        assert_eq!(config.idle_threshold(), Duration::from_secs(60));
        assert!(config.detection.enabled);
        assert_eq!(config.detection.max_guesses, 3);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ENABLED, "off"),
            (ENV_IDLE_EVICTION, "false"),
            (ENV_IDLE_MS, "1500"),
        ]);
        let mut config = ClientConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert!(!config.detection.enabled);
        assert!(!config.idle_eviction);
        assert_eq!(config.idle_threshold_ms, 1500);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_IDLE_EVICTION, "maybe"),
            (ENV_IDLE_MS, "0"),
        ]);
        let mut config = ClientConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert!(config.idle_eviction);
        assert_eq!(config.idle_threshold_ms, DEFAULT_IDLE_THRESHOLD_MS);
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "label": "test-worker", "idleThresholdMs": 10, "assets": {{ "weights": "w.bin" }}, "detection": {{ "maxGuesses": 5 }} }}"#
        )
        .unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.label, "test-worker");
        assert_eq!(config.idle_threshold_ms, 10);
        assert_eq!(config.assets.weights, "w.bin");
        assert_eq!(config.detection.max_guesses, 5);
        assert_eq!(config.detection.min_confidence, 0.2);
        assert!(config.idle_eviction);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ClientConfig::from_json_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
