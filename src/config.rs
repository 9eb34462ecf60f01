use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::{Action, ActionMap, DEFAULT_BINDINGS, KeyCode};
use crate::viewport::Margins;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── WindowMode ──────────────────────────────────────────────────────────────

/// How the host window is presented.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Decorated, resizable window at the configured size.
    #[default]
    Windowed,
    /// Borderless fullscreen on the current monitor.
    Borderless,
}

// ── KeyBinding ──────────────────────────────────────────────────────────────

/// One physical key → action entry. Keys use the browser `code` names
/// (`"KeyW"`, `"ArrowUp"`), which are also winit's `KeyCode` variant names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: KeyCode,
    pub action: Action,
}

fn default_bindings() -> Vec<KeyBinding> {
    DEFAULT_BINDINGS
        .iter()
        .map(|&(key, action)| KeyBinding { key, action })
        .collect()
}

// ── ClientConfig ────────────────────────────────────────────────────────────

/// Client configuration. Every field has a default, so an empty JSON object
/// is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub window_mode: WindowMode,
    pub margins: Margins,
    pub min_viewport_width: u32,
    pub min_viewport_height: u32,
    pub tick_interval_ms: u64,
    pub bindings: Vec<KeyBinding>,
    /// PNG used as the reference background; no background sync when unset.
    pub background: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            title: "jclient".into(),
            window_width: 1280,
            window_height: 920,
            window_mode: WindowMode::Windowed,
            margins: Margins::default(),
            min_viewport_width: 1,
            min_viewport_height: 1,
            tick_interval_ms: 16,
            bindings: default_bindings(),
            background: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid("window size must be positive".into()));
        }
        self.action_map().map(|_| ())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Builds the key lookup table. A key listed twice must name the same
    /// action both times.
    pub fn action_map(&self) -> Result<ActionMap, ConfigError> {
        let mut map = ActionMap::new();
        for binding in &self.bindings {
            if let Some(prev) = map.bind(binding.key, binding.action) {
                if prev != binding.action {
                    return Err(ConfigError::Invalid(format!(
                        "{:?} is bound to both {prev:?} and {:?}",
                        binding.key, binding.action
                    )));
                }
            }
        }
        Ok(map)
    }
}
