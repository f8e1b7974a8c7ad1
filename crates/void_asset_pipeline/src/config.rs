//! Pipeline configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `VOID_ASSET_ROOT`, `VOID_ANDROID_ROOT`,
//!    `VOID_ASSET_HOT_RELOAD`, `VOID_ASSET_DEBOUNCE_MS`
//! 2. Config file: `void_assets.json` in the working directory
//! 3. Built-in defaults
//!
//! # Example Config File
//!
//! ```json
//! {
//!   "asset_root": "Resources",
//!   "android_root": "../../../AndroidProject/app/src/main/assets",
//!   "hot_reload": true,
//!   "debounce_ms": 100,
//!   "compile_on_initialize": true
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Default config file looked up by [`PipelineConfig::load`]
pub const DEFAULT_CONFIG_FILE: &str = "void_assets.json";

/// Configuration for the asset pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the source asset tree
    pub asset_root: PathBuf,
    /// Root of the mirrored Android asset tree
    pub android_root: PathBuf,
    /// Start a file watcher on `initialize`
    pub hot_reload: bool,
    /// Change events for one path closer than this are coalesced
    pub debounce_ms: u64,
    /// Compile missing or outdated assets during `initialize`
    pub compile_on_initialize: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("Resources"),
            android_root: PathBuf::from("../../../AndroidProject/app/src/main/assets"),
            hot_reload: true,
            debounce_ms: 100,
            compile_on_initialize: true,
        }
    }
}

impl PipelineConfig {
    /// Config rooted at `asset_root`, everything else default
    pub fn with_root(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            ..Self::default()
        }
    }

    /// Load from the default file (if present), then apply env overrides
    pub fn load() -> Self {
        let mut config = match Self::load_from_file(DEFAULT_CONFIG_FILE) {
            Ok(config) => {
                log::info!("Loaded asset pipeline config from {}", DEFAULT_CONFIG_FILE);
                config
            }
            Err(PipelineError::Io { .. }) => Self::default(),
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    /// Load from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Apply `VOID_ASSET_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(root) = var("VOID_ASSET_ROOT") {
            self.asset_root = PathBuf::from(root);
        }
        if let Some(root) = var("VOID_ANDROID_ROOT") {
            self.android_root = PathBuf::from(root);
        }
        if let Some(value) = var("VOID_ASSET_HOT_RELOAD") {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => self.hot_reload = true,
                "0" | "false" | "off" | "no" => self.hot_reload = false,
                other => log::warn!("Ignoring VOID_ASSET_HOT_RELOAD={}", other),
            }
        }
        if let Some(value) = var("VOID_ASSET_DEBOUNCE_MS") {
            match value.parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => log::warn!("Ignoring VOID_ASSET_DEBOUNCE_MS={}", value),
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = PipelineConfig::from_json(r#"{ "asset_root": "game/assets" }"#).unwrap();
        assert_eq!(config.asset_root, PathBuf::from("game/assets"));
        assert_eq!(config.debounce_ms, 100);
        assert!(config.hot_reload);
    }

    #[test]
    fn test_malformed_file() {
        assert!(matches!(
            PipelineConfig::from_json("{ asset_root: }"),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VOID_ASSET_ROOT", "/data/assets"),
            ("VOID_ASSET_HOT_RELOAD", "off"),
            ("VOID_ASSET_DEBOUNCE_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.asset_root, PathBuf::from("/data/assets"));
        assert!(!config.hot_reload);
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }
}
