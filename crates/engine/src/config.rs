//! Engine configuration loaded from a JSON file plus environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use varscope_types::HistoryLevel;
use varscope_util::{default_config_dir, expand_tilde};

use crate::value_types::DEFAULT_MAX_INLINE_TEXT_BYTES;

/// Environment variable pointing at the configuration file.
pub const CONFIG_PATH_ENV: &str = "VARSCOPE_CONFIG_PATH";

/// Environment variable overriding the configured history level.
pub const HISTORY_LEVEL_ENV: &str = "VARSCOPE_HISTORY_LEVEL";

pub const CONFIG_FILE_NAME: &str = "engine.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How much variable history is captured.
    pub history_level: HistoryLevel,
    /// Strings longer than this many UTF-16 bytes move to the blob carrier.
    pub max_inline_text_bytes: usize,
    /// When set, historic variables persist to this JSON file.
    pub history_path: Option<PathBuf>,
    /// When set, definition info documents persist to this JSON file.
    pub definition_info_path: Option<PathBuf>,
    /// Locale used by display surfaces when none is requested.
    pub default_locale: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_level: HistoryLevel::default(),
            max_inline_text_bytes: DEFAULT_MAX_INLINE_TEXT_BYTES,
            history_path: None,
            definition_info_path: None,
            default_locale: None,
        }
    }
}

impl EngineConfig {
    /// Load from `VARSCOPE_CONFIG_PATH` (or the default location) and apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(default_config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults; a malformed one is logged and ignored.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(error).with_context(|| format!("Failed to read engine config: {}", path.display())),
        };

        let mut config = match serde_json::from_str::<EngineConfig>(&content) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to parse engine config; using defaults");
                return Ok(Self::default());
            }
        };
        config.history_path = config.history_path.map(|path| expand_tilde(&path.to_string_lossy()));
        config.definition_info_path = config.definition_info_path.map(|path| expand_tilde(&path.to_string_lossy()));
        Ok(config)
    }

    /// Apply `VARSCOPE_HISTORY_LEVEL` when it holds a recognised level.
    pub fn apply_env_overrides(&mut self) {
        let Ok(raw_level) = env::var(HISTORY_LEVEL_ENV) else {
            return;
        };
        if raw_level.trim().is_empty() {
            return;
        }
        match raw_level.parse::<HistoryLevel>() {
            Ok(level) => self.history_level = level,
            Err(error) => warn!(value = %raw_level, error = %error, "Ignoring invalid history level override"),
        }
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }
    default_config_dir().join(CONFIG_FILE_NAME)
}
