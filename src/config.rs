// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Context, Error, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Shift alarms forward when recurrence moves a due date.
    #[serde(default = "default_true")]
    pub reschedule_alarms: bool,

    /// One of off, error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Completion anchor applied when a preset is picked for a task that had no rule.
    #[serde(default)]
    pub default_repeat_after_completion: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reschedule_alarms: true,
            log_level: default_log_level(),
            default_repeat_after_completion: false,
        }
    }
}

impl Config {
    /// Load the configuration from disk. Missing or malformed files are errors.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;
        let contents =
            fs::read_to_string(&path).with_context(|| format!("Cannot read {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Cannot parse {:?}", path))
    }

    /// Like [`Config::load`], but a config file that does not exist yet
    /// yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn is_missing_config_error(err: &Error) -> bool {
        err.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
        })
    }

    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)
        })
    }

    /// Unknown level names fall back to `Info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
