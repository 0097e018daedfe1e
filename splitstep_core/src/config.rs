//! Configuration file support for Splitstep.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/splitstep/config.toml`.

use crate::{Error, ExerciseLibrary, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

/// Countdown configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Length of one countdown "second" in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

impl TimerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Exercise library configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LibraryConfig {
    /// Extra exercise definitions merged over the built-ins
    #[serde(default)]
    pub exercises_file: Option<PathBuf>,
}

fn default_tick_millis() -> u64 {
    1000
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME").map_err(|_| {
                    Error::Config("HOME environment variable not set".to_string())
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("splitstep").join("config.toml"))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.timer.tick_millis == 0 {
            return Err(Error::Config("timer.tick_millis must be at least 1".into()));
        }
        Ok(())
    }

    /// Built-in exercises plus any from `library.exercises_file`
    pub fn exercise_library(&self) -> Result<ExerciseLibrary> {
        let mut library = crate::catalog::get_default_library().clone();
        if let Some(ref path) = self.library.exercises_file {
            library.merge(ExerciseLibrary::load_from(path)?);
        }
        Ok(library)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
