//! Where raw inputs live, where generated files go, and how many workers the
//! pipelines may use.
//!
//! Resolution order:
//! 1. an explicit TOML file (`--config`),
//! 2. `tda-datasets.toml` in the working directory,
//! 3. defaults under the platform data directory
//!    (`~/.local/share/tda-datasets/{raw,generated}` on Linux).
//!
//! `TDA_DATA_RAW`, `TDA_DATA_GENERATED` and `TDA_MAX_CPU` override whatever
//! was loaded.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_DIR: &str = "tda-datasets";
pub const CONFIG_FILE: &str = "tda-datasets.toml";
pub const DEFAULT_MAX_CPU: usize = 10;

pub const ENV_RAW_DATA_DIR: &str = "TDA_DATA_RAW";
pub const ENV_GENERATED_DATA_DIR: &str = "TDA_DATA_GENERATED";
pub const ENV_MAX_CPU: &str = "TDA_MAX_CPU";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{name}={value:?} is not a positive integer")]
    InvalidEnv { name: &'static str, value: String },

    #[error("could not determine the platform data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Downloaded / hand-placed source data.
    pub raw_data_dir: PathBuf,
    /// Output directory of the generation pipelines.
    pub generated_data_dir: PathBuf,
    /// Upper bound on pipeline worker threads.
    pub max_cpu: usize,
}

fn app_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for Config {
    fn default() -> Self {
        let base = app_data_dir();
        Config {
            raw_data_dir: base.join("raw"),
            generated_data_dir: base.join("generated"),
            max_cpu: DEFAULT_MAX_CPU,
        }
    }
}

impl Config {
    /// Parse a TOML file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load following the resolution order above, then apply environment
    /// overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                debug!("loading config from {}", path.display());
                Self::from_file(path)?
            }
            None if Path::new(CONFIG_FILE).is_file() => {
                debug!("loading config from ./{CONFIG_FILE}");
                Self::from_file(Path::new(CONFIG_FILE))?
            }
            None => {
                if dirs_next::data_dir().is_none() {
                    return Err(ConfigError::NoDataDir);
                }
                Self::default()
            }
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up through `var` (the process environment in
    /// [`Config::load`]).
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(ENV_RAW_DATA_DIR) {
            self.raw_data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var(ENV_GENERATED_DATA_DIR) {
            self.generated_data_dir = PathBuf::from(dir);
        }
        if let Some(value) = var(ENV_MAX_CPU) {
            self.max_cpu = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_MAX_CPU,
                        value,
                    })
                }
            };
        }
        Ok(self)
    }

    pub fn raw_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.raw_data_dir.join(name)
    }

    pub fn generated_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.generated_data_dir.join(name)
    }
}
