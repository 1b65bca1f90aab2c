use jimaku_core::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found; set HOME")]
    HomeMissing,
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Validation(String),
    #[error("reconciler config error: {0}")]
    Reconciler(#[from] jimaku_core::error::ConfigError),
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub sessions_dir: PathBuf,
}

impl ConfigPaths {
    pub fn from_home() -> Result<Self, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::HomeMissing)?;
        Ok(Self::from_base(PathBuf::from(home).join(".jimaku")))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let config_path = base_dir.join("config.toml");
        let sessions_dir = base_dir.join("sessions");
        Self {
            base_dir,
            config_path,
            sessions_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub reconciler: ReconcilerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write finalized lines and metadata to a session directory per run.
    pub session: bool,
    /// Prefix printed lines with their start/end timestamps.
    pub timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            reconciler: ReconcilerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            session: false,
            timestamps: true,
        }
    }
}

impl Config {
    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(&paths.config_path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        if paths.config_path.exists() {
            let config = Self::load(paths)?;
            config.validate()?;
            return Ok(config);
        }
        let config = Config::default();
        Self::write(paths, &config)?;
        Ok(config)
    }

    pub fn write(paths: &ConfigPaths, config: &Config) -> Result<(), ConfigError> {
        fs::create_dir_all(&paths.base_dir)?;
        let rendered = toml::to_string_pretty(config)?;
        fs::write(&paths.config_path, rendered)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Validation(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        self.reconciler.validate()?;
        Ok(())
    }
}
