use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::DEFAULT_MONITOR_INTERVAL;
use super::error::ConfigError;
use super::routines::ROUTINE_NAMES;

/// Structure representing the application configuration. Contains the event file, the
/// sort routine to activate and monitor settings.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub event_path: PathBuf,
    pub routine: String,
    pub event_size: usize,
    pub monitor_interval: f64,
    pub max_events: Option<u64>,
    pub log_path: PathBuf,
}

impl Default for Config {
    /// Generate a new Config object. The event path is invalid and must be filled in
    fn default() -> Self {
        Self {
            event_path: PathBuf::from("None"),
            routine: String::from(ROUTINE_NAMES[0]),
            event_size: 2,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            max_events: None,
            log_path: PathBuf::from("./specsort.log"),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check the fields that cannot be checked by parsing alone
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ROUTINE_NAMES.contains(&self.routine.as_str()) {
            return Err(ConfigError::UnknownRoutine(self.routine.clone()));
        }
        if self.event_size == 0 {
            return Err(ConfigError::BadEventSize);
        }
        if !(self.monitor_interval > 0.0 && self.monitor_interval.is_finite()) {
            return Err(ConfigError::BadInterval(self.monitor_interval));
        }
        Ok(())
    }

    /// Get the path to the event file, if it exists
    pub fn get_event_file(&self) -> Result<&Path, ConfigError> {
        if self.event_path.exists() {
            Ok(&self.event_path)
        } else {
            Err(ConfigError::BadFilePath(self.event_path.clone()))
        }
    }
}
