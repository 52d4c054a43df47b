use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmError, AlarmSpec};

pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 10;
pub const CONFIG_FILE_NAME: &str = "settings.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("couldn't write config file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("couldn't parse config file (it is TOML, quote every string value): {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid alarm: {0}")]
    Alarm(#[from] AlarmError),
    #[error("no alarm times configured")]
    NoAlarms,
}

/// the on disk layout, a single `[Settings]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Settings")]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub audio_file_path: PathBuf,
    pub alarm_times: AlarmTimes,
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: PathBuf,
}

/// alarm times are usually written as one comma separated string
/// but a toml array reads more naturally so both are accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlarmTimes {
    Joined(String),
    List(Vec<String>),
}

impl AlarmTimes {
    #[must_use]
    pub fn entries(&self) -> Vec<&str> {
        match self {
            Self::Joined(times) => times.split(',').map(str::trim).collect(),
            Self::List(times) => times.iter().map(|time| time.trim()).collect(),
        }
    }
}

/// validated settings, everything the scheduler needs to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub audio_file_path: PathBuf,
    pub alarms: Vec<AlarmSpec>,
    pub countdown_seconds: u32,
    pub log_file_path: PathBuf,
}

#[inline]
#[must_use]
pub const fn default_countdown_seconds() -> u32 {
    DEFAULT_COUNTDOWN_SECONDS
}

#[must_use]
pub fn default_log_file_path() -> PathBuf {
    PathBuf::from("app_log.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings {
                audio_file_path: PathBuf::from("alarm.mp3"),
                alarm_times: AlarmTimes::Joined("08:00:00, 12:00:00".to_string()),
                countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
                log_file_path: default_log_file_path(),
            },
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// if the file can't be read or isn't a valid config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&config)
    }

    /// # Errors
    /// if `config` isn't valid toml or misses a required setting
    pub fn parse(config: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config)?)
    }

    /// # Errors
    /// if the config dir can't be created or the file can't be written
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string(self)?;
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, config).map_err(write_error)
    }

    /// parses every alarm time and checks that each countdown starts on the same day
    ///
    /// # Errors
    /// on the first malformed or unusable alarm, or if there are no alarms at all
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        let settings = &self.settings;
        let alarms = settings
            .alarm_times
            .entries()
            .into_iter()
            .map(|time| {
                let alarm: AlarmSpec = time.parse()?;
                alarm.adjusted_fire_time(settings.countdown_seconds)?;
                Ok(alarm)
            })
            .collect::<Result<Vec<_>, AlarmError>>()?;
        if alarms.is_empty() {
            return Err(ConfigError::NoAlarms);
        }
        Ok(Schedule {
            audio_file_path: settings.audio_file_path.clone(),
            alarms,
            countdown_seconds: settings.countdown_seconds,
            log_file_path: settings.log_file_path.clone(),
        })
    }

    /// an explicit path wins, then `settings.toml` in the working directory,
    /// then the per user config directory
    #[must_use]
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        if let Some(path) = explicit {
            return path;
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        Self::config_path().unwrap_or(local)
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "roosty_countdown")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
