//! Application-level configuration loading: match timing, clock tick and publishing targets.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::state_machine::MatchTiming;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/arena.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARENA_BACK_CONFIG_PATH";
/// Interval between two clock updates when the file does not set one.
const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timing: MatchTiming,
    tick_interval: Duration,
    publishing: PublishingConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tick_interval_ms = app_config.tick_interval.as_millis() as u64,
                        "loaded arena configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Period durations of a match.
    pub fn timing(&self) -> &MatchTiming {
        &self.timing
    }

    /// How often the match clock is advanced.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// External publishing targets.
    pub fn publishing(&self) -> &PublishingConfig {
        &self.publishing
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timing: MatchTiming::default(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            publishing: PublishingConfig::default(),
        }
    }
}

/// Where committed results are pushed once a match is scored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Match and ranking publication service.
    pub rankings: PublishTargetConfig,
    /// Match video split service.
    pub video: PublishTargetConfig,
}

/// Connection settings of a single publishing service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishTargetConfig {
    /// Whether results are pushed to this service.
    pub enabled: bool,
    /// Base URL the target paths are joined to.
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    timing: MatchTiming,
    tick_interval_ms: Option<u64>,
    #[serde(default)]
    publishing: PublishingConfig,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let tick_interval_ms = value
            .tick_interval_ms
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        Self {
            timing: value.timing,
            tick_interval: Duration::from_millis(tick_interval_ms),
            publishing: value.publishing,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
