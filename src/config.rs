use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {source}")]
    Parse {
        var: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Reaper
    pub idle_threshold_secs: u64,
    pub reaper_interval_secs: u64,
    pub disconnect_timeout_secs: u64,

    // Playback
    pub default_volume_percent: u16,
    pub max_volume_percent: u16,
    pub history_capacity: usize,
    pub max_consecutive_failures: u32,
    pub count_loop_replays: bool,

    // Resolver
    pub resolve_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset. Reads a `.env` file when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            idle_threshold_secs: env_or("IDLE_THRESHOLD_SECS", 300)?,
            reaper_interval_secs: env_or("REAPER_INTERVAL_SECS", 60)?,
            disconnect_timeout_secs: env_or("DISCONNECT_TIMEOUT_SECS", 5)?,
            default_volume_percent: env_or("DEFAULT_VOLUME_PERCENT", 100)?,
            max_volume_percent: env_or("MAX_VOLUME_PERCENT", 200)?,
            history_capacity: env_or("HISTORY_CAPACITY", 50)?,
            max_consecutive_failures: env_or("MAX_CONSECUTIVE_FAILURES", 3)?,
            count_loop_replays: env_or("COUNT_LOOP_REPLAYS", false)?,
            resolve_timeout_secs: env_or("RESOLVE_TIMEOUT_SECS", 30)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks for values that would otherwise fail far from
    /// their source.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_volume_percent == 0 {
            return Err(ConfigError::Invalid(
                "max volume must be greater than 0%".into(),
            ));
        }

        if self.default_volume_percent > self.max_volume_percent {
            return Err(ConfigError::Invalid(format!(
                "default volume {}% exceeds max volume {}%",
                self.default_volume_percent, self.max_volume_percent
            )));
        }

        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history capacity must be greater than 0".into(),
            ));
        }

        // A reaper polling slower than the idle threshold lets sessions
        // sit idle for almost twice the threshold.
        if self.reaper_interval_secs > self.idle_threshold_secs {
            return Err(ConfigError::Invalid(format!(
                "reaper interval {}s exceeds idle threshold {}s",
                self.reaper_interval_secs, self.idle_threshold_secs
            )));
        }

        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "max consecutive failures must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Summary for startup logging, without anything secret.
    pub fn summary(&self) -> String {
        format!(
            "Config: idle {}s / poll {}s, history {}, vol {}..{}%, resolve timeout {}s, loop replays counted: {}",
            self.idle_threshold_secs,
            self.reaper_interval_secs,
            self.history_capacity,
            self.default_volume_percent,
            self.max_volume_percent,
            self.resolve_timeout_secs,
            self.count_loop_replays,
        )
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn default_volume(&self) -> f32 {
        f32::from(self.default_volume_percent) / 100.0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 300,
            reaper_interval_secs: 60,
            disconnect_timeout_secs: 5,
            default_volume_percent: 100,
            max_volume_percent: 200,
            history_capacity: 50,
            max_consecutive_failures: 3,
            count_loop_replays: false,
            resolve_timeout_secs: 30,
        }
    }
}

fn env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e| ConfigError::Parse {
                var,
                source: Box::new(e),
            })
        }
        _ => Ok(default),
    }
}
