//! Central module for application-wide configuration settings.
//!
//! Settings are layered: built-in defaults, then an optional
//! `wastetrack.toml` in the working directory, then `WASTETRACK__*`
//! environment variables (double underscore separates sections, e.g.
//! `WASTETRACK__RECONCILER__RETRY_ATTEMPTS=5`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use adapters::{Accuracy, WatchOptions};

use crate::auth::retry::{Backoff, RetryPolicy};

pub const CONFIG_FILE: &str = "wastetrack.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Directory holding the persisted key-value files.
    pub storage_dir: PathBuf,
    /// Key the current session record is stored under.
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerSettings {
    /// Ceiling on the startup loading state.
    pub init_timeout_ms: u64,
    pub retry_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff: BackoffKind,
    /// Cap for exponential backoff.
    pub retry_max_interval_ms: u64,
    /// Safety-net poll while nobody is known to be signed in.
    pub poll_interval_ms: u64,
}

impl ReconcilerSettings {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.retry_interval_ms);
        let backoff = match self.retry_backoff {
            BackoffKind::Fixed => Backoff::Fixed(interval),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: interval,
                max: Duration::from_millis(self.retry_max_interval_ms),
            },
        };
        RetryPolicy::new(self.retry_attempts, backoff)
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            init_timeout_ms: 10_000,
            retry_interval_ms: 500,
            retry_attempts: 10,
            retry_backoff: BackoffKind::Fixed,
            retry_max_interval_ms: 4_000,
            poll_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingSettings {
    pub accuracy: Accuracy,
    pub distance_interval_m: f64,
    pub time_interval_ms: u64,
}

impl TrackingSettings {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            accuracy: self.accuracy,
            distance_interval_m: self.distance_interval_m,
            time_interval_ms: self.time_interval_ms,
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::High,
            distance_interval_m: 10.0,
            time_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub session: SessionSettings,
    pub reconciler: ReconcilerSettings,
    pub tracking: TrackingSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Defaults, then `wastetrack.toml` (optional), then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(
                File::with_name(CONFIG_FILE)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("WASTETRACK").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with an inline TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let reconciler = ReconcilerSettings::default();
        let tracking = TrackingSettings::default();
        Config::builder()
            .set_default("session.storage_dir", ".wastetrack")?
            .set_default("session.key", "providerSession")?
            .set_default("reconciler.init_timeout_ms", reconciler.init_timeout_ms as i64)?
            .set_default("reconciler.retry_interval_ms", reconciler.retry_interval_ms as i64)?
            .set_default("reconciler.retry_attempts", reconciler.retry_attempts as i64)?
            .set_default("reconciler.retry_backoff", "fixed")?
            .set_default(
                "reconciler.retry_max_interval_ms",
                reconciler.retry_max_interval_ms as i64,
            )?
            .set_default("reconciler.poll_interval_ms", reconciler.poll_interval_ms as i64)?
            .set_default("tracking.accuracy", "high")?
            .set_default("tracking.distance_interval_m", tracking.distance_interval_m)?
            .set_default("tracking.time_interval_ms", tracking.time_interval_ms as i64)?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionSettings {
                storage_dir: PathBuf::from(".wastetrack"),
                key: "providerSession".to_string(),
            },
            reconciler: ReconcilerSettings::default(),
            tracking: TrackingSettings::default(),
            log: LogSettings {
                filter: "info".to_string(),
                json: false,
            },
        }
    }
}
