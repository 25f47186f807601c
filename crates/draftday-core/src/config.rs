//! Configuration loading and typed config structures for the draft engine.
//!
//! The canonical configuration lives in `draftday-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure and provides a loader that reads the file. Every field has
//! a default so an empty file (or no file at all) yields a working engine.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::eligibility::CategoryRule;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `draftday-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DraftdayConfig {
    /// Turn timing.
    #[serde(default)]
    pub draft: DraftTimingConfig,

    /// Fallback selection pacing.
    #[serde(default)]
    pub autopick: AutopickConfig,

    /// Category cap rule.
    #[serde(default)]
    pub eligibility: EligibilityConfig,

    /// Observer fan-out tuning.
    #[serde(default)]
    pub fanout: FanOutConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Administrative switches.
    #[serde(default)]
    pub operator: OperatorConfig,
}

impl DraftdayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure:
    /// - `DATABASE_URL` overrides `infrastructure.postgres_url`
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `OBSERVER_PORT` overrides `infrastructure.observer_port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.draft.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "draft.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.draft.default_pick_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "draft.default_pick_seconds must be at least 1".to_owned(),
            });
        }
        if self.eligibility.cap == 0 {
            return Err(ConfigError::Invalid {
                reason: "eligibility.cap must be at least 1".to_owned(),
            });
        }
        if self.fanout.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "fanout.heartbeat_interval_secs must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Turn timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftTimingConfig {
    /// Length of the "draft is about to begin" countdown.
    #[serde(default = "default_preparation_seconds")]
    pub preparation_seconds: u32,

    /// Pause between a completed pick and the next turn clock.
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,

    /// Interval between countdown ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Persist the running timer every N ticks (0 disables mirroring).
    #[serde(default = "default_persist_every_ticks")]
    pub persist_every_ticks: u32,

    /// Seconds per pick when a draft does not specify its own.
    #[serde(default = "default_pick_seconds")]
    pub default_pick_seconds: u32,
}

impl DraftTimingConfig {
    /// Interval between countdown ticks.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Pause between a completed pick and the next turn clock.
    pub const fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }
}

impl Default for DraftTimingConfig {
    fn default() -> Self {
        Self {
            preparation_seconds: default_preparation_seconds(),
            transition_delay_ms: default_transition_delay_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            persist_every_ticks: default_persist_every_ticks(),
            default_pick_seconds: default_pick_seconds(),
        }
    }
}

/// Fallback selection pacing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutopickConfig {
    /// Artificial delay before a scripted participant's pick is recorded.
    #[serde(default = "default_scripted_delay_ms")]
    pub scripted_delay_ms: u64,

    /// Seed for reproducible selection; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl AutopickConfig {
    /// Artificial delay before a scripted participant's pick is recorded.
    pub const fn scripted_delay(&self) -> Duration {
        Duration::from_millis(self.scripted_delay_ms)
    }
}

impl Default for AutopickConfig {
    fn default() -> Self {
        Self {
            scripted_delay_ms: default_scripted_delay_ms(),
            seed: None,
        }
    }
}

/// Category cap rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EligibilityConfig {
    /// Item attributes whose values, joined, form the category.
    #[serde(default = "default_category_fields")]
    pub category_fields: Vec<String>,

    /// Maximum items of one category a participant may hold.
    #[serde(default = "default_cap")]
    pub cap: u32,
}

impl EligibilityConfig {
    /// Build the rule the turn engine enforces.
    pub fn rule(&self) -> CategoryRule {
        CategoryRule::new(self.category_fields.clone(), self.cap)
    }
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            category_fields: default_category_fields(),
            cap: default_cap(),
        }
    }
}

/// Observer fan-out tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FanOutConfig {
    /// Seconds between liveness sweeps.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Per-observer outbound queue length.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl FanOutConfig {
    /// Seconds between liveness sweeps.
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Infrastructure connection strings.
///
/// Absent URLs select the in-memory store and cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` connection string.
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default)]
    pub dragonfly_url: Option<String>,

    /// Address the observer server binds to.
    #[serde(default = "default_observer_host")]
    pub observer_host: String,

    /// Observer server port.
    #[serde(default = "default_observer_port")]
    pub observer_port: u16,
}

impl InfrastructureConfig {
    /// Override infrastructure settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.postgres_url = Some(val);
        }
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = Some(val);
        }
        if let Some(port) = std::env::var("OBSERVER_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
        {
            self.observer_port = port;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            dragonfly_url: None,
            observer_host: default_observer_host(),
            observer_port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error) when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Whether JSON output was requested.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Administrative switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperatorConfig {
    /// Whether the force-expire testing hook is exposed.
    #[serde(default = "default_true")]
    pub allow_force_expire: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            allow_force_expire: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_preparation_seconds() -> u32 {
    10
}

const fn default_transition_delay_ms() -> u64 {
    1500
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_persist_every_ticks() -> u32 {
    5
}

const fn default_pick_seconds() -> u32 {
    60
}

const fn default_scripted_delay_ms() -> u64 {
    3000
}

fn default_category_fields() -> Vec<String> {
    vec!["conference".to_owned(), "division".to_owned()]
}

const fn default_cap() -> u32 {
    1
}

const fn default_heartbeat_interval_secs() -> u64 {
    30
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DraftdayConfig::default();
        assert_eq!(config.draft.preparation_seconds, 10);
        assert_eq!(config.draft.tick_interval_ms, 1000);
        assert_eq!(config.eligibility.cap, 1);
        assert_eq!(config.eligibility.category_fields.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
draft:
  preparation_seconds: 5
  transition_delay_ms: 1000
  tick_interval_ms: 500
  persist_every_ticks: 2
  default_pick_seconds: 45

autopick:
  scripted_delay_ms: 2500
  seed: 99

eligibility:
  category_fields:
    - conference
  cap: 3

fanout:
  heartbeat_interval_secs: 10
  channel_capacity: 64

infrastructure:
  observer_host: "127.0.0.1"
  observer_port: 9090

logging:
  level: "debug"
  format: "json"

operator:
  allow_force_expire: false
"#;

        let config = DraftdayConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.draft.preparation_seconds, 5);
        assert_eq!(config.draft.default_pick_seconds, 45);
        assert_eq!(config.autopick.seed, Some(99));
        assert_eq!(config.eligibility.cap, 3);
        assert_eq!(config.eligibility.category_fields, vec!["conference".to_owned()]);
        assert_eq!(config.fanout.channel_capacity, 64);
        assert!(config.logging.is_json());
        assert!(!config.operator.allow_force_expire);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "draft:\n  default_pick_seconds: 30\n";
        let config = DraftdayConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.draft.default_pick_seconds, 30);
        // Everything else uses defaults
        assert_eq!(config.draft.preparation_seconds, 10);
        assert_eq!(config.autopick.scripted_delay_ms, 3000);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = DraftdayConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn zero_cap_is_rejected() {
        let config = DraftdayConfig::parse("eligibility:\n  cap: 0\n");
        assert!(matches!(config, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("draftday-config.yaml");
        if path.exists() {
            let config = DraftdayConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
