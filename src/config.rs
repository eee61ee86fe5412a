//! Layered configuration: built-in defaults, JSON file, environment.
//!
//! Every field has a default, so a missing or partial file always yields a
//! complete config. Environment variables use the `WAVEWATCH_` prefix with
//! `__` as the section separator (`WAVEWATCH_ESCALATION__COUNT=12`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::escalation::{ChannelPolicy, EscalationPolicy};
use crate::source::ConnectionConfig;
use wavewatch_types::{ScaleDirection, SeverityLevel, SeverityScale};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("failed to write configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What to do with a frame that yields no reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Carry the previous reading forward.
    ReuseLast,
    /// Skip the frame entirely; it produces no sample and no log row.
    #[default]
    Exclude,
}

/// Pixel thresholds for the wave severity scale.
///
/// The camera looks down the beach, so a *smaller* pixel row means the
/// waterline has climbed higher: thresholds descend as severity rises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveThresholds {
    pub extreme: f64,
    pub very_high: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for WaveThresholds {
    fn default() -> Self {
        Self {
            extreme: 180.0,
            very_high: 210.0,
            high: 230.0,
            medium: 250.0,
            low: 280.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub cooldown_secs: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    pub enabled: bool,
    /// Consecutive extreme readings before a tsunami escalation fires.
    pub count: u32,
    pub cooldown_secs: u64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 12,
            cooldown_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuakeSettings {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Magnitude at or above which a quake is alert-worthy.
    pub magnitude_threshold: f64,
    /// Magnitude at or above which a quake is treated as top severity.
    pub tsunami_threshold: f64,
}

impl Default for QuakeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: 300,
            magnitude_threshold: 5.0,
            tsunami_threshold: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_attempts: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub stall_window_secs: u64,
    pub retry_cooldown_secs: u64,
    /// Loop backoff when a read round produced nothing.
    pub idle_backoff_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            connect_timeout_secs: 5,
            read_timeout_secs: 2,
            stall_window_secs: 60,
            retry_cooldown_secs: 30,
            idle_backoff_ms: 200,
        }
    }
}

/// The full runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// `host:port` of the peak-reading feed; empty disables the stream.
    pub stream_url: String,
    /// Human-readable label stamped into alerts and log rows.
    pub location: String,
    pub log_path: PathBuf,
    pub thresholds: WaveThresholds,
    /// Routine alerts fire at or above this level.
    pub notify_level: SeverityLevel,
    pub gap_policy: GapPolicy,
    pub whatsapp: ChannelSettings,
    pub sms: ChannelSettings,
    pub escalation: EscalationSettings,
    pub quake: QuakeSettings,
    pub connection: ConnectionSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            location: "Pantai".to_string(),
            log_path: PathBuf::from("observations.jsonl"),
            thresholds: WaveThresholds::default(),
            notify_level: SeverityLevel::High,
            gap_policy: GapPolicy::default(),
            whatsapp: ChannelSettings::default(),
            sms: ChannelSettings::default(),
            escalation: EscalationSettings::default(),
            quake: QuakeSettings::default(),
            connection: ConnectionSettings::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from an optional JSON file with `WAVEWATCH_` env overrides
    /// layered on top. Missing file or fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let merged = config::Config::builder()
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("WAVEWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let loaded: MonitorConfig = merged.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Serialize as pretty JSON, matching the file format [`load`] reads.
    ///
    /// [`load`]: MonitorConfig::load
    pub fn export(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.export()? + "\n")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wave_scale()?;
        self.quake_scale()?;
        if self.escalation.count == 0 {
            return Err(ConfigError::Invalid(
                "escalation.count must be at least 1".to_string(),
            ));
        }
        if self.quake.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "quake.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The wave scale: a reading *below* a pixel threshold exceeds it.
    pub fn wave_scale(&self) -> Result<SeverityScale, ConfigError> {
        SeverityScale::new(
            ScaleDirection::Below,
            vec![
                (self.thresholds.extreme, SeverityLevel::Extreme),
                (self.thresholds.very_high, SeverityLevel::VeryHigh),
                (self.thresholds.high, SeverityLevel::High),
                (self.thresholds.medium, SeverityLevel::Medium),
                (self.thresholds.low, SeverityLevel::Low),
            ],
        )
        .map_err(|err| ConfigError::Invalid(format!("wave thresholds: {err}")))
    }

    /// The magnitude scale: a reading *at or above* a threshold exceeds it.
    pub fn quake_scale(&self) -> Result<SeverityScale, ConfigError> {
        if self.quake.tsunami_threshold < self.quake.magnitude_threshold {
            return Err(ConfigError::Invalid(
                "quake.tsunami_threshold must not be below quake.magnitude_threshold".to_string(),
            ));
        }
        SeverityScale::new(
            ScaleDirection::AtOrAbove,
            vec![
                (self.quake.tsunami_threshold, SeverityLevel::Extreme),
                (self.quake.magnitude_threshold, SeverityLevel::High),
            ],
        )
        .map_err(|err| ConfigError::Invalid(format!("quake thresholds: {err}")))
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            notify_level: self.notify_level,
            escalation_count: self.escalation.count,
            escalation_cooldown: Duration::from_secs(self.escalation.cooldown_secs),
            escalation_enabled: self.escalation.enabled,
            whatsapp: ChannelPolicy {
                enabled: self.whatsapp.enabled,
                cooldown: Duration::from_secs(self.whatsapp.cooldown_secs),
            },
            sms: ChannelPolicy {
                enabled: self.sms.enabled,
                cooldown: Duration::from_secs(self.sms.cooldown_secs),
            },
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            descriptor: self.stream_url.clone(),
            connect_attempts: self.connection.connect_attempts,
            connect_timeout: Duration::from_secs(self.connection.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.connection.read_timeout_secs),
            stall_window: Duration::from_secs(self.connection.stall_window_secs),
            retry_cooldown: Duration::from_secs(self.connection.retry_cooldown_secs),
        }
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.connection.idle_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.quake.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = MonitorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.thresholds.extreme, 180.0);
        assert_eq!(cfg.escalation.count, 12);
        assert_eq!(cfg.gap_policy, GapPolicy::Exclude);
        assert!(!cfg.whatsapp.enabled);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = MonitorConfig::load(Path::new("/nonexistent/wavewatch.json")).unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "stream_url": "10.0.0.5:9000",
                "escalation": {{ "enabled": true, "count": 6 }},
                "sms": {{ "enabled": true }}
            }}"#
        )
        .unwrap();
        let cfg = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(cfg.stream_url, "10.0.0.5:9000");
        assert!(cfg.escalation.enabled);
        assert_eq!(cfg.escalation.count, 6);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.escalation.cooldown_secs, 1800);
        assert!(cfg.sms.enabled);
        assert_eq!(cfg.sms.cooldown_secs, 300);
        assert!(!cfg.whatsapp.enabled);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut cfg = MonitorConfig::default();
        cfg.thresholds.extreme = 300.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_escalation_count_rejected() {
        let mut cfg = MonitorConfig::default();
        cfg.escalation.count = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tsunami_threshold_below_magnitude_rejected() {
        let mut cfg = MonitorConfig::default();
        cfg.quake.tsunami_threshold = 4.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavewatch.json");
        let mut cfg = MonitorConfig::default();
        cfg.location = "Kuta Beach".to_string();
        cfg.quake.enabled = true;
        cfg.save(&path).unwrap();

        let reloaded = MonitorConfig::load(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn test_wave_scale_classifies_descending_pixels() {
        let cfg = MonitorConfig::default();
        let scale = cfg.wave_scale().unwrap();
        assert_eq!(scale.classify(150.0), SeverityLevel::Extreme);
        assert_eq!(scale.classify(220.0), SeverityLevel::High);
        assert_eq!(scale.classify(400.0), SeverityLevel::Calm);
    }

    #[test]
    fn test_quake_scale_classifies_magnitudes() {
        let cfg = MonitorConfig::default();
        let scale = cfg.quake_scale().unwrap();
        assert_eq!(scale.classify(6.8), SeverityLevel::Extreme);
        assert_eq!(scale.classify(5.2), SeverityLevel::High);
        assert_eq!(scale.classify(3.0), SeverityLevel::Calm);
    }

    #[test]
    fn test_policy_mirrors_settings() {
        let mut cfg = MonitorConfig::default();
        cfg.whatsapp.enabled = true;
        cfg.whatsapp.cooldown_secs = 120;
        cfg.escalation.enabled = true;
        let policy = cfg.escalation_policy();
        assert!(policy.whatsapp.enabled);
        assert_eq!(policy.whatsapp.cooldown, Duration::from_secs(120));
        assert!(policy.escalation_enabled);
        assert_eq!(policy.escalation_count, 12);
    }
}
