//! Adapter configuration types.
//!
//! This module contains the configuration loaded from `tracker.toml`:
//! - `TrackerConfig` - Main configuration
//! - `RuntimeSettings` - Streaming and screen tracking settings
//! - `CalibrationSettings` - Calibration procedure and prompt styling
//! - `TimingConfig` - Bounded wait and heartbeat intervals

use crate::config::SharedConfig;
use crate::prelude::DEFAULT_HEARTBEAT;
use crate::tracker::client::TrackerError;
use crate::tracker::host::{ColorSpace, DisplayInfo};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default function for the client name
fn default_client() -> String {
    "simulation".to_string()
}

/// Default function for sampling_rate
fn default_sampling_rate() -> f64 {
    125.0
}

/// Default function for calibration_sampling_duration
fn default_calibration_sampling_duration() -> u32 {
    500
}

/// Default true helper
fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT.as_millis() as u64
}

fn default_cancel_timeout_ms() -> u64 {
    5000
}

/// Main configuration loaded from `tracker.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Name of the vendor client to load from the client registry.
    #[serde(default = "default_client")]
    pub client: String,

    /// Streaming and screen tracking settings.
    #[serde(default)]
    pub runtime_settings: RuntimeSettings,

    /// Calibration settings.
    #[serde(default)]
    pub calibration: CalibrationSettings,

    /// Wait loop timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Experiment display. Without it gaze positions are reported at the
    /// display origin and no screen board can be built.
    #[serde(default)]
    pub display: Option<DisplayInfo>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            client: default_client(),
            runtime_settings: RuntimeSettings::default(),
            calibration: CalibrationSettings::default(),
            timing: TimingConfig::default(),
            display: None,
        }
    }
}

impl TrackerConfig {
    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. `shared` passes its own validation
    /// 2. `sampling_rate` > 0
    /// 3. `poll_interval_ms` and `heartbeat_interval_ms` > 0
    /// 4. display resolution and physical size are non-zero
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.shared.validate()?;

        if self.client.trim().is_empty() {
            return Err(TrackerError::ConfigError(
                "client cannot be empty".to_string(),
            ));
        }

        if !(self.runtime_settings.sampling_rate > 0.0) {
            return Err(TrackerError::ConfigError(format!(
                "sampling_rate must be greater than 0 (got {})",
                self.runtime_settings.sampling_rate
            )));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(TrackerError::ConfigError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.timing.heartbeat_interval_ms == 0 {
            return Err(TrackerError::ConfigError(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(display) = &self.display {
            if display.pixel_resolution.contains(&0) {
                return Err(TrackerError::ConfigError(
                    "display pixel_resolution must be non-zero".to_string(),
                ));
            }
            if display.physical_width_mm <= 0.0 || display.physical_height_mm <= 0.0 {
                return Err(TrackerError::ConfigError(
                    "display physical size must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Streaming and screen tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Stream rate in Hz for every sample channel.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    /// Marker sampling duration used by GUI procedures, milliseconds.
    #[serde(default = "default_calibration_sampling_duration")]
    pub calibration_sampling_duration: u32,

    /// Track the screen through the front camera while recording.
    #[serde(default = "default_true")]
    pub enable_screen_tracking: bool,

    /// CSV marker sheet (`aruco_id,pos_x_cm,pos_y_cm,size_cm`).
    #[serde(default)]
    pub aruco_info_file: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            sampling_rate: default_sampling_rate(),
            calibration_sampling_duration: default_calibration_sampling_duration(),
            enable_screen_tracking: true,
            aruco_info_file: None,
        }
    }
}

/// Number of calibration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationType {
    /// 3 targets.
    ThreePoints,
    /// 5 targets.
    FivePoints,
    /// 9 targets.
    #[default]
    NinePoints,
    /// 13 targets.
    ThirteenPoints,
}

impl CalibrationType {
    /// Number of targets shown by the calibration GUI.
    pub const fn n_points(self) -> u32 {
        match self {
            CalibrationType::ThreePoints => 3,
            CalibrationType::FivePoints => 5,
            CalibrationType::NinePoints => 9,
            CalibrationType::ThirteenPoints => 13,
        }
    }
}

/// Calibration procedure and prompt styling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Number of targets.
    #[serde(rename = "type", default)]
    pub calibration_type: CalibrationType,

    /// Randomize target order.
    #[serde(default)]
    pub randomize: bool,

    /// Prompt background. Defaults to mid gray in the display color space.
    #[serde(default)]
    pub screen_background_color: Option<[f64; 3]>,

    /// Prompt unit type. Falls back to the display's.
    #[serde(default)]
    pub unit_type: Option<String>,

    /// Color space of the colors above. Falls back to the display's.
    #[serde(default)]
    pub color_type: Option<ColorSpace>,

    /// Prompt text color. Defaults to the complement of the background.
    #[serde(default)]
    pub text_color: Option<[f64; 3]>,
}

/// Wait loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Maximum wait for connect and camera acks.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Poll interval of bounded waits.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Calibration loop heartbeat.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Grace period after the user cancels a device procedure.
    #[serde(default = "default_cancel_timeout_ms")]
    pub cancel_timeout_ms: u64,
}

impl TimingConfig {
    /// `connect_timeout_ms` as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `poll_interval_ms` as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `heartbeat_interval_ms` as a `Duration`.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// `cancel_timeout_ms` as a `Duration`.
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            cancel_timeout_ms: default_cancel_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config.client, "simulation");
        assert_eq!(config.runtime_settings.sampling_rate, 125.0);
        assert_eq!(config.runtime_settings.calibration_sampling_duration, 500);
        assert!(config.runtime_settings.enable_screen_tracking);
        assert_eq!(config.calibration.calibration_type, CalibrationType::NinePoints);
        assert!(!config.calibration.randomize);
        assert_eq!(config.timing.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.timing.heartbeat(), DEFAULT_HEARTBEAT);
        assert_eq!(config.timing.cancel_timeout(), Duration::from_secs(5));
        assert!(config.display.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_calibration_type_names() {
        for (raw, expected, n) in [
            ("THREE_POINTS", CalibrationType::ThreePoints, 3),
            ("FIVE_POINTS", CalibrationType::FivePoints, 5),
            ("NINE_POINTS", CalibrationType::NinePoints, 9),
            ("THIRTEEN_POINTS", CalibrationType::ThirteenPoints, 13),
        ] {
            let toml = format!("[calibration]\ntype = \"{raw}\"\nrandomize = true\n");
            let config = TrackerConfig::from_toml_str(&toml).unwrap();
            assert_eq!(config.calibration.calibration_type, expected);
            assert_eq!(expected.n_points(), n);
            assert!(config.calibration.randomize);
        }
    }

    #[test]
    fn test_rejects_zero_sampling_rate() {
        let mut config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        config.runtime_settings.sampling_rate = 0.0;
        assert!(matches!(
            config.validate(),
            Err(TrackerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_zero_heartbeat() {
        let mut config = TrackerConfig::default();
        config.timing.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_degenerate_display() {
        let mut config = TrackerConfig::default();
        config.display = Some(DisplayInfo::pixels(0, 1080, 500.0, 300.0));
        assert!(config.validate().is_err());

        config.display = Some(DisplayInfo::pixels(1920, 1080, 0.0, 300.0));
        assert!(config.validate().is_err());
    }
}
