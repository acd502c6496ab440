// src/settings.rs
// 启动参数：只读，不会回写。运行时的修改全部经由 GUI 事件进入 ConfigState。
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::drivers::channel::RAW_CHANNEL_CAPACITY;
use crate::drivers::config::{period_for_rate, ChannelConfig};
use crate::types::CHANNEL_COUNT;

pub const SETTINGS_FILE: &str = "digitshow.json";
pub const SETTINGS_ENV: &str = "DIGITSHOW_SETTINGS";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Simulated,
    Serial,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Where raw samples come from.
    pub backend: Backend,
    /// Serial bridge for the load-cell amplifier.
    pub load_cell_port: String,
    /// Serial bridge for the pressure ADC.
    pub pressure_port: String,
    pub baud_rate: u32,
    /// Raw counts per unit of weight after tare.
    pub reference_unit: f64,
    /// Capacity of each raw sample queue (R).
    pub raw_queue_capacity: usize,
    pub channels: [ChannelConfig; CHANNEL_COUNT],
    pub sampling_rate_hz: f64,
    pub display_rate_hz: f64,
    /// Rolling history length per channel (G).
    pub display_points: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            load_cell_port: "/dev/ttyACM0".to_owned(),
            pressure_port: "/dev/ttyACM1".to_owned(),
            baud_rate: 115_200,
            reference_unit: 1.0,
            raw_queue_capacity: RAW_CHANNEL_CAPACITY,
            channels: [
                ChannelConfig::with_gain(1569.15 / 110_600.0),
                ChannelConfig::with_gain(19.5 / 12_500.0),
            ],
            sampling_rate_hz: 2.0,
            display_rate_hz: 5.0,
            display_points: 100,
        }
    }
}

impl Settings {
    /// Loads `$DIGITSHOW_SETTINGS`, falling back to `./digitshow.json`.
    /// A missing file means defaults; a broken one is a startup error.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
        if !path.exists() {
            log::info!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings = Self::from_json(&text)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (field, rate) in [
            ("sampling_rate_hz", self.sampling_rate_hz),
            ("display_rate_hz", self.display_rate_hz),
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                bail!("{field} must be positive, got {rate}");
            }
            period_for_rate(field, rate)?;
        }
        if self.raw_queue_capacity == 0 || self.display_points == 0 {
            bail!("raw_queue_capacity and display_points must be at least 1");
        }
        if self.reference_unit == 0.0 || !self.reference_unit.is_finite() {
            bail!("reference_unit must be a non-zero number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let settings = Settings::from_json(
            r#"{"backend":"serial","pressure_port":"/dev/ttyUSB3","sampling_rate_hz":10.0}"#,
        )
        .unwrap();
        assert_eq!(settings.backend, Backend::Serial);
        assert_eq!(settings.pressure_port, "/dev/ttyUSB3");
        assert_eq!(settings.sampling_rate_hz, 10.0);
        assert_eq!(settings.display_points, 100);
    }

    #[test]
    fn zero_rates_are_rejected_at_startup() {
        assert!(Settings::from_json(r#"{"sampling_rate_hz":0.0}"#).is_err());
        assert!(Settings::from_json(r#"{"display_rate_hz":-1.0}"#).is_err());
    }

    #[test]
    fn rates_without_usable_period_are_rejected_at_startup() {
        let err = Settings::from_json(r#"{"display_rate_hz":1e-300}"#).unwrap_err();
        assert!(format!("{err:#}").contains("display_rate_hz"), "{err:#}");
        assert!(Settings::from_json(r#"{"sampling_rate_hz":1e-30}"#).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digitshow.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
