use std::path::PathBuf;
use std::time::Duration;
use serde::Deserialize;
use crate::drivers::clock::TickInterval;
use crate::drivers::error::ConfigError;
use crate::settings::Settings;
use crate::types::{ChannelId, ConfigEvent, CHANNEL_COUNT};
/// Calibration and plot bounds for one channel.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub gain: f64,
    pub intercept: f64,
    pub axis_min: f64,
    pub axis_max: f64,
}
impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            intercept: 0.0,
            axis_min: -100.0,
            axis_max: 100.0,
        }
    }
}
impl ChannelConfig {
    pub fn with_gain(gain: f64) -> Self {
        Self {
            gain,
            ..Self::default()
        }
    }
    /// Physical value for a raw reading.
    pub fn scale(&self, raw: f64) -> f64 {
        raw * self.gain + self.intercept
    }
}
/// What the display loop has to do after a config event was applied.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigEffect {
    /// Rejected, or nothing changed.
    Unchanged,
    /// A value changed; nothing else to do.
    Updated,
    ResizeBuffers(usize),
    StartSession(PathBuf),
    StopSession,
}
/// The one mutable configuration object.
///
/// Owned by the display loop and only changed through [`ConfigState::apply`].
/// The aggregator never sees it, only the [`TickInterval`] it publishes.
pub struct ConfigState {
    channels: [ChannelConfig; CHANNEL_COUNT],
    sampling_rate_hz: f64,
    tick: TickInterval,
    display_rate_hz: f64,
    display_interval: Duration,
    display_points: usize,
    monitoring: bool,
    saving: bool,
    save_path: Option<PathBuf>,
}
impl ConfigState {
    pub fn from_settings(settings: &Settings) -> Self {
        let tick = startup_period("sampling rate", settings.sampling_rate_hz);
        Self {
            channels: settings.channels,
            sampling_rate_hz: settings.sampling_rate_hz,
            tick: TickInterval::from_seconds(tick.as_secs_f64()),
            display_rate_hz: settings.display_rate_hz,
            display_interval: startup_period("display rate", settings.display_rate_hz),
            display_points: settings.display_points,
            monitoring: true,
            saving: false,
            save_path: None,
        }
    }
    pub fn channel(&self, id: ChannelId) -> &ChannelConfig {
        &self.channels[id.index()]
    }
    pub fn channels(&self) -> &[ChannelConfig; CHANNEL_COUNT] {
        &self.channels
    }
    pub fn sampling_rate_hz(&self) -> f64 {
        self.sampling_rate_hz
    }
    /// Read-only handle for the aggregator.
    pub fn tick_interval(&self) -> TickInterval {
        self.tick.clone()
    }
    pub fn display_rate_hz(&self) -> f64 {
        self.display_rate_hz
    }
    pub fn display_interval(&self) -> Duration {
        self.display_interval
    }
    pub fn display_points(&self) -> usize {
        self.display_points
    }
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }
    pub fn is_saving(&self) -> bool {
        self.saving
    }
    pub fn save_path(&self) -> Option<&PathBuf> {
        self.save_path.as_ref()
    }
    /// Called by the display loop whenever the session closes, including when
    /// the sink could not be opened or written.
    pub fn clear_saving(&mut self) {
        self.saving = false;
    }
    /// Validates and applies exactly one change. Bad input is logged and dropped;
    /// this never fails.
    pub fn apply(&mut self, event: ConfigEvent) -> ConfigEffect {
        match self.try_apply(event) {
            Ok(effect) => effect,
            Err(err) => {
                log::warn!("ignoring config change: {err}");
                ConfigEffect::Unchanged
            }
        }
    }
    fn try_apply(&mut self, event: ConfigEvent) -> Result<ConfigEffect, ConfigError> {
        let effect = match event {
            ConfigEvent::Gain(ch, text) => {
                self.channels[ch.index()].gain = parse_number("gain", &text)?;
                ConfigEffect::Updated
            }
            ConfigEvent::Intercept(ch, text) => {
                self.channels[ch.index()].intercept = parse_number("intercept", &text)?;
                ConfigEffect::Updated
            }
            ConfigEvent::AxisMax(ch, text) => {
                self.channels[ch.index()].axis_max = parse_number("axis max", &text)?;
                ConfigEffect::Updated
            }
            ConfigEvent::AxisMin(ch, text) => {
                self.channels[ch.index()].axis_min = parse_number("axis min", &text)?;
                ConfigEffect::Updated
            }
            ConfigEvent::SamplingRate(text) => {
                let rate = parse_rate("sampling rate", &text)?;
                let period = period_for_rate("sampling rate", rate)?;
                self.sampling_rate_hz = rate;
                match period {
                    Some(period) => self.tick.store(period.as_secs_f64()),
                    None => log::warn!(
                        "sampling rate 0 has no tick interval, keeping {:.3}s",
                        self.tick.seconds()
                    ),
                }
                ConfigEffect::Updated
            }
            ConfigEvent::DisplayRate(text) => {
                let rate = parse_rate("display rate", &text)?;
                let period = period_for_rate("display rate", rate)?;
                self.display_rate_hz = rate;
                match period {
                    Some(period) => self.display_interval = period,
                    None => log::warn!(
                        "display rate 0 has no interval, keeping {:?}",
                        self.display_interval
                    ),
                }
                ConfigEffect::Updated
            }
            ConfigEvent::DisplayPoints(text) => {
                let points = parse_count("displayed points", &text)?;
                if points == self.display_points {
                    ConfigEffect::Unchanged
                } else {
                    self.display_points = points;
                    ConfigEffect::ResizeBuffers(points)
                }
            }
            ConfigEvent::StartSaving(path) => {
                if self.saving && self.save_path.as_ref() == Some(&path) {
                    ConfigEffect::Unchanged
                } else {
                    self.saving = true;
                    self.save_path = Some(path.clone());
                    ConfigEffect::StartSession(path)
                }
            }
            ConfigEvent::StopSaving => {
                if self.saving {
                    self.saving = false;
                    ConfigEffect::StopSession
                } else {
                    ConfigEffect::Unchanged
                }
            }
            ConfigEvent::StartMonitoring => {
                self.monitoring = true;
                ConfigEffect::Updated
            }
            ConfigEvent::StopMonitoring => {
                self.monitoring = false;
                ConfigEffect::Updated
            }
        };
        Ok(effect)
    }
}
/// Used when the startup settings carry a rate with no usable period.
const FALLBACK_PERIOD: Duration = Duration::from_secs(1);
/// Period for `rate_hz`, or `None` for a rate of exactly zero.
///
/// A period that does not fit a `Duration`, or rounds down to nothing, is an
/// error: the first would panic when built, the second would spin.
pub fn period_for_rate(field: &'static str, rate_hz: f64) -> Result<Option<Duration>, ConfigError> {
    if rate_hz == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .ok()
        .filter(|period| !period.is_zero())
        .map(Some)
        .ok_or(ConfigError::RateOutOfRange {
            field,
            value: rate_hz,
        })
}
fn startup_period(field: &'static str, rate_hz: f64) -> Duration {
    match period_for_rate(field, rate_hz) {
        Ok(Some(period)) => period,
        Ok(None) => {
            log::warn!("{field} 0 at startup, using {FALLBACK_PERIOD:?}");
            FALLBACK_PERIOD
        }
        Err(err) => {
            log::warn!("{err}, using {FALLBACK_PERIOD:?}");
            FALLBACK_PERIOD
        }
    }
}
fn parse_number(field: &'static str, text: &str) -> Result<f64, ConfigError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::NotANumber {
            field,
            input: text.to_owned(),
        })
}
fn parse_rate(field: &'static str, text: &str) -> Result<f64, ConfigError> {
    let value = parse_number(field, text)?;
    if value < 0.0 {
        return Err(ConfigError::InvalidRate { field, value });
    }
    Ok(value)
}
fn parse_count(field: &'static str, text: &str) -> Result<usize, ConfigError> {
    text.trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ConfigError::NotACount {
            field,
            input: text.to_owned(),
        })
}
#[cfg(test)]
mod tests {
    use super::*;
    fn state() -> ConfigState {
        ConfigState::from_settings(&Settings::default())
    }
    #[test]
    fn numeric_fields_update_per_channel() {
        let mut cfg = state();
        assert_eq!(
            cfg.apply(ConfigEvent::Gain(ChannelId::Pressure, " 2.5 ".into())),
            ConfigEffect::Updated
        );
        cfg.apply(ConfigEvent::Intercept(ChannelId::LoadCell, "-1".into()));
        cfg.apply(ConfigEvent::AxisMax(ChannelId::LoadCell, "250".into()));
        cfg.apply(ConfigEvent::AxisMin(ChannelId::Pressure, "-5e1".into()));
        assert_eq!(cfg.channel(ChannelId::Pressure).gain, 2.5);
        assert_eq!(cfg.channel(ChannelId::LoadCell).intercept, -1.0);
        assert_eq!(cfg.channel(ChannelId::LoadCell).axis_max, 250.0);
        assert_eq!(cfg.channel(ChannelId::Pressure).axis_min, -50.0);
        assert_eq!(cfg.channel(ChannelId::LoadCell).gain, 1569.15 / 110_600.0);
    }
    #[test]
    fn malformed_number_keeps_previous_value() {
        let mut cfg = state();
        cfg.apply(ConfigEvent::Gain(ChannelId::LoadCell, "3".into()));
        assert_eq!(
            cfg.apply(ConfigEvent::Gain(ChannelId::LoadCell, "3.x".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(
            cfg.apply(ConfigEvent::AxisMin(ChannelId::LoadCell, "".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(cfg.channel(ChannelId::LoadCell).gain, 3.0);
        assert_eq!(cfg.channel(ChannelId::LoadCell).axis_min, -100.0);
    }
    #[test]
    fn sampling_rate_updates_tick_interval() {
        let mut cfg = state();
        let aggregator_view = cfg.tick_interval();
        assert_eq!(aggregator_view.seconds(), 0.5);
        cfg.apply(ConfigEvent::SamplingRate("4".into()));
        assert_eq!(aggregator_view.seconds(), 0.25);
        assert_eq!(cfg.sampling_rate_hz(), 4.0);
    }
    #[test]
    fn zero_sampling_rate_keeps_last_interval() {
        let mut cfg = state();
        cfg.apply(ConfigEvent::SamplingRate("8".into()));
        assert_eq!(
            cfg.apply(ConfigEvent::SamplingRate("0".into())),
            ConfigEffect::Updated
        );
        assert_eq!(cfg.tick_interval().seconds(), 0.125);
    }
    #[test]
    fn negative_or_garbage_rate_is_ignored() {
        let mut cfg = state();
        cfg.apply(ConfigEvent::SamplingRate("-2".into()));
        cfg.apply(ConfigEvent::SamplingRate("fast".into()));
        assert_eq!(cfg.sampling_rate_hz(), 2.0);
        assert_eq!(cfg.tick_interval().seconds(), 0.5);
    }
    #[test]
    fn display_rate_follows_same_guard() {
        let mut cfg = state();
        assert_eq!(cfg.display_interval(), Duration::from_millis(200));
        cfg.apply(ConfigEvent::DisplayRate("10".into()));
        assert_eq!(cfg.display_interval(), Duration::from_millis(100));
        cfg.apply(ConfigEvent::DisplayRate("0".into()));
        assert_eq!(cfg.display_interval(), Duration::from_millis(100));
        // period too long for a Duration
        assert_eq!(
            cfg.apply(ConfigEvent::DisplayRate("1e-300".into())),
            ConfigEffect::Unchanged
        );
        // period rounds down to nothing
        assert_eq!(
            cfg.apply(ConfigEvent::DisplayRate("1e300".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(cfg.display_interval(), Duration::from_millis(100));
        assert_eq!(cfg.display_rate_hz(), 0.0);
    }
    #[test]
    fn sampling_rate_without_usable_period_is_ignored() {
        let mut cfg = state();
        cfg.apply(ConfigEvent::SamplingRate("4".into()));
        assert_eq!(
            cfg.apply(ConfigEvent::SamplingRate("1e-30".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(cfg.sampling_rate_hz(), 4.0);
        assert_eq!(cfg.tick_interval().duration(), Duration::from_millis(250));
    }
    #[test]
    fn period_for_rate_rejects_out_of_range() {
        assert_eq!(period_for_rate("rate", 0.0), Ok(None));
        assert_eq!(period_for_rate("rate", 4.0), Ok(Some(Duration::from_millis(250))));
        assert!(matches!(
            period_for_rate("rate", 1e-300),
            Err(ConfigError::RateOutOfRange { .. })
        ));
    }
    #[test]
    fn startup_rates_without_usable_period_fall_back() {
        let settings = Settings {
            sampling_rate_hz: 1e-30,
            display_rate_hz: 1e-300,
            ..Settings::default()
        };
        let cfg = ConfigState::from_settings(&settings);
        assert_eq!(cfg.tick_interval().duration(), FALLBACK_PERIOD);
        assert_eq!(cfg.display_interval(), FALLBACK_PERIOD);
    }
    #[test]
    fn display_points_must_be_positive_whole_number() {
        let mut cfg = state();
        assert_eq!(
            cfg.apply(ConfigEvent::DisplayPoints("50".into())),
            ConfigEffect::ResizeBuffers(50)
        );
        assert_eq!(
            cfg.apply(ConfigEvent::DisplayPoints("0".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(
            cfg.apply(ConfigEvent::DisplayPoints("12.5".into())),
            ConfigEffect::Unchanged
        );
        assert_eq!(cfg.display_points(), 50);
    }
    #[test]
    fn new_save_path_always_starts_a_session() {
        let mut cfg = state();
        let a = PathBuf::from("a.csv");
        let b = PathBuf::from("b.csv");
        assert_eq!(
            cfg.apply(ConfigEvent::StartSaving(a.clone())),
            ConfigEffect::StartSession(a.clone())
        );
        assert_eq!(cfg.apply(ConfigEvent::StartSaving(a.clone())), ConfigEffect::Unchanged);
        assert_eq!(
            cfg.apply(ConfigEvent::StartSaving(b.clone())),
            ConfigEffect::StartSession(b.clone())
        );
        assert_eq!(cfg.save_path(), Some(&b));
        assert_eq!(cfg.apply(ConfigEvent::StopSaving), ConfigEffect::StopSession);
        assert!(!cfg.is_saving());
        // re-selecting the same file after stopping truncates it again
        assert_eq!(
            cfg.apply(ConfigEvent::StartSaving(b.clone())),
            ConfigEffect::StartSession(b)
        );
    }
    #[test]
    fn monitoring_toggles() {
        let mut cfg = state();
        assert!(cfg.is_monitoring());
        cfg.apply(ConfigEvent::StopMonitoring);
        assert!(!cfg.is_monitoring());
        cfg.apply(ConfigEvent::StartMonitoring);
        assert!(cfg.is_monitoring());
    }
}
