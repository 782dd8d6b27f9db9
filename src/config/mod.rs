use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use serde_with::DurationMilliSeconds;
use serde_with::DurationSeconds;

use crate::brain::hysteresis::DEFAULT_PANIC_MULTIPLIER;
use crate::brain::pwm::{DEFAULT_MINIMUM_OFF_TIME, DEFAULT_MINIMUM_ON_TIME};
use crate::io::controls::actuator::DEFAULT_RELAY_SETTLE_TIME;
use crate::temperature::TemperatureWindow;

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct Config {
    hysteresis: HysteresisConfig,
    #[serde(default)]
    heater: OutputConfig,
    #[serde(default)]
    cooler: OutputConfig,
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(default = "default_relay_settle", rename = "relay_settle_millis")]
    relay_settle: Duration,
    #[serde(default)]
    thermometer: ThermometerConfig,
    #[serde(default)]
    hydrometer: HydrometerConfig,
    persistence: PersistenceConfig,
    #[serde(default)]
    schedule: ScheduleConfig,
    #[serde(default)]
    brewfather: Option<BrewfatherConfig>,
    #[serde(default)]
    simulation: bool,
}

fn default_relay_settle() -> Duration {
    DEFAULT_RELAY_SETTLE_TIME
}

impl Config {
    pub fn get_hysteresis(&self) -> &HysteresisConfig {
        &self.hysteresis
    }

    pub fn get_heater(&self) -> &OutputConfig {
        &self.heater
    }

    pub fn get_cooler(&self) -> &OutputConfig {
        &self.cooler
    }

    pub fn get_relay_settle_time(&self) -> Duration {
        self.relay_settle
    }

    pub fn get_thermometer(&self) -> &ThermometerConfig {
        &self.thermometer
    }

    pub fn get_hydrometer(&self) -> &HydrometerConfig {
        &self.hydrometer
    }

    pub fn get_persistence(&self) -> &PersistenceConfig {
        &self.persistence
    }

    pub fn get_schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn get_brewfather(&self) -> Option<&BrewfatherConfig> {
        self.brewfather.as_ref()
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    /// Catch the mistakes the types can't.
    pub fn validate(&self) -> Result<(), String> {
        if self.heater.enabled && self.cooler.enabled && self.heater.pin == self.cooler.pin {
            return Err(format!("Heater and cooler cannot share pin {}", self.heater.pin));
        }
        if self.hysteresis.lower.is_zero() || self.hysteresis.upper.is_zero() {
            return Err(format!("Hysteresis thresholds must be non-zero, were lower={} upper={}",
                               self.hysteresis.lower, self.hysteresis.upper));
        }
        if !(self.hysteresis.panic_multiplier > 1.0) || !self.hysteresis.panic_multiplier.is_finite() {
            return Err(format!("Panic multiplier must be greater than 1, was {}", self.hysteresis.panic_multiplier));
        }
        if self.hysteresis.profile == HysteresisProfileType::Pwm && self.cooler.enabled {
            return Err("The pwm hysteresis profile cannot drive a cooler, disable the cooler or use the naive profile".to_owned());
        }
        if self.schedule.control_period.is_zero() || self.schedule.snapshot_period.is_zero() {
            return Err("Schedule periods must be non-zero".to_owned());
        }
        Ok(())
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HysteresisProfileType {
    Naive,
    Pwm,
}

impl Default for HysteresisProfileType {
    fn default() -> Self {
        HysteresisProfileType::Naive
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct HysteresisConfig {
    lower: TemperatureWindow,
    upper: TemperatureWindow,
    #[serde(default = "default_panic_multiplier")]
    panic_multiplier: f64,
    #[serde(default)]
    profile: HysteresisProfileType,
    /// Only used by the pulse width modulated profile.
    #[serde_as(as = "DurationSeconds")]
    #[serde(default = "default_minimum_on", rename = "minimum_on_secs")]
    minimum_on: Duration,
    #[serde_as(as = "DurationSeconds")]
    #[serde(default = "default_minimum_off", rename = "minimum_off_secs")]
    minimum_off: Duration,
}

fn default_panic_multiplier() -> f64 {
    DEFAULT_PANIC_MULTIPLIER
}

fn default_minimum_on() -> Duration {
    DEFAULT_MINIMUM_ON_TIME
}

fn default_minimum_off() -> Duration {
    DEFAULT_MINIMUM_OFF_TIME
}

impl HysteresisConfig {
    pub fn new(lower: TemperatureWindow, upper: TemperatureWindow, profile: HysteresisProfileType) -> Self {
        Self {
            lower,
            upper,
            panic_multiplier: DEFAULT_PANIC_MULTIPLIER,
            profile,
            minimum_on: DEFAULT_MINIMUM_ON_TIME,
            minimum_off: DEFAULT_MINIMUM_OFF_TIME,
        }
    }

    pub fn get_lower(&self) -> &TemperatureWindow {
        &self.lower
    }

    pub fn get_upper(&self) -> &TemperatureWindow {
        &self.upper
    }

    pub fn get_panic_multiplier(&self) -> f64 {
        self.panic_multiplier
    }

    pub fn get_profile(&self) -> HysteresisProfileType {
        self.profile
    }

    pub fn get_minimum_on(&self) -> &Duration {
        &self.minimum_on
    }

    pub fn get_minimum_off(&self) -> &Duration {
        &self.minimum_off
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct OutputConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    pin: usize,
}

impl OutputConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_pin(&self) -> usize {
        self.pin
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThermometerConfig {
    None,
    Ds18b20 {
        #[serde(default)]
        device_id: Option<String>,
    },
    LiveFile {
        file: PathBuf,
    },
}

impl Default for ThermometerConfig {
    fn default() -> Self {
        ThermometerConfig::None
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HydrometerConfig {
    None,
    LiveFile {
        file: PathBuf,
    },
}

impl Default for HydrometerConfig {
    fn default() -> Self {
        HydrometerConfig::None
    }
}

#[derive(Deserialize, Clone)]
pub struct PersistenceConfig {
    directory: PathBuf,
    /// Append every snapshot as a JSON line to snapshots.jsonl in the directory.
    #[serde(default)]
    snapshot_log: bool,
}

impl PersistenceConfig {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            snapshot_log: false,
        }
    }

    pub fn get_directory(&self) -> &Path {
        &self.directory
    }

    pub fn get_snapshot_log(&self) -> Option<PathBuf> {
        self.snapshot_log.then(|| self.directory.join("snapshots.jsonl"))
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ScheduleConfig {
    /// How often the control loop runs.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "control_period_secs")]
    control_period: Duration,
    /// How often a fermentation snapshot is recorded (and uploaded).
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "snapshot_period_secs")]
    snapshot_period: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            control_period: Duration::from_secs(600),
            // Brewfather accepts one upload every 15 minutes.
            snapshot_period: Duration::from_secs(15 * 60 + 5),
        }
    }
}

impl ScheduleConfig {
    pub fn new(control_period: Duration, snapshot_period: Duration) -> Self {
        Self {
            control_period,
            snapshot_period,
        }
    }

    pub fn get_control_period(&self) -> &Duration {
        &self.control_period
    }

    pub fn get_snapshot_period(&self) -> &Duration {
        &self.snapshot_period
    }
}

#[derive(Deserialize, Clone)]
pub struct BrewfatherConfig {
    stream_id: String,
    #[serde(default = "default_device_name")]
    device_name: String,
}

fn default_device_name() -> String {
    "Fermbot".to_owned()
}

impl BrewfatherConfig {
    pub fn get_stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn get_device_name(&self) -> &str {
        &self.device_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_serialize() {
        let config_str = fs::read_to_string("test/testconfig.toml")
            .expect("Unable to read test config file. Is it missing?");
        let config: Config = toml::from_str(&config_str).expect("Error reading test config file");
        config.validate().unwrap();

        assert_eq!(config.hysteresis.lower, TemperatureWindow::f(1.0));
        assert_eq!(config.hysteresis.upper, TemperatureWindow::c(0.5));
        assert_eq!(config.hysteresis.panic_multiplier, 1.5);
        assert_eq!(config.hysteresis.profile, HysteresisProfileType::Naive);
        assert_eq!(config.hysteresis.minimum_on, Duration::from_secs(60));
        assert_eq!(config.hysteresis.minimum_off, Duration::from_secs(120));

        assert!(config.heater.enabled);
        assert_eq!(config.heater.pin, 17);
        assert!(config.cooler.enabled);
        assert_eq!(config.cooler.pin, 27);
        assert_eq!(config.relay_settle, Duration::from_millis(250));

        assert_eq!(config.thermometer, ThermometerConfig::Ds18b20 { device_id: Some("28-000005e2fdc3".to_owned()) });
        assert_eq!(config.hydrometer, HydrometerConfig::LiveFile { file: PathBuf::from("live_data/tilt.json") });

        assert_eq!(config.persistence.directory, PathBuf::from("data"));
        assert_eq!(config.persistence.get_snapshot_log(), Some(PathBuf::from("data/snapshots.jsonl")));

        assert_eq!(config.schedule.control_period, Duration::from_secs(300));
        assert_eq!(config.schedule.snapshot_period, Duration::from_secs(905));

        let brewfather = config.get_brewfather().unwrap();
        assert_eq!(brewfather.get_stream_id(), "abc123");
        assert_eq!(brewfather.get_device_name(), "Fermbot");
        assert!(!config.simulation);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "1F"

            [persistence]
            directory = "."
        "#).unwrap();
        config.validate().unwrap();

        assert_eq!(config.hysteresis.panic_multiplier, DEFAULT_PANIC_MULTIPLIER);
        assert_eq!(config.hysteresis.profile, HysteresisProfileType::Naive);
        assert!(!config.heater.enabled);
        assert!(!config.cooler.enabled);
        assert_eq!(config.relay_settle, Duration::from_millis(100));
        assert_eq!(config.thermometer, ThermometerConfig::None);
        assert_eq!(config.hydrometer, HydrometerConfig::None);
        assert_eq!(config.persistence.get_snapshot_log(), None);
        assert_eq!(config.schedule.control_period, Duration::from_secs(600));
        assert!(config.get_brewfather().is_none());
    }

    #[test]
    fn test_shared_pin_rejected() {
        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "1F"

            [heater]
            enabled = true
            pin = 5

            [cooler]
            enabled = true
            pin = 5

            [persistence]
            directory = "."
        "#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_panic_multiplier_rejected() {
        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "1F"
            panic_multiplier = 1.0

            [persistence]
            directory = "."
        "#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "0"
            upper = "1F"

            [persistence]
            directory = "."
        "#).unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "0C"

            [persistence]
            directory = "."
        "#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pwm_with_cooler_rejected() {
        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "1F"
            profile = "pwm"

            [heater]
            enabled = true
            pin = 17

            [cooler]
            enabled = true
            pin = 27

            [persistence]
            directory = "."
        "#).unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(r#"
            [hysteresis]
            lower = "1F"
            upper = "1F"
            profile = "pwm"

            [heater]
            enabled = true
            pin = 17

            [persistence]
            directory = "."
        "#).unwrap();
        config.validate().unwrap();
    }
}
