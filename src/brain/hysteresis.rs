use log::{debug, info};

use crate::brain::pwm::PWMHeaterHysteresisProfile;
use crate::brain::BrainFailure;
use crate::brain_fail;
use crate::config::{HysteresisConfig, HysteresisProfileType};
use crate::io::controls::{HeaterCoolerConfiguration, HeatingMode};
use crate::temperature::{Temperature, TemperatureWindow};
use crate::time_util::mytime::TimeProvider;

pub const DEFAULT_PANIC_MULTIPLIER: f64 = 1.2;

/// Decides what the actuator should be doing given where we are relative to the setpoint.
pub trait HysteresisProfile: Send {
    fn lower_threshold(&self) -> TemperatureWindow;

    fn upper_threshold(&self) -> TemperatureWindow;

    /// With no current temperature there is no feedback, so the answer is always OFF.
    fn determine_heating_mode(&mut self, setpoint: &Temperature, current: Option<&Temperature>, current_mode: HeatingMode, time: &dyn TimeProvider) -> HeatingMode;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HysteresisStatus {
    Max,
    Above,
    Within,
    Below,
    Min,
}

/// Bang-bang control with a dead band around the setpoint
/// and panic bounds outside it that override whatever is running.
pub struct NaiveHysteresisProfile {
    lower_threshold: TemperatureWindow,
    upper_threshold: TemperatureWindow,
    min: TemperatureWindow,
    max: TemperatureWindow,
    configuration: HeaterCoolerConfiguration,
}

impl NaiveHysteresisProfile {
    pub fn new(lower_threshold: TemperatureWindow, upper_threshold: TemperatureWindow, panic_multiplier: f64, configuration: HeaterCoolerConfiguration) -> Result<Self, BrainFailure> {
        if lower_threshold.is_zero() {
            return Err(brain_fail!("Lower threshold cannot be zero"));
        }
        if upper_threshold.is_zero() {
            return Err(brain_fail!("Upper threshold cannot be zero"));
        }
        if !panic_multiplier.is_finite() || panic_multiplier <= 0.0 {
            return Err(brain_fail!(format!("Panic multiplier must be positive, was {}", panic_multiplier)));
        }
        let min = lower_threshold * panic_multiplier;
        let max = upper_threshold * panic_multiplier;
        if !(max > upper_threshold) {
            return Err(brain_fail!(format!("Max value [{}] must be > upper threshold [{}]", max, upper_threshold)));
        }
        if !(min > lower_threshold) {
            return Err(brain_fail!(format!("Min value [{}] must be > lower threshold [{}]", min, lower_threshold)));
        }

        info!("Initializing hysteresis profile: lower_threshold={} upper_threshold={}, min={}, max={}, configuration={}",
              lower_threshold, upper_threshold, min, max, configuration);
        Ok(Self {
            lower_threshold,
            upper_threshold,
            min,
            max,
            configuration,
        })
    }

    pub fn symmetric(window: TemperatureWindow, configuration: HeaterCoolerConfiguration) -> Result<Self, BrainFailure> {
        Self::new(window, window, DEFAULT_PANIC_MULTIPLIER, configuration)
    }

    pub fn min(&self) -> TemperatureWindow {
        self.min
    }

    pub fn max(&self) -> TemperatureWindow {
        self.max
    }

    /// Boundaries are inclusive on the side nearer the panic zone.
    pub fn get_hysteresis_status(&self, setpoint: &Temperature, current: &Temperature) -> HysteresisStatus {
        let setpoint = *setpoint;
        if *current >= setpoint + self.max {
            HysteresisStatus::Max
        } else if *current >= setpoint + self.upper_threshold {
            HysteresisStatus::Above
        } else if *current <= setpoint - self.min {
            HysteresisStatus::Min
        } else if *current <= setpoint - self.lower_threshold {
            HysteresisStatus::Below
        } else {
            HysteresisStatus::Within
        }
    }
}

impl HysteresisProfile for NaiveHysteresisProfile {
    fn lower_threshold(&self) -> TemperatureWindow {
        self.lower_threshold
    }

    fn upper_threshold(&self) -> TemperatureWindow {
        self.upper_threshold
    }

    fn determine_heating_mode(&mut self, setpoint: &Temperature, current: Option<&Temperature>, current_mode: HeatingMode, _time: &dyn TimeProvider) -> HeatingMode {
        let current = match current {
            Some(current) => current,
            None => return HeatingMode::Off,
        };

        let status = self.get_hysteresis_status(setpoint, current);
        let desired = match status {
            HysteresisStatus::Max => HeatingMode::Cooling,
            HysteresisStatus::Above => match current_mode {
                HeatingMode::Heating => HeatingMode::Off,
                _ => HeatingMode::Cooling,
            },
            HysteresisStatus::Within => current_mode,
            HysteresisStatus::Below => match current_mode {
                HeatingMode::Cooling => HeatingMode::Off,
                _ => HeatingMode::Heating,
            },
            HysteresisStatus::Min => HeatingMode::Heating,
        };
        debug!("{} vs setpoint {} is {:?}: {} -> {}", current, setpoint, status, current_mode, desired);

        self.configuration.normalize_heating_mode(desired)
    }
}

/// Build whichever profile the config asks for.
pub fn from_config(config: &HysteresisConfig, configuration: HeaterCoolerConfiguration, time: &dyn TimeProvider) -> Result<Box<dyn HysteresisProfile>, BrainFailure> {
    match config.get_profile() {
        HysteresisProfileType::Naive => {
            let profile = NaiveHysteresisProfile::new(*config.get_lower(), *config.get_upper(), config.get_panic_multiplier(), configuration)?;
            Ok(Box::new(profile))
        }
        HysteresisProfileType::Pwm => {
            let profile = PWMHeaterHysteresisProfile::new(*config.get_lower(), *config.get_upper(), configuration, time)?
                .with_minimum_times(*config.get_minimum_on(), *config.get_minimum_off());
            Ok(Box::new(profile))
        }
    }
}
