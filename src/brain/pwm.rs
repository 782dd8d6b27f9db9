use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;

use crate::brain::hysteresis::HysteresisProfile;
use crate::brain::BrainFailure;
use crate::brain_fail;
use crate::io::controls::{HeaterCoolerConfiguration, HeatingMode};
use crate::temperature::{Temperature, TemperatureWindow};
use crate::time_util::mytime::TimeProvider;

pub const DEFAULT_MINIMUM_ON_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_MINIMUM_OFF_TIME: Duration = Duration::from_secs(60);

/// Pulse width modulation for heaters too powerful to simply leave on until the setpoint is reached.
/// The closer to the setpoint, the smaller the fraction of time the heater spends on.
pub struct PWMHeaterHysteresisProfile {
    lower_threshold: TemperatureWindow,
    upper_threshold: TemperatureWindow,
    configuration: HeaterCoolerConfiguration,
    minimum_on_time: Duration,
    minimum_off_time: Duration,
    /// Last change from OFF to HEATING.
    last_activated: Option<DateTime<Utc>>,
    /// Last change from HEATING to OFF.
    last_deactivated: DateTime<Utc>,
}

impl PWMHeaterHysteresisProfile {
    pub fn new(lower_threshold: TemperatureWindow, upper_threshold: TemperatureWindow, configuration: HeaterCoolerConfiguration, time: &dyn TimeProvider) -> Result<Self, BrainFailure> {
        if configuration.can_use_heating_mode(HeatingMode::Cooling) {
            return Err(brain_fail!(format!("Pulse width modulation not supported with cooling enabled ({})", configuration)));
        }
        if lower_threshold.is_zero() {
            return Err(brain_fail!("Lower threshold cannot be zero"));
        }
        Ok(Self {
            lower_threshold,
            upper_threshold,
            configuration,
            minimum_on_time: DEFAULT_MINIMUM_ON_TIME,
            minimum_off_time: DEFAULT_MINIMUM_OFF_TIME,
            last_activated: None,
            last_deactivated: time.get_utc_time(),
        }.logged())
    }

    pub fn with_minimum_times(mut self, minimum_on_time: Duration, minimum_off_time: Duration) -> Self {
        self.minimum_on_time = minimum_on_time;
        self.minimum_off_time = minimum_off_time;
        self.logged()
    }

    fn logged(self) -> Self {
        info!("Pulse width modulated heating profile: lower_threshold={}, upper_threshold={}, minimum_on_time={}s, minimum_off_time={}s",
              self.lower_threshold, self.upper_threshold, self.minimum_on_time.as_secs(), self.minimum_off_time.as_secs());
        self
    }

    /// 0 at or above the setpoint, rising linearly to 1 at the lower threshold below it.
    pub fn desired_duty_cycle(&self, setpoint: &Temperature, current: &Temperature) -> f64 {
        if current > setpoint {
            return 0.0;
        }
        (setpoint.difference(current) / self.lower_threshold).min(1.0)
    }

    /// Fraction of the most recent on/off cycle spent on.
    pub fn current_duty_cycle(&self, current_mode: HeatingMode, now: DateTime<Utc>) -> f64 {
        let last_activated = match self.last_activated {
            Some(last_activated) => last_activated,
            None => return 0.0,
        };
        let (on, total) = match current_mode {
            HeatingMode::Heating => (now - last_activated, now - self.last_deactivated),
            _ => (self.last_deactivated - last_activated, now - last_activated),
        };
        let total = total.num_milliseconds();
        if total <= 0 {
            return 0.0;
        }
        on.num_milliseconds() as f64 / total as f64
    }

    fn dwelled(since: Option<DateTime<Utc>>, minimum: Duration, now: DateTime<Utc>) -> bool {
        match since {
            Some(since) => (now - since).to_std().map(|elapsed| elapsed >= minimum).unwrap_or(false),
            None => true,
        }
    }
}

impl HysteresisProfile for PWMHeaterHysteresisProfile {
    fn lower_threshold(&self) -> TemperatureWindow {
        self.lower_threshold
    }

    fn upper_threshold(&self) -> TemperatureWindow {
        self.upper_threshold
    }

    fn determine_heating_mode(&mut self, setpoint: &Temperature, current: Option<&Temperature>, current_mode: HeatingMode, time: &dyn TimeProvider) -> HeatingMode {
        let now = time.get_utc_time();
        let desired_duty_cycle = match current {
            Some(current) => self.desired_duty_cycle(setpoint, current),
            None => 0.0,
        };
        let current_duty_cycle = self.current_duty_cycle(current_mode, now);

        let new_mode = if desired_duty_cycle >= 1.0 {
            HeatingMode::Heating
        } else if desired_duty_cycle <= 0.0 {
            HeatingMode::Off
        } else if current_duty_cycle < desired_duty_cycle {
            if current_mode == HeatingMode::Heating || Self::dwelled(Some(self.last_deactivated), self.minimum_off_time, now) {
                HeatingMode::Heating
            } else {
                HeatingMode::Off
            }
        } else if current_mode != HeatingMode::Heating || Self::dwelled(self.last_activated, self.minimum_on_time, now) {
            HeatingMode::Off
        } else {
            HeatingMode::Heating
        };
        let new_mode = self.configuration.normalize_heating_mode(new_mode);

        if new_mode != current_mode {
            if new_mode == HeatingMode::Heating {
                self.last_activated = Some(now);
            } else {
                self.last_deactivated = now;
            }
            info!("Current temperature {:?}, setpoint {}. Previous heating mode: {}, desired duty cycle: {:.2}, current duty cycle: {:.2}. New heating mode: {}",
                  current.map(|t| t.to_string()), setpoint, current_mode, desired_duty_cycle, current_duty_cycle, new_mode);
        }
        new_mode
    }
}
