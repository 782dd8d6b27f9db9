use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::brain::{BrainFailure, CorrectiveActions};
use crate::brain_fail;
use crate::io::gpio::{GPIOManager, GPIOMode, GPIOState};

pub mod actuator;
pub mod statistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeatingMode {
    Heating,
    Cooling,
    Off,
}

impl Display for HeatingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HeatingMode::Heating => "HEATING",
            HeatingMode::Cooling => "COOLING",
            HeatingMode::Off => "OFF",
        };
        write!(f, "{}", s)
    }
}

/// Which temperature control devices are physically present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum HeaterCoolerConfiguration {
    None,
    Heater,
    Cooler,
    Both,
}

impl HeaterCoolerConfiguration {
    pub fn from_outputs(heater_present: bool, cooler_present: bool) -> Self {
        match (heater_present, cooler_present) {
            (true, true) => HeaterCoolerConfiguration::Both,
            (true, false) => HeaterCoolerConfiguration::Heater,
            (false, true) => HeaterCoolerConfiguration::Cooler,
            (false, false) => HeaterCoolerConfiguration::None,
        }
    }

    pub fn allowable_heating_modes(&self) -> &'static [HeatingMode] {
        match self {
            HeaterCoolerConfiguration::None => &[HeatingMode::Off],
            HeaterCoolerConfiguration::Heater => &[HeatingMode::Off, HeatingMode::Heating],
            HeaterCoolerConfiguration::Cooler => &[HeatingMode::Off, HeatingMode::Cooling],
            HeaterCoolerConfiguration::Both => &[HeatingMode::Off, HeatingMode::Heating, HeatingMode::Cooling],
        }
    }

    /// Degrade a mode this configuration cannot perform to OFF.
    pub fn normalize_heating_mode(&self, desired: HeatingMode) -> HeatingMode {
        if self.can_use_heating_mode(desired) {
            desired
        } else {
            HeatingMode::Off
        }
    }

    pub fn can_use_heating_mode(&self, mode: HeatingMode) -> bool {
        self.allowable_heating_modes().contains(&mode)
    }
}

impl Display for HeaterCoolerConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single heating or cooling device. Enabled means the device is running.
/// Nothing other than the [actuator::TemperatureActuator] should drive one of these.
pub trait DigitalOutput: Send {
    fn enable(&mut self) -> Result<(), BrainFailure>;

    fn disable(&mut self) -> Result<(), BrainFailure>;

    fn is_enabled(&self) -> Result<bool, BrainFailure>;
}

/// An output where a high pin means the device is on.
pub struct ActiveHighGpioOutput {
    gpio: Box<dyn GPIOManager>,
    pin: usize,
    name: &'static str,
}

impl ActiveHighGpioOutput {
    pub fn create(mut gpio: Box<dyn GPIOManager>, pin: usize, name: &'static str) -> Result<Self, BrainFailure> {
        gpio.setup(pin, &GPIOMode::Output)
            .map_err(|err| brain_fail!(format!("Failed to provision {} on pin {}: {}", name, pin, err)))?;
        Ok(Self { gpio, pin, name })
    }
}

impl DigitalOutput for ActiveHighGpioOutput {
    fn enable(&mut self) -> Result<(), BrainFailure> {
        translate_set_gpio(self.pin, &mut *self.gpio, true, self.name)
    }

    fn disable(&mut self) -> Result<(), BrainFailure> {
        translate_set_gpio(self.pin, &mut *self.gpio, false, self.name)
    }

    fn is_enabled(&self) -> Result<bool, BrainFailure> {
        translate_get_gpio(self.pin, &*self.gpio, self.name)
    }
}

fn translate_set_gpio(pin: usize, gpio: &mut dyn GPIOManager, on: bool, name: &str) -> Result<(), BrainFailure> {
    let gpio_state = if on { GPIOState::High } else { GPIOState::Low };
    gpio.set_pin(pin, &gpio_state)
        .map_err(|gpio_err| brain_fail!(format!("Failed to set {} pin {}: {}", name, pin, gpio_err), CorrectiveActions::unknown_outputs()))
}

fn translate_get_gpio(pin: usize, gpio: &dyn GPIOManager, name: &str) -> Result<bool, BrainFailure> {
    gpio.get_pin(pin)
        .map(|state| matches!(state, GPIOState::High))
        .map_err(|err| brain_fail!(format!("Failed to get {} pin {}: {}", name, pin, err), CorrectiveActions::unknown_outputs()))
}
