use std::sync::Arc;

use crate::io::controls::actuator::TemperatureActuator;
use crate::io::robbable::{DispatchAvailable, Dispatchable, DispatchedRobbable};
use crate::io::sensors::{HydrometerReader, ThermometerReader};

pub mod controls;
#[cfg(test)]
pub mod dummy;
#[cfg(test)]
pub mod dummy_io_bundle;
pub mod gpio;
pub mod live_data;
pub mod persistence;
pub mod robbable;
pub mod sensors;

pub struct IOBundle {
    thermometer: Arc<dyn ThermometerReader>,
    hydrometer: Arc<dyn HydrometerReader>,
    actuator: Dispatchable<TemperatureActuator>,
}

impl IOBundle {
    pub fn new(thermometer: Arc<dyn ThermometerReader>,
               hydrometer: Arc<dyn HydrometerReader>,
               actuator: TemperatureActuator) -> IOBundle {
        IOBundle {
            thermometer,
            hydrometer,
            actuator: Dispatchable::of(actuator),
        }
    }

    pub fn thermometer(&self) -> Arc<dyn ThermometerReader> {
        self.thermometer.clone()
    }

    pub fn hydrometer(&self) -> Arc<dyn HydrometerReader> {
        self.hydrometer.clone()
    }

    pub fn dispatch_actuator(&mut self) -> Result<DispatchedRobbable<TemperatureActuator>, String> {
        self.actuator.dispatch()
    }

    /// Take the actuator back from the control loop if it has it.
    pub fn actuator(&mut self) -> Result<&mut DispatchAvailable<TemperatureActuator>, String> {
        self.actuator.rob_or_get_now()
    }
}
