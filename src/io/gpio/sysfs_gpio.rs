use std::collections::HashMap;
use log::{debug, info};
use sysfs_gpio::{Direction, Error, Pin};
use crate::io::gpio::{GPIOManager, GPIOMode, GPIOState, GPIOError};

#[derive(Default)]
pub struct SysFsGPIO {
    gpios: HashMap<usize, Pin>,
}

impl SysFsGPIO {
    pub fn new() -> SysFsGPIO {
        SysFsGPIO {
            gpios: HashMap::new(),
        }
    }
}

impl GPIOManager for SysFsGPIO {
    fn setup(&mut self, pin_id: usize, mode: &GPIOMode) -> Result<(), GPIOError> {
        info!("Setting up pin {}", pin_id);
        let pin = Pin::new(pin_id as u64);
        pin.export().map_err(map_sysfs_err)?;
        // Outputs start low so a relay never clicks on during startup.
        let direction = match mode {
            GPIOMode::Input => Direction::In,
            GPIOMode::Output => Direction::Low,
        };
        let direction_before = pin.get_direction().map_err(map_sysfs_err)?;
        let already_at_mode = match direction_before {
            Direction::In => matches!(mode, GPIOMode::Input),
            Direction::Out | Direction::High | Direction::Low => matches!(mode, GPIOMode::Output),
        };
        if !already_at_mode {
            debug!("Actually having to set direction of pin {}", pin_id);
            pin.set_direction(direction).map_err(map_sysfs_err)?;
        }
        self.gpios.insert(pin_id, pin);
        Ok(())
    }

    fn set_pin(&mut self, pin_id: usize, state: &GPIOState) -> Result<(), GPIOError> {
        let pin = self.gpios.get(&pin_id).ok_or(GPIOError::PinNotSetup)?;
        let direction = pin.get_direction().map_err(map_sysfs_err)?;
        if direction == Direction::In {
            return Err(GPIOError::PinInIncorrectMode { required_mode: GPIOMode::Output });
        }
        let bit_value = match state {
            GPIOState::High => 1,
            GPIOState::Low => 0,
        };
        debug!("Setting pin {} to {:?}", pin_id, state);
        pin.set_value(bit_value).map_err(map_sysfs_err)
    }

    fn get_pin(&self, pin: usize) -> Result<GPIOState, GPIOError> {
        let pin = self.gpios.get(&pin).ok_or(GPIOError::PinNotSetup)?;
        match pin.get_value().map_err(map_sysfs_err)? {
            0 => Ok(GPIOState::Low),
            1 => Ok(GPIOState::High),
            other => Err(GPIOError::Other(format!("Unexpected pin value {}", other))),
        }
    }
}

fn map_sysfs_err(err: Error) -> GPIOError {
    match err {
        Error::Io(err) => GPIOError::Io(err),
        Error::Unexpected(s) => GPIOError::Other(s),
        Error::InvalidPath(s) => GPIOError::Other(s),
        Error::Unsupported(s) => GPIOError::Other(s),
    }
}
