use crate::io::gpio::{GPIOError, GPIOManager, GPIOMode, GPIOState};
use log::debug;
use std::collections::HashMap;

/// In-memory pins, used for simulation and tests.
/// Pins must be setup before use, the same as real hardware.
#[derive(Default)]
pub struct Dummy {
    map: HashMap<usize, GPIOState>,
}

impl Dummy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GPIOManager for Dummy {
    fn setup(&mut self, pin: usize, _mode: &GPIOMode) -> Result<(), GPIOError> {
        self.map.entry(pin).or_insert(GPIOState::Low);
        Ok(())
    }

    fn set_pin(&mut self, pin_id: usize, state: &GPIOState) -> Result<(), GPIOError> {
        let pin = self.map.get_mut(&pin_id).ok_or(GPIOError::PinNotSetup)?;
        debug!("Setting pin {} to {:?}", pin_id, state);
        *pin = *state;
        Ok(())
    }

    fn get_pin(&self, pin: usize) -> Result<GPIOState, GPIOError> {
        self.map.get(&pin).copied().ok_or(GPIOError::PinNotSetup)
    }
}
