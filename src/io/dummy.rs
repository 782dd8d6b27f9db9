use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::brain::{BrainFailure, CorrectiveActions};
use crate::brain_fail;
use crate::io::controls::DigitalOutput;

pub trait DummyIO {
    type MessageType;
    type Config;

    fn create(config: &Self::Config) -> (Self, Sender<Self::MessageType>) where Self: Sized {
        let (sender, receiver) = mpsc::channel();
        let dummy_obj = Self::new(receiver, config);
        (dummy_obj, sender)
    }

    fn new(receiver: Receiver<Self::MessageType>, config: &Self::Config) -> Self;
}

/// Drain every message currently waiting. A hung up sender just means no more changes will come.
pub fn read_all<T, F>(receiver: &Receiver<T>, mut on_value: F)
    where F: FnMut(T) {
    loop {
        match receiver.try_recv() {
            Ok(x) => on_value(x),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DummyOutputState {
    enabled: bool,
    stuck_enabled: bool,
    failing: bool,
    fail_once: bool,
}

#[derive(Debug, Default)]
struct DummyOutputPairState {
    heater: DummyOutputState,
    cooler: DummyOutputState,
    both_enabled_seen: bool,
}

#[derive(Debug, Clone, Copy)]
enum Which {
    Heater,
    Cooler,
}

impl DummyOutputPairState {
    fn get_mut(&mut self, which: Which) -> &mut DummyOutputState {
        match which {
            Which::Heater => &mut self.heater,
            Which::Cooler => &mut self.cooler,
        }
    }

    fn record(&mut self) {
        if self.heater.enabled && self.cooler.enabled {
            self.both_enabled_seen = true;
        }
    }
}

/// In-memory heater and cooler outputs that share one view of the world,
/// so a test can observe whether both were ever enabled at the same instant.
#[derive(Clone, Default)]
pub struct DummyOutputs {
    state: Arc<Mutex<DummyOutputPairState>>,
}

impl DummyOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heater(&self) -> DummyOutput {
        DummyOutput { which: Which::Heater, state: self.state.clone() }
    }

    pub fn cooler(&self) -> DummyOutput {
        DummyOutput { which: Which::Cooler, state: self.state.clone() }
    }

    pub fn is_heater_enabled(&self) -> bool {
        self.lock().heater.enabled
    }

    pub fn is_cooler_enabled(&self) -> bool {
        self.lock().cooler.enabled
    }

    pub fn were_both_ever_enabled(&self) -> bool {
        self.lock().both_enabled_seen
    }

    /// The heater relay welds shut: disabling it no longer has any effect.
    pub fn weld_heater(&self) {
        self.lock().heater.stuck_enabled = true;
    }

    pub fn set_cooler_failing(&self, failing: bool) {
        self.lock().cooler.failing = failing;
    }

    /// Only the next switch of the cooler fails.
    pub fn fail_next_cooler_switch(&self) {
        self.lock().cooler.fail_once = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DummyOutputPairState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct DummyOutput {
    which: Which,
    state: Arc<Mutex<DummyOutputPairState>>,
}

impl DummyOutput {
    fn set(&mut self, enabled: bool) -> Result<(), BrainFailure> {
        let mut state = self.state.lock()
            .map_err(|_| brain_fail!("Dummy output state poisoned", CorrectiveActions::unknown_outputs()))?;
        let which = self.which;
        let output = state.get_mut(which);
        if output.failing || std::mem::take(&mut output.fail_once) {
            error!("Dummy {:?} failing to switch", which);
            return Err(brain_fail!(format!("Failed to set dummy {:?}", which), CorrectiveActions::unknown_outputs()));
        }
        if output.stuck_enabled {
            output.enabled = true;
        } else {
            output.enabled = enabled;
        }
        debug!("Dummy {:?} is now {}", which, if output.enabled { "enabled" } else { "disabled" });
        state.record();
        Ok(())
    }
}

impl DigitalOutput for DummyOutput {
    fn enable(&mut self) -> Result<(), BrainFailure> {
        self.set(true)
    }

    fn disable(&mut self) -> Result<(), BrainFailure> {
        self.set(false)
    }

    fn is_enabled(&self) -> Result<bool, BrainFailure> {
        let mut state = self.state.lock()
            .map_err(|_| brain_fail!("Dummy output state poisoned", CorrectiveActions::unknown_outputs()))?;
        Ok(state.get_mut(self.which).enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_enabled_is_recorded() {
        let outputs = DummyOutputs::new();
        let mut heater = outputs.heater();
        let mut cooler = outputs.cooler();
        heater.enable().unwrap();
        heater.disable().unwrap();
        cooler.enable().unwrap();
        assert!(!outputs.were_both_ever_enabled());
        heater.enable().unwrap();
        assert!(outputs.were_both_ever_enabled());
    }

    #[test]
    fn test_welded_heater_stays_on() {
        let outputs = DummyOutputs::new();
        let mut heater = outputs.heater();
        outputs.weld_heater();
        heater.disable().unwrap();
        assert!(heater.is_enabled().unwrap());
    }

    #[test]
    fn test_read_all() {
        let (sender, receiver) = mpsc::channel();
        sender.send(1).unwrap();
        sender.send(2).unwrap();
        drop(sender);
        let mut total = 0;
        read_all(&receiver, |x| total += x);
        assert_eq!(total, 3);
    }
}
