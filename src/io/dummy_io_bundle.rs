use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::io::controls::actuator::TemperatureActuator;
use crate::io::controls::DigitalOutput;
use crate::io::dummy::{DummyIO, DummyOutputs};
use crate::io::sensors::dummy::{Dummy, ModifyState};
use crate::io::IOBundle;
use crate::temperature::Temperature;
use crate::time_util::mytime::TimeProvider;

pub struct DummyIOBundleHandle {
    thermometer_handle: Sender<ModifyState>,
    hydrometer_handle: Sender<ModifyState>,
    outputs: DummyOutputs,
}

impl DummyIOBundleHandle {
    pub fn send_temperature(&self, temperature: Temperature, timestamp: DateTime<Utc>) {
        self.thermometer_handle.send(ModifyState::SetTemperature(temperature, timestamp)).unwrap();
    }

    pub fn send_gravity(&self, temperature: Temperature, specific_gravity: f64, timestamp: DateTime<Utc>) {
        self.hydrometer_handle.send(ModifyState::SetGravity(temperature, specific_gravity, timestamp)).unwrap();
    }

    pub fn send_thermometer(&self, msg: ModifyState) {
        self.thermometer_handle.send(msg).unwrap();
    }

    pub fn outputs(&self) -> &DummyOutputs {
        &self.outputs
    }
}

/// Heater and cooler both fitted, no relay settle delay.
pub fn new_dummy_io(time: &dyn TimeProvider) -> (IOBundle, DummyIOBundleHandle) {
    let outputs = DummyOutputs::new();
    let heater: Box<dyn DigitalOutput> = Box::new(outputs.heater());
    let cooler: Box<dyn DigitalOutput> = Box::new(outputs.cooler());
    let actuator = TemperatureActuator::new(Some(heater), Some(cooler), time)
        .unwrap()
        .with_relay_settle_time(Duration::ZERO);

    let (thermometer, thermometer_handle) = Dummy::create(&());
    let (hydrometer, hydrometer_handle) = Dummy::create(&());

    let io_bundle = IOBundle::new(Arc::new(thermometer), Arc::new(hydrometer), actuator);

    let handle = DummyIOBundleHandle {
        thermometer_handle,
        hydrometer_handle,
        outputs,
    };

    (io_bundle, handle)
}
