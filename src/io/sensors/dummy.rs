use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::io;
use crate::io::dummy::DummyIO;
use crate::io::sensors::{HydrometerReader, HydrometerReading, ThermometerReader, ThermometerReading};
use crate::temperature::Temperature;

pub enum ModifyState {
    SetTemperature(Temperature, DateTime<Utc>),
    SetGravity(Temperature, f64, DateTime<Utc>),
    Clear,
    Fail(String),
}

#[derive(Default)]
struct DummySensorState {
    temperature: Option<(Temperature, DateTime<Utc>)>,
    specific_gravity: Option<f64>,
    failure: Option<String>,
}

/// Sensor driven by messages from a test, usable as either a thermometer or a hydrometer.
pub struct Dummy {
    receiver: Mutex<Receiver<ModifyState>>,
    state: Mutex<DummySensorState>,
}

impl DummyIO for Dummy {
    type MessageType = ModifyState;
    type Config = ();

    fn new(receiver: Receiver<Self::MessageType>, _config: &Self::Config) -> Self {
        Dummy {
            receiver: Mutex::new(receiver),
            state: Mutex::new(DummySensorState::default()),
        }
    }
}

impl Dummy {
    fn update_state(&self) -> Result<(), String> {
        let receiver = self.receiver.lock().map_err(|_| "Dummy receiver poisoned".to_owned())?;
        let mut state = self.state.lock().map_err(|_| "Dummy state poisoned".to_owned())?;
        io::dummy::read_all(&*receiver, |message| {
            match message {
                ModifyState::SetTemperature(temperature, timestamp) => {
                    state.temperature = Some((temperature, timestamp));
                    state.specific_gravity = None;
                    state.failure = None;
                }
                ModifyState::SetGravity(temperature, gravity, timestamp) => {
                    state.temperature = Some((temperature, timestamp));
                    state.specific_gravity = Some(gravity);
                    state.failure = None;
                }
                ModifyState::Clear => *state = DummySensorState::default(),
                ModifyState::Fail(msg) => state.failure = Some(msg),
            }
        });
        match &state.failure {
            Some(msg) => Err(msg.clone()),
            None => Ok(()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&DummySensorState) -> T) -> Result<T, String> {
        self.update_state()?;
        let state = self.state.lock().map_err(|_| "Dummy state poisoned".to_owned())?;
        Ok(f(&state))
    }
}

impl ThermometerReader for Dummy {
    fn read(&self) -> Result<Option<ThermometerReading>, String> {
        self.with_state(|state| {
            state.temperature.map(|(temperature, timestamp)| ThermometerReading { temperature, timestamp })
        })
    }
}

impl HydrometerReader for Dummy {
    fn read(&self) -> Result<Option<HydrometerReading>, String> {
        self.with_state(|state| {
            match (state.temperature, state.specific_gravity) {
                (Some((temperature, timestamp)), Some(specific_gravity)) => Some(HydrometerReading { temperature, specific_gravity, timestamp }),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::time_util::test_utils::utc_datetime;

    use super::*;

    #[test]
    fn test_dummy_sensor() {
        let (sensor, sender) = Dummy::create(&());
        let timestamp = utc_datetime(2024, 1, 3, 19, 51, 42);
        assert_eq!(ThermometerReader::read(&sensor).unwrap(), None);

        sender.send(ModifyState::SetTemperature(Temperature::f(60.0), timestamp)).unwrap();
        assert_eq!(ThermometerReader::read(&sensor).unwrap().unwrap().temperature, Temperature::f(60.0));
        assert_eq!(HydrometerReader::read(&sensor).unwrap(), None);

        sender.send(ModifyState::SetGravity(Temperature::f(61.0), 1.040, timestamp)).unwrap();
        assert_eq!(HydrometerReader::read(&sensor).unwrap().unwrap().specific_gravity, 1.040);

        sender.send(ModifyState::Fail("Unplugged".into())).unwrap();
        assert!(ThermometerReader::read(&sensor).is_err());

        sender.send(ModifyState::Clear).unwrap();
        assert_eq!(ThermometerReader::read(&sensor).unwrap(), None);
    }
}
