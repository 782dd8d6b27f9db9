use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::temperature::Temperature;

pub mod ds18b20;
#[cfg(test)]
pub mod dummy;
pub mod file;
pub mod null;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermometerReading {
    pub temperature: Temperature,
    pub timestamp: DateTime<Utc>,
}

/// A combined thermometer and hydrometer, such as a Tilt floating in the wort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrometerReading {
    pub temperature: Temperature,
    pub specific_gravity: f64,
    pub timestamp: DateTime<Utc>,
}

impl Display for HydrometerReading {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} SG {:.3} at {}", self.temperature, self.specific_gravity, self.timestamp)
    }
}

/// Ok(None) means there is currently no reading, which is not an error.
pub trait ThermometerReader: Send + Sync {
    fn read(&self) -> Result<Option<ThermometerReading>, String>;
}

pub trait HydrometerReader: Send + Sync {
    fn read(&self) -> Result<Option<HydrometerReading>, String>;
}

/// Prefer the dedicated thermometer, falling back to the one built into the hydrometer.
pub fn best_temperature(thermometer: Option<&ThermometerReading>, hydrometer: Option<&HydrometerReading>) -> Option<Temperature> {
    thermometer.map(|reading| reading.temperature)
        .or_else(|| hydrometer.map(|reading| reading.temperature))
}
