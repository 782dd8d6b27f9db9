use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, trace, warn};
use serde::Deserialize;

use crate::io::live_data::{check_age, AgeType};
use crate::io::sensors::{HydrometerReader, HydrometerReading, ThermometerReader, ThermometerReading};
use crate::temperature::Temperature;
use crate::time_util::mytime::{RealTimeProvider, TimeProvider};

/// How old a reading is allowed to be before it is treated as absent.
const MAX_READING_AGE: i64 = 120;

/// Written by an external reader process, for example one scanning for a Tilt.
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct LiveFileData {
    timestamp: DateTime<Utc>,
    temperature: Temperature,
    #[serde(default)]
    specific_gravity: Option<f64>,
}

struct LiveFile {
    file: PathBuf,
    time_provider: Arc<dyn TimeProvider>,
}

impl LiveFile {
    fn new(file: PathBuf) -> Self {
        Self {
            file,
            time_provider: Arc::new(RealTimeProvider::default()),
        }
    }

    fn read_data(&self) -> Result<LiveFileData, String> {
        let s = fs::read_to_string(&self.file)
            .map_err(|e| format!("Failed to read {:?}: {}", self.file, e))?;

        serde_json::from_str(&s)
            .map_err(|e| format!("Failed to deserialize: {:?}: {}\n{}", self.file, e, s))
    }

    /// None if the file is missing or the reading has gone stale.
    fn read_fresh(&self) -> Result<Option<LiveFileData>, String> {
        if !self.file.exists() {
            trace!("{:?} does not exist yet", self.file);
            return Ok(None);
        }
        let data = self.read_data()?;

        let age = check_age(data.timestamp, MAX_READING_AGE, self.time_provider.get_utc_time());
        match age.age_type() {
            AgeType::Good => {
                trace!("{:?}: {}", self.file, age);
            }
            AgeType::GettingOld => {
                warn!("{:?}: {} - will reject soon.", self.file, age);
            }
            AgeType::TooOld => {
                error!("Rejecting {:?}: {} - is it being updated?", self.file, age);
                return Ok(None);
            }
        }
        Ok(Some(data))
    }
}

pub struct LiveFileThermometer {
    live_file: LiveFile,
}

impl LiveFileThermometer {
    pub fn new(file: PathBuf) -> Self {
        Self { live_file: LiveFile::new(file) }
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.live_file.time_provider = time_provider;
        self
    }
}

impl ThermometerReader for LiveFileThermometer {
    fn read(&self) -> Result<Option<ThermometerReading>, String> {
        Ok(self.live_file.read_fresh()?.map(|data| ThermometerReading {
            temperature: data.temperature,
            timestamp: data.timestamp,
        }))
    }
}

pub struct LiveFileHydrometer {
    live_file: LiveFile,
}

impl LiveFileHydrometer {
    pub fn new(file: PathBuf) -> Self {
        Self { live_file: LiveFile::new(file) }
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.live_file.time_provider = time_provider;
        self
    }
}

impl HydrometerReader for LiveFileHydrometer {
    fn read(&self) -> Result<Option<HydrometerReading>, String> {
        let data = match self.live_file.read_fresh()? {
            Some(data) => data,
            None => return Ok(None),
        };
        let specific_gravity = data.specific_gravity
            .ok_or_else(|| format!("{:?} has no specific gravity", self.live_file.file))?;
        Ok(Some(HydrometerReading {
            temperature: data.temperature,
            specific_gravity,
            timestamp: data.timestamp,
        }))
    }
}
