use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{trace, warn};

use crate::io::sensors::{ThermometerReader, ThermometerReading};
use crate::temperature::Temperature;
use crate::time_util::mytime::{RealTimeProvider, TimeProvider};

pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";
const DS18B20_FAMILY_PREFIX: &str = "28-";

/// Mean error curve from the DS18B20 datasheet, in Celsius.
/// Only characterised between 0C and 30C.
const ERROR_A: f64 = 1.8333333e-4;
const ERROR_B: f64 = -6.666666e-3;
const ERROR_C: f64 = -0.14;
const CORRECTION_MIN_C: f64 = 0.0;
const CORRECTION_MAX_C: f64 = 30.0;

/// One-wire DS18B20 probe read through the kernel w1 driver.
pub struct Ds18b20Thermometer {
    devices_dir: PathBuf,
    device_id: Option<String>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Ds18b20Thermometer {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            devices_dir: PathBuf::from(W1_DEVICES_DIR),
            device_id,
            time_provider: Arc::new(RealTimeProvider::default()),
        }
    }

    pub fn with_devices_dir(mut self, devices_dir: PathBuf) -> Self {
        self.devices_dir = devices_dir;
        self
    }

    fn find_device(&self) -> Result<PathBuf, String> {
        if let Some(id) = &self.device_id {
            return Ok(self.devices_dir.join(id));
        }
        let entries = fs::read_dir(&self.devices_dir)
            .map_err(|e| format!("Failed to list {:?}: {}", self.devices_dir, e))?;
        let mut devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(DS18B20_FAMILY_PREFIX))
            .map(|entry| entry.path())
            .collect();
        devices.sort();
        devices.into_iter().next()
            .ok_or_else(|| format!("No DS18B20 found in {:?}", self.devices_dir))
    }
}

impl ThermometerReader for Ds18b20Thermometer {
    fn read(&self) -> Result<Option<ThermometerReading>, String> {
        let device = self.find_device()?;
        let slave_file = device.join("w1_slave");
        let contents = read_slave_file(&slave_file)?;
        let raw = parse_w1_slave(&contents)?;
        trace!("{:?} raw reading {}C", device, raw);
        Ok(Some(ThermometerReading {
            temperature: Temperature::c(correct_reading(raw)),
            timestamp: self.time_provider.get_utc_time(),
        }))
    }
}

fn read_slave_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))
}

/// Parse the two line w1_slave output, e.g.
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(contents: &str) -> Result<f64, String> {
    let mut lines = contents.lines();
    let crc_line = lines.next().ok_or("Empty w1_slave output")?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(format!("CRC check failed: {}", crc_line));
    }
    let data_line = lines.next().ok_or("Missing temperature line")?;
    let (_, millis) = data_line.rsplit_once("t=")
        .ok_or_else(|| format!("No temperature in: {}", data_line))?;
    let millis: i64 = millis.trim().parse()
        .map_err(|e| format!("Bad temperature '{}': {}", millis.trim(), e))?;
    Ok(millis as f64 / 1000.0)
}

/// Subtract the datasheet mean error. Outside of the characterised range the raw value is used.
pub fn correct_reading(raw_celsius: f64) -> f64 {
    if !(CORRECTION_MIN_C..=CORRECTION_MAX_C).contains(&raw_celsius) {
        warn!("DS18B20 reading {}C outside of correctable range, using raw value", raw_celsius);
        return raw_celsius;
    }
    let error = ERROR_A * raw_celsius * raw_celsius + ERROR_B * raw_celsius + ERROR_C;
    raw_celsius - error
}
