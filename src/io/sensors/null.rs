use crate::io::sensors::{HydrometerReader, HydrometerReading, ThermometerReader, ThermometerReading};

/// Stands in when no thermometer is fitted.
pub struct NullThermometer;

impl ThermometerReader for NullThermometer {
    fn read(&self) -> Result<Option<ThermometerReading>, String> {
        Ok(None)
    }
}

pub struct NullHydrometer;

impl HydrometerReader for NullHydrometer {
    fn read(&self) -> Result<Option<HydrometerReading>, String> {
        Ok(None)
    }
}
