use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::io::controls::HeatingMode;

/// Cumulative time spent in each heating mode since the last reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureActuatorStatistics {
    heating_time: Duration,
    cooling_time: Duration,
    off_time: Duration,
}

impl TemperatureActuatorStatistics {
    pub fn add_time(&mut self, mode: HeatingMode, time: Duration) {
        match mode {
            HeatingMode::Heating => self.heating_time += time,
            HeatingMode::Cooling => self.cooling_time += time,
            HeatingMode::Off => self.off_time += time,
        }
    }

    pub fn time_in_mode(&self, mode: HeatingMode) -> Duration {
        match mode {
            HeatingMode::Heating => self.heating_time,
            HeatingMode::Cooling => self.cooling_time,
            HeatingMode::Off => self.off_time,
        }
    }

    pub fn total_time(&self) -> Duration {
        self.heating_time + self.cooling_time + self.off_time
    }

    /// 0 when nothing has been recorded yet.
    pub fn percent_in_mode(&self, mode: HeatingMode) -> f64 {
        let total = self.total_time().as_secs_f64();
        if total == 0.0 {
            return 0.0;
        }
        self.time_in_mode(mode).as_secs_f64() / total * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Display for TemperatureActuatorStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Heating: {}s ({:.1}%), Cooling: {}s ({:.1}%), Off: {}s ({:.1}%)",
               self.heating_time.as_secs(), self.percent_in_mode(HeatingMode::Heating),
               self.cooling_time.as_secs(), self.percent_in_mode(HeatingMode::Cooling),
               self.off_time.as_secs(), self.percent_in_mode(HeatingMode::Off))
    }
}
