use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::brain::{BrainFailure, CorrectiveActions};
use crate::brain_fail;
use crate::io::controls::statistics::TemperatureActuatorStatistics;
use crate::io::controls::{DigitalOutput, HeaterCoolerConfiguration, HeatingMode};
use crate::time_util::mytime::TimeProvider;

pub const DEFAULT_RELAY_SETTLE_TIME: Duration = Duration::from_millis(100);

/// Sole owner of the heater and cooler outputs.
/// Guarantees the two are never enabled at the same time.
pub struct TemperatureActuator {
    heater: Option<Box<dyn DigitalOutput>>,
    cooler: Option<Box<dyn DigitalOutput>>,
    configuration: HeaterCoolerConfiguration,
    current_heating_mode: HeatingMode,
    heating_mode_last_changed: DateTime<Utc>,
    statistics: TemperatureActuatorStatistics,
    relay_settle_time: Duration,
}

impl TemperatureActuator {
    /// Both outputs are driven low before the actuator is handed out.
    pub fn new(heater: Option<Box<dyn DigitalOutput>>, cooler: Option<Box<dyn DigitalOutput>>, time: &dyn TimeProvider) -> Result<Self, BrainFailure> {
        let configuration = HeaterCoolerConfiguration::from_outputs(heater.is_some(), cooler.is_some());
        if configuration == HeaterCoolerConfiguration::None {
            warn!("No heater or cooler available, temperature will only be monitored.");
        }
        info!("Temperature actuator configuration: {}", configuration);

        let mut actuator = Self {
            heater,
            cooler,
            configuration,
            current_heating_mode: HeatingMode::Off,
            heating_mode_last_changed: time.get_utc_time(),
            statistics: TemperatureActuatorStatistics::default(),
            relay_settle_time: DEFAULT_RELAY_SETTLE_TIME,
        };
        actuator.disable_all()?;
        Ok(actuator)
    }

    pub fn with_relay_settle_time(mut self, relay_settle_time: Duration) -> Self {
        self.relay_settle_time = relay_settle_time;
        self
    }

    pub fn configuration(&self) -> HeaterCoolerConfiguration {
        self.configuration
    }

    pub fn current_heating_mode(&self) -> HeatingMode {
        self.current_heating_mode
    }

    pub fn statistics(&self) -> &TemperatureActuatorStatistics {
        &self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics.reset();
    }

    /// Switch to the given mode, returning the mode that was active before.
    pub fn set_heating_mode(&mut self, mode: HeatingMode, time: &dyn TimeProvider) -> Result<HeatingMode, BrainFailure> {
        if mode == self.current_heating_mode {
            return Err(brain_fail!(format!("Already in heating mode {}", mode)));
        }
        if !self.configuration.can_use_heating_mode(mode) {
            return Err(brain_fail!(format!("Heating mode {} is not possible with configuration {}", mode, self.configuration)));
        }

        match mode {
            HeatingMode::Off => self.disable_all()?,
            HeatingMode::Heating => self.switch_to(true)?,
            HeatingMode::Cooling => self.switch_to(false)?,
        }

        self.check_not_both_enabled()?;

        let previous = self.record_transition(mode, time.get_utc_time());
        Ok(previous)
    }

    /// Drive both outputs low whatever mode we think we are in.
    pub fn force_off(&mut self, time: &dyn TimeProvider) -> Result<(), BrainFailure> {
        self.disable_all()?;
        if self.current_heating_mode != HeatingMode::Off {
            self.record_transition(HeatingMode::Off, time.get_utc_time());
        }
        Ok(())
    }

    fn switch_to(&mut self, heating: bool) -> Result<(), BrainFailure> {
        let (opposing, wanted) = if heating {
            (&mut self.cooler, &mut self.heater)
        } else {
            (&mut self.heater, &mut self.cooler)
        };

        if let Some(opposing) = opposing.as_mut() {
            opposing.disable()?;
            if !self.relay_settle_time.is_zero() {
                std::thread::sleep(self.relay_settle_time);
            }
        }

        match wanted.as_mut() {
            Some(wanted) => wanted.enable(),
            None => Err(brain_fail!("Output missing for a mode the configuration allows")),
        }
    }

    fn disable_all(&mut self) -> Result<(), BrainFailure> {
        let heater_result = self.heater.as_mut().map_or(Ok(()), |heater| heater.disable());
        let cooler_result = self.cooler.as_mut().map_or(Ok(()), |cooler| cooler.disable());
        heater_result.and(cooler_result)
    }

    fn check_not_both_enabled(&mut self) -> Result<(), BrainFailure> {
        let heater_on = self.heater.as_ref().map_or(Ok(false), |heater| heater.is_enabled())?;
        let cooler_on = self.cooler.as_ref().map_or(Ok(false), |cooler| cooler.is_enabled())?;
        if heater_on && cooler_on {
            error!("Heater and cooler were both enabled! Disabling both.");
            if let Err(e) = self.disable_all() {
                error!("Failed to disable outputs after both were enabled: {}", e);
            }
            self.current_heating_mode = HeatingMode::Off;
            return Err(brain_fail!("Heater and cooler were enabled at the same time", CorrectiveActions::halt()));
        }
        Ok(())
    }

    fn record_transition(&mut self, mode: HeatingMode, now: DateTime<Utc>) -> HeatingMode {
        let previous = self.current_heating_mode;
        let time_in_previous = (now - self.heating_mode_last_changed).to_std().unwrap_or_default();
        self.statistics.add_time(previous, time_in_previous);
        self.current_heating_mode = mode;
        self.heating_mode_last_changed = now;
        info!("Heating mode {} -> {} after {}s", previous, mode, time_in_previous.as_secs());
        debug!("Actuator statistics: {}", self.statistics);
        previous
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use strum::IntoEnumIterator;

    use crate::io::dummy::DummyOutputs;
    use crate::time_util::test_utils::dummy_clock;

    use super::*;

    fn new_actuator(outputs: &DummyOutputs, heater: bool, cooler: bool) -> TemperatureActuator {
        let heater: Option<Box<dyn DigitalOutput>> = if heater { Some(Box::new(outputs.heater())) } else { None };
        let cooler: Option<Box<dyn DigitalOutput>> = if cooler { Some(Box::new(outputs.cooler())) } else { None };
        TemperatureActuator::new(heater, cooler, &dummy_clock())
            .unwrap()
            .with_relay_settle_time(Duration::ZERO)
    }

    #[test_log::test]
    fn test_never_both_enabled() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();

        // Every ordered pair of transitions, repeated.
        for _ in 0..3 {
            for from in HeatingMode::iter() {
                for to in HeatingMode::iter() {
                    if actuator.current_heating_mode() != from {
                        actuator.set_heating_mode(from, &time).unwrap();
                    }
                    if from != to {
                        actuator.set_heating_mode(to, &time).unwrap();
                    }
                    assert!(!(outputs.is_heater_enabled() && outputs.is_cooler_enabled()));
                }
            }
        }
        assert!(!outputs.were_both_ever_enabled());
    }

    #[test]
    fn test_outputs_follow_mode() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();

        assert_eq!(actuator.set_heating_mode(HeatingMode::Heating, &time).unwrap(), HeatingMode::Off);
        assert!(outputs.is_heater_enabled());
        assert!(!outputs.is_cooler_enabled());

        assert_eq!(actuator.set_heating_mode(HeatingMode::Cooling, &time).unwrap(), HeatingMode::Heating);
        assert!(!outputs.is_heater_enabled());
        assert!(outputs.is_cooler_enabled());

        assert_eq!(actuator.set_heating_mode(HeatingMode::Off, &time).unwrap(), HeatingMode::Cooling);
        assert!(!outputs.is_heater_enabled());
        assert!(!outputs.is_cooler_enabled());
    }

    #[test]
    fn test_already_in_mode() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();

        assert!(actuator.set_heating_mode(HeatingMode::Off, &time).is_err());
        actuator.set_heating_mode(HeatingMode::Heating, &time).unwrap();
        let err = actuator.set_heating_mode(HeatingMode::Heating, &time).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Heating);
        assert!(outputs.is_heater_enabled());
    }

    #[test]
    fn test_disallowed_mode() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, false);
        let time = dummy_clock();
        assert_eq!(actuator.configuration(), HeaterCoolerConfiguration::Heater);
        assert!(actuator.set_heating_mode(HeatingMode::Cooling, &time).is_err());
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Off);

        let mut none = new_actuator(&outputs, false, false);
        assert_eq!(none.configuration(), HeaterCoolerConfiguration::None);
        assert!(none.set_heating_mode(HeatingMode::Heating, &time).is_err());
        assert!(none.set_heating_mode(HeatingMode::Cooling, &time).is_err());
    }

    #[test_log::test]
    fn test_welded_relay_halts() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();
        actuator.set_heating_mode(HeatingMode::Heating, &time).unwrap();
        outputs.weld_heater();

        let err = actuator.set_heating_mode(HeatingMode::Cooling, &time).unwrap_err();
        assert!(err.is_fatal());
        assert!(!outputs.is_cooler_enabled());
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Off);
    }

    #[test]
    fn test_output_failure_is_not_fatal() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();
        outputs.set_cooler_failing(true);

        let err = actuator.set_heating_mode(HeatingMode::Cooling, &time).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.get_corrective_actions().is_outputs_state_unknown());
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Off);
    }

    #[test]
    fn test_statistics_track_exited_mode() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let mut time = dummy_clock();

        time.advance(ChronoDuration::minutes(10));
        actuator.set_heating_mode(HeatingMode::Heating, &time).unwrap();
        time.advance(ChronoDuration::minutes(5));
        actuator.set_heating_mode(HeatingMode::Cooling, &time).unwrap();
        time.advance(ChronoDuration::minutes(1));
        actuator.force_off(&time).unwrap();

        let stats = actuator.statistics();
        assert_eq!(stats.time_in_mode(HeatingMode::Off), Duration::from_secs(600));
        assert_eq!(stats.time_in_mode(HeatingMode::Heating), Duration::from_secs(300));
        assert_eq!(stats.time_in_mode(HeatingMode::Cooling), Duration::from_secs(60));
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Off);

        actuator.reset_statistics();
        assert_eq!(actuator.statistics().total_time(), Duration::ZERO);
    }

    #[test]
    fn test_force_off() {
        let outputs = DummyOutputs::new();
        let mut actuator = new_actuator(&outputs, true, true);
        let time = dummy_clock();
        actuator.set_heating_mode(HeatingMode::Cooling, &time).unwrap();
        actuator.force_off(&time).unwrap();
        assert!(!outputs.is_cooler_enabled());
        assert_eq!(actuator.current_heating_mode(), HeatingMode::Off);
        // Nothing to change, still fine.
        actuator.force_off(&time).unwrap();
    }
}
