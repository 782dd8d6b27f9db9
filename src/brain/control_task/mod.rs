use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;

use crate::brain::hysteresis::HysteresisProfile;
use crate::brain::setpoint_determiner::SetpointDeterminer;
use crate::brain::BrainFailure;
use crate::brain_fail;
use crate::io::controls::actuator::TemperatureActuator;
use crate::io::controls::HeatingMode;
use crate::io::robbable::DispatchedRobbable;
use crate::io::sensors::{best_temperature, HydrometerReader, ThermometerReader};
use crate::monitor::ControlUpdate;
use crate::temperature::Temperature;
use crate::time_util::mytime::TimeProvider;


/// What was known when a tick failed, so the log says enough to diagnose it.
#[derive(Debug, Default)]
struct TickContext {
    setpoint: Option<Temperature>,
    reading: Option<Temperature>,
    mode: Option<HeatingMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The actuator was taken back, the loop must stop.
    Revoked,
    /// A safety violation, outputs have been forced off and the loop must stop.
    Halted,
}

/// One pass of: read sensors, pick the setpoint, decide the heating mode, drive the actuator.
pub struct TemperatureControlTask {
    determiner: Arc<Mutex<SetpointDeterminer>>,
    thermometer: Arc<dyn ThermometerReader>,
    hydrometer: Arc<dyn HydrometerReader>,
    profile: Box<dyn HysteresisProfile>,
    updates: Option<Sender<ControlUpdate>>,
}

impl TemperatureControlTask {
    pub fn new(determiner: SetpointDeterminer,
               thermometer: Arc<dyn ThermometerReader>,
               hydrometer: Arc<dyn HydrometerReader>,
               profile: Box<dyn HysteresisProfile>) -> Self {
        Self {
            determiner: Arc::new(Mutex::new(determiner)),
            thermometer,
            hydrometer,
            profile,
            updates: None,
        }
    }

    pub fn with_updates(mut self, updates: Sender<ControlUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Shared so the stage can be reported while the loop owns the task.
    pub fn determiner(&self) -> Arc<Mutex<SetpointDeterminer>> {
        self.determiner.clone()
    }

    fn lock_determiner(&self) -> MutexGuard<'_, SetpointDeterminer> {
        self.determiner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn run_once(&mut self, actuator: &mut TemperatureActuator, time: &dyn TimeProvider) -> Result<ControlUpdate, BrainFailure> {
        let mut context = TickContext::default();
        self.run_with_context(actuator, time, &mut context)
    }

    fn run_with_context(&mut self, actuator: &mut TemperatureActuator, time: &dyn TimeProvider, context: &mut TickContext) -> Result<ControlUpdate, BrainFailure> {
        context.mode = Some(actuator.current_heating_mode());

        let hydrometer = self.hydrometer.read()
            .map_err(|e| brain_fail!(format!("Failed to read hydrometer: {}", e)))?;

        let setpoint = self.lock_determiner().get_setpoint(hydrometer.as_ref(), time)?;
        context.setpoint = Some(setpoint.temperature());

        let thermometer = self.thermometer.read()
            .map_err(|e| brain_fail!(format!("Failed to read thermometer: {}", e)))?;
        let reading = best_temperature(thermometer.as_ref(), hydrometer.as_ref());
        context.reading = reading;

        let current_mode = actuator.current_heating_mode();
        let desired_mode = self.profile.determine_heating_mode(&setpoint.temperature(), reading.as_ref(), current_mode, time);

        let mode_changed = desired_mode != current_mode;
        if mode_changed {
            actuator.set_heating_mode(desired_mode, time)?;
        }

        let update = ControlUpdate {
            timestamp: time.get_utc_time(),
            stage: setpoint.to_string(),
            setpoint: setpoint.temperature(),
            temperature: reading,
            specific_gravity: hydrometer.map(|reading| reading.specific_gravity),
            heating_mode: desired_mode,
            mode_changed,
        };
        self.send_update(&update);
        Ok(update)
    }

    /// Routine updates are dropped if the monitor is behind, a mode change waits for room.
    /// Must not be called from async code, the control loop calls it inside `block_in_place`.
    fn send_update(&self, update: &ControlUpdate) {
        let updates = match &self.updates {
            Some(updates) => updates,
            None => return,
        };
        if update.mode_changed {
            if updates.blocking_send(update.clone()).is_err() {
                warn!("Monitor has stopped, dropped heating mode change");
            }
            return;
        }
        match updates.try_send(update.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Monitor is not keeping up, dropped control update"),
            Err(TrySendError::Closed(_)) => warn!("Monitor has stopped, dropped control update"),
        }
    }

    /// Runs one pass, logging failures. Only a fatal failure is returned.
    /// If an output failed to switch, both are driven off so the recorded mode matches the relays.
    pub fn run(&mut self, actuator: &mut TemperatureActuator, time: &dyn TimeProvider) -> Result<(), BrainFailure> {
        let mut context = TickContext::default();
        match self.run_with_context(actuator, time, &mut context) {
            Ok(_) => Ok(()),
            Err(failure) => {
                error!("Temperature control failed (setpoint: {:?}, reading: {:?}, mode: {:?}): {}",
                       context.setpoint.map(|t| t.to_string()), context.reading.map(|t| t.to_string()),
                       context.mode, failure);
                if failure.is_fatal() {
                    return Err(failure);
                }
                if failure.get_corrective_actions().is_outputs_state_unknown() {
                    warn!("Output state unknown, forcing heater and cooler off until the next pass");
                    if let Err(e) = actuator.force_off(time) {
                        error!("Failed to force outputs off: {}", e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Runs one pass against a dispatched actuator.
    pub fn tick(&mut self, actuator: &DispatchedRobbable<TemperatureActuator>, time: &dyn TimeProvider) -> TickOutcome {
        let mut guard = actuator.access();
        let actuator = match guard.as_mut() {
            Some(actuator) => actuator,
            None => return TickOutcome::Revoked,
        };
        match self.run(actuator, time) {
            Ok(()) => TickOutcome::Continue,
            Err(failure) => {
                error!("Halting temperature control: {}", failure.get_description());
                if let Err(e) = actuator.force_off(time) {
                    error!("FAILED TO FORCE OUTPUTS OFF: {}", e);
                }
                TickOutcome::Halted
            }
        }
    }
}

/// Runs the task every `period`, the first pass straight away, until the actuator is taken back or a pass halts.
pub async fn control_loop(mut task: TemperatureControlTask,
                          actuator: DispatchedRobbable<TemperatureActuator>,
                          period: Duration,
                          time: Arc<dyn TimeProvider>) -> TickOutcome {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting temperature control every {}s", period.as_secs());
    loop {
        interval.tick().await;
        let outcome = tokio::task::block_in_place(|| task.tick(&actuator, time.as_ref()));
        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::Revoked => {
                info!("Actuator taken back, stopping temperature control");
                return outcome;
            }
            TickOutcome::Halted => {
                error!("Temperature control halted");
                return outcome;
            }
        }
    }
}
