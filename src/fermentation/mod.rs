use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::brain::control_task::{control_loop, TemperatureControlTask, TickOutcome};
use crate::brain::hysteresis;
use crate::brain::setpoint::{SetpointCompletion, TemperatureSetpoint};
use crate::brain::setpoint_determiner::SetpointDeterminer;
use crate::brain::{BrainFailure, CorrectiveActions};
use crate::brain_fail;
use crate::config::HysteresisConfig;
use crate::io::controls::actuator::TemperatureActuator;
use crate::io::controls::statistics::TemperatureActuatorStatistics;
use crate::io::controls::HeatingMode;
use crate::io::persistence::file::{JsonFilePersister, PROFILE_FILE, SETPOINT_COMPLETION_FILE, STATE_FILE};
use crate::io::persistence::Persister;
use crate::io::robbable::DispatchedRobbable;
use crate::io::IOBundle;
use crate::monitor::ControlUpdate;
use crate::time_util::mytime::TimeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    PendingProfile,
    Ready,
    Running,
}

pub struct Persisters {
    pub profile: Arc<dyn Persister<Vec<TemperatureSetpoint>>>,
    pub completion: Arc<dyn Persister<SetpointCompletion>>,
    pub state: Arc<dyn Persister<State>>,
}

impl Persisters {
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            profile: Arc::new(JsonFilePersister::in_directory(directory, PROFILE_FILE)),
            completion: Arc::new(JsonFilePersister::in_directory(directory, SETPOINT_COMPLETION_FILE)),
            state: Arc::new(JsonFilePersister::in_directory(directory, STATE_FILE)),
        }
    }
}

struct RunningControl {
    handle: JoinHandle<TickOutcome>,
    actuator: DispatchedRobbable<TemperatureActuator>,
    determiner: Arc<Mutex<SetpointDeterminer>>,
}

/// Owns the fermentation profile and the control loop that follows it.
pub struct FermentationController {
    state: State,
    io_bundle: IOBundle,
    hysteresis: HysteresisConfig,
    control_period: Duration,
    persisters: Persisters,
    time: Arc<dyn TimeProvider>,
    updates: Option<Sender<ControlUpdate>>,
    running: Option<RunningControl>,
}

impl FermentationController {
    pub fn new(io_bundle: IOBundle,
               hysteresis: HysteresisConfig,
               control_period: Duration,
               persisters: Persisters,
               time: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: State::PendingProfile,
            io_bundle,
            hysteresis,
            control_period,
            persisters,
            time,
            updates: None,
            running: None,
        }
    }

    pub fn with_updates(mut self, updates: Sender<ControlUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn require_state(&self, required: State, operation: &str) -> Result<(), BrainFailure> {
        if self.state != required {
            return Err(brain_fail!(format!("Cannot {} while {:?}, must be {:?}", operation, self.state, required)));
        }
        Ok(())
    }

    fn set_state(&mut self, state: State) -> Result<(), BrainFailure> {
        info!("Fermentation state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.persisters.state.write(&state)
            .map_err(|e| brain_fail!(format!("Failed to persist state {:?}: {}", state, e)))
    }

    pub fn set_profile(&mut self, setpoints: Vec<TemperatureSetpoint>) -> Result<(), BrainFailure> {
        self.require_state(State::PendingProfile, "set a profile")?;
        if setpoints.is_empty() {
            return Err(brain_fail!("A fermentation profile needs at least one setpoint"));
        }
        self.persisters.profile.write(&setpoints)
            .map_err(|e| brain_fail!(format!("Failed to persist profile: {}", e)))?;
        self.clear_completion()?;
        info!("New fermentation profile with {} stages", setpoints.len());
        self.set_state(State::Ready)
    }

    /// Starts following the profile, the first control pass happens straight away.
    pub fn start(&mut self, runtime: &Runtime) -> Result<(), BrainFailure> {
        self.require_state(State::Ready, "start")?;
        let setpoints = self.persisters.profile.read()
            .map_err(|e| brain_fail!(format!("Failed to read profile: {}", e)))?;
        let determiner = SetpointDeterminer::new(setpoints, self.persisters.completion.clone(), self.time.as_ref())?;

        let actuator = self.io_bundle.actuator()
            .map_err(|e| brain_fail!(format!("Actuator unavailable: {}", e), CorrectiveActions::unknown_outputs()))?;
        actuator.reset_statistics();
        let profile = hysteresis::from_config(&self.hysteresis, actuator.configuration(), self.time.as_ref())?;

        let mut task = TemperatureControlTask::new(determiner, self.io_bundle.thermometer(), self.io_bundle.hydrometer(), profile);
        if let Some(updates) = &self.updates {
            task = task.with_updates(updates.clone());
        }
        let determiner = task.determiner();

        let actuator = self.io_bundle.dispatch_actuator()
            .map_err(|e| brain_fail!(format!("Failed to dispatch actuator: {}", e)))?;
        let handle = runtime.spawn(control_loop(task, actuator.clone(), self.control_period, self.time.clone()));
        self.running = Some(RunningControl {
            handle,
            actuator,
            determiner,
        });
        self.set_state(State::Running)
    }

    pub fn pause(&mut self) -> Result<(), BrainFailure> {
        self.require_state(State::Running, "pause")?;
        self.stop_control()?;
        self.set_state(State::Ready)
    }

    /// Abandons the fermentation, forgetting the profile and progress through it.
    pub fn cancel(&mut self) -> Result<(), BrainFailure> {
        self.require_state(State::Running, "cancel")?;
        self.stop_control()?;
        self.clear_profile()?;
        self.set_state(State::PendingProfile)
    }

    pub fn reset(&mut self) -> Result<(), BrainFailure> {
        self.require_state(State::Ready, "reset")?;
        self.clear_profile()?;
        self.set_state(State::PendingProfile)
    }

    /// Pick up where a previous process left off.
    pub fn restore(&mut self, runtime: &Runtime) -> Result<(), BrainFailure> {
        let persisted = self.persisters.state.load_or_default(State::PendingProfile)
            .unwrap_or_else(|e| {
                warn!("Failed to read persisted state, assuming {:?}: {}", State::PendingProfile, e);
                State::PendingProfile
            });

        self.state = if self.persisters.profile.has_data() {
            State::Ready
        } else {
            State::PendingProfile
        };
        info!("Restored fermentation state {:?} (was {:?})", self.state, persisted);

        if persisted == State::Running && self.state == State::Ready {
            info!("Fermentation was running, starting again");
            self.start(runtime)?;
        }
        Ok(())
    }

    /// Stop controlling and force the outputs off, leaving the persisted state alone so a restart resumes.
    pub fn shutdown(&mut self) -> Result<(), BrainFailure> {
        if self.running.is_some() {
            self.stop_control()?;
        } else {
            self.force_off()?;
        }
        Ok(())
    }

    /// False once a running control loop has stopped by itself.
    pub fn is_control_loop_alive(&self) -> bool {
        match &self.running {
            Some(running) => !running.handle.is_finished(),
            None => self.state != State::Running,
        }
    }

    pub fn remaining_setpoint_info(&self) -> Option<String> {
        let running = self.running.as_ref()?;
        let determiner = running.determiner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(determiner.remaining_setpoint_info(self.time.as_ref()))
    }

    pub fn current_heating_mode(&mut self) -> Result<HeatingMode, BrainFailure> {
        self.with_actuator(|actuator| actuator.current_heating_mode())
    }

    pub fn statistics(&mut self) -> Result<TemperatureActuatorStatistics, BrainFailure> {
        self.with_actuator(|actuator| actuator.statistics().clone())
    }

    /// Look at the actuator without taking it away from the control loop.
    fn with_actuator<T>(&mut self, f: impl FnOnce(&TemperatureActuator) -> T) -> Result<T, BrainFailure> {
        if let Some(running) = &self.running {
            let guard = running.actuator.access();
            return guard.as_ref()
                .map(f)
                .ok_or_else(|| brain_fail!("Actuator was taken back from the control loop"));
        }
        let actuator = self.io_bundle.actuator()
            .map_err(|e| brain_fail!(format!("Actuator unavailable: {}", e)))?;
        Ok(f(actuator))
    }

    fn stop_control(&mut self) -> Result<(), BrainFailure> {
        if let Some(running) = self.running.take() {
            running.handle.abort();
            info!("Stopped temperature control");
        }
        self.force_off()
    }

    fn force_off(&mut self) -> Result<(), BrainFailure> {
        let time = self.time.clone();
        let actuator = self.io_bundle.actuator()
            .map_err(|e| brain_fail!(format!("Failed to take back actuator: {}", e), CorrectiveActions::unknown_outputs()))?;
        actuator.force_off(time.as_ref()).map_err(|e| {
            error!("Failed to force outputs off: {}", e);
            e
        })
    }

    fn clear_profile(&mut self) -> Result<(), BrainFailure> {
        self.persisters.profile.clear()
            .map_err(|e| brain_fail!(format!("Failed to clear profile: {}", e)))?;
        self.clear_completion()
    }

    fn clear_completion(&mut self) -> Result<(), BrainFailure> {
        self.persisters.completion.clear()
            .map_err(|e| brain_fail!(format!("Failed to clear setpoint completion: {}", e)))
    }
}
