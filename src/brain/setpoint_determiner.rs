use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::brain::setpoint::{as_days_hours_mins, SetpointCompletion, TemperatureSetpoint};
use crate::brain::BrainFailure;
use crate::brain_fail;
use crate::io::persistence::Persister;
use crate::io::sensors::HydrometerReading;
use crate::time_util::mytime::TimeProvider;

/// Walks through the stages of a fermentation profile, checkpointing progress on every stage change.
pub struct SetpointDeterminer {
    setpoints: Vec<TemperatureSetpoint>,
    persister: Arc<dyn Persister<SetpointCompletion>>,
    completion: SetpointCompletion,
    complete_logged: bool,
}

impl SetpointDeterminer {
    /// Resumes from the persisted completion if it still matches the profile, otherwise starts at the first stage.
    pub fn new(setpoints: Vec<TemperatureSetpoint>, persister: Arc<dyn Persister<SetpointCompletion>>, time: &dyn TimeProvider) -> Result<Self, BrainFailure> {
        if setpoints.is_empty() {
            return Err(brain_fail!("A fermentation profile needs at least one setpoint"));
        }
        for setpoint in &setpoints {
            if let TemperatureSetpoint::TimeBased(time_based) = setpoint {
                if !time_based.include_ramp {
                    warn!("Excluding ramp time is not supported, stage {} will include the time spent ramping", setpoint);
                }
            }
        }

        let now = time.get_utc_time();
        let persisted = if persister.has_data() {
            match persister.read() {
                Ok(completion) => Some(completion),
                Err(e) => {
                    warn!("Failed to read persisted setpoint completion, ignoring it: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let resumed = persisted.filter(|completion| {
            let matches = matches_profile(completion, &setpoints);
            if !matches {
                info!("Setpoint mismatch from persisted data. Persisted: {:?} at index {}. Ignoring persisted data",
                      completion.setpoint, completion.current_setpoint_index);
            }
            matches
        });

        let completion = match resumed {
            Some(completion) => {
                info!("Resuming fermentation profile at stage {}", completion.current_setpoint_index + 1);
                completion
            }
            None => {
                let beginning = SetpointCompletion::beginning(&setpoints, now);
                // Checkpoint the start so a restart during the first stage keeps its elapsed time.
                persister.write(&beginning)
                    .map_err(|e| brain_fail!(format!("Failed to persist start of fermentation profile: {}", e)))?;
                beginning
            }
        };

        Ok(Self {
            setpoints,
            persister,
            completion,
            complete_logged: false,
        })
    }

    pub fn current_setpoint_index(&self) -> usize {
        self.completion.current_setpoint_index
    }

    pub fn setpoints(&self) -> &[TemperatureSetpoint] {
        &self.setpoints
    }

    /// Past the end of the profile the last stage stays active.
    pub fn active_setpoint(&self) -> &TemperatureSetpoint {
        let last = self.setpoints.len() - 1;
        &self.setpoints[self.current_setpoint_index().min(last)]
    }

    /// Get the setpoint to aim for now, moving on to the next stage first if the current one is done.
    pub fn get_setpoint(&mut self, hydrometer: Option<&HydrometerReading>, time: &dyn TimeProvider) -> Result<TemperatureSetpoint, BrainFailure> {
        let now = time.get_utc_time();
        if self.is_current_stage_fulfilled(hydrometer, now)? {
            let index = self.current_setpoint_index();
            let stage_name = self.active_setpoint().stage_name(index);
            if index + 1 >= self.setpoints.len() {
                if !self.complete_logged {
                    warn!("Final stage \"{}\" fulfilled. Continuing to hold {}. Is your batch done?",
                          stage_name, self.active_setpoint().temperature());
                    self.complete_logged = true;
                }
            } else {
                info!("Fermentation stage \"{}\" fulfilled. Moving to next stage", stage_name);
                let next = SetpointCompletion {
                    setpoint: Some(self.setpoints[index + 1].clone()),
                    current_setpoint_index: index + 1,
                    previous_setpoint_completion_time: now,
                };
                self.persister.write(&next)
                    .map_err(|e| brain_fail!(format!("Failed to persist move to stage {}: {}", index + 2, e)))?;
                self.completion = next;
            }
        }
        Ok(self.active_setpoint().clone())
    }

    fn is_current_stage_fulfilled(&self, hydrometer: Option<&HydrometerReading>, now: DateTime<Utc>) -> Result<bool, BrainFailure> {
        match self.active_setpoint() {
            TemperatureSetpoint::SpecificGravityBased(setpoint) => {
                let reading = hydrometer.ok_or_else(|| brain_fail!("Specific gravity based setpoint in use but no hydrometer reading available"))?;
                let fulfilled = reading.specific_gravity <= setpoint.until_sg;
                debug!("Specific gravity {:.3} {} target {:.3}", reading.specific_gravity,
                       if fulfilled { "satisfies" } else { "does not yet satisfy" }, setpoint.until_sg);
                Ok(fulfilled)
            }
            TemperatureSetpoint::TimeBased(setpoint) => {
                Ok(self.elapsed(now) >= setpoint.duration)
            }
        }
    }

    fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.completion.previous_setpoint_completion_time).to_std().unwrap_or_default()
    }

    pub fn remaining_setpoint_info(&self, time: &dyn TimeProvider) -> String {
        let index = self.current_setpoint_index().min(self.setpoints.len() - 1);
        let setpoint = self.active_setpoint();
        let stage = format!("Stage {}/{} \"{}\"", index + 1, self.setpoints.len(), setpoint.stage_name(index));
        match setpoint {
            TemperatureSetpoint::TimeBased(time_based) => {
                let elapsed = self.elapsed(time.get_utc_time());
                let remaining = time_based.duration.saturating_sub(elapsed);
                let percent = if time_based.duration.is_zero() {
                    100.0
                } else {
                    (elapsed.as_secs_f64() / time_based.duration.as_secs_f64() * 100.0).min(100.0)
                };
                format!("{}: holding {} with {} remaining ({:.1}% complete)", stage, time_based.temp_setpoint,
                        as_days_hours_mins(remaining), percent)
            }
            TemperatureSetpoint::SpecificGravityBased(sg_based) => {
                format!("{}: holding {} until specific gravity reaches {:.3}", stage, sg_based.temp_setpoint, sg_based.until_sg)
            }
        }
    }
}

fn matches_profile(completion: &SetpointCompletion, setpoints: &[TemperatureSetpoint]) -> bool {
    let index = completion.current_setpoint_index;
    if index < setpoints.len() {
        return completion.setpoint.as_ref() == Some(&setpoints[index]);
    }
    index == setpoints.len() && match &completion.setpoint {
        None => true,
        Some(setpoint) => setpoints.last() == Some(setpoint),
    }
}
