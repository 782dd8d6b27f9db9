use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use serde_with::DurationSeconds;

use crate::temperature::Temperature;

/// One stage of a fermentation profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemperatureSetpoint {
    SpecificGravityBased(SpecificGravityBasedSetpoint),
    TimeBased(TimeBasedSetpoint),
}

impl TemperatureSetpoint {
    pub fn temperature(&self) -> Temperature {
        match self {
            TemperatureSetpoint::SpecificGravityBased(setpoint) => setpoint.temp_setpoint,
            TemperatureSetpoint::TimeBased(setpoint) => setpoint.temp_setpoint,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            TemperatureSetpoint::SpecificGravityBased(setpoint) => &setpoint.stage_description,
            TemperatureSetpoint::TimeBased(setpoint) => &setpoint.stage_description,
        }
    }

    /// The description, or the 1-based stage number when there isn't one.
    pub fn stage_name(&self, index: usize) -> String {
        if self.description().trim().is_empty() {
            format!("{}", index + 1)
        } else {
            self.description().to_owned()
        }
    }
}

impl Display for TemperatureSetpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TemperatureSetpoint::SpecificGravityBased(setpoint) => {
                write!(f, "{}[{} until SG {}]", setpoint.stage_description, setpoint.temp_setpoint, setpoint.until_sg)
            }
            TemperatureSetpoint::TimeBased(setpoint) => {
                write!(f, "{}[{} for {} includeRamp={}]", setpoint.stage_description, setpoint.temp_setpoint,
                       as_days_hours_mins(setpoint.duration), setpoint.include_ramp)
            }
        }
    }
}

/// Hold until the measured specific gravity drops to `until_sg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificGravityBasedSetpoint {
    pub temp_setpoint: Temperature,
    pub until_sg: f64,
    #[serde(default)]
    pub stage_description: String,
}

impl SpecificGravityBasedSetpoint {
    pub fn new(temp_setpoint: Temperature, until_sg: f64, stage_description: &str) -> Self {
        Self {
            temp_setpoint,
            until_sg,
            stage_description: stage_description.to_owned(),
        }
    }
}

/// Hold for a fixed duration after the previous stage finished.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBasedSetpoint {
    pub temp_setpoint: Temperature,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    #[serde(default)]
    pub stage_description: String,
    #[serde(default = "default_include_ramp")]
    pub include_ramp: bool,
}

fn default_include_ramp() -> bool {
    true
}

impl TimeBasedSetpoint {
    pub fn new(temp_setpoint: Temperature, duration: Duration, stage_description: &str) -> Self {
        Self {
            temp_setpoint,
            duration,
            stage_description: stage_description.to_owned(),
            include_ramp: true,
        }
    }
}

/// Where we are in a profile. Persisted after every stage change so a restart resumes at the same stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetpointCompletion {
    /// The setpoint expected at `current_setpoint_index`, used to notice when the profile has changed underneath us.
    pub setpoint: Option<TemperatureSetpoint>,
    pub current_setpoint_index: usize,
    pub previous_setpoint_completion_time: DateTime<Utc>,
}

impl SetpointCompletion {
    pub fn beginning(setpoints: &[TemperatureSetpoint], now: DateTime<Utc>) -> Self {
        Self {
            setpoint: setpoints.first().cloned(),
            current_setpoint_index: 0,
            previous_setpoint_completion_time: now,
        }
    }
}

pub fn as_days_hours_mins(duration: Duration) -> String {
    let mins = duration.as_secs() / 60;
    let hours = mins / 60;
    if hours >= 24 {
        format!("{}d {}h {}m", hours / 24, hours % 24, mins % 60)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins % 60)
    } else {
        format!("{}m {}s", mins, duration.as_secs() % 60)
    }
}
