use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;
use tokio::time::MissedTickBehavior;

use crate::io::controls::HeatingMode;
use crate::io::persistence::PersistError;
use crate::monitor::brewfather::SnapshotUploader;
use crate::temperature::Temperature;
use crate::time_util::mytime::TimeProvider;

pub mod brewfather;

pub const MAX_SNAPSHOTS: usize = 10_000;

/// Sent by the control loop after every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlUpdate {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub setpoint: Temperature,
    pub temperature: Option<Temperature>,
    pub specific_gravity: Option<f64>,
    pub heating_mode: HeatingMode,
    pub mode_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FermentationSnapshot {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<Temperature>,
    pub specific_gravity: Option<f64>,
    pub setpoint: Temperature,
    pub stage: String,
    pub heating_mode: HeatingMode,
    /// Captured because the heating mode changed rather than on the regular schedule.
    pub out_of_band: bool,
}

impl FermentationSnapshot {
    fn from_update(update: &ControlUpdate, timestamp: DateTime<Utc>, out_of_band: bool) -> Self {
        Self {
            timestamp,
            temperature: update.temperature,
            specific_gravity: update.specific_gravity,
            setpoint: update.setpoint,
            stage: update.stage.clone(),
            heating_mode: update.heating_mode,
            out_of_band,
        }
    }
}

pub struct FermentationMonitor {
    latest: Option<ControlUpdate>,
    snapshots: VecDeque<FermentationSnapshot>,
    snapshot_log: Option<PathBuf>,
}

impl FermentationMonitor {
    pub fn new() -> Self {
        Self {
            latest: None,
            snapshots: VecDeque::new(),
            snapshot_log: None,
        }
    }

    /// Also append every snapshot as a line of JSON to this file.
    pub fn with_snapshot_log(mut self, snapshot_log: PathBuf) -> Self {
        self.snapshot_log = Some(snapshot_log);
        self
    }

    pub fn latest_update(&self) -> Option<&ControlUpdate> {
        self.latest.as_ref()
    }

    pub fn snapshots(&self) -> &VecDeque<FermentationSnapshot> {
        &self.snapshots
    }

    pub fn clear(&mut self) {
        self.latest = None;
        self.snapshots.clear();
    }

    /// Returns the out-of-band snapshot if the heating mode changed.
    pub fn on_update(&mut self, update: ControlUpdate) -> Option<FermentationSnapshot> {
        let snapshot = update.mode_changed
            .then(|| FermentationSnapshot::from_update(&update, update.timestamp, true));
        self.latest = Some(update);
        if let Some(snapshot) = &snapshot {
            self.record(snapshot.clone());
        }
        snapshot
    }

    /// A regular snapshot from the latest update, if there has been one.
    pub fn on_schedule(&mut self, now: DateTime<Utc>) -> Option<FermentationSnapshot> {
        let snapshot = FermentationSnapshot::from_update(self.latest.as_ref()?, now, false);
        self.record(snapshot.clone());
        Some(snapshot)
    }

    fn record(&mut self, snapshot: FermentationSnapshot) {
        info!("Snapshot: {:?} SG {:?}, setpoint {} ({}), {}{}",
              snapshot.temperature.map(|t| t.to_string()), snapshot.specific_gravity, snapshot.setpoint,
              snapshot.stage, snapshot.heating_mode, if snapshot.out_of_band { " (mode change)" } else { "" });
        if let Err(e) = self.append_to_log(&snapshot) {
            error!("Failed to append snapshot to log: {}", e);
        }
        if self.snapshots.len() >= MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    fn append_to_log(&self, snapshot: &FermentationSnapshot) -> Result<(), PersistError> {
        let path = match &self.snapshot_log {
            Some(path) => path,
            None => return Ok(()),
        };
        let line = serde_json::to_string(snapshot)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl Default for FermentationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(monitor: &Mutex<FermentationMonitor>) -> std::sync::MutexGuard<'_, FermentationMonitor> {
    monitor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consumes control updates and takes a snapshot every `period`, uploading the regular ones.
/// Runs until every sender has gone away.
pub async fn run_monitor(monitor: Arc<Mutex<FermentationMonitor>>,
                         mut updates: Receiver<ControlUpdate>,
                         period: Duration,
                         uploader: Option<Arc<dyn SnapshotUploader>>,
                         time: Arc<dyn TimeProvider>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately, before there is anything to record.
    interval.tick().await;

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(update) => {
                        debug!("Control update: {:?}", update);
                        lock(&monitor).on_update(update);
                    }
                    None => {
                        info!("Control updates closed, stopping monitor");
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                let snapshot = lock(&monitor).on_schedule(time.get_utc_time());
                match (snapshot, &uploader) {
                    (Some(snapshot), Some(uploader)) => {
                        let uploader = uploader.clone();
                        tokio::spawn(async move {
                            if let Err(e) = uploader.upload(&snapshot).await {
                                error!("Failed to upload snapshot: {}", e);
                            }
                        });
                    }
                    (None, _) => warn!("No control update yet, skipping snapshot"),
                    _ => {}
                }
            }
        }
    }
}
