use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::BrewfatherConfig;
use crate::monitor::FermentationSnapshot;

const BREWFATHER_URL: &str = "http://log.brewfather.net/stream";
pub const MAX_ATTEMPTS: usize = 5;
pub const DELAY_BETWEEN_ATTEMPTS: Duration = Duration::from_secs(5);

#[async_trait]
pub trait SnapshotUploader: Send + Sync {
    async fn upload(&self, snapshot: &FermentationSnapshot) -> Result<(), UploadError>;
}

#[derive(Debug)]
pub enum UploadError {
    Network(reqwest::Error),
    Json(serde_json::Error),
    Rejected(String),
}

impl Display for UploadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Network(e) => write!(f, "Network Error: {}", e),
            UploadError::Json(e) => write!(f, "Deserialization Error: {}", e),
            UploadError::Rejected(result) => write!(f, "Rejected: {}", result),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Network(e)
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(e: serde_json::Error) -> Self {
        UploadError::Json(e)
    }
}

/// The custom stream format. Field names are part of the Brewfather API.
#[derive(Serialize, Debug, PartialEq)]
pub struct BrewfatherPayload {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gravity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gravity_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl BrewfatherPayload {
    pub fn from_snapshot(device_name: &str, snapshot: &FermentationSnapshot) -> Self {
        let comment = format!("{} {}", snapshot.stage, snapshot.heating_mode);
        Self {
            name: device_name.to_owned(),
            temp: snapshot.temperature.map(|t| t.value()),
            temp_unit: snapshot.temperature.map(|t| t.unit().symbol()),
            gravity: snapshot.specific_gravity,
            gravity_unit: snapshot.specific_gravity.map(|_| "G"),
            comment: Some(comment).filter(|comment| !comment.trim().is_empty()),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct BrewfatherResult {
    result: String,
}

impl BrewfatherResult {
    pub fn is_successful(&self) -> bool {
        self.result == "success"
    }
}

pub struct Brewfather {
    client: Client,
    stream_id: String,
    device_name: String,
    attempts: usize,
    delay: Duration,
}

impl Brewfather {
    pub fn new(config: &BrewfatherConfig) -> Self {
        Self {
            client: Client::new(),
            stream_id: config.get_stream_id().to_owned(),
            device_name: config.get_device_name().to_owned(),
            attempts: MAX_ATTEMPTS,
            delay: DELAY_BETWEEN_ATTEMPTS,
        }
    }

    async fn post(&self, payload: &BrewfatherPayload) -> Result<BrewfatherResult, UploadError> {
        let response = self.client.post(BREWFATHER_URL)
            .query(&[("id", &self.stream_id)])
            .json(payload)
            .send()
            .await?
            .text()
            .await?;
        Ok(serde_json::from_str(&response)?)
    }
}

#[async_trait]
impl SnapshotUploader for Brewfather {
    async fn upload(&self, snapshot: &FermentationSnapshot) -> Result<(), UploadError> {
        let payload = BrewfatherPayload::from_snapshot(&self.device_name, snapshot);
        debug!("Uploading to Brewfather: {:?}", payload);
        let result = retry(self.attempts, self.delay, |_| self.post(&payload)).await?;
        if result.is_successful() {
            info!("Uploaded snapshot to Brewfather");
            Ok(())
        } else {
            Err(UploadError::Rejected(result.result))
        }
    }
}

/// Try up to `attempts` times, sleeping `delay` between failures. The last error is returned.
pub async fn retry<T, E, F, Fut>(attempts: usize, delay: Duration, mut f: F) -> Result<T, E>
    where F: FnMut(usize) -> Fut,
          Fut: Future<Output=Result<T, E>>,
          E: Display {
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                error!("Giving up after {} attempts: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                debug!("Attempt {} of {} failed: {}", attempt, attempts, e);
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
