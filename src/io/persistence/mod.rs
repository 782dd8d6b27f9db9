use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub mod file;

#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    Other(String),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "IO error: {}", e),
            PersistError::Serde(e) => write!(f, "Serialization error: {}", e),
            PersistError::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Serde(e)
    }
}

/// Durable storage for a single value.
/// A successful write must survive a crash immediately afterwards.
pub trait Persister<T>: Send + Sync {
    fn has_data(&self) -> bool;

    fn read(&self) -> Result<T, PersistError>;

    fn write(&self, value: &T) -> Result<(), PersistError>;

    fn clear(&self) -> Result<(), PersistError>;

    fn load_or_default(&self, default: T) -> Result<T, PersistError> {
        if self.has_data() {
            self.read()
        } else {
            Ok(default)
        }
    }
}

/// Keeps the value in memory only. Can be told to fail writes.
pub struct InMemoryPersister<T> {
    value: Mutex<Option<T>>,
    fail_writes: Mutex<bool>,
}

impl<T> Default for InMemoryPersister<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            fail_writes: Mutex::new(false),
        }
    }
}

impl<T> InMemoryPersister<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut fail_writes) = self.fail_writes.lock() {
            *fail_writes = fail;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<T>>, PersistError> {
        self.value.lock().map_err(|_| PersistError::Other("In memory persister poisoned".to_owned()))
    }
}

impl<T: Clone + Send> Persister<T> for InMemoryPersister<T> {
    fn has_data(&self) -> bool {
        self.lock().map(|value| value.is_some()).unwrap_or(false)
    }

    fn read(&self) -> Result<T, PersistError> {
        self.lock()?.clone().ok_or_else(|| PersistError::Other("Nothing persisted".to_owned()))
    }

    fn write(&self, value: &T) -> Result<(), PersistError> {
        if self.fail_writes.lock().map(|fail| *fail).unwrap_or(true) {
            return Err(PersistError::Io(std::io::Error::new(std::io::ErrorKind::Other, "Simulated write failure")));
        }
        *self.lock()? = Some(value.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.lock()? = None;
        Ok(())
    }
}
