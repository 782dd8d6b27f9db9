use std::fs;
use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::io::persistence::{PersistError, Persister};

pub const PROFILE_FILE: &str = ".current-profile.json";
pub const SETPOINT_COMPLETION_FILE: &str = ".current-setpoint-completion.json";
pub const STATE_FILE: &str = ".current-state.json";

/// Stores a value as pretty printed JSON.
/// Writes go to a sibling temporary file which is synced then renamed over the original.
pub struct JsonFilePersister<T> {
    file: PathBuf,
    write_lock: Mutex<()>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> JsonFilePersister<T> {
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
            _phantom: PhantomData,
        }
    }

    pub fn in_directory(directory: &Path, file_name: &str) -> Self {
        Self::new(directory.join(file_name))
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    fn tmp_file(&self) -> PathBuf {
        let mut name = self.file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.file.with_file_name(name)
    }
}

impl<T: Serialize + DeserializeOwned> Persister<T> for JsonFilePersister<T> {
    fn has_data(&self) -> bool {
        fs::metadata(&self.file)
            .map(|metadata| metadata.len() > 0)
            .unwrap_or(false)
    }

    fn read(&self) -> Result<T, PersistError> {
        debug!("Reading {:?}", self.file);
        let s = fs::read_to_string(&self.file)?;
        Ok(serde_json::from_str(&s)?)
    }

    fn write(&self, value: &T) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock()
            .map_err(|_| PersistError::Other(format!("Write lock for {:?} poisoned", self.file)))?;
        let json = serde_json::to_string_pretty(value)?;

        let tmp = self.tmp_file();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.file)?;
        info!("Persisted {:?}", self.file);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock()
            .map_err(|_| PersistError::Other(format!("Write lock for {:?} poisoned", self.file)))?;
        match fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
    struct Progress {
        index: usize,
        name: String,
    }

    #[test]
    fn test_write_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let persister: JsonFilePersister<Progress> = JsonFilePersister::in_directory(dir.path(), SETPOINT_COMPLETION_FILE);
        assert!(!persister.has_data());

        let progress = Progress { index: 2, name: "Diacetyl rest".into() };
        persister.write(&progress).unwrap();
        assert!(persister.has_data());
        assert_eq!(persister.read().unwrap(), progress);
        assert!(!persister.tmp_file().exists());

        persister.clear().unwrap();
        assert!(!persister.has_data());
        persister.clear().unwrap();
    }

    #[test]
    fn test_empty_file_has_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let persister: JsonFilePersister<Progress> = JsonFilePersister::in_directory(dir.path(), PROFILE_FILE);
        fs::write(persister.file(), "").unwrap();
        assert!(!persister.has_data());
        assert_eq!(persister.load_or_default(Progress { index: 0, name: String::new() }).unwrap().index, 0);
    }

    #[test]
    fn test_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let persister: JsonFilePersister<Progress> = JsonFilePersister::in_directory(dir.path(), STATE_FILE);
        fs::write(persister.file(), "{ not json").unwrap();
        assert!(matches!(persister.read(), Err(PersistError::Serde(_))));
    }

    #[test]
    fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let persister: JsonFilePersister<Progress> = JsonFilePersister::in_directory(dir.path(), STATE_FILE);
        persister.write(&Progress { index: 0, name: "a".into() }).unwrap();
        persister.write(&Progress { index: 1, name: "b".into() }).unwrap();
        assert_eq!(persister.read().unwrap().index, 1);
    }
}
