//! [`ConfigStore`] implementations.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{ConfigStore, DeviceConfig, StoreError};

/// In-memory store. Survives node restarts as long as the value is kept.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    config: Option<DeviceConfig>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `config`.
    pub fn with_config(config: DeviceConfig) -> Self {
        MemoryConfigStore {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail.
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    /// Currently stored config, without going through [`ConfigStore::load`].
    pub fn stored(&self) -> Option<&DeviceConfig> {
        self.config.as_ref()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self) -> Result<Option<DeviceConfig>, StoreError> {
        Ok(self.config)
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("save disabled".to_string()));
        }
        self.config = Some(*config);
        self.saves += 1;
        Ok(())
    }
}

/// Stores the config as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&mut self) -> Result<Option<DeviceConfig>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config = serde_json::from_str(&text)?;
        tracing::debug!("Loaded config from {}", self.path.display());
        Ok(Some(config))
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(config)?;
        // The target is only ever replaced whole.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryConfigStore::new();
        assert!(store.load().unwrap().is_none());

        let cfg = DeviceConfig {
            register: 2,
            ..DeviceConfig::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), Some(cfg));
        assert_eq!(store.save_count(), 1);

        store.set_fail_saves(true);
        assert!(store.save(&DeviceConfig::default()).is_err());
        assert_eq!(store.stored(), Some(&cfg));
    }

    #[test]
    fn test_json_file_store() {
        let dir = std::env::temp_dir().join(format!("bandlight-store-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let _ = fs::remove_file(&path);

        let mut store = JsonFileConfigStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let cfg = DeviceConfig {
            register: 7,
            led_count: 144,
            configured: true,
            ..DeviceConfig::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), Some(cfg));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));

        let _ = fs::remove_dir_all(&dir);
    }
}
