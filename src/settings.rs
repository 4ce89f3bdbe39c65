use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

pub const SOUND_KEY: &str = "sound-enabled-flag";
pub const AUTOSCAN_KEY: &str = "autoscan-enabled-flag";

/// String-keyed, string-valued durable storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A JSON object on disk, rewritten on every `set`.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!("Ignoring malformed settings file {}: {err}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| anyhow::anyhow!("settings store poisoned"))?;
            entries.insert(key.to_string(), value.to_string());
            serde_json::to_string_pretty(&*entries)?
        };
        std::fs::write(&self.path, snapshot)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub sound_enabled: bool,
    pub auto_scan_enabled: bool,
}

impl Settings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            sound_enabled: read_flag(store, SOUND_KEY),
            auto_scan_enabled: read_flag(store, AUTOSCAN_KEY),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(SOUND_KEY, &self.sound_enabled.to_string())?;
        store.set(AUTOSCAN_KEY, &self.auto_scan_enabled.to_string())?;
        Ok(())
    }
}

fn read_flag(store: &dyn KeyValueStore, key: &str) -> bool {
    store.get(key).as_deref() == Some("true")
}

/// The global sound gate, shared by the alert and the geiger loop.
#[derive(Clone, Default)]
pub struct SoundSwitch(Arc<AtomicBool>);

impl SoundSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}
