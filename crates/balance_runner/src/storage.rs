//! Persistence of archetypes, matrix runs and presets.
//!
//! A [`Store`] is a flat key → JSON value map. Backends are picked by the
//! caller: [`MemoryStore`] for tests and one-off runs, [`FileStore`] for one
//! JSON file per key under a directory. [`Records`] adds typed access on
//! top of any backend.
//!
//! Read failures degrade to `None` or an empty list and are logged; they
//! never abort a computation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use balance_core::archetype::Archetype;
use balance_core::config::BalancerConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::matrix::MatrixRunResult;
use crate::proposer::TuningConfig;

/// Errors from store writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is empty or escapes the store.
    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    /// Filesystem failure.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key → JSON value persistence backend.
pub trait Store: Send + Sync {
    /// Write a value, replacing any previous one.
    fn put(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Read a value; `None` if missing or unreadable.
    fn get(&self, key: &str) -> Option<Value>;

    /// Sorted keys starting with `prefix`.
    fn list(&self, prefix: &str) -> Vec<String>;
}

fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        match self.values.write() {
            Ok(mut values) => {
                values.insert(key.to_string(), value);
                Ok(())
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        let values = self.values.read().ok()?;
        values.get(key).cloned()
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        match self.values.read() {
            Ok(values) => values
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            Err(_) => {
                warn!("Memory store lock poisoned; listing nothing");
                Vec::new()
            }
        }
    }
}

/// One pretty-printed JSON file per key, `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                if dir != self.root {
                    warn!("Failed to read store directory {:?}: {}", dir, e);
                }
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, keys);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .with_extension("")
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
    }
}

impl Store for FileStore {
    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&value)?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(key, path = ?path, "stored value");
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        if validate_key(key).is_err() {
            warn!(key, "Rejected invalid store key");
            return None;
        }
        let path = self.path_for(key);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Corrupt store file {:?}: {}", path, e);
                None
            }
        }
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys);
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        keys
    }
}

/// Named balancer and tuning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancePreset {
    /// Preset identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Formula and simulation constants.
    pub config: BalancerConfig,
    /// Proposer settings.
    pub tuning: TuningConfig,
}

impl Default for BalancePreset {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default".to_string(),
            config: BalancerConfig::default(),
            tuning: TuningConfig::default(),
        }
    }
}

const ARCHETYPE_PREFIX: &str = "archetype/";
const RUN_PREFIX: &str = "run/";
const PRESET_PREFIX: &str = "preset/";

/// Typed access to a [`Store`].
#[derive(Debug)]
pub struct Records<S: Store> {
    store: S,
}

impl<S: Store> Records<S> {
    /// Wrap a backend.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.store.put(key, serde_json::to_value(value)?)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get(key)?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, "Stored record has unexpected shape: {}", e);
                None
            }
        }
    }

    fn ids(&self, prefix: &str) -> Vec<String> {
        self.store
            .list(prefix)
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    /// Save under `archetype/<id>`.
    pub fn save_archetype(&self, archetype: &Archetype) -> StoreResult<()> {
        self.save(&format!("{ARCHETYPE_PREFIX}{}", archetype.id), archetype)
    }

    /// Load `archetype/<id>`.
    pub fn load_archetype(&self, id: &str) -> Option<Archetype> {
        self.load(&format!("{ARCHETYPE_PREFIX}{id}"))
    }

    /// Ids of stored archetypes.
    pub fn list_archetypes(&self) -> Vec<String> {
        self.ids(ARCHETYPE_PREFIX)
    }

    /// Save under `run/<run_id>`.
    pub fn save_run(&self, run: &MatrixRunResult) -> StoreResult<()> {
        self.save(&format!("{RUN_PREFIX}{}", run.run_id), run)
    }

    /// Load `run/<run_id>`.
    pub fn load_run(&self, run_id: &str) -> Option<MatrixRunResult> {
        self.load(&format!("{RUN_PREFIX}{run_id}"))
    }

    /// Ids of stored runs.
    pub fn list_runs(&self) -> Vec<String> {
        self.ids(RUN_PREFIX)
    }

    /// Save under `preset/<id>`.
    pub fn save_preset(&self, preset: &BalancePreset) -> StoreResult<()> {
        self.save(&format!("{PRESET_PREFIX}{}", preset.id), preset)
    }

    /// Load `preset/<id>`.
    pub fn load_preset(&self, id: &str) -> Option<BalancePreset> {
        self.load(&format!("{PRESET_PREFIX}{id}"))
    }

    /// Load `preset/<id>`, falling back to [`BalancePreset::default`].
    pub fn load_preset_or_default(&self, id: &str) -> BalancePreset {
        self.load_preset(id).unwrap_or_else(|| {
            debug!(id, "preset not found, using default");
            BalancePreset::default()
        })
    }

    /// Ids of stored presets.
    pub fn list_presets(&self) -> Vec<String> {
        self.ids(PRESET_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::stats::StatProfile;
    use serde_json::json;

    #[test]
    fn test_memory_store_put_get_list() {
        let store = MemoryStore::new();
        store.put("run/a", json!({"x": 1})).unwrap();
        store.put("run/b", json!({"x": 2})).unwrap();
        store.put("preset/p", json!(null)).unwrap();

        assert_eq!(store.get("run/a"), Some(json!({"x": 1})));
        assert_eq!(store.get("run/missing"), None);
        assert_eq!(store.list("run/"), vec!["run/a", "run/b"]);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let store = MemoryStore::new();
        for key in ["", "run/", "../escape", "run/../x", "run/a b"] {
            assert!(matches!(
                store.put(key, json!(1)),
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_records_archetype_round_trip() {
        let records = Records::new(MemoryStore::new());
        let archetype = Archetype::new("knight", "Knight", StatProfile::with_hp_damage(700.0, 30.0));
        records.save_archetype(&archetype).unwrap();

        assert_eq!(records.load_archetype("knight"), Some(archetype));
        assert_eq!(records.load_archetype("rogue"), None);
        assert_eq!(records.list_archetypes(), vec!["knight"]);
    }

    #[test]
    fn test_wrong_shape_loads_as_none() {
        let records = Records::new(MemoryStore::new());
        records.store().put("archetype/bad", json!({"id": 3})).unwrap();
        assert!(records.load_archetype("bad").is_none());
    }

    #[test]
    fn test_preset_fallback() {
        let records = Records::new(MemoryStore::new());
        assert_eq!(records.load_preset_or_default("missing"), BalancePreset::default());

        let preset = BalancePreset {
            id: "tight".to_string(),
            name: "Tight band".to_string(),
            tuning: TuningConfig::default().with_target_band(0.48, 0.52),
            ..BalancePreset::default()
        };
        records.save_preset(&preset).unwrap();
        assert_eq!(records.load_preset_or_default("tight"), preset);
        assert_eq!(records.list_presets(), vec!["tight"]);
    }
}
