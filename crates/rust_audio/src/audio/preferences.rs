//! Persisted audio preferences
//!
//! A small key-value seam for the four volume/mute preferences. The
//! manager reads them when it becomes active and writes them at shutdown
//! or on request.

use crate::audio::AudioError;
use crate::config::{self, PreferenceKeys};
use crate::audio::mixer::VolumeState;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A stored preference value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    /// Flag
    Bool(bool),
    /// Number
    Float(f32),
}

impl PreferenceValue {
    /// The value as a number, if it is one
    pub fn as_f32(self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(value),
            Self::Bool(_) => None,
        }
    }

    /// The value as a flag, if it is one
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(value),
            Self::Float(_) => None,
        }
    }
}

/// Key-value preference storage
pub trait PreferenceStore {
    /// Read a value
    fn load(&self, key: &str) -> Option<PreferenceValue>;

    /// Write a value (not necessarily persisted until [`PreferenceStore::flush`])
    fn save(&mut self, key: &str, value: PreferenceValue);

    /// Remove a value
    fn delete(&mut self, key: &str);

    /// Persist pending writes
    fn flush(&mut self) -> Result<(), AudioError>;
}

/// Read the volume state, keeping `defaults` for absent or mistyped keys
pub fn load_volume_state(store: &dyn PreferenceStore, keys: &PreferenceKeys, defaults: VolumeState) -> VolumeState {
    let float = |key: &str, default: f32| store.load(key).and_then(PreferenceValue::as_f32).unwrap_or(default);
    let flag = |key: &str, default: bool| store.load(key).and_then(PreferenceValue::as_bool).unwrap_or(default);

    VolumeState {
        music_volume: float(keys.music_volume.as_str(), defaults.music_volume),
        sfx_volume: float(keys.sfx_volume.as_str(), defaults.sfx_volume),
        music_muted: flag(keys.music_muted.as_str(), defaults.music_muted),
        sfx_muted: flag(keys.sfx_muted.as_str(), defaults.sfx_muted),
    }
}

/// Write the volume state and flush it
pub fn save_volume_state(store: &mut dyn PreferenceStore, keys: &PreferenceKeys, state: VolumeState) -> Result<(), AudioError> {
    store.save(&keys.music_volume, PreferenceValue::Float(state.music_volume));
    store.save(&keys.sfx_volume, PreferenceValue::Float(state.sfx_volume));
    store.save(&keys.music_muted, PreferenceValue::Bool(state.music_muted));
    store.save(&keys.sfx_muted, PreferenceValue::Bool(state.sfx_muted));
    store.flush()
}

/// Remove every audio preference and flush
pub fn clear_volume_state(store: &mut dyn PreferenceStore, keys: &PreferenceKeys) -> Result<(), AudioError> {
    for key in [&keys.music_volume, &keys.sfx_volume, &keys.music_muted, &keys.sfx_muted] {
        store.delete(key);
    }
    store.flush()
}

/// In-memory store whose contents are shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: Rc<RefCell<BTreeMap<String, PreferenceValue>>>,
    flushes: Rc<RefCell<usize>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushes so far
    pub fn flush_count(&self) -> usize {
        *self.flushes.borrow()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Option<PreferenceValue> {
        self.values.borrow().get(key).copied()
    }

    fn save(&mut self, key: &str, value: PreferenceValue) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) {
        self.values.borrow_mut().remove(key);
    }

    fn flush(&mut self) -> Result<(), AudioError> {
        *self.flushes.borrow_mut() += 1;
        Ok(())
    }
}

/// File-backed store, TOML or RON chosen by file extension
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, PreferenceValue>,
    dirty: bool,
}

impl FilePreferenceStore {
    /// Open a store, reading existing values if the file exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| AudioError::Preferences(format!("{}: {}", path.display(), e)))?;
            config::from_str_for(&path, &contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values, dirty: false })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self, key: &str) -> Option<PreferenceValue> {
        self.values.get(key).copied()
    }

    fn save(&mut self, key: &str, value: PreferenceValue) {
        if self.values.insert(key.to_string(), value) != Some(value) {
            self.dirty = true;
        }
    }

    fn delete(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<(), AudioError> {
        if !self.dirty {
            return Ok(());
        }
        let contents = config::to_string_for(&self.path, &self.values)?;
        std::fs::write(&self.path, contents)
            .map_err(|e| AudioError::Preferences(format!("{}: {}", self.path.display(), e)))?;
        self.dirty = false;
        log::debug!("Preferences written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> VolumeState {
        VolumeState { music_volume: 1.0, sfx_volume: 1.0, music_muted: false, sfx_muted: false }
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let store = MemoryPreferenceStore::new();
        let state = load_volume_state(&store, &PreferenceKeys::default(), defaults());
        assert_eq!(state, defaults());
    }

    #[test]
    fn test_mistyped_value_ignored() {
        let mut store = MemoryPreferenceStore::new();
        let keys = PreferenceKeys::default();
        store.save(&keys.music_volume, PreferenceValue::Bool(true));
        let state = load_volume_state(&store, &keys, defaults());
        assert_eq!(state.music_volume, 1.0);
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryPreferenceStore::new();
        let keys = PreferenceKeys::default();
        let saved = VolumeState { music_volume: 0.25, sfx_volume: 0.5, music_muted: true, sfx_muted: false };
        save_volume_state(&mut store, &keys, saved).unwrap();

        assert_eq!(load_volume_state(&store, &keys, defaults()), saved);
        assert_eq!(store.flush_count(), 1);

        clear_volume_state(&mut store, &keys).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_toml() {
        let path = std::env::temp_dir().join(format!("rust_audio_prefs_{}.toml", std::process::id()));
        let keys = PreferenceKeys::default();
        let saved = VolumeState { music_volume: 0.75, sfx_volume: 0.5, music_muted: false, sfx_muted: true };
        {
            let mut store = FilePreferenceStore::open(&path).unwrap();
            save_volume_state(&mut store, &keys, saved).unwrap();
        }
        let reopened = FilePreferenceStore::open(&path).unwrap();
        assert_eq!(load_volume_state(&reopened, &keys, defaults()), saved);
        let _ = std::fs::remove_file(&path);
    }
}
