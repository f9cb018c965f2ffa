//! Named sampling-parameter presets, backed by a flat JSON file.
//!
//! One file (`presets.json` in the work dir) holds every preset:
//!
//! ```json
//! { "presets": { "crisp": { "params": { ... }, "updated_at": "..." } } }
//! ```
//!
//! Numeric values must survive a save/load round-trip bit-for-bit — the
//! store never rewrites untouched entries, and `f64` serialisation through
//! serde_json is exact for values that came from JSON in the first place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const PRESETS_FILENAME: &str = "presets.json";

/// Sampling parameters sent with every completion request.
///
/// Field names match the completion endpoint's wire format so the struct
/// can be flattened straight into the request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub min_p: f64,
    pub repetition_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 222,
            temperature: 0.8,
            top_p: 0.98,
            top_k: -1,
            min_p: 0.08,
            repetition_penalty: 1.0,
            presence_penalty: 0.5,
        }
    }
}

/// One stored preset with its last-modified timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub params: SamplingParams,
    pub updated_at: DateTime<Utc>,
}

/// On-disk shape of `presets.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PresetFile {
    /// BTreeMap keeps the file diff-stable under repeated saves.
    presets: BTreeMap<String, Preset>,
}

/// JSON-file-backed CRUD for named parameter sets.
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    /// A store rooted in `work_dir`. The file is created on first save.
    pub fn new(work_dir: &Path) -> Self {
        Self { path: work_dir.join(PRESETS_FILENAME) }
    }

    /// Save `params` under `name`, overwriting any existing preset.
    pub fn save(&self, name: &str, params: &SamplingParams) -> Result<(), AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Preset("preset name must not be empty".into()));
        }
        let mut file = self.read_file()?;
        file.presets.insert(
            name.to_string(),
            Preset { params: params.clone(), updated_at: Utc::now() },
        );
        self.write_file(&file)
    }

    /// Load the preset stored under `name`.
    pub fn load(&self, name: &str) -> Result<SamplingParams, AppError> {
        let file = self.read_file()?;
        file.presets
            .get(name)
            .map(|p| p.params.clone())
            .ok_or_else(|| AppError::Preset(format!("no such preset: {name}")))
    }

    /// Names of all stored presets, sorted.
    pub fn list(&self) -> Result<Vec<String>, AppError> {
        let file = self.read_file()?;
        Ok(file.presets.keys().cloned().collect())
    }

    /// Delete `name`; returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, AppError> {
        let mut file = self.read_file()?;
        let removed = file.presets.remove(name).is_some();
        if removed {
            self.write_file(&file)?;
        }
        Ok(removed)
    }

    fn read_file(&self) -> Result<PresetFile, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| AppError::Preset(format!("malformed {}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PresetFile::default()),
            Err(e) => Err(AppError::Preset(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_file(&self, file: &PresetFile) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Preset(format!("cannot create {}: {e}", parent.display())))?;
        }
        let data = serde_json::to_string_pretty(file)
            .map_err(|e| AppError::Preset(format!("serialise presets: {e}")))?;
        fs::write(&self.path, data)
            .map_err(|e| AppError::Preset(format!("cannot write {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PresetStore) {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn save_load_round_trip_is_bit_exact() {
        let (_dir, store) = setup();
        let params = SamplingParams {
            max_tokens: 222,
            temperature: 0.8,
            top_p: 0.98,
            top_k: -1,
            min_p: 0.08,
            repetition_penalty: 1.0,
            presence_penalty: 0.5,
        };

        store.save("default", &params).unwrap();
        let loaded = store.load("default").unwrap();

        assert_eq!(loaded.max_tokens, params.max_tokens);
        assert_eq!(loaded.top_k, params.top_k);
        for (a, b) in [
            (loaded.temperature, params.temperature),
            (loaded.top_p, params.top_p),
            (loaded.min_p, params.min_p),
            (loaded.repetition_penalty, params.repetition_penalty),
            (loaded.presence_penalty, params.presence_penalty),
        ] {
            assert_eq!(a.to_bits(), b.to_bits(), "float changed across round-trip");
        }
    }

    #[test]
    fn awkward_floats_survive_round_trip() {
        let (_dir, store) = setup();
        let mut params = SamplingParams::default();
        params.temperature = 0.1 + 0.2; // 0.30000000000000004
        params.min_p = f64::MIN_POSITIVE;

        store.save("awkward", &params).unwrap();
        let loaded = store.load("awkward").unwrap();
        assert_eq!(loaded.temperature.to_bits(), params.temperature.to_bits());
        assert_eq!(loaded.min_p.to_bits(), params.min_p.to_bits());
    }

    #[test]
    fn save_overwrites_existing() {
        let (_dir, store) = setup();
        let mut params = SamplingParams::default();
        store.save("p", &params).unwrap();

        params.max_tokens = 512;
        store.save("p", &params).unwrap();
        assert_eq!(store.load("p").unwrap().max_tokens, 512);
    }

    #[test]
    fn list_is_sorted_and_delete_works() {
        let (_dir, store) = setup();
        let params = SamplingParams::default();
        store.save("zeta", &params).unwrap();
        store.save("alpha", &params).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);

        assert!(store.delete("zeta").unwrap());
        assert!(!store.delete("zeta").unwrap());
        assert_eq!(store.list().unwrap(), vec!["alpha"]);
    }

    #[test]
    fn load_missing_preset_errors() {
        let (_dir, store) = setup();
        let err = store.load("ghost").unwrap_err();
        assert!(err.to_string().contains("no such preset"));
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, store) = setup();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn empty_name_rejected() {
        let (_dir, store) = setup();
        assert!(store.save("  ", &SamplingParams::default()).is_err());
    }
}
