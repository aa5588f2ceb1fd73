//! File-based storage for Bastion.
//!
//! Layout under the data directory (`~/.bastion/data/` by default):
//!
//! ```text
//! catalog.json
//! learners/<learner_id>.json
//! pins/<session_id>/<learner>.<module|final>.<attempt>.json
//! ```
//!
//! Atomic writes are achieved via temp file + rename pattern.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::data_dir;
use crate::core::catalog::Catalog;
use crate::core::records::LearnerRecord;
use crate::core::sampler::{AttemptContext, PinKey};
use crate::error::{BastionError, Result};
use crate::storage::{CatalogStore, PinStore, RecordStore};

const CATALOG_FILE: &str = "catalog.json";
const LEARNERS_DIR: &str = "learners";
const PINS_DIR: &str = "pins";

/// File-based store for the catalog, learner records and pins.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store in the default data directory.
    ///
    /// Uses `~/.bastion/data/` or `$BASTION_HOME/data/`.
    pub fn new() -> Result<Self> {
        let dir = data_dir().ok_or_else(|| {
            BastionError::config("Could not determine data directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store rooted at a custom directory.
    pub fn with_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        for dir in [root.clone(), root.join(LEARNERS_DIR), root.join(PINS_DIR)] {
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(|e| BastionError::storage(&dir, e))?;
            }
        }

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn learner_path(&self, learner_id: &str) -> Result<PathBuf> {
        check_id("learner id", learner_id)?;
        Ok(self
            .root
            .join(LEARNERS_DIR)
            .join(format!("{}.json", learner_id)))
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        check_id("session id", session_id)?;
        Ok(self.root.join(PINS_DIR).join(session_id))
    }

    fn pin_path(&self, session_id: &str, key: &PinKey) -> Result<PathBuf> {
        check_id("learner id", &key.learner_id)?;
        if let Some(module_id) = &key.module_id {
            check_id("module id", module_id)?;
        }
        Ok(self.session_dir(session_id)?.join(format!("{}.json", key)))
    }
}

/// Reject ids that would escape their directory or collide with temp files.
fn check_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BastionError::validation(format!("{} must not be empty", kind)));
    }
    if id.starts_with('.') || id.contains(['/', '\\']) || id.contains('\0') {
        return Err(BastionError::validation(format!(
            "{} contains illegal characters: {}",
            kind, id
        )));
    }
    Ok(())
}

/// Temp file beside `path`: `dir/.name.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write a value atomically using temp file + rename.
fn atomic_write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| BastionError::storage(parent, e))?;
        }
    }

    let temp = temp_path(path);
    let json = serde_json::to_string_pretty(value)?;

    {
        let mut file = fs::File::create(&temp).map_err(|e| BastionError::storage(&temp, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| BastionError::storage(&temp, e))?;
        file.sync_all().map_err(|e| BastionError::storage(&temp, e))?;
    }

    // Rename is atomic on POSIX
    fs::rename(&temp, path).map_err(|e| BastionError::storage(path, e))?;

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| BastionError::storage(path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| BastionError::storage(path, e))?;
    }
    Ok(())
}

impl CatalogStore for FileStore {
    fn load_catalog(&self) -> Result<Catalog> {
        let catalog: Option<Catalog> = read_json(&self.root.join(CATALOG_FILE))?;
        let catalog = catalog.unwrap_or_default();
        catalog.validate()?;
        Ok(catalog)
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        catalog.validate()?;
        atomic_write(&self.root.join(CATALOG_FILE), catalog)
    }
}

impl RecordStore for FileStore {
    fn get(&self, learner_id: &str) -> Result<Option<LearnerRecord>> {
        read_json(&self.learner_path(learner_id)?)
    }

    fn put(&self, record: &LearnerRecord) -> Result<()> {
        atomic_write(&self.learner_path(&record.learner_id)?, record)
    }

    fn list(&self, limit: usize) -> Result<Vec<LearnerRecord>> {
        let dir = self.root.join(LEARNERS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| BastionError::storage(&dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| BastionError::storage(&dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<LearnerRecord>(&content).ok())
            {
                Some(record) => records.push(record),
                None => tracing::warn!(path = %path.display(), "skipping unreadable learner record"),
            }
        }

        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(limit);

        Ok(records)
    }

    fn delete(&self, learner_id: &str) -> Result<()> {
        let path = self.learner_path(learner_id)?;
        remove_file_if_exists(&path)?;
        remove_file_if_exists(&temp_path(&path))
    }
}

impl PinStore for FileStore {
    fn get_pin(&self, session_id: &str, key: &PinKey) -> Result<Option<AttemptContext>> {
        read_json(&self.pin_path(session_id, key)?)
    }

    fn put_pin(&self, session_id: &str, context: &AttemptContext) -> Result<()> {
        atomic_write(&self.pin_path(session_id, &context.key())?, context)
    }

    fn remove_pin(&self, session_id: &str, key: &PinKey) -> Result<()> {
        let path = self.pin_path(session_id, key)?;
        remove_file_if_exists(&path)?;
        remove_file_if_exists(&temp_path(&path))
    }

    fn clear_session(&self, session_id: &str) -> Result<()> {
        let dir = self.session_dir(session_id)?;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| BastionError::storage(&dir, e))?;
        }
        Ok(())
    }
}
