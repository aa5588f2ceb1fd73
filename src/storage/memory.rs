//! In-memory storage.
//!
//! Thread-safe implementation of every store trait using `RwLock<HashMap>`,
//! used by tests and by callers that hold state elsewhere.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::core::catalog::Catalog;
use crate::core::records::LearnerRecord;
use crate::core::sampler::{AttemptContext, PinKey};
use crate::error::{BastionError, Result};
use crate::storage::{CatalogStore, PinStore, RecordStore};

fn poisoned<T>(_: PoisonError<T>) -> BastionError {
    BastionError::persistence("memory store lock poisoned")
}

/// In-memory store. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    records: RwLock<HashMap<String, LearnerRecord>>,
    pins: RwLock<HashMap<String, HashMap<PinKey, AttemptContext>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with `catalog`.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            ..Self::default()
        }
    }

    /// Number of learner records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pins held by a session.
    pub fn pin_count(&self, session_id: &str) -> usize {
        self.pins
            .read()
            .map(|p| p.get(session_id).map(HashMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Drop all learner records and pins. The catalog is kept.
    pub fn clear(&self) -> Result<()> {
        self.records.write().map_err(poisoned)?.clear();
        self.pins.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

impl CatalogStore for MemoryStore {
    fn load_catalog(&self) -> Result<Catalog> {
        Ok(self.catalog.read().map_err(poisoned)?.clone())
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        *self.catalog.write().map_err(poisoned)? = catalog.clone();
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, learner_id: &str) -> Result<Option<LearnerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(learner_id).cloned())
    }

    fn put(&self, record: &LearnerRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.learner_id.clone(), record.clone());
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<LearnerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut result: Vec<LearnerRecord> = records.values().cloned().collect();

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }

    fn delete(&self, learner_id: &str) -> Result<()> {
        self.records.write().map_err(poisoned)?.remove(learner_id);
        Ok(())
    }
}

impl PinStore for MemoryStore {
    fn get_pin(&self, session_id: &str, key: &PinKey) -> Result<Option<AttemptContext>> {
        let pins = self.pins.read().map_err(poisoned)?;
        Ok(pins.get(session_id).and_then(|s| s.get(key)).cloned())
    }

    fn put_pin(&self, session_id: &str, context: &AttemptContext) -> Result<()> {
        let mut pins = self.pins.write().map_err(poisoned)?;
        pins.entry(session_id.to_string())
            .or_default()
            .insert(context.key(), context.clone());
        Ok(())
    }

    fn remove_pin(&self, session_id: &str, key: &PinKey) -> Result<()> {
        let mut pins = self.pins.write().map_err(poisoned)?;
        if let Some(session) = pins.get_mut(session_id) {
            session.remove(key);
        }
        Ok(())
    }

    fn clear_session(&self, session_id: &str) -> Result<()> {
        self.pins.write().map_err(poisoned)?.remove(session_id);
        Ok(())
    }
}
