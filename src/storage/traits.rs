//! Storage traits for Bastion.
//!
//! Three seams: course content (`CatalogStore`), per-learner history
//! (`RecordStore`) and session-scoped question pins (`PinStore`).

use std::sync::Arc;

use crate::core::catalog::Catalog;
use crate::core::records::LearnerRecord;
use crate::core::sampler::{AttemptContext, PinKey};
use crate::error::Result;

/// Storage for course content.
pub trait CatalogStore: Send + Sync {
    /// Load the catalog. An empty store yields an empty catalog.
    fn load_catalog(&self) -> Result<Catalog>;

    /// Replace the stored catalog.
    fn save_catalog(&self, catalog: &Catalog) -> Result<()>;
}

/// Storage for learner records.
///
/// Single-record writes must be atomic; nothing else is required.
pub trait RecordStore: Send + Sync {
    /// Retrieve a learner record by ID.
    ///
    /// Returns `Ok(None)` if the learner has no record yet.
    fn get(&self, learner_id: &str) -> Result<Option<LearnerRecord>>;

    /// Save a learner record, replacing any previous version.
    fn put(&self, record: &LearnerRecord) -> Result<()>;

    /// List records, most recently updated first, up to `limit`.
    fn list(&self, limit: usize) -> Result<Vec<LearnerRecord>>;

    /// Delete a learner record and everything it owns.
    ///
    /// Returns `Ok(())` even if the record doesn't exist.
    fn delete(&self, learner_id: &str) -> Result<()>;

    /// Check if a learner record exists.
    fn exists(&self, learner_id: &str) -> Result<bool> {
        Ok(self.get(learner_id)?.is_some())
    }
}

/// Storage for served question sets, isolated per session.
///
/// A pin written under one session is never visible from another.
pub trait PinStore: Send + Sync {
    fn get_pin(&self, session_id: &str, key: &PinKey) -> Result<Option<AttemptContext>>;

    fn put_pin(&self, session_id: &str, context: &AttemptContext) -> Result<()>;

    /// Remove a pin. Succeeds if it is already gone.
    fn remove_pin(&self, session_id: &str, key: &PinKey) -> Result<()>;

    /// Drop every pin held by a session.
    fn clear_session(&self, session_id: &str) -> Result<()>;
}

impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    fn load_catalog(&self) -> Result<Catalog> {
        (**self).load_catalog()
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        (**self).save_catalog(catalog)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn get(&self, learner_id: &str) -> Result<Option<LearnerRecord>> {
        (**self).get(learner_id)
    }

    fn put(&self, record: &LearnerRecord) -> Result<()> {
        (**self).put(record)
    }

    fn list(&self, limit: usize) -> Result<Vec<LearnerRecord>> {
        (**self).list(limit)
    }

    fn delete(&self, learner_id: &str) -> Result<()> {
        (**self).delete(learner_id)
    }
}

impl<T: PinStore + ?Sized> PinStore for Arc<T> {
    fn get_pin(&self, session_id: &str, key: &PinKey) -> Result<Option<AttemptContext>> {
        (**self).get_pin(session_id, key)
    }

    fn put_pin(&self, session_id: &str, context: &AttemptContext) -> Result<()> {
        (**self).put_pin(session_id, context)
    }

    fn remove_pin(&self, session_id: &str, key: &PinKey) -> Result<()> {
        (**self).remove_pin(session_id, key)
    }

    fn clear_session(&self, session_id: &str) -> Result<()> {
        (**self).clear_session(session_id)
    }
}
