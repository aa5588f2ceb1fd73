//! Persistent storage for Bastion.
//!
//! This module provides storage for the course catalog, learner records and
//! session-scoped question pins, with file-based and in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{CatalogStore, PinStore, RecordStore};
