//! CLI commands for Bastion.
//!
//! This module provides CLI commands for Bastion, organized into:
//! - **Learner commands**: status, enter, quiz, submit, simulate, survey, certificate
//! - **Admin commands**: import, stats

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::core::{Catalog, Clock, Engine, SystemClock};
use crate::error::{BastionError, Result};
use crate::storage::{CatalogStore, PinStore, RecordStore};

// Learner commands
pub mod certificate;
pub mod enter;
pub mod quiz;
pub mod simulate;
pub mod status;
pub mod submit;
pub mod survey;

// Admin commands
pub mod import;
pub mod stats;

pub use certificate::CertificateCommand;
pub use enter::EnterCommand;
pub use import::ImportCommand;
pub use quiz::QuizCommand;
pub use simulate::SimulateCommand;
pub use stats::StatsCommand;
pub use status::StatusCommand;
pub use submit::SubmitCommand;
pub use survey::SurveyCommand;

/// Store, config, clock and session shared by every command.
pub struct CommandContext<S> {
    pub store: S,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub session_id: String,
}

impl<S: CatalogStore + RecordStore + PinStore> CommandContext<S> {
    pub fn new(store: S, config: Config, session_id: impl Into<String>) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            session_id: session_id.into(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        self.store.load_catalog()
    }

    /// Load the catalog and run `f` against an engine over this context.
    pub fn with_engine<T>(&self, f: impl FnOnce(&Engine<'_, S, S>) -> Result<T>) -> Result<T> {
        let catalog = self.store.load_catalog()?;
        let engine = Engine::new(
            &catalog,
            &self.store,
            &self.store,
            &self.config,
            self.clock.as_ref(),
            self.session_id.as_str(),
        );
        f(&engine)
    }
}

/// Whether an error is a gate refusal rather than a failure.
pub fn is_denial(err: &BastionError) -> bool {
    matches!(err, BastionError::InvalidState { .. })
}

/// Parse `key=value` pairs such as `q1=a` or `d2=report`.
pub fn parse_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| BastionError::validation(format!("expected ID=VALUE, got '{}'", pair)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(BastionError::validation(format!("missing id in '{}'", pair)));
        }
        map.insert(key.to_string(), value.trim().to_string());
    }
    Ok(map)
}
