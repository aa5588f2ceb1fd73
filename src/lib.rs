//! Bastion - security-awareness progression and assessment engine
//!
//! Bastion decides what a learner may do next in a sequential training
//! course: which modules are open, when a module counts as completed, whether
//! the final assessment may be taken or retaken, and when a certificate can
//! be issued. It serves and grades randomized knowledge checks, scores
//! decision-based simulations, and records everything in an append-only
//! attempt log per learner.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod stats;
pub mod storage;

pub use config::Config;
pub use core::{Catalog, Engine, LearnerRecord};
pub use error::{BastionError, Result};
pub use stats::{achievements, summarize, AchievementReport, LearnerSummary};
pub use storage::{CatalogStore, FileStore, MemoryStore, PinStore, RecordStore};

// CLI commands
pub use cli::{
    CertificateCommand, EnterCommand, ImportCommand, QuizCommand, SimulateCommand, StatsCommand,
    StatusCommand, SubmitCommand, SurveyCommand,
};
