//! Unified error types for Bastion.
//!
//! Errors fall into two classes. Fatal errors come from the persistence
//! layer and are always propagated to the caller. Everything else is a
//! learner-facing condition: bad input is rejected with a reason, and
//! missing data degrades to a safe default through [`Degrade`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Bastion operations.
#[derive(Error, Debug)]
pub enum BastionError {
    /// I/O errors from record or catalog files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store failures that are not plain I/O (poisoned locks, corrupt layout).
    #[error("persistence error: {message}")]
    Persistence { message: String },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Malformed input rejected at the boundary.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A learner, module, question or scenario lookup missed.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A gate refused the requested operation.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },
}

/// A specialized Result type for Bastion operations.
pub type Result<T> = std::result::Result<T, BastionError>;

impl BastionError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given entity kind.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means the backing store is unavailable.
    ///
    /// Fatal errors are never degraded; callers see them as-is.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Persistence { .. })
    }
}

impl From<io::Error> for BastionError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for BastionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for degrading missing-data conditions to a safe value.
///
/// Only used where a learner-facing flow must continue, such as an unreadable
/// question pin at grading time. Fatal errors (see [`BastionError::is_fatal`])
/// must be propagated with `?` before degrading.
pub trait Degrade<T> {
    /// Log a warning and return the default value on error.
    fn degrade_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T> Degrade<T> for Result<T> {
    fn degrade_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (degraded: using default)", context, err);
                T::default()
            }
        }
    }
}

/// Exit codes for the Bastion CLI.
pub mod exit_codes {
    /// The command ran and any gate involved allowed it.
    pub const OK: i32 = 0;

    /// A gate refused (module locked, cooldown active, certificate denied).
    pub const DENIED: i32 = 1;

    /// The command failed.
    pub const ERROR: i32 = 2;
}
