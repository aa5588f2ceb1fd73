//! Configuration loading for Bastion.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.bastion/config.toml`)
//! 3. User config (`~/.bastion/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! Every threshold used by the engine lives here, so grading and completion
//! checks always read the same value.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BastionError, Result};

/// Main configuration struct for Bastion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Per-module knowledge check rules.
    pub knowledge_check: KnowledgeCheckConfig,
    /// Final assessment rules.
    pub final_assessment: FinalAssessmentConfig,
    /// Simulation scoring rules.
    pub simulation: SimulationConfig,
    /// Satisfaction survey rules.
    pub survey: SurveyConfig,
}

/// Knowledge check configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeCheckConfig {
    /// Minimum percentage to pass, also used by the completion validator.
    pub passing_threshold: u32,
    /// Questions served per attempt.
    pub question_count: u32,
    /// Attempts allowed per module.
    pub max_attempts: u32,
}

impl Default for KnowledgeCheckConfig {
    fn default() -> Self {
        Self {
            passing_threshold: 80,
            question_count: 5,
            max_attempts: 10,
        }
    }
}

/// Final assessment configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinalAssessmentConfig {
    /// Minimum percentage to pass.
    pub passing_threshold: u32,
    /// Questions served per attempt.
    pub question_count: u32,
    /// Attempts allowed per cooldown cycle.
    pub max_attempts: u32,
    /// Hours to wait after a cycle is exhausted.
    pub cooldown_hours: u32,
}

impl Default for FinalAssessmentConfig {
    fn default() -> Self {
        Self {
            passing_threshold: 70,
            question_count: 25,
            max_attempts: 3,
            cooldown_hours: 48,
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Minimum percentage for a passing simulation.
    pub passing_threshold: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            passing_threshold: 70,
        }
    }
}

/// Survey configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurveyConfig {
    /// Maximum characters of free-text feedback.
    pub max_feedback_chars: u32,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            max_feedback_chars: 1000,
        }
    }
}

/// Highest valid passing threshold.
pub const MAX_THRESHOLD: u32 = 100;

/// Check if a passing threshold is a valid percentage.
pub fn is_valid_threshold(value: u32) -> bool {
    value <= MAX_THRESHOLD
}

/// Check if a count, attempt limit or duration is usable (must be >= 1).
pub fn is_valid_positive(value: u32) -> bool {
    value >= 1
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.bastion/config.toml` in cwd)
    /// 3. User config (`~/.bastion/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    fn load_user_config() -> Option<Config> {
        let home = bastion_home()?;
        Self::load_layer(&home.join("config.toml"))
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&cwd.join(".bastion").join("config.toml"))
    }

    /// A missing layer is silent; a broken one is reported and skipped.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring config at {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| BastionError::storage(path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| BastionError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("knowledge_check.passing_threshold", self.knowledge_check.passing_threshold),
            ("final_assessment.passing_threshold", self.final_assessment.passing_threshold),
            ("simulation.passing_threshold", self.simulation.passing_threshold),
        ];
        for (key, value) in thresholds {
            if !is_valid_threshold(value) {
                return Err(BastionError::config(format!(
                    "{} must be between 0 and {}, got {}",
                    key, MAX_THRESHOLD, value
                )));
            }
        }

        let positives = [
            ("knowledge_check.question_count", self.knowledge_check.question_count),
            ("knowledge_check.max_attempts", self.knowledge_check.max_attempts),
            ("final_assessment.question_count", self.final_assessment.question_count),
            ("final_assessment.max_attempts", self.final_assessment.max_attempts),
            ("final_assessment.cooldown_hours", self.final_assessment.cooldown_hours),
            ("survey.max_feedback_chars", self.survey.max_feedback_chars),
        ];
        for (key, value) in positives {
            if !is_valid_positive(value) {
                return Err(BastionError::config(format!("{} must be >= 1", key)));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        let kc = &mut self.knowledge_check;
        kc.passing_threshold = env_u32(
            "BASTION_KC_PASSING_THRESHOLD",
            kc.passing_threshold,
            is_valid_threshold,
        );
        kc.question_count = env_u32("BASTION_KC_QUESTION_COUNT", kc.question_count, is_valid_positive);
        kc.max_attempts = env_u32("BASTION_KC_MAX_ATTEMPTS", kc.max_attempts, is_valid_positive);

        let fa = &mut self.final_assessment;
        fa.passing_threshold = env_u32(
            "BASTION_FINAL_PASSING_THRESHOLD",
            fa.passing_threshold,
            is_valid_threshold,
        );
        fa.question_count = env_u32("BASTION_FINAL_QUESTION_COUNT", fa.question_count, is_valid_positive);
        fa.max_attempts = env_u32("BASTION_FINAL_MAX_ATTEMPTS", fa.max_attempts, is_valid_positive);
        fa.cooldown_hours = env_u32("BASTION_FINAL_COOLDOWN_HOURS", fa.cooldown_hours, is_valid_positive);

        self.simulation.passing_threshold = env_u32(
            "BASTION_SIMULATION_PASSING_THRESHOLD",
            self.simulation.passing_threshold,
            is_valid_threshold,
        );

        self.survey.max_feedback_chars = env_u32(
            "BASTION_SURVEY_MAX_FEEDBACK_CHARS",
            self.survey.max_feedback_chars,
            is_valid_positive,
        );
    }

    /// Merge another config into this one.
    ///
    /// Field-by-field: every value in `other` that differs from the default
    /// wins. A layer therefore cannot reset a lower layer's value back to the
    /// default by restating it.
    fn merge(mut self, other: Config) -> Self {
        let default_kc = KnowledgeCheckConfig::default();
        if other.knowledge_check.passing_threshold != default_kc.passing_threshold {
            self.knowledge_check.passing_threshold = other.knowledge_check.passing_threshold;
        }
        if other.knowledge_check.question_count != default_kc.question_count {
            self.knowledge_check.question_count = other.knowledge_check.question_count;
        }
        if other.knowledge_check.max_attempts != default_kc.max_attempts {
            self.knowledge_check.max_attempts = other.knowledge_check.max_attempts;
        }

        let default_fa = FinalAssessmentConfig::default();
        if other.final_assessment.passing_threshold != default_fa.passing_threshold {
            self.final_assessment.passing_threshold = other.final_assessment.passing_threshold;
        }
        if other.final_assessment.question_count != default_fa.question_count {
            self.final_assessment.question_count = other.final_assessment.question_count;
        }
        if other.final_assessment.max_attempts != default_fa.max_attempts {
            self.final_assessment.max_attempts = other.final_assessment.max_attempts;
        }
        if other.final_assessment.cooldown_hours != default_fa.cooldown_hours {
            self.final_assessment.cooldown_hours = other.final_assessment.cooldown_hours;
        }

        if other.simulation.passing_threshold != SimulationConfig::default().passing_threshold {
            self.simulation.passing_threshold = other.simulation.passing_threshold;
        }

        if other.survey.max_feedback_chars != SurveyConfig::default().max_feedback_chars {
            self.survey.max_feedback_chars = other.survey.max_feedback_chars;
        }

        self
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.bastion/config.toml` in the given directory via temp file
    /// and rename.
    pub fn save_project(&self, cwd: &Path) -> Result<()> {
        let project_dir = cwd.join(".bastion");

        if !project_dir.exists() {
            fs::create_dir_all(&project_dir).map_err(|e| BastionError::storage(&project_dir, e))?;
        }

        let config_path = project_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| BastionError::config(e.to_string()))?;

        let temp_path = project_dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| BastionError::storage(&temp_path, e))?;

        let file = fs::File::open(&temp_path).map_err(|e| BastionError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| BastionError::storage(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &config_path).map_err(|e| BastionError::storage(&config_path, e))?;

        Ok(())
    }
}

/// Read a `u32` override, keeping `current` when the value is unusable.
fn env_u32(name: &str, current: u32, valid: fn(u32) -> bool) -> u32 {
    let Ok(val) = env::var(name) else {
        return current;
    };
    match val.parse::<u32>() {
        Ok(n) if valid(n) => n,
        Ok(n) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. Out of range. Using '{}'.",
                name, n, current
            );
            current
        }
        Err(_) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. Expected a non-negative integer. Using '{}'.",
                name, val, current
            );
            current
        }
    }
}

/// Get the Bastion home directory.
///
/// Checks `BASTION_HOME` first, then falls back to `~/.bastion`. An empty
/// `BASTION_HOME` is ignored.
pub fn bastion_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("BASTION_HOME") {
        if home.is_empty() {
            tracing::warn!("BASTION_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("BASTION_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".bastion"));
    }

    let fallback = env::temp_dir().join("bastion");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Directory holding the file-backed stores.
pub fn data_dir() -> Option<PathBuf> {
    bastion_home().map(|home| home.join("data"))
}
