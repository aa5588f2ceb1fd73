//! Domain types for modules, questions and attempt records.
//!
//! Attempt records are immutable once created. `ModuleProgress` is the only
//! type that changes in place, and it is always rebuilt from the attempt log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::simulation::DecisionOutcome;
use crate::error::BastionError;

// =============================================================================
// Questions
// =============================================================================

/// One of the four answer options of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    /// All letters in display order.
    pub const ALL: [OptionLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Parse a submitted answer, ignoring case and surrounding whitespace.
    ///
    /// Returns `None` for anything outside `a`..`d`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "c" => Some(Self::C),
            "d" => Some(Self::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
        }
    }

    /// Zero-based position in the options array.
    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLetter {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| BastionError::validation(format!("invalid answer option '{}'", s)))
    }
}

fn default_question_set() -> u32 {
    1
}

/// A multiple-choice question from a module bank or the final assessment bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    /// Owning module; `None` for final assessment questions.
    #[serde(default)]
    pub module_id: Option<String>,
    /// Question set label used for retake rotation (1-based).
    #[serde(default = "default_question_set")]
    pub question_set: u32,
    pub prompt: String,
    pub options: [String; 4],
    pub correct: OptionLetter,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Create a question with placeholder option texts.
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, correct: OptionLetter) -> Self {
        Self {
            id: id.into(),
            module_id: None,
            question_set: 1,
            prompt: prompt.into(),
            options: OptionLetter::ALL.map(|l| format!("Option {}", l.as_str().to_uppercase())),
            correct,
            explanation: String::new(),
        }
    }

    pub fn in_module(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }

    pub fn in_set(mut self, set: u32) -> Self {
        self.question_set = set;
        self
    }

    pub fn with_options(mut self, options: [String; 4]) -> Self {
        self.options = options;
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Whether this question belongs to the final assessment bank.
    pub fn is_final(&self) -> bool {
        self.module_id.is_none()
    }
}

// =============================================================================
// Modules
// =============================================================================

/// A training module in the unlock chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    pub id: String,
    /// Position in the chain, contiguous from 1.
    pub order: u32,
    pub title: String,
    /// Simulation the module requires before it counts as completed.
    #[serde(default)]
    pub simulation: Option<SimulationKind>,
}

impl Module {
    pub fn new(id: impl Into<String>, order: u32, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order,
            title: title.into(),
            simulation: None,
        }
    }

    pub fn with_simulation(mut self, kind: SimulationKind) -> Self {
        self.simulation = Some(kind);
        self
    }

    pub fn has_simulation(&self) -> bool {
        self.simulation.is_some()
    }
}

/// Kind of decision scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    Phishing,
    Pretexting,
    Baiting,
    QuidProQuo,
}

impl SimulationKind {
    pub const ALL: [SimulationKind; 4] = [
        Self::Phishing,
        Self::Pretexting,
        Self::Baiting,
        Self::QuidProQuo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phishing => "phishing",
            Self::Pretexting => "pretexting",
            Self::Baiting => "baiting",
            Self::QuidProQuo => "quid_pro_quo",
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationKind {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phishing" => Ok(Self::Phishing),
            "pretexting" => Ok(Self::Pretexting),
            "baiting" => Ok(Self::Baiting),
            "quid_pro_quo" => Ok(Self::QuidProQuo),
            other => Err(BastionError::validation(format!(
                "unknown simulation type '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Assessment attempts
// =============================================================================

/// Kind of scored assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    Baseline,
    KnowledgeCheck,
    FinalAssessment,
    FollowUp,
}

impl AssessmentKind {
    pub const ALL: [AssessmentKind; 4] = [
        Self::Baseline,
        Self::KnowledgeCheck,
        Self::FinalAssessment,
        Self::FollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::KnowledgeCheck => "knowledge_check",
            Self::FinalAssessment => "final_assessment",
            Self::FollowUp => "follow_up",
        }
    }

    /// Knowledge checks are the only kind tied to a module.
    pub fn is_module_scoped(&self) -> bool {
        matches!(self, Self::KnowledgeCheck)
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(Self::Baseline),
            "knowledge_check" => Ok(Self::KnowledgeCheck),
            "final_assessment" => Ok(Self::FinalAssessment),
            "follow_up" => Ok(Self::FollowUp),
            other => Err(BastionError::validation(format!(
                "unknown assessment type '{}'",
                other
            ))),
        }
    }
}

/// One scoring event. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentAttempt {
    pub learner_id: String,
    pub kind: AssessmentKind,
    #[serde(default)]
    pub module_id: Option<String>,
    /// Rounded percentage as graded.
    pub score: u32,
    pub total: u32,
    pub correct: u32,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

impl AssessmentAttempt {
    /// Unrounded percentage from the raw counts, 0 when there were no questions.
    pub fn raw_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total) * 100.0
        }
    }
}

/// One scored run through a simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationAttempt {
    pub learner_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    pub kind: SimulationKind,
    pub scenario_id: String,
    /// Correct decisions.
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub passed: bool,
    /// Set when the learner finalizes the attempt.
    pub completed: bool,
    #[serde(default)]
    pub decisions: Vec<DecisionOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Progress
// =============================================================================

/// Status of a learner within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached projection of the attempt log for one (learner, module) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleProgress {
    pub learner_id: String,
    pub module_id: String,
    pub status: ProgressStatus,
    pub latest_score: Option<u32>,
    pub attempts: u32,
    pub time_spent_minutes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ModuleProgress {
    /// A fresh `not_started` mark.
    pub fn new(learner_id: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            module_id: module_id.into(),
            status: ProgressStatus::NotStarted,
            latest_score: None,
            attempts: 0,
            time_spent_minutes: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Survey
// =============================================================================

/// Perceived difficulty reported in the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(BastionError::validation(format!(
                "difficulty must be easy, medium or hard, got '{}'",
                other
            ))),
        }
    }
}

/// A learner's satisfaction survey. Its presence is the completion signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyResponse {
    pub learner_id: String,
    pub rating: u8,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub module_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
