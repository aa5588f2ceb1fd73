//! Core types and rules for Bastion.
//!
//! Pure rules over fetched state (grading, sampling, completion, progression,
//! retake policy, simulations, certificate and survey gates) plus the
//! [`Engine`] that applies them against the stores.

pub mod catalog;
pub mod certificate;
pub mod clock;
pub mod completion;
pub mod engine;
pub mod grading;
pub mod model;
pub mod progression;
pub mod records;
pub mod retake;
pub mod sampler;
pub mod simulation;
pub mod survey;

pub use catalog::Catalog;
pub use certificate::{can_generate_certificate, CertDecision};
pub use clock::{Clock, FixedClock, SystemClock};
pub use completion::{is_module_fully_completed, CompletionReport};
pub use engine::{Engine, ServedQuiz, Submission};
pub use grading::{grade, validate_answers, AnswerCheck, Answers, GradeResult, QuestionOutcome};
pub use model::{
    AssessmentAttempt, AssessmentKind, Difficulty, Module, ModuleProgress, OptionLetter,
    ProgressStatus, Question, SimulationAttempt, SimulationKind, SurveyResponse,
};
pub use progression::{accessible_modules, ModuleAccess};
pub use records::LearnerRecord;
pub use retake::{can_retake_final, can_retake_knowledge_check, Eligibility, RetakeDecision};
pub use sampler::{AttemptContext, PinKey};
pub use simulation::{
    DecisionOption, DecisionOutcome, DecisionPoint, Scenario, SimulationResult,
};
pub use survey::SurveyInput;
