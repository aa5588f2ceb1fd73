//! Module completion validator.
//!
//! Completion is decided from the attempt log alone. The stored `passed` flag
//! on an attempt is ignored; the percentage is re-derived from raw counts
//! against the configured knowledge check threshold.

use serde::{Deserialize, Serialize};

use crate::core::model::{AssessmentKind, Module};
use crate::core::records::LearnerRecord;

/// Why a module is or is not complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionReport {
    pub module_id: String,
    pub knowledge_check_passed: bool,
    /// Raw percentage of the latest knowledge check, if one exists.
    pub latest_percentage: Option<f64>,
    pub simulation_required: bool,
    pub simulation_completed: bool,
    pub completed: bool,
    pub reason: String,
}

/// Evaluate completion of `module` for the learner in `record`.
pub fn evaluate(record: &LearnerRecord, module: &Module, threshold: u32) -> CompletionReport {
    let latest = record.latest_attempt(AssessmentKind::KnowledgeCheck, Some(&module.id));
    let latest_percentage = latest.map(|a| a.raw_percentage());
    let knowledge_check_passed = latest_percentage.is_some_and(|p| p >= f64::from(threshold));

    let simulation_required = module.has_simulation();
    let simulation_completed = record.has_completed_simulation(&module.id);

    let completed = knowledge_check_passed && (!simulation_required || simulation_completed);

    let reason = match (latest_percentage, knowledge_check_passed) {
        (None, _) => "Knowledge check not attempted".to_string(),
        (Some(p), false) => format!(
            "Latest knowledge check scored {:.0}%, {}% required",
            p, threshold
        ),
        (Some(_), true) if simulation_required && !simulation_completed => {
            "Simulation not completed".to_string()
        }
        (Some(_), true) => "Module completed".to_string(),
    };

    tracing::debug!(
        learner = %record.learner_id,
        module = %module.id,
        completed,
        "module completion evaluated"
    );

    CompletionReport {
        module_id: module.id.clone(),
        knowledge_check_passed,
        latest_percentage,
        simulation_required,
        simulation_completed,
        completed,
        reason,
    }
}

/// Shorthand for `evaluate(..).completed`.
pub fn is_module_fully_completed(record: &LearnerRecord, module: &Module, threshold: u32) -> bool {
    evaluate(record, module, threshold).completed
}
