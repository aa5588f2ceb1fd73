//! Per-learner progress summary.

use serde::{Deserialize, Serialize};

use crate::core::catalog::Catalog;
use crate::core::completion;
use crate::core::model::AssessmentKind;
use crate::core::records::LearnerRecord;

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

/// Dashboard figures for one learner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearnerSummary {
    pub learner_id: String,
    pub modules_completed: usize,
    pub modules_total: usize,
    pub completion_percent: f64,
    /// Attempts of any kind that passed.
    pub passed_assessments: usize,
    pub average_knowledge_check_score: f64,
    pub best_final_score: Option<u32>,
    pub completed_simulations: usize,
    pub time_spent_minutes: u32,
    pub final_passed: bool,
    pub survey_completed: bool,
}

/// Summarize `record`. Module completion is read from the attempt log.
pub fn summarize(record: &LearnerRecord, catalog: &Catalog, threshold: u32) -> LearnerSummary {
    let modules_completed = catalog
        .modules
        .iter()
        .filter(|m| completion::is_module_fully_completed(record, m, threshold))
        .count();
    let modules_total = catalog.modules.len();

    let kc_scores: Vec<u32> = record
        .attempts
        .iter()
        .filter(|a| a.kind == AssessmentKind::KnowledgeCheck)
        .map(|a| a.score)
        .collect();
    let average_knowledge_check_score = if kc_scores.is_empty() {
        0.0
    } else {
        round2(kc_scores.iter().map(|&s| f64::from(s)).sum::<f64>() / kc_scores.len() as f64)
    };

    LearnerSummary {
        learner_id: record.learner_id.clone(),
        modules_completed,
        modules_total,
        completion_percent: percent(modules_completed, modules_total),
        passed_assessments: record.attempts.iter().filter(|a| a.passed).count(),
        average_knowledge_check_score,
        best_final_score: record
            .best_attempt(AssessmentKind::FinalAssessment, None)
            .map(|a| a.score),
        completed_simulations: record.completed_simulation_count(),
        time_spent_minutes: record
            .progress
            .iter()
            .fold(0u32, |total, p| total.saturating_add(p.time_spent_minutes)),
        final_passed: record.final_passed(),
        survey_completed: record.survey_completed(),
    }
}
