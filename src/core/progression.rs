//! Progression gate and progress projection.
//!
//! Access is a left-to-right fold over the ordered modules: module `i + 1`
//! unlocks only when module `i` is fully completed. Nothing is memoized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::completion;
use crate::core::model::{AssessmentKind, Module, ModuleProgress, ProgressStatus};
use crate::core::records::LearnerRecord;

/// Whether one module can be opened, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleAccess {
    pub module_id: String,
    pub order: u32,
    pub accessible: bool,
    pub completed: bool,
    pub reason: String,
}

/// Compute access for `modules`, which must be sorted by `order`.
///
/// The result is aligned with the input slice.
pub fn accessible_modules(
    record: &LearnerRecord,
    modules: &[&Module],
    threshold: u32,
) -> Vec<ModuleAccess> {
    let mut result = Vec::with_capacity(modules.len());
    let mut previous: Option<(&Module, bool)> = None;

    for &module in modules {
        let completed = completion::is_module_fully_completed(record, module, threshold);
        let (accessible, reason) = match previous {
            None => (true, "First module is always accessible".to_string()),
            Some((_, true)) => (true, "All prerequisites completed".to_string()),
            Some((prev, false)) => (false, format!("Must complete {} first", prev.title)),
        };

        result.push(ModuleAccess {
            module_id: module.id.clone(),
            order: module.order,
            accessible,
            completed,
            reason,
        });
        previous = Some((module, completed));
    }

    result
}

/// Rebuild the progress mark for `module` from the attempt log.
///
/// Time spent and the start timestamp are carried over from `existing`,
/// since the log does not record them.
pub fn recompute_mark(
    existing: Option<&ModuleProgress>,
    record: &LearnerRecord,
    module: &Module,
    threshold: u32,
    now: DateTime<Utc>,
) -> ModuleProgress {
    let mut mark = existing
        .cloned()
        .unwrap_or_else(|| ModuleProgress::new(&record.learner_id, &module.id));

    mark.attempts = record.attempt_count(AssessmentKind::KnowledgeCheck, Some(&module.id));
    mark.latest_score = record
        .latest_attempt(AssessmentKind::KnowledgeCheck, Some(&module.id))
        .map(|a| a.score);

    let touched = mark.attempts > 0
        || record.simulations_for(&module.id).next().is_some()
        || mark.time_spent_minutes > 0;

    mark.status = if completion::is_module_fully_completed(record, module, threshold) {
        ProgressStatus::Completed
    } else if touched {
        ProgressStatus::InProgress
    } else {
        ProgressStatus::NotStarted
    };

    if mark.status != ProgressStatus::NotStarted && mark.started_at.is_none() {
        mark.started_at = Some(now);
    }
    mark.completed_at = match mark.status {
        ProgressStatus::Completed => mark.completed_at.or(Some(now)),
        _ => None,
    };

    mark
}
