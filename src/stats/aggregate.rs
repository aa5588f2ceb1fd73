//! Cross-learner assessment and simulation statistics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::model::{AssessmentKind, SimulationKind};
use crate::core::records::LearnerRecord;
use crate::stats::summary::{percent, round2};

/// Aggregate figures for one assessment kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentStats {
    pub kind: AssessmentKind,
    pub total_attempts: usize,
    pub average_score: f64,
    /// Percentage of attempts that passed.
    pub pass_rate: f64,
    pub best_score: u32,
    pub total_participants: usize,
}

/// Aggregate figures for one simulation kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationStats {
    pub kind: SimulationKind,
    pub total_attempts: usize,
    /// Mean percentage over completed runs only.
    pub average_score: f64,
    pub completion_rate: f64,
    pub best_score: u32,
    pub total_participants: usize,
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64)
    }
}

pub fn assessment_stats(records: &[LearnerRecord], kind: AssessmentKind) -> AssessmentStats {
    let mut scores = Vec::new();
    let mut passed = 0;
    let mut participants = HashSet::new();

    for record in records {
        for attempt in record.attempts.iter().filter(|a| a.kind == kind) {
            scores.push(attempt.score);
            if attempt.passed {
                passed += 1;
            }
            participants.insert(record.learner_id.as_str());
        }
    }

    AssessmentStats {
        kind,
        total_attempts: scores.len(),
        average_score: mean(&scores),
        pass_rate: percent(passed, scores.len()),
        best_score: scores.iter().copied().max().unwrap_or(0),
        total_participants: participants.len(),
    }
}

pub fn simulation_stats(records: &[LearnerRecord], kind: SimulationKind) -> SimulationStats {
    let mut total_attempts = 0;
    let mut best_score = 0;
    let mut completed_scores = Vec::new();
    let mut participants = HashSet::new();

    for record in records {
        for run in record.simulations.iter().filter(|s| s.kind == kind) {
            total_attempts += 1;
            best_score = best_score.max(run.percentage);
            if run.completed {
                completed_scores.push(run.percentage);
            }
            participants.insert(record.learner_id.as_str());
        }
    }

    SimulationStats {
        kind,
        total_attempts,
        average_score: mean(&completed_scores),
        completion_rate: percent(completed_scores.len(), total_attempts),
        best_score,
        total_participants: participants.len(),
    }
}

/// Stats for every assessment kind, in declaration order.
pub fn all_assessment_stats(records: &[LearnerRecord]) -> Vec<AssessmentStats> {
    AssessmentKind::ALL
        .iter()
        .map(|&kind| assessment_stats(records, kind))
        .collect()
}

pub fn all_simulation_stats(records: &[LearnerRecord]) -> Vec<SimulationStats> {
    SimulationKind::ALL
        .iter()
        .map(|&kind| simulation_stats(records, kind))
        .collect()
}
