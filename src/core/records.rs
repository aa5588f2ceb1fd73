//! Per-learner attempt history.
//!
//! `LearnerRecord` is the unit the record stores persist. Attempts and
//! simulation runs are only ever appended; queries answer "latest", "best"
//! and "how many" over that log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::model::{
    AssessmentAttempt, AssessmentKind, ModuleProgress, SimulationAttempt, SurveyResponse,
};

/// Everything recorded for one learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearnerRecord {
    pub learner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: Vec<AssessmentAttempt>,
    #[serde(default)]
    pub simulations: Vec<SimulationAttempt>,
    /// Cached progress marks, rebuilt from the log on every write.
    #[serde(default)]
    pub progress: Vec<ModuleProgress>,
    #[serde(default)]
    pub survey: Option<SurveyResponse>,
}

impl LearnerRecord {
    pub fn new(learner_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.into(),
            created_at: now,
            updated_at: now,
            attempts: Vec::new(),
            simulations: Vec::new(),
            progress: Vec::new(),
            survey: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    // =========================================================================
    // Appends
    // =========================================================================

    pub fn append_attempt(&mut self, attempt: AssessmentAttempt) {
        self.touch(attempt.created_at);
        self.attempts.push(attempt);
    }

    pub fn append_simulation(&mut self, attempt: SimulationAttempt) {
        self.touch(attempt.updated_at);
        self.simulations.push(attempt);
    }

    // =========================================================================
    // Assessment queries
    // =========================================================================

    /// Attempts of `kind` for `module_id`, in log order.
    pub fn attempts_for<'a>(
        &'a self,
        kind: AssessmentKind,
        module_id: Option<&str>,
    ) -> impl Iterator<Item = &'a AssessmentAttempt> + 'a {
        let module_id = module_id.map(str::to_string);
        self.attempts
            .iter()
            .filter(move |a| a.kind == kind && a.module_id == module_id)
    }

    pub fn attempt_count(&self, kind: AssessmentKind, module_id: Option<&str>) -> u32 {
        self.attempts_for(kind, module_id).count() as u32
    }

    /// Most recent attempt by creation time (later log entries win ties).
    pub fn latest_attempt(
        &self,
        kind: AssessmentKind,
        module_id: Option<&str>,
    ) -> Option<&AssessmentAttempt> {
        self.attempts_for(kind, module_id).max_by_key(|a| a.created_at)
    }

    /// Highest-scoring attempt (earliest wins ties).
    pub fn best_attempt(
        &self,
        kind: AssessmentKind,
        module_id: Option<&str>,
    ) -> Option<&AssessmentAttempt> {
        self.attempts_for(kind, module_id)
            .fold(None, |best: Option<&AssessmentAttempt>, a| match best {
                Some(b) if b.score >= a.score => Some(b),
                _ => Some(a),
            })
    }

    /// Final assessment attempt times, oldest first.
    pub fn final_attempt_times(&self) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> = self
            .attempts_for(AssessmentKind::FinalAssessment, None)
            .map(|a| a.created_at)
            .collect();
        times.sort();
        times
    }

    pub fn final_passed(&self) -> bool {
        self.attempts_for(AssessmentKind::FinalAssessment, None)
            .any(|a| a.passed)
    }

    // =========================================================================
    // Simulation, progress and survey queries
    // =========================================================================

    pub fn simulations_for<'a>(
        &'a self,
        module_id: &str,
    ) -> impl Iterator<Item = &'a SimulationAttempt> + 'a {
        let module_id = Some(module_id.to_string());
        self.simulations
            .iter()
            .filter(move |s| s.module_id == module_id)
    }

    pub fn has_completed_simulation(&self, module_id: &str) -> bool {
        self.simulations_for(module_id).any(|s| s.completed)
    }

    pub fn completed_simulation_count(&self) -> usize {
        self.simulations.iter().filter(|s| s.completed).count()
    }

    pub fn progress_for(&self, module_id: &str) -> Option<&ModuleProgress> {
        self.progress.iter().find(|p| p.module_id == module_id)
    }

    /// Insert or replace the mark for `mark.module_id`.
    pub fn set_progress(&mut self, mark: ModuleProgress) {
        match self
            .progress
            .iter_mut()
            .find(|p| p.module_id == mark.module_id)
        {
            Some(existing) => *existing = mark,
            None => self.progress.push(mark),
        }
    }

    pub fn survey_completed(&self) -> bool {
        self.survey.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::model::SimulationKind;
    use chrono::Duration;

    pub(crate) fn kc_attempt(
        learner: &str,
        module: &str,
        correct: u32,
        total: u32,
        at: DateTime<Utc>,
    ) -> AssessmentAttempt {
        let score = crate::core::grading::percentage(correct, total);
        AssessmentAttempt {
            learner_id: learner.to_string(),
            kind: AssessmentKind::KnowledgeCheck,
            module_id: Some(module.to_string()),
            score,
            total,
            correct,
            passed: score >= 80,
            created_at: at,
        }
    }

    pub(crate) fn final_attempt(learner: &str, score: u32, at: DateTime<Utc>) -> AssessmentAttempt {
        AssessmentAttempt {
            learner_id: learner.to_string(),
            kind: AssessmentKind::FinalAssessment,
            module_id: None,
            score,
            total: 100,
            correct: score,
            passed: score >= 70,
            created_at: at,
        }
    }

    pub(crate) fn sim_attempt(
        learner: &str,
        module: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> SimulationAttempt {
        SimulationAttempt {
            learner_id: learner.to_string(),
            module_id: Some(module.to_string()),
            kind: SimulationKind::Phishing,
            scenario_id: "phish-1".to_string(),
            score: 2,
            total: 3,
            percentage: 67,
            passed: false,
            completed,
            decisions: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_latest_attempt_uses_creation_time() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.append_attempt(kc_attempt("u1", "m1", 5, 5, now - Duration::hours(1)));
        record.append_attempt(kc_attempt("u1", "m1", 2, 5, now));
        record.append_attempt(kc_attempt("u1", "m1", 4, 5, now - Duration::hours(2)));

        let latest = record
            .latest_attempt(AssessmentKind::KnowledgeCheck, Some("m1"))
            .unwrap();
        assert_eq!(latest.correct, 2);
    }

    #[test]
    fn test_best_attempt_picks_highest_score() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.append_attempt(kc_attempt("u1", "m1", 3, 5, now));
        record.append_attempt(kc_attempt("u1", "m1", 5, 5, now));
        record.append_attempt(kc_attempt("u1", "m1", 4, 5, now));

        let best = record
            .best_attempt(AssessmentKind::KnowledgeCheck, Some("m1"))
            .unwrap();
        assert_eq!(best.score, 100);
    }

    #[test]
    fn test_queries_are_scoped_by_kind_and_module() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.append_attempt(kc_attempt("u1", "m1", 5, 5, now));
        record.append_attempt(kc_attempt("u1", "m2", 1, 5, now));
        record.append_attempt(final_attempt("u1", 50, now));

        assert_eq!(record.attempt_count(AssessmentKind::KnowledgeCheck, Some("m1")), 1);
        assert_eq!(record.attempt_count(AssessmentKind::KnowledgeCheck, Some("m3")), 0);
        assert_eq!(record.attempt_count(AssessmentKind::FinalAssessment, None), 1);
        assert!(record
            .latest_attempt(AssessmentKind::KnowledgeCheck, None)
            .is_none());
    }

    #[test]
    fn test_final_passed_and_times() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.append_attempt(final_attempt("u1", 60, now));
        record.append_attempt(final_attempt("u1", 40, now - Duration::hours(3)));
        assert!(!record.final_passed());

        let times = record.final_attempt_times();
        assert_eq!(times, vec![now - Duration::hours(3), now]);

        record.append_attempt(final_attempt("u1", 72, now));
        assert!(record.final_passed());
    }

    #[test]
    fn test_completed_simulation_lookup() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.append_simulation(sim_attempt("u1", "m2", false, now));
        assert!(!record.has_completed_simulation("m2"));

        record.append_simulation(sim_attempt("u1", "m2", true, now));
        assert!(record.has_completed_simulation("m2"));
        assert!(!record.has_completed_simulation("m1"));
        assert_eq!(record.simulations_for("m2").count(), 2);
        assert_eq!(record.completed_simulation_count(), 1);
    }

    #[test]
    fn test_set_progress_replaces_existing_mark() {
        let now = Utc::now();
        let mut record = LearnerRecord::new("u1", now);
        record.set_progress(ModuleProgress::new("u1", "m1"));

        let mut updated = ModuleProgress::new("u1", "m1");
        updated.attempts = 2;
        record.set_progress(updated);
        record.set_progress(ModuleProgress::new("u1", "m2"));

        assert_eq!(record.progress.len(), 2);
        assert_eq!(record.progress_for("m1").unwrap().attempts, 2);
    }

    #[test]
    fn test_record_serde_tolerates_missing_collections() {
        let json = r#"{
            "learner_id": "u1",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let record: LearnerRecord = serde_json::from_str(json).unwrap();
        assert!(record.attempts.is_empty());
        assert!(!record.survey_completed());
    }
}
