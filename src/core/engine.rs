//! Assessment engine for Bastion.
//!
//! Ties the pure rules to the stores. Every operation follows the same
//! discipline: read the learner record, derive a verdict, append to the log,
//! rebuild any affected progress mark, write the record back once.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::catalog::Catalog;
use crate::core::certificate::{self, CertDecision};
use crate::core::clock::Clock;
use crate::core::completion::{self, CompletionReport};
use crate::core::grading::{self, Answers, GradeResult};
use crate::core::model::{
    AssessmentAttempt, AssessmentKind, Module, ModuleProgress, Question, SimulationAttempt,
    SurveyResponse,
};
use crate::core::progression::{self, ModuleAccess};
use crate::core::records::LearnerRecord;
use crate::core::retake::{self, Eligibility, RetakeDecision};
use crate::core::sampler::{self, AttemptContext, PinKey};
use crate::core::simulation::{self, SimulationResult};
use crate::core::survey::{self, SurveyInput};
use crate::error::{BastionError, Degrade, Result};
use crate::storage::{PinStore, RecordStore};
use std::collections::HashMap;

/// A question set handed to the learner, already pinned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServedQuiz {
    pub context: AttemptContext,
    pub questions: Vec<Question>,
    /// Retake verdict that allowed this attempt.
    pub retake: RetakeDecision,
}

/// Outcome of a graded knowledge check or final assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub attempt: u32,
    pub grade: GradeResult,
    /// Module completion after this attempt. `None` for the final.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReport>,
    /// Whether another attempt may start now.
    pub retake: RetakeDecision,
}

/// Engine over a catalog and the record and pin stores.
///
/// Pins are read and written under `session_id` only.
pub struct Engine<'a, R: RecordStore, P: PinStore> {
    catalog: &'a Catalog,
    records: &'a R,
    pins: &'a P,
    config: &'a Config,
    clock: &'a dyn Clock,
    session_id: String,
}

impl<'a, R: RecordStore, P: PinStore> Engine<'a, R, P> {
    pub fn new(
        catalog: &'a Catalog,
        records: &'a R,
        pins: &'a P,
        config: &'a Config,
        clock: &'a dyn Clock,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            records,
            pins,
            config,
            clock,
            session_id: session_id.into(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The learner's record, or a fresh empty one for an unknown learner.
    pub fn record(&self, learner_id: &str) -> Result<LearnerRecord> {
        Ok(self
            .records
            .get(learner_id)?
            .unwrap_or_else(|| LearnerRecord::new(learner_id, self.clock.now())))
    }

    fn kc_threshold(&self) -> u32 {
        self.config.knowledge_check.passing_threshold
    }

    // =========================================================================
    // Completion and progression
    // =========================================================================

    pub fn is_module_fully_completed(&self, learner_id: &str, module_id: &str) -> Result<bool> {
        Ok(self.completion_report(learner_id, module_id)?.completed)
    }

    pub fn completion_report(&self, learner_id: &str, module_id: &str) -> Result<CompletionReport> {
        let module = self.catalog.module(module_id)?;
        let record = self.record(learner_id)?;
        Ok(completion::evaluate(&record, module, self.kc_threshold()))
    }

    /// Access verdicts for every module, in order.
    pub fn accessible_modules(&self, learner_id: &str) -> Result<Vec<ModuleAccess>> {
        let record = self.record(learner_id)?;
        Ok(self.access_for_record(&record))
    }

    fn access_for_record(&self, record: &LearnerRecord) -> Vec<ModuleAccess> {
        progression::accessible_modules(record, &self.catalog.modules_ordered(), self.kc_threshold())
    }

    fn module_access(&self, record: &LearnerRecord, module: &Module) -> Result<ModuleAccess> {
        self.access_for_record(record)
            .into_iter()
            .find(|a| a.module_id == module.id)
            .ok_or_else(|| BastionError::not_found("module", &module.id))
    }

    fn require_access(&self, record: &LearnerRecord, module: &Module) -> Result<()> {
        let access = self.module_access(record, module)?;
        if access.accessible {
            Ok(())
        } else {
            tracing::debug!(learner = %record.learner_id, module = %module.id, reason = %access.reason, "module locked");
            Err(BastionError::invalid_state(access.reason))
        }
    }

    /// An empty catalog counts as fully completed.
    fn all_modules_completed(&self, record: &LearnerRecord) -> bool {
        self.catalog
            .modules
            .iter()
            .all(|m| completion::is_module_fully_completed(record, m, self.kc_threshold()))
    }

    /// Open a module, creating a `not_started` mark the first time.
    ///
    /// Refused with the lock reason when the module is not accessible.
    pub fn enter_module(&self, learner_id: &str, module_id: &str) -> Result<ModuleProgress> {
        let module = self.catalog.module(module_id)?;
        let mut record = self.record(learner_id)?;
        self.require_access(&record, module)?;

        if let Some(mark) = record.progress_for(module_id) {
            return Ok(mark.clone());
        }

        let mark = ModuleProgress::new(learner_id, module_id);
        record.set_progress(mark.clone());
        record.touch(self.clock.now());
        self.records.put(&record)?;

        tracing::debug!(learner = learner_id, module = module_id, "module entered");
        Ok(mark)
    }

    /// Add time spent in a module and rebuild its mark.
    pub fn record_time(
        &self,
        learner_id: &str,
        module_id: &str,
        minutes: u32,
    ) -> Result<ModuleProgress> {
        let module = self.catalog.module(module_id)?;
        let mut record = self.record(learner_id)?;
        let now = self.clock.now();

        let mut mark = record
            .progress_for(module_id)
            .cloned()
            .unwrap_or_else(|| ModuleProgress::new(learner_id, module_id));
        mark.time_spent_minutes = mark.time_spent_minutes.saturating_add(minutes);
        record.set_progress(mark);

        let mark = self.rebuild_mark(&mut record, module);
        record.touch(now);
        self.records.put(&record)?;
        Ok(mark)
    }

    /// Rebuild every progress mark from the attempt log.
    pub fn refresh_progress(&self, learner_id: &str) -> Result<Vec<ModuleProgress>> {
        let mut record = self.record(learner_id)?;
        let marks: Vec<ModuleProgress> = self
            .catalog
            .modules_ordered()
            .into_iter()
            .map(|module| self.rebuild_mark(&mut record, module))
            .collect();

        record.touch(self.clock.now());
        self.records.put(&record)?;
        Ok(marks)
    }

    fn rebuild_mark(&self, record: &mut LearnerRecord, module: &Module) -> ModuleProgress {
        let mark = progression::recompute_mark(
            record.progress_for(&module.id),
            record,
            module,
            self.kc_threshold(),
            self.clock.now(),
        );
        record.set_progress(mark.clone());
        mark
    }

    // =========================================================================
    // Retake policy and eligibility
    // =========================================================================

    pub fn can_retake_final(&self, learner_id: &str) -> Result<RetakeDecision> {
        let record = self.record(learner_id)?;
        Ok(self.final_retake_for_record(&record))
    }

    fn final_retake_for_record(&self, record: &LearnerRecord) -> RetakeDecision {
        let policy = &self.config.final_assessment;
        let (count, last) = retake::current_cycle(&record.final_attempt_times(), policy);
        let decision = retake::can_retake_final(count, last, self.clock.now(), policy);
        tracing::debug!(
            learner = %record.learner_id,
            cycle_attempts = count,
            can_retake = decision.can_retake,
            "final retake evaluated"
        );
        decision
    }

    pub fn can_retake_knowledge_check(
        &self,
        learner_id: &str,
        module_id: &str,
    ) -> Result<RetakeDecision> {
        self.catalog.module(module_id)?;
        let record = self.record(learner_id)?;
        let attempts = record.attempt_count(AssessmentKind::KnowledgeCheck, Some(module_id));
        Ok(retake::can_retake_knowledge_check(
            attempts,
            &self.config.knowledge_check,
        ))
    }

    pub fn final_eligibility(&self, learner_id: &str) -> Result<Eligibility> {
        let record = self.record(learner_id)?;
        Ok(self.final_eligibility_for_record(&record))
    }

    fn final_eligibility_for_record(&self, record: &LearnerRecord) -> Eligibility {
        retake::final_eligibility(self.all_modules_completed(record), record.final_passed())
    }

    pub fn survey_eligibility(&self, learner_id: &str) -> Result<Eligibility> {
        let record = self.record(learner_id)?;
        Ok(survey::survey_eligibility(
            record.final_passed(),
            record.survey_completed(),
        ))
    }

    pub fn can_generate_certificate(&self, learner_id: &str) -> Result<CertDecision> {
        let record = self.record(learner_id)?;
        Ok(certificate::can_generate_certificate(
            record.final_passed(),
            record.survey_completed(),
        ))
    }

    /// Gate a new attempt. Returns the verdict and the attempt number.
    fn open_attempt(
        &self,
        record: &LearnerRecord,
        module: Option<&Module>,
    ) -> Result<(RetakeDecision, u32)> {
        let decision = match module {
            Some(module) => {
                self.require_access(record, module)?;
                let attempts =
                    record.attempt_count(AssessmentKind::KnowledgeCheck, Some(&module.id));
                retake::can_retake_knowledge_check(attempts, &self.config.knowledge_check)
            }
            None => {
                let eligibility = self.final_eligibility_for_record(record);
                if !eligibility.eligible {
                    return Err(BastionError::invalid_state(eligibility.reason));
                }
                self.final_retake_for_record(record)
            }
        };

        if !decision.can_retake {
            return Err(BastionError::invalid_state(decision.reason));
        }

        let kind = match module {
            Some(_) => AssessmentKind::KnowledgeCheck,
            None => AssessmentKind::FinalAssessment,
        };
        let attempt = record.attempt_count(kind, module.map(|m| m.id.as_str())) + 1;
        Ok((decision, attempt))
    }

    // =========================================================================
    // Serving and grading
    // =========================================================================

    /// Serve and pin a question set. `module_id = None` serves the final.
    ///
    /// Serving the same attempt again returns the set already pinned.
    pub fn sample_questions<G: Rng + ?Sized>(
        &self,
        learner_id: &str,
        module_id: Option<&str>,
        rng: &mut G,
    ) -> Result<ServedQuiz> {
        let module = module_id.map(|id| self.catalog.module(id)).transpose()?;
        let record = self.record(learner_id)?;
        let (retake, attempt) = self.open_attempt(&record, module)?;

        let key = PinKey::new(learner_id, module_id, attempt);
        if let Some(context) = self.pins.get_pin(&self.session_id, &key)? {
            let questions = sampler::resolve_pinned(&self.catalog.questions, &context);
            if !questions.is_empty() {
                return Ok(ServedQuiz {
                    context,
                    questions,
                    retake,
                });
            }
        }

        let bank = self.catalog.bank(module_id);
        if bank.is_empty() {
            tracing::warn!(learner = learner_id, module = ?module_id, "question bank is empty");
        }
        let desired = match module {
            Some(_) => self.config.knowledge_check.question_count,
            None => self.config.final_assessment.question_count,
        };
        let questions = sampler::sample_for_attempt(&bank, desired as usize, attempt, rng);

        let context = AttemptContext::new(key, &questions, self.clock.now());
        self.pins.put_pin(&self.session_id, &context)?;

        tracing::debug!(
            learner = learner_id,
            module = ?module_id,
            attempt,
            served = questions.len(),
            "question set pinned"
        );
        Ok(ServedQuiz {
            context,
            questions,
            retake,
        })
    }

    /// Grade `answers` against questions identified by `served_ids`, in order.
    pub fn grade_submission(
        &self,
        served_ids: &[String],
        answers: &Answers,
        threshold: u32,
    ) -> GradeResult {
        let questions: Vec<Question> = served_ids
            .iter()
            .filter_map(|id| {
                let found = self.catalog.questions.iter().find(|q| &q.id == id).cloned();
                if found.is_none() {
                    tracing::warn!(question_id = %id, "served question missing from bank");
                }
                found
            })
            .collect();
        grading::grade(&questions, answers, threshold)
    }

    /// Questions to grade: the pinned set, else the whole bank.
    ///
    /// Fatal store errors are returned; an unreadable pin degrades to the bank.
    fn questions_for(&self, key: &PinKey) -> Result<Vec<Question>> {
        let pinned = match self.pins.get_pin(&self.session_id, key) {
            Err(e) if e.is_fatal() => return Err(e),
            other => other.degrade_default("reading question pin"),
        };

        Ok(match pinned {
            Some(context) => sampler::resolve_pinned(&self.catalog.questions, &context),
            None => {
                tracing::warn!(pin = %key, "no pinned question set, grading against full bank");
                self.catalog.bank(key.module_id.as_deref())
            }
        })
    }

    /// Questions the next submission will be graded against.
    ///
    /// Runs the same gate as submission, so a locked module or an active
    /// cooldown is refused with its reason.
    pub fn pending_questions(
        &self,
        learner_id: &str,
        module_id: Option<&str>,
    ) -> Result<Vec<Question>> {
        let module = module_id.map(|id| self.catalog.module(id)).transpose()?;
        let record = self.record(learner_id)?;
        let (_, attempt) = self.open_attempt(&record, module)?;
        self.questions_for(&PinKey::new(learner_id, module_id, attempt))
    }

    /// Grade a knowledge check and record it.
    pub fn submit_knowledge_check(
        &self,
        learner_id: &str,
        module_id: &str,
        answers: &Answers,
    ) -> Result<Submission> {
        let module = self.catalog.module(module_id)?;
        let mut record = self.record(learner_id)?;
        let (_, attempt) = self.open_attempt(&record, Some(module))?;

        let key = PinKey::new(learner_id, Some(module_id), attempt);
        let questions = self.questions_for(&key)?;
        let grade = grading::grade(&questions, answers, self.kc_threshold());

        let now = self.clock.now();
        record.append_attempt(AssessmentAttempt {
            learner_id: learner_id.to_string(),
            kind: AssessmentKind::KnowledgeCheck,
            module_id: Some(module_id.to_string()),
            score: grade.percentage,
            total: grade.total,
            correct: grade.correct_count,
            passed: grade.pass,
            created_at: now,
        });
        self.rebuild_mark(&mut record, module);
        self.records.put(&record)?;
        self.pins
            .remove_pin(&self.session_id, &key)
            .degrade_default("removing question pin");

        tracing::info!(
            learner = learner_id,
            module = module_id,
            attempt,
            score = grade.percentage,
            passed = grade.pass,
            "knowledge check recorded"
        );

        let attempts = record.attempt_count(AssessmentKind::KnowledgeCheck, Some(module_id));
        Ok(Submission {
            attempt,
            completion: Some(completion::evaluate(&record, module, self.kc_threshold())),
            retake: retake::can_retake_knowledge_check(attempts, &self.config.knowledge_check),
            grade,
        })
    }

    /// Grade a final assessment and record it.
    pub fn submit_final(&self, learner_id: &str, answers: &Answers) -> Result<Submission> {
        let mut record = self.record(learner_id)?;
        let (_, attempt) = self.open_attempt(&record, None)?;

        let key = PinKey::new(learner_id, None, attempt);
        let questions = self.questions_for(&key)?;
        let grade = grading::grade(
            &questions,
            answers,
            self.config.final_assessment.passing_threshold,
        );

        record.append_attempt(AssessmentAttempt {
            learner_id: learner_id.to_string(),
            kind: AssessmentKind::FinalAssessment,
            module_id: None,
            score: grade.percentage,
            total: grade.total,
            correct: grade.correct_count,
            passed: grade.pass,
            created_at: self.clock.now(),
        });
        self.records.put(&record)?;
        self.pins
            .remove_pin(&self.session_id, &key)
            .degrade_default("removing question pin");

        tracing::info!(
            learner = learner_id,
            attempt,
            score = grade.percentage,
            passed = grade.pass,
            "final assessment recorded"
        );

        Ok(Submission {
            attempt,
            completion: None,
            retake: self.final_retake_for_record(&record),
            grade,
        })
    }

    // =========================================================================
    // Simulations and survey
    // =========================================================================

    /// Score a simulation run and append it to the log.
    ///
    /// With `module_id`, the module must be open and carry a simulation of the
    /// scenario's kind. Only a `finalize`d run counts toward completion.
    pub fn evaluate_simulation(
        &self,
        learner_id: &str,
        scenario_id: &str,
        module_id: Option<&str>,
        choices: &HashMap<String, String>,
        finalize: bool,
    ) -> Result<SimulationResult> {
        let scenario = self.catalog.scenario(scenario_id)?;
        let module = module_id.map(|id| self.catalog.module(id)).transpose()?;
        let mut record = self.record(learner_id)?;

        if let Some(module) = module {
            self.require_access(&record, module)?;
            if module.simulation != Some(scenario.kind) {
                return Err(BastionError::validation(format!(
                    "module {} has no {} simulation",
                    module.id, scenario.kind
                )));
            }
        }

        let result = simulation::evaluate(
            scenario,
            choices,
            self.config.simulation.passing_threshold,
        );

        let now = self.clock.now();
        record.append_simulation(SimulationAttempt {
            learner_id: learner_id.to_string(),
            module_id: module_id.map(str::to_string),
            kind: scenario.kind,
            scenario_id: scenario.id.clone(),
            score: result.score,
            total: result.total,
            percentage: result.percentage,
            passed: result.pass,
            completed: finalize,
            decisions: result.decisions.clone(),
            created_at: now,
            updated_at: now,
        });
        if let Some(module) = module {
            self.rebuild_mark(&mut record, module);
        }
        self.records.put(&record)?;

        tracing::info!(
            learner = learner_id,
            scenario = scenario_id,
            score = result.score,
            total = result.total,
            completed = finalize,
            "simulation recorded"
        );
        Ok(result)
    }

    /// Validate and store the satisfaction survey.
    pub fn submit_survey(&self, learner_id: &str, input: &SurveyInput) -> Result<SurveyResponse> {
        let mut record = self.record(learner_id)?;

        let eligibility =
            survey::survey_eligibility(record.final_passed(), record.survey_completed());
        if !eligibility.eligible {
            return Err(BastionError::invalid_state(eligibility.reason));
        }

        let rating = survey::validate(input, self.config.survey.max_feedback_chars)?;
        if let Some(module_id) = &input.module_id {
            self.catalog.module(module_id)?;
        }

        let now = self.clock.now();
        let response = SurveyResponse {
            learner_id: learner_id.to_string(),
            rating,
            feedback: input.feedback.clone(),
            difficulty: input.difficulty,
            module_id: input.module_id.clone(),
            submitted_at: now,
        };
        record.survey = Some(response.clone());
        record.touch(now);
        self.records.put(&record)?;

        tracing::info!(learner = learner_id, rating, "survey recorded");
        Ok(response)
    }

    /// Drop every pin held by this session.
    pub fn end_session(&self) -> Result<()> {
        self.pins.clear_session(&self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::tests::sample_catalog;
    use crate::core::clock::FixedClock;
    use crate::core::model::{OptionLetter, ProgressStatus};
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        catalog: Catalog,
        store: MemoryStore,
        config: Config,
        clock: FixedClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: sample_catalog(),
                store: MemoryStore::new(),
                config: Config::default(),
                clock: FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
            }
        }

        fn engine(&self) -> Engine<'_, MemoryStore, MemoryStore> {
            Engine::new(
                &self.catalog,
                &self.store,
                &self.store,
                &self.config,
                &self.clock,
                "session-1",
            )
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Answer every served question, `correct` of them right.
    fn answers_for(questions: &[Question], correct: usize) -> Answers {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let letter = if i < correct {
                    q.correct
                } else {
                    OptionLetter::ALL[(q.correct.index() + 1) % 4]
                };
                (q.id.clone(), letter.as_str().to_string())
            })
            .collect()
    }

    fn all_choices(answer: &str) -> HashMap<String, String> {
        ["d1", "d2", "d3"]
            .iter()
            .map(|d| (d.to_string(), answer.to_string()))
            .collect()
    }

    fn pass_module(engine: &Engine<'_, MemoryStore, MemoryStore>, learner: &str, module: &str) {
        let quiz = engine
            .sample_questions(learner, Some(module), &mut rng())
            .unwrap();
        let answers = answers_for(&quiz.questions, quiz.questions.len());
        engine
            .submit_knowledge_check(learner, module, &answers)
            .unwrap();
        if engine.catalog().module(module).unwrap().has_simulation() {
            engine
                .evaluate_simulation(learner, "phish-1", Some(module), &all_choices("b"), true)
                .unwrap();
        }
    }

    fn complete_all_modules(engine: &Engine<'_, MemoryStore, MemoryStore>, learner: &str) {
        for module in ["m1", "m2", "m3"] {
            pass_module(engine, learner, module);
        }
    }

    #[test]
    fn test_unknown_learner_sees_only_first_module() {
        let fixture = Fixture::new();
        let access = fixture.engine().accessible_modules("nobody").unwrap();

        let open: Vec<bool> = access.iter().map(|a| a.accessible).collect();
        assert_eq!(open, vec![true, false, false]);
        assert_eq!(access[1].reason, "Must complete Foundations first");
        assert!(fixture.store.is_empty());
    }

    #[test]
    fn test_knowledge_check_threshold_scenario() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let quiz = engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();
        assert_eq!(quiz.questions.len(), 5);
        let failed = engine
            .submit_knowledge_check("u1", "m1", &answers_for(&quiz.questions, 3))
            .unwrap();
        assert_eq!(failed.grade.percentage, 60);
        assert!(!failed.grade.pass);
        assert!(!engine.accessible_modules("u1").unwrap()[1].accessible);

        let quiz = engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();
        assert_eq!(quiz.context.attempt, 2);
        let passed = engine
            .submit_knowledge_check("u1", "m1", &answers_for(&quiz.questions, 4))
            .unwrap();
        assert_eq!(passed.grade.percentage, 80);
        assert!(passed.grade.pass);
        assert!(passed.completion.unwrap().completed);
        assert!(engine.accessible_modules("u1").unwrap()[1].accessible);
    }

    #[test]
    fn test_simulation_required_for_completion() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        pass_module(&engine, "u1", "m1");

        let quiz = engine.sample_questions("u1", Some("m2"), &mut rng()).unwrap();
        let submission = engine
            .submit_knowledge_check("u1", "m2", &answers_for(&quiz.questions, 5))
            .unwrap();

        let completion = submission.completion.unwrap();
        assert!(completion.knowledge_check_passed);
        assert!(!completion.completed);
        assert_eq!(completion.reason, "Simulation not completed");
        assert!(!engine.is_module_fully_completed("u1", "m2").unwrap());

        engine
            .evaluate_simulation("u1", "phish-1", Some("m2"), &all_choices("b"), false)
            .unwrap();
        assert!(!engine.is_module_fully_completed("u1", "m2").unwrap());

        engine
            .evaluate_simulation("u1", "phish-1", Some("m2"), &all_choices("b"), true)
            .unwrap();
        assert!(engine.is_module_fully_completed("u1", "m2").unwrap());

        let record = engine.record("u1").unwrap();
        assert_eq!(record.simulations.len(), 2);
        assert_eq!(
            record.progress_for("m2").unwrap().status,
            ProgressStatus::Completed
        );
    }

    #[test]
    fn test_locked_module_refuses_quiz_and_entry() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let err = engine
            .sample_questions("u1", Some("m2"), &mut rng())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state: Must complete Foundations first"
        );
        assert!(engine.enter_module("u1", "m3").is_err());
        assert!(engine.submit_knowledge_check("u1", "m2", &Answers::new()).is_err());
    }

    #[test]
    fn test_enter_module_is_idempotent() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let first = engine.enter_module("u1", "m1").unwrap();
        assert_eq!(first.status, ProgressStatus::NotStarted);

        fixture.clock.advance(Duration::minutes(5));
        let second = engine.enter_module("u1", "m1").unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.record("u1").unwrap().progress.len(), 1);
    }

    #[test]
    fn test_unknown_module_is_not_found() {
        let fixture = Fixture::new();
        let err = fixture.engine().enter_module("u1", "m9").unwrap_err();
        assert_eq!(err.to_string(), "module not found: m9");
    }

    #[test]
    fn test_served_set_is_pinned_and_reused() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let first = engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();
        let again = engine
            .sample_questions("u1", Some("m1"), &mut StdRng::seed_from_u64(99))
            .unwrap();
        assert_eq!(first.context, again.context);
        assert_eq!(fixture.store.pin_count("session-1"), 1);

        engine
            .submit_knowledge_check("u1", "m1", &answers_for(&first.questions, 5))
            .unwrap();
        assert_eq!(fixture.store.pin_count("session-1"), 0);
    }

    #[test]
    fn test_pins_are_session_scoped() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();

        let other = Engine::new(
            &fixture.catalog,
            &fixture.store,
            &fixture.store,
            &fixture.config,
            &fixture.clock,
            "session-2",
        );
        assert_eq!(fixture.store.pin_count("session-2"), 0);

        // Without a pin the whole five-question bank is graded.
        let answers = answers_for(&fixture.catalog.bank(Some("m1")), 5);
        let submission = other.submit_knowledge_check("u1", "m1", &answers).unwrap();
        assert_eq!(submission.grade.total, 5);
        assert_eq!(fixture.store.pin_count("session-1"), 1);
    }

    #[test]
    fn test_missing_pin_falls_back_to_full_bank() {
        let mut fixture = Fixture::new();
        fixture.config.knowledge_check.question_count = 2;
        let engine = fixture.engine();

        let answers = answers_for(&fixture.catalog.bank(Some("m1")), 4);
        let submission = engine.submit_knowledge_check("u1", "m1", &answers).unwrap();

        assert_eq!(submission.grade.total, 5);
        assert_eq!(submission.grade.correct_count, 4);
    }

    /// Pin store whose reads always fail with the given error.
    struct FailingPins {
        fatal: bool,
    }

    impl PinStore for FailingPins {
        fn get_pin(&self, _session_id: &str, _key: &PinKey) -> Result<Option<AttemptContext>> {
            if self.fatal {
                Err(BastionError::storage(
                    "/data/pins",
                    std::io::Error::other("disk gone"),
                ))
            } else {
                Err(BastionError::serde("corrupt pin"))
            }
        }

        fn put_pin(&self, _session_id: &str, _context: &AttemptContext) -> Result<()> {
            Ok(())
        }

        fn remove_pin(&self, _session_id: &str, _key: &PinKey) -> Result<()> {
            Ok(())
        }

        fn clear_session(&self, _session_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_fatal_pin_error_is_propagated_and_nothing_recorded() {
        let fixture = Fixture::new();
        let pins = FailingPins { fatal: true };
        let engine = Engine::new(
            &fixture.catalog,
            &fixture.store,
            &pins,
            &fixture.config,
            &fixture.clock,
            "session-1",
        );
        let answers = answers_for(&fixture.catalog.bank(Some("m1")), 5);

        let err = engine.submit_knowledge_check("u1", "m1", &answers).unwrap_err();

        assert!(err.is_fatal());
        assert!(fixture.store.get("u1").unwrap().is_none());
        assert!(engine.pending_questions("u1", Some("m1")).unwrap_err().is_fatal());
    }

    #[test]
    fn test_unreadable_pin_degrades_to_full_bank() {
        let fixture = Fixture::new();
        let pins = FailingPins { fatal: false };
        let engine = Engine::new(
            &fixture.catalog,
            &fixture.store,
            &pins,
            &fixture.config,
            &fixture.clock,
            "session-1",
        );
        let answers = answers_for(&fixture.catalog.bank(Some("m1")), 5);

        let submission = engine.submit_knowledge_check("u1", "m1", &answers).unwrap();

        assert_eq!(submission.grade.total, 5);
        assert!(submission.grade.pass);
    }

    #[test]
    fn test_pending_questions_refused_by_gate() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let locked = engine.pending_questions("u1", Some("m2")).unwrap_err();
        assert!(matches!(locked, BastionError::InvalidState { .. }));
        assert!(locked.to_string().contains("Must complete Foundations first"));

        let final_locked = engine.pending_questions("u1", None).unwrap_err();
        assert!(matches!(final_locked, BastionError::InvalidState { .. }));
    }

    #[test]
    fn test_grade_submission_keeps_served_order() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        let served = vec!["m1-q3".to_string(), "gone".to_string(), "m1-q1".to_string()];
        let answers: Answers = [("m1-q3".to_string(), "a".to_string())].into();

        let result = engine.grade_submission(&served, &answers, 50);
        let ids: Vec<_> = result.outcomes.iter().map(|o| o.question_id.as_str()).collect();
        assert_eq!(ids, vec!["m1-q3", "m1-q1"]);
        assert_eq!(result.percentage, 50);
        assert!(result.pass);

        // Grading twice with identical input is identical.
        assert_eq!(result, engine.grade_submission(&served, &answers, 50));
    }

    #[test]
    fn test_knowledge_check_attempt_cap() {
        let mut fixture = Fixture::new();
        fixture.config.knowledge_check.max_attempts = 2;
        let engine = fixture.engine();

        for _ in 0..2 {
            engine
                .submit_knowledge_check("u1", "m1", &Answers::new())
                .unwrap();
        }

        let decision = engine.can_retake_knowledge_check("u1", "m1").unwrap();
        assert!(!decision.can_retake);
        let err = engine
            .sample_questions("u1", Some("m1"), &mut rng())
            .unwrap_err();
        assert!(err.to_string().contains("Maximum of 2 knowledge check attempts"));
    }

    #[test]
    fn test_final_requires_all_modules() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        pass_module(&engine, "u1", "m1");

        let eligibility = engine.final_eligibility("u1").unwrap();
        assert!(!eligibility.eligible);
        let err = engine.sample_questions("u1", None, &mut rng()).unwrap_err();
        assert!(err.to_string().contains("complete all modules"));
    }

    #[test]
    fn test_final_retake_cycle_after_cooldown() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        complete_all_modules(&engine, "u1");

        for attempt in 1..=3 {
            let quiz = engine.sample_questions("u1", None, &mut rng()).unwrap();
            assert_eq!(quiz.context.attempt, attempt);
            let submission = engine
                .submit_final("u1", &answers_for(&quiz.questions, 0))
                .unwrap();
            assert!(!submission.grade.pass);
            fixture.clock.advance(Duration::hours(1));
        }

        let denied = engine.can_retake_final("u1").unwrap();
        assert!(!denied.can_retake);
        assert!(denied.reason.starts_with("48-hour cooldown period active"));
        assert!(engine.sample_questions("u1", None, &mut rng()).is_err());

        fixture.clock.advance(Duration::hours(49));
        let allowed = engine.can_retake_final("u1").unwrap();
        assert!(allowed.can_retake);
        assert!(allowed.cooldown_reset);
        assert_eq!(allowed.attempts_remaining, 3);

        let quiz = engine.sample_questions("u1", None, &mut rng()).unwrap();
        assert_eq!(quiz.context.attempt, 4);
        let submission = engine
            .submit_final("u1", &answers_for(&quiz.questions, quiz.questions.len()))
            .unwrap();
        assert!(submission.grade.pass);

        let closed = engine.final_eligibility("u1").unwrap();
        assert!(!closed.eligible);
        assert!(closed.reason.contains("already passed"));
    }

    #[test]
    fn test_certificate_and_survey_flow() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        complete_all_modules(&engine, "u1");

        let denied = engine.can_generate_certificate("u1").unwrap();
        assert_eq!(denied.missing_requirement.as_deref(), Some("final_assessment"));
        assert!(engine
            .submit_survey("u1", &SurveyInput { rating: Some(5), ..Default::default() })
            .is_err());

        let quiz = engine.sample_questions("u1", None, &mut rng()).unwrap();
        engine
            .submit_final("u1", &answers_for(&quiz.questions, quiz.questions.len()))
            .unwrap();

        let missing_survey = engine.can_generate_certificate("u1").unwrap();
        assert!(!missing_survey.can_generate);
        assert_eq!(missing_survey.missing_requirement.as_deref(), Some("survey"));

        let bad = SurveyInput { rating: Some(9), ..Default::default() };
        assert!(engine.submit_survey("u1", &bad).is_err());

        let input = SurveyInput {
            rating: Some(4),
            feedback: "Useful".to_string(),
            ..Default::default()
        };
        let response = engine.submit_survey("u1", &input).unwrap();
        assert_eq!(response.rating, 4);
        assert!(engine.submit_survey("u1", &input).is_err());

        assert!(engine.can_generate_certificate("u1").unwrap().can_generate);
    }

    #[test]
    fn test_simulation_kind_must_match_module() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let err = engine
            .evaluate_simulation("u1", "phish-1", Some("m1"), &all_choices("b"), true)
            .unwrap_err();
        assert!(matches!(err, BastionError::Validation { .. }));

        let standalone = engine
            .evaluate_simulation("u1", "phish-1", None, &all_choices("a"), true)
            .unwrap();
        assert_eq!(standalone.score, 0);
        assert!(!standalone.pass);
    }

    #[test]
    fn test_record_time_accumulates_and_starts_module() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        engine.record_time("u1", "m1", 10).unwrap();
        let mark = engine.record_time("u1", "m1", 15).unwrap();

        assert_eq!(mark.time_spent_minutes, 25);
        assert_eq!(mark.status, ProgressStatus::InProgress);
        assert!(mark.started_at.is_some());
    }

    #[test]
    fn test_refresh_progress_repairs_stale_marks() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        pass_module(&engine, "u1", "m1");

        let mut record = engine.record("u1").unwrap();
        let mut stale = ModuleProgress::new("u1", "m3");
        stale.status = ProgressStatus::Completed;
        record.set_progress(stale);
        fixture.store.put(&record).unwrap();

        let marks = engine.refresh_progress("u1").unwrap();
        let statuses: Vec<_> = marks.iter().map(|m| m.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProgressStatus::Completed,
                ProgressStatus::NotStarted,
                ProgressStatus::NotStarted
            ]
        );
    }

    #[test]
    fn test_pending_questions_follow_the_pin() {
        let mut fixture = Fixture::new();
        fixture.config.knowledge_check.question_count = 3;
        let engine = fixture.engine();

        assert_eq!(engine.pending_questions("u1", Some("m1")).unwrap().len(), 5);

        let quiz = engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();
        assert_eq!(engine.pending_questions("u1", Some("m1")).unwrap(), quiz.questions);
    }

    #[test]
    fn test_end_session_clears_pins() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        engine.sample_questions("u1", Some("m1"), &mut rng()).unwrap();

        engine.end_session().unwrap();
        assert_eq!(fixture.store.pin_count("session-1"), 0);
    }
}
