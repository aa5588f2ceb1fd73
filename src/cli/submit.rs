//! Submit command for Bastion.
//!
//! Grades answers against the pinned question set and records the attempt.
//! Submissions with unanswered questions or answers outside `a`..`d` are
//! rejected before grading.

use serde::Serialize;

use crate::core::{validate_answers, Answers, QuestionOutcome, RetakeDecision, Submission};
use crate::error::{BastionError, Result};
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::{is_denial, CommandContext};

/// Options for the submit command.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the submit command.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub attempt: u32,
    pub correct_count: u32,
    pub total: u32,
    pub percentage: u32,
    pub passed: bool,
    pub outcomes: Vec<QuestionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retake: Option<RetakeDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitOutput {
    pub fn success(module_id: Option<&str>, submission: Submission) -> Self {
        let Submission {
            attempt,
            grade,
            completion,
            retake,
        } = submission;
        Self {
            success: true,
            denied: false,
            module_id: module_id.map(str::to_string),
            attempt,
            correct_count: grade.correct_count,
            total: grade.total,
            percentage: grade.percentage,
            passed: grade.pass,
            outcomes: grade.outcomes,
            module_completed: completion.as_ref().map(|c| c.completed),
            completion_reason: completion.map(|c| c.reason),
            retake: Some(retake),
            error: None,
        }
    }

    pub fn failure(module_id: Option<&str>, err: &BastionError) -> Self {
        Self {
            success: false,
            denied: is_denial(err),
            module_id: module_id.map(str::to_string),
            attempt: 0,
            correct_count: 0,
            total: 0,
            percentage: 0,
            passed: false,
            outcomes: Vec::new(),
            module_completed: None,
            completion_reason: None,
            retake: None,
            error: Some(err.to_string()),
        }
    }
}

/// The submit command implementation.
pub struct SubmitCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> SubmitCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    /// Submit a knowledge check (`module_id`) or the final assessment (`None`).
    pub fn run(&self, learner_id: &str, module_id: Option<&str>, answers: &Answers) -> SubmitOutput {
        match self.submit(learner_id, module_id, answers) {
            Ok(submission) => SubmitOutput::success(module_id, submission),
            Err(e) => SubmitOutput::failure(module_id, &e),
        }
    }

    fn submit(
        &self,
        learner_id: &str,
        module_id: Option<&str>,
        answers: &Answers,
    ) -> Result<Submission> {
        self.ctx.with_engine(|engine| {
            // Refuses locked modules and active cooldowns before answers are checked.
            let questions = engine.pending_questions(learner_id, module_id)?;
            let check = validate_answers(&questions, answers);
            if !check.is_clean() {
                return Err(BastionError::validation(check.describe()));
            }

            match module_id {
                Some(module_id) => engine.submit_knowledge_check(learner_id, module_id, answers),
                None => engine.submit_final(learner_id, answers),
            }
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SubmitOutput, options: &SubmitOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &SubmitOutput) -> String {
        if !output.success {
            return format!(
                "Submission rejected: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut out = format!(
            "Attempt {}: {}/{} correct ({}%), {}\n",
            output.attempt,
            output.correct_count,
            output.total,
            output.percentage,
            if output.passed { "passed" } else { "not passed" }
        );
        for outcome in output.outcomes.iter().filter(|o| !o.is_correct) {
            out.push_str(&format!(
                "  {}: answered {}, correct {}. {}\n",
                outcome.question_id,
                outcome.submitted.as_deref().unwrap_or("-"),
                outcome.correct_answer,
                outcome.explanation
            ));
        }
        if let Some(reason) = &output.completion_reason {
            out.push_str(&format!("Module: {}\n", reason));
        }
        if let Some(retake) = &output.retake {
            if !output.passed {
                out.push_str(&format!("Retake: {}\n", retake.reason));
            }
        }
        out
    }
}
