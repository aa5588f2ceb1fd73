//! Quiz command for Bastion.
//!
//! Serves and pins a knowledge check (with a module) or the final assessment
//! (without one). Correct answers are never included in the output.

use rand::Rng;
use serde::Serialize;

use crate::core::{Question, ServedQuiz};
use crate::error::BastionError;
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::{is_denial, CommandContext};

/// Options for the quiz command.
#[derive(Debug, Clone, Default)]
pub struct QuizOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// A served question without its answer key.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: [String; 4],
}

impl From<&Question> for QuizQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

/// Output format for the quiz command.
#[derive(Debug, Clone, Serialize)]
pub struct QuizOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub attempt: u32,
    pub attempts_remaining: u32,
    pub questions: Vec<QuizQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuizOutput {
    pub fn success(quiz: &ServedQuiz) -> Self {
        Self {
            success: true,
            denied: false,
            module_id: quiz.context.module_id.clone(),
            attempt: quiz.context.attempt,
            attempts_remaining: quiz.retake.attempts_remaining,
            questions: quiz.questions.iter().map(QuizQuestion::from).collect(),
            error: None,
        }
    }

    pub fn failure(module_id: Option<&str>, err: &BastionError) -> Self {
        Self {
            success: false,
            denied: is_denial(err),
            module_id: module_id.map(str::to_string),
            attempt: 0,
            attempts_remaining: 0,
            questions: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// The quiz command implementation.
pub struct QuizCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> QuizCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: &str, module_id: Option<&str>) -> QuizOutput {
        self.run_with_rng(learner_id, module_id, &mut rand::rng())
    }

    pub fn run_with_rng<G: Rng + ?Sized>(
        &self,
        learner_id: &str,
        module_id: Option<&str>,
        rng: &mut G,
    ) -> QuizOutput {
        match self
            .ctx
            .with_engine(|engine| engine.sample_questions(learner_id, module_id, rng))
        {
            Ok(quiz) => QuizOutput::success(&quiz),
            Err(e) => QuizOutput::failure(module_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &QuizOutput, options: &QuizOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &QuizOutput) -> String {
        if !output.success {
            return format!(
                "Cannot start quiz: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let title = match &output.module_id {
            Some(id) => format!("Knowledge check {}", id),
            None => "Final assessment".to_string(),
        };
        let mut out = format!(
            "{}, attempt {} ({} remaining)\n",
            title, output.attempt, output.attempts_remaining
        );
        if output.questions.is_empty() {
            out.push_str("No questions available.\n");
        }
        for (i, question) in output.questions.iter().enumerate() {
            out.push_str(&format!("\n{}. [{}] {}\n", i + 1, question.id, question.prompt));
            for (letter, option) in ["a", "b", "c", "d"].iter().zip(&question.options) {
                out.push_str(&format!("   {}) {}\n", letter, option));
            }
        }
        out
    }
}
