//! Grading primitive.
//!
//! Pure scoring of multiple-choice answers against a caller-supplied
//! threshold. A missing or malformed answer is simply wrong.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::model::{OptionLetter, Question};

/// Submitted answers keyed by question id.
pub type Answers = HashMap<String, String>;

/// Result of grading one submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradeResult {
    pub correct_count: u32,
    pub total: u32,
    /// `round(100 * correct / total)`, 0 for an empty question set.
    pub percentage: u32,
    pub pass: bool,
    /// Per-question breakdown in the order the questions were graded.
    pub outcomes: Vec<QuestionOutcome>,
}

/// How one question was answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOutcome {
    pub question_id: String,
    /// Normalized submitted answer, if any was given.
    pub submitted: Option<String>,
    pub correct_answer: OptionLetter,
    pub is_correct: bool,
    pub explanation: String,
}

/// Rounded integer percentage with half-up rounding.
pub fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct);
    let total = u64::from(total);
    ((200 * correct + total) / (2 * total)) as u32
}

/// Grade `answers` against `questions`.
pub fn grade(questions: &[Question], answers: &Answers, threshold: u32) -> GradeResult {
    let outcomes: Vec<QuestionOutcome> = questions
        .iter()
        .map(|q| {
            let submitted = answers.get(&q.id).map(|a| a.trim().to_ascii_lowercase());
            let is_correct = submitted
                .as_deref()
                .and_then(OptionLetter::parse)
                .is_some_and(|letter| letter == q.correct);
            QuestionOutcome {
                question_id: q.id.clone(),
                submitted,
                correct_answer: q.correct,
                is_correct,
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let correct_count = outcomes.iter().filter(|o| o.is_correct).count() as u32;
    let total = questions.len() as u32;
    let percentage = percentage(correct_count, total);

    GradeResult {
        correct_count,
        total,
        percentage,
        pass: total > 0 && percentage >= threshold,
        outcomes,
    }
}

/// Problems found in a submission before grading.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnswerCheck {
    /// Question ids with no answer.
    pub missing: Vec<String>,
    /// `(question_id, answer)` pairs outside `a`..`d`.
    pub invalid: Vec<(String, String)>,
}

impl AnswerCheck {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// One-line summary for learner-facing messages.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "Missing answers for questions: {}",
                self.missing.join(", ")
            ));
        }
        for (id, answer) in &self.invalid {
            parts.push(format!("Question {}: Invalid answer '{}'", id, answer));
        }
        parts.join("; ")
    }
}

/// Report unanswered questions and answers that are not an option letter.
pub fn validate_answers(questions: &[Question], answers: &Answers) -> AnswerCheck {
    let missing = questions
        .iter()
        .filter(|q| !answers.contains_key(&q.id))
        .map(|q| q.id.clone())
        .collect();

    let mut invalid: Vec<(String, String)> = answers
        .iter()
        .filter(|(_, answer)| OptionLetter::parse(answer).is_none())
        .map(|(id, answer)| (id.clone(), answer.clone()))
        .collect();
    invalid.sort();

    AnswerCheck { missing, invalid }
}
