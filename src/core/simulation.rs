//! Decision-scenario scoring.
//!
//! A scenario is a list of decision points. Each decision is right only when
//! the learner picked an option that exists and is flagged correct.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::grading::percentage;
use crate::core::model::SimulationKind;
use crate::error::{BastionError, Result};

/// A selectable option at a decision point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionOption {
    pub id: String,
    pub text: String,
    pub correct: bool,
    #[serde(default)]
    pub explanation: String,
}

/// One decision the learner has to make.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionPoint {
    pub id: String,
    pub prompt: String,
    pub options: Vec<DecisionOption>,
}

impl DecisionPoint {
    fn option(&self, id: &str) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id.eq_ignore_ascii_case(id))
    }

    fn correct_option_ids(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| o.correct)
            .map(|o| o.id.clone())
            .collect()
    }
}

/// An interactive scenario such as a suspicious email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub kind: SimulationKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub decision_points: Vec<DecisionPoint>,
}

/// Feedback for one decision point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionOutcome {
    pub decision_id: String,
    pub chosen: Option<String>,
    pub correct_options: Vec<String>,
    pub is_correct: bool,
    /// Explanation of the chosen option, or of the first correct option when
    /// nothing usable was chosen.
    pub explanation: String,
}

/// Result of evaluating a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub scenario_id: String,
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub pass: bool,
    pub decisions: Vec<DecisionOutcome>,
}

/// Check a scenario is playable.
///
/// Requires at least one decision point and unique decision ids. Every point
/// needs options with unique ids and at least one correct option.
pub fn validate_scenario(scenario: &Scenario) -> Result<()> {
    if scenario.decision_points.is_empty() {
        return Err(BastionError::validation(format!(
            "scenario {} has no decision points",
            scenario.id
        )));
    }

    let mut decision_ids = HashSet::new();
    for point in &scenario.decision_points {
        if !decision_ids.insert(point.id.as_str()) {
            return Err(BastionError::validation(format!(
                "scenario {} repeats decision id '{}'",
                scenario.id, point.id
            )));
        }
        if point.options.is_empty() {
            return Err(BastionError::validation(format!(
                "decision {} in scenario {} has no options",
                point.id, scenario.id
            )));
        }
        if !point.options.iter().any(|o| o.correct) {
            return Err(BastionError::validation(format!(
                "decision {} in scenario {} has no correct option",
                point.id, scenario.id
            )));
        }
        let mut seen = HashSet::new();
        for option in &point.options {
            if !seen.insert(option.id.to_ascii_lowercase()) {
                return Err(BastionError::validation(format!(
                    "decision {} in scenario {} repeats option id '{}'",
                    point.id, scenario.id, option.id
                )));
            }
        }
    }

    Ok(())
}

/// Score `choices` (decision id -> option id) against `scenario`.
pub fn evaluate(
    scenario: &Scenario,
    choices: &HashMap<String, String>,
    threshold: u32,
) -> SimulationResult {
    let decisions: Vec<DecisionOutcome> = scenario
        .decision_points
        .iter()
        .map(|point| {
            let chosen = choices.get(&point.id).map(|c| c.trim().to_string());
            let picked = chosen.as_deref().and_then(|c| point.option(c));
            let is_correct = picked.is_some_and(|o| o.correct);
            let explanation = picked
                .or_else(|| point.options.iter().find(|o| o.correct))
                .map(|o| o.explanation.clone())
                .unwrap_or_default();

            DecisionOutcome {
                decision_id: point.id.clone(),
                chosen,
                correct_options: point.correct_option_ids(),
                is_correct,
                explanation,
            }
        })
        .collect();

    let score = decisions.iter().filter(|d| d.is_correct).count() as u32;
    let total = decisions.len() as u32;
    let percentage = percentage(score, total);

    SimulationResult {
        scenario_id: scenario.id.clone(),
        score,
        total,
        percentage,
        pass: total > 0 && percentage >= threshold,
        decisions,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn option(id: &str, correct: bool) -> DecisionOption {
        DecisionOption {
            id: id.to_string(),
            text: format!("choice {}", id),
            correct,
            explanation: format!("because {}", id),
        }
    }

    /// Three-decision phishing scenario; option `b` is right everywhere.
    pub(crate) fn phishing_scenario() -> Scenario {
        let point = |id: &str| DecisionPoint {
            id: id.to_string(),
            prompt: format!("What do you do at {}?", id),
            options: vec![option("a", false), option("b", true), option("c", false)],
        };
        Scenario {
            id: "phish-1".to_string(),
            kind: SimulationKind::Phishing,
            title: "Suspicious Email from Bank".to_string(),
            description: "An urgent verification request".to_string(),
            decision_points: vec![point("d1"), point("d2"), point("d3")],
        }
    }

    fn choices(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_all_correct_passes() {
        let result = evaluate(
            &phishing_scenario(),
            &choices(&[("d1", "b"), ("d2", "b"), ("d3", "b")]),
            70,
        );

        assert_eq!(result.score, 3);
        assert_eq!(result.percentage, 100);
        assert!(result.pass);
    }

    #[test]
    fn test_two_of_three_is_below_seventy() {
        let result = evaluate(
            &phishing_scenario(),
            &choices(&[("d1", "b"), ("d2", "b"), ("d3", "a")]),
            70,
        );

        assert_eq!(result.score, 2);
        assert_eq!(result.percentage, 67);
        assert!(!result.pass);
    }

    #[test]
    fn test_unknown_option_is_incorrect() {
        let result = evaluate(&phishing_scenario(), &choices(&[("d1", "z")]), 70);

        assert_eq!(result.score, 0);
        assert_eq!(result.decisions[0].chosen.as_deref(), Some("z"));
        assert!(!result.decisions[0].is_correct);
        assert_eq!(result.decisions[0].explanation, "because b");
    }

    #[test]
    fn test_choice_matching_ignores_case() {
        let result = evaluate(&phishing_scenario(), &choices(&[("d1", "B")]), 70);
        assert!(result.decisions[0].is_correct);
    }

    #[test]
    fn test_feedback_explains_chosen_option() {
        let result = evaluate(&phishing_scenario(), &choices(&[("d2", "c")]), 70);

        let d2 = &result.decisions[1];
        assert_eq!(d2.explanation, "because c");
        assert_eq!(d2.correct_options, vec!["b".to_string()]);
        assert!(result.decisions[0].chosen.is_none());
    }

    #[test]
    fn test_multiple_correct_options_accepted() {
        let mut scenario = phishing_scenario();
        scenario.decision_points[0].options[2].correct = true;

        let a = evaluate(&scenario, &choices(&[("d1", "c")]), 70);
        assert!(a.decisions[0].is_correct);
        assert_eq!(
            a.decisions[0].correct_options,
            vec!["b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_empty_scenario_scores_zero() {
        let mut scenario = phishing_scenario();
        scenario.decision_points.clear();

        let result = evaluate(&scenario, &HashMap::new(), 0);
        assert_eq!(result.total, 0);
        assert_eq!(result.percentage, 0);
        assert!(!result.pass);
    }

    #[test]
    fn test_validate_scenario() {
        assert!(validate_scenario(&phishing_scenario()).is_ok());

        let mut empty = phishing_scenario();
        empty.decision_points.clear();
        assert!(validate_scenario(&empty).is_err());

        let mut no_correct = phishing_scenario();
        no_correct.decision_points[1].options[1].correct = false;
        let err = validate_scenario(&no_correct).unwrap_err();
        assert!(err.to_string().contains("no correct option"));

        let mut duplicate = phishing_scenario();
        duplicate.decision_points[0].options[2].id = "A".to_string();
        let err = validate_scenario(&duplicate).unwrap_err();
        assert!(err.to_string().contains("repeats option id"));
    }

    #[test]
    fn test_duplicate_decision_id_rejected() {
        let mut scenario = phishing_scenario();
        scenario.decision_points[2].id = "d1".to_string();

        let err = validate_scenario(&scenario).unwrap_err();
        assert!(err.to_string().contains("repeats decision id 'd1'"));
    }
}
