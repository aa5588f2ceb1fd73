//! Simulate command for Bastion.
//!
//! Without choices the scenario is shown (option correctness withheld). With
//! choices the run is scored and logged; `finalize` marks it completed.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::{DecisionOutcome, Scenario, SimulationKind, SimulationResult};
use crate::error::BastionError;
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::{is_denial, CommandContext};

/// Options for the simulate command.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Mark the run as completed.
    pub finalize: bool,
}

/// A decision point as shown to the learner.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionView {
    pub id: String,
    pub prompt: String,
    /// `(option id, text)` pairs.
    pub options: Vec<(String, String)>,
}

/// Output format for the simulate command.
#[derive(Debug, Clone, Serialize)]
pub struct SimulateOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    pub scenario_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SimulationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decision_points: Vec<DecisionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SimulationResult>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulateOutput {
    fn preview(scenario: &Scenario) -> Self {
        Self {
            success: true,
            denied: false,
            scenario_id: scenario.id.clone(),
            kind: Some(scenario.kind),
            title: Some(scenario.title.clone()),
            decision_points: scenario
                .decision_points
                .iter()
                .map(|point| DecisionView {
                    id: point.id.clone(),
                    prompt: point.prompt.clone(),
                    options: point
                        .options
                        .iter()
                        .map(|o| (o.id.clone(), o.text.clone()))
                        .collect(),
                })
                .collect(),
            result: None,
            completed: false,
            error: None,
        }
    }

    fn scored(result: SimulationResult, completed: bool) -> Self {
        Self {
            success: true,
            denied: false,
            scenario_id: result.scenario_id.clone(),
            kind: None,
            title: None,
            decision_points: Vec::new(),
            result: Some(result),
            completed,
            error: None,
        }
    }

    pub fn failure(scenario_id: &str, err: &BastionError) -> Self {
        Self {
            success: false,
            denied: is_denial(err),
            scenario_id: scenario_id.to_string(),
            kind: None,
            title: None,
            decision_points: Vec::new(),
            result: None,
            completed: false,
            error: Some(err.to_string()),
        }
    }
}

/// The simulate command implementation.
pub struct SimulateCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> SimulateCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(
        &self,
        learner_id: &str,
        scenario_id: &str,
        module_id: Option<&str>,
        choices: &HashMap<String, String>,
        options: &SimulateOptions,
    ) -> SimulateOutput {
        if choices.is_empty() {
            return match self
                .ctx
                .load_catalog()
                .and_then(|catalog| catalog.scenario(scenario_id).cloned())
            {
                Ok(scenario) => SimulateOutput::preview(&scenario),
                Err(e) => SimulateOutput::failure(scenario_id, &e),
            };
        }

        let result = self.ctx.with_engine(|engine| {
            engine.evaluate_simulation(learner_id, scenario_id, module_id, choices, options.finalize)
        });
        match result {
            Ok(result) => SimulateOutput::scored(result, options.finalize),
            Err(e) => SimulateOutput::failure(scenario_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SimulateOutput, options: &SimulateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &SimulateOutput) -> String {
        if !output.success {
            return format!(
                "Simulation failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(result) = &output.result {
            let mut out = format!(
                "Scenario {}: {}/{} decisions correct ({}%), {}{}\n",
                result.scenario_id,
                result.score,
                result.total,
                result.percentage,
                if result.pass { "passed" } else { "not passed" },
                if output.completed { ", completed" } else { "" }
            );
            for decision in &result.decisions {
                out.push_str(&format_decision(decision));
            }
            return out;
        }

        let mut out = format!(
            "Scenario {}: {}\n",
            output.scenario_id,
            output.title.as_deref().unwrap_or("")
        );
        for point in &output.decision_points {
            out.push_str(&format!("\n[{}] {}\n", point.id, point.prompt));
            for (id, text) in &point.options {
                out.push_str(&format!("   {}) {}\n", id, text));
            }
        }
        out
    }
}

fn format_decision(decision: &DecisionOutcome) -> String {
    let mark = if decision.is_correct { "x" } else { " " };
    format!(
        "  [{}] {}: chose {}. {}\n",
        mark,
        decision.decision_id,
        decision.chosen.as_deref().unwrap_or("-"),
        decision.explanation
    )
}
