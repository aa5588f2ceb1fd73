//! Stats command for Bastion.
//!
//! With a learner: dashboard summary and achievements. Without one:
//! assessment and simulation aggregates across the most recently active
//! learners.

use serde::Serialize;

use crate::error::{BastionError, Result};
use crate::stats::{
    achievements, all_assessment_stats, all_simulation_stats, summarize, AchievementReport,
    AssessmentStats, LearnerSummary, SimulationStats,
};
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::CommandContext;

/// Default number of learner records read for aggregates.
pub const DEFAULT_LIMIT: usize = 1000;

/// Options for the stats command.
#[derive(Debug, Clone)]
pub struct StatsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum learner records to aggregate over.
    pub limit: usize,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            json: false,
            quiet: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Output format for the stats command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LearnerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<AchievementReport>,
    /// Learner records the aggregates were computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learners: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assessments: Vec<AssessmentStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub simulations: Vec<SimulationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsOutput {
    pub fn failure(err: &BastionError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            ..Default::default()
        }
    }
}

/// The stats command implementation.
pub struct StatsCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> StatsCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: Option<&str>, options: &StatsOptions) -> StatsOutput {
        let result = match learner_id {
            Some(id) => self.learner_stats(id),
            None => self.aggregate_stats(options.limit),
        };
        result.unwrap_or_else(|e| StatsOutput::failure(&e))
    }

    fn learner_stats(&self, learner_id: &str) -> Result<StatsOutput> {
        let catalog = self.ctx.load_catalog()?;
        let record = self
            .ctx
            .store
            .get(learner_id)?
            .ok_or_else(|| BastionError::not_found("learner", learner_id))?;
        let threshold = self.ctx.config.knowledge_check.passing_threshold;

        Ok(StatsOutput {
            success: true,
            summary: Some(summarize(&record, &catalog, threshold)),
            achievements: Some(achievements(&record, &catalog, threshold)),
            ..Default::default()
        })
    }

    fn aggregate_stats(&self, limit: usize) -> Result<StatsOutput> {
        let records = self.ctx.store.list(limit)?;
        tracing::debug!(learners = records.len(), "aggregating stats");

        Ok(StatsOutput {
            success: true,
            learners: Some(records.len()),
            assessments: all_assessment_stats(&records),
            simulations: all_simulation_stats(&records),
            ..Default::default()
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatsOutput, options: &StatsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StatsOutput) -> String {
        if !output.success {
            return format!(
                "Stats failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut out = String::new();

        if let Some(summary) = &output.summary {
            out.push_str(&format!("Learner {}\n", summary.learner_id));
            out.push_str(&format!(
                "  Modules:      {}/{} ({}%)\n",
                summary.modules_completed, summary.modules_total, summary.completion_percent
            ));
            out.push_str(&format!(
                "  Avg check:    {}%\n",
                summary.average_knowledge_check_score
            ));
            out.push_str(&format!(
                "  Best final:   {}\n",
                summary
                    .best_final_score
                    .map(|s| format!("{}%", s))
                    .unwrap_or_else(|| "-".to_string())
            ));
            out.push_str(&format!(
                "  Simulations:  {} completed\n",
                summary.completed_simulations
            ));
            out.push_str(&format!(
                "  Time spent:   {} minutes\n",
                summary.time_spent_minutes
            ));
        }

        if let Some(report) = &output.achievements {
            out.push_str(&format!(
                "\nAchievements ({}/{}):\n",
                report.achieved_count, report.total
            ));
            for achievement in &report.achievements {
                out.push_str(&format!(
                    "  [{}] {} ({}/{})\n",
                    if achievement.achieved { "x" } else { " " },
                    achievement.name,
                    achievement.progress,
                    achievement.target
                ));
            }
        }

        if let Some(learners) = output.learners {
            out.push_str(&format!("Learners: {}\n", learners));
        }
        if !output.assessments.is_empty() {
            out.push_str("\nAssessments:\n");
            for stats in &output.assessments {
                out.push_str(&format!(
                    "  {:<18} {} attempts, avg {}%, pass rate {}%, best {}%\n",
                    stats.kind.as_str(),
                    stats.total_attempts,
                    stats.average_score,
                    stats.pass_rate,
                    stats.best_score
                ));
            }
        }
        if !output.simulations.is_empty() {
            out.push_str("\nSimulations:\n");
            for stats in &output.simulations {
                out.push_str(&format!(
                    "  {:<18} {} attempts, avg {}%, completion {}%, best {}%\n",
                    stats.kind.as_str(),
                    stats.total_attempts,
                    stats.average_score,
                    stats.completion_rate,
                    stats.best_score
                ));
            }
        }

        out
    }
}
