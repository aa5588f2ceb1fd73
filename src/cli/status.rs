//! Status command for Bastion.
//!
//! Shows module access, final assessment eligibility and certificate state
//! for one learner.

use serde::Serialize;

use crate::core::{CertDecision, Eligibility, ModuleAccess, RetakeDecision};
use crate::error::Result;
use crate::stats::{summarize, LearnerSummary};
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::CommandContext;

/// Options for the status command.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    pub success: bool,
    pub learner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LearnerSummary>,
    pub modules: Vec<ModuleAccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_assessment: Option<Eligibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_retake: Option<RetakeDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusOutput {
    pub fn failure(learner_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            learner_id: learner_id.to_string(),
            summary: None,
            modules: Vec::new(),
            final_assessment: None,
            final_retake: None,
            certificate: None,
            error: Some(error.into()),
        }
    }
}

/// The status command implementation.
pub struct StatusCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> StatusCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: &str) -> StatusOutput {
        self.collect(learner_id)
            .unwrap_or_else(|e| StatusOutput::failure(learner_id, e.to_string()))
    }

    fn collect(&self, learner_id: &str) -> Result<StatusOutput> {
        let threshold = self.ctx.config.knowledge_check.passing_threshold;
        self.ctx.with_engine(|engine| {
            let record = engine.record(learner_id)?;
            Ok(StatusOutput {
                success: true,
                learner_id: learner_id.to_string(),
                summary: Some(summarize(&record, engine.catalog(), threshold)),
                modules: engine.accessible_modules(learner_id)?,
                final_assessment: Some(engine.final_eligibility(learner_id)?),
                final_retake: Some(engine.can_retake_final(learner_id)?),
                certificate: Some(engine.can_generate_certificate(learner_id)?),
                error: None,
            })
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatusOutput, options: &StatusOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StatusOutput) -> String {
        if !output.success {
            return format!(
                "Status failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut out = String::new();
        if let Some(summary) = &output.summary {
            out.push_str(&format!(
                "Learner {}: {}/{} modules completed ({}%)\n",
                output.learner_id,
                summary.modules_completed,
                summary.modules_total,
                summary.completion_percent
            ));
        }

        for module in &output.modules {
            let mark = if module.completed {
                "x"
            } else if module.accessible {
                " "
            } else {
                "-"
            };
            out.push_str(&format!(
                "  [{}] {}. {} - {}\n",
                mark, module.order, module.module_id, module.reason
            ));
        }

        if let Some(eligibility) = &output.final_assessment {
            out.push_str(&format!("Final assessment: {}\n", eligibility.reason));
        }
        if let (Some(eligibility), Some(retake)) = (&output.final_assessment, &output.final_retake)
        {
            if eligibility.eligible {
                out.push_str(&format!("  {}\n", retake.reason));
            }
        }
        if let Some(certificate) = &output.certificate {
            out.push_str(&format!("Certificate: {}\n", certificate.reason));
        }

        out
    }
}
