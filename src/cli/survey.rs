//! Survey command for Bastion.

use serde::Serialize;

use crate::core::{SurveyInput, SurveyResponse};
use crate::error::BastionError;
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::{is_denial, CommandContext};

/// Options for the survey command.
#[derive(Debug, Clone, Default)]
pub struct SurveyOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the survey command.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<SurveyResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SurveyOutput {
    pub fn success(response: SurveyResponse) -> Self {
        Self {
            success: true,
            denied: false,
            response: Some(response),
            error: None,
        }
    }

    pub fn failure(err: &BastionError) -> Self {
        Self {
            success: false,
            denied: is_denial(err),
            response: None,
            error: Some(err.to_string()),
        }
    }
}

/// The survey command implementation.
pub struct SurveyCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> SurveyCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: &str, input: &SurveyInput) -> SurveyOutput {
        match self
            .ctx
            .with_engine(|engine| engine.submit_survey(learner_id, input))
        {
            Ok(response) => SurveyOutput::success(response),
            Err(e) => SurveyOutput::failure(&e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SurveyOutput, options: &SurveyOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            match (&output.response, &output.error) {
                (Some(response), _) => format!(
                    "Survey recorded for {} (rating {}/5). Thank you!\n",
                    response.learner_id, response.rating
                ),
                (None, error) => format!(
                    "Survey not recorded: {}\n",
                    error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    }
}
