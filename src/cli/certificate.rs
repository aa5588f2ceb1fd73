//! Certificate command for Bastion.
//!
//! Reports whether a completion certificate may be issued. Rendering the
//! certificate itself is left to the caller.

use serde::Serialize;

use crate::core::CertDecision;
use crate::error::BastionError;
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::CommandContext;

/// Options for the certificate command.
#[derive(Debug, Clone, Default)]
pub struct CertificateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the certificate command.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    pub learner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<CertDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CertificateOutput {
    pub fn decided(learner_id: &str, decision: CertDecision) -> Self {
        Self {
            success: true,
            denied: !decision.can_generate,
            learner_id: learner_id.to_string(),
            decision: Some(decision),
            error: None,
        }
    }

    pub fn failure(learner_id: &str, err: &BastionError) -> Self {
        Self {
            success: false,
            denied: false,
            learner_id: learner_id.to_string(),
            decision: None,
            error: Some(err.to_string()),
        }
    }
}

/// The certificate command implementation.
pub struct CertificateCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> CertificateCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: &str) -> CertificateOutput {
        match self
            .ctx
            .with_engine(|engine| engine.can_generate_certificate(learner_id))
        {
            Ok(decision) => CertificateOutput::decided(learner_id, decision),
            Err(e) => CertificateOutput::failure(learner_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CertificateOutput, options: &CertificateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        match &output.decision {
            Some(decision) if decision.can_generate => {
                format!("Certificate available for {}\n", output.learner_id)
            }
            Some(decision) => format!(
                "Certificate not available for {}: {}\n",
                output.learner_id, decision.reason
            ),
            None => format!(
                "Certificate check failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
