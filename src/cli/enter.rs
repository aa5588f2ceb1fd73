//! Enter command for Bastion.
//!
//! Opens a module for a learner and optionally logs time spent in it.

use serde::Serialize;

use crate::core::ModuleProgress;
use crate::error::BastionError;
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::{is_denial, CommandContext};

/// Options for the enter command.
#[derive(Debug, Clone, Default)]
pub struct EnterOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Minutes spent in the module to add.
    pub minutes: Option<u32>,
}

/// Output format for the enter command.
#[derive(Debug, Clone, Serialize)]
pub struct EnterOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ModuleProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnterOutput {
    pub fn success(progress: ModuleProgress) -> Self {
        Self {
            success: true,
            denied: false,
            progress: Some(progress),
            error: None,
        }
    }

    pub fn failure(err: &BastionError) -> Self {
        Self {
            success: false,
            denied: is_denial(err),
            progress: None,
            error: Some(err.to_string()),
        }
    }
}

/// The enter command implementation.
pub struct EnterCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> EnterCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, learner_id: &str, module_id: &str, options: &EnterOptions) -> EnterOutput {
        let result = self.ctx.with_engine(|engine| {
            let mark = engine.enter_module(learner_id, module_id)?;
            match options.minutes {
                Some(minutes) if minutes > 0 => engine.record_time(learner_id, module_id, minutes),
                _ => Ok(mark),
            }
        });

        match result {
            Ok(progress) => EnterOutput::success(progress),
            Err(e) => EnterOutput::failure(&e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &EnterOutput, options: &EnterOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &EnterOutput) -> String {
        match (&output.progress, &output.error) {
            (Some(progress), _) => format!(
                "Module {}: {} ({} minutes spent)\n",
                progress.module_id, progress.status, progress.time_spent_minutes
            ),
            (None, error) => format!(
                "Cannot enter module: {}\n",
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::test_context;
    use crate::core::ProgressStatus;

    #[test]
    fn test_enter_first_module() {
        let t = test_context();
        let cmd = EnterCommand::new(t.ctx);

        let output = cmd.run("u1", "m1", &EnterOptions::default());

        assert!(output.success);
        let progress = output.progress.unwrap();
        assert_eq!(progress.status, ProgressStatus::NotStarted);
        assert!(t.store.get("u1").unwrap().is_some());
    }

    #[test]
    fn test_enter_with_minutes_starts_module() {
        let t = test_context();
        let cmd = EnterCommand::new(t.ctx);
        let options = EnterOptions {
            minutes: Some(20),
            ..Default::default()
        };

        let output = cmd.run("u1", "m1", &options);

        let progress = output.progress.unwrap();
        assert_eq!(progress.status, ProgressStatus::InProgress);
        assert_eq!(progress.time_spent_minutes, 20);
    }

    #[test]
    fn test_enter_locked_module_is_denied() {
        let t = test_context();
        let cmd = EnterCommand::new(t.ctx);

        let output = cmd.run("u1", "m2", &EnterOptions::default());

        assert!(!output.success);
        assert!(output.denied);
        assert!(output.error.unwrap().contains("Must complete Foundations first"));
    }

    #[test]
    fn test_enter_unknown_module_is_error_not_denial() {
        let t = test_context();
        let output = EnterCommand::new(t.ctx).run("u1", "nope", &EnterOptions::default());

        assert!(!output.success);
        assert!(!output.denied);
    }

    #[test]
    fn test_format_output_human_readable() {
        let t = test_context();
        let cmd = EnterCommand::new(t.ctx);
        let output = cmd.run("u1", "m1", &EnterOptions::default());

        let formatted = cmd.format_output(&output, &EnterOptions::default());
        assert_eq!(formatted, "Module m1: not_started (0 minutes spent)\n");
    }

    #[test]
    fn test_format_output_json_omits_false_denied() {
        let t = test_context();
        let cmd = EnterCommand::new(t.ctx);
        let output = cmd.run("u1", "m1", &EnterOptions::default());
        let options = EnterOptions {
            json: true,
            ..Default::default()
        };

        let formatted = cmd.format_output(&output, &options);
        assert!(formatted.contains("\"success\": true"));
        assert!(!formatted.contains("denied"));
    }
}
