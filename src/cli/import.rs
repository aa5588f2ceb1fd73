//! Import command for Bastion.
//!
//! Replaces the stored catalog with one read from a JSON file. The file is
//! validated in full before anything is written.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::core::Catalog;
use crate::error::{BastionError, Result};
use crate::storage::{CatalogStore, PinStore, RecordStore};

use super::CommandContext;

/// Options for the import command.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Validate only.
    pub dry_run: bool,
}

/// Output format for the import command.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutput {
    pub success: bool,
    pub dry_run: bool,
    pub modules: usize,
    pub questions: usize,
    pub scenarios: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutput {
    fn imported(catalog: &Catalog, dry_run: bool) -> Self {
        Self {
            success: true,
            dry_run,
            modules: catalog.modules.len(),
            questions: catalog.questions.len(),
            scenarios: catalog.scenarios.len(),
            error: None,
        }
    }

    pub fn failure(err: &BastionError, dry_run: bool) -> Self {
        Self {
            success: false,
            dry_run,
            modules: 0,
            questions: 0,
            scenarios: 0,
            error: Some(err.to_string()),
        }
    }
}

/// The import command implementation.
pub struct ImportCommand<S> {
    ctx: CommandContext<S>,
}

impl<S: CatalogStore + RecordStore + PinStore> ImportCommand<S> {
    pub fn new(ctx: CommandContext<S>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, path: &Path, options: &ImportOptions) -> ImportOutput {
        match self.import(path, options.dry_run) {
            Ok(catalog) => ImportOutput::imported(&catalog, options.dry_run),
            Err(e) => ImportOutput::failure(&e, options.dry_run),
        }
    }

    fn import(&self, path: &Path, dry_run: bool) -> Result<Catalog> {
        let content = fs::read_to_string(path).map_err(|e| BastionError::storage(path, e))?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        catalog.validate()?;

        if !dry_run {
            self.ctx.store.save_catalog(&catalog)?;
            tracing::info!(
                path = %path.display(),
                modules = catalog.modules.len(),
                questions = catalog.questions.len(),
                "catalog imported"
            );
        }
        Ok(catalog)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ImportOutput, options: &ImportOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Import failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        format!(
            "{} {} modules, {} questions, {} scenarios\n",
            if output.dry_run { "Validated" } else { "Imported" },
            output.modules,
            output.questions,
            output.scenarios
        )
    }
}
