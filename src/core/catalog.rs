//! Course content the engine reasons over: modules, question banks and
//! simulation scenarios.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::model::{Module, Question};
use crate::core::simulation::{validate_scenario, Scenario};
use crate::error::{BastionError, Result};

/// Immutable course content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Catalog {
    pub modules: Vec<Module>,
    pub questions: Vec<Question>,
    pub scenarios: Vec<Scenario>,
}

impl Catalog {
    /// Build a catalog and check it.
    pub fn new(
        modules: Vec<Module>,
        questions: Vec<Question>,
        scenarios: Vec<Scenario>,
    ) -> Result<Self> {
        let catalog = Self {
            modules,
            questions,
            scenarios,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check structural invariants.
    ///
    /// Module orders must be exactly 1..=N, ids unique everywhere, and every
    /// module question must point at a known module.
    pub fn validate(&self) -> Result<()> {
        let mut orders: Vec<u32> = self.modules.iter().map(|m| m.order).collect();
        orders.sort_unstable();
        let expected: Vec<u32> = (1..=self.modules.len() as u32).collect();
        if orders != expected {
            return Err(BastionError::validation(format!(
                "module orders must be contiguous from 1, got {:?}",
                orders
            )));
        }

        let mut module_ids = HashSet::new();
        for module in &self.modules {
            if !module_ids.insert(module.id.as_str()) {
                return Err(BastionError::validation(format!(
                    "duplicate module id '{}'",
                    module.id
                )));
            }
        }

        let mut question_ids = HashSet::new();
        for question in &self.questions {
            if !question_ids.insert(question.id.as_str()) {
                return Err(BastionError::validation(format!(
                    "duplicate question id '{}'",
                    question.id
                )));
            }
            if question.question_set == 0 {
                return Err(BastionError::validation(format!(
                    "question '{}' has question_set 0; sets start at 1",
                    question.id
                )));
            }
            if let Some(module_id) = &question.module_id {
                if !module_ids.contains(module_id.as_str()) {
                    return Err(BastionError::validation(format!(
                        "question '{}' references unknown module '{}'",
                        question.id, module_id
                    )));
                }
            }
        }

        let mut scenario_ids = HashSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(scenario.id.as_str()) {
                return Err(BastionError::validation(format!(
                    "duplicate scenario id '{}'",
                    scenario.id
                )));
            }
            validate_scenario(scenario)?;
        }

        Ok(())
    }

    /// Modules sorted by `order`.
    pub fn modules_ordered(&self) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self.modules.iter().collect();
        modules.sort_by_key(|m| m.order);
        modules
    }

    pub fn module(&self, id: &str) -> Result<&Module> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| BastionError::not_found("module", id))
    }

    /// Questions for a module, or the final assessment bank for `None`.
    pub fn bank(&self, module_id: Option<&str>) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|q| q.module_id.as_deref() == module_id)
            .cloned()
            .collect()
    }

    pub fn scenario(&self, id: &str) -> Result<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| BastionError::not_found("scenario", id))
    }
}
