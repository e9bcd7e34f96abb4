//! Category-to-adapter registry
//!
//! The mapping from category to automation script is a total function over
//! the reportable categories and is fixed at startup. A report that survives
//! classification can therefore never fail with an unknown-category error at
//! dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{AdapterConfig, IssueCategory, REPORTABLE_CATEGORIES};
use crate::schema::required_fields;
use crate::submit::payload::BASE_CONTRACT_KEYS;
use crate::submit::process::{DispatchFailure, NodeScriptAdapter, SubmissionAdapter};

/// Script that drives the shared street/sidewalk/general request form
const UNIFIED_SCRIPT: &str = "unified-sf-form-automation.js";
const GRAFFITI_SCRIPT: &str = "graffiti-all-types-tester.js";
const TREE_SCRIPT: &str = "fallen-tree-form-tester.js";

/// One category's binding: which script runs it and which payload keys that
/// script requires
#[derive(Debug, Clone)]
pub struct AdapterBinding {
    pub category: IssueCategory,
    pub script: &'static str,
    pub contract: Vec<String>,
}

fn script_for(category: IssueCategory) -> &'static str {
    match category {
        IssueCategory::Graffiti => GRAFFITI_SCRIPT,
        IssueCategory::FallenTree => TREE_SCRIPT,
        _ => UNIFIED_SCRIPT,
    }
}

fn contract_for(category: IssueCategory) -> Vec<String> {
    let mut contract: Vec<String> = BASE_CONTRACT_KEYS.iter().map(|s| s.to_string()).collect();
    for field in required_fields(category) {
        // requestDescription is already a base key
        if !contract.iter().any(|k| k == field) {
            contract.push(field.to_string());
        }
    }
    contract
}

/// Startup-built registry of submission adapters, one shared adapter per
/// distinct script
pub struct AutomationRegistry {
    bindings: HashMap<IssueCategory, AdapterBinding>,
    adapters: HashMap<&'static str, Arc<dyn SubmissionAdapter>>,
}

impl AutomationRegistry {
    /// Build the registry from configuration, spawning one process adapter
    /// per distinct script
    pub fn from_config(config: &AdapterConfig) -> Self {
        let timeout = config.timeout();
        let scripts_dir = config.scripts_dir.clone();

        let mut bindings = HashMap::new();
        let mut adapters: HashMap<&'static str, Arc<dyn SubmissionAdapter>> = HashMap::new();

        for &category in REPORTABLE_CATEGORIES {
            let script = script_for(category);
            bindings.insert(
                category,
                AdapterBinding {
                    category,
                    script,
                    contract: contract_for(category),
                },
            );
            adapters.entry(script).or_insert_with(|| {
                Arc::new(NodeScriptAdapter::new(
                    scripts_dir.join(script),
                    scripts_dir.clone(),
                    timeout,
                ))
            });
        }

        Self { bindings, adapters }
    }

    /// Registry with every category bound to the given adapter, for pipeline
    /// tests
    #[cfg(test)]
    pub fn with_adapter(adapter: Arc<dyn SubmissionAdapter>) -> Self {
        let mut bindings = HashMap::new();
        let mut adapters: HashMap<&'static str, Arc<dyn SubmissionAdapter>> = HashMap::new();
        for &category in REPORTABLE_CATEGORIES {
            let script = script_for(category);
            bindings.insert(
                category,
                AdapterBinding {
                    category,
                    script,
                    contract: contract_for(category),
                },
            );
            adapters.insert(script, adapter.clone());
        }
        Self { bindings, adapters }
    }

    pub fn binding(&self, category: IssueCategory) -> Result<&AdapterBinding, DispatchFailure> {
        self.bindings
            .get(&category)
            .ok_or_else(|| DispatchFailure::AdapterMissing(category.label().to_string()))
    }

    pub fn adapter(&self, binding: &AdapterBinding) -> Result<Arc<dyn SubmissionAdapter>, DispatchFailure> {
        self.adapters
            .get(binding.script)
            .cloned()
            .ok_or_else(|| DispatchFailure::AdapterMissing(binding.category.label().to_string()))
    }
}
