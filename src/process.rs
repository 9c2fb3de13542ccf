//! Workflow state attached to models that declare a lifecycle.

use crate::config::{ModelConfig, ModelRegistry, PROCESS_FLOW_TYPE};
use crate::error::{AppError, ConfigError};
use crate::model::Param;
use crate::repo::{ModelRepository, RepositoryFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFlow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub process_execution_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub active_tasks: Vec<String>,
}

/// Storage alias of an entity's workflow state: `<resolvedEntityAlias>_<processAlias>`.
pub fn process_alias(registry: &ModelRegistry, model: &ModelConfig) -> String {
    format!("{}_{}", model.resolved_alias(), registry.process_flow().resolved_alias())
}

#[derive(Clone)]
pub struct ProcessFlowLoader {
    registry: Arc<ModelRegistry>,
    repos: Arc<RepositoryFactory>,
}

impl ProcessFlowLoader {
    pub fn new(registry: Arc<ModelRegistry>, repos: Arc<RepositoryFactory>) -> Self {
        ProcessFlowLoader { registry, repos }
    }

    /// Fetch the workflow state for `model` and attach it to `root`.
    /// No lifecycle or no reference id: nothing is fetched.
    pub fn load(&self, model: &ModelConfig, ref_id: Option<&str>, root: &Param) -> Result<Option<ProcessFlow>, AppError> {
        if model.lifecycle().is_none() {
            return Ok(None);
        }
        let flow_model = self.registry.process_flow();
        let repo = flow_model
            .repo
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRepository(PROCESS_FLOW_TYPE.to_string()))?;
        let Some(ref_id) = ref_id else {
            return Ok(None);
        };
        let alias = process_alias(&self.registry, model);
        let store = self.repos.repository(&repo.backend)?;
        let Some(raw) = store.get(ref_id, &alias, None)? else {
            tracing::debug!(alias = %alias, ref_id, "no process flow stored");
            return Ok(None);
        };
        let flow: ProcessFlow = serde_json::from_value(raw)?;
        if !root.attach_flow(flow.clone()) {
            return Err(AppError::InvalidState(format!(
                "process flow already attached to '{}'",
                root.path()
            )));
        }
        tracing::debug!(alias = %alias, ref_id, "attached process flow");
        Ok(Some(flow))
    }
}
