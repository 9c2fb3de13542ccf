//! Resolved model registry: declarations validated and flattened for runtime use.

use crate::config::{AccessRuleConfig, RepoConfig};
use crate::error::ConfigError;
use crate::search::MetamodelRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// Alias and type name of the built-in workflow state model.
pub const PROCESS_FLOW_ALIAS: &str = "processFlow";
pub const PROCESS_FLOW_TYPE: &str = "ProcessFlow";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Decimal => "decimal",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Leaf(ScalarType),
    /// Nested object shaped by another model.
    Nested { model: String },
    /// Ordered collection of scalars or nested models.
    Collection(Box<ParamKind>),
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub maps_to: Option<String>,
    pub default: Option<serde_json::Value>,
    pub access: Vec<AccessRuleConfig>,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub alias: String,
    pub type_name: String,
    pub repo: Option<RepoConfig>,
    pub maps_to: Option<String>,
    pub lifecycle: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl ModelConfig {
    pub fn is_persistent(&self) -> bool {
        self.repo.is_some()
    }

    pub fn is_mapped(&self) -> bool {
        self.maps_to.is_some()
    }

    /// Storage alias: the repo alias when declared and non-blank, else the model alias.
    pub fn resolved_alias(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.alias.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.alias)
    }

    /// Lifecycle name, if declared and non-blank.
    pub fn lifecycle(&self) -> Option<&str> {
        self.lifecycle.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelConfig>>,
    process_flow: Arc<ModelConfig>,
    metamodels: Arc<MetamodelRegistry>,
}

impl ModelRegistry {
    pub(crate) fn new(
        models: HashMap<String, Arc<ModelConfig>>,
        process_flow: Arc<ModelConfig>,
        metamodels: MetamodelRegistry,
    ) -> Self {
        ModelRegistry {
            models,
            process_flow,
            metamodels: Arc::new(metamodels),
        }
    }

    pub fn model(&self, alias: &str) -> Option<&Arc<ModelConfig>> {
        self.models.get(alias)
    }

    pub fn require(&self, alias: &str) -> Result<&Arc<ModelConfig>, ConfigError> {
        self.model(alias)
            .ok_or_else(|| ConfigError::UnknownModel(alias.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelConfig>> {
        self.models.values()
    }

    /// Config of the built-in workflow state model.
    pub fn process_flow(&self) -> &Arc<ModelConfig> {
        &self.process_flow
    }

    pub fn metamodels(&self) -> &Arc<MetamodelRegistry> {
        &self.metamodels
    }
}
