//! Raw model declarations as loaded from JSON (`models.json`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage declaration. A model with a repo is persistent; without one it only lives in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Backend identifier registered with the repository factory (e.g. "memory", "postgres").
    pub backend: String,
    /// Storage alias (collection / table). Falls back to the model alias when absent or blank.
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTypeConfig {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Nested,
    Collection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Param is shown but cannot be edited.
    Read,
    /// Param is neither shown nor editable.
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRuleConfig {
    /// Rule applies when the session holds any of these roles.
    pub when_authorities: Vec<String>,
    pub mode: AccessMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldTypeConfig,
    /// Model alias for `nested` params and for collections of nested models.
    #[serde(default)]
    pub model: Option<String>,
    /// Scalar element type for collections of values.
    #[serde(default)]
    pub element: Option<FieldTypeConfig>,
    /// Path into the core param tree (view models only), e.g. "/address/city".
    #[serde(default)]
    pub maps_to: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub access: Vec<AccessRuleConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDecl {
    pub alias: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub repo: Option<RepoConfig>,
    /// Alias of the core model this view delegates its data to.
    #[serde(default)]
    pub maps_to: Option<String>,
    #[serde(default)]
    pub lifecycle: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
}

/// All declarations in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub models: Vec<ModelDecl>,
    /// Repository for workflow state. Required by any model declaring a lifecycle.
    #[serde(default)]
    pub process_flow: Option<RepoConfig>,
}
