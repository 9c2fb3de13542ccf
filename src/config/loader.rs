//! Load declarations from JSON and resolve them into a `ModelRegistry`.

use crate::config::resolved::{ModelConfig, ModelRegistry, ParamKind, ParamSpec, ScalarType};
use crate::config::types::*;
use crate::config::{validate, PROCESS_FLOW_ALIAS, PROCESS_FLOW_TYPE};
use crate::error::ConfigError;
use crate::search::MetamodelRegistry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// File name looked up when a directory is given to `load_from_path`.
pub const MODELS_FILE: &str = "models.json";

/// Build the registry from declarations (validates first).
pub fn resolve(config: &FullConfig) -> Result<ModelRegistry, ConfigError> {
    validate(config)?;

    let mut models = HashMap::new();
    for decl in &config.models {
        let params = decl
            .params
            .iter()
            .map(resolve_param)
            .collect::<Result<Vec<_>, _>>()?;
        let model = ModelConfig {
            alias: decl.alias.clone(),
            type_name: decl.type_name.clone(),
            repo: decl.repo.clone(),
            maps_to: decl.maps_to.clone(),
            lifecycle: decl.lifecycle.clone(),
            params,
        };
        models.insert(decl.alias.clone(), Arc::new(model));
    }

    let process_flow = Arc::new(process_flow_model(config.process_flow.clone()));
    let metamodels = MetamodelRegistry::from_models(&models)?;
    tracing::debug!(models = models.len(), "resolved model registry");
    Ok(ModelRegistry::new(models, process_flow, metamodels))
}

/// Read a `FullConfig` from a JSON file, or from `models.json` inside a directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let file = if path.is_dir() {
        path.join(MODELS_FILE)
    } else {
        path.to_path_buf()
    };
    let raw = std::fs::read_to_string(&file)
        .map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

fn resolve_param(p: &ParamConfig) -> Result<ParamSpec, ConfigError> {
    let kind = match p.type_ {
        FieldTypeConfig::Nested => ParamKind::Nested {
            model: required_model(p)?,
        },
        FieldTypeConfig::Collection => {
            let element = match p.element {
                Some(t) => ParamKind::Leaf(scalar(t, p)?),
                None => ParamKind::Nested {
                    model: required_model(p)?,
                },
            };
            ParamKind::Collection(Box::new(element))
        }
        other => ParamKind::Leaf(scalar(other, p)?),
    };
    Ok(ParamSpec {
        name: p.name.clone(),
        kind,
        maps_to: p.maps_to.clone(),
        default: p.default.clone(),
        access: p.access.clone(),
    })
}

fn required_model(p: &ParamConfig) -> Result<String, ConfigError> {
    p.model
        .clone()
        .ok_or_else(|| ConfigError::Validation(format!("param '{}' requires a model", p.name)))
}

fn scalar(t: FieldTypeConfig, p: &ParamConfig) -> Result<ScalarType, ConfigError> {
    Ok(match t {
        FieldTypeConfig::String => ScalarType::String,
        FieldTypeConfig::Integer => ScalarType::Integer,
        FieldTypeConfig::Decimal => ScalarType::Decimal,
        FieldTypeConfig::Boolean => ScalarType::Boolean,
        FieldTypeConfig::Date => ScalarType::Date,
        FieldTypeConfig::Nested | FieldTypeConfig::Collection => {
            return Err(ConfigError::Validation(format!(
                "param '{}' has a non-scalar element type",
                p.name
            )))
        }
    })
}

fn process_flow_model(repo: Option<RepoConfig>) -> ModelConfig {
    let leaf = |name: &str, t: ScalarType| ParamSpec {
        name: name.to_string(),
        kind: ParamKind::Leaf(t),
        maps_to: None,
        default: None,
        access: Vec::new(),
    };
    ModelConfig {
        alias: PROCESS_FLOW_ALIAS.to_string(),
        type_name: PROCESS_FLOW_TYPE.to_string(),
        repo,
        maps_to: None,
        lifecycle: None,
        params: vec![
            leaf("id", ScalarType::String),
            leaf("processExecutionId", ScalarType::String),
            leaf("state", ScalarType::String),
            ParamSpec {
                name: "activeTasks".to_string(),
                kind: ParamKind::Collection(Box::new(ParamKind::Leaf(ScalarType::String))),
                maps_to: None,
                default: None,
                access: Vec::new(),
            },
        ],
    }
}
