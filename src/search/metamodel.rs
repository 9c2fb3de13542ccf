//! Static query metamodels: one field table per declared type, keyed by type name.

use crate::config::{ModelConfig, ParamKind, ScalarType};
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMetamodel {
    type_name: String,
    fields: BTreeMap<String, ScalarType>,
}

impl QueryMetamodel {
    pub fn new(type_name: impl Into<String>) -> Self {
        QueryMetamodel {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a queryable field by dotted path.
    pub fn with_field(mut self, path: impl Into<String>, field_type: ScalarType) -> Self {
        self.fields.insert(path.into(), field_type);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field(&self, path: &str) -> Option<ScalarType> {
        self.fields.get(path).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, ScalarType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetamodelRegistry {
    by_type: HashMap<String, Arc<QueryMetamodel>>,
}

impl MetamodelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a metamodel for every declared type. Nested params contribute
    /// prefixed paths; collections are skipped.
    pub fn from_models(models: &HashMap<String, Arc<ModelConfig>>) -> Result<Self, ConfigError> {
        let mut registry = MetamodelRegistry::new();
        let mut aliases: Vec<&String> = models.keys().collect();
        aliases.sort();
        for alias in aliases {
            let model = &models[alias];
            let mut meta = QueryMetamodel::new(model.type_name.clone());
            collect_fields(models, model, "", &mut meta, 0)?;
            match registry.by_type.get(&model.type_name) {
                Some(existing) if existing.fields != meta.fields => {
                    return Err(ConfigError::Validation(format!(
                        "type '{}' is declared with conflicting params",
                        model.type_name
                    )))
                }
                Some(_) => {}
                None => registry.register(meta),
            }
        }
        Ok(registry)
    }

    /// Register or replace the metamodel for its type.
    pub fn register(&mut self, meta: QueryMetamodel) {
        self.by_type.insert(meta.type_name.clone(), Arc::new(meta));
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<QueryMetamodel>> {
        self.by_type.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

const MAX_NESTING: usize = 16;

fn collect_fields(
    models: &HashMap<String, Arc<ModelConfig>>,
    model: &ModelConfig,
    prefix: &str,
    meta: &mut QueryMetamodel,
    depth: usize,
) -> Result<(), ConfigError> {
    if depth > MAX_NESTING {
        return Err(ConfigError::Validation(format!(
            "nesting below '{}' is too deep",
            model.alias
        )));
    }
    for p in &model.params {
        let path = if prefix.is_empty() {
            p.name.clone()
        } else {
            format!("{}.{}", prefix, p.name)
        };
        match &p.kind {
            ParamKind::Leaf(t) => {
                meta.fields.insert(path, *t);
            }
            ParamKind::Nested { model: nested } => {
                let nested_model = models.get(nested).ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: nested.clone(),
                })?;
                collect_fields(models, nested_model, &path, meta, depth + 1)?;
            }
            ParamKind::Collection(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, resolve};

    #[test]
    fn nested_params_are_flattened_and_collections_skipped() {
        let raw = r#"{ "models": [
            { "alias": "address", "type": "Address", "params": [ { "name": "city", "type": "string" } ] },
            { "alias": "widget", "type": "Widget", "params": [
                { "name": "size", "type": "integer" },
                { "name": "home", "type": "nested", "model": "address" },
                { "name": "tags", "type": "collection", "element": "string" } ] }
        ] }"#;
        let registry = resolve(&parse_config(raw).unwrap()).unwrap();
        let meta = registry.metamodels().get("Widget").unwrap();
        assert_eq!(meta.field("size"), Some(ScalarType::Integer));
        assert_eq!(meta.field("home.city"), Some(ScalarType::String));
        assert_eq!(meta.field("tags"), None);
    }

    #[test]
    fn programmatic_registration() {
        let mut registry = MetamodelRegistry::new();
        registry.register(QueryMetamodel::new("Order").with_field("total", ScalarType::Decimal));
        assert_eq!(
            registry.get("Order").unwrap().field("total"),
            Some(ScalarType::Decimal)
        );
        assert!(registry.get("Widget").is_none());
    }
}
