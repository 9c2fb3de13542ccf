//! Instantiate empty entities shaped by model declarations.

use crate::config::{ModelConfig, ModelRegistry, ParamKind};
use crate::error::AppError;
use serde_json::{Map, Value};

/// Field holding an entity's reference id.
pub const ID_FIELD: &str = "id";

const MAX_DEPTH: usize = 16;

/// New entity with declared defaults; nested models are instantiated, collections start empty.
pub fn instantiate(registry: &ModelRegistry, model: &ModelConfig, id: Option<&str>) -> Result<Value, AppError> {
    let mut entity = empty_object(registry, model, 0)?;
    if let (Some(id), Value::Object(obj)) = (id, &mut entity) {
        obj.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }
    Ok(entity)
}

fn empty_object(registry: &ModelRegistry, model: &ModelConfig, depth: usize) -> Result<Value, AppError> {
    if depth > MAX_DEPTH {
        return Err(AppError::InvalidState(format!(
            "entity nesting under '{}' exceeds {} levels",
            model.alias, MAX_DEPTH
        )));
    }
    let mut obj = Map::new();
    for p in &model.params {
        let value = match (&p.default, &p.kind) {
            (Some(default), _) => default.clone(),
            (None, ParamKind::Leaf(_)) => Value::Null,
            (None, ParamKind::Nested { model: nested }) => {
                empty_object(registry, registry.require(nested)?, depth + 1)?
            }
            (None, ParamKind::Collection(_)) => Value::Array(Vec::new()),
        };
        obj.insert(p.name.clone(), value);
    }
    Ok(Value::Object(obj))
}

/// Reference id stored on an entity, if any.
pub fn entity_id(entity: &Value) -> Option<&str> {
    entity.get(ID_FIELD).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, resolve};
    use serde_json::json;

    #[test]
    fn defaults_nested_and_collections() {
        let raw = r#"{ "models": [
            { "alias": "address", "type": "Address", "params": [ { "name": "city", "type": "string", "default": "Oslo" } ] },
            { "alias": "widget", "type": "Widget", "params": [
                { "name": "size", "type": "integer", "default": 1 },
                { "name": "name", "type": "string" },
                { "name": "home", "type": "nested", "model": "address" },
                { "name": "tags", "type": "collection", "element": "string" } ] }
        ] }"#;
        let registry = resolve(&parse_config(raw).unwrap()).unwrap();
        let widget = registry.require("widget").unwrap();
        let entity = instantiate(&registry, widget, Some("w-1")).unwrap();
        assert_eq!(
            entity,
            json!({"id": "w-1", "size": 1, "name": null, "home": {"city": "Oslo"}, "tags": []})
        );
        assert_eq!(entity_id(&entity), Some("w-1"));
    }
}
