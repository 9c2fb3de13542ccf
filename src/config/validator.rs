//! Declaration validation: referential integrity, mapping cycles and param shape.

use crate::config::{FieldTypeConfig, FullConfig, ModelDecl, PROCESS_FLOW_ALIAS};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut by_alias: HashMap<&str, &ModelDecl> = HashMap::new();
    for m in &config.models {
        if m.alias.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "model of type '{}' has a blank alias",
                m.type_name
            )));
        }
        if m.alias == PROCESS_FLOW_ALIAS {
            return Err(ConfigError::Validation(format!(
                "alias '{}' is reserved for workflow state",
                PROCESS_FLOW_ALIAS
            )));
        }
        if by_alias.insert(m.alias.as_str(), m).is_some() {
            return Err(ConfigError::DuplicateAlias(m.alias.clone()));
        }
    }

    for m in &config.models {
        if let Some(target) = &m.maps_to {
            if !by_alias.contains_key(target.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "mapsTo model",
                    id: target.clone(),
                });
            }
        }
        for p in &m.params {
            validate_param_shape(m, p, &by_alias)?;
        }
    }

    for m in &config.models {
        check_mapping_chain(m, &by_alias)?;
    }
    let mut done = HashSet::new();
    for m in &config.models {
        check_nesting(m.alias.as_str(), &by_alias, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn validate_param_shape(
    model: &ModelDecl,
    p: &crate::config::ParamConfig,
    by_alias: &HashMap<&str, &ModelDecl>,
) -> Result<(), ConfigError> {
    let qualified = format!("{}.{}", model.alias, p.name);
    if p.name.trim().is_empty() || p.name.contains('/') || p.name.starts_with('.') {
        return Err(ConfigError::Validation(format!(
            "invalid param name '{}' in model '{}'",
            p.name, model.alias
        )));
    }
    let needs_model = match p.type_ {
        FieldTypeConfig::Nested => true,
        FieldTypeConfig::Collection => p.element.is_none(),
        _ => false,
    };
    if needs_model {
        let target = p.model.as_deref().ok_or_else(|| {
            ConfigError::Validation(format!("param '{}' requires a model or element type", qualified))
        })?;
        if !by_alias.contains_key(target) {
            return Err(ConfigError::MissingReference {
                kind: "param model",
                id: target.to_string(),
            });
        }
    }
    if matches!(p.element, Some(FieldTypeConfig::Nested | FieldTypeConfig::Collection)) {
        return Err(ConfigError::Validation(format!(
            "collection param '{}' must use 'model' for nested elements",
            qualified
        )));
    }
    if p.maps_to.is_some() && model.maps_to.is_none() {
        return Err(ConfigError::Validation(format!(
            "param '{}' declares mapsTo but model '{}' is not mapped",
            qualified, model.alias
        )));
    }
    Ok(())
}

/// Walks the mapsTo chain from `model`; a revisited alias is a cycle.
fn check_mapping_chain(model: &ModelDecl, by_alias: &HashMap<&str, &ModelDecl>) -> Result<(), ConfigError> {
    let mut seen = vec![model.alias.as_str()];
    let mut current = model;
    while let Some(next) = current.maps_to.as_deref() {
        if seen.contains(&next) {
            seen.push(next);
            return Err(ConfigError::CyclicMapping(seen.join(" -> ")));
        }
        seen.push(next);
        current = match by_alias.get(next) {
            Some(m) => m,
            None => break,
        };
    }
    Ok(())
}

/// Nested (non-collection) params would instantiate forever if a model contains itself.
fn check_nesting<'a>(
    alias: &'a str,
    by_alias: &HashMap<&'a str, &'a ModelDecl>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), ConfigError> {
    if done.contains(alias) {
        return Ok(());
    }
    if path.contains(&alias) {
        path.push(alias);
        return Err(ConfigError::Validation(format!(
            "model nests itself: {}",
            path.join(" -> ")
        )));
    }
    let Some(model) = by_alias.get(alias) else {
        return Ok(());
    };
    path.push(alias);
    for p in &model.params {
        if p.type_ == FieldTypeConfig::Nested {
            if let Some(target) = p.model.as_deref() {
                check_nesting(target, by_alias, path, done)?;
            }
        }
    }
    path.pop();
    done.insert(alias);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamConfig;

    fn model(alias: &str, maps_to: Option<&str>) -> ModelDecl {
        ModelDecl {
            alias: alias.into(),
            type_name: alias.to_uppercase(),
            repo: None,
            maps_to: maps_to.map(String::from),
            lifecycle: None,
            params: Vec::new(),
        }
    }

    fn nested(name: &str, target: &str) -> ParamConfig {
        ParamConfig {
            name: name.into(),
            type_: FieldTypeConfig::Nested,
            model: Some(target.into()),
            element: None,
            maps_to: None,
            default: None,
            access: Vec::new(),
        }
    }

    #[test]
    fn rejects_mapping_cycle() {
        let config = FullConfig {
            models: vec![model("a", Some("b")), model("b", Some("c")), model("c", Some("a"))],
            process_flow: None,
        };
        match validate(&config) {
            Err(ConfigError::CyclicMapping(chain)) => assert_eq!(chain, "a -> b -> c -> a"),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_maps_to() {
        let config = FullConfig {
            models: vec![model("view", Some("missing"))],
            process_flow: None,
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "mapsTo model", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_alias() {
        let config = FullConfig {
            models: vec![model("a", None), model("a", None)],
            process_flow: None,
        };
        assert!(matches!(validate(&config), Err(ConfigError::DuplicateAlias(_))));
    }

    #[test]
    fn rejects_self_nesting_but_allows_shared_nested_models() {
        let mut a = model("a", None);
        a.params.push(nested("inner", "a"));
        let config = FullConfig {
            models: vec![a],
            process_flow: None,
        };
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        let mut b = model("b", None);
        b.params.push(nested("home", "addr"));
        b.params.push(nested("work", "addr"));
        let config = FullConfig {
            models: vec![b, model("addr", None)],
            process_flow: None,
        };
        assert!(validate(&config).is_ok());
    }
}
