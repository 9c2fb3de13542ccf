//! QuadModel: core entity + core Param tree, and for views the view entity + view Param tree.

use crate::config::{ModelConfig, ModelRegistry, ParamKind};
use crate::error::AppError;
use crate::model::access::{AccessFlags, Session};
use crate::model::param::{Param, ParamShape};
use serde_json::Value;
use std::sync::Arc;

/// Leading nested segment that addresses the core tree of a mapped model.
pub const CORE_MARKER: &str = ".m";

const MAX_DEPTH: usize = 32;

#[derive(Debug)]
pub struct QuadModel {
    core_entity: Value,
    core: Arc<Param>,
    view_entity: Option<Value>,
    view: Option<Arc<Param>>,
}

impl QuadModel {
    pub fn core_entity(&self) -> &Value {
        &self.core_entity
    }

    pub fn core(&self) -> &Arc<Param> {
        &self.core
    }

    pub fn view_entity(&self) -> Option<&Value> {
        self.view_entity.as_ref()
    }

    pub fn view(&self) -> Option<&Arc<Param>> {
        self.view.as_ref()
    }

    pub fn is_composed(&self) -> bool {
        self.view.is_some()
    }

    /// Entity behind `root()`: the view entity when present, else the core entity.
    pub fn root_entity(&self) -> &Value {
        self.view_entity.as_ref().unwrap_or(&self.core_entity)
    }

    /// Root addressed by commands: the view tree when present, else the core tree.
    pub fn root(&self) -> &Arc<Param> {
        self.view.as_ref().unwrap_or(&self.core)
    }

    /// Param at nested segments below the root; `.m/...` resolves against the core tree.
    pub fn find_param(&self, nested: &[String]) -> Option<Arc<Param>> {
        match nested.split_first() {
            Some((first, rest)) if first == CORE_MARKER => self.core.find_shared(&rest.join("/")),
            _ => self.root().find_shared(&nested.join("/")),
        }
    }
}

pub struct QuadModelBuilder<'a> {
    registry: &'a ModelRegistry,
    session: &'a Session,
}

impl<'a> QuadModelBuilder<'a> {
    pub fn new(registry: &'a ModelRegistry, session: &'a Session) -> Self {
        QuadModelBuilder { registry, session }
    }

    /// Self-contained mode: the entity is its own core.
    pub fn build(&self, model: &ModelConfig, entity: Value) -> Result<QuadModel, AppError> {
        let core = self.root_param(model, &entity, None)?;
        Ok(QuadModel {
            core_entity: entity,
            core,
            view_entity: None,
            view: None,
        })
    }

    /// Composed mode: a view entity over an already resolved core tree.
    pub fn build_composed(
        &self,
        view_model: &ModelConfig,
        view_entity: Value,
        core: Arc<Param>,
    ) -> Result<QuadModel, AppError> {
        let view = self.root_param(view_model, &view_entity, Some(&core))?;
        Ok(QuadModel {
            core_entity: core.state(),
            core,
            view_entity: Some(view_entity),
            view: Some(view),
        })
    }

    fn root_param(&self, model: &ModelConfig, entity: &Value, core: Option<&Param>) -> Result<Arc<Param>, AppError> {
        let path = format!("/{}", model.alias);
        let mut children = Vec::with_capacity(model.params.len());
        for p in &model.params {
            let value = match (&p.maps_to, core) {
                (Some(target), Some(core)) => core
                    .find(target)
                    .map(Param::state)
                    .ok_or_else(|| {
                        AppError::InvalidState(format!(
                            "view param '{}.{}' maps to missing core path '{}'",
                            model.alias, p.name, target
                        ))
                    })?,
                _ => entity.get(&p.name).cloned().unwrap_or(Value::Null),
            };
            let flags = AccessFlags::OPEN.restrict(&p.access, self.session);
            children.push(self.node(&p.name, format!("{}/{}", path, p.name), &p.kind, &value, flags, 1)?);
        }
        Ok(Arc::new(Param::composite(
            path,
            model.alias.clone(),
            ParamShape::Nested,
            children,
            true,
            true,
        )))
    }

    fn node(
        &self,
        name: &str,
        path: String,
        kind: &ParamKind,
        value: &Value,
        flags: AccessFlags,
        depth: usize,
    ) -> Result<Arc<Param>, AppError> {
        if depth > MAX_DEPTH {
            return Err(AppError::InvalidState(format!("param tree too deep at '{}'", path)));
        }
        let param = match kind {
            ParamKind::Leaf(_) => Param::leaf(path, name.to_string(), value.clone(), flags.visible, flags.enabled),
            ParamKind::Nested { model } => {
                let nested = self.registry.require(model)?;
                let mut children = Vec::with_capacity(nested.params.len());
                for p in &nested.params {
                    let child_value = value.get(&p.name).cloned().unwrap_or(Value::Null);
                    children.push(self.node(
                        &p.name,
                        format!("{}/{}", path, p.name),
                        &p.kind,
                        &child_value,
                        flags.restrict(&p.access, self.session),
                        depth + 1,
                    )?);
                }
                Param::composite(path, name.to_string(), ParamShape::Nested, children, flags.visible, flags.enabled)
            }
            ParamKind::Collection(element) => {
                let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
                let mut children = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let index = i.to_string();
                    children.push(self.node(&index, format!("{}/{}", path, index), element, item, flags, depth + 1)?);
                }
                Param::composite(path, name.to_string(), ParamShape::Collection, children, flags.visible, flags.enabled)
            }
        };
        Ok(Arc::new(param))
    }
}
