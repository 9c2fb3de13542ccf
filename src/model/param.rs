//! Param: one node of the runtime parameter-state tree.

use crate::process::ProcessFlow;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamShape {
    Leaf,
    Nested,
    Collection,
}

#[derive(Debug)]
pub struct Param {
    path: String,
    name: String,
    shape: ParamShape,
    value: Option<Value>,
    visible: bool,
    enabled: bool,
    children: Vec<Arc<Param>>,
    flow: OnceLock<ProcessFlow>,
}

impl Param {
    pub(crate) fn leaf(path: String, name: String, value: Value, visible: bool, enabled: bool) -> Self {
        Param {
            path,
            name,
            shape: ParamShape::Leaf,
            value: Some(value),
            visible,
            enabled,
            children: Vec::new(),
            flow: OnceLock::new(),
        }
    }

    pub(crate) fn composite(
        path: String,
        name: String,
        shape: ParamShape,
        children: Vec<Arc<Param>>,
        visible: bool,
        enabled: bool,
    ) -> Self {
        Param {
            path,
            name,
            shape,
            value: None,
            visible,
            enabled,
            children,
            flow: OnceLock::new(),
        }
    }

    /// Absolute path, e.g. "/widget/home/city".
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> ParamShape {
        self.shape
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn children(&self) -> &[Arc<Param>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Arc<Param>> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Current state as JSON; composite nodes are rebuilt from their children.
    pub fn state(&self) -> Value {
        match self.shape {
            ParamShape::Leaf => self.value.clone().unwrap_or(Value::Null),
            ParamShape::Nested => Value::Object(
                self.children
                    .iter()
                    .map(|c| (c.name.clone(), c.state()))
                    .collect::<Map<String, Value>>(),
            ),
            ParamShape::Collection => Value::Array(self.children.iter().map(|c| c.state()).collect()),
        }
    }

    /// Descendant at a relative path ("home/city", "/tags/0"); empty path is this node.
    pub fn find(&self, relative: &str) -> Option<&Param> {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |cur, seg| cur.child(seg).map(|c| c.as_ref()))
    }

    /// Same as `find`, returning the shared node. `None` for an empty path.
    pub fn find_shared(self: &Arc<Self>, relative: &str) -> Option<Arc<Param>> {
        let mut cur = Arc::clone(self);
        for seg in relative.split('/').filter(|s| !s.is_empty()) {
            let next = Arc::clone(cur.child(seg)?);
            cur = next;
        }
        Some(cur)
    }

    /// Attach workflow state. Only the first attachment takes effect.
    pub fn attach_flow(&self, flow: ProcessFlow) -> bool {
        self.flow.set(flow).is_ok()
    }

    pub fn flow(&self) -> Option<&ProcessFlow> {
        self.flow.get()
    }
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Param", 6)?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("visible", &self.visible)?;
        s.serialize_field("enabled", &self.enabled)?;
        match self.shape {
            ParamShape::Leaf => s.serialize_field("value", &self.state())?,
            _ => s.skip_field("value")?,
        }
        if self.children.is_empty() {
            s.skip_field("children")?;
        } else {
            s.serialize_field("children", &self.children)?;
        }
        match self.flow.get() {
            Some(flow) => s.serialize_field("flow", flow)?,
            None => s.skip_field("flow")?,
        }
        s.end()
    }
}
