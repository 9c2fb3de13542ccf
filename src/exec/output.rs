//! Executor outputs.

use crate::command::Command;
use crate::model::Param;
use crate::search::SearchResult;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutputValue {
    Param(Arc<Param>),
    Search(SearchResult),
    /// Result of a custom function handler.
    Value(Value),
}

#[derive(Clone, Debug, Serialize)]
pub struct Output {
    pub uri: String,
    pub action: String,
    #[serde(flatten)]
    pub value: OutputValue,
}

impl Output {
    pub fn new(command: &Command, value: OutputValue) -> Self {
        Output {
            uri: command.absolute_uri(),
            action: command.action().code().to_string(),
            value,
        }
    }

    pub fn param(&self) -> Option<&Arc<Param>> {
        match &self.value {
            OutputValue::Param(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MultiOutput {
    pub outputs: Vec<Output>,
}

impl MultiOutput {
    pub fn single(output: Output) -> Self {
        MultiOutput { outputs: vec![output] }
    }

    /// The only output, when there is exactly one.
    pub fn single_result(&self) -> Option<&Output> {
        match self.outputs.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn into_single(self) -> Option<Output> {
        let mut outputs = self.outputs;
        if outputs.len() == 1 {
            outputs.pop()
        } else {
            None
        }
    }
}
