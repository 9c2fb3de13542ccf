//! Executor and function-handler seams.

use crate::command::Action;
use crate::error::{AppError, ConfigError};
use crate::exec::context::ExecutionContext;
use crate::exec::output::{Output, OutputValue};
use crate::model::{Param, QuadModel};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Runs one action verb against an execution context.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Output, AppError>;
}

/// Custom logic selected by a command's `fn` parameter. Receives the addressed param.
pub trait FunctionHandler: Send + Sync {
    fn handle(&self, ctx: &ExecutionContext, param: &Arc<Param>) -> Result<Value, AppError>;
}

impl<F> FunctionHandler for F
where
    F: Fn(&ExecutionContext, &Arc<Param>) -> Result<Value, AppError> + Send + Sync,
{
    fn handle(&self, ctx: &ExecutionContext, param: &Arc<Param>) -> Result<Value, AppError> {
        self(ctx, param)
    }
}

/// Handlers registered by action and name.
#[derive(Clone, Default)]
pub struct FunctionHandlers {
    handlers: HashMap<(Action, String), Arc<dyn FunctionHandler>>,
}

impl FunctionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Action, name: impl Into<String>, handler: Arc<dyn FunctionHandler>) {
        self.handlers.insert((action, name.into()), handler);
    }

    pub fn with(mut self, action: Action, name: impl Into<String>, handler: Arc<dyn FunctionHandler>) -> Self {
        self.register(action, name, handler);
        self
    }

    pub fn get(&self, action: Action, name: &str) -> Result<&Arc<dyn FunctionHandler>, ConfigError> {
        self.handlers
            .get(&(action, name.to_string()))
            .ok_or_else(|| ConfigError::UnknownHandler {
                action: action.code().to_string(),
                name: name.to_string(),
            })
    }
}

/// Locate the addressed param, then hand it to the designated handler if there is one.
pub(crate) fn respond(
    ctx: &ExecutionContext,
    quad: &QuadModel,
    handlers: &FunctionHandlers,
) -> Result<Output, AppError> {
    let cmd = ctx.command();
    let param = quad.find_param(cmd.nested()).ok_or_else(|| {
        AppError::NotFound(format!(
            "param '{}' under '{}'",
            cmd.nested_path(),
            cmd.domain_alias()
        ))
    })?;
    match cmd.function() {
        Some(name) => {
            let handler = handlers.get(cmd.action(), name)?;
            tracing::debug!(command = %cmd, handler = name, "invoking function handler");
            let value = handler.handle(ctx, &param)?;
            Ok(Output::new(cmd, OutputValue::Value(value)))
        }
        None => Ok(Output::new(cmd, OutputValue::Param(param))),
    }
}
