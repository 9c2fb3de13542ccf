//! Read executor (`_get`).

use crate::error::AppError;
use crate::exec::context::ExecutionContext;
use crate::exec::domain_root::DomainRoot;
use crate::exec::executor::{respond, ActionExecutor, FunctionHandlers};
use crate::exec::output::Output;
use std::sync::Arc;

pub struct GetExecutor {
    root: DomainRoot,
    handlers: Arc<FunctionHandlers>,
}

impl GetExecutor {
    pub fn new(root: DomainRoot, handlers: Arc<FunctionHandlers>) -> Self {
        GetExecutor { root, handlers }
    }
}

impl ActionExecutor for GetExecutor {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Output, AppError> {
        let quad = self.root.load(ctx)?;
        respond(ctx, &quad, &self.handlers)
    }
}
