//! Create executor (`_new`).

use crate::error::AppError;
use crate::exec::context::ExecutionContext;
use crate::exec::domain_root::DomainRoot;
use crate::exec::executor::{respond, ActionExecutor, FunctionHandlers};
use crate::exec::output::Output;
use crate::model::entity_id;
use std::sync::Arc;

pub struct NewExecutor {
    root: DomainRoot,
    handlers: Arc<FunctionHandlers>,
}

impl NewExecutor {
    pub fn new(root: DomainRoot, handlers: Arc<FunctionHandlers>) -> Self {
        NewExecutor { root, handlers }
    }
}

impl ActionExecutor for NewExecutor {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Output, AppError> {
        let quad = self.root.create(ctx)?;
        let mut output = respond(ctx, &quad, &self.handlers)?;
        // The reply addresses the created record.
        if let Some(id) = entity_id(quad.root_entity()) {
            output.uri = ctx.command().with_ref_id(id).absolute_uri();
        }
        Ok(output)
    }
}
