//! Per-command execution context.

use crate::command::Command;
use crate::error::AppError;
use crate::model::{QuadModel, Session};
use std::sync::Arc;

pub struct ExecutionContext {
    command: Command,
    session: Session,
    quad: Option<Arc<QuadModel>>,
    /// Domain aliases of the enclosing commands that led here, outermost first.
    lineage: Vec<String>,
}

impl ExecutionContext {
    pub fn new(command: Command, session: Session) -> Self {
        ExecutionContext {
            command,
            session,
            quad: None,
            lineage: Vec::new(),
        }
    }

    /// Context for a command issued while resolving this one.
    pub fn child(&self, command: Command) -> ExecutionContext {
        let mut lineage = self.lineage.clone();
        lineage.push(self.command.domain_alias().to_string());
        ExecutionContext {
            command,
            session: self.session.clone(),
            quad: None,
            lineage,
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn quad(&self) -> Option<&Arc<QuadModel>> {
        self.quad.as_ref()
    }

    /// Attach the model built for this context. A context holds at most one.
    pub fn attach_quad(&mut self, quad: QuadModel) -> Result<Arc<QuadModel>, AppError> {
        if self.quad.is_some() {
            return Err(AppError::InvalidState(format!(
                "model already attached for '{}'",
                self.command
            )));
        }
        let quad = Arc::new(quad);
        self.quad = Some(Arc::clone(&quad));
        Ok(quad)
    }
}
