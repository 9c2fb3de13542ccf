//! Command gateway: dispatches commands to executors, including commands issued while
//! resolving another one. Nested resolution is bounded by depth and rejects alias cycles.

use crate::command::{Action, Command};
use crate::config::ModelRegistry;
use crate::error::{AppError, ConfigError};
use crate::exec::context::ExecutionContext;
use crate::exec::domain_root::DomainRoot;
use crate::exec::executor::{ActionExecutor, FunctionHandlers};
use crate::exec::get::GetExecutor;
use crate::exec::new::NewExecutor;
use crate::exec::output::MultiOutput;
use crate::exec::search::SearchExecutor;
use crate::model::Session;
use crate::repo::RepositoryFactory;
use crate::search::DynamicSearch;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Default bound on nested mapped-model resolution.
pub const DEFAULT_MAX_MAPPING_DEPTH: usize = 8;

/// Re-entry point for nested command resolution.
pub trait CommandResolver: Send + Sync {
    fn resolve(&self, ctx: &mut ExecutionContext) -> Result<MultiOutput, AppError>;
}

pub struct CommandGateway {
    registry: Arc<ModelRegistry>,
    executors: HashMap<Action, Arc<dyn ActionExecutor>>,
    max_depth: usize,
}

impl CommandGateway {
    /// Build the gateway with the standard `_get`, `_new` and `_search` executors.
    pub fn new(
        registry: Arc<ModelRegistry>,
        repos: Arc<RepositoryFactory>,
        handlers: FunctionHandlers,
        max_depth: usize,
    ) -> Arc<Self> {
        let handlers = Arc::new(handlers);
        Arc::new_cyclic(|me: &Weak<CommandGateway>| {
            let resolver: Weak<dyn CommandResolver> = me.clone();
            let root = DomainRoot::new(Arc::clone(&registry), Arc::clone(&repos), resolver);
            let search = DynamicSearch::new(Arc::clone(registry.metamodels()));
            let mut executors: HashMap<Action, Arc<dyn ActionExecutor>> = HashMap::new();
            executors.insert(Action::Get, Arc::new(GetExecutor::new(root.clone(), Arc::clone(&handlers))));
            executors.insert(Action::New, Arc::new(NewExecutor::new(root, Arc::clone(&handlers))));
            executors.insert(
                Action::Search,
                Arc::new(SearchExecutor::new(Arc::clone(&registry), Arc::clone(&repos), search)),
            );
            CommandGateway {
                registry,
                executors,
                max_depth,
            }
        })
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Execute a top-level command.
    pub fn execute_command(&self, command: Command, session: Session) -> Result<MultiOutput, AppError> {
        let mut ctx = ExecutionContext::new(command, session);
        self.execute(&mut ctx)
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<MultiOutput, AppError> {
        let alias = ctx.command().domain_alias();
        if ctx.lineage().iter().any(|a| a == alias) {
            let mut chain = ctx.lineage().to_vec();
            chain.push(alias.to_string());
            return Err(ConfigError::CyclicMapping(chain.join(" -> ")).into());
        }
        if ctx.lineage().len() >= self.max_depth {
            return Err(AppError::InvalidState(format!(
                "mapping depth {} exceeded resolving '{}'",
                self.max_depth,
                ctx.command()
            )));
        }

        let cmd = ctx.command();
        let action = if cmd.action() == Action::Get && !cmd.criteria().is_empty() {
            Action::Search
        } else {
            cmd.action()
        };
        tracing::debug!(command = %cmd, action = %action, depth = ctx.lineage().len(), "dispatching command");
        let executor = self
            .executors
            .get(&action)
            .ok_or_else(|| AppError::BadRequest(format!("no executor for action {}", action)))?;
        let output = executor.execute(ctx)?;
        Ok(MultiOutput::single(output))
    }
}

impl CommandResolver for CommandGateway {
    fn resolve(&self, ctx: &mut ExecutionContext) -> Result<MultiOutput, AppError> {
        self.execute(ctx)
    }
}
