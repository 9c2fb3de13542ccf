//! Search executor (`_search`, or any read carrying criteria).

use crate::config::ModelRegistry;
use crate::error::{AppError, ConfigError};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::ActionExecutor;
use crate::exec::output::{Output, OutputValue};
use crate::repo::RepositoryFactory;
use crate::search::{DynamicSearch, SearchTarget};
use std::sync::Arc;

pub struct SearchExecutor {
    registry: Arc<ModelRegistry>,
    repos: Arc<RepositoryFactory>,
    engine: DynamicSearch,
}

impl SearchExecutor {
    pub fn new(registry: Arc<ModelRegistry>, repos: Arc<RepositoryFactory>, engine: DynamicSearch) -> Self {
        SearchExecutor {
            registry,
            repos,
            engine,
        }
    }
}

impl ActionExecutor for SearchExecutor {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Output, AppError> {
        let cmd = ctx.command();
        let model = self.registry.require(cmd.domain_alias())?;
        let repo = model
            .repo
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRepository(model.alias.clone()))?;
        let target = SearchTarget {
            type_name: model.type_name.clone(),
            alias: model.alias.clone(),
            collection: model.resolved_alias().to_string(),
        };
        let store = self.repos.repository(&repo.backend)?;
        let result = self.engine.search(store.as_ref(), &target, cmd.criteria())?;
        tracing::debug!(command = %cmd, results = result.len(), "search complete");
        Ok(Output::new(cmd, OutputValue::Search(result)))
    }
}
