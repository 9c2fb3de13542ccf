//! Domain-root resolution shared by the read and create executors: fetch or instantiate the
//! entity, resolve the core through the gateway for views, build the QuadModel and attach
//! workflow state.

use crate::command::Command;
use crate::config::{ModelConfig, ModelRegistry};
use crate::error::AppError;
use crate::exec::context::ExecutionContext;
use crate::exec::gateway::CommandResolver;
use crate::exec::output::Output;
use crate::model::{entity_id, instantiate, Param, QuadModel, QuadModelBuilder};
use crate::process::ProcessFlowLoader;
use crate::repo::{ModelRepository, RepositoryFactory};
use std::sync::{Arc, Weak};

#[derive(Clone)]
pub struct DomainRoot {
    registry: Arc<ModelRegistry>,
    repos: Arc<RepositoryFactory>,
    gateway: Weak<dyn CommandResolver>,
    flows: ProcessFlowLoader,
}

impl DomainRoot {
    pub fn new(registry: Arc<ModelRegistry>, repos: Arc<RepositoryFactory>, gateway: Weak<dyn CommandResolver>) -> Self {
        let flows = ProcessFlowLoader::new(Arc::clone(&registry), Arc::clone(&repos));
        DomainRoot {
            registry,
            repos,
            gateway,
            flows,
        }
    }

    /// Model for the context: reused when already attached, otherwise fetched by ref id
    /// (persistent models) or instantiated empty.
    pub fn load(&self, ctx: &mut ExecutionContext) -> Result<Arc<QuadModel>, AppError> {
        if let Some(quad) = ctx.quad() {
            return Ok(Arc::clone(quad));
        }
        let cmd = ctx.command();
        let model = Arc::clone(self.registry.require(cmd.domain_alias())?);
        let ref_id = cmd.ref_id().map(String::from);

        let entity = match (&model.repo, ref_id.as_deref()) {
            (Some(repo), Some(id)) => {
                let alias = model.resolved_alias();
                let uri = cmd.absolute_uri();
                self.repos
                    .repository(&repo.backend)?
                    .get(id, alias, Some(&uri))?
                    .ok_or_else(|| AppError::NotFound(format!("{} '{}' in '{}'", model.alias, id, alias)))?
            }
            _ => instantiate(&self.registry, &model, None)?,
        };

        let quad = match &model.maps_to {
            Some(target) => {
                let (core, _) = self.resolve_core(ctx, target)?;
                QuadModelBuilder::new(&self.registry, ctx.session()).build_composed(&model, entity, core)?
            }
            None => QuadModelBuilder::new(&self.registry, ctx.session()).build(&model, entity)?,
        };
        self.finish(ctx, &model, quad, ref_id.as_deref())
    }

    /// Fresh model with a new reference id, persisted when the model is persistent.
    /// Views create their core first and adopt its id.
    pub fn create(&self, ctx: &mut ExecutionContext) -> Result<Arc<QuadModel>, AppError> {
        if let Some(quad) = ctx.quad() {
            return Ok(Arc::clone(quad));
        }
        let model = Arc::clone(self.registry.require(ctx.command().domain_alias())?);

        let (quad, id) = match &model.maps_to {
            Some(target) => {
                let (core, id) = self.resolve_core(ctx, target)?;
                let entity = instantiate(&self.registry, &model, id.as_deref())?;
                if let Some(id) = id.as_deref() {
                    self.persist(&model, id, &entity)?;
                }
                let quad = QuadModelBuilder::new(&self.registry, ctx.session()).build_composed(&model, entity, core)?;
                (quad, id)
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let entity = instantiate(&self.registry, &model, Some(&id))?;
                self.persist(&model, &id, &entity)?;
                let quad = QuadModelBuilder::new(&self.registry, ctx.session()).build(&model, entity)?;
                (quad, Some(id))
            }
        };
        tracing::debug!(alias = %model.alias, id = ?id, "created entity");
        self.finish(ctx, &model, quad, id.as_deref())
    }

    fn persist(&self, model: &ModelConfig, id: &str, entity: &serde_json::Value) -> Result<(), AppError> {
        if let Some(repo) = &model.repo {
            self.repos
                .repository(&repo.backend)?
                .save(id, model.resolved_alias(), entity)?;
        }
        Ok(())
    }

    /// Resolve the core root of a view through the gateway with a derived command.
    /// Also returns the core's reference id, read from the resolved entity since the
    /// id need not be a declared param.
    fn resolve_core(&self, ctx: &ExecutionContext, target: &str) -> Result<(Arc<Param>, Option<String>), AppError> {
        let derived: Command = ctx.command().derive_for(target);
        let gateway = self
            .gateway
            .upgrade()
            .ok_or_else(|| AppError::InvalidState("command gateway is no longer available".into()))?;
        tracing::debug!(command = %derived, "resolving mapped core");
        let mut child = ctx.child(derived.clone());
        let outputs = gateway.resolve(&mut child)?;
        let core = outputs
            .single_result()
            .and_then(Output::param)
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidState(format!(
                    "expected exactly one param result for derived command '{}'",
                    derived
                ))
            })?;
        let id = child
            .quad()
            .and_then(|q| entity_id(q.root_entity()))
            .or_else(|| derived.ref_id())
            .map(String::from)
            .or_else(|| entity_id(&core.state()).map(String::from));
        Ok((core, id))
    }

    fn finish(
        &self,
        ctx: &mut ExecutionContext,
        model: &ModelConfig,
        quad: QuadModel,
        ref_id: Option<&str>,
    ) -> Result<Arc<QuadModel>, AppError> {
        self.flows.load(model, ref_id, quad.root())?;
        ctx.attach_quad(quad)
    }
}
