//! Quadra SDK: configuration-driven domain model runtime. Commands address models by URI,
//! resolve them into param trees (including view models mapped onto core models), and run
//! dynamic searches against pluggable document stores.

pub mod command;
pub mod config;
pub mod error;
pub mod exec;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod process;
pub mod repo;
pub mod response;
pub mod routes;
pub mod search;
pub mod settings;
pub mod sql;
pub mod state;

pub use command::{Action, Command, CommandBuilder};
pub use config::{load_from_path, parse_config, resolve, FullConfig, ModelConfig, ModelRegistry};
pub use error::{AppError, ConfigError};
pub use exec::{
    CommandGateway, ExecutionContext, FunctionHandler, FunctionHandlers, MultiOutput, Output,
    OutputValue, DEFAULT_MAX_MAPPING_DEPTH,
};
pub use model::{Param, QuadModel, Session};
pub use process::ProcessFlow;
pub use repo::{
    ensure_database_exists, DocumentStore, MemoryStore, PgDocumentStore, RepositoryFactory,
    MEMORY_BACKEND, POSTGRES_BACKEND,
};
pub use response::{success_many, success_many_created};
pub use routes::{app, command_routes, common_routes};
pub use search::{DynamicSearch, SearchCriteria, SearchResult};
pub use settings::{init_tracing, Settings};
pub use state::AppState;
