//! Command execution: context, executors, gateway and outputs.

pub mod context;
pub mod domain_root;
pub mod executor;
pub mod gateway;
pub mod get;
pub mod new;
pub mod output;
pub mod search;

pub use context::ExecutionContext;
pub use domain_root::DomainRoot;
pub use executor::{ActionExecutor, FunctionHandler, FunctionHandlers};
pub use gateway::{CommandGateway, CommandResolver, DEFAULT_MAX_MAPPING_DEPTH};
pub use get::GetExecutor;
pub use new::NewExecutor;
pub use output::{MultiOutput, Output, OutputValue};
pub use search::SearchExecutor;
