//! Dynamic search: criteria, expression language, metamodels and the engine.

pub mod compile;
pub mod criteria;
pub mod engine;
pub mod eval;
pub mod expr;
pub mod metamodel;
pub mod page;
pub mod pipeline;

pub use compile::{CompiledQuery, QueryCompiler};
pub use criteria::*;
pub use engine::{DynamicSearch, SearchResult, SearchTarget};
pub use expr::{FieldPath, Literal, OrderSpecifier, Predicate};
pub use metamodel::{MetamodelRegistry, QueryMetamodel};
pub use page::Page;
pub use pipeline::PipelineCommand;
