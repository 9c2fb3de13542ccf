//! Repository access: entity fetch/persist plus query execution, keyed by backend id.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};

use crate::error::{AppError, ConfigError};
use crate::search::eval::lookup;
use crate::search::{CompiledQuery, FieldPath};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Backend id of the in-memory store.
pub const MEMORY_BACKEND: &str = "memory";
/// Backend id of the PostgreSQL store.
pub const POSTGRES_BACKEND: &str = "postgres";

/// Fetch and persist entities by reference id within a storage alias.
pub trait ModelRepository: Send + Sync {
    /// `hint` is the absolute URI of the command that triggered the fetch.
    fn get(&self, ref_id: &str, alias: &str, hint: Option<&str>) -> Result<Option<Value>, AppError>;

    fn save(&self, ref_id: &str, alias: &str, entity: &Value) -> Result<(), AppError>;
}

/// Predicate / ordering / aggregation queries over a collection.
pub trait QueryBackend: Send + Sync {
    fn fetch(&self, collection: &str, query: &CompiledQuery) -> Result<Vec<Value>, AppError>;

    fn count(&self, collection: &str, query: &CompiledQuery) -> Result<u64, AppError>;

    /// One tuple per match, values in `fields` order.
    fn fetch_fields(
        &self,
        collection: &str,
        query: &CompiledQuery,
        fields: &[FieldPath],
    ) -> Result<Vec<Vec<Value>>, AppError> {
        Ok(self
            .fetch(collection, query)?
            .iter()
            .map(|doc| {
                fields
                    .iter()
                    .map(|f| lookup(doc, f).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    /// Execute one raw pipeline command; the reply carries a `result` array.
    fn execute_command(&self, raw: &str) -> Result<Value, AppError>;
}

/// A store usable for both entity access and queries.
pub trait DocumentStore: ModelRepository + QueryBackend {}

impl<T: ModelRepository + QueryBackend> DocumentStore for T {}

/// Stores registered by backend id.
#[derive(Clone, Default)]
pub struct RepositoryFactory {
    stores: HashMap<String, Arc<dyn DocumentStore>>,
}

impl RepositoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, backend: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        self.register(backend, store);
        self
    }

    pub fn register(&mut self, backend: impl Into<String>, store: Arc<dyn DocumentStore>) {
        self.stores.insert(backend.into(), store);
    }

    pub fn repository(&self, backend: &str) -> Result<&Arc<dyn DocumentStore>, ConfigError> {
        self.stores
            .get(backend)
            .ok_or_else(|| ConfigError::UnknownBackend(backend.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_is_config_error() {
        let factory = RepositoryFactory::new().with_store(MEMORY_BACKEND, Arc::new(MemoryStore::new()));
        assert!(factory.repository(MEMORY_BACKEND).is_ok());
        assert!(matches!(
            factory.repository("mongo"),
            Err(ConfigError::UnknownBackend(b)) if b == "mongo"
        ));
    }
}
