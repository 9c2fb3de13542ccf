//! In-memory document store: one ordered map of id -> document per collection.

use crate::error::AppError;
use crate::repo::{ModelRepository, QueryBackend};
use crate::search::eval;
use crate::search::{CompiledQuery, PipelineCommand};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly, e.g. for seeding.
    pub fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<(), AppError> {
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, AppError> {
        self.collections
            .read()
            .map_err(|_| AppError::Repository("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, AppError> {
        self.collections
            .write()
            .map_err(|_| AppError::Repository("memory store lock poisoned".into()))
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        Ok(self
            .read()?
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl ModelRepository for MemoryStore {
    fn get(&self, ref_id: &str, alias: &str, hint: Option<&str>) -> Result<Option<Value>, AppError> {
        tracing::debug!(alias, ref_id, hint = ?hint, "memory get");
        Ok(self.read()?.get(alias).and_then(|c| c.get(ref_id)).cloned())
    }

    fn save(&self, ref_id: &str, alias: &str, entity: &Value) -> Result<(), AppError> {
        tracing::debug!(alias, ref_id, "memory save");
        self.insert(alias, ref_id, entity.clone())
    }
}

impl QueryBackend for MemoryStore {
    fn fetch(&self, collection: &str, query: &CompiledQuery) -> Result<Vec<Value>, AppError> {
        Ok(eval::apply(self.snapshot(collection)?, query))
    }

    fn count(&self, collection: &str, query: &CompiledQuery) -> Result<u64, AppError> {
        Ok(eval::apply(self.snapshot(collection)?, &query.unpaged()).len() as u64)
    }

    fn execute_command(&self, raw: &str) -> Result<Value, AppError> {
        let command = PipelineCommand::parse(raw)?;
        command.execute(self.snapshot(&command.collection)?)
    }
}
