//! PostgreSQL document store: one JSONB table per collection, in the schema from `QUADRA_SCHEMA`.
//! Calls block on the runtime handle and must run on blocking threads.

use crate::config::ModelRegistry;
use crate::error::AppError;
use crate::process::process_alias;
use crate::repo::{ModelRepository, QueryBackend, POSTGRES_BACKEND};
use crate::search::{CompiledQuery, FieldPath, PipelineCommand};
use crate::sql::{self, QueryBuf};
use serde_json::Value;
use sqlx::{ConnectOptions, PgPool};
use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use tokio::runtime::Handle;

pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
    handle: Handle,
}

impl PgDocumentStore {
    /// Must be called from within a tokio runtime.
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Result<Self, AppError> {
        let handle = Handle::try_current()
            .map_err(|e| AppError::Repository(format!("no tokio runtime: {}", e)))?;
        Ok(PgDocumentStore {
            pool,
            schema: schema.into(),
            handle,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Create the schema and a table for every collection stored in PostgreSQL:
    /// persistent models and their workflow-state aliases.
    pub async fn ensure_collections(&self, registry: &ModelRegistry) -> Result<(), AppError> {
        sqlx::query(&sql::create_schema(&self.schema))
            .execute(&self.pool)
            .await?;

        let flow_in_pg = registry
            .process_flow()
            .repo
            .as_ref()
            .is_some_and(|r| r.backend == POSTGRES_BACKEND);
        let mut tables = BTreeSet::new();
        for model in registry.models() {
            if model.repo.as_ref().is_some_and(|r| r.backend == POSTGRES_BACKEND) {
                tables.insert(model.resolved_alias().to_string());
            }
            if flow_in_pg && model.lifecycle().is_some() {
                tables.insert(process_alias(registry, model));
            }
        }
        for table in &tables {
            sqlx::query(&sql::create_collection(&self.schema, table))
                .execute(&self.pool)
                .await?;
        }
        tracing::info!(schema = %self.schema, tables = tables.len(), "document tables ready");
        Ok(())
    }

    fn block_on<F: Future>(&self, f: F) -> F::Output {
        self.handle.block_on(f)
    }

    fn fetch_texts(&self, q: QueryBuf) -> Result<Vec<String>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        self.block_on(async {
            let mut query = sqlx::query_scalar::<_, String>(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.fetch_all(&self.pool).await
        })
        .map_err(AppError::from)
    }

    fn fetch_docs(&self, q: QueryBuf) -> Result<Vec<Value>, AppError> {
        self.fetch_texts(q)?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(AppError::from))
            .collect()
    }
}

/// Create the database named in `database_url` if it does not exist (connects via the `postgres` db).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = split_db_name(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name.replace('"', "\"\"")))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn split_db_name(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let db_name = url[path_start..].split('?').next().unwrap_or("").trim();
    Ok((format!("{}postgres", &url[..path_start]), db_name.to_string()))
}

impl ModelRepository for PgDocumentStore {
    fn get(&self, ref_id: &str, alias: &str, hint: Option<&str>) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(&self.schema, alias);
        tracing::debug!(sql = %q.sql, ref_id, hint = ?hint, "query");
        let row = self.block_on(
            sqlx::query_scalar::<_, String>(&q.sql)
                .bind(ref_id)
                .fetch_optional(&self.pool),
        )?;
        row.map(|raw| serde_json::from_str(&raw).map_err(AppError::from))
            .transpose()
    }

    fn save(&self, ref_id: &str, alias: &str, entity: &Value) -> Result<(), AppError> {
        let payload = serde_json::to_string(entity)?;
        let q = sql::upsert(&self.schema, alias, ref_id, &payload);
        tracing::debug!(sql = %q.sql, ref_id, "query");
        self.block_on(async {
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.execute(&self.pool).await
        })?;
        Ok(())
    }
}

impl QueryBackend for PgDocumentStore {
    fn fetch(&self, collection: &str, query: &CompiledQuery) -> Result<Vec<Value>, AppError> {
        self.fetch_docs(sql::select_where(&self.schema, collection, query))
    }

    fn count(&self, collection: &str, query: &CompiledQuery) -> Result<u64, AppError> {
        let q = sql::count_where(&self.schema, collection, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let n: i64 = self.block_on(async {
            let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.fetch_one(&self.pool).await
        })?;
        Ok(n.max(0) as u64)
    }

    fn fetch_fields(
        &self,
        collection: &str,
        query: &CompiledQuery,
        fields: &[FieldPath],
    ) -> Result<Vec<Vec<Value>>, AppError> {
        let rows = self.fetch_docs(sql::select_fields(&self.schema, collection, query, fields))?;
        Ok(rows
            .into_iter()
            .map(|row| match row {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect())
    }

    fn execute_command(&self, raw: &str) -> Result<Value, AppError> {
        let command = PipelineCommand::parse(raw)?;
        let pushed = command
            .leading_match()
            .and_then(|spec| sql::select_matching(&self.schema, &command.collection, spec));
        match pushed {
            Some(q) => {
                let docs = self.fetch_docs(q)?;
                command.execute_from(1, docs)
            }
            None => {
                let docs = self.fetch_docs(sql::select_all(&self.schema, &command.collection))?;
                command.execute(docs)
            }
        }
    }
}
