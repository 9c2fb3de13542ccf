//! Dynamic search: criteria dispatch, compilation and result post-processing.

use crate::error::AppError;
use crate::repo::QueryBackend;
use crate::search::compile::{CompiledQuery, QueryCompiler};
use crate::search::criteria::{PIPELINE_DELIMITER, PIPELINE_RESULT_FIELD};
use crate::search::metamodel::MetamodelRegistry;
use crate::search::page::Page;
use crate::search::SearchCriteria;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// What a search runs against: the declared type, the name bound in expressions,
/// and the storage collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTarget {
    pub type_name: String,
    pub alias: String,
    pub collection: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SearchResult {
    Count(u64),
    One(Option<Value>),
    Page(Page),
    List(Vec<Value>),
    Projected(Vec<Vec<Value>>),
}

impl SearchResult {
    pub fn len(&self) -> usize {
        match self {
            SearchResult::Count(_) => 1,
            SearchResult::One(v) => usize::from(v.is_some()),
            SearchResult::Page(p) => p.content.len(),
            SearchResult::List(v) => v.len(),
            SearchResult::Projected(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct DynamicSearch {
    metamodels: Arc<MetamodelRegistry>,
}

impl DynamicSearch {
    pub fn new(metamodels: Arc<MetamodelRegistry>) -> Self {
        DynamicSearch { metamodels }
    }

    pub fn search<B: QueryBackend + ?Sized>(
        &self,
        backend: &B,
        target: &SearchTarget,
        criteria: &SearchCriteria,
    ) -> Result<SearchResult, AppError> {
        if criteria.is_aggregation() {
            let raw = criteria.where_.as_deref().unwrap_or_default();
            return self.aggregate(backend, raw, criteria.unwrap_alias());
        }

        let compiler = QueryCompiler::bind(&self.metamodels, &target.type_name, &target.alias)?;
        let mut query = CompiledQuery {
            predicate: compiler.predicate(criteria.where_.as_deref())?,
            order: compiler.order(criteria.order_by.as_deref())?,
            offset: None,
            limit: None,
        };
        tracing::debug!(
            collection = %target.collection,
            query = ?query,
            "compiled search criteria"
        );

        if criteria.is_count() {
            return Ok(SearchResult::Count(backend.count(&target.collection, &query)?));
        }

        if criteria.is_fetch_one() {
            query.limit = Some(1);
            let first = backend.fetch(&target.collection, &query)?.into_iter().next();
            return Ok(SearchResult::One(first));
        }

        if let Some(fields) = criteria.projection_fields() {
            let paths = fields
                .iter()
                .map(|f| compiler.field(f))
                .collect::<Result<Vec<_>, _>>()?;
            let rows = backend.fetch_fields(&target.collection, &query, &paths)?;
            return Ok(SearchResult::Projected(rows));
        }

        if let Some(request) = &criteria.page {
            query.order.extend(compiler.sort_keys(&request.sort)?);
            let count_query = query.unpaged();
            let query = query.with_slice(request.offset(), request.size);
            let content = backend.fetch(&target.collection, &query)?;
            let page = Page::lazy(content, request, || backend.count(&target.collection, &count_query))?;
            return Ok(SearchResult::Page(page));
        }

        Ok(SearchResult::List(backend.fetch(&target.collection, &query)?))
    }

    /// Run each `~~`-separated pipeline command in order. The first failure fails the
    /// whole request; output gathered so far is discarded. Replies without a result
    /// array contribute nothing.
    fn aggregate<B: QueryBackend + ?Sized>(
        &self,
        backend: &B,
        raw: &str,
        unwrap_alias: Option<&str>,
    ) -> Result<SearchResult, AppError> {
        let mut output = Vec::new();
        for (index, command) in raw
            .split(PIPELINE_DELIMITER)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .enumerate()
        {
            let started = Instant::now();
            let step = backend
                .execute_command(command)
                .and_then(|reply| extract_result(reply, unwrap_alias));
            let elapsed = started.elapsed();
            match step {
                Ok(docs) => {
                    tracing::info!(index, elapsed = ?elapsed, results = docs.len(), "pipeline command executed");
                    output.extend(docs);
                }
                Err(err) => {
                    if !output.is_empty() {
                        tracing::warn!(
                            index,
                            discarded = output.len(),
                            error = %err,
                            "pipeline command failed; discarding partial output"
                        );
                    }
                    return Err(err);
                }
            }
        }
        Ok(SearchResult::List(output))
    }
}

fn extract_result(reply: Value, unwrap_alias: Option<&str>) -> Result<Vec<Value>, AppError> {
    let docs = match reply {
        Value::Object(mut obj) => match obj.remove(PIPELINE_RESULT_FIELD) {
            Some(Value::Array(docs)) => docs,
            _ => {
                tracing::debug!(field = PIPELINE_RESULT_FIELD, "pipeline reply carries no result array; skipped");
                return Ok(Vec::new());
            }
        },
        other => {
            tracing::debug!(reply = %other, "pipeline reply is not a document; skipped");
            return Ok(Vec::new());
        }
    };
    if let Some(alias) = unwrap_alias {
        if let Some(Value::Array(inner)) = docs.first().and_then(|d| d.get(alias)) {
            return Ok(inner.clone());
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn extracts_and_unwraps_results() {
        let reply = json!({"result": [{"items": [{"a": 1}, {"a": 2}]}], "ok": 1});
        assert_eq!(extract_result(reply.clone(), Some("items")).unwrap().len(), 2);
        assert_eq!(extract_result(reply, None).unwrap().len(), 1);
        assert_eq!(
            extract_result(json!({"result": [{"a": 1}]}), Some("items")).unwrap(),
            vec![json!({"a": 1})]
        );
        assert!(extract_result(json!({"ok": 1}), None).unwrap().is_empty());
        assert!(extract_result(json!({"result": 3}), None).unwrap().is_empty());
    }

    /// Backend answering pipeline commands from a fixed script.
    struct ScriptedBackend {
        replies: HashMap<&'static str, Result<Value, &'static str>>,
    }

    impl QueryBackend for ScriptedBackend {
        fn fetch(&self, _collection: &str, _query: &CompiledQuery) -> Result<Vec<Value>, AppError> {
            Ok(Vec::new())
        }

        fn count(&self, _collection: &str, _query: &CompiledQuery) -> Result<u64, AppError> {
            Ok(0)
        }

        fn execute_command(&self, raw: &str) -> Result<Value, AppError> {
            match self.replies.get(raw) {
                Some(Ok(reply)) => Ok(reply.clone()),
                Some(Err(msg)) => Err(AppError::Repository(msg.to_string())),
                None => Err(AppError::BadRequest(format!("unscripted command {}", raw))),
            }
        }
    }

    fn run(backend: &ScriptedBackend, raw: &str) -> Result<SearchResult, AppError> {
        let engine = DynamicSearch::new(Arc::new(MetamodelRegistry::new()));
        let target = SearchTarget {
            type_name: "Widget".into(),
            alias: "widget".into(),
            collection: "widgets".into(),
        };
        let criteria = SearchCriteria {
            where_: Some(raw.to_string()),
            ..SearchCriteria::default()
        };
        engine.search(backend, &target, &criteria)
    }

    #[test]
    fn replies_without_result_array_are_skipped() {
        let backend = ScriptedBackend {
            replies: HashMap::from([
                ("aggregate-drop", Ok(json!({"ok": 1}))),
                ("aggregate-list", Ok(json!({"result": [{"a": 1}], "ok": 1}))),
            ]),
        };
        let result = run(&backend, "aggregate-drop ~~ aggregate-list").unwrap();
        assert_eq!(result, SearchResult::List(vec![json!({"a": 1})]));
    }

    #[test]
    fn backend_failure_fails_whole_aggregation() {
        let backend = ScriptedBackend {
            replies: HashMap::from([
                ("aggregate-list", Ok(json!({"result": [{"a": 1}]}))),
                ("aggregate-broken", Err("connection reset")),
            ]),
        };
        let err = run(&backend, "aggregate-list ~~ aggregate-broken").unwrap_err();
        assert!(matches!(err, AppError::Repository(ref m) if m == "connection reset"));
    }
}
