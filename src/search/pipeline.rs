//! Aggregation pipeline commands: `{"aggregate": "<collection>", "pipeline": [...]}`.
//!
//! Stages: `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count`.

use crate::error::AppError;
use crate::search::criteria::{AGGREGATE_MARKER, PIPELINE_RESULT_FIELD};
use crate::search::eval::{compare_values, lookup_dotted};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineCommand {
    pub collection: String,
    pub stages: Vec<Value>,
}

impl PipelineCommand {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let doc: Value = serde_json::from_str(raw.trim())
            .map_err(|e| AppError::BadRequest(format!("invalid pipeline command: {}", e)))?;
        let collection = doc
            .get(AGGREGATE_MARKER)
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("pipeline command needs an 'aggregate' collection".into()))?
            .to_string();
        let stages = match doc.get("pipeline") {
            None => Vec::new(),
            Some(Value::Array(stages)) => stages.clone(),
            Some(_) => return Err(AppError::BadRequest("'pipeline' must be an array".into())),
        };
        Ok(PipelineCommand { collection, stages })
    }

    /// Run the stages over the collection's documents and wrap the output as a reply.
    pub fn execute(&self, docs: Vec<Value>) -> Result<Value, AppError> {
        self.execute_from(0, docs)
    }

    /// Like `execute`, starting at stage `first`; earlier stages were applied by the caller.
    pub fn execute_from(&self, first: usize, docs: Vec<Value>) -> Result<Value, AppError> {
        let out = self
            .stages
            .iter()
            .skip(first)
            .try_fold(docs, |acc, stage| run_stage(acc, stage))?;
        Ok(json!({ PIPELINE_RESULT_FIELD: out, "ok": 1 }))
    }

    /// Filter of the first stage when it is a `$match`.
    pub fn leading_match(&self) -> Option<&Map<String, Value>> {
        let stage = self.stages.first()?.as_object().filter(|o| o.len() == 1)?;
        stage.get("$match")?.as_object()
    }
}

fn run_stage(docs: Vec<Value>, stage: &Value) -> Result<Vec<Value>, AppError> {
    let (name, spec) = match stage.as_object() {
        Some(obj) if obj.len() == 1 => obj.iter().next().map(|(k, v)| (k.as_str(), v)),
        _ => None,
    }
    .ok_or_else(|| AppError::BadRequest(format!("invalid pipeline stage: {}", stage)))?;

    match name {
        "$match" => {
            let spec = spec
                .as_object()
                .ok_or_else(|| AppError::BadRequest("$match expects an object".into()))?;
            let mut out = Vec::new();
            for d in docs {
                if match_doc(&d, spec)? {
                    out.push(d);
                }
            }
            Ok(out)
        }
        "$project" => {
            let spec = spec
                .as_object()
                .ok_or_else(|| AppError::BadRequest("$project expects an object".into()))?;
            Ok(docs.iter().map(|d| project(d, spec)).collect())
        }
        "$sort" => {
            let spec = spec
                .as_object()
                .ok_or_else(|| AppError::BadRequest("$sort expects an object".into()))?;
            let keys: Vec<(&str, bool)> = spec
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_i64().unwrap_or(1) < 0))
                .collect();
            let mut docs = docs;
            docs.sort_by(|a, b| {
                for (key, desc) in &keys {
                    let null = Value::Null;
                    let x = lookup_dotted(a, key).unwrap_or(&null);
                    let y = lookup_dotted(b, key).unwrap_or(&null);
                    let ord = if *desc { compare_values(y, x) } else { compare_values(x, y) };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            Ok(docs)
        }
        "$skip" => Ok(docs.into_iter().skip(count_arg(name, spec)?).collect()),
        "$limit" => Ok(docs.into_iter().take(count_arg(name, spec)?).collect()),
        "$count" => {
            let field = spec
                .as_str()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| AppError::BadRequest("$count expects a field name".into()))?;
            Ok(vec![json!({ field: docs.len() })])
        }
        other => Err(AppError::BadRequest(format!("unsupported pipeline stage: {}", other))),
    }
}

fn count_arg(stage: &str, spec: &Value) -> Result<usize, AppError> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| AppError::BadRequest(format!("{} expects a non-negative integer", stage)))
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn match_doc(doc: &Value, spec: &Map<String, Value>) -> Result<bool, AppError> {
    let null = Value::Null;
    for (field, cond) in spec {
        let actual = lookup_dotted(doc, field).unwrap_or(&null);
        let ops = match cond.as_object() {
            Some(o) if o.keys().all(|k| k.starts_with('$')) && !o.is_empty() => o,
            _ => {
                if !same(actual, cond) {
                    return Ok(false);
                }
                continue;
            }
        };
        for (op, operand) in ops {
            let comparable = std::mem::discriminant(actual) == std::mem::discriminant(operand);
            let ord = compare_values(actual, operand);
            let ok = match op.as_str() {
                "$eq" => same(actual, operand),
                "$ne" => !same(actual, operand),
                "$gt" => comparable && ord == Ordering::Greater,
                "$gte" => comparable && ord != Ordering::Less,
                "$lt" => comparable && ord == Ordering::Less,
                "$lte" => comparable && ord != Ordering::Greater,
                "$in" => operand
                    .as_array()
                    .ok_or_else(|| AppError::BadRequest("$in expects an array".into()))?
                    .iter()
                    .any(|v| same(actual, v)),
                other => {
                    return Err(AppError::BadRequest(format!("unsupported match operator: {}", other)))
                }
            };
            if !ok {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn project(doc: &Value, spec: &Map<String, Value>) -> Value {
    let excluding = spec.values().all(|v| v == &json!(0) || v == &json!(false));
    if excluding {
        let mut out = doc.as_object().cloned().unwrap_or_default();
        for k in spec.keys() {
            out.remove(k);
        }
        return Value::Object(out);
    }
    let mut out = Map::new();
    for (key, rule) in spec {
        let value = match rule {
            Value::String(s) if s.starts_with('$') => lookup_dotted(doc, &s[1..]),
            Value::Number(_) | Value::Bool(_) if rule != &json!(0) && rule != &json!(false) => {
                lookup_dotted(doc, key)
            }
            _ => None,
        };
        if let Some(v) = value {
            out.insert(key.clone(), v.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "1", "name": "bolt", "size": 3, "home": {"city": "Oslo"}}),
            json!({"id": "2", "name": "nut", "size": 7, "home": {"city": "Rome"}}),
            json!({"id": "3", "name": "washer", "size": 5, "home": {"city": "Oslo"}}),
        ]
    }

    fn run(raw: &str) -> Vec<Value> {
        let cmd = PipelineCommand::parse(raw).unwrap();
        let reply = cmd.execute(docs()).unwrap();
        assert_eq!(reply["ok"], json!(1));
        reply["result"].as_array().cloned().unwrap()
    }

    #[test]
    fn match_sort_limit_project() {
        let out = run(r#"{"aggregate": "widgets", "pipeline": [
            {"$match": {"home.city": "Oslo", "size": {"$gte": 3}}},
            {"$sort": {"size": -1}},
            {"$limit": 1},
            {"$project": {"name": 1, "city": "$home.city"}}
        ]}"#);
        assert_eq!(out, vec![json!({"name": "washer", "city": "Oslo"})]);
    }

    #[test]
    fn count_and_in() {
        let out = run(r#"{"aggregate": "widgets", "pipeline": [
            {"$match": {"size": {"$in": [3, 7]}}}, {"$count": "total"}
        ]}"#);
        assert_eq!(out, vec![json!({"total": 2})]);
    }

    #[test]
    fn resumes_after_applied_match() {
        let cmd = PipelineCommand::parse(r#"{"aggregate": "widgets", "pipeline": [
            {"$match": {"name": "nut"}}, {"$count": "total"}
        ]}"#)
        .unwrap();
        assert_eq!(cmd.leading_match().unwrap().get("name"), Some(&json!("nut")));
        let filtered = vec![docs()[1].clone()];
        assert_eq!(cmd.execute_from(1, filtered).unwrap()["result"], json!([{"total": 1}]));

        let sorted_first = PipelineCommand::parse(r#"{"aggregate": "w", "pipeline": [{"$sort": {"size": 1}}]}"#).unwrap();
        assert!(sorted_first.leading_match().is_none());
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(PipelineCommand::parse("{\"pipeline\": []}").is_err());
        assert!(PipelineCommand::parse("not json").is_err());
        let cmd = PipelineCommand::parse(r#"{"aggregate": "w", "pipeline": [{"$group": {}}]}"#).unwrap();
        assert!(cmd.execute(docs()).is_err());
    }
}
