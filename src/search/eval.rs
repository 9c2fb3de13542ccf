//! In-process evaluation of compiled queries over JSON documents.

use crate::search::compile::CompiledQuery;
use crate::search::expr::{CompareOp, FieldPath, Literal, OrderSpecifier, Predicate, TextOp};
use crate::search::SortDirection;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Value at a dotted path; `None` when any segment is missing.
pub fn lookup<'v>(doc: &'v Value, path: &FieldPath) -> Option<&'v Value> {
    path.segments().iter().try_fold(doc, |cur, seg| cur.get(seg))
}

pub fn lookup_dotted<'v>(doc: &'v Value, dotted: &str) -> Option<&'v Value> {
    lookup(doc, &FieldPath::parse(dotted))
}

fn is_null(v: Option<&Value>) -> bool {
    matches!(v, None | Some(Value::Null))
}

/// Order JSON values: null first, then booleans, numbers, strings, everything else.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn literal_cmp(actual: &Value, lit: &Literal) -> Option<Ordering> {
    match (actual, lit) {
        (Value::Number(n), Literal::Int(i)) => n.as_f64()?.partial_cmp(&(*i as f64)),
        (Value::Number(n), Literal::Float(f)) => n.as_f64()?.partial_cmp(f),
        (Value::String(s), Literal::Str(l)) => Some(s.as_str().cmp(l.as_str())),
        (Value::Bool(b), Literal::Bool(l)) => Some(b.cmp(l)),
        _ => None,
    }
}

fn equals(actual: Option<&Value>, lit: &Literal) -> bool {
    match lit {
        Literal::Null => is_null(actual),
        _ => actual.and_then(|a| literal_cmp(a, lit)) == Some(Ordering::Equal),
    }
}

/// SQL LIKE (`%`, `_`) to an anchored regex.
pub fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

pub fn matches(doc: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compare { path, op, value } => {
            let actual = lookup(doc, path);
            match op {
                CompareOp::Eq => equals(actual, value),
                CompareOp::Ne => !equals(actual, value),
                _ => {
                    let Some(ord) = actual.and_then(|a| literal_cmp(a, value)) else {
                        return false;
                    };
                    match op {
                        CompareOp::Gt => ord == Ordering::Greater,
                        CompareOp::Goe => ord != Ordering::Less,
                        CompareOp::Lt => ord == Ordering::Less,
                        CompareOp::Loe => ord != Ordering::Greater,
                        CompareOp::Eq | CompareOp::Ne => false,
                    }
                }
            }
        }
        Predicate::Text { path, op, value } => {
            let Some(Value::String(s)) = lookup(doc, path) else {
                return false;
            };
            match op {
                TextOp::Like => like_regex(value).map(|r| r.is_match(s)).unwrap_or(false),
                TextOp::Contains => s.contains(value.as_str()),
                TextOp::StartsWith => s.starts_with(value.as_str()),
                TextOp::EndsWith => s.ends_with(value.as_str()),
                TextOp::EqualsIgnoreCase => s.to_lowercase() == value.to_lowercase(),
            }
        }
        Predicate::In { path, values, negated } => {
            let actual = lookup(doc, path);
            values.iter().any(|v| equals(actual, v)) != *negated
        }
        Predicate::Between { path, low, high } => match lookup(doc, path) {
            Some(a) => {
                literal_cmp(a, low).is_some_and(|o| o != Ordering::Less)
                    && literal_cmp(a, high).is_some_and(|o| o != Ordering::Greater)
            }
            None => false,
        },
        Predicate::IsNull { path, negated } => is_null(lookup(doc, path)) != *negated,
        Predicate::And(items) => items.iter().all(|p| matches(doc, p)),
        Predicate::Or(items) => items.iter().any(|p| matches(doc, p)),
        Predicate::Not(inner) => !matches(doc, inner),
    }
}

pub fn compare_docs(a: &Value, b: &Value, order: &[OrderSpecifier]) -> Ordering {
    for o in order {
        let null = Value::Null;
        let x = lookup(a, &o.path).unwrap_or(&null);
        let y = lookup(b, &o.path).unwrap_or(&null);
        let ord = match o.direction {
            SortDirection::Asc => compare_values(x, y),
            SortDirection::Desc => compare_values(y, x),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Filter, sort (stable) and slice `docs`.
pub fn apply(docs: impl IntoIterator<Item = Value>, query: &CompiledQuery) -> Vec<Value> {
    let mut hits: Vec<Value> = docs
        .into_iter()
        .filter(|d| query.predicate.as_ref().map(|p| matches(d, p)).unwrap_or(true))
        .collect();
    if !query.order.is_empty() {
        hits.sort_by(|a, b| compare_docs(a, b, &query.order));
    }
    let offset = query.offset.unwrap_or(0) as usize;
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    hits.into_iter().skip(offset).take(limit).collect()
}
