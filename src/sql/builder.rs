//! Builds parameterized SQL over JSONB document tables `(id, payload, updated_at)`.
//! Identifiers and JSON path segments come from validated metadata; values are always parameters.

use crate::search::expr::{CompareOp, FieldPath, Literal, OrderSpecifier, Predicate, TextOp};
use crate::search::{CompiledQuery, SortDirection};
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a string literal (path segments only).
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))
}

pub fn create_collection(schema: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, payload JSONB NOT NULL, updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
        qualified_table(schema, table)
    )
}

/// SELECT payload by id. Caller binds the id as sole param.
pub fn select_by_id(schema: &str, table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT payload::text FROM {} WHERE id = $1",
        qualified_table(schema, table)
    );
    q
}

/// Insert or replace a document.
pub fn upsert(schema: &str, table: &str, id: &str, payload: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_n = q.push_param(PgBindValue(id.to_string()));
    let payload_n = q.push_param(PgBindValue(payload.to_string()));
    q.sql = format!(
        "INSERT INTO {} (id, payload, updated_at) VALUES (${}, ${}::jsonb, NOW()) \
         ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()",
        qualified_table(schema, table),
        id_n,
        payload_n
    );
    q
}

/// Every document, in id order (pipeline input).
pub fn select_all(schema: &str, table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT payload::text FROM {} ORDER BY id",
        qualified_table(schema, table)
    );
    q
}

/// Documents passing a pipeline `$match` filter, in id order. `None` unless every condition
/// has an exact JSONB form: scalar equality, `$eq`/`$ne`/`$in` over scalars, numeric ranges.
pub fn select_matching(schema: &str, table: &str, spec: &Map<String, Value>) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut conds = Vec::with_capacity(spec.len());
    for (field, cond) in spec {
        let path = FieldPath::parse(field);
        match cond.as_object() {
            Some(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                for (op, operand) in ops {
                    conds.push(match_op_sql(&mut q, &path, op, operand)?);
                }
            }
            _ => conds.push(json_eq_sql(&mut q, &path, cond)?),
        }
    }
    let mut sql = format!("SELECT payload::text FROM {}", qualified_table(schema, table));
    if !conds.is_empty() {
        let parts: Vec<String> = conds.iter().map(|c| format!("({})", c)).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }
    sql.push_str(" ORDER BY id");
    q.sql = sql;
    Some(q)
}

/// Scalar equality on JSONB: numbers compare numerically, types never coerce.
fn json_eq_sql(q: &mut QueryBuf, path: &FieldPath, value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(is_null_sql(path)),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            let n = q.push_param(PgBindValue(value.to_string()));
            Some(format!("{} = ${}::jsonb", json_path(path, false), n))
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn match_op_sql(q: &mut QueryBuf, path: &FieldPath, op: &str, operand: &Value) -> Option<String> {
    let cmp = match op {
        "$eq" => return json_eq_sql(q, path, operand),
        "$ne" => {
            return json_eq_sql(q, path, operand).map(|eq| format!("NOT COALESCE(({}), FALSE)", eq));
        }
        "$in" => {
            let alternatives = operand
                .as_array()?
                .iter()
                .map(|v| json_eq_sql(q, path, v))
                .collect::<Option<Vec<_>>>()?;
            return Some(if alternatives.is_empty() {
                "FALSE".to_string()
            } else {
                format!("COALESCE(({}), FALSE)", alternatives.join(" OR "))
            });
        }
        "$gt" => ">",
        "$gte" => ">=",
        "$lt" => "<",
        "$lte" => "<=",
        _ => return None,
    };
    if !operand.is_number() {
        return None;
    }
    let col = json_path(path, false);
    let n = q.push_param(PgBindValue(operand.to_string()));
    Some(format!("jsonb_typeof({}) = 'number' AND {} {} ${}::jsonb", col, col, cmp, n))
}

/// SELECT matching documents with ordering and slice.
pub fn select_where(schema: &str, table: &str, query: &CompiledQuery) -> QueryBuf {
    select_expr(schema, table, "payload::text", query)
}

/// SELECT one JSON array per match holding the given fields.
pub fn select_fields(schema: &str, table: &str, query: &CompiledQuery, fields: &[FieldPath]) -> QueryBuf {
    let cols = fields
        .iter()
        .map(|f| json_path(f, false))
        .collect::<Vec<_>>()
        .join(", ");
    select_expr(schema, table, &format!("jsonb_build_array({})::text", cols), query)
}

pub fn count_where(schema: &str, table: &str, query: &CompiledQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, table));
    if let Some(p) = &query.predicate {
        let cond = predicate_sql(&mut q, p);
        sql.push_str(" WHERE ");
        sql.push_str(&cond);
    }
    q.sql = sql;
    q
}

fn select_expr(schema: &str, table: &str, projection: &str, query: &CompiledQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sql = format!("SELECT {} FROM {}", projection, qualified_table(schema, table));
    if let Some(p) = &query.predicate {
        let cond = predicate_sql(&mut q, p);
        sql.push_str(" WHERE ");
        sql.push_str(&cond);
    }
    sql.push_str(" ORDER BY ");
    for o in &query.order {
        sql.push_str(&order_sql(o));
        sql.push_str(", ");
    }
    sql.push_str("id ASC");
    if let Some(limit) = query.limit {
        let n = q.push_param(PgBindValue(limit.to_string()));
        sql.push_str(&format!(" LIMIT ${}::bigint", n));
    }
    if let Some(offset) = query.offset.filter(|o| *o > 0) {
        let n = q.push_param(PgBindValue(offset.to_string()));
        sql.push_str(&format!(" OFFSET ${}::bigint", n));
    }
    q.sql = sql;
    q
}

/// `payload->'a'->'b'` (jsonb) or `payload->'a'->>'b'` (text).
fn json_path(path: &FieldPath, as_text: bool) -> String {
    let segs = path.segments();
    let mut out = String::from("payload");
    for (i, seg) in segs.iter().enumerate() {
        let op = if as_text && i + 1 == segs.len() { "->>" } else { "->" };
        out.push_str(op);
        out.push_str(&literal(seg));
    }
    out
}

fn order_sql(o: &OrderSpecifier) -> String {
    match o.direction {
        SortDirection::Asc => format!("{} ASC NULLS FIRST", json_path(&o.path, false)),
        SortDirection::Desc => format!("{} DESC NULLS LAST", json_path(&o.path, false)),
    }
}

/// Column expression and bound placeholder for comparing a field with a literal.
fn typed_operands(q: &mut QueryBuf, path: &FieldPath, value: &Literal) -> (String, String) {
    let text = json_path(path, true);
    let Some(bind) = PgBindValue::from_literal(value) else {
        return (text, "NULL".to_string());
    };
    let n = q.push_param(bind);
    match value {
        Literal::Int(_) | Literal::Float(_) => (format!("({})::numeric", text), format!("${}::numeric", n)),
        Literal::Bool(_) => (format!("({})::boolean", text), format!("${}::boolean", n)),
        Literal::Str(_) | Literal::Null => (text, format!("${}", n)),
    }
}

fn is_null_sql(path: &FieldPath) -> String {
    format!("COALESCE(jsonb_typeof({}), 'null') = 'null'", json_path(path, false))
}

fn predicate_sql(q: &mut QueryBuf, p: &Predicate) -> String {
    match p {
        Predicate::Compare { path, op, value } => {
            if *value == Literal::Null {
                let check = is_null_sql(path);
                return match op {
                    CompareOp::Ne => format!("NOT ({})", check),
                    _ => check,
                };
            }
            let (col, param) = typed_operands(q, path, value);
            match op {
                CompareOp::Eq => format!("{} = {}", col, param),
                CompareOp::Ne => format!("{} IS DISTINCT FROM {}", col, param),
                CompareOp::Gt => format!("{} > {}", col, param),
                CompareOp::Goe => format!("{} >= {}", col, param),
                CompareOp::Lt => format!("{} < {}", col, param),
                CompareOp::Loe => format!("{} <= {}", col, param),
            }
        }
        Predicate::Text { path, op, value } => {
            let col = json_path(path, true);
            let n = q.push_param(PgBindValue(value.clone()));
            match op {
                TextOp::Like => format!("{} LIKE ${}", col, n),
                TextOp::Contains => format!("strpos({}, ${}) > 0", col, n),
                TextOp::StartsWith => format!("left({}, length(${})) = ${}", col, n, n),
                TextOp::EndsWith => format!("right({}, length(${})) = ${}", col, n, n),
                TextOp::EqualsIgnoreCase => format!("lower({}) = lower(${})", col, n),
            }
        }
        Predicate::In { path, values, negated } => {
            let mut alternatives = Vec::new();
            for v in values {
                if *v == Literal::Null {
                    alternatives.push(is_null_sql(path));
                } else {
                    let (col, param) = typed_operands(q, path, v);
                    alternatives.push(format!("{} = {}", col, param));
                }
            }
            let any = format!("COALESCE(({}), FALSE)", alternatives.join(" OR "));
            if *negated {
                format!("NOT {}", any)
            } else {
                any
            }
        }
        Predicate::Between { path, low, high } => {
            let (col, low_p) = typed_operands(q, path, low);
            let (_, high_p) = typed_operands(q, path, high);
            format!("{} BETWEEN {} AND {}", col, low_p, high_p)
        }
        Predicate::IsNull { path, negated } => {
            let check = is_null_sql(path);
            if *negated {
                format!("NOT ({})", check)
            } else {
                check
            }
        }
        Predicate::And(items) => join(q, items, " AND "),
        Predicate::Or(items) => join(q, items, " OR "),
        Predicate::Not(inner) => format!("NOT COALESCE(({}), FALSE)", predicate_sql(q, inner)),
    }
}

fn join(q: &mut QueryBuf, items: &[Predicate], sep: &str) -> String {
    let parts: Vec<String> = items.iter().map(|i| format!("({})", predicate_sql(q, i))).collect();
    parts.join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::expr::{parse_order, parse_predicate};
    use serde_json::json;

    fn query(where_: &str) -> CompiledQuery {
        CompiledQuery {
            predicate: Some(parse_predicate(where_, "w").unwrap()),
            ..CompiledQuery::default()
        }
    }

    #[test]
    fn comparison_binds_values_with_casts() {
        let q = select_where("quadra", "widgets", &query("w.size.gt(3).and(w.home.city.eq('Oslo'))"));
        assert_eq!(
            q.sql,
            "SELECT payload::text FROM \"quadra\".\"widgets\" WHERE ((payload->>'size')::numeric > $1::numeric) \
             AND (payload->'home'->>'city' = $2) ORDER BY id ASC"
        );
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn order_and_slice() {
        let mut cq = CompiledQuery {
            order: parse_order("w.size.desc()", "w").unwrap(),
            ..CompiledQuery::default()
        };
        cq = cq.with_slice(10, 5);
        let q = select_where("quadra", "widgets", &cq);
        assert!(q.sql.ends_with("ORDER BY payload->'size' DESC NULLS LAST, id ASC LIMIT $1::bigint OFFSET $2::bigint"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn path_segments_are_escaped() {
        let q = count_where("quadra", "widgets", &query("w.name.isNull()"));
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"quadra\".\"widgets\" WHERE COALESCE(jsonb_typeof(payload->'name'), 'null') = 'null'"
        );
        assert_eq!(literal("o'k"), "'o''k'");
        assert!(q.params.is_empty());
    }

    #[test]
    fn projection_builds_array() {
        let q = select_fields(
            "quadra",
            "widgets",
            &CompiledQuery::default(),
            &[FieldPath::parse("name"), FieldPath::parse("home.city")],
        );
        assert!(q.sql.starts_with(
            "SELECT jsonb_build_array(payload->'name', payload->'home'->'city')::text FROM"
        ));
    }

    fn match_spec(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn leading_match_becomes_where_clause() {
        let q = select_matching(
            "quadra",
            "widgets",
            &match_spec(json!({"home.city": "Oslo", "size": {"$gte": 3, "$in": [3, 5]}, "note": null})),
        )
        .unwrap();
        assert_eq!(
            q.sql,
            "SELECT payload::text FROM \"quadra\".\"widgets\" WHERE (payload->'home'->'city' = $1::jsonb) \
             AND (COALESCE(jsonb_typeof(payload->'note'), 'null') = 'null') \
             AND (jsonb_typeof(payload->'size') = 'number' AND payload->'size' >= $2::jsonb) \
             AND (COALESCE((payload->'size' = $3::jsonb OR payload->'size' = $4::jsonb), FALSE)) ORDER BY id"
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue("\"Oslo\"".into()),
                PgBindValue("3".into()),
                PgBindValue("3".into()),
                PgBindValue("5".into())
            ]
        );
    }

    #[test]
    fn match_without_exact_sql_form_stays_in_memory() {
        assert!(select_matching("quadra", "widgets", &match_spec(json!({"size": {"$gt": "3"}}))).is_none());
        assert!(select_matching("quadra", "widgets", &match_spec(json!({"tags": ["steel"]}))).is_none());
        assert!(select_matching("quadra", "widgets", &match_spec(json!({"name": {"$regex": "^b"}}))).is_none());
        let all = select_matching("quadra", "widgets", &Map::new()).unwrap();
        assert_eq!(all.sql, select_all("quadra", "widgets").sql);
    }
}
