//! Bind criteria expressions to a type's metamodel and type-check them.

use crate::config::ScalarType;
use crate::error::AppError;
use crate::search::expr::{
    parse_order, parse_predicate, CompareOp, FieldPath, Literal, OrderSpecifier, Predicate,
};
use crate::search::metamodel::{MetamodelRegistry, QueryMetamodel};
use crate::search::SortKey;
use std::sync::Arc;

/// Backend-neutral query: filter, ordering and slice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledQuery {
    pub predicate: Option<Predicate>,
    pub order: Vec<OrderSpecifier>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl CompiledQuery {
    pub fn with_slice(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Same filter, no ordering or slice; used for counting.
    pub fn unpaged(&self) -> CompiledQuery {
        CompiledQuery {
            predicate: self.predicate.clone(),
            ..CompiledQuery::default()
        }
    }
}

/// Compiler for one type with one bound name.
pub struct QueryCompiler<'a> {
    metamodel: Arc<QueryMetamodel>,
    binding: &'a str,
}

impl<'a> QueryCompiler<'a> {
    pub fn bind(
        registry: &MetamodelRegistry,
        type_name: &str,
        binding: &'a str,
    ) -> Result<Self, AppError> {
        let metamodel = registry.get(type_name).cloned().ok_or_else(|| {
            AppError::compile(
                type_name,
                "no query metamodel available; declare the model so its metamodel is generated",
            )
        })?;
        Ok(QueryCompiler { metamodel, binding })
    }

    fn type_name(&self) -> &str {
        self.metamodel.type_name()
    }

    fn err(&self, message: impl Into<String>) -> AppError {
        AppError::compile(self.type_name(), message)
    }

    pub fn predicate(&self, src: Option<&str>) -> Result<Option<Predicate>, AppError> {
        let Some(src) = src.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let predicate = parse_predicate(src, self.binding).map_err(|e| self.err(e.0))?;
        self.check_predicate(&predicate)?;
        Ok(Some(predicate))
    }

    pub fn order(&self, src: Option<&str>) -> Result<Vec<OrderSpecifier>, AppError> {
        let Some(src) = src.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Vec::new());
        };
        let order = parse_order(src, self.binding).map_err(|e| self.err(e.0))?;
        for o in &order {
            self.field_type(&o.path)?;
        }
        Ok(order)
    }

    /// Page sort keys are plain dotted field names.
    pub fn sort_keys(&self, keys: &[SortKey]) -> Result<Vec<OrderSpecifier>, AppError> {
        keys.iter()
            .map(|k| {
                let path = self.field(&k.property)?;
                Ok(OrderSpecifier {
                    path,
                    direction: k.direction,
                })
            })
            .collect()
    }

    /// Validate a dotted field name, accepting an optional leading binding segment.
    pub fn field(&self, dotted: &str) -> Result<FieldPath, AppError> {
        let trimmed = dotted.trim();
        let stripped = trimmed
            .strip_prefix(self.binding)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(trimmed);
        let path = FieldPath::parse(stripped);
        self.field_type(&path)?;
        Ok(path)
    }

    fn field_type(&self, path: &FieldPath) -> Result<ScalarType, AppError> {
        self.metamodel
            .field(&path.dotted())
            .ok_or_else(|| self.err(format!("unknown field '{}'", path)))
    }

    fn check_predicate(&self, p: &Predicate) -> Result<(), AppError> {
        match p {
            Predicate::Compare { path, op, value } => {
                let t = self.field_type(path)?;
                if t == ScalarType::Boolean && !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return Err(self.err(format!("field '{}' is boolean and cannot be ordered", path)));
                }
                if *value == Literal::Null && !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return Err(self.err(format!("null can only be compared for equality on '{}'", path)));
                }
                self.check_literal(path, t, value)
            }
            Predicate::Text { path, .. } => match self.field_type(path)? {
                ScalarType::String => Ok(()),
                other => Err(self.err(format!(
                    "string operator on '{}' which is {}",
                    path,
                    other.name()
                ))),
            },
            Predicate::In { path, values, .. } => {
                let t = self.field_type(path)?;
                values.iter().try_for_each(|v| self.check_literal(path, t, v))
            }
            Predicate::Between { path, low, high } => {
                let t = self.field_type(path)?;
                if t == ScalarType::Boolean || *low == Literal::Null || *high == Literal::Null {
                    return Err(self.err(format!("invalid range on '{}'", path)));
                }
                self.check_literal(path, t, low)?;
                self.check_literal(path, t, high)
            }
            Predicate::IsNull { path, .. } => self.field_type(path).map(|_| ()),
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().try_for_each(|i| self.check_predicate(i))
            }
            Predicate::Not(inner) => self.check_predicate(inner),
        }
    }

    fn check_literal(&self, path: &FieldPath, t: ScalarType, value: &Literal) -> Result<(), AppError> {
        let ok = match (t, value) {
            (_, Literal::Null) => true,
            (ScalarType::String, Literal::Str(_)) => true,
            (ScalarType::Integer, Literal::Int(_)) => true,
            (ScalarType::Decimal, Literal::Int(_) | Literal::Float(_)) => true,
            (ScalarType::Boolean, Literal::Bool(_)) => true,
            (ScalarType::Date, Literal::Str(s)) => is_date(s),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.err(format!(
                "field '{}' is {} but got {} literal",
                path,
                t.name(),
                value.kind()
            )))
        }
    }
}

/// ISO date, ISO local date-time or RFC 3339 timestamp.
fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::metamodel::QueryMetamodel;
    use crate::search::SortDirection;

    fn registry() -> MetamodelRegistry {
        let mut r = MetamodelRegistry::new();
        r.register(
            QueryMetamodel::new("Widget")
                .with_field("name", ScalarType::String)
                .with_field("size", ScalarType::Integer)
                .with_field("price", ScalarType::Decimal)
                .with_field("active", ScalarType::Boolean)
                .with_field("madeOn", ScalarType::Date)
                .with_field("home.city", ScalarType::String),
        );
        r
    }

    #[test]
    fn compiles_valid_predicate_and_order() {
        let r = registry();
        let c = QueryCompiler::bind(&r, "Widget", "widget").unwrap();
        let p = c
            .predicate(Some("widget.size.gt(2).and(widget.price.loe(3), widget.madeOn.after('2024-01-01'))"))
            .unwrap();
        assert!(p.is_some());
        let o = c.order(Some("widget.home.city.desc()")).unwrap();
        assert_eq!(o[0].direction, SortDirection::Desc);
        assert!(c.predicate(Some("  ")).unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_field_and_bad_literals() {
        let r = registry();
        let c = QueryCompiler::bind(&r, "Widget", "widget").unwrap();
        for bad in [
            "widget.weight.eq(1)",
            "widget.size.eq('big')",
            "widget.active.gt(true)",
            "widget.size.contains('1')",
            "widget.madeOn.eq('yesterday')",
            "widget.size.gt(null)",
        ] {
            let err = c.predicate(Some(bad)).unwrap_err();
            assert!(matches!(err, AppError::Compile { ref type_name, .. } if type_name == "Widget"), "{}", bad);
        }
    }

    #[test]
    fn missing_metamodel_suggests_declaring_model() {
        let err = QueryCompiler::bind(&registry(), "Gadget", "gadget").err().unwrap();
        assert!(err.to_string().contains("declare the model"));
    }

    #[test]
    fn sort_keys_accept_bare_or_bound_fields() {
        let r = registry();
        let c = QueryCompiler::bind(&r, "Widget", "widget").unwrap();
        let keys = vec![
            SortKey { property: "size".into(), direction: SortDirection::Desc },
            SortKey { property: "widget.home.city".into(), direction: SortDirection::Asc },
        ];
        let order = c.sort_keys(&keys).unwrap();
        assert_eq!(order[1].path.dotted(), "home.city");
        assert!(c.field("weight").is_err());
    }
}
