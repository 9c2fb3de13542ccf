//! Convert query literals to values that sqlx can bind.

use crate::search::Literal;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound as TEXT; the SQL casts it (`::numeric`, `::boolean`, `::jsonb`, `::bigint`).
#[derive(Clone, Debug, PartialEq)]
pub struct PgBindValue(pub String);

impl PgBindValue {
    /// `None` for a null literal, which is rendered inline rather than bound.
    pub fn from_literal(v: &Literal) -> Option<Self> {
        match v {
            Literal::Null => None,
            Literal::Bool(b) => Some(PgBindValue(b.to_string())),
            Literal::Int(n) => Some(PgBindValue(n.to_string())),
            Literal::Float(f) => Some(PgBindValue(f.to_string())),
            Literal::Str(s) => Some(PgBindValue(s.clone())),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s_ref: &str = self.0.as_str();
        <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_become_text() {
        assert_eq!(PgBindValue::from_literal(&Literal::Int(3)), Some(PgBindValue("3".into())));
        assert_eq!(PgBindValue::from_literal(&Literal::Bool(true)), Some(PgBindValue("true".into())));
        assert_eq!(PgBindValue::from_literal(&Literal::Null), None);
    }
}
