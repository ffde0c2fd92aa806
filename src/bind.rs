//! Convert serde_json::Value bind arguments to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    PgBindValue::F64(f)
                } else {
                    // u64 beyond i64::MAX
                    PgBindValue::String(n.to_string())
                }
            }
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => return None,
            PgBindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            PgBindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            PgBindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
            PgBindValue::Json(_) => PgTypeInfo::with_name("JSONB"),
        })
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
    use serde_json::json;

    #[test]
    fn json_values_map_to_bind_values() {
        assert_eq!(PgBindValue::from_json(&json!(null)), PgBindValue::Null);
        assert_eq!(PgBindValue::from_json(&json!(7)), PgBindValue::I64(7));
        assert_eq!(PgBindValue::from_json(&json!(45.5)), PgBindValue::F64(45.5));
        assert_eq!(PgBindValue::from_json(&json!("plano")), PgBindValue::String("plano".into()));
        assert!(matches!(PgBindValue::from_json(&json!({"a": 1})), PgBindValue::Json(_)));
    }

    #[test]
    fn oversized_unsigned_binds_as_text() {
        assert_eq!(
            PgBindValue::from_json(&json!(u64::MAX)),
            PgBindValue::String(u64::MAX.to_string())
        );
    }

    fn bound_type(v: &PgBindValue) -> Option<PgTypeInfo> {
        <PgBindValue as Encode<'_, Postgres>>::produces(v)
    }

    #[test]
    fn typed_values_declare_their_wire_type() {
        assert_eq!(bound_type(&PgBindValue::Bool(true)), Some(PgTypeInfo::with_name("BOOL")));
        assert_eq!(bound_type(&PgBindValue::I64(1)), Some(PgTypeInfo::with_name("INT8")));
        assert_eq!(bound_type(&PgBindValue::F64(0.5)), Some(PgTypeInfo::with_name("FLOAT8")));
        assert_eq!(
            bound_type(&PgBindValue::from_json(&json!({"humidity": 40}))),
            Some(PgTypeInfo::with_name("JSONB"))
        );
    }

    #[test]
    fn text_and_null_defer_to_the_declared_type() {
        assert_eq!(bound_type(&PgBindValue::Null), None);
        assert_eq!(bound_type(&PgBindValue::String("plano".into())), None);
        assert_eq!(<PgBindValue as sqlx::Type<Postgres>>::type_info(), PgTypeInfo::with_name("TEXT"));
    }
}
