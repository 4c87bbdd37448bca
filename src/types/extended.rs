//! Extended types convert runtime values into driver-native bind values.
//!
//! Each converter is registered under the runtime class ([`ValueKind`]) it
//! handles. Binding looks the converter up by the value's kind and passes it
//! the target column's SQL type and precision, so values that have no direct
//! driver representation for that column (a boolean stored in an INTEGER
//! column, a timestamp stored in a DATE column) still serialize correctly.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{CayenneError, CayenneResult};

use super::jdbc::JdbcType;
use super::param::SqlParam;
use super::value::{Value, ValueKind};

pub trait ExtendedType: Send + Sync {
    /// Name used in logs and registry listings.
    fn name(&self) -> &str;

    /// Convert a non-null value for a column of the given type.
    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam>;
}

/// Straight one-to-one conversion, used for kinds with no registered type.
pub struct DefaultType;

impl ExtendedType for DefaultType {
    fn name(&self) -> &str {
        "default"
    }

    fn to_param(
        &self,
        value: &Value,
        _jdbc_type: Option<JdbcType>,
        _precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        Ok(match value {
            Value::Null => SqlParam::Null(None),
            Value::Bool(v) => SqlParam::Bool(*v),
            Value::Short(v) => SqlParam::I16(*v),
            Value::Int(v) => SqlParam::I32(*v),
            Value::Long(v) => SqlParam::I64(*v),
            Value::Float(v) => SqlParam::F32(*v),
            Value::Double(v) => SqlParam::F64(*v),
            Value::Decimal(v) => SqlParam::Decimal(*v),
            Value::Char(c) => SqlParam::Text(c.to_string()),
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::Bytes(b) => SqlParam::Bytes(b.clone()),
            Value::Date(d) => SqlParam::Date(*d),
            Value::Time(t) => SqlParam::Time(*t),
            Value::Timestamp(ts) => SqlParam::Timestamp(*ts),
            Value::TimestampTz(ts) => SqlParam::TimestampTz(*ts),
            Value::Json(j) => SqlParam::Json(j.clone()),
        })
    }
}

/// Booleans in numeric or character columns.
pub struct BooleanType;

impl ExtendedType for BooleanType {
    fn name(&self) -> &str {
        "boolean"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        let Value::Bool(b) = value else {
            return DefaultType.to_param(value, jdbc_type, precision);
        };
        Ok(match jdbc_type {
            Some(JdbcType::TinyInt | JdbcType::SmallInt) => SqlParam::I16(i16::from(*b)),
            Some(JdbcType::Integer) => SqlParam::I32(i32::from(*b)),
            Some(JdbcType::BigInt | JdbcType::Numeric | JdbcType::Decimal) => {
                SqlParam::I64(i64::from(*b))
            }
            Some(t) if t.is_character() => SqlParam::Text(if *b { "Y" } else { "N" }.to_string()),
            _ => SqlParam::Bool(*b),
        })
    }
}

/// Integer kinds resized to the column's integer width.
pub struct IntegerType;

impl ExtendedType for IntegerType {
    fn name(&self) -> &str {
        "integer"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        let Some(v) = value.as_i64() else {
            return DefaultType.to_param(value, jdbc_type, precision);
        };
        let out_of_range = |target: JdbcType| {
            CayenneError::Expression(format!("value {} does not fit a {} column", v, target))
        };
        Ok(match jdbc_type {
            Some(t @ (JdbcType::TinyInt | JdbcType::SmallInt)) => {
                SqlParam::I16(i16::try_from(v).map_err(|_| out_of_range(t))?)
            }
            Some(JdbcType::Integer) => {
                SqlParam::I32(i32::try_from(v).map_err(|_| out_of_range(JdbcType::Integer))?)
            }
            Some(JdbcType::BigInt) => SqlParam::I64(v),
            Some(JdbcType::Real) => SqlParam::F32(v as f32),
            Some(JdbcType::Float | JdbcType::Double) => SqlParam::F64(v as f64),
            Some(JdbcType::Decimal | JdbcType::Numeric) => SqlParam::Decimal(Decimal::from(v)),
            Some(t) if t.is_character() => SqlParam::Text(v.to_string()),
            _ => DefaultType.to_param(value, jdbc_type, precision)?,
        })
    }
}

/// Floating point and decimal values. DECIMAL and NUMERIC columns get an
/// exact decimal, floating point columns get a double.
pub struct NumericType;

impl ExtendedType for NumericType {
    fn name(&self) -> &str {
        "numeric"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        let not_representable = |column: JdbcType| {
            CayenneError::Expression(format!("value {} does not fit a {} column", value, column))
        };
        match (value, jdbc_type) {
            (Value::Float(f), Some(t @ (JdbcType::Decimal | JdbcType::Numeric))) => {
                Decimal::try_from(*f)
                    .map(SqlParam::Decimal)
                    .map_err(|_| not_representable(t))
            }
            (Value::Double(v), Some(t @ (JdbcType::Decimal | JdbcType::Numeric))) => {
                Decimal::try_from(*v)
                    .map(SqlParam::Decimal)
                    .map_err(|_| not_representable(t))
            }
            (Value::Decimal(d), Some(t @ (JdbcType::Real | JdbcType::Float | JdbcType::Double))) => d
                .to_f64()
                .map(SqlParam::F64)
                .ok_or_else(|| not_representable(t)),
            _ => DefaultType.to_param(value, jdbc_type, precision),
        }
    }
}

/// Characters and strings, bound as text at full length. Fixed-width
/// columns enforce their own length on the server.
pub struct CharType;

impl ExtendedType for CharType {
    fn name(&self) -> &str {
        "char"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        match value {
            Value::Char(c) => Ok(SqlParam::Text(c.to_string())),
            Value::String(s) => Ok(SqlParam::Text(s.clone())),
            other => DefaultType.to_param(other, jdbc_type, precision),
        }
    }
}

/// Date/time values narrowed or widened to the column's temporal type.
pub struct DateTimeType;

impl ExtendedType for DateTimeType {
    fn name(&self) -> &str {
        "datetime"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        let timestamp = match value {
            Value::Timestamp(ts) => *ts,
            Value::TimestampTz(ts) => ts.naive_utc(),
            Value::Date(d) => match jdbc_type {
                Some(JdbcType::Timestamp) => d.and_time(chrono::NaiveTime::MIN),
                _ => return Ok(SqlParam::Date(*d)),
            },
            other => return DefaultType.to_param(other, jdbc_type, precision),
        };
        Ok(match jdbc_type {
            Some(JdbcType::Date) => SqlParam::Date(timestamp.date()),
            Some(JdbcType::Time) => SqlParam::Time(timestamp.time()),
            Some(JdbcType::Timestamp) => SqlParam::Timestamp(timestamp),
            _ => DefaultType.to_param(value, jdbc_type, precision)?,
        })
    }
}

/// JSON documents stored in character columns are serialized to text.
pub struct JsonType;

impl ExtendedType for JsonType {
    fn name(&self) -> &str {
        "json"
    }

    fn to_param(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        match (value, jdbc_type) {
            (Value::Json(j), Some(t)) if t.is_character() => Ok(SqlParam::Text(j.to_string())),
            _ => DefaultType.to_param(value, jdbc_type, precision),
        }
    }
}

/// Registry of extended types keyed by runtime class.
#[derive(Clone)]
pub struct ExtendedTypeMap {
    types: HashMap<ValueKind, Arc<dyn ExtendedType>>,
    default_type: Arc<dyn ExtendedType>,
}

impl Default for ExtendedTypeMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.register(ValueKind::Bool, Arc::new(BooleanType));
        let integer: Arc<dyn ExtendedType> = Arc::new(IntegerType);
        for kind in [ValueKind::Short, ValueKind::Int, ValueKind::Long] {
            map.register(kind, integer.clone());
        }
        let chars: Arc<dyn ExtendedType> = Arc::new(CharType);
        let numeric: Arc<dyn ExtendedType> = Arc::new(NumericType);
        for kind in [ValueKind::Float, ValueKind::Double, ValueKind::Decimal] {
            map.register(kind, numeric.clone());
        }
        map.register(ValueKind::Char, chars.clone());
        map.register(ValueKind::String, chars);
        let dates: Arc<dyn ExtendedType> = Arc::new(DateTimeType);
        for kind in [ValueKind::Date, ValueKind::Timestamp, ValueKind::TimestampTz] {
            map.register(kind, dates.clone());
        }
        map.register(ValueKind::Json, Arc::new(JsonType));
        map
    }
}

impl ExtendedTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry where every kind falls through to [`DefaultType`].
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
            default_type: Arc::new(DefaultType),
        }
    }

    pub fn register(&mut self, kind: ValueKind, ty: Arc<dyn ExtendedType>) {
        self.types.insert(kind, ty);
    }

    pub fn unregister(&mut self, kind: ValueKind) {
        self.types.remove(&kind);
    }

    pub fn get(&self, kind: ValueKind) -> &dyn ExtendedType {
        self.types
            .get(&kind)
            .map(|t| t.as_ref())
            .unwrap_or_else(|| self.default_type.as_ref())
    }

    /// Convert a value for binding. Nulls become typed nulls without
    /// consulting any converter.
    pub fn bind(
        &self,
        value: &Value,
        jdbc_type: Option<JdbcType>,
        precision: Option<u32>,
    ) -> CayenneResult<SqlParam> {
        match value.kind() {
            None => Ok(SqlParam::Null(jdbc_type)),
            Some(kind) => self.get(kind).to_param(value, jdbc_type, precision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_null_binds_as_typed_null() {
        let map = ExtendedTypeMap::new();
        let p = map.bind(&Value::Null, Some(JdbcType::Integer), None).unwrap();
        assert_eq!(p, SqlParam::Null(Some(JdbcType::Integer)));
    }

    #[test]
    fn test_boolean_into_integer_column() {
        let map = ExtendedTypeMap::new();
        let p = map.bind(&Value::Bool(true), Some(JdbcType::Integer), None).unwrap();
        assert_eq!(p, SqlParam::I32(1));
        let p = map.bind(&Value::Bool(false), Some(JdbcType::Char), Some(1)).unwrap();
        assert_eq!(p, SqlParam::Text("N".into()));
    }

    #[test]
    fn test_integer_resized_to_column() {
        let map = ExtendedTypeMap::new();
        let p = map.bind(&Value::Int(5), Some(JdbcType::BigInt), None).unwrap();
        assert_eq!(p, SqlParam::I64(5));
        let err = map.bind(&Value::Long(1 << 40), Some(JdbcType::Integer), None);
        assert!(err.is_err());
    }

    #[test]
    fn test_over_length_string_is_not_cut() {
        let map = ExtendedTypeMap::new();
        let long = "A".repeat(300);
        let p = map
            .bind(&Value::from(long.as_str()), Some(JdbcType::Char), Some(254))
            .unwrap();
        assert_eq!(p, SqlParam::Text(long));
        let p = map.bind(&Value::Char('x'), None, None).unwrap();
        assert_eq!(p, SqlParam::Text("x".into()));
    }

    #[test]
    fn test_numbers_into_decimal_column() {
        let map = ExtendedTypeMap::new();
        let p = map.bind(&Value::Long(100), Some(JdbcType::Decimal), None).unwrap();
        assert_eq!(p, SqlParam::Decimal(Decimal::from(100)));
        let p = map.bind(&Value::Double(2.5), Some(JdbcType::Numeric), None).unwrap();
        assert_eq!(p, SqlParam::Decimal(Decimal::new(25, 1)));
        assert!(map.bind(&Value::Double(f64::NAN), Some(JdbcType::Decimal), None).is_err());

        let price = Value::Decimal(Decimal::new(25, 1));
        assert_eq!(
            map.bind(&price, Some(JdbcType::Double), None).unwrap(),
            SqlParam::F64(2.5)
        );
        assert_eq!(map.bind(&price, None, None).unwrap(), SqlParam::Decimal(Decimal::new(25, 1)));
    }

    #[test]
    fn test_timestamp_into_date_column() {
        let map = ExtendedTypeMap::new();
        let ts = NaiveDate::from_ymd_opt(2003, 4, 5)
            .unwrap()
            .and_hms_opt(10, 11, 12)
            .unwrap();
        let p = map.bind(&Value::Timestamp(ts), Some(JdbcType::Date), None).unwrap();
        assert_eq!(p, SqlParam::Date(ts.date()));
    }

    #[test]
    fn test_custom_type_overrides_registration() {
        struct Upper;
        impl ExtendedType for Upper {
            fn name(&self) -> &str {
                "upper"
            }
            fn to_param(
                &self,
                value: &Value,
                _: Option<JdbcType>,
                _: Option<u32>,
            ) -> CayenneResult<SqlParam> {
                Ok(SqlParam::Text(value.to_string().to_uppercase()))
            }
        }

        let mut map = ExtendedTypeMap::new();
        map.register(ValueKind::String, Arc::new(Upper));
        assert_eq!(map.get(ValueKind::String).name(), "upper");
        let p = map.bind(&Value::from("abc"), None, None).unwrap();
        assert_eq!(p, SqlParam::Text("ABC".into()));

        map.unregister(ValueKind::String);
        assert_eq!(map.get(ValueKind::String).name(), "default");
    }
}
