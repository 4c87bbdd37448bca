use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::error::Error as StdError;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use super::jdbc::JdbcType;

type BoxError = Box<dyn StdError + Sync + Send>;

/// A driver-native bind value, produced by an extended type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Typed null; the type is `None` when it could not be inferred.
    Null(Option<JdbcType>),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlParam {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Null(_))
    }
}

/// Integers follow the server-declared parameter type, so a value bound
/// without column metadata still encodes at the width the server expects.
fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(v)?.to_sql(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

fn decimal_to_sql(v: &Decimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => {
            if !v.fract().is_zero() {
                return Err(format!("{} is not an integer", v).into());
            }
            let whole = v.to_i64().ok_or_else(|| format!("{} is out of range", v))?;
            int_to_sql(whole, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => {
            let approx = v.to_f64().ok_or_else(|| format!("{} is out of range", v))?;
            float_to_sql(approx, ty, out)
        }
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlParam::Null(_) => Ok(IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql_checked(ty, out),
            SqlParam::I16(v) => int_to_sql(i64::from(*v), ty, out),
            SqlParam::I32(v) => int_to_sql(i64::from(*v), ty, out),
            SqlParam::I64(v) => int_to_sql(*v, ty, out),
            SqlParam::F32(v) => float_to_sql(f64::from(*v), ty, out),
            SqlParam::F64(v) => float_to_sql(*v, ty, out),
            SqlParam::Decimal(v) => decimal_to_sql(v, ty, out),
            SqlParam::Text(v) => v.to_sql_checked(ty, out),
            SqlParam::Bytes(v) => v.to_sql_checked(ty, out),
            SqlParam::Date(v) => v.to_sql_checked(ty, out),
            SqlParam::Time(v) => v.to_sql_checked(ty, out),
            SqlParam::Timestamp(v) => v.to_sql_checked(ty, out),
            SqlParam::TimestampTz(v) => v.to_sql_checked(ty, out),
            SqlParam::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
