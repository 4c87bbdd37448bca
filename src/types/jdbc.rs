//! SQL type codes, the `java.sql.Types` table every adapter maps from.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::types::Type;

use super::value::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JdbcType {
    Array,
    BigInt,
    Binary,
    Bit,
    Blob,
    Boolean,
    Char,
    Clob,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    LongVarBinary,
    LongVarChar,
    Null,
    Numeric,
    Other,
    Real,
    SmallInt,
    Time,
    Timestamp,
    TinyInt,
    VarBinary,
    VarChar,
}

const ALL: [JdbcType; 25] = [
    JdbcType::Array,
    JdbcType::BigInt,
    JdbcType::Binary,
    JdbcType::Bit,
    JdbcType::Blob,
    JdbcType::Boolean,
    JdbcType::Char,
    JdbcType::Clob,
    JdbcType::Date,
    JdbcType::Decimal,
    JdbcType::Double,
    JdbcType::Float,
    JdbcType::Integer,
    JdbcType::LongVarBinary,
    JdbcType::LongVarChar,
    JdbcType::Null,
    JdbcType::Numeric,
    JdbcType::Other,
    JdbcType::Real,
    JdbcType::SmallInt,
    JdbcType::Time,
    JdbcType::Timestamp,
    JdbcType::TinyInt,
    JdbcType::VarBinary,
    JdbcType::VarChar,
];

impl JdbcType {
    /// Numeric code as defined by `java.sql.Types`.
    pub fn code(self) -> i32 {
        match self {
            JdbcType::Array => 2003,
            JdbcType::BigInt => -5,
            JdbcType::Binary => -2,
            JdbcType::Bit => -7,
            JdbcType::Blob => 2004,
            JdbcType::Boolean => 16,
            JdbcType::Char => 1,
            JdbcType::Clob => 2005,
            JdbcType::Date => 91,
            JdbcType::Decimal => 3,
            JdbcType::Double => 8,
            JdbcType::Float => 6,
            JdbcType::Integer => 4,
            JdbcType::LongVarBinary => -4,
            JdbcType::LongVarChar => -1,
            JdbcType::Null => 0,
            JdbcType::Numeric => 2,
            JdbcType::Other => 1111,
            JdbcType::Real => 7,
            JdbcType::SmallInt => 5,
            JdbcType::Time => 92,
            JdbcType::Timestamp => 93,
            JdbcType::TinyInt => -6,
            JdbcType::VarBinary => -3,
            JdbcType::VarChar => 12,
        }
    }

    pub fn from_code(code: i32) -> Option<JdbcType> {
        ALL.iter().copied().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            JdbcType::Array => "ARRAY",
            JdbcType::BigInt => "BIGINT",
            JdbcType::Binary => "BINARY",
            JdbcType::Bit => "BIT",
            JdbcType::Blob => "BLOB",
            JdbcType::Boolean => "BOOLEAN",
            JdbcType::Char => "CHAR",
            JdbcType::Clob => "CLOB",
            JdbcType::Date => "DATE",
            JdbcType::Decimal => "DECIMAL",
            JdbcType::Double => "DOUBLE",
            JdbcType::Float => "FLOAT",
            JdbcType::Integer => "INTEGER",
            JdbcType::LongVarBinary => "LONGVARBINARY",
            JdbcType::LongVarChar => "LONGVARCHAR",
            JdbcType::Null => "NULL",
            JdbcType::Numeric => "NUMERIC",
            JdbcType::Other => "OTHER",
            JdbcType::Real => "REAL",
            JdbcType::SmallInt => "SMALLINT",
            JdbcType::Time => "TIME",
            JdbcType::Timestamp => "TIMESTAMP",
            JdbcType::TinyInt => "TINYINT",
            JdbcType::VarBinary => "VARBINARY",
            JdbcType::VarChar => "VARCHAR",
        }
    }

    pub fn from_name(name: &str) -> Option<JdbcType> {
        ALL.iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// The value kind a column of this type materializes to when no
    /// object attribute declares one.
    pub fn default_value_kind(self) -> ValueKind {
        match self {
            JdbcType::Bit | JdbcType::Boolean => ValueKind::Bool,
            JdbcType::TinyInt | JdbcType::SmallInt => ValueKind::Short,
            JdbcType::Integer => ValueKind::Int,
            JdbcType::BigInt => ValueKind::Long,
            JdbcType::Real => ValueKind::Float,
            JdbcType::Float | JdbcType::Double => ValueKind::Double,
            JdbcType::Decimal | JdbcType::Numeric => ValueKind::Decimal,
            JdbcType::Binary | JdbcType::VarBinary | JdbcType::LongVarBinary | JdbcType::Blob => {
                ValueKind::Bytes
            }
            JdbcType::Date => ValueKind::Date,
            JdbcType::Time => ValueKind::Time,
            JdbcType::Timestamp => ValueKind::Timestamp,
            JdbcType::Other => ValueKind::Json,
            JdbcType::Char
            | JdbcType::VarChar
            | JdbcType::LongVarChar
            | JdbcType::Clob
            | JdbcType::Array
            | JdbcType::Null => ValueKind::String,
        }
    }

    pub fn is_character(self) -> bool {
        matches!(
            self,
            JdbcType::Char | JdbcType::VarChar | JdbcType::LongVarChar | JdbcType::Clob
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            JdbcType::TinyInt | JdbcType::SmallInt | JdbcType::Integer | JdbcType::BigInt
        )
    }

    /// Types whose DDL declaration takes a length.
    pub fn supports_length(self) -> bool {
        matches!(
            self,
            JdbcType::Char
                | JdbcType::VarChar
                | JdbcType::Binary
                | JdbcType::VarBinary
                | JdbcType::Decimal
                | JdbcType::Numeric
        )
    }

    /// Map a PostgreSQL wire type to the closest SQL type code.
    pub fn from_pg_type(ty: &Type) -> JdbcType {
        match *ty {
            Type::BOOL => JdbcType::Boolean,
            Type::INT2 => JdbcType::SmallInt,
            Type::INT4 => JdbcType::Integer,
            Type::INT8 => JdbcType::BigInt,
            Type::FLOAT4 => JdbcType::Real,
            Type::FLOAT8 => JdbcType::Double,
            Type::NUMERIC => JdbcType::Numeric,
            Type::CHAR | Type::BPCHAR => JdbcType::Char,
            Type::VARCHAR | Type::NAME => JdbcType::VarChar,
            Type::TEXT => JdbcType::LongVarChar,
            Type::BYTEA => JdbcType::LongVarBinary,
            Type::DATE => JdbcType::Date,
            Type::TIME => JdbcType::Time,
            Type::TIMESTAMP | Type::TIMESTAMPTZ => JdbcType::Timestamp,
            _ => JdbcType::Other,
        }
    }
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
