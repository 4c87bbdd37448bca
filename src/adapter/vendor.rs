use std::fmt;

use crate::map::DbEntity;
use crate::types::{ExtendedTypeMap, JdbcType};

use super::DbAdapter;

/// Database products with a built-in adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Oracle,
    Sybase,
    SqlServer,
    Db2,
    Hsqldb,
    MySql,
    Postgres,
    OpenBase,
}

impl Dialect {
    pub const ALL: [Dialect; 8] = [
        Dialect::Oracle,
        Dialect::Sybase,
        Dialect::SqlServer,
        Dialect::Db2,
        Dialect::Hsqldb,
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::OpenBase,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Oracle => "Oracle",
            Dialect::Sybase => "Sybase",
            Dialect::SqlServer => "SQL Server",
            Dialect::Db2 => "DB2",
            Dialect::Hsqldb => "HSQLDB",
            Dialect::MySql => "MySQL",
            Dialect::Postgres => "PostgreSQL",
            Dialect::OpenBase => "OpenBase",
        }
    }

    /// Parse a configured adapter name. Accepts the display name and a few
    /// common short forms, case-insensitively.
    pub fn from_name(name: &str) -> Option<Dialect> {
        match name.to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "oracle" => Some(Dialect::Oracle),
            "sybase" => Some(Dialect::Sybase),
            "sqlserver" | "mssql" => Some(Dialect::SqlServer),
            "db2" => Some(Dialect::Db2),
            "hsqldb" | "hsql" => Some(Dialect::Hsqldb),
            "mysql" => Some(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "openbase" => Some(Dialect::OpenBase),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A vendor adapter: the generic contract with per-product capability
/// flags, type names and clause syntax.
pub struct VendorAdapter {
    dialect: Dialect,
    extended_types: ExtendedTypeMap,
}

impl VendorAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            extended_types: ExtendedTypeMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn extended_types_mut(&mut self) -> &mut ExtendedTypeMap {
        &mut self.extended_types
    }
}

/// Insert `TOP n` after the leading `SELECT` / `SELECT DISTINCT`.
fn top_clause(sql: String, limit: usize) -> String {
    for prefix in ["SELECT DISTINCT ", "SELECT "] {
        if let Some(rest) = sql.strip_prefix(prefix) {
            return format!("{}TOP {} {}", prefix, limit, rest);
        }
    }
    sql
}

impl DbAdapter for VendorAdapter {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn supports_batch_updates(&self) -> bool {
        !matches!(self.dialect, Dialect::OpenBase)
    }

    fn supports_fk_constraints(&self) -> bool {
        !matches!(self.dialect, Dialect::MySql | Dialect::OpenBase)
    }

    fn parameter_placeholder(&self, position: usize) -> String {
        match self.dialect {
            Dialect::Postgres => format!("${}", position),
            _ => "?".to_string(),
        }
    }

    fn limit_sql(&self, sql: String, limit: usize) -> String {
        match self.dialect {
            Dialect::Postgres | Dialect::MySql | Dialect::Hsqldb => {
                format!("{} LIMIT {}", sql, limit)
            }
            Dialect::Oracle => format!("SELECT * FROM ({}) WHERE ROWNUM <= {}", sql, limit),
            Dialect::SqlServer | Dialect::Sybase => top_clause(sql, limit),
            Dialect::Db2 => format!("{} FETCH FIRST {} ROWS ONLY", sql, limit),
            Dialect::OpenBase => sql,
        }
    }

    fn procedure_call_sql(&self, name: &str, params: usize, returns_rows: bool) -> String {
        let placeholders: Vec<String> = (1..=params)
            .map(|i| self.parameter_placeholder(i))
            .collect();
        let args = placeholders.join(", ");
        match self.dialect {
            Dialect::Postgres if returns_rows => format!("SELECT * FROM {}({})", name, args),
            Dialect::Postgres | Dialect::MySql => format!("CALL {}({})", name, args),
            Dialect::SqlServer | Dialect::Sybase => format!("EXEC {} {}", name, args)
                .trim_end()
                .to_string(),
            _ => format!("{{call {}({})}}", name, args),
        }
    }

    fn external_type(&self, jdbc_type: JdbcType) -> &str {
        use JdbcType as T;
        match (self.dialect, jdbc_type) {
            (Dialect::Postgres, T::Double) => "DOUBLE PRECISION",
            (Dialect::Postgres, T::Float) => "FLOAT8",
            (Dialect::Postgres, T::LongVarChar | T::Clob) => "TEXT",
            (Dialect::Postgres, T::Binary | T::VarBinary | T::LongVarBinary | T::Blob) => "BYTEA",
            (Dialect::Postgres, T::TinyInt) => "SMALLINT",
            (Dialect::Postgres, T::Bit) => "BOOLEAN",
            (Dialect::Postgres, T::Other) => "JSONB",

            (Dialect::Oracle, T::VarChar) => "VARCHAR2",
            (Dialect::Oracle, T::BigInt | T::Integer | T::SmallInt | T::TinyInt | T::Bit) => {
                "NUMBER"
            }
            (Dialect::Oracle, T::Decimal | T::Numeric) => "NUMBER",
            (Dialect::Oracle, T::Double | T::Float) => "FLOAT",
            (Dialect::Oracle, T::Boolean) => "NUMBER(1)",
            (Dialect::Oracle, T::LongVarChar) => "CLOB",
            (Dialect::Oracle, T::Binary | T::VarBinary) => "RAW",
            (Dialect::Oracle, T::LongVarBinary) => "BLOB",
            (Dialect::Oracle, T::Time) => "DATE",

            (Dialect::MySql, T::LongVarChar | T::Clob) => "LONGTEXT",
            (Dialect::MySql, T::LongVarBinary | T::Blob) => "LONGBLOB",
            (Dialect::MySql, T::Timestamp) => "DATETIME",
            (Dialect::MySql, T::Boolean) => "BIT",

            (Dialect::SqlServer | Dialect::Sybase, T::Boolean) => "BIT",
            (Dialect::SqlServer | Dialect::Sybase, T::Double) => "FLOAT",
            (Dialect::SqlServer | Dialect::Sybase, T::LongVarChar | T::Clob) => "TEXT",
            (Dialect::SqlServer | Dialect::Sybase, T::LongVarBinary | T::Blob) => "IMAGE",
            (Dialect::SqlServer | Dialect::Sybase, T::Timestamp | T::Date | T::Time) => "DATETIME",

            (Dialect::Db2, T::Boolean | T::Bit) => "SMALLINT",
            (Dialect::Db2, T::LongVarChar) => "CLOB",
            (Dialect::Db2, T::LongVarBinary) => "BLOB",
            (Dialect::Db2, T::Binary) => "CHAR FOR BIT DATA",
            (Dialect::Db2, T::VarBinary) => "VARCHAR FOR BIT DATA",

            (Dialect::Hsqldb, T::Blob) => "LONGVARBINARY",
            (Dialect::Hsqldb, T::Clob) => "LONGVARCHAR",

            (Dialect::OpenBase, T::BigInt) => "LONGLONG",
            (Dialect::OpenBase, T::VarChar | T::LongVarChar | T::Clob) => "CHAR",
            (Dialect::OpenBase, T::Timestamp) => "DATETIME",
            (Dialect::OpenBase, T::Boolean | T::Bit) => "BOOLEAN",
            (Dialect::OpenBase, T::LongVarBinary | T::Blob | T::VarBinary) => "OBJECT",

            _ => jdbc_type.name(),
        }
    }

    fn drop_table_sql(&self, entity: &DbEntity) -> String {
        let name = entity.fully_qualified_name();
        match self.dialect {
            Dialect::Postgres => format!("DROP TABLE {} CASCADE", name),
            Dialect::Oracle => format!("DROP TABLE {} CASCADE CONSTRAINTS", name),
            _ => format!("DROP TABLE {}", name),
        }
    }

    fn extended_types(&self) -> &ExtendedTypeMap {
        &self.extended_types
    }
}
