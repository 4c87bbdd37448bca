//! The connection seam between the translators and a database driver.
//!
//! Everything above this module talks to `DataSource` and `DbConnection`.
//! The PostgreSQL implementation lives in `postgres.rs`; `memory.rs` has a
//! recording implementation for tests and dry runs.

use serde::{Deserialize, Serialize};

use crate::error::CayenneResult;
use crate::types::{JdbcType, SqlParam, Value, ValueKind};

/// What a connection reports about the server it talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMetadata {
    pub product_name: String,
    pub product_version: String,
    pub driver_name: String,
    pub url: String,
}

/// Name and type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub jdbc_type: JdbcType,
    pub value_kind: ValueKind,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        Self {
            name: name.into(),
            jdbc_type,
            value_kind: jdbc_type.default_value_kind(),
        }
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = kind;
        self
    }

    /// Descriptor for a column of a live result. Drivers may report an
    /// empty label for computed columns; those become `column_N`, 1-based.
    pub fn from_label(index: usize, label: &str, jdbc_type: JdbcType) -> Self {
        if label.is_empty() {
            Self::new(format!("column_{}", index + 1), jdbc_type)
        } else {
            Self::new(label, jdbc_type)
        }
    }
}

/// One fetched row: values in column order, addressable by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRow {
    values: Vec<(String, Value)>,
}

impl DataRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.values.push((column.into(), value));
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<DataRow>,
}

/// A single checked-out connection. Dropping it returns it to its pool.
#[allow(async_fn_in_trait)]
pub trait DbConnection: Send {
    async fn metadata(&mut self) -> CayenneResult<DatabaseMetadata>;

    /// Run a statement returning rows. With `columns`, rows are labelled
    /// by the descriptor instead of the driver's column labels.
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
        columns: Option<&[ColumnDescriptor]>,
    ) -> CayenneResult<ResultSet>;

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CayenneResult<u64>;

    /// Execute one statement once per parameter row; returns per-row counts.
    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<SqlParam>]) -> CayenneResult<Vec<u64>>;

    async fn begin(&mut self) -> CayenneResult<()>;

    async fn commit(&mut self) -> CayenneResult<()>;

    async fn rollback(&mut self) -> CayenneResult<()>;

    async fn table_exists(&mut self, table: &str) -> CayenneResult<bool>;
}

/// A source of connections, usually a pool.
#[allow(async_fn_in_trait)]
pub trait DataSource: Send + Sync {
    type Connection: DbConnection;

    async fn connection(&self) -> CayenneResult<Self::Connection>;
}
