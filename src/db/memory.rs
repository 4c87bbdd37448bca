/// In-memory `DataSource` that records every statement and answers from a
/// caller-supplied handler. Used by the test suites and by the CLI's
/// dry-run mode.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{CayenneError, CayenneResult};
use crate::types::{JdbcType, SqlParam, Value};

use super::driver::{
    ColumnDescriptor, DataRow, DataSource, DatabaseMetadata, DbConnection, ResultSet,
};

/// What the handler answers for a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Rows {
        columns: Vec<(String, JdbcType)>,
        rows: Vec<Vec<Value>>,
    },
    Count(u64),
    Error(String),
}

impl Reply {
    /// A single-column result.
    pub fn column(name: &str, jdbc_type: JdbcType, values: Vec<Value>) -> Reply {
        Reply::Rows {
            columns: vec![(name.to_string(), jdbc_type)],
            rows: values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

type Handler = Box<dyn FnMut(&str, &[SqlParam]) -> Option<Reply> + Send>;

struct MemoryState {
    metadata: DatabaseMetadata,
    handler: Option<Handler>,
    statements: Vec<RecordedStatement>,
    /// BEGIN / COMMIT / ROLLBACK, in order.
    transactions: Vec<&'static str>,
    tables: HashSet<String>,
    connections: usize,
    fail_connect: bool,
}

#[derive(Clone)]
pub struct MemoryDataSource {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDataSource {
    pub fn new(metadata: DatabaseMetadata) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                metadata,
                handler: None,
                statements: Vec::new(),
                transactions: Vec::new(),
                tables: HashSet::new(),
                connections: 0,
                fail_connect: false,
            })),
        }
    }

    /// A source reporting the given product name.
    pub fn product(name: &str) -> Self {
        Self::new(DatabaseMetadata {
            product_name: name.to_string(),
            product_version: "1.0".to_string(),
            driver_name: "memory".to_string(),
            url: "memory:".to_string(),
        })
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // a panicking test holding the lock must not hide the other failures
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install the statement handler. Returning `None` gives the default
    /// answer: an empty result or a zero count.
    pub fn on_statement<F>(&self, handler: F)
    where
        F: FnMut(&str, &[SqlParam]) -> Option<Reply> + Send + 'static,
    {
        self.state().handler = Some(Box::new(handler));
    }

    pub fn add_table(&self, table: &str) {
        self.state().tables.insert(table.to_uppercase());
    }

    /// Make every later `connection()` call fail.
    pub fn fail_connections(&self) {
        self.state().fail_connect = true;
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state().statements.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.state().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn transactions(&self) -> Vec<&'static str> {
        self.state().transactions.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.state().connections
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.statements.clear();
        state.transactions.clear();
    }
}

impl DataSource for MemoryDataSource {
    type Connection = MemoryConnection;

    async fn connection(&self) -> CayenneResult<MemoryConnection> {
        let mut state = self.state();
        if state.fail_connect {
            return Err(CayenneError::Driver("connection refused".to_string()));
        }
        state.connections += 1;
        Ok(MemoryConnection {
            source: self.clone(),
        })
    }
}

pub struct MemoryConnection {
    source: MemoryDataSource,
}

impl MemoryConnection {
    fn answer(&self, sql: &str, params: &[SqlParam]) -> Option<Reply> {
        debug!(sql, ?params, "memory statement");
        let mut state = self.source.state();
        state.statements.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        state.handler.as_mut().and_then(|h| h(sql, params))
    }
}

impl DbConnection for MemoryConnection {
    async fn metadata(&mut self) -> CayenneResult<DatabaseMetadata> {
        Ok(self.source.state().metadata.clone())
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
        columns: Option<&[ColumnDescriptor]>,
    ) -> CayenneResult<ResultSet> {
        // suspend like a network round-trip so concurrent callers interleave
        tokio::task::yield_now().await;
        let (reply_columns, reply_rows) = match self.answer(sql, params) {
            Some(Reply::Rows { columns, rows }) => (columns, rows),
            Some(Reply::Error(msg)) => return Err(CayenneError::Driver(msg)),
            Some(Reply::Count(_)) | None => (Vec::new(), Vec::new()),
        };

        let descriptors: Vec<ColumnDescriptor> = match columns {
            Some(given) => given.to_vec(),
            None => reply_columns
                .iter()
                .enumerate()
                .map(|(i, (label, ty))| ColumnDescriptor::from_label(i, label, *ty))
                .collect(),
        };

        let rows = reply_rows
            .into_iter()
            .map(|values| {
                let mut row = DataRow::new();
                for (descriptor, value) in descriptors.iter().zip(values) {
                    row.push(descriptor.name.clone(), value);
                }
                row
            })
            .collect();

        Ok(ResultSet {
            columns: descriptors,
            rows,
        })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CayenneResult<u64> {
        match self.answer(sql, params) {
            Some(Reply::Count(n)) => Ok(n),
            Some(Reply::Rows { rows, .. }) => Ok(rows.len() as u64),
            Some(Reply::Error(msg)) => Err(CayenneError::Driver(msg)),
            None => Ok(0),
        }
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<SqlParam>]) -> CayenneResult<Vec<u64>> {
        let mut counts = Vec::with_capacity(rows.len());
        for params in rows {
            counts.push(self.execute(sql, params).await?);
        }
        Ok(counts)
    }

    async fn begin(&mut self) -> CayenneResult<()> {
        self.source.state().transactions.push("BEGIN");
        Ok(())
    }

    async fn commit(&mut self) -> CayenneResult<()> {
        self.source.state().transactions.push("COMMIT");
        Ok(())
    }

    async fn rollback(&mut self) -> CayenneResult<()> {
        self.source.state().transactions.push("ROLLBACK");
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> CayenneResult<bool> {
        Ok(self.source.state().tables.contains(&table.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_answers() {
        let ds = MemoryDataSource::product("PostgreSQL");
        ds.on_statement(|sql, _| {
            sql.starts_with("SELECT")
                .then(|| Reply::column("", JdbcType::Integer, vec![Value::Int(7)]))
        });

        let mut conn = ds.connection().await.unwrap();
        let rs = conn.query("SELECT 7", &[], None).await.unwrap();
        assert_eq!(rs.columns[0].name, "column_1");
        assert_eq!(rs.rows[0].get("column_1"), Some(&Value::Int(7)));

        assert_eq!(conn.execute("DELETE FROM X", &[]).await.unwrap(), 0);
        assert_eq!(ds.sql_log(), vec!["SELECT 7", "DELETE FROM X"]);
        assert_eq!(ds.connections_opened(), 1);
    }

    #[tokio::test]
    async fn test_error_reply_surfaces_as_driver_error() {
        let ds = MemoryDataSource::product("PostgreSQL");
        ds.on_statement(|_, _| Some(Reply::Error("boom".into())));
        let mut conn = ds.connection().await.unwrap();
        let err = conn.execute("UPDATE X SET A = 1", &[]).await.unwrap_err();
        assert!(matches!(err, CayenneError::Driver(ref m) if m == "boom"));
    }
}
