//! Execution of one query on a checked-out connection.

use std::time::Instant;

use tracing::{debug, warn};

use crate::adapter::DbAdapter;
use crate::db::DbConnection;
use crate::error::{CayenneError, CayenneResult};
use crate::map::DataMap;
use crate::query::{BatchQuery, ProcedureQuery, Query, SelectQuery, SqlTemplate};
use crate::translator::{
    translate_procedure, translate_query, translate_select, translate_sql_template,
    BatchTranslator, TranslatedQuery,
};

use super::observer::OperationObserver;

/// How a batch runs: one driver batch, or one statement per row.
#[derive(Debug, Clone, Copy)]
pub struct BatchAction<'q> {
    query: &'q BatchQuery,
    batch: bool,
}

impl<'q> BatchAction<'q> {
    /// Optimistic locking needs the count of every row, so it always runs
    /// row by row, as do adapters without batch support.
    pub fn new(query: &'q BatchQuery, adapter: &dyn DbAdapter) -> Self {
        Self {
            query,
            batch: adapter.supports_batch_updates() && !query.optimistic_locking,
        }
    }

    pub fn is_batch(&self) -> bool {
        self.batch
    }

    async fn perform<C: DbConnection>(
        &self,
        conn: &mut C,
        adapter: &dyn DbAdapter,
        map: &DataMap,
    ) -> CayenneResult<Vec<u64>> {
        let translator = BatchTranslator::new(adapter, map, self.query)?;
        if self.query.rows.is_empty() {
            return Ok(Vec::new());
        }

        if self.batch {
            let sql = translator.sql();
            let rows = self
                .query
                .rows
                .iter()
                .map(|row| translator.bind_row(row, false))
                .collect::<CayenneResult<Vec<_>>>()?;
            debug!(sql = %sql, rows = rows.len(), "batch");
            return conn.execute_batch(&sql, &rows).await;
        }

        let mut counts = Vec::with_capacity(self.query.rows.len());
        for (i, row) in self.query.rows.iter().enumerate() {
            let sql = translator.sql_for_row(row);
            let params = translator.bind_row(row, true)?;
            debug!(sql = %sql, row = i, "batch row");
            let count = conn.execute(&sql, &params).await?;
            if self.query.optimistic_locking && count != 1 {
                return Err(CayenneError::OptimisticLock {
                    entity: self.query.entity.clone(),
                    row: i,
                    count,
                });
            }
            counts.push(count);
        }
        Ok(counts)
    }
}

/// The executor chosen for a query.
pub enum Action<'q> {
    Batch(BatchAction<'q>),
    Procedure(&'q ProcedureQuery),
    Select(&'q SelectQuery),
    RawSelect(&'q SqlTemplate),
    RawUpdate(&'q SqlTemplate),
    /// UPDATE and DELETE queries.
    Update(&'q Query),
}

impl<'q> Action<'q> {
    pub fn for_query(query: &'q Query, adapter: &dyn DbAdapter) -> Self {
        match query {
            Query::Batch(q) => Action::Batch(BatchAction::new(q, adapter)),
            Query::Procedure(q) => Action::Procedure(q),
            Query::Select(q) => Action::Select(q),
            Query::SqlTemplate(q) if q.selecting => Action::RawSelect(q),
            Query::SqlTemplate(q) => Action::RawUpdate(q),
            Query::Update(_) | Query::Delete(_) => Action::Update(query),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Batch(b) if b.is_batch() => "batch",
            Action::Batch(_) => "row-by-row batch",
            Action::Procedure(_) => "procedure",
            Action::Select(_) => "select",
            Action::RawSelect(_) => "raw select",
            Action::RawUpdate(_) => "raw update",
            Action::Update(_) => "update",
        }
    }

    /// Run `query` and hand its results to `observer`. Observer errors
    /// that are not ours become [`CayenneError::Runtime`].
    pub async fn perform<C: DbConnection>(
        &self,
        query: &Query,
        conn: &mut C,
        adapter: &dyn DbAdapter,
        map: &DataMap,
        observer: &mut dyn OperationObserver,
    ) -> CayenneResult<()> {
        let start = Instant::now();
        let result = self.run(query, conn, adapter, map, observer).await;
        match &result {
            Ok(()) => debug!(
                action = self.name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "query done"
            ),
            Err(e) => warn!(action = self.name(), error = %e, "query failed"),
        }
        result
    }

    async fn run<C: DbConnection>(
        &self,
        query: &Query,
        conn: &mut C,
        adapter: &dyn DbAdapter,
        map: &DataMap,
        observer: &mut dyn OperationObserver,
    ) -> CayenneResult<()> {
        match self {
            Action::Batch(batch) => {
                let counts = batch.perform(conn, adapter, map).await?;
                observer
                    .next_batch_count(query, &counts)
                    .map_err(CayenneError::wrap)
            }
            Action::Select(select) => {
                let translated = translate_select(adapter, map, select)?;
                let mut result = fetch(conn, adapter, &translated).await?;
                // adapters without a limit clause fetch everything
                if let Some(limit) = select.fetch_limit {
                    result.rows.truncate(limit);
                }
                observer.next_rows(query, result).map_err(CayenneError::wrap)
            }
            Action::RawSelect(template) => {
                let translated = translate_sql_template(adapter, map, template)?;
                let result = fetch(conn, adapter, &translated).await?;
                observer.next_rows(query, result).map_err(CayenneError::wrap)
            }
            Action::Procedure(procedure) if procedure.returns_rows => {
                let translated = translate_procedure(adapter, map, procedure)?;
                let result = fetch(conn, adapter, &translated).await?;
                observer.next_rows(query, result).map_err(CayenneError::wrap)
            }
            Action::Procedure(procedure) => {
                let translated = translate_procedure(adapter, map, procedure)?;
                let count = update(conn, adapter, &translated).await?;
                observer.next_count(query, count).map_err(CayenneError::wrap)
            }
            Action::RawUpdate(template) => {
                let translated = translate_sql_template(adapter, map, template)?;
                let count = update(conn, adapter, &translated).await?;
                observer.next_count(query, count).map_err(CayenneError::wrap)
            }
            Action::Update(query) => {
                let translated = translate_query(adapter, map, query)?;
                let count = update(conn, adapter, &translated).await?;
                observer.next_count(query, count).map_err(CayenneError::wrap)
            }
        }
    }
}

async fn fetch<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    translated: &TranslatedQuery,
) -> CayenneResult<crate::db::ResultSet> {
    let params = translated.params(adapter)?;
    debug!(sql = %translated.sql, params = ?params, "query");
    let columns = (!translated.columns.is_empty()).then_some(translated.columns.as_slice());
    conn.query(&translated.sql, &params, columns).await
}

async fn update<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    translated: &TranslatedQuery,
) -> CayenneResult<u64> {
    let params = translated.params(adapter)?;
    debug!(sql = %translated.sql, params = ?params, "update");
    conn.execute(&translated.sql, &params).await
}
