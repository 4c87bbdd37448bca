//! Primary keys from the `AUTO_PK_SUPPORT` counter table.
//!
//! Each table has one row holding the next free key. A refill reads it and
//! advances it by the cache size in one transaction; keys are then handed
//! out from memory until the range runs out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{DataSource, ResultSet};
use crate::error::{CayenneError, CayenneResult};
use crate::map::DbEntity;
use crate::query::{Query, SqlTemplate};

use super::node::DataNode;
use super::observer::{ObserverError, OperationObserver};

pub const AUTO_PK_TABLE: &str = "AUTO_PK_SUPPORT";
pub const DEFAULT_PK_CACHE_SIZE: usize = 20;
/// First key handed out for a freshly registered table.
pub const AUTO_PK_START: i64 = 200;

fn quoted(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

pub fn pk_table_create_string() -> String {
    format!(
        "CREATE TABLE {} (  TABLE_NAME CHAR(100) NOT NULL,  NEXT_ID INTEGER NOT NULL, UNIQUE (TABLE_NAME))",
        AUTO_PK_TABLE
    )
}

pub fn pk_create_string(table: &str) -> String {
    format!(
        "INSERT INTO {} (TABLE_NAME, NEXT_ID) VALUES ({}, {})",
        AUTO_PK_TABLE,
        quoted(table),
        AUTO_PK_START
    )
}

pub fn pk_select_string(table: &str) -> String {
    format!(
        "SELECT NEXT_ID FROM {} WHERE TABLE_NAME = {}",
        AUTO_PK_TABLE,
        quoted(table)
    )
}

pub fn pk_update_string(table: &str, cache_size: usize) -> String {
    format!(
        "UPDATE {} SET NEXT_ID = NEXT_ID + {} WHERE TABLE_NAME = {}",
        AUTO_PK_TABLE,
        cache_size,
        quoted(table)
    )
}

pub fn pk_delete_string<'e>(tables: impl IntoIterator<Item = &'e str>) -> String {
    let names: Vec<String> = tables.into_iter().map(quoted).collect();
    format!(
        "DELETE FROM {} WHERE TABLE_NAME IN ({})",
        AUTO_PK_TABLE,
        names.join(", ")
    )
}

/// Keys `[next, max]` not yet handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PkRange {
    next: i64,
    max: i64,
}

impl PkRange {
    /// `size` keys starting at `start`.
    pub fn new(start: i64, size: usize) -> Self {
        Self {
            next: start,
            max: start + size as i64 - 1,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next > self.max
    }

    pub fn next_key(&mut self) -> Option<i64> {
        if self.is_exhausted() {
            return None;
        }
        let key = self.next;
        self.next += 1;
        Some(key)
    }
}

/// Checks a refill: exactly one counter row read, holding a value, and
/// exactly one row advanced.
pub struct PkRetrieveObserver {
    entity: String,
    rows: usize,
    next_id: Option<i64>,
    updated: Option<u64>,
}

impl PkRetrieveObserver {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            rows: 0,
            next_id: None,
            updated: None,
        }
    }

    pub fn next_id(&self) -> CayenneResult<i64> {
        self.verify()?;
        self.next_id
            .ok_or_else(|| CayenneError::pk(&self.entity, "NEXT_ID is null"))
    }
}

impl OperationObserver for PkRetrieveObserver {
    fn next_rows(&mut self, _: &Query, result: ResultSet) -> Result<(), ObserverError> {
        self.rows += result.rows.len();
        self.next_id = result
            .rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|v| v.as_i64());
        Ok(())
    }

    fn next_count(&mut self, _: &Query, count: u64) -> Result<(), ObserverError> {
        self.updated = Some(count);
        Ok(())
    }

    fn next_batch_count(&mut self, _: &Query, _: &[u64]) -> Result<(), ObserverError> {
        Ok(())
    }

    fn verify(&self) -> CayenneResult<()> {
        if self.rows != 1 {
            return Err(CayenneError::pk(
                &self.entity,
                format!("expected one {} row, got {}", AUTO_PK_TABLE, self.rows),
            ));
        }
        if self.next_id.is_none() {
            return Err(CayenneError::pk(&self.entity, "NEXT_ID is null"));
        }
        match self.updated {
            Some(1) => Ok(()),
            other => Err(CayenneError::pk(
                &self.entity,
                format!("expected one row updated, got {}", other.unwrap_or(0)),
            )),
        }
    }
}

/// Cached key generator over `AUTO_PK_SUPPORT`.
///
/// Ranges are kept per table, each behind its own lock, so refills for
/// different tables do not wait on each other.
pub struct JdbcPkGenerator {
    cache_size: usize,
    ranges: StdMutex<HashMap<String, Arc<Mutex<Option<PkRange>>>>>,
}

impl Default for JdbcPkGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PK_CACHE_SIZE)
    }
}

impl JdbcPkGenerator {
    /// A cache size of 0 or 1 reads the database for every key.
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache_size,
            ranges: StdMutex::new(HashMap::new()),
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// Forget every cached range.
    pub fn reset(&self) {
        self.ranges.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn slot(&self, table: &str) -> Arc<Mutex<Option<PkRange>>> {
        let mut ranges = self.ranges.lock().unwrap_or_else(|e| e.into_inner());
        ranges.entry(table.to_string()).or_default().clone()
    }

    pub async fn generate_pk_for_db_entity<D: DataSource>(
        &self,
        node: &DataNode<D>,
        entity: &DbEntity,
    ) -> CayenneResult<i64> {
        if self.cache_size <= 1 {
            return self.pk_from_database(node, entity, 1).await;
        }

        let slot = self.slot(&entity.name);
        let mut range = slot.lock().await;
        if let Some(key) = range.as_mut().and_then(PkRange::next_key) {
            return Ok(key);
        }

        let start = self.pk_from_database(node, entity, self.cache_size).await?;
        let mut fresh = PkRange::new(start, self.cache_size);
        let key = fresh
            .next_key()
            .ok_or_else(|| CayenneError::pk(&entity.name, "empty key range"))?;
        *range = Some(fresh);
        Ok(key)
    }

    /// Read `NEXT_ID` and advance it by `size` in one transaction.
    async fn pk_from_database<D: DataSource>(
        &self,
        node: &DataNode<D>,
        entity: &DbEntity,
        size: usize,
    ) -> CayenneResult<i64> {
        let queries = [
            Query::SqlTemplate(SqlTemplate::new(pk_select_string(&entity.name)).selecting(true)),
            Query::SqlTemplate(SqlTemplate::new(pk_update_string(&entity.name, size)).selecting(false)),
        ];
        let mut observer = PkRetrieveObserver::new(&entity.name);
        node.perform_in_transaction(&queries, &mut observer).await?;
        let next_id = observer.next_id()?;
        info!(table = %entity.name, next_id, size, "primary key range fetched");
        Ok(next_id)
    }

    /// Create `AUTO_PK_SUPPORT` when missing and (re)seed a counter row for
    /// each entity.
    pub async fn create_auto_pk<D: DataSource>(
        &self,
        node: &DataNode<D>,
        entities: &[&DbEntity],
    ) -> CayenneResult<()> {
        let mut queries = Vec::with_capacity(entities.len() + 2);
        if !node.table_exists(AUTO_PK_TABLE).await? {
            debug!("creating {}", AUTO_PK_TABLE);
            queries.push(raw_update(pk_table_create_string()));
        }
        if !entities.is_empty() {
            queries.push(raw_update(pk_delete_string(entities.iter().map(|e| e.name.as_str()))));
        }
        for entity in entities {
            queries.push(raw_update(pk_create_string(&entity.name)));
        }
        node.perform_queries(&queries, &mut super::observer::CollectingObserver::new())
            .await?;
        self.reset();
        Ok(())
    }

    /// Delete the counter rows of `entities`.
    pub async fn drop_auto_pk<D: DataSource>(
        &self,
        node: &DataNode<D>,
        entities: &[&DbEntity],
    ) -> CayenneResult<()> {
        if entities.is_empty() || !node.table_exists(AUTO_PK_TABLE).await? {
            return Ok(());
        }
        let query = raw_update(pk_delete_string(entities.iter().map(|e| e.name.as_str())));
        node.perform_queries(&[query], &mut super::observer::CollectingObserver::new())
            .await?;
        self.reset();
        Ok(())
    }
}

fn raw_update(sql: String) -> Query {
    Query::SqlTemplate(SqlTemplate::new(sql).selecting(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::JdbcAdapter;
    use crate::db::{MemoryDataSource, Reply};
    use crate::map::testing::artist_map;
    use crate::types::{JdbcType, Value};

    /// A counter table in memory: SELECT reads, UPDATE advances.
    fn counter_source(start: i64) -> MemoryDataSource {
        let ds = MemoryDataSource::product("test");
        let mut next_id = start;
        ds.on_statement(move |sql, _| {
            if sql.starts_with("SELECT NEXT_ID") {
                Some(Reply::column("NEXT_ID", JdbcType::Integer, vec![Value::Long(next_id)]))
            } else if let Some(rest) = sql.strip_prefix("UPDATE AUTO_PK_SUPPORT SET NEXT_ID = NEXT_ID + ") {
                let step: i64 = rest.split_whitespace().next()?.parse().ok()?;
                next_id += step;
                Some(Reply::Count(1))
            } else {
                None
            }
        });
        ds
    }

    fn node(ds: MemoryDataSource, cache_size: usize) -> DataNode<MemoryDataSource> {
        DataNode::new("test", ds, Arc::new(JdbcAdapter::new()), artist_map()).with_pk_cache_size(cache_size)
    }

    fn selects(ds: &MemoryDataSource) -> usize {
        ds.sql_log().iter().filter(|s| s.starts_with("SELECT")).count()
    }

    #[test]
    fn test_statement_strings() {
        assert_eq!(
            pk_table_create_string(),
            "CREATE TABLE AUTO_PK_SUPPORT (  TABLE_NAME CHAR(100) NOT NULL,  NEXT_ID INTEGER NOT NULL, UNIQUE (TABLE_NAME))"
        );
        assert_eq!(
            pk_create_string("ARTIST"),
            "INSERT INTO AUTO_PK_SUPPORT (TABLE_NAME, NEXT_ID) VALUES ('ARTIST', 200)"
        );
        assert_eq!(
            pk_select_string("ARTIST"),
            "SELECT NEXT_ID FROM AUTO_PK_SUPPORT WHERE TABLE_NAME = 'ARTIST'"
        );
        assert_eq!(
            pk_update_string("ARTIST", 20),
            "UPDATE AUTO_PK_SUPPORT SET NEXT_ID = NEXT_ID + 20 WHERE TABLE_NAME = 'ARTIST'"
        );
        assert_eq!(
            pk_delete_string(["ARTIST", "PAINTING"]),
            "DELETE FROM AUTO_PK_SUPPORT WHERE TABLE_NAME IN ('ARTIST', 'PAINTING')"
        );
    }

    #[test]
    fn test_range() {
        let mut range = PkRange::new(200, 2);
        assert_eq!(range.next_key(), Some(200));
        assert_eq!(range.next_key(), Some(201));
        assert_eq!(range.next_key(), None);
        assert!(range.is_exhausted());
    }

    #[tokio::test]
    async fn test_refill_after_exhaustion() {
        let ds = counter_source(200);
        let node = node(ds.clone(), 3);
        let mut keys = Vec::new();
        for _ in 0..4 {
            keys.push(node.generate_pk("ARTIST").await.unwrap());
        }
        assert_eq!(keys, vec![200, 201, 202, 203]);
        assert_eq!(selects(&ds), 2);
        assert_eq!(
            ds.transactions(),
            vec!["BEGIN", "COMMIT", "BEGIN", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn test_no_cache_reads_every_time() {
        let ds = counter_source(200);
        let node = node(ds.clone(), 1);
        for expected in [200, 201, 202] {
            assert_eq!(node.generate_pk("ARTIST").await.unwrap(), expected);
        }
        assert_eq!(selects(&ds), 3);
    }

    #[tokio::test]
    async fn test_ranges_are_per_table() {
        let ds = counter_source(500);
        let node = node(ds.clone(), 10);
        assert_eq!(node.generate_pk("ARTIST").await.unwrap(), 500);
        assert_eq!(node.generate_pk("PAINTING").await.unwrap(), 510);
        assert_eq!(node.generate_pk("ARTIST").await.unwrap(), 501);
        assert_eq!(selects(&ds), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refill() {
        let ds = counter_source(200);
        let node = node(ds.clone(), 3);
        let (a, b, c) = tokio::join!(
            node.generate_pk("ARTIST"),
            node.generate_pk("ARTIST"),
            node.generate_pk("ARTIST"),
        );
        let mut keys = vec![a.unwrap(), b.unwrap(), c.unwrap()];
        keys.sort_unstable();
        assert_eq!(keys, vec![200, 201, 202]);
        assert_eq!(selects(&ds), 1);
        assert_eq!(ds.transactions(), vec!["BEGIN", "COMMIT"]);
    }

    #[tokio::test]
    async fn test_missing_counter_row_rolls_back() {
        let ds = MemoryDataSource::product("test");
        ds.on_statement(|sql, _| {
            sql.starts_with("SELECT")
                .then(|| Reply::column("NEXT_ID", JdbcType::Integer, vec![]))
        });
        let node = node(ds.clone(), 5);
        let err = node.generate_pk("ARTIST").await.unwrap_err();
        assert!(matches!(err, CayenneError::PkGeneration { .. }));
        assert_eq!(ds.transactions(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_null_counter_is_fatal() {
        let ds = MemoryDataSource::product("test");
        ds.on_statement(|sql, _| {
            if sql.starts_with("SELECT") {
                Some(Reply::column("NEXT_ID", JdbcType::Integer, vec![Value::Null]))
            } else {
                Some(Reply::Count(1))
            }
        });
        let node = node(ds.clone(), 5);
        assert!(node.generate_pk("ARTIST").await.is_err());
        assert_eq!(ds.transactions(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_create_and_drop_support() {
        let ds = MemoryDataSource::product("test");
        let node = node(ds.clone(), 5);
        node.create_auto_pk_support(&["ARTIST", "PAINTING"]).await.unwrap();
        let log = ds.sql_log();
        assert_eq!(log[0], pk_table_create_string());
        assert_eq!(log[1], pk_delete_string(["ARTIST", "PAINTING"]));
        assert_eq!(log[2], pk_create_string("ARTIST"));
        assert_eq!(log[3], pk_create_string("PAINTING"));

        ds.clear();
        ds.add_table(AUTO_PK_TABLE);
        node.create_auto_pk_support(&["ARTIST"]).await.unwrap();
        assert!(!ds.sql_log().contains(&pk_table_create_string()));

        ds.clear();
        node.drop_auto_pk_support(&["ARTIST"]).await.unwrap();
        assert_eq!(ds.sql_log(), vec![pk_delete_string(["ARTIST"])]);
    }
}
