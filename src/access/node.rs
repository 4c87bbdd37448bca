use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::adapter::{AdapterDetector, DbAdapter};
use crate::db::{DataSource, DbConnection, ResultSet};
use crate::error::CayenneResult;
use crate::map::{DataMap, DbEntity};
use crate::query::{Query, SelectQuery};

use super::action::Action;
use super::observer::{CollectingObserver, OperationObserver};
use super::pk::JdbcPkGenerator;

/// A data source paired with the adapter and mapping used to talk to it.
pub struct DataNode<D: DataSource> {
    name: String,
    data_source: D,
    adapter: Arc<dyn DbAdapter>,
    map: DataMap,
    pk_generator: JdbcPkGenerator,
}

impl<D: DataSource> DataNode<D> {
    pub fn new(
        name: impl Into<String>,
        data_source: D,
        adapter: Arc<dyn DbAdapter>,
        map: DataMap,
    ) -> Self {
        Self {
            name: name.into(),
            data_source,
            adapter,
            map,
            pk_generator: JdbcPkGenerator::default(),
        }
    }

    /// Node whose adapter is picked from the database's own metadata.
    pub async fn detected(
        name: impl Into<String>,
        data_source: D,
        map: DataMap,
        detector: &AdapterDetector,
    ) -> CayenneResult<Self> {
        let adapter = detector.detect_adapter(&data_source).await?;
        Ok(Self::new(name, data_source, adapter, map))
    }

    pub fn with_pk_cache_size(mut self, size: usize) -> Self {
        self.pk_generator = JdbcPkGenerator::new(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &dyn DbAdapter {
        self.adapter.as_ref()
    }

    pub fn map(&self) -> &DataMap {
        &self.map
    }

    pub fn data_source(&self) -> &D {
        &self.data_source
    }

    pub fn pk_generator(&self) -> &JdbcPkGenerator {
        &self.pk_generator
    }

    async fn run_all(
        &self,
        conn: &mut D::Connection,
        queries: &[Query],
        observer: &mut dyn OperationObserver,
    ) -> CayenneResult<()> {
        for query in queries {
            let action = Action::for_query(query, self.adapter());
            action
                .perform(query, conn, self.adapter(), &self.map, observer)
                .await?;
        }
        Ok(())
    }

    /// Run `queries` in order on one connection, each statement committing
    /// on its own. Stops at the first failure.
    pub async fn perform_queries(
        &self,
        queries: &[Query],
        observer: &mut dyn OperationObserver,
    ) -> CayenneResult<()> {
        let mut conn = self.data_source.connection().await?;
        debug!(node = %self.name, queries = queries.len(), "performing queries");
        self.run_all(&mut conn, queries, observer).await
    }

    /// Run `queries` in a single transaction. The observer's `verify` runs
    /// before the commit; any failure rolls everything back.
    pub async fn perform_in_transaction(
        &self,
        queries: &[Query],
        observer: &mut dyn OperationObserver,
    ) -> CayenneResult<()> {
        let start = Instant::now();
        let mut conn = self.data_source.connection().await?;
        conn.begin().await?;

        let result = match self.run_all(&mut conn, queries, observer).await {
            Ok(()) => observer.verify(),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                conn.commit().await?;
                debug!(
                    node = %self.name,
                    queries = queries.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "transaction committed"
                );
                Ok(())
            }
            Err(e) => {
                // the original failure is what callers need to see
                if let Err(rollback) = conn.rollback().await {
                    warn!(node = %self.name, error = %rollback, "rollback failed");
                }
                info!(node = %self.name, error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    pub async fn select(&self, query: &SelectQuery) -> CayenneResult<ResultSet> {
        let query = Query::Select(query.clone());
        let mut observer = CollectingObserver::new();
        self.perform_queries(std::slice::from_ref(&query), &mut observer)
            .await?;
        let result = observer.result_sets().next().cloned().unwrap_or_default();
        Ok(result)
    }

    pub async fn table_exists(&self, table: &str) -> CayenneResult<bool> {
        let mut conn = self.data_source.connection().await?;
        conn.table_exists(table).await
    }

    /// Next primary key for the table `entity`.
    pub async fn generate_pk(&self, entity: &str) -> CayenneResult<i64> {
        let entity = self.map.require_db_entity(entity)?;
        self.pk_generator
            .generate_pk_for_db_entity(self, entity)
            .await
    }

    pub async fn create_auto_pk_support(&self, entities: &[&str]) -> CayenneResult<()> {
        let entities = self.db_entities(entities)?;
        self.pk_generator.create_auto_pk(self, &entities).await
    }

    pub async fn drop_auto_pk_support(&self, entities: &[&str]) -> CayenneResult<()> {
        let entities = self.db_entities(entities)?;
        self.pk_generator.drop_auto_pk(self, &entities).await
    }

    fn db_entities(&self, names: &[&str]) -> CayenneResult<Vec<&DbEntity>> {
        names
            .iter()
            .map(|name| self.map.require_db_entity(name))
            .collect()
    }

    /// Create a table for every entity of the map, then the foreign keys
    /// the adapter supports.
    pub async fn create_schema(&self) -> CayenneResult<()> {
        let adapter = self.adapter();
        let mut statements = Vec::new();
        for entity in &self.map.db_entities {
            statements.push(adapter.create_table_sql(entity)?);
        }
        for entity in &self.map.db_entities {
            for relationship in &entity.relationships {
                let target = self.map.require_db_entity(&relationship.target)?;
                if let Some(sql) = adapter.create_fk_constraint_sql(entity, relationship, target) {
                    statements.push(sql);
                }
            }
        }

        let mut conn = self.data_source.connection().await?;
        for sql in &statements {
            conn.execute(sql, &[])
                .await
                .map_err(|e| e.with_context(format!("creating schema: {}", sql)))?;
        }
        info!(node = %self.name, statements = statements.len(), "schema created");
        Ok(())
    }
}
