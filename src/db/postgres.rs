use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Object, Pool};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;
use tracing::debug;

use crate::error::CayenneResult;
use crate::types::{JdbcType, SqlParam, Value};

use super::connection::{create_pool, ConnectionConfig};
use super::driver::{
    ColumnDescriptor, DataRow, DataSource, DatabaseMetadata, DbConnection, ResultSet,
};

/// Pooled PostgreSQL connections.
#[derive(Clone)]
pub struct PgDataSource {
    pool: Pool,
    url: String,
}

impl PgDataSource {
    pub fn new(config: &ConnectionConfig, pool_size: usize) -> CayenneResult<Self> {
        Ok(Self {
            pool: create_pool(config, pool_size)?,
            url: config.url(),
        })
    }

    pub fn from_pool(pool: Pool, url: impl Into<String>) -> Self {
        Self {
            pool,
            url: url.into(),
        }
    }
}

impl DataSource for PgDataSource {
    type Connection = PgConnection;

    async fn connection(&self) -> CayenneResult<PgConnection> {
        Ok(PgConnection {
            client: self.pool.get().await?,
            url: self.url.clone(),
        })
    }
}

pub struct PgConnection {
    client: Object,
    url: String,
}

fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl DbConnection for PgConnection {
    async fn metadata(&mut self) -> CayenneResult<DatabaseMetadata> {
        let row = self.client.query_one("SELECT version()", &[]).await?;
        let version: String = row.get(0);
        Ok(parse_version_string(&version, &self.url))
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
        columns: Option<&[ColumnDescriptor]>,
    ) -> CayenneResult<ResultSet> {
        let statement = self.client.prepare(sql).await?;
        let descriptors: Vec<ColumnDescriptor> = match columns {
            Some(given) => given.to_vec(),
            None => statement
                .columns()
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    ColumnDescriptor::from_label(i, c.name(), JdbcType::from_pg_type(c.type_()))
                })
                .collect(),
        };

        let rows = self.client.query(&statement, &param_refs(params)).await?;
        debug!(rows = rows.len(), "fetched");

        let data = rows
            .iter()
            .map(|row| {
                let mut data = DataRow::new();
                for (i, (column, descriptor)) in row.columns().iter().zip(&descriptors).enumerate() {
                    data.push(descriptor.name.clone(), extract_value(row, i, column.type_()));
                }
                data
            })
            .collect();

        Ok(ResultSet {
            columns: descriptors,
            rows: data,
        })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CayenneResult<u64> {
        Ok(self.client.execute(sql, &param_refs(params)).await?)
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<SqlParam>]) -> CayenneResult<Vec<u64>> {
        let statement = self.client.prepare(sql).await?;
        let mut counts = Vec::with_capacity(rows.len());
        for params in rows {
            counts.push(self.client.execute(&statement, &param_refs(params)).await?);
        }
        Ok(counts)
    }

    async fn begin(&mut self) -> CayenneResult<()> {
        Ok(self.client.batch_execute("BEGIN").await?)
    }

    async fn commit(&mut self) -> CayenneResult<()> {
        Ok(self.client.batch_execute("COMMIT").await?)
    }

    async fn rollback(&mut self) -> CayenneResult<()> {
        Ok(self.client.batch_execute("ROLLBACK").await?)
    }

    async fn table_exists(&mut self, table: &str) -> CayenneResult<bool> {
        let row = self
            .client
            .query_one(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE lower(table_name) = lower($1)
                      AND table_schema = ANY (current_schemas(false))
                )
                "#,
                &[&table],
            )
            .await?;
        Ok(row.get(0))
    }
}

/// Split `SELECT version()` output ("PostgreSQL 16.2 on x86_64-pc-linux-gnu, ...").
fn parse_version_string(version: &str, url: &str) -> DatabaseMetadata {
    let mut words = version.split_whitespace();
    let product_name = words.next().unwrap_or("PostgreSQL").to_string();
    let product_version = words
        .next()
        .map(|v| v.trim_end_matches(',').to_string())
        .unwrap_or_default();
    DatabaseMetadata {
        product_name,
        product_version,
        driver_name: "tokio-postgres".to_string(),
        url: url.to_string(),
    }
}

fn extract_value(row: &Row, idx: usize, pg_type: &Type) -> Value {
    match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(Value::Short)
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Long)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Double)
            .unwrap_or(Value::Null),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .ok()
            .flatten()
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        Type::TEXT | Type::VARCHAR | Type::NAME | Type::BPCHAR => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Type::CHAR => row
            .try_get::<_, Option<i8>>(idx)
            .ok()
            .flatten()
            .map(|c| Value::Char(c as u8 as char))
            .unwrap_or(Value::Null),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(Value::Date)
            .unwrap_or(Value::Null),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .ok()
            .flatten()
            .map(Value::Time)
            .unwrap_or(Value::Null),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::TimestampTz)
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_string() {
        let md = parse_version_string(
            "PostgreSQL 16.2 (Debian 16.2-1.pgdg120+2) on x86_64-pc-linux-gnu, compiled by gcc",
            "postgresql://u@h:5432/db",
        );
        assert_eq!(md.product_name, "PostgreSQL");
        assert_eq!(md.product_version, "16.2");
        assert_eq!(md.driver_name, "tokio-postgres");
    }
}
