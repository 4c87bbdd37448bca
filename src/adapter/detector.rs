use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::db::{DataSource, DatabaseMetadata, DbConnection};
use crate::error::CayenneResult;

use super::jdbc::JdbcAdapter;
use super::vendor::{Dialect, VendorAdapter};
use super::DbAdapter;

/// Recognises one database product from connection metadata.
pub type Sniffer = Box<dyn Fn(&DatabaseMetadata) -> Option<Arc<dyn DbAdapter>> + Send + Sync>;

/// Sniffer matching a case-insensitive substring of the product name.
pub fn product_sniffer(dialect: Dialect, needle: &'static str) -> Sniffer {
    Box::new(move |md: &DatabaseMetadata| {
        md.product_name
            .to_lowercase()
            .contains(needle)
            .then(|| Arc::new(VendorAdapter::new(dialect)) as Arc<dyn DbAdapter>)
    })
}

/// Picks an adapter by asking each sniffer in turn, newest first.
pub struct AdapterDetector {
    sniffers: Vec<Sniffer>,
}

impl Default for AdapterDetector {
    fn default() -> Self {
        Self {
            sniffers: vec![
                product_sniffer(Dialect::Oracle, "oracle"),
                product_sniffer(Dialect::Sybase, "adaptive server"),
                product_sniffer(Dialect::SqlServer, "microsoft sql server"),
                product_sniffer(Dialect::Db2, "db2"),
                product_sniffer(Dialect::Hsqldb, "hsql"),
                product_sniffer(Dialect::MySql, "mysql"),
                product_sniffer(Dialect::Postgres, "postgresql"),
                product_sniffer(Dialect::OpenBase, "openbase"),
            ],
        }
    }
}

impl AdapterDetector {
    /// A detector with the eight built-in sniffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector with no sniffers; always falls back to the generic adapter.
    pub fn empty() -> Self {
        Self {
            sniffers: Vec::new(),
        }
    }

    /// Register a sniffer. Later sniffers are consulted first.
    pub fn add_sniffer<F>(&mut self, sniffer: F)
    where
        F: Fn(&DatabaseMetadata) -> Option<Arc<dyn DbAdapter>> + Send + Sync + 'static,
    {
        self.sniffers.push(Box::new(sniffer));
    }

    pub fn len(&self) -> usize {
        self.sniffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sniffers.is_empty()
    }

    pub fn detect(&self, metadata: &DatabaseMetadata) -> Arc<dyn DbAdapter> {
        let found = self.sniffers.iter().rev().find_map(|sniff| sniff(metadata));
        match found {
            Some(adapter) => {
                debug!(product = %metadata.product_name, adapter = adapter.name(), "adapter detected");
                adapter
            }
            None => {
                debug!(product = %metadata.product_name, "no sniffer matched, using generic adapter");
                Arc::new(JdbcAdapter::new())
            }
        }
    }

    /// Open a connection, read its metadata and detect. The connection is
    /// released before returning on every path.
    pub async fn detect_adapter<D: DataSource>(&self, data_source: &D) -> CayenneResult<Arc<dyn DbAdapter>> {
        let start = Instant::now();
        let metadata = {
            let mut conn = data_source.connection().await?;
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "connection acquired for adapter detection");
            conn.metadata().await?
        };
        let adapter = self.detect(&metadata);
        info!(
            product = %metadata.product_name,
            version = %metadata.product_version,
            adapter = adapter.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "adapter detection finished"
        );
        Ok(adapter)
    }
}
