//! Node configuration file: connection, pool, adapter choice and PK cache.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::access::DEFAULT_PK_CACHE_SIZE;
use crate::adapter::{adapter_for_name, DbAdapter};
use crate::db::ConnectionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Adapter name such as `postgres` or `oracle`. Unset means detect it
    /// from the database metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(default = "default_pk_cache_size")]
    pub pk_cache_size: usize,
    /// Data map file, `.toml` or `.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<PathBuf>,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_pk_cache_size() -> usize {
    DEFAULT_PK_CACHE_SIZE
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            connection: ConnectionConfig::default(),
            pool_size: default_pool_size(),
            adapter: None,
            pk_cache_size: default_pk_cache_size(),
            map: None,
        }
    }
}

impl NodeConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cayenne")
            .join("node.toml")
    }

    /// Read the file at `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(content)?;
        if config.pool_size == 0 {
            bail!("pool_size must be at least 1");
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// The configured adapter, or `None` when it should be detected.
    pub fn fixed_adapter(&self) -> Result<Option<Arc<dyn DbAdapter>>> {
        match self.adapter.as_deref() {
            None | Some("auto") => Ok(None),
            Some(name) => adapter_for_name(name)
                .map(Some)
                .with_context(|| format!("unknown adapter {:?}", name)),
        }
    }

    /// Fill an empty password from `PGPASSWORD`, then from a prompt.
    pub fn resolve_password(&mut self) -> Result<()> {
        if !self.connection.password.is_empty() {
            return Ok(());
        }
        if let Ok(password) = std::env::var("PGPASSWORD") {
            self.connection.password = password;
            return Ok(());
        }
        let prompt = format!("Password for {}: ", self.connection.display_string());
        self.connection.password = rpassword::read_password_from_tty(Some(&prompt))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = NodeConfig::parse("name = \"prod\"\n[connection]\nhost = \"db\"\nport = 5433\ndatabase = \"art\"\nusername = \"app\"\n").unwrap();
        assert_eq!(config.name, "prod");
        assert_eq!(config.connection.port, 5433);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.pk_cache_size, DEFAULT_PK_CACHE_SIZE);
        assert!(config.fixed_adapter().unwrap().is_none());
    }

    #[test]
    fn test_named_adapter() {
        let config = NodeConfig {
            adapter: Some("oracle".into()),
            ..Default::default()
        };
        assert_eq!(config.fixed_adapter().unwrap().unwrap().name(), "Oracle");

        let config = NodeConfig {
            adapter: Some("informix".into()),
            ..Default::default()
        };
        assert!(config.fixed_adapter().is_err());
    }

    #[test]
    fn test_zero_pool_rejected() {
        assert!(NodeConfig::parse("pool_size = 0").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("cayenne-config-{}", std::process::id()));
        let path = dir.join("node.toml");
        let config = NodeConfig {
            pk_cache_size: 5,
            adapter: Some("postgres".into()),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(NodeConfig::load(&path).unwrap(), config);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(NodeConfig::load(&path).unwrap(), NodeConfig::default());
    }
}
