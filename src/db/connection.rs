use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::debug;

use crate::error::{CayenneError, CayenneResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates. Use with caution.
    /// Only honoured in `Prefer` and `Require` modes.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate file (PEM format).
    /// If not set, the system CA store is used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

/// SSL/TLS connection modes for PostgreSQL.
///
/// These match the standard PostgreSQL sslmode parameter:
/// - `Disable`: No SSL (unencrypted)
/// - `Prefer`: Try SSL first, fall back to non-SSL (default)
/// - `Require`: Require SSL but don't verify certificate
/// - `VerifyCa`: Require SSL and verify the server certificate is signed by a trusted CA
/// - `VerifyFull`: Like VerifyCa, but also verify the server hostname matches the certificate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl ConnectionConfig {
    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    /// URL reported in connection metadata. Never includes the password.
    pub fn url(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.username)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .ssl_mode(match self.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                    tokio_postgres::config::SslMode::Require
                }
            });
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Build a connection pool. No connection is opened until the first checkout.
pub fn create_pool(config: &ConnectionConfig, size: usize) -> CayenneResult<Pool> {
    // pooled connections may come back mid-transaction after a failed
    // operation; the recycle step rolls any such transaction back
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Custom("ROLLBACK".to_string()),
    };

    let manager = match config.ssl_mode {
        SslMode::Disable => Manager::from_config(config.pg_config(), NoTls, manager_config),
        SslMode::Prefer | SslMode::Require => {
            let tls = build_tls_connector(config, false)?;
            Manager::from_config(config.pg_config(), tls, manager_config)
        }
        SslMode::VerifyCa | SslMode::VerifyFull => {
            let tls = build_tls_connector(config, true)?;
            Manager::from_config(config.pg_config(), tls, manager_config)
        }
    };

    debug!(server = %config.display_string(), size, "creating connection pool");
    Pool::builder(manager)
        .max_size(size.max(1))
        .build()
        .map_err(|e| CayenneError::Config(format!("Failed to create pool: {}", e)))
}

/// Build a TLS connector with appropriate certificate configuration.
///
/// # Arguments
/// * `config` - Connection configuration
/// * `strict_verify` - If true, always verify certificates (for verify-ca/verify-full modes)
fn build_tls_connector(
    config: &ConnectionConfig,
    strict_verify: bool,
) -> CayenneResult<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.accept_invalid_certs && !strict_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path).map_err(|e| {
            CayenneError::Config(format!("Failed to read CA certificate file {}: {}", ca_path, e))
        })?;
        for cert in split_pem_certificates(&pem)? {
            let cert = native_tls::Certificate::from_pem(cert.as_bytes())
                .map_err(|e| CayenneError::Config(format!("Failed to parse certificate: {}", e)))?;
            builder.add_root_certificate(cert);
        }
    }
    if strict_verify {
        // verify-ca does not check the host name
        builder.danger_accept_invalid_hostnames(config.ssl_mode == SslMode::VerifyCa);
    }

    let connector = builder
        .build()
        .map_err(|e| CayenneError::Config(format!("Failed to build TLS connector: {}", e)))?;

    Ok(MakeTlsConnector::new(connector))
}

/// Split a PEM bundle into individual certificate blocks.
fn split_pem_certificates(pem: &[u8]) -> CayenneResult<Vec<String>> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let text = std::str::from_utf8(pem)
        .map_err(|_| CayenneError::Config("CA certificate file is not valid UTF-8".to_string()))?;

    let mut certs = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN) {
        let Some(len) = rest[start..].find(END) else {
            break;
        };
        let end = start + len + END.len();
        certs.push(rest[start..end].to_string());
        rest = &rest[end..];
    }

    if certs.is_empty() {
        return Err(CayenneError::Config(
            "No valid certificates found in PEM data".to_string(),
        ));
    }
    Ok(certs)
}
