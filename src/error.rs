//! Error types shared by the translators, actions and the driver layer.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CayenneError {
    /// A path could not be resolved against the root entity.
    #[error("Can't resolve path '{path}' for entity '{entity}': {reason}")]
    InvalidPath {
        entity: String,
        path: String,
        reason: String,
    },

    /// The expression tree has the wrong shape for the requested translation.
    #[error("Invalid expression: {0}")]
    Expression(String),

    /// The operation is not supported by this translator or adapter.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A named entity or attribute is missing from the data map.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Database: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Error reported by a non-Postgres `DbConnection` implementation.
    #[error("Driver: {0}")]
    Driver(String),

    #[error("PK generation failed for '{entity}': {reason}")]
    PkGeneration { entity: String, reason: String },

    #[error("Optimistic lock failure on '{entity}', row {row}: expected 1 affected row, got {count}")]
    OptimisticLock {
        entity: String,
        row: usize,
        count: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure, wrapped so callers only catch one error family.
    #[error("Runtime error: {0}")]
    Runtime(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<CayenneError>),
}

impl CayenneError {
    pub fn invalid_path(
        entity: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPath {
            entity: entity.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn pk(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PkGeneration {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub fn with_context(self, context: String) -> Self {
        Self::WithContext(context, Box::new(self))
    }

    /// Wrap an arbitrary error unless it already is one of ours.
    pub fn wrap(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        let boxed = err.into();
        match boxed.downcast::<CayenneError>() {
            Ok(own) => *own,
            Err(other) => match other.downcast::<tokio_postgres::Error>() {
                Ok(db) => Self::Database(*db),
                Err(other) => Self::Runtime(other),
            },
        }
    }

    /// True for errors caused by a malformed query rather than the database.
    pub fn is_query_shape(&self) -> bool {
        match self {
            Self::InvalidPath { .. } | Self::Expression(_) | Self::Unsupported(_) => true,
            Self::WithContext(_, inner) => inner.is_query_shape(),
            _ => false,
        }
    }

    /// SQLSTATE of the underlying database error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database(e) => e.as_db_error().map(|db| db.code().code()),
            Self::WithContext(_, inner) => inner.sql_state(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.sql_state() {
            Some(code) => categorize_sqlstate(code),
            None if self.is_query_shape() => ErrorCategory::Query,
            None => ErrorCategory::Unknown,
        }
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, CayenneError> {
    fn with_context(self, context: String) -> Result<T, CayenneError> {
        self.map_err(|e| e.with_context(context))
    }
}

pub type CayenneResult<T> = Result<T, CayenneError>;

/// Coarse classification of failures for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed query: bad path, bad expression shape.
    Query,
    Syntax,
    Semantic,
    Execution,
    Transaction,
    Connection,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Query => write!(f, "Query Error"),
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// Categorize a SQLSTATE code by its class.
pub fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    match &code[..2] {
        "42" => {
            if code == "42601" || code == "42000" {
                ErrorCategory::Syntax
            } else {
                ErrorCategory::Semantic
            }
        }
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CayenneError::invalid_path("Artist", "foo.bar", "no such attribute 'foo'");
        assert_eq!(
            err.to_string(),
            "Can't resolve path 'foo.bar' for entity 'Artist': no such attribute 'foo'"
        );
    }

    #[test]
    fn test_wrap_keeps_own_errors() {
        let err = CayenneError::wrap(CayenneError::Expression("bad".into()));
        assert!(matches!(err, CayenneError::Expression(_)));
    }

    #[test]
    fn test_wrap_other_errors_into_runtime() {
        let io = std::fmt::Error;
        let err = CayenneError::wrap(io);
        assert!(matches!(err, CayenneError::Runtime(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_query_shape_through_context() {
        let err = CayenneError::Unsupported("aliases".into()).with_context("raw sql".into());
        assert!(err.is_query_shape());
        assert_eq!(err.category(), ErrorCategory::Query);
    }

    #[test]
    fn test_categorize_sqlstate() {
        assert_eq!(categorize_sqlstate("42601"), ErrorCategory::Syntax);
        assert_eq!(categorize_sqlstate("42P01"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("23505"), ErrorCategory::Execution);
        assert_eq!(categorize_sqlstate("40001"), ErrorCategory::Transaction);
        assert_eq!(categorize_sqlstate("08006"), ErrorCategory::Connection);
        assert_eq!(categorize_sqlstate("XX000"), ErrorCategory::Unknown);
    }
}
