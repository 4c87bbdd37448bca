//! Runtime values, SQL type codes and the extended type registry.
mod extended;
mod jdbc;
mod param;
mod value;

pub use extended::*;
pub use jdbc::JdbcType;
pub use param::SqlParam;
pub use value::{Value, ValueKind};
