use crate::types::ExtendedTypeMap;

use super::DbAdapter;

/// Generic adapter used when no vendor sniffer recognises the database.
/// SQL-92 only: `?` placeholders, no row-limit clause.
pub struct JdbcAdapter {
    extended_types: ExtendedTypeMap,
}

impl JdbcAdapter {
    pub fn new() -> Self {
        Self::with_extended_types(ExtendedTypeMap::new())
    }

    pub fn with_extended_types(extended_types: ExtendedTypeMap) -> Self {
        Self { extended_types }
    }
}

impl Default for JdbcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DbAdapter for JdbcAdapter {
    fn name(&self) -> &str {
        "Generic JDBC"
    }

    fn extended_types(&self) -> &ExtendedTypeMap {
        &self.extended_types
    }
}
