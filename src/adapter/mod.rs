//! SQL dialect adapters and adapter auto-detection.
//!
//! An adapter hides the differences between database products from the
//! translators: placeholder syntax, the uppercasing function, row limits,
//! procedure call syntax, DDL and type names, and how values are converted
//! for binding.
mod detector;
mod jdbc;
mod vendor;

pub use detector::*;
pub use jdbc::JdbcAdapter;
pub use vendor::{Dialect, VendorAdapter};

use std::sync::Arc;

use crate::error::{CayenneError, CayenneResult};
use crate::map::{DbEntity, DbRelationship};
use crate::types::{ExtendedTypeMap, JdbcType};

pub trait DbAdapter: Send + Sync {
    /// Human-readable name of the dialect.
    fn name(&self) -> &str;

    /// Whether parameter rows may be sent as one driver batch.
    fn supports_batch_updates(&self) -> bool {
        true
    }

    fn supports_fk_constraints(&self) -> bool {
        true
    }

    fn upper_function(&self) -> &str {
        "UPPER"
    }

    /// Placeholder for the `position`th bound parameter, 1-based.
    fn parameter_placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    /// Restrict a complete SELECT to at most `limit` rows. Dialects with no
    /// row-limiting syntax return the statement unchanged and the caller
    /// truncates the fetched rows.
    fn limit_sql(&self, sql: String, _limit: usize) -> String {
        sql
    }

    /// Call statement for a procedure taking `params` positional parameters.
    fn procedure_call_sql(&self, name: &str, params: usize, _returns_rows: bool) -> String {
        let placeholders: Vec<String> = (1..=params)
            .map(|i| self.parameter_placeholder(i))
            .collect();
        format!("{{call {}({})}}", name, placeholders.join(", "))
    }

    /// Column type name used in DDL.
    fn external_type(&self, jdbc_type: JdbcType) -> &str {
        jdbc_type.name()
    }

    fn create_table_sql(&self, entity: &DbEntity) -> CayenneResult<String> {
        create_table_statement(self, entity)
    }

    fn drop_table_sql(&self, entity: &DbEntity) -> String {
        format!("DROP TABLE {}", entity.fully_qualified_name())
    }

    /// `None` when the dialect does not enforce foreign keys or the
    /// relationship is not a to-one over columns.
    fn create_fk_constraint_sql(
        &self,
        source: &DbEntity,
        relationship: &DbRelationship,
        target: &DbEntity,
    ) -> Option<String> {
        if !self.supports_fk_constraints() || relationship.to_many {
            return None;
        }
        let sources: Vec<&str> = relationship.joins.iter().map(|j| j.source.as_str()).collect();
        let targets: Vec<&str> = relationship.joins.iter().map(|j| j.target.as_str()).collect();
        Some(format!(
            "ALTER TABLE {} ADD FOREIGN KEY ({}) REFERENCES {} ({})",
            source.fully_qualified_name(),
            sources.join(", "),
            target.fully_qualified_name(),
            targets.join(", ")
        ))
    }

    /// Converters used when binding values.
    fn extended_types(&self) -> &ExtendedTypeMap;
}

/// Standard `CREATE TABLE` with a column list and a primary key clause.
pub fn create_table_statement<A: DbAdapter + ?Sized>(
    adapter: &A,
    entity: &DbEntity,
) -> CayenneResult<String> {
    if entity.attributes.is_empty() {
        return Err(CayenneError::Mapping(format!(
            "DbEntity '{}' has no attributes",
            entity.name
        )));
    }

    let mut columns = Vec::with_capacity(entity.attributes.len() + 1);
    for attribute in &entity.attributes {
        let mut column = format!("{} {}", attribute.name, adapter.external_type(attribute.jdbc_type));
        if attribute.jdbc_type.supports_length() {
            match (attribute.max_length, attribute.scale) {
                (Some(length), Some(scale)) => column.push_str(&format!("({}, {})", length, scale)),
                (Some(length), None) => column.push_str(&format!("({})", length)),
                (None, _) if attribute.jdbc_type.is_character() => {
                    return Err(CayenneError::Mapping(format!(
                        "Column '{}.{}' needs a length",
                        entity.name, attribute.name
                    )));
                }
                _ => {}
            }
        }
        column.push_str(if attribute.mandatory { " NOT NULL" } else { " NULL" });
        columns.push(column);
    }

    let pks: Vec<&str> = entity.primary_keys().map(|a| a.name.as_str()).collect();
    if !pks.is_empty() {
        columns.push(format!("PRIMARY KEY ({})", pks.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        entity.fully_qualified_name(),
        columns.join(", ")
    ))
}

/// Adapter for a configured dialect name (`"postgres"`, `"oracle"`, …).
/// `"generic"` and `"jdbc"` give the generic adapter.
pub fn adapter_for_name(name: &str) -> Option<Arc<dyn DbAdapter>> {
    match name.to_lowercase().as_str() {
        "generic" | "jdbc" => Some(Arc::new(JdbcAdapter::new())),
        other => Dialect::from_name(other).map(|d| Arc::new(VendorAdapter::new(d)) as Arc<dyn DbAdapter>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::testing::artist_map;
    use crate::map::DbAttribute;

    #[test]
    fn test_generic_create_table() {
        let map = artist_map();
        let sql = JdbcAdapter::new()
            .create_table_sql(map.db_entity("ARTIST").unwrap())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE ARTIST (ARTIST_ID BIGINT NOT NULL, ARTIST_NAME CHAR(254) NOT NULL, \
             DATE_OF_BIRTH DATE NULL, PRIMARY KEY (ARTIST_ID))"
        );
    }

    #[test]
    fn test_character_column_without_length_is_rejected() {
        let entity = DbEntity::new("T").with_attribute(DbAttribute::new("NAME", JdbcType::VarChar));
        assert!(JdbcAdapter::new().create_table_sql(&entity).is_err());
    }

    #[test]
    fn test_fk_constraint() {
        let map = artist_map();
        let painting = map.db_entity("PAINTING").unwrap();
        let artist = map.db_entity("ARTIST").unwrap();
        let rel = painting.relationship("toArtist").unwrap();
        assert_eq!(
            JdbcAdapter::new().create_fk_constraint_sql(painting, rel, artist).unwrap(),
            "ALTER TABLE PAINTING ADD FOREIGN KEY (ARTIST_ID) REFERENCES ARTIST (ARTIST_ID)"
        );
        let to_many = artist.relationship("paintingArray").unwrap();
        assert!(JdbcAdapter::new()
            .create_fk_constraint_sql(artist, to_many, painting)
            .is_none());
    }

    #[test]
    fn test_adapter_for_name() {
        assert_eq!(adapter_for_name("generic").unwrap().name(), "Generic JDBC");
        assert_eq!(adapter_for_name("Postgres").unwrap().name(), "PostgreSQL");
        assert!(adapter_for_name("dbase").is_none());
    }
}
