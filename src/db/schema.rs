/// Reverse engineering: build `DbEntity` metadata from a live catalog.
use std::collections::BTreeMap;

use tracing::info;

use crate::error::CayenneResult;
use crate::map::{DataMap, DbAttribute, DbEntity, DbRelationship};
use crate::types::{JdbcType, SqlParam, Value};

use super::driver::{DataRow, DbConnection};

const TABLES_SQL: &str = r#"
    SELECT table_name::text AS name
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        c.table_name::text AS table_name,
        c.column_name::text AS name,
        c.data_type::text AS data_type,
        c.character_maximum_length::int AS max_length,
        c.numeric_precision::int AS numeric_precision,
        c.numeric_scale::int AS numeric_scale,
        c.is_nullable = 'YES' AS is_nullable,
        COALESCE(tc.constraint_type = 'PRIMARY KEY', false) AS is_primary_key
    FROM information_schema.columns c
    LEFT JOIN information_schema.key_column_usage kcu
        ON c.table_schema = kcu.table_schema
        AND c.table_name = kcu.table_name
        AND c.column_name = kcu.column_name
    LEFT JOIN information_schema.table_constraints tc
        ON kcu.constraint_name = tc.constraint_name
        AND kcu.table_schema = tc.table_schema
        AND tc.constraint_type = 'PRIMARY KEY'
    WHERE c.table_schema = $1
    ORDER BY c.table_name, c.ordinal_position
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        kcu.constraint_name::text AS constraint_name,
        kcu.table_name::text AS source_table,
        kcu.column_name::text AS source_column,
        ccu.table_name::text AS target_table,
        ccu.column_name::text AS target_column
    FROM information_schema.referential_constraints rc
    JOIN information_schema.key_column_usage kcu
        ON kcu.constraint_name = rc.constraint_name
        AND kcu.constraint_schema = rc.constraint_schema
    JOIN information_schema.key_column_usage ccu
        ON ccu.constraint_name = rc.unique_constraint_name
        AND ccu.constraint_schema = rc.unique_constraint_schema
        AND ccu.ordinal_position = kcu.position_in_unique_constraint
    WHERE kcu.table_schema = $1
    ORDER BY kcu.constraint_name, kcu.ordinal_position
"#;

/// Map an `information_schema.columns.data_type` name to a SQL type code.
pub fn jdbc_type_for_pg_name(data_type: &str) -> JdbcType {
    match data_type {
        "boolean" => JdbcType::Boolean,
        "smallint" => JdbcType::SmallInt,
        "integer" => JdbcType::Integer,
        "bigint" => JdbcType::BigInt,
        "real" => JdbcType::Real,
        "double precision" => JdbcType::Double,
        "numeric" | "decimal" => JdbcType::Decimal,
        "character" | "char" => JdbcType::Char,
        "character varying" => JdbcType::VarChar,
        "text" => JdbcType::LongVarChar,
        "bytea" => JdbcType::LongVarBinary,
        "date" => JdbcType::Date,
        "time without time zone" | "time with time zone" => JdbcType::Time,
        "timestamp without time zone" | "timestamp with time zone" => JdbcType::Timestamp,
        "ARRAY" => JdbcType::Array,
        _ => JdbcType::Other,
    }
}

fn text(row: &DataRow, column: &str) -> String {
    row.get(column)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number(row: &DataRow, column: &str) -> Option<u32> {
    row.get(column)
        .and_then(Value::as_i64)
        .and_then(|n| u32::try_from(n).ok())
}

fn flag(row: &DataRow, column: &str) -> bool {
    matches!(row.get(column), Some(Value::Bool(true)))
}

/// `PAINTING` / `painting_detail` → `Painting` / `PaintingDetail`.
fn capitalized(table: &str) -> String {
    table
        .split('_')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let lower = p.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn uncapitalized(table: &str) -> String {
    let name = capitalized(table);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => name,
    }
}

fn unique_name(entity: &DbEntity, base: String) -> String {
    if entity.relationship(&base).is_none() {
        return base;
    }
    let free = (1..)
        .map(|i| format!("{}{}", base, i))
        .find(|n| entity.relationship(n).is_none());
    free.unwrap_or(base)
}

/// Load every table of `schema` with its columns, primary keys and
/// foreign keys. Each foreign key yields a to-one relationship on the
/// source table (`toArtist`) and a to-many on the target (`paintingArray`).
pub async fn reverse_engineer<C: DbConnection>(
    conn: &mut C,
    schema: &str,
    map_name: &str,
) -> CayenneResult<DataMap> {
    let params = [SqlParam::Text(schema.to_string())];

    let mut entities: BTreeMap<String, DbEntity> = BTreeMap::new();
    for row in conn.query(TABLES_SQL, &params, None).await?.rows {
        let name = text(&row, "name");
        entities.insert(name.clone(), DbEntity::new(name));
    }

    for row in conn.query(COLUMNS_SQL, &params, None).await?.rows {
        let Some(entity) = entities.get_mut(&text(&row, "table_name")) else {
            continue;
        };
        let jdbc_type = jdbc_type_for_pg_name(&text(&row, "data_type"));
        let mut attribute = DbAttribute::new(text(&row, "name"), jdbc_type);
        attribute.max_length = number(&row, "max_length").or_else(|| {
            matches!(jdbc_type, JdbcType::Decimal)
                .then(|| number(&row, "numeric_precision"))
                .flatten()
        });
        if jdbc_type == JdbcType::Decimal {
            attribute.scale = number(&row, "numeric_scale");
        }
        attribute.mandatory = !flag(&row, "is_nullable");
        attribute.primary_key = flag(&row, "is_primary_key");
        entity.attributes.push(attribute);
    }

    // constraint name -> (source, target, column pairs)
    let mut foreign_keys: BTreeMap<String, (String, String, Vec<(String, String)>)> =
        BTreeMap::new();
    for row in conn.query(FOREIGN_KEYS_SQL, &params, None).await?.rows {
        let fk = foreign_keys
            .entry(text(&row, "constraint_name"))
            .or_insert_with(|| (text(&row, "source_table"), text(&row, "target_table"), Vec::new()));
        fk.2.push((text(&row, "source_column"), text(&row, "target_column")));
    }

    for (source, target, pairs) in foreign_keys.into_values() {
        if !entities.contains_key(&source) || !entities.contains_key(&target) {
            continue;
        }
        let Some(((first_source, first_target), rest)) = pairs.split_first() else {
            continue;
        };

        let mut to_one = DbRelationship::to_one("", &target, first_source, first_target);
        let mut to_many = DbRelationship::to_many("", &source, first_target, first_source);
        for (s, t) in rest {
            to_one = to_one.with_join(s, t);
            to_many = to_many.with_join(t, s);
        }

        if let Some(entity) = entities.get_mut(&source) {
            to_one.name = unique_name(entity, format!("to{}", capitalized(&target)));
            entity.relationships.push(to_one);
        }
        if let Some(entity) = entities.get_mut(&target) {
            to_many.name = unique_name(entity, format!("{}Array", uncapitalized(&source)));
            entity.relationships.push(to_many);
        }
    }

    let map = DataMap {
        name: map_name.to_string(),
        db_entities: entities.into_values().collect(),
        obj_entities: Vec::new(),
    };
    info!(
        schema,
        tables = map.db_entities.len(),
        "reverse engineered schema"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DataSource, MemoryDataSource, Reply};

    #[test]
    fn test_type_names() {
        assert_eq!(jdbc_type_for_pg_name("character varying"), JdbcType::VarChar);
        assert_eq!(jdbc_type_for_pg_name("bigint"), JdbcType::BigInt);
        assert_eq!(jdbc_type_for_pg_name("tsvector"), JdbcType::Other);
    }

    #[test]
    fn test_relationship_names() {
        assert_eq!(capitalized("ARTIST"), "Artist");
        assert_eq!(capitalized("painting_info"), "PaintingInfo");
        assert_eq!(uncapitalized("PAINTING"), "painting");
    }

    #[tokio::test]
    async fn test_reverse_engineer_builds_relationships() {
        let ds = MemoryDataSource::product("PostgreSQL");
        ds.on_statement(|sql, _| {
            let s = |v: &str| Value::String(v.to_string());
            if sql.contains("information_schema.referential_constraints") {
                Some(Reply::Rows {
                    columns: [
                        "constraint_name",
                        "source_table",
                        "source_column",
                        "target_table",
                        "target_column",
                    ]
                    .iter()
                    .map(|c| (c.to_string(), JdbcType::VarChar))
                    .collect(),
                    rows: vec![vec![
                        s("fk_painting_artist"),
                        s("painting"),
                        s("artist_id"),
                        s("artist"),
                        s("artist_id"),
                    ]],
                })
            } else if sql.contains("information_schema.columns") {
                let col = |table: &str, name: &str, ty: &str, pk: bool| {
                    vec![
                        s(table),
                        s(name),
                        s(ty),
                        Value::Null,
                        Value::Null,
                        Value::Null,
                        Value::Bool(!pk),
                        Value::Bool(pk),
                    ]
                };
                Some(Reply::Rows {
                    columns: [
                        "table_name",
                        "name",
                        "data_type",
                        "max_length",
                        "numeric_precision",
                        "numeric_scale",
                        "is_nullable",
                        "is_primary_key",
                    ]
                    .iter()
                    .map(|c| (c.to_string(), JdbcType::VarChar))
                    .collect(),
                    rows: vec![
                        col("artist", "artist_id", "bigint", true),
                        col("painting", "painting_id", "integer", true),
                        col("painting", "artist_id", "bigint", false),
                    ],
                })
            } else {
                Some(Reply::column(
                    "name",
                    JdbcType::VarChar,
                    vec![s("artist"), s("painting")],
                ))
            }
        });

        let mut conn = ds.connection().await.unwrap();
        let map = reverse_engineer(&mut conn, "public", "reversed").await.unwrap();
        map.validate().unwrap();

        let artist = map.db_entity("artist").unwrap();
        assert_eq!(artist.primary_keys().count(), 1);
        let to_many = artist.relationship("paintingArray").unwrap();
        assert!(to_many.to_many);
        assert_eq!(to_many.joins[0].source, "artist_id");

        let painting = map.db_entity("painting").unwrap();
        let to_one = painting.relationship("toArtist").unwrap();
        assert!(!to_one.to_many);
        assert_eq!(to_one.target, "artist");
    }
}
