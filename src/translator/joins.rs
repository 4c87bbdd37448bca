use std::collections::HashMap;

use tracing::trace;

use crate::map::{DbEntity, DbRelationship};

/// Alias of the root table.
pub const ROOT_ALIAS: &str = "t0";

struct TableRef<'a> {
    entity: &'a DbEntity,
    alias: String,
}

struct JoinRecord<'a> {
    source_alias: String,
    target_alias: String,
    relationship: &'a DbRelationship,
}

/// Tables and relationship joins of one SELECT.
///
/// Joins are keyed by the alias they were traversed from plus the source
/// entity and relationship name, so re-traversing a relationship reuses its
/// alias while two relationships to the same table get one alias each.
pub struct JoinStack<'a> {
    tables: Vec<TableRef<'a>>,
    joins: Vec<JoinRecord<'a>>,
    seen: HashMap<(String, String, String), String>,
    force_distinct: bool,
}

impl<'a> JoinStack<'a> {
    pub fn new(root: &'a DbEntity) -> Self {
        Self {
            tables: vec![TableRef {
                entity: root,
                alias: ROOT_ALIAS.to_string(),
            }],
            joins: Vec::new(),
            seen: HashMap::new(),
            force_distinct: false,
        }
    }

    /// Join `relationship` from the table aliased `from_alias` and return
    /// the alias of its target.
    pub fn join(
        &mut self,
        from_alias: &str,
        source: &DbEntity,
        relationship: &'a DbRelationship,
        target: &'a DbEntity,
    ) -> String {
        if relationship.to_many {
            self.force_distinct = true;
        }

        let key = (
            from_alias.to_string(),
            source.name.clone(),
            relationship.name.clone(),
        );
        if let Some(alias) = self.seen.get(&key) {
            return alias.clone();
        }

        let alias = format!("t{}", self.tables.len());
        trace!(relationship = %relationship.name, from = from_alias, alias = %alias, "join");
        self.tables.push(TableRef {
            entity: target,
            alias: alias.clone(),
        });
        self.joins.push(JoinRecord {
            source_alias: from_alias.to_string(),
            target_alias: alias.clone(),
            relationship,
        });
        self.seen.insert(key, alias.clone());
        alias
    }

    /// A to-many relationship was traversed.
    pub fn force_distinct(&self) -> bool {
        self.force_distinct
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// `ARTIST t0, PAINTING t1`
    pub fn from_clause(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!("{} {}", t.entity.fully_qualified_name(), t.alias))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One equality per join column pair, in join order.
    pub fn join_conditions(&self) -> Vec<String> {
        self.joins
            .iter()
            .flat_map(|j| {
                j.relationship.joins.iter().map(move |pair| {
                    format!(
                        "{}.{} = {}.{}",
                        j.source_alias, pair.source, j.target_alias, pair.target
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::testing::artist_map;

    #[test]
    fn test_aliases_by_relationship_identity() {
        let map = artist_map();
        let painting = map.db_entity("PAINTING").unwrap();
        let artist = map.db_entity("ARTIST").unwrap();
        let mut joins = JoinStack::new(painting);

        let by_artist = painting.relationship("toArtist").unwrap();
        let by_original = painting.relationship("toOriginalArtist").unwrap();

        let a1 = joins.join(ROOT_ALIAS, painting, by_artist, artist);
        let a2 = joins.join(ROOT_ALIAS, painting, by_original, artist);
        let a3 = joins.join(ROOT_ALIAS, painting, by_artist, artist);

        assert_eq!(a1, "t1");
        assert_eq!(a2, "t2");
        assert_eq!(a3, "t1");
        assert_eq!(joins.table_count(), 3);
        assert!(!joins.force_distinct());
        assert_eq!(joins.from_clause(), "PAINTING t0, ARTIST t1, ARTIST t2");
        assert_eq!(
            joins.join_conditions(),
            vec![
                "t0.ARTIST_ID = t1.ARTIST_ID",
                "t0.ORIGINAL_ARTIST_ID = t2.ARTIST_ID"
            ]
        );
    }

    #[test]
    fn test_to_many_sets_distinct() {
        let map = artist_map();
        let artist = map.db_entity("ARTIST").unwrap();
        let painting = map.db_entity("PAINTING").unwrap();
        let mut joins = JoinStack::new(artist);
        joins.join(
            ROOT_ALIAS,
            artist,
            artist.relationship("paintingArray").unwrap(),
            painting,
        );
        assert!(joins.force_distinct());
    }
}
