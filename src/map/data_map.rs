use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CayenneError, CayenneResult};

use super::entity::{DbAttribute, DbEntity, DbRelationship};
use super::obj::{ObjAttribute, ObjEntity, ObjRelationship};

/// One step of a resolved database path.
#[derive(Debug, Clone, Copy)]
pub enum DbPathComponent<'a> {
    Attribute(&'a DbAttribute),
    Relationship {
        source: &'a DbEntity,
        relationship: &'a DbRelationship,
    },
}

/// One step of a resolved object path.
#[derive(Debug, Clone, Copy)]
pub enum ObjPathComponent<'a> {
    Attribute {
        entity: &'a ObjEntity,
        attribute: &'a ObjAttribute,
    },
    Relationship {
        entity: &'a ObjEntity,
        relationship: &'a ObjRelationship,
    },
}

/// Entity/relationship metadata for one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMap {
    pub name: String,
    #[serde(default)]
    pub db_entities: Vec<DbEntity>,
    #[serde(default)]
    pub obj_entities: Vec<ObjEntity>,
}

impl DataMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_db_entity(mut self, entity: DbEntity) -> Self {
        self.db_entities.push(entity);
        self
    }

    pub fn with_obj_entity(mut self, entity: ObjEntity) -> Self {
        self.obj_entities.push(entity);
        self
    }

    /// Load a map from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<DataMap> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data map {}", path.display()))?;
        let map: DataMap = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid data map {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Invalid data map {}", path.display()))?,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn db_entity(&self, name: &str) -> Option<&DbEntity> {
        self.db_entities.iter().find(|e| e.name == name)
    }

    pub fn obj_entity(&self, name: &str) -> Option<&ObjEntity> {
        self.obj_entities.iter().find(|e| e.name == name)
    }

    pub fn require_db_entity(&self, name: &str) -> CayenneResult<&DbEntity> {
        self.db_entity(name)
            .ok_or_else(|| CayenneError::Mapping(format!("No DbEntity named '{}'", name)))
    }

    pub fn require_obj_entity(&self, name: &str) -> CayenneResult<&ObjEntity> {
        self.obj_entity(name)
            .ok_or_else(|| CayenneError::Mapping(format!("No ObjEntity named '{}'", name)))
    }

    /// The table an object entity is stored in.
    pub fn db_entity_for(&self, entity: &ObjEntity) -> CayenneResult<&DbEntity> {
        self.db_entity(&entity.db_entity).ok_or_else(|| {
            CayenneError::Mapping(format!(
                "ObjEntity '{}' maps to unknown DbEntity '{}'",
                entity.name, entity.db_entity
            ))
        })
    }

    /// Walk a dot-separated path from `entity`. Every component but the last
    /// must be a relationship.
    pub fn resolve_db_path<'a>(
        &'a self,
        entity: &'a DbEntity,
        path: &str,
    ) -> CayenneResult<Vec<DbPathComponent<'a>>> {
        let parts: Vec<&str> = path.split('.').collect();
        let mut components = Vec::with_capacity(parts.len());
        let mut current = entity;

        for (i, part) in parts.iter().enumerate() {
            let last = i == parts.len() - 1;
            if let Some(relationship) = current.relationship(part) {
                components.push(DbPathComponent::Relationship {
                    source: current,
                    relationship,
                });
                current = self.db_entity(&relationship.target).ok_or_else(|| {
                    CayenneError::invalid_path(
                        &entity.name,
                        path,
                        format!("relationship '{}' targets unknown entity", part),
                    )
                })?;
            } else if let (true, Some(attribute)) = (last, current.attribute(part)) {
                components.push(DbPathComponent::Attribute(attribute));
            } else {
                return Err(CayenneError::invalid_path(
                    &entity.name,
                    path,
                    format!("'{}' is not a {} of '{}'", part, expected(last), current.name),
                ));
            }
        }

        Ok(components)
    }

    pub fn resolve_obj_path<'a>(
        &'a self,
        entity: &'a ObjEntity,
        path: &str,
    ) -> CayenneResult<Vec<ObjPathComponent<'a>>> {
        let parts: Vec<&str> = path.split('.').collect();
        let mut components = Vec::with_capacity(parts.len());
        let mut current = entity;

        for (i, part) in parts.iter().enumerate() {
            let last = i == parts.len() - 1;
            if let Some(relationship) = current.relationship(part) {
                components.push(ObjPathComponent::Relationship {
                    entity: current,
                    relationship,
                });
                current = self.obj_entity(&relationship.target).ok_or_else(|| {
                    CayenneError::invalid_path(
                        &entity.name,
                        path,
                        format!("relationship '{}' targets unknown entity", part),
                    )
                })?;
            } else if let (true, Some(attribute)) = (last, current.attribute(part)) {
                components.push(ObjPathComponent::Attribute {
                    entity: current,
                    attribute,
                });
            } else {
                return Err(CayenneError::invalid_path(
                    &entity.name,
                    path,
                    format!("'{}' is not a {} of '{}'", part, expected(last), current.name),
                ));
            }
        }

        Ok(components)
    }

    /// The database relationships behind an object relationship.
    pub fn db_relationships_for<'a>(
        &'a self,
        entity: &'a ObjEntity,
        relationship: &ObjRelationship,
    ) -> CayenneResult<Vec<(&'a DbEntity, &'a DbRelationship)>> {
        let root = self.db_entity_for(entity)?;
        self.resolve_db_path(root, &relationship.db_path)?
            .into_iter()
            .map(|c| match c {
                DbPathComponent::Relationship {
                    source,
                    relationship,
                } => Ok((source, relationship)),
                DbPathComponent::Attribute(a) => Err(CayenneError::Mapping(format!(
                    "ObjRelationship '{}.{}' db path ends in column '{}'",
                    entity.name, relationship.name, a.name
                ))),
            })
            .collect()
    }

    pub fn is_to_many(
        &self,
        entity: &ObjEntity,
        relationship: &ObjRelationship,
    ) -> CayenneResult<bool> {
        Ok(self
            .db_relationships_for(entity, relationship)?
            .iter()
            .any(|(_, r)| r.to_many))
    }

    /// Check names are unique and every reference resolves.
    pub fn validate(&self) -> CayenneResult<()> {
        let mut tables = HashSet::new();
        for entity in &self.db_entities {
            if !tables.insert(entity.name.as_str()) {
                return Err(CayenneError::Mapping(format!(
                    "Duplicate DbEntity '{}'",
                    entity.name
                )));
            }
            let mut columns = HashSet::new();
            for attribute in &entity.attributes {
                if !columns.insert(attribute.name.as_str()) {
                    return Err(CayenneError::Mapping(format!(
                        "Duplicate attribute '{}.{}'",
                        entity.name, attribute.name
                    )));
                }
            }
            for relationship in &entity.relationships {
                let target = self.db_entity(&relationship.target).ok_or_else(|| {
                    CayenneError::Mapping(format!(
                        "Relationship '{}.{}' targets unknown DbEntity '{}'",
                        entity.name, relationship.name, relationship.target
                    ))
                })?;
                if relationship.joins.is_empty() {
                    return Err(CayenneError::Mapping(format!(
                        "Relationship '{}.{}' has no joins",
                        entity.name, relationship.name
                    )));
                }
                for join in &relationship.joins {
                    if entity.attribute(&join.source).is_none()
                        || target.attribute(&join.target).is_none()
                    {
                        return Err(CayenneError::Mapping(format!(
                            "Relationship '{}.{}' joins unknown columns {} -> {}",
                            entity.name, relationship.name, join.source, join.target
                        )));
                    }
                }
            }
        }

        for entity in &self.obj_entities {
            let root = self.db_entity_for(entity)?;
            for attribute in &entity.attributes {
                let path = self.resolve_db_path(root, &attribute.db_path)?;
                if !matches!(path.last(), Some(DbPathComponent::Attribute(_))) {
                    return Err(CayenneError::Mapping(format!(
                        "ObjAttribute '{}.{}' does not end in a column",
                        entity.name, attribute.name
                    )));
                }
            }
            for relationship in &entity.relationships {
                self.require_obj_entity(&relationship.target)?;
                self.db_relationships_for(entity, relationship)?;
            }
        }
        Ok(())
    }
}

fn expected(last: bool) -> &'static str {
    if last {
        "attribute or relationship"
    } else {
        "relationship"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::testing::artist_map;

    #[test]
    fn test_fixture_validates() {
        artist_map().validate().unwrap();
    }

    #[test]
    fn test_resolve_obj_path_through_relationship() {
        let map = artist_map();
        let artist = map.obj_entity("Artist").unwrap();
        let path = map.resolve_obj_path(artist, "paintingArray.paintingTitle").unwrap();
        assert_eq!(path.len(), 2);
        assert!(matches!(path[0], ObjPathComponent::Relationship { relationship, .. } if relationship.name == "paintingArray"));
        assert!(matches!(path[1], ObjPathComponent::Attribute { attribute, .. } if attribute.db_path == "PAINTING_TITLE"));
    }

    #[test]
    fn test_resolve_db_path() {
        let map = artist_map();
        let painting = map.db_entity("PAINTING").unwrap();
        let path = map.resolve_db_path(painting, "toArtist.ARTIST_NAME").unwrap();
        assert!(matches!(path[1], DbPathComponent::Attribute(a) if a.name == "ARTIST_NAME"));
    }

    #[test]
    fn test_unresolvable_path_fails() {
        let map = artist_map();
        let artist = map.obj_entity("Artist").unwrap();
        let err = map.resolve_obj_path(artist, "paintingArray.noSuchThing").unwrap_err();
        assert!(err.is_query_shape());
        // attributes can only terminate a path
        assert!(map.resolve_obj_path(artist, "artistName.foo").is_err());
    }

    #[test]
    fn test_to_many_detection() {
        let map = artist_map();
        let artist = map.obj_entity("Artist").unwrap();
        let rel = artist.relationship("paintingArray").unwrap();
        assert!(map.is_to_many(artist, rel).unwrap());
        let painting = map.obj_entity("Painting").unwrap();
        let rel = painting.relationship("toArtist").unwrap();
        assert!(!map.is_to_many(painting, rel).unwrap());
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let mut map = artist_map();
        let dup = map.db_entities[0].attributes[0].clone();
        map.db_entities[0].attributes.push(dup);
        assert!(map.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_map() {
        let map = artist_map();
        let text = map.to_toml().unwrap();
        let parsed: DataMap = toml::from_str(&text).unwrap();
        assert_eq!(parsed, map);
    }
}
