use serde::{Deserialize, Serialize};

use crate::types::ValueKind;

/// An object property mapped to a column, possibly through relationships
/// (`db_path = "toGallery.GALLERY_NAME"` for a flattened attribute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub db_path: String,
}

impl ObjAttribute {
    pub fn new(name: impl Into<String>, kind: ValueKind, db_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            db_path: db_path.into(),
        }
    }
}

/// An object relationship backed by one or more database relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjRelationship {
    pub name: String,
    pub target: String,
    pub db_path: String,
}

impl ObjRelationship {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        db_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            db_path: db_path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjEntity {
    pub name: String,
    pub db_entity: String,
    #[serde(default)]
    pub attributes: Vec<ObjAttribute>,
    #[serde(default)]
    pub relationships: Vec<ObjRelationship>,
}

impl ObjEntity {
    pub fn new(name: impl Into<String>, db_entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_entity: db_entity.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: ObjAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_relationship(mut self, relationship: ObjRelationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&ObjAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&ObjRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// The attribute mapped directly (no relationship hops) to `column`.
    pub fn attribute_for_column(&self, column: &str) -> Option<&ObjAttribute> {
        self.attributes.iter().find(|a| a.db_path == column)
    }
}
