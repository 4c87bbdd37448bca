use serde::{Deserialize, Serialize};

use crate::types::JdbcType;

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub jdbc_type: JdbcType,
    /// Length for character/binary columns, precision for decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub mandatory: bool,
}

impl DbAttribute {
    pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        Self {
            name: name.into(),
            jdbc_type,
            max_length: None,
            scale: None,
            primary_key: false,
            mandatory: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.mandatory = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }
}

/// One source/target column pair of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbJoin {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRelationship {
    pub name: String,
    pub target: String,
    pub joins: Vec<DbJoin>,
    #[serde(default)]
    pub to_many: bool,
}

impl DbRelationship {
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            joins: vec![DbJoin {
                source: source_column.into(),
                target: target_column.into(),
            }],
            to_many: false,
        }
    }

    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            to_many: true,
            ..Self::to_one(name, target, source_column, target_column)
        }
    }

    /// Add another join column pair for compound keys.
    pub fn with_join(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.joins.push(DbJoin {
            source: source.into(),
            target: target.into(),
        });
        self
    }
}

/// A table with an ordered, name-unique column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub attributes: Vec<DbAttribute>,
    #[serde(default)]
    pub relationships: Vec<DbRelationship>,
}

impl DbEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: DbAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_relationship(mut self, relationship: DbRelationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&DbAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&DbRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &DbAttribute> {
        self.attributes.iter().filter(|a| a.primary_key)
    }

    /// `schema.name` when a schema is set.
    pub fn fully_qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}
