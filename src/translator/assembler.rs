use crate::adapter::DbAdapter;
use crate::db::ColumnDescriptor;
use crate::error::{CayenneError, CayenneResult};
use crate::exp::Expression;
use crate::map::{DataMap, DbAttribute, DbEntity, DbPathComponent, ObjEntity, ObjPathComponent};
use crate::query::QueryRoot;
use crate::types::{ExtendedTypeMap, SqlParam, Value};

use super::joins::{JoinStack, ROOT_ALIAS};

/// A bound parameter. `attribute` is the column the value is compared
/// with or written to; `None` lets the driver infer the type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub attribute: Option<DbAttribute>,
    pub value: Value,
}

impl ParameterBinding {
    pub fn to_param(&self, types: &ExtendedTypeMap) -> CayenneResult<SqlParam> {
        let (jdbc_type, precision) = match &self.attribute {
            Some(a) => (Some(a.jdbc_type), a.max_length),
            None => (None, None),
        };
        types.bind(&self.value, jdbc_type, precision)
    }
}

/// Output of a translator.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub sql: String,
    pub bindings: Vec<ParameterBinding>,
    /// Result descriptor when known before execution.
    pub columns: Vec<ColumnDescriptor>,
}

impl TranslatedQuery {
    /// Driver values for the bindings, in placeholder order.
    pub fn params(&self, adapter: &dyn DbAdapter) -> CayenneResult<Vec<SqlParam>> {
        let types = adapter.extended_types();
        self.bindings.iter().map(|b| b.to_param(types)).collect()
    }

    pub fn values(&self) -> Vec<&Value> {
        self.bindings.iter().map(|b| &b.value).collect()
    }
}

/// A path resolved to a column, with the alias of the table it lives in
/// when the statement uses aliases.
#[derive(Debug, Clone)]
pub struct ResolvedColumn<'a> {
    pub alias: Option<String>,
    pub attribute: &'a DbAttribute,
}

impl ResolvedColumn<'_> {
    pub fn sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{}", alias, self.attribute.name),
            None => self.attribute.name.clone(),
        }
    }
}

/// Shared state of one translation: the bound parameter list, the root
/// entities paths resolve against, and the join stack when the statement
/// uses table aliases.
pub struct TranslationContext<'a> {
    adapter: &'a dyn DbAdapter,
    map: &'a DataMap,
    root_db: Option<&'a DbEntity>,
    root_obj: Option<&'a ObjEntity>,
    bindings: Vec<ParameterBinding>,
    joins: Option<JoinStack<'a>>,
}

impl<'a> TranslationContext<'a> {
    /// A context with no root entity; only binding is available.
    pub fn new(adapter: &'a dyn DbAdapter, map: &'a DataMap) -> Self {
        Self {
            adapter,
            map,
            root_db: None,
            root_obj: None,
            bindings: Vec::new(),
            joins: None,
        }
    }

    /// A context rooted at `root`. With `aliased`, the root table becomes
    /// `t0` and relationship paths may add joins; without, paths must stay
    /// inside the root table.
    pub fn rooted(
        adapter: &'a dyn DbAdapter,
        map: &'a DataMap,
        root: &QueryRoot,
        aliased: bool,
    ) -> CayenneResult<Self> {
        let (root_obj, root_db) = match root {
            QueryRoot::Obj(name) => {
                let obj = map.require_obj_entity(name)?;
                (Some(obj), map.db_entity_for(obj)?)
            }
            QueryRoot::Db(name) => (None, map.require_db_entity(name)?),
        };
        Ok(Self {
            adapter,
            map,
            root_db: Some(root_db),
            root_obj,
            bindings: Vec::new(),
            joins: aliased.then(|| JoinStack::new(root_db)),
        })
    }

    pub fn adapter(&self) -> &'a dyn DbAdapter {
        self.adapter
    }

    pub fn map(&self) -> &'a DataMap {
        self.map
    }

    pub fn root_db_entity(&self) -> CayenneResult<&'a DbEntity> {
        self.root_db
            .ok_or_else(|| CayenneError::Unsupported("statement has no root entity".to_string()))
    }

    pub fn root_obj_entity(&self) -> Option<&'a ObjEntity> {
        self.root_obj
    }

    /// Alias of the root table.
    pub fn root_alias(&self) -> CayenneResult<&'static str> {
        match self.joins {
            Some(_) => Ok(ROOT_ALIAS),
            None => Err(CayenneError::Unsupported(
                "table aliases are not available in this statement".to_string(),
            )),
        }
    }

    pub fn joins(&self) -> Option<&JoinStack<'a>> {
        self.joins.as_ref()
    }

    /// Register a parameter and return its placeholder.
    pub fn bind(&mut self, attribute: Option<&DbAttribute>, value: Value) -> String {
        self.bindings.push(ParameterBinding {
            attribute: attribute.cloned(),
            value,
        });
        self.adapter.parameter_placeholder(self.bindings.len())
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    pub fn into_bindings(self) -> Vec<ParameterBinding> {
        self.bindings
    }

    /// Resolve an object or database path to its terminal column, joining
    /// every relationship crossed on the way.
    pub fn resolve(&mut self, path: &Expression) -> CayenneResult<ResolvedColumn<'a>> {
        match path {
            Expression::ObjPath(p) => {
                let db_path = self.obj_to_db_path(p)?;
                self.resolve_db(&db_path, p)
            }
            Expression::DbPath(p) => self.resolve_db(p, p),
            other => Err(CayenneError::Expression(format!("'{}' is not a path", other))),
        }
    }

    fn root_name(&self) -> String {
        self.root_obj
            .map(|o| o.name.clone())
            .or_else(|| self.root_db.map(|d| d.name.clone()))
            .unwrap_or_default()
    }

    /// Rewrite an object path as the database path it maps to, so that
    /// flattened attributes and multi-step relationships join like any
    /// other database path.
    fn obj_to_db_path(&self, path: &str) -> CayenneResult<String> {
        let root = self.root_obj.ok_or_else(|| {
            CayenneError::invalid_path(
                self.root_name(),
                path,
                "object paths need an object entity root",
            )
        })?;
        let steps: Vec<&str> = self
            .map
            .resolve_obj_path(root, path)?
            .into_iter()
            .map(|c| match c {
                ObjPathComponent::Relationship { relationship, .. } => relationship.db_path.as_str(),
                ObjPathComponent::Attribute { attribute, .. } => attribute.db_path.as_str(),
            })
            .collect();
        Ok(steps.join("."))
    }

    fn resolve_db(&mut self, db_path: &str, original: &str) -> CayenneResult<ResolvedColumn<'a>> {
        let root = self.root_db_entity()?;
        let components = self.map.resolve_db_path(root, db_path)?;
        let last = components.len().saturating_sub(1);
        let mut alias = self.joins.as_ref().map(|_| ROOT_ALIAS.to_string());

        for (i, component) in components.into_iter().enumerate() {
            match component {
                DbPathComponent::Attribute(attribute) => {
                    return Ok(ResolvedColumn { alias, attribute });
                }
                // a to-one over a single column compares as its foreign key
                DbPathComponent::Relationship {
                    source,
                    relationship,
                } if i == last => {
                    return match (relationship.to_many, relationship.joins.as_slice()) {
                        (false, [join]) => source
                            .attribute(&join.source)
                            .map(|attribute| ResolvedColumn { alias, attribute })
                            .ok_or_else(|| {
                                CayenneError::invalid_path(
                                    self.root_name(),
                                    original,
                                    format!("no column '{}' in '{}'", join.source, source.name),
                                )
                            }),
                        _ => Err(CayenneError::invalid_path(
                            self.root_name(),
                            original,
                            format!("path ends in relationship '{}'", relationship.name),
                        )),
                    };
                }
                DbPathComponent::Relationship {
                    source,
                    relationship,
                } => {
                    let target = self.map.require_db_entity(&relationship.target)?;
                    let joins = self.joins.as_mut().ok_or_else(|| {
                        CayenneError::Unsupported(format!(
                            "relationship '{}' needs a join, which this statement can't use",
                            relationship.name
                        ))
                    })?;
                    let from = alias.as_deref().unwrap_or(ROOT_ALIAS);
                    alias = Some(joins.join(from, source, relationship, target));
                }
            }
        }

        Err(CayenneError::invalid_path(self.root_name(), original, "empty path"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Dialect, JdbcAdapter, VendorAdapter};
    use crate::map::testing::artist_map;
    use crate::types::JdbcType;

    fn painting_root() -> QueryRoot {
        QueryRoot::Obj("Painting".to_string())
    }

    #[test]
    fn test_placeholders_follow_adapter() {
        let map = artist_map();
        let pg = VendorAdapter::new(Dialect::Postgres);
        let mut ctx = TranslationContext::new(&pg, &map);
        assert_eq!(ctx.bind(None, Value::Int(1)), "$1");
        assert_eq!(ctx.bind(None, Value::Int(2)), "$2");
        assert_eq!(ctx.bindings().len(), 2);
    }

    #[test]
    fn test_resolves_flattened_attribute_through_join() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let mut ctx = TranslationContext::rooted(&adapter, &map, &painting_root(), true).unwrap();
        let column = ctx.resolve(&Expression::path("galleryName")).unwrap();
        assert_eq!(column.sql(), "t1.GALLERY_NAME");
        assert_eq!(ctx.joins().unwrap().join_conditions(), vec!["t0.GALLERY_ID = t1.GALLERY_ID"]);
    }

    #[test]
    fn test_to_one_relationship_resolves_to_foreign_key() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let mut ctx = TranslationContext::rooted(&adapter, &map, &painting_root(), true).unwrap();
        let column = ctx.resolve(&Expression::path("toArtist")).unwrap();
        assert_eq!(column.sql(), "t0.ARTIST_ID");
        assert_eq!(column.attribute.jdbc_type, JdbcType::BigInt);
        assert_eq!(ctx.joins().unwrap().table_count(), 1);
    }

    #[test]
    fn test_to_many_relationship_cannot_end_a_path() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let root = QueryRoot::Obj("Artist".to_string());
        let mut ctx = TranslationContext::rooted(&adapter, &map, &root, true).unwrap();
        let err = ctx.resolve(&Expression::path("paintingArray")).unwrap_err();
        assert!(err.is_query_shape());
    }

    #[test]
    fn test_unaliased_context_rejects_joins() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let mut ctx = TranslationContext::rooted(&adapter, &map, &painting_root(), false).unwrap();
        assert_eq!(ctx.resolve(&Expression::path("paintingTitle")).unwrap().sql(), "PAINTING_TITLE");
        assert!(matches!(
            ctx.resolve(&Expression::path("toArtist.artistName")),
            Err(CayenneError::Unsupported(_))
        ));
        assert!(ctx.root_alias().is_err());
    }

    #[test]
    fn test_db_path_on_table_root() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let root = QueryRoot::Db("PAINTING".to_string());
        let mut ctx = TranslationContext::rooted(&adapter, &map, &root, true).unwrap();
        assert_eq!(
            ctx.resolve(&Expression::path("db:toArtist.ARTIST_NAME")).unwrap().sql(),
            "t1.ARTIST_NAME"
        );
        // object paths need an object root
        assert!(ctx.resolve(&Expression::path("paintingTitle")).is_err());
    }

    #[test]
    fn test_binding_conversion_uses_attribute_type() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let attribute = map.db_entity("ARTIST").unwrap().attribute("ARTIST_ID").unwrap();
        let binding = ParameterBinding {
            attribute: Some(attribute.clone()),
            value: Value::Null,
        };
        assert_eq!(
            binding.to_param(adapter.extended_types()).unwrap(),
            SqlParam::Null(Some(JdbcType::BigInt))
        );
    }
}
