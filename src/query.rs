//! Query objects handed to a data node.
//!
//! Queries are plain data: translators read them and never mutate them.

use std::collections::{BTreeSet, HashMap};

use crate::db::ColumnDescriptor;
use crate::exp::Expression;
use crate::types::{JdbcType, Value};

/// Top-level query representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    /// Raw SQL passthrough.
    SqlTemplate(SqlTemplate),
    Procedure(ProcedureQuery),
    Batch(BatchQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl Query {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Select(_) => "select",
            Query::SqlTemplate(_) => "sql template",
            Query::Procedure(_) => "procedure",
            Query::Batch(_) => "batch",
            Query::Update(_) => "update",
            Query::Delete(_) => "delete",
        }
    }
}

impl From<SelectQuery> for Query {
    fn from(q: SelectQuery) -> Self {
        Query::Select(q)
    }
}

impl From<SqlTemplate> for Query {
    fn from(q: SqlTemplate) -> Self {
        Query::SqlTemplate(q)
    }
}

impl From<ProcedureQuery> for Query {
    fn from(q: ProcedureQuery) -> Self {
        Query::Procedure(q)
    }
}

impl From<BatchQuery> for Query {
    fn from(q: BatchQuery) -> Self {
        Query::Batch(q)
    }
}

impl From<UpdateQuery> for Query {
    fn from(q: UpdateQuery) -> Self {
        Query::Update(q)
    }
}

impl From<DeleteQuery> for Query {
    fn from(q: DeleteQuery) -> Self {
        Query::Delete(q)
    }
}

/// The entity a query is rooted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRoot {
    /// An object entity; object paths resolve against it.
    Obj(String),
    /// A table; only database paths resolve.
    Db(String),
}

/// One ORDER BY element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    /// Object path, or a `db:` prefixed database path.
    pub path: String,
    pub ascending: bool,
    /// Compare uppercased values.
    pub case_insensitive: bool,
}

impl Ordering {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ascending: true,
            case_insensitive: false,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            ascending: false,
            ..Self::asc(path)
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn expression(&self) -> Expression {
        Expression::path(self.path.as_str())
    }
}

/// A SELECT of full rows of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub root: QueryRoot,
    pub qualifier: Option<Expression>,
    pub orderings: Vec<Ordering>,
    pub distinct: bool,
    pub fetch_limit: Option<usize>,
    /// Rows per page for paginated result lists; carried for the object layer.
    pub page_size: usize,
    /// Relationship paths to prefetch; carried for the object layer.
    pub prefetches: BTreeSet<String>,
}

impl SelectQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self::rooted(QueryRoot::Obj(entity.into()))
    }

    /// A query over a table rather than an object entity.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self::rooted(QueryRoot::Db(table.into()))
    }

    fn rooted(root: QueryRoot) -> Self {
        Self {
            root,
            qualifier: None,
            orderings: Vec::new(),
            distinct: false,
            fetch_limit: None,
            page_size: 0,
            prefetches: BTreeSet::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: Expression) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// AND another condition onto the current qualifier.
    pub fn and_qualifier(mut self, qualifier: Expression) -> Self {
        self.qualifier = Some(match self.qualifier.take() {
            Some(existing) => existing.and(qualifier),
            None => qualifier,
        });
        self
    }

    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = Some(limit);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn prefetch(mut self, path: impl Into<String>) -> Self {
        self.prefetches.insert(path.into());
        self
    }

    /// A copy with named parameters substituted into the qualifier. See
    /// [`Expression::with_parameters`] for `prune_missing`.
    pub fn with_parameters(&self, params: &HashMap<String, Value>, prune_missing: bool) -> Self {
        let mut query = self.clone();
        query.qualifier = self
            .qualifier
            .as_ref()
            .and_then(|q| q.with_parameters(params, prune_missing));
        query
    }
}

/// Literal SQL with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTemplate {
    pub sql: String,
    pub params: Vec<Value>,
    /// Result descriptor; when absent, the live result's metadata is used.
    pub result_columns: Option<Vec<ColumnDescriptor>>,
    /// Whether the statement returns rows.
    pub selecting: bool,
}

impl SqlTemplate {
    /// A template whose selecting flag is guessed from its leading keyword.
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let selecting = looks_like_select(&sql);
        Self {
            sql,
            params: Vec::new(),
            result_columns: None,
            selecting,
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_result_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.result_columns = Some(columns);
        self
    }

    pub fn selecting(mut self, selecting: bool) -> Self {
        self.selecting = selecting;
        self
    }
}

fn looks_like_select(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    ["SELECT", "WITH", "SHOW", "EXPLAIN", "TABLE", "VALUES"]
        .iter()
        .any(|kw| upper.starts_with(kw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterDirection {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureParameter {
    pub name: String,
    pub direction: ParameterDirection,
    pub jdbc_type: JdbcType,
    /// Ignored for `Out` parameters.
    pub value: Value,
}

/// A stored procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureQuery {
    pub name: String,
    pub schema: Option<String>,
    pub parameters: Vec<ProcedureParameter>,
    /// The procedure returns a result set (or OUT parameters as a row).
    pub returns_rows: bool,
    pub result_columns: Option<Vec<ColumnDescriptor>>,
}

impl ProcedureQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            parameters: Vec::new(),
            returns_rows: false,
            result_columns: None,
        }
    }

    pub fn in_param(mut self, name: impl Into<String>, jdbc_type: JdbcType, value: impl Into<Value>) -> Self {
        self.parameters.push(ProcedureParameter {
            name: name.into(),
            direction: ParameterDirection::In,
            jdbc_type,
            value: value.into(),
        });
        self
    }

    pub fn out_param(mut self, name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        self.parameters.push(ProcedureParameter {
            name: name.into(),
            direction: ParameterDirection::Out,
            jdbc_type,
            value: Value::Null,
        });
        self.returns_rows = true;
        self
    }

    pub fn returning_rows(mut self) -> Self {
        self.returns_rows = true;
        self
    }

    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Insert,
    Update,
    Delete,
}

/// One DML statement applied to many rows of a table.
///
/// Each row holds the values of `columns` followed by the values of
/// `qualifier_columns`. Inserts use only `columns`, deletes only
/// `qualifier_columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    pub kind: BatchKind,
    /// Table name.
    pub entity: String,
    pub columns: Vec<String>,
    pub qualifier_columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Every row must affect exactly one record.
    pub optimistic_locking: bool,
}

impl BatchQuery {
    pub fn insert(entity: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(BatchKind::Insert, entity, columns, &[])
    }

    pub fn update(entity: impl Into<String>, columns: &[&str], qualifier_columns: &[&str]) -> Self {
        Self::new(BatchKind::Update, entity, columns, qualifier_columns)
    }

    pub fn delete(entity: impl Into<String>, qualifier_columns: &[&str]) -> Self {
        Self::new(BatchKind::Delete, entity, &[], qualifier_columns)
    }

    fn new(kind: BatchKind, entity: impl Into<String>, columns: &[&str], qualifier_columns: &[&str]) -> Self {
        Self {
            kind,
            entity: entity.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            qualifier_columns: qualifier_columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            optimistic_locking: false,
        }
    }

    pub fn add_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn optimistic_locking(mut self) -> Self {
        self.optimistic_locking = true;
        self
    }

    /// Values each row must carry.
    pub fn row_width(&self) -> usize {
        self.columns.len() + self.qualifier_columns.len()
    }
}

/// UPDATE of every row matching a qualifier.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub root: QueryRoot,
    /// Attribute path and new value.
    pub values: Vec<(String, Value)>,
    pub qualifier: Option<Expression>,
}

impl UpdateQuery {
    pub fn new(root: QueryRoot) -> Self {
        Self {
            root,
            values: Vec::new(),
            qualifier: None,
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((path.into(), value.into()));
        self
    }

    pub fn with_qualifier(mut self, qualifier: Expression) -> Self {
        self.qualifier = Some(qualifier);
        self
    }
}

/// DELETE of every row matching a qualifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub root: QueryRoot,
    pub qualifier: Option<Expression>,
}

impl DeleteQuery {
    pub fn new(root: QueryRoot) -> Self {
        Self {
            root,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: Expression) -> Self {
        self.qualifier = Some(qualifier);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_selecting_guess() {
        assert!(SqlTemplate::new("  select 1").selecting);
        assert!(SqlTemplate::new("WITH x AS (SELECT 1) SELECT * FROM x").selecting);
        assert!(!SqlTemplate::new("UPDATE ARTIST SET ARTIST_NAME = 'x'").selecting);
        assert!(!SqlTemplate::new("SELECT 1").selecting(false).selecting);
    }

    #[test]
    fn test_and_qualifier_accumulates() {
        let q = SelectQuery::new("Artist")
            .and_qualifier(Expression::match_exp("artistName", "a"))
            .and_qualifier(Expression::match_exp("artistName", "b"));
        assert!(matches!(q.qualifier, Some(Expression::And(ref ops)) if ops.len() == 2));
    }

    #[test]
    fn test_with_parameters_leaves_original() {
        let q = SelectQuery::new("Artist").with_qualifier(Expression::binary(
            crate::exp::BinaryOperator::EqualTo,
            Expression::path("artistName"),
            Expression::param("name"),
        ));
        let params = HashMap::from([("name".to_string(), Value::from("Dali"))]);
        let bound = q.with_parameters(&params, true);
        assert_eq!(bound.qualifier, Some(Expression::match_exp("artistName", "Dali")));
        assert_eq!(q.qualifier.as_ref().map(|e| e.parameter_names().len()), Some(1));

        let pruned = q.with_parameters(&HashMap::new(), true);
        assert!(pruned.qualifier.is_none());
    }

    #[test]
    fn test_batch_row_width() {
        let q = BatchQuery::update("ARTIST", &["ARTIST_NAME"], &["ARTIST_ID"]);
        assert_eq!(q.row_width(), 2);
        assert_eq!(BatchQuery::delete("ARTIST", &["ARTIST_ID"]).row_width(), 1);
    }

    #[test]
    fn test_out_param_implies_rows() {
        let q = ProcedureQuery::new("count_paintings")
            .in_param("artist", JdbcType::BigInt, 1i64)
            .out_param("total", JdbcType::Integer);
        assert!(q.returns_rows);
        assert_eq!(q.parameters.len(), 2);
    }
}
