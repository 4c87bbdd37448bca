use crate::adapter::DbAdapter;
use crate::error::{CayenneError, CayenneResult};
use crate::map::{DataMap, DbAttribute, DbEntity};
use crate::query::{BatchKind, BatchQuery};
use crate::types::{SqlParam, Value};

/// Statement builder and row binder for one [`BatchQuery`].
///
/// Column attributes (and so their SQL type and precision) are looked up
/// once, when the translator is built.
pub struct BatchTranslator<'a> {
    adapter: &'a dyn DbAdapter,
    query: &'a BatchQuery,
    entity: &'a DbEntity,
    columns: Vec<&'a DbAttribute>,
    qualifier: Vec<&'a DbAttribute>,
}

fn attributes<'a>(entity: &'a DbEntity, names: &[String]) -> CayenneResult<Vec<&'a DbAttribute>> {
    names
        .iter()
        .map(|name| {
            entity.attribute(name).ok_or_else(|| {
                CayenneError::invalid_path(&entity.name, name, "no such column")
            })
        })
        .collect()
}

impl<'a> BatchTranslator<'a> {
    pub fn new(adapter: &'a dyn DbAdapter, map: &'a DataMap, query: &'a BatchQuery) -> CayenneResult<Self> {
        let entity = map.require_db_entity(&query.entity)?;
        let columns = attributes(entity, &query.columns)?;
        let qualifier = attributes(entity, &query.qualifier_columns)?;

        let missing = match query.kind {
            BatchKind::Insert => columns.is_empty().then_some("INSERT needs columns"),
            BatchKind::Update if columns.is_empty() => Some("UPDATE needs columns"),
            BatchKind::Update | BatchKind::Delete => qualifier
                .is_empty()
                .then_some("UPDATE and DELETE batches need qualifier columns"),
        };
        if let Some(reason) = missing {
            return Err(CayenneError::Expression(format!("{} batch on '{}': {}", kind_name(query.kind), entity.name, reason)));
        }

        let width = query.row_width();
        if let Some((i, row)) = query.rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(CayenneError::Expression(format!(
                "batch row {} has {} values, expected {}",
                i,
                row.len(),
                width
            )));
        }

        Ok(Self {
            adapter,
            query,
            entity,
            columns,
            qualifier,
        })
    }

    pub fn query(&self) -> &'a BatchQuery {
        self.query
    }

    /// The statement shared by every row of a driver batch.
    pub fn sql(&self) -> String {
        self.build(None)
    }

    /// The statement for one row executed on its own: qualifier columns
    /// whose value is null compare with `IS NULL`.
    pub fn sql_for_row(&self, row: &[Value]) -> String {
        self.build(Some(row))
    }

    fn build(&self, row: Option<&[Value]>) -> String {
        let table = self.entity.fully_qualified_name();
        let mut position = 0;
        let mut next = || {
            position += 1;
            self.adapter.parameter_placeholder(position)
        };

        match self.query.kind {
            BatchKind::Insert => {
                let names: Vec<&str> = self.columns.iter().map(|a| a.name.as_str()).collect();
                let values: Vec<String> = self.columns.iter().map(|_| next()).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    names.join(", "),
                    values.join(", ")
                )
            }
            BatchKind::Update => {
                let sets: Vec<String> = self
                    .columns
                    .iter()
                    .map(|a| format!("{} = {}", a.name, next()))
                    .collect();
                let offset = self.columns.len();
                let conditions = self.conditions(row, offset, &mut next);
                format!("UPDATE {} SET {} WHERE {}", table, sets.join(", "), conditions)
            }
            BatchKind::Delete => {
                let conditions = self.conditions(row, 0, &mut next);
                format!("DELETE FROM {} WHERE {}", table, conditions)
            }
        }
    }

    fn conditions(&self, row: Option<&[Value]>, offset: usize, next: &mut impl FnMut() -> String) -> String {
        self.qualifier
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let is_null = row
                    .and_then(|r| r.get(offset + i))
                    .is_some_and(Value::is_null);
                if is_null {
                    format!("{} IS NULL", a.name)
                } else {
                    format!("{} = {}", a.name, next())
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Driver values for one row, by position. With
    /// `skip_null_qualifiers` the null qualifier values rendered as
    /// `IS NULL` by [`Self::sql_for_row`] are left out.
    pub fn bind_row(&self, row: &[Value], skip_null_qualifiers: bool) -> CayenneResult<Vec<SqlParam>> {
        let types = self.adapter.extended_types();
        let attributes = self.columns.iter().chain(self.qualifier.iter());
        let mut params = Vec::with_capacity(row.len());
        for (i, (attribute, value)) in attributes.zip(row).enumerate() {
            if skip_null_qualifiers && i >= self.columns.len() && value.is_null() {
                continue;
            }
            params.push(types.bind(value, Some(attribute.jdbc_type), attribute.max_length)?);
        }
        Ok(params)
    }
}

fn kind_name(kind: BatchKind) -> &'static str {
    match kind {
        BatchKind::Insert => "INSERT",
        BatchKind::Update => "UPDATE",
        BatchKind::Delete => "DELETE",
    }
}
