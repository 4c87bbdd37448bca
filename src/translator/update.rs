use tracing::debug;

use crate::adapter::DbAdapter;
use crate::error::{CayenneError, CayenneResult};
use crate::exp::Expression;
use crate::map::DataMap;
use crate::query::{DeleteQuery, UpdateQuery};

use super::assembler::{TranslatedQuery, TranslationContext};
use super::qualifier::translate_qualifier;

/// `UPDATE table SET col = ?, … [WHERE …]`. Paths may not cross
/// relationships; the statement has a single unaliased table.
pub fn translate_update(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    query: &UpdateQuery,
) -> CayenneResult<TranslatedQuery> {
    if query.values.is_empty() {
        return Err(CayenneError::Expression(
            "UPDATE has no values to set".to_string(),
        ));
    }

    let mut ctx = TranslationContext::rooted(adapter, map, &query.root, false)?;
    let table = ctx.root_db_entity()?.fully_qualified_name();

    let mut assignments = Vec::with_capacity(query.values.len());
    for (path, value) in &query.values {
        let column = ctx.resolve(&Expression::path(path.as_str()))?;
        let placeholder = ctx.bind(Some(column.attribute), value.clone());
        assignments.push(format!("{} = {}", column.sql(), placeholder));
    }

    let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
    if let Some(qualifier) = translate_qualifier(&mut ctx, query.qualifier.as_ref())? {
        sql.push_str(" WHERE ");
        sql.push_str(&qualifier);
    }

    debug!(sql = %sql, "translated update");
    Ok(TranslatedQuery {
        sql,
        bindings: ctx.into_bindings(),
        columns: Vec::new(),
    })
}

/// `DELETE FROM table [WHERE …]`.
pub fn translate_delete(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    query: &DeleteQuery,
) -> CayenneResult<TranslatedQuery> {
    let mut ctx = TranslationContext::rooted(adapter, map, &query.root, false)?;
    let mut sql = format!("DELETE FROM {}", ctx.root_db_entity()?.fully_qualified_name());
    if let Some(qualifier) = translate_qualifier(&mut ctx, query.qualifier.as_ref())? {
        sql.push_str(" WHERE ");
        sql.push_str(&qualifier);
    }

    debug!(sql = %sql, "translated delete");
    Ok(TranslatedQuery {
        sql,
        bindings: ctx.into_bindings(),
        columns: Vec::new(),
    })
}
