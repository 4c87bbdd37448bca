use tracing::debug;

use crate::adapter::DbAdapter;
use crate::db::ColumnDescriptor;
use crate::error::CayenneResult;
use crate::exp::Expression;
use crate::map::DataMap;
use crate::query::SelectQuery;

use super::assembler::{TranslatedQuery, TranslationContext};
use super::ordering::translate_orderings;
use super::qualifier::translate_qualifier;

/// Build the SELECT for a query: every column of the root table, the
/// joins its paths cross, its qualifier and orderings.
pub fn translate_select(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    query: &SelectQuery,
) -> CayenneResult<TranslatedQuery> {
    let mut ctx = TranslationContext::rooted(adapter, map, &query.root, true)?;
    let alias = ctx.root_alias()?;

    // qualifier and orderings first; they populate the join stack
    let qualifier = translate_qualifier(&mut ctx, query.qualifier.as_ref())?;
    let order_by = translate_orderings(&mut ctx, &query.orderings)?;

    let entity = ctx.root_db_entity()?;
    let obj_entity = ctx.root_obj_entity();
    let mut column_sql = Vec::with_capacity(entity.attributes.len());
    let mut columns = Vec::with_capacity(entity.attributes.len());
    for attribute in &entity.attributes {
        column_sql.push(format!("{}.{}", alias, attribute.name));
        let mut descriptor = ColumnDescriptor::new(attribute.name.clone(), attribute.jdbc_type);
        if let Some(mapped) = obj_entity.and_then(|o| o.attribute_for_column(&attribute.name)) {
            descriptor = descriptor.with_kind(mapped.kind);
        }
        columns.push(descriptor);
    }

    let (from, mut conditions, distinct) = match ctx.joins() {
        Some(joins) => (
            joins.from_clause(),
            joins.join_conditions(),
            query.distinct || joins.force_distinct(),
        ),
        None => (entity.fully_qualified_name(), Vec::new(), query.distinct),
    };

    if let Some(qualifier) = qualifier {
        // an OR would bind looser than the join conditions
        match &query.qualifier {
            Some(Expression::Or(_)) if !conditions.is_empty() => {
                conditions.push(format!("({})", qualifier))
            }
            _ => conditions.push(qualifier),
        }
    }

    let mut parts = Vec::new();
    let mut select_clause = String::from("SELECT ");
    if distinct {
        select_clause.push_str("DISTINCT ");
    }
    select_clause.push_str(&column_sql.join(", "));
    parts.push(select_clause);
    parts.push(format!("FROM {}", from));
    if !conditions.is_empty() {
        parts.push(format!("WHERE {}", conditions.join(" AND ")));
    }
    if let Some(order_by) = order_by {
        parts.push(format!("ORDER BY {}", order_by));
    }

    let mut sql = parts.join(" ");
    if let Some(limit) = query.fetch_limit {
        sql = adapter.limit_sql(sql, limit);
    }

    debug!(sql = %sql, bindings = ctx.bindings().len(), "translated select");
    Ok(TranslatedQuery {
        sql,
        bindings: ctx.into_bindings(),
        columns,
    })
}
