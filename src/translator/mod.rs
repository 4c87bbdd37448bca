//! Query → SQL translation.
//!
//! Each translator turns one kind of query into a [`TranslatedQuery`]: the
//! SQL text, its bound parameters in placeholder order, and the result
//! columns when they are known up front. Translators share a
//! [`TranslationContext`] that owns the parameter list, resolves paths and,
//! for SELECTs, keeps the table aliases and relationship joins.
mod assembler;
mod batch;
mod joins;
mod ordering;
mod procedure;
mod qualifier;
mod select;
mod sql_template;
mod update;

pub use assembler::{ParameterBinding, ResolvedColumn, TranslatedQuery, TranslationContext};
pub use batch::BatchTranslator;
pub use joins::{JoinStack, ROOT_ALIAS};
pub use ordering::translate_orderings;
pub use procedure::translate_procedure;
pub use qualifier::translate_qualifier;
pub use select::translate_select;
pub use sql_template::translate_sql_template;
pub use update::{translate_delete, translate_update};

use crate::adapter::DbAdapter;
use crate::error::{CayenneError, CayenneResult};
use crate::map::DataMap;
use crate::query::Query;

/// Translate any single-statement query. Batches produce one statement
/// per execution plan and go through [`BatchTranslator`] instead.
pub fn translate_query(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    query: &Query,
) -> CayenneResult<TranslatedQuery> {
    match query {
        Query::Select(q) => translate_select(adapter, map, q),
        Query::SqlTemplate(q) => translate_sql_template(adapter, map, q),
        Query::Procedure(q) => translate_procedure(adapter, map, q),
        Query::Update(q) => translate_update(adapter, map, q),
        Query::Delete(q) => translate_delete(adapter, map, q),
        Query::Batch(_) => Err(CayenneError::Unsupported(
            "batch queries are translated with BatchTranslator".to_string(),
        )),
    }
}
