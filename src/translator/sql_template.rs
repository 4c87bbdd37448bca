use crate::adapter::DbAdapter;
use crate::error::CayenneResult;
use crate::map::DataMap;
use crate::query::SqlTemplate;

use super::assembler::{TranslatedQuery, TranslationContext};

/// Pass raw SQL through unchanged. Parameters bind positionally with no
/// column metadata. Result columns are the template's own descriptor,
/// or empty to take them from the live result.
pub fn translate_sql_template(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    template: &SqlTemplate,
) -> CayenneResult<TranslatedQuery> {
    let mut ctx = TranslationContext::new(adapter, map);
    for value in &template.params {
        ctx.bind(None, value.clone());
    }
    Ok(TranslatedQuery {
        sql: template.sql.clone(),
        bindings: ctx.into_bindings(),
        columns: template.result_columns.clone().unwrap_or_default(),
    })
}
