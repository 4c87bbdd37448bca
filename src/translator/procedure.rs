use crate::adapter::DbAdapter;
use crate::error::CayenneResult;
use crate::map::{DataMap, DbAttribute};
use crate::query::{ParameterDirection, ProcedureQuery};
use crate::types::Value;

use super::assembler::{TranslatedQuery, TranslationContext};

/// Call statement for a stored procedure. Every parameter binds by
/// position with its declared type; OUT parameters bind as typed nulls.
pub fn translate_procedure(
    adapter: &dyn DbAdapter,
    map: &DataMap,
    query: &ProcedureQuery,
) -> CayenneResult<TranslatedQuery> {
    let mut ctx = TranslationContext::new(adapter, map);
    for parameter in &query.parameters {
        let attribute = DbAttribute::new(parameter.name.clone(), parameter.jdbc_type);
        let value = match parameter.direction {
            ParameterDirection::Out => Value::Null,
            ParameterDirection::In | ParameterDirection::InOut => parameter.value.clone(),
        };
        ctx.bind(Some(&attribute), value);
    }

    let sql = adapter.procedure_call_sql(
        &query.qualified_name(),
        query.parameters.len(),
        query.returns_rows,
    );
    Ok(TranslatedQuery {
        sql,
        bindings: ctx.into_bindings(),
        columns: query.result_columns.clone().unwrap_or_default(),
    })
}
