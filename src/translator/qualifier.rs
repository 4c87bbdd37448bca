use crate::error::{CayenneError, CayenneResult};
use crate::exp::{BinaryOperator, Expression};
use crate::map::DbAttribute;
use crate::types::Value;

use super::assembler::TranslationContext;

/// Render a qualifier as a SQL boolean expression, registering its
/// parameters on `ctx`. `None` in, `None` out.
pub fn translate_qualifier<'a>(
    ctx: &mut TranslationContext<'a>,
    qualifier: Option<&Expression>,
) -> CayenneResult<Option<String>> {
    match qualifier {
        Some(expr) => QualifierTranslator { ctx }.node(expr, false, None).map(Some),
        None => Ok(None),
    }
}

struct QualifierTranslator<'c, 'a> {
    ctx: &'c mut TranslationContext<'a>,
}

fn parenthesize(sql: String, has_parent: bool) -> String {
    if has_parent {
        format!("({})", sql)
    } else {
        sql
    }
}

impl<'c, 'a> QualifierTranslator<'c, 'a> {
    /// `hint` is the column on the other side of the enclosing comparison;
    /// literal leaves bind with its type.
    fn node(
        &mut self,
        expr: &Expression,
        has_parent: bool,
        hint: Option<&'a DbAttribute>,
    ) -> CayenneResult<String> {
        match expr {
            Expression::And(operands) => self
                .joined(operands, " AND ")
                .map(|sql| parenthesize(sql, has_parent)),
            Expression::Or(operands) => self
                .joined(operands, " OR ")
                .map(|sql| parenthesize(sql, has_parent)),
            Expression::Not(inner) => {
                let sql = format!("NOT {}", self.node(inner, true, None)?);
                Ok(parenthesize(sql, has_parent))
            }
            Expression::Negative(inner) => {
                let sql = format!("-{}", self.node(inner, true, hint)?);
                Ok(parenthesize(sql, has_parent))
            }
            Expression::Binary { op, left, right } => {
                self.binary(*op, left, right).map(|sql| parenthesize(sql, has_parent))
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let column = self.column(expr)?;
                let target = match &column {
                    Some((sql, _)) => sql.clone(),
                    None => self.node(expr, true, None)?,
                };
                let attribute = column.map(|(_, a)| a);
                let low = self.node(low, true, attribute)?;
                let high = self.node(high, true, attribute)?;
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                let sql = format!("{} {} {} AND {}", target, keyword, low, high);
                Ok(parenthesize(sql, has_parent))
            }
            Expression::ObjPath(_) | Expression::DbPath(_) => {
                Ok(self.ctx.resolve(expr)?.sql())
            }
            Expression::Scalar(Value::Null) => Ok("NULL".to_string()),
            Expression::Scalar(value) => Ok(self.ctx.bind(hint, value.clone())),
            Expression::List(values) => self.list(values, hint),
            Expression::Parameter(name) => Err(CayenneError::Expression(format!(
                "parameter '${}' has no value",
                name
            ))),
        }
    }

    fn joined(&mut self, operands: &[Expression], separator: &str) -> CayenneResult<String> {
        let parts = operands
            .iter()
            .map(|o| self.node(o, true, None))
            .collect::<CayenneResult<Vec<_>>>()?;
        Ok(parts.join(separator))
    }

    /// Resolve `expr` when it is a path: its SQL and its column.
    fn column(&mut self, expr: &Expression) -> CayenneResult<Option<(String, &'a DbAttribute)>> {
        if expr.is_path() {
            let resolved = self.ctx.resolve(expr)?;
            Ok(Some((resolved.sql(), resolved.attribute)))
        } else {
            Ok(None)
        }
    }

    fn binary(&mut self, op: BinaryOperator, left: &Expression, right: &Expression) -> CayenneResult<String> {
        // paths resolve first so that each literal can bind with the type
        // of the column it is compared with
        let left_column = self.column(left)?;
        let right_column = self.column(right)?;
        let left_hint = right_column.as_ref().map(|(_, a)| *a).filter(|_| op.is_comparison());
        let right_hint = left_column.as_ref().map(|(_, a)| *a).filter(|_| op.is_comparison());

        if matches!(op, BinaryOperator::EqualTo | BinaryOperator::NotEqualTo) {
            let keyword = if op == BinaryOperator::EqualTo { "IS NULL" } else { "IS NOT NULL" };
            let null_side = match (left, right) {
                (_, Expression::Scalar(Value::Null)) => Some((left, left_column.clone(), right_hint)),
                (Expression::Scalar(Value::Null), _) => Some((right, right_column.clone(), left_hint)),
                _ => None,
            };
            if let Some((operand, column, hint)) = null_side {
                let sql = match column {
                    Some((sql, _)) => sql,
                    None => self.node(operand, true, hint)?,
                };
                return Ok(format!("{} {}", sql, keyword));
            }
        }

        if matches!(op, BinaryOperator::In | BinaryOperator::NotIn)
            && !matches!(right, Expression::List(_) | Expression::Parameter(_))
        {
            return Err(CayenneError::Expression(format!(
                "{} needs a list on its right side",
                op.sql()
            )));
        }

        let left_sql = match left_column {
            Some((sql, _)) => sql,
            None => self.node(left, true, left_hint)?,
        };
        let right_sql = match right_column {
            Some((sql, _)) => sql,
            None => self.node(right, true, right_hint)?,
        };

        if op.is_ignore_case() {
            let upper = self.ctx.adapter().upper_function();
            Ok(format!(
                "{upper}({}) {} {upper}({})",
                left_sql,
                op.sql(),
                right_sql
            ))
        } else {
            Ok(format!("{} {} {}", left_sql, op.sql(), right_sql))
        }
    }

    fn list(&mut self, values: &[Value], hint: Option<&'a DbAttribute>) -> CayenneResult<String> {
        if values.is_empty() {
            return Err(CayenneError::Expression("IN list is empty".to_string()));
        }
        let items: Vec<String> = values
            .iter()
            .map(|v| match v {
                Value::Null => "NULL".to_string(),
                v => self.ctx.bind(hint, v.clone()),
            })
            .collect();
        Ok(format!("({})", items.join(", ")))
    }
}
