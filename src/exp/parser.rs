/// Qualifier text → expression tree.
///
/// Uses `sqlparser` as the front end, so qualifiers are written in SQL
/// expression syntax over paths: `paintingArray.paintingTitle = 'X' and
/// artistName ilike 'd%'`. A path whose first segment is `db` is a database
/// path (`db.ARTIST_NAME`), and `$name` is a named parameter.
use sqlparser::ast as sp;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;

use crate::error::{CayenneError, CayenneResult};
use crate::types::Value;

use super::expression::{BinaryOperator, Expression};

pub fn parse_qualifier(text: &str) -> CayenneResult<Expression> {
    let dialect = PostgreSqlDialect {};
    let expr = SqlParser::new(&dialect)
        .try_with_sql(text)
        .and_then(|mut p| p.parse_expr())
        .map_err(|e| CayenneError::Expression(format!("Can't parse '{}': {}", text, e)))?;
    convert_expr(expr)
}

fn unsupported(expr: &sp::Expr) -> CayenneError {
    CayenneError::Expression(format!("Unsupported qualifier element: {}", expr))
}

fn convert_path(parts: Vec<sp::Ident>) -> Expression {
    let names: Vec<String> = parts.into_iter().map(|p| p.value).collect();
    match names.split_first() {
        Some((first, rest)) if first == "db" && !rest.is_empty() => {
            Expression::DbPath(rest.join("."))
        }
        _ => Expression::ObjPath(names.join(".")),
    }
}

fn convert_expr(expr: sp::Expr) -> CayenneResult<Expression> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(convert_path(vec![ident])),
        sp::Expr::CompoundIdentifier(parts) => Ok(convert_path(parts)),
        sp::Expr::Value(val) => convert_value(val),
        sp::Expr::Nested(inner) => convert_expr(*inner),
        sp::Expr::BinaryOp { left, op, right } => {
            let left = convert_expr(*left)?;
            let right = convert_expr(*right)?;
            match op {
                sp::BinaryOperator::And => Ok(left.and(right)),
                sp::BinaryOperator::Or => Ok(left.or(right)),
                other => Ok(Expression::binary(convert_binary_op(other)?, left, right)),
            }
        }
        sp::Expr::UnaryOp { op, expr } => match op {
            sp::UnaryOperator::Not => Ok(convert_expr(*expr)?.not()),
            sp::UnaryOperator::Plus => convert_expr(*expr),
            sp::UnaryOperator::Minus => match convert_expr(*expr)? {
                Expression::Scalar(Value::Long(i)) => Ok(Expression::Scalar(Value::Long(-i))),
                Expression::Scalar(Value::Double(f)) => Ok(Expression::Scalar(Value::Double(-f))),
                other => Ok(Expression::Negative(Box::new(other))),
            },
            other => Err(CayenneError::Expression(format!(
                "Unsupported unary operator: {}",
                other
            ))),
        },
        sp::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let op = if negated {
                BinaryOperator::NotLike
            } else {
                BinaryOperator::Like
            };
            Ok(Expression::binary(
                op,
                convert_expr(*expr)?,
                convert_expr(*pattern)?,
            ))
        }
        sp::Expr::ILike {
            negated,
            expr,
            pattern,
            ..
        } => {
            let op = if negated {
                BinaryOperator::NotLikeIgnoreCase
            } else {
                BinaryOperator::LikeIgnoreCase
            };
            Ok(Expression::binary(
                op,
                convert_expr(*expr)?,
                convert_expr(*pattern)?,
            ))
        }
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => {
            let values = list
                .into_iter()
                .map(|item| match convert_expr(item)? {
                    Expression::Scalar(v) => Ok(v),
                    other => Err(CayenneError::Expression(format!(
                        "IN list elements must be literals, found {}",
                        other
                    ))),
                })
                .collect::<CayenneResult<Vec<_>>>()?;
            let op = if negated {
                BinaryOperator::NotIn
            } else {
                BinaryOperator::In
            };
            Ok(Expression::binary(
                op,
                convert_expr(*expr)?,
                Expression::List(values),
            ))
        }
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expression::Between {
            expr: Box::new(convert_expr(*expr)?),
            low: Box::new(convert_expr(*low)?),
            high: Box::new(convert_expr(*high)?),
            negated,
        }),
        sp::Expr::IsNull(expr) => Ok(Expression::binary(
            BinaryOperator::EqualTo,
            convert_expr(*expr)?,
            Expression::Scalar(Value::Null),
        )),
        sp::Expr::IsNotNull(expr) => Ok(Expression::binary(
            BinaryOperator::NotEqualTo,
            convert_expr(*expr)?,
            Expression::Scalar(Value::Null),
        )),
        other => Err(unsupported(&other)),
    }
}

fn convert_value(val: sp::Value) -> CayenneResult<Expression> {
    match val {
        sp::Value::Null => Ok(Expression::Scalar(Value::Null)),
        sp::Value::Boolean(b) => Ok(Expression::Scalar(Value::Bool(b))),
        sp::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Expression::Scalar(Value::Long(i)))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(Expression::Scalar(Value::Double(f)))
            } else {
                Err(CayenneError::Expression(format!("Invalid number: {}", n)))
            }
        }
        sp::Value::SingleQuotedString(s) => Ok(Expression::Scalar(Value::String(s))),
        sp::Value::Placeholder(p) => match p.strip_prefix('$') {
            Some(name) if !name.is_empty() => Ok(Expression::Parameter(name.to_string())),
            _ => Err(CayenneError::Expression(format!(
                "Invalid parameter placeholder: {}",
                p
            ))),
        },
        other => Err(CayenneError::Expression(format!(
            "Unsupported literal: {}",
            other
        ))),
    }
}

fn convert_binary_op(op: sp::BinaryOperator) -> CayenneResult<BinaryOperator> {
    match op {
        sp::BinaryOperator::Eq => Ok(BinaryOperator::EqualTo),
        sp::BinaryOperator::NotEq => Ok(BinaryOperator::NotEqualTo),
        sp::BinaryOperator::Lt => Ok(BinaryOperator::LessThan),
        sp::BinaryOperator::LtEq => Ok(BinaryOperator::LessThanEqualTo),
        sp::BinaryOperator::Gt => Ok(BinaryOperator::GreaterThan),
        sp::BinaryOperator::GtEq => Ok(BinaryOperator::GreaterThanEqualTo),
        sp::BinaryOperator::Plus => Ok(BinaryOperator::Add),
        sp::BinaryOperator::Minus => Ok(BinaryOperator::Subtract),
        sp::BinaryOperator::Multiply => Ok(BinaryOperator::Multiply),
        sp::BinaryOperator::Divide => Ok(BinaryOperator::Divide),
        other => Err(CayenneError::Expression(format!(
            "Unsupported operator: {}",
            other
        ))),
    }
}
