//! Qualifier expression tree.
//!
//! The node set is closed: boolean connectives, comparisons, pattern
//! matching, membership, ranges, arithmetic, and the leaves (object paths,
//! database paths, scalar literals, literal lists and named parameters).

use std::collections::HashMap;
use std::fmt;

use crate::types::Value;

/// Prefix marking a path as a database path in the builder API.
pub const DB_PATH_PREFIX: &str = "db:";

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Two or more operands joined by AND.
    And(Vec<Expression>),
    /// Two or more operands joined by OR.
    Or(Vec<Expression>),
    Not(Box<Expression>),
    /// Arithmetic negation.
    Negative(Box<Expression>),
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    /// Dot-separated object property path, relative to the root entity.
    ObjPath(String),
    /// Dot-separated column path, relative to the root table.
    DbPath(String),
    Scalar(Value),
    /// Literal list, the right side of IN.
    List(Vec<Value>),
    /// Named parameter, substituted by [`Expression::with_parameters`].
    Parameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanEqualTo,
    GreaterThan,
    GreaterThanEqualTo,
    Like,
    NotLike,
    LikeIgnoreCase,
    NotLikeIgnoreCase,
    In,
    NotIn,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    /// Infix SQL operator. The ignore-case variants render as plain
    /// LIKE with both operands wrapped in an uppercasing function.
    pub fn sql(self) -> &'static str {
        match self {
            BinaryOperator::EqualTo => "=",
            BinaryOperator::NotEqualTo => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqualTo => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqualTo => ">=",
            BinaryOperator::Like | BinaryOperator::LikeIgnoreCase => "LIKE",
            BinaryOperator::NotLike | BinaryOperator::NotLikeIgnoreCase => "NOT LIKE",
            BinaryOperator::In => "IN",
            BinaryOperator::NotIn => "NOT IN",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }

    pub fn is_ignore_case(self) -> bool {
        matches!(
            self,
            BinaryOperator::LikeIgnoreCase | BinaryOperator::NotLikeIgnoreCase
        )
    }

    /// Comparisons whose right operand takes its SQL type from a path on the left.
    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }

    fn text(self) -> &'static str {
        match self {
            BinaryOperator::LikeIgnoreCase => "ILIKE",
            BinaryOperator::NotLikeIgnoreCase => "NOT ILIKE",
            other => other.sql(),
        }
    }
}

impl Expression {
    /// A path leaf; `db:` prefixed paths become database paths.
    pub fn path(path: impl Into<String>) -> Expression {
        let path = path.into();
        match path.strip_prefix(DB_PATH_PREFIX) {
            Some(db) => Expression::DbPath(db.to_string()),
            None => Expression::ObjPath(path),
        }
    }

    pub fn scalar(value: impl Into<Value>) -> Expression {
        Expression::Scalar(value.into())
    }

    pub fn param(name: impl Into<String>) -> Expression {
        Expression::Parameter(name.into())
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `path = value`
    pub fn match_exp(path: &str, value: impl Into<Value>) -> Expression {
        Self::binary(
            BinaryOperator::EqualTo,
            Self::path(path),
            Self::scalar(value),
        )
    }

    pub fn no_match_exp(path: &str, value: impl Into<Value>) -> Expression {
        Self::binary(
            BinaryOperator::NotEqualTo,
            Self::path(path),
            Self::scalar(value),
        )
    }

    pub fn less_exp(path: &str, value: impl Into<Value>) -> Expression {
        Self::binary(BinaryOperator::LessThan, Self::path(path), Self::scalar(value))
    }

    pub fn greater_exp(path: &str, value: impl Into<Value>) -> Expression {
        Self::binary(
            BinaryOperator::GreaterThan,
            Self::path(path),
            Self::scalar(value),
        )
    }

    pub fn like_exp(path: &str, pattern: impl Into<Value>) -> Expression {
        Self::binary(BinaryOperator::Like, Self::path(path), Self::scalar(pattern))
    }

    pub fn like_ignore_case_exp(path: &str, pattern: impl Into<Value>) -> Expression {
        Self::binary(
            BinaryOperator::LikeIgnoreCase,
            Self::path(path),
            Self::scalar(pattern),
        )
    }

    pub fn in_exp(path: &str, values: Vec<Value>) -> Expression {
        Self::binary(BinaryOperator::In, Self::path(path), Expression::List(values))
    }

    pub fn between_exp(path: &str, low: impl Into<Value>, high: impl Into<Value>) -> Expression {
        Expression::Between {
            expr: Box::new(Self::path(path)),
            low: Box::new(Self::scalar(low)),
            high: Box::new(Self::scalar(high)),
            negated: false,
        }
    }

    /// AND this expression with another, flattening nested ANDs.
    pub fn and(self, other: Expression) -> Expression {
        let mut operands = match self {
            Expression::And(ops) => ops,
            e => vec![e],
        };
        match other {
            Expression::And(ops) => operands.extend(ops),
            e => operands.push(e),
        }
        Expression::And(operands)
    }

    pub fn or(self, other: Expression) -> Expression {
        let mut operands = match self {
            Expression::Or(ops) => ops,
            e => vec![e],
        };
        match other {
            Expression::Or(ops) => operands.extend(ops),
            e => operands.push(e),
        }
        Expression::Or(operands)
    }

    pub fn not(self) -> Expression {
        Expression::Not(Box::new(self))
    }

    pub fn operand_count(&self) -> usize {
        match self {
            Expression::And(ops) | Expression::Or(ops) => ops.len(),
            Expression::Not(_) | Expression::Negative(_) => 1,
            Expression::Binary { .. } => 2,
            Expression::Between { .. } => 3,
            Expression::ObjPath(_)
            | Expression::DbPath(_)
            | Expression::Scalar(_)
            | Expression::List(_)
            | Expression::Parameter(_) => 1,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Expression::ObjPath(_)
                | Expression::DbPath(_)
                | Expression::Scalar(_)
                | Expression::List(_)
                | Expression::Parameter(_)
        )
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Expression::ObjPath(_) | Expression::DbPath(_))
    }

    /// Names of all parameters referenced by this tree, in traversal order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_parameters(&mut names);
        names
    }

    fn collect_parameters<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Parameter(name) => names.push(name),
            Expression::And(ops) | Expression::Or(ops) => {
                ops.iter().for_each(|o| o.collect_parameters(names))
            }
            Expression::Not(e) | Expression::Negative(e) => e.collect_parameters(names),
            Expression::Binary { left, right, .. } => {
                left.collect_parameters(names);
                right.collect_parameters(names);
            }
            Expression::Between {
                expr, low, high, ..
            } => {
                expr.collect_parameters(names);
                low.collect_parameters(names);
                high.collect_parameters(names);
            }
            _ => {}
        }
    }

    /// Substitute named parameters. With `prune_missing`, any condition that
    /// references a parameter absent from `params` is removed, and
    /// connectives left with fewer operands collapse; `None` means nothing
    /// remained. Without it, missing parameters stay in the tree.
    pub fn with_parameters(
        &self,
        params: &HashMap<String, Value>,
        prune_missing: bool,
    ) -> Option<Expression> {
        match self {
            Expression::Parameter(name) => match params.get(name) {
                Some(v) => Some(Expression::Scalar(v.clone())),
                None if prune_missing => None,
                None => Some(self.clone()),
            },
            Expression::And(ops) | Expression::Or(ops) => {
                let mut kept: Vec<Expression> = ops
                    .iter()
                    .filter_map(|o| o.with_parameters(params, prune_missing))
                    .collect();
                match kept.len() {
                    0 => None,
                    1 => kept.pop(),
                    _ if matches!(self, Expression::And(_)) => Some(Expression::And(kept)),
                    _ => Some(Expression::Or(kept)),
                }
            }
            Expression::Not(e) => e
                .with_parameters(params, prune_missing)
                .map(|e| Expression::Not(Box::new(e))),
            Expression::Negative(e) => e
                .with_parameters(params, prune_missing)
                .map(|e| Expression::Negative(Box::new(e))),
            Expression::Binary { op, left, right } => {
                let left = left.with_parameters(params, prune_missing)?;
                let right = right.with_parameters(params, prune_missing)?;
                Some(Expression::binary(*op, left, right))
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => Some(Expression::Between {
                expr: Box::new(expr.with_parameters(params, prune_missing)?),
                low: Box::new(low.with_parameters(params, prune_missing)?),
                high: Box::new(high.with_parameters(params, prune_missing)?),
                negated: *negated,
            }),
            leaf => Some(leaf.clone()),
        }
    }
}

fn fmt_value(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Char(c) => write!(f, "'{}'", c),
        Value::Null => write!(f, "null"),
        other => write!(f, "{}", other),
    }
}

fn fmt_operand(expr: &Expression, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if expr.is_leaf() {
        write!(f, "{}", expr)
    } else {
        write!(f, "({})", expr)
    }
}

/// Qualifier text in the syntax accepted by [`crate::exp::parse_qualifier`].
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::And(ops) | Expression::Or(ops) => {
                let sep = if matches!(self, Expression::And(_)) {
                    " and "
                } else {
                    " or "
                };
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    fmt_operand(op, f)?;
                }
                Ok(())
            }
            Expression::Not(e) => {
                f.write_str("not ")?;
                fmt_operand(e, f)
            }
            Expression::Negative(e) => {
                f.write_str("-")?;
                fmt_operand(e, f)
            }
            Expression::Binary { op, left, right } => {
                fmt_operand(left, f)?;
                write!(f, " {} ", op.text().to_lowercase())?;
                fmt_operand(right, f)
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => {
                fmt_operand(expr, f)?;
                f.write_str(if *negated { " not between " } else { " between " })?;
                fmt_operand(low, f)?;
                f.write_str(" and ")?;
                fmt_operand(high, f)
            }
            Expression::ObjPath(p) => f.write_str(p),
            Expression::DbPath(p) => write!(f, "db.{}", p),
            Expression::Scalar(v) => fmt_value(v, f),
            Expression::List(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_value(v, f)?;
                }
                f.write_str(")")
            }
            Expression::Parameter(name) => write!(f, "${}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix_selects_db_path() {
        assert_eq!(Expression::path("db:ARTIST_NAME"), Expression::DbPath("ARTIST_NAME".into()));
        assert_eq!(Expression::path("artistName"), Expression::ObjPath("artistName".into()));
    }

    #[test]
    fn test_and_flattens() {
        let e = Expression::match_exp("a", 1)
            .and(Expression::match_exp("b", 2))
            .and(Expression::match_exp("c", 3));
        assert_eq!(e.operand_count(), 3);
    }

    #[test]
    fn test_operand_counts_are_fixed() {
        assert_eq!(Expression::match_exp("a", 1).operand_count(), 2);
        assert_eq!(Expression::between_exp("a", 1, 2).operand_count(), 3);
        assert_eq!(Expression::match_exp("a", 1).not().operand_count(), 1);
    }

    #[test]
    fn test_with_parameters_substitutes() {
        let e = Expression::binary(
            BinaryOperator::EqualTo,
            Expression::path("artistName"),
            Expression::param("name"),
        );
        let params = HashMap::from([("name".to_string(), Value::from("Dali"))]);
        let bound = e.with_parameters(&params, false).unwrap();
        assert_eq!(bound, Expression::match_exp("artistName", "Dali"));
    }

    #[test]
    fn test_with_parameters_prunes_missing() {
        let e = Expression::binary(
            BinaryOperator::EqualTo,
            Expression::path("artistName"),
            Expression::param("name"),
        )
        .and(Expression::binary(
            BinaryOperator::GreaterThan,
            Expression::path("dateOfBirth"),
            Expression::param("born"),
        ));
        let params = HashMap::from([("name".to_string(), Value::from("Dali"))]);

        let pruned = e.with_parameters(&params, true).unwrap();
        assert_eq!(pruned, Expression::match_exp("artistName", "Dali"));

        let kept = e.with_parameters(&params, false).unwrap();
        assert_eq!(kept.parameter_names(), vec!["born"]);

        assert!(e.with_parameters(&HashMap::new(), true).is_none());
    }

    #[test]
    fn test_display() {
        let e = Expression::match_exp("artistName", "O'Keeffe")
            .or(Expression::in_exp("db:ARTIST_ID", vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            e.to_string(),
            "(artistName = 'O''Keeffe') or (db.ARTIST_ID in (1, 2))"
        );
    }
}
