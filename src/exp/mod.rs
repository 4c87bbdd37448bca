//! Qualifier expressions: the tree, its builders and a text parser.
mod expression;
mod parser;

pub use expression::*;
pub use parser::parse_qualifier;
