pub mod access;
pub mod adapter;
pub mod config;
pub mod db;
pub mod error;
pub mod exp;
pub mod export;
pub mod map;
pub mod query;
pub mod translator;
pub mod types;

pub use error::{CayenneError, CayenneResult};
