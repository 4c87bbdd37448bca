mod connection;
mod driver;
mod memory;
mod postgres;
mod schema;

pub use connection::*;
pub use driver::*;
pub use memory::*;
pub use postgres::*;
pub use schema::*;
