//! Running translated queries against a data node.
mod action;
mod node;
mod observer;
mod pk;

pub use action::{Action, BatchAction};
pub use node::DataNode;
pub use observer::{CollectingObserver, ObserverError, OperationObserver, QueryOutcome};
pub use pk::{
    pk_create_string, pk_delete_string, pk_select_string, pk_table_create_string,
    pk_update_string, JdbcPkGenerator, PkRange, PkRetrieveObserver, AUTO_PK_START, AUTO_PK_TABLE,
    DEFAULT_PK_CACHE_SIZE,
};
