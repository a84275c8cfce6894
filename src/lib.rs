pub use graph_oplog_config as config;
pub use graph_oplog_store as store;
pub use graph_oplog_sync as sync;

pub mod cli;
