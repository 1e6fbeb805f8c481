//! The per-shard storage protocol: one physical DB connection's worth of
//! edge-row operations inside SQL transactions.
//!
//! [`ShardBackend`] is the trait a real SQL driver would implement;
//! [`MemoryShard`] is the in-process reference implementation used by the
//! rest of the workspace and by tests.

mod backend;
mod error;
mod memory;
mod row;

pub use backend::{ShardBackend, TxnId};
pub use error::ShardError;
pub use memory::MemoryShard;
pub use row::{
    AddOutcome, AddRequest, DeleteRequest, EdgeRow, IndexEntry, IndexRow, MetaRow, QueryRequest,
    ScoredRow,
};
