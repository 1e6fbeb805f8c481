use edgestore_primitives::{EdgeTypeId, Gid, IndexTypeId};
use thiserror::Error;

/// Errors a [`crate::ShardBackend`] can raise. All are fatal and trigger
/// the caller's rollback path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("edge ({0}, {1}, {2}) already exists")]
    DuplicateInstance(EdgeTypeId, Gid, Gid),
    #[error("unique index {0:?} already has a row for this value")]
    UniqueViolation(IndexTypeId),
    #[error("no transaction is open with id {0:?}")]
    NoSuchTransaction(u64),
    #[error("a transaction is already open on this shard")]
    TransactionInProgress,
    #[error("storage backend error: {0}")]
    Backend(String),
}
