use edgestore_primitives::{Colo, EdgeTypeId, Gid};

use crate::error::ShardError;
use crate::row::{AddOutcome, AddRequest, DeleteRequest, EdgeRow, QueryRequest, ScoredRow};

/// Opaque handle to an open transaction on a [`ShardBackend`]. A real SQL
/// backend would wrap a driver's own transaction/connection handle; here
/// it is just a generation counter the backend uses to detect stale calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(pub u64);

/// Wraps one physical DB connection and implements the edge-row protocol
/// inside SQL transactions. All write operations below execute against the
/// transaction opened by [`ShardBackend::begin`]; a connection has exactly
/// one transaction open at a time, mirroring one physical DB connection
/// per shard.
pub trait ShardBackend: Send + Sync {
    /// Opens a transaction. Fails with [`ShardError::TransactionInProgress`]
    /// if one is already open on this connection.
    fn begin(&self) -> Result<TxnId, ShardError>;

    /// Commits the open transaction, making its writes visible.
    fn commit(&self, txn: TxnId) -> Result<(), ShardError>;

    /// Rolls back the open transaction, discarding its writes.
    fn rollback(&self, txn: TxnId) -> Result<(), ShardError>;

    /// Acquires an advisory row lock on `colo` by upserting its counter
    /// row. Must be called inside `txn`; the row lock is held until the
    /// transaction commits or rolls back. Callers must acquire locks in
    /// ascending `colo` order across a multi-colo lock scope to avoid
    /// deadlock.
    fn lock_colo(&self, txn: TxnId, colo: Colo) -> Result<(), ShardError>;

    /// Upserts `(colo, counter)` and returns a fresh counter value,
    /// combined by the caller into a [`Gid`]. Also serves as the mechanism
    /// behind `lock_colo`.
    fn next_colo_counter(&self, txn: TxnId, colo: Colo) -> Result<u32, ShardError>;

    /// Upserts `name` into the shared definitions table, returning its
    /// stable id and whether it was just allocated. The definitions table
    /// lives on one designated shard; callers route here only for that
    /// shard.
    fn add_or_get_definition_type(&self, txn: TxnId, name: &str) -> Result<(u64, bool), ShardError>;

    /// Writes one edge row and its index rows, bumping `revision`.
    fn add(&self, txn: TxnId, req: AddRequest) -> Result<AddOutcome, ShardError>;

    /// Removes one edge row and its index rows. Returns whether a row was
    /// actually removed.
    fn delete(&self, txn: TxnId, req: DeleteRequest) -> Result<bool, ShardError>;

    /// Runs a by-parent or by-index scan.
    fn query(&self, txn: TxnId, req: QueryRequest) -> Result<Vec<ScoredRow>, ShardError>;

    /// Fetches one edge row by its full key.
    fn get(&self, txn: TxnId, edgetype: EdgeTypeId, gid1: Gid, gid2: Gid) -> Result<Option<EdgeRow>, ShardError>;

    /// Counts edges for `(edgetype, gid1)`; defaults to 0 when no meta row
    /// exists.
    fn count(&self, txn: TxnId, edgetype: EdgeTypeId, gid1: Gid) -> Result<u64, ShardError>;
}
