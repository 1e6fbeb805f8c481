use edgestore_primitives::{Colo, EdgeTypeId, Gid};
use edgestore_schema::{SchemaError, ValidationError};
use edgestore_shard::ShardError;
use thiserror::Error;

/// The umbrella error type for the whole runtime, composing the
/// per-concern enums the way a datastore error composes table/index/
/// sequence errors.
#[derive(Debug, Error, Clone)]
pub enum EdgeStoreError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage error: {0}")]
    Storage(#[from] ShardError),
    #[error("attempted to write or read `{attr}` outside an appropriate lock")]
    LockRequired { attr: String },
    #[error("nested lock requested colo {colo} outside the outer lock's colo set")]
    LockExpansion { colo: Colo },
    #[error("edge ({0}, {1}, {2}) already exists")]
    DuplicateInstance(EdgeTypeId, Gid, Gid),
    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

/// Errors the query planner raises before a query ever runs: multiple
/// inequality attrs, order/inequality disagreement, no matching index, or
/// a unique index used outside a colo scope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("at most one inequality attribute is allowed per query, found a second on `{0}`")]
    MultipleInequalityAttrs(String),
    #[error("order attribute `{0}` disagrees with the inequality attribute `{1}`")]
    OrderInequalityMismatch(String, String),
    #[error("no declared index matches this query")]
    NoMatchingIndex,
    #[error("unique index `{0}` cannot be used outside a single-colo scope")]
    UniqueIndexNeedsColoScope(String),
    #[error("query's explicit colo conflicts with the colo implied by its local-gid equality arg")]
    ConflictingColo,
}
