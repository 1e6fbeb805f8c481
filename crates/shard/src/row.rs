use edgestore_primitives::{EdgeTypeId, Gid, IndexTypeId, Revision};

/// One stored edge: the primary entity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRow {
    pub edgetype: EdgeTypeId,
    pub gid1: Gid,
    pub gid2: Gid,
    pub revision: Revision,
    pub encoding: u8,
    pub data: Vec<u8>,
}

/// Per-`(edgetype, gid1)` bookkeeping row: the current revision counter
/// and edge count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetaRow {
    pub revision: Revision,
    pub count: u64,
}

/// One entry produced by a declared index for a stored edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub indextype: IndexTypeId,
    pub indexvalue: Vec<u8>,
    pub gid1: Gid,
    pub revision: Revision,
}

/// One index tuple to be written alongside an edge, computed by the query
/// planner before calling [`crate::ShardBackend::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub indextype: IndexTypeId,
    pub indexvalue: Vec<u8>,
    pub unique: bool,
}

/// Input to [`crate::ShardBackend::add`].
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub edgetype: EdgeTypeId,
    pub gid1: Gid,
    pub gid2: Gid,
    pub encoding: u8,
    pub data: Vec<u8>,
    pub indices: Vec<IndexEntry>,
    pub overwrite: bool,
}

/// Input to [`crate::ShardBackend::delete`].
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub edgetype: EdgeTypeId,
    pub gid1: Gid,
    pub gid2: Gid,
    pub indextypes: Vec<IndexTypeId>,
}

/// Outcome of a successful [`crate::ShardBackend::add`]: the stored row and
/// whether the write replaced an existing revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub row: EdgeRow,
    pub was_overwrite: bool,
}

/// One row returned by [`crate::ShardBackend::query`], paired with the
/// index value it matched on (`None` for a plain by-parent listing). The
/// global scatter/merge in the store layer needs `indexvalue` to restore a
/// single `(indexvalue, revision DESC)` order across per-host result
/// streams without decoding `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredRow {
    pub indexvalue: Option<Vec<u8>>,
    pub row: EdgeRow,
}

/// A query against one edgetype, shaped after its two access patterns:
#[derive(Debug, Clone)]
pub enum QueryRequest {
    /// All edges for `(edgetype, gid1)`, ordered by `revision DESC`.
    ByParent { edgetype: EdgeTypeId, gid1: Gid },
    /// Index range scan, optionally narrowed to one `gid1`. `start`/`end`
    /// are order-preserving encoded bounds (`edgestore_escode::encode_index`);
    /// rows are returned ordered by `(indexvalue, revision DESC)`.
    ByIndex {
        edgetype: EdgeTypeId,
        indextype: IndexTypeId,
        gid1: Option<Gid>,
        start: Vec<u8>,
        end: Vec<u8>,
    },
}
