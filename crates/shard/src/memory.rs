use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use edgestore_primitives::{Colo, EdgeTypeId, Gid, IndexTypeId, Revision, DEFINITIONS_EDGETYPE};
use parking_lot::Mutex;

use crate::backend::{ShardBackend, TxnId};
use crate::error::ShardError;
use crate::row::{AddOutcome, AddRequest, DeleteRequest, EdgeRow, IndexRow, MetaRow, QueryRequest, ScoredRow};

/// In-memory reference implementation of [`ShardBackend`]. Holds the same
/// four tables a real SQL shard would, but as plain in-process collections
/// rather than SQL tables, since the SQL driver itself is out of scope.
///
/// Models "wraps one physical DB connection" literally: only one
/// transaction may be open at a time. [`begin`](ShardBackend::begin)
/// snapshots the committed state; every later call against that
/// [`TxnId`] reads and writes the snapshot; [`commit`](ShardBackend::commit)
/// publishes it back, [`rollback`](ShardBackend::rollback) discards it.
#[derive(Default)]
pub struct MemoryShard {
    committed: Mutex<ShardState>,
    active: Mutex<Option<(TxnId, ShardState)>>,
    next_txn: AtomicU64,
}

#[derive(Clone, Default)]
struct ShardState {
    colo_counter: HashMap<u32, u32>,
    edgedata: HashMap<(u64, u64, u64), EdgeRow>,
    edgemeta: HashMap<(u64, u64), MetaRow>,
    edgeindex: Vec<IndexRow>,
    definitions: HashMap<String, u64>,
    next_definition_id: u64,
}

impl MemoryShard {
    pub fn new() -> Self {
        MemoryShard {
            committed: Mutex::new(ShardState {
                next_definition_id: DEFINITIONS_EDGETYPE.0 + 1,
                ..Default::default()
            }),
            active: Mutex::new(None),
            next_txn: AtomicU64::new(1),
        }
    }

    fn with_state<R>(
        &self,
        txn: TxnId,
        f: impl FnOnce(&mut ShardState) -> Result<R, ShardError>,
    ) -> Result<R, ShardError> {
        let mut active = self.active.lock();
        match active.as_mut() {
            Some((id, state)) if *id == txn => f(state),
            _ => Err(ShardError::NoSuchTransaction(txn.0)),
        }
    }
}

impl ShardBackend for MemoryShard {
    fn begin(&self) -> Result<TxnId, ShardError> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(ShardError::TransactionInProgress);
        }
        let snapshot = self.committed.lock().clone();
        let id = TxnId(self.next_txn.fetch_add(1, Ordering::SeqCst));
        *active = Some((id, snapshot));
        Ok(id)
    }

    fn commit(&self, txn: TxnId) -> Result<(), ShardError> {
        let mut active = self.active.lock();
        match active.take() {
            Some((id, state)) if id == txn => {
                *self.committed.lock() = state;
                Ok(())
            }
            other => {
                *active = other;
                Err(ShardError::NoSuchTransaction(txn.0))
            }
        }
    }

    fn rollback(&self, txn: TxnId) -> Result<(), ShardError> {
        let mut active = self.active.lock();
        match active.take() {
            Some((id, _)) if id == txn => Ok(()),
            other => {
                *active = other;
                Err(ShardError::NoSuchTransaction(txn.0))
            }
        }
    }

    fn lock_colo(&self, txn: TxnId, colo: Colo) -> Result<(), ShardError> {
        self.next_colo_counter(txn, colo).map(|_| ())
    }

    fn next_colo_counter(&self, txn: TxnId, colo: Colo) -> Result<u32, ShardError> {
        self.with_state(txn, |state| {
            let counter = state.colo_counter.entry(colo.get()).or_insert(0);
            *counter += 1;
            Ok(*counter)
        })
    }

    fn add_or_get_definition_type(&self, txn: TxnId, name: &str) -> Result<(u64, bool), ShardError> {
        self.with_state(txn, |state| {
            if let Some(&id) = state.definitions.get(name) {
                return Ok((id, false));
            }
            let id = state.next_definition_id;
            state.next_definition_id += 1;
            state.definitions.insert(name.to_string(), id);
            Ok((id, true))
        })
    }

    fn add(&self, txn: TxnId, req: AddRequest) -> Result<AddOutcome, ShardError> {
        self.with_state(txn, |state| {
            let meta_key = (req.edgetype.0, req.gid1.raw());
            let meta = state.edgemeta.entry(meta_key).or_default();
            let new_revision = meta.revision.next();

            let data_key = (req.edgetype.0, req.gid1.raw(), req.gid2.raw());
            let existing = state.edgedata.get(&data_key).cloned();

            let (prev_revision, was_overwrite) = match &existing {
                None => (None, false),
                Some(_) if !req.overwrite => {
                    return Err(ShardError::DuplicateInstance(req.edgetype, req.gid1, req.gid2));
                }
                Some(row) => (Some(row.revision), true),
            };

            // Uniqueness check happens before any mutation so a violation
            // leaves the shard state untouched.
            for entry in &req.indices {
                if entry.unique {
                    let collision = state.edgeindex.iter().any(|row| {
                        row.indextype == entry.indextype
                            && row.indexvalue == entry.indexvalue
                            && row.gid1 != req.gid1
                    });
                    if collision {
                        return Err(ShardError::UniqueViolation(entry.indextype));
                    }
                }
            }

            meta.revision = new_revision;
            if !was_overwrite {
                meta.count += 1;
            }

            let row = EdgeRow {
                edgetype: req.edgetype,
                gid1: req.gid1,
                gid2: req.gid2,
                revision: new_revision,
                encoding: req.encoding,
                data: req.data,
            };
            state.edgedata.insert(data_key, row.clone());

            if let Some(prev) = prev_revision {
                state
                    .edgeindex
                    .retain(|r| !(r.gid1 == req.gid1 && r.revision == prev));
            }
            for entry in req.indices {
                state.edgeindex.push(IndexRow {
                    indextype: entry.indextype,
                    indexvalue: entry.indexvalue,
                    gid1: req.gid1,
                    revision: new_revision,
                });
            }

            Ok(AddOutcome { row, was_overwrite })
        })
    }

    fn delete(&self, txn: TxnId, req: DeleteRequest) -> Result<bool, ShardError> {
        self.with_state(txn, |state| {
            let meta_key = (req.edgetype.0, req.gid1.raw());
            if let Some(meta) = state.edgemeta.get_mut(&meta_key) {
                meta.revision = meta.revision.next();
            }

            let data_key = (req.edgetype.0, req.gid1.raw(), req.gid2.raw());
            let removed = state.edgedata.remove(&data_key);
            let Some(removed) = removed else {
                return Ok(false);
            };

            if let Some(meta) = state.edgemeta.get_mut(&meta_key) {
                meta.count = meta.count.saturating_sub(1);
            }
            let indextypes: std::collections::HashSet<IndexTypeId> =
                req.indextypes.into_iter().collect();
            state.edgeindex.retain(|r| {
                !(r.gid1 == req.gid1 && r.revision == removed.revision && indextypes.contains(&r.indextype))
            });

            Ok(true)
        })
    }

    fn query(&self, txn: TxnId, req: QueryRequest) -> Result<Vec<ScoredRow>, ShardError> {
        self.with_state(txn, |state| match req {
            QueryRequest::ByParent { edgetype, gid1 } => {
                let mut rows: Vec<EdgeRow> = state
                    .edgedata
                    .values()
                    .filter(|r| r.edgetype == edgetype && r.gid1 == gid1)
                    .cloned()
                    .collect();
                rows.sort_by(|a, b| b.revision.cmp(&a.revision));
                Ok(rows
                    .into_iter()
                    .map(|row| ScoredRow { indexvalue: None, row })
                    .collect())
            }
            QueryRequest::ByIndex {
                edgetype,
                indextype,
                gid1,
                start,
                end,
            } => {
                let mut matches: Vec<(Vec<u8>, IndexRow)> = state
                    .edgeindex
                    .iter()
                    .filter(|r| {
                        r.indextype == indextype
                            && r.indexvalue >= start
                            && r.indexvalue <= end
                            && gid1.map_or(true, |g| r.gid1 == g)
                    })
                    .map(|r| (r.indexvalue.clone(), r.clone()))
                    .collect();
                matches.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.revision.cmp(&a.1.revision)));

                let mut rows = Vec::with_capacity(matches.len());
                for (indexvalue, idx_row) in matches {
                    let found = state.edgedata.values().find(|r| {
                        r.edgetype == edgetype && r.gid1 == idx_row.gid1 && r.revision == idx_row.revision
                    });
                    if let Some(row) = found {
                        rows.push(ScoredRow {
                            indexvalue: Some(indexvalue),
                            row: row.clone(),
                        });
                    }
                }
                Ok(rows)
            }
        })
    }

    fn get(&self, txn: TxnId, edgetype: EdgeTypeId, gid1: Gid, gid2: Gid) -> Result<Option<EdgeRow>, ShardError> {
        self.with_state(txn, |state| {
            Ok(state.edgedata.get(&(edgetype.0, gid1.raw(), gid2.raw())).cloned())
        })
    }

    fn count(&self, txn: TxnId, edgetype: EdgeTypeId, gid1: Gid) -> Result<u64, ShardError> {
        self.with_state(txn, |state| {
            Ok(state
                .edgemeta
                .get(&(edgetype.0, gid1.raw()))
                .map(|m| m.count)
                .unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgestore_primitives::Colo;

    fn gid(colo: u32, counter: u32) -> Gid {
        Gid::new(Colo(colo), counter)
    }

    #[test]
    fn add_then_get_round_trips() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        let outcome = shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(10),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![1, 2, 3],
                    indices: vec![],
                    overwrite: false,
                },
            )
            .unwrap();
        assert_eq!(outcome.row.revision, Revision(1));
        assert!(!outcome.was_overwrite);
        shard.commit(txn).unwrap();

        let txn2 = shard.begin().unwrap();
        let fetched = shard.get(txn2, EdgeTypeId(10), gid(1, 1), gid(1, 1)).unwrap();
        assert_eq!(fetched.unwrap().data, vec![1, 2, 3]);
        assert_eq!(shard.count(txn2, EdgeTypeId(10), gid(1, 1)).unwrap(), 1);
    }

    #[test]
    fn duplicate_add_without_overwrite_fails() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        let req = AddRequest {
            edgetype: EdgeTypeId(1),
            gid1: gid(1, 1),
            gid2: gid(1, 1),
            encoding: 0,
            data: vec![],
            indices: vec![],
            overwrite: false,
        };
        shard.add(txn, req.clone()).unwrap();
        let err = shard.add(txn, req).unwrap_err();
        assert_eq!(err, ShardError::DuplicateInstance(EdgeTypeId(1), gid(1, 1), gid(1, 1)));
    }

    #[test]
    fn overwrite_bumps_revision_and_replaces_index_rows() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![1],
                    indices: vec![crate::row::IndexEntry {
                        indextype: IndexTypeId(5),
                        indexvalue: vec![9],
                        unique: false,
                    }],
                    overwrite: false,
                },
            )
            .unwrap();

        let outcome = shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![2],
                    indices: vec![crate::row::IndexEntry {
                        indextype: IndexTypeId(5),
                        indexvalue: vec![10],
                        unique: false,
                    }],
                    overwrite: true,
                },
            )
            .unwrap();
        assert!(outcome.was_overwrite);
        assert_eq!(outcome.row.revision, Revision(2));

        let rows = shard
            .query(
                txn,
                QueryRequest::ByIndex {
                    edgetype: EdgeTypeId(1),
                    indextype: IndexTypeId(5),
                    gid1: None,
                    start: vec![0],
                    end: vec![255],
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row.data, vec![2]);
    }

    #[test]
    fn unique_violation_is_rejected() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![],
                    indices: vec![crate::row::IndexEntry {
                        indextype: IndexTypeId(5),
                        indexvalue: vec![9],
                        unique: true,
                    }],
                    overwrite: false,
                },
            )
            .unwrap();

        let err = shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 2),
                    gid2: gid(1, 2),
                    encoding: 0,
                    data: vec![],
                    indices: vec![crate::row::IndexEntry {
                        indextype: IndexTypeId(5),
                        indexvalue: vec![9],
                        unique: true,
                    }],
                    overwrite: false,
                },
            )
            .unwrap_err();
        assert_eq!(err, ShardError::UniqueViolation(IndexTypeId(5)));
    }

    #[test]
    fn rollback_discards_writes() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![1],
                    indices: vec![],
                    overwrite: false,
                },
            )
            .unwrap();
        shard.rollback(txn).unwrap();

        let txn2 = shard.begin().unwrap();
        let fetched = shard.get(txn2, EdgeTypeId(1), gid(1, 1), gid(1, 1)).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn only_one_transaction_open_at_a_time() {
        let shard = MemoryShard::new();
        let _txn = shard.begin().unwrap();
        assert_eq!(shard.begin().unwrap_err(), ShardError::TransactionInProgress);
    }

    #[test]
    fn delete_removes_row_and_its_index_entries() {
        let shard = MemoryShard::new();
        let txn = shard.begin().unwrap();
        shard
            .add(
                txn,
                AddRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    encoding: 0,
                    data: vec![],
                    indices: vec![crate::row::IndexEntry {
                        indextype: IndexTypeId(5),
                        indexvalue: vec![9],
                        unique: false,
                    }],
                    overwrite: false,
                },
            )
            .unwrap();

        let removed = shard
            .delete(
                txn,
                DeleteRequest {
                    edgetype: EdgeTypeId(1),
                    gid1: gid(1, 1),
                    gid2: gid(1, 1),
                    indextypes: vec![IndexTypeId(5)],
                },
            )
            .unwrap();
        assert!(removed);

        let rows = shard
            .query(
                txn,
                QueryRequest::ByIndex {
                    edgetype: EdgeTypeId(1),
                    indextype: IndexTypeId(5),
                    gid1: None,
                    start: vec![0],
                    end: vec![255],
                },
            )
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(shard.count(txn, EdgeTypeId(1), gid(1, 1)).unwrap(), 0);
    }
}
