//! The global router: multiplexes [`ShardBackend`]s across hosts, maps
//! `gid -> colo -> host`, and owns the definitions table.

use std::sync::Arc;

use edgestore_primitives::{Colo, EdgeTypeId, Gid, IndexTypeId};
use edgestore_shard::{
    AddOutcome, AddRequest, DeleteRequest, QueryRequest, ScoredRow, ShardBackend,
};
use rand::Rng;

use crate::error::EdgeStoreError;

/// One query shape the store can route: by-parent listing, or an index
/// range scan narrowed to a gid1, a colo, or neither.
pub enum QueryScope {
    /// List all edges for `(edgetype, gid1)`.
    ByParent { gid1: Gid },
    /// Index range scan, optionally narrowed to one `gid1` or one `colo`.
    /// When neither is given, the store fans out to every host and merges
    /// the per-host results.
    ByIndex {
        indextype: IndexTypeId,
        gid1: Option<Gid>,
        colo: Option<Colo>,
        start: Vec<u8>,
        end: Vec<u8>,
    },
}

pub struct Store {
    hosts: Vec<Arc<dyn ShardBackend>>,
    definitions_host: usize,
}

impl Store {
    pub fn new(hosts: Vec<Arc<dyn ShardBackend>>, definitions_host: usize) -> Self {
        assert!(!hosts.is_empty(), "a Store needs at least one host");
        assert!(
            definitions_host < hosts.len(),
            "definitions_host index out of range"
        );
        Store {
            hosts,
            definitions_host,
        }
    }

    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn host_index(&self, colo: Colo) -> usize {
        (colo.get() as usize) % self.hosts.len()
    }

    pub fn shard(&self, colo: Colo) -> &Arc<dyn ShardBackend> {
        &self.hosts[self.host_index(colo)]
    }

    pub fn colo(&self, gid: Gid) -> Colo {
        gid.colo()
    }

    /// Allocates a fresh gid. When neither `colo` nor `colo_gid` is given,
    /// picks a uniformly random colo in `[1, 2^32-1]`, then upserts that
    /// colo's counter row to obtain a fresh counter.
    pub fn generate_gid(&self, colo_gid: Option<Gid>, colo: Option<Colo>) -> Result<Gid, EdgeStoreError> {
        let colo = colo
            .or_else(|| colo_gid.map(|g| g.colo()))
            .unwrap_or_else(random_colo);
        let shard = self.shard(colo);
        let txn = shard.begin()?;
        match shard.next_colo_counter(txn, colo) {
            Ok(counter) => {
                shard.commit(txn)?;
                Ok(Gid::new(colo, counter))
            }
            Err(e) => {
                let _ = shard.rollback(txn);
                Err(e.into())
            }
        }
    }

    /// Upserts into the designated host's definitions table, returning the
    /// stable id and whether it was just allocated.
    pub fn add_or_get_definition_type(&self, name: &str) -> Result<(u64, bool), EdgeStoreError> {
        let shard = &self.hosts[self.definitions_host];
        let txn = shard.begin()?;
        match shard.add_or_get_definition_type(txn, name) {
            Ok(result) => {
                shard.commit(txn)?;
                Ok(result)
            }
            Err(e) => {
                let _ = shard.rollback(txn);
                Err(e.into())
            }
        }
    }

    /// Apply a write inside a transaction already open on `colo`'s shard
    /// (held by the caller's lock scope).
    pub fn add_in_txn(
        &self,
        colo: Colo,
        txn: edgestore_shard::TxnId,
        req: AddRequest,
    ) -> Result<AddOutcome, EdgeStoreError> {
        self.shard(colo).add(txn, req).map_err(Into::into)
    }

    pub fn delete_in_txn(
        &self,
        colo: Colo,
        txn: edgestore_shard::TxnId,
        req: DeleteRequest,
    ) -> Result<bool, EdgeStoreError> {
        self.shard(colo).delete(txn, req).map_err(Into::into)
    }

    /// `get(edgetype, gid1, gid2)`: an auto-commit read, not requiring an
    /// active lock scope.
    pub fn get(
        &self,
        edgetype: EdgeTypeId,
        gid1: Gid,
        gid2: Gid,
    ) -> Result<Option<edgestore_shard::EdgeRow>, EdgeStoreError> {
        let shard = self.shard(gid1.colo());
        let txn = shard.begin()?;
        let result = shard.get(txn, edgetype, gid1, gid2);
        self.finish_read(shard, txn, result)
    }

    /// `count(edgetype, gid1)`: an auto-commit read.
    pub fn count(&self, edgetype: EdgeTypeId, gid1: Gid) -> Result<u64, EdgeStoreError> {
        let shard = self.shard(gid1.colo());
        let txn = shard.begin()?;
        let result = shard.count(txn, edgetype, gid1);
        self.finish_read(shard, txn, result)
    }

    /// Runs a query against one edgetype, scattering across hosts and
    /// merging the results when neither `gid1` nor `colo` narrows the scan.
    pub fn query(
        &self,
        edgetype: EdgeTypeId,
        scope: QueryScope,
    ) -> Result<Vec<ScoredRow>, EdgeStoreError> {
        match scope {
            QueryScope::ByParent { gid1 } => {
                let shard = self.shard(gid1.colo());
                let txn = shard.begin()?;
                let result = shard.query(txn, QueryRequest::ByParent { edgetype, gid1 });
                self.finish_read(shard, txn, result)
            }
            QueryScope::ByIndex {
                indextype,
                gid1: Some(gid1),
                colo: _,
                start,
                end,
            } => {
                let shard = self.shard(gid1.colo());
                let txn = shard.begin()?;
                let result = shard.query(
                    txn,
                    QueryRequest::ByIndex {
                        edgetype,
                        indextype,
                        gid1: Some(gid1),
                        start,
                        end,
                    },
                );
                self.finish_read(shard, txn, result)
            }
            QueryScope::ByIndex {
                indextype,
                gid1: None,
                colo: Some(colo),
                start,
                end,
            } => {
                let shard = self.shard(colo);
                let txn = shard.begin()?;
                let result = shard.query(
                    txn,
                    QueryRequest::ByIndex {
                        edgetype,
                        indextype,
                        gid1: None,
                        start,
                        end,
                    },
                );
                self.finish_read(shard, txn, result)
            }
            QueryScope::ByIndex {
                indextype,
                gid1: None,
                colo: None,
                start,
                end,
            } => {
                // Global query: fan out per-host and merge in
                // (indexvalue, revision DESC) order.
                let mut merged = Vec::new();
                for shard in &self.hosts {
                    let txn = shard.begin()?;
                    let rows = self.finish_read(
                        shard,
                        txn,
                        shard.query(
                            txn,
                            QueryRequest::ByIndex {
                                edgetype,
                                indextype,
                                gid1: None,
                                start: start.clone(),
                                end: end.clone(),
                            },
                        ),
                    )?;
                    merged.extend(rows);
                }
                merged.sort_by(|a: &ScoredRow, b: &ScoredRow| {
                    a.indexvalue
                        .cmp(&b.indexvalue)
                        .then(b.row.revision.cmp(&a.row.revision))
                });
                Ok(merged)
            }
        }
    }

    fn finish_read<T>(
        &self,
        shard: &Arc<dyn ShardBackend>,
        txn: edgestore_shard::TxnId,
        result: Result<T, edgestore_shard::ShardError>,
    ) -> Result<T, EdgeStoreError> {
        match result {
            Ok(value) => {
                shard.commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                let _ = shard.rollback(txn);
                Err(e.into())
            }
        }
    }
}

fn random_colo() -> Colo {
    let mut rng = rand::thread_rng();
    Colo(rng.gen_range(1..=u32::MAX))
}

impl edgestore_schema::TypeRegistry for Store {
    fn add_or_get_definition_type(&self, name: &str) -> (u64, bool) {
        Store::add_or_get_definition_type(self, name)
            .expect("definitions table write failed during schema registration")
    }
}
