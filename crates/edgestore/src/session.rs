//! The transactional lock scope: instance cache, query cache, dirty
//! tracking, and the commit/rollback protocol around one or more colos.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use edgestore_primitives::{Colo, EdgeTypeId, Gid, Revision};
use edgestore_schema::{Schema, Value};
use edgestore_shard::{AddRequest, DeleteRequest, IndexEntry, ScoredRow, TxnId};
use edgestore_escode::encode_index;
use parking_lot::{Mutex, RwLock};
use tracing::{instrument, trace, warn};

use crate::error::EdgeStoreError;
use crate::events::{ChangeKind, ChangedEvent, EventBus};
use crate::store::{QueryScope, Store};

pub type InstanceKey = (EdgeTypeId, Gid, Gid);

/// Probe key for the three-level query cache: a `get` is keyed by its
/// `gid2`, a list query by its computed index range, a count by the
/// `Count` sentinel — all sharing one map per `(colo, edgetype, gid1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeKey {
    Get(Gid),
    Range(Vec<u8>, Vec<u8>),
    Count,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Row(Option<ScoredRow>),
    Rows(Vec<ScoredRow>),
    Count(u64),
}

/// One cached entity: its schema, current (possibly dirty) attribute map,
/// and the committed mirror used to revert on rollback.
pub struct Instance {
    pub schema: Arc<Schema>,
    pub edgetype: EdgeTypeId,
    pub gid1: Gid,
    pub gid2: Gid,
    inner: RwLock<InstanceInner>,
}

struct InstanceInner {
    revision: Revision,
    datadict: BTreeMap<String, Value>,
    committed_revision: Revision,
    committed_datadict: BTreeMap<String, Value>,
    locked: bool,
}

impl Instance {
    fn new(
        schema: Arc<Schema>,
        edgetype: EdgeTypeId,
        gid1: Gid,
        gid2: Gid,
        datadict: BTreeMap<String, Value>,
        revision: Revision,
    ) -> Self {
        Instance {
            schema,
            edgetype,
            gid1,
            gid2,
            inner: RwLock::new(InstanceInner {
                revision,
                datadict: datadict.clone(),
                committed_revision: revision,
                committed_datadict: datadict,
                locked: false,
            }),
        }
    }

    pub fn revision(&self) -> Revision {
        self.inner.read().revision
    }

    pub fn key(&self) -> InstanceKey {
        (self.edgetype, self.gid1, self.gid2)
    }

    /// Read an attribute. Computed attributes are evaluated against the
    /// current datadict; everything else is a plain lookup.
    pub fn get(&self, attr: &str) -> Result<Option<Value>, EdgeStoreError> {
        let inner = self.inner.read();
        if let Some(desc) = self.schema.attribute(attr) {
            if desc.is_computed() {
                return Ok(desc.compute(&inner.datadict));
            }
        }
        Ok(inner.datadict.get(attr).cloned())
    }

    pub fn to_dict(&self) -> BTreeMap<String, Value> {
        self.inner.read().datadict.clone()
    }

    fn set_raw(&self, attr: &str, value: Value) {
        self.inner.write().datadict.insert(attr.to_string(), value);
    }

    fn is_locked(&self) -> bool {
        self.inner.read().locked
    }

    fn mark_locked(&self) {
        self.inner.write().locked = true;
    }

    fn unmark_locked(&self) {
        self.inner.write().locked = false;
    }

    fn commit_snapshot(&self, revision: Revision) {
        let mut inner = self.inner.write();
        inner.revision = revision;
        inner.committed_revision = revision;
        inner.committed_datadict = inner.datadict.clone();
    }

    fn revert_snapshot(&self) {
        let mut inner = self.inner.write();
        inner.revision = inner.committed_revision;
        inner.datadict = inner.committed_datadict.clone();
    }
}

struct ActiveLock {
    colos: BTreeSet<Colo>,
    depth: u32,
    txns: HashMap<Colo, TxnId>,
    save_set: HashSet<InstanceKey>,
    delete_set: HashSet<InstanceKey>,
}

/// Owns the process-wide instance cache, query cache, and the one active
/// lock scope at a time. A `Session` is typically constructed once per
/// process and shared behind an `Arc`.
pub struct Session {
    store: Arc<Store>,
    events: Arc<EventBus>,
    instances: Mutex<HashMap<InstanceKey, Arc<Instance>>>,
    query_cache: Mutex<HashMap<(Colo, EdgeTypeId, Gid), HashMap<ProbeKey, CachedValue>>>,
    cache_disabled: Mutex<u32>,
    active_lock: Mutex<Option<ActiveLock>>,
}

impl Session {
    pub fn new(store: Arc<Store>, events: Arc<EventBus>) -> Self {
        Session {
            store,
            events,
            instances: Mutex::new(HashMap::new()),
            query_cache: Mutex::new(HashMap::new()),
            cache_disabled: Mutex::new(0),
            active_lock: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Reentrant scope guard: nested calls restore the prior disabled
    /// state rather than just flipping back to enabled.
    pub fn disabled_query_cache<T>(&self, f: impl FnOnce() -> T) -> T {
        *self.cache_disabled.lock() += 1;
        let result = f();
        *self.cache_disabled.lock() -= 1;
        result
    }

    fn query_cache_enabled(&self) -> bool {
        *self.cache_disabled.lock() == 0
    }

    fn clear_query_cache_for(&self, colos: &BTreeSet<Colo>) {
        self.query_cache.lock().retain(|(colo, _, _), _| !colos.contains(colo));
    }

    /// `lock(colos)`: computes the target colo set and either opens a new
    /// top-level lock scope or validates a nested one against the outer
    /// scope's colo set (`LockExpansion` if it would expand it).
    #[instrument(skip(self, f))]
    pub fn lock<T>(
        &self,
        colos: &[Colo],
        f: impl FnOnce(&Session) -> Result<T, EdgeStoreError>,
    ) -> Result<T, EdgeStoreError> {
        let target: BTreeSet<Colo> = colos.iter().copied().collect();

        {
            let mut guard = self.active_lock.lock();
            if let Some(active) = guard.as_mut() {
                if !target.is_subset(&active.colos) {
                    let bad = *target.difference(&active.colos).next().unwrap();
                    return Err(EdgeStoreError::LockExpansion { colo: bad });
                }
                active.depth += 1;
                drop(guard);
                trace!(?target, "nested lock, no-op");
                let result = f(self);
                if let Some(active) = self.active_lock.lock().as_mut() {
                    active.depth -= 1;
                }
                return result;
            }
        }

        if target.is_empty() {
            *self.active_lock.lock() = Some(ActiveLock {
                colos: target,
                depth: 1,
                txns: HashMap::new(),
                save_set: HashSet::new(),
                delete_set: HashSet::new(),
            });
            let result = f(self);
            *self.active_lock.lock() = None;
            return result;
        }

        self.clear_query_cache_for(&target);

        let mut txns = HashMap::new();
        for colo in &target {
            let shard = self.store.shard(*colo);
            let txn = shard.begin()?;
            if let Err(e) = shard.lock_colo(txn, *colo) {
                let _ = shard.rollback(txn);
                for (c, t) in &txns {
                    let _ = self.store.shard(*c).rollback(*t);
                }
                return Err(e.into());
            }
            txns.insert(*colo, txn);
        }

        *self.active_lock.lock() = Some(ActiveLock {
            colos: target.clone(),
            depth: 1,
            txns,
            save_set: HashSet::new(),
            delete_set: HashSet::new(),
        });

        let result = f(self);
        let active = self.active_lock.lock().take().unwrap();

        let outcome = match result {
            Ok(value) => self.commit_active(active).map(|()| value),
            Err(e) => {
                self.rollback_active(active);
                Err(e)
            }
        };
        outcome
    }

    fn commit_active(&self, active: ActiveLock) -> Result<(), EdgeStoreError> {
        for key in &active.save_set {
            if let Some(instance) = self.instances.lock().get(key).cloned() {
                self.save_instance(&instance)?;
            }
        }
        for key in &active.delete_set {
            if let Some(instance) = self.instances.lock().get(key).cloned() {
                self.delete_instance(&instance)?;
            }
        }
        for (colo, txn) in &active.txns {
            self.store.shard(*colo).commit(*txn)?;
        }

        self.unmark_colos(&active.colos);
        self.clear_query_cache_for(&active.colos);

        for key in &active.save_set {
            self.events.trigger(
                "changed",
                &ChangedEvent {
                    edgetype: key.0,
                    gid1: key.1,
                    gid2: key.2,
                    kind: ChangeKind::Saved,
                },
            );
        }
        for key in &active.delete_set {
            self.events.trigger(
                "changed",
                &ChangedEvent {
                    edgetype: key.0,
                    gid1: key.1,
                    gid2: key.2,
                    kind: ChangeKind::Deleted,
                },
            );
            self.instances.lock().remove(key);
        }
        Ok(())
    }

    fn rollback_active(&self, active: ActiveLock) {
        for (colo, txn) in &active.txns {
            if let Err(e) = self.store.shard(*colo).rollback(*txn) {
                warn!(?e, "rollback failed on shard; connection is unusable");
            }
        }
        self.clear_query_cache_for(&active.colos);
        for key in active.save_set.iter().chain(active.delete_set.iter()) {
            if let Some(instance) = self.instances.lock().get(key) {
                instance.revert_snapshot();
            }
        }
        self.unmark_colos(&active.colos);
    }

    /// Unlocks every cached instance belonging to one of `colos`, run when
    /// a lock scope covering them closes (by commit or rollback). Catches
    /// instances that were promoted to locked by [`Self::guard_read`] or a
    /// fresh [`Self::get`] but never entered the save or delete set.
    fn unmark_colos(&self, colos: &BTreeSet<Colo>) {
        for instance in self.instances.lock().values() {
            if colos.contains(&instance.gid1.colo()) {
                instance.unmark_locked();
            }
        }
    }

    /// `_save()`: validate, serialize, compute index tuples, write through
    /// the store, and update the instance's revision on success.
    fn save_instance(&self, instance: &Instance) -> Result<(), EdgeStoreError> {
        let schema = &instance.schema;
        let datadict = instance.to_dict();
        let base = schema.to_base_map(&datadict)?;
        let data = edgestore_escode::encode(&Value::Map(base));
        let overwrite = instance.revision() != Revision::default();

        let mut indices = Vec::new();
        for index in &schema.indices {
            for tuple in index_tuples(&datadict, &index.attrs) {
                indices.push(IndexEntry {
                    indextype: index.type_id,
                    indexvalue: encode_index(&tuple, false),
                    unique: index.unique,
                });
            }
        }

        let active_lock = self.active_lock.lock();
        let colo = instance.gid1.colo();
        let txn = active_lock
            .as_ref()
            .and_then(|a| a.txns.get(&colo).copied())
            .expect("save_instance called without an open transaction on this colo");
        drop(active_lock);

        let outcome = self.store.add_in_txn(
            colo,
            txn,
            AddRequest {
                edgetype: instance.edgetype,
                gid1: instance.gid1,
                gid2: instance.gid2,
                encoding: 0,
                data,
                indices,
                overwrite,
            },
        )?;
        instance.commit_snapshot(outcome.row.revision);
        Ok(())
    }

    /// `_delete()`: collect the class's indextypes and remove the row.
    fn delete_instance(&self, instance: &Instance) -> Result<(), EdgeStoreError> {
        let colo = instance.gid1.colo();
        let txn = {
            let active_lock = self.active_lock.lock();
            active_lock
                .as_ref()
                .and_then(|a| a.txns.get(&colo).copied())
                .expect("delete_instance called without an open transaction on this colo")
        };
        let indextypes = instance.schema.indices.iter().map(|i| i.type_id).collect();
        self.store.delete_in_txn(
            colo,
            txn,
            DeleteRequest {
                edgetype: instance.edgetype,
                gid1: instance.gid1,
                gid2: instance.gid2,
                indextypes,
            },
        )?;
        Ok(())
    }

    fn require_colo_locked(&self, colo: Colo) -> Result<(), EdgeStoreError> {
        let guard = self.active_lock.lock();
        match guard.as_ref() {
            Some(active) if active.colos.contains(&colo) => Ok(()),
            _ => Err(EdgeStoreError::LockRequired {
                attr: format!("colo {colo}"),
            }),
        }
    }

    /// Create a new instance inside the current lock scope. `gid` is
    /// generated if not supplied. Fails with `DuplicateInstance` if an
    /// edge already exists at this key and `get_existing` is false; with
    /// `get_existing=true` the existing instance is returned instead.
    pub fn add(
        &self,
        schema: &Arc<Schema>,
        gid1: Gid,
        gid2: Gid,
        datadict: BTreeMap<String, Value>,
        get_existing: bool,
    ) -> Result<Arc<Instance>, EdgeStoreError> {
        self.require_colo_locked(gid1.colo())?;
        let key = (schema.edgetype, gid1, gid2);

        if let Some(existing) = self.instances.lock().get(&key).cloned() {
            if get_existing {
                return Ok(existing);
            }
            return Err(EdgeStoreError::DuplicateInstance(schema.edgetype, gid1, gid2));
        }
        if let Some(row) = self.store.get(schema.edgetype, gid1, gid2)? {
            if !get_existing {
                return Err(EdgeStoreError::DuplicateInstance(schema.edgetype, gid1, gid2));
            }
            let decoded =
                edgestore_escode::decode(&row.data).expect("edge row data encoded by this crate must decode");
            let base = match decoded {
                Value::Map(m) => m,
                _ => BTreeMap::new(),
            };
            let datadict = schema.from_base_map(&base)?;
            let instance = Arc::new(Instance::new(schema.clone(), schema.edgetype, gid1, gid2, datadict, row.revision));
            instance.mark_locked();
            self.instances.lock().insert(key, instance.clone());
            return Ok(instance);
        }

        let instance = Arc::new(Instance::new(
            schema.clone(),
            schema.edgetype,
            gid1,
            gid2,
            datadict,
            Revision::default(),
        ));
        instance.mark_locked();
        self.instances.lock().insert(key, instance.clone());
        if let Some(active) = self.active_lock.lock().as_mut() {
            active.save_set.insert(key);
        }
        Ok(instance)
    }

    /// Set an attribute on a locked instance, moving it into the save set.
    pub fn set(&self, instance: &Arc<Instance>, attr: &str, value: Value) -> Result<(), EdgeStoreError> {
        if !instance.is_locked() {
            return Err(EdgeStoreError::LockRequired { attr: attr.to_string() });
        }
        let resolved = instance.schema.resolve_path(attr)?;
        if !resolved.settable {
            return Err(EdgeStoreError::Schema(edgestore_schema::SchemaError::SetThroughRepeated(
                attr.to_string(),
            )));
        }
        resolved.leaf.validate(Some(&value))?;
        instance.set_raw(attr, value);
        if let Some(active) = self.active_lock.lock().as_mut() {
            active.save_set.insert(instance.key());
        }
        Ok(())
    }

    /// `remove()`: mark an instance for deletion at the next commit.
    pub fn remove(&self, instance: &Arc<Instance>) -> Result<(), EdgeStoreError> {
        if !instance.is_locked() {
            return Err(EdgeStoreError::LockRequired {
                attr: "remove".to_string(),
            });
        }
        if let Some(active) = self.active_lock.lock().as_mut() {
            active.delete_set.insert(instance.key());
            active.save_set.remove(&instance.key());
        }
        Ok(())
    }

    /// `get(edgetype, gid1, gid2)`: consult the instance cache, falling
    /// back to an auto-commit read. Reading while *any* lock is held but
    /// this instance is not itself locked is fatal, to prevent torn reads
    /// across colos.
    pub fn get(
        &self,
        schema: &Arc<Schema>,
        gid1: Gid,
        gid2: Gid,
    ) -> Result<Option<Arc<Instance>>, EdgeStoreError> {
        let key = (schema.edgetype, gid1, gid2);
        if let Some(instance) = self.instances.lock().get(&key).cloned() {
            self.guard_read(&instance)?;
            return Ok(Some(instance));
        }

        // Any lock held anywhere forbids fetching a fresh instance outside
        // that lock's colo set; inside it, the instance comes back locked.
        let within_lock = self.active_lock.lock().is_some();
        if within_lock {
            self.require_colo_locked(gid1.colo())?;
        }

        let probe = ProbeKey::Get(gid2);
        let cache_key = (gid1.colo(), schema.edgetype, gid1);
        let cached = if self.query_cache_enabled() {
            self.query_cache.lock().get(&cache_key).and_then(|m| m.get(&probe)).cloned()
        } else {
            None
        };
        let scored = match cached {
            Some(CachedValue::Row(row)) => row,
            _ => {
                let row = self.store.get(schema.edgetype, gid1, gid2)?;
                let scored = row.map(|r| ScoredRow { indexvalue: None, row: r });
                if self.query_cache_enabled() {
                    self.query_cache
                        .lock()
                        .entry(cache_key)
                        .or_default()
                        .insert(probe, CachedValue::Row(scored.clone()));
                }
                scored
            }
        };

        let instance = self.materialize(schema, scored)?;
        if within_lock {
            if let Some(instance) = &instance {
                instance.mark_locked();
            }
        }
        Ok(instance)
    }

    /// A cached instance is readable if it is already locked, if no lock is
    /// active at all (a plain auto-commit peek), or if the active lock
    /// covers its colo — in which case it is promoted to locked, same as a
    /// freshly fetched one, so a later `set`/`remove` on it succeeds.
    fn guard_read(&self, instance: &Instance) -> Result<(), EdgeStoreError> {
        if instance.is_locked() {
            return Ok(());
        }
        let guard = self.active_lock.lock();
        match guard.as_ref() {
            None => Ok(()),
            Some(active) if active.colos.contains(&instance.gid1.colo()) => {
                drop(guard);
                instance.mark_locked();
                Ok(())
            }
            Some(_) => Err(EdgeStoreError::LockRequired {
                attr: "get".to_string(),
            }),
        }
    }

    fn materialize(
        &self,
        schema: &Arc<Schema>,
        row: Option<ScoredRow>,
    ) -> Result<Option<Arc<Instance>>, EdgeStoreError> {
        let Some(scored) = row else { return Ok(None) };
        let key = (schema.edgetype, scored.row.gid1, scored.row.gid2);
        if let Some(existing) = self.instances.lock().get(&key).cloned() {
            return Ok(Some(existing));
        }
        let decoded =
            edgestore_escode::decode(&scored.row.data).expect("edge row data encoded by this crate must decode");
        let base = match decoded {
            Value::Map(m) => m,
            _ => BTreeMap::new(),
        };
        let datadict = schema.from_base_map(&base)?;
        let instance = Arc::new(Instance::new(
            schema.clone(),
            schema.edgetype,
            scored.row.gid1,
            scored.row.gid2,
            datadict,
            scored.row.revision,
        ));
        self.instances.lock().insert(key, instance.clone());
        Ok(Some(instance))
    }

    /// `count(edgetype, gid1)`, cache-backed.
    pub fn count(&self, schema: &Arc<Schema>, gid1: Gid) -> Result<u64, EdgeStoreError> {
        if self.query_cache_enabled() {
            if let Some(CachedValue::Count(c)) = self
                .query_cache
                .lock()
                .get(&(gid1.colo(), schema.edgetype, gid1))
                .and_then(|m| m.get(&ProbeKey::Count))
            {
                return Ok(*c);
            }
        }
        let count = self.store.count(schema.edgetype, gid1)?;
        if self.query_cache_enabled() {
            self.query_cache
                .lock()
                .entry((gid1.colo(), schema.edgetype, gid1))
                .or_default()
                .insert(ProbeKey::Count, CachedValue::Count(count));
        }
        Ok(count)
    }

    /// `query(edgetype, gid1)` with no index: lists all edges for
    /// `(edgetype, gid1)` ordered by `revision DESC`.
    pub fn query_parent(&self, schema: &Arc<Schema>, gid1: Gid) -> Result<Vec<Arc<Instance>>, EdgeStoreError> {
        let probe = ProbeKey::Range(Vec::new(), Vec::new());
        let cache_key = (gid1.colo(), schema.edgetype, gid1);

        if self.query_cache_enabled() {
            if let Some(CachedValue::Rows(rows)) =
                self.query_cache.lock().get(&cache_key).and_then(|m| m.get(&probe))
            {
                let rows = rows.clone();
                return rows
                    .into_iter()
                    .map(|r| Ok(self.materialize(schema, Some(r))?.unwrap()))
                    .collect();
            }
        }

        let rows = self.store.query(schema.edgetype, QueryScope::ByParent { gid1 })?;
        if self.query_cache_enabled() {
            self.query_cache
                .lock()
                .entry(cache_key)
                .or_default()
                .insert(probe, CachedValue::Rows(rows.clone()));
        }
        rows.into_iter()
            .map(|r| Ok(self.materialize(schema, Some(r))?.unwrap()))
            .collect()
    }

    /// Runs a range query and materializes every matching row into a
    /// cached instance, in result order.
    pub fn query_range(
        &self,
        schema: &Arc<Schema>,
        indextype: edgestore_primitives::IndexTypeId,
        gid1: Option<Gid>,
        colo: Option<Colo>,
        start: Vec<u8>,
        end: Vec<u8>,
    ) -> Result<Vec<Arc<Instance>>, EdgeStoreError> {
        let probe = ProbeKey::Range(start.clone(), end.clone());
        let cache_key = gid1.map(|g| (g.colo(), schema.edgetype, g));

        if self.query_cache_enabled() {
            if let Some(key) = &cache_key {
                if let Some(CachedValue::Rows(rows)) =
                    self.query_cache.lock().get(key).and_then(|m| m.get(&probe))
                {
                    let rows = rows.clone();
                    return rows
                        .into_iter()
                        .map(|r| Ok(self.materialize(schema, Some(r))?.unwrap()))
                        .collect();
                }
            }
        }

        let rows = self.store.query(
            schema.edgetype,
            QueryScope::ByIndex {
                indextype,
                gid1,
                colo,
                start: start.clone(),
                end: end.clone(),
            },
        )?;

        if self.query_cache_enabled() {
            if let Some(key) = cache_key {
                self.query_cache
                    .lock()
                    .entry(key)
                    .or_default()
                    .insert(probe, CachedValue::Rows(rows.clone()));
            }
        }

        rows.into_iter()
            .map(|r| Ok(self.materialize(schema, Some(r))?.unwrap()))
            .collect()
    }
}

/// Walks a dotted attribute path (e.g. `"phone.code"`) through `datadict`,
/// descending into nested `LocalData` (`Value::Map`) and `Repeated`
/// (`Value::List`) values one path segment at a time. A `Repeated` segment
/// fans each collected value out across all of its children, so a path
/// through two repeated ancestors yields one value per combination. A
/// missing or `Null` segment yields a single `Value::Null` rather than
/// dropping the path, so one absent attribute in a multi-attribute index
/// doesn't collapse the whole tuple set.
fn collect_path_values(datadict: &BTreeMap<String, Value>, path: &str) -> Vec<Value> {
    let mut parts = path.split('.');
    let head = parts.next().unwrap_or(path);
    let mut current = vec![datadict.get(head).cloned().unwrap_or(Value::Null)];

    for part in parts {
        let mut next = Vec::with_capacity(current.len());
        for value in current {
            match value {
                Value::Map(fields) => next.push(fields.get(part).cloned().unwrap_or(Value::Null)),
                Value::List(items) => {
                    for item in items {
                        match item {
                            Value::Map(fields) => {
                                next.push(fields.get(part).cloned().unwrap_or(Value::Null))
                            }
                            _ => next.push(Value::Null),
                        }
                    }
                }
                _ => next.push(Value::Null),
            }
        }
        current = next;
    }

    // A path ending at a `Repeated` scalar leaf still needs flattening.
    let mut flattened = Vec::with_capacity(current.len());
    for value in current {
        match value {
            Value::List(items) => flattened.extend(items),
            other => flattened.push(other),
        }
    }
    if flattened.is_empty() {
        flattened.push(Value::Null);
    }
    flattened
}

/// The cartesian product of [`collect_path_values`] across every attribute
/// path an index declares — one tuple per combination, matching how a
/// `Repeated(LocalData(_))` attribute contributes one index row per child
/// element rather than one row per instance.
fn index_tuples(datadict: &BTreeMap<String, Value>, attr_paths: &[String]) -> Vec<Vec<Value>> {
    let mut tuples: Vec<Vec<Value>> = vec![Vec::with_capacity(attr_paths.len())];
    for attr_path in attr_paths {
        let values = collect_path_values(datadict, attr_path);
        let mut expanded = Vec::with_capacity(tuples.len() * values.len());
        for existing in &tuples {
            for value in &values {
                let mut tuple = existing.clone();
                tuple.push(value.clone());
                expanded.push(tuple);
            }
        }
        tuples = expanded;
    }
    tuples
}
