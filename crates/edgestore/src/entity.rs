//! `Entity`/`KeyEntity`: convenience layers over the generic edge model
//! for rows whose `gid1 == gid2` — a single gid identifies the whole row
//! rather than a pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use edgestore_primitives::{Colo, Gid};
use edgestore_schema::{Schema, Value};

use crate::error::EdgeStoreError;
use crate::query::Query;
use crate::session::{Instance, Session};

/// An edge whose schema declares a `PrimaryGid` role attribute, so
/// `gid1 == gid2` always holds. Adding one auto-generates a gid when none
/// is supplied, honoring a declared `ColoGid` attribute's value to pick
/// the colo.
pub struct Entity {
    schema: Arc<Schema>,
}

impl Entity {
    pub fn new(schema: Arc<Schema>) -> Self {
        assert!(
            schema.local_gid.is_some() && schema.local_gid == schema.remote_gid,
            "Entity schema `{}` must declare a PrimaryGid attribute",
            schema.name
        );
        Entity { schema }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Adds a new entity, generating a gid if none is supplied, then locks
    /// that gid's colo and delegates to [`Session::add`].
    pub fn add(
        &self,
        session: &Session,
        gid: Option<Gid>,
        mut datadict: BTreeMap<String, Value>,
        get_existing: bool,
    ) -> Result<Arc<Instance>, EdgeStoreError> {
        let gid = match gid {
            Some(gid) => gid,
            None => {
                let colo_gid = self.colo_gid_hint(&datadict);
                session.store().generate_gid(colo_gid, None)?
            }
        };
        if let Some(local) = &self.schema.local_gid {
            datadict.insert(local.clone(), Value::Int(gid.raw() as i64));
        }
        session.lock(&[gid.colo()], |s| {
            s.add(&self.schema, gid, gid, datadict.clone(), get_existing)
        })
    }

    pub fn get(&self, session: &Session, gid: Gid) -> Result<Option<Arc<Instance>>, EdgeStoreError> {
        session.get(&self.schema, gid, gid)
    }

    /// Locks `gid`'s colo and removes the entity if it exists.
    pub fn remove(&self, session: &Session, gid: Gid) -> Result<(), EdgeStoreError> {
        session.lock(&[gid.colo()], |s| {
            if let Some(instance) = s.get(&self.schema, gid, gid)? {
                s.remove(&instance)?;
            }
            Ok(())
        })
    }

    /// The colo implied by the schema's declared `ColoGid` attribute's
    /// value in `datadict`, if both are present.
    fn colo_gid_hint(&self, datadict: &BTreeMap<String, Value>) -> Option<Gid> {
        let colo_attr = self.schema.colo_gid.as_deref()?;
        let raw = datadict.get(colo_attr)?.as_int()?;
        Some(Gid::from_raw(raw as u64))
    }
}

/// An [`Entity`] whose schema declares exactly one `PrimaryKey` attribute,
/// backed by the automatically declared unique index on it
/// ([`edgestore_schema::SchemaBuilder::build`]). The key maps to a colo via
/// `crc32(key) mod 2^32`, so every `KeyEntity` with the same key always
/// routes to the same colo regardless of which process computes it.
pub struct KeyEntity {
    entity: Entity,
    key_attr: String,
}

impl KeyEntity {
    pub fn new(schema: Arc<Schema>) -> Self {
        let key_attr = schema
            .primary_key
            .clone()
            .unwrap_or_else(|| panic!("KeyEntity schema `{}` must declare a PrimaryKey attribute", schema.name));
        KeyEntity {
            entity: Entity::new(schema),
            key_attr,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.entity.schema()
    }

    pub fn key_to_colo(key: &str) -> Colo {
        Colo::new(crc32fast::hash(key.as_bytes()))
    }

    /// Adds an entity at a gid the caller already allocated, asserting it
    /// was allocated from the key's own colo.
    pub fn add(
        &self,
        session: &Session,
        gid: Gid,
        key: &str,
        mut datadict: BTreeMap<String, Value>,
        get_existing: bool,
    ) -> Result<Arc<Instance>, EdgeStoreError> {
        assert_eq!(
            gid.colo(),
            Self::key_to_colo(key),
            "gid's colo must match the key's colo"
        );
        datadict.insert(self.key_attr.clone(), Value::Str(key.to_string()));
        self.entity.add(session, Some(gid), datadict, get_existing)
    }

    /// Resolves `key` to its colo, locks it, and either returns the
    /// existing instance at that key (if `get_existing`) or allocates a
    /// fresh gid on that colo and adds a new one.
    pub fn add_by_key(
        &self,
        session: &Session,
        key: &str,
        mut datadict: BTreeMap<String, Value>,
        get_existing: bool,
    ) -> Result<Arc<Instance>, EdgeStoreError> {
        datadict.insert(self.key_attr.clone(), Value::Str(key.to_string()));
        let colo = Self::key_to_colo(key);
        session.lock(&[colo], |s| {
            if let Some(existing) = self.get_by_key(s, key)? {
                if get_existing {
                    return Ok(existing);
                }
                return Err(EdgeStoreError::DuplicateInstance(
                    self.entity.schema().edgetype,
                    existing.gid1,
                    existing.gid2,
                ));
            }
            let gid = s.store().generate_gid(None, Some(colo))?;
            self.entity.add(s, Some(gid), datadict.clone(), false)
        })
    }

    /// Resolves `key` to its colo and looks it up through the primary-key
    /// index. Works with or without an outer lock scope already open.
    pub fn get_by_key(&self, session: &Session, key: &str) -> Result<Option<Arc<Instance>>, EdgeStoreError> {
        let colo = Self::key_to_colo(key);
        let key_attr = self
            .entity
            .schema()
            .attribute(&self.key_attr)
            .expect("KeyEntity schema must still declare its own primary key attribute");
        let mut results = Query::new(self.entity.schema().clone())
            .colo(colo)
            .arg(key_attr.eq(Value::Str(key.to_string()))?)?
            .fetch(session)?;
        Ok(results.pop())
    }

    /// Locks the key's colo and removes the entity at that key, if any.
    pub fn delete_by_key(&self, session: &Session, key: &str) -> Result<(), EdgeStoreError> {
        let colo = Self::key_to_colo(key);
        session.lock(&[colo], |s| {
            if let Some(found) = self.get_by_key(s, key)? {
                let relocked = s
                    .get(self.entity.schema(), found.gid1, found.gid2)?
                    .expect("instance just found by query must still exist inside the same lock");
                s.remove(&relocked)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgestore_schema::{AttributeDescriptor, AttributeKind, SchemaBuilder};
    use edgestore_shard::{MemoryShard, ShardBackend};
    use crate::events::EventBus;
    use crate::store::Store;

    fn make_store(hosts: usize) -> Arc<Store> {
        let backends: Vec<Arc<dyn ShardBackend>> =
            (0..hosts).map(|_| Arc::new(MemoryShard::new()) as Arc<dyn ShardBackend>).collect();
        Arc::new(Store::new(backends, 0))
    }

    fn profile_schema(store: &Store) -> Arc<Schema> {
        SchemaBuilder::new("EntityTestProfile")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new("name", AttributeKind::String))
            .build(store)
            .unwrap()
    }

    fn account_schema(store: &Store) -> Arc<Schema> {
        SchemaBuilder::new("EntityTestAccount")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new("email", AttributeKind::PrimaryKey))
            .attribute(AttributeDescriptor::new("plan", AttributeKind::String))
            .build(store)
            .unwrap()
    }

    #[test]
    fn add_without_gid_generates_one_and_round_trips() {
        let store = make_store(3);
        let schema = profile_schema(&store);
        let session = Session::new(store, Arc::new(EventBus::new()));
        let entity = Entity::new(schema);

        let mut data = BTreeMap::new();
        data.insert("name".to_string(), Value::Str("ada".into()));
        let created = entity.add(&session, None, data, false).unwrap();
        let gid = created.gid1;
        assert_eq!(created.gid2, gid);

        let fetched = entity.get(&session, gid).unwrap().unwrap();
        assert_eq!(fetched.get("name").unwrap(), Some(Value::Str("ada".into())));
    }

    #[test]
    fn key_entity_auto_declares_unique_index() {
        let store = make_store(1);
        let schema = account_schema(&store);
        assert_eq!(schema.indices.len(), 1);
        assert!(schema.indices[0].unique);
        assert_eq!(schema.indices[0].attrs, vec!["email".to_string()]);
    }

    #[test]
    fn add_by_key_then_get_by_key_round_trips() {
        let store = make_store(4);
        let schema = account_schema(&store);
        let session = Session::new(store, Arc::new(EventBus::new()));
        let key_entity = KeyEntity::new(schema);

        let mut data = BTreeMap::new();
        data.insert("plan".to_string(), Value::Str("pro".into()));
        let created = key_entity.add_by_key(&session, "ada@example.com", data.clone(), false).unwrap();

        let fetched = key_entity.get_by_key(&session, "ada@example.com").unwrap().unwrap();
        assert_eq!(fetched.gid1, created.gid1);
        assert_eq!(created.gid1.colo(), KeyEntity::key_to_colo("ada@example.com"));

        let dup = key_entity.add_by_key(&session, "ada@example.com", data, false);
        assert!(matches!(dup, Err(EdgeStoreError::DuplicateInstance(..))));
    }

    #[test]
    fn delete_by_key_removes_the_row() {
        let store = make_store(2);
        let schema = account_schema(&store);
        let session = Session::new(store, Arc::new(EventBus::new()));
        let key_entity = KeyEntity::new(schema);

        let mut data = BTreeMap::new();
        data.insert("plan".to_string(), Value::Str("free".into()));
        key_entity.add_by_key(&session, "bob@example.com", data, false).unwrap();
        key_entity.delete_by_key(&session, "bob@example.com").unwrap();

        assert!(key_entity.get_by_key(&session, "bob@example.com").unwrap().is_none());
    }
}
