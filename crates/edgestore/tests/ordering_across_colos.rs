//! Two concurrent sessions lock the same gid and each increment a counter.
//! `MemoryShard` allows only one open transaction at a time, so a
//! contending `lock` surfaces as a storage error rather than blocking;
//! retrying on that error is what stands in here for two real processes
//! each eventually getting their turn. Neither increment may be lost.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use edgestore::schema::{AttributeDescriptor, AttributeKind, SchemaBuilder};
use edgestore::shard::{MemoryShard, ShardBackend};
use edgestore::{EdgeStoreError, Entity, EventBus, Session, Store, Value};

fn make_store() -> Arc<Store> {
    let backends: Vec<Arc<dyn ShardBackend>> = vec![Arc::new(MemoryShard::new())];
    Arc::new(Store::new(backends, 0))
}

#[test]
fn concurrent_increments_are_not_lost() {
    let store = make_store();
    let schema = SchemaBuilder::new("OrderingAcrossColosCounter")
        .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
        .attribute(AttributeDescriptor::new("counter", AttributeKind::Int).default(Value::Int(0)))
        .build(store.as_ref())
        .unwrap();

    let events = Arc::new(EventBus::new());
    let setup_session = Session::new(store.clone(), events.clone());
    let entity = Arc::new(Entity::new(schema.clone()));
    let created = entity.add(&setup_session, None, BTreeMap::new(), false).unwrap();
    let gid = created.gid1;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let events = events.clone();
            let entity = entity.clone();
            thread::spawn(move || {
                let session = Session::new(store, events);
                loop {
                    let result = session.lock(&[gid.colo()], |s| {
                        let instance = s.get(entity.schema(), gid, gid)?.unwrap();
                        let counter = instance.get("counter")?.unwrap().as_int().unwrap();
                        s.set(&instance, "counter", Value::Int(counter + 1))
                    });
                    match result {
                        Ok(()) => break,
                        Err(EdgeStoreError::Storage(_)) => {
                            thread::sleep(Duration::from_millis(1));
                            continue;
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // A fresh session has no stale cached instance, so this reads whatever
    // the shard actually committed.
    let verify_session = Session::new(store, events);
    let final_instance = entity.get(&verify_session, gid).unwrap().unwrap();
    assert_eq!(final_instance.get("counter").unwrap(), Some(Value::Int(2)));
}
