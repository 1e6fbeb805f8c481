//! Two properties the rest of the suite leans on without stating outright:
//!
//! - round-trip: whatever a descriptor accepts on the way in comes back
//!   unchanged on the way out, through the full save/materialize path.
//! - index order: a query ordered on an indexed attribute comes back sorted
//!   by that attribute's own ordering, even when the matching rows live on
//!   different colos and have to be merged.

use std::collections::BTreeMap;
use std::sync::Arc;

use edgestore::schema::{AttributeDescriptor, AttributeKind, SchemaBuilder};
use edgestore::shard::{MemoryShard, ShardBackend};
use edgestore::{Entity, EventBus, Query, Session, Store, Value};

fn make_store(hosts: usize) -> Arc<Store> {
    let backends: Vec<Arc<dyn ShardBackend>> =
        (0..hosts).map(|_| Arc::new(MemoryShard::new()) as Arc<dyn ShardBackend>).collect();
    Arc::new(Store::new(backends, 0))
}

fn phone_tuple(code: i64) -> Value {
    let mut map = BTreeMap::new();
    map.insert("code".to_string(), Value::Int(code));
    Value::Map(map)
}

#[test]
fn save_then_get_round_trips_every_attribute_kind() {
    let store = make_store(1);
    let phone_schema = SchemaBuilder::new("LawsPhone")
        .attribute(AttributeDescriptor::new("code", AttributeKind::Int))
        .build(store.as_ref())
        .unwrap();

    let schema = SchemaBuilder::new("LawsProfile")
        .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
        .attribute(AttributeDescriptor::new("name", AttributeKind::String))
        .attribute(AttributeDescriptor::new("active", AttributeKind::Bool))
        .attribute(AttributeDescriptor::new("balance", AttributeKind::Float))
        .attribute(AttributeDescriptor::new(
            "phone",
            AttributeKind::Repeated(Box::new(AttributeKind::LocalData(phone_schema))),
        ))
        .build(store.as_ref())
        .unwrap();

    let session = Session::new(store, Arc::new(EventBus::new()));
    let entity = Entity::new(schema);

    let mut data = BTreeMap::new();
    data.insert("name".to_string(), Value::Str("grace".into()));
    data.insert("active".to_string(), Value::Bool(true));
    data.insert("balance".to_string(), Value::Float(-12.5));
    data.insert(
        "phone".to_string(),
        Value::List(vec![phone_tuple(1), phone_tuple(2)]),
    );
    let created = entity.add(&session, None, data.clone(), false).unwrap();

    // A fresh session forces a genuine decode off the shard rather than a
    // cache hit, so this actually exercises `from_base`.
    let verify_session = Session::new(session.store().clone(), Arc::new(EventBus::new()));
    let fetched = entity.get(&verify_session, created.gid1).unwrap().unwrap();

    for (attr, expected) in &data {
        assert_eq!(fetched.get(attr).unwrap().as_ref(), Some(expected), "attribute `{attr}` did not round-trip");
    }
}

#[test]
fn ordered_query_sorts_by_the_indexed_attribute_across_colos() {
    let store = make_store(3);
    let schema = SchemaBuilder::new("LawsScore")
        .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
        .attribute(AttributeDescriptor::new("score", AttributeKind::Int))
        .index(vec!["score".to_string()], false)
        .build(store.as_ref())
        .unwrap();

    let session = Session::new(store, Arc::new(EventBus::new()));
    let entity = Entity::new(schema.clone());

    let scores = [10, -100, 2, 0, -5, 42];
    for &score in &scores {
        let mut data = BTreeMap::new();
        data.insert("score".to_string(), Value::Int(score));
        entity.add(&session, None, data, false).unwrap();
    }

    let score_attr = schema.attribute("score").unwrap();
    let results = Query::new(schema.clone())
        .arg(score_attr.asc())
        .unwrap()
        .fetch(&session)
        .unwrap();

    let mut expected = scores.to_vec();
    expected.sort();
    let actual: Vec<i64> = results
        .iter()
        .map(|instance| instance.get("score").unwrap().unwrap().as_int().unwrap())
        .collect();
    assert_eq!(actual, expected);
}
