//! Sharded relational edge storage: rows keyed by `(edgetype, gid1, gid2)`
//! with secondary indices, routed across hosts by colo.
//!
//! A process builds a [`Store`] over its [`edgestore_shard::ShardBackend`]
//! hosts, registers schemas with [`edgestore_schema::SchemaBuilder`] against
//! it, and opens a [`Session`] to read and write through [`Session::lock`]
//! scopes. [`Entity`]/[`KeyEntity`] add gid-generation and key-routing sugar
//! on top for the common case of one gid (or one unique key) per row.

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod query;
pub mod session;
pub mod store;

pub use config::Config;
pub use entity::{Entity, KeyEntity};
pub use error::{EdgeStoreError, QueryError};
pub use events::{ChangeKind, ChangedEvent, EventBus, Listener};
pub use query::Query;
pub use session::{Instance, ProbeKey, Session};
pub use store::{QueryScope, Store};

pub use edgestore_escode::{self as escode, Value};
pub use edgestore_primitives as primitives;
pub use edgestore_schema as schema;
pub use edgestore_shard as shard;
