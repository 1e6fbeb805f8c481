//! The query planner: accumulates equality/inequality/order args against a
//! schema, selects a matching declared index, and computes the
//! order-preserving byte range to scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use edgestore_escode::encode_index;
use edgestore_primitives::{Colo, Gid, IndexTypeId};
use edgestore_schema::{Arg, ArgKind, Op, Schema, Value};

use crate::error::{EdgeStoreError, QueryError};
use crate::session::{Instance, Session};
use crate::store::QueryScope;

/// Accumulates query args against one schema class, the Rust-native
/// replacement for chained comparison operators on an attribute handle.
pub struct Query {
    schema: Arc<Schema>,
    equality: BTreeMap<String, Value>,
    inequality_attr: Option<String>,
    start_bound: Option<(Op, Value)>,
    end_bound: Option<(Op, Value)>,
    order_attr: Option<String>,
    colo: Option<Colo>,
}

impl Query {
    pub fn new(schema: Arc<Schema>) -> Self {
        Query {
            schema,
            equality: BTreeMap::new(),
            inequality_attr: None,
            start_bound: None,
            end_bound: None,
            order_attr: None,
            colo: None,
        }
    }

    pub fn colo(mut self, colo: Colo) -> Self {
        self.colo = Some(colo);
        self
    }

    /// Add one query term. Equality args accumulate into a map; at most
    /// one distinct attribute may appear across the inequality args, and
    /// at most one `start` (`Gt`/`Ge`) and one `end` (`Lt`/`Le`) bound.
    pub fn arg(mut self, arg: Arg) -> Result<Self, QueryError> {
        match arg.kind {
            ArgKind::Compare(Op::Eq, value) => {
                self.equality.insert(arg.attr, value);
            }
            ArgKind::Compare(op @ (Op::Gt | Op::Ge), value) => {
                self.check_single_inequality_attr(&arg.attr)?;
                self.inequality_attr = Some(arg.attr);
                self.start_bound = Some((op, value));
            }
            ArgKind::Compare(op @ (Op::Lt | Op::Le), value) => {
                self.check_single_inequality_attr(&arg.attr)?;
                self.inequality_attr = Some(arg.attr);
                self.end_bound = Some((op, value));
            }
            ArgKind::Order(_dir) => {
                // The first order attr must equal the inequality attr, if
                // any; beyond the index's own natural order no additional
                // sort is performed (the order() contract does not require
                // SQL-level ordering beyond that).
                if let Some(ineq) = &self.inequality_attr {
                    if ineq != &arg.attr {
                        return Err(QueryError::OrderInequalityMismatch(
                            arg.attr.clone(),
                            ineq.clone(),
                        ));
                    }
                }
                if self.order_attr.is_none() {
                    self.order_attr = Some(arg.attr);
                }
            }
        }
        Ok(self)
    }

    fn check_single_inequality_attr(&self, attr: &str) -> Result<(), QueryError> {
        if let Some(existing) = &self.inequality_attr {
            if existing != attr {
                return Err(QueryError::MultipleInequalityAttrs(attr.to_string()));
            }
        }
        Ok(())
    }

    /// Resolve this query into a concrete scan plus the strict-bound
    /// exclusions computed from the same equality prefix, in one pass so
    /// the two can never disagree on attribute order: either the by-parent
    /// fast path (a bare equality on the local-gid attribute, nothing
    /// else) or an index scan. The local-gid equality arg, like any other
    /// equality arg, participates in index selection — `index.py::
    /// Index.match`/`Query.range` keep it in `equalargs` rather than
    /// special-casing it out, since a declared index's leading attribute is
    /// often the local gid itself (e.g. `Index(usergid, subscribed)`).
    fn plan_with_exclusions(&self) -> Result<(QueryScope, Vec<Vec<u8>>), QueryError> {
        let local_gid_attr = self.schema.local_gid.as_deref();
        let local_gid_value = local_gid_attr.and_then(|name| self.equality.get(name));
        let implied_colo = local_gid_value.and_then(Value::as_int).map(|raw| Gid::from_raw(raw as u64).colo());

        if let (Some(explicit), Some(implied)) = (self.colo, implied_colo) {
            if explicit != implied {
                return Err(QueryError::ConflictingColo);
            }
        }
        let effective_colo = self.colo.or(implied_colo);

        let full_equality: BTreeMap<&String, &Value> = self.equality.iter().collect();

        if full_equality.len() <= 1
            && self.inequality_attr.is_none()
            && self.order_attr.is_none()
        {
            if let Some(gid1_raw) = local_gid_value.and_then(Value::as_int) {
                return Ok((QueryScope::ByParent { gid1: Gid::from_raw(gid1_raw as u64) }, Vec::new()));
            }
        }

        let residual: Vec<&String> = match (&self.inequality_attr, &self.order_attr) {
            (Some(a), _) => vec![a],
            (None, Some(a)) => vec![a],
            (None, None) => vec![],
        };

        let single_colo = effective_colo.is_some();
        let index = select_index(&self.schema, &full_equality, &residual, single_colo)
            .ok_or(QueryError::NoMatchingIndex)?;

        if index.unique && !single_colo {
            return Err(QueryError::UniqueIndexNeedsColoScope(index.name.clone()));
        }

        let equality_len = full_equality.len();
        let mut base_values = Vec::with_capacity(equality_len);
        for attr_name in &index.attrs[..equality_len] {
            base_values.push((*full_equality.get(attr_name).unwrap()).clone());
        }

        let (start, end) = match (&self.start_bound, &self.end_bound) {
            (None, None) => {
                let start = encode_index(&base_values, false);
                let end = encode_index(&base_values, true);
                (start, end)
            }
            (start_bound, end_bound) => {
                let mut start_values = base_values.clone();
                let start = match start_bound {
                    Some((_, v)) => {
                        start_values.push(v.clone());
                        encode_index(&start_values, false)
                    }
                    None => encode_index(&base_values, false),
                };
                let mut end_values = base_values.clone();
                let end = match end_bound {
                    Some((_, v)) => {
                        end_values.push(v.clone());
                        encode_index(&end_values, false)
                    }
                    None => encode_index(&end_values, true),
                };
                (start, end)
            }
        };

        // Strict (`Gt`/`Lt`) bounds scan the inclusive range above and get
        // the exact boundary value filtered out post-hoc in `fetch`, since
        // `encode_index` has no predecessor operation for a byte string.
        // Built from the same `base_values` (in index-attribute order) used
        // for the range itself, so this can never disagree with `plan`'s
        // own ordering.
        let mut exclusions = Vec::new();
        if let Some((Op::Gt, v)) = &self.start_bound {
            let mut tuple = base_values.clone();
            tuple.push(v.clone());
            exclusions.push(encode_index(&tuple, false));
        }
        if let Some((Op::Lt, v)) = &self.end_bound {
            let mut tuple = base_values;
            tuple.push(v.clone());
            exclusions.push(encode_index(&tuple, false));
        }

        let gid1 = local_gid_value.and_then(Value::as_int).map(|raw| Gid::from_raw(raw as u64));
        Ok((
            QueryScope::ByIndex {
                indextype: index.type_id,
                gid1,
                colo: effective_colo,
                start,
                end,
            },
            exclusions,
        ))
    }

    #[cfg(test)]
    fn plan(&self) -> Result<QueryScope, QueryError> {
        self.plan_with_exclusions().map(|(scope, _)| scope)
    }

    /// Executes the query against a locked-or-unlocked session, returning
    /// matching instances materialized in `(indexvalue, revision DESC)`
    /// order (or `revision DESC` order for the by-parent fast path).
    pub fn fetch(&self, session: &Session) -> Result<Vec<Arc<Instance>>, EdgeStoreError> {
        let (scope, exclusions) = self.plan_with_exclusions()?;
        match scope {
            QueryScope::ByParent { gid1 } => session.query_parent(&self.schema, gid1),
            QueryScope::ByIndex { indextype, gid1, colo, start, end } => {
                let rows = session.query_range(&self.schema, indextype, gid1, colo, start, end)?;
                Ok(rows
                    .into_iter()
                    .filter(|instance| !self.instance_matches_exclusion(instance, &exclusions))
                    .collect())
            }
        }
    }

    fn instance_matches_exclusion(&self, instance: &Arc<Instance>, exclusions: &[Vec<u8>]) -> bool {
        if exclusions.is_empty() {
            return false;
        }
        let Some(attr) = self.inequality_attr.as_deref() else { return false };
        let Ok(value) = instance.get(attr) else { return false };
        let Some(value) = value else { return false };
        let encoded = encode_index(std::slice::from_ref(&value), false);
        exclusions.iter().any(|ex| ex.ends_with(&encoded))
    }
}

/// Selects the first declared index whose attribute sequence begins with
/// some permutation of `equality` followed by `residual` (in order),
/// consuming at most the index's own length.
fn select_index<'a>(
    schema: &'a Schema,
    equality: &BTreeMap<&String, &Value>,
    residual: &[&String],
    single_colo: bool,
) -> Option<&'a edgestore_schema::IndexDef> {
    'outer: for index in &schema.indices {
        if index.unique && !single_colo {
            continue;
        }
        let consumed = equality.len() + residual.len();
        if consumed > index.attrs.len() {
            continue;
        }
        let equality_part: std::collections::HashSet<&String> =
            index.attrs[..equality.len()].iter().collect();
        for name in equality.keys() {
            if !equality_part.contains(*name) {
                continue 'outer;
            }
        }
        for (i, attr) in residual.iter().enumerate() {
            if index.attrs[equality.len() + i] != **attr {
                continue 'outer;
            }
        }
        return Some(index);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgestore_primitives::EdgeTypeId;
    use edgestore_schema::{AttributeDescriptor, AttributeKind, SchemaBuilder};
    use edgestore_shard::{MemoryShard, ShardBackend};
    use crate::events::EventBus;
    use crate::store::Store;
    use std::collections::BTreeMap as StdBTreeMap;

    fn build_assoc_schema(store: &Store) -> Arc<Schema> {
        SchemaBuilder::new("QueryTestAssoc")
            .attribute(AttributeDescriptor::new("usergid", AttributeKind::LocalGid))
            .attribute(AttributeDescriptor::new("eventgid", AttributeKind::RemoteGid))
            .attribute(AttributeDescriptor::new("subscribed", AttributeKind::Bool))
            .index(vec!["usergid".to_string(), "subscribed".to_string()], false)
            .build(store)
            .unwrap()
    }

    #[test]
    fn index_query_returns_matching_row_only() {
        let backends: Vec<Arc<dyn ShardBackend>> =
            vec![Arc::new(MemoryShard::new()) as Arc<dyn ShardBackend>];
        let store = Arc::new(Store::new(backends, 0));
        let schema = build_assoc_schema(&store);
        let events = Arc::new(EventBus::new());
        let session = Session::new(store.clone(), events);

        let user = store.generate_gid(None, Some(Colo(1))).unwrap();
        let e1 = store.generate_gid(None, Some(Colo(1))).unwrap();
        let e2 = store.generate_gid(None, Some(Colo(1))).unwrap();
        let e3 = store.generate_gid(None, Some(Colo(1))).unwrap();

        session
            .lock(&[Colo(1)], |s| {
                for (event, subscribed) in [(e1, false), (e2, true), (e3, false)] {
                    let mut data = StdBTreeMap::new();
                    data.insert("usergid".to_string(), Value::Int(user.raw() as i64));
                    data.insert("eventgid".to_string(), Value::Int(event.raw() as i64));
                    data.insert("subscribed".to_string(), Value::Bool(subscribed));
                    s.add(&schema, user, event, data, false)?;
                }
                Ok(())
            })
            .unwrap();

        let usergid_attr = schema.attribute("usergid").unwrap();
        let subscribed_attr = schema.attribute("subscribed").unwrap();
        let query = Query::new(schema.clone())
            .arg(usergid_attr.eq(Value::Int(user.raw() as i64)).unwrap())
            .unwrap()
            .arg(subscribed_attr.eq(Value::Bool(true)).unwrap())
            .unwrap();

        let results = query.fetch(&session).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].gid2, e2);
    }

    #[test]
    fn conflicting_colo_is_rejected() {
        let backends: Vec<Arc<dyn ShardBackend>> =
            vec![Arc::new(MemoryShard::new()) as Arc<dyn ShardBackend>];
        let store = Arc::new(Store::new(backends, 0));
        let schema = build_assoc_schema(&store);
        let usergid_attr = schema.attribute("usergid").unwrap();
        let user = Gid::new(Colo(5), 1);

        let query = Query::new(schema.clone())
            .colo(Colo(9))
            .arg(usergid_attr.eq(Value::Int(user.raw() as i64)).unwrap())
            .unwrap();

        let err = query.plan().unwrap_err();
        assert_eq!(err, QueryError::ConflictingColo);
    }
}
