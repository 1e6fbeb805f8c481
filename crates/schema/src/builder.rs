use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use edgestore_escode::Value;
use edgestore_primitives::{EdgeTypeId, IndexTypeId};
use indexmap::IndexMap;

use crate::descriptor::{AttributeDescriptor, Role};
use crate::error::{SchemaError, ValidationError};
use crate::kind::AttributeKind;

const RESERVED_NAMES: &[&str] = &["get", "gid1", "gid2"];

/// Allocates stable edgetype/indextype ids from the shared `definitions`
/// namespace. Implemented by the store that owns the definitions table;
/// `was_new` tells the builder whether this name was just allocated
/// (`true`) or already existed.
pub trait TypeRegistry {
    fn add_or_get_definition_type(&self, name: &str) -> (u64, bool);
}

/// A declared secondary index: a sequence of attribute paths (dotted for
/// nested access) and whether it enforces uniqueness.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub type_id: IndexTypeId,
    pub name: String,
    pub attrs: Vec<String>,
    pub unique: bool,
}

/// Input to [`SchemaBuilder`]: one index to be registered, before the
/// builder has resolved its attribute paths or allocated its id.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub attrs: Vec<String>,
    pub unique: bool,
}

/// A fully registered class: its merged attribute set, its role attrs, and
/// its index set. Immutable once built; shared via `Arc` so `LocalData`
/// attributes and the store's `edgetype -> Schema` map can hold cheap
/// references.
#[derive(Debug)]
pub struct Schema {
    pub name: String,
    pub edgetype: EdgeTypeId,
    pub attributes: IndexMap<String, AttributeDescriptor>,
    pub local_gid: Option<String>,
    pub remote_gid: Option<String>,
    pub colo_gid: Option<String>,
    pub primary_key: Option<String>,
    pub indices: Vec<IndexDef>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Attributes that are part of the serialized payload: everything
    /// except `Computed` attrs and the pure-identity gid roles, which
    /// exist only to route a row and never travel in its data column.
    pub fn payload_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes
            .values()
            .filter(|d| !d.is_computed() && !d.kind.is_identity_only())
    }

    /// Validate and convert every payload attribute of `datadict` to its
    /// base representation, equivalent to the original's
    /// `to_dict(validate=true)` on a nested `LocalData` instance.
    pub fn to_base_map(
        &self,
        datadict: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, ValidationError> {
        let mut out = BTreeMap::new();
        for attr in self.payload_attributes() {
            let value = datadict.get(&attr.name).or(attr.default.as_ref());
            attr.validate(value)?;
            if let Some(v) = value {
                out.insert(attr.name.clone(), attr.to_base(v)?);
            }
        }
        Ok(out)
    }

    pub fn from_base_map(
        &self,
        base: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, ValidationError> {
        let mut out = BTreeMap::new();
        for attr in self.payload_attributes() {
            if let Some(v) = base.get(&attr.name) {
                out.insert(attr.name.clone(), attr.from_base(v)?);
            }
        }
        Ok(out)
    }

    /// Resolve a dotted attribute path (e.g. `"phone.code"`) against this
    /// schema, walking through `LocalData`/`Repeated(LocalData)` attributes.
    pub fn resolve_path(&self, path: &str) -> Result<ResolvedAttr<'_>, SchemaError> {
        let mut parts = path.split('.');
        let head = parts.next().ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
        let mut descriptor = self
            .attributes
            .get(head)
            .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
        let mut through_repeated = matches!(descriptor.kind, AttributeKind::Repeated(_));
        let mut current_schema: Option<&Schema> = match &descriptor.kind {
            AttributeKind::LocalData(s) => Some(s.as_ref()),
            AttributeKind::Repeated(elem) => match elem.as_ref() {
                AttributeKind::LocalData(s) => Some(s.as_ref()),
                _ => None,
            },
            _ => None,
        };

        for part in parts {
            let schema = current_schema
                .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
            descriptor = schema
                .attributes
                .get(part)
                .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
            through_repeated = through_repeated || matches!(descriptor.kind, AttributeKind::Repeated(_));
            current_schema = match &descriptor.kind {
                AttributeKind::LocalData(s) => Some(s.as_ref()),
                AttributeKind::Repeated(elem) => match elem.as_ref() {
                    AttributeKind::LocalData(s) => Some(s.as_ref()),
                    _ => None,
                },
                _ => None,
            };
        }

        Ok(ResolvedAttr {
            path: path.to_string(),
            leaf: descriptor,
            settable: !through_repeated,
        })
    }
}

/// The descriptor a dotted path resolves to, plus whether `set` is
/// supported through it. For repeated parents, `set` is unsupported and
/// `get` returns the tuple of child reads.
pub struct ResolvedAttr<'a> {
    pub path: String,
    pub leaf: &'a AttributeDescriptor,
    pub settable: bool,
}

/// Builds a [`Schema`] from a flat list of attribute and index
/// declarations: merge parent attrs, scan declared attrs for reserved
/// names and duplicate roles, allocate a stable edgetype id, then allocate
/// and merge indices. Replaces the original's class-declaration-time
/// metaclass with an explicit builder.
pub struct SchemaBuilder {
    name: String,
    parent: Option<Arc<Schema>>,
    attrs: Vec<AttributeDescriptor>,
    indices: Vec<IndexSpec>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            name: name.into(),
            parent: None,
            attrs: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: Arc<Schema>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attrs.push(descriptor);
        self
    }

    pub fn index(mut self, attrs: Vec<String>, unique: bool) -> Self {
        self.indices.push(IndexSpec { attrs, unique });
        self
    }

    pub fn build(self, registry: &dyn TypeRegistry) -> Result<Arc<Schema>, SchemaError> {
        // Step 1: merge parent attrs (deep copy; IndexMap clone copies each
        // descriptor by value so later mutation of the parent's own Schema
        // can never leak into this one).
        let mut merged: IndexMap<String, AttributeDescriptor> = IndexMap::new();
        let mut roles: HashMap<Role, String> = HashMap::new();
        let mut parent_indices: Vec<IndexDef> = Vec::new();
        let mut new_primary_key: Option<String> = None;
        if let Some(parent) = &self.parent {
            for (name, desc) in &parent.attributes {
                merged.insert(name.clone(), desc.clone());
                if let Some(role) = desc.role() {
                    roles.insert(role, name.clone());
                }
            }
            parent_indices = parent.indices.clone();
        }

        // Step 2: scan declared attributes, assign names, reject reserved
        // names and duplicate roles.
        for desc in self.attrs {
            if RESERVED_NAMES.contains(&desc.name.as_str()) {
                return Err(SchemaError::ReservedName(desc.name));
            }
            if merged.contains_key(&desc.name) {
                return Err(SchemaError::DuplicateAttribute(desc.name));
            }
            if let Some(role) = desc.role() {
                if roles.contains_key(&role) {
                    return Err(SchemaError::DuplicateRole(role));
                }
                if role == Role::PrimaryGid {
                    if roles.contains_key(&Role::LocalGid) || roles.contains_key(&Role::RemoteGid) {
                        return Err(SchemaError::DuplicateRole(role));
                    }
                    roles.insert(Role::LocalGid, desc.name.clone());
                    roles.insert(Role::RemoteGid, desc.name.clone());
                } else if role == Role::LocalGid || role == Role::RemoteGid {
                    if roles.contains_key(&Role::PrimaryGid) {
                        return Err(SchemaError::DuplicateRole(Role::PrimaryGid));
                    }
                }
                roles.insert(role, desc.name.clone());
                if (role == Role::ColoGid && roles.contains_key(&Role::PrimaryKey))
                    || (role == Role::PrimaryKey && roles.contains_key(&Role::ColoGid))
                {
                    return Err(SchemaError::ColoGidAndPrimaryKeyConflict);
                }
                if role == Role::PrimaryKey {
                    new_primary_key = Some(desc.name.clone());
                }
            }
            merged.insert(desc.name.clone(), desc);
        }

        // Step 3: allocate a stable edgetype id; reject re-registration of
        // the same name.
        let (raw_id, was_new) = registry.add_or_get_definition_type(&self.name);
        if !was_new {
            return Err(SchemaError::DuplicateEdgeType(self.name));
        }
        let edgetype = EdgeTypeId(raw_id);

        // Step 4: allocate index ids for each declared index (own indices
        // only need name resolution here; merged with parent indices next).
        let schema_name = self.name.clone();
        let mut own_indices = Vec::with_capacity(self.indices.len());
        for spec in self.indices {
            for attr_path in &spec.attrs {
                resolve_path_against(&merged, attr_path)?;
            }
            let index_name = format!("{}:{}", schema_name, spec.attrs.join(":"));
            let (index_raw, _) = registry.add_or_get_definition_type(&index_name);
            own_indices.push(IndexDef {
                type_id: IndexTypeId(index_raw),
                name: index_name,
                attrs: spec.attrs,
                unique: spec.unique,
            });
        }

        // A freshly declared PrimaryKey attribute gets its own unique
        // index automatically, the way a KeyEntity picks up its
        // primary-key lookup without an explicit `.index()` call.
        if let Some(key_attr) = new_primary_key {
            let index_name = format!("{}:{}:primarykey", schema_name, key_attr);
            let (index_raw, _) = registry.add_or_get_definition_type(&index_name);
            own_indices.push(IndexDef {
                type_id: IndexTypeId(index_raw),
                name: index_name,
                attrs: vec![key_attr],
                unique: true,
            });
        }

        // Step 4 (cont'd): merge parent indices.
        let mut indices = parent_indices;
        indices.extend(own_indices);

        Ok(Arc::new(Schema {
            name: schema_name,
            edgetype,
            attributes: merged,
            local_gid: roles.get(&Role::LocalGid).cloned(),
            remote_gid: roles.get(&Role::RemoteGid).cloned(),
            colo_gid: roles.get(&Role::ColoGid).cloned(),
            primary_key: roles.get(&Role::PrimaryKey).cloned(),
            indices,
        }))
    }
}

/// Path resolution against an in-progress attribute map (used during
/// index declaration, before the `Schema` itself exists).
fn resolve_path_against(
    attrs: &IndexMap<String, AttributeDescriptor>,
    path: &str,
) -> Result<(), SchemaError> {
    let mut parts = path.split('.');
    let head = parts
        .next()
        .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
    let mut descriptor = attrs
        .get(head)
        .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
    for part in parts {
        let nested = match &descriptor.kind {
            AttributeKind::LocalData(s) => s.as_ref(),
            AttributeKind::Repeated(elem) => match elem.as_ref() {
                AttributeKind::LocalData(s) => s.as_ref(),
                _ => return Err(SchemaError::UnknownIndexAttr(path.to_string())),
            },
            _ => return Err(SchemaError::UnknownIndexAttr(path.to_string())),
        };
        descriptor = nested
            .attributes
            .get(part)
            .ok_or_else(|| SchemaError::UnknownIndexAttr(path.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingRegistry {
        next: AtomicU64,
        seen: parking_lot::Mutex<HashMap<String, u64>>,
    }

    impl CountingRegistry {
        fn new() -> Self {
            CountingRegistry {
                next: AtomicU64::new(2), // 1 is reserved for the definitions edgetype itself
                seen: parking_lot::Mutex::new(HashMap::new()),
            }
        }
    }

    impl TypeRegistry for CountingRegistry {
        fn add_or_get_definition_type(&self, name: &str) -> (u64, bool) {
            let mut seen = self.seen.lock();
            if let Some(id) = seen.get(name) {
                return (*id, false);
            }
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            seen.insert(name.to_string(), id);
            (id, true)
        }
    }

    #[test]
    fn builds_simple_schema_with_role_attrs() {
        let registry = CountingRegistry::new();
        let schema = SchemaBuilder::new("TestUser")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new("email", AttributeKind::String))
            .attribute(
                AttributeDescriptor::new("counter", AttributeKind::Int).default(Value::Int(0)),
            )
            .build(&registry)
            .unwrap();

        assert_eq!(schema.local_gid.as_deref(), Some("gid"));
        assert_eq!(schema.remote_gid.as_deref(), Some("gid"));
        assert!(schema.attribute("email").unwrap().required);
    }

    #[test]
    fn duplicate_edgetype_registration_fails() {
        let registry = CountingRegistry::new();
        SchemaBuilder::new("Dup")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .build(&registry)
            .unwrap();

        let err = SchemaBuilder::new("Dup")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .build(&registry)
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateEdgeType("Dup".to_string()));
    }

    #[test]
    fn colo_gid_and_primary_key_are_mutually_exclusive() {
        let registry = CountingRegistry::new();
        let err = SchemaBuilder::new("Bad")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new("colo", AttributeKind::ColoGid))
            .attribute(AttributeDescriptor::new("key", AttributeKind::PrimaryKey))
            .build(&registry)
            .unwrap_err();
        assert_eq!(err, SchemaError::ColoGidAndPrimaryKeyConflict);
    }

    #[test]
    fn reserved_attribute_name_is_rejected() {
        let registry = CountingRegistry::new();
        let err = SchemaBuilder::new("Bad2")
            .attribute(AttributeDescriptor::new("gid1", AttributeKind::String))
            .build(&registry)
            .unwrap_err();
        assert_eq!(err, SchemaError::ReservedName("gid1".to_string()));
    }

    #[test]
    fn index_on_nested_local_data_resolves() {
        let registry = CountingRegistry::new();
        let phone_schema = SchemaBuilder::new("Phone")
            .attribute(AttributeDescriptor::new("code", AttributeKind::Int))
            .attribute(AttributeDescriptor::new("number", AttributeKind::Int))
            .build(&registry)
            .unwrap();

        let schema = SchemaBuilder::new("TestUserWithPhones")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new(
                "phone",
                AttributeKind::Repeated(Box::new(AttributeKind::LocalData(phone_schema))),
            ))
            .index(vec!["phone.code".to_string()], false)
            .build(&registry)
            .unwrap();

        assert_eq!(schema.indices.len(), 1);
        assert_eq!(schema.indices[0].attrs, vec!["phone.code".to_string()]);
    }

    #[test]
    fn child_schema_inherits_parent_attrs_and_indices() {
        let registry = CountingRegistry::new();
        let parent = SchemaBuilder::new("Base")
            .attribute(AttributeDescriptor::new("gid", AttributeKind::PrimaryGid))
            .attribute(AttributeDescriptor::new("name", AttributeKind::String))
            .index(vec!["name".to_string()], false)
            .build(&registry)
            .unwrap();

        let child = SchemaBuilder::new("Child")
            .parent(parent)
            .attribute(AttributeDescriptor::new("extra", AttributeKind::Int))
            .build(&registry)
            .unwrap();

        assert!(child.attribute("name").is_some());
        assert!(child.attribute("extra").is_some());
        assert_eq!(child.indices.len(), 1);
    }
}
