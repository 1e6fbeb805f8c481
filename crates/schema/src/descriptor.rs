use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use edgestore_escode::Value;

use crate::error::ValidationError;
use crate::kind::AttributeKind;

/// A gid-role attribute. Role attributes are `ALWAYS_REQUIRED=true` and
/// participate in routing; at most one of each may be declared per schema,
/// and `ColoGid`/`PrimaryKey` are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    LocalGid,
    RemoteGid,
    PrimaryGid,
    ColoGid,
    PrimaryKey,
}

/// Comparison operator produced by an attribute's query-expression builder:
/// comparing an attribute descriptor yields `Arg(attr, op, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

/// One term of a query: either a comparison against a value, or an
/// ordering direction. Rust has no operator overloading that can return a
/// non-`bool`, so these come from explicit methods on [`AttributeDescriptor`]
/// (`.eq()`, `.gt()`, ..., `.asc()`, `.desc()`) rather than `==`/`<`/unary
/// `-`.
#[derive(Debug, Clone)]
pub struct Arg {
    pub attr: String,
    pub kind: ArgKind,
}

#[derive(Debug, Clone)]
pub enum ArgKind {
    Compare(Op, Value),
    Order(OrderDir),
}

impl Arg {
    pub fn compare(&self) -> Option<(Op, &Value)> {
        match &self.kind {
            ArgKind::Compare(op, v) => Some((*op, v)),
            ArgKind::Order(_) => None,
        }
    }

    pub fn order(&self) -> Option<OrderDir> {
        match &self.kind {
            ArgKind::Order(d) => Some(*d),
            ArgKind::Compare(..) => None,
        }
    }
}

type ComputedFn = Arc<dyn Fn(&BTreeMap<String, Value>) -> Value + Send + Sync>;

/// A declared attribute: its type, whether it must be present at save,
/// its default, and (for `Computed` attributes) the function that derives
/// its value from the rest of the owning instance's attribute map.
#[derive(Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub required: bool,
    pub default: Option<Value>,
    pub(crate) computed: Option<ComputedFn>,
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("computed", &self.computed.is_some())
            .finish()
    }
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        let name = name.into();
        let required = kind.always_required();
        AttributeDescriptor {
            name,
            kind,
            required,
            default: None,
            computed: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        // Role attrs cannot be optional: ALWAYS_REQUIRED=true.
        self.required = required || self.kind.always_required();
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn computed(
        name: impl Into<String>,
        f: impl Fn(&BTreeMap<String, Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        AttributeDescriptor {
            name: name.into(),
            kind: AttributeKind::Computed,
            required: false,
            default: None,
            computed: Some(Arc::new(f)),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.kind, AttributeKind::Computed)
    }

    pub fn role(&self) -> Option<Role> {
        self.kind.role()
    }

    /// Validate a value against this descriptor: presence of `required`,
    /// then type-level validation via the attribute kind.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        match value {
            None if self.required && self.default.is_none() => {
                Err(ValidationError::MissingRequired(self.name.clone()))
            }
            None => Ok(()),
            Some(v) => self
                .kind
                .validate_value(v)
                .map_err(|e| e.tag(&self.name)),
        }
    }

    pub fn to_base(&self, value: &Value) -> Result<Value, ValidationError> {
        self.kind.to_base_value(value).map_err(|e| e.tag(&self.name))
    }

    pub fn from_base(&self, value: &Value) -> Result<Value, ValidationError> {
        self.kind.from_base_value(value).map_err(|e| e.tag(&self.name))
    }

    /// Evaluate a `Computed` attribute against the owning instance's
    /// attribute map. Returns `None` for non-computed attributes.
    pub fn compute(&self, datadict: &BTreeMap<String, Value>) -> Option<Value> {
        self.computed.as_ref().map(|f| f(datadict))
    }

    // --- Query-expression builder ---

    pub fn eq(&self, value: Value) -> Result<Arg, ValidationError> {
        self.compare_arg(Op::Eq, value)
    }

    pub fn gt(&self, value: Value) -> Result<Arg, ValidationError> {
        self.compare_arg(Op::Gt, value)
    }

    pub fn ge(&self, value: Value) -> Result<Arg, ValidationError> {
        self.compare_arg(Op::Ge, value)
    }

    pub fn lt(&self, value: Value) -> Result<Arg, ValidationError> {
        self.compare_arg(Op::Lt, value)
    }

    pub fn le(&self, value: Value) -> Result<Arg, ValidationError> {
        self.compare_arg(Op::Le, value)
    }

    pub fn asc(&self) -> Arg {
        Arg {
            attr: self.name.clone(),
            kind: ArgKind::Order(OrderDir::Asc),
        }
    }

    pub fn desc(&self) -> Arg {
        Arg {
            attr: self.name.clone(),
            kind: ArgKind::Order(OrderDir::Desc),
        }
    }

    /// Validated eagerly, at query-build time rather than at fetch time: a
    /// caller that builds a query against a value that can never match any
    /// stored row of this attribute's type gets a `Result` back, the same
    /// way the original's `Query.Arg.__init__` raises immediately.
    fn compare_arg(&self, op: Op, value: Value) -> Result<Arg, ValidationError> {
        self.kind
            .validate_value(&value)
            .map_err(|e| e.tag(&self.name))?;
        Ok(Arg {
            attr: self.name.clone(),
            kind: ArgKind::Compare(op, value),
        })
    }
}
