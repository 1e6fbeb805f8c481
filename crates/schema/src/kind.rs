use std::sync::Arc;

use edgestore_escode::Value;

use crate::error::ValidationError;
use crate::Schema;

/// The closed set of attribute types a schema can declare.
///
/// `DateTime` is stored as UTC microseconds since the epoch, so its base
/// representation is the same as `Int`; the distinct variant exists so
/// schema authors and error messages can tell it apart from a plain
/// integer counter.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    Bool,
    Int,
    Float,
    String,
    Unicode,
    DateTime,
    Dict,
    Gid,
    LocalGid,
    RemoteGid,
    PrimaryGid,
    ColoGid,
    PrimaryKey,
    Repeated(Box<AttributeKind>),
    LocalData(Arc<Schema>),
    Computed,
}

impl AttributeKind {
    /// Whether this kind identifies a gid-role attribute (participates in
    /// routing rather than plain storage).
    pub fn role(&self) -> Option<crate::descriptor::Role> {
        use crate::descriptor::Role;
        match self {
            AttributeKind::LocalGid => Some(Role::LocalGid),
            AttributeKind::RemoteGid => Some(Role::RemoteGid),
            AttributeKind::PrimaryGid => Some(Role::PrimaryGid),
            AttributeKind::ColoGid => Some(Role::ColoGid),
            AttributeKind::PrimaryKey => Some(Role::PrimaryKey),
            _ => None,
        }
    }

    /// Role attributes are `ALWAYS_REQUIRED=true`.
    pub fn always_required(&self) -> bool {
        self.role().is_some()
    }

    /// Whether this attribute is excluded from the serialized payload: the
    /// pure identity roles (`localgid`/`remotegid`, and `primarygid` which
    /// is both) define routing only. `ColoGid` and `PrimaryKey` remain in
    /// the payload and in indices.
    pub fn is_identity_only(&self) -> bool {
        matches!(
            self,
            AttributeKind::LocalGid | AttributeKind::RemoteGid | AttributeKind::PrimaryGid
        )
    }

    fn type_name(&self) -> &'static str {
        match self {
            AttributeKind::Bool => "Bool",
            AttributeKind::Int => "Int",
            AttributeKind::Float => "Float",
            AttributeKind::String => "String",
            AttributeKind::Unicode => "Unicode",
            AttributeKind::DateTime => "DateTime",
            AttributeKind::Dict => "Dict",
            AttributeKind::Gid => "Gid",
            AttributeKind::LocalGid => "LocalGid",
            AttributeKind::RemoteGid => "RemoteGid",
            AttributeKind::PrimaryGid => "PrimaryGid",
            AttributeKind::ColoGid => "ColoGid",
            AttributeKind::PrimaryKey => "PrimaryKey",
            AttributeKind::Repeated(_) => "Repeated",
            AttributeKind::LocalData(_) => "LocalData",
            AttributeKind::Computed => "Computed",
        }
    }

    /// Validate that `value` conforms to this kind, without the
    /// required/default logic that lives on the owning descriptor.
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        self.to_base_value(value).map(|_| ())
    }

    /// Convert a user-facing value to its codec-safe base representation.
    pub fn to_base_value(&self, value: &Value) -> Result<Value, ValidationError> {
        match self {
            AttributeKind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(wrong_type(self.type_name(), other)),
            },
            AttributeKind::Int
            | AttributeKind::DateTime
            | AttributeKind::Gid
            | AttributeKind::LocalGid
            | AttributeKind::RemoteGid
            | AttributeKind::PrimaryGid
            | AttributeKind::ColoGid => match value {
                Value::Int(_) => Ok(value.clone()),
                other => Err(wrong_type(self.type_name(), other)),
            },
            AttributeKind::Float => match value {
                Value::Float(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                other => Err(wrong_type(self.type_name(), other)),
            },
            AttributeKind::String | AttributeKind::Unicode | AttributeKind::PrimaryKey => {
                match value {
                    Value::Str(_) => Ok(value.clone()),
                    other => Err(wrong_type(self.type_name(), other)),
                }
            }
            AttributeKind::Dict => match value {
                Value::Map(_) => Ok(value.clone()),
                other => Err(wrong_type(self.type_name(), other)),
            },
            AttributeKind::Repeated(elem) => match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(elem.to_base_value(item)?);
                    }
                    Ok(Value::List(out))
                }
                other => Err(wrong_type("Repeated", other)),
            },
            AttributeKind::LocalData(schema) => match value {
                Value::Map(map) => {
                    let based = schema.to_base_map(map)?;
                    Ok(Value::Map(based))
                }
                other => Err(wrong_type("LocalData", other)),
            },
            AttributeKind::Computed => Ok(value.clone()),
        }
    }

    /// Convert a codec-safe base value back to its user-facing form.
    pub fn from_base_value(&self, value: &Value) -> Result<Value, ValidationError> {
        match self {
            AttributeKind::Repeated(elem) => match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(elem.from_base_value(item)?);
                    }
                    Ok(Value::List(out))
                }
                other => Err(wrong_type("Repeated", other)),
            },
            AttributeKind::LocalData(schema) => match value {
                Value::Map(map) => Ok(Value::Map(schema.from_base_map(map)?)),
                other => Err(wrong_type("LocalData", other)),
            },
            // All other kinds are self-inverse under to_base.
            other_kind => other_kind.to_base_value(value),
        }
    }
}

fn wrong_type(expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::WrongType(String::new(), expected, format!("{:?}", found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_int_validates_each_element() {
        let kind = AttributeKind::Repeated(Box::new(AttributeKind::Int));
        let ok = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(kind.validate_value(&ok).is_ok());

        let bad = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert!(kind.validate_value(&bad).is_err());
    }

    #[test]
    fn float_accepts_int_literal() {
        let based = AttributeKind::Float.to_base_value(&Value::Int(3)).unwrap();
        assert_eq!(based, Value::Float(3.0));
    }
}
