use thiserror::Error;

use crate::descriptor::Role;

/// Errors raised while building a [`crate::Schema`] from a
/// [`crate::SchemaBuilder`]. All of these are fatal at class-declaration
/// time: the process cannot serve the offending class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("edgetype `{0}` is already registered")]
    DuplicateEdgeType(String),
    #[error("attribute `{0}` is declared more than once")]
    DuplicateAttribute(String),
    #[error("attribute name `{0}` is reserved")]
    ReservedName(String),
    #[error("role {0:?} is declared more than once")]
    DuplicateRole(Role),
    #[error("`ColoGid` and `PrimaryKey` attributes are mutually exclusive")]
    ColoGidAndPrimaryKeyConflict,
    #[error("index references unknown attribute path `{0}`")]
    UnknownIndexAttr(String),
    #[error("attribute `{0}` not found")]
    AttributeNotFound(String),
    #[error("cannot set through a repeated attribute path `{0}`")]
    SetThroughRepeated(String),
}

/// Errors raised validating or converting an attribute value at save time.
/// Corresponds to the `ValidationError` kind in the error policy table:
/// fatal within the active lock scope, triggering rollback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required attribute `{0}`")]
    MissingRequired(String),
    #[error("attribute `{0}` expected {1}, found {2}")]
    WrongType(String, &'static str, String),
    #[error("attribute `{0}`: {1}")]
    Nested(String, Box<ValidationError>),
}

impl ValidationError {
    pub fn tag(self, name: &str) -> ValidationError {
        match self {
            ValidationError::WrongType(_, expected, found) => {
                ValidationError::WrongType(name.to_string(), expected, found)
            }
            other => ValidationError::Nested(name.to_string(), Box::new(other)),
        }
    }
}
