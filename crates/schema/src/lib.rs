//! The attribute and schema-registration layer: typed attribute
//! descriptors, the query-expression builder, and the class-declaration
//! replacement that walks a flat attribute/index list into a registered
//! [`Schema`].

mod builder;
mod descriptor;
mod error;
mod kind;

pub use builder::{IndexDef, IndexSpec, ResolvedAttr, Schema, SchemaBuilder, TypeRegistry};
pub use descriptor::{Arg, ArgKind, AttributeDescriptor, Op, OrderDir, Role};
pub use error::{SchemaError, ValidationError};
pub use kind::AttributeKind;

pub use edgestore_escode::Value;
