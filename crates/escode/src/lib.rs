//! Binary encoding for attribute maps and order-preserving encoding for
//! index tuples.
//!
//! Two independent codecs live here:
//!
//! - [`encode`]/[`decode`] turn a [`Value`] (an attribute map, list, or
//!   scalar) into an opaque tagged byte string. This is the `data` column of
//!   an edge row; its byte layout is not meant to be compared.
//! - [`encode_index`] turns a tuple of [`Value`]s into a byte string with
//!   the property that unsigned lexicographic comparison of two encoded
//!   tuples agrees with element-wise comparison of the original tuples. This
//!   is the `indexvalue` column of an index row.

mod index;
mod value;

pub use index::encode_index;
pub use value::Value;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input while decoding")]
    Eof,
    #[error("unknown type tag {0}")]
    UnknownTag(u8),
    #[error("invalid utf-8 in decoded string")]
    InvalidUtf8,
    #[error("map key was not a string")]
    NonStringKey,
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Encode a [`Value`] into its tagged binary representation.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    value::encode_into(value, &mut buf);
    buf
}

/// Decode a tagged binary representation produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let mut cursor = 0usize;
    let value = value::decode_from(bytes, &mut cursor)?;
    Ok(value)
}
