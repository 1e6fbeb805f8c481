use crate::{CodecError, Result};
use std::collections::BTreeMap;

/// The dynamic value domain stored in an edge's attribute map.
///
/// Mirrors the set of base types the attribute system reduces every
/// declared attribute kind to before handing it to the codec (see
/// `edgestore-schema`'s `to_base`/`from_base` conversions).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_LIST: u8 = 7;
const TAG_MAP: u8 = 8;

pub(crate) fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            write_len(out, s.len());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            write_len(out, b.len());
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(TAG_LIST);
            write_len(out, items.len());
            for item in items {
                encode_into(item, out);
            }
        }
        Value::Map(map) => {
            out.push(TAG_MAP);
            write_len(out, map.len());
            for (k, v) in map {
                write_len(out, k.len());
                out.extend_from_slice(k.as_bytes());
                encode_into(v, out);
            }
        }
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

fn read_len(bytes: &[u8], cursor: &mut usize) -> Result<usize> {
    let raw = read_bytes(bytes, cursor, 4)?;
    Ok(u32::from_le_bytes(raw.try_into().unwrap()) as usize)
}

fn read_bytes<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = cursor.checked_add(len).ok_or(CodecError::Eof)?;
    if end > bytes.len() {
        return Err(CodecError::Eof);
    }
    let slice = &bytes[*cursor..end];
    *cursor = end;
    Ok(slice)
}

pub(crate) fn decode_from(bytes: &[u8], cursor: &mut usize) -> Result<Value> {
    let tag = *read_bytes(bytes, cursor, 1)?.first().unwrap();
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_FALSE => Ok(Value::Bool(false)),
        TAG_TRUE => Ok(Value::Bool(true)),
        TAG_INT => {
            let raw = read_bytes(bytes, cursor, 8)?;
            Ok(Value::Int(i64::from_le_bytes(raw.try_into().unwrap())))
        }
        TAG_FLOAT => {
            let raw = read_bytes(bytes, cursor, 8)?;
            Ok(Value::Float(f64::from_le_bytes(raw.try_into().unwrap())))
        }
        TAG_STR => {
            let len = read_len(bytes, cursor)?;
            let raw = read_bytes(bytes, cursor, len)?;
            let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
            Ok(Value::Str(s.to_string()))
        }
        TAG_BYTES => {
            let len = read_len(bytes, cursor)?;
            let raw = read_bytes(bytes, cursor, len)?;
            Ok(Value::Bytes(raw.to_vec()))
        }
        TAG_LIST => {
            let len = read_len(bytes, cursor)?;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(decode_from(bytes, cursor)?);
            }
            Ok(Value::List(items))
        }
        TAG_MAP => {
            let len = read_len(bytes, cursor)?;
            let mut map = BTreeMap::new();
            for _ in 0..len {
                let klen = read_len(bytes, cursor)?;
                let kraw = read_bytes(bytes, cursor, klen)?;
                let key = std::str::from_utf8(kraw)
                    .map_err(|_| CodecError::InvalidUtf8)?
                    .to_string();
                let val = decode_from(bytes, cursor)?;
                map.insert(key, val);
            }
            Ok(Value::Map(map))
        }
        other => Err(CodecError::UnknownTag(other)),
    }
}
