//! Identifier newtypes shared across the EdgeStore crates.
//!
//! A [`Gid`] packs a [`Colo`] (the high 32 bits) and a per-colo counter
//! (the low 32 bits) into a single `u64`, so routing an id to its owning
//! host never requires a lookup.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which physical colo (shard group) an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Colo(pub u32);

impl Colo {
    pub fn new(v: u32) -> Self {
        Colo(v)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Colo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Colo {
    fn from(v: u32) -> Self {
        Colo(v)
    }
}

/// A globally unique row identifier: `colo:counter`.
///
/// The colo occupies the high 32 bits, the counter the low 32 bits, matching
/// the wire representation of a 64-bit gid used throughout the edge storage
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gid(pub u64);

impl Gid {
    pub fn new(colo: Colo, counter: u32) -> Self {
        Gid(((colo.0 as u64) << 32) | counter as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Gid(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn colo(self) -> Colo {
        Colo((self.0 >> 32) as u32)
    }

    pub fn counter(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.colo().0, self.counter())
    }
}

impl From<u64> for Gid {
    fn from(v: u64) -> Self {
        Gid(v)
    }
}

/// Id of a registered edgetype (assigned from the `definitions` table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeTypeId(pub u64);

impl fmt::Display for EdgeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of a registered index type (assigned from the `definitions` table,
/// sharing the same namespace as edgetypes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexTypeId(pub u64);

impl fmt::Display for IndexTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonically increasing per-row revision counter, bumped on every
/// update so stale-write detection can compare against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

/// Well-known edgetype/indextype id reserved for the `definitions` table
/// itself, so bootstrapping `addOrGetDefinitionType` does not need an entry
/// in its own table to look itself up.
pub const DEFINITIONS_EDGETYPE: EdgeTypeId = EdgeTypeId(1);
pub const DEFINITIONS_GID: u64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gid_packs_and_unpacks_colo_and_counter() {
        let gid = Gid::new(Colo(7), 42);
        assert_eq!(gid.colo(), Colo(7));
        assert_eq!(gid.counter(), 42);
        assert_eq!(gid.raw(), (7u64 << 32) | 42);
    }

    #[test]
    fn gid_ordering_is_colo_major_counter_minor() {
        let a = Gid::new(Colo(1), u32::MAX);
        let b = Gid::new(Colo(2), 0);
        assert!(a < b);
    }

    #[test]
    fn revision_increments() {
        let r = Revision::default();
        assert_eq!(r.next().0, 1);
        assert_eq!(r.next().next().0, 2);
    }
}
