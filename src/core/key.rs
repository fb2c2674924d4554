//! Variable keys.
//!
//! A [`Key`] is a plain `u64`. Whether it names a continuous or a discrete
//! variable is a convention of the caller. [`Symbol`] packs a character into
//! the top byte and an index into the remaining 56 bits, so `x(1)` and `m(1)`
//! never collide and print as `x1` and `m1`.

use std::fmt;

use crate::error::{HybridError, HybridResult};

/// Opaque variable identifier
pub type Key = u64;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = 64 - CHR_BITS;
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// Character + index view of a [`Key`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub chr: u8,
    pub index: u64,
}

impl Symbol {
    /// `chr` must be an ASCII letter and `index` must fit in 56 bits, so
    /// distinct symbols always give distinct keys.
    pub fn new(chr: char, index: u64) -> HybridResult<Self> {
        if !chr.is_ascii_alphabetic() {
            return Err(HybridError::InvalidInput(format!(
                "symbol character {chr:?} is not an ASCII letter"
            )));
        }
        if index > INDEX_MASK {
            return Err(HybridError::InvalidInput(format!(
                "symbol index {index} does not fit in {INDEX_BITS} bits"
            )));
        }
        Ok(Symbol {
            chr: chr as u8,
            index,
        })
    }

    pub fn key(&self) -> Key {
        ((self.chr as u64) << INDEX_BITS) | self.index
    }

    /// Decode a key. Keys whose top byte is not a printable ASCII letter
    /// are plain integers and yield `None`.
    pub fn from_key(key: Key) -> Option<Self> {
        let chr = (key >> INDEX_BITS) as u8;
        if chr.is_ascii_alphabetic() {
            Some(Symbol {
                chr,
                index: key & INDEX_MASK,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chr as char, self.index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        symbol.key()
    }
}

pub fn symbol(chr: char, index: u64) -> HybridResult<Key> {
    Ok(Symbol::new(chr, index)?.key())
}

const fn pack(chr: u8, index: u64) -> Key {
    ((chr as u64) << INDEX_BITS) | (index & INDEX_MASK)
}

/// Continuous state key `x<index>`; `index` is taken modulo 2^56.
pub fn x(index: u64) -> Key {
    pack(b'x', index)
}

/// Discrete mode key `m<index>`; `index` is taken modulo 2^56.
pub fn m(index: u64) -> Key {
    pack(b'm', index)
}

/// Human readable key, `x3` for symbols and the bare integer otherwise.
pub fn format_key(key: Key) -> String {
    match Symbol::from_key(key) {
        Some(symbol) => symbol.to_string(),
        None => key.to_string(),
    }
}

pub fn format_keys(keys: &[Key]) -> String {
    keys.iter().map(|k| format_key(*k)).collect::<Vec<_>>().join(", ")
}

/// A discrete variable together with its domain size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscreteKey {
    pub key: Key,
    pub cardinality: usize,
}

impl DiscreteKey {
    pub fn new(key: Key, cardinality: usize) -> Self {
        DiscreteKey { key, cardinality }
    }
}

impl fmt::Display for DiscreteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", format_key(self.key), self.cardinality)
    }
}
