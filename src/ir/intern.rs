//! Session-wide interning of strings and byte literals.
//!
//! Interning returns dense ids that are cheap to copy and compare; symbol
//! tables sort by them. Reads take the shared lock and may proceed
//! concurrently; inserting a new entry takes the exclusive lock. Ids are
//! never invalidated for the lifetime of the session.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Dense id of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternId(u32);

/// Dense id of an interned byte literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytesId(u32);

#[derive(Debug, Default)]
pub(crate) struct Interner {
    inner: RwLock<InternerInner>,
}

#[derive(Debug, Default)]
struct InternerInner {
    strings: Vec<Arc<str>>,
    by_string: HashMap<Arc<str>, InternId>,
    bytes: Vec<Arc<[u8]>>,
    by_bytes: HashMap<Arc<[u8]>, BytesId>,
}

impl Interner {
    pub(crate) fn new() -> Interner {
        let interner = Interner::default();
        // Id 0 is always the empty string, so a zeroed field reads as "".
        let empty = interner.intern("");
        debug_assert_eq!(empty, InternId(0));
        interner
    }

    pub(crate) fn intern(&self, s: &str) -> InternId {
        if let Some(&id) = self.inner.read().unwrap().by_string.get(s) {
            return id;
        }
        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.by_string.get(s) {
            return id;
        }
        let id = InternId(to_id(inner.strings.len()));
        let entry: Arc<str> = s.into();
        inner.strings.push(entry.clone());
        inner.by_string.insert(entry, id);
        id
    }

    pub(crate) fn get(&self, id: InternId) -> Arc<str> {
        self.inner.read().unwrap().strings[id.0 as usize].clone()
    }

    /// Looks a string up without inserting it. A miss proves the string
    /// names nothing in any symbol table.
    pub(crate) fn probe(&self, s: &str) -> Option<InternId> {
        self.inner.read().unwrap().by_string.get(s).copied()
    }

    pub(crate) fn intern_bytes(&self, b: &[u8]) -> BytesId {
        if let Some(&id) = self.inner.read().unwrap().by_bytes.get(b) {
            return id;
        }
        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.by_bytes.get(b) {
            return id;
        }
        let id = BytesId(to_id(inner.bytes.len()));
        let entry: Arc<[u8]> = b.into();
        inner.bytes.push(entry.clone());
        inner.by_bytes.insert(entry, id);
        id
    }

    pub(crate) fn get_bytes(&self, id: BytesId) -> Arc<[u8]> {
        self.inner.read().unwrap().bytes[id.0 as usize].clone()
    }
}

impl InternId {
    pub(crate) const EMPTY: InternId = InternId(0);

    pub(crate) fn to_raw(self) -> u32 {
        self.0
    }
}

impl BytesId {
    pub(crate) fn to_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> BytesId {
        BytesId(raw)
    }
}

impl InternId {
    pub(crate) fn from_raw(raw: u32) -> InternId {
        InternId(raw)
    }
}

fn to_id(i: usize) -> u32 {
    u32::try_from(i).expect("intern pool too large")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedupes_and_round_trips() {
        let interner = Interner::new();
        let a = interner.intern("foo.Bar");
        let b = interner.intern("foo.Bar");
        let c = interner.intern("foo.Baz");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*interner.get(a), "foo.Bar");
        assert_eq!(&*interner.get(c), "foo.Baz");
    }

    #[test]
    fn empty_string_is_id_zero() {
        let interner = Interner::new();
        assert_eq!(interner.intern(""), InternId::EMPTY);
        assert_eq!(&*interner.get(InternId::EMPTY), "");
    }

    #[test]
    fn bytes_pool_is_distinct() {
        let interner = Interner::new();
        let b = interner.intern_bytes(b"\x00\xff");
        assert_eq!(&*interner.get_bytes(b), b"\x00\xff");
        assert_eq!(interner.intern_bytes(b"\x00\xff"), b);
    }
}
