//! String interning.
//!
//! Every token text in the compiler is an [`AtomString`]: a small handle into
//! an [`AtomTable`]. Two atoms obtained from the same table (or from a table
//! and the preamble table it layers over) are equal iff their text is equal,
//! so token comparison never touches the bytes.
//!
//! A table can layer over a frozen base table (the shared preamble's atoms).
//! Lookups consult the base first; new strings are appended locally, with
//! handle values continuing past the base, so handles stay valid across the
//! layering boundary.

use std::collections::HashMap;
use std::sync::Arc;

/// A stable handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomString(u32);

impl AtomString {
    /// The empty string. Every table interns `""` at handle zero.
    pub const EMPTY: AtomString = AtomString(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interning table with optional layering over a frozen base table.
#[derive(Debug, Default)]
pub struct AtomTable {
    base: Option<Arc<AtomTable>>,
    base_len: u32,
    strings: Vec<Box<str>>,
    lookup: HashMap<Box<str>, u32>,
}

impl AtomTable {
    pub fn new() -> Self {
        let mut table = AtomTable {
            base: None,
            base_len: 0,
            strings: Vec::new(),
            lookup: HashMap::new(),
        };
        table.get_atom("");
        table
    }

    /// Create a table layered over a frozen base. Handles minted by the base
    /// remain valid when resolved through this table.
    pub fn layered(base: Arc<AtomTable>) -> Self {
        let base_len = base.total_len();
        AtomTable {
            base: Some(base),
            base_len,
            strings: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn total_len(&self) -> u32 {
        self.base_len + self.strings.len() as u32
    }

    /// Intern `text`, returning a handle equal to every other handle for the
    /// same bytes minted through this table or its base.
    pub fn get_atom(&mut self, text: &str) -> AtomString {
        if let Some(base) = &self.base {
            if let Some(atom) = base.find(text) {
                return atom;
            }
        }
        if let Some(&index) = self.lookup.get(text) {
            return AtomString(index);
        }
        let index = self.base_len + self.strings.len() as u32;
        self.strings.push(text.into());
        self.lookup.insert(text.into(), index);
        AtomString(index)
    }

    /// Look up without interning.
    pub fn find(&self, text: &str) -> Option<AtomString> {
        if let Some(base) = &self.base {
            if let Some(atom) = base.find(text) {
                return Some(atom);
            }
        }
        self.lookup.get(text).map(|&index| AtomString(index))
    }

    /// Resolve a handle back to its text.
    pub fn resolve(&self, atom: AtomString) -> &str {
        if atom.0 < self.base_len {
            return self
                .base
                .as_ref()
                .expect("atom handle below base length without a base table")
                .resolve(atom);
        }
        &self.strings[(atom.0 - self.base_len) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_text_gives_equal_handles() {
        let mut table = AtomTable::new();
        let a = table.get_atom("vec3");
        let b = table.get_atom("vec3");
        let c = table.get_atom("vec4");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.resolve(a), "vec3");
    }

    #[test]
    fn empty_string_is_the_zero_handle() {
        let mut table = AtomTable::new();
        assert_eq!(table.get_atom(""), AtomString::EMPTY);
    }

    #[test]
    fn layered_table_resolves_base_handles() {
        let mut base = AtomTable::new();
        let base_atom = base.get_atom("sin");
        let base = Arc::new(base);

        let mut layered = AtomTable::layered(base.clone());
        assert_eq!(layered.get_atom("sin"), base_atom);
        assert_eq!(layered.resolve(base_atom), "sin");

        let fresh = layered.get_atom("my_var");
        assert_ne!(fresh, base_atom);
        assert_eq!(layered.resolve(fresh), "my_var");
    }
}
