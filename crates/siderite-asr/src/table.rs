//! One lexical scope: a mapping from canonical name to symbol.

use indexmap::IndexMap;

use crate::arena::{SymbolId, TableId};

/// A symbol table. Iteration order is insertion order, which is what keeps
/// dependency lists and diagnostics deterministic across runs.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    counter: u64,
    parent: Option<TableId>,
    owner: Option<SymbolId>,
    bindings: IndexMap<String, SymbolId>,
}

impl SymbolTable {
    pub(crate) fn new(counter: u64, parent: Option<TableId>) -> Self {
        Self {
            counter,
            parent,
            owner: None,
            bindings: IndexMap::new(),
        }
    }

    /// Process-unique id of this table.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// The lexically enclosing table. Absent only on the translation-unit
    /// table.
    pub fn parent(&self) -> Option<TableId> {
        self.parent
    }

    /// The ASR node this table belongs to. Set once, right after the owning
    /// symbol is constructed.
    pub fn owner(&self) -> Option<SymbolId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: SymbolId) {
        self.owner = Some(owner);
    }

    /// Local lookup. `name` must already be canonical.
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: String, symbol: SymbolId) {
        self.bindings.insert(name, symbol);
    }

    /// Unbind a name, preserving the order of the remaining bindings.
    pub(crate) fn remove(&mut self, name: &str) -> Option<SymbolId> {
        self.bindings.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SymbolId)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
