//! The store owning every symbol table and symbol node.
//!
//! Tables and symbols live in id-indexed arenas for the lifetime of the
//! compilation unit; every cross-reference is a [`TableId`] or [`SymbolId`]
//! handle. This is what lets derived types mention themselves and modules
//! import each other without ownership cycles.

use std::sync::atomic::{AtomicU64, Ordering};

use siderite_core::names;

use crate::symbol::Symbol;
use crate::table::SymbolTable;

/// Handle to a [`SymbolTable`] in an [`Asr`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TableId(u32);

/// Handle to a [`Symbol`] in an [`Asr`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SymbolId(u32);

impl TableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Issues process-unique symbol-table counters.
pub mod table_counter {
    use super::*;

    static NEXT: AtomicU64 = AtomicU64::new(1);

    pub fn next() -> u64 {
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    /// Restart numbering for a fresh compilation. Trees built before the
    /// reset must not be verified together with trees built after it.
    pub fn reset() {
        NEXT.store(1, Ordering::Relaxed);
    }
}

/// Errors from store-level operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("`{0}` is already bound in this table")]
    DuplicateSymbol(String),
    #[error("`{0}` is not a storable symbol name")]
    InvalidName(String),
}

/// The arena for one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Asr {
    tables: Vec<SymbolTable>,
    symbols: Vec<Symbol>,
}

impl Asr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty table. The owner is attached in a second step
    /// with [`Asr::set_table_owner`] once the owning symbol exists.
    pub fn new_table(&mut self, parent: Option<TableId>) -> TableId {
        let id = TableId(self.tables.len() as u32);
        self.tables.push(SymbolTable::new(table_counter::next(), parent));
        id
    }

    pub fn set_table_owner(&mut self, table: TableId, owner: SymbolId) {
        self.tables[table.index()].set_owner(owner);
    }

    pub fn table(&self, id: TableId) -> &SymbolTable {
        &self.tables[id.index()]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut SymbolTable {
        &mut self.tables[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// Allocate a symbol without binding it anywhere.
    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    /// Bind `symbol` under `name` in `table`. The name is canonicalised and
    /// validated. Without `overwrite`, an existing binding is an error;
    /// with it, the binding is replaced in place (module-import shadowing).
    pub fn bind(
        &mut self,
        table: TableId,
        name: &str,
        symbol: SymbolId,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let key = names::canonical(name);
        if !names::is_valid_key(&key) {
            return Err(StoreError::InvalidName(key));
        }
        let table = &mut self.tables[table.index()];
        if !overwrite && table.contains(&key) {
            return Err(StoreError::DuplicateSymbol(key));
        }
        table.insert(key, symbol);
        Ok(())
    }

    /// Allocate and bind in one step.
    pub fn add_symbol(
        &mut self,
        table: TableId,
        name: &str,
        symbol: Symbol,
    ) -> Result<SymbolId, StoreError> {
        let key = names::canonical(name);
        if !names::is_valid_key(&key) {
            return Err(StoreError::InvalidName(key));
        }
        if self.tables[table.index()].contains(&key) {
            return Err(StoreError::DuplicateSymbol(key));
        }
        let id = self.alloc(symbol);
        self.tables[table.index()].insert(key, id);
        Ok(id)
    }

    /// Unbind a name from a table. The symbol node stays allocated; only
    /// reachability changes.
    pub fn remove_symbol(&mut self, table: TableId, name: &str) -> Option<SymbolId> {
        let key = names::canonical(name);
        self.tables[table.index()].remove(&key)
    }

    /// Local lookup.
    pub fn get_symbol(&self, table: TableId, name: &str) -> Option<SymbolId> {
        self.table(table).get(&names::canonical(name))
    }

    /// Walk the parent chain and return the nearest binding.
    pub fn resolve_symbol(&self, table: TableId, name: &str) -> Option<SymbolId> {
        let key = names::canonical(name);
        let mut current = Some(table);
        while let Some(t) = current {
            if let Some(sym) = self.table(t).get(&key) {
                return Some(sym);
            }
            current = self.table(t).parent();
        }
        None
    }

    /// Multi-hop lookup used by external symbols: descend from `table`
    /// through the owned tables named by `scope_path`, then look up
    /// `original_name` there.
    pub fn find_scoped(
        &self,
        table: TableId,
        original_name: &str,
        scope_path: &[String],
    ) -> Option<SymbolId> {
        let mut current = table;
        for step in scope_path {
            let sym = self.table(current).get(&names::canonical(step))?;
            current = self.symbol(sym).symtab()?;
        }
        self.table(current).get(&names::canonical(original_name))
    }

    /// Follow an external symbol exactly one step; any other symbol is
    /// returned unchanged. An unresolved external maps to itself.
    pub fn get_past_external(&self, id: SymbolId) -> SymbolId {
        match self.symbol(id) {
            Symbol::External(ext) => ext.target.unwrap_or(id),
            _ => id,
        }
    }

    /// The table a symbol's binding lives in: for table owners, their own
    /// table's parent; for leaf symbols, the stored parent table.
    pub fn binding_table_of(&self, id: SymbolId) -> Option<TableId> {
        match self.symbol(id) {
            Symbol::TranslationUnit(_) => None,
            Symbol::Variable(v) => Some(v.parent),
            Symbol::GenericProcedure(g) => Some(g.parent),
            Symbol::CustomOperator(c) => Some(c.parent),
            Symbol::StructMethod(m) => Some(m.parent),
            Symbol::External(e) => Some(e.parent),
            sym => sym.symtab().and_then(|t| self.table(t).parent()),
        }
    }

    /// Whether `ancestor` is `table` or one of its transitive parents.
    pub fn is_ancestor(&self, ancestor: TableId, table: TableId) -> bool {
        let mut current = Some(table);
        while let Some(t) = current {
            if t == ancestor {
                return true;
            }
            current = self.table(t).parent();
        }
        false
    }

    pub fn tables_len(&self) -> usize {
        self.tables.len()
    }

    pub fn symbols_len(&self) -> usize {
        self.symbols.len()
    }
}
