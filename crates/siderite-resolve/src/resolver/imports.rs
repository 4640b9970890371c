//! `use` resolution: plain, `only:`, renames, and overload-set merging.

use std::collections::VecDeque;

use indexmap::IndexSet;

use siderite_asr::{
    Access, CustomOperator, External, GenericProcedure, Symbol, SymbolId,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::{RResult, Resolver};

impl Resolver<'_> {
    pub(super) fn resolve_use(&mut self, u: &ast::Use) -> RResult<()> {
        let module = self.find_module(&u.module)?;
        let Some(module_table) = self.asr.symbol(module).symtab() else {
            return Err(self.abort(DiagnosticKind::Internal, u.span, "module owns no table"));
        };

        match &u.only {
            Some(list) => {
                for item in list {
                    let r = self.import_named(module, item);
                    self.guarded(r)?;
                }
            }
            None => {
                let renamed: IndexSet<String> = u
                    .renames
                    .iter()
                    .map(|r| names::canonical(&r.remote.text))
                    .collect();
                let surface: Vec<(String, SymbolId)> = self
                    .asr
                    .table(module_table)
                    .iter()
                    .filter(|(_, sym)| self.asr.symbol(*sym).access() == Access::Public)
                    .map(|(name, sym)| (name.to_string(), sym))
                    .collect();
                for (name, target) in surface {
                    if renamed.contains(&name) {
                        continue;
                    }
                    let r = self.import_symbol(&name, target, u.span);
                    self.guarded(r)?;
                }
                for item in &u.renames {
                    let r = self.import_named(module, item);
                    self.guarded(r)?;
                }
            }
        }
        Ok(())
    }

    fn import_named(&mut self, module: SymbolId, item: &ast::UseSymbol) -> RResult<()> {
        let Some(module_table) = self.asr.symbol(module).symtab() else {
            return Err(self.abort(
                DiagnosticKind::Internal,
                item.remote.span,
                "module owns no table",
            ));
        };
        let remote = names::canonical(&item.remote.text);
        let Some(target) = self.asr.get_symbol(module_table, &remote) else {
            return Err(self.abort(
                DiagnosticKind::UnresolvedSymbol,
                item.remote.span,
                &remote,
            ));
        };
        if self.asr.symbol(target).access() == Access::Private {
            let module_name = self
                .asr
                .symbol(module)
                .name()
                .unwrap_or_default()
                .to_string();
            self.diag
                .report(
                    item.remote.span.source,
                    DiagnosticKind::UnresolvedSymbol,
                    item.remote.span.range,
                )
                .message(&remote)
                .hint(format!("`{remote}` is private to `{module_name}`"))
                .emit();
            return Err(super::SemanticAbort);
        }
        let local = item
            .local
            .as_ref()
            .map(|i| names::canonical(&i.text))
            .unwrap_or_else(|| remote.clone());
        let span = item.remote.span;
        self.import_symbol(&local, target, span)
    }

    /// Import one symbol under a local name. Aggregates merge; everything
    /// else becomes an external handle. An external pointing at another
    /// external is unwrapped before insertion.
    pub(super) fn import_symbol(
        &mut self,
        local: &str,
        target: SymbolId,
        span: Span,
    ) -> RResult<()> {
        let target = self.asr.get_past_external(target);
        match self.asr.symbol(target) {
            Symbol::GenericProcedure(_) | Symbol::CustomOperator(_) => {
                self.import_aggregate(local, target, span)
            }
            _ => {
                let ext = self.make_external(local, target, span);
                self.bind_import(local, ext, span)?;
                Ok(())
            }
        }
    }

    /// Build the external handle for a target, recording the origin module
    /// as a module dependency.
    fn make_external(&mut self, local: &str, target: SymbolId, span: Span) -> Symbol {
        let (module_name, scope_path) = self.origin_of(target);
        self.record_module_dep(&module_name);
        let original_name = self
            .asr
            .symbol(target)
            .name()
            .unwrap_or_default()
            .to_string();
        Symbol::External(External {
            name: names::canonical(local),
            parent: self.current_table,
            target: Some(target),
            module_name,
            original_name,
            scope_path,
            access: Access::Public,
            span,
        })
    }

    /// The module that owns a target, plus the scope path from the module
    /// down to the target's own table.
    fn origin_of(&self, target: SymbolId) -> (String, Vec<String>) {
        let mut path = Vec::new();
        let mut table = self.asr.binding_table_of(target);
        while let Some(t) = table {
            let Some(owner) = self.asr.table(t).owner() else {
                break;
            };
            match self.asr.symbol(owner) {
                Symbol::Module(m) => {
                    path.reverse();
                    return (m.name.clone(), path);
                }
                Symbol::TranslationUnit(_) => break,
                other => {
                    if let Some(name) = other.name() {
                        path.push(name.to_string());
                    }
                    table = self.asr.table(t).parent();
                }
            }
        }
        (String::new(), Vec::new())
    }

    /// Bind an imported symbol, warning when it replaces anything.
    fn bind_import(&mut self, local: &str, symbol: Symbol, span: Span) -> RResult<SymbolId> {
        let key = names::canonical(local);
        let shadowed = self.asr.get_symbol(self.current_table, &key).is_some();
        if shadowed {
            self.warn_shadow(span, &key);
        }
        let id = self.asr.alloc(symbol);
        match self.asr.bind(self.current_table, &key, id, true) {
            Ok(()) => Ok(id),
            Err(e) => Err(self.abort(DiagnosticKind::Internal, span, &e.to_string())),
        }
    }

    /// Merge an imported overload set into the current scope. Constituents
    /// are imported first (under mangled names when private), on a FIFO
    /// worklist until fixed-point; the local aggregate is then the union.
    fn import_aggregate(&mut self, local: &str, aggregate: SymbolId, span: Span) -> RResult<()> {
        let local_key = names::canonical(local);
        let (remote_procs, is_operator) = match self.asr.symbol(aggregate) {
            Symbol::GenericProcedure(g) => (g.procs.clone(), false),
            Symbol::CustomOperator(c) => (c.procs.clone(), true),
            _ => return Ok(()),
        };

        let mut handles: Vec<SymbolId> = Vec::new();
        let mut queue: VecDeque<SymbolId> = remote_procs.into();
        let mut seen: IndexSet<SymbolId> = IndexSet::new();
        while let Some(item) = queue.pop_front() {
            let target = self.asr.get_past_external(item);
            if !seen.insert(target) {
                continue;
            }
            match self.asr.symbol(target) {
                Symbol::Function(f) => {
                    let key = if f.access == Access::Private {
                        names::indirect_import_key(&f.name, &local_key)
                    } else {
                        f.name.clone()
                    };
                    let handle = match self.asr.get_symbol(self.current_table, &key) {
                        Some(existing)
                            if self.asr.get_past_external(existing) == target =>
                        {
                            existing
                        }
                        existing => {
                            if existing.is_some() {
                                self.warn_shadow(span, &key);
                            }
                            let ext = self.make_external(&key, target, span);
                            let id = self.asr.alloc(ext);
                            self.asr
                                .bind(self.current_table, &key, id, true)
                                .map_err(|e| {
                                    self.abort(DiagnosticKind::Internal, span, &e.to_string())
                                })?;
                            id
                        }
                    };
                    handles.push(handle);
                }
                // Nested aggregates feed the worklist.
                Symbol::GenericProcedure(g) => queue.extend(g.procs.iter().copied()),
                Symbol::CustomOperator(c) => queue.extend(c.procs.iter().copied()),
                _ => {
                    self.error(
                        DiagnosticKind::Internal,
                        span,
                        &format!("overload set `{local_key}` has a non-procedure constituent"),
                    );
                }
            }
        }

        match self.asr.get_symbol(self.current_table, &local_key) {
            Some(existing) => {
                let merged = match self.asr.symbol_mut(existing) {
                    Symbol::GenericProcedure(g) if !is_operator => {
                        merge_constituents(&mut g.procs, &handles);
                        true
                    }
                    Symbol::CustomOperator(c) if is_operator => {
                        merge_constituents(&mut c.procs, &handles);
                        true
                    }
                    _ => false,
                };
                if merged {
                    // Union already dedupes by target; re-dedupe against
                    // pre-existing externals pointing at the same function.
                    self.dedupe_aggregate(existing);
                    return Ok(());
                }
                self.warn_shadow(span, &local_key);
            }
            None => {}
        }

        let symbol = if is_operator {
            Symbol::CustomOperator(CustomOperator {
                name: local_key.clone(),
                parent: self.current_table,
                procs: handles,
                access: Access::Public,
                span,
            })
        } else {
            Symbol::GenericProcedure(GenericProcedure {
                name: local_key.clone(),
                parent: self.current_table,
                procs: handles,
                access: Access::Public,
                span,
            })
        };
        let id = self.asr.alloc(symbol);
        self.asr
            .bind(self.current_table, &local_key, id, true)
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        Ok(())
    }

    /// Drop constituents that resolve to the same function twice.
    fn dedupe_aggregate(&mut self, aggregate: SymbolId) {
        let procs = match self.asr.symbol(aggregate) {
            Symbol::GenericProcedure(g) => g.procs.clone(),
            Symbol::CustomOperator(c) => c.procs.clone(),
            _ => return,
        };
        let mut seen = IndexSet::new();
        let deduped: Vec<SymbolId> = procs
            .into_iter()
            .filter(|p| seen.insert(self.asr.get_past_external(*p)))
            .collect();
        match self.asr.symbol_mut(aggregate) {
            Symbol::GenericProcedure(g) => g.procs = deduped,
            Symbol::CustomOperator(c) => c.procs = deduped,
            _ => {}
        }
    }
}

fn merge_constituents(into: &mut Vec<SymbolId>, handles: &[SymbolId]) {
    for handle in handles {
        if !into.contains(handle) {
            into.push(*handle);
        }
    }
}
