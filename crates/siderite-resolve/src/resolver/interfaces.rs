//! Interface blocks and overload-set assembly.
//!
//! Interface bodies become interface-deftype functions in the current
//! scope; the block itself only feeds the four accumulators. Scope
//! finalisation turns the accumulators into `GenericProcedure` /
//! `CustomOperator` symbols once every candidate exists.

use std::mem;

use indexmap::IndexSet;

use siderite_asr::{
    Access, CustomOperator, DefKind, GenericProcedure, Symbol, SymbolId,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::{RResult, Resolver};

#[derive(Clone, Copy, PartialEq, Eq)]
enum AggregateKind {
    Generic,
    Operator,
}

impl Resolver<'_> {
    pub(super) fn interface_block(&mut self, iface: &ast::Interface) -> RResult<()> {
        match &iface.kind {
            ast::InterfaceKind::Abstract => {
                for item in &iface.items {
                    if let ast::InterfaceItem::Procedure(p) = item {
                        let r = self.interface_body(p).map(|_| ());
                        self.guarded(r)?;
                    }
                }
                Ok(())
            }
            ast::InterfaceKind::Generic(name) => {
                let candidates = self.interface_candidates(&iface.items)?;
                self.scope
                    .generic_procedures
                    .entry(names::canonical(&name.text))
                    .or_default()
                    .extend(candidates);
                Ok(())
            }
            ast::InterfaceKind::Operator(tag) => {
                let candidates = self.interface_candidates(&iface.items)?;
                self.scope
                    .overloaded_op_procs
                    .entry(names::operator_aggregate_key(tag.tag()))
                    .or_default()
                    .extend(candidates);
                Ok(())
            }
            ast::InterfaceKind::DefinedOperator(op) => {
                let candidates = self.interface_candidates(&iface.items)?;
                self.scope
                    .defined_op_procs
                    .entry(names::defined_operator_key(&op.text))
                    .or_default()
                    .extend(candidates);
                Ok(())
            }
            ast::InterfaceKind::Assignment => {
                let candidates = self.interface_candidates(&iface.items)?;
                self.scope.assignment_procs.extend(candidates);
                Ok(())
            }
        }
    }

    /// Resolve full interface bodies, and collect every candidate name the
    /// block contributes.
    fn interface_candidates(
        &mut self,
        items: &[ast::InterfaceItem],
    ) -> RResult<Vec<ast::Ident>> {
        let mut candidates = Vec::new();
        for item in items {
            match item {
                ast::InterfaceItem::Procedure(p) => {
                    let r = self.interface_body(p).map(|_| ());
                    self.guarded(r)?;
                    candidates.push(p.name.clone());
                }
                ast::InterfaceItem::ModuleProcedure(list) => {
                    candidates.extend(list.iter().cloned());
                }
            }
        }
        Ok(candidates)
    }

    fn interface_body(&mut self, p: &ast::Procedure) -> RResult<SymbolId> {
        let id = self.declare_procedure_stub(p, DefKind::Interface)?;
        self.pending_headers.insert(id);
        let result = self.resolve_procedure_into(id, p);
        self.pending_headers.swap_remove(&id);
        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &p.name.text);
            return Err(abort);
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Finalisation
    // ------------------------------------------------------------------

    pub(super) fn finalize_overload_sets(&mut self) -> RResult<()> {
        let generics = mem::take(&mut self.scope.generic_procedures);
        for (name, candidates) in generics {
            let span = candidates.first().map(|c| c.span).unwrap_or_default();
            let r = self.emit_aggregate(&name, &candidates, AggregateKind::Generic, span);
            self.guarded(r)?;
        }

        let ops = mem::take(&mut self.scope.overloaded_op_procs);
        for (key, candidates) in ops {
            let span = candidates.first().map(|c| c.span).unwrap_or_default();
            let r = self.emit_aggregate(&key, &candidates, AggregateKind::Operator, span);
            self.guarded(r)?;
        }

        let defined = mem::take(&mut self.scope.defined_op_procs);
        for (key, candidates) in defined {
            let span = candidates.first().map(|c| c.span).unwrap_or_default();
            let r = self.emit_aggregate(&key, &candidates, AggregateKind::Operator, span);
            self.guarded(r)?;
        }

        let assignments = mem::take(&mut self.scope.assignment_procs);
        if !assignments.is_empty() {
            let span = assignments.first().map(|c| c.span).unwrap_or_default();
            let key = names::assignment_key();
            let r = self.emit_aggregate(&key, &assignments, AggregateKind::Operator, span);
            self.guarded(r)?;
        }
        Ok(())
    }

    fn emit_aggregate(
        &mut self,
        key: &str,
        candidates: &[ast::Ident],
        kind: AggregateKind,
        span: Span,
    ) -> RResult<()> {
        let mut procs = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let cname = names::canonical(&candidate.text);
            let Some(sym) = self.asr.resolve_symbol(self.current_table, &cname) else {
                self.error(DiagnosticKind::UnresolvedSymbol, candidate.span, &cname);
                if !self.config.continue_on_error {
                    return Err(super::SemanticAbort);
                }
                continue;
            };
            let resolved = self.asr.get_past_external(sym);
            if !matches!(self.asr.symbol(resolved), Symbol::Function(_)) {
                self.error(
                    DiagnosticKind::TypeShape,
                    candidate.span,
                    &format!("`{cname}` is not a procedure"),
                );
                if !self.config.continue_on_error {
                    return Err(super::SemanticAbort);
                }
                continue;
            }
            if !procs.contains(&sym) {
                procs.push(sym);
            }
        }
        if procs.is_empty() {
            return Ok(());
        }

        // The aggregate's name may collide with one of its constituents; in
        // that case the constituent moves aside under the reserved suffix.
        if let Some(existing) = self.asr.get_symbol(self.current_table, key) {
            match self.asr.symbol(existing) {
                Symbol::Function(_) if procs.contains(&existing) => {
                    let renamed = names::renamed_constituent(key);
                    self.asr.remove_symbol(self.current_table, key);
                    if let Symbol::Function(f) = self.asr.symbol_mut(existing) {
                        f.name = renamed.clone();
                    }
                    self.asr
                        .bind(self.current_table, &renamed, existing, false)
                        .map_err(|e| {
                            self.abort(DiagnosticKind::Internal, span, &e.to_string())
                        })?;
                }
                Symbol::GenericProcedure(_) if kind == AggregateKind::Generic => {
                    let merged = procs;
                    if let Symbol::GenericProcedure(g) = self.asr.symbol_mut(existing) {
                        for p in merged {
                            if !g.procs.contains(&p) {
                                g.procs.push(p);
                            }
                        }
                    }
                    self.dedupe_by_target(existing);
                    return Ok(());
                }
                Symbol::CustomOperator(_) if kind == AggregateKind::Operator => {
                    let merged = procs;
                    if let Symbol::CustomOperator(c) = self.asr.symbol_mut(existing) {
                        for p in merged {
                            if !c.procs.contains(&p) {
                                c.procs.push(p);
                            }
                        }
                    }
                    self.dedupe_by_target(existing);
                    return Ok(());
                }
                Symbol::External(_) => {
                    self.warn_shadow(span, key);
                }
                _ => {
                    return Err(self.abort(DiagnosticKind::DuplicateSymbol, span, key));
                }
            }
        }

        let symbol = match kind {
            AggregateKind::Generic => Symbol::GenericProcedure(GenericProcedure {
                name: names::canonical(key),
                parent: self.current_table,
                procs,
                access: Access::Public,
                span,
            }),
            AggregateKind::Operator => Symbol::CustomOperator(CustomOperator {
                name: names::canonical(key),
                parent: self.current_table,
                procs,
                access: Access::Public,
                span,
            }),
        };
        self.declare_mangled(&names::canonical(key), symbol, span, true)?;
        Ok(())
    }

    fn dedupe_by_target(&mut self, aggregate: SymbolId) {
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

    /// Register a synthesised operator function as a constituent of the
    /// scope's `~tag` overload set, creating the set on first use.
    pub(super) fn register_operator_constituent(
        &mut self,
        tag: &str,
        proc: SymbolId,
        span: Span,
    ) -> RResult<SymbolId> {
        let key = names::operator_aggregate_key(tag);
        if let Some(existing) = self.asr.get_symbol(self.current_table, &key) {
            if let Symbol::CustomOperator(c) = self.asr.symbol_mut(existing) {
                if !c.procs.contains(&proc) {
                    c.procs.push(proc);
                }
                return Ok(existing);
            }
            return Err(self.abort(DiagnosticKind::DuplicateSymbol, span, &key));
        }
        self.declare_mangled(
            &key,
            Symbol::CustomOperator(CustomOperator {
                name: key.clone(),
                parent: self.current_table,
                procs: vec![proc],
                access: Access::Public,
                span,
            }),
            span,
            false,
        )
    }
}
