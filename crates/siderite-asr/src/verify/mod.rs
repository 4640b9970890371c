//! The ASR invariant checker.
//!
//! A read-only walk over a translation unit. The first broken invariant
//! aborts the walk with a [`VerifyError`]; later passes only ever see trees
//! the walk accepted.
//!
//! Two modes: pre-link (`check_external = false`) tolerates unresolved
//! external symbols; post-link requires every reference to resolve.

mod depwalk;
mod error;
mod shapes;

pub use error::{VerifyError, VerifyErrorKind};

use indexmap::{IndexMap, IndexSet};
use siderite_core::{Span, names};

use crate::arena::{Asr, SymbolId, TableId};
use crate::const_eval;
use crate::expr::{CallArg, Expr, Stmt};
use crate::symbol::{Enum, EnumKind, Function, Intent, Presence, Storage, Symbol};
use crate::ty::{Abi, Ty};

type VResult = Result<(), VerifyError>;

/// Re-derive an entity's dependency set from its structure, in first
/// reference order. `None` for kinds that carry no dependency list. This is
/// the same walk the verifier compares stored lists against, exposed for
/// passes that materialise symbols wholesale (template instantiation,
/// module loading) and must seed lists that will survive verification.
pub fn dependencies_of(asr: &Asr, id: SymbolId) -> Option<Vec<String>> {
    depwalk::entity_dependencies(asr, id).map(|set| set.into_iter().collect())
}

/// Check every invariant of the tree rooted at `unit`.
pub fn verify(asr: &Asr, unit: SymbolId, check_external: bool) -> VResult {
    let mut verifier = Verifier {
        asr,
        check_external,
        seen_counters: IndexSet::new(),
        stack: Vec::new(),
    };
    verifier.unit(unit)
}

struct Verifier<'a> {
    asr: &'a Asr,
    check_external: bool,
    seen_counters: IndexSet<u64>,
    stack: Vec<TableId>,
}

fn fail(kind: VerifyErrorKind, span: Span, message: impl Into<String>) -> VerifyError {
    VerifyError::new(kind, span, message)
}

impl<'a> Verifier<'a> {
    fn unit(&mut self, unit: SymbolId) -> VResult {
        let asr = self.asr;
        let Symbol::TranslationUnit(tu) = asr.symbol(unit) else {
            return Err(fail(
                VerifyErrorKind::Internal,
                Span::default(),
                "verification root is not a translation unit",
            ));
        };

        let table = asr.table(tu.table);
        if table.parent().is_some() {
            return Err(fail(
                VerifyErrorKind::Scope,
                Span::default(),
                "translation-unit table has a parent",
            ));
        }
        if table.owner() != Some(unit) {
            return Err(fail(
                VerifyErrorKind::Scope,
                Span::default(),
                "translation-unit table owner does not round-trip",
            ));
        }
        self.seen_counters.insert(table.counter());

        self.stack.push(tu.table);
        for (key, sym) in table.iter() {
            self.symbol(key, sym)?;
        }
        let mut counts = IndexMap::new();
        for stmt in &tu.items {
            self.stmt(stmt, &mut counts)?;
        }
        self.stack.pop();
        Ok(())
    }

    fn current(&self) -> TableId {
        *self.stack.last().expect("verifier walk keeps a scope")
    }

    // ------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------

    fn symbol(&mut self, key: &str, id: SymbolId) -> VResult {
        let asr = self.asr;
        let sym = asr.symbol(id);
        let span = sym.span().unwrap_or_default();

        if !names::is_valid_key(key) {
            return Err(fail(
                VerifyErrorKind::Name,
                span,
                format!("`{key}` is not a storable symbol name"),
            ));
        }
        if let Some(name) = sym.name() {
            if names::canonical(name) != key {
                return Err(fail(
                    VerifyErrorKind::Name,
                    span,
                    format!("`{name}` is bound under the key `{key}`"),
                ));
            }
        }

        match sym {
            Symbol::TranslationUnit(_) => Err(fail(
                VerifyErrorKind::Scope,
                span,
                "translation unit bound inside a table",
            )),
            Symbol::Program(p) => {
                self.owned_table(id, p.table, span)?;
                self.walk_scope(p.table)?;
                self.stack.push(p.table);
                let mut counts = IndexMap::new();
                for stmt in &p.body {
                    self.stmt(stmt, &mut counts)?;
                }
                self.stack.pop();
                Ok(())
            }
            Symbol::Module(m) => {
                // A submodule's scope hangs off its parent module's table,
                // not the table it is bound in.
                let expected_parent = match &m.parent_module {
                    Some(parent_name) => {
                        let Some(parent) = asr
                            .resolve_symbol(self.current(), parent_name)
                            .map(|s| asr.get_past_external(s))
                        else {
                            return Err(fail(
                                VerifyErrorKind::Scope,
                                span,
                                format!(
                                    "submodule `{}` extends unknown module `{parent_name}`",
                                    m.name
                                ),
                            ));
                        };
                        let Symbol::Module(pm) = asr.symbol(parent) else {
                            return Err(fail(
                                VerifyErrorKind::Scope,
                                span,
                                format!("`{parent_name}` is not a module"),
                            ));
                        };
                        Some(pm.table)
                    }
                    None => self.stack.last().copied(),
                };
                self.owned_table_with(id, m.table, expected_parent, span)?;
                self.walk_scope(m.table)?;
                self.dependencies(id, &m.dependencies, span)
            }
            Symbol::Function(f) => self.function(id, f, span),
            Symbol::Variable(v) => {
                if v.parent != self.current() {
                    return Err(fail(
                        VerifyErrorKind::Scope,
                        span,
                        format!("variable `{}` records the wrong parent table", v.name),
                    ));
                }
                shapes::check_declared_ty(asr, &v.ty, span)?;
                if let Some(decl) = v.ty.struct_decl() {
                    if v.type_decl.is_some() && v.type_decl != Some(decl) {
                        return Err(fail(
                            VerifyErrorKind::Reference,
                            span,
                            format!(
                                "variable `{}` points at a different type declaration \
                                 than its type",
                                v.name
                            ),
                        ));
                    }
                }
                if let Some(init) = &v.init {
                    self.expr(init)?;
                }
                if let Some(value) = &v.value {
                    self.expr(value)?;
                }
                self.dependencies(id, &v.dependencies, span)
            }
            Symbol::Struct(s) => {
                self.owned_table(id, s.table, span)?;
                for member in &s.members {
                    if asr.table(s.table).get(member).is_none() {
                        return Err(fail(
                            VerifyErrorKind::Reference,
                            span,
                            format!("struct member `{member}` is not in the struct table"),
                        ));
                    }
                }
                if let Some(parent) = s.parent {
                    if !matches!(
                        asr.symbol(asr.get_past_external(parent)),
                        Symbol::Struct(_)
                    ) {
                        return Err(fail(
                            VerifyErrorKind::Reference,
                            span,
                            format!("parent of struct `{}` is not a struct", s.name),
                        ));
                    }
                }
                if let Some(alignment) = &s.alignment {
                    shapes::check_alignment(asr, alignment, span)?;
                }
                self.walk_scope(s.table)?;
                if s.is_c_struct {
                    for (_, member) in asr.table(s.table).iter() {
                        if let Symbol::Variable(v) = asr.symbol(member) {
                            if v.ty.is_character() {
                                shapes::check_c_char(asr, &v.ty, v.span)?;
                            }
                        }
                    }
                }
                self.dependencies(id, &s.dependencies, span)
            }
            Symbol::Enum(e) => {
                self.owned_table(id, e.table, span)?;
                if !matches!(e.base, Ty::Integer { .. }) {
                    return Err(fail(
                        VerifyErrorKind::TypeShape,
                        span,
                        format!("enum `{}` has a non-integer base type", e.name),
                    ));
                }
                self.walk_scope(e.table)?;
                self.enum_classification(e, span)
            }
            Symbol::Union(u) => {
                self.owned_table(id, u.table, span)?;
                for member in &u.members {
                    if asr.table(u.table).get(member).is_none() {
                        return Err(fail(
                            VerifyErrorKind::Reference,
                            span,
                            format!("union member `{member}` is not in the union table"),
                        ));
                    }
                }
                self.walk_scope(u.table)
            }
            Symbol::GenericProcedure(g) => {
                if g.parent != self.current() {
                    return Err(fail(
                        VerifyErrorKind::Scope,
                        span,
                        format!("generic `{}` records the wrong parent table", g.name),
                    ));
                }
                self.aggregate_procs(&g.name, &g.procs, span)
            }
            Symbol::CustomOperator(c) => {
                if c.parent != self.current() {
                    return Err(fail(
                        VerifyErrorKind::Scope,
                        span,
                        format!("operator `{}` records the wrong parent table", c.name),
                    ));
                }
                if !c.name.starts_with('~') {
                    return Err(fail(
                        VerifyErrorKind::Name,
                        span,
                        format!("operator `{}` lacks the reserved prefix", c.name),
                    ));
                }
                self.aggregate_procs(&c.name, &c.procs, span)
            }
            Symbol::StructMethod(m) => self.struct_method(m, span),
            Symbol::External(e) => self.external(e, span),
            Symbol::Block(b) => {
                self.owned_table(id, b.table, span)?;
                self.walk_scope(b.table)?;
                self.stack.push(b.table);
                let mut counts = IndexMap::new();
                for stmt in &b.body {
                    self.stmt(stmt, &mut counts)?;
                }
                self.stack.pop();
                Ok(())
            }
            Symbol::Requirement(r) => {
                self.owned_table(id, r.table, span)?;
                self.walk_scope(r.table)
            }
            Symbol::Template(t) => {
                self.owned_table(id, t.table, span)?;
                self.walk_scope(t.table)
            }
        }
    }

    fn function(&mut self, id: SymbolId, f: &Function, span: Span) -> VResult {
        let asr = self.asr;
        self.owned_table(id, f.table, span)?;

        if f.signature.arg_types.len() != f.args.len() {
            return Err(fail(
                VerifyErrorKind::Arity,
                span,
                format!(
                    "function `{}` has {} arguments but its signature lists {}",
                    f.name,
                    f.args.len(),
                    f.signature.arg_types.len()
                ),
            ));
        }

        for arg in &f.args {
            let Expr::Var { sym, .. } = arg else {
                return Err(fail(
                    VerifyErrorKind::Reference,
                    span,
                    format!("argument of `{}` is not a variable reference", f.name),
                ));
            };
            match asr.symbol(*sym) {
                Symbol::Variable(v) if v.parent == f.table => {}
                _ => {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        span,
                        format!("argument of `{}` is not a local variable", f.name),
                    ));
                }
            }
        }

        if let Some(ret) = f.return_var {
            match asr.symbol(ret) {
                Symbol::Variable(v) if v.parent == f.table && v.intent == Intent::ReturnVar => {}
                _ => {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        span,
                        format!("result of `{}` is not a local return variable", f.name),
                    ));
                }
            }
            if f.signature.return_type.is_none() {
                return Err(fail(
                    VerifyErrorKind::Arity,
                    span,
                    format!("function `{}` has a result but no return type", f.name),
                ));
            }
        }

        if f.signature.abi == Abi::BindC {
            for arg in &f.args {
                if let Expr::Var { sym, .. } = arg {
                    if let Symbol::Variable(v) = asr.symbol(*sym) {
                        if v.ty.is_character() {
                            shapes::check_c_char(asr, &v.ty, v.span)?;
                        }
                    }
                }
            }
        }

        self.walk_scope(f.table)?;

        self.stack.push(f.table);
        let mut counts = IndexMap::new();
        let mut result = Ok(());
        for stmt in &f.body {
            result = self.stmt(stmt, &mut counts);
            if result.is_err() {
                break;
            }
        }
        self.stack.pop();
        result?;

        self.dependencies(id, &f.dependencies, span)
    }

    fn struct_method(&mut self, m: &crate::symbol::StructMethod, span: Span) -> VResult {
        let asr = self.asr;
        if m.parent != self.current() {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                format!("method `{}` records the wrong parent table", m.name),
            ));
        }
        let owner = asr
            .table(m.parent)
            .owner()
            .map(|o| asr.symbol(o));
        let Some(Symbol::Struct(owner_struct)) = owner else {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                format!("method `{}` is bound outside a struct", m.name),
            ));
        };

        if m.is_deferred {
            if !owner_struct.is_abstract {
                return Err(fail(
                    VerifyErrorKind::Reference,
                    span,
                    format!(
                        "deferred binding `{}` in non-abstract struct `{}`",
                        m.name, owner_struct.name
                    ),
                ));
            }
            return Ok(());
        }

        let Some(proc) = m.proc else {
            return Err(fail(
                VerifyErrorKind::Reference,
                span,
                format!("non-deferred binding `{}` has no procedure", m.name),
            ));
        };
        let Symbol::Function(f) = asr.symbol(asr.get_past_external(proc)) else {
            return Err(fail(
                VerifyErrorKind::Reference,
                span,
                format!("binding `{}` does not point at a function", m.name),
            ));
        };

        if let Some(self_arg) = &m.self_arg {
            let found = f.args.iter().any(|arg| match arg {
                Expr::Var { sym, .. } => {
                    asr.symbol(*sym).name() == Some(self_arg.as_str())
                }
                _ => false,
            });
            if !found {
                return Err(fail(
                    VerifyErrorKind::Reference,
                    span,
                    format!(
                        "pass argument `{self_arg}` is not a formal of `{}`",
                        f.name
                    ),
                ));
            }
        }
        Ok(())
    }

    fn external(&mut self, e: &crate::symbol::External, span: Span) -> VResult {
        let asr = self.asr;
        if e.parent != self.current() {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                format!("external `{}` records the wrong parent table", e.name),
            ));
        }

        let Some(target) = e.target else {
            if self.check_external {
                return Err(fail(
                    VerifyErrorKind::External,
                    span,
                    format!("external `{}` is unresolved", e.name),
                ));
            }
            return Ok(());
        };

        if matches!(asr.symbol(target), Symbol::External(_)) {
            return Err(fail(
                VerifyErrorKind::External,
                span,
                format!("external `{}` points at another external", e.name),
            ));
        }
        let target_name = asr.symbol(target).name().unwrap_or_default();
        if names::canonical(target_name) != names::canonical(&e.original_name) {
            return Err(fail(
                VerifyErrorKind::External,
                span,
                format!(
                    "external `{}` records original name `{}` but the target is `{}`",
                    e.name, e.original_name, target_name
                ),
            ));
        }

        if !self.check_external {
            return Ok(());
        }

        let Some(container) = self.external_container(target) else {
            return Err(fail(
                VerifyErrorKind::External,
                span,
                format!("external `{}` has a target outside any container", e.name),
            ));
        };
        let container_sym = asr.symbol(container);
        if container_sym.name().map(names::canonical)
            != Some(names::canonical(&e.module_name))
        {
            return Err(fail(
                VerifyErrorKind::External,
                span,
                format!(
                    "external `{}` records origin `{}` but the target lives in `{}`",
                    e.name,
                    e.module_name,
                    container_sym.name().unwrap_or("?")
                ),
            ));
        }
        let Some(container_table) = container_sym.symtab() else {
            return Err(fail(
                VerifyErrorKind::External,
                span,
                format!("origin of external `{}` owns no table", e.name),
            ));
        };
        match asr.find_scoped(container_table, &e.original_name, &e.scope_path) {
            Some(found) if found == target => Ok(()),
            _ => Err(fail(
                VerifyErrorKind::External,
                span,
                format!("external `{}` does not round-trip through its origin", e.name),
            )),
        }
    }

    /// The module (preferred) or other container symbol enclosing a
    /// target's binding table.
    fn external_container(&self, target: SymbolId) -> Option<SymbolId> {
        let asr = self.asr;
        let mut table = asr.binding_table_of(target)?;
        let mut fallback = None;
        loop {
            let owner = asr.table(table).owner()?;
            match asr.symbol(owner) {
                Symbol::Module(_) => return Some(owner),
                Symbol::TranslationUnit(_) => return fallback,
                Symbol::Struct(_)
                | Symbol::Enum(_)
                | Symbol::Union(_)
                | Symbol::Function(_)
                | Symbol::Program(_) => {
                    fallback.get_or_insert(owner);
                    table = asr.table(table).parent()?;
                }
                _ => {
                    table = asr.table(table).parent()?;
                }
            }
        }
    }

    fn aggregate_procs(&self, name: &str, procs: &[SymbolId], span: Span) -> VResult {
        let asr = self.asr;
        if procs.is_empty() {
            return Err(fail(
                VerifyErrorKind::Reference,
                span,
                format!("overload set `{name}` has no constituents"),
            ));
        }
        for proc in procs {
            let resolved = asr.get_past_external(*proc);
            if !matches!(asr.symbol(resolved), Symbol::Function(_)) {
                if self.check_external || !matches!(asr.symbol(*proc), Symbol::External(_)) {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        span,
                        format!("constituent of `{name}` is not a function"),
                    ));
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scopes and dependencies
    // ------------------------------------------------------------------

    fn owned_table(&mut self, owner: SymbolId, table: TableId, span: Span) -> VResult {
        self.owned_table_with(owner, table, self.stack.last().copied(), span)
    }

    fn owned_table_with(
        &mut self,
        owner: SymbolId,
        table: TableId,
        expected_parent: Option<TableId>,
        span: Span,
    ) -> VResult {
        let t = self.asr.table(table);
        if t.parent() != expected_parent {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                "table parent does not match the enclosing scope",
            ));
        }
        if !self.seen_counters.insert(t.counter()) {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                format!("table counter {} appears twice", t.counter()),
            ));
        }
        if t.owner() != Some(owner) {
            return Err(fail(
                VerifyErrorKind::Scope,
                span,
                "table owner does not round-trip",
            ));
        }
        Ok(())
    }

    fn walk_scope(&mut self, table: TableId) -> VResult {
        self.stack.push(table);
        let mut result = Ok(());
        for (key, sym) in self.asr.table(table).iter() {
            result = self.symbol(key, sym);
            if result.is_err() {
                break;
            }
        }
        self.stack.pop();
        result
    }

    fn dependencies(&self, id: SymbolId, stored: &[String], span: Span) -> VResult {
        let asr = self.asr;
        let mut stored_set: IndexSet<&str> = IndexSet::new();
        for dep in stored {
            if !stored_set.insert(dep.as_str()) {
                return Err(fail(
                    VerifyErrorKind::DependencyDrift,
                    span,
                    format!("dependency `{dep}` is listed twice"),
                ));
            }
        }

        let Some(walked) = depwalk::entity_dependencies(asr, id) else {
            return Ok(());
        };
        for dep in &walked {
            if !stored_set.contains(dep.as_str()) {
                return Err(fail(
                    VerifyErrorKind::DependencyDrift,
                    span,
                    format!("dependency `{dep}` is missing from the stored list"),
                ));
            }
        }
        for dep in &stored_set {
            if !walked.contains(*dep) {
                return Err(fail(
                    VerifyErrorKind::DependencyDrift,
                    span,
                    format!("stored dependency `{dep}` is not referenced"),
                ));
            }
        }

        let Some(parent) = asr.binding_table_of(id) else {
            return Ok(());
        };
        for dep in stored {
            if !self.dependency_resolves(parent, dep) {
                return Err(fail(
                    VerifyErrorKind::DependencyDrift,
                    span,
                    format!("dependency `{dep}` does not resolve from the parent scope"),
                ));
            }
        }
        Ok(())
    }

    /// Resolution used for dependency names: the ordinary parent chain,
    /// extended two ways so every recorded reference counts as resolvable:
    /// one level into struct/enum tables visible on the chain (type-bound
    /// names), and through the original names of renamed imports.
    fn dependency_resolves(&self, from: TableId, name: &str) -> bool {
        let asr = self.asr;
        if asr.resolve_symbol(from, name).is_some() {
            return true;
        }
        let key = names::canonical(name);
        let mut current = Some(from);
        while let Some(t) = current {
            for (_, sym) in asr.table(t).iter() {
                if let Symbol::External(e) = asr.symbol(sym) {
                    if names::canonical(&e.original_name) == key {
                        return true;
                    }
                }
                let sym = asr.get_past_external(sym);
                if let Symbol::Struct(_) | Symbol::Enum(_) = asr.symbol(sym) {
                    if let Some(inner) = asr.symbol(sym).symtab() {
                        if asr.table(inner).get(&key).is_some() {
                            return true;
                        }
                    }
                }
            }
            current = asr.table(t).parent();
        }
        false
    }

    // ------------------------------------------------------------------
    // Statements and expressions
    // ------------------------------------------------------------------

    fn stmt(&mut self, stmt: &Stmt, counts: &mut IndexMap<SymbolId, u32>) -> VResult {
        let asr = self.asr;
        match stmt {
            Stmt::Assignment {
                target,
                value,
                realloc_lhs,
                span,
            } => {
                self.expr(target)?;
                self.expr(value)?;
                self.assignment_target(target, counts, *span)?;
                if *realloc_lhs && !target.ty(asr).is_allocatable() {
                    return Err(fail(
                        VerifyErrorKind::TypeShape,
                        *span,
                        "realloc-lhs on a non-allocatable target",
                    ));
                }
                Ok(())
            }
            Stmt::SubroutineCall { callee, args, span } => {
                self.call_site(*callee, args, *span)
            }
            Stmt::Select {
                selector,
                cases,
                default,
                enable_fall_through,
                span,
            } => {
                self.expr(selector)?;
                let mut any_fall_through = false;
                for case in cases {
                    any_fall_through |= case.fall_through;
                    for value in &case.values {
                        self.expr(value)?;
                    }
                    for stmt in &case.body {
                        self.stmt(stmt, counts)?;
                    }
                }
                for stmt in default {
                    self.stmt(stmt, counts)?;
                }
                if *enable_fall_through != any_fall_through {
                    return Err(fail(
                        VerifyErrorKind::FallThrough,
                        *span,
                        "select fall-through flag disagrees with its cases",
                    ));
                }
                Ok(())
            }
            Stmt::Return { .. } => Ok(()),
            Stmt::BlockCall { block, span } => {
                if !matches!(asr.symbol(*block), Symbol::Block(_)) {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        "block call target is not a block",
                    ));
                }
                Ok(())
            }
            Stmt::ExprStmt { expr, .. } => self.expr(expr),
        }
    }

    fn assignment_target(
        &mut self,
        target: &Expr,
        counts: &mut IndexMap<SymbolId, u32>,
        span: Span,
    ) -> VResult {
        let asr = self.asr;
        let Expr::Var { sym, .. } = target else {
            // Member assignments are checked through their base variable by
            // the body pass; the declaration phase accepts them.
            return Ok(());
        };
        let resolved = asr.get_past_external(*sym);
        let Symbol::Variable(v) = asr.symbol(resolved) else {
            return Err(fail(
                VerifyErrorKind::Reference,
                span,
                "assignment target is not a variable",
            ));
        };
        if v.intent == Intent::In {
            return Err(fail(
                VerifyErrorKind::Intent,
                span,
                format!("assignment to intent(in) argument `{}`", v.name),
            ));
        }
        if v.storage == Storage::Parameter {
            let allowed = if v.init.is_some() { 0 } else { 1 };
            let count = counts.entry(resolved).or_insert(0);
            *count += 1;
            if *count > allowed {
                return Err(fail(
                    VerifyErrorKind::Intent,
                    span,
                    format!("parameter `{}` is assigned more than once", v.name),
                ));
            }
        }
        Ok(())
    }

    fn call_site(&mut self, callee: SymbolId, args: &[CallArg], span: Span) -> VResult {
        let asr = self.asr;
        for arg in args {
            if let Some(value) = &arg.value {
                self.expr(value)?;
            }
        }

        let resolved = asr.get_past_external(callee);
        if !self.check_external && matches!(asr.symbol(resolved), Symbol::External(_)) {
            return Ok(());
        }
        match asr.symbol(resolved) {
            Symbol::Function(f) => self.call_arity(f, args, span),
            Symbol::StructMethod(m) => {
                let Some(proc) = m.proc else {
                    return Ok(());
                };
                match asr.symbol(asr.get_past_external(proc)) {
                    Symbol::Function(f) => self.call_arity(f, args, span),
                    _ => Err(fail(
                        VerifyErrorKind::CallSite,
                        span,
                        "bound procedure is not a function",
                    )),
                }
            }
            Symbol::Variable(v) => {
                let Ty::FunctionType(sig) = v.ty.peeled() else {
                    return Err(fail(
                        VerifyErrorKind::CallSite,
                        span,
                        format!("`{}` is not callable", v.name),
                    ));
                };
                if args.len() != sig.arg_types.len() {
                    return Err(fail(
                        VerifyErrorKind::Arity,
                        span,
                        format!(
                            "`{}` expects {} arguments, got {}",
                            v.name,
                            sig.arg_types.len(),
                            args.len()
                        ),
                    ));
                }
                Ok(())
            }
            _ => Err(fail(
                VerifyErrorKind::CallSite,
                span,
                "call target is not callable",
            )),
        }
    }

    /// Required arguments may not be missing; optional ones may.
    fn call_arity(&self, f: &Function, args: &[CallArg], span: Span) -> VResult {
        let asr = self.asr;
        if args.len() > f.args.len() {
            return Err(fail(
                VerifyErrorKind::Arity,
                span,
                format!(
                    "`{}` expects at most {} arguments, got {}",
                    f.name,
                    f.args.len(),
                    args.len()
                ),
            ));
        }
        for (i, formal) in f.args.iter().enumerate() {
            let provided = args.get(i).map(|a| a.value.is_some()).unwrap_or(false);
            if provided {
                continue;
            }
            let Expr::Var { sym, .. } = formal else {
                continue;
            };
            if let Symbol::Variable(v) = asr.symbol(*sym) {
                if v.presence == Presence::Required {
                    return Err(fail(
                        VerifyErrorKind::Arity,
                        span,
                        format!("required argument `{}` of `{}` is missing", v.name, f.name),
                    ));
                }
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> VResult {
        let asr = self.asr;
        match expr {
            Expr::Var { sym, span } => {
                match asr.symbol(*sym) {
                    Symbol::Variable(_) | Symbol::Function(_) | Symbol::Enum(_) => {}
                    Symbol::External(e) => {
                        if self.check_external && e.target.is_none() {
                            return Err(fail(
                                VerifyErrorKind::External,
                                *span,
                                format!("reference through unresolved external `{}`", e.name),
                            ));
                        }
                    }
                    other => {
                        return Err(fail(
                            VerifyErrorKind::Reference,
                            *span,
                            format!(
                                "variable reference targets a {}",
                                other.kind_name()
                            ),
                        ));
                    }
                }
                // The binding must be visible on the parent chain, and the
                // name must map to this very symbol object.
                let Some(binding) = asr.binding_table_of(*sym) else {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        "variable reference targets an unbound symbol",
                    ));
                };
                if !asr.is_ancestor(binding, self.current()) {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        "variable reference escapes its scope chain",
                    ));
                }
                let name = asr.symbol(*sym).name().unwrap_or_default();
                if asr.table(binding).get(&names::canonical(name)) != Some(*sym) {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        format!("`{name}` is not bound to this symbol in its table"),
                    ));
                }
                Ok(())
            }
            Expr::FunctionCall {
                callee, args, span, ..
            } => {
                self.call_site(*callee, args, *span)?;
                self.implicit_length(expr)
            }
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)?;
                self.implicit_length(left)?;
                self.implicit_length(right)
            }
            Expr::StringPhysicalCast { arg, ty, span } => {
                self.expr(arg)?;
                if !ty.is_character() {
                    return Err(fail(
                        VerifyErrorKind::TypeShape,
                        *span,
                        "string-physical cast to a non-character type",
                    ));
                }
                Ok(())
            }
            Expr::StructMemberRef {
                base, member, span, ..
            } => {
                self.expr(base)?;
                let Some(decl) = base.ty(asr).struct_decl() else {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        "member access on a non-struct base",
                    ));
                };
                if !self.member_of_struct_chain(decl, *member) {
                    return Err(fail(
                        VerifyErrorKind::Reference,
                        *span,
                        "member is not part of the base's struct chain",
                    ));
                }
                Ok(())
            }
            Expr::IntConstant { .. }
            | Expr::RealConstant { .. }
            | Expr::LogicalConstant { .. }
            | Expr::StringConstant { .. } => Ok(()),
        }
    }

    /// `ImplicitLength` may only be carried by a string-physical cast.
    fn implicit_length(&self, expr: &Expr) -> VResult {
        if matches!(expr, Expr::StringPhysicalCast { .. }) {
            return Ok(());
        }
        if expr.ty(self.asr).has_implicit_length() {
            return Err(fail(
                VerifyErrorKind::TypeShape,
                expr.span(),
                "implicit string length outside a string-physical cast",
            ));
        }
        Ok(())
    }

    /// Whether `member` is bound in `decl`'s table or any ancestor struct.
    fn member_of_struct_chain(&self, decl: SymbolId, member: SymbolId) -> bool {
        let asr = self.asr;
        let mut current = Some(asr.get_past_external(decl));
        while let Some(id) = current {
            let Symbol::Struct(s) = asr.symbol(id) else {
                return false;
            };
            if asr.table(s.table).iter().any(|(_, sym)| sym == member) {
                return true;
            }
            current = s.parent.map(|p| asr.get_past_external(p));
        }
        false
    }

    // Keep the enum story in one place: classification is stored at
    // construction and re-derived here from the member values.
    fn enum_classification(&self, e: &Enum, span: Span) -> VResult {
        let asr = self.asr;
        let mut values = Vec::new();
        let mut non_integer = false;
        for member in &e.members {
            let Some(sym) = asr.table(e.table).get(member) else {
                return Err(fail(
                    VerifyErrorKind::Reference,
                    span,
                    format!("enum member `{member}` is not in the enum table"),
                ));
            };
            let Symbol::Variable(v) = asr.symbol(sym) else {
                return Err(fail(
                    VerifyErrorKind::Reference,
                    span,
                    format!("enum member `{member}` is not a variable"),
                ));
            };
            let known = v.value.as_ref().or(v.init.as_ref());
            match known.and_then(|expr| const_eval::eval_int(asr, expr)) {
                Some(value) => values.push(value),
                None => non_integer = true,
            }
        }

        let derived = if non_integer {
            EnumKind::NonInteger
        } else {
            let unique: IndexSet<i64> = values.iter().copied().collect();
            if unique.len() != values.len() {
                EnumKind::NotUnique
            } else if values
                .iter()
                .enumerate()
                .all(|(i, v)| *v == i as i64)
            {
                EnumKind::ConsecutiveFromZero
            } else {
                EnumKind::Unique
            }
        };

        if derived != e.kind {
            return Err(fail(
                VerifyErrorKind::TypeShape,
                span,
                format!("enum `{}` classification disagrees with its values", e.name),
            ));
        }
        Ok(())
    }
}
