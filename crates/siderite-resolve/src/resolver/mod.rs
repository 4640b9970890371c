//! The declaration pass: syntax tree in, ASR out.
//!
//! One mutating walk per translation unit. Each scope runs through the same
//! shape: `use` directives first, then declarations in source order (with
//! self-referential procedure declarations deferred), then contained
//! procedures, then scope finalisation (overload sets, type-bound
//! procedures, deferred struct patches, access, pragmas), then executable
//! bodies.
//!
//! Failure handling: every diagnostic-worthy condition is reported through
//! the sink, then either the enclosing declaration is dropped
//! (continue-on-error) or a [`SemanticAbort`] unwinds to the scope
//! boundary. A partly resolved entity never stays bound in its table.

mod decls;
mod derived;
mod entry_rewrite;
mod exprs;
mod imports;
mod interfaces;
mod templates;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod derived_tests;
#[cfg(test)]
mod entry_tests;
#[cfg(test)]
mod imports_tests;
#[cfg(test)]
mod templates_tests;

use std::mem;

use indexmap::{IndexMap, IndexSet};

use siderite_asr::{
    Abi, Asr, DefKind, Expr, Function, FunctionFlags, FunctionType, Intent, Module, Program,
    Symbol, SymbolId, TableId, Ty, Variable,
};
use siderite_core::{DiagnosticKind, Diagnostics, Span, names};
use siderite_syntax as ast;

use crate::implicit::ImplicitStack;
use crate::loader::ModuleLoader;

/// Resolution options.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Honor implicit typing rules; off means `implicit none` everywhere.
    pub implicit_typing: bool,
    /// Drop failing declarations and keep going instead of unwinding.
    pub continue_on_error: bool,
}

/// The unwind signal for unrecoverable scope errors. The diagnostic has
/// already been recorded when this value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("semantic analysis aborted")]
pub struct SemanticAbort;

pub(crate) type RResult<T> = Result<T, SemanticAbort>;

/// What resolution hands to later passes.
#[derive(Debug)]
pub struct Resolution {
    /// The translation-unit symbol; run the verifier on it before use.
    pub unit: SymbolId,
    /// ENTRY rewriting: entry name -> 0-based positions of that entry's
    /// formals in its master's formal list (position 0 is the selector).
    pub entry_args: IndexMap<String, Vec<usize>>,
}

/// Resolve a translation unit into the arena.
pub fn resolve(
    unit: &ast::TranslationUnit,
    asr: &mut Asr,
    loader: &mut dyn ModuleLoader,
    config: &ResolverConfig,
    diag: &mut Diagnostics,
) -> Result<Resolution, SemanticAbort> {
    let global = asr.new_table(None);
    let unit_sym = asr.alloc(Symbol::TranslationUnit(siderite_asr::TranslationUnit {
        table: global,
        items: Vec::new(),
    }));
    asr.set_table_owner(global, unit_sym);

    let mut resolver = Resolver {
        asr,
        diag,
        loader,
        config,
        global,
        current_table: global,
        implicit: ImplicitStack::new(config.implicit_typing),
        dep_frames: Vec::new(),
        module_frames: Vec::new(),
        scope: ScopeCtx::default(),
        template_params: Vec::new(),
        pending_headers: IndexSet::new(),
        entry_args: IndexMap::new(),
        block_counter: 0,
    };

    for item in &unit.items {
        let result = match item {
            ast::Item::Module(m) => resolver.module(m),
            ast::Item::Submodule(sm) => resolver.submodule(sm),
            ast::Item::Program(p) => resolver.program(p),
            ast::Item::Procedure(p) => resolver.top_level_procedure(p),
        };
        if let Err(abort) = result {
            if !config.continue_on_error {
                return Err(abort);
            }
        }
    }

    resolver.link_module_procedures();

    Ok(Resolution {
        unit: unit_sym,
        entry_args: resolver.entry_args,
    })
}

/// Per-scope accumulators, filled while walking and consumed at scope
/// finalisation.
#[derive(Debug, Default)]
pub(crate) struct ScopeCtx {
    /// Generic name -> candidate procedure names.
    pub generic_procedures: IndexMap<String, Vec<ast::Ident>>,
    /// Intrinsic-operator key (`~add`) -> candidate procedure names.
    pub overloaded_op_procs: IndexMap<String, Vec<ast::Ident>>,
    /// Defined-operator key (`~~cross~~`) -> candidate procedure names.
    pub defined_op_procs: IndexMap<String, Vec<ast::Ident>>,
    pub assignment_procs: Vec<ast::Ident>,
    /// Type-bound procedure bindings waiting for their procedures.
    pub class_procs: Vec<PendingMethod>,
    /// Variables whose struct type has not been emitted yet.
    pub deferred_struct_vars: Vec<(SymbolId, ast::Ident)>,
    pub default_access: Option<siderite_asr::Access>,
    pub access_overrides: Vec<(ast::Ident, siderite_asr::Access)>,
    pub simd_vars: Vec<ast::Ident>,
}

#[derive(Debug)]
pub(crate) struct PendingMethod {
    pub struct_name: String,
    pub binding: ast::Ident,
    pub target: Option<ast::Ident>,
    pub deferred: bool,
    pub nopass: bool,
    pub pass_arg: Option<ast::Ident>,
}

/// One open dependency record.
#[derive(Debug)]
pub(crate) enum DepFrame {
    /// A variable under resolution: every outward name counts, own name
    /// excluded.
    Entity {
        name: String,
        names: IndexSet<String>,
    },
    /// A function or struct scope: only names that do not bind between the
    /// walk position and `home` count.
    Scope {
        home: TableId,
        name: String,
        names: IndexSet<String>,
    },
}

impl DepFrame {
    fn names_mut(&mut self) -> &mut IndexSet<String> {
        match self {
            DepFrame::Entity { names, .. } | DepFrame::Scope { names, .. } => names,
        }
    }
}

pub(crate) struct Resolver<'a> {
    pub(crate) asr: &'a mut Asr,
    pub(crate) diag: &'a mut Diagnostics,
    pub(crate) loader: &'a mut dyn ModuleLoader,
    pub(crate) config: &'a ResolverConfig,
    pub(crate) global: TableId,
    pub(crate) current_table: TableId,
    pub(crate) implicit: ImplicitStack,
    pub(crate) dep_frames: Vec<DepFrame>,
    /// Module-name dependency sets, one per open module-like scope.
    pub(crate) module_frames: Vec<IndexSet<String>>,
    pub(crate) scope: ScopeCtx,
    /// Stack of template parameter sets; a name in the top set resolves as
    /// a type parameter.
    pub(crate) template_params: Vec<IndexSet<String>>,
    /// Procedures hoisted but not yet fully resolved; call-site arity
    /// checks defer to the verifier for these.
    pub(crate) pending_headers: IndexSet<SymbolId>,
    pub(crate) entry_args: IndexMap<String, Vec<usize>>,
    pub(crate) block_counter: u32,
}

impl<'a> Resolver<'a> {
    // ------------------------------------------------------------------
    // Diagnostics and small helpers
    // ------------------------------------------------------------------

    pub(crate) fn error(&mut self, kind: DiagnosticKind, span: Span, detail: &str) {
        self.diag
            .report(span.source, kind, span.range)
            .message(detail)
            .emit();
    }

    pub(crate) fn abort(&mut self, kind: DiagnosticKind, span: Span, detail: &str) -> SemanticAbort {
        self.error(kind, span, detail);
        SemanticAbort
    }

    pub(crate) fn warn_shadow(&mut self, span: Span, name: &str) {
        self.diag
            .report(span.source, DiagnosticKind::ShadowedImport, span.range)
            .message(name)
            .emit();
    }

    /// Continue-on-error at declaration granularity: the failed declaration
    /// is already dropped; keep walking when configured to.
    pub(crate) fn guarded(&mut self, result: RResult<()>) -> RResult<()> {
        match result {
            Err(_) if self.config.continue_on_error => Ok(()),
            other => other,
        }
    }

    /// The name of the symbol owning the current table, if any.
    pub(crate) fn current_owner_name(&self) -> Option<String> {
        let owner = self.asr.table(self.current_table).owner()?;
        self.asr.symbol(owner).name().map(str::to_string)
    }

    // ------------------------------------------------------------------
    // Declaring symbols
    // ------------------------------------------------------------------

    /// Bind a user-named symbol in the current table. Shadowing an import
    /// warns and replaces; clashing with a local declaration errors.
    pub(crate) fn declare(&mut self, ident: &ast::Ident, symbol: Symbol) -> RResult<SymbolId> {
        if !names::is_valid_identifier(&ident.text) {
            return Err(self.abort(DiagnosticKind::LexicalName, ident.span, &ident.text));
        }
        let key = names::canonical(&ident.text);
        if let Some(existing) = self.asr.get_symbol(self.current_table, &key) {
            if matches!(self.asr.symbol(existing), Symbol::External(_)) {
                self.warn_shadow(ident.span, &key);
                let id = self.asr.alloc(symbol);
                self.asr
                    .bind(self.current_table, &key, id, true)
                    .expect("validated key binds");
                return Ok(id);
            }
            return Err(self.abort(DiagnosticKind::DuplicateSymbol, ident.span, &key));
        }
        match self.asr.add_symbol(self.current_table, &key, symbol) {
            Ok(id) => Ok(id),
            Err(e) => Err(self.abort(DiagnosticKind::Internal, ident.span, &e.to_string())),
        }
    }

    /// Bind a compiler-generated key (operator aggregates, blocks,
    /// mangled imports).
    pub(crate) fn declare_mangled(
        &mut self,
        key: &str,
        symbol: Symbol,
        span: Span,
        overwrite: bool,
    ) -> RResult<SymbolId> {
        let id = self.asr.alloc(symbol);
        match self.asr.bind(self.current_table, key, id, overwrite) {
            Ok(()) => Ok(id),
            Err(e) => Err(self.abort(DiagnosticKind::Internal, span, &e.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Dependency recording
    // ------------------------------------------------------------------

    pub(crate) fn push_entity_frame(&mut self, name: &str) {
        self.dep_frames.push(DepFrame::Entity {
            name: names::canonical(name),
            names: IndexSet::new(),
        });
    }

    pub(crate) fn push_scope_frame(&mut self, home: TableId, name: &str) {
        self.dep_frames.push(DepFrame::Scope {
            home,
            name: names::canonical(name),
            names: IndexSet::new(),
        });
    }

    pub(crate) fn pop_frame(&mut self) -> Vec<String> {
        match self.dep_frames.pop() {
            Some(DepFrame::Entity { names, .. }) | Some(DepFrame::Scope { names, .. }) => {
                names.into_iter().collect()
            }
            None => Vec::new(),
        }
    }

    /// Record a resolved reference into the open dependency record.
    pub(crate) fn record_ref(&mut self, sym: SymbolId) {
        let Some(name) = self.asr.symbol(sym).name().map(str::to_string) else {
            return;
        };
        let (is_scope, home, own) = match self.dep_frames.last() {
            Some(DepFrame::Entity { name: own, .. }) => (false, None, own.clone()),
            Some(DepFrame::Scope { home, name: own, .. }) => (true, Some(*home), own.clone()),
            None => return,
        };
        if own == name {
            return;
        }
        if is_scope {
            let home = home.expect("scope frames carry a home table");
            if self.is_local_to(sym, home) {
                return;
            }
        }
        if let Some(frame) = self.dep_frames.last_mut() {
            frame.names_mut().insert(name);
        }
    }

    /// Whether a symbol's binding sits between the walk position and
    /// `home` (inclusive): such references are scope-local and never
    /// become dependencies.
    fn is_local_to(&self, sym: SymbolId, home: TableId) -> bool {
        let Some(binding) = self.asr.binding_table_of(sym) else {
            return true;
        };
        let mut current = Some(self.current_table);
        while let Some(t) = current {
            if t == binding {
                return true;
            }
            if t == home {
                return false;
            }
            current = self.asr.table(t).parent();
        }
        false
    }

    /// A finished variable's outward names feed the enclosing scope frame:
    /// anything not bound in the scope's own table counts.
    pub(crate) fn propagate_variable_deps(&mut self, deps: &[String]) {
        let Some(DepFrame::Scope { home, .. }) = self.dep_frames.last() else {
            return;
        };
        let home = *home;
        let outward: Vec<String> = deps
            .iter()
            .filter(|name| {
                match self.asr.resolve_symbol(self.current_table, name) {
                    Some(sym) => !self.is_local_to(sym, home),
                    None => true,
                }
            })
            .cloned()
            .collect();
        if let Some(DepFrame::Scope { names, name: own, .. }) = self.dep_frames.last_mut() {
            for name in outward {
                if name != *own {
                    names.insert(name);
                }
            }
        }
    }

    pub(crate) fn record_module_dep(&mut self, module_name: &str) {
        if let Some(frame) = self.module_frames.last_mut() {
            frame.insert(names::canonical(module_name));
        }
    }

    // ------------------------------------------------------------------
    // Scoping units
    // ------------------------------------------------------------------

    fn module(&mut self, m: &ast::Module) -> RResult<()> {
        let table = self.asr.new_table(Some(self.global));
        let id = self.declare(
            &m.name,
            Symbol::Module(Module {
                name: names::canonical(&m.name.text),
                table,
                dependencies: Vec::new(),
                parent_module: None,
                has_submodules: false,
                span: m.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        let result = self.module_like_scope(table, |r| {
            r.uses_then_decls(&m.decls)?;
            r.contains(&m.contains)?;
            r.finalize_scope()
        });

        match result {
            Ok(deps) => {
                let has_submodules = self.table_has_module_procs(table);
                if let Symbol::Module(md) = self.asr.symbol_mut(id) {
                    md.dependencies = deps;
                    md.has_submodules = has_submodules;
                }
                Ok(())
            }
            Err(abort) => {
                self.asr.remove_symbol(self.global, &m.name.text);
                Err(abort)
            }
        }
    }

    fn submodule(&mut self, sm: &ast::Submodule) -> RResult<()> {
        let parent = self.find_module(&sm.parent)?;
        let Some(parent_table) = self.asr.symbol(parent).symtab() else {
            return Err(self.abort(DiagnosticKind::Internal, sm.span, "module owns no table"));
        };
        let parent_name = names::canonical(&sm.parent.text);

        // The parent module's scope is the virtual parent: its public
        // symbols are visible through the ordinary chain walk.
        let table = self.asr.new_table(Some(parent_table));
        let id = self.declare(
            &sm.name,
            Symbol::Module(Module {
                name: names::canonical(&sm.name.text),
                table,
                dependencies: Vec::new(),
                parent_module: Some(parent_name.clone()),
                has_submodules: false,
                span: sm.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        let result = self.module_like_scope(table, |r| {
            r.record_module_dep(&parent_name);
            r.uses_then_decls(&sm.decls)?;
            r.contains(&sm.contains)?;
            r.finalize_scope()
        });

        match result {
            Ok(deps) => {
                if let Symbol::Module(md) = self.asr.symbol_mut(id) {
                    md.dependencies = deps;
                }
                Ok(())
            }
            Err(abort) => {
                self.asr.remove_symbol(self.global, &sm.name.text);
                Err(abort)
            }
        }
    }

    fn program(&mut self, p: &ast::Program) -> RResult<()> {
        let table = self.asr.new_table(Some(self.global));
        let id = self.declare(
            &p.name,
            Symbol::Program(Program {
                name: names::canonical(&p.name.text),
                table,
                body: Vec::new(),
                dependencies: Vec::new(),
                span: p.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        let mut body = Vec::new();
        let result = self.module_like_scope(table, |r| {
            r.uses_then_decls(&p.decls)?;
            r.contains(&p.contains)?;
            r.finalize_scope()?;
            body = r.lower_stmts(&p.body)?;
            Ok(())
        });

        match result {
            Ok(deps) => {
                if let Symbol::Program(pd) = self.asr.symbol_mut(id) {
                    pd.body = body;
                    pd.dependencies = deps;
                }
                Ok(())
            }
            Err(abort) => {
                self.asr.remove_symbol(self.global, &p.name.text);
                Err(abort)
            }
        }
    }

    /// Shared scaffolding for module-like scopes: implicit frame, module
    /// dependency frame, scope context, and table swap: restored on every
    /// path.
    fn module_like_scope(
        &mut self,
        table: TableId,
        f: impl FnOnce(&mut Self) -> RResult<()>,
    ) -> Result<Vec<String>, SemanticAbort> {
        self.implicit.push();
        self.module_frames.push(IndexSet::new());
        let saved_scope = mem::take(&mut self.scope);
        let saved_table = mem::replace(&mut self.current_table, table);

        let result = f(self);

        self.current_table = saved_table;
        self.scope = saved_scope;
        let deps = self
            .module_frames
            .pop()
            .expect("module frame pushed above")
            .into_iter()
            .collect();
        self.implicit.pop();

        result.map(|()| deps)
    }

    fn table_has_module_procs(&self, table: TableId) -> bool {
        self.asr.table(table).iter().any(|(_, sym)| {
            matches!(
                self.asr.symbol(sym),
                Symbol::Function(f) if f.signature.flags.contains(FunctionFlags::MODULE_PROC)
            )
        })
    }

    fn top_level_procedure(&mut self, p: &ast::Procedure) -> RResult<()> {
        let id = self.declare_procedure_stub(p, DefKind::Implementation)?;
        self.pending_headers.insert(id);
        let result = self.resolve_procedure_into(id, p);
        self.pending_headers.swap_remove(&id);
        if result.is_err() {
            self.asr.remove_symbol(self.current_table, &p.name.text);
        }
        result
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// `use` directives first, then declarations in source order, with
    /// self-referential procedure declarations deferred to the end.
    pub(crate) fn uses_then_decls(&mut self, decls: &[ast::Decl]) -> RResult<()> {
        for d in decls {
            if let ast::Decl::Use(u) = d {
                let r = self.resolve_use(u);
                self.guarded(r)?;
            }
        }

        let owner_name = self.current_owner_name();
        let mut deferred = Vec::new();
        for d in decls {
            match d {
                ast::Decl::Use(_) => {}
                ast::Decl::TypeDecl(td) if is_self_referential(td, owner_name.as_deref()) => {
                    deferred.push(td);
                }
                other => {
                    let r = self.decl(other);
                    self.guarded(r)?;
                }
            }
        }
        for td in deferred {
            let r = self.type_decl(td);
            self.guarded(r)?;
        }
        Ok(())
    }

    fn decl(&mut self, d: &ast::Decl) -> RResult<()> {
        match d {
            ast::Decl::Use(_) => Ok(()),
            ast::Decl::Implicit(i) => self.implicit_stmt(i),
            ast::Decl::TypeDecl(td) => self.type_decl(td),
            ast::Decl::DerivedType(dt) => self.derived_type(dt),
            ast::Decl::EnumDef(e) => self.enum_def(e),
            ast::Decl::UnionDef(u) => self.union_def(u),
            ast::Decl::Interface(i) => self.interface_block(i),
            ast::Decl::AccessStmt(a) => self.access_stmt(a),
            ast::Decl::Template(t) => self.template(t),
            ast::Decl::Requirement(r) => self.requirement(r),
            ast::Decl::Instantiate(i) => self.instantiate(i),
            ast::Decl::Pragma(p) => self.pragma(p),
        }
    }

    // ------------------------------------------------------------------
    // Procedures
    // ------------------------------------------------------------------

    /// Hoist stubs for a `contains` list, then resolve each in order. A
    /// body calling a later sibling sees its stub; the verifier re-checks
    /// arity once every header is final.
    pub(crate) fn contains(&mut self, procs: &[ast::Procedure]) -> RResult<()> {
        let mut stubs = Vec::with_capacity(procs.len());
        for p in procs {
            match self.declare_procedure_stub(p, DefKind::Implementation) {
                Ok(id) => {
                    self.pending_headers.insert(id);
                    stubs.push(Some(id));
                }
                Err(abort) => {
                    if !self.config.continue_on_error {
                        return Err(abort);
                    }
                    stubs.push(None);
                }
            }
        }
        for (p, stub) in procs.iter().zip(stubs) {
            let Some(id) = stub else { continue };
            let result = self.resolve_procedure_into(id, p);
            self.pending_headers.swap_remove(&id);
            if result.is_err() {
                self.asr.remove_symbol(self.current_table, &p.name.text);
                if !self.config.continue_on_error {
                    return result;
                }
            }
        }
        Ok(())
    }

    /// Allocate and bind a function symbol with its table but no contents
    /// yet, so sibling and recursive references resolve.
    pub(crate) fn declare_procedure_stub(
        &mut self,
        p: &ast::Procedure,
        deftype: DefKind,
    ) -> RResult<SymbolId> {
        let table = self.asr.new_table(Some(self.current_table));

        let mut flags = FunctionFlags::empty();
        if p.attrs.pure {
            flags |= FunctionFlags::PURE;
        }
        if p.attrs.elemental {
            flags |= FunctionFlags::ELEMENTAL;
        }
        if p.attrs.module_procedure {
            flags |= FunctionFlags::MODULE_PROC;
        }
        let (abi, bind_name) = match &p.attrs.bind_c {
            Some(b) => (Abi::BindC, b.link_name.clone()),
            None => (Abi::Native, None),
        };
        let access = match p.attrs.access {
            Some(ast::Access::Private) => siderite_asr::Access::Private,
            _ => siderite_asr::Access::Public,
        };

        let id = self.declare(
            &p.name,
            Symbol::Function(Function {
                name: names::canonical(&p.name.text),
                table,
                args: Vec::new(),
                body: Vec::new(),
                return_var: None,
                signature: FunctionType {
                    arg_types: Vec::new(),
                    return_type: None,
                    abi,
                    deftype,
                    bind_name,
                    flags,
                },
                dependencies: Vec::new(),
                access,
                span: p.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);
        Ok(id)
    }

    /// Fill a hoisted stub: specification part, arguments and signature,
    /// nested procedures, finalisation, then the body (skipped for
    /// interface declarations).
    pub(crate) fn resolve_procedure_into(
        &mut self,
        id: SymbolId,
        p: &ast::Procedure,
    ) -> RResult<()> {
        let table = self
            .asr
            .symbol(id)
            .symtab()
            .expect("procedure stubs own a table");
        let parent_table = self.current_table;
        let deftype = match self.asr.symbol(id) {
            Symbol::Function(f) => f.signature.deftype,
            _ => DefKind::Implementation,
        };

        self.implicit.push();
        let saved_scope = mem::take(&mut self.scope);
        let saved_table = mem::replace(&mut self.current_table, table);
        self.push_scope_frame(table, &p.name.text);

        let result = (|| -> RResult<()> {
            self.uses_then_decls(&p.decls)?;
            self.bind_args(p, id)?;
            self.contains(&p.contains)?;
            self.finalize_scope()?;
            if deftype == DefKind::Implementation {
                if p.body
                    .iter()
                    .any(|s| matches!(s, ast::Stmt::Entry { .. }))
                {
                    self.rewrite_entries(id, parent_table, p)?;
                } else {
                    let body = self.lower_stmts(&p.body)?;
                    if let Symbol::Function(f) = self.asr.symbol_mut(id) {
                        f.body = body;
                    }
                }
            }
            Ok(())
        })();

        let deps = self.pop_frame();
        self.current_table = saved_table;
        self.scope = saved_scope;
        self.implicit.pop();

        if result.is_ok() {
            if let Symbol::Function(f) = self.asr.symbol_mut(id) {
                f.dependencies = deps;
            }
        }
        result
    }

    /// Arguments, result variable, and the signature, from the variables
    /// the specification part declared.
    fn bind_args(&mut self, p: &ast::Procedure, id: SymbolId) -> RResult<()> {
        let table = self.current_table;

        let mut args = Vec::with_capacity(p.args.len());
        let mut arg_types = Vec::with_capacity(p.args.len());
        for arg in &p.args {
            let key = names::canonical(&arg.text);
            let var = match self.asr.get_symbol(table, &key) {
                Some(sym) if matches!(self.asr.symbol(sym), Symbol::Variable(_)) => sym,
                Some(_) => {
                    return Err(self.abort(
                        DiagnosticKind::TypeShape,
                        arg.span,
                        &format!("dummy argument `{key}` is not a variable"),
                    ));
                }
                None => self.implicit_variable(arg, Intent::InOut)?,
            };
            if let Symbol::Variable(v) = self.asr.symbol(var) {
                arg_types.push(v.ty.clone());
            }
            args.push(Expr::Var {
                sym: var,
                span: arg.span,
            });
        }

        let mut return_var = None;
        let mut return_type = None;
        if p.kind == ast::ProcKind::Function {
            let result_ident = p.result.clone().unwrap_or_else(|| p.name.clone());
            let key = names::canonical(&result_ident.text);
            let var = match self.asr.get_symbol(table, &key) {
                Some(sym) if matches!(self.asr.symbol(sym), Symbol::Variable(_)) => sym,
                _ => {
                    self.push_entity_frame(&key);
                    let resolved = match &p.return_type {
                        Some(spec) => self.resolve_type_spec_strict(spec, result_ident.span),
                        None => Ok(self
                            .implicit
                            .lookup(&key)
                            .cloned()
                            .unwrap_or_else(Ty::default_int)),
                    };
                    let deps = self.pop_frame();
                    let ty = resolved?;
                    self.propagate_variable_deps(&deps);
                    self.asr
                        .add_symbol(
                            table,
                            &key,
                            Symbol::Variable(Variable {
                                name: key.clone(),
                                parent: table,
                                ty,
                                init: None,
                                value: None,
                                intent: Intent::ReturnVar,
                                storage: Default::default(),
                                access: Default::default(),
                                presence: Default::default(),
                                dependencies: deps,
                                type_decl: None,
                                span: result_ident.span,
                            }),
                        )
                        .map_err(|e| {
                            self.abort(DiagnosticKind::Internal, result_ident.span, &e.to_string())
                        })?
                }
            };
            if let Symbol::Variable(v) = self.asr.symbol_mut(var) {
                v.intent = Intent::ReturnVar;
            }
            if let Symbol::Variable(v) = self.asr.symbol(var) {
                return_type = Some(v.ty.clone());
            }
            return_var = Some(var);
        }

        if let Symbol::Function(f) = self.asr.symbol_mut(id) {
            f.args = args;
            f.signature.arg_types = arg_types;
            f.signature.return_type = return_type;
            f.return_var = return_var;
        }
        Ok(())
    }

    /// Create a variable for an undeclared name from the implicit
    /// dictionary, or report it.
    pub(crate) fn implicit_variable(
        &mut self,
        ident: &ast::Ident,
        intent: Intent,
    ) -> RResult<SymbolId> {
        let key = names::canonical(&ident.text);
        let Some(ty) = self.implicit.lookup(&key).cloned() else {
            return Err(self.abort(DiagnosticKind::UnresolvedSymbol, ident.span, &key));
        };
        self.asr
            .add_symbol(
                self.current_table,
                &key,
                Symbol::Variable(Variable {
                    name: key.clone(),
                    parent: self.current_table,
                    ty,
                    init: None,
                    value: None,
                    intent,
                    storage: Default::default(),
                    access: Default::default(),
                    presence: Default::default(),
                    dependencies: Vec::new(),
                    type_decl: None,
                    span: ident.span,
                }),
            )
            .map_err(|e| self.abort(DiagnosticKind::Internal, ident.span, &e.to_string()))
    }

    // ------------------------------------------------------------------
    // Module lookup and submodule linking
    // ------------------------------------------------------------------

    /// A module by name: already in the unit, or loaded on demand.
    pub(crate) fn find_module(&mut self, name: &ast::Ident) -> RResult<SymbolId> {
        let key = names::canonical(&name.text);
        if let Some(sym) = self.asr.get_symbol(self.global, &key) {
            let sym = self.asr.get_past_external(sym);
            if matches!(self.asr.symbol(sym), Symbol::Module(_)) {
                return Ok(sym);
            }
            return Err(self.abort(
                DiagnosticKind::ModuleNotFound,
                name.span,
                &key,
            ));
        }

        match self
            .loader
            .load_module(&key, name.span, self.asr, self.global, self.diag)
        {
            Ok(id) => Ok(id),
            Err(crate::loader::LoadError::Cycle(_)) => {
                Err(self.abort(DiagnosticKind::CyclicImport, name.span, &key))
            }
            Err(crate::loader::LoadError::NotFound(_)) => {
                Err(self.abort(DiagnosticKind::ModuleNotFound, name.span, &key))
            }
            Err(other) => {
                let detail = other.to_string();
                self.diag
                    .report(name.span.source, DiagnosticKind::ModuleNotFound, name.span.range)
                    .message(&key)
                    .hint(detail)
                    .emit();
                Err(SemanticAbort)
            }
        }
    }

    /// Match `module procedure` forward declarations with their submodule
    /// implementations by name and signature.
    fn link_module_procedures(&mut self) {
        let mut checks: Vec<(SymbolId, SymbolId, Span, String)> = Vec::new();
        let mut missing: Vec<(Span, String)> = Vec::new();

        let submodules: Vec<SymbolId> = self
            .asr
            .table(self.global)
            .iter()
            .filter_map(|(_, sym)| match self.asr.symbol(sym) {
                Symbol::Module(m) if m.parent_module.is_some() => Some(sym),
                _ => None,
            })
            .collect();

        for sub in submodules {
            let Symbol::Module(sm) = self.asr.symbol(sub) else {
                continue;
            };
            let parent_name = sm.parent_module.clone().expect("filtered on submodules");
            let Some(parent) = self.asr.get_symbol(self.global, &parent_name) else {
                continue;
            };
            let Some(parent_table) = self.asr.symbol(parent).symtab() else {
                continue;
            };

            for (fname, fsym) in self.asr.table(sm.table).iter() {
                let Symbol::Function(f) = self.asr.symbol(fsym) else {
                    continue;
                };
                if !f.signature.flags.contains(FunctionFlags::MODULE_PROC)
                    || f.signature.deftype != DefKind::Implementation
                {
                    continue;
                }
                match self.asr.table(parent_table).get(fname) {
                    Some(decl) if matches!(self.asr.symbol(decl), Symbol::Function(_)) => {
                        checks.push((fsym, decl, f.span, fname.to_string()));
                    }
                    _ => missing.push((f.span, fname.to_string())),
                }
            }
        }

        for (span, name) in missing {
            self.error(
                DiagnosticKind::UnresolvedSymbol,
                span,
                &format!("{name} (no forward declaration in the parent module)"),
            );
        }
        for (implementation, declaration, span, name) in checks {
            let (Symbol::Function(fi), Symbol::Function(fd)) = (
                self.asr.symbol(implementation),
                self.asr.symbol(declaration),
            ) else {
                continue;
            };
            if fi.signature.arg_types.len() != fd.signature.arg_types.len() {
                self.error(
                    DiagnosticKind::ArityMismatch,
                    span,
                    &format!("module procedure `{name}` disagrees with its declaration"),
                );
            } else if fi.signature.arg_types != fd.signature.arg_types
                || fi.signature.return_type != fd.signature.return_type
            {
                self.error(
                    DiagnosticKind::TypeShape,
                    span,
                    &format!("module procedure `{name}` disagrees with its declaration"),
                );
            }
        }
    }
}

/// A procedure-variable declaration whose interface is the enclosing
/// procedure itself must wait until everything else in the scope exists.
fn is_self_referential(td: &ast::TypeDecl, owner: Option<&str>) -> bool {
    let Some(owner) = owner else { return false };
    matches!(
        &td.type_spec,
        ast::TypeSpec::Procedure {
            interface: Some(i)
        } if names::canonical(&i.text) == owner
    )
}
