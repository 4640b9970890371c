//! Templates, requirements, and instantiation.
//!
//! A template owns a table of generic symbols whose types may mention its
//! parameters. Instantiation binds every parameter, checks the require
//! clauses, synthesises wrapper functions for intrinsic-operator
//! arguments, and deep-copies the template's symbols into the enclosing
//! scope through a duplicator that rewrites ids and substitutes type
//! parameters.

use std::mem;

use indexmap::IndexMap;

use siderite_asr::{
    Asr, CallArg, CaseStmt, DefKind, Dimension, Expr, Function, FunctionType, Intent, Presence,
    Require, Requirement, Stmt, StoreError, StringLength, Struct, Symbol, SymbolId, TableId,
    Template, Ty, Variable,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::exprs::bin_op;
use super::{RResult, Resolver};

#[derive(Debug, Clone)]
enum TemplateBinding {
    Ty(Ty),
    Func(SymbolId),
}

impl Resolver<'_> {
    pub(super) fn template(&mut self, t: &ast::Template) -> RResult<()> {
        let table = self.asr.new_table(Some(self.current_table));
        let params: Vec<String> = t.params.iter().map(|p| names::canonical(&p.text)).collect();
        let requires = require_clauses(&t.requires);
        let id = self.declare(
            &t.name,
            Symbol::Template(Template {
                name: names::canonical(&t.name.text),
                table,
                params: params.clone(),
                requires,
                span: t.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        self.template_params.push(params.clone().into_iter().collect());
        let saved_scope = mem::take(&mut self.scope);
        let saved_table = mem::replace(&mut self.current_table, table);
        let result = (|| -> RResult<()> {
            self.uses_then_decls(&t.decls)?;
            self.apply_require_clauses(&t.requires, &params, t.span)?;
            self.contains(&t.contains)?;
            self.finalize_scope()
        })();
        self.current_table = saved_table;
        self.scope = saved_scope;
        self.template_params.pop();

        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &t.name.text);
            return Err(abort);
        }
        Ok(())
    }

    /// A `require :: r(t, f)` clause materialises the requirement's
    /// interface functions inside the template scope, bound under the
    /// clause's argument names and re-typed over the template's own
    /// parameters. That is what lets the template body call `f` before any
    /// instantiation exists.
    fn apply_require_clauses(
        &mut self,
        requires: &[ast::RequireClause],
        template_params: &[String],
        span: Span,
    ) -> RResult<()> {
        for clause in requires {
            let req_key = names::canonical(&clause.requirement.text);
            let Some(req_sym) = self.asr.resolve_symbol(self.current_table, &req_key) else {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    clause.span,
                    &format!("requirement `{req_key}` is not defined"),
                ));
            };
            let resolved = self.asr.get_past_external(req_sym);
            let Symbol::Requirement(req) = self.asr.symbol(resolved) else {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    clause.span,
                    &format!("`{req_key}` is not a requirement"),
                ));
            };
            let req = req.clone();
            if clause.args.len() != req.params.len() {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    clause.span,
                    &format!(
                        "requirement `{req_key}` takes {} parameters, got {}",
                        req.params.len(),
                        clause.args.len()
                    ),
                ));
            }

            // Requirement params with an interface function are procedure
            // params; everything else maps as a type parameter rename.
            let mut subst: IndexMap<String, TemplateBinding> = IndexMap::new();
            let mut items: Vec<(String, SymbolId)> = Vec::new();
            for (req_param, arg) in req.params.iter().zip(&clause.args) {
                let arg_key = names::canonical(&arg.text);
                match self.asr.table(req.table).get(req_param) {
                    Some(spec_fn)
                        if matches!(self.asr.symbol(spec_fn), Symbol::Function(_)) =>
                    {
                        if template_params.contains(&arg_key) {
                            items.push((arg_key, spec_fn));
                        }
                    }
                    _ => {
                        subst.insert(
                            req_param.clone(),
                            TemplateBinding::Ty(Ty::TypeParameter { name: arg_key }),
                        );
                    }
                }
            }

            let mut dup = Duplicator::new(req.table, subst);
            if let Err(e) = dup.run(self.asr, &items, self.current_table) {
                return Err(self.abort(DiagnosticKind::TemplateMisuse, span, &e.to_string()));
            }
        }
        Ok(())
    }

    pub(super) fn requirement(&mut self, r: &ast::Requirement) -> RResult<()> {
        let table = self.asr.new_table(Some(self.current_table));
        let params: Vec<String> = r.params.iter().map(|p| names::canonical(&p.text)).collect();
        let requires = require_clauses(&r.requires);
        let id = self.declare(
            &r.name,
            Symbol::Requirement(Requirement {
                name: names::canonical(&r.name.text),
                table,
                params: params.clone(),
                requires,
                span: r.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        self.template_params.push(params.into_iter().collect());
        let saved_scope = mem::take(&mut self.scope);
        let saved_table = mem::replace(&mut self.current_table, table);
        let result = (|| -> RResult<()> {
            self.uses_then_decls(&r.decls)?;
            self.finalize_scope()
        })();
        self.current_table = saved_table;
        self.scope = saved_scope;
        self.template_params.pop();

        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &r.name.text);
            return Err(abort);
        }
        Ok(())
    }

    pub(super) fn instantiate(&mut self, inst: &ast::Instantiate) -> RResult<()> {
        let key = names::canonical(&inst.template.text);
        let Some(sym) = self.asr.resolve_symbol(self.current_table, &key) else {
            return Err(self.abort(
                DiagnosticKind::UnresolvedSymbol,
                inst.template.span,
                &key,
            ));
        };
        let resolved = self.asr.get_past_external(sym);
        let Symbol::Template(tpl) = self.asr.symbol(resolved) else {
            return Err(self.abort(
                DiagnosticKind::TemplateMisuse,
                inst.template.span,
                &format!("`{key}` is not a template"),
            ));
        };
        let tpl = tpl.clone();

        if inst.args.len() != tpl.params.len() {
            return Err(self.abort(
                DiagnosticKind::TemplateMisuse,
                inst.span,
                &format!(
                    "`{key}` takes {} parameters, got {}",
                    tpl.params.len(),
                    inst.args.len()
                ),
            ));
        }

        // Bind type and function arguments first; operator arguments need
        // a type to wrap and are synthesised after.
        let mut subst: IndexMap<String, TemplateBinding> = IndexMap::new();
        let mut pending_ops = Vec::new();
        for (param, arg) in tpl.params.iter().zip(&inst.args) {
            match &arg.kind {
                ast::InstantiateArgKind::Type(spec) => {
                    let ty = self.resolve_type_spec_strict(spec, arg.span)?;
                    subst.insert(param.clone(), TemplateBinding::Ty(ty));
                }
                ast::InstantiateArgKind::Symbol(ident) => {
                    let target = self.resolve_name(ident)?;
                    if !matches!(
                        self.asr.symbol(self.asr.get_past_external(target)),
                        Symbol::Function(_)
                    ) {
                        return Err(self.abort(
                            DiagnosticKind::TemplateMisuse,
                            ident.span,
                            &format!("`{}` is not a procedure argument", ident.text),
                        ));
                    }
                    subst.insert(param.clone(), TemplateBinding::Func(target));
                }
                ast::InstantiateArgKind::Operator(tag) => {
                    pending_ops.push((param.clone(), *tag, arg.span));
                }
            }
        }
        for (param, tag, span) in pending_ops {
            let wrap_ty = subst
                .values()
                .find_map(|b| match b {
                    TemplateBinding::Ty(ty) => Some(ty.clone()),
                    TemplateBinding::Func(_) => None,
                })
                .unwrap_or_else(Ty::default_int);
            let wrapper = self.synthesize_operator_fn(tag, &wrap_ty, span)?;
            self.register_operator_constituent(tag.tag(), wrapper, span)?;
            subst.insert(param, TemplateBinding::Func(wrapper));
        }

        for clause in &tpl.requires {
            self.check_restriction(clause, &subst, inst.span)?;
        }

        // Deep-copy the template's symbols into this scope.
        let renames: IndexMap<String, String> = match &inst.only {
            Some(list) => list
                .iter()
                .map(|r| {
                    let remote = names::canonical(&r.remote.text);
                    let local = r
                        .local
                        .as_ref()
                        .map(|l| names::canonical(&l.text))
                        .unwrap_or_else(|| remote.clone());
                    (remote, local)
                })
                .collect(),
            None => IndexMap::new(),
        };
        let limit_to_renames = inst.only.is_some();

        let mut items = Vec::new();
        for (name, sym) in self.asr.table(tpl.table).iter() {
            if tpl.params.iter().any(|p| p == name) {
                continue;
            }
            let local = match renames.get(name) {
                Some(local) => local.clone(),
                None if limit_to_renames => continue,
                None => name.to_string(),
            };
            items.push((local, sym));
        }

        let mut dup = Duplicator::new(tpl.table, subst);
        if let Err(e) = dup.run(self.asr, &items, self.current_table) {
            return Err(self.abort(DiagnosticKind::TemplateMisuse, inst.span, &e.to_string()));
        }

        // Fresh copies get fresh, exact dependency lists.
        for copy in dup.copies.clone() {
            if let Some(deps) = siderite_asr::dependencies_of(self.asr, copy) {
                match self.asr.symbol_mut(copy) {
                    Symbol::Function(f) => f.dependencies = deps,
                    Symbol::Variable(v) => v.dependencies = deps,
                    Symbol::Struct(s) => s.dependencies = deps,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// A function wrapping an intrinsic operator over a concrete type,
    /// created once per (operator, type) pair in the scope.
    fn synthesize_operator_fn(
        &mut self,
        tag: ast::OpTag,
        ty: &Ty,
        span: Span,
    ) -> RResult<SymbolId> {
        let name = format!(
            "{}_{}{}",
            tag.tag(),
            ty_suffix(ty),
            names::RESERVED_SUFFIX
        );
        if let Some(existing) = self.asr.get_symbol(self.current_table, &name) {
            return Ok(existing);
        }

        let table = self.asr.new_table(Some(self.current_table));
        let mut make_arg = |asr: &mut Asr, arg_name: &str| {
            asr.add_symbol(
                table,
                arg_name,
                Symbol::Variable(Variable {
                    name: arg_name.to_string(),
                    parent: table,
                    ty: ty.clone(),
                    init: None,
                    value: None,
                    intent: Intent::In,
                    storage: Default::default(),
                    access: Default::default(),
                    presence: Presence::Required,
                    dependencies: Vec::new(),
                    type_decl: None,
                    span,
                }),
            )
        };
        let a = make_arg(self.asr, "a")
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        let b = make_arg(self.asr, "b")
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;

        let ret_ty = match tag {
            ast::OpTag::Eq
            | ast::OpTag::NotEq
            | ast::OpTag::Lt
            | ast::OpTag::LtE
            | ast::OpTag::Gt
            | ast::OpTag::GtE => Ty::default_logical(),
            _ => ty.clone(),
        };
        let ret = self
            .asr
            .add_symbol(
                table,
                "result",
                Symbol::Variable(Variable {
                    name: "result".to_string(),
                    parent: table,
                    ty: ret_ty.clone(),
                    init: None,
                    value: None,
                    intent: Intent::ReturnVar,
                    storage: Default::default(),
                    access: Default::default(),
                    presence: Presence::Required,
                    dependencies: Vec::new(),
                    type_decl: None,
                    span,
                }),
            )
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;

        let body = vec![Stmt::Assignment {
            target: Expr::Var { sym: ret, span },
            value: Expr::BinaryOp {
                op: bin_op(tag),
                left: Box::new(Expr::Var { sym: a, span }),
                right: Box::new(Expr::Var { sym: b, span }),
                ty: ret_ty.clone(),
                span,
            },
            realloc_lhs: false,
            span,
        }];

        let id = self
            .asr
            .add_symbol(
                self.current_table,
                &name,
                Symbol::Function(Function {
                    name: name.clone(),
                    table,
                    args: vec![Expr::Var { sym: a, span }, Expr::Var { sym: b, span }],
                    body,
                    return_var: Some(ret),
                    signature: FunctionType {
                        arg_types: vec![ty.clone(), ty.clone()],
                        return_type: Some(ret_ty),
                        deftype: DefKind::Implementation,
                        ..FunctionType::default()
                    },
                    dependencies: Vec::new(),
                    access: Default::default(),
                    span,
                }),
            )
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        self.asr.set_table_owner(table, id);
        Ok(id)
    }

    /// Check one `require` clause: the bound functions must match the
    /// requirement's interfaces up to type substitution.
    fn check_restriction(
        &mut self,
        clause: &Require,
        subst: &IndexMap<String, TemplateBinding>,
        span: Span,
    ) -> RResult<()> {
        let Some(req_sym) = self
            .asr
            .resolve_symbol(self.current_table, &clause.requirement)
        else {
            return Err(self.abort(
                DiagnosticKind::TemplateMisuse,
                span,
                &format!("requirement `{}` is not defined", clause.requirement),
            ));
        };
        let resolved = self.asr.get_past_external(req_sym);
        let Symbol::Requirement(req) = self.asr.symbol(resolved) else {
            return Err(self.abort(
                DiagnosticKind::TemplateMisuse,
                span,
                &format!("`{}` is not a requirement", clause.requirement),
            ));
        };
        let req = req.clone();

        if clause.args.len() != req.params.len() {
            return Err(self.abort(
                DiagnosticKind::TemplateMisuse,
                span,
                &format!(
                    "requirement `{}` takes {} parameters, got {}",
                    req.name,
                    req.params.len(),
                    clause.args.len()
                ),
            ));
        }

        let mut ty_map: IndexMap<String, Ty> = IndexMap::new();
        let mut fn_map: IndexMap<String, SymbolId> = IndexMap::new();
        for (req_param, arg_name) in req.params.iter().zip(&clause.args) {
            match subst.get(arg_name) {
                Some(TemplateBinding::Ty(ty)) => {
                    ty_map.insert(req_param.clone(), ty.clone());
                }
                Some(TemplateBinding::Func(f)) => {
                    fn_map.insert(req_param.clone(), *f);
                }
                None => {}
            }
        }

        let specs: Vec<(String, FunctionType)> = self
            .asr
            .table(req.table)
            .iter()
            .filter_map(|(name, sym)| match self.asr.symbol(sym) {
                Symbol::Function(f) => Some((name.to_string(), f.signature.clone())),
                _ => None,
            })
            .collect();
        for (name, spec) in specs {
            let Some(&bound) = fn_map.get(&name) else {
                continue;
            };
            let bound_resolved = self.asr.get_past_external(bound);
            let Symbol::Function(bound_fn) = self.asr.symbol(bound_resolved) else {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    span,
                    &format!("argument for `{name}` is not a procedure"),
                ));
            };
            if bound_fn.signature.arg_types.len() != spec.arg_types.len() {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    span,
                    &format!("argument for `{name}` has the wrong arity"),
                ));
            }
            let args_ok = spec
                .arg_types
                .iter()
                .zip(&bound_fn.signature.arg_types)
                .all(|(want, got)| substitute_ty(want, &ty_map) == *got);
            let ret_ok = match (&spec.return_type, &bound_fn.signature.return_type) {
                (Some(want), Some(got)) => substitute_ty(want, &ty_map) == *got,
                (None, None) => true,
                _ => false,
            };
            if !args_ok || !ret_ok {
                return Err(self.abort(
                    DiagnosticKind::TemplateMisuse,
                    span,
                    &format!("argument for `{name}` does not satisfy the restriction"),
                ));
            }
        }
        Ok(())
    }
}

fn require_clauses(clauses: &[ast::RequireClause]) -> Vec<Require> {
    clauses
        .iter()
        .map(|c| Require {
            requirement: names::canonical(&c.requirement.text),
            args: c.args.iter().map(|a| names::canonical(&a.text)).collect(),
        })
        .collect()
}

fn ty_suffix(ty: &Ty) -> &'static str {
    match ty.peeled() {
        Ty::Integer { .. } => "integer",
        Ty::Real { .. } => "real",
        Ty::Complex { .. } => "complex",
        Ty::Logical { .. } => "logical",
        Ty::Character { .. } => "character",
        Ty::StructType { .. } => "derived",
        _ => "value",
    }
}

/// Substitute type parameters from a name -> type map.
fn substitute_ty(ty: &Ty, map: &IndexMap<String, Ty>) -> Ty {
    match ty {
        Ty::TypeParameter { name } => map.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Array {
            elem,
            dims,
            physical,
        } => Ty::Array {
            elem: Box::new(substitute_ty(elem, map)),
            dims: dims.clone(),
            physical: *physical,
        },
        Ty::Pointer { elem } => Ty::Pointer {
            elem: Box::new(substitute_ty(elem, map)),
        },
        Ty::Allocatable { elem } => Ty::Allocatable {
            elem: Box::new(substitute_ty(elem, map)),
        },
        Ty::FunctionType(sig) => {
            let mut sig = (**sig).clone();
            sig.arg_types = sig
                .arg_types
                .iter()
                .map(|t| substitute_ty(t, map))
                .collect();
            sig.return_type = sig.return_type.as_ref().map(|t| substitute_ty(t, map));
            Ty::FunctionType(Box::new(sig))
        }
        other => other.clone(),
    }
}

// ----------------------------------------------------------------------
// The duplicator
// ----------------------------------------------------------------------

/// Deep-copies template symbols into an instantiation scope, rewriting
/// table and symbol ids and substituting bound parameters.
struct Duplicator {
    template_table: TableId,
    subst: IndexMap<String, TemplateBinding>,
    sym_map: IndexMap<SymbolId, SymbolId>,
    copies: Vec<SymbolId>,
}

impl Duplicator {
    fn new(template_table: TableId, subst: IndexMap<String, TemplateBinding>) -> Self {
        Self {
            template_table,
            subst,
            sym_map: IndexMap::new(),
            copies: Vec::new(),
        }
    }

    /// Two waves: shells first so mutual references resolve, then contents
    /// (data symbols before functions, so member references remap).
    fn run(
        &mut self,
        asr: &mut Asr,
        items: &[(String, SymbolId)],
        dest: TableId,
    ) -> Result<(), StoreError> {
        for (local, sym) in items {
            self.shell(asr, *sym, dest, local)?;
        }
        for (_, sym) in items {
            if !matches!(asr.symbol(*sym), Symbol::Function(_)) {
                self.fill(asr, *sym)?;
            }
        }
        for (_, sym) in items {
            if matches!(asr.symbol(*sym), Symbol::Function(_)) {
                self.fill(asr, *sym)?;
            }
        }
        Ok(())
    }

    fn shell(
        &mut self,
        asr: &mut Asr,
        src: SymbolId,
        dest: TableId,
        local: &str,
    ) -> Result<(), StoreError> {
        let new_id = match asr.symbol(src) {
            Symbol::Function(f) => {
                let span = f.span;
                let access = f.access;
                let new_table = asr.new_table(Some(dest));
                let id = asr.add_symbol(
                    dest,
                    local,
                    Symbol::Function(Function {
                        name: names::canonical(local),
                        table: new_table,
                        args: Vec::new(),
                        body: Vec::new(),
                        return_var: None,
                        signature: FunctionType::default(),
                        dependencies: Vec::new(),
                        access,
                        span,
                    }),
                )?;
                asr.set_table_owner(new_table, id);
                id
            }
            Symbol::Variable(v) => {
                let span = v.span;
                let access = v.access;
                asr.add_symbol(
                    dest,
                    local,
                    Symbol::Variable(Variable {
                        name: names::canonical(local),
                        parent: dest,
                        ty: Ty::default_int(),
                        init: None,
                        value: None,
                        intent: Intent::Local,
                        storage: Default::default(),
                        access,
                        presence: Presence::Required,
                        dependencies: Vec::new(),
                        type_decl: None,
                        span,
                    }),
                )?
            }
            Symbol::Struct(s) => {
                let span = s.span;
                let is_abstract = s.is_abstract;
                let is_c_struct = s.is_c_struct;
                let new_table = asr.new_table(Some(dest));
                let id = asr.add_symbol(
                    dest,
                    local,
                    Symbol::Struct(Struct {
                        name: names::canonical(local),
                        table: new_table,
                        members: Vec::new(),
                        parent: None,
                        dependencies: Vec::new(),
                        alignment: None,
                        is_abstract,
                        is_c_struct,
                        span,
                    }),
                )?;
                asr.set_table_owner(new_table, id);
                id
            }
            // Anything else in a template body stays uncopied; references
            // keep pointing at the shared original.
            _ => return Ok(()),
        };
        self.sym_map.insert(src, new_id);
        self.copies.push(new_id);
        Ok(())
    }

    fn fill(&mut self, asr: &mut Asr, src: SymbolId) -> Result<(), StoreError> {
        let Some(&new_id) = self.sym_map.get(&src) else {
            return Ok(());
        };
        match asr.symbol(src).clone() {
            Symbol::Function(f) => {
                let new_table = asr
                    .symbol(new_id)
                    .symtab()
                    .expect("function shells own tables");
                // Locals first, so argument and body references remap.
                let children: Vec<(String, SymbolId)> = asr
                    .table(f.table)
                    .iter()
                    .map(|(n, s)| (n.to_string(), s))
                    .collect();
                for (name, child) in &children {
                    self.shell(asr, *child, new_table, name)?;
                }
                for (_, child) in &children {
                    self.fill(asr, *child)?;
                }

                let args: Vec<Expr> =
                    f.args.iter().map(|e| self.dup_expr(asr, e)).collect();
                let body: Vec<Stmt> =
                    f.body.iter().map(|s| self.dup_stmt(asr, s)).collect();
                let signature = self.dup_signature(asr, &f.signature);
                let return_var = f.return_var.map(|r| self.remap(asr, r));
                if let Symbol::Function(nf) = asr.symbol_mut(new_id) {
                    nf.args = args;
                    nf.body = body;
                    nf.signature = signature;
                    nf.return_var = return_var;
                }
            }
            Symbol::Variable(v) => {
                let ty = self.dup_ty(asr, &v.ty);
                let type_decl = v.type_decl.map(|d| self.remap(asr, d));
                let init = v.init.as_ref().map(|e| self.dup_expr(asr, e));
                let value = v.value.as_ref().map(|e| self.dup_expr(asr, e));
                if let Symbol::Variable(nv) = asr.symbol_mut(new_id) {
                    nv.ty = ty;
                    nv.init = init;
                    nv.value = value;
                    nv.intent = v.intent;
                    nv.storage = v.storage;
                    nv.presence = v.presence;
                    nv.type_decl = type_decl;
                }
            }
            Symbol::Struct(s) => {
                let new_table = asr
                    .symbol(new_id)
                    .symtab()
                    .expect("struct shells own tables");
                let children: Vec<(String, SymbolId)> = asr
                    .table(s.table)
                    .iter()
                    .map(|(n, s)| (n.to_string(), s))
                    .collect();
                for (name, child) in &children {
                    self.shell(asr, *child, new_table, name)?;
                }
                for (_, child) in &children {
                    self.fill(asr, *child)?;
                }
                let parent = s.parent.map(|p| self.remap(asr, p));
                let alignment = s.alignment.as_ref().map(|e| self.dup_expr(asr, e));
                let members = s.members.clone();
                if let Symbol::Struct(ns) = asr.symbol_mut(new_id) {
                    ns.members = members;
                    ns.parent = parent;
                    ns.alignment = alignment;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Rewrite one reference: copied symbols map to their copies, template
    /// parameters map to their bound functions, everything else stays.
    fn remap(&self, asr: &Asr, sym: SymbolId) -> SymbolId {
        if let Some(&mapped) = self.sym_map.get(&sym) {
            return mapped;
        }
        if asr.binding_table_of(sym) == Some(self.template_table) {
            if let Some(name) = asr.symbol(sym).name() {
                if let Some(TemplateBinding::Func(f)) = self.subst.get(name) {
                    return *f;
                }
            }
        }
        sym
    }

    fn dup_ty(&self, asr: &Asr, ty: &Ty) -> Ty {
        match ty {
            Ty::TypeParameter { name } => match self.subst.get(name) {
                Some(TemplateBinding::Ty(bound)) => bound.clone(),
                _ => ty.clone(),
            },
            Ty::Array {
                elem,
                dims,
                physical,
            } => Ty::Array {
                elem: Box::new(self.dup_ty(asr, elem)),
                dims: dims
                    .iter()
                    .map(|d| Dimension {
                        lower: d.lower.as_ref().map(|e| self.dup_expr(asr, e)),
                        length: d.length.as_ref().map(|e| self.dup_expr(asr, e)),
                    })
                    .collect(),
                physical: *physical,
            },
            Ty::Pointer { elem } => Ty::Pointer {
                elem: Box::new(self.dup_ty(asr, elem)),
            },
            Ty::Allocatable { elem } => Ty::Allocatable {
                elem: Box::new(self.dup_ty(asr, elem)),
            },
            Ty::Character {
                len,
                kind,
                physical,
            } => Ty::Character {
                len: match len {
                    StringLength::Expression(e) => {
                        StringLength::Expression(Box::new(self.dup_expr(asr, e)))
                    }
                    other => other.clone(),
                },
                kind: *kind,
                physical: *physical,
            },
            Ty::StructType { decl, is_c_struct } => Ty::StructType {
                decl: self.remap(asr, *decl),
                is_c_struct: *is_c_struct,
            },
            Ty::EnumType { decl } => Ty::EnumType {
                decl: self.remap(asr, *decl),
            },
            Ty::UnionType { decl } => Ty::UnionType {
                decl: self.remap(asr, *decl),
            },
            Ty::FunctionType(sig) => Ty::FunctionType(Box::new(self.dup_signature(asr, sig))),
            other => other.clone(),
        }
    }

    fn dup_signature(&self, asr: &Asr, sig: &FunctionType) -> FunctionType {
        FunctionType {
            arg_types: sig.arg_types.iter().map(|t| self.dup_ty(asr, t)).collect(),
            return_type: sig.return_type.as_ref().map(|t| self.dup_ty(asr, t)),
            abi: sig.abi,
            deftype: sig.deftype,
            bind_name: sig.bind_name.clone(),
            flags: sig.flags,
        }
    }

    fn dup_expr(&self, asr: &Asr, expr: &Expr) -> Expr {
        match expr {
            Expr::Var { sym, span } => Expr::Var {
                sym: self.remap(asr, *sym),
                span: *span,
            },
            Expr::FunctionCall {
                callee,
                args,
                ty,
                span,
            } => Expr::FunctionCall {
                callee: self.remap(asr, *callee),
                args: self.dup_args(asr, args),
                ty: self.dup_ty(asr, ty),
                span: *span,
            },
            Expr::BinaryOp {
                op,
                left,
                right,
                ty,
                span,
            } => Expr::BinaryOp {
                op: *op,
                left: Box::new(self.dup_expr(asr, left)),
                right: Box::new(self.dup_expr(asr, right)),
                ty: self.dup_ty(asr, ty),
                span: *span,
            },
            Expr::StringPhysicalCast { arg, ty, span } => Expr::StringPhysicalCast {
                arg: Box::new(self.dup_expr(asr, arg)),
                ty: self.dup_ty(asr, ty),
                span: *span,
            },
            Expr::StructMemberRef {
                base,
                member,
                ty,
                span,
            } => Expr::StructMemberRef {
                base: Box::new(self.dup_expr(asr, base)),
                member: self.remap(asr, *member),
                ty: self.dup_ty(asr, ty),
                span: *span,
            },
            Expr::IntConstant { .. }
            | Expr::RealConstant { .. }
            | Expr::LogicalConstant { .. }
            | Expr::StringConstant { .. } => expr.clone(),
        }
    }

    fn dup_args(&self, asr: &Asr, args: &[CallArg]) -> Vec<CallArg> {
        args.iter()
            .map(|a| CallArg {
                value: a.value.as_ref().map(|e| self.dup_expr(asr, e)),
            })
            .collect()
    }

    fn dup_stmt(&self, asr: &Asr, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Assignment {
                target,
                value,
                realloc_lhs,
                span,
            } => Stmt::Assignment {
                target: self.dup_expr(asr, target),
                value: self.dup_expr(asr, value),
                realloc_lhs: *realloc_lhs,
                span: *span,
            },
            Stmt::SubroutineCall { callee, args, span } => Stmt::SubroutineCall {
                callee: self.remap(asr, *callee),
                args: self.dup_args(asr, args),
                span: *span,
            },
            Stmt::Select {
                selector,
                cases,
                default,
                enable_fall_through,
                span,
            } => Stmt::Select {
                selector: self.dup_expr(asr, selector),
                cases: cases
                    .iter()
                    .map(|c| CaseStmt {
                        values: c.values.iter().map(|e| self.dup_expr(asr, e)).collect(),
                        body: c.body.iter().map(|s| self.dup_stmt(asr, s)).collect(),
                        fall_through: c.fall_through,
                        span: c.span,
                    })
                    .collect(),
                default: default.iter().map(|s| self.dup_stmt(asr, s)).collect(),
                enable_fall_through: *enable_fall_through,
                span: *span,
            },
            Stmt::Return { span } => Stmt::Return { span: *span },
            Stmt::BlockCall { block, span } => Stmt::BlockCall {
                block: self.remap(asr, *block),
                span: *span,
            },
            Stmt::ExprStmt { expr, span } => Stmt::ExprStmt {
                expr: self.dup_expr(asr, expr),
                span: *span,
            },
        }
    }
}
