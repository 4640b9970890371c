//! Entity declarations, type specs, and scope finalisation.

use std::mem;

use siderite_asr::{
    ArrayPhysical, Dimension, Expr, Intent, Presence, Storage, StringLength, StringPhysical,
    Symbol, SymbolId, Ty, Variable,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::{RResult, Resolver, SemanticAbort};

/// A resolved type spec: either a type, or a derived-type name that has
/// not been emitted yet.
pub(super) enum SpecTy {
    Ty(Ty),
    Deferred(ast::Ident),
}

impl Resolver<'_> {
    pub(super) fn implicit_stmt(&mut self, imp: &ast::Implicit) -> RResult<()> {
        match &imp.spec {
            ast::ImplicitSpec::None => {
                self.implicit.clear();
                Ok(())
            }
            ast::ImplicitSpec::Rules(rules) => {
                if !self.config.implicit_typing {
                    return Err(self.abort(
                        DiagnosticKind::ImplicitTyping,
                        imp.span,
                        "implicit typing is disabled",
                    ));
                }
                for rule in rules {
                    let ty = self.resolve_type_spec_strict(&rule.type_spec, rule.span)?;
                    for &(from, to) in &rule.ranges {
                        let from = from.to_ascii_lowercase();
                        let to = to.to_ascii_lowercase();
                        if !self.implicit.set_range(from, to, ty.clone()) {
                            return Err(self.abort(
                                DiagnosticKind::ImplicitTyping,
                                rule.span,
                                &format!("malformed implicit range {from}-{to}"),
                            ));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    pub(super) fn access_stmt(&mut self, stmt: &ast::AccessStmt) -> RResult<()> {
        let access = match stmt.access {
            ast::Access::Public => siderite_asr::Access::Public,
            ast::Access::Private => siderite_asr::Access::Private,
        };
        if stmt.names.is_empty() {
            self.scope.default_access = Some(access);
        } else {
            for name in &stmt.names {
                self.scope.access_overrides.push((name.clone(), access));
            }
        }
        Ok(())
    }

    pub(super) fn pragma(&mut self, pragma: &ast::Pragma) -> RResult<()> {
        match &pragma.kind {
            ast::PragmaKind::Simd { vars } => {
                self.scope.simd_vars.extend(vars.iter().cloned());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entity declarations
    // ------------------------------------------------------------------

    pub(super) fn type_decl(&mut self, decl: &ast::TypeDecl) -> RResult<()> {
        let attrs = collect_attrs(&decl.attrs);
        for entity in &decl.entities {
            let r = self.entity_decl(decl, &attrs, entity);
            self.guarded(r)?;
        }
        Ok(())
    }

    fn entity_decl(
        &mut self,
        decl: &ast::TypeDecl,
        attrs: &Attrs,
        entity: &ast::EntityDecl,
    ) -> RResult<()> {
        self.push_entity_frame(&entity.name.text);
        let result = self.entity_decl_inner(decl, attrs, entity);
        let deps = self.pop_frame();
        match result {
            Ok(var) => {
                if let Symbol::Variable(v) = self.asr.symbol_mut(var) {
                    v.dependencies = deps.clone();
                }
                self.propagate_variable_deps(&deps);
                Ok(())
            }
            Err(abort) => Err(abort),
        }
    }

    fn entity_decl_inner(
        &mut self,
        decl: &ast::TypeDecl,
        attrs: &Attrs,
        entity: &ast::EntityDecl,
    ) -> RResult<SymbolId> {
        let span = entity.span;
        let spec = self.resolve_type_spec(&decl.type_spec, span)?;
        let (mut ty, deferred, type_decl_sym) = match spec {
            SpecTy::Ty(ty) => {
                let type_decl_sym = ty.struct_decl();
                (ty, None, type_decl_sym)
            }
            SpecTy::Deferred(name) => {
                // The struct is not emitted yet; record the name now so the
                // dependency record stays faithful, patch the type later.
                if let Some(frame) = self.dep_frames.last_mut() {
                    frame.names_mut().insert(names::canonical(&name.text));
                }
                (Ty::default_int(), Some(name), None)
            }
        };

        // Declarator dims win over a dimension attribute.
        let dims = entity.dims.as_ref().or(attrs.dims.as_ref());
        if let Some(dims) = dims {
            let dims = self.lower_dims(dims)?;
            ty = Ty::Array {
                elem: Box::new(ty),
                dims,
                physical: ArrayPhysical::Descriptor,
            };
        }
        if attrs.allocatable {
            ty = Ty::Allocatable { elem: Box::new(ty) };
        }
        if attrs.pointer {
            ty = Ty::Pointer { elem: Box::new(ty) };
        }

        let init = match &entity.init {
            Some(e) => Some(self.lower_expr(e)?),
            None => None,
        };
        let value = match (&init, ty.peeled()) {
            (Some(e), Ty::Integer { .. }) => siderite_asr::const_eval::eval_int(self.asr, e)
                .map(|v| Expr::int(v, e.span())),
            _ => None,
        };

        let var = self.declare(
            &entity.name,
            Symbol::Variable(Variable {
                name: names::canonical(&entity.name.text),
                parent: self.current_table,
                ty,
                init,
                value,
                intent: attrs.intent,
                storage: attrs.storage,
                access: attrs.access.unwrap_or_default(),
                presence: attrs.presence,
                dependencies: Vec::new(),
                type_decl: type_decl_sym,
                span,
            }),
        )?;

        if let Some(name) = deferred {
            self.scope.deferred_struct_vars.push((var, name));
        }
        Ok(var)
    }

    pub(super) fn lower_dims(&mut self, dims: &[ast::DimSpec]) -> RResult<Vec<Dimension>> {
        let mut out = Vec::with_capacity(dims.len());
        for dim in dims {
            if dim.is_deferred() {
                out.push(Dimension::deferred());
                continue;
            }
            let lower = match &dim.lower {
                Some(e) => Some(self.lower_expr(e)?),
                None => None,
            };
            let length = match (&dim.upper, &lower) {
                (Some(upper), None) => Some(self.lower_expr(upper)?),
                (Some(upper), Some(low)) => {
                    let upper = self.lower_expr(upper)?;
                    let span = upper.span();
                    let ty = Ty::default_int();
                    let extent = Expr::BinaryOp {
                        op: siderite_asr::BinOp::Sub,
                        left: Box::new(upper),
                        right: Box::new(low.clone()),
                        ty: ty.clone(),
                        span,
                    };
                    Some(Expr::BinaryOp {
                        op: siderite_asr::BinOp::Add,
                        left: Box::new(extent),
                        right: Box::new(Expr::int(1, span)),
                        ty,
                        span,
                    })
                }
                (None, _) => None,
            };
            out.push(Dimension { lower, length });
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Type specs
    // ------------------------------------------------------------------

    pub(super) fn resolve_type_spec(
        &mut self,
        spec: &ast::TypeSpec,
        span: Span,
    ) -> RResult<SpecTy> {
        let ty = match spec {
            ast::TypeSpec::Integer { kind } => Ty::Integer {
                kind: self.kind_value(kind, 4, span)?,
            },
            ast::TypeSpec::Real { kind } => Ty::Real {
                kind: self.kind_value(kind, 4, span)?,
            },
            ast::TypeSpec::Complex { kind } => Ty::Complex {
                kind: self.kind_value(kind, 4, span)?,
            },
            ast::TypeSpec::Logical { kind } => Ty::Logical {
                kind: self.kind_value(kind, 4, span)?,
            },
            ast::TypeSpec::Character { len, kind } => {
                let len = match len {
                    Some(ast::CharLen::Expr(e)) => {
                        StringLength::Expression(Box::new(self.lower_expr(e)?))
                    }
                    Some(ast::CharLen::Assumed) => StringLength::Assumed,
                    Some(ast::CharLen::Deferred) => StringLength::Deferred,
                    None => StringLength::Expression(Box::new(Expr::int(1, span))),
                };
                Ty::Character {
                    len,
                    kind: self.kind_value(kind, 1, span)?,
                    physical: StringPhysical::Descriptor,
                }
            }
            ast::TypeSpec::Named { name } | ast::TypeSpec::Class { name } => {
                return self.named_type(name);
            }
            ast::TypeSpec::Procedure { interface } => {
                let signature = match interface {
                    Some(name) => {
                        let Some(sym) = self
                            .asr
                            .resolve_symbol(self.current_table, &name.text)
                        else {
                            return Err(self.abort(
                                DiagnosticKind::UnresolvedSymbol,
                                name.span,
                                &name.text,
                            ));
                        };
                        let resolved = self.asr.get_past_external(sym);
                        let Symbol::Function(f) = self.asr.symbol(resolved) else {
                            return Err(self.abort(
                                DiagnosticKind::TypeShape,
                                name.span,
                                &format!("`{}` is not a procedure interface", name.text),
                            ));
                        };
                        let signature = f.signature.clone();
                        self.record_ref(sym);
                        signature
                    }
                    None => siderite_asr::FunctionType::default(),
                };
                Ty::FunctionType(Box::new(signature))
            }
        };
        Ok(SpecTy::Ty(ty))
    }

    /// `type(name)` / `class(name)`: a struct, enum, union, template type
    /// parameter, or a not-yet-emitted struct.
    fn named_type(&mut self, name: &ast::Ident) -> RResult<SpecTy> {
        let key = names::canonical(&name.text);
        if let Some(params) = self.template_params.last() {
            if params.contains(&key) {
                return Ok(SpecTy::Ty(Ty::TypeParameter { name: key }));
            }
        }
        match self.asr.resolve_symbol(self.current_table, &key) {
            Some(sym) => {
                let resolved = self.asr.get_past_external(sym);
                let ty = match self.asr.symbol(resolved) {
                    Symbol::Struct(s) => Ty::StructType {
                        decl: resolved,
                        is_c_struct: s.is_c_struct,
                    },
                    Symbol::Enum(_) => Ty::EnumType { decl: resolved },
                    Symbol::Union(_) => Ty::UnionType { decl: resolved },
                    _ => {
                        return Err(self.abort(
                            DiagnosticKind::TypeShape,
                            name.span,
                            &format!("`{key}` does not name a type"),
                        ));
                    }
                };
                self.record_ref(resolved);
                Ok(SpecTy::Ty(ty))
            }
            None => Ok(SpecTy::Deferred(name.clone())),
        }
    }

    /// A type spec that must resolve now (kind/implicit rules, return
    /// types, template arguments).
    pub(super) fn resolve_type_spec_strict(
        &mut self,
        spec: &ast::TypeSpec,
        span: Span,
    ) -> RResult<Ty> {
        match self.resolve_type_spec(spec, span)? {
            SpecTy::Ty(ty) => Ok(ty),
            SpecTy::Deferred(name) => Err(self.abort(
                DiagnosticKind::UnresolvedSymbol,
                name.span,
                &name.text,
            )),
        }
    }

    fn kind_value(&mut self, kind: &Option<ast::Expr>, default: u8, span: Span) -> RResult<u8> {
        let Some(expr) = kind else { return Ok(default) };
        let lowered = self.lower_expr(expr)?;
        match siderite_asr::const_eval::eval_int(self.asr, &lowered) {
            Some(v @ (1 | 2 | 4 | 8 | 16)) => Ok(v as u8),
            Some(v) => Err(self.abort(
                DiagnosticKind::TypeShape,
                span,
                &format!("{v} is not a supported kind"),
            )),
            None => Err(self.abort(
                DiagnosticKind::TypeShape,
                span,
                "kind is not a constant expression",
            )),
        }
    }

    // ------------------------------------------------------------------
    // Scope finalisation
    // ------------------------------------------------------------------

    /// Runs once per scope, after declarations and contained procedures:
    /// patch deferred struct types, emit type-bound procedures, assemble
    /// overload sets, apply access defaults, and mark SIMD arrays.
    pub(super) fn finalize_scope(&mut self) -> RResult<()> {
        self.patch_deferred_struct_vars()?;
        self.emit_class_procedures()?;
        self.finalize_overload_sets()?;
        self.apply_access()?;
        self.apply_simd_pragmas()?;
        Ok(())
    }

    fn patch_deferred_struct_vars(&mut self) -> RResult<()> {
        let pending = mem::take(&mut self.scope.deferred_struct_vars);
        for (var, name) in pending {
            let key = names::canonical(&name.text);
            let Some(sym) = self.asr.resolve_symbol(self.current_table, &key) else {
                self.error(DiagnosticKind::UnresolvedSymbol, name.span, &key);
                let parent = match self.asr.symbol(var) {
                    Symbol::Variable(v) => v.parent,
                    _ => continue,
                };
                let var_name = self
                    .asr
                    .symbol(var)
                    .name()
                    .map(str::to_string)
                    .unwrap_or_default();
                self.asr.remove_symbol(parent, &var_name);
                if !self.config.continue_on_error {
                    return Err(SemanticAbort);
                }
                continue;
            };
            let resolved = self.asr.get_past_external(sym);
            let ty = match self.asr.symbol(resolved) {
                Symbol::Struct(s) => Ty::StructType {
                    decl: resolved,
                    is_c_struct: s.is_c_struct,
                },
                Symbol::Enum(_) => Ty::EnumType { decl: resolved },
                Symbol::Union(_) => Ty::UnionType { decl: resolved },
                _ => {
                    self.error(
                        DiagnosticKind::TypeShape,
                        name.span,
                        &format!("`{key}` does not name a type"),
                    );
                    if !self.config.continue_on_error {
                        return Err(SemanticAbort);
                    }
                    continue;
                }
            };
            if let Symbol::Variable(v) = self.asr.symbol_mut(var) {
                // Keep any array/pointer wrapping built around the
                // placeholder element type.
                v.ty = replace_element(&v.ty, &ty);
                v.type_decl = Some(resolved);
            }
        }
        Ok(())
    }

    fn apply_access(&mut self) -> RResult<()> {
        let overrides = mem::take(&mut self.scope.access_overrides);
        let default = self.scope.default_access.take();

        if let Some(siderite_asr::Access::Private) = default {
            let override_keys: Vec<String> = overrides
                .iter()
                .map(|(ident, _)| names::canonical(&ident.text))
                .collect();
            let all: Vec<(String, SymbolId)> = self
                .asr
                .table(self.current_table)
                .iter()
                .map(|(n, s)| (n.to_string(), s))
                .collect();
            for (name, sym) in all {
                if !override_keys.contains(&name) {
                    set_access(self.asr, sym, siderite_asr::Access::Private);
                }
            }
        }

        for (ident, access) in overrides {
            let key = names::canonical(&ident.text);
            match self.asr.get_symbol(self.current_table, &key) {
                Some(sym) => set_access(self.asr, sym, access),
                None => {
                    self.error(DiagnosticKind::UnresolvedSymbol, ident.span, &key);
                    if !self.config.continue_on_error {
                        return Err(SemanticAbort);
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_simd_pragmas(&mut self) -> RResult<()> {
        let vars = mem::take(&mut self.scope.simd_vars);
        for ident in vars {
            let key = names::canonical(&ident.text);
            let Some(sym) = self.asr.get_symbol(self.current_table, &key) else {
                self.error(DiagnosticKind::UnresolvedSymbol, ident.span, &key);
                if !self.config.continue_on_error {
                    return Err(SemanticAbort);
                }
                continue;
            };
            let marked = match self.asr.symbol_mut(sym) {
                Symbol::Variable(v) => mark_simd(&mut v.ty),
                _ => false,
            };
            if !marked {
                self.error(
                    DiagnosticKind::TypeShape,
                    ident.span,
                    &format!("simd pragma on non-array `{key}`"),
                );
                if !self.config.continue_on_error {
                    return Err(SemanticAbort);
                }
            }
        }
        Ok(())
    }
}

struct Attrs {
    intent: Intent,
    storage: Storage,
    pointer: bool,
    allocatable: bool,
    presence: Presence,
    dims: Option<Vec<ast::DimSpec>>,
    access: Option<siderite_asr::Access>,
}

fn collect_attrs(attrs: &[ast::DeclAttr]) -> Attrs {
    let mut out = Attrs {
        intent: Intent::Local,
        storage: Storage::Default,
        pointer: false,
        allocatable: false,
        presence: Presence::Required,
        dims: None,
        access: None,
    };
    for attr in attrs {
        match attr {
            ast::DeclAttr::Intent(spec) => {
                out.intent = match spec {
                    ast::IntentSpec::In => Intent::In,
                    ast::IntentSpec::Out => Intent::Out,
                    ast::IntentSpec::InOut => Intent::InOut,
                };
            }
            ast::DeclAttr::Parameter => out.storage = Storage::Parameter,
            ast::DeclAttr::Save => out.storage = Storage::Save,
            ast::DeclAttr::Pointer => out.pointer = true,
            ast::DeclAttr::Allocatable => out.allocatable = true,
            ast::DeclAttr::Optional => out.presence = Presence::Optional,
            ast::DeclAttr::Dimension(dims) => out.dims = Some(dims.clone()),
            ast::DeclAttr::Access(a) => {
                out.access = Some(match a {
                    ast::Access::Public => siderite_asr::Access::Public,
                    ast::Access::Private => siderite_asr::Access::Private,
                });
            }
            // The variable-level bind(c) attribute carries no extra state
            // the declaration phase tracks; the C character rules hang off
            // functions and c-structs.
            ast::DeclAttr::BindC(_) => {}
        }
    }
    out
}

/// Swap the scalar element inside array/pointer/allocatable wrapping.
fn replace_element(ty: &Ty, element: &Ty) -> Ty {
    match ty {
        Ty::Array {
            elem,
            dims,
            physical,
        } => Ty::Array {
            elem: Box::new(replace_element(elem, element)),
            dims: dims.clone(),
            physical: *physical,
        },
        Ty::Pointer { elem } => Ty::Pointer {
            elem: Box::new(replace_element(elem, element)),
        },
        Ty::Allocatable { elem } => Ty::Allocatable {
            elem: Box::new(replace_element(elem, element)),
        },
        _ => element.clone(),
    }
}

fn mark_simd(ty: &mut Ty) -> bool {
    match ty {
        Ty::Array { physical, .. } => {
            *physical = ArrayPhysical::Simd;
            true
        }
        Ty::Pointer { elem } | Ty::Allocatable { elem } => mark_simd(elem),
        _ => false,
    }
}

fn set_access(asr: &mut siderite_asr::Asr, sym: SymbolId, access: siderite_asr::Access) {
    match asr.symbol_mut(sym) {
        Symbol::Function(f) => f.access = access,
        Symbol::Variable(v) => v.access = access,
        Symbol::GenericProcedure(g) => g.access = access,
        Symbol::CustomOperator(c) => c.access = access,
        Symbol::External(e) => e.access = access,
        _ => {}
    }
}
