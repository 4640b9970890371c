//! Derived types, enums, unions, and type-bound procedures.

use std::mem;

use siderite_asr::{
    Enum, EnumKind, Expr, Storage, Struct, StructMethod, Symbol, SymbolId, Ty, Union, Variable,
};
use siderite_core::{DiagnosticKind, names};
use siderite_syntax as ast;

use super::{PendingMethod, RResult, Resolver};

impl Resolver<'_> {
    /// A derived type: the struct symbol goes in first with empty members
    /// (so members may mention the type itself), the body fills it, and the
    /// type-bound procedures wait in the enclosing scope's side table until
    /// the scope's procedures exist.
    pub(super) fn derived_type(&mut self, dt: &ast::DerivedType) -> RResult<()> {
        let parent = match &dt.extends {
            Some(parent_name) => {
                let key = names::canonical(&parent_name.text);
                let Some(sym) = self.asr.resolve_symbol(self.current_table, &key) else {
                    return Err(self.abort(
                        DiagnosticKind::UnresolvedSymbol,
                        parent_name.span,
                        &key,
                    ));
                };
                if !matches!(
                    self.asr.symbol(self.asr.get_past_external(sym)),
                    Symbol::Struct(_)
                ) {
                    return Err(self.abort(
                        DiagnosticKind::TypeShape,
                        parent_name.span,
                        &format!("`{key}` is not an extensible type"),
                    ));
                }
                Some(self.asr.get_past_external(sym))
            }
            None => None,
        };

        let table = self.asr.new_table(Some(self.current_table));
        let id = self.declare(
            &dt.name,
            Symbol::Struct(Struct {
                name: names::canonical(&dt.name.text),
                table,
                members: Vec::new(),
                parent,
                dependencies: Vec::new(),
                alignment: None,
                is_abstract: dt.is_abstract,
                is_c_struct: dt.bind_c,
                span: dt.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        self.push_scope_frame(table, &dt.name.text);
        if let Some(parent) = parent {
            // The parent binding sits in the enclosing scope, which the
            // locality filter would treat as local from here; record it
            // directly.
            if let Some(name) = self.asr.symbol(parent).name().map(str::to_string) {
                if let Some(frame) = self.dep_frames.last_mut() {
                    frame.names_mut().insert(name);
                }
            }
        }

        let saved = mem::replace(&mut self.current_table, table);
        let mut result = Ok(());
        for member in &dt.members {
            result = {
                let r = self.type_decl(member);
                self.guarded(r)
            };
            if result.is_err() {
                break;
            }
        }
        let alignment = match (&result, &dt.alignment) {
            (Ok(()), Some(expr)) => match self.lower_expr(expr) {
                Ok(lowered) => Some(lowered),
                Err(abort) => {
                    result = Err(abort);
                    None
                }
            },
            _ => None,
        };
        self.current_table = saved;
        let deps = self.pop_frame();

        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &dt.name.text);
            return Err(abort);
        }

        let members: Vec<String> = self
            .asr
            .table(table)
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        if let Symbol::Struct(s) = self.asr.symbol_mut(id) {
            s.members = members;
            s.dependencies = deps;
            s.alignment = alignment;
        }

        // Bindings are emitted after the enclosing scope closes, when the
        // referenced procedures exist.
        for binding in &dt.bindings {
            self.scope.class_procs.push(PendingMethod {
                struct_name: names::canonical(&dt.name.text),
                binding: binding.name.clone(),
                target: binding.target.clone(),
                deferred: binding.deferred,
                nopass: binding.nopass,
                pass_arg: binding.pass_arg.clone(),
            });
        }
        Ok(())
    }

    /// Turn the pending type-bound declarations into method symbols inside
    /// their struct tables. Runs at scope finalisation.
    pub(super) fn emit_class_procedures(&mut self) -> RResult<()> {
        let pending = mem::take(&mut self.scope.class_procs);
        for pm in pending {
            let r = self.emit_class_procedure(&pm);
            self.guarded(r)?;
        }
        Ok(())
    }

    fn emit_class_procedure(&mut self, pm: &PendingMethod) -> RResult<()> {
        let span = pm.binding.span;
        let Some(struct_sym) = self.asr.get_symbol(self.current_table, &pm.struct_name) else {
            return Err(self.abort(DiagnosticKind::Internal, span, "struct vanished"));
        };
        let Symbol::Struct(s) = self.asr.symbol(struct_sym) else {
            return Err(self.abort(DiagnosticKind::Internal, span, "struct vanished"));
        };
        let struct_table = s.table;
        let is_abstract = s.is_abstract;

        let binding_key = names::canonical(&pm.binding.text);
        let proc_name = pm
            .target
            .as_ref()
            .map(|t| names::canonical(&t.text))
            .unwrap_or_else(|| binding_key.clone());

        if pm.deferred {
            if !is_abstract {
                return Err(self.abort(
                    DiagnosticKind::TypeShape,
                    span,
                    &format!(
                        "deferred binding `{binding_key}` requires an abstract type"
                    ),
                ));
            }
            let method = Symbol::StructMethod(StructMethod {
                name: binding_key.clone(),
                parent: struct_table,
                proc: None,
                proc_name,
                self_arg: pm.pass_arg.as_ref().map(|i| names::canonical(&i.text)),
                is_deferred: true,
                nopass: pm.nopass,
                span,
            });
            return self.bind_method(struct_table, &binding_key, method, span);
        }

        let Some(proc) = self.asr.resolve_symbol(self.current_table, &proc_name) else {
            return Err(self.abort(DiagnosticKind::UnresolvedSymbol, span, &proc_name));
        };
        let resolved = self.asr.get_past_external(proc);
        let Symbol::Function(f) = self.asr.symbol(resolved) else {
            return Err(self.abort(
                DiagnosticKind::TypeShape,
                span,
                &format!("`{proc_name}` is not a procedure"),
            ));
        };

        // The pass-object argument must exist among the formals and be
        // typed with the struct or one of its ancestors.
        let self_arg = pm.pass_arg.as_ref().map(|i| names::canonical(&i.text));
        if !pm.nopass {
            let pass_var = match &self_arg {
                Some(name) => f.args.iter().find_map(|arg| match arg {
                    Expr::Var { sym, .. }
                        if self.asr.symbol(*sym).name() == Some(name.as_str()) =>
                    {
                        Some(*sym)
                    }
                    _ => None,
                }),
                None => f.args.first().and_then(|arg| match arg {
                    Expr::Var { sym, .. } => Some(*sym),
                    _ => None,
                }),
            };
            let Some(pass_var) = pass_var else {
                return Err(self.abort(
                    DiagnosticKind::TypeShape,
                    span,
                    &format!("binding `{binding_key}` has no pass-object argument"),
                ));
            };
            let pass_ty = match self.asr.symbol(pass_var) {
                Symbol::Variable(v) => v.ty.clone(),
                _ => {
                    return Err(self.abort(
                        DiagnosticKind::Internal,
                        span,
                        "pass argument is not a variable",
                    ));
                }
            };
            if !self.pass_object_compatible(&pass_ty, struct_sym) {
                return Err(self.abort(
                    DiagnosticKind::TypeShape,
                    span,
                    &format!(
                        "pass-object argument of `{proc_name}` is not compatible with \
                         `{}`",
                        pm.struct_name
                    ),
                ));
            }
        }

        let method = Symbol::StructMethod(StructMethod {
            name: binding_key.clone(),
            parent: struct_table,
            proc: Some(proc),
            proc_name,
            self_arg,
            is_deferred: false,
            nopass: pm.nopass,
            span,
        });
        self.bind_method(struct_table, &binding_key, method, span)
    }

    fn bind_method(
        &mut self,
        struct_table: siderite_asr::TableId,
        key: &str,
        method: Symbol,
        span: siderite_core::Span,
    ) -> RResult<()> {
        if self.asr.table(struct_table).contains(key) {
            return Err(self.abort(DiagnosticKind::DuplicateSymbol, span, key));
        }
        self.asr
            .add_symbol(struct_table, key, method)
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        Ok(())
    }

    /// A pass object is compatible when its type is the struct itself or
    /// any ancestor.
    fn pass_object_compatible(&self, pass_ty: &Ty, struct_sym: SymbolId) -> bool {
        let Some(decl) = pass_ty.struct_decl() else {
            return false;
        };
        let decl = self.asr.get_past_external(decl);
        let mut current = Some(self.asr.get_past_external(struct_sym));
        while let Some(id) = current {
            if id == decl {
                return true;
            }
            current = match self.asr.symbol(id) {
                Symbol::Struct(s) => s.parent.map(|p| self.asr.get_past_external(p)),
                _ => None,
            };
        }
        false
    }

    // ------------------------------------------------------------------
    // Enums and unions
    // ------------------------------------------------------------------

    pub(super) fn enum_def(&mut self, def: &ast::EnumDef) -> RResult<()> {
        let table = self.asr.new_table(Some(self.current_table));
        let id = self.declare(
            &def.name,
            Symbol::Enum(Enum {
                name: names::canonical(&def.name.text),
                table,
                base: Ty::default_int(),
                members: Vec::new(),
                kind: EnumKind::ConsecutiveFromZero,
                span: def.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        let mut members = Vec::with_capacity(def.items.len());
        let mut values: Vec<Option<i64>> = Vec::with_capacity(def.items.len());
        let mut next = 0i64;

        let saved = mem::replace(&mut self.current_table, table);
        // Member values are scope-internal; the sink frame keeps their
        // references out of any enclosing dependency record.
        self.push_entity_frame(&def.name.text);
        let result = (|| -> RResult<()> {
            for item in &def.items {
                let (value_expr, folded) = match &item.value {
                    Some(expr) => {
                        let lowered = self.lower_expr(expr)?;
                        let folded = siderite_asr::const_eval::eval_int(self.asr, &lowered);
                        (lowered, folded)
                    }
                    None => (Expr::int(next, item.span), Some(next)),
                };
                if let Some(v) = folded {
                    next = v + 1;
                }
                let stored = match folded {
                    Some(v) => Expr::int(v, item.span),
                    None => value_expr,
                };
                self.declare(
                    &item.name,
                    Symbol::Variable(Variable {
                        name: names::canonical(&item.name.text),
                        parent: table,
                        ty: Ty::default_int(),
                        init: None,
                        value: Some(stored),
                        intent: Default::default(),
                        storage: Storage::Parameter,
                        access: Default::default(),
                        presence: Default::default(),
                        dependencies: Vec::new(),
                        type_decl: None,
                        span: item.span,
                    }),
                )?;
                members.push(names::canonical(&item.name.text));
                values.push(folded);
            }
            Ok(())
        })();
        self.pop_frame();
        self.current_table = saved;

        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &def.name.text);
            return Err(abort);
        }

        let kind = classify_enum(&values);
        if let Symbol::Enum(e) = self.asr.symbol_mut(id) {
            e.members = members;
            e.kind = kind;
        }
        Ok(())
    }

    pub(super) fn union_def(&mut self, def: &ast::UnionDef) -> RResult<()> {
        let table = self.asr.new_table(Some(self.current_table));
        let id = self.declare(
            &def.name,
            Symbol::Union(Union {
                name: names::canonical(&def.name.text),
                table,
                members: Vec::new(),
                span: def.span,
            }),
        )?;
        self.asr.set_table_owner(table, id);

        let saved = mem::replace(&mut self.current_table, table);
        let mut result = Ok(());
        for member in &def.members {
            result = {
                let r = self.type_decl(member);
                self.guarded(r)
            };
            if result.is_err() {
                break;
            }
        }
        self.current_table = saved;

        if let Err(abort) = result {
            self.asr.remove_symbol(self.current_table, &def.name.text);
            return Err(abort);
        }

        let members: Vec<String> = self
            .asr
            .table(table)
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        if let Symbol::Union(u) = self.asr.symbol_mut(id) {
            u.members = members;
        }
        Ok(())
    }
}

/// Mirror of the verifier's classification: any unfoldable value is
/// non-integer, duplicates beat consecutiveness.
fn classify_enum(values: &[Option<i64>]) -> EnumKind {
    if values.iter().any(Option::is_none) {
        return EnumKind::NonInteger;
    }
    let values: Vec<i64> = values.iter().map(|v| v.expect("checked above")).collect();
    let unique: indexmap::IndexSet<i64> = values.iter().copied().collect();
    if unique.len() != values.len() {
        EnumKind::NotUnique
    } else if values.iter().enumerate().all(|(i, v)| *v == i as i64) {
        EnumKind::ConsecutiveFromZero
    } else {
        EnumKind::Unique
    }
}
