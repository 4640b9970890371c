//! Lowering the declaration-phase statement and expression subset.

use siderite_asr::{
    BinOp, Block, BlockKind, CallArg, CaseStmt, Expr, Intent, Presence, Stmt, Storage, Symbol,
    SymbolId, Ty, Variable,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::{RResult, Resolver};

impl Resolver<'_> {
    pub(crate) fn lower_stmts(&mut self, stmts: &[ast::Stmt]) -> RResult<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.lower_stmt(stmt) {
                Ok(Some(lowered)) => out.push(lowered),
                Ok(None) => {}
                Err(abort) => {
                    // The failing statement is dropped either way; whether
                    // the scope survives is the config's call.
                    if !self.config.continue_on_error {
                        return Err(abort);
                    }
                }
            }
        }
        Ok(out)
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) -> RResult<Option<Stmt>> {
        match stmt {
            ast::Stmt::Assignment {
                target,
                value,
                span,
            } => self.lower_assignment(target, value, *span).map(Some),
            ast::Stmt::Call { name, args, span } => {
                self.lower_subroutine_call(name, args, *span).map(Some)
            }
            ast::Stmt::Select {
                selector,
                cases,
                default,
                span,
            } => self.lower_select(selector, cases, default, *span).map(Some),
            ast::Stmt::Return { span } => Ok(Some(Stmt::Return { span: *span })),
            ast::Stmt::Entry { span, .. } => {
                // Entry statements are consumed by the rewrite before body
                // lowering; reaching one here means the scope cannot hold
                // entries at all.
                Err(self.abort(
                    DiagnosticKind::Internal,
                    *span,
                    "entry statement outside a procedure",
                ))
            }
            ast::Stmt::Block { decls, body, span } => self
                .lower_block(BlockKind::Plain, decls, &[], body, *span)
                .map(Some),
            ast::Stmt::Associate {
                bindings,
                body,
                span,
            } => self
                .lower_block(BlockKind::Associate, &[], bindings, body, *span)
                .map(Some),
            ast::Stmt::ExprStmt { expr, span } => {
                let expr = self.lower_expr(expr)?;
                Ok(Some(Stmt::ExprStmt { expr, span: *span }))
            }
        }
    }

    fn lower_assignment(
        &mut self,
        target: &ast::Expr,
        value: &ast::Expr,
        span: Span,
    ) -> RResult<Stmt> {
        let target = self.lower_expr(target)?;
        let value = self.lower_expr(value)?;

        match &target {
            Expr::Var { sym, .. } => {
                let resolved = self.asr.get_past_external(*sym);
                let (name, intent, storage, has_init) = match self.asr.symbol(resolved) {
                    Symbol::Variable(v) => {
                        (v.name.clone(), v.intent, v.storage, v.init.is_some())
                    }
                    other => {
                        let kind = other.kind_name();
                        return Err(self.abort(
                            DiagnosticKind::IntentViolation,
                            span,
                            &format!("assignment to a {kind}"),
                        ));
                    }
                };
                if intent == Intent::In {
                    return Err(self.abort(
                        DiagnosticKind::IntentViolation,
                        span,
                        &format!("assignment to intent(in) argument `{name}`"),
                    ));
                }
                if storage == Storage::Parameter && has_init {
                    return Err(self.abort(
                        DiagnosticKind::IntentViolation,
                        span,
                        &format!("parameter `{name}` cannot be re-assigned"),
                    ));
                }
            }
            Expr::StructMemberRef { .. } => {}
            _ => {
                return Err(self.abort(
                    DiagnosticKind::IntentViolation,
                    span,
                    "assignment target is not assignable",
                ));
            }
        }

        let realloc_lhs = target.ty(self.asr).is_allocatable();
        Ok(Stmt::Assignment {
            target,
            value,
            realloc_lhs,
            span,
        })
    }

    fn lower_subroutine_call(
        &mut self,
        name: &ast::Ident,
        args: &[ast::CallArg],
        span: Span,
    ) -> RResult<Stmt> {
        let callee = self.resolve_callee(name, args.len())?;
        let args = self.lower_call_args(args)?;
        self.check_call_arity(callee, &args, span)?;
        self.record_ref(callee);
        Ok(Stmt::SubroutineCall { callee, args, span })
    }

    fn lower_select(
        &mut self,
        selector: &ast::Expr,
        cases: &[ast::Case],
        default: &[ast::Stmt],
        span: Span,
    ) -> RResult<Stmt> {
        let selector = self.lower_expr(selector)?;
        let mut lowered_cases = Vec::with_capacity(cases.len());
        let mut any_fall_through = false;
        for case in cases {
            let mut values = Vec::with_capacity(case.values.len());
            for value in &case.values {
                values.push(self.lower_expr(value)?);
            }
            let body = self.lower_stmts(&case.body)?;
            any_fall_through |= case.fall_through;
            lowered_cases.push(CaseStmt {
                values,
                body,
                fall_through: case.fall_through,
                span: case.span,
            });
        }
        let default = self.lower_stmts(default)?;
        Ok(Stmt::Select {
            selector,
            cases: lowered_cases,
            default,
            enable_fall_through: any_fall_through,
            span,
        })
    }

    fn lower_block(
        &mut self,
        kind: BlockKind,
        decls: &[ast::Decl],
        bindings: &[(ast::Ident, ast::Expr)],
        body: &[ast::Stmt],
        span: Span,
    ) -> RResult<Stmt> {
        self.block_counter += 1;
        let key = format!("block@{}", self.block_counter);
        let table = self.asr.new_table(Some(self.current_table));
        let id = self.declare_mangled(
            &key,
            Symbol::Block(Block {
                name: key.clone(),
                kind,
                table,
                body: Vec::new(),
                span,
            }),
            span,
            false,
        )?;
        self.asr.set_table_owner(table, id);

        let saved = std::mem::replace(&mut self.current_table, table);
        let result = (|| -> RResult<Vec<Stmt>> {
            for (name, expr) in bindings {
                self.push_entity_frame(&name.text);
                let lowered = self.lower_expr(expr);
                let deps = self.pop_frame();
                let init = lowered?;
                let ty = init.ty(self.asr);
                self.declare(
                    name,
                    Symbol::Variable(Variable {
                        name: names::canonical(&name.text),
                        parent: table,
                        ty,
                        init: Some(init),
                        value: None,
                        intent: Intent::Local,
                        storage: Storage::Default,
                        access: Default::default(),
                        presence: Presence::Required,
                        dependencies: deps.clone(),
                        type_decl: None,
                        span: name.span,
                    }),
                )?;
                self.propagate_variable_deps(&deps);
            }
            self.uses_then_decls(decls)?;
            self.lower_stmts(body)
        })();
        self.current_table = saved;

        let body = result?;
        if let Symbol::Block(b) = self.asr.symbol_mut(id) {
            b.body = body;
        }
        Ok(Stmt::BlockCall { block: id, span })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub(crate) fn lower_expr(&mut self, expr: &ast::Expr) -> RResult<Expr> {
        match expr {
            ast::Expr::IntLiteral { value, span } => Ok(Expr::int(*value, *span)),
            ast::Expr::RealLiteral { value, span } => Ok(Expr::RealConstant {
                value: *value,
                ty: Ty::default_real(),
                span: *span,
            }),
            ast::Expr::LogicalLiteral { value, span } => Ok(Expr::LogicalConstant {
                value: *value,
                ty: Ty::default_logical(),
                span: *span,
            }),
            ast::Expr::StringLiteral { value, span } => Ok(Expr::StringConstant {
                value: value.clone(),
                ty: Ty::Character {
                    len: siderite_asr::StringLength::Expression(Box::new(Expr::int(
                        value.len() as i64,
                        *span,
                    ))),
                    kind: 1,
                    physical: siderite_asr::StringPhysical::Descriptor,
                },
                span: *span,
            }),
            ast::Expr::Name(ident) => {
                let sym = self.resolve_name(ident)?;
                self.record_ref(sym);
                Ok(Expr::Var {
                    sym,
                    span: ident.span,
                })
            }
            ast::Expr::Bin {
                op,
                left,
                right,
                span,
            } => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                let op = bin_op(*op);
                let ty = match op {
                    BinOp::Eq
                    | BinOp::NotEq
                    | BinOp::Lt
                    | BinOp::LtE
                    | BinOp::Gt
                    | BinOp::GtE => Ty::default_logical(),
                    _ => left.ty(self.asr),
                };
                Ok(Expr::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                    span: *span,
                })
            }
            ast::Expr::Call { callee, args, span } => {
                let target = self.resolve_callee(callee, args.len())?;
                let args = self.lower_call_args(args)?;
                self.check_call_arity(target, &args, *span)?;
                self.record_ref(target);
                let ty = self.callee_return_type(target);
                Ok(Expr::FunctionCall {
                    callee: target,
                    args,
                    ty,
                    span: *span,
                })
            }
            ast::Expr::Member { base, name, span } => {
                let base = self.lower_expr(base)?;
                let member = self.struct_member(&base, name)?;
                let ty = match self.asr.symbol(member) {
                    Symbol::Variable(v) => v.ty.clone(),
                    _ => Ty::default_int(),
                };
                self.record_ref(member);
                Ok(Expr::StructMemberRef {
                    base: Box::new(base),
                    member,
                    ty,
                    span: *span,
                })
            }
            ast::Expr::MethodCall {
                base,
                name,
                args,
                span,
            } => {
                let base = self.lower_expr(base)?;
                let method = self.struct_member(&base, name)?;
                let Symbol::StructMethod(m) = self.asr.symbol(method) else {
                    return Err(self.abort(
                        DiagnosticKind::TypeShape,
                        name.span,
                        &format!("`{}` is not a type-bound procedure", name.text),
                    ));
                };
                let nopass = m.nopass;
                let proc = m.proc;
                self.record_ref(method);

                let mut lowered = Vec::with_capacity(args.len() + 1);
                if !nopass {
                    lowered.push(CallArg::new(base.clone()));
                }
                lowered.extend(self.lower_call_args(args)?);
                self.check_call_arity(method, &lowered, *span)?;

                let ty = proc
                    .map(|p| self.callee_return_type(p))
                    .unwrap_or_else(Ty::default_int);
                Ok(Expr::FunctionCall {
                    callee: method,
                    args: lowered,
                    ty,
                    span: *span,
                })
            }
        }
    }

    pub(crate) fn lower_call_args(&mut self, args: &[ast::CallArg]) -> RResult<Vec<CallArg>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.lower_expr(&arg.value)?;
            out.push(CallArg::new(value));
        }
        Ok(out)
    }

    /// Resolve a bare name, creating an implicit variable when the
    /// dictionary covers it.
    pub(crate) fn resolve_name(&mut self, ident: &ast::Ident) -> RResult<SymbolId> {
        let key = names::canonical(&ident.text);
        if let Some(sym) = self.asr.resolve_symbol(self.current_table, &key) {
            return Ok(sym);
        }
        self.implicit_variable(ident, Intent::Local)
    }

    /// Resolve a call target; generic procedures select a constituent by
    /// argument count.
    pub(crate) fn resolve_callee(
        &mut self,
        name: &ast::Ident,
        provided: usize,
    ) -> RResult<SymbolId> {
        let key = names::canonical(&name.text);
        let Some(sym) = self.asr.resolve_symbol(self.current_table, &key) else {
            return Err(self.abort(DiagnosticKind::UnresolvedSymbol, name.span, &key));
        };
        let resolved = self.asr.get_past_external(sym);
        match self.asr.symbol(resolved) {
            Symbol::GenericProcedure(g) => {
                let candidates = g.procs.clone();
                for candidate in candidates {
                    if self.arity_compatible(candidate, provided) {
                        return Ok(candidate);
                    }
                }
                Err(self.abort(
                    DiagnosticKind::ArityMismatch,
                    name.span,
                    &format!("no candidate of `{key}` takes {provided} arguments"),
                ))
            }
            Symbol::Function(_) | Symbol::StructMethod(_) => Ok(sym),
            Symbol::Variable(v) if matches!(v.ty.peeled(), Ty::FunctionType(_)) => Ok(sym),
            other => {
                let kind = other.kind_name();
                Err(self.abort(
                    DiagnosticKind::TypeShape,
                    name.span,
                    &format!("`{key}` is a {kind}, not a callable"),
                ))
            }
        }
    }

    fn arity_compatible(&self, candidate: SymbolId, provided: usize) -> bool {
        let resolved = self.asr.get_past_external(candidate);
        match self.asr.symbol(resolved) {
            Symbol::Function(f) => {
                let required = self.required_count(f);
                provided >= required && provided <= f.args.len()
            }
            _ => false,
        }
    }

    fn required_count(&self, f: &siderite_asr::Function) -> usize {
        f.args
            .iter()
            .filter(|arg| match arg {
                Expr::Var { sym, .. } => match self.asr.symbol(*sym) {
                    Symbol::Variable(v) => v.presence == Presence::Required,
                    _ => true,
                },
                _ => true,
            })
            .count()
    }

    /// Provided-argument count against the final formal list. Targets
    /// whose headers are still pending defer to the verifier.
    pub(crate) fn check_call_arity(
        &mut self,
        callee: SymbolId,
        args: &[CallArg],
        span: Span,
    ) -> RResult<()> {
        let resolved = self.asr.get_past_external(callee);
        if self.pending_headers.contains(&resolved) {
            return Ok(());
        }
        let function = match self.asr.symbol(resolved) {
            Symbol::Function(_) => resolved,
            Symbol::StructMethod(m) => match m.proc {
                Some(proc) => self.asr.get_past_external(proc),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
        if self.pending_headers.contains(&function) {
            return Ok(());
        }
        let Symbol::Function(f) = self.asr.symbol(function) else {
            return Ok(());
        };
        let required = self.required_count(f);
        let total = f.args.len();
        let name = f.name.clone();
        let provided = args.iter().filter(|a| a.value.is_some()).count();
        if provided < required || args.len() > total {
            return Err(self.abort(
                DiagnosticKind::ArityMismatch,
                span,
                &format!(
                    "`{name}` expects {required}..={total} arguments, got {provided}"
                ),
            ));
        }
        Ok(())
    }

    fn callee_return_type(&self, callee: SymbolId) -> Ty {
        let resolved = self.asr.get_past_external(callee);
        match self.asr.symbol(resolved) {
            Symbol::Function(f) => f
                .signature
                .return_type
                .clone()
                .unwrap_or_else(Ty::default_int),
            Symbol::StructMethod(m) => m
                .proc
                .map(|p| self.callee_return_type(p))
                .unwrap_or_else(Ty::default_int),
            Symbol::Variable(v) => match v.ty.peeled() {
                Ty::FunctionType(sig) => {
                    sig.return_type.clone().unwrap_or_else(Ty::default_int)
                }
                _ => Ty::default_int(),
            },
            _ => Ty::default_int(),
        }
    }

    /// Find a member or type-bound procedure through the base's struct
    /// chain.
    pub(crate) fn struct_member(
        &mut self,
        base: &Expr,
        name: &ast::Ident,
    ) -> RResult<SymbolId> {
        let base_ty = base.ty(self.asr);
        let Some(decl) = base_ty.struct_decl() else {
            return Err(self.abort(
                DiagnosticKind::TypeShape,
                name.span,
                &format!("`%{}` on a non-derived value", name.text),
            ));
        };
        let key = names::canonical(&name.text);
        let mut current = Some(self.asr.get_past_external(decl));
        while let Some(id) = current {
            let Symbol::Struct(s) = self.asr.symbol(id) else {
                break;
            };
            if let Some(found) = self.asr.table(s.table).get(&key) {
                return Ok(found);
            }
            current = s.parent.map(|p| self.asr.get_past_external(p));
        }
        Err(self.abort(DiagnosticKind::UnresolvedSymbol, name.span, &key))
    }
}

pub(super) fn bin_op(op: ast::OpTag) -> BinOp {
    match op {
        ast::OpTag::Add => BinOp::Add,
        ast::OpTag::Sub => BinOp::Sub,
        ast::OpTag::Mul => BinOp::Mul,
        ast::OpTag::Div => BinOp::Div,
        ast::OpTag::Eq => BinOp::Eq,
        ast::OpTag::NotEq => BinOp::NotEq,
        ast::OpTag::Lt => BinOp::Lt,
        ast::OpTag::LtE => BinOp::LtE,
        ast::OpTag::Gt => BinOp::Gt,
        ast::OpTag::GtE => BinOp::GtE,
    }
}
