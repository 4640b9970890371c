//! ENTRY lowering.
//!
//! A procedure with entry statements becomes: one master function holding
//! the real body, whose formal list is an integer selector followed by the
//! union of every entry's formals (all optional); plus one stub per entry
//! (the original procedure included) that delegates to the master with its
//! selector value and its own formals, omitting the rest.

use indexmap::IndexSet;

use siderite_asr::{
    CallArg, DefKind, Expr, Function, FunctionType, Intent, Presence, Stmt, Symbol, SymbolId,
    TableId, Ty, Variable,
};
use siderite_core::{DiagnosticKind, Span, names};
use siderite_syntax as ast;

use super::{RResult, Resolver};

struct EntryPoint<'p> {
    ident: &'p ast::Ident,
    args: Vec<String>,
    span: Span,
}

impl Resolver<'_> {
    /// Called instead of plain body lowering when the body carries entry
    /// statements. The current table is the original procedure's.
    pub(super) fn rewrite_entries(
        &mut self,
        fn_id: SymbolId,
        parent_table: TableId,
        p: &ast::Procedure,
    ) -> RResult<()> {
        let fn_table = self.current_table;

        let mut entries = vec![EntryPoint {
            ident: &p.name,
            args: p.args.iter().map(|a| names::canonical(&a.text)).collect(),
            span: p.span,
        }];
        let mut body_stmts = Vec::new();
        for stmt in &p.body {
            match stmt {
                ast::Stmt::Entry { name, args, span } => entries.push(EntryPoint {
                    ident: name,
                    args: args.iter().map(|a| names::canonical(&a.text)).collect(),
                    span: *span,
                }),
                other => body_stmts.push(other.clone()),
            }
        }

        // Union of formals in first-appearance order.
        let mut union: IndexSet<String> = IndexSet::new();
        for entry in &entries {
            for arg in &entry.args {
                union.insert(arg.clone());
            }
        }

        let master_name = names::entry_master_name(&p.name.text);
        let master_id = self.build_master(&master_name, parent_table, fn_table, &union, &body_stmts, p.span)?;

        // Record the argument mapping: position 0 is the selector.
        for entry in &entries {
            let positions: Vec<usize> = entry
                .args
                .iter()
                .map(|arg| 1 + union.get_index_of(arg).expect("arg is in the union"))
                .collect();
            self.entry_args
                .insert(names::canonical(&entry.ident.text), positions);
        }

        // Stub bodies: the original procedure delegates with selector 1,
        // each entry with its own discriminator.
        for (index, entry) in entries.iter().enumerate() {
            let selector = (index + 1) as i64;
            if index == 0 {
                let call = self.stub_call(master_id, selector, &entry.args, &union, fn_table, entry.span);
                if let Some(frame) = self.dep_frames.last_mut() {
                    frame.names_mut().insert(master_name.clone());
                }
                if let Symbol::Function(f) = self.asr.symbol_mut(fn_id) {
                    f.body = vec![call];
                }
            } else {
                self.build_entry_stub(entry, selector, master_id, parent_table, fn_table, &union)?;
            }
        }

        Ok(())
    }

    /// The master function bound next to the original procedure.
    fn build_master(
        &mut self,
        master_name: &str,
        parent_table: TableId,
        fn_table: TableId,
        union: &IndexSet<String>,
        body: &[ast::Stmt],
        span: Span,
    ) -> RResult<SymbolId> {
        let master_table = self.asr.new_table(Some(parent_table));

        let selector = self
            .asr
            .add_symbol(
                master_table,
                names::ENTRY_SELECTOR,
                Symbol::Variable(Variable {
                    name: names::ENTRY_SELECTOR.to_string(),
                    parent: master_table,
                    ty: Ty::default_int(),
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
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;

        // Every entity of the original scope moves into the master, so the
        // body resolves unchanged; union formals become optional.
        let originals: Vec<(String, SymbolId)> = self
            .asr
            .table(fn_table)
            .iter()
            .map(|(n, s)| (n.to_string(), s))
            .collect();
        for (name, sym) in originals {
            let Symbol::Variable(v) = self.asr.symbol(sym) else {
                continue;
            };
            let mut copy = v.clone();
            copy.parent = master_table;
            if union.contains(&name) {
                copy.presence = Presence::Optional;
                if copy.intent == Intent::In {
                    copy.intent = Intent::InOut;
                }
            }
            self.asr
                .add_symbol(master_table, &name, Symbol::Variable(copy))
                .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        }

        let mut args = vec![Expr::Var {
            sym: selector,
            span,
        }];
        let mut arg_types = vec![Ty::default_int()];
        for name in union {
            let var = self
                .asr
                .get_symbol(master_table, name)
                .expect("union formals were copied above");
            if let Symbol::Variable(v) = self.asr.symbol(var) {
                arg_types.push(v.ty.clone());
            }
            args.push(Expr::Var { sym: var, span });
        }

        let master_id = self
            .asr
            .add_symbol(
                parent_table,
                master_name,
                Symbol::Function(Function {
                    name: master_name.to_string(),
                    table: master_table,
                    args,
                    body: Vec::new(),
                    return_var: None,
                    signature: FunctionType {
                        arg_types,
                        return_type: None,
                        deftype: DefKind::Implementation,
                        ..FunctionType::default()
                    },
                    dependencies: Vec::new(),
                    access: Default::default(),
                    span,
                }),
            )
            .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
        self.asr.set_table_owner(master_table, master_id);

        // The body lowers inside the master's own scope and dependency
        // record.
        let saved = std::mem::replace(&mut self.current_table, master_table);
        // The frame isolates the master's references from the stub's
        // record; the list itself is re-derived below, because the copied
        // locals carry outward references the frame never saw.
        self.push_scope_frame(master_table, master_name);
        let lowered = self.lower_stmts(body);
        self.pop_frame();
        self.current_table = saved;
        let lowered = lowered?;

        if let Symbol::Function(f) = self.asr.symbol_mut(master_id) {
            f.body = lowered;
        }
        if let Some(exact) = siderite_asr::dependencies_of(self.asr, master_id) {
            if let Symbol::Function(f) = self.asr.symbol_mut(master_id) {
                f.dependencies = exact;
            }
        }
        Ok(master_id)
    }

    fn build_entry_stub(
        &mut self,
        entry: &EntryPoint<'_>,
        selector: i64,
        master_id: SymbolId,
        parent_table: TableId,
        fn_table: TableId,
        union: &IndexSet<String>,
    ) -> RResult<()> {
        let span = entry.span;
        let stub_table = self.asr.new_table(Some(parent_table));

        let mut args = Vec::with_capacity(entry.args.len());
        let mut arg_types = Vec::with_capacity(entry.args.len());
        for arg in &entry.args {
            let ty = match self
                .asr
                .get_symbol(fn_table, arg)
                .map(|s| self.asr.symbol(s))
            {
                Some(Symbol::Variable(v)) => v.ty.clone(),
                _ => Ty::default_int(),
            };
            let var = self
                .asr
                .add_symbol(
                    stub_table,
                    arg,
                    Symbol::Variable(Variable {
                        name: arg.clone(),
                        parent: stub_table,
                        ty: ty.clone(),
                        init: None,
                        value: None,
                        intent: Intent::InOut,
                        storage: Default::default(),
                        access: Default::default(),
                        presence: Presence::Required,
                        dependencies: Vec::new(),
                        type_decl: None,
                        span,
                    }),
                )
                .map_err(|e| self.abort(DiagnosticKind::Internal, span, &e.to_string()))?;
            args.push(Expr::Var { sym: var, span });
            arg_types.push(ty);
        }

        let call = self.stub_call(master_id, selector, &entry.args, union, stub_table, span);
        let saved_table = std::mem::replace(&mut self.current_table, parent_table);
        let id = self.declare(
            entry.ident,
            Symbol::Function(Function {
                name: names::canonical(&entry.ident.text),
                table: stub_table,
                args,
                body: vec![call],
                return_var: None,
                signature: FunctionType {
                    arg_types,
                    return_type: None,
                    deftype: DefKind::Implementation,
                    ..FunctionType::default()
                },
                dependencies: Vec::new(),
                access: Default::default(),
                span,
            }),
        );
        self.current_table = saved_table;
        let id = id?;
        self.asr.set_table_owner(stub_table, id);

        if let Some(exact) = siderite_asr::dependencies_of(self.asr, id) {
            if let Symbol::Function(f) = self.asr.symbol_mut(id) {
                f.dependencies = exact;
            }
        }
        Ok(())
    }

    /// `call master(selector, present formals..., omitted...)`.
    fn stub_call(
        &mut self,
        master_id: SymbolId,
        selector: i64,
        own_args: &[String],
        union: &IndexSet<String>,
        lookup_table: TableId,
        span: Span,
    ) -> Stmt {
        let mut call_args = vec![CallArg::new(Expr::int(selector, span))];
        for name in union {
            if own_args.contains(name) {
                match self.asr.get_symbol(lookup_table, name) {
                    Some(var) => call_args.push(CallArg::new(Expr::Var { sym: var, span })),
                    None => call_args.push(CallArg::omitted()),
                }
            } else {
                call_args.push(CallArg::omitted());
            }
        }
        Stmt::SubroutineCall {
            callee: master_id,
            args: call_args,
            span,
        }
    }
}
