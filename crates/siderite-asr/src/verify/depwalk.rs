//! Independent dependency accumulation.
//!
//! The verifier re-derives every entity's dependency set from its structure
//! and compares it with the stored list. The rules mirror what the resolver
//! records during resolution:
//!
//! - self-references never count;
//! - references bound in the entity's own table never count;
//! - a function picks up the outward references of its local variables;
//! - a module's dependencies are module *names*: the origin modules of
//!   every external symbol in its subtree, plus its parent module.

use indexmap::IndexSet;

use crate::arena::{Asr, SymbolId, TableId};
use crate::expr::{CallArg, Expr, Stmt};
use crate::symbol::{Function, Module, Struct, Symbol, Variable};
use crate::ty::{StringLength, Ty};

/// The dependency set for an entity that carries one; `None` for kinds that
/// do not.
pub fn entity_dependencies(asr: &Asr, id: SymbolId) -> Option<IndexSet<String>> {
    match asr.symbol(id) {
        Symbol::Function(f) => Some(function_deps(asr, f)),
        Symbol::Module(m) => Some(module_deps(asr, m)),
        Symbol::Struct(s) => Some(struct_deps(asr, s)),
        Symbol::Variable(v) => Some(variable_deps(asr, v)),
        _ => None,
    }
}

pub fn variable_deps(asr: &Asr, v: &Variable) -> IndexSet<String> {
    let mut names = IndexSet::new();
    ty_names(asr, &v.ty, &mut names);
    if let Some(init) = &v.init {
        expr_names(asr, init, &mut names);
    }
    names.shift_remove(&v.name);
    names
}

pub fn function_deps(asr: &Asr, f: &Function) -> IndexSet<String> {
    let mut out = IndexSet::new();
    let table = f.table;

    // Outward references of the locals, arguments included: a local whose
    // type or initializer mentions an outer name makes the function depend
    // on that name.
    for (_, sym) in asr.table(table).iter() {
        if let Symbol::Variable(v) = asr.symbol(sym) {
            for name in variable_deps(asr, v) {
                if !resolves_locally(asr, table, &name) {
                    out.insert(name);
                }
            }
        }
    }

    let mut walker = BodyWalker {
        asr,
        home: table,
        scope: vec![table],
        out: &mut out,
    };
    for stmt in &f.body {
        walker.stmt(stmt);
    }

    out.shift_remove(&f.name);
    out
}

pub fn module_deps(asr: &Asr, m: &Module) -> IndexSet<String> {
    let mut out = IndexSet::new();
    if let Some(parent) = &m.parent_module {
        out.insert(parent.clone());
    }
    collect_external_origins(asr, m.table, &mut out);
    out.shift_remove(&m.name);
    out
}

pub fn struct_deps(asr: &Asr, s: &Struct) -> IndexSet<String> {
    let mut out = IndexSet::new();
    if let Some(parent) = s.parent {
        if let Some(name) = asr.symbol(parent).name() {
            out.insert(name.to_string());
        }
    }
    for (_, sym) in asr.table(s.table).iter() {
        if let Symbol::Variable(v) = asr.symbol(sym) {
            for name in variable_deps(asr, v) {
                if !resolves_locally(asr, s.table, &name) {
                    out.insert(name);
                }
            }
        }
    }
    if let Some(alignment) = &s.alignment {
        let mut names = IndexSet::new();
        expr_names(asr, alignment, &mut names);
        for name in names {
            if !resolves_locally(asr, s.table, &name) {
                out.insert(name);
            }
        }
    }
    out.shift_remove(&s.name);
    out
}

/// Whether `name` binds inside `table` itself (as opposed to an ancestor).
fn resolves_locally(asr: &Asr, table: TableId, name: &str) -> bool {
    asr.table(table).get(name).is_some()
}

fn collect_external_origins(asr: &Asr, table: TableId, out: &mut IndexSet<String>) {
    for (_, sym) in asr.table(table).iter() {
        match asr.symbol(sym) {
            Symbol::External(e) => {
                out.insert(e.module_name.clone());
            }
            other => {
                if let Some(nested) = other.symtab() {
                    collect_external_origins(asr, nested, out);
                }
            }
        }
    }
}

/// Names mentioned by a type: bound expressions, length expressions, and
/// the declarations behind derived types.
fn ty_names(asr: &Asr, ty: &Ty, out: &mut IndexSet<String>) {
    match ty {
        Ty::Array { elem, dims, .. } => {
            for dim in dims {
                if let Some(e) = &dim.lower {
                    expr_names(asr, e, out);
                }
                if let Some(e) = &dim.length {
                    expr_names(asr, e, out);
                }
            }
            ty_names(asr, elem, out);
        }
        Ty::Pointer { elem } | Ty::Allocatable { elem } => ty_names(asr, elem, out),
        Ty::Character { len, .. } => {
            if let StringLength::Expression(e) = len {
                expr_names(asr, e, out);
            }
        }
        Ty::StructType { decl, .. } | Ty::EnumType { decl } | Ty::UnionType { decl } => {
            if let Some(name) = asr.symbol(*decl).name() {
                out.insert(name.to_string());
            }
        }
        Ty::FunctionType(sig) => {
            for arg in &sig.arg_types {
                ty_names(asr, arg, out);
            }
            if let Some(ret) = &sig.return_type {
                ty_names(asr, ret, out);
            }
        }
        Ty::Integer { .. }
        | Ty::Real { .. }
        | Ty::Complex { .. }
        | Ty::Logical { .. }
        | Ty::TypeParameter { .. } => {}
    }
}

fn expr_names(asr: &Asr, expr: &Expr, out: &mut IndexSet<String>) {
    match expr {
        Expr::Var { sym, .. } => {
            if let Some(name) = asr.symbol(*sym).name() {
                out.insert(name.to_string());
            }
        }
        Expr::FunctionCall { callee, args, .. } => {
            if let Some(name) = asr.symbol(*callee).name() {
                out.insert(name.to_string());
            }
            arg_names(asr, args, out);
        }
        Expr::BinaryOp { left, right, .. } => {
            expr_names(asr, left, out);
            expr_names(asr, right, out);
        }
        Expr::StringPhysicalCast { arg, .. } => expr_names(asr, arg, out),
        Expr::StructMemberRef { base, member, .. } => {
            expr_names(asr, base, out);
            if let Some(name) = asr.symbol(*member).name() {
                out.insert(name.to_string());
            }
        }
        Expr::IntConstant { .. }
        | Expr::RealConstant { .. }
        | Expr::LogicalConstant { .. }
        | Expr::StringConstant { .. } => {}
    }
}

fn arg_names(asr: &Asr, args: &[CallArg], out: &mut IndexSet<String>) {
    for arg in args {
        if let Some(value) = &arg.value {
            expr_names(asr, value, out);
        }
    }
}

/// Walks a function body recording every reference that is not local to the
/// walked scope chain (the function's table plus any nested blocks).
struct BodyWalker<'a> {
    asr: &'a Asr,
    home: TableId,
    scope: Vec<TableId>,
    out: &'a mut IndexSet<String>,
}

impl BodyWalker<'_> {
    fn is_local(&self, sym: SymbolId) -> bool {
        let Some(binding) = self.asr.binding_table_of(sym) else {
            return true;
        };
        self.scope.contains(&binding) || binding == self.home
    }

    fn record(&mut self, sym: SymbolId) {
        if self.is_local(sym) {
            return;
        }
        if let Some(name) = self.asr.symbol(sym).name() {
            self.out.insert(name.to_string());
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assignment { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            Stmt::SubroutineCall { callee, args, .. } => {
                self.record(*callee);
                self.args(args);
            }
            Stmt::Select {
                selector,
                cases,
                default,
                ..
            } => {
                self.expr(selector);
                for case in cases {
                    for value in &case.values {
                        self.expr(value);
                    }
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                }
                for stmt in default {
                    self.stmt(stmt);
                }
            }
            Stmt::Return { .. } => {}
            Stmt::BlockCall { block, .. } => {
                let asr = self.asr;
                if let Symbol::Block(b) = asr.symbol(*block) {
                    self.scope.push(b.table);
                    // Locals of the block feed outward references the same
                    // way function locals do.
                    for (_, sym) in asr.table(b.table).iter() {
                        if let Symbol::Variable(v) = asr.symbol(sym) {
                            for name in variable_deps(asr, v) {
                                if asr
                                    .resolve_symbol(b.table, &name)
                                    .map(|s| !self.is_local(s))
                                    .unwrap_or(true)
                                {
                                    self.out.insert(name);
                                }
                            }
                        }
                    }
                    for stmt in &b.body {
                        self.stmt(stmt);
                    }
                    self.scope.pop();
                }
            }
            Stmt::ExprStmt { expr, .. } => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var { sym, .. } => self.record(*sym),
            Expr::FunctionCall { callee, args, .. } => {
                self.record(*callee);
                self.args(args);
            }
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::StringPhysicalCast { arg, .. } => self.expr(arg),
            Expr::StructMemberRef { base, member, .. } => {
                self.expr(base);
                self.record(*member);
            }
            Expr::IntConstant { .. }
            | Expr::RealConstant { .. }
            | Expr::LogicalConstant { .. }
            | Expr::StringConstant { .. } => {}
        }
    }

    fn args(&mut self, args: &[CallArg]) {
        for arg in args {
            if let Some(value) = &arg.value {
                self.expr(value);
            }
        }
    }
}
