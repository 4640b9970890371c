//! Builders for hand-assembled trees in tests.

use siderite_core::Span;

use crate::arena::{Asr, SymbolId, TableId};
use crate::expr::Expr;
use crate::symbol::{
    Function, Intent, Module, Program, Symbol, TranslationUnit, Variable,
};
use crate::ty::{FunctionType, Ty};

pub fn span() -> Span {
    Span::default()
}

/// A fresh arena holding an empty translation unit.
pub fn new_unit(asr: &mut Asr) -> SymbolId {
    let table = asr.new_table(None);
    let id = asr.alloc(Symbol::TranslationUnit(TranslationUnit {
        table,
        items: Vec::new(),
    }));
    asr.set_table_owner(table, id);
    id
}

pub fn unit_table(asr: &Asr, unit: SymbolId) -> TableId {
    asr.symbol(unit).symtab().expect("translation unit owns a table")
}

pub fn add_module(asr: &mut Asr, unit: SymbolId, name: &str) -> SymbolId {
    let parent = unit_table(asr, unit);
    let table = asr.new_table(Some(parent));
    let id = asr
        .add_symbol(
            parent,
            name,
            Symbol::Module(Module {
                name: name.to_string(),
                table,
                dependencies: Vec::new(),
                parent_module: None,
                has_submodules: false,
                span: span(),
            }),
        )
        .expect("fresh module name");
    asr.set_table_owner(table, id);
    id
}

pub fn add_program(asr: &mut Asr, unit: SymbolId, name: &str) -> SymbolId {
    let parent = unit_table(asr, unit);
    let table = asr.new_table(Some(parent));
    let id = asr
        .add_symbol(
            parent,
            name,
            Symbol::Program(Program {
                name: name.to_string(),
                table,
                body: Vec::new(),
                dependencies: Vec::new(),
                span: span(),
            }),
        )
        .expect("fresh program name");
    asr.set_table_owner(table, id);
    id
}

pub fn add_variable(asr: &mut Asr, table: TableId, name: &str, ty: Ty) -> SymbolId {
    asr.add_symbol(
        table,
        name,
        Symbol::Variable(Variable {
            name: name.to_string(),
            parent: table,
            ty,
            init: None,
            value: None,
            intent: Intent::Local,
            storage: Default::default(),
            access: Default::default(),
            presence: Default::default(),
            dependencies: Vec::new(),
            type_decl: None,
            span: span(),
        }),
    )
    .expect("fresh variable name")
}

/// A function whose arguments all have the given type and `intent(in)`.
pub fn add_function(
    asr: &mut Asr,
    parent: TableId,
    name: &str,
    arg_names: &[&str],
    arg_ty: Ty,
    return_ty: Option<Ty>,
) -> SymbolId {
    let table = asr.new_table(Some(parent));

    let mut args = Vec::new();
    for arg_name in arg_names {
        let var = add_variable(asr, table, arg_name, arg_ty.clone());
        if let Symbol::Variable(v) = asr.symbol_mut(var) {
            v.intent = Intent::In;
        }
        args.push(Expr::Var {
            sym: var,
            span: span(),
        });
    }

    let return_var = return_ty.as_ref().map(|ty| {
        let var = add_variable(asr, table, &format!("{name}_result"), ty.clone());
        if let Symbol::Variable(v) = asr.symbol_mut(var) {
            v.intent = Intent::ReturnVar;
        }
        var
    });

    let signature = FunctionType {
        arg_types: vec![arg_ty; arg_names.len()],
        return_type: return_ty,
        ..FunctionType::default()
    };

    let id = asr
        .add_symbol(
            parent,
            name,
            Symbol::Function(Function {
                name: name.to_string(),
                table,
                args,
                body: Vec::new(),
                return_var,
                signature,
                dependencies: Vec::new(),
                access: Default::default(),
                span: span(),
            }),
        )
        .expect("fresh function name");
    asr.set_table_owner(table, id);
    id
}
