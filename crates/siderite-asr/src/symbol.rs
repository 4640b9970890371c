//! The tagged symbol variants.

use siderite_core::Span;

use crate::arena::{SymbolId, TableId};
use crate::expr::{Expr, Stmt};
use crate::ty::{FunctionType, Ty};

/// Visibility of a symbol outside its defining scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Private,
}

/// How a dummy argument relates to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    In,
    Out,
    InOut,
    /// An ordinary local entity.
    #[default]
    Local,
    /// The function result variable.
    ReturnVar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    Default,
    /// A named constant. Assigned at most once; the first assignment is the
    /// initializer.
    Parameter,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    #[default]
    Required,
    Optional,
}

/// Classification of an enum's member values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    ConsecutiveFromZero,
    NotUnique,
    Unique,
    NonInteger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    Associate,
}

/// A symbol node. Every value of this type is owned by exactly one arena
/// slot and bound in at most one table; references between symbols are
/// always [`SymbolId`] lookups, never ownership.
#[derive(Debug, Clone)]
pub enum Symbol {
    TranslationUnit(TranslationUnit),
    Program(Program),
    Module(Module),
    Function(Function),
    Variable(Variable),
    Struct(Struct),
    Enum(Enum),
    Union(Union),
    GenericProcedure(GenericProcedure),
    CustomOperator(CustomOperator),
    StructMethod(StructMethod),
    External(External),
    Block(Block),
    Requirement(Requirement),
    Template(Template),
}

#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub table: TableId,
    /// Top-level items in source order.
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub table: TableId,
    pub body: Vec<Stmt>,
    pub dependencies: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub table: TableId,
    pub dependencies: Vec<String>,
    /// Set on submodules: the module this one extends.
    pub parent_module: Option<String>,
    pub has_submodules: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub table: TableId,
    /// Dummy arguments as `Expr::Var` references into the own table.
    pub args: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub return_var: Option<SymbolId>,
    pub signature: FunctionType,
    pub dependencies: Vec<String>,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub parent: TableId,
    pub ty: Ty,
    /// The symbolic initializer, as written.
    pub init: Option<Expr>,
    /// The evaluated value, when constant folding succeeded.
    pub value: Option<Expr>,
    pub intent: Intent,
    pub storage: Storage,
    pub access: Access,
    pub presence: Presence,
    pub dependencies: Vec<String>,
    /// The Struct/Enum/Union declaration behind a derived-typed variable.
    pub type_decl: Option<SymbolId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub table: TableId,
    /// Member names in declaration order.
    pub members: Vec<String>,
    /// Single-inheritance parent.
    pub parent: Option<SymbolId>,
    pub dependencies: Vec<String>,
    /// Must const-evaluate to a positive power of two.
    pub alignment: Option<Expr>,
    pub is_abstract: bool,
    pub is_c_struct: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub table: TableId,
    /// The underlying integer type.
    pub base: Ty,
    pub members: Vec<String>,
    pub kind: EnumKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Union {
    pub name: String,
    pub table: TableId,
    pub members: Vec<String>,
    pub span: Span,
}

/// An overload set of functions aggregated under one name.
#[derive(Debug, Clone)]
pub struct GenericProcedure {
    pub name: String,
    pub parent: TableId,
    pub procs: Vec<SymbolId>,
    pub access: Access,
    pub span: Span,
}

/// An overload set for an operator, intrinsic (`~add`) or user-defined
/// (`~~cross~~`).
#[derive(Debug, Clone)]
pub struct CustomOperator {
    pub name: String,
    pub parent: TableId,
    pub procs: Vec<SymbolId>,
    pub access: Access,
    pub span: Span,
}

/// A type-bound procedure binding inside a struct's table.
#[derive(Debug, Clone)]
pub struct StructMethod {
    pub name: String,
    pub parent: TableId,
    /// The bound procedure. Unset only on deferred bindings.
    pub proc: Option<SymbolId>,
    pub proc_name: String,
    /// Explicit pass-object argument name; the first formal passes by
    /// default.
    pub self_arg: Option<String>,
    pub is_deferred: bool,
    pub nopass: bool,
    pub span: Span,
}

/// A local handle for a symbol owned by another table. At most one hop:
/// the target is never itself external.
#[derive(Debug, Clone)]
pub struct External {
    pub name: String,
    pub parent: TableId,
    /// Unset while pre-link.
    pub target: Option<SymbolId>,
    /// Name of the module (or struct/enum/union/function) that owns the
    /// target.
    pub module_name: String,
    pub original_name: String,
    /// Intermediate scopes between the owning module and the target.
    pub scope_path: Vec<String>,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub kind: BlockKind,
    pub table: TableId,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// One `require :: r(args)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Require {
    pub requirement: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub table: TableId,
    pub params: Vec<String>,
    pub requires: Vec<Require>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub table: TableId,
    pub params: Vec<String>,
    pub requires: Vec<Require>,
    pub span: Span,
}

impl Symbol {
    /// The symbol's declared name. Only the translation unit is unnamed.
    pub fn name(&self) -> Option<&str> {
        match self {
            Symbol::TranslationUnit(_) => None,
            Symbol::Program(s) => Some(&s.name),
            Symbol::Module(s) => Some(&s.name),
            Symbol::Function(s) => Some(&s.name),
            Symbol::Variable(s) => Some(&s.name),
            Symbol::Struct(s) => Some(&s.name),
            Symbol::Enum(s) => Some(&s.name),
            Symbol::Union(s) => Some(&s.name),
            Symbol::GenericProcedure(s) => Some(&s.name),
            Symbol::CustomOperator(s) => Some(&s.name),
            Symbol::StructMethod(s) => Some(&s.name),
            Symbol::External(s) => Some(&s.name),
            Symbol::Block(s) => Some(&s.name),
            Symbol::Requirement(s) => Some(&s.name),
            Symbol::Template(s) => Some(&s.name),
        }
    }

    /// The table this symbol owns, when it owns one.
    pub fn symtab(&self) -> Option<TableId> {
        match self {
            Symbol::TranslationUnit(s) => Some(s.table),
            Symbol::Program(s) => Some(s.table),
            Symbol::Module(s) => Some(s.table),
            Symbol::Function(s) => Some(s.table),
            Symbol::Struct(s) => Some(s.table),
            Symbol::Enum(s) => Some(s.table),
            Symbol::Union(s) => Some(s.table),
            Symbol::Block(s) => Some(s.table),
            Symbol::Requirement(s) => Some(s.table),
            Symbol::Template(s) => Some(s.table),
            Symbol::Variable(_)
            | Symbol::GenericProcedure(_)
            | Symbol::CustomOperator(_)
            | Symbol::StructMethod(_)
            | Symbol::External(_) => None,
        }
    }

    /// The stored dependency list, for the kinds that carry one.
    pub fn dependencies(&self) -> Option<&[String]> {
        match self {
            Symbol::Module(s) => Some(&s.dependencies),
            Symbol::Function(s) => Some(&s.dependencies),
            Symbol::Variable(s) => Some(&s.dependencies),
            Symbol::Struct(s) => Some(&s.dependencies),
            _ => None,
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Symbol::Function(s) => s.access,
            Symbol::Variable(s) => s.access,
            Symbol::GenericProcedure(s) => s.access,
            Symbol::CustomOperator(s) => s.access,
            Symbol::External(s) => s.access,
            _ => Access::Public,
        }
    }

    /// Lowercase noun for dumps and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Symbol::TranslationUnit(_) => "translation_unit",
            Symbol::Program(_) => "program",
            Symbol::Module(_) => "module",
            Symbol::Function(_) => "function",
            Symbol::Variable(_) => "variable",
            Symbol::Struct(_) => "struct",
            Symbol::Enum(_) => "enum",
            Symbol::Union(_) => "union",
            Symbol::GenericProcedure(_) => "generic",
            Symbol::CustomOperator(_) => "operator",
            Symbol::StructMethod(_) => "method",
            Symbol::External(_) => "external",
            Symbol::Block(_) => "block",
            Symbol::Requirement(_) => "requirement",
            Symbol::Template(_) => "template",
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Symbol::TranslationUnit(_) => None,
            Symbol::Program(s) => Some(s.span),
            Symbol::Module(s) => Some(s.span),
            Symbol::Function(s) => Some(s.span),
            Symbol::Variable(s) => Some(s.span),
            Symbol::Struct(s) => Some(s.span),
            Symbol::Enum(s) => Some(s.span),
            Symbol::Union(s) => Some(s.span),
            Symbol::GenericProcedure(s) => Some(s.span),
            Symbol::CustomOperator(s) => Some(s.span),
            Symbol::StructMethod(s) => Some(s.span),
            Symbol::External(s) => Some(s.span),
            Symbol::Block(s) => Some(s.span),
            Symbol::Requirement(s) => Some(s.span),
            Symbol::Template(s) => Some(s.span),
        }
    }
}
