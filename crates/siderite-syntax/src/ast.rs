//! Program-structure nodes: translation units, scoping units, declarations.

use siderite_core::Span;

use crate::expr::{Expr, Stmt};

/// A raw identifier as spelled in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub text: String,
    pub span: Span,
}

impl Ident {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub items: Vec<Item>,
    pub span: Span,
}

/// Top-level program units, in source order.
#[derive(Debug, Clone)]
pub enum Item {
    Module(Module),
    Submodule(Submodule),
    Program(Program),
    Procedure(Procedure),
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub contains: Vec<Procedure>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Submodule {
    /// The module (or submodule chain head) this extends.
    pub parent: Ident,
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub contains: Vec<Procedure>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub contains: Vec<Procedure>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Function,
    Subroutine,
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub kind: ProcKind,
    pub name: Ident,
    /// Dummy-argument names, in declaration order.
    pub args: Vec<Ident>,
    /// `result(name)` clause on a function.
    pub result: Option<Ident>,
    /// Return type spelled in a prefix (`integer function f(..)`).
    pub return_type: Option<TypeSpec>,
    pub attrs: ProcAttrs,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub contains: Vec<Procedure>,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct ProcAttrs {
    pub pure: bool,
    pub elemental: bool,
    /// `module function` / `module subroutine` (submodule implementation or
    /// parent-module forward declaration).
    pub module_procedure: bool,
    pub bind_c: Option<BindC>,
    pub access: Option<Access>,
}

/// `bind(c)` with its optional explicit link name.
#[derive(Debug, Clone)]
pub struct BindC {
    pub link_name: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

/// Everything that can appear in a specification part.
#[derive(Debug, Clone)]
pub enum Decl {
    Use(Use),
    Implicit(Implicit),
    TypeDecl(TypeDecl),
    DerivedType(DerivedType),
    EnumDef(EnumDef),
    UnionDef(UnionDef),
    Interface(Interface),
    AccessStmt(AccessStmt),
    Template(Template),
    Requirement(Requirement),
    Instantiate(Instantiate),
    Pragma(Pragma),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Use(d) => d.span,
            Decl::Implicit(d) => d.span,
            Decl::TypeDecl(d) => d.span,
            Decl::DerivedType(d) => d.span,
            Decl::EnumDef(d) => d.span,
            Decl::UnionDef(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::AccessStmt(d) => d.span,
            Decl::Template(d) => d.span,
            Decl::Requirement(d) => d.span,
            Decl::Instantiate(d) => d.span,
            Decl::Pragma(d) => d.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Use {
    pub module: Ident,
    /// `only:` list; `None` means import the whole public surface.
    pub only: Option<Vec<UseSymbol>>,
    /// Renames outside an `only:` list (`use m, x => y`).
    pub renames: Vec<UseSymbol>,
    pub span: Span,
}

/// One imported name, optionally under a local rename.
#[derive(Debug, Clone)]
pub struct UseSymbol {
    /// Local name; `None` keeps the remote spelling.
    pub local: Option<Ident>,
    pub remote: Ident,
}

#[derive(Debug, Clone)]
pub struct Implicit {
    pub spec: ImplicitSpec,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ImplicitSpec {
    /// `implicit none`
    None,
    /// `implicit <type> (letter-ranges)`
    Rules(Vec<ImplicitRule>),
}

#[derive(Debug, Clone)]
pub struct ImplicitRule {
    pub type_spec: TypeSpec,
    /// Inclusive letter ranges, e.g. `(a-h, o-z)`.
    pub ranges: Vec<(char, char)>,
    pub span: Span,
}

/// An entity-declaration statement: type-spec, attributes, declarators.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub type_spec: TypeSpec,
    pub attrs: Vec<DeclAttr>,
    pub entities: Vec<EntityDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EntityDecl {
    pub name: Ident,
    /// Per-entity dimension override (`x(10)` on the declarator).
    pub dims: Option<Vec<DimSpec>>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclAttr {
    Intent(IntentSpec),
    Parameter,
    Save,
    Pointer,
    Allocatable,
    Optional,
    Dimension(Vec<DimSpec>),
    Access(Access),
    BindC(BindC),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSpec {
    In,
    Out,
    InOut,
}

/// One dimension of an array declarator. A deferred dimension (`:`) has
/// neither bound; an explicit one has at least an upper bound.
#[derive(Debug, Clone, Default)]
pub struct DimSpec {
    pub lower: Option<Expr>,
    pub upper: Option<Expr>,
}

impl DimSpec {
    pub fn deferred() -> Self {
        Self::default()
    }

    pub fn is_deferred(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum TypeSpec {
    Integer { kind: Option<Expr> },
    Real { kind: Option<Expr> },
    Complex { kind: Option<Expr> },
    Logical { kind: Option<Expr> },
    Character { len: Option<CharLen>, kind: Option<Expr> },
    /// `type(name)`: a derived type, union, or template type parameter.
    Named { name: Ident },
    /// `class(name)`: polymorphic derived-type reference.
    Class { name: Ident },
    /// `procedure(interface)`: a procedure entity.
    Procedure { interface: Option<Ident> },
}

#[derive(Debug, Clone)]
pub enum CharLen {
    Expr(Expr),
    /// `len=*`
    Assumed,
    /// `len=:`
    Deferred,
}

#[derive(Debug, Clone)]
pub struct DerivedType {
    pub name: Ident,
    pub extends: Option<Ident>,
    pub is_abstract: bool,
    pub bind_c: bool,
    /// `aligned(n)` attribute.
    pub alignment: Option<Expr>,
    pub members: Vec<TypeDecl>,
    /// Type-bound procedure bindings from the `contains` part.
    pub bindings: Vec<TypeBound>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeBound {
    /// Binding name (`procedure :: area` binds `area`).
    pub name: Ident,
    /// Target procedure when the binding renames (`area => circle_area`).
    pub target: Option<Ident>,
    pub deferred: bool,
    pub nopass: bool,
    /// `pass(self_name)`.
    pub pass_arg: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: Ident,
    pub bind_c: bool,
    pub items: Vec<EnumItem>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumItem {
    pub name: Ident,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: Ident,
    pub members: Vec<TypeDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub kind: InterfaceKind,
    pub items: Vec<InterfaceItem>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InterfaceKind {
    /// `interface name`: contributes to a generic procedure.
    Generic(Ident),
    /// `interface operator(+)`.
    Operator(OpTag),
    /// `interface operator(.cross.)`.
    DefinedOperator(Ident),
    /// `interface assignment(=)`.
    Assignment,
    /// `abstract interface` / bare `interface`: explicit interfaces only.
    Abstract,
}

#[derive(Debug, Clone)]
pub enum InterfaceItem {
    /// A full interface body (header + specification, no executable part).
    Procedure(Procedure),
    /// `module procedure a, b, c`.
    ModuleProcedure(Vec<Ident>),
}

#[derive(Debug, Clone)]
pub struct AccessStmt {
    pub access: Access,
    /// Empty means this sets the scope's default access.
    pub names: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub requires: Vec<RequireClause>,
    pub decls: Vec<Decl>,
    pub contains: Vec<Procedure>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub requires: Vec<RequireClause>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// `require :: r(t, f)`: instantiate requirement `r` over the named
/// parameters.
#[derive(Debug, Clone)]
pub struct RequireClause {
    pub requirement: Ident,
    pub args: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Instantiate {
    pub template: Ident,
    pub args: Vec<InstantiateArg>,
    /// `only:` renames applied to the instantiated symbols.
    pub only: Option<Vec<UseSymbol>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InstantiateArg {
    pub kind: InstantiateArgKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InstantiateArgKind {
    Type(TypeSpec),
    Symbol(Ident),
    Operator(OpTag),
}

#[derive(Debug, Clone)]
pub struct Pragma {
    pub kind: PragmaKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PragmaKind {
    /// `!$dir simd(a, b)`: mark the named arrays for SIMD layout.
    Simd { vars: Vec<Ident> },
}

/// Intrinsic operator tags, shared between expressions, operator
/// interfaces, and instantiation arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTag {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl OpTag {
    /// Short lowercase tag used to form overload-set keys (`~add`).
    pub fn tag(self) -> &'static str {
        match self {
            OpTag::Add => "add",
            OpTag::Sub => "sub",
            OpTag::Mul => "mul",
            OpTag::Div => "div",
            OpTag::Eq => "eq",
            OpTag::NotEq => "neq",
            OpTag::Lt => "lt",
            OpTag::LtE => "lte",
            OpTag::Gt => "gt",
            OpTag::GtE => "gte",
        }
    }

    /// The surface spelling, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            OpTag::Add => "+",
            OpTag::Sub => "-",
            OpTag::Mul => "*",
            OpTag::Div => "/",
            OpTag::Eq => "==",
            OpTag::NotEq => "/=",
            OpTag::Lt => "<",
            OpTag::LtE => "<=",
            OpTag::Gt => ">",
            OpTag::GtE => ">=",
        }
    }
}
