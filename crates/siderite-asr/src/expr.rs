//! Typed expressions and statements.
//!
//! Every composite expression carries its synthesised type, so type
//! questions never require re-inference: including the bottom-up
//! `ImplicitLength` rule on string-physical casts.

use siderite_core::Span;

use crate::arena::{Asr, SymbolId};
use crate::symbol::Symbol;
use crate::ty::{StringLength, StringPhysical, Ty};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntConstant {
        value: i64,
        ty: Ty,
        span: Span,
    },
    RealConstant {
        value: f64,
        ty: Ty,
        span: Span,
    },
    LogicalConstant {
        value: bool,
        ty: Ty,
        span: Span,
    },
    StringConstant {
        value: String,
        ty: Ty,
        span: Span,
    },
    /// A reference to a symbol.
    Var { sym: SymbolId, span: Span },
    FunctionCall {
        callee: SymbolId,
        args: Vec<CallArg>,
        ty: Ty,
        span: Span,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: Ty,
        span: Span,
    },
    /// Changes a character value's physical representation. The only
    /// producer of `StringLength::Implicit`.
    StringPhysicalCast {
        arg: Box<Expr>,
        ty: Ty,
        span: Span,
    },
    /// `base%member` where `member` is a symbol inside the base's struct.
    StructMemberRef {
        base: Box<Expr>,
        member: SymbolId,
        ty: Ty,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
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

impl BinOp {
    /// Short lowercase tag used to form overload-set keys (`~add`).
    pub fn tag(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Eq => "eq",
            BinOp::NotEq => "neq",
            BinOp::Lt => "lt",
            BinOp::LtE => "lte",
            BinOp::Gt => "gt",
            BinOp::GtE => "gte",
        }
    }
}

/// One actual argument. `None` is an omitted optional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub value: Option<Expr>,
}

impl CallArg {
    pub fn new(value: Expr) -> Self {
        Self { value: Some(value) }
    }

    pub fn omitted() -> Self {
        Self { value: None }
    }
}

impl Expr {
    /// Integer constant of the default kind.
    pub fn int(value: i64, span: Span) -> Self {
        Expr::IntConstant {
            value,
            ty: Ty::default_int(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::IntConstant { span, .. }
            | Expr::RealConstant { span, .. }
            | Expr::LogicalConstant { span, .. }
            | Expr::StringConstant { span, .. }
            | Expr::Var { span, .. }
            | Expr::FunctionCall { span, .. }
            | Expr::BinaryOp { span, .. }
            | Expr::StringPhysicalCast { span, .. }
            | Expr::StructMemberRef { span, .. } => *span,
        }
    }

    /// The expression's type, synthesised bottom-up. `Var` reads through
    /// the referenced symbol (one external hop included).
    pub fn ty(&self, asr: &Asr) -> Ty {
        match self {
            Expr::IntConstant { ty, .. }
            | Expr::RealConstant { ty, .. }
            | Expr::LogicalConstant { ty, .. }
            | Expr::StringConstant { ty, .. }
            | Expr::FunctionCall { ty, .. }
            | Expr::BinaryOp { ty, .. }
            | Expr::StringPhysicalCast { ty, .. }
            | Expr::StructMemberRef { ty, .. } => ty.clone(),
            Expr::Var { sym, span: _ } => match asr.symbol(asr.get_past_external(*sym)) {
                Symbol::Variable(v) => v.ty.clone(),
                Symbol::Function(f) => Ty::FunctionType(Box::new(f.signature.clone())),
                _ => Ty::default_int(),
            },
        }
    }

    /// A character-of-implicit-length type with the given physical
    /// representation, for cast results.
    pub fn implicit_char_ty(physical: StringPhysical) -> Ty {
        Ty::Character {
            len: StringLength::Implicit,
            kind: 1,
            physical,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assignment {
        target: Expr,
        value: Expr,
        /// The target may be re-allocated to fit the value's shape. Only
        /// meaningful on allocatable targets.
        realloc_lhs: bool,
        span: Span,
    },
    SubroutineCall {
        callee: SymbolId,
        args: Vec<CallArg>,
        span: Span,
    },
    Select {
        selector: Expr,
        cases: Vec<CaseStmt>,
        default: Vec<Stmt>,
        /// Must equal the OR of the constituent cases' fall-through flags.
        enable_fall_through: bool,
        span: Span,
    },
    Return {
        span: Span,
    },
    /// Transfer into a block symbol's body.
    BlockCall {
        block: SymbolId,
        span: Span,
    },
    ExprStmt {
        expr: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assignment { span, .. }
            | Stmt::SubroutineCall { span, .. }
            | Stmt::Select { span, .. }
            | Stmt::Return { span }
            | Stmt::BlockCall { span, .. }
            | Stmt::ExprStmt { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseStmt {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub fall_through: bool,
    pub span: Span,
}
