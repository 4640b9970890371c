//! The expression and statement subset the declaration phase understands.
//!
//! Initializers, array bounds, string lengths, and the simple statement
//! forms the resolver lowers itself. Everything richer stays opaque to the
//! declaration pass and is handled by the statement-body pass.

use siderite_core::Span;

use crate::ast::{Decl, Ident, OpTag};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        value: i64,
        span: Span,
    },
    RealLiteral {
        value: f64,
        span: Span,
    },
    LogicalLiteral {
        value: bool,
        span: Span,
    },
    StringLiteral {
        value: String,
        span: Span,
    },
    /// A bare name; resolution decides what it denotes.
    Name(Ident),
    Bin {
        op: OpTag,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// `f(args)`: a function reference. The parser cannot distinguish this
    /// from an array element; the declaration pass only meets it in
    /// initializer/bound positions where it must be a function.
    Call {
        callee: Ident,
        args: Vec<CallArg>,
        span: Span,
    },
    /// `base%name`: component access.
    Member {
        base: Box<Expr>,
        name: Ident,
        span: Span,
    },
    /// `base%name(args)`: type-bound call.
    MethodCall {
        base: Box<Expr>,
        name: Ident,
        args: Vec<CallArg>,
        span: Span,
    },
}

impl Expr {
    pub fn int(value: i64, span: Span) -> Self {
        Expr::IntLiteral { value, span }
    }

    pub fn name(text: impl Into<String>, span: Span) -> Self {
        Expr::Name(Ident::new(text, span))
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::RealLiteral { span, .. }
            | Expr::LogicalLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::Bin { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::MethodCall { span, .. } => *span,
            Expr::Name(ident) => ident.span,
        }
    }
}

/// One actual argument, optionally keyworded.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub keyword: Option<Ident>,
    pub value: Expr,
    pub span: Span,
}

impl CallArg {
    pub fn positional(value: Expr) -> Self {
        let span = value.span();
        Self {
            keyword: None,
            value,
            span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assignment {
        target: Expr,
        value: Expr,
        span: Span,
    },
    /// `call sub(args)`.
    Call {
        name: Ident,
        args: Vec<CallArg>,
        span: Span,
    },
    Select {
        selector: Expr,
        cases: Vec<Case>,
        default: Vec<Stmt>,
        span: Span,
    },
    Return {
        span: Span,
    },
    /// `entry e(args)`: alternative entry point inside a procedure.
    Entry {
        name: Ident,
        args: Vec<Ident>,
        span: Span,
    },
    /// `block ... end block`.
    Block {
        decls: Vec<Decl>,
        body: Vec<Stmt>,
        span: Span,
    },
    /// `associate (name => expr, ...) ... end associate`.
    Associate {
        bindings: Vec<(Ident, Expr)>,
        body: Vec<Stmt>,
        span: Span,
    },
    /// An expression evaluated for effect (a bare type-bound call).
    ExprStmt {
        expr: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assignment { span, .. }
            | Stmt::Call { span, .. }
            | Stmt::Select { span, .. }
            | Stmt::Return { span }
            | Stmt::Entry { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::Associate { span, .. }
            | Stmt::ExprStmt { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Case {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
    /// `case (..) fallthrough` extension: execution continues into the next
    /// case block.
    pub fall_through: bool,
    pub span: Span,
}
