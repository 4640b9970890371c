//! Verification failures.

use siderite_core::Span;

/// Which invariant group a verification failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyErrorKind {
    #[error("scope integrity")]
    Scope,
    #[error("reference integrity")]
    Reference,
    #[error("external symbol")]
    External,
    #[error("dependency drift")]
    DependencyDrift,
    #[error("type shape")]
    TypeShape,
    #[error("arity")]
    Arity,
    #[error("intent")]
    Intent,
    #[error("call site")]
    CallSite,
    #[error("select fall-through")]
    FallThrough,
    #[error("name")]
    Name,
    #[error("internal")]
    Internal,
}

/// The first invariant violation found in a tree. Verification stops at the
/// first error; a malformed tree never reaches later passes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct VerifyError {
    pub kind: VerifyErrorKind,
    pub span: Span,
    pub message: String,
}

impl VerifyError {
    pub fn new(kind: VerifyErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }
}
