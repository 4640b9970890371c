//! The diagnostic taxonomy.

use super::message::Severity;

/// Every condition the front-end can report, with its severity and message
/// template. Free-form kinds render the detail string as the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An identifier string fails the validity rule.
    LexicalName,
    /// A name is already bound in the same scope.
    DuplicateSymbol,
    /// A reference has no binding in any visible scope.
    UnresolvedSymbol,
    /// A type-form invariant is broken (array nesting, pointer of
    /// allocatable, deferred-length misuse, ...).
    TypeShape,
    /// Call argument count, or function/signature arity disagreement.
    ArityMismatch,
    /// Assignment to an `intent(in)` argument or re-assignment of a
    /// parameter constant.
    IntentViolation,
    /// A stored dependency list disagrees with the walked set.
    DependencyDrift,
    /// `use` loops without progress after a fixed-point pass.
    CyclicImport,
    /// An instantiation argument fails a restriction, or parameter counts
    /// disagree.
    TemplateMisuse,
    /// A `use`d module could not be located.
    ModuleNotFound,
    /// Implicit typing is disabled, or no implicit rule covers a name.
    ImplicitTyping,
    /// An invariant the compiler itself should have maintained.
    Internal,
    /// An import replaces an existing binding.
    ShadowedImport,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::ShadowedImport => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Render the message for this kind with the given detail string.
    pub(super) fn render(self, detail: &str) -> String {
        match self {
            DiagnosticKind::LexicalName => format!("`{detail}` is not a valid identifier"),
            DiagnosticKind::DuplicateSymbol => {
                format!("`{detail}` is already declared in this scope")
            }
            DiagnosticKind::UnresolvedSymbol => format!("`{detail}` is not declared"),
            DiagnosticKind::CyclicImport => format!("import cycle through module `{detail}`"),
            DiagnosticKind::ModuleNotFound => format!("module `{detail}` not found"),
            DiagnosticKind::ShadowedImport => {
                format!("`{detail}` shadows an existing binding")
            }
            DiagnosticKind::TypeShape
            | DiagnosticKind::ArityMismatch
            | DiagnosticKind::IntentViolation
            | DiagnosticKind::DependencyDrift
            | DiagnosticKind::TemplateMisuse
            | DiagnosticKind::ImplicitTyping
            | DiagnosticKind::Internal => detail.to_string(),
        }
    }
}
