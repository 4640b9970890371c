//! Diagnostic message types.

use rowan::TextRange;

use super::kind::DiagnosticKind;
use crate::source_map::SourceId;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A secondary location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub source: SourceId,
    pub range: TextRange,
    pub message: String,
}

/// One diagnostic: kind, location, rendered message, optional hint, and
/// secondary locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub kind: DiagnosticKind,
    pub source: SourceId,
    pub range: TextRange,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedInfo>,
}

impl DiagnosticMessage {
    pub(super) fn new(kind: DiagnosticKind, source: SourceId, range: TextRange) -> Self {
        Self {
            kind,
            source,
            range,
            message: kind_default_message(kind),
            hint: None,
            related: Vec::new(),
        }
    }

    pub(super) fn render(&mut self, detail: &str) {
        self.message = self.kind.render(detail);
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }
}

fn kind_default_message(kind: DiagnosticKind) -> String {
    kind.render("")
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}: {}",
            self.severity(),
            u32::from(self.range.start()),
            u32::from(self.range.end()),
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (help: {hint})")?;
        }
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message,
                u32::from(related.range.start()),
                u32::from(related.range.end())
            )?;
        }
        Ok(())
    }
}
