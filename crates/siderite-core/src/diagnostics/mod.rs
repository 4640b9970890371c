//! Compiler diagnostics infrastructure.
//!
//! Diagnostics are collected into [`Diagnostics`] during a pass and rendered
//! afterwards. Passes never print; they `report(..)` and keep going (or
//! unwind, in which case the diagnostic has already been recorded).

mod kind;
mod message;
mod printer;


use rowan::TextRange;

pub use kind::DiagnosticKind;
pub use message::{RelatedInfo, Severity};
pub use printer::DiagnosticsPrinter;

use message::DiagnosticMessage;

use crate::source_map::SourceId;

/// Collection of diagnostic messages from resolution and verification.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

/// Builder for one diagnostic message.
#[must_use = "diagnostic not emitted, call .emit()"]
pub struct DiagnosticBuilder<'a> {
    diagnostics: &'a mut Diagnostics,
    message: DiagnosticMessage,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a diagnostic of the given kind at the given location.
    ///
    /// The kind's message template is filled by [`DiagnosticBuilder::message`];
    /// emitting without calling it leaves the template's detail empty.
    pub fn report(
        &mut self,
        source: SourceId,
        kind: DiagnosticKind,
        range: TextRange,
    ) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage::new(kind, source, range),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.messages.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|d| d.is_warning())
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_warning()).count()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }
}

impl DiagnosticBuilder<'_> {
    /// Fill the kind's message template with a detail string (usually the
    /// offending name).
    pub fn message(mut self, detail: impl AsRef<str>) -> Self {
        self.message.render(detail.as_ref());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hint = Some(hint.into());
        self
    }

    pub fn related_to(
        mut self,
        source: SourceId,
        range: TextRange,
        msg: impl Into<String>,
    ) -> Self {
        self.message.related.push(RelatedInfo {
            source,
            range,
            message: msg.into(),
        });
        self
    }

    pub fn emit(self) {
        self.diagnostics.messages.push(self.message);
    }
}

pub use message::DiagnosticMessage as Diagnostic;
