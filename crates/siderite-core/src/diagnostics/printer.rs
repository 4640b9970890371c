//! Renderer for collected diagnostics.

use std::fmt::Write;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use rowan::TextRange;

use super::Diagnostics;
use super::message::Severity;
use crate::source_map::SourceMap;

/// Builder-pattern renderer. Without a source map it falls back to the
/// one-line `Display` form of each message.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    sources: Option<&'s SourceMap>,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self {
            diagnostics,
            sources: None,
            colored: false,
        }
    }

    pub fn sources(mut self, sources: &'s SourceMap) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("String write never fails");
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let Some(sources) = self.sources else {
            return self.format_plain(w);
        };

        if self.diagnostics.is_empty() {
            return Ok(());
        }

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        for (i, diag) in self.diagnostics.iter().enumerate() {
            let text = sources.text(diag.source);
            let range = adjust_range(diag.range, text.len());

            let mut snippet = Snippet::source(text).line_start(1).annotation(
                AnnotationKind::Primary
                    .span(range.clone())
                    .label(&diag.message),
            );
            if let Some(path) = sources.path(diag.source) {
                snippet = snippet.path(path);
            }

            // Secondary locations in the same source join the primary
            // snippet; other sources get their own snippet element.
            let mut foreign = Vec::new();
            for related in &diag.related {
                let rel_range = adjust_range(related.range, sources.text(related.source).len());
                if related.source == diag.source {
                    snippet = snippet.annotation(
                        AnnotationKind::Context
                            .span(rel_range)
                            .label(&related.message),
                    );
                } else {
                    let mut rel_snippet =
                        Snippet::source(sources.text(related.source))
                            .line_start(1)
                            .annotation(
                                AnnotationKind::Context
                                    .span(rel_range)
                                    .label(&related.message),
                            );
                    if let Some(path) = sources.path(related.source) {
                        rel_snippet = rel_snippet.path(path);
                    }
                    foreign.push(rel_snippet);
                }
            }

            let level = severity_to_level(diag.severity());
            let mut title_group = level.primary_title(&diag.message).element(snippet);
            for rel_snippet in foreign {
                title_group = title_group.element(rel_snippet);
            }

            let report: Vec<Group> = vec![title_group];

            if i > 0 {
                w.write_char('\n')?;
            }
            write!(w, "{}", renderer.render(&report))?;
            if let Some(hint) = &diag.hint {
                write!(w, "\nhelp: {hint}")?;
            }
        }

        Ok(())
    }

    fn format_plain(&self, w: &mut impl Write) -> std::fmt::Result {
        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                w.write_char('\n')?;
            }
            write!(w, "{diag}")?;
        }
        Ok(())
    }
}

fn severity_to_level(severity: Severity) -> Level<'static> {
    match severity {
        Severity::Error => Level::ERROR,
        Severity::Warning => Level::WARNING,
    }
}

fn adjust_range(range: TextRange, limit: usize) -> std::ops::Range<usize> {
    let start: usize = range.start().into();
    let end: usize = range.end().into();

    // Zero-width annotations render poorly; widen by one when possible.
    if start == end {
        return start..(start + 1).min(limit);
    }

    start..end
}

impl Diagnostics {
    pub fn printer(&self) -> DiagnosticsPrinter<'_, '_> {
        DiagnosticsPrinter::new(self)
    }
}
