//! Structured diagnostics.
//!
//! The compiler never aborts on source errors; every problem becomes a
//! [`Diagnostic`] in the [`DiagnosticStream`] carried by the compile result.
//! Diagnostics raised before the final token stream exists (tokenizer,
//! preprocessor) anchor to a spelled file range; later phases anchor to a
//! syntax token.

use crate::lexing::SyntaxTokenId;
use crate::source::{FileId, TextRange};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Where a diagnostic points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DiagnosticAnchor {
    Token(SyntaxTokenId),
    Spelled { file: FileId, range: TextRange },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub anchor: DiagnosticAnchor,
    pub message: String,
}

/// Accumulates diagnostics across all phases of one invocation.
#[derive(Debug, Default, Serialize)]
pub struct DiagnosticStream {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, severity: Severity, anchor: DiagnosticAnchor, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic { severity, anchor, message: message.into() });
    }

    pub fn error_at_token(&mut self, token: SyntaxTokenId, message: impl Into<String>) {
        self.report(Severity::Error, DiagnosticAnchor::Token(token), message);
    }

    pub fn error_at_spelled(&mut self, file: FileId, range: TextRange, message: impl Into<String>) {
        self.report(Severity::Error, DiagnosticAnchor::Spelled { file, range }, message);
    }

    pub fn warning_at_spelled(&mut self, file: FileId, range: TextRange, message: impl Into<String>) {
        self.report(Severity::Warning, DiagnosticAnchor::Spelled { file, range }, message);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TextPosition;

    #[test]
    fn counts_errors_but_not_warnings() {
        let mut stream = DiagnosticStream::new();
        let range = TextRange::point(TextPosition::new(0, 0));
        stream.error_at_spelled(FileId::INVALID, range, "bad");
        stream.warning_at_spelled(FileId::INVALID, range, "iffy");
        assert_eq!(stream.diagnostics().len(), 2);
        assert_eq!(stream.error_count(), 1);
    }
}
