//! Diagnostic reporting infrastructure.
//!
//! The semantic core never formats output itself: it produces structured
//! [`Diagnostic`] events (severity, span, code, message) and hands them to an
//! injected [`DiagnosticSink`]. Sinks decide whether to collect, pretty-print
//! (via `ariadne`) or serialize them as JSON lines.
//!
//! # Error Codes
//!
//! - **E0001-E0099**: Lexer errors
//! - **E0100-E0199**: Syntax/parser errors
//! - **E0200-E0299**: Name resolution and type errors
//! - **E0300-E0399**: Module graph errors
//! - **W0001-W0099**: Warnings

use std::io::{self, Write};

use ariadne::{Color, Label, Report, ReportKind};
use serde::Serialize;

use crate::span::{FileId, Span};

/// Compiler error codes for the front end.
///
/// Semantic errors carry their codes through
/// [`TypeError::to_diagnostic`](crate::typeck::TypeError::to_diagnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // ============================================================
    // Lexer errors (E0001-E0099)
    // ============================================================
    /// Unexpected character in source.
    UnexpectedCharacter = 1,
    /// Unclosed block comment.
    UnclosedBlockComment = 2,
    /// Invalid integer literal.
    InvalidInteger = 5,
    /// Invalid float literal.
    InvalidFloat = 6,
    /// Invalid character literal.
    InvalidChar = 7,

    // ============================================================
    // Parser errors (E0100-E0199)
    // ============================================================
    /// Unexpected token.
    UnexpectedToken = 100,
    /// Unexpected end of file.
    UnexpectedEof = 101,
    /// Invalid item in context.
    InvalidItem = 103,
    /// Expected identifier.
    ExpectedIdentifier = 108,
    /// Expected type.
    ExpectedType = 109,
    /// Expected expression.
    ExpectedExpression = 110,
    /// Missing function body.
    MissingFunctionBody = 114,
}

impl ErrorCode {
    /// Get the formatted error code string (e.g., "E0001").
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedCharacter => "unexpected character in source",
            ErrorCode::UnclosedBlockComment => "unclosed block comment",
            ErrorCode::InvalidInteger => "invalid integer literal",
            ErrorCode::InvalidFloat => "invalid float literal",
            ErrorCode::InvalidChar => "invalid character literal",
            ErrorCode::UnexpectedToken => "unexpected token",
            ErrorCode::UnexpectedEof => "unexpected end of file",
            ErrorCode::InvalidItem => "invalid item in this context",
            ErrorCode::ExpectedIdentifier => "expected identifier",
            ErrorCode::ExpectedType => "expected type",
            ErrorCode::ExpectedExpression => "expected expression",
            ErrorCode::MissingFunctionBody => "missing function body",
        }
    }

    /// Get a help message suggesting how to fix the error.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::UnclosedBlockComment => Some("add `*/` to close the block comment"),
            ErrorCode::MissingFunctionBody => {
                Some("add a function body `{ ... }` or declare it `extern func`")
            }
            _ => None,
        }
    }
}

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// An error that stops compilation.
    Error,
    /// A warning that doesn't prevent compilation.
    Warning,
    /// An informational note.
    Note,
}

impl DiagnosticKind {
    fn to_report_kind(self) -> ReportKind<'static> {
        match self {
            DiagnosticKind::Error => ReportKind::Error,
            DiagnosticKind::Warning => ReportKind::Warning,
            DiagnosticKind::Note => ReportKind::Advice,
        }
    }

    fn color(self) -> Color {
        match self {
            DiagnosticKind::Error => Color::Red,
            DiagnosticKind::Warning => Color::Yellow,
            DiagnosticKind::Note => Color::Cyan,
        }
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// The kind of diagnostic.
    pub kind: DiagnosticKind,
    /// The error code (e.g., "E0201").
    pub code: Option<String>,
    /// The main message.
    pub message: String,
    /// The primary span.
    pub span: Span,
    /// Additional labels pointing to relevant code.
    pub labels: Vec<DiagnosticLabel>,
    /// Suggestions for fixing the problem.
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            ..Self::error(message, span)
        }
    }

    /// Set the error code from a string.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Create an error diagnostic from an ErrorCode with automatic message and help.
    pub fn from_error_code(code: ErrorCode, span: Span) -> Self {
        let mut diag = Self::error(code.description(), span);
        diag.code = Some(code.as_str());
        if let Some(help) = code.help() {
            diag.suggestions.push(help.to_string());
        }
        diag
    }

    /// Add a note pointing at another location.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::secondary(span, message));
        self
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

/// A secondary label in a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
    /// Whether this is the primary label.
    pub primary: bool,
}

impl DiagnosticLabel {
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: false,
        }
    }
}

/// Receiver of diagnostic events.
///
/// The semantic core reports every warning and the single fatal error through
/// this trait and never formats text itself.
pub trait DiagnosticSink {
    /// Receive one diagnostic event.
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// A sink that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All warnings collected so far.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Warning)
    }

    /// All errors collected so far.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}

/// The source text of every file in a session, indexed by [`FileId`].
#[derive(Debug, Default, Clone)]
pub struct SourceFiles {
    files: Vec<(String, String)>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push((name.into(), source.into()));
        id
    }

    /// The display name of a file.
    pub fn name(&self, file: FileId) -> &str {
        self.files
            .get(file.0 as usize)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<unknown>")
    }

    /// The text of a file.
    pub fn source(&self, file: FileId) -> &str {
        self.files
            .get(file.0 as usize)
            .map(|(_, source)| source.as_str())
            .unwrap_or("")
    }
}

/// Diagnostic emitter that pretty-prints diagnostics to stderr.
pub struct DiagnosticEmitter<'a> {
    files: &'a SourceFiles,
}

impl<'a> DiagnosticEmitter<'a> {
    pub fn new(files: &'a SourceFiles) -> Self {
        Self { files }
    }

    /// Emit a diagnostic to stderr.
    pub fn emit(&self, diagnostic: &Diagnostic) {
        if diagnostic.span.is_dummy() {
            // Synthesized locations have no source text to underline.
            let code = diagnostic.code.as_deref().unwrap_or("");
            eprintln!("{:?} [{code}]: {}", diagnostic.kind, diagnostic.message);
            return;
        }

        let filename = self.files.name(diagnostic.span.file).to_string();
        let mut builder = Report::build(
            diagnostic.kind.to_report_kind(),
            filename.clone(),
            diagnostic.span.start,
        );

        let message = if let Some(code) = &diagnostic.code {
            format!("[{}] {}", code, diagnostic.message)
        } else {
            diagnostic.message.clone()
        };
        builder = builder.with_message(&message);

        builder = builder.with_label(
            Label::new((filename.clone(), diagnostic.span.start..diagnostic.span.end))
                .with_color(diagnostic.kind.color())
                .with_message(&diagnostic.message),
        );

        for label in &diagnostic.labels {
            if label.span.is_dummy() {
                continue;
            }
            let color = if label.primary {
                diagnostic.kind.color()
            } else {
                Color::Blue
            };
            let label_file = self.files.name(label.span.file).to_string();
            builder = builder.with_label(
                Label::new((label_file, label.span.start..label.span.end))
                    .with_color(color)
                    .with_message(&label.message),
            );
        }

        if !diagnostic.suggestions.is_empty() {
            builder = builder.with_help(diagnostic.suggestions.join("\n"));
        }

        let cache = ariadne::sources(
            (0..self.files.files.len() as u32)
                .map(|i| (self.files.name(FileId(i)).to_string(), self.files.source(FileId(i)).to_string())),
        );
        if let Err(err) = builder.finish().eprint(cache) {
            eprintln!("failed to write diagnostic: {err}");
        }
    }
}

/// A sink that pretty-prints each diagnostic as it arrives.
pub struct EmitterSink<'a> {
    emitter: DiagnosticEmitter<'a>,
}

impl<'a> EmitterSink<'a> {
    pub fn new(files: &'a SourceFiles) -> Self {
        Self {
            emitter: DiagnosticEmitter::new(files),
        }
    }
}

impl DiagnosticSink for EmitterSink<'_> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.emitter.emit(diagnostic);
    }
}

/// A sink that writes one JSON object per diagnostic.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_line(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, diagnostic)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> DiagnosticSink for JsonSink<W> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        if let Err(err) = self.write_line(diagnostic) {
            eprintln!("failed to write diagnostic: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnexpectedToken.as_str(), "E0100");
        assert_eq!(ErrorCode::UnexpectedCharacter.as_str(), "E0001");
    }

    #[test]
    fn test_json_sink_writes_one_line_per_event() {
        let mut sink = JsonSink::new(Vec::new());
        sink.report(&Diagnostic::warning("unused variable `x`", Span::new(3, 4, 1, 4)).with_code("W0001"));
        sink.report(&Diagnostic::error("boom", Span::dummy()));
        let text = String::from_utf8(sink.out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "warning");
        assert_eq!(first["code"], "W0001");
        assert_eq!(first["span"]["start"], 3);
    }

    #[test]
    fn test_collecting_sink_splits_by_kind() {
        let mut sink = CollectingSink::new();
        sink.report(&Diagnostic::warning("w", Span::dummy()));
        sink.report(&Diagnostic::error("e", Span::dummy()));
        assert_eq!(sink.warnings().count(), 1);
        assert_eq!(sink.errors().count(), 1);
    }
}
