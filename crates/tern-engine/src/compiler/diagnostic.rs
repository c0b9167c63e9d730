//! Diagnostic rendering for semantic errors
//!
//! Wraps `codespan_reporting` diagnostics with stable error codes, renders
//! them to a terminal stream, and converts them to JSON for editor tooling.
//! Annotation problems use `E4xxx` codes, enum completion problems `E5xxx`.

use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use serde::{Deserialize, Serialize};
use termcolor::{ColorChoice, StandardStream, WriteColor};

use super::error::{ErrorCollector, SemanticError};
use crate::ast::Span;

/// Error code for a diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        self.0
    }
}

/// A diagnostic message with source code context
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    /// Error code (e.g., "E4002")
    code: Option<ErrorCode>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            inner: CsDiagnostic::new(severity).with_message(message),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.inner = self.inner.with_code(code.0);
        self.code = Some(code);
        self
    }

    /// Add a primary label (main error location)
    pub fn with_primary_label(mut self, file_id: usize, span: Span, message: impl Into<String>) -> Self {
        let label = Label::primary(file_id, span.start..span.end).with_message(message);
        self.inner.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    /// Add a help suggestion
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.notes.push(format!("help: {}", help.into()));
        self
    }

    /// Create diagnostic from a SemanticError
    pub fn from_semantic_error(error: &SemanticError, file_id: usize) -> Self {
        use SemanticError::*;

        let diag = Diagnostic::error(error.to_string()).with_code(error_code(error));
        let span = error.span();

        match error {
            NotAnAnnotation { .. } => diag.with_primary_label(file_id, span, "not an annotation type"),

            MissingAttribute { attribute, .. } => diag
                .with_primary_label(file_id, span, "missing attribute value")
                .with_help(format!("supply a value for '{}' or declare a default", attribute)),

            InvalidEnumConstant { enum_name, .. } => diag
                .with_primary_label(file_id, span, "unknown enum constant")
                .with_note(format!("'{}' declares no constant with this name", enum_name)),

            UnknownAttribute { .. } => diag.with_primary_label(file_id, span, "unknown attribute"),

            AttributeTypeMismatch { expected, found, .. } => diag.with_primary_label(
                file_id,
                span,
                format!("expected '{}', found '{}'", expected, found),
            ),

            NotInlineConstant { .. } => diag
                .with_primary_label(file_id, span, "not a constant")
                .with_help("only literals and static final fields with literal initializers are inlined"),

            ClosureNotAllowedInList { .. } => diag
                .with_primary_label(file_id, span, "closure in list position")
                .with_help("wrap the closure in a list: [{ -> ... }]"),

            ClassOrClosureExpected { .. } => {
                diag.with_primary_label(file_id, span, "expected a class or closure literal")
            }

            EnumExpected { .. } => diag.with_primary_label(file_id, span, "expected an enum constant"),

            EnumTypeMismatch { expected, found, .. } => diag.with_primary_label(
                file_id,
                span,
                format!("expected '{}', found '{}'", expected, found),
            ),

            AnnotationExpected { expected, .. } => {
                diag.with_primary_label(file_id, span, format!("expected @{}", expected))
            }

            UnexpectedAttributeType { .. } => {
                diag.with_primary_label(file_id, span, "unsupported attribute type")
            }

            NotAnnotationConstant { .. } => {
                diag.with_primary_label(file_id, span, "expected an annotation constant")
            }

            CircularReference { .. } => diag
                .with_primary_label(file_id, span, "cycle starts here")
                .with_note("annotation attribute defaults may not reference their own annotation type"),

            UnsupportedEnumInitializer { .. } => diag
                .with_primary_label(file_id, span, "named arguments are not supported here")
                .with_help("pass the values positionally and declare a matching constructor"),

            AbstractMethodNotImplemented { .. } => {
                diag.with_primary_label(file_id, span, "missing implementation")
            }
        }
    }

    /// Emit the diagnostic to stderr with colors
    pub fn emit(&self, files: &SimpleFiles<String, String>) -> Result<(), codespan_reporting::files::Error> {
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        self.emit_to(&mut writer, files)
    }

    /// Emit to an arbitrary color-capable writer
    pub fn emit_to(
        &self,
        writer: &mut dyn WriteColor,
        files: &SimpleFiles<String, String>,
    ) -> Result<(), codespan_reporting::files::Error> {
        let config = term::Config::default();
        term::emit(writer, &config, files, &self.inner)
    }

    /// Get the underlying codespan diagnostic (for testing/custom rendering)
    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    /// Convert to JSON representation for IDE integration
    pub fn to_json(&self, files: &SimpleFiles<String, String>) -> Result<String, serde_json::Error> {
        let json_diag = JsonDiagnostic::from_diagnostic(self, files);
        serde_json::to_string_pretty(&json_diag)
    }
}

/// Diagnostics for every error in a collector, in report order
pub fn diagnostics(errors: &ErrorCollector, file_id: usize) -> Vec<Diagnostic> {
    errors
        .errors()
        .iter()
        .map(|e| Diagnostic::from_semantic_error(e, file_id))
        .collect()
}

/// JSON representation of a diagnostic for IDE integration
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub code: Option<String>,
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
    /// Additional notes and help
    pub notes: Vec<String>,
}

/// JSON representation of a diagnostic label
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    /// 1-indexed
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: Option<String>,
    /// "primary" or "secondary"
    pub style: String,
}

impl JsonDiagnostic {
    pub fn from_diagnostic(diag: &Diagnostic, files: &SimpleFiles<String, String>) -> Self {
        let severity = match diag.inner.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
            Severity::Bug => "bug",
        };

        let labels = diag
            .inner
            .labels
            .iter()
            .filter_map(|label| {
                let file = files.get(label.file_id).ok()?;
                let start = file.location((), label.range.start).ok()?;
                let end = file.location((), label.range.end).ok()?;

                Some(JsonLabel {
                    file: file.name().to_string(),
                    start_line: start.line_number,
                    start_column: start.column_number,
                    end_line: end.line_number,
                    end_column: end.column_number,
                    message: Some(label.message.clone()),
                    style: match label.style {
                        LabelStyle::Primary => "primary",
                        LabelStyle::Secondary => "secondary",
                    }
                    .to_string(),
                })
            })
            .collect();

        JsonDiagnostic {
            code: diag.code.as_ref().map(|c| c.0.to_string()),
            severity: severity.to_string(),
            message: diag.inner.message.clone(),
            labels,
            notes: diag.inner.notes.clone(),
        }
    }
}

/// Get error code for a SemanticError
pub fn error_code(error: &SemanticError) -> ErrorCode {
    use SemanticError::*;

    match error {
        NotAnAnnotation { .. } => ErrorCode("E4001"),
        MissingAttribute { .. } => ErrorCode("E4002"),
        InvalidEnumConstant { .. } => ErrorCode("E4003"),
        UnknownAttribute { .. } => ErrorCode("E4004"),
        AttributeTypeMismatch { .. } => ErrorCode("E4005"),
        NotInlineConstant { .. } => ErrorCode("E4006"),
        ClosureNotAllowedInList { .. } => ErrorCode("E4007"),
        ClassOrClosureExpected { .. } => ErrorCode("E4008"),
        EnumExpected { .. } => ErrorCode("E4009"),
        EnumTypeMismatch { .. } => ErrorCode("E4010"),
        AnnotationExpected { .. } => ErrorCode("E4011"),
        UnexpectedAttributeType { .. } => ErrorCode("E4012"),
        NotAnnotationConstant { .. } => ErrorCode("E4013"),
        CircularReference { .. } => ErrorCode("E4014"),
        UnsupportedEnumInitializer { .. } => ErrorCode("E5001"),
        AbstractMethodNotImplemented { .. } => ErrorCode("E5002"),
    }
}

/// Helper to create a SimpleFiles instance from source code
pub fn create_files(path: impl Into<PathBuf>, source: impl Into<String>) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn circular() -> SemanticError {
        SemanticError::CircularReference {
            annotation: "Node".to_string(),
            span: Span::new(22, 27, 2, 5),
        }
    }

    #[test]
    fn test_diagnostic_with_code() {
        let diag = Diagnostic::error("Test error").with_code(ErrorCode("E4001"));
        assert_eq!(diag.code(), Some(&ErrorCode("E4001")));
        assert_eq!(diag.inner().severity, Severity::Error);
    }

    #[test]
    fn test_from_semantic_error() {
        let diag = Diagnostic::from_semantic_error(&circular(), 0);
        assert_eq!(diag.code(), Some(&ErrorCode("E4014")));
        assert!(diag.inner().message.contains("Node"));
        assert_eq!(diag.inner().labels.len(), 1);
    }

    #[test]
    fn test_json_output() {
        let diag = Diagnostic::from_semantic_error(&circular(), 0);
        let files = create_files("node.tern", "@interface Node {\n    Node next() default @Node\n}\n");

        let json = diag.to_json(&files).unwrap();
        assert!(json.contains("\"E4014\""));
        assert!(json.contains("\"severity\": \"error\""));
        assert!(json.contains("\"start_line\": 2"));
        assert!(json.contains("\"primary\""));
    }

    #[test]
    fn test_emit_to_buffer() {
        let diag = Diagnostic::from_semantic_error(&circular(), 0);
        let files = create_files("node.tern", "@interface Node {\n    Node next() default @Node\n}\n");

        let mut out = NoColor::new(Vec::new());
        diag.emit_to(&mut out, &files).unwrap();
        let rendered = String::from_utf8(out.into_inner()).unwrap();
        assert!(rendered.contains("error[E4014]"));
        assert!(rendered.contains("node.tern:2:5"));
    }
}
