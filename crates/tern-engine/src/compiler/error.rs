//! Semantic errors and the accumulating collector
//!
//! Validation and completion never abort on a bad node: each problem becomes
//! a `SemanticError` in the unit's `ErrorCollector` and the pass carries on.

use thiserror::Error;

use crate::ast::Span;
use crate::options::CompilerOptions;

/// What a non-constant attribute value turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonConstantKind {
    /// `Owner.NAME` that could not be folded
    Property(String),
    /// Direct field reference that could not be folded
    Field(String),
    Other,
}

impl NonConstantKind {
    fn describe(&self, expected: &str, annotation: &str) -> String {
        match self {
            NonConstantKind::Property(text) => format!(
                "Expected '{}' to be an inline constant of type {} not a property expression in @{}",
                text, expected, annotation
            ),
            NonConstantKind::Field(text) => format!(
                "Expected '{}' to be an inline constant of type {} not a field expression in @{}",
                text, expected, annotation
            ),
            NonConstantKind::Other => format!(
                "Expected an inline constant expression of type {} in @{}",
                expected, annotation
            ),
        }
    }
}

/// Compile-side error; every variant carries the offending span
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    // ── Annotation usage ──
    #[error("{name} is not an annotation")]
    NotAnAnnotation { name: String, span: Span },

    #[error("No explicit/default value found for annotation attribute '{attribute}' in @{annotation}")]
    MissingAttribute {
        annotation: String,
        attribute: String,
        span: Span,
    },

    #[error("No enum const {enum_name}.{constant}")]
    InvalidEnumConstant {
        enum_name: String,
        constant: String,
        span: Span,
    },

    #[error("'{attribute}' is not part of the annotation {annotation}")]
    UnknownAttribute {
        annotation: String,
        attribute: String,
        span: Span,
    },

    #[error("Attribute '{attribute}' should have type '{expected}'; but found type '{found}' in @{annotation}")]
    AttributeTypeMismatch {
        annotation: String,
        attribute: String,
        expected: String,
        found: String,
        span: Span,
    },

    #[error("{}", .kind.describe(.expected, .annotation))]
    NotInlineConstant {
        annotation: String,
        attribute: String,
        expected: String,
        kind: NonConstantKind,
        span: Span,
    },

    #[error("Annotation list attributes must use list notation [el1, el2]; found a closure for '{attribute}'")]
    ClosureNotAllowedInList { attribute: String, span: Span },

    #[error("Only classes and closures can be used for attribute '{attribute}' in @{annotation}")]
    ClassOrClosureExpected {
        annotation: String,
        attribute: String,
        span: Span,
    },

    #[error("Expected enum value for attribute '{attribute}' of type {expected} in @{annotation}")]
    EnumExpected {
        annotation: String,
        attribute: String,
        expected: String,
        span: Span,
    },

    #[error("Attribute '{attribute}' should have type '{expected}' (Enum); but found type '{found}' in @{annotation}")]
    EnumTypeMismatch {
        annotation: String,
        attribute: String,
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Expected annotation of type '{expected}' for attribute '{attribute}' in @{annotation}")]
    AnnotationExpected {
        annotation: String,
        attribute: String,
        expected: String,
        span: Span,
    },

    #[error("Unexpected type {ty} for attribute '{attribute}' in @{annotation}")]
    UnexpectedAttributeType {
        annotation: String,
        attribute: String,
        ty: String,
        span: Span,
    },

    #[error("Found '{found}' when expecting an annotation constant")]
    NotAnnotationConstant { found: String, span: Span },

    #[error("Circular reference discovered in {annotation}")]
    CircularReference { annotation: String, span: Span },

    // ── Enum completion ──
    #[error("Map-style initializer is not supported for enum constant {enum_name}.{constant}")]
    UnsupportedEnumInitializer {
        enum_name: String,
        constant: String,
        span: Span,
    },

    #[error("Can't have an abstract method in enum constant {constant}. Implement method '{method}'.")]
    AbstractMethodNotImplemented {
        constant: String,
        method: String,
        span: Span,
    },
}

impl SemanticError {
    pub fn span(&self) -> Span {
        use SemanticError::*;

        match self {
            NotAnAnnotation { span, .. }
            | MissingAttribute { span, .. }
            | InvalidEnumConstant { span, .. }
            | UnknownAttribute { span, .. }
            | AttributeTypeMismatch { span, .. }
            | NotInlineConstant { span, .. }
            | ClosureNotAllowedInList { span, .. }
            | ClassOrClosureExpected { span, .. }
            | EnumExpected { span, .. }
            | EnumTypeMismatch { span, .. }
            | AnnotationExpected { span, .. }
            | UnexpectedAttributeType { span, .. }
            | NotAnnotationConstant { span, .. }
            | CircularReference { span, .. }
            | UnsupportedEnumInitializer { span, .. }
            | AbstractMethodNotImplemented { span, .. } => *span,
        }
    }
}

/// Accumulates the semantic errors of one compilation unit
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<SemanticError>,
    /// 0 = unlimited
    tolerance: usize,
    dropped: usize,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: usize) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    pub fn from_options(options: &CompilerOptions) -> Self {
        Self::with_tolerance(options.tolerance)
    }

    /// Record an error. Once the tolerance is reached further errors are
    /// counted but not kept.
    pub fn add(&mut self, error: SemanticError) {
        if self.is_full() {
            self.dropped += 1;
            return;
        }
        tracing::debug!(span = %error.span(), "semantic error: {}", error);
        self.errors.push(error);
    }

    /// Whether the tolerance has been reached
    pub fn is_full(&self) -> bool {
        self.tolerance > 0 && self.errors.len() >= self.tolerance
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SemanticError> {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors discarded after the tolerance was reached
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
