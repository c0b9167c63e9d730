//! Tern Language Engine
//!
//! This crate provides the semantic core between the Tern parser and the
//! bytecode emitter:
//! - **AST**: Class trees, type references and the per-unit class table (`ast` module)
//! - **Compiler**: Annotation validation, enum completion and dispatch marking (`compiler` module)
//! - **VM**: Reflected-member cache, class-keyed values and call sites (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use tern_engine::{ClassTable, CompilerOptions, ErrorCollector, SemanticPipeline};
//!
//! let mut table: ClassTable = parse_unit(source);
//! let options = CompilerOptions::default().with_env_overrides()?;
//! let mut errors = ErrorCollector::from_options(&options);
//!
//! let output = SemanticPipeline::new(options).run(&mut table, &mut errors);
//! for diag in tern_engine::compiler::diagnostic::diagnostics(&errors, file_id) {
//!     diag.emit(&files)?;
//! }
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Tree model consumed and rewritten by the compiler passes
pub mod ast;

/// Semantic completion passes
pub mod compiler;

/// Reflective runtime core
pub mod vm;

/// Compiler and runtime options
pub mod options;

/// Default constants
pub mod defaults;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{ClassId, ClassNode, ClassTable, Span, TypeRef};

pub use compiler::{
    AnnotationValidator, CallSiteTable, ClosureWriter, Diagnostic, EnumCompletionVisitor,
    EnumVisitor, ErrorCollector, InvocationWriter, PipelineOutput, SemanticError,
    SemanticPipeline,
};

pub use options::{ClassValueStrategy, CompilerOptions, OptionsError, RuntimeOptions};

pub use vm::{
    CallSite, CallSiteArray, ClassDescriptor, ClassInfo, ClassLoader, ClassValue, DispatchError,
    ReflectionCache, ReflectionError, RuntimeClass,
};
