//! Semantic completion of parsed class trees
//!
//! - Annotation validation and constant folding (`annotation`, `constant_fold`)
//! - Enum completion (`enums`)
//! - Dispatch marking and closure classes (`invocation`, `closure`)
//! - The pass driver (`pipeline`)
//! - Errors and their rendering (`error`, `diagnostic`)

pub mod annotation;
pub mod closure;
pub mod constant_fold;
pub mod diagnostic;
pub mod enums;
pub mod error;
pub mod invocation;
pub mod pipeline;

pub use annotation::AnnotationValidator;
pub use closure::ClosureWriter;
pub use constant_fold::ConstantFolder;
pub use diagnostic::{Diagnostic, ErrorCode};
pub use enums::{EnumCompletionVisitor, EnumVisitor};
pub use error::{ErrorCollector, NonConstantKind, SemanticError};
pub use invocation::{mark_table_class, CallContext, CallSiteTable, InvocationWriter};
pub use pipeline::{PipelineOutput, SemanticPipeline};
