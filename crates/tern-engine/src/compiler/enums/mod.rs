//! Enum completion
//!
//! Completes enum class nodes in two passes:
//! - `EnumVisitor` adds the backing `$VALUES` array, `MIN_VALUE`/`MAX_VALUE`,
//!   the `values`/`next`/`previous`/`valueOf` companions, the `$INIT`
//!   construction helper and the static initializer that builds every
//!   constant.
//! - `EnumCompletionVisitor` synthesizes missing constructors and injects the
//!   hidden `(String, int)` name/ordinal parameters the enum base requires.
//!
//! Both passes are idempotent. Processed state lives on the nodes
//! (`$VALUES` presence, `ConstructorNode::hidden_params`).

mod completion;
mod visitor;

pub use completion::EnumCompletionVisitor;
pub use visitor::EnumVisitor;

use crate::ast::{ClassId, ClassKind, ClassTable};

/// Enum nodes of a unit in processing order: per-constant bodies before the
/// enums they specialize
pub fn processing_order(table: &ClassTable) -> Vec<ClassId> {
    let sources = table.source_classes();
    let bodies = sources
        .iter()
        .copied()
        .filter(|id| table[*id].kind == ClassKind::EnumConstantBody);
    let enums = sources
        .iter()
        .copied()
        .filter(|id| table[*id].kind == ClassKind::Enum);
    bodies.chain(enums).collect()
}

/// `name`, prefixed with `_` until it differs from every name in `taken`
pub(crate) fn unique_name(name: &str, taken: &[String]) -> String {
    let mut candidate = name.to_string();
    while taken.iter().any(|t| *t == candidate) {
        candidate.insert(0, '_');
    }
    candidate
}
