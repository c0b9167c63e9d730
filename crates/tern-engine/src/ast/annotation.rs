//! Annotation usage nodes

use indexmap::IndexMap;

use super::expression::Expression;
use super::types::TypeRef;
use super::Span;

/// One applied annotation with its attribute-value expressions.
///
/// Members keep their source order. The validator rewrites member
/// expressions in place (constant folding, singleton-list wrapping) and
/// then sets `validated`; nothing touches the node afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationNode {
    /// The annotation type
    pub class: TypeRef,
    /// Attribute name to value expression
    pub members: IndexMap<String, Expression>,
    /// Set once semantic validation has finished for this node
    pub validated: bool,
    pub span: Span,
}

impl AnnotationNode {
    pub fn new(class: TypeRef, span: Span) -> Self {
        Self {
            class,
            members: IndexMap::new(),
            validated: false,
            span,
        }
    }

    /// Builder-style member insertion
    pub fn with_member(mut self, name: impl Into<String>, value: Expression) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Expression> {
        self.members.get(name)
    }

    /// Replace (or add) the value of an attribute
    pub fn set_member(&mut self, name: impl Into<String>, value: Expression) {
        self.members.insert(name.into(), value);
    }
}
