//! Tree model for Tern compilation units.
//!
//! This module defines the nodes the semantic pipeline consumes and rewrites:
//! - Classes, fields, methods, constructors and parameters (`class`)
//! - Annotation usages (`annotation`)
//! - Expressions and statements (`expression`, `statement`)
//! - Type references and the per-unit class arena (`types`)
//! - Visitor traits for walking and rewriting bodies (`visitor`)
//! - Node-builder helpers used by the synthesizing passes (`build`)
//!
//! The tree arrives from the parser well-formed but semantically unchecked.
//! Every node carries a `Span` for diagnostics.

use std::fmt;

pub mod annotation;
pub mod build;
pub mod class;
pub mod expression;
pub mod statement;
pub mod types;
pub mod visitor;

pub use annotation::AnnotationNode;
pub use class::{
    ClassKind, ClassNode, ConstructorNode, FieldNode, MethodNode, Parameter, VariableScope,
};
pub use expression::*;
pub use statement::{Block, Statement};
pub use types::{ClassId, ClassTable, TypeRef, WellKnown};
pub use visitor::{Visitor, VisitorMut};

/// Source location information for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span used for synthesized nodes that have no source text
    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: self.column.min(other.column),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

bitflags::bitflags! {
    /// Access and property flags shared by classes and their members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

impl Modifiers {
    /// `public static final`
    pub const PUBLIC_STATIC_FINAL: Modifiers = Modifiers::PUBLIC
        .union(Modifiers::STATIC)
        .union(Modifiers::FINAL);

    /// `private static final`
    pub const PRIVATE_STATIC_FINAL: Modifiers = Modifiers::PRIVATE
        .union(Modifiers::STATIC)
        .union(Modifiers::FINAL);

    pub fn is_static(self) -> bool {
        self.contains(Modifiers::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Modifiers::FINAL)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Modifiers::ABSTRACT)
    }

    pub fn is_synthetic(self) -> bool {
        self.contains(Modifiers::SYNTHETIC)
    }
}
