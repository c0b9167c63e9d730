//! Cached member wrappers and the member-resolution capability

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::ast::Modifiers;
use crate::defaults::MOP_PREFIXES;
use crate::vm::class::{RuntimeClass, RuntimeConstructor, RuntimeField, RuntimeMethod};
use crate::vm::ReflectionResult;

/// Shape of the arguments at a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgShape {
    pub arity: usize,
}

impl ArgShape {
    pub fn of(arity: usize) -> Self {
        Self { arity }
    }
}

fn accepts(param_count: usize, varargs: bool, shape: ArgShape) -> bool {
    if varargs {
        shape.arity + 1 >= param_count
    } else {
        shape.arity == param_count
    }
}

// ============================================================================
// CachedMethod
// ============================================================================

/// One reflected method with its owning class
#[derive(Clone)]
pub struct CachedMethod {
    method: Arc<RuntimeMethod>,
    owner: Arc<RuntimeClass>,
}

impl CachedMethod {
    pub fn new(method: Arc<RuntimeMethod>, owner: Arc<RuntimeClass>) -> Self {
        Self { method, owner }
    }

    pub fn name(&self) -> &str {
        &self.method.name
    }

    pub fn arity(&self) -> usize {
        self.method.arity()
    }

    pub fn param_types(&self) -> &[String] {
        &self.method.param_types
    }

    pub fn return_type(&self) -> &str {
        &self.method.return_type
    }

    pub fn modifiers(&self) -> Modifiers {
        self.method.modifiers
    }

    pub fn is_static(&self) -> bool {
        self.method.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.method.modifiers.is_abstract()
    }

    pub fn is_varargs(&self) -> bool {
        self.method.modifiers.contains(Modifiers::VARARGS)
    }

    pub fn is_mop(&self) -> bool {
        is_mop_name(&self.method.name)
    }

    /// The class the method was reflected from
    pub fn owner(&self) -> &Arc<RuntimeClass> {
        &self.owner
    }

    /// The wrapped reflective handle
    pub fn handle(&self) -> &Arc<RuntimeMethod> {
        &self.method
    }

    pub fn accepts(&self, shape: ArgShape) -> bool {
        accepts(self.arity(), self.is_varargs(), shape)
    }

    /// Natural ordering: name, arity, then parameter type names
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.arity().cmp(&other.arity()))
            .then_with(|| self.param_types().cmp(other.param_types()))
    }

    /// Name-only ordering used for the mop table
    pub fn name_cmp(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

pub(crate) fn is_mop_name(name: &str) -> bool {
    MOP_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

impl PartialEq for CachedMethod {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.method, &other.method)
    }
}

impl Eq for CachedMethod {}

impl fmt::Debug for CachedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.owner.name(),
            self.name(),
            self.param_types().join(", ")
        )
    }
}

// ============================================================================
// CachedConstructor / CachedField
// ============================================================================

/// One reflected constructor
#[derive(Clone)]
pub struct CachedConstructor {
    ctor: Arc<RuntimeConstructor>,
    owner: Arc<RuntimeClass>,
}

impl CachedConstructor {
    pub fn new(ctor: Arc<RuntimeConstructor>, owner: Arc<RuntimeClass>) -> Self {
        Self { ctor, owner }
    }

    pub fn arity(&self) -> usize {
        self.ctor.arity()
    }

    pub fn param_types(&self) -> &[String] {
        &self.ctor.param_types
    }

    pub fn modifiers(&self) -> Modifiers {
        self.ctor.modifiers
    }

    pub fn owner(&self) -> &Arc<RuntimeClass> {
        &self.owner
    }

    pub fn handle(&self) -> &Arc<RuntimeConstructor> {
        &self.ctor
    }

    pub fn accepts(&self, shape: ArgShape) -> bool {
        accepts(self.arity(), self.ctor.modifiers.contains(Modifiers::VARARGS), shape)
    }
}

impl PartialEq for CachedConstructor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ctor, &other.ctor)
    }
}

impl Eq for CachedConstructor {}

impl fmt::Debug for CachedConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.owner.name(), self.param_types().join(", "))
    }
}

/// One reflected field
#[derive(Clone)]
pub struct CachedField {
    field: Arc<RuntimeField>,
    owner: Arc<RuntimeClass>,
}

impl CachedField {
    pub fn new(field: Arc<RuntimeField>, owner: Arc<RuntimeClass>) -> Self {
        Self { field, owner }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn ty(&self) -> &str {
        &self.field.ty
    }

    pub fn modifiers(&self) -> Modifiers {
        self.field.modifiers
    }

    pub fn is_static(&self) -> bool {
        self.field.modifiers.is_static()
    }

    pub fn owner(&self) -> &Arc<RuntimeClass> {
        &self.owner
    }

    pub fn handle(&self) -> &Arc<RuntimeField> {
        &self.field
    }
}

impl PartialEq for CachedField {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.field, &other.field)
    }
}

impl Eq for CachedField {}

impl fmt::Debug for CachedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.ty(), self.owner.name(), self.name())
    }
}

// ============================================================================
// Resolution capability
// ============================================================================

/// Result of resolving a member for a call shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberHandle {
    Method(CachedMethod),
    Constructor(CachedConstructor),
    /// Property read through a field
    Field(CachedField),
}

impl MemberHandle {
    pub fn as_method(&self) -> Option<&CachedMethod> {
        match self {
            MemberHandle::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the class declaring the member
    pub fn declaring_class(&self) -> &str {
        match self {
            MemberHandle::Method(m) => m.owner().name(),
            MemberHandle::Constructor(c) => c.owner().name(),
            MemberHandle::Field(f) => f.owner().name(),
        }
    }
}

/// Dynamic member lookup. Callers only branch on the returned handle, never
/// on the concrete resolver.
pub trait MemberResolver {
    /// Method (or, for zero arguments, property field) named `name`
    fn resolve_member(&self, name: &str, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>>;

    /// Constructor accepting the shape
    fn resolve_constructor(&self, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>>;
}

/// Pick the best candidate for a shape from methods sorted in natural order:
/// exact arity first, then varargs, concrete before abstract.
pub(crate) fn select_method<'a>(
    candidates: impl IntoIterator<Item = &'a CachedMethod>,
    shape: ArgShape,
) -> Option<&'a CachedMethod> {
    let mut best: Option<(&CachedMethod, u8)> = None;
    for method in candidates {
        if !method.accepts(shape) {
            continue;
        }
        let rank = match (method.arity() == shape.arity && !method.is_varargs(), method.is_abstract()) {
            (true, false) => 0,
            (false, false) => 1,
            (true, true) => 2,
            (false, true) => 3,
        };
        if best.map_or(true, |(_, r)| rank < r) {
            best = Some((method, rank));
        }
    }
    best.map(|(m, _)| m)
}
