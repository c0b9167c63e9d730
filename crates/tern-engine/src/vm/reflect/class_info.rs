//! Per-class meta record
//!
//! `ClassInfo` pairs a class's descriptor with a version counter and a table
//! of methods added at run time. The dynamic table is copy-and-replace: a
//! reader holding an earlier snapshot never sees a partial update.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::cached_class::ClassDescriptor;
use super::members::{select_method, ArgShape, CachedMethod, MemberHandle, MemberResolver};
use crate::ast::Modifiers;
use crate::vm::class::{RuntimeClass, RuntimeMethod};
use crate::vm::ReflectionResult;

pub struct ClassInfo {
    descriptor: Arc<ClassDescriptor>,
    version: AtomicU64,
    dynamic_methods: RwLock<Arc<Vec<CachedMethod>>>,
    /// Shared with the owning cache
    modification_count: Arc<AtomicU64>,
}

impl ClassInfo {
    pub(crate) fn new(descriptor: Arc<ClassDescriptor>, modification_count: Arc<AtomicU64>) -> Self {
        Self {
            descriptor,
            version: AtomicU64::new(0),
            dynamic_methods: RwLock::new(Arc::new(Vec::new())),
            modification_count,
        }
    }

    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    pub fn class(&self) -> &Arc<RuntimeClass> {
        self.descriptor.class()
    }

    /// Bumped on every mutation of this class's meta record
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Current snapshot of the dynamic method table
    pub fn dynamic_methods(&self) -> Arc<Vec<CachedMethod>> {
        Arc::clone(&self.dynamic_methods.read())
    }

    /// Add a method at run time. Later additions shadow earlier ones with
    /// the same name and shape.
    pub fn add_method(
        &self,
        name: &str,
        param_types: &[&str],
        return_type: &str,
        modifiers: Modifiers,
    ) -> CachedMethod {
        let class = self.class();
        let method = CachedMethod::new(
            RuntimeMethod::new(
                class.name(),
                name,
                param_types.iter().map(|p| p.to_string()).collect(),
                return_type,
                modifiers,
            ),
            Arc::clone(class),
        );

        {
            let mut table = self.dynamic_methods.write();
            let mut next = Vec::clone(&table);
            next.push(method.clone());
            *table = Arc::new(next);
        }
        self.bump();
        tracing::debug!(class = %class.name(), method = name, version = self.version(), "added dynamic method");
        method
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.modification_count.fetch_add(1, Ordering::AcqRel);
    }
}

impl MemberResolver for ClassInfo {
    fn resolve_member(&self, name: &str, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>> {
        let dynamic = self.dynamic_methods();
        let newest_first = dynamic.iter().rev().filter(|m| m.name() == name);
        if let Some(found) = select_method(newest_first, shape) {
            return Ok(Some(MemberHandle::Method(found.clone())));
        }
        self.descriptor.resolve_member(name, shape)
    }

    fn resolve_constructor(&self, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>> {
        self.descriptor.resolve_constructor(shape)
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("class", &self.descriptor.name())
            .field("version", &self.version())
            .field("dynamic_methods", &self.dynamic_methods.read().len())
            .finish()
    }
}
