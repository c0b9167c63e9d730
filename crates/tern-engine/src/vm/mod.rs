//! Tern reflective runtime core
//!
//! This module provides the run-time half of dynamic dispatch:
//! - Host reflection handles and the class loader (`class`)
//! - Revocable compute-once references (`reference`)
//! - Class-keyed memoized values (`class_value`)
//! - The reflected-member cache and per-class meta records (`reflect`)
//! - Runtime call sites (`call_site`)

pub mod call_site;
pub mod class;
pub mod class_value;
pub mod reference;
pub mod reflect;

pub use call_site::{CallSite, CallSiteArray, CallSiteStats};
pub use class::{
    AccessPolicy, ClassDefinition, ClassLoader, DenyAll, PermitAll, RuntimeClass,
    RuntimeConstructor, RuntimeField, RuntimeMethod,
};
pub use class_value::ClassValue;
pub use reference::{LazyReference, MemoryPressure, ReferenceManager, ReferenceStrength};
pub use reflect::{
    ArgShape, CachedConstructor, CachedField, CachedMethod, ClassDescriptor, ClassInfo,
    MemberHandle, MemberResolver, ReflectionCache,
};

use thiserror::Error;

/// Fatal failures while building reflective metadata
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReflectionError {
    /// Class was unloaded while its metadata was requested
    #[error("Class {0} has been unloaded")]
    ClassUnloaded(String),

    /// The reflection cache owning a descriptor no longer exists
    #[error("Reflection cache dropped while describing {0}")]
    CacheDropped(String),

    /// Class name not known to the loader
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// A class with the same name is already defined
    #[error("Class {0} is already defined")]
    DuplicateClass(String),

    /// Superclass or interface not yet defined
    #[error("Cannot define {class}: {missing} is not loaded")]
    MissingDependency { class: String, missing: String },

    /// Class node could not be turned into a runtime class
    #[error("Cannot define {class}: {reason}")]
    InvalidDefinition { class: String, reason: String },
}

/// Failures of a dynamic call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No member matches the name and argument shape
    #[error("No signature of method {class}.{name}() is applicable for {arity} argument(s)")]
    MissingMethod {
        class: String,
        name: String,
        arity: usize,
    },

    /// No constructor matches the argument shape
    #[error("Could not find matching constructor for {class} with {arity} argument(s)")]
    MissingConstructor { class: String, arity: usize },

    #[error(transparent)]
    Reflection(#[from] ReflectionError),
}

/// Access-control denial when widening member accessibility
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Access denied: cannot make {class}.{member} accessible")]
pub struct AccessDenied {
    pub class: String,
    pub member: String,
}

/// Result type for cache construction
pub type ReflectionResult<T> = Result<T, ReflectionError>;
