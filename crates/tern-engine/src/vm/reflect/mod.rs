//! Reflected-member cache
//!
//! - `members`: cached method/constructor/field wrappers and the
//!   `MemberResolver` capability
//! - `cached_class`: `ClassDescriptor`, the lazily-built view of one class
//! - `class_info`: per-class meta record with a dynamic method table
//! - `cache`: the `ReflectionCache` registry

pub mod cache;
pub mod cached_class;
pub mod class_info;
pub mod members;

pub use cache::ReflectionCache;
pub use cached_class::{ClassDescriptor, MethodTable};
pub use class_info::ClassInfo;
pub use members::{
    ArgShape, CachedConstructor, CachedField, CachedMethod, MemberHandle, MemberResolver,
};
