//! Process-wide reflection registry
//!
//! `ReflectionCache` hands out one `ClassInfo` (and with it one
//! `ClassDescriptor`) per loaded class, backed by a `ClassValue`. Use
//! `ReflectionCache::global()` for the process registry, or build an
//! independent instance when isolation is needed (tests, sandboxes).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use super::cached_class::ClassDescriptor;
use super::class_info::ClassInfo;
use crate::options::RuntimeOptions;
use crate::vm::class::{AccessPolicy, PermitAll, RuntimeClass};
use crate::vm::class_value::ClassValue;
use crate::vm::reference::{MemoryPressure, ReferenceManager};
use crate::vm::{ReflectionError, ReflectionResult};

static GLOBAL: OnceCell<ReflectionCache> = OnceCell::new();

/// State shared between the registry and the descriptors it created
pub(crate) struct CacheShared {
    infos: ClassValue<ClassInfo>,
    manager: Arc<ReferenceManager>,
    policy: Arc<dyn AccessPolicy>,
    modification_count: Arc<AtomicU64>,
    options: RuntimeOptions,
}

impl CacheShared {
    pub(crate) fn policy(&self) -> &dyn AccessPolicy {
        self.policy.as_ref()
    }

    pub(crate) fn class_info(&self, class: &Arc<RuntimeClass>) -> ReflectionResult<Arc<ClassInfo>> {
        if !class.is_loaded() {
            return Err(ReflectionError::ClassUnloaded(class.name().to_string()));
        }
        Ok(self.infos.get(class))
    }

    pub(crate) fn descriptor(&self, class: &Arc<RuntimeClass>) -> ReflectionResult<Arc<ClassDescriptor>> {
        Ok(Arc::clone(self.class_info(class)?.descriptor()))
    }

    pub(crate) fn root_descriptor(&self) -> ReflectionResult<Arc<ClassDescriptor>> {
        self.descriptor(&RuntimeClass::root())
    }
}

/// Registry of reflective metadata
pub struct ReflectionCache {
    shared: Arc<CacheShared>,
}

impl ReflectionCache {
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_access_policy(options, Arc::new(PermitAll))
    }

    pub fn with_access_policy(options: RuntimeOptions, policy: Arc<dyn AccessPolicy>) -> Self {
        let manager = ReferenceManager::new();
        let modification_count = Arc::new(AtomicU64::new(0));

        let shared = Arc::new_cyclic(|weak: &Weak<CacheShared>| {
            let owner = weak.clone();
            let info_manager = Arc::clone(&manager);
            let info_count = Arc::clone(&modification_count);
            let infos = ClassValue::from_options(&options, move |class: &Arc<RuntimeClass>| {
                tracing::debug!(class = %class.name(), "creating class info");
                let descriptor = ClassDescriptor::new(Arc::clone(class), owner.clone(), &info_manager);
                ClassInfo::new(Arc::new(descriptor), Arc::clone(&info_count))
            });
            CacheShared {
                infos,
                manager,
                policy,
                modification_count,
                options,
            }
        });
        Self { shared }
    }

    /// The process-wide cache, created with default options on first use
    pub fn global() -> &'static ReflectionCache {
        GLOBAL.get_or_init(|| ReflectionCache::new(RuntimeOptions::default()))
    }

    /// Initialize the process-wide cache with explicit options. Returns
    /// `false` if it was already initialized.
    pub fn init_global(options: RuntimeOptions) -> bool {
        let mut installed = false;
        GLOBAL.get_or_init(|| {
            installed = true;
            ReflectionCache::new(options)
        });
        installed
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.shared.options
    }

    /// Meta record of a loaded class
    pub fn class_info(&self, class: &Arc<RuntimeClass>) -> ReflectionResult<Arc<ClassInfo>> {
        self.shared.class_info(class)
    }

    pub fn descriptor(&self, class: &Arc<RuntimeClass>) -> ReflectionResult<Arc<ClassDescriptor>> {
        self.shared.descriptor(class)
    }

    /// Descriptor of the universal root type
    pub fn root_descriptor(&self) -> ReflectionResult<Arc<ClassDescriptor>> {
        self.shared.root_descriptor()
    }

    /// Drop the meta record of an unloaded class and invalidate call sites
    pub fn on_class_unloaded(&self, class: &RuntimeClass) {
        if self.shared.infos.remove(class).is_some() {
            tracing::debug!(class = %class.name(), "dropped class info");
        }
        self.shared.modification_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Cache-wide mutation counter; call-site entries older than this are stale
    pub fn modification_count(&self) -> u64 {
        self.shared.modification_count.load(Ordering::Acquire)
    }

    /// Whether a value of `sub` can be assigned to `sup`
    pub fn is_assignable(&self, sup: &RuntimeClass, sub: &RuntimeClass) -> bool {
        sup.is_assignable_from(sub)
    }

    pub fn reference_manager(&self) -> &Arc<ReferenceManager> {
        &self.shared.manager
    }

    /// Reclaim cached metadata as if under memory pressure
    pub fn reclaim(&self, pressure: MemoryPressure) -> usize {
        self.shared.manager.reclaim(pressure)
    }
}

impl fmt::Debug for ReflectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionCache")
            .field("strategy", &self.shared.infos.strategy())
            .field("modification_count", &self.modification_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Modifiers;
    use crate::vm::class::{ClassDefinition, ClassLoader, DenyAll};

    #[test]
    fn test_same_descriptor_per_class() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Once")).unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        let a = cache.descriptor(&class).unwrap();
        let b = cache.descriptor(&class).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.root_descriptor().unwrap().class().is_root());
    }

    #[test]
    fn test_access_denial_is_swallowed() {
        let loader = ClassLoader::new();
        let class = loader
            .define(
                ClassDefinition::new("Guarded")
                    .field("secret", "String", Modifiers::PRIVATE)
                    .method("hidden", &[], "void", Modifiers::PRIVATE),
            )
            .unwrap();
        let cache = ReflectionCache::with_access_policy(RuntimeOptions::default(), Arc::new(DenyAll));
        let d = cache.descriptor(&class).unwrap();
        let fields = d.fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert!(!fields[0].handle().is_accessible());
        assert_eq!(d.methods().unwrap().normal.len(), 1);
    }

    #[test]
    fn test_unloaded_class_has_no_info() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Fleeting")).unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        cache.class_info(&class).unwrap();
        let before = cache.modification_count();
        loader.unload("Fleeting");
        cache.on_class_unloaded(&class);
        assert!(matches!(
            cache.class_info(&class),
            Err(ReflectionError::ClassUnloaded(_))
        ));
        assert_eq!(cache.modification_count(), before + 1);
    }

    #[test]
    fn test_global_is_shared() {
        let a = ReflectionCache::global() as *const ReflectionCache;
        let b = ReflectionCache::global() as *const ReflectionCache;
        assert_eq!(a, b);
        assert!(!ReflectionCache::init_global(RuntimeOptions::default()));
    }
}
