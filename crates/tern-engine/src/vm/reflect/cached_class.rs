//! Reflected-member cache for one class
//!
//! A `ClassDescriptor` lazily builds and memoizes the reflective view of a
//! runtime class. Each collection sits in its own `LazyReference`:
//!
//! | slot                  | strength |
//! |-----------------------|----------|
//! | fields                | soft     |
//! | constructors          | soft     |
//! | methods (normal, mop) | soft     |
//! | declared interfaces   | soft     |
//! | superclass            | soft     |
//! | all interfaces        | weak     |
//! | hierarchy             | weak     |
//!
//! Reclaimed slots are rebuilt on next access from the class structure, which
//! never changes after definition, so rebuilds reproduce the same contents.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::cache::CacheShared;
use super::members::{
    is_mop_name, select_method, ArgShape, CachedConstructor, CachedField, CachedMethod,
    MemberHandle, MemberResolver,
};
use crate::defaults::DUPLICATE_OVERLOAD_MARKER;
use crate::vm::class::RuntimeClass;
use crate::vm::reference::{LazyReference, ReferenceManager, ReferenceStrength};
use crate::vm::{ReflectionError, ReflectionResult};

/// Declared methods split into ordinary and mop methods
#[derive(Debug, Default)]
pub struct MethodTable {
    /// Sorted by natural order for binary search
    pub normal: Vec<CachedMethod>,
    /// This class's and inherited mop methods, sorted by name
    pub mop: Vec<CachedMethod>,
}

impl MethodTable {
    /// All ordinary methods with the given name
    pub fn find(&self, name: &str) -> &[CachedMethod] {
        name_range(&self.normal, name)
    }

    pub fn find_mop(&self, name: &str) -> &[CachedMethod] {
        name_range(&self.mop, name)
    }
}

fn name_range<'a>(sorted: &'a [CachedMethod], name: &str) -> &'a [CachedMethod] {
    let start = sorted.partition_point(|m| m.name() < name);
    let len = sorted[start..].partition_point(|m| m.name() == name);
    &sorted[start..start + len]
}

type DescriptorList = Vec<Arc<ClassDescriptor>>;

/// Cached reflective view of a runtime class
pub struct ClassDescriptor {
    class: Arc<RuntimeClass>,
    cache: Weak<CacheShared>,
    fields: Arc<LazyReference<Vec<CachedField>>>,
    constructors: Arc<LazyReference<Vec<CachedConstructor>>>,
    methods: Arc<LazyReference<MethodTable>>,
    declared_interfaces: Arc<LazyReference<DescriptorList>>,
    superclass: Arc<LazyReference<Option<Arc<ClassDescriptor>>>>,
    all_interfaces: Arc<LazyReference<DescriptorList>>,
    hierarchy: Arc<LazyReference<DescriptorList>>,
    /// Memoized distance to the root, guarded per class
    distance: Mutex<Option<usize>>,
}

impl ClassDescriptor {
    pub(crate) fn new(
        class: Arc<RuntimeClass>,
        cache: Weak<CacheShared>,
        manager: &Arc<ReferenceManager>,
    ) -> Self {
        let soft = ReferenceStrength::Soft;
        let weak = ReferenceStrength::Weak;
        Self {
            class,
            cache,
            fields: LazyReference::new(soft, Arc::clone(manager)),
            constructors: LazyReference::new(soft, Arc::clone(manager)),
            methods: LazyReference::new(soft, Arc::clone(manager)),
            declared_interfaces: LazyReference::new(soft, Arc::clone(manager)),
            superclass: LazyReference::new(soft, Arc::clone(manager)),
            all_interfaces: LazyReference::new(weak, Arc::clone(manager)),
            hierarchy: LazyReference::new(weak, Arc::clone(manager)),
            distance: Mutex::new(None),
        }
    }

    pub fn class(&self) -> &Arc<RuntimeClass> {
        &self.class
    }

    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn is_interface(&self) -> bool {
        self.class.is_interface()
    }

    fn shared(&self) -> ReflectionResult<Arc<CacheShared>> {
        if !self.class.is_loaded() {
            return Err(ReflectionError::ClassUnloaded(self.name().to_string()));
        }
        self.cache
            .upgrade()
            .ok_or_else(|| ReflectionError::CacheDropped(self.name().to_string()))
    }

    fn log_build(&self, slot: &'static str) {
        tracing::debug!(class = %self.name(), slot, "building reflective metadata");
    }

    /// Declared fields; inaccessible ones are widened best-effort
    pub fn fields(&self) -> ReflectionResult<Arc<Vec<CachedField>>> {
        let shared = self.shared()?;
        self.fields.get_or_try_init(|| {
            self.log_build("fields");
            let fields = self
                .class
                .declared_fields()
                .iter()
                .map(|f| {
                    if let Err(denied) = f.set_accessible(shared.policy()) {
                        tracing::trace!(%denied, "keeping default field visibility");
                    }
                    CachedField::new(Arc::clone(f), Arc::clone(&self.class))
                })
                .collect();
            Ok(fields)
        })
    }

    pub fn constructors(&self) -> ReflectionResult<Arc<Vec<CachedConstructor>>> {
        let shared = self.shared()?;
        self.constructors.get_or_try_init(|| {
            self.log_build("constructors");
            let ctors = self
                .class
                .declared_constructors()
                .iter()
                .map(|c| {
                    if let Err(denied) = c.set_accessible(shared.policy()) {
                        tracing::trace!(%denied, "keeping default constructor visibility");
                    }
                    CachedConstructor::new(Arc::clone(c), Arc::clone(&self.class))
                })
                .collect();
            Ok(ctors)
        })
    }

    /// Declared methods, partitioned. Bridge methods and internal duplicate
    /// overloads are skipped; mop methods of the superclass are merged in.
    pub fn methods(&self) -> ReflectionResult<Arc<MethodTable>> {
        let shared = self.shared()?;
        self.methods.get_or_try_init(|| {
            self.log_build("methods");
            let mut table = MethodTable::default();
            for method in self.class.declared_methods() {
                if method.is_bridge() || method.name.contains(DUPLICATE_OVERLOAD_MARKER) {
                    continue;
                }
                if let Err(denied) = method.set_accessible(shared.policy()) {
                    tracing::trace!(%denied, "keeping default method visibility");
                }
                let cached = CachedMethod::new(Arc::clone(method), Arc::clone(&self.class));
                if is_mop_name(&method.name) {
                    table.mop.push(cached);
                } else {
                    table.normal.push(cached);
                }
            }
            if let Some(superclass) = self.superclass()?.as_deref() {
                table.mop.extend(superclass.methods()?.mop.iter().cloned());
            }
            table.normal.sort_by(CachedMethod::natural_cmp);
            table.mop.sort_by(CachedMethod::name_cmp);
            Ok(table)
        })
    }

    pub fn declared_interfaces(&self) -> ReflectionResult<Arc<DescriptorList>> {
        let shared = self.shared()?;
        self.declared_interfaces.get_or_try_init(|| {
            self.log_build("declared_interfaces");
            self.class
                .interfaces()
                .iter()
                .map(|iface| shared.descriptor(iface))
                .collect()
        })
    }

    /// Descriptor of the superclass; `None` for the root and for interfaces
    pub fn superclass(&self) -> ReflectionResult<Arc<Option<Arc<ClassDescriptor>>>> {
        let shared = self.shared()?;
        self.superclass.get_or_try_init(|| {
            self.log_build("superclass");
            self.class
                .superclass()
                .map(|s| shared.descriptor(s))
                .transpose()
        })
    }

    /// Transitive interface set; includes this descriptor when it is an interface
    pub fn all_interfaces(&self) -> ReflectionResult<Arc<DescriptorList>> {
        let shared = self.shared()?;
        let inherited = self.all_interfaces.get_or_try_init(|| {
            self.log_build("all_interfaces");
            let mut set: IndexMap<u64, Arc<ClassDescriptor>> = IndexMap::new();
            for iface in self.declared_interfaces()?.iter() {
                self.merge(&mut set, &iface.all_interfaces()?);
            }
            if let Some(superclass) = self.superclass()?.as_deref() {
                self.merge(&mut set, &superclass.all_interfaces()?);
            }
            Ok(set.into_values().collect())
        })?;
        if !self.is_interface() {
            return Ok(inherited);
        }
        self.with_self_first(&shared, &inherited)
    }

    /// Insertion-ordered, deduplicated: self, each declared interface's
    /// hierarchy, the superclass hierarchy, and the root for interfaces.
    pub fn hierarchy(&self) -> ReflectionResult<Arc<DescriptorList>> {
        let shared = self.shared()?;
        let ancestors = self.hierarchy.get_or_try_init(|| {
            self.log_build("hierarchy");
            let mut set: IndexMap<u64, Arc<ClassDescriptor>> = IndexMap::new();
            for iface in self.declared_interfaces()?.iter() {
                self.merge(&mut set, &iface.hierarchy()?);
            }
            if let Some(superclass) = self.superclass()?.as_deref() {
                self.merge(&mut set, &superclass.hierarchy()?);
            }
            if self.is_interface() {
                let root = shared.root_descriptor()?;
                set.entry(root.class.id()).or_insert(root);
            }
            Ok(set.into_values().collect())
        })?;
        self.with_self_first(&shared, &ancestors)
    }

    /// Cached lists never hold this descriptor: it would own itself and keep
    /// an unloaded class alive.
    fn merge(&self, set: &mut IndexMap<u64, Arc<ClassDescriptor>>, list: &[Arc<ClassDescriptor>]) {
        for d in list.iter().filter(|d| d.class.id() != self.class.id()) {
            set.entry(d.class.id()).or_insert_with(|| Arc::clone(d));
        }
    }

    fn with_self_first(&self, shared: &CacheShared, rest: &[Arc<ClassDescriptor>]) -> ReflectionResult<Arc<DescriptorList>> {
        let mut list = Vec::with_capacity(rest.len() + 1);
        list.push(shared.descriptor(&self.class)?);
        list.extend(rest.iter().cloned());
        Ok(Arc::new(list))
    }

    /// Classes on the chain from this one to the root, self included
    pub fn super_class_distance(&self) -> ReflectionResult<usize> {
        let mut distance = self.distance.lock();
        if let Some(d) = *distance {
            return Ok(d);
        }
        let computed = match self.superclass()?.as_deref() {
            Some(superclass) => superclass.super_class_distance()? + 1,
            None => 1,
        };
        *distance = Some(computed);
        Ok(computed)
    }

    pub fn is_assignable_from(&self, other: &ClassDescriptor) -> bool {
        self.class.is_assignable_from(&other.class)
    }

    /// Hierarchy in resolution order: the root type is searched last
    fn resolution_order(&self) -> ReflectionResult<Vec<Arc<ClassDescriptor>>> {
        let hierarchy = self.hierarchy()?;
        let (root, rest): (Vec<_>, Vec<_>) = hierarchy
            .iter()
            .cloned()
            .partition(|d| d.class.is_root());
        Ok(rest.into_iter().chain(root).collect())
    }

    /// Field by name, searched up the superclass chain
    pub fn find_field(&self, name: &str) -> ReflectionResult<Option<CachedField>> {
        if let Some(field) = self.fields()?.iter().find(|f| f.name() == name) {
            return Ok(Some(field.clone()));
        }
        match self.superclass()?.as_deref() {
            Some(superclass) => superclass.find_field(name),
            None => Ok(None),
        }
    }
}

impl MemberResolver for ClassDescriptor {
    fn resolve_member(&self, name: &str, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>> {
        let order = self.resolution_order()?;
        let mut abstract_match = None;
        for descriptor in &order {
            let methods = descriptor.methods()?;
            if let Some(found) = select_method(methods.find(name), shape) {
                if !found.is_abstract() {
                    return Ok(Some(MemberHandle::Method(found.clone())));
                }
                abstract_match.get_or_insert_with(|| found.clone());
            }
        }
        if let Some(found) = abstract_match {
            return Ok(Some(MemberHandle::Method(found)));
        }
        if shape.arity == 0 {
            return Ok(self.find_field(name)?.map(MemberHandle::Field));
        }
        Ok(None)
    }

    fn resolve_constructor(&self, shape: ArgShape) -> ReflectionResult<Option<MemberHandle>> {
        let ctors = self.constructors()?;
        let exact = ctors.iter().find(|c| c.arity() == shape.arity);
        let found = exact.or_else(|| ctors.iter().find(|c| c.accepts(shape)));
        Ok(found.cloned().map(MemberHandle::Constructor))
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.class.id() == other.class.id()
    }
}

impl Eq for ClassDescriptor {}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("class", &self.name())
            .field("methods_cached", &self.methods.is_computed())
            .field("hierarchy_cached", &self.hierarchy.is_computed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Modifiers;
    use crate::options::RuntimeOptions;
    use crate::vm::class::{ClassDefinition, ClassLoader};
    use crate::vm::reflect::ReflectionCache;

    fn names(list: &[Arc<ClassDescriptor>]) -> Vec<&str> {
        list.iter().map(|d| d.name()).collect()
    }

    #[test]
    fn test_method_partition() {
        let loader = ClassLoader::new();
        let base = loader
            .define(
                ClassDefinition::new("Base")
                    .method("super$1$toString", &[], "String", Modifiers::PUBLIC)
                    .method("run", &[], "void", Modifiers::PUBLIC),
            )
            .unwrap();
        let _ = base;
        let derived = loader
            .define(
                ClassDefinition::new("Derived")
                    .extends("Base")
                    .method("zeta", &[], "void", Modifiers::PUBLIC)
                    .method("alpha", &[], "void", Modifiers::PUBLIC)
                    .method("alpha", &[], "Object", Modifiers::PUBLIC | Modifiers::BRIDGE)
                    .method("alpha+1", &[], "void", Modifiers::PUBLIC)
                    .method("this$dist$invoke$2", &["String"], "Object", Modifiers::PUBLIC),
            )
            .unwrap();

        let cache = ReflectionCache::new(RuntimeOptions::default());
        let table = cache.descriptor(&derived).unwrap().methods().unwrap();
        let normal: Vec<&str> = table.normal.iter().map(|m| m.name()).collect();
        let mop: Vec<&str> = table.mop.iter().map(|m| m.name()).collect();
        assert_eq!(normal, vec!["alpha", "zeta"]);
        assert_eq!(mop, vec!["super$1$toString", "this$dist$invoke$2"]);
        assert_eq!(table.find("alpha").len(), 1);
        assert!(table.find("missing").is_empty());
    }

    #[test]
    fn test_hierarchy_of_interface_ends_with_root() {
        let loader = ClassLoader::new();
        loader.define(ClassDefinition::interface("Named")).unwrap();
        let sized = loader
            .define(ClassDefinition::interface("Sized").implements("Named"))
            .unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        let d = cache.descriptor(&sized).unwrap();
        assert_eq!(names(&d.hierarchy().unwrap()), vec!["Sized", "Named", "Object"]);
        assert_eq!(names(&d.all_interfaces().unwrap()), vec!["Sized", "Named"]);
        assert!(d.superclass().unwrap().is_none());
        assert_eq!(d.super_class_distance().unwrap(), 1);
    }

    #[test]
    fn test_hierarchy_deduplicates_diamond() {
        let loader = ClassLoader::new();
        loader.define(ClassDefinition::interface("Top")).unwrap();
        loader.define(ClassDefinition::interface("Left").implements("Top")).unwrap();
        loader.define(ClassDefinition::interface("Right").implements("Top")).unwrap();
        loader
            .define(ClassDefinition::new("Parent").implements("Left"))
            .unwrap();
        let child = loader
            .define(ClassDefinition::new("Child").extends("Parent").implements("Right"))
            .unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        let d = cache.descriptor(&child).unwrap();
        let hierarchy = d.hierarchy().unwrap();
        assert_eq!(
            names(&hierarchy),
            vec!["Child", "Right", "Top", "Object", "Parent", "Left"]
        );
        assert_eq!(names(&d.all_interfaces().unwrap()), vec!["Right", "Top", "Left"]);
        assert_eq!(d.super_class_distance().unwrap(), 3);
    }

    #[test]
    fn test_unloaded_class_is_fatal() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Brief")).unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        let d = cache.descriptor(&class).unwrap();
        loader.unload("Brief");
        assert_eq!(
            d.methods().unwrap_err(),
            ReflectionError::ClassUnloaded("Brief".to_string())
        );
    }

    #[test]
    fn test_dropped_cache_is_fatal() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Orphan")).unwrap();
        let d = {
            let cache = ReflectionCache::new(RuntimeOptions::default());
            cache.descriptor(&class).unwrap()
        };
        assert!(matches!(d.fields(), Err(ReflectionError::CacheDropped(_))));
    }

    #[test]
    fn test_resolution_prefers_superclass_over_root() {
        let loader = ClassLoader::new();
        loader
            .define(ClassDefinition::new("Pretty").method("toString", &[], "String", Modifiers::PUBLIC))
            .unwrap();
        loader.define(ClassDefinition::interface("Marker")).unwrap();
        let class = loader
            .define(ClassDefinition::new("Fancy").extends("Pretty").implements("Marker"))
            .unwrap();
        let cache = ReflectionCache::new(RuntimeOptions::default());
        let d = cache.descriptor(&class).unwrap();
        let handle = d.resolve_member("toString", ArgShape::of(0)).unwrap().unwrap();
        assert_eq!(handle.declaring_class(), "Pretty");
    }
}
