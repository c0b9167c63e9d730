//! Host reflection model
//!
//! `RuntimeClass` is the loaded-class handle the reflective caches are built
//! from. Its structure (members, superclass, interfaces) is immutable once
//! defined; only the accessibility flags of members and the class-value
//! slots change afterwards.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{AccessDenied, ReflectionError, ReflectionResult};
use crate::ast::{ClassId, ClassNode, ClassTable, Modifiers, TypeRef};
use crate::defaults::ROOT_TYPE;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// The universal root type, shared by every loader
static ROOT_CLASS: Lazy<Arc<RuntimeClass>> = Lazy::new(|| {
    let object = ROOT_TYPE.to_string();
    Arc::new(RuntimeClass {
        id: 0,
        name: object.clone(),
        modifiers: Modifiers::PUBLIC,
        superclass: None,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: vec![
            RuntimeMethod::new(&object, "equals", vec![object.clone()], "boolean", Modifiers::PUBLIC),
            RuntimeMethod::new(&object, "getClass", Vec::new(), "Class", Modifiers::PUBLIC | Modifiers::FINAL),
            RuntimeMethod::new(&object, "hashCode", Vec::new(), "int", Modifiers::PUBLIC),
            RuntimeMethod::new(&object, "toString", Vec::new(), "String", Modifiers::PUBLIC),
        ],
        constructors: vec![RuntimeConstructor::new(&object, Vec::new(), Modifiers::PUBLIC)],
        loaded: AtomicBool::new(true),
        slots: RwLock::new(FxHashMap::default()),
    })
});

// ============================================================================
// Access policy
// ============================================================================

/// Decides whether a non-public member may be made accessible
pub trait AccessPolicy: Send + Sync {
    fn check_accessible(&self, class: &str, member: &str) -> Result<(), AccessDenied>;
}

/// Allows every widening request
#[derive(Debug, Default, Clone, Copy)]
pub struct PermitAll;

impl AccessPolicy for PermitAll {
    fn check_accessible(&self, _class: &str, _member: &str) -> Result<(), AccessDenied> {
        Ok(())
    }
}

/// Denies every widening request
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl AccessPolicy for DenyAll {
    fn check_accessible(&self, class: &str, member: &str) -> Result<(), AccessDenied> {
        Err(AccessDenied {
            class: class.to_string(),
            member: member.to_string(),
        })
    }
}

fn widen(
    flag: &AtomicBool,
    policy: &dyn AccessPolicy,
    class: &str,
    member: &str,
) -> Result<(), AccessDenied> {
    if flag.load(Ordering::Acquire) {
        return Ok(());
    }
    policy.check_accessible(class, member)?;
    flag.store(true, Ordering::Release);
    Ok(())
}

// ============================================================================
// Members
// ============================================================================

/// A declared field
#[derive(Debug)]
pub struct RuntimeField {
    pub name: String,
    pub ty: String,
    pub modifiers: Modifiers,
    pub declaring_class: String,
    accessible: AtomicBool,
}

impl RuntimeField {
    pub fn new(declaring_class: &str, name: &str, ty: &str, modifiers: Modifiers) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ty: ty.to_string(),
            modifiers,
            declaring_class: declaring_class.to_string(),
            accessible: AtomicBool::new(modifiers.contains(Modifiers::PUBLIC)),
        })
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub fn set_accessible(&self, policy: &dyn AccessPolicy) -> Result<(), AccessDenied> {
        widen(&self.accessible, policy, &self.declaring_class, &self.name)
    }
}

/// A declared method
#[derive(Debug)]
pub struct RuntimeMethod {
    pub name: String,
    pub modifiers: Modifiers,
    pub param_types: Vec<String>,
    pub return_type: String,
    pub declaring_class: String,
    accessible: AtomicBool,
}

impl RuntimeMethod {
    pub fn new(
        declaring_class: &str,
        name: &str,
        param_types: Vec<String>,
        return_type: &str,
        modifiers: Modifiers,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            modifiers,
            param_types,
            return_type: return_type.to_string(),
            declaring_class: declaring_class.to_string(),
            accessible: AtomicBool::new(modifiers.contains(Modifiers::PUBLIC)),
        })
    }

    pub fn arity(&self) -> usize {
        self.param_types.len()
    }

    pub fn is_bridge(&self) -> bool {
        self.modifiers.contains(Modifiers::BRIDGE)
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub fn set_accessible(&self, policy: &dyn AccessPolicy) -> Result<(), AccessDenied> {
        widen(&self.accessible, policy, &self.declaring_class, &self.name)
    }
}

/// A declared constructor
#[derive(Debug)]
pub struct RuntimeConstructor {
    pub modifiers: Modifiers,
    pub param_types: Vec<String>,
    pub declaring_class: String,
    accessible: AtomicBool,
}

impl RuntimeConstructor {
    pub fn new(declaring_class: &str, param_types: Vec<String>, modifiers: Modifiers) -> Arc<Self> {
        Arc::new(Self {
            modifiers,
            param_types,
            declaring_class: declaring_class.to_string(),
            accessible: AtomicBool::new(modifiers.contains(Modifiers::PUBLIC)),
        })
    }

    pub fn arity(&self) -> usize {
        self.param_types.len()
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub fn set_accessible(&self, policy: &dyn AccessPolicy) -> Result<(), AccessDenied> {
        widen(&self.accessible, policy, &self.declaring_class, "<init>")
    }
}

// ============================================================================
// RuntimeClass
// ============================================================================

type SlotValue = Arc<dyn Any + Send + Sync>;

/// A loaded class
pub struct RuntimeClass {
    id: u64,
    name: String,
    modifiers: Modifiers,
    superclass: Option<Arc<RuntimeClass>>,
    interfaces: Vec<Arc<RuntimeClass>>,
    fields: Vec<Arc<RuntimeField>>,
    methods: Vec<Arc<RuntimeMethod>>,
    constructors: Vec<Arc<RuntimeConstructor>>,
    loaded: AtomicBool,
    /// Class-value slots keyed by `ClassValue` id
    slots: RwLock<FxHashMap<u64, SlotValue>>,
}

impl RuntimeClass {
    /// The universal root type
    pub fn root() -> Arc<RuntimeClass> {
        Arc::clone(&ROOT_CLASS)
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_interface(&self) -> bool {
        self.modifiers.contains(Modifiers::INTERFACE)
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_CLASS.id
    }

    pub fn superclass(&self) -> Option<&Arc<RuntimeClass>> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<RuntimeClass>] {
        &self.interfaces
    }

    pub fn declared_fields(&self) -> &[Arc<RuntimeField>] {
        &self.fields
    }

    pub fn declared_methods(&self) -> &[Arc<RuntimeMethod>] {
        &self.methods
    }

    pub fn declared_constructors(&self) -> &[Arc<RuntimeConstructor>] {
        &self.constructors
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Whether a value of `other` can be assigned to this type
    pub fn is_assignable_from(&self, other: &RuntimeClass) -> bool {
        if self.is_root() || self.id == other.id {
            return true;
        }
        other
            .superclass
            .iter()
            .chain(other.interfaces.iter())
            .any(|parent| self.is_assignable_from(parent))
    }

    pub(crate) fn slot(&self, key: u64) -> Option<SlotValue> {
        self.slots.read().get(&key).cloned()
    }

    /// Insert unless a value is already present; returns the visible value.
    /// An unloaded class keeps no slots, so `value` is handed back unstored.
    pub(crate) fn slot_insert_if_absent(&self, key: u64, value: SlotValue) -> SlotValue {
        let mut slots = self.slots.write();
        // unloading flips the flag before it takes this lock to clear
        if !self.is_loaded() {
            return value;
        }
        Arc::clone(slots.entry(key).or_insert(value))
    }

    pub(crate) fn slot_remove(&self, key: u64) -> Option<SlotValue> {
        self.slots.write().remove(&key)
    }

    fn mark_unloaded(&self) {
        self.loaded.store(false, Ordering::Release);
        self.slots.write().clear();
    }
}

impl fmt::Debug for RuntimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("modifiers", &self.modifiers)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name()))
            .field("methods", &self.methods.len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PartialEq for RuntimeClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RuntimeClass {}

// ============================================================================
// Class definitions
// ============================================================================

#[derive(Debug, Clone)]
struct MethodDefinition {
    name: String,
    params: Vec<String>,
    return_type: String,
    modifiers: Modifiers,
}

/// Builder describing a class to define
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    name: String,
    modifiers: Modifiers,
    superclass: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(String, String, Modifiers)>,
    methods: Vec<MethodDefinition>,
    constructors: Vec<(Vec<String>, Modifiers)>,
}

fn owned(params: &[&str]) -> Vec<String> {
    params.iter().map(|p| p.to_string()).collect()
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Modifiers::PUBLIC,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name).modifiers(Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT)
    }

    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, iface: impl Into<String>) -> Self {
        self.interfaces.push(iface.into());
        self
    }

    pub fn field(mut self, name: &str, ty: &str, modifiers: Modifiers) -> Self {
        self.fields.push((name.to_string(), ty.to_string(), modifiers));
        self
    }

    pub fn method(mut self, name: &str, params: &[&str], return_type: &str, modifiers: Modifiers) -> Self {
        self.methods.push(MethodDefinition {
            name: name.to_string(),
            params: owned(params),
            return_type: return_type.to_string(),
            modifiers,
        });
        self
    }

    pub fn constructor(mut self, params: &[&str], modifiers: Modifiers) -> Self {
        self.constructors.push((owned(params), modifiers));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// ClassLoader
// ============================================================================

/// Defines and unloads runtime classes
pub struct ClassLoader {
    classes: RwLock<FxHashMap<String, Arc<RuntimeClass>>>,
}

impl Default for ClassLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassLoader {
    /// Create a loader that already knows the root type
    pub fn new() -> Self {
        let mut classes = FxHashMap::default();
        let root = RuntimeClass::root();
        classes.insert(root.name().to_string(), root);
        Self {
            classes: RwLock::new(classes),
        }
    }

    pub fn root(&self) -> Arc<RuntimeClass> {
        RuntimeClass::root()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<RuntimeClass>> {
        self.classes.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    fn require(&self, class: &str, name: &str) -> ReflectionResult<Arc<RuntimeClass>> {
        self.lookup(name).ok_or_else(|| ReflectionError::MissingDependency {
            class: class.to_string(),
            missing: name.to_string(),
        })
    }

    /// Define a class; its superclass and interfaces must already be loaded
    pub fn define(&self, def: ClassDefinition) -> ReflectionResult<Arc<RuntimeClass>> {
        if self.classes.read().contains_key(&def.name) {
            return Err(ReflectionError::DuplicateClass(def.name));
        }

        let superclass = match &def.superclass {
            Some(name) => Some(self.require(&def.name, name)?),
            None if def.modifiers.contains(Modifiers::INTERFACE) => None,
            None => Some(self.root()),
        };
        let interfaces = def
            .interfaces
            .iter()
            .map(|name| self.require(&def.name, name))
            .collect::<ReflectionResult<Vec<_>>>()?;

        let class_name = def.name.clone();
        let fields = def
            .fields
            .iter()
            .map(|(name, ty, mods)| RuntimeField::new(&class_name, name, ty, *mods))
            .collect();
        let methods = def
            .methods
            .into_iter()
            .map(|m| RuntimeMethod::new(&class_name, &m.name, m.params, &m.return_type, m.modifiers))
            .collect();
        let constructors = def
            .constructors
            .into_iter()
            .map(|(params, mods)| RuntimeConstructor::new(&class_name, params, mods))
            .collect();

        let class = Arc::new(RuntimeClass {
            id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            name: class_name.clone(),
            modifiers: def.modifiers,
            superclass,
            interfaces,
            fields,
            methods,
            constructors,
            loaded: AtomicBool::new(true),
            slots: RwLock::new(FxHashMap::default()),
        });

        let mut classes = self.classes.write();
        if classes.contains_key(&class_name) {
            return Err(ReflectionError::DuplicateClass(class_name));
        }
        classes.insert(class_name.clone(), Arc::clone(&class));
        tracing::debug!(class = %class_name, id = class.id, "defined class");
        Ok(class)
    }

    /// Define a completed class node, first defining any built-in ancestors
    /// it needs. Source ancestors must already be loaded.
    pub fn define_from_node(&self, table: &ClassTable, id: ClassId) -> ReflectionResult<Arc<RuntimeClass>> {
        let node = table.get(id).ok_or_else(|| ReflectionError::InvalidDefinition {
            class: format!("#{}", id.0),
            reason: "class id not in table".to_string(),
        })?;
        if let Some(existing) = self.lookup(&node.name) {
            if node.builtin {
                return Ok(existing);
            }
            return Err(ReflectionError::DuplicateClass(node.name.clone()));
        }
        if node.is_primitive() {
            return Err(ReflectionError::InvalidDefinition {
                class: node.name.clone(),
                reason: "primitive types have no runtime class".to_string(),
            });
        }

        for parent in node.superclass.iter().chain(node.interfaces.iter()) {
            let Some(parent_id) = parent.class_id() else {
                return Err(ReflectionError::MissingDependency {
                    class: node.name.clone(),
                    missing: parent.to_string(),
                });
            };
            let parent_node = &table[parent_id];
            if parent_node.builtin && self.lookup(&parent_node.name).is_none() {
                self.define_from_node(table, parent_id)?;
            }
        }

        self.define(definition_from_node(node))
    }

    /// Unload a class: its slots are cleared and descriptors built from it
    /// fail from now on. The root type cannot be unloaded.
    pub fn unload(&self, name: &str) -> Option<Arc<RuntimeClass>> {
        if name == ROOT_TYPE {
            return None;
        }
        let class = self.classes.write().remove(name)?;
        class.mark_unloaded();
        tracing::debug!(class = %name, "unloaded class");
        Some(class)
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoader")
            .field("classes", &self.classes.read().len())
            .finish()
    }
}

fn type_names(params: &[crate::ast::Parameter]) -> Vec<String> {
    params.iter().map(|p| p.ty.to_string()).collect()
}

fn definition_from_node(node: &ClassNode) -> ClassDefinition {
    let mut def = ClassDefinition::new(node.name.clone()).modifiers(node.modifiers);
    def.superclass = node.superclass.as_ref().map(TypeRef::to_string);
    def.interfaces = node.interfaces.iter().map(TypeRef::to_string).collect();
    def.fields = node
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.ty.to_string(), f.modifiers))
        .collect();
    def.methods = node
        .methods
        .iter()
        .map(|m| MethodDefinition {
            name: m.name.clone(),
            params: type_names(&m.parameters),
            return_type: m.return_type.to_string(),
            modifiers: m.modifiers,
        })
        .collect();
    def.constructors = node
        .constructors
        .iter()
        .map(|c| (type_names(&c.parameters), c.modifiers))
        .collect();
    def
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_defaults_to_root_superclass() {
        let loader = ClassLoader::new();
        let class = loader
            .define(ClassDefinition::new("Point").method("x", &[], "int", Modifiers::PUBLIC))
            .unwrap();
        assert!(class.superclass().unwrap().is_root());
        assert_eq!(class.declared_methods().len(), 1);
        assert!(loader.lookup("Point").is_some());
    }

    #[test]
    fn test_define_requires_dependencies() {
        let loader = ClassLoader::new();
        let err = loader
            .define(ClassDefinition::new("Circle").extends("Shape"))
            .unwrap_err();
        assert_eq!(
            err,
            ReflectionError::MissingDependency {
                class: "Circle".into(),
                missing: "Shape".into()
            }
        );
        loader.define(ClassDefinition::new("Dup")).unwrap();
        assert!(matches!(
            loader.define(ClassDefinition::new("Dup")),
            Err(ReflectionError::DuplicateClass(_))
        ));
    }

    #[test]
    fn test_unload_clears_slots() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Temp")).unwrap();
        class.slot_insert_if_absent(1, Arc::new(5u32));
        assert!(class.slot(1).is_some());
        loader.unload("Temp").unwrap();
        assert!(!class.is_loaded());
        assert!(class.slot(1).is_none());
        assert!(loader.unload(ROOT_TYPE).is_none());
    }

    #[test]
    fn test_unloaded_class_rejects_slot_insert() {
        let loader = ClassLoader::new();
        let class = loader.define(ClassDefinition::new("Closed")).unwrap();
        loader.unload("Closed");
        let offered: SlotValue = Arc::new(9u32);
        let visible = class.slot_insert_if_absent(1, Arc::clone(&offered));
        assert!(Arc::ptr_eq(&visible, &offered));
        assert!(class.slot(1).is_none());
    }

    #[test]
    fn test_accessibility_widening() {
        let loader = ClassLoader::new();
        let class = loader
            .define(ClassDefinition::new("Secret").method("hidden", &[], "void", Modifiers::PRIVATE))
            .unwrap();
        let method = &class.declared_methods()[0];
        assert!(!method.is_accessible());
        assert!(method.set_accessible(&DenyAll).is_err());
        assert!(!method.is_accessible());
        method.set_accessible(&PermitAll).unwrap();
        assert!(method.is_accessible());
    }

    #[test]
    fn test_is_assignable_from() {
        let loader = ClassLoader::new();
        let shape = loader.define(ClassDefinition::interface("Shape")).unwrap();
        let circle = loader
            .define(ClassDefinition::new("Round").implements("Shape"))
            .unwrap();
        assert!(shape.is_assignable_from(&circle));
        assert!(!circle.is_assignable_from(&shape));
        assert!(loader.root().is_assignable_from(&shape));
    }
}
