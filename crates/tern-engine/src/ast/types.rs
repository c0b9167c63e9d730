//! Type references and the per-unit class arena
//!
//! Every class node of a compilation unit lives in one `ClassTable` and is
//! addressed by `ClassId`. The table is seeded with the built-in types the
//! semantic passes rely on (see `WellKnown`).

use std::fmt;
use std::ops::{Index, IndexMut};

use rustc_hash::{FxHashMap, FxHashSet};

use super::class::{ClassKind, ClassNode, ConstructorNode, FieldNode, MethodNode, Parameter};
use super::expression::ConstantValue;
use super::statement::Block;
use super::Modifiers;

/// Index of a class node inside its `ClassTable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Id carried by nodes not yet added to a table
    pub const PLACEHOLDER: ClassId = ClassId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a type from a declaration or expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A class known to the table
    Class { id: ClassId, name: String },
    /// Array of a component type
    Array(Box<TypeRef>),
    /// Name the resolver has not bound yet
    Unresolved(String),
}

impl TypeRef {
    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            TypeRef::Class { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            TypeRef::Class { .. } => true,
            TypeRef::Array(component) => component.is_resolved(),
            TypeRef::Unresolved(_) => false,
        }
    }

    /// Component type of an array reference
    pub fn component(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(component) => Some(component),
            _ => None,
        }
    }

    pub fn array_of(self) -> TypeRef {
        TypeRef::Array(Box::new(self))
    }

    /// Simple name; arrays render with a `[]` suffix
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Class { name, .. } => f.write_str(name),
            TypeRef::Array(component) => write!(f, "{}[]", component),
            TypeRef::Unresolved(name) => f.write_str(name),
        }
    }
}

/// Ids of the built-in types every table is seeded with
#[derive(Debug, Clone)]
pub struct WellKnown {
    pub object: ClassId,
    pub string: ClassId,
    pub class: ClassId,
    pub closure: ClassId,
    pub enum_base: ClassId,
    pub annotation: ClassId,
    pub map: ClassId,
    pub number: ClassId,
    pub illegal_argument: ClassId,
    pub boolean: ClassId,
    pub char: ClassId,
    pub int: ClassId,
    pub long: ClassId,
    pub float: ClassId,
    pub double: ClassId,
    /// Primitive id to wrapper id, for all eight primitives
    primitive_wrappers: Vec<(ClassId, ClassId)>,
}

impl WellKnown {
    /// Wrapper class of a primitive, or the type itself
    pub fn wrapper_of(&self, id: ClassId) -> ClassId {
        self.primitive_wrappers
            .iter()
            .find(|(prim, _)| *prim == id)
            .map(|(_, wrapper)| *wrapper)
            .unwrap_or(id)
    }

    pub fn is_wrapper(&self, id: ClassId) -> bool {
        self.primitive_wrappers.iter().any(|(_, wrapper)| *wrapper == id)
    }
}

const PRIMITIVES: [(&str, &str, bool); 8] = [
    ("boolean", "Boolean", false),
    ("char", "Character", false),
    ("byte", "Byte", true),
    ("short", "Short", true),
    ("int", "Integer", true),
    ("long", "Long", true),
    ("float", "Float", true),
    ("double", "Double", true),
];

/// Arena of class nodes for one compilation unit
#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: Vec<ClassNode>,
    by_name: FxHashMap<String, ClassId>,
    well_known: WellKnown,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTable {
    /// Create a table seeded with the built-in types
    pub fn new() -> Self {
        let placeholder = ClassId::PLACEHOLDER;
        let mut table = ClassTable {
            classes: Vec::new(),
            by_name: FxHashMap::default(),
            well_known: WellKnown {
                object: placeholder,
                string: placeholder,
                class: placeholder,
                closure: placeholder,
                enum_base: placeholder,
                annotation: placeholder,
                map: placeholder,
                number: placeholder,
                illegal_argument: placeholder,
                boolean: placeholder,
                char: placeholder,
                int: placeholder,
                long: placeholder,
                float: placeholder,
                double: placeholder,
                primitive_wrappers: Vec::new(),
            },
        };
        table.seed_builtins();
        table
    }

    fn add_builtin(&mut self, mut node: ClassNode) -> ClassId {
        node.builtin = true;
        node.variable_scope = None;
        self.add_class(node)
    }

    fn seed_builtins(&mut self) {
        let object = self.add_builtin(ClassNode::new("Object", ClassKind::Class));
        self.well_known.object = object;
        let object_ty = self.type_ref(object);

        let extends_object = |name: &str, kind: ClassKind| {
            ClassNode::new(name, kind).with_superclass(object_ty.clone())
        };

        let string = self.add_builtin(
            extends_object("String", ClassKind::Class).with_modifiers(Modifiers::PUBLIC | Modifiers::FINAL),
        );
        let class = self.add_builtin(extends_object("Class", ClassKind::Class));
        let number = self.add_builtin(
            extends_object("Number", ClassKind::Class).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT),
        );
        let annotation = self.add_builtin(ClassNode::new("Annotation", ClassKind::Interface));
        let map = self.add_builtin(ClassNode::new("Map", ClassKind::Interface));
        self.well_known.string = string;
        self.well_known.class = class;
        self.well_known.number = number;
        self.well_known.annotation = annotation;
        self.well_known.map = map;

        let number_ty = self.type_ref(number);
        for (prim_name, wrapper_name, numeric) in PRIMITIVES {
            let mut prim = ClassNode::new(prim_name, ClassKind::Primitive);
            prim.modifiers = Modifiers::PUBLIC | Modifiers::FINAL;
            let prim = self.add_builtin(prim);
            let wrapper_super = if numeric { number_ty.clone() } else { object_ty.clone() };
            let wrapper = self.add_builtin(
                ClassNode::new(wrapper_name, ClassKind::Class)
                    .with_superclass(wrapper_super)
                    .with_modifiers(Modifiers::PUBLIC | Modifiers::FINAL),
            );
            self.well_known.primitive_wrappers.push((prim, wrapper));
            match prim_name {
                "boolean" => self.well_known.boolean = prim,
                "char" => self.well_known.char = prim,
                "int" => self.well_known.int = prim,
                "long" => self.well_known.long = prim,
                "float" => self.well_known.float = prim,
                "double" => self.well_known.double = prim,
                _ => {}
            }
        }

        let string_ty = self.type_ref(string);
        let int_ty = self.type_ref(self.well_known.int);
        let class_ty = self.type_ref(class);

        // Closure(Object owner, Object thisObject)
        let mut closure = extends_object("Closure", ClassKind::Class)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        closure.add_constructor(ConstructorNode::new(
            Modifiers::PUBLIC,
            vec![
                Parameter::new("owner", object_ty.clone()),
                Parameter::new("thisObject", object_ty.clone()),
            ],
            Block::empty(),
        ));
        closure.add_method(MethodNode::new(
            "call",
            Modifiers::PUBLIC | Modifiers::VARARGS,
            object_ty.clone(),
            vec![Parameter::new("args", object_ty.clone().array_of())],
            Some(Block::empty()),
        ));
        self.well_known.closure = self.add_builtin(closure);

        // Enum(String name, int ordinal)
        let mut enum_base = extends_object("Enum", ClassKind::Class)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        enum_base.add_constructor(ConstructorNode::new(
            Modifiers::PROTECTED,
            vec![
                Parameter::new("name", string_ty.clone()),
                Parameter::new("ordinal", int_ty.clone()),
            ],
            Block::empty(),
        ));
        enum_base.add_method(MethodNode::new(
            "ordinal",
            Modifiers::PUBLIC | Modifiers::FINAL,
            int_ty,
            Vec::new(),
            Some(Block::empty()),
        ));
        enum_base.add_method(MethodNode::new(
            "name",
            Modifiers::PUBLIC | Modifiers::FINAL,
            string_ty.clone(),
            Vec::new(),
            Some(Block::empty()),
        ));
        enum_base.add_method(MethodNode::new(
            "valueOf",
            Modifiers::PUBLIC | Modifiers::STATIC,
            object_ty.clone(),
            vec![
                Parameter::new("enumType", class_ty),
                Parameter::new("name", string_ty.clone()),
            ],
            Some(Block::empty()),
        ));
        self.well_known.enum_base = self.add_builtin(enum_base);

        let mut illegal_argument = extends_object("IllegalArgumentException", ClassKind::Class);
        illegal_argument.add_constructor(ConstructorNode::new(
            Modifiers::PUBLIC,
            vec![Parameter::new("message", string_ty)],
            Block::empty(),
        ));
        self.well_known.illegal_argument = self.add_builtin(illegal_argument);
    }

    /// Add a class node, assigning its id
    pub fn add_class(&mut self, mut node: ClassNode) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        node.id = id;
        self.by_name.insert(node.name.clone(), id);
        self.classes.push(node);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassNode> {
        self.classes.get(id.index())
    }

    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassNode> {
        self.classes.get_mut(id.index())
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    /// Ids of all classes that came from source, in insertion order
    pub fn source_classes(&self) -> Vec<ClassId> {
        self.classes
            .iter()
            .filter(|c| !c.builtin)
            .map(|c| c.id)
            .collect()
    }

    /// Build a resolved reference to a class in this table
    pub fn type_ref(&self, id: ClassId) -> TypeRef {
        let name = self
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0));
        TypeRef::Class { id, name }
    }

    /// Resolved reference by name, or an unresolved one
    pub fn type_named(&self, name: &str) -> TypeRef {
        match self.lookup(name) {
            Some(id) => self.type_ref(id),
            None => TypeRef::Unresolved(name.to_string()),
        }
    }

    /// Bind unresolved names that the table now knows
    pub fn resolve(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Unresolved(name) => self.type_named(name),
            TypeRef::Array(component) => self.resolve(component).array_of(),
            TypeRef::Class { .. } => ty.clone(),
        }
    }

    pub fn superclass_of(&self, id: ClassId) -> Option<ClassId> {
        self.get(id)?.superclass.as_ref()?.class_id()
    }

    /// Whether `sub` is `sup` or extends/implements it, transitively
    pub fn is_derived_from(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut pending = vec![sub];
        let mut seen = FxHashSet::default();
        while let Some(current) = pending.pop() {
            if current == sup {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(node) = self.get(current) {
                if let Some(parent) = node.superclass.as_ref().and_then(TypeRef::class_id) {
                    pending.push(parent);
                }
                pending.extend(node.interfaces.iter().filter_map(TypeRef::class_id));
            }
        }
        false
    }

    /// `is_derived_from` lifted over type references; arrays compare by component
    pub fn is_type_derived_from(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        match (sub, sup) {
            (TypeRef::Array(a), TypeRef::Array(b)) => self.is_type_derived_from(a, b),
            (TypeRef::Class { id: a, .. }, TypeRef::Class { id: b, .. }) => self.is_derived_from(*a, *b),
            _ => false,
        }
    }

    pub fn wrapper_of(&self, id: ClassId) -> ClassId {
        self.well_known.wrapper_of(id)
    }

    pub fn is_primitive(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(ClassNode::is_primitive)
    }

    pub fn is_annotation(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(ClassNode::is_annotation)
    }

    pub fn is_enum(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(ClassNode::is_enum)
    }

    /// Primitives, their wrappers and `String`
    pub fn is_primitive_wrapper_or_string(&self, id: ClassId) -> bool {
        self.is_primitive(id) || self.well_known.is_wrapper(id) || id == self.well_known.string
    }

    /// Wrapper class a literal constant boxes to; `None` for `null`
    pub fn constant_type(&self, value: &ConstantValue) -> Option<ClassId> {
        let wk = &self.well_known;
        let prim = match value {
            ConstantValue::Null => return None,
            ConstantValue::String(_) => return Some(wk.string),
            ConstantValue::Bool(_) => wk.boolean,
            ConstantValue::Char(_) => wk.char,
            ConstantValue::Int(_) => wk.int,
            ConstantValue::Long(_) => wk.long,
            ConstantValue::Float(_) => wk.float,
            ConstantValue::Double(_) => wk.double,
        };
        Some(wk.wrapper_of(prim))
    }

    /// Per-constant bodies whose superclass is the given enum
    pub fn enum_constant_bodies(&self, enum_id: ClassId) -> Vec<ClassId> {
        self.classes
            .iter()
            .filter(|c| c.kind == ClassKind::EnumConstantBody)
            .filter(|c| c.superclass.as_ref().and_then(TypeRef::class_id) == Some(enum_id))
            .map(|c| c.id)
            .collect()
    }

    /// Method by name and arity, searched up the superclass chain
    pub fn find_method(&self, id: ClassId, name: &str, arity: usize) -> Option<(ClassId, &MethodNode)> {
        let mut current = Some(id);
        let mut seen = FxHashSet::default();
        while let Some(cid) = current {
            if !seen.insert(cid) {
                break;
            }
            let node = self.get(cid)?;
            if let Some(method) = node.method(name, arity) {
                return Some((cid, method));
            }
            current = self.superclass_of(cid);
        }
        None
    }

    /// Whether any method of the given name exists on the class or its superclasses
    pub fn has_method_named(&self, id: ClassId, name: &str) -> bool {
        let mut current = Some(id);
        let mut seen = FxHashSet::default();
        while let Some(cid) = current {
            if !seen.insert(cid) {
                break;
            }
            match self.get(cid) {
                Some(node) if node.methods_named(name).next().is_some() => return true,
                Some(_) => current = self.superclass_of(cid),
                None => break,
            }
        }
        false
    }

    /// Field by name, searched up the superclass chain
    pub fn find_field(&self, id: ClassId, name: &str) -> Option<(ClassId, &FieldNode)> {
        let mut current = Some(id);
        let mut seen = FxHashSet::default();
        while let Some(cid) = current {
            if !seen.insert(cid) {
                break;
            }
            let node = self.get(cid)?;
            if let Some(field) = node.field(name) {
                return Some((cid, field));
            }
            current = self.superclass_of(cid);
        }
        None
    }
}

impl Index<ClassId> for ClassTable {
    type Output = ClassNode;

    fn index(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.index()]
    }
}

impl IndexMut<ClassId> for ClassTable {
    fn index_mut(&mut self, id: ClassId) -> &mut ClassNode {
        &mut self.classes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_seeded() {
        let table = ClassTable::new();
        let wk = table.well_known();
        assert_eq!(table[wk.object].name, "Object");
        assert_eq!(table[wk.enum_base].constructors.len(), 1);
        assert!(table.source_classes().is_empty());
        assert_eq!(table.lookup("Integer"), Some(table.wrapper_of(wk.int)));
    }

    #[test]
    fn test_is_derived_from_walks_interfaces() {
        let mut table = ClassTable::new();
        let object = table.type_ref(table.well_known().object);
        let iface = table.add_class(ClassNode::new("Shape", ClassKind::Interface));
        let iface_ty = table.type_ref(iface);
        let circle = table.add_class(
            ClassNode::new("Circle", ClassKind::Class)
                .with_superclass(object)
                .with_interface(iface_ty),
        );
        assert!(table.is_derived_from(circle, iface));
        assert!(table.is_derived_from(circle, table.well_known().object));
        assert!(!table.is_derived_from(iface, circle));
    }

    #[test]
    fn test_constant_type_boxes() {
        let table = ClassTable::new();
        let integer = table.lookup("Integer").unwrap();
        assert_eq!(table.constant_type(&ConstantValue::Int(3)), Some(integer));
        assert_eq!(table.constant_type(&ConstantValue::Null), None);
        assert!(table.is_derived_from(integer, table.well_known().number));
    }

    #[test]
    fn test_resolve_and_display() {
        let table = ClassTable::new();
        let ty = TypeRef::Unresolved("String".to_string()).array_of();
        let resolved = table.resolve(&ty);
        assert!(resolved.is_resolved());
        assert_eq!(resolved.to_string(), "String[]");
        assert!(!TypeRef::Unresolved("Nope".into()).is_resolved());
    }
}
