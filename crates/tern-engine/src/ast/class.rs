//! Class and member nodes

use super::annotation::AnnotationNode;
use super::expression::{ConstructorCallExpr, Expression};
use super::statement::{Block, Statement};
use super::types::{ClassId, TypeRef};
use super::{Modifiers, Span};

/// What kind of type a class node declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
    Enum,
    /// Class body attached to a single enum constant
    EnumConstantBody,
    Primitive,
}

/// Variables declared and referenced inside a class body.
///
/// Resolution attaches a scope to every class it walks. Per-constant enum
/// bodies synthesized by the parser have none until they are resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableScope {
    pub declared: Vec<String>,
    pub referenced: Vec<String>,
}

/// A class, interface, annotation type, enum or primitive
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    /// Assigned by the owning `ClassTable`
    pub id: ClassId,
    pub name: String,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    /// `None` only for the root type, interfaces and primitives
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
    pub constructors: Vec<ConstructorNode>,
    /// Statements of the static initializer, in execution order
    pub static_initializer: Vec<Statement>,
    pub annotations: Vec<AnnotationNode>,
    pub variable_scope: Option<VariableScope>,
    /// Enclosing class for inner classes
    pub outer: Option<ClassId>,
    /// Built-in (precompiled) classes are not rewritten by the pipeline
    pub builtin: bool,
    /// Set once an annotation type's attribute defaults were checked for cycles
    pub definition_checked: bool,
    pub span: Span,
}

impl ClassNode {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        let modifiers = match kind {
            ClassKind::Interface => Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT,
            ClassKind::Annotation => {
                Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT | Modifiers::ANNOTATION
            }
            ClassKind::Enum => Modifiers::PUBLIC | Modifiers::FINAL | Modifiers::ENUM,
            ClassKind::EnumConstantBody => Modifiers::ENUM | Modifiers::FINAL,
            ClassKind::Class | ClassKind::Primitive => Modifiers::PUBLIC,
        };
        Self {
            id: ClassId::PLACEHOLDER,
            name: name.into(),
            kind,
            modifiers,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            static_initializer: Vec::new(),
            annotations: Vec::new(),
            variable_scope: Some(VariableScope::default()),
            outer: None,
            builtin: false,
            definition_checked: false,
            span: Span::synthetic(),
        }
    }

    /// Class body of a single enum constant, as the parser emits it: no
    /// variable scope until resolution
    pub fn enum_constant_body(name: impl Into<String>, base: TypeRef) -> Self {
        let mut node = Self::new(name, ClassKind::EnumConstantBody).with_superclass(base);
        node.variable_scope = None;
        node
    }

    pub fn with_superclass(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_interface(mut self, iface: TypeRef) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, ClassKind::Interface | ClassKind::Annotation)
    }

    pub fn is_annotation(&self) -> bool {
        self.kind == ClassKind::Annotation
    }

    /// Enums and per-constant enum bodies
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ClassKind::Enum | ClassKind::EnumConstantBody)
    }

    /// A per-constant body not yet given a scope by resolution
    pub fn is_enum_constant_body(&self) -> bool {
        self.kind == ClassKind::EnumConstantBody && self.variable_scope.is_none()
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == ClassKind::Primitive
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    pub fn add_field(&mut self, field: FieldNode) {
        self.fields.push(field);
    }

    pub fn add_method(&mut self, method: MethodNode) {
        self.methods.push(method);
    }

    pub fn add_constructor(&mut self, ctor: ConstructorNode) {
        self.constructors.push(ctor);
    }

    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldNode> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Declared methods with the given name
    pub fn methods_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a MethodNode> + use<'a, 'n> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// Declared method by name and parameter count
    pub fn method(&self, name: &str, arity: usize) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == arity)
    }

    pub fn method_mut(&mut self, name: &str, arity: usize) -> Option<&mut MethodNode> {
        self.methods
            .iter_mut()
            .find(|m| m.name == name && m.parameters.len() == arity)
    }

    pub fn has_method(&self, name: &str, arity: usize) -> bool {
        self.method(name, arity).is_some()
    }

    /// Fields flagged as enum constants, in declaration order
    pub fn enum_constants(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.iter().filter(|f| f.is_enum_constant())
    }
}

/// Field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    /// Initializer; for enum constants, the constant's argument list
    pub initializer: Option<Expression>,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

impl FieldNode {
    pub fn new(name: impl Into<String>, modifiers: Modifiers, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            modifiers,
            ty,
            initializer: None,
            annotations: Vec::new(),
            span: Span::synthetic(),
        }
    }

    pub fn with_initializer(mut self, init: Expression) -> Self {
        self.initializer = Some(init);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.is_final()
    }

    pub fn is_enum_constant(&self) -> bool {
        self.modifiers.contains(Modifiers::ENUM)
    }
}

/// Method declaration.
///
/// On annotation types, each method is an attribute accessor and
/// `annotation_default` holds its default value, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub return_type: TypeRef,
    pub parameters: Vec<Parameter>,
    /// `None` for abstract methods and annotation attributes
    pub body: Option<Block>,
    pub annotation_default: Option<Expression>,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

impl MethodNode {
    pub fn new(
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: TypeRef,
        parameters: Vec<Parameter>,
        body: Option<Block>,
    ) -> Self {
        Self {
            name: name.into(),
            modifiers,
            return_type,
            parameters,
            body,
            annotation_default: None,
            annotations: Vec::new(),
            span: Span::synthetic(),
        }
    }

    /// Annotation attribute accessor with an optional default value
    pub fn attribute(name: impl Into<String>, ty: TypeRef, default: Option<Expression>) -> Self {
        let mut method = Self::new(
            name,
            Modifiers::PUBLIC | Modifiers::ABSTRACT,
            ty,
            Vec::new(),
            None,
        );
        method.annotation_default = default;
        method
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    /// Parameter types rendered for diagnostics: `name(int, String)`
    pub fn type_descriptor(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.to_string()).collect();
        format!("{} {}({})", self.return_type, self.name, params.join(", "))
    }
}

/// Constructor declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorNode {
    pub modifiers: Modifiers,
    pub parameters: Vec<Parameter>,
    pub body: Block,
    /// Set once the enum `(String, int)` parameters have been injected
    pub hidden_params: bool,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

impl ConstructorNode {
    pub fn new(modifiers: Modifiers, parameters: Vec<Parameter>, body: Block) -> Self {
        Self {
            modifiers,
            parameters,
            body,
            hidden_params: false,
            annotations: Vec::new(),
            span: Span::synthetic(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// The leading `super(...)`/`this(...)` call, if the body starts with one
    pub fn special_constructor_call(&self) -> Option<&ConstructorCallExpr> {
        match self.body.first()?.as_expression()? {
            Expression::ConstructorCall(call) if call.is_special() => Some(call),
            _ => None,
        }
    }

    pub fn special_constructor_call_mut(&mut self) -> Option<&mut ConstructorCallExpr> {
        match self.body.first_mut()?.as_expression_mut()? {
            Expression::ConstructorCall(call) if call.is_special() => Some(call),
            _ => None,
        }
    }
}

/// Method, constructor or closure parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Expression>,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            annotations: Vec::new(),
            span: Span::synthetic(),
        }
    }
}
