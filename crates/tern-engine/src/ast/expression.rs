//! Expression nodes
//!
//! Call expressions additionally carry the dispatch marker chosen by the
//! invocation pass, so the emitter never has to re-derive it.

use std::fmt;

use super::annotation::AnnotationNode;
use super::class::Parameter;
use super::statement::Block;
use super::types::{ClassId, TypeRef};
use super::Span;

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal constant: `42`, `"text"`, `true`, `null`
    Constant(ConstantExpr),
    /// Variable reference, including `this` and `super`
    Variable(VariableExpr),
    /// Property access: `obj.name`, `Color.RED`
    Property(PropertyExpr),
    /// Direct reference to a declared field of a known class
    Field(FieldExpr),
    /// Class literal: `String`, `Color`
    Class(ClassExpr),
    /// Closure literal: `{ a, b -> ... }`
    Closure(ClosureExpr),
    /// List literal: `[a, b, c]`
    List(ListExpr),
    /// Map literal: `[a: 1, b: 2]`
    Map(MapExpr),
    /// A single named argument `key: value` in an argument list
    MapEntry(MapEntryExpr),
    /// Nested annotation used as a value: `@Inner(x = 1)`
    AnnotationConstant(AnnotationConstantExpr),
    /// Instance or implicit-this method call
    MethodCall(MethodCallExpr),
    /// Call of a static method on a known class
    StaticMethodCall(StaticMethodCallExpr),
    /// `new T(...)`, `super(...)` or `this(...)`
    ConstructorCall(ConstructorCallExpr),
    /// Binary operation
    Binary(BinaryExpr),
    /// `cond ? a : b`
    Ternary(TernaryExpr),
    /// `obj[index]`
    Index(IndexExpr),
    /// `*args`
    Spread(SpreadExpr),
    /// Array creation with initializer: `new T[]{a, b}`
    Array(ArrayExpr),
    /// Assignment: `target = value`
    Assign(AssignExpr),
}

impl Expression {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expression::Constant(e) => e.span,
            Expression::Variable(e) => e.span,
            Expression::Property(e) => e.span,
            Expression::Field(e) => e.span,
            Expression::Class(e) => e.span,
            Expression::Closure(e) => e.span,
            Expression::List(e) => e.span,
            Expression::Map(e) => e.span,
            Expression::MapEntry(e) => e.span,
            Expression::AnnotationConstant(e) => e.annotation.span,
            Expression::MethodCall(e) => e.span,
            Expression::StaticMethodCall(e) => e.span,
            Expression::ConstructorCall(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Ternary(e) => e.span,
            Expression::Index(e) => e.span,
            Expression::Spread(e) => e.span,
            Expression::Array(e) => e.span,
            Expression::Assign(e) => e.span,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match self {
            Expression::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// Whether this is a `super(...)` constructor call
    pub fn is_super_constructor_call(&self) -> bool {
        matches!(
            self,
            Expression::ConstructorCall(ConstructorCallExpr {
                kind: ConstructorCallKind::Super,
                ..
            })
        )
    }

    /// Whether this is a `this(...)` constructor call
    pub fn is_this_constructor_call(&self) -> bool {
        matches!(
            self,
            Expression::ConstructorCall(ConstructorCallExpr {
                kind: ConstructorCallKind::This,
                ..
            })
        )
    }
}

/// Source-like rendering used in diagnostics
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c.value),
            Expression::Variable(v) => f.write_str(&v.name),
            Expression::Property(p) => write!(f, "{}.{}", p.object, p.property),
            Expression::Field(fe) => f.write_str(&fe.name),
            Expression::Class(c) => write!(f, "{}", c.ty),
            Expression::Closure(_) => f.write_str("{ -> ... }"),
            Expression::List(l) => {
                f.write_str("[")?;
                write_joined(f, &l.elements)?;
                f.write_str("]")
            }
            Expression::Map(m) => {
                if m.entries.is_empty() {
                    return f.write_str("[:]");
                }
                f.write_str("[")?;
                for (i, entry) in m.entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", entry.key, entry.value)?;
                }
                f.write_str("]")
            }
            Expression::MapEntry(e) => write!(f, "{}: {}", e.key, e.value),
            Expression::AnnotationConstant(a) => write!(f, "@{}", a.annotation.class),
            Expression::MethodCall(call) => {
                match &call.method {
                    MethodName::Named(name) if call.implicit_this => write!(f, "{}", name)?,
                    MethodName::Named(name) => write!(f, "{}.{}", call.object, name)?,
                    MethodName::Dynamic(expr) => write!(f, "{}.\"${}\"", call.object, expr)?,
                }
                f.write_str("(")?;
                write_joined(f, &call.arguments)?;
                f.write_str(")")
            }
            Expression::StaticMethodCall(call) => {
                write!(f, "{}.{}(", call.owner_name, call.method)?;
                write_joined(f, &call.arguments)?;
                f.write_str(")")
            }
            Expression::ConstructorCall(call) => {
                match &call.kind {
                    ConstructorCallKind::New(ty) => write!(f, "new {}(", ty)?,
                    ConstructorCallKind::Super => f.write_str("super(")?,
                    ConstructorCallKind::This => f.write_str("this(")?,
                }
                write_joined(f, &call.arguments)?;
                f.write_str(")")
            }
            Expression::Binary(b) => write!(f, "({} {} {})", b.left, b.op, b.right),
            Expression::Ternary(t) => {
                write!(f, "({} ? {} : {})", t.condition, t.then_expr, t.else_expr)
            }
            Expression::Index(i) => write!(f, "{}[{}]", i.object, i.index),
            Expression::Spread(s) => write!(f, "*{}", s.expr),
            Expression::Array(a) => {
                write!(f, "new {}[]{{", a.element_type)?;
                write_joined(f, &a.elements)?;
                f.write_str("}")
            }
            Expression::Assign(a) => write!(f, "{} = {}", a.target, a.value),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Compile-time constant value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => f.write_str("null"),
            ConstantValue::Bool(b) => write!(f, "{}", b),
            ConstantValue::Char(c) => write!(f, "'{}'", c),
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Long(l) => write!(f, "{}L", l),
            ConstantValue::Float(v) => write!(f, "{}f", v),
            ConstantValue::Double(v) => write!(f, "{}d", v),
            ConstantValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Literal constant expression
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantExpr {
    pub value: ConstantValue,
    pub span: Span,
}

/// What a variable expression was resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum AccessedVariable {
    /// A field of a class (possibly inherited)
    Field { owner: ClassId, name: String },
    /// A method or constructor parameter
    Parameter,
    /// A local variable
    Local,
}

/// Variable reference
#[derive(Debug, Clone, PartialEq)]
pub struct VariableExpr {
    pub name: String,
    pub accessed: Option<AccessedVariable>,
    pub span: Span,
}

impl VariableExpr {
    pub fn is_this(&self) -> bool {
        self.name == "this"
    }

    pub fn is_super(&self) -> bool {
        self.name == "super"
    }
}

/// Property access
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    pub object: Box<Expression>,
    pub property: String,
    pub span: Span,
}

/// Direct field reference
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub owner: ClassId,
    pub name: String,
    pub span: Span,
}

/// Class literal
#[derive(Debug, Clone, PartialEq)]
pub struct ClassExpr {
    pub ty: TypeRef,
    pub span: Span,
}

/// A variable captured by a closure from its enclosing scope
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedVariable {
    pub name: String,
    pub ty: TypeRef,
}

/// Closure literal
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureExpr {
    pub parameters: Vec<Parameter>,
    pub body: Block,
    pub captured: Vec<CapturedVariable>,
    pub span: Span,
}

/// List literal
#[derive(Debug, Clone, PartialEq)]
pub struct ListExpr {
    pub elements: Vec<Expression>,
    pub span: Span,
}

/// Map literal
#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub entries: Vec<MapEntryExpr>,
    pub span: Span,
}

/// `key: value`
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntryExpr {
    pub key: Box<Expression>,
    pub value: Box<Expression>,
    pub span: Span,
}

/// Annotation used as a value
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationConstantExpr {
    pub annotation: Box<AnnotationNode>,
}

/// Method name of a call: known at compile time or computed
#[derive(Debug, Clone, PartialEq)]
pub enum MethodName {
    Named(String),
    Dynamic(Box<Expression>),
}

impl MethodName {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MethodName::Named(name) => Some(name),
            MethodName::Dynamic(_) => None,
        }
    }
}

/// Statically resolved call target attached by an earlier analysis pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodTarget {
    pub owner: ClassId,
    pub name: String,
    pub arity: usize,
    pub is_static: bool,
}

/// Method call
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallExpr {
    pub object: Box<Expression>,
    pub method: MethodName,
    pub arguments: Vec<Expression>,
    /// `foo()` written without a receiver
    pub implicit_this: bool,
    /// `obj?.foo()`
    pub safe: bool,
    pub target: Option<MethodTarget>,
    pub dispatch: Option<DispatchStrategy>,
    pub span: Span,
}

impl MethodCallExpr {
    /// Whether any argument is spread (`*list`)
    pub fn has_spread_arguments(&self) -> bool {
        self.arguments
            .iter()
            .any(|a| matches!(a, Expression::Spread(_)))
    }

    /// Whether this call goes through `super`
    pub fn is_super_call(&self) -> bool {
        matches!(&*self.object, Expression::Variable(v) if v.is_super())
    }
}

/// Static method call on a known class
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMethodCallExpr {
    pub owner: ClassId,
    /// Owner class name, kept for diagnostics and rendering
    pub owner_name: String,
    pub method: String,
    pub arguments: Vec<Expression>,
    pub dispatch: Option<DispatchStrategy>,
    pub span: Span,
}

/// Kind of constructor call
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructorCallKind {
    New(TypeRef),
    Super,
    This,
}

/// Constructor call
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorCallExpr {
    pub kind: ConstructorCallKind,
    pub arguments: Vec<Expression>,
    pub dispatch: Option<DispatchStrategy>,
    pub span: Span,
}

impl ConstructorCallExpr {
    pub fn is_special(&self) -> bool {
        !matches!(self.kind, ConstructorCallKind::New(_))
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Binary expression
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

/// Conditional expression
#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpr {
    pub condition: Box<Expression>,
    pub then_expr: Box<Expression>,
    pub else_expr: Box<Expression>,
    pub span: Span,
}

/// Index expression
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub object: Box<Expression>,
    pub index: Box<Expression>,
    pub span: Span,
}

/// Spread argument
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadExpr {
    pub expr: Box<Expression>,
    pub span: Span,
}

/// Array creation
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpr {
    pub element_type: TypeRef,
    pub elements: Vec<Expression>,
    pub span: Span,
}

/// Assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub target: Box<Expression>,
    pub value: Box<Expression>,
    pub span: Span,
}

// ============================================================================
// Dispatch markers
// ============================================================================

/// How the emitter must dispatch a call expression
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchStrategy {
    /// Statically bound, non-reflective call
    Direct(MethodTarget),
    /// Statically bound constructor (index into the owner's constructors)
    DirectConstructor { owner: ClassId, index: usize },
    /// Invoke a closure stored in a same-named field of `this`
    ClosureField { name: String },
    /// Cached dynamic call site
    CallSite { index: usize, key: CallSiteKey },
    /// Full reflective adapter dispatch
    Reflective(ReflectiveReason),
}

impl DispatchStrategy {
    pub fn is_reflective(&self) -> bool {
        matches!(self, DispatchStrategy::Reflective(_))
    }
}

/// Key of a cached dynamic call site
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteKey {
    /// Static type hint of the receiver expression, when known
    pub receiver: Option<TypeRef>,
    pub name: String,
    pub implicit_this: bool,
    pub is_static: bool,
}

/// Why a call could not be bound more cheaply than reflective dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectiveReason {
    DynamicName,
    SpreadArguments,
    SuperCall,
    CachingDisabled,
    AmbiguousConstructor,
    UnknownConstructor,
}
