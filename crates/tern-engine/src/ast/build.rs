//! Node builders for synthesized code
//!
//! Every node built here carries a synthetic span.

use super::*;

fn span() -> Span {
    Span::synthetic()
}

pub fn constant(value: ConstantValue) -> Expression {
    Expression::Constant(ConstantExpr { value, span: span() })
}

pub fn int(value: i32) -> Expression {
    constant(ConstantValue::Int(value))
}

pub fn string(value: impl Into<String>) -> Expression {
    constant(ConstantValue::String(value.into()))
}

pub fn null() -> Expression {
    constant(ConstantValue::Null)
}

pub fn var(name: impl Into<String>) -> Expression {
    Expression::Variable(VariableExpr {
        name: name.into(),
        accessed: None,
        span: span(),
    })
}

/// Variable bound to a parameter of the enclosing method
pub fn param_var(name: impl Into<String>) -> Expression {
    Expression::Variable(VariableExpr {
        name: name.into(),
        accessed: Some(AccessedVariable::Parameter),
        span: span(),
    })
}

pub fn this() -> Expression {
    var("this")
}

pub fn prop(object: Expression, property: impl Into<String>) -> Expression {
    Expression::Property(PropertyExpr {
        object: Box::new(object),
        property: property.into(),
        span: span(),
    })
}

pub fn field(owner: ClassId, name: impl Into<String>) -> Expression {
    Expression::Field(FieldExpr {
        owner,
        name: name.into(),
        span: span(),
    })
}

pub fn class_expr(ty: TypeRef) -> Expression {
    Expression::Class(ClassExpr { ty, span: span() })
}

pub fn list(elements: Vec<Expression>) -> Expression {
    Expression::List(ListExpr {
        elements,
        span: span(),
    })
}

/// `[:]`
pub fn empty_map() -> Expression {
    Expression::Map(MapExpr {
        entries: Vec::new(),
        span: span(),
    })
}

pub fn map_entry(key: Expression, value: Expression) -> Expression {
    Expression::MapEntry(MapEntryExpr {
        key: Box::new(key),
        value: Box::new(value),
        span: span(),
    })
}

fn method_call(object: Expression, name: impl Into<String>, arguments: Vec<Expression>, implicit_this: bool) -> Expression {
    Expression::MethodCall(MethodCallExpr {
        object: Box::new(object),
        method: MethodName::Named(name.into()),
        arguments,
        implicit_this,
        safe: false,
        target: None,
        dispatch: None,
        span: span(),
    })
}

/// `object.name(args)`
pub fn call(object: Expression, name: impl Into<String>, arguments: Vec<Expression>) -> Expression {
    method_call(object, name, arguments, false)
}

/// `name(args)` with an implicit `this` receiver
pub fn implicit_call(name: impl Into<String>, arguments: Vec<Expression>) -> Expression {
    method_call(this(), name, arguments, true)
}

pub fn static_call(
    owner: ClassId,
    owner_name: impl Into<String>,
    method: impl Into<String>,
    arguments: Vec<Expression>,
) -> Expression {
    Expression::StaticMethodCall(StaticMethodCallExpr {
        owner,
        owner_name: owner_name.into(),
        method: method.into(),
        arguments,
        dispatch: None,
        span: span(),
    })
}

fn constructor_call(kind: ConstructorCallKind, arguments: Vec<Expression>) -> Expression {
    Expression::ConstructorCall(ConstructorCallExpr {
        kind,
        arguments,
        dispatch: None,
        span: span(),
    })
}

pub fn new_instance(ty: TypeRef, arguments: Vec<Expression>) -> Expression {
    constructor_call(ConstructorCallKind::New(ty), arguments)
}

pub fn super_call(arguments: Vec<Expression>) -> Expression {
    constructor_call(ConstructorCallKind::Super, arguments)
}

pub fn this_call(arguments: Vec<Expression>) -> Expression {
    constructor_call(ConstructorCallKind::This, arguments)
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span: span(),
    })
}

pub fn index(object: Expression, idx: Expression) -> Expression {
    Expression::Index(IndexExpr {
        object: Box::new(object),
        index: Box::new(idx),
        span: span(),
    })
}

pub fn spread(expr: Expression) -> Expression {
    Expression::Spread(SpreadExpr {
        expr: Box::new(expr),
        span: span(),
    })
}

pub fn array(element_type: TypeRef, elements: Vec<Expression>) -> Expression {
    Expression::Array(ArrayExpr {
        element_type,
        elements,
        span: span(),
    })
}

pub fn assign(target: Expression, value: Expression) -> Expression {
    Expression::Assign(AssignExpr {
        target: Box::new(target),
        value: Box::new(value),
        span: span(),
    })
}

pub fn annotation_constant(annotation: AnnotationNode) -> Expression {
    Expression::AnnotationConstant(AnnotationConstantExpr {
        annotation: Box::new(annotation),
    })
}

pub fn closure(parameters: Vec<Parameter>, body: Block) -> Expression {
    Expression::Closure(ClosureExpr {
        parameters,
        body,
        captured: Vec::new(),
        span: span(),
    })
}

// ── Statements ──

pub fn expr_stmt(expr: Expression) -> Statement {
    Statement::Expression(expr)
}

pub fn ret(value: Expression) -> Statement {
    Statement::Return {
        value: Some(value),
        span: span(),
    }
}

pub fn decl(name: impl Into<String>, ty: TypeRef, initializer: Expression) -> Statement {
    Statement::Declaration {
        name: name.into(),
        ty,
        initializer: Some(initializer),
        span: span(),
    }
}

pub fn if_then(condition: Expression, then_branch: Vec<Statement>) -> Statement {
    Statement::If {
        condition,
        then_branch: Block::new(then_branch),
        else_branch: None,
        span: span(),
    }
}

pub fn throw(value: Expression) -> Statement {
    Statement::Throw { value, span: span() }
}
