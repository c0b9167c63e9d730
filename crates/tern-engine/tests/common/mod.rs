//! Shared helpers for integration tests
//!
//! Tree builders for small compilation units, and a tree evaluator that runs
//! completed class bodies so enum behavior can be checked end to end.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tern_engine::ast::{
    build, AnnotationNode, Block, ClassId, ClassKind, ClassNode, ClassTable, ConstantValue,
    ConstructorCallKind, ConstructorNode, Expression, FieldNode, MethodName, MethodNode, Modifiers,
    Parameter, Span, Statement, BinaryOp,
};
use tern_engine::{CompilerOptions, ErrorCollector, PipelineOutput, SemanticPipeline};

// ============================================================================
// Builders
// ============================================================================

/// Enum `name` with the given constants and no constructors
pub fn enum_class(table: &mut ClassTable, name: &str, constants: &[&str]) -> ClassId {
    let base = table.type_ref(table.well_known().enum_base);
    let id = table.add_class(ClassNode::new(name, ClassKind::Enum).with_superclass(base));
    let ty = table.type_ref(id);
    for constant in constants {
        table[id].add_field(FieldNode::new(
            *constant,
            Modifiers::PUBLIC_STATIC_FINAL | Modifiers::ENUM,
            ty.clone(),
        ));
    }
    id
}

/// Set a constant's argument list
pub fn constant_args(table: &mut ClassTable, enum_id: ClassId, constant: &str, args: Vec<Expression>) {
    if let Some(field) = table[enum_id].field_mut(constant) {
        field.initializer = Some(build::list(args));
    }
}

/// Per-constant body class of `enum_id`
pub fn constant_body(table: &mut ClassTable, enum_id: ClassId, name: &str) -> ClassId {
    let base = table.type_ref(enum_id);
    table.add_class(ClassNode::enum_constant_body(name, base))
}

pub fn class(table: &mut ClassTable, name: &str) -> ClassId {
    let object = table.type_ref(table.well_known().object);
    table.add_class(ClassNode::new(name, ClassKind::Class).with_superclass(object))
}

pub fn annotation_type(table: &mut ClassTable, name: &str) -> ClassId {
    table.add_class(ClassNode::new(name, ClassKind::Annotation))
}

pub fn attribute(table: &mut ClassTable, annotation: ClassId, name: &str, ty: tern_engine::TypeRef, default: Option<Expression>) {
    table[annotation].add_method(MethodNode::attribute(name, ty, default));
}

pub fn usage(table: &ClassTable, annotation: ClassId) -> AnnotationNode {
    AnnotationNode::new(table.type_ref(annotation), Span::new(0, 10, 1, 1))
}

pub fn int_param(table: &ClassTable, name: &str) -> Parameter {
    Parameter::new(name, table.type_ref(table.well_known().int))
}

pub fn method(name: &str, params: Vec<Parameter>, ret: tern_engine::TypeRef, body: Vec<Statement>) -> MethodNode {
    MethodNode::new(name, Modifiers::PUBLIC, ret, params, Some(Block::new(body)))
}

pub fn ctor(params: Vec<Parameter>, body: Vec<Statement>) -> ConstructorNode {
    ConstructorNode::new(Modifiers::PRIVATE, params, Block::new(body))
}

/// Run the pipeline with default options
pub fn complete(table: &mut ClassTable) -> (PipelineOutput, ErrorCollector) {
    let mut errors = ErrorCollector::new();
    let output = SemanticPipeline::new(CompilerOptions::default()).run(table, &mut errors);
    (output, errors)
}

pub fn messages(errors: &ErrorCollector) -> Vec<String> {
    errors.errors().iter().map(|e| e.to_string()).collect()
}

// ============================================================================
// Evaluator
// ============================================================================

#[derive(Debug)]
pub struct Instance {
    pub class: ClassId,
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Object(Rc<RefCell<Instance>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Class(ClassId),
    Map(Vec<(Value, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of an array value
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::Array(items) => items.borrow().clone(),
            _ => Vec::new(),
        }
    }

    /// Instance field of an object value
    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Object(obj) => obj.borrow().fields.get(name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Constant name of an enum instance
    pub fn enum_name(&self) -> Option<String> {
        match self.field(ENUM_NAME_SLOT) {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Value::Object(obj) => Some(obj.borrow().class),
            _ => None,
        }
    }
}

const ENUM_NAME_SLOT: &str = "#name";
const ENUM_ORDINAL_SLOT: &str = "#ordinal";

struct Frame {
    this: Option<Value>,
    class: ClassId,
    locals: HashMap<String, Value>,
}

enum Flow {
    Normal,
    Return(Value),
}

type EvalResult<T> = Result<T, String>;

/// Evaluates completed class bodies over a `ClassTable`
pub struct Evaluator<'t> {
    table: &'t ClassTable,
    statics: HashMap<(ClassId, String), Value>,
}

impl<'t> Evaluator<'t> {
    pub fn new(table: &'t ClassTable) -> Self {
        Self {
            table,
            statics: HashMap::new(),
        }
    }

    /// Run the static initializer of `class`
    pub fn initialize(&mut self, class: ClassId) -> EvalResult<()> {
        let mut frame = Frame {
            this: None,
            class,
            locals: HashMap::new(),
        };
        let statements = self.table[class].static_initializer.clone();
        for stmt in &statements {
            if let Flow::Return(_) = self.exec(&mut frame, stmt)? {
                break;
            }
        }
        Ok(())
    }

    pub fn get_static(&self, class: ClassId, name: &str) -> EvalResult<Value> {
        self.read_static(class, name)
    }

    pub fn call_static(&mut self, class: ClassId, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let (owner, method) = self
            .find_method(class, name, args.len())
            .ok_or_else(|| format!("no static method {}.{}/{}", self.table[class].name, name, args.len()))?;
        if self.table[owner].builtin {
            return self.builtin_call(owner, name, None, args);
        }
        self.invoke(owner, method, None, args)
    }

    pub fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        if let Value::Array(items) = receiver {
            return match name {
                "clone" => Ok(Value::Array(Rc::new(RefCell::new(items.borrow().clone())))),
                _ => Err(format!("arrays have no method {}", name)),
            };
        }
        let class = receiver
            .class_id()
            .ok_or_else(|| format!("cannot call {} on {:?}", name, receiver))?;
        let (owner, method) = self
            .find_method(class, name, args.len())
            .ok_or_else(|| format!("no method {}.{}/{}", self.table[class].name, name, args.len()))?;
        if self.table[owner].builtin {
            return self.builtin_call(owner, name, Some(receiver.clone()), args);
        }
        self.invoke(owner, method, Some(receiver.clone()), args)
    }

    /// `new T(args)`
    pub fn construct(&mut self, class: ClassId, args: Vec<Value>) -> EvalResult<Value> {
        let obj = Value::Object(Rc::new(RefCell::new(Instance {
            class,
            fields: HashMap::new(),
        })));
        self.run_constructor(class, &obj, args)?;
        Ok(obj)
    }

    // ------------------------------------------------------------------------

    fn find_method(&self, class: ClassId, name: &str, argc: usize) -> Option<(ClassId, &'t MethodNode)> {
        let table = self.table;
        if let Some(found) = table.find_method(class, name, argc) {
            return Some(found);
        }
        let mut current = Some(class);
        while let Some(id) = current {
            let varargs = table[id]
                .methods_named(name)
                .find(|m| m.modifiers.contains(Modifiers::VARARGS) && m.arity() >= 1 && m.arity() - 1 <= argc);
            if let Some(m) = varargs {
                return Some((id, m));
            }
            current = table.superclass_of(id);
        }
        None
    }

    fn bind_params(params: &[Parameter], varargs: bool, mut args: Vec<Value>) -> HashMap<String, Value> {
        if varargs && !params.is_empty() {
            let fixed = params.len() - 1;
            let already_array = args.len() == params.len() && matches!(args.last(), Some(Value::Array(_)));
            if !already_array {
                let rest = args.split_off(fixed.min(args.len()));
                args.push(Value::Array(Rc::new(RefCell::new(rest))));
            }
        }
        params
            .iter()
            .zip(args)
            .map(|(p, v)| (p.name.clone(), v))
            .collect()
    }

    fn invoke(&mut self, owner: ClassId, method: &MethodNode, this: Option<Value>, args: Vec<Value>) -> EvalResult<Value> {
        let body = method
            .body
            .clone()
            .ok_or_else(|| format!("abstract method {} called", method.name))?;
        let varargs = method.modifiers.contains(Modifiers::VARARGS);
        let mut frame = Frame {
            this,
            class: owner,
            locals: Self::bind_params(&method.parameters, varargs, args),
        };
        match self.exec_block(&mut frame, &body)? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::Null),
        }
    }

    fn run_constructor(&mut self, class: ClassId, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        let table = self.table;
        let node = &table[class];
        if node.builtin {
            return self.builtin_constructor(class, this, args);
        }
        let candidates: Vec<&ConstructorNode> = node.constructors.iter().filter(|c| c.arity() == args.len()).collect();
        let ctor = match candidates.as_slice() {
            [ctor] => *ctor,
            [] if node.constructors.is_empty() && args.is_empty() => {
                return match table.superclass_of(class) {
                    Some(parent) => self.run_constructor(parent, this, Vec::new()),
                    None => Ok(()),
                };
            }
            [] => return Err(format!("no constructor {}/{}", node.name, args.len())),
            _ => return Err(format!("ambiguous constructor {}/{}", node.name, args.len())),
        };

        let mut frame = Frame {
            this: Some(this.clone()),
            class,
            locals: Self::bind_params(&ctor.parameters, false, args),
        };
        if ctor.special_constructor_call().is_none() {
            if let Some(parent) = table.superclass_of(class).filter(|p| !table[*p].builtin) {
                self.run_constructor(parent, this, Vec::new())?;
            }
        }
        let body = ctor.body.clone();
        self.exec_block(&mut frame, &body)?;
        Ok(())
    }

    fn builtin_constructor(&mut self, class: ClassId, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        let Value::Object(obj) = this else {
            return Err("constructor on non-object".into());
        };
        let mut obj = obj.borrow_mut();
        match (self.table[class].name.as_str(), args.as_slice()) {
            ("Enum", [name, ordinal]) => {
                obj.fields.insert(ENUM_NAME_SLOT.into(), name.clone());
                obj.fields.insert(ENUM_ORDINAL_SLOT.into(), ordinal.clone());
            }
            ("IllegalArgumentException", [message]) => {
                obj.fields.insert("message".into(), message.clone());
            }
            ("Object", []) | ("Closure", [_, _]) => {}
            (name, _) => return Err(format!("no builtin constructor {}/{}", name, args.len())),
        }
        Ok(())
    }

    fn builtin_call(&mut self, owner: ClassId, name: &str, this: Option<Value>, args: Vec<Value>) -> EvalResult<Value> {
        match (self.table[owner].name.as_str(), name) {
            ("Enum", "ordinal") => Ok(this.map(|t| t.field(ENUM_ORDINAL_SLOT)).unwrap_or(Value::Null)),
            ("Enum", "name") => Ok(this.map(|t| t.field(ENUM_NAME_SLOT)).unwrap_or(Value::Null)),
            ("Enum", "valueOf") => {
                let [Value::Class(enum_id), Value::Str(constant)] = args.as_slice() else {
                    return Err("Enum.valueOf(Class, String) expected".into());
                };
                let declared = self.table[*enum_id].enum_constants().any(|f| f.name == *constant);
                if !declared {
                    return Err(format!(
                        "No enum constant {}.{}",
                        self.table[*enum_id].name, constant
                    ));
                }
                self.read_static(*enum_id, constant)
            }
            (class, method) => Err(format!("no builtin method {}.{}", class, method)),
        }
    }

    // ------------------------------------------------------------------------

    fn exec_block(&mut self, frame: &mut Frame, block: &Block) -> EvalResult<Flow> {
        for stmt in &block.statements {
            if let Flow::Return(v) = self.exec(frame, stmt)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &Statement) -> EvalResult<Flow> {
        match stmt {
            Statement::Expression(e) => {
                self.eval(frame, e)?;
                Ok(Flow::Normal)
            }
            Statement::Declaration { name, initializer, .. } => {
                let value = match initializer {
                    Some(init) => self.eval(frame, init)?,
                    None => Value::Null,
                };
                frame.locals.insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(v) => self.eval(frame, v)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval(frame, condition)? == Value::Bool(true) {
                    self.exec_block(frame, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(frame, else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::Throw { value, .. } => {
                let thrown = self.eval(frame, value)?;
                Err(format!("thrown: {:?}", thrown.field("message")))
            }
            Statement::Block(block) => self.exec_block(frame, block),
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Expression]) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expression::Spread(s) => values.extend(self.eval(frame, &s.expr)?.elements()),
                other => values.push(self.eval(frame, other)?),
            }
        }
        Ok(values)
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Expression) -> EvalResult<Value> {
        match expr {
            Expression::Constant(c) => match &c.value {
                ConstantValue::Null => Ok(Value::Null),
                ConstantValue::Bool(b) => Ok(Value::Bool(*b)),
                ConstantValue::Int(i) => Ok(Value::Int(i64::from(*i))),
                ConstantValue::Long(l) => Ok(Value::Int(*l)),
                ConstantValue::Char(ch) => Ok(Value::Str(ch.to_string())),
                ConstantValue::String(s) => Ok(Value::Str(s.clone())),
                other => Err(format!("unsupported constant {}", other)),
            },
            Expression::Variable(v) => self.read_variable(frame, &v.name),
            Expression::Property(p) => {
                let object = self.eval(frame, &p.object)?;
                match (&object, p.property.as_str()) {
                    (Value::Array(items), "length") => Ok(Value::Int(items.borrow().len() as i64)),
                    (Value::Class(id), name) => self.read_static(*id, name),
                    (Value::Object(_), name) => Ok(object.field(name)),
                    _ => Err(format!("no property {} on {:?}", p.property, object)),
                }
            }
            Expression::Field(f) => {
                let static_field = self
                    .table
                    .find_field(f.owner, &f.name)
                    .is_some_and(|(_, field)| field.is_static());
                if static_field {
                    self.read_static(f.owner, &f.name)
                } else {
                    Ok(frame.this.as_ref().map(|t| t.field(&f.name)).unwrap_or(Value::Null))
                }
            }
            Expression::Class(c) => c
                .ty
                .class_id()
                .map(Value::Class)
                .ok_or_else(|| format!("unresolved class {}", c.ty)),
            Expression::List(l) => {
                let items = self.eval_args(frame, &l.elements)?;
                Ok(Value::Array(Rc::new(RefCell::new(items))))
            }
            Expression::Map(m) => {
                let mut entries = Vec::new();
                for entry in &m.entries {
                    let key = self.eval(frame, &entry.key)?;
                    let value = self.eval(frame, &entry.value)?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }
            Expression::MethodCall(call) => {
                let receiver = self.eval(frame, &call.object)?;
                let args = self.eval_args(frame, &call.arguments)?;
                let name = match &call.method {
                    MethodName::Named(n) => n.clone(),
                    MethodName::Dynamic(e) => match self.eval(frame, e)? {
                        Value::Str(s) => s,
                        other => return Err(format!("method name {:?}", other)),
                    },
                };
                self.call_method(&receiver, &name, args)
            }
            Expression::StaticMethodCall(call) => {
                let args = self.eval_args(frame, &call.arguments)?;
                self.call_static(call.owner, &call.method, args)
            }
            Expression::ConstructorCall(call) => {
                let args = self.eval_args(frame, &call.arguments)?;
                match (&call.kind, frame.this.clone()) {
                    (ConstructorCallKind::New(ty), _) => {
                        let id = ty.class_id().ok_or_else(|| format!("unresolved class {}", ty))?;
                        self.construct(id, args)
                    }
                    // `this(...)` in a static method creates an instance
                    (ConstructorCallKind::This, None) => self.construct(frame.class, args),
                    (ConstructorCallKind::This, Some(this)) => {
                        self.run_constructor(frame.class, &this, args)?;
                        Ok(Value::Null)
                    }
                    (ConstructorCallKind::Super, Some(this)) => {
                        let parent = self
                            .table
                            .superclass_of(frame.class)
                            .ok_or("super() without superclass")?;
                        self.run_constructor(parent, &this, args)?;
                        Ok(Value::Null)
                    }
                    (ConstructorCallKind::Super, None) => Err("super() outside a constructor".into()),
                }
            }
            Expression::Binary(b) => {
                let left = self.eval(frame, &b.left)?;
                let right = self.eval(frame, &b.right)?;
                match b.op {
                    BinaryOp::Eq => Ok(Value::Bool(left == right)),
                    BinaryOp::Ne => Ok(Value::Bool(left != right)),
                    op => {
                        let (Some(l), Some(r)) = (left.as_int(), right.as_int()) else {
                            return Err(format!("non-integer operands for {}", op));
                        };
                        Ok(match op {
                            BinaryOp::Add => Value::Int(l + r),
                            BinaryOp::Sub => Value::Int(l - r),
                            BinaryOp::Lt => Value::Bool(l < r),
                            BinaryOp::Le => Value::Bool(l <= r),
                            BinaryOp::Gt => Value::Bool(l > r),
                            BinaryOp::Ge => Value::Bool(l >= r),
                            BinaryOp::Eq | BinaryOp::Ne => unreachable!(),
                        })
                    }
                }
            }
            Expression::Ternary(t) => {
                if self.eval(frame, &t.condition)? == Value::Bool(true) {
                    self.eval(frame, &t.then_expr)
                } else {
                    self.eval(frame, &t.else_expr)
                }
            }
            Expression::Index(i) => {
                let object = self.eval(frame, &i.object)?;
                let index = self.eval(frame, &i.index)?.as_int().ok_or("non-integer index")?;
                object
                    .elements()
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| format!("index {} out of bounds", index))
            }
            Expression::Array(a) => {
                let items = self.eval_args(frame, &a.elements)?;
                Ok(Value::Array(Rc::new(RefCell::new(items))))
            }
            Expression::Assign(a) => {
                let value = self.eval(frame, &a.value)?;
                self.assign(frame, &a.target, value.clone())?;
                Ok(value)
            }
            other => Err(format!("cannot evaluate {}", other)),
        }
    }

    fn assign(&mut self, frame: &mut Frame, target: &Expression, value: Value) -> EvalResult<()> {
        match target {
            Expression::Variable(v) if frame.locals.contains_key(&v.name) => {
                frame.locals.insert(v.name.clone(), value);
                Ok(())
            }
            Expression::Field(f) => {
                let is_static = self
                    .table
                    .find_field(f.owner, &f.name)
                    .is_some_and(|(_, field)| field.is_static());
                if is_static {
                    self.write_static(f.owner, &f.name, value)
                } else {
                    set_field(frame.this.as_ref(), &f.name, value)
                }
            }
            Expression::Property(p) => {
                let object = self.eval(frame, &p.object)?;
                set_field(Some(&object), &p.property, value)
            }
            Expression::Variable(v) => set_field(frame.this.as_ref(), &v.name, value),
            other => Err(format!("cannot assign to {}", other)),
        }
    }

    fn read_variable(&self, frame: &Frame, name: &str) -> EvalResult<Value> {
        if name == "this" {
            return frame.this.clone().ok_or_else(|| "no this in static context".to_string());
        }
        if let Some(value) = frame.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(Value::Object(obj)) = &frame.this {
            if let Some(value) = obj.borrow().fields.get(name) {
                return Ok(value.clone());
            }
        }
        self.read_static(frame.class, name)
    }

    fn read_static(&self, class: ClassId, name: &str) -> EvalResult<Value> {
        let (declaring, _) = self
            .table
            .find_field(class, name)
            .ok_or_else(|| format!("no field {}.{}", self.table[class].name, name))?;
        Ok(self
            .statics
            .get(&(declaring, name.to_string()))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn write_static(&mut self, class: ClassId, name: &str, value: Value) -> EvalResult<()> {
        let (declaring, _) = self
            .table
            .find_field(class, name)
            .ok_or_else(|| format!("no field {}.{}", self.table[class].name, name))?;
        self.statics.insert((declaring, name.to_string()), value);
        Ok(())
    }
}

fn set_field(target: Option<&Value>, name: &str, value: Value) -> EvalResult<()> {
    match target {
        Some(Value::Object(obj)) => {
            obj.borrow_mut().fields.insert(name.to_string(), value);
            Ok(())
        }
        _ => Err(format!("cannot set field {} without an object", name)),
    }
}
