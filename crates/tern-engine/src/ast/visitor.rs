//! Visitor traits for walking class bodies
//!
//! `Visitor` walks read-only; `VisitorMut` lets a pass rewrite nodes in place
//! (the invocation pass uses it to store dispatch markers). Each visit method
//! defaults to the matching `walk_*` function, so an implementor overrides
//! only the nodes it cares about and calls `walk_*` to keep descending.

use super::*;

/// Read-only tree visitor
pub trait Visitor: Sized {
    fn visit_class(&mut self, class: &ClassNode) {
        walk_class(self, class);
    }

    fn visit_field(&mut self, field: &FieldNode) {
        walk_field(self, field);
    }

    fn visit_method(&mut self, method: &MethodNode) {
        walk_method(self, method);
    }

    fn visit_constructor(&mut self, ctor: &ConstructorNode) {
        walk_constructor(self, ctor);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_variable(&mut self, _var: &VariableExpr) {}

    fn visit_method_call(&mut self, call: &MethodCallExpr) {
        walk_method_call(self, call);
    }

    fn visit_constructor_call(&mut self, call: &ConstructorCallExpr) {
        walk_arguments(self, &call.arguments);
    }

    fn visit_closure(&mut self, closure: &ClosureExpr) {
        self.visit_block(&closure.body);
    }
}

pub fn walk_class<V: Visitor>(v: &mut V, class: &ClassNode) {
    for field in &class.fields {
        v.visit_field(field);
    }
    for ctor in &class.constructors {
        v.visit_constructor(ctor);
    }
    for method in &class.methods {
        v.visit_method(method);
    }
    for stmt in &class.static_initializer {
        v.visit_statement(stmt);
    }
}

pub fn walk_field<V: Visitor>(v: &mut V, field: &FieldNode) {
    if let Some(init) = &field.initializer {
        v.visit_expression(init);
    }
}

pub fn walk_method<V: Visitor>(v: &mut V, method: &MethodNode) {
    if let Some(body) = &method.body {
        v.visit_block(body);
    }
}

pub fn walk_constructor<V: Visitor>(v: &mut V, ctor: &ConstructorNode) {
    v.visit_block(&ctor.body);
}

pub fn walk_block<V: Visitor>(v: &mut V, block: &Block) {
    for stmt in &block.statements {
        v.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor>(v: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Expression(e) => v.visit_expression(e),
        Statement::Declaration { initializer, .. } => {
            if let Some(init) = initializer {
                v.visit_expression(init);
            }
        }
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                v.visit_expression(value);
            }
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            v.visit_expression(condition);
            v.visit_block(then_branch);
            if let Some(else_branch) = else_branch {
                v.visit_block(else_branch);
            }
        }
        Statement::Throw { value, .. } => v.visit_expression(value),
        Statement::Block(block) => v.visit_block(block),
    }
}

fn walk_arguments<V: Visitor>(v: &mut V, args: &[Expression]) {
    for arg in args {
        v.visit_expression(arg);
    }
}

pub fn walk_method_call<V: Visitor>(v: &mut V, call: &MethodCallExpr) {
    v.visit_expression(&call.object);
    if let MethodName::Dynamic(name) = &call.method {
        v.visit_expression(name);
    }
    walk_arguments(v, &call.arguments);
}

pub fn walk_expression<V: Visitor>(v: &mut V, expr: &Expression) {
    match expr {
        Expression::Constant(_)
        | Expression::Field(_)
        | Expression::Class(_)
        | Expression::AnnotationConstant(_) => {}
        Expression::Variable(var) => v.visit_variable(var),
        Expression::Property(p) => v.visit_expression(&p.object),
        Expression::Closure(c) => v.visit_closure(c),
        Expression::List(l) => walk_arguments(v, &l.elements),
        Expression::Map(m) => {
            for entry in &m.entries {
                v.visit_expression(&entry.key);
                v.visit_expression(&entry.value);
            }
        }
        Expression::MapEntry(e) => {
            v.visit_expression(&e.key);
            v.visit_expression(&e.value);
        }
        Expression::MethodCall(call) => v.visit_method_call(call),
        Expression::StaticMethodCall(call) => walk_arguments(v, &call.arguments),
        Expression::ConstructorCall(call) => v.visit_constructor_call(call),
        Expression::Binary(b) => {
            v.visit_expression(&b.left);
            v.visit_expression(&b.right);
        }
        Expression::Ternary(t) => {
            v.visit_expression(&t.condition);
            v.visit_expression(&t.then_expr);
            v.visit_expression(&t.else_expr);
        }
        Expression::Index(i) => {
            v.visit_expression(&i.object);
            v.visit_expression(&i.index);
        }
        Expression::Spread(s) => v.visit_expression(&s.expr),
        Expression::Array(a) => walk_arguments(v, &a.elements),
        Expression::Assign(a) => {
            v.visit_expression(&a.target);
            v.visit_expression(&a.value);
        }
    }
}

// ============================================================================
// Mutable visitor
// ============================================================================

/// Rewriting tree visitor
pub trait VisitorMut: Sized {
    fn visit_block_mut(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
    }

    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        walk_statement_mut(self, stmt);
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        walk_expression_mut(self, expr);
    }

    fn visit_method_call_mut(&mut self, call: &mut MethodCallExpr) {
        walk_method_call_mut(self, call);
    }

    fn visit_static_method_call_mut(&mut self, call: &mut StaticMethodCallExpr) {
        walk_arguments_mut(self, &mut call.arguments);
    }

    fn visit_constructor_call_mut(&mut self, call: &mut ConstructorCallExpr) {
        walk_arguments_mut(self, &mut call.arguments);
    }

    fn visit_closure_mut(&mut self, closure: &mut ClosureExpr) {
        self.visit_block_mut(&mut closure.body);
    }
}

pub fn walk_block_mut<V: VisitorMut>(v: &mut V, block: &mut Block) {
    for stmt in &mut block.statements {
        v.visit_statement_mut(stmt);
    }
}

pub fn walk_statement_mut<V: VisitorMut>(v: &mut V, stmt: &mut Statement) {
    match stmt {
        Statement::Expression(e) => v.visit_expression_mut(e),
        Statement::Declaration { initializer, .. } => {
            if let Some(init) = initializer {
                v.visit_expression_mut(init);
            }
        }
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                v.visit_expression_mut(value);
            }
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            v.visit_expression_mut(condition);
            v.visit_block_mut(then_branch);
            if let Some(else_branch) = else_branch {
                v.visit_block_mut(else_branch);
            }
        }
        Statement::Throw { value, .. } => v.visit_expression_mut(value),
        Statement::Block(block) => v.visit_block_mut(block),
    }
}

fn walk_arguments_mut<V: VisitorMut>(v: &mut V, args: &mut [Expression]) {
    for arg in args {
        v.visit_expression_mut(arg);
    }
}

pub fn walk_method_call_mut<V: VisitorMut>(v: &mut V, call: &mut MethodCallExpr) {
    v.visit_expression_mut(&mut call.object);
    if let MethodName::Dynamic(name) = &mut call.method {
        v.visit_expression_mut(name);
    }
    walk_arguments_mut(v, &mut call.arguments);
}

pub fn walk_expression_mut<V: VisitorMut>(v: &mut V, expr: &mut Expression) {
    match expr {
        Expression::Constant(_)
        | Expression::Variable(_)
        | Expression::Field(_)
        | Expression::Class(_)
        | Expression::AnnotationConstant(_) => {}
        Expression::Property(p) => v.visit_expression_mut(&mut p.object),
        Expression::Closure(c) => v.visit_closure_mut(c),
        Expression::List(l) => walk_arguments_mut(v, &mut l.elements),
        Expression::Map(m) => {
            for entry in &mut m.entries {
                v.visit_expression_mut(&mut entry.key);
                v.visit_expression_mut(&mut entry.value);
            }
        }
        Expression::MapEntry(e) => {
            v.visit_expression_mut(&mut e.key);
            v.visit_expression_mut(&mut e.value);
        }
        Expression::MethodCall(call) => v.visit_method_call_mut(call),
        Expression::StaticMethodCall(call) => v.visit_static_method_call_mut(call),
        Expression::ConstructorCall(call) => v.visit_constructor_call_mut(call),
        Expression::Binary(b) => {
            v.visit_expression_mut(&mut b.left);
            v.visit_expression_mut(&mut b.right);
        }
        Expression::Ternary(t) => {
            v.visit_expression_mut(&mut t.condition);
            v.visit_expression_mut(&mut t.then_expr);
            v.visit_expression_mut(&mut t.else_expr);
        }
        Expression::Index(i) => {
            v.visit_expression_mut(&mut i.object);
            v.visit_expression_mut(&mut i.index);
        }
        Expression::Spread(s) => v.visit_expression_mut(&mut s.expr),
        Expression::Array(a) => walk_arguments_mut(v, &mut a.elements),
        Expression::Assign(a) => {
            v.visit_expression_mut(&mut a.target);
            v.visit_expression_mut(&mut a.value);
        }
    }
}

/// Names of all variables referenced anywhere under a block
pub fn referenced_variables(block: &Block) -> Vec<String> {
    struct Collect(Vec<String>);

    impl Visitor for Collect {
        fn visit_variable(&mut self, var: &VariableExpr) {
            if !self.0.contains(&var.name) {
                self.0.push(var.name.clone());
            }
        }

        fn visit_statement(&mut self, stmt: &Statement) {
            if let Statement::Declaration { name, .. } = stmt {
                if !self.0.contains(name) {
                    self.0.push(name.clone());
                }
            }
            walk_statement(self, stmt);
        }
    }

    let mut collect = Collect(Vec::new());
    collect.visit_block(block);
    collect.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    #[test]
    fn test_referenced_variables_descends_into_calls() {
        let body = Block::new(vec![
            build::expr_stmt(build::assign(
                build::prop(build::this(), "x"),
                build::var("x"),
            )),
            build::expr_stmt(build::call(build::var("log"), "info", vec![build::var("__str")])),
        ]);
        let names = referenced_variables(&body);
        assert!(names.contains(&"x".to_string()));
        assert!(names.contains(&"this".to_string()));
        assert!(names.contains(&"__str".to_string()));
        assert!(names.contains(&"log".to_string()));
    }

    #[test]
    fn test_mut_visitor_reaches_nested_calls() {
        struct CountCalls(usize);
        impl VisitorMut for CountCalls {
            fn visit_method_call_mut(&mut self, call: &mut MethodCallExpr) {
                self.0 += 1;
                walk_method_call_mut(self, call);
            }
        }

        let mut body = Block::new(vec![build::ret(build::call(
            build::call(build::this(), "a", vec![]),
            "b",
            vec![build::call(build::this(), "c", vec![])],
        ))]);
        let mut counter = CountCalls(0);
        counter.visit_block_mut(&mut body);
        assert_eq!(counter.0, 3);
    }
}
