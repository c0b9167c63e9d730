//! Invocation writer
//!
//! Chooses how the emitter dispatches each call expression and stores the
//! choice on the expression. Dispatch order for method calls:
//! 1. Statically resolved target, no spread → direct call
//! 2. Implicit-this call naming a closure-typed field with no matching
//!    method → call of the closure stored in that field
//! 3. Statically known name → cached call site
//! 4. Fallback → reflective dispatch
//!
//! Constructor calls bind directly when exactly one constructor of the
//! target class takes the given number of arguments.

use tracing::debug;

use crate::ast::visitor::{walk_method_call_mut, VisitorMut};
use crate::ast::{
    CallSiteKey, ClassId, ClassNode, ClassTable, ConstructorCallExpr, ConstructorCallKind,
    DispatchStrategy, Expression, MethodCallExpr, MethodNode, MethodTarget, Modifiers,
    ReflectiveReason, StaticMethodCallExpr, TypeRef, VariableExpr,
};
use crate::ast::AccessedVariable;
use crate::options::CompilerOptions;

/// Call sites registered for one class, indexed by registration order.
///
/// Every call location gets its own index, even when two locations share a
/// key, so runtime caches never alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSiteTable {
    owner: String,
    sites: Vec<CallSiteKey>,
}

impl CallSiteTable {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            sites: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Register a call location and return its index
    pub fn register(&mut self, key: CallSiteKey) -> usize {
        self.sites.push(key);
        self.sites.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&CallSiteKey> {
        self.sites.get(index)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &CallSiteKey)> {
        self.sites.iter().enumerate()
    }

    /// Method name per index
    pub fn names(&self) -> Vec<&str> {
        self.sites.iter().map(|k| k.name.as_str()).collect()
    }
}

/// Where a call expression sits
pub struct CallContext<'s> {
    /// Class whose body contains the call
    pub class: ClassId,
    /// Inside a static method, static field initializer or static initializer
    pub in_static: bool,
    pub sites: &'s mut CallSiteTable,
}

pub struct InvocationWriter<'a> {
    table: &'a ClassTable,
    options: &'a CompilerOptions,
}

impl<'a> InvocationWriter<'a> {
    pub fn new(table: &'a ClassTable, options: &'a CompilerOptions) -> Self {
        Self { table, options }
    }

    /// Dispatch strategy of an instance or implicit-this method call.
    /// Registers a call site in `ctx` when one is chosen.
    pub fn select_strategy(&self, call: &MethodCallExpr, ctx: &mut CallContext<'_>) -> DispatchStrategy {
        let spread = call.has_spread_arguments();
        if let Some(target) = call.target.as_ref().filter(|_| !spread) {
            return DispatchStrategy::Direct(target.clone());
        }

        let Some(name) = call.method.as_str() else {
            return DispatchStrategy::Reflective(ReflectiveReason::DynamicName);
        };
        if call.implicit_this && self.is_closure_field_call(ctx.class, name, call.arguments.len()) {
            return DispatchStrategy::ClosureField { name: name.to_string() };
        }

        let reason = if spread {
            Some(ReflectiveReason::SpreadArguments)
        } else if call.is_super_call() {
            Some(ReflectiveReason::SuperCall)
        } else if !self.options.call_site_caching {
            Some(ReflectiveReason::CachingDisabled)
        } else {
            None
        };
        if let Some(reason) = reason {
            return DispatchStrategy::Reflective(reason);
        }

        let key = CallSiteKey {
            receiver: self.receiver_hint(&call.object, ctx.class),
            name: name.to_string(),
            implicit_this: call.implicit_this,
            is_static: ctx.in_static,
        };
        let index = ctx.sites.register(key.clone());
        tracing::trace!(index, name, "call site registered");
        DispatchStrategy::CallSite { index, key }
    }

    /// Dispatch strategy of a call on a known class. Varargs methods accept
    /// any argument count from their fixed arity up.
    pub fn select_static_strategy(&self, call: &StaticMethodCallExpr, ctx: &mut CallContext<'_>) -> DispatchStrategy {
        if call.arguments.iter().any(|a| matches!(a, Expression::Spread(_))) {
            return DispatchStrategy::Reflective(ReflectiveReason::SpreadArguments);
        }
        if let Some((owner, method)) = self.find_applicable(call.owner, &call.method, call.arguments.len()) {
            return DispatchStrategy::Direct(MethodTarget {
                owner,
                name: method.name.clone(),
                arity: method.arity(),
                is_static: method.is_static(),
            });
        }
        if !self.options.call_site_caching {
            return DispatchStrategy::Reflective(ReflectiveReason::CachingDisabled);
        }
        let key = CallSiteKey {
            receiver: Some(self.table.type_ref(call.owner)),
            name: call.method.clone(),
            implicit_this: false,
            is_static: true,
        };
        let index = ctx.sites.register(key.clone());
        DispatchStrategy::CallSite { index, key }
    }

    /// Dispatch strategy of `new T(...)`, `super(...)` or `this(...)`
    pub fn select_constructor_strategy(&self, call: &ConstructorCallExpr, ctx: &CallContext<'_>) -> DispatchStrategy {
        if call.arguments.iter().any(|a| matches!(a, Expression::Spread(_))) {
            return DispatchStrategy::Reflective(ReflectiveReason::SpreadArguments);
        }
        let owner = match &call.kind {
            ConstructorCallKind::New(ty) => self.table.resolve(ty).class_id(),
            ConstructorCallKind::Super => self.table.superclass_of(ctx.class),
            ConstructorCallKind::This => Some(ctx.class),
        };
        let Some(node) = owner.and_then(|id| self.table.get(id)) else {
            return DispatchStrategy::Reflective(ReflectiveReason::UnknownConstructor);
        };

        let arity = call.arguments.len();
        let mut candidates = node
            .constructors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.arity() == arity)
            .map(|(index, _)| index);
        match (candidates.next(), candidates.next()) {
            (Some(index), None) => DispatchStrategy::DirectConstructor { owner: node.id, index },
            (None, _) => DispatchStrategy::Reflective(ReflectiveReason::UnknownConstructor),
            (Some(_), Some(_)) => DispatchStrategy::Reflective(ReflectiveReason::AmbiguousConstructor),
        }
    }

    /// Store a strategy on every call expression of `node` and return the
    /// class's call-site table. Re-marking a class yields the same markers
    /// and the same table.
    pub fn mark_class(&self, node: &mut ClassNode) -> CallSiteTable {
        let class = node.id;
        let mut sites = CallSiteTable::new(&node.name);

        for field in &mut node.fields {
            let in_static = field.is_static();
            if let Some(init) = &mut field.initializer {
                self.marker(class, in_static, &mut sites).visit_expression_mut(init);
            }
        }
        for ctor in &mut node.constructors {
            self.marker(class, false, &mut sites).visit_block_mut(&mut ctor.body);
        }
        for method in &mut node.methods {
            let in_static = method.is_static();
            if let Some(body) = &mut method.body {
                self.marker(class, in_static, &mut sites).visit_block_mut(body);
            }
        }
        for stmt in &mut node.static_initializer {
            self.marker(class, true, &mut sites).visit_statement_mut(stmt);
        }

        debug!(class = %node.name, sites = sites.len(), "call dispatch marked");
        sites
    }

    fn marker<'w, 's>(&'w self, class: ClassId, in_static: bool, sites: &'s mut CallSiteTable) -> Marker<'w, 'a, 's> {
        Marker {
            writer: self,
            ctx: CallContext {
                class,
                in_static,
                sites,
            },
        }
    }

    fn is_closure_field_call(&self, class: ClassId, name: &str, arity: usize) -> bool {
        let closure = self.table.well_known().closure;
        let closure_typed = self
            .table
            .find_field(class, name)
            .and_then(|(_, f)| self.table.resolve(&f.ty).class_id())
            .is_some_and(|ty| self.table.is_derived_from(ty, closure));
        closure_typed && self.table.find_method(class, name, arity).is_none()
    }

    fn find_applicable(&self, owner: ClassId, name: &str, arity: usize) -> Option<(ClassId, &'a MethodNode)> {
        let table = self.table;
        if let Some(found) = table.find_method(owner, name, arity) {
            return Some(found);
        }
        let mut current = Some(owner);
        while let Some(id) = current {
            let node = table.get(id)?;
            let varargs = node.methods_named(name).find(|m| {
                m.modifiers.contains(Modifiers::VARARGS) && m.arity() > 0 && m.arity() - 1 <= arity
            });
            if let Some(method) = varargs {
                return Some((id, method));
            }
            current = table.superclass_of(id).filter(|next| *next != id);
        }
        None
    }

    /// Static type of a receiver expression, when it is evident
    fn receiver_hint(&self, object: &Expression, class: ClassId) -> Option<TypeRef> {
        let table = self.table;
        match object {
            Expression::Variable(VariableExpr { name, accessed, .. }) => match accessed {
                _ if name == "this" => Some(table.type_ref(class)),
                Some(AccessedVariable::Field { owner, name }) => {
                    table.find_field(*owner, name).map(|(_, f)| table.resolve(&f.ty))
                }
                _ => None,
            },
            Expression::Class(c) => Some(table.resolve(&c.ty)),
            Expression::Constant(c) => table.constant_type(&c.value).map(|id| table.type_ref(id)),
            Expression::Field(f) => table.find_field(f.owner, &f.name).map(|(_, f)| table.resolve(&f.ty)),
            Expression::ConstructorCall(ConstructorCallExpr {
                kind: ConstructorCallKind::New(ty),
                ..
            }) => Some(table.resolve(ty)),
            _ => None,
        }
    }
}

struct Marker<'w, 'a, 's> {
    writer: &'w InvocationWriter<'a>,
    ctx: CallContext<'s>,
}

impl VisitorMut for Marker<'_, '_, '_> {
    fn visit_method_call_mut(&mut self, call: &mut MethodCallExpr) {
        call.dispatch = Some(self.writer.select_strategy(call, &mut self.ctx));
        walk_method_call_mut(self, call);
    }

    fn visit_static_method_call_mut(&mut self, call: &mut StaticMethodCallExpr) {
        call.dispatch = Some(self.writer.select_static_strategy(call, &mut self.ctx));
        for arg in &mut call.arguments {
            self.visit_expression_mut(arg);
        }
    }

    fn visit_constructor_call_mut(&mut self, call: &mut ConstructorCallExpr) {
        call.dispatch = Some(self.writer.select_constructor_strategy(call, &self.ctx));
        for arg in &mut call.arguments {
            self.visit_expression_mut(arg);
        }
    }
}

/// Mark one class of `table` in place
pub fn mark_table_class(table: &mut ClassTable, id: ClassId, options: &CompilerOptions) -> CallSiteTable {
    let mut node = table[id].clone();
    let sites = InvocationWriter::new(table, options).mark_class(&mut node);
    table[id] = node;
    sites
}
