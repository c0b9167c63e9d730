//! Closure class generation
//!
//! A closure literal inside a class body becomes a synthetic inner class
//! extending `Closure`. Captured variables are passed to its constructor and
//! stored in private fields; the closure body becomes `doCall`.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::build;
use crate::ast::{
    Block, ClassId, ClassKind, ClassNode, ClassTable, ClosureExpr, ConstructorNode, FieldNode,
    MethodNode, Modifiers, Parameter,
};

const OUTER_INSTANCE_PARAM: &str = "_outerInstance";
const THIS_OBJECT_PARAM: &str = "_thisObject";
const IMPLICIT_PARAM: &str = "it";
const CALL_METHOD: &str = "doCall";

/// Creates closure classes for one compilation unit
#[derive(Debug, Default)]
pub struct ClosureWriter {
    /// Closures generated so far per outer class
    counters: FxHashMap<ClassId, usize>,
}

impl ClosureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the class for `closure`, declared in `method_name` of `outer`
    pub fn create_closure_class(
        &mut self,
        table: &mut ClassTable,
        outer: ClassId,
        method_name: &str,
        closure: &ClosureExpr,
    ) -> ClassId {
        let name = self.next_name(table, outer, method_name);
        let wk = table.well_known();
        let object = table.type_ref(wk.object);
        let closure_ty = table.type_ref(wk.closure);

        let mut node = ClassNode::new(&name, ClassKind::Class)
            .with_superclass(closure_ty)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::FINAL | Modifiers::SYNTHETIC)
            .with_span(closure.span);
        node.outer = Some(outer);
        let id = table.add_class(node);

        let mut ctor_params = vec![
            Parameter::new(OUTER_INSTANCE_PARAM, object.clone()),
            Parameter::new(THIS_OBJECT_PARAM, object.clone()),
        ];
        let mut ctor_body = vec![build::expr_stmt(build::super_call(vec![
            build::param_var(OUTER_INSTANCE_PARAM),
            build::param_var(THIS_OBJECT_PARAM),
        ]))];

        let node = &mut table[id];
        for captured in &closure.captured {
            node.add_field(FieldNode::new(&captured.name, Modifiers::PRIVATE, captured.ty.clone()));
            ctor_params.push(Parameter::new(&captured.name, captured.ty.clone()));
            ctor_body.push(build::expr_stmt(build::assign(
                build::field(id, &captured.name),
                build::param_var(&captured.name),
            )));
            node.add_method(MethodNode::new(
                accessor_name(&captured.name),
                Modifiers::PUBLIC,
                captured.ty.clone(),
                Vec::new(),
                Some(Block::new(vec![build::ret(build::field(id, &captured.name))])),
            ));
        }
        node.add_constructor(ConstructorNode::new(Modifiers::PUBLIC, ctor_params, Block::new(ctor_body)));

        let params = if closure.parameters.is_empty() {
            let mut it = Parameter::new(IMPLICIT_PARAM, object.clone());
            it.default = Some(build::null());
            vec![it]
        } else {
            closure.parameters.clone()
        };
        node.add_method(MethodNode::new(
            CALL_METHOD,
            Modifiers::PUBLIC,
            object,
            params,
            Some(closure.body.clone()),
        ));

        debug!(class = %name, captured = closure.captured.len(), "closure class created");
        id
    }

    /// `Outer$_method_closureN`, skipping names already in the table
    fn next_name(&mut self, table: &ClassTable, outer: ClassId, method_name: &str) -> String {
        let counter = self.counters.entry(outer).or_insert(0);
        loop {
            *counter += 1;
            let name = format!("{}$_{}_closure{}", table[outer].name, method_name, counter);
            if table.lookup(&name).is_none() {
                return name;
            }
        }
    }
}

/// `getX` for a captured variable `x`
fn accessor_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("get{}{}", first.to_uppercase(), chars.as_str()),
        None => "get".to_string(),
    }
}
