//! Enum constructor completion

use tracing::debug;

use super::unique_name;
use crate::ast::build;
use crate::ast::visitor::referenced_variables;
use crate::ast::{
    BinaryOp, Block, ClassId, ClassKind, ClassTable, ConstructorCallKind, ConstructorNode, Modifiers,
    Parameter, TypeRef,
};
use crate::defaults::{ENUM_NAMED_ARGS_PARAM, ENUM_NAME_PARAM, ENUM_ORDINAL_PARAM};

pub struct EnumCompletionVisitor<'a> {
    table: &'a mut ClassTable,
}

impl<'a> EnumCompletionVisitor<'a> {
    pub fn new(table: &'a mut ClassTable) -> Self {
        Self { table }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(class = %self.table[id].name))]
    pub fn visit(&mut self, id: ClassId) {
        let node = &self.table[id];
        if !node.is_enum() || node.builtin {
            return;
        }
        let is_body = node.kind == ClassKind::EnumConstantBody;

        if node.constructors.is_empty() {
            let ctors = if is_body {
                self.mirrored_constructors(id)
            } else {
                self.named_args_constructors(id, true)
            };
            debug!(count = ctors.len(), "synthesized constructors");
            for ctor in ctors {
                self.table[id].add_constructor(ctor);
            }
        }

        let wk = self.table.well_known();
        let string_ty = self.table.type_ref(wk.string);
        let int_ty = self.table.type_ref(wk.int);
        let mut injected = 0;
        for ctor in self.table[id].constructors.iter_mut().filter(|c| !c.hidden_params) {
            if inject_hidden_params(ctor, &string_ty, &int_ty, is_body) {
                injected += 1;
            }
        }
        debug!(injected, "hidden parameters injected");
    }

    /// Signatures of the base enum's constructors with empty bodies. Hidden
    /// parameters already injected into the base are not mirrored.
    fn mirrored_constructors(&self, id: ClassId) -> Vec<ConstructorNode> {
        let base = self
            .table
            .superclass_of(id)
            .and_then(|b| self.table.get(b))
            .filter(|b| !b.constructors.is_empty());
        let Some(base) = base else {
            return self.named_args_constructors(id, false);
        };
        base.constructors
            .iter()
            .map(|c| {
                let skip = if c.hidden_params { 2 } else { 0 };
                let params = c.parameters.iter().skip(skip).cloned().collect();
                ConstructorNode::new(Modifiers::PUBLIC, params, Block::empty())
            })
            .collect()
    }

    /// `(Map __namedArgs)` and `()`. With `guarded` set (real enums) the map
    /// constructor rejects `null` and the no-arg one chains `this([:])`.
    fn named_args_constructors(&self, id: ClassId, guarded: bool) -> Vec<ConstructorNode> {
        let wk = self.table.well_known();
        let map_ty = self.table.type_ref(wk.map);
        let named_args = vec![Parameter::new(ENUM_NAMED_ARGS_PARAM, map_ty)];

        if !guarded {
            return vec![
                ConstructorNode::new(Modifiers::PUBLIC, named_args, Block::empty()),
                ConstructorNode::new(Modifiers::PUBLIC, Vec::new(), Block::empty()),
            ];
        }

        let message = format!(
            "One of the enum constants for enum {} was initialized with null. \
             Please use a non-null value or define your own constructor.",
            self.table[id].name
        );
        let null_check = build::if_then(
            build::binary(BinaryOp::Eq, build::param_var(ENUM_NAMED_ARGS_PARAM), build::null()),
            vec![build::throw(build::new_instance(
                self.table.type_ref(wk.illegal_argument),
                vec![build::string(message)],
            ))],
        );
        vec![
            ConstructorNode::new(Modifiers::PRIVATE, named_args, Block::new(vec![null_check])),
            ConstructorNode::new(
                Modifiers::PRIVATE,
                Vec::new(),
                Block::new(vec![build::expr_stmt(build::this_call(vec![build::empty_map()]))]),
            ),
        ]
    }
}

/// Prepend `(String, int)` and route them to the base. Returns false for a
/// constructor that already starts with an explicit `super(...)`.
fn inject_hidden_params(ctor: &mut ConstructorNode, string_ty: &TypeRef, int_ty: &TypeRef, forward: bool) -> bool {
    if ctor
        .special_constructor_call()
        .is_some_and(|c| c.kind == ConstructorCallKind::Super)
    {
        return false;
    }

    let mut taken = referenced_variables(&ctor.body);
    taken.extend(ctor.parameters.iter().map(|p| p.name.clone()));
    let name = unique_name(ENUM_NAME_PARAM, &taken);
    taken.push(name.clone());
    let ordinal = unique_name(ENUM_ORDINAL_PARAM, &taken);
    let hidden = [build::param_var(&name), build::param_var(&ordinal)];

    if let Some(this_call) = ctor.special_constructor_call_mut() {
        this_call.arguments.splice(0..0, hidden);
    } else {
        let mut args = hidden.to_vec();
        if forward {
            args.extend(ctor.parameters.iter().map(|p| build::param_var(&p.name)));
        }
        ctor.body.statements.insert(0, build::expr_stmt(build::super_call(args)));
    }

    ctor.parameters.splice(
        0..0,
        [Parameter::new(name, string_ty.clone()), Parameter::new(ordinal, int_ty.clone())],
    );
    ctor.hidden_params = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassNode, Expression, Statement};

    fn enum_node(table: &mut ClassTable, name: &str) -> ClassId {
        let base = table.type_ref(table.well_known().enum_base);
        table.add_class(ClassNode::new(name, ClassKind::Enum).with_superclass(base))
    }

    fn param_names(ctor: &ConstructorNode) -> Vec<&str> {
        ctor.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn leading_call(ctor: &ConstructorNode) -> (&ConstructorCallKind, Vec<String>) {
        let call = ctor.special_constructor_call().expect("leading constructor call");
        (&call.kind, call.arguments.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_default_constructors() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Color");
        EnumCompletionVisitor::new(&mut table).visit(id);

        let ctors = &table[id].constructors;
        assert_eq!(ctors.len(), 2);
        assert!(ctors.iter().all(|c| c.hidden_params));

        assert_eq!(param_names(&ctors[0]), ["__str", "__int", "__namedArgs"]);
        assert_eq!(leading_call(&ctors[0]), (&ConstructorCallKind::Super, strings(&["__str", "__int"])));
        assert!(matches!(ctors[0].body.statements[1], Statement::If { .. }));

        assert_eq!(param_names(&ctors[1]), ["__str", "__int"]);
        assert_eq!(
            leading_call(&ctors[1]),
            (&ConstructorCallKind::This, strings(&["__str", "__int", "[:]"]))
        );
    }

    #[test]
    fn test_user_constructor_gets_hidden_params() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Level");
        let int = table.type_ref(table.well_known().int);
        let body = Block::new(vec![build::expr_stmt(build::assign(
            build::prop(build::this(), "x"),
            build::param_var("x"),
        ))]);
        table[id].add_constructor(ConstructorNode::new(
            Modifiers::PRIVATE,
            vec![Parameter::new("x", int)],
            body,
        ));
        EnumCompletionVisitor::new(&mut table).visit(id);

        let ctor = &table[id].constructors[0];
        assert_eq!(param_names(ctor), ["__str", "__int", "x"]);
        assert_eq!(leading_call(ctor), (&ConstructorCallKind::Super, strings(&["__str", "__int"])));
        assert_eq!(ctor.body.statements.len(), 2);
    }

    #[test]
    fn test_hidden_names_avoid_collisions() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Level");
        let string = table.type_ref(table.well_known().string);
        table[id].add_constructor(ConstructorNode::new(
            Modifiers::PRIVATE,
            vec![Parameter::new("__str", string)],
            Block::new(vec![build::expr_stmt(build::call(build::var("log"), "info", vec![build::var("__int")]))]),
        ));
        EnumCompletionVisitor::new(&mut table).visit(id);

        assert_eq!(param_names(&table[id].constructors[0]), ["___str", "___int", "__str"]);
    }

    #[test]
    fn test_body_mirrors_base_and_forwards() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Op");
        let int = table.type_ref(table.well_known().int);
        table[id].add_constructor(ConstructorNode::new(
            Modifiers::PRIVATE,
            vec![Parameter::new("arity", int)],
            Block::empty(),
        ));
        let op_ty = table.type_ref(id);
        let body = table.add_class(ClassNode::enum_constant_body("Op$1", op_ty));

        EnumCompletionVisitor::new(&mut table).visit(body);
        EnumCompletionVisitor::new(&mut table).visit(id);

        let mirrored = &table[body].constructors[0];
        assert_eq!(param_names(mirrored), ["__str", "__int", "arity"]);
        assert_eq!(
            leading_call(mirrored),
            (&ConstructorCallKind::Super, strings(&["__str", "__int", "arity"]))
        );
        assert_eq!(param_names(&table[id].constructors[0]), ["__str", "__int", "arity"]);
    }

    #[test]
    fn test_body_of_completed_base_strips_hidden() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Op");
        EnumCompletionVisitor::new(&mut table).visit(id);
        let op_ty = table.type_ref(id);
        let body = table.add_class(ClassNode::enum_constant_body("Op$1", op_ty));
        EnumCompletionVisitor::new(&mut table).visit(body);

        let arities: Vec<usize> = table[body].constructors.iter().map(ConstructorNode::arity).collect();
        assert_eq!(arities, [3, 2]);
    }

    #[test]
    fn test_explicit_super_left_alone() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Raw");
        let string = table.type_ref(table.well_known().string);
        let int = table.type_ref(table.well_known().int);
        let ctor = ConstructorNode::new(
            Modifiers::PRIVATE,
            vec![Parameter::new("n", string), Parameter::new("o", int)],
            Block::new(vec![build::expr_stmt(build::super_call(vec![build::param_var("n"), build::param_var("o")]))]),
        );
        table[id].add_constructor(ctor.clone());
        EnumCompletionVisitor::new(&mut table).visit(id);
        assert_eq!(table[id].constructors[0], ctor);
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut table = ClassTable::new();
        let id = enum_node(&mut table, "Color");
        EnumCompletionVisitor::new(&mut table).visit(id);
        let once = table[id].constructors.clone();
        EnumCompletionVisitor::new(&mut table).visit(id);
        assert_eq!(table[id].constructors, once);
        assert!(matches!(
            table[id].constructors[1].body.first().and_then(Statement::as_expression),
            Some(Expression::ConstructorCall(_))
        ));
    }
}
