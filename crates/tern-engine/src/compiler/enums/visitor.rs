//! Enum fields, companions and static initializer

use tracing::debug;

use super::super::error::{ErrorCollector, SemanticError};
use crate::ast::build;
use crate::ast::{
    BinaryOp, Block, ClassId, ClassKind, ClassTable, Expression, FieldNode, MethodNode, Modifiers,
    Parameter, Statement, TypeRef,
};
use crate::defaults::{ENUM_INIT_METHOD, ENUM_MAX_VALUE, ENUM_MIN_VALUE, ENUM_VALUES_FIELD};

/// One enum constant ready to be built by the static initializer
struct ConstantInit {
    name: String,
    ordinal: i32,
    /// The enum itself, or the constant's own body class
    owner: ClassId,
    arguments: Vec<Expression>,
}

pub struct EnumVisitor<'a> {
    table: &'a mut ClassTable,
    errors: &'a mut ErrorCollector,
}

impl<'a> EnumVisitor<'a> {
    pub fn new(table: &'a mut ClassTable, errors: &'a mut ErrorCollector) -> Self {
        Self { table, errors }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(class = %self.table[id].name))]
    pub fn visit(&mut self, id: ClassId) {
        let node = &self.table[id];
        if !node.is_enum() || node.builtin {
            return;
        }
        if node.is_enum_constant_body() {
            self.add_init_method(id, true);
            return;
        }
        if node.field(ENUM_VALUES_FIELD).is_some() {
            debug!("already completed");
            return;
        }

        let (inits, has_bodies) = self.plan_constants(id);
        let has_abstract = self.table[id].methods.iter().any(MethodNode::is_abstract);

        self.add_fields(id, &inits);
        self.add_companions(id);
        self.add_init_method(id, !has_bodies);
        self.add_static_initializer(id, &inits);

        let node = &mut self.table[id];
        if has_bodies || has_abstract {
            node.modifiers.remove(Modifiers::FINAL);
        }
        if has_abstract {
            node.modifiers.insert(Modifiers::ABSTRACT);
        }
        for field in node.fields.iter_mut().filter(|f| f.is_enum_constant()) {
            field.initializer = None;
        }
        debug!(constants = inits.len(), "enum completed");
    }

    /// Ordinal-number the constants and check their initializers and bodies
    fn plan_constants(&mut self, id: ClassId) -> (Vec<ConstantInit>, bool) {
        let table = &*self.table;
        let node = &table[id];
        let abstract_methods: Vec<&MethodNode> = node.methods.iter().filter(|m| m.is_abstract()).collect();

        let mut inits = Vec::new();
        let mut has_bodies = false;
        for (ordinal, field) in node.enum_constants().enumerate() {
            let arguments = match &field.initializer {
                Some(Expression::List(list)) => list.elements.clone(),
                Some(other) => vec![other.clone()],
                None => Vec::new(),
            };

            let mut body = None;
            let mut call_args = Vec::new();
            let mut rejected = false;
            for arg in arguments {
                match arg {
                    Expression::Class(c) if is_body_of(table, &c.ty, id) => body = c.ty.class_id(),
                    Expression::MapEntry(entry) => {
                        if !rejected {
                            self.errors.add(SemanticError::UnsupportedEnumInitializer {
                                enum_name: node.name.clone(),
                                constant: field.name.clone(),
                                span: entry.span,
                            });
                        }
                        rejected = true;
                    }
                    other => call_args.push(other),
                }
            }
            has_bodies |= body.is_some();

            for method in &abstract_methods {
                let implemented = body
                    .and_then(|b| table[b].method(&method.name, method.arity()))
                    .is_some_and(|m| !m.is_abstract());
                if !implemented {
                    self.errors.add(SemanticError::AbstractMethodNotImplemented {
                        constant: field.name.clone(),
                        method: method.type_descriptor(),
                        span: field.span,
                    });
                }
            }

            if rejected {
                continue;
            }
            inits.push(ConstantInit {
                name: field.name.clone(),
                ordinal: ordinal as i32,
                owner: body.unwrap_or(id),
                arguments: call_args,
            });
        }
        (inits, has_bodies)
    }

    fn add_fields(&mut self, id: ClassId, inits: &[ConstantInit]) {
        let enum_ty = self.table.type_ref(id);
        let node = &mut self.table[id];
        node.add_field(FieldNode::new(
            ENUM_VALUES_FIELD,
            Modifiers::PRIVATE_STATIC_FINAL | Modifiers::SYNTHETIC,
            enum_ty.clone().array_of(),
        ));
        if inits.is_empty() {
            return;
        }
        for name in [ENUM_MIN_VALUE, ENUM_MAX_VALUE] {
            if node.field(name).is_none() {
                node.add_field(FieldNode::new(name, Modifiers::PUBLIC_STATIC_FINAL, enum_ty.clone()));
            }
        }
    }

    fn add_companions(&mut self, id: ClassId) {
        let enum_ty = self.table.type_ref(id);
        let wk = self.table.well_known();
        let int_ty = self.table.type_ref(wk.int);
        let string_ty = self.table.type_ref(wk.string);
        let enum_base = wk.enum_base;
        let values = || build::field(id, ENUM_VALUES_FIELD);

        let mut companions = Vec::new();

        // values(): $VALUES.clone()
        companions.push(MethodNode::new(
            "values",
            Modifiers::PUBLIC | Modifiers::STATIC,
            enum_ty.clone().array_of(),
            Vec::new(),
            Some(Block::new(vec![build::ret(build::call(values(), "clone", vec![]))])),
        ));

        // next(): ordinal + 1, wrapping to the first constant
        companions.push(MethodNode::new(
            "next",
            Modifiers::PUBLIC,
            enum_ty.clone(),
            Vec::new(),
            Some(Block::new(vec![
                build::decl(
                    "ordinal",
                    int_ty.clone(),
                    build::binary(BinaryOp::Add, build::implicit_call("ordinal", vec![]), build::int(1)),
                ),
                build::if_then(
                    build::binary(BinaryOp::Ge, build::var("ordinal"), build::prop(values(), "length")),
                    vec![build::expr_stmt(build::assign(build::var("ordinal"), build::int(0)))],
                ),
                build::ret(build::index(values(), build::var("ordinal"))),
            ])),
        ));

        // previous(): ordinal - 1, wrapping to the last constant
        companions.push(MethodNode::new(
            "previous",
            Modifiers::PUBLIC,
            enum_ty.clone(),
            Vec::new(),
            Some(Block::new(vec![
                build::decl(
                    "ordinal",
                    int_ty,
                    build::binary(BinaryOp::Sub, build::implicit_call("ordinal", vec![]), build::int(1)),
                ),
                build::if_then(
                    build::binary(BinaryOp::Lt, build::var("ordinal"), build::int(0)),
                    vec![build::expr_stmt(build::assign(
                        build::var("ordinal"),
                        build::binary(BinaryOp::Sub, build::prop(values(), "length"), build::int(1)),
                    ))],
                ),
                build::ret(build::index(values(), build::var("ordinal"))),
            ])),
        ));

        // valueOf(String name): Enum.valueOf(E, name)
        companions.push(MethodNode::new(
            "valueOf",
            Modifiers::PUBLIC | Modifiers::STATIC,
            enum_ty.clone(),
            vec![Parameter::new("name", string_ty)],
            Some(Block::new(vec![build::ret(build::static_call(
                enum_base,
                "Enum",
                "valueOf",
                vec![build::class_expr(enum_ty), build::param_var("name")],
            ))])),
        ));

        let node = &mut self.table[id];
        for method in companions {
            if !node.has_method(&method.name, method.arity()) {
                node.add_method(method);
            }
        }
    }

    /// `$INIT(Object[] para)`: the one construction path for constants
    fn add_init_method(&mut self, id: ClassId, is_final: bool) {
        if self.table[id].has_method(ENUM_INIT_METHOD, 1) {
            return;
        }
        let ty = self.table.type_ref(id);
        let object_array = self.table.type_ref(self.table.well_known().object).array_of();

        let mut modifiers = Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC | Modifiers::VARARGS;
        if is_final {
            modifiers |= Modifiers::FINAL;
        }
        let body = Block::new(vec![build::ret(build::this_call(vec![build::spread(build::param_var("para"))]))]);
        self.table[id].add_method(MethodNode::new(
            ENUM_INIT_METHOD,
            modifiers,
            ty,
            vec![Parameter::new("para", object_array)],
            Some(body),
        ));
    }

    fn add_static_initializer(&mut self, id: ClassId, inits: &[ConstantInit]) {
        let enum_ty = self.table.type_ref(id);
        let mut statements: Vec<Statement> = Vec::with_capacity(inits.len() + 3);

        for init in inits {
            let owner_name = self.table[init.owner].name.clone();
            let mut args = vec![build::string(&init.name), build::int(init.ordinal)];
            args.extend(init.arguments.iter().cloned());
            statements.push(build::expr_stmt(build::assign(
                build::field(id, &init.name),
                build::static_call(init.owner, owner_name, ENUM_INIT_METHOD, args),
            )));
        }

        if let (Some(first), Some(last)) = (inits.first(), inits.last()) {
            statements.push(build::expr_stmt(build::assign(
                build::field(id, ENUM_MIN_VALUE),
                build::field(id, &first.name),
            )));
            statements.push(build::expr_stmt(build::assign(
                build::field(id, ENUM_MAX_VALUE),
                build::field(id, &last.name),
            )));
        }

        let elements = inits.iter().map(|i| build::field(id, &i.name)).collect();
        statements.push(build::expr_stmt(build::assign(
            build::field(id, ENUM_VALUES_FIELD),
            build::array(enum_ty, elements),
        )));

        let node = &mut self.table[id];
        statements.append(&mut node.static_initializer);
        node.static_initializer = statements;
    }
}

fn is_body_of(table: &ClassTable, ty: &TypeRef, enum_id: ClassId) -> bool {
    ty.class_id()
        .and_then(|b| table.get(b))
        .is_some_and(|b| {
            b.kind == ClassKind::EnumConstantBody
                && b.superclass.as_ref().and_then(TypeRef::class_id) == Some(enum_id)
        })
}
