//! Dispatch marking through to runtime call sites

mod common;

use common::*;
use tern_engine::ast::{
    build, CapturedVariable, ClassId, ClassTable, DispatchStrategy, Expression, FieldNode,
    Modifiers, ReflectiveReason, Statement,
};
use tern_engine::vm::{ArgShape, CallSiteStats, MemberHandle};
use tern_engine::{
    ClassLoader, ClosureWriter, CompilerOptions, DispatchError, ErrorCollector, ReflectionCache,
    RuntimeOptions, SemanticPipeline,
};

/// ```text
/// class Widget {
///     Closure onClick
///     int items() { return 1 }
///     Object render() { return this.items() }
///     Object fire() { return onClick(1) }
///     Object poke(Object other) { return other.size() }
/// }
/// ```
fn widget() -> (ClassTable, ClassId) {
    let mut table = ClassTable::new();
    let widget = class(&mut table, "Widget");
    let wk = table.well_known().clone();
    let (int, object, closure) = (table.type_ref(wk.int), table.type_ref(wk.object), table.type_ref(wk.closure));

    table[widget].add_field(FieldNode::new("onClick", Modifiers::PRIVATE, closure));
    table[widget].add_method(method("items", vec![], int, vec![build::ret(build::int(1))]));
    table[widget].add_method(method(
        "render",
        vec![],
        object.clone(),
        vec![build::ret(build::call(build::this(), "items", vec![]))],
    ));
    table[widget].add_method(method(
        "fire",
        vec![],
        object.clone(),
        vec![build::ret(build::implicit_call("onClick", vec![build::int(1)]))],
    ));
    let other = tern_engine::ast::Parameter::new("other", object.clone());
    table[widget].add_method(method(
        "poke",
        vec![other],
        object,
        vec![build::ret(build::call(build::param_var("other"), "size", vec![]))],
    ));
    (table, widget)
}

fn returned_call(table: &ClassTable, class: ClassId, method_name: &str) -> Option<DispatchStrategy> {
    let body = table[class].methods_named(method_name).next()?.body.as_ref()?;
    let Some(Statement::Return { value: Some(Expression::MethodCall(call)), .. }) = body.statements.first() else {
        return None;
    };
    call.dispatch.clone()
}

// ============================================================================
// Marking Tests
// ============================================================================

mod marking {
    use super::*;

    #[test]
    fn test_strategies_per_call() {
        let (mut table, widget) = widget();
        let (output, errors) = complete(&mut table);
        assert!(errors.is_empty());

        assert!(matches!(
            returned_call(&table, widget, "render"),
            Some(DispatchStrategy::CallSite { index: 0, ref key }) if key.name == "items"
        ));
        assert_eq!(
            returned_call(&table, widget, "fire"),
            Some(DispatchStrategy::ClosureField { name: "onClick".to_string() })
        );
        assert!(matches!(
            returned_call(&table, widget, "poke"),
            Some(DispatchStrategy::CallSite { index: 1, ref key }) if key.receiver.is_none()
        ));
        assert_eq!(output.sites(widget).unwrap().names(), ["items", "size"]);
    }

    #[test]
    fn test_caching_disabled() {
        let (mut table, widget) = widget();
        let options = CompilerOptions {
            call_site_caching: false,
            ..CompilerOptions::default()
        };
        let mut errors = ErrorCollector::new();
        let output = SemanticPipeline::new(options).run(&mut table, &mut errors);

        assert_eq!(
            returned_call(&table, widget, "render"),
            Some(DispatchStrategy::Reflective(ReflectiveReason::CachingDisabled))
        );
        assert_eq!(output.total_sites(), 0);
    }

    #[test]
    fn test_closure_class_marked_with_unit() {
        let (mut table, widget) = widget();
        let int = table.type_ref(table.well_known().int);
        let Expression::Closure(mut closure) = build::closure(
            vec![],
            tern_engine::ast::Block::new(vec![build::ret(build::call(build::var("count"), "plus", vec![build::int(1)]))]),
        ) else {
            unreachable!();
        };
        closure.captured.push(CapturedVariable {
            name: "count".to_string(),
            ty: int,
        });
        let closure_class = ClosureWriter::new().create_closure_class(&mut table, widget, "render", &closure);
        let (output, errors) = complete(&mut table);
        assert!(errors.is_empty());

        assert_eq!(table[closure_class].name, "Widget$_render_closure1");
        assert_eq!(output.sites(closure_class).unwrap().names(), ["plus"]);
        let super_call = table[closure_class].constructors[0].special_constructor_call().unwrap();
        assert!(matches!(super_call.dispatch, Some(DispatchStrategy::DirectConstructor { .. })));
    }
}

// ============================================================================
// Runtime Resolution Tests
// ============================================================================

mod runtime {
    use super::*;

    struct Runtime {
        loader: ClassLoader,
        cache: ReflectionCache,
        sites: tern_engine::CallSiteArray,
    }

    fn runtime() -> Runtime {
        let (mut table, widget) = widget();
        let (output, _) = complete(&mut table);
        let loader = ClassLoader::new();
        loader.define_from_node(&table, widget).unwrap();
        Runtime {
            loader,
            cache: ReflectionCache::new(RuntimeOptions::default()),
            sites: output.call_site_array(widget).unwrap(),
        }
    }

    #[test]
    fn test_site_resolves_and_caches() {
        let rt = runtime();
        let class = rt.loader.lookup("Widget").unwrap();
        let site = rt.sites.get(0).unwrap();
        assert_eq!(site.name(), "items");

        let first = site.resolve(&rt.cache, &class, ArgShape::of(0)).unwrap();
        assert_eq!(first.declaring_class(), "Widget");
        let second = site.resolve(&rt.cache, &class, ArgShape::of(0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            site.stats(),
            CallSiteStats {
                hits: 1,
                misses: 1,
                invalidations: 0
            }
        );
        assert_eq!(site.entry_count(), 1);
    }

    #[test]
    fn test_added_method_invalidates_site() {
        let rt = runtime();
        let class = rt.loader.lookup("Widget").unwrap();
        let site = rt.sites.get(0).unwrap();
        let before = site.resolve(&rt.cache, &class, ArgShape::of(0)).unwrap();

        let added = rt
            .cache
            .class_info(&class)
            .unwrap()
            .add_method("items", &[], "int", Modifiers::PUBLIC);
        let after = site.resolve(&rt.cache, &class, ArgShape::of(0)).unwrap();

        assert_ne!(before, after);
        assert_eq!(after, MemberHandle::Method(added));
        assert_eq!(site.stats().invalidations, 1);
        // one entry per (receiver, shape), replaced in place
        assert_eq!(site.entry_count(), 1);
    }

    #[test]
    fn test_missing_member() {
        let rt = runtime();
        let class = rt.loader.lookup("Widget").unwrap();
        let site = rt.sites.get(1).unwrap();
        assert_eq!(
            site.resolve(&rt.cache, &class, ArgShape::of(0)).unwrap_err(),
            DispatchError::MissingMethod {
                class: "Widget".to_string(),
                name: "size".to_string(),
                arity: 0
            }
        );
    }
}
