//! Semantic completion pipeline
//!
//! Runs the passes over the source classes of one compilation unit:
//! 1. enum fields, companions and static initializers
//! 2. annotation validation and annotation-definition cycle checks
//! 3. enum constructor completion
//! 4. call dispatch marking
//!
//! Every pass records its progress on the nodes, so running the pipeline
//! again over a completed unit changes nothing and reports nothing new.

use indexmap::IndexMap;
use tracing::debug;

use super::annotation::AnnotationValidator;
use super::enums::{processing_order, EnumCompletionVisitor, EnumVisitor};
use super::error::ErrorCollector;
use super::invocation::{mark_table_class, CallSiteTable};
use crate::ast::{AnnotationNode, ClassId, ClassNode, ClassTable};
use crate::options::CompilerOptions;
use crate::vm::CallSiteArray;

/// Result of a pipeline run
#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Call-site table per marked class, in class order
    pub call_sites: IndexMap<ClassId, CallSiteTable>,
}

impl PipelineOutput {
    pub fn sites(&self, class: ClassId) -> Option<&CallSiteTable> {
        self.call_sites.get(&class)
    }

    /// Runtime call-site array seeded from a class's table
    pub fn call_site_array(&self, class: ClassId) -> Option<CallSiteArray> {
        self.sites(class).map(CallSiteArray::from_table)
    }

    pub fn total_sites(&self) -> usize {
        self.call_sites.values().map(CallSiteTable::len).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SemanticPipeline {
    options: CompilerOptions,
}

impl SemanticPipeline {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Complete every source class of `table`. Stops between phases once
    /// `errors` reaches its tolerance; dispatch marking only runs when all
    /// earlier phases finished.
    #[tracing::instrument(level = "debug", skip_all, fields(classes = table.len()))]
    pub fn run(&self, table: &mut ClassTable, errors: &mut ErrorCollector) -> PipelineOutput {
        let mut output = PipelineOutput::default();
        let enums = processing_order(table);

        debug!(enums = enums.len(), "enum completion");
        for &id in &enums {
            EnumVisitor::new(table, errors).visit(id);
        }
        if errors.is_full() {
            return output;
        }

        debug!("annotation validation");
        self.validate_annotations(table, errors);
        if errors.is_full() {
            return output;
        }

        debug!("enum constructors");
        for &id in &enums {
            EnumCompletionVisitor::new(table).visit(id);
        }

        debug!("call dispatch");
        for id in table.source_classes() {
            let sites = mark_table_class(table, id, &self.options);
            output.call_sites.insert(id, sites);
        }
        debug!(sites = output.total_sites(), errors = errors.len(), "pipeline finished");
        output
    }

    fn validate_annotations(&self, table: &mut ClassTable, errors: &mut ErrorCollector) {
        for id in table.source_classes() {
            // Detach the usages so they can be rewritten while the table is
            // borrowed for lookups
            let mut taken: Vec<Vec<AnnotationNode>> = annotation_slots(&mut table[id])
                .into_iter()
                .map(std::mem::take)
                .collect();

            let mut validator = AnnotationValidator::new(table, errors, &self.options);
            for node in taken.iter_mut().flatten() {
                validator.validate(node);
            }

            for (slot, usages) in annotation_slots(&mut table[id]).into_iter().zip(taken) {
                *slot = usages;
            }
            if errors.is_full() {
                return;
            }
        }

        for id in table.source_classes() {
            if !table.is_annotation(id) || table[id].definition_checked {
                continue;
            }
            AnnotationValidator::new(table, errors, &self.options).check_annotation_definition(id);
            table[id].definition_checked = true;
        }
    }
}

/// Every annotation list of a class: the class itself, fields, then
/// methods and constructors each followed by their parameters
fn annotation_slots(node: &mut ClassNode) -> Vec<&mut Vec<AnnotationNode>> {
    let mut slots = vec![&mut node.annotations];
    for field in &mut node.fields {
        slots.push(&mut field.annotations);
    }
    for method in &mut node.methods {
        slots.push(&mut method.annotations);
        slots.extend(method.parameters.iter_mut().map(|p| &mut p.annotations));
    }
    for ctor in &mut node.constructors {
        slots.push(&mut ctor.annotations);
        slots.extend(ctor.parameters.iter_mut().map(|p| &mut p.annotations));
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;
    use crate::ast::{ClassKind, FieldNode, MethodNode, Modifiers, Span};
    use crate::compiler::error::SemanticError;
    use crate::defaults::{ENUM_INIT_METHOD, ENUM_VALUES_FIELD};

    fn unit() -> (ClassTable, ClassId, ClassId) {
        let mut table = ClassTable::new();
        let wk = table.well_known().clone();
        let enum_ty = table.type_ref(wk.enum_base);
        let string = table.type_ref(wk.string);

        let color = table.add_class(ClassNode::new("Color", ClassKind::Enum).with_superclass(enum_ty));
        let color_ty = table.type_ref(color);
        for name in ["RED", "GREEN", "BLUE"] {
            table[color].add_field(FieldNode::new(
                name,
                Modifiers::PUBLIC_STATIC_FINAL | Modifiers::ENUM,
                color_ty.clone(),
            ));
        }

        let label = table.add_class(ClassNode::new("Label", ClassKind::Annotation));
        table[label].add_method(MethodNode::attribute("value", string, None));
        let label_ty = table.type_ref(label);
        table[color].annotations.push(
            AnnotationNode::new(label_ty, Span::new(0, 6, 1, 1)).with_member("value", build::string("palette")),
        );
        (table, color, label)
    }

    #[test]
    fn test_completes_unit() {
        let (mut table, color, _) = unit();
        let mut errors = ErrorCollector::new();
        let output = SemanticPipeline::default().run(&mut table, &mut errors);

        assert!(errors.is_empty(), "{:?}", errors.errors());
        let node = &table[color];
        assert!(node.field(ENUM_VALUES_FIELD).is_some());
        assert!(node.constructors.iter().all(|c| c.hidden_params));
        assert!(node.annotations[0].validated);
        assert!(output.sites(color).is_some());
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let (mut table, color, label) = unit();
        let pipeline = SemanticPipeline::default();
        let mut errors = ErrorCollector::new();
        let first = pipeline.run(&mut table, &mut errors);
        let snapshot = (table[color].clone(), table[label].clone());

        let second = pipeline.run(&mut table, &mut errors);
        assert_eq!((table[color].clone(), table[label].clone()), snapshot);
        assert_eq!(first.call_sites, second.call_sites);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_static_initializer_binds_init_directly() {
        let (mut table, color, _) = unit();
        let mut errors = ErrorCollector::new();
        SemanticPipeline::default().run(&mut table, &mut errors);

        let Some(crate::ast::Expression::Assign(assign)) = table[color].static_initializer[0].as_expression() else {
            panic!("expected constant assignment");
        };
        let crate::ast::Expression::StaticMethodCall(call) = &*assign.value else {
            panic!("expected $INIT call");
        };
        assert_eq!(call.method, ENUM_INIT_METHOD);
        assert!(call.dispatch.as_ref().is_some_and(|d| !d.is_reflective()));
    }

    #[test]
    fn test_tolerance_stops_before_marking() {
        let (mut table, color, _) = unit();
        let missing = table.type_named("Missing");
        table[color].annotations.push(AnnotationNode::new(missing.clone(), Span::new(7, 15, 2, 1)));
        table[color].annotations.push(AnnotationNode::new(missing, Span::new(16, 24, 3, 1)));

        let mut errors = ErrorCollector::with_tolerance(1);
        let output = SemanticPipeline::default().run(&mut table, &mut errors);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.errors()[0], SemanticError::NotAnAnnotation { .. }));
        assert!(output.call_sites.is_empty());
        // The constructors phase never ran
        assert!(table[color].constructors.is_empty());
    }
}
