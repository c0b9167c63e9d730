//! Annotation semantic validation
//!
//! `AnnotationValidator` checks one annotation usage against its declared
//! annotation type:
//!
//! 1. the type is an annotation type (otherwise stop),
//! 2. every attribute without a default has a value,
//! 3. every `EnumType.CONST` reference names a declared constant,
//! 4. every supplied value matches the attribute's declared type, after
//!    inline-constant folding.
//!
//! `check_circular_reference` and `check_annotation_definition` detect
//! annotation types whose attribute defaults cycle back to themselves.
//! All problems are reported to the shared `ErrorCollector`; nothing aborts.

use rustc_hash::FxHashSet;

use super::constant_fold::ConstantFolder;
use super::error::{ErrorCollector, NonConstantKind, SemanticError};
use crate::ast::{
    AnnotationNode, ClassId, ClassTable, Expression, ListExpr, MethodNode, TypeRef,
};
use crate::options::CompilerOptions;

pub struct AnnotationValidator<'a> {
    table: &'a ClassTable,
    errors: &'a mut ErrorCollector,
    options: &'a CompilerOptions,
}

impl<'a> AnnotationValidator<'a> {
    pub fn new(table: &'a ClassTable, errors: &'a mut ErrorCollector, options: &'a CompilerOptions) -> Self {
        Self {
            table,
            errors,
            options,
        }
    }

    /// Validate one usage in place. Returns whether it produced no errors.
    pub fn validate(&mut self, node: &mut AnnotationNode) -> bool {
        if node.validated {
            return true;
        }
        let before = self.errors.len();
        self.validate_inner(node);
        node.validated = true;
        self.errors.len() == before
    }

    fn validate_inner(&mut self, node: &mut AnnotationNode) {
        let table = self.table;
        let annotation_name = node.class.to_string();
        let Some(annotation) = table
            .resolve(&node.class)
            .class_id()
            .filter(|id| table.is_annotation(*id))
        else {
            self.errors.add(SemanticError::NotAnAnnotation {
                name: annotation_name,
                span: node.span,
            });
            return;
        };

        self.check_mandatory_attributes(node, annotation);
        self.check_enum_constants(node);

        let names: Vec<String> = node.members.keys().cloned().collect();
        for name in names {
            let Some(attribute) = table[annotation].method(&name, 0) else {
                let span = node.members.get(&name).map_or(node.span, Expression::span);
                self.errors.add(SemanticError::UnknownAttribute {
                    annotation: annotation_name.clone(),
                    attribute: name,
                    span,
                });
                continue;
            };
            let attr_type = table.resolve(&attribute.return_type);

            let Some(value) = node.members.get_mut(&name) else {
                continue;
            };
            if self.options.inline_constants {
                ConstantFolder::new(table).fold_in_place(value);
            }
            let site = AttributeSite {
                annotation: &annotation_name,
                attribute: &name,
            };
            self.visit_value(&site, value, &attr_type);
        }
    }

    fn check_mandatory_attributes(&mut self, node: &AnnotationNode, annotation: ClassId) {
        let table = self.table;
        let class = &table[annotation];
        for method in &class.methods {
            if method.annotation_default.is_none() && !node.members.contains_key(&method.name) {
                self.errors.add(SemanticError::MissingAttribute {
                    annotation: class.name.clone(),
                    attribute: method.name.clone(),
                    span: node.span,
                });
            }
        }
    }

    fn check_enum_constants(&mut self, node: &AnnotationNode) {
        for value in node.members.values() {
            self.check_enum_constant(value);
        }
    }

    fn check_enum_constant(&mut self, value: &Expression) {
        match value {
            Expression::List(list) => {
                for element in &list.elements {
                    self.check_enum_constant(element);
                }
            }
            Expression::Property(p) => {
                let Expression::Class(owner) = &*p.object else {
                    return;
                };
                let Some(id) = self.table.resolve(&owner.ty).class_id() else {
                    return;
                };
                let class = &self.table[id];
                if !class.is_enum() {
                    return;
                }
                if !class.enum_constants().any(|f| f.name == p.property) {
                    self.errors.add(SemanticError::InvalidEnumConstant {
                        enum_name: class.name.clone(),
                        constant: p.property.clone(),
                        span: p.span,
                    });
                }
            }
            _ => {}
        }
    }

    fn visit_value(&mut self, site: &AttributeSite<'_>, value: &mut Expression, attr_type: &TypeRef) {
        match attr_type {
            TypeRef::Array(component) => self.visit_list(site, value, component),
            TypeRef::Class { id, .. } => {
                let id = *id;
                let table = self.table;
                let wk = table.well_known();
                if self.table.is_primitive_wrapper_or_string(id) {
                    self.visit_constant(site, value, id);
                } else if id == wk.class {
                    if !matches!(value, Expression::Class(_) | Expression::Closure(_)) {
                        self.errors.add(SemanticError::ClassOrClosureExpected {
                            annotation: site.annotation.to_string(),
                            attribute: site.attribute.to_string(),
                            span: value.span(),
                        });
                    }
                } else if self.table.is_enum(id) || self.table.is_derived_from(id, wk.enum_base) {
                    self.visit_enum(site, value, id);
                } else if self.table.is_annotation(id) {
                    self.visit_annotation(site, value, id);
                } else {
                    self.unexpected_type(site, value, attr_type);
                }
            }
            TypeRef::Unresolved(_) => self.unexpected_type(site, value, attr_type),
        }
    }

    fn visit_list(&mut self, site: &AttributeSite<'_>, value: &mut Expression, component: &TypeRef) {
        if let Expression::Closure(closure) = value {
            self.errors.add(SemanticError::ClosureNotAllowedInList {
                attribute: site.attribute.to_string(),
                span: closure.span,
            });
            return;
        }
        if !matches!(value, Expression::List(_)) {
            let span = value.span();
            let single = std::mem::replace(value, Expression::List(ListExpr { elements: Vec::new(), span }));
            if let Expression::List(list) = value {
                list.elements.push(single);
            }
        }
        if let Expression::List(list) = value {
            for element in &mut list.elements {
                self.visit_value(site, element, component);
            }
        }
    }

    fn visit_constant(&mut self, site: &AttributeSite<'_>, value: &Expression, attr_type: ClassId) {
        let expected = self.table.wrapper_of(attr_type);
        let kind = match value {
            Expression::Constant(c) => {
                let found = self.table.constant_type(&c.value);
                if !found.is_some_and(|found| self.table.is_derived_from(found, expected)) {
                    self.errors.add(SemanticError::AttributeTypeMismatch {
                        annotation: site.annotation.to_string(),
                        attribute: site.attribute.to_string(),
                        expected: self.table[expected].name.clone(),
                        found: found.map_or_else(|| "null".to_string(), |id| self.table[id].name.clone()),
                        span: c.span,
                    });
                }
                return;
            }
            Expression::Property(_) => NonConstantKind::Property(value.to_string()),
            Expression::Field(f) => NonConstantKind::Field(f.name.clone()),
            _ => NonConstantKind::Other,
        };
        self.errors.add(SemanticError::NotInlineConstant {
            annotation: site.annotation.to_string(),
            attribute: site.attribute.to_string(),
            expected: self.table[attr_type].name.clone(),
            kind,
            span: value.span(),
        });
    }

    fn visit_enum(&mut self, site: &AttributeSite<'_>, value: &Expression, enum_type: ClassId) {
        let owner = match value {
            Expression::Property(p) => match &*p.object {
                Expression::Class(c) => self.table.resolve(&c.ty).class_id(),
                _ => None,
            },
            Expression::Field(f) => Some(f.owner),
            _ => None,
        };
        let Some(owner) = owner else {
            self.errors.add(SemanticError::EnumExpected {
                annotation: site.annotation.to_string(),
                attribute: site.attribute.to_string(),
                expected: self.table[enum_type].name.clone(),
                span: value.span(),
            });
            return;
        };
        if !self.table.is_derived_from(owner, enum_type) {
            self.errors.add(SemanticError::EnumTypeMismatch {
                annotation: site.annotation.to_string(),
                attribute: site.attribute.to_string(),
                expected: self.table[enum_type].name.clone(),
                found: self.table[owner].name.clone(),
                span: value.span(),
            });
        }
    }

    fn visit_annotation(&mut self, site: &AttributeSite<'_>, value: &mut Expression, annotation_type: ClassId) {
        if let Expression::AnnotationConstant(nested) = value {
            let nested_type = self.table.resolve(&nested.annotation.class).class_id();
            if nested_type == Some(annotation_type) {
                let mut validator = AnnotationValidator::new(self.table, self.errors, self.options);
                validator.validate(&mut nested.annotation);
                return;
            }
        }
        self.errors.add(SemanticError::AnnotationExpected {
            annotation: site.annotation.to_string(),
            attribute: site.attribute.to_string(),
            expected: self.table[annotation_type].name.clone(),
            span: value.span(),
        });
    }

    fn unexpected_type(&mut self, site: &AttributeSite<'_>, value: &Expression, attr_type: &TypeRef) {
        self.errors.add(SemanticError::UnexpectedAttributeType {
            annotation: site.annotation.to_string(),
            attribute: site.attribute.to_string(),
            ty: attr_type.to_string(),
            span: value.span(),
        });
    }

    // ========================================================================
    // Circular references
    // ========================================================================

    /// Report attribute defaults under `start` that cycle back to `search`.
    ///
    /// `attr_type` is the declared type of the attribute whose value `start`
    /// is; non-annotation types are ignored.
    pub fn check_circular_reference(&mut self, search: ClassId, attr_type: &TypeRef, start: &Expression) {
        let mut path = FxHashSet::default();
        self.circular_from(search, attr_type, start, &mut path);
    }

    fn circular_from(
        &mut self,
        search: ClassId,
        attr_type: &TypeRef,
        start: &Expression,
        path: &mut FxHashSet<ClassId>,
    ) {
        let attr_type = self.table.resolve(attr_type);
        let Some(attr_id) = attr_type.class_id().filter(|id| self.table.is_annotation(*id)) else {
            return;
        };
        let Expression::AnnotationConstant(constant) = start else {
            self.errors.add(SemanticError::NotAnnotationConstant {
                found: start.to_string(),
                span: start.span(),
            });
            return;
        };
        let Some(current) = self.table.resolve(&constant.annotation.class).class_id() else {
            return;
        };
        if current == search {
            self.errors.add(SemanticError::CircularReference {
                annotation: self.table[search].name.clone(),
                span: start.span(),
            });
            return;
        }
        if current != attr_id || !path.insert(current) {
            return;
        }

        let table = self.table;
        for method in &table[current].methods {
            let returns = table.resolve(&method.return_type);
            if returns.class_id() == Some(search) {
                self.errors.add(SemanticError::CircularReference {
                    annotation: table[current].name.clone(),
                    span: start.span(),
                });
                continue;
            }
            if let Some(default) = &method.annotation_default {
                self.circular_from(search, &returns, default, path);
            }
        }
        path.remove(&current);
    }

    /// Check every annotation-typed attribute default of an annotation type
    pub fn check_annotation_definition(&mut self, class: ClassId) {
        if !self.table.is_annotation(class) {
            return;
        }
        let table = self.table;
        for method in &table[class].methods {
            if let Some(default) = &method.annotation_default {
                self.check_attribute_default(class, method, default);
            }
        }
    }

    fn check_attribute_default(&mut self, class: ClassId, method: &MethodNode, default: &Expression) {
        let returns = self.table.resolve(&method.return_type);
        if returns.class_id().is_some_and(|id| self.table.is_annotation(id)) {
            self.check_circular_reference(class, &returns, default);
        }
    }
}

/// Where a value being visited sits, for error messages
struct AttributeSite<'s> {
    annotation: &'s str,
    attribute: &'s str,
}
