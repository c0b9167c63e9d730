//! Inline-constant folding for annotation attribute values
//!
//! References to `static final` fields whose initializer is (or folds to) a
//! literal are replaced by that literal. Enum-typed and unresolved owners are
//! never folded.

use rustc_hash::FxHashSet;

use crate::ast::{
    AccessedVariable, ClassId, ClassTable, ConstantExpr, Expression, ListExpr, TypeRef,
};

pub struct ConstantFolder<'a> {
    table: &'a ClassTable,
    /// Fields whose initializer is being folded; breaks `A = B, B = A` cycles
    in_progress: FxHashSet<(ClassId, String)>,
}

impl<'a> ConstantFolder<'a> {
    pub fn new(table: &'a ClassTable) -> Self {
        Self {
            table,
            in_progress: FxHashSet::default(),
        }
    }

    /// Fold `expr` in place. Returns whether anything changed.
    pub fn fold_in_place(&mut self, expr: &mut Expression) -> bool {
        match self.fold(expr) {
            Some(folded) => {
                *expr = folded;
                true
            }
            None => false,
        }
    }

    /// Folded replacement for `expr`, if any part of it folds
    pub fn fold(&mut self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::List(list) => {
                let mut changed = false;
                let elements = list
                    .elements
                    .iter()
                    .map(|e| match self.fold(e) {
                        Some(folded) => {
                            changed = true;
                            folded
                        }
                        None => e.clone(),
                    })
                    .collect();
                changed.then(|| {
                    Expression::List(ListExpr {
                        elements,
                        span: list.span,
                    })
                })
            }
            Expression::Property(p) => {
                let Expression::Class(owner) = &*p.object else {
                    return None;
                };
                let owner = self.foldable_owner(&owner.ty)?;
                self.fold_field(owner, &p.property, expr)
            }
            Expression::Field(f) => self.fold_field(f.owner, &f.name, expr),
            Expression::Variable(v) => match &v.accessed {
                Some(AccessedVariable::Field { owner, name }) => self.fold_field(*owner, name, expr),
                _ => None,
            },
            _ => None,
        }
    }

    fn foldable_owner(&self, ty: &TypeRef) -> Option<ClassId> {
        let id = self.table.resolve(ty).class_id()?;
        if self.table.is_enum(id) {
            return None;
        }
        Some(id)
    }

    fn fold_field(&mut self, owner: ClassId, name: &str, original: &Expression) -> Option<Expression> {
        if self.table.is_enum(owner) {
            return None;
        }
        let (declaring, field) = self.table.find_field(owner, name)?;
        if !(field.is_static() && field.is_final()) {
            return None;
        }
        let init = field.initializer.as_ref()?;

        let key = (declaring, name.to_string());
        if !self.in_progress.insert(key.clone()) {
            tracing::trace!(field = name, "cyclic constant initializer");
            return None;
        }
        let value = match init {
            Expression::Constant(c) => Some(c.value.clone()),
            other => self
                .fold(other)
                .and_then(|folded| folded.as_constant().cloned()),
        };
        self.in_progress.remove(&key);

        value.map(|value| {
            Expression::Constant(ConstantExpr {
                value,
                span: original.span(),
            })
        })
    }
}
