//! Statement nodes

use super::expression::Expression;
use super::types::TypeRef;
use super::Span;

/// A sequence of statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            span: Span::synthetic(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn first(&self) -> Option<&Statement> {
        self.statements.first()
    }

    pub fn first_mut(&mut self) -> Option<&mut Statement> {
        self.statements.first_mut()
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression evaluated for its effect
    Expression(Expression),
    /// Local declaration: `int x = init`
    Declaration {
        name: String,
        ty: TypeRef,
        initializer: Option<Expression>,
        span: Span,
    },
    /// `return expr`
    Return { value: Option<Expression>, span: Span },
    /// `if (cond) { ... } else { ... }`
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    /// `throw expr`
    Throw { value: Expression, span: Span },
    /// Nested block
    Block(Block),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Expression(e) => e.span(),
            Statement::Declaration { span, .. }
            | Statement::Return { span, .. }
            | Statement::If { span, .. }
            | Statement::Throw { span, .. } => *span,
            Statement::Block(b) => b.span,
        }
    }

    /// The expression of an expression statement
    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Statement::Expression(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_expression_mut(&mut self) -> Option<&mut Expression> {
        match self {
            Statement::Expression(e) => Some(e),
            _ => None,
        }
    }
}
