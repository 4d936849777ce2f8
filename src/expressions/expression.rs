use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, OnceLock};

use nonempty::NonEmpty;
use num_bigint::BigInt;

use super::{merge_free_identifiers, BoundIdentDecl, Predicate};
use crate::location::SourceLocation;
use crate::operators::{AssociativeOp, AtomicOp, BinaryOp, QuantifiedForm, QuantifierOp, Tag, UnaryOp};
use crate::types::{Extension, FactoryId, Type};

#[derive(Clone)]
pub enum ExpressionKind {
    FreeIdentifier(String),
    /// De Bruijn index counted from the innermost enclosing declaration.
    BoundIdentifier(usize),
    IntegerLiteral(BigInt),
    Atomic(AtomicOp),
    SetExtension(Vec<Expression>),
    Unary(UnaryOp, Expression),
    Binary(BinaryOp, Expression, Expression),
    Associative(AssociativeOp, Vec<Expression>),
    Bool(Predicate),
    Quantified {
        op: QuantifierOp,
        form: QuantifiedForm,
        decls: NonEmpty<BoundIdentDecl>,
        predicate: Predicate,
        expression: Expression,
    },
    Extended(Extension, Vec<Expression>),
}

impl PartialEq for ExpressionKind {
    fn eq(&self, other: &Self) -> bool {
        use ExpressionKind::*;

        match (self, other) {
            (FreeIdentifier(l), FreeIdentifier(r)) => l == r,
            (BoundIdentifier(l), BoundIdentifier(r)) => l == r,
            (IntegerLiteral(l), IntegerLiteral(r)) => l == r,
            (Atomic(l), Atomic(r)) => l == r,
            (SetExtension(l), SetExtension(r)) => l == r,
            (Unary(lop, l), Unary(rop, r)) => lop == rop && l == r,
            (Binary(lop, l1, l2), Binary(rop, r1, r2)) => lop == rop && l1 == r1 && l2 == r2,
            (Associative(lop, l), Associative(rop, r)) => lop == rop && l == r,
            (Bool(l), Bool(r)) => l == r,
            (
                Quantified {
                    op: lop,
                    decls: ldecls,
                    predicate: lpred,
                    expression: lexpr,
                    ..
                },
                Quantified {
                    op: rop,
                    decls: rdecls,
                    predicate: rpred,
                    expression: rexpr,
                    ..
                },
            ) => lop == rop && ldecls == rdecls && lpred == rpred && lexpr == rexpr,
            (Extended(lext, l), Extended(rext, r)) => lext == rext && l == r,
            _ => false,
        }
    }
}

pub(crate) struct ExpressionNode {
    pub(crate) kind: ExpressionKind,
    pub(crate) ty: Option<Type>,
    pub(crate) location: Option<SourceLocation>,
    pub(crate) type_checked: bool,
    pub(crate) factory: FactoryId,
    free_identifiers: OnceLock<Arc<[Expression]>>,
}

#[derive(Clone)]
pub struct Expression(pub(crate) Arc<ExpressionNode>);

impl Expression {
    pub(crate) fn from_parts(
        kind: ExpressionKind,
        ty: Option<Type>,
        location: Option<SourceLocation>,
        type_checked: bool,
        factory: FactoryId,
    ) -> Self {
        Expression(Arc::new(ExpressionNode {
            kind,
            ty,
            location,
            type_checked,
            factory,
            free_identifiers: OnceLock::new(),
        }))
    }

    pub fn kind(&self) -> &ExpressionKind {
        &self.0.kind
    }

    /// Type of the expression, present once it is known.
    pub fn ty(&self) -> Option<&Type> {
        self.0.ty.as_ref()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.0.location.as_ref()
    }

    /// Whether this expression and all its sub-formulas carry their final type.
    pub fn is_type_checked(&self) -> bool {
        self.0.type_checked
    }

    pub(crate) fn factory_id(&self) -> FactoryId {
        self.0.factory
    }

    pub fn tag(&self) -> Tag {
        match self.kind() {
            ExpressionKind::FreeIdentifier(_) => Tag::FreeIdentifier,
            ExpressionKind::BoundIdentifier(_) => Tag::BoundIdentifier,
            ExpressionKind::IntegerLiteral(_) => Tag::IntegerLiteral,
            ExpressionKind::Atomic(op) => Tag::Atomic(*op),
            ExpressionKind::SetExtension(_) => Tag::SetExtension,
            ExpressionKind::Unary(op, _) => Tag::Unary(*op),
            ExpressionKind::Binary(op, _, _) => Tag::Binary(*op),
            ExpressionKind::Associative(op, _) => Tag::Associative(*op),
            ExpressionKind::Bool(_) => Tag::Bool,
            ExpressionKind::Quantified { op, .. } => Tag::QuantifiedExpression(*op),
            ExpressionKind::Extended(_, _) => Tag::Extended,
        }
    }

    /// Name of a free identifier.
    pub fn identifier_name(&self) -> Option<&str> {
        match self.kind() {
            ExpressionKind::FreeIdentifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn bound_index(&self) -> Option<usize> {
        match self.kind() {
            ExpressionKind::BoundIdentifier(index) => Some(*index),
            _ => None,
        }
    }

    pub fn integer_value(&self) -> Option<&BigInt> {
        match self.kind() {
            ExpressionKind::IntegerLiteral(value) => Some(value),
            _ => None,
        }
    }

    /// Free identifiers of the expression, sorted by name.
    pub fn free_identifiers(&self) -> &[Expression] {
        if let ExpressionKind::FreeIdentifier(_) = self.kind() {
            return std::slice::from_ref(self);
        }

        self.0.free_identifiers.get_or_init(|| match self.kind() {
            ExpressionKind::FreeIdentifier(_)
            | ExpressionKind::BoundIdentifier(_) | ExpressionKind::IntegerLiteral(_) | ExpressionKind::Atomic(_) => {
                Arc::from(Vec::new())
            }
            ExpressionKind::SetExtension(members)
            | ExpressionKind::Associative(_, members)
            | ExpressionKind::Extended(_, members) => merge_free_identifiers(members.iter().map(Expression::free_identifiers)),
            ExpressionKind::Unary(_, child) => Arc::from(child.free_identifiers().to_vec()),
            ExpressionKind::Binary(_, left, right) => {
                merge_free_identifiers([left.free_identifiers(), right.free_identifiers()])
            }
            ExpressionKind::Bool(predicate) => Arc::from(predicate.free_identifiers().to_vec()),
            ExpressionKind::Quantified {
                predicate, expression, ..
            } => merge_free_identifiers([predicate.free_identifiers(), expression.free_identifiers()]),
        })
    }

    pub fn contains_free_identifier(&self, name: &str) -> bool {
        self.free_identifiers()
            .binary_search_by(|ident| ident.identifier_name().unwrap_or_default().cmp(name))
            .is_ok()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.ty == other.0.ty && self.0.kind == other.0.kind)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        crate::printer::write_expression(f, self, false)
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expression({})", self)
    }
}
