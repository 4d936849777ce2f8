use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, OnceLock};

use nonempty::NonEmpty;

use super::{merge_free_identifiers, BoundIdentDecl, Expression};
use crate::location::SourceLocation;
use crate::operators::{AssociativePredicateOp, BinaryPredicateOp, LiteralOp, QuantifiedPredicateOp, RelationalOp, Tag};
use crate::types::FactoryId;

#[derive(Clone, PartialEq)]
pub enum PredicateKind {
    Literal(LiteralOp),
    Not(Predicate),
    Binary(BinaryPredicateOp, Predicate, Predicate),
    Associative(AssociativePredicateOp, Vec<Predicate>),
    Relational(RelationalOp, Expression, Expression),
    Quantified(QuantifiedPredicateOp, NonEmpty<BoundIdentDecl>, Predicate),
    Finite(Expression),
    Partition(Vec<Expression>),
    /// Placeholder `$P` standing for an arbitrary predicate.
    Variable(String),
}

pub(crate) struct PredicateNode {
    pub(crate) kind: PredicateKind,
    pub(crate) location: Option<SourceLocation>,
    pub(crate) type_checked: bool,
    pub(crate) factory: FactoryId,
    free_identifiers: OnceLock<Arc<[Expression]>>,
}

#[derive(Clone)]
pub struct Predicate(pub(crate) Arc<PredicateNode>);

impl Predicate {
    pub(crate) fn from_parts(
        kind: PredicateKind,
        location: Option<SourceLocation>,
        type_checked: bool,
        factory: FactoryId,
    ) -> Self {
        Predicate(Arc::new(PredicateNode {
            kind,
            location,
            type_checked,
            factory,
            free_identifiers: OnceLock::new(),
        }))
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.0.kind
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.0.location.as_ref()
    }

    pub fn is_type_checked(&self) -> bool {
        self.0.type_checked
    }

    pub(crate) fn factory_id(&self) -> FactoryId {
        self.0.factory
    }

    pub fn tag(&self) -> Tag {
        match self.kind() {
            PredicateKind::Literal(op) => Tag::Literal(*op),
            PredicateKind::Not(_) => Tag::Not,
            PredicateKind::Binary(op, _, _) => Tag::BinaryPredicate(*op),
            PredicateKind::Associative(op, _) => Tag::AssociativePredicate(*op),
            PredicateKind::Relational(op, _, _) => Tag::Relational(*op),
            PredicateKind::Quantified(op, _, _) => Tag::QuantifiedPredicate(*op),
            PredicateKind::Finite(_) => Tag::Finite,
            PredicateKind::Partition(_) => Tag::Partition,
            PredicateKind::Variable(_) => Tag::PredicateVariable,
        }
    }

    pub fn is_literal(&self, op: LiteralOp) -> bool {
        matches!(self.kind(), PredicateKind::Literal(literal) if *literal == op)
    }

    /// Free identifiers of the predicate, sorted by name.
    pub fn free_identifiers(&self) -> &[Expression] {
        self.0.free_identifiers.get_or_init(|| match self.kind() {
            PredicateKind::Literal(_) | PredicateKind::Variable(_) => Arc::from(Vec::new()),
            PredicateKind::Not(child) | PredicateKind::Quantified(_, _, child) => {
                Arc::from(child.free_identifiers().to_vec())
            }
            PredicateKind::Binary(_, left, right) => {
                merge_free_identifiers([left.free_identifiers(), right.free_identifiers()])
            }
            PredicateKind::Associative(_, children) => {
                merge_free_identifiers(children.iter().map(Predicate::free_identifiers))
            }
            PredicateKind::Relational(_, left, right) => {
                merge_free_identifiers([left.free_identifiers(), right.free_identifiers()])
            }
            PredicateKind::Finite(child) => Arc::from(child.free_identifiers().to_vec()),
            PredicateKind::Partition(children) => {
                merge_free_identifiers(children.iter().map(Expression::free_identifiers))
            }
        })
    }

    pub fn contains_free_identifier(&self, name: &str) -> bool {
        self.free_identifiers()
            .binary_search_by(|ident| ident.identifier_name().unwrap_or_default().cmp(name))
            .is_ok()
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.kind == other.0.kind
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        crate::printer::write_predicate(f, self, false)
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self)
    }
}
