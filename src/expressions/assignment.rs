use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use nonempty::NonEmpty;

use super::{merge_free_identifiers, BoundIdentDecl, Expression, Predicate};
use crate::location::SourceLocation;
use crate::operators::Tag;
use crate::types::FactoryId;

#[derive(Clone, PartialEq)]
pub enum AssignmentKind {
    /// `x,y ≔ E,F`
    BecomesEqualTo {
        identifiers: NonEmpty<Expression>,
        values: NonEmpty<Expression>,
    },
    /// `x :∈ S`
    BecomesMemberOf { identifier: Expression, set: Expression },
    /// `x,y :∣ P`, where `P` is quantified over the primed identifiers `x'`, `y'`.
    BecomesSuchThat {
        identifiers: NonEmpty<Expression>,
        primed: NonEmpty<BoundIdentDecl>,
        condition: Predicate,
    },
}

pub(crate) struct AssignmentNode {
    pub(crate) kind: AssignmentKind,
    pub(crate) location: Option<SourceLocation>,
    pub(crate) type_checked: bool,
    pub(crate) factory: FactoryId,
}

#[derive(Clone)]
pub struct Assignment(pub(crate) Arc<AssignmentNode>);

impl Assignment {
    pub(crate) fn from_parts(
        kind: AssignmentKind,
        location: Option<SourceLocation>,
        type_checked: bool,
        factory: FactoryId,
    ) -> Self {
        Assignment(Arc::new(AssignmentNode {
            kind,
            location,
            type_checked,
            factory,
        }))
    }

    pub fn kind(&self) -> &AssignmentKind {
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
            AssignmentKind::BecomesEqualTo { .. } => Tag::BecomesEqualTo,
            AssignmentKind::BecomesMemberOf { .. } => Tag::BecomesMemberOf,
            AssignmentKind::BecomesSuchThat { .. } => Tag::BecomesSuchThat,
        }
    }

    /// Identifiers modified by the assignment, in source order.
    pub fn assigned_identifiers(&self) -> Vec<Expression> {
        match self.kind() {
            AssignmentKind::BecomesEqualTo { identifiers, .. } | AssignmentKind::BecomesSuchThat { identifiers, .. } => {
                identifiers.iter().cloned().collect()
            }
            AssignmentKind::BecomesMemberOf { identifier, .. } => vec![identifier.clone()],
        }
    }

    /// Free identifiers of the assignment, assigned ones included, sorted by name.
    pub fn free_identifiers(&self) -> Vec<Expression> {
        let merged = match self.kind() {
            AssignmentKind::BecomesEqualTo { identifiers, values } => merge_free_identifiers(
                identifiers
                    .iter()
                    .chain(values.iter())
                    .map(Expression::free_identifiers),
            ),
            AssignmentKind::BecomesMemberOf { identifier, set } => {
                merge_free_identifiers([identifier.free_identifiers(), set.free_identifiers()])
            }
            AssignmentKind::BecomesSuchThat {
                identifiers, condition, ..
            } => merge_free_identifiers(
                identifiers
                    .iter()
                    .map(Expression::free_identifiers)
                    .chain([condition.free_identifiers()]),
            ),
        };

        merged.to_vec()
    }
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.kind == other.0.kind
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        crate::printer::write_assignment(f, self, false)
    }
}

impl Debug for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Assignment({})", self)
    }
}
