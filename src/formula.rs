//! Uniform view over every kind of formula node.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::error::FormulaError;
use crate::expressions::{
    Assignment, AssignmentKind, BoundIdentDecl, Expression, ExpressionKind, Predicate, PredicateKind,
};
use crate::factory::FormulaFactory;
use crate::location::SourceLocation;
use crate::operators::Tag;
use crate::types::{FactoryId, Type};

/// Any node of a formula tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    Expression(Expression),
    Predicate(Predicate),
    Assignment(Assignment),
    BoundIdentDecl(BoundIdentDecl),
}

impl Formula {
    pub fn tag(&self) -> Tag {
        match self {
            Formula::Expression(expr) => expr.tag(),
            Formula::Predicate(pred) => pred.tag(),
            Formula::Assignment(assignment) => assignment.tag(),
            Formula::BoundIdentDecl(_) => Tag::BoundIdentDecl,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Formula::Expression(expr) => expr.location(),
            Formula::Predicate(pred) => pred.location(),
            Formula::Assignment(assignment) => assignment.location(),
            Formula::BoundIdentDecl(decl) => decl.location(),
        }
    }

    pub fn is_type_checked(&self) -> bool {
        match self {
            Formula::Expression(expr) => expr.is_type_checked(),
            Formula::Predicate(pred) => pred.is_type_checked(),
            Formula::Assignment(assignment) => assignment.is_type_checked(),
            Formula::BoundIdentDecl(decl) => decl.is_type_checked(),
        }
    }

    /// Type of an expression or of a bound identifier declaration.
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Formula::Expression(expr) => expr.ty(),
            Formula::BoundIdentDecl(decl) => decl.ty(),
            Formula::Predicate(_) | Formula::Assignment(_) => None,
        }
    }

    pub(crate) fn factory_id(&self) -> FactoryId {
        match self {
            Formula::Expression(expr) => expr.factory_id(),
            Formula::Predicate(pred) => pred.factory_id(),
            Formula::Assignment(assignment) => assignment.factory_id(),
            Formula::BoundIdentDecl(decl) => decl.factory_id(),
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Formula::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_predicate(&self) -> Option<&Predicate> {
        match self {
            Formula::Predicate(pred) => Some(pred),
            _ => None,
        }
    }

    pub fn as_assignment(&self) -> Option<&Assignment> {
        match self {
            Formula::Assignment(assignment) => Some(assignment),
            _ => None,
        }
    }

    pub fn as_bound_ident_decl(&self) -> Option<&BoundIdentDecl> {
        match self {
            Formula::BoundIdentDecl(decl) => Some(decl),
            _ => None,
        }
    }

    /// Whether both values are the very same node.
    pub(crate) fn is_same_node(&self, other: &Formula) -> bool {
        match (self, other) {
            (Formula::Expression(l), Formula::Expression(r)) => Arc::ptr_eq(&l.0, &r.0),
            (Formula::Predicate(l), Formula::Predicate(r)) => Arc::ptr_eq(&l.0, &r.0),
            (Formula::Assignment(l), Formula::Assignment(r)) => Arc::ptr_eq(&l.0, &r.0),
            (Formula::BoundIdentDecl(l), Formula::BoundIdentDecl(r)) => {
                l.name() == r.name() && l.ty() == r.ty() && l.factory_id() == r.factory_id()
            }
            _ => false,
        }
    }

    /// Direct children, declarations of a binder first.
    pub fn children(&self) -> Vec<Formula> {
        match self {
            Formula::Expression(expr) => match expr.kind() {
                ExpressionKind::FreeIdentifier(_)
                | ExpressionKind::BoundIdentifier(_)
                | ExpressionKind::IntegerLiteral(_)
                | ExpressionKind::Atomic(_) => Vec::new(),
                ExpressionKind::SetExtension(members)
                | ExpressionKind::Associative(_, members)
                | ExpressionKind::Extended(_, members) => members.iter().cloned().map(Formula::from).collect(),
                ExpressionKind::Unary(_, child) => vec![child.clone().into()],
                ExpressionKind::Binary(_, left, right) => vec![left.clone().into(), right.clone().into()],
                ExpressionKind::Bool(pred) => vec![pred.clone().into()],
                ExpressionKind::Quantified {
                    decls,
                    predicate,
                    expression,
                    ..
                } => decls
                    .iter()
                    .cloned()
                    .map(Formula::from)
                    .chain([Formula::from(predicate.clone()), Formula::from(expression.clone())])
                    .collect(),
            },
            Formula::Predicate(pred) => match pred.kind() {
                PredicateKind::Literal(_) | PredicateKind::Variable(_) => Vec::new(),
                PredicateKind::Not(child) => vec![child.clone().into()],
                PredicateKind::Binary(_, left, right) => vec![left.clone().into(), right.clone().into()],
                PredicateKind::Associative(_, children) => children.iter().cloned().map(Formula::from).collect(),
                PredicateKind::Relational(_, left, right) => vec![left.clone().into(), right.clone().into()],
                PredicateKind::Quantified(_, decls, body) => decls
                    .iter()
                    .cloned()
                    .map(Formula::from)
                    .chain([Formula::from(body.clone())])
                    .collect(),
                PredicateKind::Finite(child) => vec![child.clone().into()],
                PredicateKind::Partition(children) => children.iter().cloned().map(Formula::from).collect(),
            },
            Formula::Assignment(assignment) => match assignment.kind() {
                AssignmentKind::BecomesEqualTo { identifiers, values } => identifiers
                    .iter()
                    .chain(values.iter())
                    .cloned()
                    .map(Formula::from)
                    .collect(),
                AssignmentKind::BecomesMemberOf { identifier, set } => {
                    vec![identifier.clone().into(), set.clone().into()]
                }
                AssignmentKind::BecomesSuchThat {
                    identifiers,
                    primed,
                    condition,
                } => identifiers
                    .iter()
                    .cloned()
                    .map(Formula::from)
                    .chain(primed.iter().cloned().map(Formula::from))
                    .chain([Formula::from(condition.clone())])
                    .collect(),
            },
            Formula::BoundIdentDecl(_) => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Number of bound identifiers declared by this node over its child at `index`.
    pub(crate) fn bound_by_child(&self, index: usize) -> usize {
        match self {
            Formula::Expression(expr) => match expr.kind() {
                ExpressionKind::Quantified { decls, .. } if index >= decls.len() => decls.len(),
                _ => 0,
            },
            Formula::Predicate(pred) => match pred.kind() {
                PredicateKind::Quantified(_, decls, _) if index >= decls.len() => decls.len(),
                _ => 0,
            },
            Formula::Assignment(assignment) => match assignment.kind() {
                AssignmentKind::BecomesSuchThat {
                    identifiers, primed, ..
                } if index >= identifiers.len() + primed.len() => primed.len(),
                _ => 0,
            },
            Formula::BoundIdentDecl(_) => 0,
        }
    }

    /// Rebuild this node with other children, keeping its operator and location.
    ///
    /// Every child must be of the category expected at its slot.
    pub fn with_children(&self, children: Vec<Formula>, factory: &FormulaFactory) -> Result<Formula, FormulaError> {
        let expected = self.child_count();
        if children.len() != expected {
            return Err(FormulaError::InvalidArity {
                operator: "rebuilt node",
                expected: "the original number of children",
                actual: children.len(),
            });
        }

        let location = self.location().cloned();
        let mut slots = Slots {
            children: children.into_iter(),
            operator: self.tag(),
        };

        let rebuilt = match self {
            Formula::Expression(expr) => Formula::Expression(match expr.kind() {
                ExpressionKind::FreeIdentifier(name) => {
                    factory.make_free_identifier(name, location, expr.ty().cloned())?
                }
                ExpressionKind::BoundIdentifier(index) => {
                    factory.make_bound_identifier(*index, location, expr.ty().cloned())?
                }
                ExpressionKind::IntegerLiteral(value) => factory.make_integer_literal(value.clone(), location),
                ExpressionKind::Atomic(op) => {
                    let ty = op.is_generic().then(|| expr.ty().cloned()).flatten();
                    factory.make_atomic_expression(*op, location, ty)?
                }
                ExpressionKind::SetExtension(members) => {
                    let members = slots.expressions(members.len())?;
                    let ty = members.is_empty().then(|| expr.ty().cloned()).flatten();
                    factory.make_set_extension(members, location, ty)?
                }
                ExpressionKind::Unary(op, _) => factory.make_unary_expression(*op, slots.expression()?, location)?,
                ExpressionKind::Binary(op, _, _) => {
                    let left = slots.expression()?;
                    factory.make_binary_expression(*op, left, slots.expression()?, location)?
                }
                ExpressionKind::Associative(op, members) => {
                    factory.make_associative_expression(*op, slots.expressions(members.len())?, location)?
                }
                ExpressionKind::Bool(_) => factory.make_bool_expression(slots.predicate()?, location)?,
                ExpressionKind::Quantified { op, form, decls, .. } => {
                    let decls = slots.decls(decls.len())?;
                    let predicate = slots.predicate()?;
                    let expression = slots.expression()?;
                    factory.make_quantified_expression(*op, decls, predicate, expression, *form, location)?
                }
                ExpressionKind::Extended(extension, args) => {
                    factory.make_extended_expression(extension, slots.expressions(args.len())?, location)?
                }
            }),
            Formula::Predicate(pred) => Formula::Predicate(match pred.kind() {
                PredicateKind::Literal(op) => factory.make_literal_predicate(*op, location),
                PredicateKind::Variable(name) => factory.make_predicate_variable(name, location)?,
                PredicateKind::Not(_) => factory.make_not(slots.predicate()?, location)?,
                PredicateKind::Binary(op, _, _) => {
                    let left = slots.predicate()?;
                    factory.make_binary_predicate(*op, left, slots.predicate()?, location)?
                }
                PredicateKind::Associative(op, children) => {
                    factory.make_associative_predicate(*op, slots.predicates(children.len())?, location)?
                }
                PredicateKind::Relational(op, _, _) => {
                    let left = slots.expression()?;
                    factory.make_relational_predicate(*op, left, slots.expression()?, location)?
                }
                PredicateKind::Quantified(op, decls, _) => {
                    let decls = slots.decls(decls.len())?;
                    factory.make_quantified_predicate(*op, decls, slots.predicate()?, location)?
                }
                PredicateKind::Finite(_) => factory.make_finite(slots.expression()?, location)?,
                PredicateKind::Partition(children) => {
                    factory.make_partition(slots.expressions(children.len())?, location)?
                }
            }),
            Formula::Assignment(assignment) => Formula::Assignment(match assignment.kind() {
                AssignmentKind::BecomesEqualTo { identifiers, values } => {
                    let identifiers = slots.expressions(identifiers.len())?;
                    let values = slots.expressions(values.len())?;
                    factory.make_becomes_equal_to(identifiers, values, location)?
                }
                AssignmentKind::BecomesMemberOf { .. } => {
                    let identifier = slots.expression()?;
                    factory.make_becomes_member_of(identifier, slots.expression()?, location)?
                }
                AssignmentKind::BecomesSuchThat {
                    identifiers, primed, ..
                } => {
                    let identifiers = slots.expressions(identifiers.len())?;
                    let primed = slots.decls(primed.len())?;
                    factory.make_becomes_such_that(identifiers, primed, slots.predicate()?, location)?
                }
            }),
            Formula::BoundIdentDecl(decl) => {
                Formula::BoundIdentDecl(factory.make_bound_ident_decl(decl.name(), location, decl.ty().cloned())?)
            }
        };

        Ok(rebuilt)
    }

    /// Free identifiers, sorted by name.
    pub fn free_identifiers(&self) -> Vec<Expression> {
        match self {
            Formula::Expression(expr) => expr.free_identifiers().to_vec(),
            Formula::Predicate(pred) => pred.free_identifiers().to_vec(),
            Formula::Assignment(assignment) => assignment.free_identifiers(),
            Formula::BoundIdentDecl(_) => Vec::new(),
        }
    }

    /// Loose bound identifier indices, relative to this node, sorted and without duplicates.
    pub fn bound_identifiers(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        collect_loose_indices(self, 0, &mut indices);
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Whether every bound identifier refers to an enclosing declaration.
    pub fn is_well_formed(&self) -> bool {
        self.bound_identifiers().is_empty()
    }

    /// Text of the formula where every bound declaration and generic atom carries its type.
    pub fn to_string_with_types(&self) -> String {
        crate::printer::to_string_with_types(self)
    }
}

fn collect_loose_indices(formula: &Formula, depth: usize, indices: &mut Vec<usize>) {
    if let Formula::Expression(expr) = formula {
        if let ExpressionKind::BoundIdentifier(index) = expr.kind() {
            if *index >= depth {
                indices.push(index - depth);
            }
            return;
        }
    }

    for (position, child) in formula.children().iter().enumerate() {
        collect_loose_indices(child, depth + formula.bound_by_child(position), indices);
    }
}

struct Slots {
    children: std::vec::IntoIter<Formula>,
    operator: Tag,
}

impl Slots {
    fn next(&mut self) -> Result<Formula, FormulaError> {
        self.children.next().ok_or(FormulaError::InvalidArity {
            operator: "rebuilt node",
            expected: "the original number of children",
            actual: 0,
        })
    }

    fn mismatch(&self, found: &Formula) -> FormulaError {
        FormulaError::illegal_argument(format!("{} cannot be a child of {} here", found.tag(), self.operator))
    }

    fn expression(&mut self) -> Result<Expression, FormulaError> {
        match self.next()? {
            Formula::Expression(expr) => Ok(expr),
            other => Err(self.mismatch(&other)),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, FormulaError> {
        match self.next()? {
            Formula::Predicate(pred) => Ok(pred),
            other => Err(self.mismatch(&other)),
        }
    }

    fn decl(&mut self) -> Result<BoundIdentDecl, FormulaError> {
        match self.next()? {
            Formula::BoundIdentDecl(decl) => Ok(decl),
            other => Err(self.mismatch(&other)),
        }
    }

    fn expressions(&mut self, count: usize) -> Result<Vec<Expression>, FormulaError> {
        (0..count).map(|_| self.expression()).collect()
    }

    fn predicates(&mut self, count: usize) -> Result<Vec<Predicate>, FormulaError> {
        (0..count).map(|_| self.predicate()).collect()
    }

    fn decls(&mut self, count: usize) -> Result<Vec<BoundIdentDecl>, FormulaError> {
        (0..count).map(|_| self.decl()).collect()
    }
}

/// Structural rewriting of a formula tree.
///
/// `rewrite` is offered every node in pre-order along with the number of enclosing binders. When
/// it returns a replacement the node's children are not visited. Nodes whose children are all
/// left untouched are shared with the original tree.
pub(crate) trait Rewriter {
    type Error: From<FormulaError>;

    fn factory(&self) -> &FormulaFactory;

    fn rewrite(&mut self, formula: &Formula, depth: usize) -> Result<Option<Formula>, Self::Error>;
}

pub(crate) fn rewrite<R: Rewriter>(formula: &Formula, depth: usize, rewriter: &mut R) -> Result<Formula, R::Error> {
    if let Some(replacement) = rewriter.rewrite(formula, depth)? {
        return Ok(replacement);
    }

    let children = formula.children();
    let mut rewritten = Vec::with_capacity(children.len());
    let mut changed = false;

    for (index, child) in children.iter().enumerate() {
        let new_child = rewrite(child, depth + formula.bound_by_child(index), rewriter)?;
        changed |= !new_child.is_same_node(child);
        rewritten.push(new_child);
    }

    if !changed && formula.factory_id() == rewriter.factory().id() {
        return Ok(formula.clone());
    }

    Ok(formula.with_children(rewritten, rewriter.factory())?)
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::Expression(expr) => Display::fmt(expr, f),
            Formula::Predicate(pred) => Display::fmt(pred, f),
            Formula::Assignment(assignment) => Display::fmt(assignment, f),
            Formula::BoundIdentDecl(decl) => f.write_str(decl.name()),
        }
    }
}

impl From<Expression> for Formula {
    fn from(expr: Expression) -> Self {
        Formula::Expression(expr)
    }
}

impl From<Predicate> for Formula {
    fn from(pred: Predicate) -> Self {
        Formula::Predicate(pred)
    }
}

impl From<Assignment> for Formula {
    fn from(assignment: Assignment) -> Self {
        Formula::Assignment(assignment)
    }
}

impl From<BoundIdentDecl> for Formula {
    fn from(decl: BoundIdentDecl) -> Self {
        Formula::BoundIdentDecl(decl)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::Formula;
    use crate::factory::FormulaFactory;
    use crate::operators::{QuantifiedPredicateOp, RelationalOp, Tag};

    #[test]
    fn children_of_quantified_predicate() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_bound_ident_decl("x", None, None)?;
        let y = ff.make_bound_ident_decl("y", None, None)?;
        let body = ff.make_relational_predicate(
            RelationalOp::Equal,
            ff.make_bound_identifier(1, None, None)?,
            ff.make_bound_identifier(0, None, None)?,
            None,
        )?;
        let pred = ff.make_quantified_predicate(QuantifiedPredicateOp::ForAll, vec![x, y], body, None)?;
        let formula = Formula::from(pred);

        let tags: Vec<Tag> = formula.children().iter().map(Formula::tag).collect();
        assert_eq!(tags, vec![Tag::BoundIdentDecl, Tag::BoundIdentDecl, Tag::Relational(RelationalOp::Equal)]);
        assert!(formula.is_well_formed());
        assert_eq!(formula.bound_by_child(2), 2);

        let dangling = Formula::from(ff.make_bound_identifier(0, None, None)?);
        assert!(!dangling.is_well_formed());

        Ok(())
    }

    #[test]
    fn with_children_checks_categories() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, None)?;
        let eq = Formula::from(ff.make_relational_predicate(RelationalOp::Equal, x.clone(), x.clone(), None)?);
        let truth = ff.make_literal_predicate(crate::operators::LiteralOp::True, None);

        assert!(eq.with_children(vec![x.clone().into(), truth.into()], &ff).is_err());
        assert_eq!(eq.with_children(vec![x.clone().into(), x.into()], &ff)?, eq);

        Ok(())
    }
}
