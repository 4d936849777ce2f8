//! Inference of type terms for every node of a formula.
//!
//! Each node constrains the terms of its operands according to the signature of its operator.
//! Leaves whose type cannot be synthesized by the factory (bound identifiers, their
//! declarations, and generic atoms) get a slot, recorded in the pre-order in which
//! [`crate::formula::rewrite`] visits them.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::environment::TypeEnvironment;
use crate::error::{Problem, ProblemKind};
use crate::expressions::{Assignment, AssignmentKind, BoundIdentDecl, Expression, ExpressionKind, Predicate, PredicateKind};
use crate::location::SourceLocation;
use crate::operators::{AssociativeOp, AtomicOp, BinaryOp, QuantifierOp, RelationalOp, UnaryOp};
use crate::types::Type;

use super::unify::{TypeTerm, Unifier};

/// A leaf whose type is inferred.
pub(super) struct Slot {
    pub(super) term: TypeTerm,
    pub(super) location: Option<SourceLocation>,
    /// What to blame when the type stays unknown, `None` when another slot already does.
    pub(super) subject: Option<String>,
}

pub(super) struct FreeIdent {
    pub(super) term: TypeTerm,
    pub(super) location: Option<SourceLocation>,
}

pub(super) struct Inference<'a> {
    env: &'a TypeEnvironment,
    pub(super) unifier: Unifier,
    pub(super) idents: BTreeMap<String, FreeIdent>,
    pub(super) slots: Vec<Slot>,
    pub(super) problems: Vec<Problem>,
    bound: Vec<TypeTerm>,
}

impl<'a> Inference<'a> {
    pub(super) fn new(env: &'a TypeEnvironment) -> Self {
        Inference {
            env,
            unifier: Unifier::default(),
            idents: BTreeMap::new(),
            slots: Vec::new(),
            problems: Vec::new(),
            bound: Vec::new(),
        }
    }

    fn ident(&mut self, name: &str, location: Option<&SourceLocation>) -> TypeTerm {
        if let Some(ident) = self.idents.get(name) {
            return ident.term.clone();
        }

        let term = match self.env.get(name) {
            Some(ty) => TypeTerm::from_type(ty),
            None => self.unifier.fresh(),
        };
        self.idents.insert(
            name.to_string(),
            FreeIdent {
                term: term.clone(),
                location: location.cloned(),
            },
        );
        term
    }

    /// Term of a type written in the formula. Its given types become carrier sets.
    pub(super) fn annotation(&mut self, ty: &Type, location: Option<&SourceLocation>) -> TypeTerm {
        for given in ty.given_types() {
            let carrier = self.ident(&given, location);
            let expected = TypeTerm::pow(TypeTerm::Given(given.clone()));
            self.expect(&carrier, &expected, location, &given);
        }

        TypeTerm::from_type(ty)
    }

    pub(super) fn expect(
        &mut self,
        actual: &TypeTerm,
        expected: &TypeTerm,
        location: Option<&SourceLocation>,
        subject: &dyn Display,
    ) {
        if self.unifier.unify(actual, expected).is_err() {
            let message = format!(
                "{} has type {} but {} is expected",
                subject,
                self.unifier.zonk(actual),
                self.unifier.zonk(expected)
            );
            self.problems
                .push(Problem::new(ProblemKind::TypeError, location.cloned(), message));
        }
    }

    fn slot(&mut self, term: &TypeTerm, location: Option<&SourceLocation>, subject: Option<String>) {
        self.slots.push(Slot {
            term: term.clone(),
            location: location.cloned(),
            subject,
        });
    }

    pub(super) fn declare<'d, I>(&mut self, decls: I)
    where
        I: IntoIterator<Item = &'d BoundIdentDecl>,
    {
        for decl in decls {
            let term = match decl.ty() {
                Some(ty) => self.annotation(ty, decl.location()),
                None => self.unifier.fresh(),
            };
            self.slot(&term, decl.location(), Some(format!("bound identifier {}", decl.name())));
            self.bound.push(term);
        }
    }

    /// Element type of a set-valued operand.
    fn set_of(&mut self, expr: &Expression) -> TypeTerm {
        let element = self.unifier.fresh();
        let actual = self.expression(expr);
        self.expect(&actual, &TypeTerm::pow(element.clone()), expr.location(), expr);
        element
    }

    /// Source and target types of a relation-valued operand.
    fn relation_of(&mut self, expr: &Expression) -> (TypeTerm, TypeTerm) {
        let source = self.unifier.fresh();
        let target = self.unifier.fresh();
        let actual = self.expression(expr);
        self.expect(&actual, &TypeTerm::rel(source.clone(), target.clone()), expr.location(), expr);
        (source, target)
    }

    fn integer(&mut self, expr: &Expression) {
        let actual = self.expression(expr);
        self.expect(&actual, &TypeTerm::Integer, expr.location(), expr);
    }

    pub(super) fn expression(&mut self, expr: &Expression) -> TypeTerm {
        let location = expr.location();

        let term = match expr.kind() {
            ExpressionKind::FreeIdentifier(name) => self.ident(name, location),
            ExpressionKind::BoundIdentifier(index) => {
                let term = match self.bound.len().checked_sub(index + 1) {
                    Some(position) => self.bound[position].clone(),
                    None => self.unifier.fresh(),
                };
                self.slot(&term, location, None);
                term
            }
            ExpressionKind::IntegerLiteral(_) => TypeTerm::Integer,
            ExpressionKind::Atomic(op) => {
                let term = self.atomic(*op);
                if op.is_generic() {
                    self.slot(&term, location, Some(op.glyph().to_string()));
                }
                term
            }
            ExpressionKind::SetExtension(members) => {
                let element = self.unifier.fresh();
                let term = TypeTerm::pow(element.clone());
                if members.is_empty() {
                    self.slot(&term, location, Some("{}".to_string()));
                }
                for member in members {
                    let actual = self.expression(member);
                    self.expect(&actual, &element, member.location(), member);
                }
                term
            }
            ExpressionKind::Unary(op, child) => self.unary(*op, child),
            ExpressionKind::Binary(op, left, right) => self.binary(*op, left, right),
            ExpressionKind::Associative(op, children) => self.associative(*op, children),
            ExpressionKind::Bool(pred) => {
                self.predicate(pred);
                TypeTerm::Boolean
            }
            ExpressionKind::Quantified {
                op,
                decls,
                predicate,
                expression,
                ..
            } => {
                let depth = self.bound.len();
                self.declare(decls.iter());
                self.predicate(predicate);
                let body = self.expression(expression);
                self.bound.truncate(depth);

                match op {
                    QuantifierOp::Cset => TypeTerm::pow(body),
                    QuantifierOp::QUnion | QuantifierOp::QInter => {
                        let element = self.unifier.fresh();
                        self.expect(&body, &TypeTerm::pow(element), expression.location(), expression);
                        body
                    }
                }
            }
            ExpressionKind::Extended(extension, args) => {
                let elements = args.iter().map(|arg| self.set_of(arg)).collect();
                TypeTerm::pow(TypeTerm::Param(extension.clone(), elements))
            }
        };

        if let Some(ty) = expr.ty() {
            let annotated = self.annotation(ty, location);
            self.expect(&term, &annotated, location, expr);
        }

        term
    }

    fn atomic(&mut self, op: AtomicOp) -> TypeTerm {
        match op {
            AtomicOp::Integer | AtomicOp::Natural | AtomicOp::Natural1 => TypeTerm::pow(TypeTerm::Integer),
            AtomicOp::Bool => TypeTerm::pow(TypeTerm::Boolean),
            AtomicOp::True | AtomicOp::False => TypeTerm::Boolean,
            AtomicOp::Pred | AtomicOp::Succ => TypeTerm::rel(TypeTerm::Integer, TypeTerm::Integer),
            AtomicOp::EmptySet => TypeTerm::pow(self.unifier.fresh()),
            AtomicOp::Id => {
                let element = self.unifier.fresh();
                TypeTerm::rel(element.clone(), element)
            }
            AtomicOp::Prj1 | AtomicOp::Prj2 => {
                let left = self.unifier.fresh();
                let right = self.unifier.fresh();
                let projected = if op == AtomicOp::Prj1 { left.clone() } else { right.clone() };
                TypeTerm::rel(TypeTerm::prod(left, right), projected)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, child: &Expression) -> TypeTerm {
        match op {
            UnaryOp::Card => {
                self.set_of(child);
                TypeTerm::Integer
            }
            UnaryOp::Pow | UnaryOp::Pow1 => {
                let element = self.set_of(child);
                TypeTerm::pow(TypeTerm::pow(element))
            }
            UnaryOp::Union | UnaryOp::Inter => {
                let element = self.unifier.fresh();
                let actual = self.expression(child);
                let expected = TypeTerm::pow(TypeTerm::pow(element.clone()));
                self.expect(&actual, &expected, child.location(), child);
                TypeTerm::pow(element)
            }
            UnaryOp::Dom => TypeTerm::pow(self.relation_of(child).0),
            UnaryOp::Ran => TypeTerm::pow(self.relation_of(child).1),
            UnaryOp::Min | UnaryOp::Max => {
                let actual = self.expression(child);
                self.expect(&actual, &TypeTerm::pow(TypeTerm::Integer), child.location(), child);
                TypeTerm::Integer
            }
            UnaryOp::Converse => {
                let (source, target) = self.relation_of(child);
                TypeTerm::rel(target, source)
            }
            UnaryOp::UnMinus => {
                self.integer(child);
                TypeTerm::Integer
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expression, right: &Expression) -> TypeTerm {
        use BinaryOp::*;

        match op {
            Mapsto => {
                let l = self.expression(left);
                let r = self.expression(right);
                TypeTerm::prod(l, r)
            }
            Rel | TotalRel | SurjRel | TotalSurjRel | PartialFun | TotalFun | PartialInj | TotalInj | PartialSurj
            | TotalSurj | TotalBij => {
                let source = self.set_of(left);
                let target = self.set_of(right);
                TypeTerm::pow(TypeTerm::rel(source, target))
            }
            SetMinus => {
                let element = self.set_of(left);
                let actual = self.expression(right);
                let expected = TypeTerm::pow(element);
                self.expect(&actual, &expected, right.location(), right);
                expected
            }
            Cprod => {
                let source = self.set_of(left);
                let target = self.set_of(right);
                TypeTerm::rel(source, target)
            }
            Dprod => {
                let (source, first) = self.relation_of(left);
                let second = self.unifier.fresh();
                let actual = self.expression(right);
                self.expect(&actual, &TypeTerm::rel(source.clone(), second.clone()), right.location(), right);
                TypeTerm::rel(source, TypeTerm::prod(first, second))
            }
            Pprod => {
                let (a, b) = self.relation_of(left);
                let (c, d) = self.relation_of(right);
                TypeTerm::rel(TypeTerm::prod(a, c), TypeTerm::prod(b, d))
            }
            DomRes | DomSub => {
                let element = self.set_of(left);
                let target = self.unifier.fresh();
                let actual = self.expression(right);
                let expected = TypeTerm::rel(element, target);
                self.expect(&actual, &expected, right.location(), right);
                expected
            }
            RanRes | RanSub => {
                let (source, target) = self.relation_of(left);
                let actual = self.expression(right);
                self.expect(&actual, &TypeTerm::pow(target.clone()), right.location(), right);
                TypeTerm::rel(source, target)
            }
            UpTo => {
                self.integer(left);
                self.integer(right);
                TypeTerm::pow(TypeTerm::Integer)
            }
            Minus | Div | Mod | Expn => {
                self.integer(left);
                self.integer(right);
                TypeTerm::Integer
            }
            FunImage => {
                let (source, target) = self.relation_of(left);
                let actual = self.expression(right);
                self.expect(&actual, &source, right.location(), right);
                target
            }
            RelImage => {
                let (source, target) = self.relation_of(left);
                let actual = self.expression(right);
                self.expect(&actual, &TypeTerm::pow(source), right.location(), right);
                TypeTerm::pow(target)
            }
        }
    }

    fn associative(&mut self, op: AssociativeOp, children: &[Expression]) -> TypeTerm {
        match op {
            AssociativeOp::BUnion | AssociativeOp::BInter | AssociativeOp::Ovr => {
                let expected = match op {
                    AssociativeOp::Ovr => TypeTerm::rel(self.unifier.fresh(), self.unifier.fresh()),
                    _ => TypeTerm::pow(self.unifier.fresh()),
                };
                for child in children {
                    let actual = self.expression(child);
                    self.expect(&actual, &expected, child.location(), child);
                }
                expected
            }
            AssociativeOp::Plus | AssociativeOp::Mul => {
                for child in children {
                    self.integer(child);
                }
                TypeTerm::Integer
            }
            AssociativeOp::FComp | AssociativeOp::BComp => {
                let relations: Vec<(TypeTerm, TypeTerm)> =
                    children.iter().map(|child| self.relation_of(child)).collect();

                // `p∘q` is `q;p`: relations apply right to left.
                let mut applied: Vec<&(TypeTerm, TypeTerm)> = relations.iter().collect();
                if op == AssociativeOp::BComp {
                    applied.reverse();
                }

                for pair in applied.windows(2) {
                    let (previous, next) = (pair[0], pair[1]);
                    if self.unifier.unify(&previous.1, &next.0).is_err() {
                        let message = format!(
                            "cannot compose a relation to {} with a relation from {}",
                            self.unifier.zonk(&previous.1),
                            self.unifier.zonk(&next.0)
                        );
                        self.problems.push(Problem::new(ProblemKind::TypeError, None, message));
                    }
                }

                match (applied.first(), applied.last()) {
                    (Some(first), Some(last)) => TypeTerm::rel(first.0.clone(), last.1.clone()),
                    _ => self.unifier.fresh(),
                }
            }
        }
    }

    pub(super) fn predicate(&mut self, pred: &Predicate) {
        match pred.kind() {
            PredicateKind::Literal(_) | PredicateKind::Variable(_) => {}
            PredicateKind::Not(child) => self.predicate(child),
            PredicateKind::Binary(_, left, right) => {
                self.predicate(left);
                self.predicate(right);
            }
            PredicateKind::Associative(_, children) => children.iter().for_each(|child| self.predicate(child)),
            PredicateKind::Relational(op, left, right) => self.relational(*op, left, right),
            PredicateKind::Quantified(_, decls, body) => {
                let depth = self.bound.len();
                self.declare(decls.iter());
                self.predicate(body);
                self.bound.truncate(depth);
            }
            PredicateKind::Finite(child) => {
                self.set_of(child);
            }
            PredicateKind::Partition(children) => {
                let expected = TypeTerm::pow(self.unifier.fresh());
                for child in children {
                    let actual = self.expression(child);
                    self.expect(&actual, &expected, child.location(), child);
                }
            }
        }
    }

    fn relational(&mut self, op: RelationalOp, left: &Expression, right: &Expression) {
        use RelationalOp::*;

        let l = self.expression(left);
        let r = self.expression(right);

        match op {
            Equal | NotEqual => self.expect(&r, &l, right.location(), right),
            Lt | Le | Gt | Ge => {
                self.expect(&l, &TypeTerm::Integer, left.location(), left);
                self.expect(&r, &TypeTerm::Integer, right.location(), right);
            }
            In | NotIn => self.expect(&r, &TypeTerm::pow(l), right.location(), right),
            Subset | NotSubset | SubsetEq | NotSubsetEq => {
                let set = TypeTerm::pow(self.unifier.fresh());
                self.expect(&l, &set, left.location(), left);
                self.expect(&r, &l, right.location(), right);
            }
        }
    }

    pub(super) fn assignment(&mut self, assignment: &Assignment) {
        match assignment.kind() {
            AssignmentKind::BecomesEqualTo { identifiers, values } => {
                let assigned: Vec<TypeTerm> = identifiers.iter().map(|ident| self.expression(ident)).collect();
                for (expected, value) in assigned.iter().zip(values.iter()) {
                    let actual = self.expression(value);
                    self.expect(&actual, expected, value.location(), value);
                }
            }
            AssignmentKind::BecomesMemberOf { identifier, set } => {
                let element = self.expression(identifier);
                let actual = self.expression(set);
                self.expect(&actual, &TypeTerm::pow(element), set.location(), set);
            }
            AssignmentKind::BecomesSuchThat {
                identifiers,
                primed,
                condition,
            } => {
                let assigned: Vec<TypeTerm> = identifiers.iter().map(|ident| self.expression(ident)).collect();
                let depth = self.bound.len();
                self.declare(primed.iter());

                for ((expected, decl), primed_term) in assigned.iter().zip(primed.iter()).zip(self.bound[depth..].to_vec()) {
                    self.expect(&primed_term, expected, decl.location(), &decl.name());
                }

                self.predicate(condition);
                self.bound.truncate(depth);
            }
        }
    }
}
