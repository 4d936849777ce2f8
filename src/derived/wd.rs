use num_bigint::BigInt;
use num_traits::Zero;

use super::Builder;
use crate::error::FormulaError;
use crate::expressions::{Assignment, AssignmentKind, Expression, ExpressionKind, Predicate, PredicateKind};
use crate::formula::Formula;
use crate::operators::{
    AssociativePredicateOp, BinaryOp, BinaryPredicateOp, QuantifiedPredicateOp, QuantifierOp, RelationalOp, UnaryOp,
};

/// Well-definedness conditions.
///
/// Conditions are computed bottom-up. Conditions on the right of `⇒`, `∧` and `∨` are guarded
/// by the operands on their left, and the conditions below a binder are universally quantified
/// over its declarations.
pub(super) struct Wd<'a> {
    build: Builder<'a>,
}

impl<'a> Wd<'a> {
    pub(super) fn new(build: Builder<'a>) -> Self {
        Wd { build }
    }

    pub(super) fn formula(&self, formula: &Formula) -> Result<Predicate, FormulaError> {
        match formula {
            Formula::Expression(expr) => self.expression(expr),
            Formula::Predicate(pred) => self.predicate(pred),
            Formula::Assignment(assignment) => self.assignment(assignment),
            Formula::BoundIdentDecl(_) => Ok(self.build.truth()),
        }
    }

    fn all<'e, I>(&self, exprs: I) -> Result<Predicate, FormulaError>
    where
        I: IntoIterator<Item = &'e Expression>,
    {
        let conditions = exprs
            .into_iter()
            .map(|expr| self.expression(expr))
            .collect::<Result<Vec<_>, _>>()?;
        self.build.conjoin(conditions)
    }

    fn expression(&self, expr: &Expression) -> Result<Predicate, FormulaError> {
        let factory = self.build.factory;

        match expr.kind() {
            ExpressionKind::FreeIdentifier(_)
            | ExpressionKind::BoundIdentifier(_)
            | ExpressionKind::IntegerLiteral(_)
            | ExpressionKind::Atomic(_) => Ok(self.build.truth()),
            ExpressionKind::SetExtension(members) => self.all(members),
            ExpressionKind::Associative(_, children) => self.all(children),
            ExpressionKind::Extended(_, args) => self.all(args),
            ExpressionKind::Bool(pred) => self.predicate(pred),
            ExpressionKind::Unary(op, child) => {
                let mut conditions = vec![self.expression(child)?];
                match op {
                    UnaryOp::Card => conditions.push(factory.make_finite(child.clone(), None)?),
                    UnaryOp::Inter => conditions.push(self.not_empty(child)?),
                    UnaryOp::Min | UnaryOp::Max => {
                        conditions.push(self.not_empty(child)?);
                        conditions.push(self.bounded(*op, child)?);
                    }
                    _ => {}
                }
                self.build.conjoin(conditions)
            }
            ExpressionKind::Binary(op, left, right) => {
                let mut conditions = vec![self.expression(left)?, self.expression(right)?];
                match op {
                    BinaryOp::Div | BinaryOp::Mod => {
                        conditions.push(self.build.relation(RelationalOp::NotEqual, right.clone(), self.zero())?);
                    }
                    BinaryOp::Expn => {
                        conditions.push(self.build.relation(RelationalOp::Le, self.zero(), left.clone())?);
                        conditions.push(self.build.relation(RelationalOp::Le, self.zero(), right.clone())?);
                    }
                    BinaryOp::FunImage => {
                        let domain = factory.make_unary_expression(UnaryOp::Dom, left.clone(), None)?;
                        conditions.push(self.build.relation(RelationalOp::In, right.clone(), domain)?);
                        conditions.push(self.build.relation(RelationalOp::In, left.clone(), self.partial_functions(left)?)?);
                    }
                    _ => {}
                }
                self.build.conjoin(conditions)
            }
            ExpressionKind::Quantified {
                op,
                decls,
                predicate,
                expression,
                ..
            } => {
                let guarded = self.build.implies(predicate.clone(), self.expression(expression)?)?;
                let body = self.build.conjoin([self.predicate(predicate)?, guarded])?;
                let mut conditions = vec![self.build.quantify(QuantifiedPredicateOp::ForAll, decls.iter(), body)?];
                if *op == QuantifierOp::QInter {
                    conditions.push(self.build.quantify(QuantifiedPredicateOp::Exists, decls.iter(), predicate.clone())?);
                }
                self.build.conjoin(conditions)
            }
        }
    }

    fn predicate(&self, pred: &Predicate) -> Result<Predicate, FormulaError> {
        match pred.kind() {
            PredicateKind::Literal(_) | PredicateKind::Variable(_) => Ok(self.build.truth()),
            PredicateKind::Not(child) => self.predicate(child),
            PredicateKind::Binary(BinaryPredicateOp::Implies, left, right) => {
                let guarded = self.build.implies(left.clone(), self.predicate(right)?)?;
                self.build.conjoin([self.predicate(left)?, guarded])
            }
            PredicateKind::Binary(BinaryPredicateOp::Equivalent, left, right) => {
                self.build.conjoin([self.predicate(left)?, self.predicate(right)?])
            }
            PredicateKind::Associative(op, children) => {
                let mut conditions = Vec::with_capacity(children.len());
                for (index, child) in children.iter().enumerate() {
                    let wd = self.predicate(child)?;
                    if index == 0 {
                        conditions.push(wd);
                        continue;
                    }

                    let before = match index {
                        1 => children[0].clone(),
                        _ => self
                            .build
                            .factory
                            .make_associative_predicate(*op, children[..index].to_vec(), None)?,
                    };
                    conditions.push(match op {
                        AssociativePredicateOp::And => self.build.implies(before, wd)?,
                        AssociativePredicateOp::Or => self.build.or_else(before, wd)?,
                    });
                }
                self.build.conjoin(conditions)
            }
            PredicateKind::Relational(_, left, right) => self.all([left, right]),
            PredicateKind::Quantified(_, decls, body) => {
                self.build
                    .quantify(QuantifiedPredicateOp::ForAll, decls.iter(), self.predicate(body)?)
            }
            PredicateKind::Finite(child) => self.expression(child),
            PredicateKind::Partition(children) => self.all(children),
        }
    }

    fn assignment(&self, assignment: &Assignment) -> Result<Predicate, FormulaError> {
        match assignment.kind() {
            AssignmentKind::BecomesEqualTo { values, .. } => self.all(values.iter()),
            AssignmentKind::BecomesMemberOf { set, .. } => self.expression(set),
            AssignmentKind::BecomesSuchThat { primed, condition, .. } => {
                self.build
                    .quantify(QuantifiedPredicateOp::ForAll, primed.iter(), self.predicate(condition)?)
            }
        }
    }

    fn zero(&self) -> Expression {
        self.build.factory.make_integer_literal(BigInt::zero(), None)
    }

    fn not_empty(&self, set: &Expression) -> Result<Predicate, FormulaError> {
        let empty = self.build.factory.make_empty_set(set.ty().cloned(), None)?;
        self.build.relation(RelationalOp::NotEqual, set.clone(), empty)
    }

    /// `∃b·∀x·x∈set ⇒ b≤x` for `min`, with `x≤b` for `max`.
    fn bounded(&self, op: UnaryOp, set: &Expression) -> Result<Predicate, FormulaError> {
        let factory = self.build.factory;
        let integer = factory.make_integer_type();

        let shifted = Formula::from(set.clone()).shift_bound_identifiers(2, factory)?;
        let set = shifted
            .as_expression()
            .cloned()
            .ok_or_else(|| FormulaError::IllegalState("shifting changed the category of an expression".to_string()))?;

        let x = factory.make_bound_identifier(0, None, Some(integer.clone()))?;
        let bound = factory.make_bound_identifier(1, None, Some(integer.clone()))?;
        let order = match op {
            UnaryOp::Max => self.build.relation(RelationalOp::Le, x.clone(), bound)?,
            _ => self.build.relation(RelationalOp::Le, bound, x.clone())?,
        };
        let member = self.build.relation(RelationalOp::In, x, set)?;
        let body = factory.make_binary_predicate(BinaryPredicateOp::Implies, member, order, None)?;

        let all = factory.make_quantified_predicate(
            QuantifiedPredicateOp::ForAll,
            vec![factory.make_bound_ident_decl("x", None, Some(integer.clone()))?],
            body,
            None,
        )?;
        factory.make_quantified_predicate(
            QuantifiedPredicateOp::Exists,
            vec![factory.make_bound_ident_decl("b", None, Some(integer))?],
            all,
            None,
        )
    }

    /// `α⇸β` for a function of type `ℙ(α×β)`.
    fn partial_functions(&self, function: &Expression) -> Result<Expression, FormulaError> {
        let factory = self.build.factory;
        let ty = function.ty().ok_or(FormulaError::NotTypeChecked)?;
        let (Some(source), Some(target)) = (ty.source(), ty.target()) else {
            return Err(FormulaError::IllegalTag {
                operator: "function application",
                found: ty.to_string(),
            });
        };

        factory.make_binary_expression(
            BinaryOp::PartialFun,
            source.to_expression(factory)?,
            target.to_expression(factory)?,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use num_bigint::BigInt;

    use crate::factory::FormulaFactory;
    use crate::formula::Formula;
    use crate::operators::{AssociativePredicateOp, BinaryOp, RelationalOp, UnaryOp};

    #[test]
    fn division_and_cardinality() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let y = ff.make_free_identifier("y", None, Some(integer.clone()))?;
        let s = ff.make_free_identifier("s", None, Some(ff.make_power_set_type(integer)?))?;

        let quotient = Formula::from(ff.make_binary_expression(BinaryOp::Div, x, y, None)?);
        assert_eq!(quotient.wd_predicate(&ff)?.to_string(), "y≠0");

        let card = Formula::from(ff.make_unary_expression(UnaryOp::Card, s, None)?);
        assert_eq!(card.wd_predicate(&ff)?.to_string(), "finite(s)");

        Ok(())
    }

    #[test]
    fn conjunctions_guard_later_conditions() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let zero = ff.make_integer_literal(BigInt::from(0), None);
        let one = ff.make_integer_literal(BigInt::from(1), None);

        let guard = ff.make_relational_predicate(RelationalOp::NotEqual, x.clone(), zero, None)?;
        let quotient = ff.make_binary_expression(BinaryOp::Div, one.clone(), x, None)?;
        let use_ = ff.make_relational_predicate(RelationalOp::Equal, quotient, one, None)?;
        let pred = Formula::from(ff.make_associative_predicate(AssociativePredicateOp::And, vec![guard, use_], None)?);

        assert_eq!(pred.wd_predicate(&ff)?.to_string(), "x≠0⇒x≠0");

        Ok(())
    }

    #[test]
    fn function_application() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let f = ff.make_free_identifier("f", None, Some(ff.make_relational_type(integer.clone(), integer.clone())?))?;
        let x = ff.make_free_identifier("x", None, Some(integer))?;

        let inner = ff.make_binary_expression(BinaryOp::FunImage, f.clone(), x, None)?;
        let image = Formula::from(inner.clone());
        assert_eq!(image.wd_predicate(&ff)?.to_string(), "x∈dom(f)∧f∈ℤ⇸ℤ");

        let twice = Formula::from(ff.make_binary_expression(BinaryOp::FunImage, f, inner, None)?);
        assert_eq!(twice.wd_predicate(&ff)?.to_string(), "x∈dom(f)∧f∈ℤ⇸ℤ∧f(x)∈dom(f)");

        Ok(())
    }
}
