//! Predicates derived from formulas.
//!
//! * The well-definedness predicate of a formula holds when every partial operator in it is
//!   applied inside its domain.
//! * The before-after predicate of an assignment relates the values of the assigned identifiers
//!   before the assignment, unprimed, to their values after it, primed.
//! * The feasibility predicate of an assignment holds when the assignment has an outcome.
//!
//! Derived predicates are built by the factory they are requested from and are type-checked.
//! Trivial conditions are folded away, so a formula with no partial operator has the
//! well-definedness predicate `⊤`.

mod assignment;
mod wd;

use tracing::debug;

use crate::binding::instantiate_body;
use crate::error::FormulaError;
use crate::expressions::{Assignment, BoundIdentDecl, Expression, Predicate, PredicateKind};
use crate::factory::FormulaFactory;
use crate::formula::Formula;
use crate::operators::{AssociativePredicateOp, BinaryPredicateOp, LiteralOp, QuantifiedPredicateOp, RelationalOp};

/// Predicate constructors folding `⊤`.
struct Builder<'a> {
    factory: &'a FormulaFactory,
}

impl<'a> Builder<'a> {
    fn new(factory: &'a FormulaFactory) -> Self {
        Builder { factory }
    }

    fn truth(&self) -> Predicate {
        self.factory.make_literal_predicate(LiteralOp::True, None)
    }

    fn relation(&self, op: RelationalOp, left: Expression, right: Expression) -> Result<Predicate, FormulaError> {
        self.factory.make_relational_predicate(op, left, right, None)
    }

    /// Conjunction of the non-trivial `conditions`, nested conjunctions flattened and repeated
    /// conjuncts kept once.
    fn conjoin<I>(&self, conditions: I) -> Result<Predicate, FormulaError>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut conjuncts: Vec<Predicate> = Vec::new();
        let mut push = |conjunct: Predicate| {
            if !conjuncts.contains(&conjunct) {
                conjuncts.push(conjunct);
            }
        };

        for condition in conditions {
            match condition.kind() {
                PredicateKind::Literal(LiteralOp::True) => {}
                PredicateKind::Associative(AssociativePredicateOp::And, children) => {
                    children.iter().cloned().for_each(&mut push);
                }
                _ => push(condition),
            }
        }

        match conjuncts.len() {
            0 => Ok(self.truth()),
            1 => Ok(conjuncts.remove(0)),
            _ => self
                .factory
                .make_associative_predicate(AssociativePredicateOp::And, conjuncts, None),
        }
    }

    fn implies(&self, hypothesis: Predicate, goal: Predicate) -> Result<Predicate, FormulaError> {
        if goal.is_literal(LiteralOp::True) {
            return Ok(goal);
        }

        self.factory
            .make_binary_predicate(BinaryPredicateOp::Implies, hypothesis, goal, None)
    }

    fn or_else(&self, alternative: Predicate, goal: Predicate) -> Result<Predicate, FormulaError> {
        if goal.is_literal(LiteralOp::True) {
            return Ok(goal);
        }

        self.factory
            .make_associative_predicate(AssociativePredicateOp::Or, vec![alternative, goal], None)
    }

    /// Quantify `body` over the declarations it uses among `decls`.
    ///
    /// `body` lies directly below `decls`, so its loose indices below `decls.len()` refer to them.
    fn quantify<'d, I>(&self, op: QuantifiedPredicateOp, decls: I, body: Predicate) -> Result<Predicate, FormulaError>
    where
        I: IntoIterator<Item = &'d BoundIdentDecl>,
    {
        if body.is_literal(LiteralOp::True) {
            return Ok(body);
        }

        let decls: Vec<&BoundIdentDecl> = decls.into_iter().collect();
        let count = decls.len();
        let loose = Formula::from(body.clone()).bound_identifiers();
        let used = |position: usize| loose.contains(&(count - 1 - position));

        // An unused declaration is instantiated by its own name, which is never inserted.
        let replacements = decls
            .iter()
            .enumerate()
            .map(|(position, decl)| {
                if used(position) {
                    Ok(None)
                } else {
                    self.factory
                        .make_free_identifier(decl.name(), None, decl.ty().cloned())
                        .map(Some)
                }
            })
            .collect::<Result<Vec<_>, FormulaError>>()?;

        let kept: Vec<BoundIdentDecl> = decls
            .iter()
            .enumerate()
            .filter(|(position, _)| used(*position))
            .map(|(_, decl)| (*decl).clone())
            .collect();

        let body = instantiate_body(&body, &replacements, self.factory)?;
        if kept.is_empty() {
            Ok(body)
        } else {
            self.factory.make_quantified_predicate(op, kept, body, None)
        }
    }
}

impl Formula {
    /// Well-definedness predicate of a type-checked formula, built by `factory`.
    pub fn wd_predicate(&self, factory: &FormulaFactory) -> Result<Predicate, FormulaError> {
        if !self.is_type_checked() {
            return Err(FormulaError::NotTypeChecked);
        }

        let wd = wd::Wd::new(Builder::new(factory)).formula(self)?;
        debug!(formula = %self, wd = %wd, "derived well-definedness predicate");
        Ok(wd)
    }
}

impl Assignment {
    /// Before-after predicate of a type-checked assignment, over the unprimed and primed
    /// assigned identifiers.
    pub fn ba_predicate(&self, factory: &FormulaFactory) -> Result<Predicate, FormulaError> {
        if !self.is_type_checked() {
            return Err(FormulaError::NotTypeChecked);
        }

        let ba = assignment::before_after(&Builder::new(factory), self)?;
        debug!(assignment = %self, ba = %ba, "derived before-after predicate");
        Ok(ba)
    }

    /// Feasibility predicate of a type-checked assignment.
    pub fn fis_predicate(&self, factory: &FormulaFactory) -> Result<Predicate, FormulaError> {
        if !self.is_type_checked() {
            return Err(FormulaError::NotTypeChecked);
        }

        let fis = assignment::feasibility(&Builder::new(factory), self)?;
        debug!(assignment = %self, fis = %fis, "derived feasibility predicate");
        Ok(fis)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use num_bigint::BigInt;

    use crate::factory::FormulaFactory;
    use crate::formula::Formula;
    use crate::operators::{BinaryOp, LiteralOp, QuantifiedPredicateOp, RelationalOp};

    #[test]
    fn total_formulas_are_well_defined() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, Some(ff.make_integer_type()))?;
        let one = ff.make_integer_literal(BigInt::from(1), None);
        let pred = Formula::from(ff.make_relational_predicate(RelationalOp::Le, one, x, None)?);

        assert!(pred.wd_predicate(&ff)?.is_literal(LiteralOp::True));

        Ok(())
    }

    #[test]
    fn untyped_formulas_are_rejected() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = Formula::from(ff.make_free_identifier("x", None, None)?);

        assert!(x.wd_predicate(&ff).is_err());

        Ok(())
    }

    #[test]
    fn unused_declarations_are_dropped() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let y = ff.make_bound_identifier(0, None, Some(integer.clone()))?;
        let quotient = ff.make_binary_expression(BinaryOp::Div, y.clone(), x, None)?;
        let body = ff.make_relational_predicate(RelationalOp::Equal, quotient, y, None)?;
        let decls = vec![ff.make_bound_ident_decl("y", None, Some(integer))?];
        let pred = Formula::from(ff.make_quantified_predicate(QuantifiedPredicateOp::ForAll, decls, body, None)?);

        assert_eq!(pred.wd_predicate(&ff)?.to_string(), "x≠0");

        Ok(())
    }
}
