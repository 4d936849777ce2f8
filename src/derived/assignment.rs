use super::Builder;
use crate::binding::instantiate_body;
use crate::error::FormulaError;
use crate::expressions::{Assignment, AssignmentKind, Expression, Predicate};
use crate::operators::{QuantifiedPredicateOp, RelationalOp};

/// The free identifier `x'` standing for the value of `x` after an assignment.
fn primed(builder: &Builder<'_>, ident: &Expression) -> Result<Expression, FormulaError> {
    let name = ident
        .identifier_name()
        .ok_or_else(|| FormulaError::IllegalState(format!("assigned {} is not an identifier", ident)))?;

    builder
        .factory
        .make_free_identifier(&format!("{}'", name), None, ident.ty().cloned())
}

pub(super) fn before_after(builder: &Builder<'_>, assignment: &Assignment) -> Result<Predicate, FormulaError> {
    match assignment.kind() {
        AssignmentKind::BecomesEqualTo { identifiers, values } => {
            let equalities = identifiers
                .iter()
                .zip(values.iter())
                .map(|(ident, value)| builder.relation(RelationalOp::Equal, primed(builder, ident)?, value.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            builder.conjoin(equalities)
        }
        AssignmentKind::BecomesMemberOf { identifier, set } => {
            builder.relation(RelationalOp::In, primed(builder, identifier)?, set.clone())
        }
        AssignmentKind::BecomesSuchThat {
            identifiers, condition, ..
        } => {
            let replacements = identifiers
                .iter()
                .map(|ident| primed(builder, ident).map(Some))
                .collect::<Result<Vec<_>, _>>()?;
            instantiate_body(condition, &replacements, builder.factory)
        }
    }
}

pub(super) fn feasibility(builder: &Builder<'_>, assignment: &Assignment) -> Result<Predicate, FormulaError> {
    match assignment.kind() {
        AssignmentKind::BecomesEqualTo { .. } => Ok(builder.truth()),
        AssignmentKind::BecomesMemberOf { set, .. } => {
            let empty = builder.factory.make_empty_set(set.ty().cloned(), None)?;
            builder.relation(RelationalOp::NotEqual, set.clone(), empty)
        }
        AssignmentKind::BecomesSuchThat { primed, condition, .. } => {
            builder.quantify(QuantifiedPredicateOp::Exists, primed.iter(), condition.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;
    use crate::operators::RelationalOp;

    #[test]
    fn becomes_member_of() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let a = ff.make_free_identifier("A", None, Some(ff.make_power_set_type(integer)?))?;
        let assignment = ff.make_becomes_member_of(x, a, None)?;

        assert_eq!(assignment.ba_predicate(&ff)?.to_string(), "x'∈A");
        assert_eq!(assignment.fis_predicate(&ff)?.to_string(), "A≠∅");

        Ok(())
    }

    #[test]
    fn becomes_such_that() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let a = ff.make_free_identifier("A", None, Some(ff.make_power_set_type(integer.clone())?))?;
        let after = ff.make_bound_identifier(0, None, Some(integer.clone()))?;
        let condition = ff.make_relational_predicate(RelationalOp::In, after, a, None)?;
        let decl = ff.make_bound_ident_decl("x'", None, Some(integer))?;
        let assignment = ff.make_becomes_such_that(vec![x], vec![decl], condition, None)?;

        assert_eq!(assignment.ba_predicate(&ff)?.to_string(), "x'∈A");
        assert_eq!(assignment.fis_predicate(&ff)?.to_string(), "∃x'·x'∈A");

        Ok(())
    }

    #[test]
    fn becomes_equal_to_is_always_feasible() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let integer = ff.make_integer_type();
        let x = ff.make_free_identifier("x", None, Some(integer.clone()))?;
        let y = ff.make_free_identifier("y", None, Some(integer))?;
        let assignment = ff.make_becomes_equal_to(vec![x, y.clone()], vec![y.clone(), y], None)?;

        assert_eq!(assignment.ba_predicate(&ff)?.to_string(), "x'=y∧y'=y");
        assert_eq!(assignment.fis_predicate(&ff)?.to_string(), "⊤");

        Ok(())
    }
}
