use crate::error::ProblemKind;
use crate::expressions::{Assignment, Expression};

use super::common::{PResult, Parser};

impl Parser<'_> {
    /// `x,y ≔ E,F`, `x :∈ S` or `x,y :∣ P` where `P` refers to `x'` and `y'`.
    pub(super) fn assignment(&mut self) -> PResult<Assignment> {
        let start = self.start();
        let mut identifiers = vec![self.assigned_identifier()?];

        while self.eat(",") {
            identifiers.push(self.assigned_identifier()?);
        }

        if self.eat("≔") {
            let values = self.expressions()?;
            return self.build(
                self.factory
                    .make_becomes_equal_to(identifiers, values, self.location(start)),
                start,
            );
        }

        if self.eat(":∈") {
            let set = self.expression()?;
            let location = self.location(start);
            return match <[Expression; 1]>::try_from(identifiers) {
                Ok([identifier]) => self.build(self.factory.make_becomes_member_of(identifier, set, location), start),
                Err(_) => Err(self.problem(ProblemKind::SyntaxError, start, ":∈ assigns a single identifier")),
            };
        }

        if self.eat(":∣") {
            let primed: Vec<String> = identifiers
                .iter()
                .filter_map(Expression::identifier_name)
                .map(|name| format!("{}'", name))
                .collect();
            let decls = identifiers
                .iter()
                .zip(&primed)
                .map(|(ident, name)| self.build(self.factory.make_bound_ident_decl(name, ident.location().cloned(), None), start))
                .collect::<PResult<Vec<_>>>()?;

            let condition = self.scoped(&primed, |parser| parser.predicate())?;
            return self.build(
                self.factory
                    .make_becomes_such_that(identifiers, decls, condition, self.location(start)),
                start,
            );
        }

        Err(self.error(format!("expected ≔, :∈ or :∣, found {}", self.peek())))
    }

    fn assigned_identifier(&mut self) -> PResult<Expression> {
        let start = self.start();
        let name = self.identifier_name()?;
        self.build(self.factory.make_free_identifier(&name, self.location(start), None), start)
    }
}
