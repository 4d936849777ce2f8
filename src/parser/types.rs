use crate::error::ProblemKind;
use crate::expressions::{Expression, ExpressionKind};
use crate::operators::UnaryOp;
use crate::types::Type;

use super::common::{PResult, Parser};

impl Parser<'_> {
    /// A type written as a set expression, such as `ℙ(S×ℤ)` or `S↔BOOL`.
    ///
    /// Identifiers always denote given types here, even when a bound identifier of the same
    /// name is in scope.
    pub(super) fn type_expression(&mut self) -> PResult<Type> {
        self.type_with_syntax().map(|(_, ty)| ty)
    }

    /// Type annotation of a generic atom, which must be written `ℙ(...)`.
    pub(super) fn type_annotation(&mut self) -> PResult<Type> {
        let start = self.start();
        let (expr, ty) = self.type_with_syntax()?;

        if !matches!(expr.kind(), ExpressionKind::Unary(UnaryOp::Pow, _)) {
            return Err(self.problem(
                ProblemKind::InvalidTypeExpression,
                start,
                format!("{} must be written as a power set", expr),
            ));
        }

        Ok(ty)
    }

    fn type_with_syntax(&mut self) -> PResult<(Expression, Type)> {
        let start = self.start();
        let enclosing = std::mem::take(&mut self.scope);
        let parsed = self.relation_group();
        self.scope = enclosing;

        let expr = parsed?;
        let ty = expr
            .to_type(self.factory)
            .map_err(|error| self.problem(ProblemKind::InvalidTypeExpression, start, error.to_string()))?;

        Ok((expr, ty))
    }
}
