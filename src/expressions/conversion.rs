use crate::error::FormulaError;
use crate::expressions::{Expression, ExpressionKind};
use crate::factory::FormulaFactory;
use crate::operators::{AtomicOp, BinaryOp, UnaryOp};
use crate::types::{Type, TypeKind};

impl Type {
    /// The expression denoting the set of all values of this type.
    ///
    /// Given types become identifiers typed as carrier sets, so `ℙ(S×ℤ)` becomes the
    /// type-checked expression `ℙ(S×ℤ)`.
    pub fn to_expression(&self, factory: &FormulaFactory) -> Result<Expression, FormulaError> {
        if self.factory_id() != factory.id() {
            return Err(FormulaError::FactoryMismatch);
        }

        match self.kind() {
            TypeKind::Integer => factory.make_atomic_expression(AtomicOp::Integer, None, None),
            TypeKind::Boolean => factory.make_atomic_expression(AtomicOp::Bool, None, None),
            TypeKind::Given(name) => factory.make_free_identifier(name, None, Some(factory.pow(self.clone()))),
            TypeKind::PowerSet(base) => factory.make_unary_expression(UnaryOp::Pow, base.to_expression(factory)?, None),
            TypeKind::Product(left, right) => factory.make_binary_expression(
                BinaryOp::Cprod,
                left.to_expression(factory)?,
                right.to_expression(factory)?,
                None,
            ),
            TypeKind::Parametric(extension, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.to_expression(factory))
                    .collect::<Result<Vec<_>, _>>()?;
                factory.make_extended_expression(extension, args, None)
            }
        }
    }
}

impl Expression {
    /// The type whose values are the members of this type expression.
    ///
    /// Identifiers are read as given types, and `S↔T` is accepted as `ℙ(S×T)`.
    pub fn to_type(&self, factory: &FormulaFactory) -> Result<Type, FormulaError> {
        if self.factory_id() != factory.id() {
            return Err(FormulaError::FactoryMismatch);
        }

        let not_a_type = || FormulaError::illegal_argument(format!("{} does not denote a type", self));

        match self.kind() {
            ExpressionKind::Atomic(AtomicOp::Integer) => Ok(factory.make_integer_type()),
            ExpressionKind::Atomic(AtomicOp::Bool) => Ok(factory.make_boolean_type()),
            ExpressionKind::FreeIdentifier(name) => {
                let given = factory.make_given_type(name)?;
                match self.ty() {
                    Some(ty) if ty.base_type() != Some(&given) => Err(not_a_type()),
                    _ => Ok(given),
                }
            }
            ExpressionKind::Unary(UnaryOp::Pow, base) => Ok(factory.pow(base.to_type(factory)?)),
            ExpressionKind::Binary(BinaryOp::Cprod, left, right) => {
                Ok(factory.prod(left.to_type(factory)?, right.to_type(factory)?))
            }
            ExpressionKind::Binary(BinaryOp::Rel, left, right) => {
                Ok(factory.rel(left.to_type(factory)?, right.to_type(factory)?))
            }
            ExpressionKind::Extended(extension, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.to_type(factory))
                    .collect::<Result<Vec<_>, _>>()?;
                factory.make_parametric_type(extension, args)
            }
            _ => Err(not_a_type()),
        }
    }

    /// Whether this expression is a type expression.
    pub fn is_type_expression(&self, factory: &FormulaFactory) -> bool {
        self.to_type(factory).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;
    use crate::operators::BinaryOp;
    use crate::types::Extension;

    #[test]
    fn type_expressions() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let ty = ff.make_relational_type(s, ff.make_integer_type())?;

        let expr = ty.to_expression(&ff)?;
        assert_eq!(expr.to_string(), "ℙ(S×ℤ)");
        assert!(expr.is_type_checked());
        assert_eq!(expr.to_type(&ff)?, ty);

        let s = ff.make_free_identifier("S", None, None)?;
        let z = ff.make_free_identifier("T", None, None)?;
        let rel = ff.make_binary_expression(BinaryOp::Rel, s.clone(), z, None)?;
        assert_eq!(rel.to_type(&ff)?.to_string(), "ℙ(S×T)");

        let minus = ff.make_binary_expression(BinaryOp::Minus, s.clone(), s, None)?;
        assert!(!minus.is_type_expression(&ff));

        Ok(())
    }

    #[test]
    fn parametric_types() -> Result<(), Box<dyn Error>> {
        let list = Extension::new("List", 1);
        let ff = FormulaFactory::default_factory().with_extensions([list.clone()])?;
        let ty = ff.make_parametric_type(&list, vec![ff.make_integer_type()])?;

        let expr = ty.to_expression(&ff)?;
        assert_eq!(expr.to_string(), "List(ℤ)");
        assert_eq!(expr.to_type(&ff)?, ty);

        Ok(())
    }
}
