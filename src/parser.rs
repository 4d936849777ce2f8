//! Parsing of expressions, predicates, assignments and types.
//!
//! The grammar is read by recursive descent over the lexemes produced by [`crate::lexer`]. From
//! loosest to tightest, expressions are built from `↦`, the relation set operators (`↔`, `→`,
//! ...), the set operators (`∪`, `∖`, `◁`, ...), `‥`, `+` and `−`, `∗`, `÷` and `mod`, `^`, and
//! finally application, image and converse. Predicates are built from `⇒` and `⇔`, `∧` and `∨`,
//! `¬` and the quantifiers, then relations between expressions.
//!
//! A parse either yields a formula or at least one [`Problem`], never both.

mod assignments;
mod common;
mod expressions;
mod predicates;
mod types;

use nonempty::NonEmpty;
use tracing::debug;

use crate::error::Problem;
use crate::expressions::{Assignment, Expression, Predicate};
use crate::factory::FormulaFactory;
use crate::types::Type;

use common::{PResult, Parser};

/// Outcome of a parse: the parsed value, or the problems found.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseResult<T> {
    result: Result<T, NonEmpty<Problem>>,
}

impl<T> ParseResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn has_problem(&self) -> bool {
        self.result.is_err()
    }

    pub fn problems(&self) -> impl Iterator<Item = &Problem> {
        self.result.as_ref().err().into_iter().flat_map(|problems| problems.iter())
    }

    pub fn parsed(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn into_result(self) -> Result<T, NonEmpty<Problem>> {
        self.result
    }
}

fn parse<T, F>(factory: &FormulaFactory, text: &str, origin: Option<&str>, category: &'static str, rule: F) -> ParseResult<T>
where
    F: FnOnce(&mut Parser<'_>) -> PResult<T>,
{
    let result = Parser::new(factory, text, origin).and_then(|mut parser| {
        let parsed = rule(&mut parser)?;
        parser.expect_end()?;
        Ok(parsed)
    });

    match &result {
        Ok(_) => debug!(category, length = text.len(), "parsed formula"),
        Err(problem) => debug!(category, %problem, "formula rejected"),
    }

    ParseResult {
        result: result.map_err(NonEmpty::new),
    }
}

impl FormulaFactory {
    /// Parse an expression. `origin` tags the source locations of the parsed nodes.
    pub fn parse_expression(&self, text: &str, origin: Option<&str>) -> ParseResult<Expression> {
        parse(self, text, origin, "expression", |parser| parser.expression())
    }

    pub fn parse_predicate(&self, text: &str, origin: Option<&str>) -> ParseResult<Predicate> {
        parse(self, text, origin, "predicate", |parser| parser.predicate())
    }

    pub fn parse_assignment(&self, text: &str, origin: Option<&str>) -> ParseResult<Assignment> {
        parse(self, text, origin, "assignment", |parser| parser.assignment())
    }

    /// Parse a type expression such as `ℙ(S)↔ℤ`.
    pub fn parse_type(&self, text: &str) -> ParseResult<Type> {
        parse(self, text, None, "type", |parser| parser.type_expression())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::error::ProblemKind;
    use crate::expressions::{ExpressionKind, PredicateKind};
    use crate::factory::FormulaFactory;
    use crate::operators::{AssociativeOp, BinaryOp, QuantifiedForm, Tag, UnaryOp};

    #[test]
    fn arithmetic_folding() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();

        let expr = ff.parse_expression("−x+y+z", None).into_result().map_err(|p| p.head)?;
        assert_eq!(expr.tag(), Tag::Associative(AssociativeOp::Plus));
        let ExpressionKind::Associative(_, children) = expr.kind() else {
            return Err("expected a sum".into());
        };
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].tag(), Tag::Unary(UnaryOp::UnMinus));

        let expr = ff.parse_expression("−x−y", None).into_result().map_err(|p| p.head)?;
        let ExpressionKind::Binary(BinaryOp::Minus, left, _) = expr.kind() else {
            return Err("expected a difference".into());
        };
        assert_eq!(left.tag(), Tag::Unary(UnaryOp::UnMinus));

        let literal = ff.parse_expression("−1", None).into_result().map_err(|p| p.head)?;
        assert_eq!(literal.integer_value(), Some(&(-1).into()));

        Ok(())
    }

    #[test]
    fn flattening_and_left_association() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();

        let inter = ff.parse_expression("x∩y∩z", None).into_result().map_err(|p| p.head)?;
        assert!(matches!(inter.kind(), ExpressionKind::Associative(AssociativeOp::BInter, c) if c.len() == 3));

        let product = ff.parse_expression("x×y×z", None).into_result().map_err(|p| p.head)?;
        let ExpressionKind::Binary(BinaryOp::Cprod, left, _) = product.kind() else {
            return Err("expected a product".into());
        };
        assert_eq!(left.tag(), Tag::Binary(BinaryOp::Cprod));

        Ok(())
    }

    #[test]
    fn de_bruijn_indices() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let pred = ff
            .parse_predicate("∀x,y·x∈s∧y∈t", None)
            .into_result()
            .map_err(|p| p.head)?;

        let PredicateKind::Quantified(_, _, body) = pred.kind() else {
            return Err("expected a quantified predicate".into());
        };
        let PredicateKind::Associative(_, children) = body.kind() else {
            return Err("expected a conjunction".into());
        };
        let indices: Vec<Option<usize>> = children
            .iter()
            .map(|child| match child.kind() {
                PredicateKind::Relational(_, left, _) => left.bound_index(),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![Some(1), Some(0)]);

        Ok(())
    }

    #[test]
    fn comprehension_forms() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();

        let explicit = ff.parse_expression("{x·x∈ℕ∣x+1}", None).into_result().map_err(|p| p.head)?;
        let implicit = ff.parse_expression("{x+1∣x∈ℕ}", None).into_result().map_err(|p| p.head)?;
        let lambda = ff.parse_expression("λx·x∈ℕ∣x+1", None).into_result().map_err(|p| p.head)?;

        assert!(matches!(explicit.kind(), ExpressionKind::Quantified { form: QuantifiedForm::Explicit, .. }));
        assert!(matches!(implicit.kind(), ExpressionKind::Quantified { form: QuantifiedForm::Implicit, .. }));
        assert!(matches!(lambda.kind(), ExpressionKind::Quantified { form: QuantifiedForm::Lambda, .. }));
        assert_eq!(explicit, implicit);

        Ok(())
    }

    #[test]
    fn problems_are_reported() {
        let ff = FormulaFactory::default_factory();

        let result = ff.parse_expression("x/x/x", None);
        assert!(result.has_problem());
        assert!(result.parsed().is_none());
        assert_eq!(result.problems().next().map(|p| p.kind()), Some(ProblemKind::LexicalError));

        let result = ff.parse_predicate("∀x,x·x=x", None);
        assert_eq!(result.problems().next().map(|p| p.kind()), Some(ProblemKind::DuplicateIdentifier));

        assert!(ff.parse_expression("x∪y∩z", None).has_problem());
        assert!(ff.parse_predicate("x=y=z", None).has_problem());
        assert!(ff.parse_predicate("a∧b∨c", None).has_problem());
    }

    #[test]
    fn typed_empty_set() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();

        let empty = ff.parse_expression("(∅⦂ℙ(S))", None).into_result().map_err(|p| p.head)?;
        assert_eq!(empty.ty().map(ToString::to_string), Some("ℙ(S)".to_string()));
        assert!(empty.is_type_checked());

        let result = ff.parse_expression("(∅⦂S↔T)", None);
        assert_eq!(result.problems().next().map(|p| p.kind()), Some(ProblemKind::InvalidTypeExpression));

        assert!(ff.parse_expression("(∅⦂ℙ(S×T))", None).is_success());
        assert!(ff.parse_expression("(∅⦂S)", None).has_problem());

        Ok(())
    }
}
