use crate::expressions::Predicate;
use crate::lexer::Token;
use crate::operators::{AssociativePredicateOp, BinaryPredicateOp, LiteralOp, QuantifiedPredicateOp, RelationalOp};

use super::common::{PResult, Parser};
use super::expressions::names;

const IMPLICATIONS: &[(&str, BinaryPredicateOp)] = &[
    ("⇒", BinaryPredicateOp::Implies),
    ("⇔", BinaryPredicateOp::Equivalent),
];

const CONNECTIVES: &[(&str, AssociativePredicateOp)] = &[
    ("∧", AssociativePredicateOp::And),
    ("∨", AssociativePredicateOp::Or),
];

const QUANTIFIERS: &[(&str, QuantifiedPredicateOp)] = &[
    ("∀", QuantifiedPredicateOp::ForAll),
    ("∃", QuantifiedPredicateOp::Exists),
];

const RELATIONS: &[(&str, RelationalOp)] = &[
    ("=", RelationalOp::Equal),
    ("≠", RelationalOp::NotEqual),
    ("<", RelationalOp::Lt),
    ("≤", RelationalOp::Le),
    (">", RelationalOp::Gt),
    ("≥", RelationalOp::Ge),
    ("∈", RelationalOp::In),
    ("∉", RelationalOp::NotIn),
    ("⊂", RelationalOp::Subset),
    ("⊄", RelationalOp::NotSubset),
    ("⊆", RelationalOp::SubsetEq),
    ("⊈", RelationalOp::NotSubsetEq),
];

impl Parser<'_> {
    /// Predicate, `⇒` and `⇔` binding loosest and never chained.
    pub(super) fn predicate(&mut self) -> PResult<Predicate> {
        self.nested(|parser| parser.implication())
    }

    /// `⇒` or `⇔` between two predicates, which do not chain.
    fn implication(&mut self) -> PResult<Predicate> {
        let start = self.start();
        let left = self.associative_predicate()?;

        let Some(op) = self.lookup(IMPLICATIONS) else {
            return Ok(left);
        };

        self.advance();
        let right = self.associative_predicate()?;
        let pred = self.build(
            self.factory
                .make_binary_predicate(op, left, right, self.location(start)),
            start,
        )?;

        if self.lookup(IMPLICATIONS).is_some() {
            return Err(self.error(format!("{} cannot follow {} without parentheses", self.peek(), op.glyph())));
        }

        Ok(pred)
    }

    /// Conjunction or disjunction; the two cannot be mixed without parentheses.
    fn associative_predicate(&mut self) -> PResult<Predicate> {
        let start = self.start();
        let first = self.unary_predicate()?;

        let Some(op) = self.lookup(CONNECTIVES) else {
            return Ok(first);
        };

        let mut children = vec![first];
        while self.eat(op.glyph()) {
            children.push(self.unary_predicate()?);
        }

        if self.lookup(CONNECTIVES).is_some() {
            return Err(self.error(format!("{} cannot follow {} without parentheses", self.peek(), op.glyph())));
        }

        self.build(
            self.factory
                .make_associative_predicate(op, children, self.location(start)),
            start,
        )
    }

    fn unary_predicate(&mut self) -> PResult<Predicate> {
        let start = self.start();

        if self.eat("¬") {
            let child = self.nested(|parser| parser.unary_predicate())?;
            return self.build(self.factory.make_not(child, self.location(start)), start);
        }

        if let Some(op) = self.lookup(QUANTIFIERS) {
            self.advance();
            let decls = self.declarations()?;
            self.expect("·")?;
            let body = self.scoped(&names(&decls), |parser| parser.predicate())?;

            return self.build(
                self.factory
                    .make_quantified_predicate(op, decls, body, self.location(start)),
                start,
            );
        }

        self.simple_predicate()
    }

    fn simple_predicate(&mut self) -> PResult<Predicate> {
        let start = self.start();

        match self.peek().clone() {
            Token::Symbol("⊤") => {
                self.advance();
                Ok(self.factory.make_literal_predicate(LiteralOp::True, self.location(start)))
            }
            Token::Symbol("⊥") => {
                self.advance();
                Ok(self.factory.make_literal_predicate(LiteralOp::False, self.location(start)))
            }
            Token::PredicateVariable(name) => {
                self.advance();
                self.build(self.factory.make_predicate_variable(&name, self.location(start)), start)
            }
            Token::Symbol("finite") => {
                self.advance();
                self.expect("(")?;
                let child = self.expression()?;
                self.expect(")")?;
                self.build(self.factory.make_finite(child, self.location(start)), start)
            }
            Token::Symbol("partition") => {
                self.advance();
                self.expect("(")?;
                let children = self.expressions()?;
                self.expect(")")?;
                self.build(self.factory.make_partition(children, self.location(start)), start)
            }
            Token::Symbol("(") => {
                let mark = self.mark();
                if !self.failed_parens.contains(&mark.pos) {
                    match self.parenthesized_predicate() {
                        Ok(pred) => return Ok(pred),
                        Err(_) => {
                            self.reset(mark);
                            self.failed_parens.insert(mark.pos);
                        }
                    }
                }

                self.relational_predicate()
            }
            _ => self.relational_predicate(),
        }
    }

    fn parenthesized_predicate(&mut self) -> PResult<Predicate> {
        self.expect("(")?;
        let pred = self.predicate()?;
        self.expect(")")?;
        Ok(pred)
    }

    fn relational_predicate(&mut self) -> PResult<Predicate> {
        let start = self.start();
        let left = self.expression()?;

        let op = self
            .lookup(RELATIONS)
            .ok_or_else(|| self.error(format!("expected a relational operator, found {}", self.peek())))?;
        self.advance();
        let right = self.expression()?;

        let pred = self.build(
            self.factory
                .make_relational_predicate(op, left, right, self.location(start)),
            start,
        )?;

        if self.lookup(RELATIONS).is_some() {
            return Err(self.error(format!("{} cannot follow {} without parentheses", self.peek(), op.glyph())));
        }

        Ok(pred)
    }
}
