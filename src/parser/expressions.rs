use crate::binding::bind_names;
use crate::error::{Problem, ProblemKind};
use crate::expressions::{BoundIdentDecl, Expression};
use crate::formula::Formula;
use crate::lexer::Token;
use crate::location::SourceLocation;
use crate::operators::{
    set_operators_compatible, AssociativeOp, AtomicOp, BinaryOp, QuantifiedForm, QuantifierOp, Tag, UnaryOp,
};

use super::common::{first_occurrences, PResult, Parser};

const RELATION_SETS: &[(&str, BinaryOp)] = &[
    ("↔", BinaryOp::Rel),
    ("\u{e100}", BinaryOp::TotalRel),
    ("\u{e101}", BinaryOp::SurjRel),
    ("\u{e102}", BinaryOp::TotalSurjRel),
    ("⇸", BinaryOp::PartialFun),
    ("→", BinaryOp::TotalFun),
    ("⤔", BinaryOp::PartialInj),
    ("↣", BinaryOp::TotalInj),
    ("⤀", BinaryOp::PartialSurj),
    ("↠", BinaryOp::TotalSurj),
    ("⤖", BinaryOp::TotalBij),
];

const SET_OPERATORS: &[(&str, Tag)] = &[
    ("∖", Tag::Binary(BinaryOp::SetMinus)),
    ("×", Tag::Binary(BinaryOp::Cprod)),
    ("⊗", Tag::Binary(BinaryOp::Dprod)),
    ("∥", Tag::Binary(BinaryOp::Pprod)),
    ("◁", Tag::Binary(BinaryOp::DomRes)),
    ("⩤", Tag::Binary(BinaryOp::DomSub)),
    ("▷", Tag::Binary(BinaryOp::RanRes)),
    ("⩥", Tag::Binary(BinaryOp::RanSub)),
    ("∪", Tag::Associative(AssociativeOp::BUnion)),
    ("∩", Tag::Associative(AssociativeOp::BInter)),
    ("∘", Tag::Associative(AssociativeOp::BComp)),
    (";", Tag::Associative(AssociativeOp::FComp)),
    ("\u{e103}", Tag::Associative(AssociativeOp::Ovr)),
];

const DIVISIONS: &[(&str, BinaryOp)] = &[("÷", BinaryOp::Div), ("mod", BinaryOp::Mod)];

const PREFIX_OPERATORS: &[(&str, UnaryOp)] = &[
    ("card", UnaryOp::Card),
    ("ℙ", UnaryOp::Pow),
    ("ℙ1", UnaryOp::Pow1),
    ("union", UnaryOp::Union),
    ("inter", UnaryOp::Inter),
    ("dom", UnaryOp::Dom),
    ("ran", UnaryOp::Ran),
    ("min", UnaryOp::Min),
    ("max", UnaryOp::Max),
];

pub(super) const ATOMS: &[(&str, AtomicOp)] = &[
    ("ℤ", AtomicOp::Integer),
    ("ℕ", AtomicOp::Natural),
    ("ℕ1", AtomicOp::Natural1),
    ("BOOL", AtomicOp::Bool),
    ("TRUE", AtomicOp::True),
    ("FALSE", AtomicOp::False),
    ("∅", AtomicOp::EmptySet),
    ("pred", AtomicOp::Pred),
    ("succ", AtomicOp::Succ),
    ("prj1", AtomicOp::Prj1),
    ("prj2", AtomicOp::Prj2),
    ("id", AtomicOp::Id),
];

/// Symbols binding tighter than a leading minus sign.
const TIGHTER_THAN_MINUS: &[&str] = &["∗", "÷", "mod", "^", "(", "[", "∼"];

/// Maplet pattern of a lambda, leaves numbered in declaration order.
enum Pattern {
    Leaf(usize, Option<SourceLocation>),
    Pair(Box<Pattern>, Box<Pattern>, Option<SourceLocation>),
}

impl Parser<'_> {
    /// Expression, `↦` binding loosest.
    pub(super) fn expression(&mut self) -> PResult<Expression> {
        self.nested(|parser| parser.maplets())
    }

    fn maplets(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut left = self.relation_group()?;

        while self.eat("↦") {
            let right = self.relation_group()?;
            left = self.build(
                self.factory
                    .make_binary_expression(BinaryOp::Mapsto, left, right, self.location(start)),
                start,
            )?;
        }

        Ok(left)
    }

    pub(super) fn expressions(&mut self) -> PResult<Vec<Expression>> {
        let mut exprs = vec![self.expression()?];
        while self.eat(",") {
            exprs.push(self.expression()?);
        }

        Ok(exprs)
    }

    pub(super) fn relation_group(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut left = self.set_group()?;

        while let Some(op) = self.lookup(RELATION_SETS) {
            self.advance();
            let right = self.set_group()?;
            left = self.build(
                self.factory.make_binary_expression(op, left, right, self.location(start)),
                start,
            )?;
        }

        Ok(left)
    }

    /// Set operators, where only some operators may follow each other without parentheses.
    fn set_group(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut operands = vec![self.interval()?];
        let mut previous: Option<Tag> = None;

        while let Some(tag) = self.lookup(SET_OPERATORS) {
            if let Some(previous) = previous {
                if !set_operators_compatible(previous, tag) {
                    return Err(self.error(format!(
                        "{} cannot follow {} without parentheses",
                        self.peek(),
                        previous
                    )));
                }
            }

            let extends = matches!(tag, Tag::Associative(_)) && previous == Some(tag);
            if !extends {
                let left = self.fold_set_operands(previous, operands, start)?;
                operands = vec![left];
            }

            self.advance();
            let right = self.interval()?;

            match tag {
                Tag::Binary(op) => {
                    let left = self.fold_set_operands(None, operands, start)?;
                    let binary = self.factory.make_binary_expression(op, left, right, self.location(start));
                    operands = vec![self.build(binary, start)?];
                }
                _ => operands.push(right),
            }

            previous = Some(tag);
        }

        self.fold_set_operands(previous, operands, start)
    }

    fn fold_set_operands(&self, tag: Option<Tag>, mut operands: Vec<Expression>, start: usize) -> PResult<Expression> {
        match tag {
            Some(Tag::Associative(op)) if operands.len() > 1 => self.build(
                self.factory
                    .make_associative_expression(op, operands, self.location(start)),
                start,
            ),
            _ => operands.pop().ok_or_else(|| self.error("missing operand")),
        }
    }

    fn interval(&mut self) -> PResult<Expression> {
        let start = self.start();
        let left = self.arithmetic()?;

        if !self.eat("‥") {
            return Ok(left);
        }

        let right = self.arithmetic()?;
        self.build(
            self.factory
                .make_binary_expression(BinaryOp::UpTo, left, right, self.location(start)),
            start,
        )
    }

    /// Sums and differences: `+` extends one n-ary node, `−` closes it into a binary node.
    fn arithmetic(&mut self) -> PResult<Expression> {
        let start = self.start();
        let first = if self.is("−") { self.negation()? } else { self.term()? };
        let mut sum = vec![first];

        loop {
            if self.eat("+") {
                sum.push(self.term()?);
            } else if self.is("−") {
                let left = self.fold_sum(sum, start)?;
                self.advance();
                let right = self.term()?;
                let minus = self
                    .factory
                    .make_binary_expression(BinaryOp::Minus, left, right, self.location(start));
                sum = vec![self.build(minus, start)?];
            } else {
                return self.fold_sum(sum, start);
            }
        }
    }

    fn fold_sum(&self, mut sum: Vec<Expression>, start: usize) -> PResult<Expression> {
        if sum.len() > 1 {
            self.build(
                self.factory
                    .make_associative_expression(AssociativeOp::Plus, sum, self.location(start)),
                start,
            )
        } else {
            sum.pop().ok_or_else(|| self.error("missing operand"))
        }
    }

    /// A leading minus: a negative literal, or the opposite of a term.
    fn negation(&mut self) -> PResult<Expression> {
        let start = self.start();
        self.advance();

        if let Token::Integer(value) = self.peek() {
            let tighter = matches!(self.peek_at(1), Token::Symbol(symbol) if TIGHTER_THAN_MINUS.contains(symbol));
            if !tighter {
                let value = -value.clone();
                self.advance();
                return Ok(self.factory.make_integer_literal(value, self.location(start)));
            }
        }

        let child = self.term()?;
        self.build(
            self.factory
                .make_unary_expression(UnaryOp::UnMinus, child, self.location(start)),
            start,
        )
    }

    /// Products, optionally followed by one division or modulo.
    fn term(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut factors = vec![self.factor()?];

        while self.eat("∗") {
            factors.push(self.factor()?);
        }

        let mut left = if factors.len() > 1 {
            self.build(
                self.factory
                    .make_associative_expression(AssociativeOp::Mul, factors, self.location(start)),
                start,
            )?
        } else {
            factors.pop().ok_or_else(|| self.error("missing operand"))?
        };

        if let Some(op) = self.lookup(DIVISIONS) {
            self.advance();
            let right = self.factor()?;
            left = self.build(
                self.factory.make_binary_expression(op, left, right, self.location(start)),
                start,
            )?;

            if self.is("∗") || self.lookup(DIVISIONS).is_some() {
                return Err(self.error(format!("{} cannot follow {} without parentheses", self.peek(), op.glyph())));
            }
        }

        Ok(left)
    }

    fn factor(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut left = self.postfix()?;

        while self.eat("^") {
            let right = self.postfix()?;
            left = self.build(
                self.factory
                    .make_binary_expression(BinaryOp::Expn, left, right, self.location(start)),
                start,
            )?;
        }

        Ok(left)
    }

    /// Function application, relational image and converse, left to right.
    fn postfix(&mut self) -> PResult<Expression> {
        let start = self.start();
        let mut expr = self.atom()?;

        loop {
            let built = if self.eat("(") {
                let arg = self.expression()?;
                self.expect(")")?;
                self.factory
                    .make_binary_expression(BinaryOp::FunImage, expr, arg, self.location(start))
            } else if self.eat("[") {
                let arg = self.expression()?;
                self.expect("]")?;
                self.factory
                    .make_binary_expression(BinaryOp::RelImage, expr, arg, self.location(start))
            } else if self.eat("∼") {
                self.factory
                    .make_unary_expression(UnaryOp::Converse, expr, self.location(start))
            } else {
                return Ok(expr);
            };

            expr = self.build(built, start)?;
        }
    }

    fn atom(&mut self) -> PResult<Expression> {
        let start = self.start();

        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                self.identifier(&name, start)
            }
            Token::Integer(value) => {
                self.advance();
                Ok(self.factory.make_integer_literal(value, self.location(start)))
            }
            Token::Symbol("(") => self.parenthesized_expression(),
            Token::Symbol("{") => self.braces(),
            Token::Symbol("⋃") => self.quantified_set(QuantifierOp::QUnion),
            Token::Symbol("⋂") => self.quantified_set(QuantifierOp::QInter),
            Token::Symbol("λ") => self.lambda(),
            Token::Symbol("bool") => {
                self.advance();
                self.expect("(")?;
                let predicate = self.predicate()?;
                self.expect(")")?;
                self.build(self.factory.make_bool_expression(predicate, self.location(start)), start)
            }
            Token::Symbol(_) => {
                if let Some(op) = self.lookup(ATOMS) {
                    self.advance();
                    return self.build(self.factory.make_atomic_expression(op, self.location(start), None), start);
                }

                let op = self.lookup(PREFIX_OPERATORS).ok_or_else(|| self.unexpected())?;
                self.advance();
                self.expect("(")?;
                let child = self.expression()?;
                self.expect(")")?;
                self.build(self.factory.make_unary_expression(op, child, self.location(start)), start)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn identifier(&mut self, name: &str, start: usize) -> PResult<Expression> {
        if let Some(extension) = self.factory.extension(name).cloned() {
            if self.eat("(") {
                let args = self.expressions()?;
                self.expect(")")?;
                return self.build(
                    self.factory
                        .make_extended_expression(&extension, args, self.location(start)),
                    start,
                );
            }
        }

        let result = match self.bound_index(name) {
            Some(index) => self.factory.make_bound_identifier(index, self.location(start), None),
            None => self.factory.make_free_identifier(name, self.location(start), None),
        };
        self.build(result, start)
    }

    /// `(E)`, or an atom annotated with its type such as `(∅⦂ℙ(S))`.
    fn parenthesized_expression(&mut self) -> PResult<Expression> {
        let start = self.start();
        let generic = matches!(self.peek_at(1), Token::Symbol("∅" | "id" | "prj1" | "prj2")) && self.is_at(2, "⦂");
        let empty = self.is_at(1, "{") && self.is_at(2, "}") && self.is_at(3, "⦂");
        self.advance();

        if generic || empty {
            return self.typed_atom(start);
        }

        let expr = self.expression()?;
        self.expect(")")?;
        Ok(expr)
    }

    fn typed_atom(&mut self, start: usize) -> PResult<Expression> {
        let atom = if self.eat("{") {
            self.expect("}")?;
            None
        } else {
            let op = self.lookup(ATOMS).ok_or_else(|| self.unexpected())?;
            self.advance();
            Some(op)
        };

        self.expect("⦂")?;
        let ty = self.type_annotation()?;
        self.expect(")")?;

        let location = self.location(start);
        let result = match atom {
            Some(op) => self.factory.make_atomic_expression(op, location.clone(), Some(ty)),
            None => self.factory.make_set_extension(Vec::new(), location.clone(), Some(ty)),
        };
        result.map_err(|error| Problem::new(ProblemKind::InvalidTypeExpression, location, error.to_string()))
    }

    /// Whether a list of declarations followed by `·` or a type annotation starts here.
    pub(super) fn at_declarations(&self) -> bool {
        let mut ahead = 0;

        loop {
            if !matches!(self.peek_at(ahead), Token::Identifier(_)) {
                return false;
            }

            match self.peek_at(ahead + 1) {
                Token::Symbol("⦂" | "·") => return true,
                Token::Symbol(",") => ahead += 2,
                _ => return false,
            }
        }
    }

    /// Comma separated declarations, each with an optional type.
    pub(super) fn declarations(&mut self) -> PResult<Vec<BoundIdentDecl>> {
        let mut decls: Vec<BoundIdentDecl> = Vec::new();

        loop {
            let start = self.start();
            let name = self.identifier_name()?;
            let location = self.location(start);

            if decls.iter().any(|decl| decl.name() == name) {
                return Err(Problem::new(
                    ProblemKind::DuplicateIdentifier,
                    location,
                    format!("{} is declared twice", name),
                ));
            }

            let ty = if self.eat("⦂") { Some(self.type_expression()?) } else { None };
            decls.push(self.build(self.factory.make_bound_ident_decl(&name, location, ty), start)?);

            if !self.eat(",") {
                return Ok(decls);
            }
        }
    }

    /// `{}`, `{x·P∣E}`, `{E∣P}` or `{E, ...}`.
    fn braces(&mut self) -> PResult<Expression> {
        let start = self.start();
        self.advance();

        if self.eat("}") {
            return self.build(self.factory.make_set_extension(Vec::new(), self.location(start), None), start);
        }

        if self.at_declarations() {
            let decls = self.declarations()?;
            self.expect("·")?;
            let (predicate, expression) = self.scoped(&names(&decls), |parser| {
                let predicate = parser.predicate()?;
                parser.expect("∣")?;
                Ok((predicate, parser.expression()?))
            })?;
            self.expect("}")?;

            return self.build(
                self.factory.make_quantified_expression(
                    QuantifierOp::Cset,
                    decls,
                    predicate,
                    expression,
                    QuantifiedForm::Explicit,
                    self.location(start),
                ),
                start,
            );
        }

        let first = self.expression()?;
        if self.eat("∣") {
            return self.implicit_comprehension(QuantifierOp::Cset, first, start);
        }

        let mut members = vec![first];
        while self.eat(",") {
            members.push(self.expression()?);
        }
        self.expect("}")?;

        self.build(self.factory.make_set_extension(members, self.location(start), None), start)
    }

    /// `⋃x·P∣E` or `⋃E∣P`, and likewise for `⋂`.
    fn quantified_set(&mut self, op: QuantifierOp) -> PResult<Expression> {
        let start = self.start();
        self.advance();

        if !self.at_declarations() {
            let expression = self.expression()?;
            self.expect("∣")?;
            return self.implicit_comprehension(op, expression, start);
        }

        let decls = self.declarations()?;
        self.expect("·")?;
        let (predicate, expression) = self.scoped(&names(&decls), |parser| {
            let predicate = parser.predicate()?;
            parser.expect("∣")?;
            Ok((predicate, parser.expression()?))
        })?;

        self.build(
            self.factory.make_quantified_expression(
                op,
                decls,
                predicate,
                expression,
                QuantifiedForm::Explicit,
                self.location(start),
            ),
            start,
        )
    }

    /// Rest of `{E∣P}` or `⋃E∣P` after the bar: the free identifiers of `E` are bound.
    fn implicit_comprehension(&mut self, op: QuantifierOp, expression: Expression, start: usize) -> PResult<Expression> {
        let occurrences = first_occurrences(&expression);
        if occurrences.is_empty() {
            return Err(self.problem(ProblemKind::SyntaxError, start, "the expression binds no identifier"));
        }

        let decls = occurrences
            .iter()
            .map(|(name, location)| self.build(self.factory.make_bound_ident_decl(name, location.clone(), None), start))
            .collect::<PResult<Vec<_>>>()?;
        let bound_names = names(&decls);

        let predicate = self.scoped(&bound_names, |parser| parser.predicate())?;
        if op == QuantifierOp::Cset {
            self.expect("}")?;
        }

        let bound = self.build(bind_names(&Formula::from(expression), &bound_names, self.factory), start)?;
        let expression = bound.as_expression().cloned().ok_or_else(|| self.error("invalid comprehension"))?;

        self.build(
            self.factory.make_quantified_expression(
                op,
                decls,
                predicate,
                expression,
                QuantifiedForm::Implicit,
                self.location(start),
            ),
            start,
        )
    }

    /// `λp·P∣E` where the pattern `p` is a maplet tree of distinct identifiers.
    fn lambda(&mut self) -> PResult<Expression> {
        let start = self.start();
        self.advance();

        let mut leaves = Vec::new();
        let pattern = self.pattern(&mut leaves)?;
        self.expect("·")?;

        let decls = leaves
            .iter()
            .map(|(name, location)| self.build(self.factory.make_bound_ident_decl(name, location.clone(), None), start))
            .collect::<PResult<Vec<_>>>()?;

        let (predicate, body) = self.scoped(&names(&decls), |parser| {
            let predicate = parser.predicate()?;
            parser.expect("∣")?;
            Ok((predicate, parser.expression()?))
        })?;

        let maplet = self.pattern_expression(&pattern, decls.len(), start)?;
        let expression = self.build(
            self.factory.make_binary_expression(BinaryOp::Mapsto, maplet, body, None),
            start,
        )?;

        self.build(
            self.factory.make_quantified_expression(
                QuantifierOp::Cset,
                decls,
                predicate,
                expression,
                QuantifiedForm::Lambda,
                self.location(start),
            ),
            start,
        )
    }

    fn pattern(&mut self, leaves: &mut Vec<(String, Option<SourceLocation>)>) -> PResult<Pattern> {
        let start = self.start();
        let mut left = self.pattern_atom(leaves)?;

        while self.eat("↦") {
            let right = self.pattern_atom(leaves)?;
            left = Pattern::Pair(Box::new(left), Box::new(right), self.location(start));
        }

        Ok(left)
    }

    fn pattern_atom(&mut self, leaves: &mut Vec<(String, Option<SourceLocation>)>) -> PResult<Pattern> {
        if self.eat("(") {
            let pattern = self.nested(|parser| parser.pattern(leaves))?;
            self.expect(")")?;
            return Ok(pattern);
        }

        let start = self.start();
        let name = self.identifier_name()?;
        let location = self.location(start);

        if leaves.iter().any(|(seen, _)| *seen == name) {
            return Err(Problem::new(
                ProblemKind::DuplicateIdentifier,
                location,
                format!("{} is declared twice", name),
            ));
        }

        leaves.push((name, location.clone()));
        Ok(Pattern::Leaf(leaves.len() - 1, location))
    }

    fn pattern_expression(&self, pattern: &Pattern, count: usize, start: usize) -> PResult<Expression> {
        match pattern {
            Pattern::Leaf(position, location) => self.build(
                self.factory
                    .make_bound_identifier(count - 1 - position, location.clone(), None),
                start,
            ),
            Pattern::Pair(left, right, location) => {
                let left = self.pattern_expression(left, count, start)?;
                let right = self.pattern_expression(right, count, start)?;
                self.build(
                    self.factory
                        .make_binary_expression(BinaryOp::Mapsto, left, right, location.clone()),
                    start,
                )
            }
        }
    }
}

pub(super) fn names(decls: &[BoundIdentDecl]) -> Vec<String> {
    decls.iter().map(|decl| decl.name().to_string()).collect()
}
