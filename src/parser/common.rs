use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{FormulaError, Problem, ProblemKind};
use crate::expressions::{Expression, ExpressionKind};
use crate::factory::FormulaFactory;
use crate::formula::Formula;
use crate::lexer::{tokenize, Lexeme, Token};
use crate::location::SourceLocation;

pub(super) type PResult<T> = Result<T, Problem>;

/// Deepest nesting of parentheses, quantifiers and negations accepted in one formula.
pub(super) const MAX_NESTING: usize = 1000;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH_SIZE: usize = 1024 * 1024;

static END_OF_INPUT: Lexeme = Lexeme {
    token: Token::End,
    start: 0,
    end: 0,
};

/// Recursive-descent parser over the lexemes of one text.
pub(super) struct Parser<'f> {
    pub(super) factory: &'f FormulaFactory,
    lexemes: Vec<Lexeme>,
    pos: usize,
    origin: Option<Arc<str>>,
    /// Names of the enclosing bound declarations, the innermost last.
    pub(super) scope: Vec<String>,
    /// Positions of `(` known not to open a parenthesized predicate.
    pub(super) failed_parens: HashSet<usize>,
    nesting: usize,
}

/// Saved parser state for backtracking.
#[derive(Clone, Copy)]
pub(super) struct Mark {
    pub(super) pos: usize,
    scope: usize,
}

impl<'f> Parser<'f> {
    pub(super) fn new(factory: &'f FormulaFactory, text: &str, origin: Option<&str>) -> PResult<Self> {
        let origin: Option<Arc<str>> = origin.map(Arc::from);
        let lexemes = tokenize(text, origin.as_ref())?;

        Ok(Parser {
            factory,
            lexemes,
            pos: 0,
            origin,
            scope: Vec::new(),
            failed_parens: HashSet::new(),
            nesting: 0,
        })
    }

    pub(super) fn lexeme(&self, ahead: usize) -> &Lexeme {
        self.lexemes
            .get(self.pos + ahead)
            .or_else(|| self.lexemes.last())
            .unwrap_or(&END_OF_INPUT)
    }

    pub(super) fn peek(&self) -> &Token {
        &self.lexeme(0).token
    }

    pub(super) fn peek_at(&self, ahead: usize) -> &Token {
        &self.lexeme(ahead).token
    }

    pub(super) fn is(&self, symbol: &str) -> bool {
        self.is_at(0, symbol)
    }

    pub(super) fn is_at(&self, ahead: usize, symbol: &str) -> bool {
        matches!(self.peek_at(ahead), Token::Symbol(found) if *found == symbol)
    }

    /// Operator of `table` denoted by the current token.
    pub(super) fn lookup<T: Copy>(&self, table: &[(&str, T)]) -> Option<T> {
        match self.peek() {
            Token::Symbol(found) => table.iter().find(|(symbol, _)| symbol == found).map(|(_, op)| *op),
            _ => None,
        }
    }

    pub(super) fn advance(&mut self) {
        if self.pos + 1 < self.lexemes.len() {
            self.pos += 1;
        }
    }

    pub(super) fn eat(&mut self, symbol: &str) -> bool {
        let found = self.is(symbol);
        if found {
            self.advance();
        }
        found
    }

    pub(super) fn expect(&mut self, symbol: &str) -> PResult<()> {
        if self.eat(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", symbol, self.peek())))
        }
    }

    pub(super) fn expect_end(&self) -> PResult<()> {
        match self.peek() {
            Token::End => Ok(()),
            found => Err(self.error(format!("unexpected {} after the end of the formula", found))),
        }
    }

    pub(super) fn identifier_name(&mut self) -> PResult<String> {
        match self.peek() {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            found => Err(self.error(format!("expected an identifier, found {}", found))),
        }
    }

    pub(super) fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            scope: self.scope.len(),
        }
    }

    pub(super) fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.scope.truncate(mark.scope);
    }

    /// Offset where the current token starts.
    pub(super) fn start(&self) -> usize {
        self.lexeme(0).start
    }

    /// Location from `start` to the end of the last consumed token.
    pub(super) fn location(&self, start: usize) -> Option<SourceLocation> {
        let end = self
            .pos
            .checked_sub(1)
            .and_then(|previous| self.lexemes.get(previous))
            .map_or(start, |lexeme| lexeme.end);

        Some(SourceLocation::with_origin(start, end.max(start), self.origin.clone()))
    }

    pub(super) fn problem(&self, kind: ProblemKind, start: usize, message: impl Into<String>) -> Problem {
        Problem::new(kind, self.location(start), message)
    }

    /// Syntax error located at the current token.
    pub(super) fn error(&self, message: impl Into<String>) -> Problem {
        let lexeme = self.lexeme(0);
        let location = SourceLocation::with_origin(lexeme.start, lexeme.end, self.origin.clone());
        Problem::new(ProblemKind::SyntaxError, Some(location), message)
    }

    pub(super) fn unexpected(&self) -> Problem {
        self.error(format!("unexpected {}", self.peek()))
    }

    /// Report a node the factory refused to build as a syntax error over its text.
    pub(super) fn build<T>(&self, result: Result<T, FormulaError>, start: usize) -> PResult<T> {
        result.map_err(|error| self.problem(ProblemKind::SyntaxError, start, error.to_string()))
    }

    /// Run `rule` with `names` declared, the last one innermost.
    pub(super) fn scoped<T, F>(&mut self, names: &[String], rule: F) -> PResult<T>
    where
        F: FnOnce(&mut Self) -> PResult<T>,
    {
        let depth = self.scope.len();
        self.scope.extend(names.iter().cloned());
        let result = rule(self);
        self.scope.truncate(depth);
        result
    }

    /// Run `rule` one nesting level deeper, growing the stack when it runs low.
    pub(super) fn nested<T, F>(&mut self, rule: F) -> PResult<T>
    where
        F: FnOnce(&mut Self) -> PResult<T>,
    {
        if self.nesting >= MAX_NESTING {
            return Err(self.error(format!("formula nested deeper than {} levels", MAX_NESTING)));
        }

        self.nesting += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH_SIZE, || rule(self));
        self.nesting -= 1;
        result
    }

    /// De Bruijn index of a declared name.
    pub(super) fn bound_index(&self, name: &str) -> Option<usize> {
        self.scope.iter().rev().position(|bound| bound == name)
    }
}

/// Names of the free identifiers of `expr` in order of first occurrence, with their location.
pub(super) fn first_occurrences(expr: &Expression) -> Vec<(String, Option<SourceLocation>)> {
    fn visit(formula: &Formula, found: &mut Vec<(String, Option<SourceLocation>)>) {
        if let Formula::Expression(expr) = formula {
            if let ExpressionKind::FreeIdentifier(name) = expr.kind() {
                if !found.iter().any(|(seen, _)| seen == name) {
                    found.push((name.clone(), expr.location().cloned()));
                }
                return;
            }
        }

        for child in formula.children() {
            visit(&child, found);
        }
    }

    let mut found = Vec::new();
    visit(&Formula::from(expr.clone()), &mut found);
    found
}
