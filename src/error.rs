use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::location::SourceLocation;

/// Error produced by misuse of the formula construction and manipulation API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("{operator} expects {expected} operand(s), got {actual}")]
    InvalidArity {
        operator: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("operand of {operator} has incompatible type {found}")]
    IllegalTag { operator: &'static str, found: String },

    #[error("formula components were built by different factories")]
    FactoryMismatch,

    #[error("formula must be type-checked")]
    NotTypeChecked,

    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl FormulaError {
    pub(crate) fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }
}

/// Error produced while navigating positions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("the root position has no parent")]
    RootHasNoParent,

    #[error("the root position has no sibling")]
    RootHasNoSibling,

    #[error("position {0} is a first child and has no previous sibling")]
    NoPreviousSibling(String),

    #[error("malformed position {0:?}")]
    Malformed(String),
}

/// Error produced by a rejected specialization.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpecializationError {
    #[error("{0} is not a given type")]
    NotAGivenType(String),

    #[error("{0} is not a typed free identifier")]
    NotAnIdentifier(String),

    #[error("{0} is not a predicate variable")]
    NotAPredicateVariable(String),

    #[error("{0} has already been specialized and is frozen")]
    Frozen(String),

    #[error("{name} is already substituted with {existing}")]
    Conflict { name: String, existing: String },

    #[error("replacement for {name} has type {found} instead of {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("name {0} would denote two different things after specialization")]
    NameCollision(String),

    #[error("substituting {0} introduces a cycle between given types")]
    Cycle(String),

    #[error("replacement for {0} does not denote a type")]
    NotAType(String),

    #[error("replacement for {0} belongs to another factory")]
    FactoryMismatch(String),

    #[error("only type-checked formulas can be specialized")]
    NotTypeChecked,

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Kind of problem reported by the parser and the type checker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    LexicalError,
    SyntaxError,
    DuplicateIdentifier,
    InvalidTypeExpression,
    TypeError,
    TypeUnknown,
    IllFormed,
}

impl Display for ProblemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProblemKind::LexicalError => "lexical error",
            ProblemKind::SyntaxError => "syntax error",
            ProblemKind::DuplicateIdentifier => "duplicate identifier",
            ProblemKind::InvalidTypeExpression => "invalid type expression",
            ProblemKind::TypeError => "type error",
            ProblemKind::TypeUnknown => "type unknown",
            ProblemKind::IllFormed => "ill-formed formula",
        };

        f.write_str(name)
    }
}

/// A problem reported against a range of the input, or against a sub-formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Problem {
    kind: ProblemKind,
    location: Option<SourceLocation>,
    message: String,
}

impl Problem {
    pub fn new(kind: ProblemKind, location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Problem {
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}: {}", self.kind, location, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Problem {}
