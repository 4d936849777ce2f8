#![deny(clippy::all)]

//! Parser, type checker and tree algebra for the Event-B mathematical language.
//!
//! Formulas are built by a [`FormulaFactory`], either directly or by parsing text, and are
//! immutable. Bound identifiers are de Bruijn indices. A formula is type-checked against a
//! [`TypeEnvironment`] giving the types of its free identifiers.

mod binding;
mod derived;
mod printer;

pub mod environment;
pub mod error;
pub mod expressions;
pub mod factory;
pub mod formula;
#[cfg(feature = "parser")]
mod lexer;
pub mod location;
pub mod operators;
#[cfg(feature = "parser")]
pub mod parser;
pub mod position;
pub mod specialization;
pub mod typecheck;
pub mod types;

pub use crate::environment::TypeEnvironment;
pub use crate::error::{FormulaError, PositionError, Problem, ProblemKind, SpecializationError};
pub use crate::expressions::{Assignment, BoundIdentDecl, Expression, Predicate};
pub use crate::factory::FormulaFactory;
pub use crate::formula::Formula;
pub use crate::location::SourceLocation;
#[cfg(feature = "parser")]
pub use crate::parser::ParseResult;
pub use crate::position::Position;
pub use crate::specialization::Specialization;
pub use crate::typecheck::TypeCheckResult;
pub use crate::types::{Extension, Type};
