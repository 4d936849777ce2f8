//! Type checking of formulas.
//!
//! Type checking infers a type term for every node by unification, then rebuilds the formula
//! with the inferred types of its leaves so that the factory synthesizes the type of every
//! other node. Free identifiers missing from the initial environment get their type from the
//! context they are used in and are reported in the inferred environment.

mod infer;
mod unify;

use std::slice;

use nonempty::NonEmpty;
use tracing::debug;

use crate::environment::TypeEnvironment;
use crate::error::{FormulaError, Problem, ProblemKind};
use crate::expressions::{Assignment, Expression, ExpressionKind, Predicate};
use crate::factory::FormulaFactory;
use crate::formula::{rewrite, Formula, Rewriter};
use crate::types::Type;

use infer::Inference;

/// Outcome of type checking: the type-checked formula or the problems found, along with the
/// types inferred for identifiers that were not in the initial environment.
#[derive(Clone, Debug)]
pub struct TypeCheckResult<T> {
    result: Result<T, NonEmpty<Problem>>,
    inferred: TypeEnvironment,
}

impl<T> TypeCheckResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn has_problem(&self) -> bool {
        self.result.is_err()
    }

    pub fn problems(&self) -> impl Iterator<Item = &Problem> {
        self.result.as_ref().err().into_iter().flat_map(|problems| problems.iter())
    }

    pub fn checked(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// Identifiers typed by this check, empty when it failed.
    pub fn inferred_environment(&self) -> &TypeEnvironment {
        &self.inferred
    }

    pub fn into_result(self) -> Result<T, NonEmpty<Problem>> {
        self.result
    }

    fn narrow<U, F>(self, category: F) -> TypeCheckResult<U>
    where
        T: Into<Formula>,
        F: FnOnce(Formula) -> Option<U>,
    {
        let result = self.result.and_then(|checked| {
            category(checked.into()).ok_or_else(|| {
                NonEmpty::new(Problem::new(
                    ProblemKind::TypeError,
                    None,
                    "type checking changed the category of the formula",
                ))
            })
        });

        TypeCheckResult {
            result,
            inferred: self.inferred,
        }
    }
}

/// Gives the inferred types to the leaves of a formula.
struct Typer<'a> {
    factory: &'a FormulaFactory,
    slots: std::vec::IntoIter<Type>,
    idents: &'a TypeEnvironment,
}

impl Typer<'_> {
    fn next(&mut self) -> Result<Type, FormulaError> {
        self.slots
            .next()
            .ok_or_else(|| FormulaError::IllegalState("more typed leaves than inferred types".to_string()))
    }
}

impl Rewriter for Typer<'_> {
    type Error = FormulaError;

    fn factory(&self) -> &FormulaFactory {
        self.factory
    }

    fn rewrite(&mut self, formula: &Formula, _depth: usize) -> Result<Option<Formula>, FormulaError> {
        let typed = match formula {
            Formula::BoundIdentDecl(decl) => self
                .factory
                .make_bound_ident_decl(decl.name(), decl.location().cloned(), Some(self.next()?))?
                .into(),
            Formula::Expression(expr) => {
                let location = expr.location().cloned();
                match expr.kind() {
                    ExpressionKind::FreeIdentifier(name) => {
                        let ty = self.idents.get(name).cloned().ok_or_else(|| {
                            FormulaError::IllegalState(format!("no inferred type for {}", name))
                        })?;
                        self.factory.make_free_identifier(name, location, Some(ty))?
                    }
                    ExpressionKind::BoundIdentifier(index) => {
                        self.factory.make_bound_identifier(*index, location, Some(self.next()?))?
                    }
                    ExpressionKind::Atomic(op) if op.is_generic() => {
                        self.factory.make_atomic_expression(*op, location, Some(self.next()?))?
                    }
                    ExpressionKind::SetExtension(members) if members.is_empty() => {
                        self.factory.make_set_extension(Vec::new(), location, Some(self.next()?))?
                    }
                    _ => return Ok(None),
                }
                .into()
            }
            Formula::Predicate(_) | Formula::Assignment(_) => return Ok(None),
        };

        Ok(Some(typed))
    }
}

fn problem(kind: ProblemKind, formula: &Formula, message: impl Into<String>) -> NonEmpty<Problem> {
    NonEmpty::new(Problem::new(kind, formula.location().cloned(), message))
}

fn check(formula: &Formula, env: &TypeEnvironment, expected: Option<&Type>) -> Result<(Formula, TypeEnvironment), NonEmpty<Problem>> {
    let factory = env.factory();

    let same_factory = expected.map_or(true, |ty| ty.factory_id() == factory.id());
    if formula.factory_id() != factory.id() || !same_factory {
        return Err(problem(
            ProblemKind::TypeError,
            formula,
            FormulaError::FactoryMismatch.to_string(),
        ));
    }

    if !formula.is_well_formed() {
        return Err(problem(
            ProblemKind::IllFormed,
            formula,
            format!("{} refers to undeclared bound identifiers", formula),
        ));
    }

    let mut inference = Inference::new(env);
    match formula {
        Formula::Expression(expr) => {
            let actual = inference.expression(expr);
            if let Some(ty) = expected {
                let expected = inference.annotation(ty, None);
                inference.expect(&actual, &expected, expr.location(), expr);
            }
        }
        Formula::Predicate(pred) => inference.predicate(pred),
        Formula::Assignment(assignment) => inference.assignment(assignment),
        Formula::BoundIdentDecl(decl) => inference.declare(slice::from_ref(decl)),
    }

    if let Some(problems) = NonEmpty::from_vec(inference.problems) {
        return Err(problems);
    }

    let unifier = inference.unifier;
    let mut problems = Vec::new();

    let mut slots = Vec::with_capacity(inference.slots.len());
    for slot in &inference.slots {
        match unifier.zonk(&slot.term).to_type(factory) {
            Some(ty) => slots.push(ty),
            None => {
                if let Some(subject) = &slot.subject {
                    problems.push(Problem::new(
                        ProblemKind::TypeUnknown,
                        slot.location.clone(),
                        format!("cannot infer the type of {}", subject),
                    ));
                }
            }
        }
    }

    let mut full = env.clone();
    for (name, ident) in &inference.idents {
        let Some(ty) = unifier.zonk(&ident.term).to_type(factory) else {
            problems.push(Problem::new(
                ProblemKind::TypeUnknown,
                ident.location.clone(),
                format!("cannot infer the type of {}", name),
            ));
            continue;
        };

        if let Err(error) = full.add(name, ty) {
            problems.push(Problem::new(ProblemKind::TypeError, ident.location.clone(), error.to_string()));
        }
    }

    if let Some(problems) = NonEmpty::from_vec(problems) {
        return Err(problems);
    }

    let mut typer = Typer {
        factory,
        slots: slots.into_iter(),
        idents: &full,
    };
    let typed = rewrite(formula, 0, &mut typer).map_err(|error| problem(ProblemKind::TypeError, formula, error.to_string()))?;

    if !typed.is_type_checked() {
        return Err(problem(ProblemKind::TypeError, formula, format!("{} is ill-typed", formula)));
    }

    Ok((typed, full.without(env)))
}

fn type_check(formula: &Formula, env: &TypeEnvironment, expected: Option<&Type>) -> TypeCheckResult<Formula> {
    let (result, inferred) = match check(formula, env, expected) {
        Ok((typed, inferred)) => {
            debug!(tag = %formula.tag(), inferred = inferred.len(), "type-checked formula");
            (Ok(typed), inferred)
        }
        Err(problems) => {
            debug!(tag = %formula.tag(), problems = problems.len(), "type check failed");
            (Err(problems), env.factory().make_type_environment())
        }
    };

    TypeCheckResult { result, inferred }
}

impl Formula {
    /// Type check against `env`. On success every node of the returned formula is typed.
    pub fn type_check(&self, env: &TypeEnvironment) -> TypeCheckResult<Formula> {
        type_check(self, env, None)
    }
}

impl Expression {
    pub fn type_check(&self, env: &TypeEnvironment) -> TypeCheckResult<Expression> {
        type_check(&Formula::from(self.clone()), env, None).narrow(|checked| checked.as_expression().cloned())
    }

    /// Type check an expression that must have type `expected`.
    pub fn type_check_expecting(&self, env: &TypeEnvironment, expected: &Type) -> TypeCheckResult<Expression> {
        type_check(&Formula::from(self.clone()), env, Some(expected)).narrow(|checked| checked.as_expression().cloned())
    }
}

impl Predicate {
    pub fn type_check(&self, env: &TypeEnvironment) -> TypeCheckResult<Predicate> {
        type_check(&Formula::from(self.clone()), env, None).narrow(|checked| checked.as_predicate().cloned())
    }
}

impl Assignment {
    /// Type check an assignment. The primed identifiers of `:∣` get the type of the identifier
    /// they stand for.
    pub fn type_check(&self, env: &TypeEnvironment) -> TypeCheckResult<Assignment> {
        type_check(&Formula::from(self.clone()), env, None).narrow(|checked| checked.as_assignment().cloned())
    }
}
