//! Specialization of types and formulas.
//!
//! A [`Specialization`] is a simultaneous substitution of given types by types, of free
//! identifiers by expressions, and of predicate variables by predicates. It is built with
//! successive puts and applied with [`Type::specialize`] or [`Formula::specialize`], which
//! translate the result into the factory of the specialization.
//!
//! Every given type and identifier goes through at most one of two states. Applying the
//! specialization to something that mentions a name without a substitution freezes that name as
//! itself, and a mapped name keeps its first target: a put that would change the meaning of a
//! frozen or mapped name is rejected. The names introduced by the targets form the destination
//! environment, in which no name may be given two different types. A put or an application that
//! fails leaves the specialization unchanged.

use std::collections::{BTreeMap, BTreeSet};

use either::Either;
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::environment::TypeEnvironment;
use crate::error::{FormulaError, SpecializationError};
use crate::expressions::{Assignment, Expression, ExpressionKind, Predicate, PredicateKind};
use crate::factory::FormulaFactory;
use crate::formula::{rewrite, Formula, Rewriter};
use crate::types::{Type, TypeKind};

#[derive(Clone, Debug, PartialEq)]
enum TypeState {
    Frozen,
    Mapped(Type),
}

#[derive(Clone, Debug)]
pub struct Specialization {
    factory: FormulaFactory,
    types: BTreeMap<String, TypeState>,
    /// Identifier and predicate variable substitutions, by source name.
    substitutions: BTreeMap<String, Either<Expression, Predicate>>,
    /// Identifiers and predicate variables frozen as themselves.
    frozen: BTreeSet<String>,
    destination: TypeEnvironment,
}

impl Specialization {
    /// Empty specialization producing formulas of `factory`.
    pub fn new(factory: &FormulaFactory) -> Self {
        Specialization {
            factory: factory.clone(),
            types: BTreeMap::new(),
            substitutions: BTreeMap::new(),
            frozen: BTreeSet::new(),
            destination: factory.make_type_environment(),
        }
    }

    pub fn factory(&self) -> &FormulaFactory {
        &self.factory
    }

    /// Replacement recorded for the given type `name`.
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        match self.types.get(name) {
            Some(TypeState::Mapped(ty)) => Some(ty),
            _ => None,
        }
    }

    pub fn get_identifier(&self, name: &str) -> Option<&Expression> {
        self.substitutions.get(name).and_then(|substitute| substitute.as_ref().left())
    }

    pub fn get_predicate(&self, name: &str) -> Option<&Predicate> {
        self.substitutions.get(name).and_then(|substitute| substitute.as_ref().right())
    }

    /// Types of the free identifiers of the specialized formulas and of the replacements.
    pub fn destination_environment(&self) -> &TypeEnvironment {
        &self.destination
    }

    /// Substitute the given type `given` by `replacement`.
    ///
    /// The identifier denoting the carrier set of `given` is substituted by the expression of
    /// `replacement` at the same time.
    pub fn put_type(&mut self, given: &Type, replacement: &Type) -> Result<(), SpecializationError> {
        self.transaction(|spec| spec.map_type(given, replacement, None))
    }

    /// Substitute the typed free identifier `ident` by `replacement`, which must have the
    /// specialized type of `ident`.
    ///
    /// When `ident` denotes a carrier set, `replacement` must be a type expression and the
    /// given type is substituted as well.
    pub fn put_identifier(&mut self, ident: &Expression, replacement: &Expression) -> Result<(), SpecializationError> {
        self.transaction(|spec| spec.map_identifier(ident, replacement))
    }

    /// Substitute the predicate variable `variable` by `replacement`.
    pub fn put_predicate(&mut self, variable: &Predicate, replacement: &Predicate) -> Result<(), SpecializationError> {
        self.transaction(|spec| spec.map_predicate(variable, replacement))
    }

    fn transaction<T, F>(&mut self, change: F) -> Result<T, SpecializationError>
    where
        F: FnOnce(&mut Specialization) -> Result<T, SpecializationError>,
    {
        let mut next = self.clone();
        match change(&mut next) {
            Ok(value) => {
                *self = next;
                Ok(value)
            }
            Err(error) => {
                debug!(%error, "rejected specialization");
                Err(error)
            }
        }
    }

    fn map_type(&mut self, given: &Type, replacement: &Type, written: Option<&Expression>) -> Result<(), SpecializationError> {
        let TypeKind::Given(name) = given.kind() else {
            return Err(SpecializationError::NotAGivenType(given.to_string()));
        };

        if replacement.factory_id() != self.factory.id() {
            return Err(SpecializationError::FactoryMismatch(name.clone()));
        }

        let image = match written {
            Some(expr) => expr.clone(),
            None => replacement.to_expression(&self.factory)?,
        };

        match self.types.get(name) {
            Some(TypeState::Frozen) => return Err(SpecializationError::Frozen(name.clone())),
            Some(TypeState::Mapped(existing)) if existing != replacement => {
                return Err(SpecializationError::Conflict {
                    name: name.clone(),
                    existing: existing.to_string(),
                })
            }
            Some(TypeState::Mapped(_)) => {}
            None if self.frozen.contains(name) => return Err(SpecializationError::Frozen(name.clone())),
            None => {}
        }

        // A type mapped twice to the same value must also be written the same way.
        if let Some(existing) = self.substitutions.get(name) {
            return match existing {
                Either::Left(previous) if previous == &image => Ok(()),
                Either::Left(previous) => Err(SpecializationError::Conflict {
                    name: name.clone(),
                    existing: previous.to_string(),
                }),
                Either::Right(_) => Err(SpecializationError::NameCollision(name.clone())),
            };
        }

        self.types.insert(name.clone(), TypeState::Mapped(replacement.clone()));
        self.check_acyclic(name)?;

        for target in replacement.given_types() {
            self.destination
                .add_given_set(&target)
                .map_err(|_| SpecializationError::NameCollision(target.clone()))?;
        }
        self.substitutions.insert(name.clone(), Either::Left(image));

        debug!(given = %name, replacement = %replacement, "specialized given type");
        Ok(())
    }

    fn check_acyclic(&self, name: &str) -> Result<(), SpecializationError> {
        let edges: Vec<(&str, String)> = self
            .types
            .iter()
            .filter_map(|(source, state)| match state {
                TypeState::Mapped(target) => Some((source.as_str(), target)),
                TypeState::Frozen => None,
            })
            .flat_map(|(source, target)| {
                target
                    .given_types()
                    .into_iter()
                    .filter(move |given| given != source)
                    .map(move |given| (source, given))
            })
            .collect();

        let graph: DiGraphMap<&str, ()> = edges.iter().map(|(source, target)| (*source, target.as_str())).collect();

        if is_cyclic_directed(&graph) {
            Err(SpecializationError::Cycle(name.to_string()))
        } else {
            Ok(())
        }
    }

    fn check_replacement(&self, name: &str, replacement: &Formula) -> Result<(), SpecializationError> {
        if !replacement.is_type_checked() {
            return Err(SpecializationError::NotTypeChecked);
        }

        if replacement.factory_id() != self.factory.id() {
            return Err(SpecializationError::FactoryMismatch(name.to_string()));
        }

        if !replacement.is_well_formed() {
            return Err(SpecializationError::Formula(FormulaError::illegal_argument(format!(
                "replacement {} for {} has dangling bound identifiers",
                replacement, name
            ))));
        }

        Ok(())
    }

    /// Record the free identifiers of a replacement in the destination environment.
    fn introduce(&mut self, replacement: &Formula) -> Result<(), SpecializationError> {
        for ident in replacement.free_identifiers() {
            if let (Some(name), Some(ty)) = (ident.identifier_name(), ident.ty()) {
                self.destination
                    .add(name, ty.clone())
                    .map_err(|_| SpecializationError::NameCollision(name.to_string()))?;
            }
        }

        Ok(())
    }

    fn map_identifier(&mut self, ident: &Expression, replacement: &Expression) -> Result<(), SpecializationError> {
        let (Some(name), Some(source_type)) = (ident.identifier_name(), ident.ty()) else {
            return Err(SpecializationError::NotAnIdentifier(ident.to_string()));
        };

        self.check_replacement(name, &replacement.clone().into())?;

        match self.substitutions.get(name) {
            Some(Either::Left(existing)) if existing == replacement => return Ok(()),
            Some(Either::Left(existing)) => {
                return Err(SpecializationError::Conflict {
                    name: name.to_string(),
                    existing: existing.to_string(),
                })
            }
            _ if self.frozen.contains(name) => return Err(SpecializationError::Frozen(name.to_string())),
            _ => {}
        }

        if let Some(given) = source_type.base_type().filter(|base| base.given_name() == Some(name)) {
            let ty = replacement
                .to_type(&self.factory)
                .map_err(|_| SpecializationError::NotAType(name.to_string()))?;
            return self.map_type(given, &ty, Some(replacement));
        }

        let expected = self.specialize_type(source_type)?;
        if replacement.ty() != Some(&expected) {
            return Err(SpecializationError::TypeMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                found: replacement.ty().map_or_else(|| "unknown".to_string(), ToString::to_string),
            });
        }

        self.introduce(&replacement.clone().into())?;
        self.substitutions
            .insert(name.to_string(), Either::Left(replacement.clone()));

        debug!(identifier = %name, replacement = %replacement, "specialized identifier");
        Ok(())
    }

    fn map_predicate(&mut self, variable: &Predicate, replacement: &Predicate) -> Result<(), SpecializationError> {
        let PredicateKind::Variable(name) = variable.kind() else {
            return Err(SpecializationError::NotAPredicateVariable(variable.to_string()));
        };

        self.check_replacement(name, &replacement.clone().into())?;

        match self.substitutions.get(name) {
            Some(Either::Right(existing)) if existing == replacement => return Ok(()),
            Some(Either::Right(existing)) => {
                return Err(SpecializationError::Conflict {
                    name: name.clone(),
                    existing: existing.to_string(),
                })
            }
            _ if self.frozen.contains(name) => return Err(SpecializationError::Frozen(name.clone())),
            _ => {}
        }

        self.introduce(&replacement.clone().into())?;
        self.substitutions
            .insert(name.clone(), Either::Right(replacement.clone()));

        debug!(variable = %name, replacement = %replacement, "specialized predicate variable");
        Ok(())
    }

    fn freeze_type(&mut self, name: &str) -> Result<(), SpecializationError> {
        self.destination
            .add_given_set(name)
            .map_err(|_| SpecializationError::NameCollision(name.to_string()))?;
        self.types.insert(name.to_string(), TypeState::Frozen);
        Ok(())
    }

    fn specialize_type(&mut self, ty: &Type) -> Result<Type, SpecializationError> {
        let factory = self.factory.clone();

        let specialized = match ty.kind() {
            TypeKind::Integer => factory.make_integer_type(),
            TypeKind::Boolean => factory.make_boolean_type(),
            TypeKind::Given(name) => match self.types.get(name) {
                Some(TypeState::Mapped(target)) => target.clone(),
                Some(TypeState::Frozen) => factory.make_given_type(name)?,
                None => {
                    self.freeze_type(name)?;
                    factory.make_given_type(name)?
                }
            },
            TypeKind::PowerSet(base) => factory.pow(self.specialize_type(base)?),
            TypeKind::Product(left, right) => {
                let left = self.specialize_type(left)?;
                factory.prod(left, self.specialize_type(right)?)
            }
            TypeKind::Parametric(extension, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.specialize_type(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                factory.make_parametric_type(extension, args)?
            }
        };

        Ok(specialized)
    }

    fn specialize_identifier(&mut self, ident: &Expression, name: &str) -> Result<Expression, SpecializationError> {
        if let Some(Either::Left(replacement)) = self.substitutions.get(name) {
            return Ok(replacement.clone());
        }

        let ty = ident.ty().ok_or(SpecializationError::NotTypeChecked)?;
        let ty = self.specialize_type(ty)?;

        // A carrier set whose type was mapped while specializing its own type.
        if let Some(Either::Left(replacement)) = self.substitutions.get(name) {
            return Ok(replacement.clone());
        }

        self.destination
            .add(name, ty.clone())
            .map_err(|_| SpecializationError::NameCollision(name.to_string()))?;
        self.frozen.insert(name.to_string());

        Ok(self
            .factory
            .make_free_identifier(name, ident.location().cloned(), Some(ty))?)
    }

    fn specialize_variable(&mut self, variable: &Predicate, name: &str) -> Result<Predicate, SpecializationError> {
        if let Some(Either::Right(replacement)) = self.substitutions.get(name) {
            return Ok(replacement.clone());
        }

        self.frozen.insert(name.to_string());
        Ok(self
            .factory
            .make_predicate_variable(name, variable.location().cloned())?)
    }
}

struct Specializer<'a> {
    spec: &'a mut Specialization,
    factory: FormulaFactory,
}

impl Specializer<'_> {
    fn leaf_type(&mut self, ty: Option<&Type>) -> Result<Option<Type>, SpecializationError> {
        ty.map(|ty| self.spec.specialize_type(ty)).transpose()
    }
}

impl Rewriter for Specializer<'_> {
    type Error = SpecializationError;

    fn factory(&self) -> &FormulaFactory {
        &self.factory
    }

    fn rewrite(&mut self, formula: &Formula, _depth: usize) -> Result<Option<Formula>, SpecializationError> {
        let specialized = match formula {
            Formula::BoundIdentDecl(decl) => {
                let ty = self.leaf_type(decl.ty())?;
                self.factory
                    .make_bound_ident_decl(decl.name(), decl.location().cloned(), ty)?
                    .into()
            }
            Formula::Expression(expr) => {
                let location = expr.location().cloned();
                match expr.kind() {
                    ExpressionKind::FreeIdentifier(name) => self.spec.specialize_identifier(expr, name)?,
                    ExpressionKind::BoundIdentifier(index) => {
                        let ty = self.leaf_type(expr.ty())?;
                        self.factory.make_bound_identifier(*index, location, ty)?
                    }
                    ExpressionKind::Atomic(op) if op.is_generic() => {
                        let ty = self.leaf_type(expr.ty())?;
                        self.factory.make_atomic_expression(*op, location, ty)?
                    }
                    ExpressionKind::SetExtension(members) if members.is_empty() => {
                        let ty = self.leaf_type(expr.ty())?;
                        self.factory.make_set_extension(Vec::new(), location, ty)?
                    }
                    _ => return Ok(None),
                }
                .into()
            }
            Formula::Predicate(pred) => match pred.kind() {
                PredicateKind::Variable(name) => self.spec.specialize_variable(pred, name)?.into(),
                _ => return Ok(None),
            },
            Formula::Assignment(_) => return Ok(None),
        };

        Ok(Some(specialized))
    }
}

impl Type {
    /// This type with the given types substituted by `spec`, in the factory of `spec`.
    ///
    /// Given types without a substitution are frozen as themselves.
    pub fn specialize(&self, spec: &mut Specialization) -> Result<Type, SpecializationError> {
        spec.transaction(|spec| spec.specialize_type(self))
    }
}

impl Formula {
    /// Apply `spec` to a type-checked formula. The result is type-checked.
    pub fn specialize(&self, spec: &mut Specialization) -> Result<Formula, SpecializationError> {
        if !self.is_type_checked() {
            return Err(SpecializationError::NotTypeChecked);
        }

        let specialized = spec.transaction(|spec| {
            let factory = spec.factory.clone();
            let mut specializer = Specializer { spec, factory };
            rewrite(self, 0, &mut specializer)
        })?;

        debug!(formula = %self, specialized = %specialized, "specialized formula");
        Ok(specialized)
    }
}

fn narrow<T>(specialized: Formula, category: impl FnOnce(&Formula) -> Option<&T>) -> Result<T, SpecializationError>
where
    T: Clone,
{
    category(&specialized).cloned().ok_or_else(|| {
        SpecializationError::Formula(FormulaError::illegal_argument(format!(
            "specialization changed the category of {}",
            specialized
        )))
    })
}

impl Expression {
    pub fn specialize(&self, spec: &mut Specialization) -> Result<Expression, SpecializationError> {
        narrow(Formula::from(self.clone()).specialize(spec)?, Formula::as_expression)
    }
}

impl Predicate {
    pub fn specialize(&self, spec: &mut Specialization) -> Result<Predicate, SpecializationError> {
        narrow(Formula::from(self.clone()).specialize(spec)?, Formula::as_predicate)
    }
}

impl Assignment {
    pub fn specialize(&self, spec: &mut Specialization) -> Result<Assignment, SpecializationError> {
        narrow(Formula::from(self.clone()).specialize(spec)?, Formula::as_assignment)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::Specialization;
    use crate::error::SpecializationError;
    use crate::factory::FormulaFactory;
    use crate::formula::Formula;
    use crate::operators::{AtomicOp, BinaryOp, RelationalOp};
    use crate::types::Extension;

    #[test]
    fn frozen_given_type_rejects_later_puts() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let integer = ff.make_integer_type();
        let mut spec = Specialization::new(&ff);

        assert_eq!(s.specialize(&mut spec)?, s);

        assert!(matches!(spec.put_type(&s, &integer), Err(SpecializationError::Frozen(_))));

        let carrier = ff.make_free_identifier("S", None, Some(ff.make_power_set_type(s.clone())?))?;
        let integers = ff.make_atomic_expression(AtomicOp::Integer, None, None)?;
        assert!(spec.put_identifier(&carrier, &integers).is_err());

        let y = ff.make_free_identifier("y", None, Some(integer.clone()))?;
        let other_s = ff.make_free_identifier("S", None, Some(integer))?;
        assert!(matches!(
            spec.put_identifier(&y, &other_s),
            Err(SpecializationError::NameCollision(_))
        ));
        assert!(spec.get_identifier("y").is_none());

        Ok(())
    }

    #[test]
    fn specialize_formula() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let x = ff.make_free_identifier("x", None, Some(s.clone()))?;
        let carrier = ff.make_free_identifier("S", None, Some(ff.make_power_set_type(s.clone())?))?;
        let pred = Formula::from(ff.make_relational_predicate(RelationalOp::In, x, carrier, None)?);

        let mut spec = Specialization::new(&ff);
        spec.put_type(&s, &ff.make_integer_type())?;
        let specialized = pred.specialize(&mut spec)?;

        assert_eq!(specialized.to_string(), "x∈ℤ");
        assert!(specialized.is_type_checked());
        assert_eq!(spec.destination_environment().get("x"), Some(&ff.make_integer_type()));

        Ok(())
    }

    #[test]
    fn cycles_are_rejected() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let t = ff.make_given_type("T")?;
        let mut spec = Specialization::new(&ff);

        spec.put_type(&s, &ff.make_power_set_type(t.clone())?)?;
        assert!(matches!(spec.put_type(&t, &s), Err(SpecializationError::Cycle(_))));
        assert!(spec.get_type("T").is_none());

        Ok(())
    }

    #[test]
    fn relation_and_power_set_are_not_interchangeable_targets() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let t = ff.make_given_type("T")?;
        let u = ff.make_given_type("U")?;
        let mut spec = Specialization::new(&ff);

        let carrier = ff.make_free_identifier("S", None, Some(ff.make_power_set_type(s.clone())?))?;
        let t_set = ff.make_free_identifier("T", None, Some(ff.make_power_set_type(t.clone())?))?;
        let u_set = ff.make_free_identifier("U", None, Some(ff.make_power_set_type(u.clone())?))?;
        let relation = ff.make_binary_expression(BinaryOp::Rel, t_set, u_set, None)?;

        spec.put_identifier(&carrier, &relation)?;
        spec.put_identifier(&carrier, &relation)?;
        assert_eq!(spec.get_type("S"), Some(&ff.make_relational_type(t.clone(), u.clone())?));

        let result = spec.put_type(&s, &ff.make_relational_type(t, u)?);
        assert!(matches!(result, Err(SpecializationError::Conflict { .. })));

        Ok(())
    }

    #[test]
    fn translation_to_extended_factory() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let extended = ff.with_extensions([Extension::new("List", 1)])?;
        let x = ff.make_free_identifier("x", None, Some(ff.make_integer_type()))?;

        let mut spec = Specialization::new(&extended);
        let specialized = x.specialize(&mut spec)?;

        assert_eq!(specialized.ty(), Some(&extended.make_integer_type()));
        assert_ne!(Some(&ff.make_integer_type()), specialized.ty());

        Ok(())
    }
}
