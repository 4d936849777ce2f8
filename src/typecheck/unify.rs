//! Unification of type terms.
//!
//! A type term is a type of the language that may contain type variables. The unifier keeps the
//! binding of every variable it created; a variable is bound at most once and bindings are never
//! undone.

use std::fmt::{Display, Formatter};

use tracing::trace;

use crate::factory::FormulaFactory;
use crate::types::{Extension, Type, TypeKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TypeTerm {
    Var(usize),
    Integer,
    Boolean,
    Given(String),
    Pow(Box<TypeTerm>),
    Prod(Box<TypeTerm>, Box<TypeTerm>),
    Param(Extension, Vec<TypeTerm>),
}

impl TypeTerm {
    pub(crate) fn pow(base: TypeTerm) -> TypeTerm {
        TypeTerm::Pow(Box::new(base))
    }

    pub(crate) fn prod(left: TypeTerm, right: TypeTerm) -> TypeTerm {
        TypeTerm::Prod(Box::new(left), Box::new(right))
    }

    /// `ℙ(left×right)`
    pub(crate) fn rel(left: TypeTerm, right: TypeTerm) -> TypeTerm {
        TypeTerm::pow(TypeTerm::prod(left, right))
    }

    pub(crate) fn from_type(ty: &Type) -> TypeTerm {
        match ty.kind() {
            TypeKind::Integer => TypeTerm::Integer,
            TypeKind::Boolean => TypeTerm::Boolean,
            TypeKind::Given(name) => TypeTerm::Given(name.clone()),
            TypeKind::PowerSet(base) => TypeTerm::pow(TypeTerm::from_type(base)),
            TypeKind::Product(left, right) => TypeTerm::prod(TypeTerm::from_type(left), TypeTerm::from_type(right)),
            TypeKind::Parametric(extension, args) => {
                TypeTerm::Param(extension.clone(), args.iter().map(TypeTerm::from_type).collect())
            }
        }
    }

    /// The type denoted by a term without variables.
    pub(crate) fn to_type(&self, factory: &FormulaFactory) -> Option<Type> {
        let kind = match self {
            TypeTerm::Var(_) => return None,
            TypeTerm::Integer => TypeKind::Integer,
            TypeTerm::Boolean => TypeKind::Boolean,
            TypeTerm::Given(name) => TypeKind::Given(name.clone()),
            TypeTerm::Pow(base) => TypeKind::PowerSet(base.to_type(factory)?),
            TypeTerm::Prod(left, right) => TypeKind::Product(left.to_type(factory)?, right.to_type(factory)?),
            TypeTerm::Param(extension, args) => TypeKind::Parametric(
                extension.clone(),
                args.iter().map(|arg| arg.to_type(factory)).collect::<Option<_>>()?,
            ),
        };

        Some(factory.intern(kind))
    }
}

impl Display for TypeTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTerm::Var(_) => f.write_str("?"),
            TypeTerm::Integer => f.write_str("ℤ"),
            TypeTerm::Boolean => f.write_str("BOOL"),
            TypeTerm::Given(name) => f.write_str(name),
            TypeTerm::Pow(base) => write!(f, "ℙ({})", base),
            TypeTerm::Prod(left, right) => {
                match left.as_ref() {
                    TypeTerm::Prod(..) => write!(f, "({})", left)?,
                    _ => write!(f, "{}", left)?,
                }
                f.write_str("×")?;
                match right.as_ref() {
                    TypeTerm::Prod(..) => write!(f, "({})", right),
                    _ => write!(f, "{}", right),
                }
            }
            TypeTerm::Param(extension, args) => {
                write!(f, "{}(", extension.name())?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Two terms that cannot be made equal.
#[derive(Debug)]
pub(crate) struct Mismatch;

#[derive(Debug, Default)]
pub(crate) struct Unifier {
    bindings: Vec<Option<TypeTerm>>,
}

impl Unifier {
    pub(crate) fn fresh(&mut self) -> TypeTerm {
        self.bindings.push(None);
        TypeTerm::Var(self.bindings.len() - 1)
    }

    /// Follow the bindings of a variable until reaching a constructor or a free variable.
    fn resolve(&self, term: &TypeTerm) -> TypeTerm {
        let mut current = term;
        while let TypeTerm::Var(var) = current {
            match &self.bindings[*var] {
                Some(bound) => current = bound,
                None => break,
            }
        }

        current.clone()
    }

    /// The term with every bound variable replaced, recursively.
    pub(crate) fn zonk(&self, term: &TypeTerm) -> TypeTerm {
        match self.resolve(term) {
            TypeTerm::Pow(base) => TypeTerm::pow(self.zonk(&base)),
            TypeTerm::Prod(left, right) => TypeTerm::prod(self.zonk(&left), self.zonk(&right)),
            TypeTerm::Param(extension, args) => {
                TypeTerm::Param(extension, args.iter().map(|arg| self.zonk(arg)).collect())
            }
            resolved => resolved,
        }
    }

    pub(crate) fn unify(&mut self, left: &TypeTerm, right: &TypeTerm) -> Result<(), Mismatch> {
        let left = self.resolve(left);
        let right = self.resolve(right);

        match (&left, &right) {
            (TypeTerm::Var(l), TypeTerm::Var(r)) if l == r => Ok(()),
            (TypeTerm::Var(var), other) | (other, TypeTerm::Var(var)) => self.bind(*var, other),
            (TypeTerm::Integer, TypeTerm::Integer) | (TypeTerm::Boolean, TypeTerm::Boolean) => Ok(()),
            (TypeTerm::Given(l), TypeTerm::Given(r)) if l == r => Ok(()),
            (TypeTerm::Pow(l), TypeTerm::Pow(r)) => self.unify(l, r),
            (TypeTerm::Prod(l1, l2), TypeTerm::Prod(r1, r2)) => {
                self.unify(l1, r1)?;
                self.unify(l2, r2)
            }
            (TypeTerm::Param(lext, largs), TypeTerm::Param(rext, rargs))
                if lext == rext && largs.len() == rargs.len() =>
            {
                largs.iter().zip(rargs).try_for_each(|(l, r)| self.unify(l, r))
            }
            _ => Err(Mismatch),
        }
    }

    fn bind(&mut self, var: usize, term: &TypeTerm) -> Result<(), Mismatch> {
        if self.occurs(var, term) {
            return Err(Mismatch);
        }

        trace!(var, term = %term, "bound type variable");
        self.bindings[var] = Some(term.clone());
        Ok(())
    }

    fn occurs(&self, var: usize, term: &TypeTerm) -> bool {
        match self.resolve(term) {
            TypeTerm::Var(other) => other == var,
            TypeTerm::Pow(base) => self.occurs(var, &base),
            TypeTerm::Prod(left, right) => self.occurs(var, &left) || self.occurs(var, &right),
            TypeTerm::Param(_, args) => args.iter().any(|arg| self.occurs(var, arg)),
            TypeTerm::Integer | TypeTerm::Boolean | TypeTerm::Given(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{TypeTerm, Unifier};
    use crate::factory::FormulaFactory;

    #[test]
    fn unification_propagates_through_constructors() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let mut unifier = Unifier::default();
        let a = unifier.fresh();
        let b = unifier.fresh();

        let relation = TypeTerm::rel(a.clone(), b.clone());
        let concrete = TypeTerm::rel(TypeTerm::Given("S".to_string()), TypeTerm::Integer);
        assert!(unifier.unify(&relation, &concrete).is_ok());

        assert_eq!(unifier.zonk(&a), TypeTerm::Given("S".to_string()));
        let ty = unifier.zonk(&relation).to_type(&ff).ok_or("unresolved")?;
        assert_eq!(ty, ff.make_relational_type(ff.make_given_type("S")?, ff.make_integer_type())?);

        Ok(())
    }

    #[test]
    fn unresolved_variables_print_as_unknown() {
        let mut unifier = Unifier::default();
        let a = unifier.fresh();
        let b = unifier.fresh();

        assert_eq!(TypeTerm::rel(a, b).to_string(), "ℙ(?×?)");
    }

    #[test]
    fn mismatches_and_occurs_check() {
        let mut unifier = Unifier::default();
        let a = unifier.fresh();

        assert!(unifier.unify(&TypeTerm::Integer, &TypeTerm::Boolean).is_err());
        assert!(unifier.unify(&a, &TypeTerm::pow(a.clone())).is_err());
        assert!(unifier.unify(&a, &TypeTerm::Integer).is_ok());
        assert!(unifier.unify(&a, &TypeTerm::Boolean).is_err());
        assert_eq!(unifier.zonk(&TypeTerm::pow(a)).to_string(), "ℙ(ℤ)");
    }
}
