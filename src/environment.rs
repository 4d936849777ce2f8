use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{Display, Formatter};

use crate::error::FormulaError;
use crate::factory::{is_valid_identifier_name, FormulaFactory};
use crate::types::Type;

/// Typing of free identifiers.
///
/// Adding an identifier whose type mentions a given type `S` also records the given set
/// `S : ℙ(S)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeEnvironment {
    factory: FormulaFactory,
    names: BTreeMap<String, Type>,
}

impl TypeEnvironment {
    pub fn new(factory: FormulaFactory) -> Self {
        TypeEnvironment {
            factory,
            names: BTreeMap::new(),
        }
    }

    pub fn factory(&self) -> &FormulaFactory {
        &self.factory
    }

    pub fn add(&mut self, name: &str, ty: Type) -> Result<(), FormulaError> {
        if !is_valid_identifier_name(name) {
            return Err(FormulaError::illegal_argument(format!("invalid identifier name {}", name)));
        }

        if ty.factory_id() != self.factory.id() {
            return Err(FormulaError::FactoryMismatch);
        }

        self.check_absent_or_same(name, &ty)?;
        for given in ty.given_types() {
            let given_set = self.factory.pow(self.factory.make_given_type(&given)?);
            self.check_absent_or_same(&given, &given_set)?;
        }

        for given in ty.given_types() {
            let given_set = self.factory.pow(self.factory.make_given_type(&given)?);
            self.names.entry(given).or_insert(given_set);
        }
        self.names.insert(name.to_string(), ty);

        Ok(())
    }

    /// Record the carrier set `name : ℙ(name)`.
    pub fn add_given_set(&mut self, name: &str) -> Result<(), FormulaError> {
        let given = self.factory.make_given_type(name)?;
        self.add(name, self.factory.pow(given))
    }

    pub fn add_all(&mut self, other: &TypeEnvironment) -> Result<(), FormulaError> {
        for (name, ty) in other.iter() {
            self.add(name, ty.clone())?;
        }

        Ok(())
    }

    fn check_absent_or_same(&self, name: &str, ty: &Type) -> Result<(), FormulaError> {
        match self.names.get(name) {
            Some(existing) if existing != ty => Err(FormulaError::illegal_argument(format!(
                "{} already has type {}, cannot retype it as {}",
                name, existing, ty
            ))),
            _ => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.names.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Whether `name` denotes a carrier set in this environment.
    pub fn is_given_set(&self, name: &str) -> bool {
        self.get(name)
            .and_then(Type::base_type)
            .and_then(Type::given_name)
            .map_or(false, |given| given == name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Type> {
        self.names.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries of this environment whose name is not in `base`.
    pub fn without(&self, base: &TypeEnvironment) -> TypeEnvironment {
        TypeEnvironment {
            factory: self.factory.clone(),
            names: self
                .names
                .iter()
                .filter(|(name, _)| !base.contains(name))
                .map(|(name, ty)| (name.clone(), ty.clone()))
                .collect(),
        }
    }

    /// Copy of this environment where every variable `x` also has a primed copy `x'`.
    pub fn with_primed(&self) -> TypeEnvironment {
        let mut primed = self.clone();
        for (name, ty) in &self.names {
            if !self.is_given_set(name) && !name.ends_with('\'') {
                primed.names.entry(format!("{}'", name)).or_insert_with(|| ty.clone());
            }
        }

        primed
    }
}

impl<'a> IntoIterator for &'a TypeEnvironment {
    type Item = (&'a String, &'a Type);
    type IntoIter = btree_map::Iter<'a, String, Type>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for TypeEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (index, (name, ty)) in self.names.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", name, ty)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;

    #[test]
    fn given_sets_are_registered() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let mut env = ff.make_type_environment();
        let s = ff.make_given_type("S")?;

        env.add("x", ff.make_power_set_type(s.clone())?)?;

        assert_eq!(env.get("S"), Some(&ff.make_power_set_type(s)?));
        assert!(env.is_given_set("S"));
        assert!(!env.is_given_set("x"));
        assert_eq!(env.to_string(), "{S:ℙ(S), x:ℙ(S)}");

        Ok(())
    }

    #[test]
    fn conflicting_types_are_rejected() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let mut env = ff.make_type_environment();

        env.add("S", ff.make_integer_type())?;
        let result = env.add("x", ff.make_given_type("S")?);

        assert!(result.is_err());
        assert!(!env.contains("x"));

        Ok(())
    }

    #[test]
    fn primed_copy() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let mut env = ff.make_type_environment();
        env.add("x", ff.make_given_type("S")?)?;

        let primed = env.with_primed();

        assert_eq!(primed.get("x'"), env.get("x"));
        assert!(!primed.contains("S'"));

        Ok(())
    }
}
