//! Types of the mathematical language.
//!
//! Types are interned by the [`FormulaFactory`](crate::factory::FormulaFactory) that created
//! them: two types of the same factory are structurally equal exactly when they are the same
//! object, so equality and hashing work on the shared pointer. Types of different factories are
//! never equal.

use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of the factory that owns a type or a typed formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(pub(crate) usize);

/// A parametric type constructor contributed to a factory, like `List(T)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extension {
    name: String,
    arity: usize,
}

impl Extension {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Extension {
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Integer,
    Boolean,
    Given(String),
    PowerSet(Type),
    Product(Type, Type),
    Parametric(Extension, Vec<Type>),
}

pub(crate) struct TypeData {
    pub(crate) kind: TypeKind,
    pub(crate) factory: FactoryId,
}

#[derive(Clone)]
pub struct Type(pub(crate) Arc<TypeData>);

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn factory_id(&self) -> FactoryId {
        self.0.factory
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind(), TypeKind::Integer)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind(), TypeKind::Boolean)
    }

    /// Name of a given type.
    pub fn given_name(&self) -> Option<&str> {
        match self.kind() {
            TypeKind::Given(name) => Some(name),
            _ => None,
        }
    }

    /// Base of a power-set type.
    pub fn base_type(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::PowerSet(base) => Some(base),
            _ => None,
        }
    }

    pub fn left(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Product(left, _) => Some(left),
            _ => None,
        }
    }

    pub fn right(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Product(_, right) => Some(right),
            _ => None,
        }
    }

    /// Source type `α` of a relational type `ℙ(α×β)`.
    pub fn source(&self) -> Option<&Type> {
        self.base_type().and_then(Type::left)
    }

    /// Target type `β` of a relational type `ℙ(α×β)`.
    pub fn target(&self) -> Option<&Type> {
        self.base_type().and_then(Type::right)
    }

    pub fn is_relational(&self) -> bool {
        self.source().is_some()
    }

    /// Names of all given types occurring in this type.
    pub fn given_types(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_given_types(&mut names);
        names
    }

    fn collect_given_types(&self, names: &mut BTreeSet<String>) {
        match self.kind() {
            TypeKind::Integer | TypeKind::Boolean => {}
            TypeKind::Given(name) => {
                names.insert(name.clone());
            }
            TypeKind::PowerSet(base) => base.collect_given_types(names),
            TypeKind::Product(left, right) => {
                left.collect_given_types(names);
                right.collect_given_types(names);
            }
            TypeKind::Parametric(_, args) => {
                for arg in args {
                    arg.collect_given_types(names);
                }
            }
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            TypeKind::Integer => f.write_str("ℤ"),
            TypeKind::Boolean => f.write_str("BOOL"),
            TypeKind::Given(name) => f.write_str(name),
            TypeKind::PowerSet(base) => write!(f, "ℙ({})", base),
            TypeKind::Product(left, right) => {
                write!(f, "{}×", left)?;
                if right.left().is_some() {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            TypeKind::Parametric(extension, args) => {
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

impl Debug for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Type({})", self)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;

    #[test]
    fn interning() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let left = ff.make_power_set_type(ff.make_product_type(s.clone(), ff.make_integer_type())?)?;
        let right = ff.make_relational_type(s, ff.make_integer_type())?;

        assert_eq!(left, right);
        assert!(std::sync::Arc::ptr_eq(&left.0, &right.0));

        Ok(())
    }

    #[test]
    fn display() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let z = ff.make_integer_type();
        let nested = ff.make_product_type(z.clone(), ff.make_product_type(z.clone(), z.clone())?)?;
        let left = ff.make_product_type(ff.make_product_type(z.clone(), z.clone())?, z.clone())?;

        assert_eq!(nested.to_string(), "ℤ×(ℤ×ℤ)");
        assert_eq!(left.to_string(), "ℤ×ℤ×ℤ");
        assert_eq!(ff.make_power_set_type(ff.make_boolean_type())?.to_string(), "ℙ(BOOL)");

        Ok(())
    }

    #[test]
    fn relational_accessors() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let s = ff.make_given_type("S")?;
        let rel = ff.make_relational_type(s.clone(), ff.make_boolean_type())?;

        assert_eq!(rel.source(), Some(&s));
        assert_eq!(rel.target(), Some(&ff.make_boolean_type()));
        assert!(!s.is_relational());
        assert_eq!(rel.given_types().into_iter().collect::<Vec<_>>(), vec!["S".to_string()]);

        Ok(())
    }
}
