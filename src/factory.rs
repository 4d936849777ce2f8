//! The formula factory.
//!
//! A factory is an immutable language configuration (the base mathematical language plus a set
//! of type-constructor [`Extension`]s) together with the intern table of its types. Factories are
//! canonical: asking twice for the same extension set returns the same factory. Every node and
//! type records the factory that built it, and constructors refuse to combine components of
//! different factories.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use nonempty::NonEmpty;
use num_bigint::BigInt;
use tracing::debug;

use crate::environment::TypeEnvironment;
use crate::error::FormulaError;
use crate::expressions::{
    Assignment, AssignmentKind, BoundIdentDecl, Expression, ExpressionKind, Predicate, PredicateKind,
};
use crate::location::SourceLocation;
use crate::operators::{
    AssociativeOp, AssociativePredicateOp, AtomicOp, BinaryOp, BinaryPredicateOp, LiteralOp, QuantifiedForm,
    QuantifiedPredicateOp, QuantifierOp, RelationalOp, UnaryOp,
};
use crate::types::{Extension, FactoryId, Type, TypeData, TypeKind};

/// Words that cannot be used as identifier names.
pub(crate) const RESERVED_WORDS: &[&str] = &[
    "BOOL", "TRUE", "FALSE", "bool", "card", "dom", "ran", "finite", "partition", "min", "max", "union", "inter",
    "pred", "succ", "prj1", "prj2", "id", "mod", "NAT", "NAT1", "INT", "POW", "POW1",
];

/// Letters that are operators of the language.
pub(crate) const OPERATOR_LETTERS: &[char] = &['ℕ', 'ℤ', 'ℙ', 'λ'];

/// Check that `name` is a plain or singly primed identifier and not a reserved word.
pub fn is_valid_identifier_name(name: &str) -> bool {
    let unprimed = name.strip_suffix('\'').unwrap_or(name);
    let mut chars = unprimed.chars();

    let valid_start = match chars.next() {
        Some(first) => (first.is_alphabetic() || first == '_') && !OPERATOR_LETTERS.contains(&first),
        None => false,
    };

    valid_start && chars.all(|c| c.is_alphanumeric() || c == '_') && !RESERVED_WORDS.contains(&unprimed)
}

static NEXT_FACTORY_ID: AtomicUsize = AtomicUsize::new(0);
static FACTORIES: OnceLock<Mutex<HashMap<BTreeSet<Extension>, FormulaFactory>>> = OnceLock::new();

struct FactoryInner {
    id: FactoryId,
    extensions: BTreeMap<String, Extension>,
    types: Mutex<HashMap<TypeKind, Type>>,
}

#[derive(Clone)]
pub struct FormulaFactory(Arc<FactoryInner>);

impl FormulaFactory {
    /// The factory of the base mathematical language.
    pub fn default_factory() -> FormulaFactory {
        Self::canonical(BTreeSet::new())
    }

    fn canonical(extensions: BTreeSet<Extension>) -> FormulaFactory {
        let registry = FACTORIES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);

        registry
            .entry(extensions)
            .or_insert_with_key(|extensions| {
                let id = FactoryId(NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed));
                debug!(factory = id.0, extensions = extensions.len(), "created formula factory");

                FormulaFactory(Arc::new(FactoryInner {
                    id,
                    extensions: extensions.iter().map(|ext| (ext.name().to_string(), ext.clone())).collect(),
                    types: Mutex::new(HashMap::new()),
                }))
            })
            .clone()
    }

    /// Factory supporting the extensions of this factory plus `extensions`.
    pub fn with_extensions<I>(&self, extensions: I) -> Result<FormulaFactory, FormulaError>
    where
        I: IntoIterator<Item = Extension>,
    {
        let mut all: BTreeSet<Extension> = self.0.extensions.values().cloned().collect();

        for extension in extensions {
            if !is_valid_identifier_name(extension.name()) || extension.name().ends_with('\'') {
                return Err(FormulaError::illegal_argument(format!(
                    "invalid extension name {}",
                    extension.name()
                )));
            }

            if extension.arity() == 0 {
                return Err(FormulaError::illegal_argument(format!(
                    "extension {} must take at least one parameter",
                    extension.name()
                )));
            }

            if all.iter().any(|ext| ext.name() == extension.name() && ext != &extension) {
                return Err(FormulaError::illegal_argument(format!(
                    "extension {} is already defined with another arity",
                    extension.name()
                )));
            }

            all.insert(extension);
        }

        Ok(Self::canonical(all))
    }

    pub fn id(&self) -> FactoryId {
        self.0.id
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.0.extensions.values()
    }

    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.0.extensions.get(name)
    }

    pub fn make_type_environment(&self) -> TypeEnvironment {
        TypeEnvironment::new(self.clone())
    }

    fn adopt(&self, factory: FactoryId) -> Result<(), FormulaError> {
        if factory == self.id() {
            Ok(())
        } else {
            Err(FormulaError::FactoryMismatch)
        }
    }

    fn adopt_type(&self, ty: &Type) -> Result<(), FormulaError> {
        self.adopt(ty.factory_id())
    }

    // Types

    pub(crate) fn intern(&self, kind: TypeKind) -> Type {
        let mut types = self.0.types.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ty) = types.get(&kind) {
            return ty.clone();
        }

        let ty = Type(Arc::new(TypeData {
            kind: kind.clone(),
            factory: self.id(),
        }));
        types.insert(kind, ty.clone());
        ty
    }

    pub(crate) fn pow(&self, base: Type) -> Type {
        self.intern(TypeKind::PowerSet(base))
    }

    pub(crate) fn prod(&self, left: Type, right: Type) -> Type {
        self.intern(TypeKind::Product(left, right))
    }

    pub(crate) fn rel(&self, left: Type, right: Type) -> Type {
        let product = self.prod(left, right);
        self.pow(product)
    }

    pub fn make_integer_type(&self) -> Type {
        self.intern(TypeKind::Integer)
    }

    pub fn make_boolean_type(&self) -> Type {
        self.intern(TypeKind::Boolean)
    }

    pub fn make_given_type(&self, name: &str) -> Result<Type, FormulaError> {
        if !is_valid_identifier_name(name) || name.ends_with('\'') {
            return Err(FormulaError::illegal_argument(format!("invalid given type name {}", name)));
        }

        Ok(self.intern(TypeKind::Given(name.to_string())))
    }

    pub fn make_power_set_type(&self, base: Type) -> Result<Type, FormulaError> {
        self.adopt_type(&base)?;
        Ok(self.pow(base))
    }

    pub fn make_product_type(&self, left: Type, right: Type) -> Result<Type, FormulaError> {
        self.adopt_type(&left)?;
        self.adopt_type(&right)?;
        Ok(self.prod(left, right))
    }

    /// The type `ℙ(left×right)` of relations.
    pub fn make_relational_type(&self, left: Type, right: Type) -> Result<Type, FormulaError> {
        self.adopt_type(&left)?;
        self.adopt_type(&right)?;
        Ok(self.rel(left, right))
    }

    pub fn make_parametric_type(&self, extension: &Extension, args: Vec<Type>) -> Result<Type, FormulaError> {
        if self.extension(extension.name()) != Some(extension) {
            return Err(FormulaError::illegal_argument(format!(
                "extension {} is not supported by this factory",
                extension.name()
            )));
        }

        if args.len() != extension.arity() {
            return Err(FormulaError::InvalidArity {
                operator: "parametric type",
                expected: "as many as the extension arity",
                actual: args.len(),
            });
        }

        for arg in &args {
            self.adopt_type(arg)?;
        }

        Ok(self.intern(TypeKind::Parametric(extension.clone(), args)))
    }

    // Leaves

    pub fn make_free_identifier(
        &self,
        name: &str,
        location: Option<SourceLocation>,
        ty: Option<Type>,
    ) -> Result<Expression, FormulaError> {
        if !is_valid_identifier_name(name) {
            return Err(FormulaError::illegal_argument(format!("invalid identifier name {}", name)));
        }

        if let Some(ty) = &ty {
            self.adopt_type(ty)?;
        }

        let checked = ty.is_some();
        let kind = ExpressionKind::FreeIdentifier(name.to_string());
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_bound_identifier(
        &self,
        index: usize,
        location: Option<SourceLocation>,
        ty: Option<Type>,
    ) -> Result<Expression, FormulaError> {
        if let Some(ty) = &ty {
            self.adopt_type(ty)?;
        }

        let checked = ty.is_some();
        let kind = ExpressionKind::BoundIdentifier(index);
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_integer_literal(&self, value: BigInt, location: Option<SourceLocation>) -> Expression {
        let ty = self.make_integer_type();
        Expression::from_parts(ExpressionKind::IntegerLiteral(value), Some(ty), location, true, self.id())
    }

    /// Make an atomic expression.
    ///
    /// Generic atoms (`∅`, `id`, `prj1`, `prj2`) accept an optional type that must have the
    /// shape required by the atom; the other atoms have a fixed type and accept no other.
    pub fn make_atomic_expression(
        &self,
        op: AtomicOp,
        location: Option<SourceLocation>,
        ty: Option<Type>,
    ) -> Result<Expression, FormulaError> {
        if let Some(ty) = &ty {
            self.adopt_type(ty)?;
        }

        let ty = match (self.atomic_type(op), ty) {
            (Some(fixed), None) => Some(fixed),
            (Some(fixed), Some(given)) if fixed == given => Some(fixed),
            (Some(_), Some(given)) | (None, Some(given)) if !is_generic_atom_type(op, &given) => {
                return Err(FormulaError::IllegalTag {
                    operator: op.glyph(),
                    found: given.to_string(),
                });
            }
            (_, given) => given,
        };

        let checked = ty.is_some();
        Ok(Expression::from_parts(ExpressionKind::Atomic(op), ty, location, checked, self.id()))
    }

    fn atomic_type(&self, op: AtomicOp) -> Option<Type> {
        let integer = || self.make_integer_type();

        match op {
            AtomicOp::Integer | AtomicOp::Natural | AtomicOp::Natural1 => Some(self.pow(integer())),
            AtomicOp::Bool => Some(self.pow(self.make_boolean_type())),
            AtomicOp::True | AtomicOp::False => Some(self.make_boolean_type()),
            AtomicOp::Pred | AtomicOp::Succ => Some(self.rel(integer(), integer())),
            AtomicOp::EmptySet | AtomicOp::Prj1 | AtomicOp::Prj2 | AtomicOp::Id => None,
        }
    }

    /// Make the empty set of the given power-set type.
    pub fn make_empty_set(&self, ty: Option<Type>, location: Option<SourceLocation>) -> Result<Expression, FormulaError> {
        self.make_atomic_expression(AtomicOp::EmptySet, location, ty)
    }

    pub fn make_bound_ident_decl(
        &self,
        name: &str,
        location: Option<SourceLocation>,
        ty: Option<Type>,
    ) -> Result<BoundIdentDecl, FormulaError> {
        if !is_valid_identifier_name(name) {
            return Err(FormulaError::illegal_argument(format!("invalid identifier name {}", name)));
        }

        if let Some(ty) = &ty {
            self.adopt_type(ty)?;
        }

        Ok(BoundIdentDecl::from_parts(name.to_string(), ty, location, self.id()))
    }

    pub fn make_literal_predicate(&self, op: LiteralOp, location: Option<SourceLocation>) -> Predicate {
        Predicate::from_parts(PredicateKind::Literal(op), location, true, self.id())
    }

    pub fn make_predicate_variable(&self, name: &str, location: Option<SourceLocation>) -> Result<Predicate, FormulaError> {
        let valid = name
            .strip_prefix('$')
            .map_or(false, |rest| is_valid_identifier_name(rest) && !rest.ends_with('\''));

        if !valid {
            return Err(FormulaError::illegal_argument(format!("invalid predicate variable {}", name)));
        }

        Ok(Predicate::from_parts(
            PredicateKind::Variable(name.to_string()),
            location,
            true,
            self.id(),
        ))
    }

    // Composite expressions

    pub fn make_set_extension(
        &self,
        members: Vec<Expression>,
        location: Option<SourceLocation>,
        ty: Option<Type>,
    ) -> Result<Expression, FormulaError> {
        for member in &members {
            self.adopt(member.factory_id())?;
        }

        let ty = if members.is_empty() {
            match ty {
                Some(ty) => {
                    self.adopt_type(&ty)?;
                    if ty.base_type().is_none() {
                        return Err(FormulaError::IllegalTag {
                            operator: "{}",
                            found: ty.to_string(),
                        });
                    }
                    Some(ty)
                }
                None => None,
            }
        } else {
            same_type(&members).map(|ty| self.pow(ty.clone()))
        };

        let checked = ty.is_some() && members.iter().all(Expression::is_type_checked);
        let kind = ExpressionKind::SetExtension(members);
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_unary_expression(
        &self,
        op: UnaryOp,
        child: Expression,
        location: Option<SourceLocation>,
    ) -> Result<Expression, FormulaError> {
        self.adopt(child.factory_id())?;

        let ty = child.ty().and_then(|ty| self.synthesize_unary(op, ty));
        let checked = ty.is_some() && child.is_type_checked();
        Ok(Expression::from_parts(ExpressionKind::Unary(op, child), ty, location, checked, self.id()))
    }

    pub fn make_binary_expression(
        &self,
        op: BinaryOp,
        left: Expression,
        right: Expression,
        location: Option<SourceLocation>,
    ) -> Result<Expression, FormulaError> {
        self.adopt(left.factory_id())?;
        self.adopt(right.factory_id())?;

        let ty = match (left.ty(), right.ty()) {
            (Some(l), Some(r)) => self.synthesize_binary(op, l, r),
            _ => None,
        };
        let checked = ty.is_some() && left.is_type_checked() && right.is_type_checked();
        let kind = ExpressionKind::Binary(op, left, right);
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_associative_expression(
        &self,
        op: AssociativeOp,
        children: Vec<Expression>,
        location: Option<SourceLocation>,
    ) -> Result<Expression, FormulaError> {
        if children.len() < 2 {
            return Err(FormulaError::InvalidArity {
                operator: op.glyph(),
                expected: "at least 2",
                actual: children.len(),
            });
        }

        for child in &children {
            self.adopt(child.factory_id())?;
        }

        let types: Option<Vec<&Type>> = children.iter().map(Expression::ty).collect();
        let ty = types.and_then(|types| self.synthesize_associative(op, &types));
        let checked = ty.is_some() && children.iter().all(Expression::is_type_checked);
        let kind = ExpressionKind::Associative(op, children);
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_bool_expression(&self, predicate: Predicate, location: Option<SourceLocation>) -> Result<Expression, FormulaError> {
        self.adopt(predicate.factory_id())?;

        let checked = predicate.is_type_checked();
        let ty = checked.then(|| self.make_boolean_type());
        Ok(Expression::from_parts(ExpressionKind::Bool(predicate), ty, location, checked, self.id()))
    }

    pub fn make_quantified_expression(
        &self,
        op: QuantifierOp,
        decls: Vec<BoundIdentDecl>,
        predicate: Predicate,
        expression: Expression,
        form: QuantifiedForm,
        location: Option<SourceLocation>,
    ) -> Result<Expression, FormulaError> {
        let decls = NonEmpty::from_vec(decls).ok_or(FormulaError::InvalidArity {
            operator: op.glyph(),
            expected: "at least 1 declaration",
            actual: 0,
        })?;

        for decl in decls.iter() {
            self.adopt(decl.factory_id())?;
        }
        self.adopt(predicate.factory_id())?;
        self.adopt(expression.factory_id())?;

        if form == QuantifiedForm::Lambda && !matches!(expression.kind(), ExpressionKind::Binary(BinaryOp::Mapsto, _, _)) {
            return Err(FormulaError::IllegalTag {
                operator: "λ",
                found: expression.tag().to_string(),
            });
        }

        let ty = expression.ty().and_then(|ty| match op {
            QuantifierOp::Cset => Some(self.pow(ty.clone())),
            QuantifierOp::QUnion | QuantifierOp::QInter => ty.base_type().map(|_| ty.clone()),
        });
        let checked = ty.is_some()
            && decls.iter().all(BoundIdentDecl::is_type_checked)
            && predicate.is_type_checked()
            && expression.is_type_checked();

        let kind = ExpressionKind::Quantified {
            op,
            form,
            decls,
            predicate,
            expression,
        };
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    pub fn make_extended_expression(
        &self,
        extension: &Extension,
        args: Vec<Expression>,
        location: Option<SourceLocation>,
    ) -> Result<Expression, FormulaError> {
        if self.extension(extension.name()) != Some(extension) {
            return Err(FormulaError::illegal_argument(format!(
                "extension {} is not supported by this factory",
                extension.name()
            )));
        }

        if args.len() != extension.arity() {
            return Err(FormulaError::InvalidArity {
                operator: "extension",
                expected: "as many as the extension arity",
                actual: args.len(),
            });
        }

        for arg in &args {
            self.adopt(arg.factory_id())?;
        }

        let bases: Option<Vec<Type>> = args
            .iter()
            .map(|arg| arg.ty().and_then(Type::base_type).cloned())
            .collect();
        let ty = bases.map(|bases| self.pow(self.intern(TypeKind::Parametric(extension.clone(), bases))));
        let checked = ty.is_some() && args.iter().all(Expression::is_type_checked);
        let kind = ExpressionKind::Extended(extension.clone(), args);
        Ok(Expression::from_parts(kind, ty, location, checked, self.id()))
    }

    // Predicates

    pub fn make_not(&self, child: Predicate, location: Option<SourceLocation>) -> Result<Predicate, FormulaError> {
        self.adopt(child.factory_id())?;

        let checked = child.is_type_checked();
        Ok(Predicate::from_parts(PredicateKind::Not(child), location, checked, self.id()))
    }

    pub fn make_binary_predicate(
        &self,
        op: BinaryPredicateOp,
        left: Predicate,
        right: Predicate,
        location: Option<SourceLocation>,
    ) -> Result<Predicate, FormulaError> {
        self.adopt(left.factory_id())?;
        self.adopt(right.factory_id())?;

        let checked = left.is_type_checked() && right.is_type_checked();
        let kind = PredicateKind::Binary(op, left, right);
        Ok(Predicate::from_parts(kind, location, checked, self.id()))
    }

    pub fn make_associative_predicate(
        &self,
        op: AssociativePredicateOp,
        children: Vec<Predicate>,
        location: Option<SourceLocation>,
    ) -> Result<Predicate, FormulaError> {
        if children.len() < 2 {
            return Err(FormulaError::InvalidArity {
                operator: op.glyph(),
                expected: "at least 2",
                actual: children.len(),
            });
        }

        for child in &children {
            self.adopt(child.factory_id())?;
        }

        let checked = children.iter().all(Predicate::is_type_checked);
        let kind = PredicateKind::Associative(op, children);
        Ok(Predicate::from_parts(kind, location, checked, self.id()))
    }

    pub fn make_relational_predicate(
        &self,
        op: RelationalOp,
        left: Expression,
        right: Expression,
        location: Option<SourceLocation>,
    ) -> Result<Predicate, FormulaError> {
        self.adopt(left.factory_id())?;
        self.adopt(right.factory_id())?;

        let well_typed = match (left.ty(), right.ty()) {
            (Some(l), Some(r)) => relational_types_match(op, l, r),
            _ => false,
        };
        let checked = well_typed && left.is_type_checked() && right.is_type_checked();
        let kind = PredicateKind::Relational(op, left, right);
        Ok(Predicate::from_parts(kind, location, checked, self.id()))
    }

    pub fn make_quantified_predicate(
        &self,
        op: QuantifiedPredicateOp,
        decls: Vec<BoundIdentDecl>,
        body: Predicate,
        location: Option<SourceLocation>,
    ) -> Result<Predicate, FormulaError> {
        let decls = NonEmpty::from_vec(decls).ok_or(FormulaError::InvalidArity {
            operator: op.glyph(),
            expected: "at least 1 declaration",
            actual: 0,
        })?;

        for decl in decls.iter() {
            self.adopt(decl.factory_id())?;
        }
        self.adopt(body.factory_id())?;

        let checked = decls.iter().all(BoundIdentDecl::is_type_checked) && body.is_type_checked();
        let kind = PredicateKind::Quantified(op, decls, body);
        Ok(Predicate::from_parts(kind, location, checked, self.id()))
    }

    pub fn make_finite(&self, child: Expression, location: Option<SourceLocation>) -> Result<Predicate, FormulaError> {
        self.adopt(child.factory_id())?;

        let checked = child.is_type_checked() && child.ty().and_then(Type::base_type).is_some();
        Ok(Predicate::from_parts(PredicateKind::Finite(child), location, checked, self.id()))
    }

    pub fn make_partition(&self, children: Vec<Expression>, location: Option<SourceLocation>) -> Result<Predicate, FormulaError> {
        if children.is_empty() {
            return Err(FormulaError::InvalidArity {
                operator: "partition",
                expected: "at least 1",
                actual: 0,
            });
        }

        for child in &children {
            self.adopt(child.factory_id())?;
        }

        let checked = same_type(&children).map_or(false, |ty| ty.base_type().is_some())
            && children.iter().all(Expression::is_type_checked);
        Ok(Predicate::from_parts(PredicateKind::Partition(children), location, checked, self.id()))
    }

    // Assignments

    fn check_assigned(&self, identifiers: &[Expression], operator: &'static str) -> Result<(), FormulaError> {
        let mut seen = BTreeSet::new();

        for ident in identifiers {
            self.adopt(ident.factory_id())?;

            let name = ident.identifier_name().ok_or_else(|| FormulaError::IllegalTag {
                operator,
                found: ident.tag().to_string(),
            })?;

            if !seen.insert(name) {
                return Err(FormulaError::illegal_argument(format!("{} is assigned twice", name)));
            }
        }

        Ok(())
    }

    pub fn make_becomes_equal_to(
        &self,
        identifiers: Vec<Expression>,
        values: Vec<Expression>,
        location: Option<SourceLocation>,
    ) -> Result<Assignment, FormulaError> {
        self.check_assigned(&identifiers, "≔")?;

        if identifiers.len() != values.len() {
            return Err(FormulaError::illegal_argument(format!(
                "{} identifier(s) assigned {} value(s)",
                identifiers.len(),
                values.len()
            )));
        }

        for value in &values {
            self.adopt(value.factory_id())?;
        }

        let checked = identifiers.iter().zip(&values).all(|(ident, value)| {
            ident.is_type_checked() && value.is_type_checked() && ident.ty() == value.ty()
        });

        let identifiers = NonEmpty::from_vec(identifiers).ok_or(FormulaError::InvalidArity {
            operator: "≔",
            expected: "at least 1",
            actual: 0,
        })?;
        let values = NonEmpty::from_vec(values).ok_or(FormulaError::InvalidArity {
            operator: "≔",
            expected: "at least 1",
            actual: 0,
        })?;

        let kind = AssignmentKind::BecomesEqualTo { identifiers, values };
        Ok(Assignment::from_parts(kind, location, checked, self.id()))
    }

    pub fn make_becomes_member_of(
        &self,
        identifier: Expression,
        set: Expression,
        location: Option<SourceLocation>,
    ) -> Result<Assignment, FormulaError> {
        self.check_assigned(std::slice::from_ref(&identifier), ":∈")?;
        self.adopt(set.factory_id())?;

        let checked = identifier.is_type_checked()
            && set.is_type_checked()
            && identifier.ty().is_some()
            && identifier.ty() == set.ty().and_then(Type::base_type);

        let kind = AssignmentKind::BecomesMemberOf { identifier, set };
        Ok(Assignment::from_parts(kind, location, checked, self.id()))
    }

    /// Make `x,y :∣ P` where `primed` declares `x'`, `y'` bound in `condition`.
    pub fn make_becomes_such_that(
        &self,
        identifiers: Vec<Expression>,
        primed: Vec<BoundIdentDecl>,
        condition: Predicate,
        location: Option<SourceLocation>,
    ) -> Result<Assignment, FormulaError> {
        self.check_assigned(&identifiers, ":∣")?;

        if identifiers.len() != primed.len() {
            return Err(FormulaError::illegal_argument(format!(
                "{} identifier(s) but {} primed declaration(s)",
                identifiers.len(),
                primed.len()
            )));
        }

        for decl in &primed {
            self.adopt(decl.factory_id())?;
        }
        self.adopt(condition.factory_id())?;

        let checked = identifiers
            .iter()
            .zip(&primed)
            .all(|(ident, decl)| ident.is_type_checked() && decl.ty().is_some() && ident.ty() == decl.ty())
            && condition.is_type_checked();

        let identifiers = NonEmpty::from_vec(identifiers).ok_or(FormulaError::InvalidArity {
            operator: ":∣",
            expected: "at least 1",
            actual: 0,
        })?;
        let primed = NonEmpty::from_vec(primed).ok_or(FormulaError::InvalidArity {
            operator: ":∣",
            expected: "at least 1",
            actual: 0,
        })?;

        let kind = AssignmentKind::BecomesSuchThat {
            identifiers,
            primed,
            condition,
        };
        Ok(Assignment::from_parts(kind, location, checked, self.id()))
    }

    // Type synthesis

    fn synthesize_unary(&self, op: UnaryOp, ty: &Type) -> Option<Type> {
        match op {
            UnaryOp::Card => ty.base_type().map(|_| self.make_integer_type()),
            UnaryOp::Pow | UnaryOp::Pow1 => ty.base_type().map(|_| self.pow(ty.clone())),
            UnaryOp::Union | UnaryOp::Inter => ty.base_type().filter(|base| base.base_type().is_some()).cloned(),
            UnaryOp::Dom => ty.source().map(|source| self.pow(source.clone())),
            UnaryOp::Ran => ty.target().map(|target| self.pow(target.clone())),
            UnaryOp::Min | UnaryOp::Max => ty
                .base_type()
                .filter(|base| base.is_integer())
                .map(|_| self.make_integer_type()),
            UnaryOp::Converse => match (ty.source(), ty.target()) {
                (Some(source), Some(target)) => Some(self.rel(target.clone(), source.clone())),
                _ => None,
            },
            UnaryOp::UnMinus => ty.is_integer().then(|| ty.clone()),
        }
    }

    fn synthesize_binary(&self, op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
        use BinaryOp::*;

        match op {
            Mapsto => Some(self.prod(left.clone(), right.clone())),
            _ if op.is_relation_set() => match (left.base_type(), right.base_type()) {
                (Some(l), Some(r)) => Some(self.pow(self.rel(l.clone(), r.clone()))),
                _ => None,
            },
            SetMinus => (left == right && left.base_type().is_some()).then(|| left.clone()),
            Cprod => match (left.base_type(), right.base_type()) {
                (Some(l), Some(r)) => Some(self.rel(l.clone(), r.clone())),
                _ => None,
            },
            Dprod => match (left.source(), left.target(), right.source(), right.target()) {
                (Some(a), Some(b), Some(a2), Some(c)) if a == a2 => {
                    Some(self.rel(a.clone(), self.prod(b.clone(), c.clone())))
                }
                _ => None,
            },
            Pprod => match (left.source(), left.target(), right.source(), right.target()) {
                (Some(a), Some(b), Some(c), Some(d)) => Some(self.rel(
                    self.prod(a.clone(), c.clone()),
                    self.prod(b.clone(), d.clone()),
                )),
                _ => None,
            },
            DomRes | DomSub => match (left.base_type(), right.source()) {
                (Some(set), Some(source)) if set == source => Some(right.clone()),
                _ => None,
            },
            RanRes | RanSub => match (left.target(), right.base_type()) {
                (Some(target), Some(set)) if target == set => Some(left.clone()),
                _ => None,
            },
            UpTo => (left.is_integer() && right.is_integer()).then(|| self.pow(left.clone())),
            Minus | Div | Mod | Expn => (left.is_integer() && right.is_integer()).then(|| left.clone()),
            FunImage => match (left.source(), left.target()) {
                (Some(source), Some(target)) if source == right => Some(target.clone()),
                _ => None,
            },
            RelImage => match (left.source(), left.target(), right.base_type()) {
                (Some(source), Some(target), Some(set)) if source == set => Some(self.pow(target.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    fn synthesize_associative(&self, op: AssociativeOp, types: &[&Type]) -> Option<Type> {
        let first = *types.first()?;

        match op {
            AssociativeOp::BUnion | AssociativeOp::BInter => {
                (first.base_type().is_some() && types.iter().all(|ty| *ty == first)).then(|| first.clone())
            }
            AssociativeOp::Ovr => (first.is_relational() && types.iter().all(|ty| *ty == first)).then(|| first.clone()),
            AssociativeOp::Plus | AssociativeOp::Mul => {
                types.iter().all(|ty| ty.is_integer()).then(|| first.clone())
            }
            AssociativeOp::FComp => self.compose(types.iter().copied()),
            AssociativeOp::BComp => self.compose(types.iter().rev().copied()),
        }
    }

    /// Type of the forward composition of relations given in application order.
    fn compose<'a, I>(&self, types: I) -> Option<Type>
    where
        I: Iterator<Item = &'a Type>,
    {
        let mut source: Option<Type> = None;
        let mut target: Option<Type> = None;

        for ty in types {
            let (s, t) = (ty.source()?, ty.target()?);
            match &target {
                Some(previous) if previous != s => return None,
                Some(_) => {}
                None => source = Some(s.clone()),
            }
            target = Some(t.clone());
        }

        Some(self.rel(source?, target?))
    }
}

impl PartialEq for FormulaFactory {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for FormulaFactory {}

impl Debug for FormulaFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaFactory")
            .field("id", &self.0.id.0)
            .field("extensions", &self.0.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Common type of all expressions, when they are typed and agree.
fn same_type(expressions: &[Expression]) -> Option<&Type> {
    let first = expressions.first()?.ty()?;
    expressions
        .iter()
        .all(|expr| expr.ty() == Some(first))
        .then_some(first)
}

pub(crate) fn relational_types_match(op: RelationalOp, left: &Type, right: &Type) -> bool {
    use RelationalOp::*;

    match op {
        Equal | NotEqual => left == right,
        Lt | Le | Gt | Ge => left.is_integer() && right.is_integer(),
        In | NotIn => right.base_type() == Some(left),
        Subset | NotSubset | SubsetEq | NotSubsetEq => left == right && left.base_type().is_some(),
    }
}

fn is_generic_atom_type(op: AtomicOp, ty: &Type) -> bool {
    match op {
        AtomicOp::EmptySet => ty.base_type().is_some(),
        AtomicOp::Id => matches!((ty.source(), ty.target()), (Some(s), Some(t)) if s == t),
        AtomicOp::Prj1 => matches!((ty.source(), ty.target()), (Some(s), Some(t)) if s.left() == Some(t)),
        AtomicOp::Prj2 => matches!((ty.source(), ty.target()), (Some(s), Some(t)) if s.right() == Some(t)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{is_valid_identifier_name, FormulaFactory};
    use crate::error::FormulaError;
    use crate::operators::{AssociativeOp, AtomicOp, BinaryOp, RelationalOp};
    use crate::types::Extension;

    #[test]
    fn identifier_names() {
        assert!(is_valid_identifier_name("x"));
        assert!(is_valid_identifier_name("x'"));
        assert!(is_valid_identifier_name("_a1"));
        assert!(!is_valid_identifier_name("x''"));
        assert!(!is_valid_identifier_name("1x"));
        assert!(!is_valid_identifier_name("card"));
        assert!(!is_valid_identifier_name("ℕx"));
        assert!(!is_valid_identifier_name(""));
    }

    #[test]
    fn canonical_factories() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let list = Extension::new("List", 1);
        let ext1 = ff.with_extensions([list.clone()])?;
        let ext2 = ff.with_extensions([list])?;

        assert_eq!(ff, FormulaFactory::default_factory());
        assert_eq!(ext1, ext2);
        assert_ne!(ff, ext1);
        assert_ne!(ff.make_integer_type(), ext1.make_integer_type());

        Ok(())
    }

    #[test]
    fn mixing_factories_is_rejected() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let other = ff.with_extensions([Extension::new("Seq", 1)])?;

        let x = ff.make_free_identifier("x", None, Some(ff.make_integer_type()))?;
        let y = other.make_free_identifier("y", None, Some(other.make_integer_type()))?;

        let result = ff.make_associative_expression(AssociativeOp::Plus, vec![x, y], None);
        assert_eq!(result.err(), Some(FormulaError::FactoryMismatch));

        Ok(())
    }

    #[test]
    fn type_synthesis() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let z = ff.make_integer_type();
        let s = ff.make_given_type("S")?;
        let f = ff.make_free_identifier("f", None, Some(ff.make_relational_type(s.clone(), z.clone())?))?;
        let x = ff.make_free_identifier("x", None, Some(s.clone()))?;

        let image = ff.make_binary_expression(BinaryOp::FunImage, f.clone(), x.clone(), None)?;
        assert_eq!(image.ty(), Some(&z));
        assert!(image.is_type_checked());

        let wrong = ff.make_binary_expression(BinaryOp::FunImage, f, image.clone(), None)?;
        assert_eq!(wrong.ty(), None);
        assert!(!wrong.is_type_checked());

        let eq = ff.make_relational_predicate(RelationalOp::Equal, image.clone(), image, None)?;
        assert!(eq.is_type_checked());

        Ok(())
    }

    #[test]
    fn generic_atoms() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let z = ff.make_integer_type();
        let id_type = ff.make_relational_type(z.clone(), z.clone())?;

        assert!(ff.make_atomic_expression(AtomicOp::Id, None, Some(id_type.clone()))?.is_type_checked());
        assert!(ff.make_atomic_expression(AtomicOp::EmptySet, None, Some(z.clone())).is_err());
        assert!(ff.make_atomic_expression(AtomicOp::Integer, None, Some(id_type)).is_err());
        assert!(!ff.make_atomic_expression(AtomicOp::EmptySet, None, None)?.is_type_checked());

        Ok(())
    }

    #[test]
    fn associative_arity() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, None)?;

        let result = ff.make_associative_expression(AssociativeOp::BUnion, vec![x], None);
        assert!(matches!(result, Err(FormulaError::InvalidArity { actual: 1, .. })));

        Ok(())
    }
}
