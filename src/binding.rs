//! Binding, shifting and instantiation of bound identifiers.
//!
//! Bound identifiers are de Bruijn indices: index `i` at binder depth `d` is local when `i < d`
//! and otherwise refers to the `(i - d)`th declaration outside the visited tree, the innermost
//! first. All operations here rewrite the loose indices and leave local ones untouched.

use crate::error::FormulaError;
use crate::expressions::{BoundIdentDecl, Expression, ExpressionKind, Predicate, PredicateKind};
use crate::factory::FormulaFactory;
use crate::formula::{rewrite, Formula, Rewriter};

/// Turns the free identifiers named in `names` into bound identifiers.
///
/// The names are in declaration order, so `names[k]` of `n` becomes index `n - 1 - k`. Loose
/// indices are shifted past the new declarations.
struct Binder<'a> {
    factory: &'a FormulaFactory,
    names: &'a [String],
}

impl Rewriter for Binder<'_> {
    type Error = FormulaError;

    fn factory(&self) -> &FormulaFactory {
        self.factory
    }

    fn rewrite(&mut self, formula: &Formula, depth: usize) -> Result<Option<Formula>, FormulaError> {
        let Formula::Expression(expr) = formula else {
            return Ok(None);
        };

        let count = self.names.len();
        let index = match expr.kind() {
            ExpressionKind::FreeIdentifier(name) => match self.names.iter().position(|bound| bound == name) {
                Some(position) => depth + count - 1 - position,
                None => return Ok(None),
            },
            ExpressionKind::BoundIdentifier(index) if *index >= depth => index + count,
            _ => return Ok(None),
        };

        let bound = self
            .factory
            .make_bound_identifier(index, expr.location().cloned(), expr.ty().cloned())?;
        Ok(Some(bound.into()))
    }
}

/// Replaces the `count` innermost loose declarations by expressions, keeping the others.
///
/// `replacements` is in declaration order. The kept declarations are renumbered and every other
/// loose index is lowered by the number of replaced declarations.
struct Instantiator<'a> {
    factory: &'a FormulaFactory,
    replacements: &'a [Option<Expression>],
    renumbered: Vec<Option<usize>>,
    kept: usize,
}

impl<'a> Instantiator<'a> {
    fn new(factory: &'a FormulaFactory, replacements: &'a [Option<Expression>]) -> Self {
        let count = replacements.len();
        let kept = replacements.iter().filter(|replacement| replacement.is_none()).count();

        // Local index of the kept declarations, innermost (last declared) first.
        let mut renumbered = vec![None; count];
        let mut next = 0;
        for (position, replacement) in replacements.iter().enumerate().rev() {
            if replacement.is_none() {
                renumbered[count - 1 - position] = Some(next);
                next += 1;
            }
        }

        Instantiator {
            factory,
            replacements,
            renumbered,
            kept,
        }
    }
}

impl Rewriter for Instantiator<'_> {
    type Error = FormulaError;

    fn factory(&self) -> &FormulaFactory {
        self.factory
    }

    fn rewrite(&mut self, formula: &Formula, depth: usize) -> Result<Option<Formula>, FormulaError> {
        let Formula::Expression(expr) = formula else {
            return Ok(None);
        };

        let ExpressionKind::BoundIdentifier(index) = expr.kind() else {
            return Ok(None);
        };

        if *index < depth {
            return Ok(None);
        }

        let count = self.replacements.len();
        let local = index - depth;

        let new_index = if local < count {
            if let Some(replacement) = &self.replacements[count - 1 - local] {
                let shifted = shift(&replacement.clone().into(), depth + self.kept, self.factory)?;
                return Ok(Some(shifted));
            }
            depth + self.renumbered[local].unwrap_or(local)
        } else {
            index - count + self.kept
        };

        let bound = self
            .factory
            .make_bound_identifier(new_index, expr.location().cloned(), expr.ty().cloned())?;
        Ok(Some(bound.into()))
    }
}

struct Shifter<'a> {
    factory: &'a FormulaFactory,
    offset: usize,
}

impl Rewriter for Shifter<'_> {
    type Error = FormulaError;

    fn factory(&self) -> &FormulaFactory {
        self.factory
    }

    fn rewrite(&mut self, formula: &Formula, depth: usize) -> Result<Option<Formula>, FormulaError> {
        match formula {
            Formula::Expression(expr) => match expr.kind() {
                ExpressionKind::BoundIdentifier(index) if *index >= depth => {
                    let bound = self.factory.make_bound_identifier(
                        index + self.offset,
                        expr.location().cloned(),
                        expr.ty().cloned(),
                    )?;
                    Ok(Some(bound.into()))
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

fn shift(formula: &Formula, offset: usize, factory: &FormulaFactory) -> Result<Formula, FormulaError> {
    if offset == 0 && formula.factory_id() == factory.id() {
        return Ok(formula.clone());
    }

    rewrite(formula, 0, &mut Shifter { factory, offset })
}

/// Bind the free identifiers named in `names`, given in declaration order.
pub(crate) fn bind_names(formula: &Formula, names: &[String], factory: &FormulaFactory) -> Result<Formula, FormulaError> {
    rewrite(formula, 0, &mut Binder { factory, names })
}

/// Replace the bound identifiers of `count` declarations enclosing `body`.
pub(crate) fn instantiate_body(
    body: &Predicate,
    replacements: &[Option<Expression>],
    factory: &FormulaFactory,
) -> Result<Predicate, FormulaError> {
    let rewritten = rewrite(&body.clone().into(), 0, &mut Instantiator::new(factory, replacements))?;
    rewritten
        .as_predicate()
        .cloned()
        .ok_or_else(|| FormulaError::IllegalState("instantiation changed the category of a predicate".to_string()))
}

impl Formula {
    /// Bind every free identifier.
    ///
    /// The identifiers are declared in name order, with their types, and the returned formula
    /// is meant to be placed under a binder with the returned declarations.
    pub fn bind_all_free_idents(&self, factory: &FormulaFactory) -> Result<(Vec<BoundIdentDecl>, Formula), FormulaError> {
        let idents = self.free_identifiers();
        let decls = idents
            .iter()
            .map(|ident| {
                let name = ident.identifier_name().unwrap_or_default();
                factory.make_bound_ident_decl(name, ident.location().cloned(), ident.ty().cloned())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bound = self.bind_these_idents(&idents, factory)?;
        Ok((decls, bound))
    }

    /// Bind the given free identifiers, the first one being the outermost declaration.
    pub fn bind_these_idents(&self, idents: &[Expression], factory: &FormulaFactory) -> Result<Formula, FormulaError> {
        let names = idents
            .iter()
            .map(|ident| {
                ident.identifier_name().map(str::to_string).ok_or_else(|| FormulaError::IllegalTag {
                    operator: "bind",
                    found: ident.tag().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        bind_names(self, &names, factory)
    }

    /// Add `offset` to every loose bound identifier.
    pub fn shift_bound_identifiers(&self, offset: usize, factory: &FormulaFactory) -> Result<Formula, FormulaError> {
        shift(self, offset, factory)
    }
}

impl Predicate {
    /// Instantiate the bound identifiers of a quantified predicate.
    ///
    /// `replacements` has one entry per declaration, in declaration order; declarations with no
    /// replacement stay quantified. When every declaration is replaced the body is returned.
    pub fn instantiate(&self, replacements: &[Option<Expression>], factory: &FormulaFactory) -> Result<Predicate, FormulaError> {
        let PredicateKind::Quantified(op, decls, body) = self.kind() else {
            return Err(FormulaError::IllegalTag {
                operator: "instantiate",
                found: self.tag().to_string(),
            });
        };

        if replacements.len() != decls.len() {
            return Err(FormulaError::InvalidArity {
                operator: "instantiate",
                expected: "one replacement per declaration",
                actual: replacements.len(),
            });
        }

        let instantiated = instantiate_body(body, replacements, factory)?;
        let kept: Vec<BoundIdentDecl> = decls
            .iter()
            .zip(replacements)
            .filter(|(_, replacement)| replacement.is_none())
            .map(|(decl, _)| decl.clone())
            .collect();

        if kept.is_empty() {
            Ok(instantiated)
        } else {
            factory.make_quantified_predicate(*op, kept, instantiated, self.location().cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;
    use crate::formula::Formula;
    use crate::operators::{QuantifiedPredicateOp, RelationalOp};

    #[test]
    fn bind_in_declaration_order() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, None)?;
        let y = ff.make_free_identifier("y", None, None)?;
        let pred = Formula::from(ff.make_relational_predicate(RelationalOp::Equal, x.clone(), y.clone(), None)?);

        let (decls, bound) = pred.bind_all_free_idents(&ff)?;
        let names: Vec<&str> = decls.iter().map(|decl| decl.name()).collect();
        assert_eq!(names, vec!["x", "y"]);

        let expected = ff.make_relational_predicate(
            RelationalOp::Equal,
            ff.make_bound_identifier(1, None, None)?,
            ff.make_bound_identifier(0, None, None)?,
            None,
        )?;
        assert_eq!(bound, Formula::from(expected));

        let only_y = pred.bind_these_idents(&[y], &ff)?;
        assert_eq!(only_y.free_identifiers(), vec![x]);
        assert_eq!(only_y.bound_identifiers(), vec![0]);

        Ok(())
    }

    #[test]
    fn instantiate_some_declarations() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let decls = vec![
            ff.make_bound_ident_decl("x", None, None)?,
            ff.make_bound_ident_decl("y", None, None)?,
        ];
        // ∀x,y·x=y ∧ x=[[0]]
        let body = ff.make_relational_predicate(
            RelationalOp::Equal,
            ff.make_bound_identifier(1, None, None)?,
            ff.make_bound_identifier(2, None, None)?,
            None,
        )?;
        let pred = ff.make_quantified_predicate(QuantifiedPredicateOp::ForAll, decls, body, None)?;
        let a = ff.make_free_identifier("a", None, None)?;

        let instantiated = pred.instantiate(&[Some(a.clone()), None], &ff)?;
        let expected_body = ff.make_relational_predicate(
            RelationalOp::Equal,
            a,
            ff.make_bound_identifier(1, None, None)?,
            None,
        )?;
        let expected = ff.make_quantified_predicate(
            QuantifiedPredicateOp::ForAll,
            vec![ff.make_bound_ident_decl("y", None, None)?],
            expected_body,
            None,
        )?;
        assert_eq!(instantiated, expected);

        Ok(())
    }

    #[test]
    fn shift_loose_indices_only() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let loose = Formula::from(ff.make_bound_identifier(0, None, None)?);

        let shifted = loose.shift_bound_identifiers(2, &ff)?;
        assert_eq!(shifted.bound_identifiers(), vec![2]);

        Ok(())
    }
}
