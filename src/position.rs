//! Addressing of sub-formulas.
//!
//! A [`Position`] is the path of child indices leading from the root of a formula to one of its
//! nodes, written `"1.0.2"`; the root is the empty path. Children are numbered as returned by
//! [`Formula::children`], so the declarations of a binder come before its body.
//!
//! Positions are ordered lexicographically, a position coming before all the positions below it.
//! This is the order in which a pre-order traversal visits the nodes.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{FormulaError, PositionError};
use crate::factory::FormulaFactory;
use crate::formula::Formula;
use crate::operators::Tag;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position(Vec<usize>);

impl Position {
    pub fn root() -> Position {
        Position(Vec::new())
    }

    pub fn new(indices: impl Into<Vec<usize>>) -> Position {
        Position(indices.into())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn parent(&self) -> Result<Position, PositionError> {
        match self.0.split_last() {
            Some((_, parent)) => Ok(Position(parent.to_vec())),
            None => Err(PositionError::RootHasNoParent),
        }
    }

    pub fn first_child(&self) -> Position {
        self.child(0)
    }

    pub fn child(&self, index: usize) -> Position {
        let mut indices = self.0.clone();
        indices.push(index);
        Position(indices)
    }

    /// Index of this position among the children of its parent.
    pub fn child_index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn is_first_child(&self) -> bool {
        self.child_index() == Some(0)
    }

    pub fn next_sibling(&self) -> Result<Position, PositionError> {
        let mut indices = self.0.clone();
        match indices.last_mut() {
            Some(last) => {
                *last += 1;
                Ok(Position(indices))
            }
            None => Err(PositionError::RootHasNoSibling),
        }
    }

    pub fn previous_sibling(&self) -> Result<Position, PositionError> {
        let mut indices = self.0.clone();
        match indices.last_mut() {
            Some(0) => Err(PositionError::NoPreviousSibling(self.to_string())),
            Some(last) => {
                *last -= 1;
                Ok(Position(indices))
            }
            None => Err(PositionError::RootHasNoSibling),
        }
    }

    /// Whether `other` is this position or lies below it.
    pub fn is_prefix_of(&self, other: &Position) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Position::root());
        }

        s.split('.')
            .map(|index| index.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map(Position)
            .map_err(|_| PositionError::Malformed(s.to_string()))
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (count, index) in self.0.iter().enumerate() {
            if count > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }

        Ok(())
    }
}

fn collect_positions<F>(formula: &Formula, position: &mut Vec<usize>, filter: &mut F, positions: &mut Vec<Position>)
where
    F: FnMut(Tag, &Formula) -> bool,
{
    if filter(formula.tag(), formula) {
        positions.push(Position(position.clone()));
    }

    for (index, child) in formula.children().iter().enumerate() {
        position.push(index);
        collect_positions(child, position, filter, positions);
        position.pop();
    }
}

fn replace_at(
    formula: &Formula,
    path: &[usize],
    replacement: Formula,
    factory: &FormulaFactory,
) -> Result<Formula, FormulaError> {
    let Some((&index, rest)) = path.split_first() else {
        return Ok(replacement);
    };

    let mut children = formula.children();
    let child = children
        .get(index)
        .ok_or_else(|| FormulaError::illegal_argument(format!("{} has no child {}", formula.tag(), index)))?;
    let rewritten = replace_at(child, rest, replacement, factory)?;
    children[index] = rewritten;

    formula.with_children(children, factory)
}

impl Formula {
    /// Positions of the nodes retained by `filter`, in pre-order.
    pub fn get_positions<F>(&self, mut filter: F) -> Vec<Position>
    where
        F: FnMut(Tag, &Formula) -> bool,
    {
        let mut positions = Vec::new();
        collect_positions(self, &mut Vec::new(), &mut filter, &mut positions);
        positions
    }

    pub fn get_sub_formula(&self, position: &Position) -> Option<Formula> {
        position
            .indices()
            .iter()
            .try_fold(self.clone(), |node, &index| node.children().get(index).cloned())
    }

    /// Copy of this formula where the node at `position` is `replacement`.
    ///
    /// The replacement must be of the same category as the replaced node and, when the replaced
    /// node is typed, of the same type. Its loose bound identifiers refer to the binders
    /// enclosing `position`.
    pub fn rewrite_sub_formula(
        &self,
        position: &Position,
        replacement: Formula,
        factory: &FormulaFactory,
    ) -> Result<Formula, FormulaError> {
        let replaced = self
            .get_sub_formula(position)
            .ok_or_else(|| FormulaError::illegal_argument(format!("no sub-formula at position {}", position)))?;

        if std::mem::discriminant(&replaced) != std::mem::discriminant(&replacement) {
            return Err(FormulaError::IllegalTag {
                operator: "sub-formula rewriting",
                found: replacement.tag().to_string(),
            });
        }

        if let (Some(expected), found) = (replaced.ty(), replacement.ty()) {
            if found != Some(expected) {
                return Err(FormulaError::illegal_argument(format!(
                    "replacement of type {} for {} of type {}",
                    found.map_or_else(|| "unknown".to_string(), ToString::to_string),
                    replaced,
                    expected
                )));
            }
        }

        if replacement.factory_id() != factory.id() {
            return Err(FormulaError::FactoryMismatch);
        }

        replace_at(self, position.indices(), replacement, factory)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use proptest::prelude::*;

    use super::Position;
    use crate::error::PositionError;
    use crate::factory::FormulaFactory;
    use crate::formula::Formula;
    use crate::operators::{AssociativeOp, Tag};

    #[test]
    fn navigation() -> Result<(), Box<dyn Error>> {
        let position: Position = "1.0.2".parse()?;
        assert_eq!(position.to_string(), "1.0.2");
        assert_eq!(position.parent()?, Position::new([1, 0]));
        assert_eq!(position.previous_sibling()?, Position::new([1, 0, 1]));
        assert_eq!(position.next_sibling()?, Position::new([1, 0, 3]));
        assert!(!position.is_first_child());
        assert!(position.first_child().is_first_child());

        assert_eq!(Position::root().parent(), Err(PositionError::RootHasNoParent));
        assert!(Position::root().next_sibling().is_err());
        assert!(position.parent()?.previous_sibling().is_err());
        assert!("1..2".parse::<Position>().is_err());
        assert!("".parse::<Position>()?.is_root());

        Ok(())
    }

    #[test]
    fn positions_and_rewriting() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, None)?;
        let y = ff.make_free_identifier("y", None, None)?;
        let z = ff.make_free_identifier("z", None, None)?;
        let sum = Formula::from(ff.make_associative_expression(AssociativeOp::Plus, vec![x, y.clone()], None)?);

        let idents = sum.get_positions(|tag, _| tag == Tag::FreeIdentifier);
        assert_eq!(idents, vec![Position::new([0]), Position::new([1])]);
        assert_eq!(sum.get_sub_formula(&Position::new([1])), Some(Formula::from(y)));
        assert_eq!(sum.get_sub_formula(&Position::new([2])), None);

        let rewritten = sum.rewrite_sub_formula(&Position::new([1]), z.clone().into(), &ff)?;
        assert_eq!(rewritten.to_string(), "x+z");
        assert_eq!(sum.to_string(), "x+y");

        let whole = sum.rewrite_sub_formula(&Position::root(), z.into(), &ff)?;
        assert_eq!(whole.to_string(), "z");

        let truth = ff.make_literal_predicate(crate::operators::LiteralOp::True, None);
        assert!(sum.rewrite_sub_formula(&Position::new([0]), truth.into(), &ff).is_err());

        Ok(())
    }

    fn positions() -> impl Strategy<Value = Position> {
        prop::collection::vec(0usize..4, 0..5).prop_map(Position::new)
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(p in positions(), q in positions()) {
            prop_assert_eq!(p.cmp(&q), q.cmp(&p).reverse());
            prop_assert_eq!(p.cmp(&q) == std::cmp::Ordering::Equal, p == q);
        }

        #[test]
        fn order_is_transitive(p in positions(), q in positions(), r in positions()) {
            if p <= q && q <= r {
                prop_assert!(p <= r);
            }
        }

        #[test]
        fn parents_and_siblings(p in positions()) {
            prop_assert_eq!(p.first_child().parent(), Ok(p.clone()));
            if let Ok(next) = p.next_sibling() {
                prop_assert_eq!(next.parent(), p.parent());
                prop_assert!(p < next);
            }
            if let Ok(parent) = p.parent() {
                prop_assert!(parent < p);
                prop_assert!(parent.is_prefix_of(&p));
            }
        }

        #[test]
        fn text_round_trip(p in positions()) {
            prop_assert_eq!(p.to_string().parse::<Position>(), Ok(p));
        }
    }
}
