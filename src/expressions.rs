//! Formula nodes.
//!
//! Nodes are immutable and reference counted. They are created by a
//! [`FormulaFactory`](crate::factory::FormulaFactory), which validates operand categories and
//! synthesizes the type of a node whenever the types of its operands allow it. "Modifying" a
//! formula always builds a new tree sharing the untouched sub-trees of the original.
//!
//! Equality of nodes is structural and ignores source locations, the names of bound identifier
//! declarations (bound identifiers are de Bruijn indices) and the syntactic form of quantified
//! expressions. Types take part in equality.

mod assignment;
mod conversion;
mod decl;
mod expression;
mod predicate;

pub use assignment::{Assignment, AssignmentKind};
pub use decl::BoundIdentDecl;
pub use expression::{Expression, ExpressionKind};
pub use predicate::{Predicate, PredicateKind};

use std::collections::BTreeMap;
use std::sync::Arc;

/// Merge sorted free identifier lists, keeping the first identifier seen for each name.
pub(crate) fn merge_free_identifiers<'a, I>(lists: I) -> Arc<[Expression]>
where
    I: IntoIterator<Item = &'a [Expression]>,
{
    let mut merged: BTreeMap<String, Expression> = BTreeMap::new();
    for list in lists {
        for ident in list {
            if let ExpressionKind::FreeIdentifier(name) = ident.kind() {
                merged.entry(name.clone()).or_insert_with(|| ident.clone());
            }
        }
    }

    merged.into_values().collect()
}
