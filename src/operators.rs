//! Operators of the mathematical language.
//!
//! Every node of a formula tree is identified by a [`Tag`]. Tags of operator nodes carry the
//! operator itself, which knows its concrete syntax through [`Display`].

use std::fmt::{Display, Formatter};

/// Constant expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomicOp {
    Integer,
    Natural,
    Natural1,
    Bool,
    True,
    False,
    EmptySet,
    Pred,
    Succ,
    Prj1,
    Prj2,
    Id,
}

impl AtomicOp {
    /// Atoms whose type is not fixed by the operator and must be inferred or annotated.
    pub fn is_generic(self) -> bool {
        matches!(self, AtomicOp::EmptySet | AtomicOp::Prj1 | AtomicOp::Prj2 | AtomicOp::Id)
    }

    pub fn glyph(self) -> &'static str {
        match self {
            AtomicOp::Integer => "ℤ",
            AtomicOp::Natural => "ℕ",
            AtomicOp::Natural1 => "ℕ1",
            AtomicOp::Bool => "BOOL",
            AtomicOp::True => "TRUE",
            AtomicOp::False => "FALSE",
            AtomicOp::EmptySet => "∅",
            AtomicOp::Pred => "pred",
            AtomicOp::Succ => "succ",
            AtomicOp::Prj1 => "prj1",
            AtomicOp::Prj2 => "prj2",
            AtomicOp::Id => "id",
        }
    }
}

/// Operators applied to a single expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnaryOp {
    Card,
    Pow,
    Pow1,
    Union,
    Inter,
    Dom,
    Ran,
    Min,
    Max,
    Converse,
    UnMinus,
}

impl UnaryOp {
    pub fn glyph(self) -> &'static str {
        match self {
            UnaryOp::Card => "card",
            UnaryOp::Pow => "ℙ",
            UnaryOp::Pow1 => "ℙ1",
            UnaryOp::Union => "union",
            UnaryOp::Inter => "inter",
            UnaryOp::Dom => "dom",
            UnaryOp::Ran => "ran",
            UnaryOp::Min => "min",
            UnaryOp::Max => "max",
            UnaryOp::Converse => "∼",
            UnaryOp::UnMinus => "−",
        }
    }
}

/// Operators with exactly two expression operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Mapsto,
    Rel,
    TotalRel,
    SurjRel,
    TotalSurjRel,
    PartialFun,
    TotalFun,
    PartialInj,
    TotalInj,
    PartialSurj,
    TotalSurj,
    TotalBij,
    SetMinus,
    Cprod,
    Dprod,
    Pprod,
    DomRes,
    DomSub,
    RanRes,
    RanSub,
    UpTo,
    Minus,
    Div,
    Mod,
    Expn,
    FunImage,
    RelImage,
}

impl BinaryOp {
    /// Operators building sets of relations, like `↔` or `→`.
    pub fn is_relation_set(self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Rel | TotalRel
                | SurjRel
                | TotalSurjRel
                | PartialFun
                | TotalFun
                | PartialInj
                | TotalInj
                | PartialSurj
                | TotalSurj
                | TotalBij
        )
    }

    pub fn glyph(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Mapsto => "↦",
            Rel => "↔",
            TotalRel => "\u{e100}",
            SurjRel => "\u{e101}",
            TotalSurjRel => "\u{e102}",
            PartialFun => "⇸",
            TotalFun => "→",
            PartialInj => "⤔",
            TotalInj => "↣",
            PartialSurj => "⤀",
            TotalSurj => "↠",
            TotalBij => "⤖",
            SetMinus => "∖",
            Cprod => "×",
            Dprod => "⊗",
            Pprod => "∥",
            DomRes => "◁",
            DomSub => "⩤",
            RanRes => "▷",
            RanSub => "⩥",
            UpTo => "‥",
            Minus => "−",
            Div => "÷",
            Mod => "mod",
            Expn => "^",
            FunImage => "()",
            RelImage => "[]",
        }
    }
}

/// Operators accepting two or more operands, flattened when chained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssociativeOp {
    BUnion,
    BInter,
    BComp,
    FComp,
    Ovr,
    Plus,
    Mul,
}

impl AssociativeOp {
    pub fn glyph(self) -> &'static str {
        match self {
            AssociativeOp::BUnion => "∪",
            AssociativeOp::BInter => "∩",
            AssociativeOp::BComp => "∘",
            AssociativeOp::FComp => ";",
            AssociativeOp::Ovr => "\u{e103}",
            AssociativeOp::Plus => "+",
            AssociativeOp::Mul => "∗",
        }
    }
}

/// Binders producing an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuantifierOp {
    Cset,
    QUnion,
    QInter,
}

impl QuantifierOp {
    pub fn glyph(self) -> &'static str {
        match self {
            QuantifierOp::Cset => "{}",
            QuantifierOp::QUnion => "⋃",
            QuantifierOp::QInter => "⋂",
        }
    }
}

/// Concrete syntax a quantified expression was written in.
///
/// The form does not take part in equality: `{x·x∈s∣x}` and `{x∣x∈s}` are the same set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuantifiedForm {
    Explicit,
    Implicit,
    Lambda,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LiteralOp {
    True,
    False,
}

impl LiteralOp {
    pub fn glyph(self) -> &'static str {
        match self {
            LiteralOp::True => "⊤",
            LiteralOp::False => "⊥",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryPredicateOp {
    Implies,
    Equivalent,
}

impl BinaryPredicateOp {
    pub fn glyph(self) -> &'static str {
        match self {
            BinaryPredicateOp::Implies => "⇒",
            BinaryPredicateOp::Equivalent => "⇔",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssociativePredicateOp {
    And,
    Or,
}

impl AssociativePredicateOp {
    pub fn glyph(self) -> &'static str {
        match self {
            AssociativePredicateOp::And => "∧",
            AssociativePredicateOp::Or => "∨",
        }
    }
}

/// Predicates relating two expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationalOp {
    Equal,
    NotEqual,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Subset,
    NotSubset,
    SubsetEq,
    NotSubsetEq,
}

impl RelationalOp {
    pub fn glyph(self) -> &'static str {
        match self {
            RelationalOp::Equal => "=",
            RelationalOp::NotEqual => "≠",
            RelationalOp::Lt => "<",
            RelationalOp::Le => "≤",
            RelationalOp::Gt => ">",
            RelationalOp::Ge => "≥",
            RelationalOp::In => "∈",
            RelationalOp::NotIn => "∉",
            RelationalOp::Subset => "⊂",
            RelationalOp::NotSubset => "⊄",
            RelationalOp::SubsetEq => "⊆",
            RelationalOp::NotSubsetEq => "⊈",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuantifiedPredicateOp {
    ForAll,
    Exists,
}

impl QuantifiedPredicateOp {
    pub fn glyph(self) -> &'static str {
        match self {
            QuantifiedPredicateOp::ForAll => "∀",
            QuantifiedPredicateOp::Exists => "∃",
        }
    }
}

/// Kind of a formula node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    FreeIdentifier,
    BoundIdentifier,
    IntegerLiteral,
    Atomic(AtomicOp),
    SetExtension,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Associative(AssociativeOp),
    Bool,
    QuantifiedExpression(QuantifierOp),
    Extended,
    Literal(LiteralOp),
    Not,
    BinaryPredicate(BinaryPredicateOp),
    AssociativePredicate(AssociativePredicateOp),
    Relational(RelationalOp),
    QuantifiedPredicate(QuantifiedPredicateOp),
    Finite,
    Partition,
    PredicateVariable,
    BecomesEqualTo,
    BecomesMemberOf,
    BecomesSuchThat,
    BoundIdentDecl,
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::FreeIdentifier => f.write_str("free identifier"),
            Tag::BoundIdentifier => f.write_str("bound identifier"),
            Tag::IntegerLiteral => f.write_str("integer literal"),
            Tag::Atomic(op) => f.write_str(op.glyph()),
            Tag::SetExtension => f.write_str("set extension"),
            Tag::Unary(op) => f.write_str(op.glyph()),
            Tag::Binary(op) => f.write_str(op.glyph()),
            Tag::Associative(op) => f.write_str(op.glyph()),
            Tag::Bool => f.write_str("bool"),
            Tag::QuantifiedExpression(op) => f.write_str(op.glyph()),
            Tag::Extended => f.write_str("extension"),
            Tag::Literal(op) => f.write_str(op.glyph()),
            Tag::Not => f.write_str("¬"),
            Tag::BinaryPredicate(op) => f.write_str(op.glyph()),
            Tag::AssociativePredicate(op) => f.write_str(op.glyph()),
            Tag::Relational(op) => f.write_str(op.glyph()),
            Tag::QuantifiedPredicate(op) => f.write_str(op.glyph()),
            Tag::Finite => f.write_str("finite"),
            Tag::Partition => f.write_str("partition"),
            Tag::PredicateVariable => f.write_str("predicate variable"),
            Tag::BecomesEqualTo => f.write_str("≔"),
            Tag::BecomesMemberOf => f.write_str(":∈"),
            Tag::BecomesSuchThat => f.write_str(":∣"),
            Tag::BoundIdentDecl => f.write_str("bound identifier declaration"),
        }
    }
}

/// Level of the set operators, whose chains obey [`set_operators_compatible`].
pub(crate) fn is_set_operator(tag: Tag) -> bool {
    match tag {
        Tag::Binary(op) => matches!(
            op,
            BinaryOp::SetMinus
                | BinaryOp::Cprod
                | BinaryOp::Dprod
                | BinaryOp::Pprod
                | BinaryOp::DomRes
                | BinaryOp::DomSub
                | BinaryOp::RanRes
                | BinaryOp::RanSub
        ),
        Tag::Associative(op) => matches!(
            op,
            AssociativeOp::BUnion | AssociativeOp::BInter | AssociativeOp::BComp | AssociativeOp::FComp | AssociativeOp::Ovr
        ),
        _ => false,
    }
}

/// Whether `left next right` may be written without parentheses when `left` is built with
/// `previous`, that is `previous` and `next` may follow each other in a chain.
pub(crate) fn set_operators_compatible(previous: Tag, next: Tag) -> bool {
    use AssociativeOp::{BComp, BInter, BUnion, FComp, Ovr};
    use BinaryOp::{Cprod, DomRes, DomSub, RanRes, RanSub, SetMinus};

    matches!(
        (previous, next),
        (Tag::Associative(BUnion), Tag::Associative(BUnion))
            | (Tag::Associative(BInter), Tag::Associative(BInter))
            | (Tag::Associative(BInter), Tag::Binary(SetMinus | RanRes | RanSub))
            | (Tag::Associative(FComp), Tag::Associative(FComp))
            | (Tag::Associative(FComp), Tag::Binary(RanRes | RanSub))
            | (Tag::Associative(BComp), Tag::Associative(BComp))
            | (Tag::Associative(Ovr), Tag::Associative(Ovr))
            | (Tag::Binary(Cprod), Tag::Binary(Cprod))
            | (Tag::Binary(DomRes | DomSub), Tag::Associative(FComp))
    )
}
