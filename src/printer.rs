//! Conversion of formulas to text.
//!
//! The text produced re-parses to an equal formula. Operands are parenthesized following the
//! operator precedence of the parser, and bound identifiers are renamed whenever their name
//! would clash with a free identifier or with an enclosing declaration. When printing with
//! types, every bound declaration and every generic atom carries its type, and implicit or
//! lambda comprehension sets are written in explicit form.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result};

use num_traits::Signed;

use crate::expressions::{Assignment, AssignmentKind, BoundIdentDecl, Expression, ExpressionKind, Predicate, PredicateKind};
use crate::formula::Formula;
use crate::operators::{
    is_set_operator, set_operators_compatible, AssociativeOp, BinaryOp, QuantifiedForm, QuantifierOp, Tag, UnaryOp,
};

pub(crate) fn write_expression(f: &mut Formatter<'_>, expr: &Expression, with_types: bool) -> Result {
    Printer::new(f, with_types, expr.free_identifiers()).expression(expr)
}

pub(crate) fn write_predicate(f: &mut Formatter<'_>, pred: &Predicate, with_types: bool) -> Result {
    Printer::new(f, with_types, pred.free_identifiers()).predicate(pred)
}

pub(crate) fn write_assignment(f: &mut Formatter<'_>, assignment: &Assignment, with_types: bool) -> Result {
    Printer::new(f, with_types, &assignment.free_identifiers()).assignment(assignment)
}

pub(crate) fn to_string_with_types(formula: &Formula) -> String {
    struct WithTypes<'a>(&'a Formula);

    impl Display for WithTypes<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> Result {
            match self.0 {
                Formula::Expression(expr) => write_expression(f, expr, true),
                Formula::Predicate(pred) => write_predicate(f, pred, true),
                Formula::Assignment(assignment) => write_assignment(f, assignment, true),
                Formula::BoundIdentDecl(decl) => match decl.ty() {
                    Some(ty) => write!(f, "{}⦂{}", decl.name(), ty),
                    None => f.write_str(decl.name()),
                },
            }
        }
    }

    WithTypes(formula).to_string()
}

const QUANTIFIED: u8 = 0;
const MAPSTO: u8 = 2;
const RELATION_SET: u8 = 3;
const SET_OPERATOR: u8 = 4;
const INTERVAL: u8 = 5;
const ARITHMETIC: u8 = 6;
const MULTIPLICATIVE: u8 = 7;
const EXPONENT: u8 = 8;
const POSTFIX: u8 = 9;
const ATOM: u8 = 10;

const PREDICATE_BINARY: u8 = 1;
const PREDICATE_ASSOCIATIVE: u8 = 2;
const PREDICATE_NOT: u8 = 3;
const PREDICATE_ATOM: u8 = 4;

fn is_prefix_operator(op: UnaryOp) -> bool {
    !matches!(op, UnaryOp::Converse | UnaryOp::UnMinus)
}

fn is_non_negative_literal(expr: &Expression) -> bool {
    expr.integer_value().map_or(false, |value| !value.is_negative())
}

/// Form a quantified expression is printed in.
fn printed_form(expr: &Expression, with_types: bool) -> QuantifiedForm {
    let ExpressionKind::Quantified {
        form,
        decls,
        expression,
        ..
    } = expr.kind()
    else {
        return QuantifiedForm::Explicit;
    };

    if with_types {
        return QuantifiedForm::Explicit;
    }

    match form {
        QuantifiedForm::Lambda if is_lambda_pattern(expression, decls.len()) => QuantifiedForm::Lambda,
        QuantifiedForm::Implicit if is_implicit_body(expression, decls.len()) => QuantifiedForm::Implicit,
        _ => QuantifiedForm::Explicit,
    }
}

/// Whether `expression` is `pattern ↦ E` where the pattern mentions every declared identifier
/// once, in declaration order.
fn is_lambda_pattern(expression: &Expression, count: usize) -> bool {
    fn leaves(pattern: &Expression, out: &mut Vec<usize>) -> bool {
        match pattern.kind() {
            ExpressionKind::BoundIdentifier(index) => {
                out.push(*index);
                true
            }
            ExpressionKind::Binary(BinaryOp::Mapsto, left, right) => leaves(left, out) && leaves(right, out),
            _ => false,
        }
    }

    let ExpressionKind::Binary(BinaryOp::Mapsto, pattern, _) = expression.kind() else {
        return false;
    };

    let mut indices = Vec::new();
    leaves(pattern, &mut indices) && indices.iter().copied().eq((0..count).rev())
}

/// Whether `expression` can be written as the body of an implicit comprehension, which binds
/// its identifiers in order of first occurrence.
fn is_implicit_body(expression: &Expression, count: usize) -> bool {
    fn occurrences(expr: &Expression, out: &mut Vec<usize>) -> bool {
        match expr.kind() {
            ExpressionKind::FreeIdentifier(_) | ExpressionKind::Bool(_) | ExpressionKind::Quantified { .. } => false,
            ExpressionKind::BoundIdentifier(index) => {
                if !out.contains(index) {
                    out.push(*index);
                }
                true
            }
            _ => Formula::from(expr.clone())
                .children()
                .iter()
                .filter_map(Formula::as_expression)
                .all(|child| occurrences(child, out)),
        }
    }

    let mut indices = Vec::new();
    if !occurrences(expression, &mut indices) {
        return false;
    }

    let local: Vec<usize> = indices.into_iter().filter(|index| *index < count).collect();
    local.into_iter().eq((0..count).rev())
}

struct Printer<'a, 'b> {
    f: &'a mut Formatter<'b>,
    with_types: bool,
    free: BTreeSet<String>,
    names: Vec<String>,
}

impl<'a, 'b> Printer<'a, 'b> {
    fn new(f: &'a mut Formatter<'b>, with_types: bool, free: &[Expression]) -> Self {
        Printer {
            f,
            with_types,
            free: free
                .iter()
                .filter_map(Expression::identifier_name)
                .map(str::to_string)
                .collect(),
            names: Vec::new(),
        }
    }

    fn write(&mut self, text: &str) -> Result {
        self.f.write_str(text)
    }

    fn is_taken(&self, name: &str) -> bool {
        self.free.contains(name) || self.names.iter().any(|taken| taken == name)
    }

    fn fresh_name(&self, name: &str) -> String {
        if !self.is_taken(name) {
            return name.to_string();
        }

        let (unprimed, prime) = match name.strip_suffix('\'') {
            Some(unprimed) => (unprimed, "'"),
            None => (name, ""),
        };
        let base = unprimed.trim_end_matches(|c: char| c.is_ascii_digit());
        let base = if base.is_empty() { unprimed } else { base };

        (0..)
            .map(|suffix| format!("{}{}{}", base, suffix, prime))
            .find(|candidate| !self.is_taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Choose printed names for declarations and bring them in scope.
    fn push_decls<'d, I>(&mut self, decls: I) -> Vec<(String, &'d BoundIdentDecl)>
    where
        I: IntoIterator<Item = &'d BoundIdentDecl>,
    {
        let mut chosen = Vec::new();
        for decl in decls {
            let name = self.fresh_name(decl.name());
            self.names.push(name.clone());
            chosen.push((name, decl));
        }

        chosen
    }

    fn pop_decls(&mut self, count: usize) {
        let kept = self.names.len().saturating_sub(count);
        self.names.truncate(kept);
    }

    fn decl_list(&mut self, decls: &[(String, &BoundIdentDecl)]) -> Result {
        for (index, (name, decl)) in decls.iter().enumerate() {
            if index > 0 {
                self.write(",")?;
            }
            self.write(name)?;
            if self.with_types {
                if let Some(ty) = decl.ty() {
                    write!(self.f, "⦂{}", ty)?;
                }
            }
        }

        Ok(())
    }

    fn level(&self, expr: &Expression) -> u8 {
        match expr.kind() {
            ExpressionKind::Quantified { op, .. } => match (op, printed_form(expr, self.with_types)) {
                (QuantifierOp::Cset, QuantifiedForm::Lambda) => QUANTIFIED,
                (QuantifierOp::Cset, _) => ATOM,
                _ => QUANTIFIED,
            },
            ExpressionKind::IntegerLiteral(value) if value.is_negative() => ARITHMETIC,
            ExpressionKind::Binary(op, _, _) => match op {
                BinaryOp::Mapsto => MAPSTO,
                _ if op.is_relation_set() => RELATION_SET,
                _ if is_set_operator(Tag::Binary(*op)) => SET_OPERATOR,
                BinaryOp::UpTo => INTERVAL,
                BinaryOp::Minus => ARITHMETIC,
                BinaryOp::Div | BinaryOp::Mod => MULTIPLICATIVE,
                BinaryOp::Expn => EXPONENT,
                _ => POSTFIX,
            },
            ExpressionKind::Associative(op, _) => match op {
                AssociativeOp::Plus => ARITHMETIC,
                AssociativeOp::Mul => MULTIPLICATIVE,
                _ => SET_OPERATOR,
            },
            ExpressionKind::Unary(UnaryOp::UnMinus, _) => ARITHMETIC,
            ExpressionKind::Unary(UnaryOp::Converse, _) => POSTFIX,
            _ => ATOM,
        }
    }

    fn needs_parentheses(&self, parent: &Expression, index: usize, child: &Expression) -> bool {
        let level = self.level(child);
        let first = index == 0;

        match parent.kind() {
            ExpressionKind::SetExtension(_)
            | ExpressionKind::Extended(_, _)
            | ExpressionKind::Bool(_)
            | ExpressionKind::Quantified { .. } => false,
            ExpressionKind::Unary(op, _) if is_prefix_operator(*op) => false,
            ExpressionKind::Unary(UnaryOp::UnMinus, _) => level <= ARITHMETIC || is_non_negative_literal(child),
            ExpressionKind::Unary(_, _) => level < POSTFIX,
            ExpressionKind::Binary(BinaryOp::FunImage | BinaryOp::RelImage, _, _) => first && level < POSTFIX,
            _ if level == QUANTIFIED => true,
            ExpressionKind::Binary(op, _, _) => match op {
                BinaryOp::Mapsto => level < MAPSTO || (!first && level == MAPSTO),
                _ if op.is_relation_set() => level < RELATION_SET || (!first && level == RELATION_SET),
                _ if is_set_operator(Tag::Binary(*op)) => self.set_operand_needs_parentheses(Tag::Binary(*op), first, child),
                BinaryOp::UpTo => level <= INTERVAL,
                BinaryOp::Minus => level < ARITHMETIC || (!first && level == ARITHMETIC),
                BinaryOp::Div | BinaryOp::Mod => {
                    level < MULTIPLICATIVE
                        || (level == MULTIPLICATIVE && (!first || child.tag() != Tag::Associative(AssociativeOp::Mul)))
                }
                BinaryOp::Expn => level < EXPONENT || (!first && level == EXPONENT),
                _ => level < POSTFIX,
            },
            ExpressionKind::Associative(op, _) => match op {
                AssociativeOp::Plus => {
                    level < ARITHMETIC
                        || (level == ARITHMETIC && (!first || child.tag() == Tag::Associative(AssociativeOp::Plus)))
                }
                AssociativeOp::Mul => level <= MULTIPLICATIVE,
                _ => self.set_operand_needs_parentheses(Tag::Associative(*op), first, child),
            },
            _ => false,
        }
    }

    fn set_operand_needs_parentheses(&self, parent: Tag, first: bool, child: &Expression) -> bool {
        let level = self.level(child);

        if level != SET_OPERATOR {
            return level < SET_OPERATOR;
        }

        if !first {
            return true;
        }

        let tag = child.tag();
        let flattened = matches!(tag, Tag::Associative(_)) && tag == parent;
        !set_operators_compatible(tag, parent) || flattened
    }

    fn operand(&mut self, parent: &Expression, index: usize, child: &Expression) -> Result {
        if self.needs_parentheses(parent, index, child) {
            self.write("(")?;
            self.expression(child)?;
            self.write(")")
        } else {
            self.expression(child)
        }
    }

    fn expressions(&mut self, exprs: &[Expression]) -> Result {
        for (index, expr) in exprs.iter().enumerate() {
            if index > 0 {
                self.write(",")?;
            }
            self.expression(expr)?;
        }

        Ok(())
    }

    fn expression(&mut self, expr: &Expression) -> Result {
        match expr.kind() {
            ExpressionKind::FreeIdentifier(name) => self.write(name),
            ExpressionKind::BoundIdentifier(index) => {
                let name = self
                    .names
                    .len()
                    .checked_sub(index + 1)
                    .and_then(|position| self.names.get(position))
                    .cloned();

                match name {
                    Some(name) => self.write(&name),
                    None => write!(self.f, "[[{}]]", index),
                }
            }
            ExpressionKind::IntegerLiteral(value) => {
                if value.is_negative() {
                    write!(self.f, "−{}", value.abs())
                } else {
                    write!(self.f, "{}", value)
                }
            }
            ExpressionKind::Atomic(op) => match expr.ty() {
                Some(ty) if self.with_types && op.is_generic() => write!(self.f, "({}⦂{})", op.glyph(), ty),
                _ => self.write(op.glyph()),
            },
            ExpressionKind::SetExtension(members) if members.is_empty() => match expr.ty() {
                Some(ty) if self.with_types => write!(self.f, "({{}}⦂{})", ty),
                _ => self.write("{}"),
            },
            ExpressionKind::SetExtension(members) => {
                self.write("{")?;
                self.expressions(members)?;
                self.write("}")
            }
            ExpressionKind::Unary(op, child) => match op {
                UnaryOp::Converse => {
                    self.operand(expr, 0, child)?;
                    self.write(op.glyph())
                }
                UnaryOp::UnMinus => {
                    self.write(op.glyph())?;
                    self.operand(expr, 0, child)
                }
                _ => {
                    write!(self.f, "{}(", op.glyph())?;
                    self.expression(child)?;
                    self.write(")")
                }
            },
            ExpressionKind::Binary(op, left, right) => match op {
                BinaryOp::FunImage | BinaryOp::RelImage => {
                    let (open, close) = if *op == BinaryOp::FunImage { ("(", ")") } else { ("[", "]") };
                    self.operand(expr, 0, left)?;
                    self.write(open)?;
                    self.expression(right)?;
                    self.write(close)
                }
                _ => {
                    self.operand(expr, 0, left)?;
                    if *op == BinaryOp::Mod {
                        self.write(" mod ")?;
                    } else {
                        self.write(op.glyph())?;
                    }
                    self.operand(expr, 1, right)
                }
            },
            ExpressionKind::Associative(op, children) => {
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        self.write(op.glyph())?;
                    }
                    self.operand(expr, index, child)?;
                }
                Ok(())
            }
            ExpressionKind::Bool(pred) => {
                self.write("bool(")?;
                self.predicate(pred)?;
                self.write(")")
            }
            ExpressionKind::Quantified {
                op,
                decls,
                predicate,
                expression,
                ..
            } => {
                let chosen = self.push_decls(decls.iter());
                let result = self.quantified_expression(expr, *op, &chosen, predicate, expression);
                self.pop_decls(chosen.len());
                result
            }
            ExpressionKind::Extended(extension, args) => {
                write!(self.f, "{}(", extension.name())?;
                self.expressions(args)?;
                self.write(")")
            }
        }
    }

    fn quantified_expression(
        &mut self,
        expr: &Expression,
        op: QuantifierOp,
        decls: &[(String, &BoundIdentDecl)],
        predicate: &Predicate,
        expression: &Expression,
    ) -> Result {
        let (open, close) = match op {
            QuantifierOp::Cset => ("{", "}"),
            QuantifierOp::QUnion => ("⋃", ""),
            QuantifierOp::QInter => ("⋂", ""),
        };

        match printed_form(expr, self.with_types) {
            QuantifiedForm::Lambda => {
                let ExpressionKind::Binary(_, pattern, body) = expression.kind() else {
                    return Err(std::fmt::Error);
                };
                self.write("λ")?;
                self.expression(pattern)?;
                self.write("·")?;
                self.predicate(predicate)?;
                self.write("∣")?;
                self.expression(body)
            }
            QuantifiedForm::Implicit => {
                self.write(open)?;
                self.expression(expression)?;
                self.write("∣")?;
                self.predicate(predicate)?;
                self.write(close)
            }
            QuantifiedForm::Explicit => {
                self.write(open)?;
                self.decl_list(decls)?;
                self.write("·")?;
                self.predicate(predicate)?;
                self.write("∣")?;
                self.expression(expression)?;
                self.write(close)
            }
        }
    }

    fn predicate_level(pred: &Predicate) -> u8 {
        match pred.kind() {
            PredicateKind::Quantified(..) => QUANTIFIED,
            PredicateKind::Binary(..) => PREDICATE_BINARY,
            PredicateKind::Associative(..) => PREDICATE_ASSOCIATIVE,
            PredicateKind::Not(_) => PREDICATE_NOT,
            _ => PREDICATE_ATOM,
        }
    }

    fn predicate_operand(&mut self, parent_level: u8, child: &Predicate) -> Result {
        let level = Self::predicate_level(child);
        let parenthesize = match parent_level {
            PREDICATE_NOT => level < PREDICATE_NOT,
            _ => level <= parent_level,
        };

        if parenthesize {
            self.write("(")?;
            self.predicate(child)?;
            self.write(")")
        } else {
            self.predicate(child)
        }
    }

    fn predicate(&mut self, pred: &Predicate) -> Result {
        match pred.kind() {
            PredicateKind::Literal(op) => self.write(op.glyph()),
            PredicateKind::Variable(name) => self.write(name),
            PredicateKind::Not(child) => {
                self.write("¬")?;
                self.predicate_operand(PREDICATE_NOT, child)
            }
            PredicateKind::Binary(op, left, right) => {
                self.predicate_operand(PREDICATE_BINARY, left)?;
                self.write(op.glyph())?;
                self.predicate_operand(PREDICATE_BINARY, right)
            }
            PredicateKind::Associative(op, children) => {
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        self.write(op.glyph())?;
                    }
                    self.predicate_operand(PREDICATE_ASSOCIATIVE, child)?;
                }
                Ok(())
            }
            PredicateKind::Relational(op, left, right) => {
                self.expression(left)?;
                self.write(op.glyph())?;
                self.expression(right)
            }
            PredicateKind::Quantified(op, decls, body) => {
                self.write(op.glyph())?;
                let chosen = self.push_decls(decls.iter());
                let result = self.quantified_predicate(&chosen, body);
                self.pop_decls(chosen.len());
                result
            }
            PredicateKind::Finite(child) => {
                self.write("finite(")?;
                self.expression(child)?;
                self.write(")")
            }
            PredicateKind::Partition(children) => {
                self.write("partition(")?;
                self.expressions(children)?;
                self.write(")")
            }
        }
    }

    fn quantified_predicate(&mut self, decls: &[(String, &BoundIdentDecl)], body: &Predicate) -> Result {
        self.decl_list(decls)?;
        self.write("·")?;
        self.predicate(body)
    }

    fn identifiers<'e, I>(&mut self, identifiers: I) -> Result
    where
        I: IntoIterator<Item = &'e Expression>,
    {
        for (index, ident) in identifiers.into_iter().enumerate() {
            if index > 0 {
                self.write(",")?;
            }
            self.expression(ident)?;
        }

        Ok(())
    }

    fn assignment(&mut self, assignment: &Assignment) -> Result {
        match assignment.kind() {
            AssignmentKind::BecomesEqualTo { identifiers, values } => {
                self.identifiers(identifiers.iter())?;
                self.write(" ≔ ")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        self.write(",")?;
                    }
                    self.expression(value)?;
                }
                Ok(())
            }
            AssignmentKind::BecomesMemberOf { identifier, set } => {
                self.expression(identifier)?;
                self.write(" :∈ ")?;
                self.expression(set)
            }
            AssignmentKind::BecomesSuchThat {
                identifiers,
                primed,
                condition,
            } => {
                self.identifiers(identifiers.iter())?;
                self.write(" :∣ ")?;
                for decl in primed.iter() {
                    self.names.push(decl.name().to_string());
                }
                let result = self.predicate(condition);
                self.pop_decls(primed.len());
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::factory::FormulaFactory;
    use crate::operators::{AssociativeOp, BinaryOp, QuantifiedPredicateOp, RelationalOp, UnaryOp};

    #[test]
    fn arithmetic_parentheses() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let x = ff.make_free_identifier("x", None, None)?;
        let y = ff.make_free_identifier("y", None, None)?;
        let z = ff.make_free_identifier("z", None, None)?;

        let minus = ff.make_binary_expression(BinaryOp::Minus, y.clone(), z.clone(), None)?;
        let plus = ff.make_associative_expression(AssociativeOp::Plus, vec![x.clone(), minus.clone()], None)?;
        assert_eq!(plus.to_string(), "x+(y−z)");

        let plus = ff.make_associative_expression(AssociativeOp::Plus, vec![minus, x.clone()], None)?;
        assert_eq!(plus.to_string(), "y−z+x");

        let one = ff.make_integer_literal(1.into(), None);
        let negated = ff.make_unary_expression(UnaryOp::UnMinus, one, None)?;
        assert_eq!(negated.to_string(), "−(1)");

        let modulo = ff.make_binary_expression(BinaryOp::Mod, x, y, None)?;
        assert_eq!(modulo.to_string(), "x mod y");

        Ok(())
    }

    #[test]
    fn bound_names_are_renamed() -> Result<(), Box<dyn Error>> {
        let ff = FormulaFactory::default_factory();
        let decl = ff.make_bound_ident_decl("x", None, None)?;
        let body = ff.make_relational_predicate(
            RelationalOp::Equal,
            ff.make_bound_identifier(0, None, None)?,
            ff.make_free_identifier("x", None, None)?,
            None,
        )?;
        let pred = ff.make_quantified_predicate(QuantifiedPredicateOp::Exists, vec![decl], body, None)?;

        assert_eq!(pred.to_string(), "∃x0·x0=x");

        Ok(())
    }
}
