use std::error::Error;

use eventb_math::expressions::{Expression, ExpressionKind, Predicate, PredicateKind};
use eventb_math::formula::Formula;
use eventb_math::operators::Tag;
use eventb_math::{Extension, FormulaFactory, Position, Specialization, SpecializationError, TypeEnvironment};

fn parse_predicate(ff: &FormulaFactory, text: &str) -> Result<Predicate, Box<dyn Error>> {
    Ok(ff.parse_predicate(text, None).into_result().map_err(|problems| problems.head)?)
}

fn parse_expression(ff: &FormulaFactory, text: &str) -> Result<Expression, Box<dyn Error>> {
    Ok(ff.parse_expression(text, None).into_result().map_err(|problems| problems.head)?)
}

fn checked_predicate(text: &str, env: &TypeEnvironment) -> Result<Predicate, Box<dyn Error>> {
    let parsed = parse_predicate(env.factory(), text)?;
    Ok(parsed.type_check(env).into_result().map_err(|problems| problems.head)?)
}

#[test]
fn positions_in_pre_order() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = Formula::from(parse_predicate(&ff, "x+y=z")?);

    let idents = pred.get_positions(|tag, _| tag == Tag::FreeIdentifier);
    let texts: Vec<String> = idents.iter().map(ToString::to_string).collect();
    assert_eq!(texts, vec!["0.0", "0.1", "1"]);

    let mut sorted = idents.clone();
    sorted.sort();
    assert_eq!(sorted, idents);

    let all = pred.get_positions(|_, _| true);
    assert_eq!(all.first(), Some(&Position::root()));
    assert_eq!(all.len(), 5);

    Ok(())
}

#[test]
fn rewriting_keeps_the_original() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = Formula::from(parse_predicate(&ff, "x+y=z")?);
    let w = Formula::from(parse_expression(&ff, "w∗2")?);

    let position: Position = "0.1".parse()?;
    let rewritten = pred.rewrite_sub_formula(&position, w.clone(), &ff)?;
    assert_eq!(rewritten, Formula::from(parse_predicate(&ff, "x+w∗2=z")?));
    assert_eq!(rewritten.get_sub_formula(&position), Some(w));
    assert_eq!(pred, Formula::from(parse_predicate(&ff, "x+y=z")?));

    let truth = Formula::from(parse_predicate(&ff, "⊤")?);
    assert!(pred.rewrite_sub_formula(&position, truth, &ff).is_err());
    assert!(pred.get_sub_formula(&Position::new([0, 2])).is_none());

    Ok(())
}

#[test]
fn nested_binders_shadow() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = parse_predicate(&ff, "∀x·x∈S∧(∃x·x∈T)")?;

    let PredicateKind::Quantified(_, _, body) = pred.kind() else {
        return Err("expected a quantified predicate".into());
    };
    let PredicateKind::Associative(_, children) = body.kind() else {
        return Err("expected a conjunction".into());
    };
    let PredicateKind::Quantified(_, _, inner) = children[1].kind() else {
        return Err("expected an inner quantifier".into());
    };
    let PredicateKind::Relational(_, member, _) = inner.kind() else {
        return Err("expected a membership".into());
    };
    assert_eq!(member.bound_index(), Some(0));

    let names: Vec<String> = Formula::from(pred.clone())
        .free_identifiers()
        .iter()
        .filter_map(|ident| ident.identifier_name().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["S", "T"]);

    Ok(())
}

#[test]
fn binding_free_identifiers() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = Formula::from(parse_predicate(&ff, "x∈S∧y∈x")?);

    let (decls, bound) = pred.bind_all_free_idents(&ff)?;
    let names: Vec<&str> = decls.iter().map(|decl| decl.name()).collect();
    assert_eq!(names, vec!["S", "x", "y"]);
    assert!(bound.free_identifiers().is_empty());
    assert_eq!(bound.bound_identifiers(), vec![0, 1, 2]);

    let x = parse_expression(&ff, "x")?;
    let only_x = pred.bind_these_idents(&[x], &ff)?;
    let remaining: Vec<Option<String>> = only_x
        .free_identifiers()
        .iter()
        .map(|ident| ident.identifier_name().map(str::to_string))
        .collect();
    assert_eq!(remaining, vec![Some("S".to_string()), Some("y".to_string())]);
    assert!(!only_x.is_well_formed());

    Ok(())
}

#[test]
fn specializing_a_given_type() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let s = ff.make_given_type("S")?;
    let mut env = ff.make_type_environment();
    env.add("x", s.clone())?;
    let pred = Formula::from(checked_predicate("x∈S∧(∀y·y∈S⇒y=x)", &env)?);

    let mut spec = Specialization::new(&ff);
    spec.put_type(&s, &ff.make_integer_type())?;
    let specialized = pred.specialize(&mut spec)?;

    let mut integer = ff.make_type_environment();
    integer.add("x", ff.make_integer_type())?;
    let expected = Formula::from(checked_predicate("x∈ℤ∧(∀y·y∈ℤ⇒y=x)", &integer)?);
    assert_eq!(specialized, expected);
    assert!(specialized.is_type_checked());

    Ok(())
}

#[test]
fn specializing_identifiers_and_predicate_variables() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let mut env = ff.make_type_environment();
    env.add("x", ff.make_integer_type())?;
    let pred = Formula::from(checked_predicate("$P∧x>0", &env)?);

    let mut spec = Specialization::new(&ff);
    let x = ff.make_free_identifier("x", None, Some(ff.make_integer_type()))?;
    let replacement = parse_expression(&ff, "a+1")?
        .type_check(&env)
        .into_result()
        .map_err(|problems| problems.head)?;
    spec.put_identifier(&x, &replacement)?;

    let variable = parse_predicate(&ff, "$P")?;
    spec.put_predicate(&variable, &checked_predicate("a=b+1", &env)?)?;

    let specialized = pred.specialize(&mut spec)?;
    assert_eq!(specialized.to_string(), "a=b+1∧a+1>0");

    Ok(())
}

#[test]
fn frozen_types_reject_substitution() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let s = ff.make_given_type("S")?;
    let mut spec = Specialization::new(&ff);
    s.specialize(&mut spec)?;

    let result = spec.put_type(&s, &ff.make_boolean_type());
    assert!(matches!(result, Err(SpecializationError::Frozen(_))));

    let carrier = parse_expression(&ff, "S")?
        .type_check(&ff.make_type_environment())
        .into_result();
    assert!(carrier.is_err());

    let mut env = ff.make_type_environment();
    env.add_given_set("S")?;
    let carrier = parse_expression(&ff, "S")?
        .type_check(&env)
        .into_result()
        .map_err(|problems| problems.head)?;
    let bool_set = parse_expression(&ff, "BOOL")?
        .type_check(&env)
        .into_result()
        .map_err(|problems| problems.head)?;
    assert!(spec.put_identifier(&carrier, &bool_set).is_err());

    let mut other = ff.make_type_environment();
    other.add("S", ff.make_integer_type())?;
    let y = ff.make_free_identifier("y", None, Some(ff.make_integer_type()))?;
    let mentions_s = parse_expression(&ff, "S+1")?
        .type_check(&other)
        .into_result()
        .map_err(|problems| problems.head)?;
    assert!(spec.put_identifier(&y, &mentions_s).is_err());

    Ok(())
}

#[test]
fn extension_factories() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let list = Extension::new("List", 1);
    let extended = ff.with_extensions([list.clone()])?;

    assert_eq!(extended.id(), ff.with_extensions([list])?.id());
    assert_ne!(extended.id(), ff.id());

    let parsed = parse_expression(&extended, "List(S)")?;
    assert!(matches!(parsed.kind(), ExpressionKind::Extended(..)));
    assert_eq!(parse_expression(&ff, "List(S)")?.tag(), Tag::Binary(eventb_math::operators::BinaryOp::FunImage));

    let mut env = extended.make_type_environment();
    env.add_given_set("S")?;
    let result = parse_predicate(&extended, "l∈List(S)")?.type_check(&env);
    let l = result.inferred_environment().get("l").ok_or("l not inferred")?;
    assert_eq!(l.to_string(), "List(S)");

    let foreign = parse_predicate(&ff, "x=1")?;
    assert!(foreign.type_check(&env).has_problem());

    Ok(())
}
