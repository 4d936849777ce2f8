use std::error::Error;

use eventb_math::expressions::{Assignment, Predicate};
use eventb_math::formula::Formula;
use eventb_math::{FormulaFactory, ProblemKind, TypeEnvironment};

fn parse_predicate(ff: &FormulaFactory, text: &str) -> Result<Predicate, Box<dyn Error>> {
    Ok(ff.parse_predicate(text, None).into_result().map_err(|problems| problems.head)?)
}

fn checked_predicate(text: &str, env: &TypeEnvironment) -> Result<Predicate, Box<dyn Error>> {
    let parsed = parse_predicate(env.factory(), text)?;
    Ok(parsed.type_check(env).into_result().map_err(|problems| problems.head)?)
}

fn checked_assignment(text: &str, env: &TypeEnvironment) -> Result<Assignment, Box<dyn Error>> {
    let parsed = env
        .factory()
        .parse_assignment(text, None)
        .into_result()
        .map_err(|problems| problems.head)?;
    Ok(parsed.type_check(env).into_result().map_err(|problems| problems.head)?)
}

fn integer_environment(ff: &FormulaFactory) -> Result<TypeEnvironment, Box<dyn Error>> {
    let mut env = ff.make_type_environment();
    env.add("x", ff.make_integer_type())?;
    env.add("A", ff.make_power_set_type(ff.make_integer_type())?)?;
    Ok(env)
}

#[test]
fn inferred_environment() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = parse_predicate(&ff, "x∈ℤ∧1≤x")?;

    let result = pred.type_check(&ff.make_type_environment());
    assert!(result.is_success());
    assert_eq!(result.inferred_environment().get("x"), Some(&ff.make_integer_type()));
    assert_eq!(result.inferred_environment().len(), 1);
    assert!(result.checked().map_or(false, Predicate::is_type_checked));

    Ok(())
}

#[test]
fn environment_decides_success() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = parse_predicate(&ff, "x=TRUE")?;

    let mut integer = ff.make_type_environment();
    integer.add("x", ff.make_integer_type())?;
    let result = pred.type_check(&integer);
    assert!(result.has_problem());
    assert_eq!(result.problems().next().map(|p| p.kind()), Some(ProblemKind::TypeError));

    let mut boolean = ff.make_type_environment();
    boolean.add("x", ff.make_boolean_type())?;
    let result = pred.type_check(&boolean);
    assert!(result.is_success());
    assert!(result.inferred_environment().is_empty());

    Ok(())
}

#[test]
fn unknown_types() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = parse_predicate(&ff, "card(x)=y")?;

    let result = pred.type_check(&ff.make_type_environment());
    assert!(result.has_problem());
    assert!(result.problems().any(|p| p.kind() == ProblemKind::TypeUnknown));
    assert!(result.inferred_environment().is_empty());

    let mut env = ff.make_type_environment();
    env.add("x", ff.make_power_set_type(ff.make_given_type("S")?)?)?;
    let result = pred.type_check(&env);
    assert!(result.is_success());
    assert_eq!(result.inferred_environment().get("y"), Some(&ff.make_integer_type()));
    assert!(!result.inferred_environment().contains("x"));

    Ok(())
}

#[test]
fn checking_twice_changes_nothing() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let env = integer_environment(&ff)?;

    let checked = checked_predicate("x∈A∧∅⊂A∧(∀z·z∈A⇒x÷z=1)", &env)?;
    let again = checked.type_check(&env);
    assert!(again.is_success());
    assert_eq!(again.checked(), Some(&checked));
    assert!(again.inferred_environment().is_empty());

    Ok(())
}

#[test]
fn unresolved_types_in_messages() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let env = integer_environment(&ff)?;

    let result = parse_predicate(&ff, "card(x)=1")?.type_check(&env);
    let problem = result.problems().next().ok_or("card(x) was accepted")?;
    assert_eq!(problem.kind(), ProblemKind::TypeError);
    assert!(problem.message().contains("ℙ(?)"), "{}", problem.message());
    assert!(!problem.message().contains('\''), "{}", problem.message());

    Ok(())
}

#[test]
fn typed_printing_round_trips() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let mut env = ff.make_type_environment();
    env.add("s", ff.make_power_set_type(ff.make_integer_type())?)?;

    let checked = checked_predicate("∅⊂s∧prj1∈ℤ×BOOL→ℤ", &env)?;
    let printed = Formula::from(checked.clone()).to_string_with_types();
    assert!(printed.contains("⦂"));

    let reparsed = checked_predicate(&printed, &env)?;
    assert_eq!(reparsed, checked);

    Ok(())
}

#[test]
fn bound_identifiers_are_typed() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let mut env = ff.make_type_environment();
    env.add_given_set("S")?;

    let checked = checked_predicate("∀x·x∈S⇒(∃y·y∈ℤ∧y↦x∈r)", &env)?;
    assert!(checked.is_type_checked());

    let result = parse_predicate(&ff, "∀x·x∈S⇒(∃y·y∈ℤ∧y↦x∈r)")?.type_check(&env);
    let r = result.inferred_environment().get("r").ok_or("r not inferred")?;
    assert!(r.is_relational());

    Ok(())
}

#[test]
fn before_after_and_feasibility() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let env = integer_environment(&ff)?;

    let member = checked_assignment("x :∈ A", &env)?;
    assert_eq!(member.ba_predicate(&ff)?.to_string(), "x'∈A");
    assert_eq!(member.fis_predicate(&ff)?.to_string(), "A≠∅");

    let such_that = checked_assignment("x :∣ x'∈A", &env)?;
    assert_eq!(such_that.ba_predicate(&ff)?.to_string(), "x'∈A");
    assert_eq!(such_that.fis_predicate(&ff)?.to_string(), "∃x'·x'∈A");

    let becomes = checked_assignment("x ≔ x+1", &env)?;
    assert_eq!(becomes.ba_predicate(&ff)?.to_string(), "x'=x+1");
    assert_eq!(becomes.fis_predicate(&ff)?.to_string(), "⊤");

    let expected = checked_predicate("x'∈A", &env.with_primed())?;
    assert_eq!(member.ba_predicate(&ff)?, expected);

    Ok(())
}

#[test]
fn well_definedness() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let mut env = integer_environment(&ff)?;
    env.add("y", ff.make_integer_type())?;
    env.add("f", ff.make_relational_type(ff.make_integer_type(), ff.make_integer_type())?)?;

    let wd = |text: &str| -> Result<String, Box<dyn Error>> {
        Ok(Formula::from(checked_predicate(text, &env)?).wd_predicate(&ff)?.to_string())
    };

    assert_eq!(wd("x∈A")?, "⊤");
    assert_eq!(wd("x÷y=1")?, "y≠0");
    assert_eq!(wd("x mod y=1")?, "y≠0");
    assert_eq!(wd("card(A)=1")?, "finite(A)");
    assert_eq!(wd("y≠0⇒x÷y=1")?, "y≠0⇒y≠0");
    assert_eq!(wd("f(x)=y")?, "x∈dom(f)∧f∈ℤ⇸ℤ");
    assert_eq!(wd("∀z·z∈A⇒x÷z=1")?, "∀z·z∈A⇒z≠0");

    let min = wd("min(A)=x")?;
    assert!(min.starts_with("A≠∅∧") && min.contains("∃b·"), "{}", min);
    assert_eq!(wd("f(f(x))=y")?, "x∈dom(f)∧f∈ℤ⇸ℤ∧f(x)∈dom(f)");

    Ok(())
}

#[test]
fn derived_names_do_not_capture() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let mut env = ff.make_type_environment();
    env.add("b", ff.make_integer_type())?;
    env.add("x", ff.make_integer_type())?;

    let wd = Formula::from(checked_predicate("min({b,x})=1", &env)?).wd_predicate(&ff)?;
    let printed = wd.to_string();
    assert_eq!(printed, "{b,x}≠∅∧(∃b0·∀x0·x0∈{b,x}⇒b0≤x0)");
    assert_eq!(checked_predicate(&printed, &env)?, wd);

    Ok(())
}
