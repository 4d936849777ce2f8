use std::error::Error;

use eventb_math::expressions::{Expression, Predicate};
use eventb_math::formula::Formula;
use eventb_math::operators::Tag;
use eventb_math::{FormulaFactory, ProblemKind};

fn parse_predicate(ff: &FormulaFactory, text: &str) -> Result<Predicate, Box<dyn Error>> {
    Ok(ff.parse_predicate(text, None).into_result().map_err(|problems| problems.head)?)
}

fn parse_expression(ff: &FormulaFactory, text: &str) -> Result<Expression, Box<dyn Error>> {
    Ok(ff.parse_expression(text, None).into_result().map_err(|problems| problems.head)?)
}

#[test]
fn printed_predicates_parse_back() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let images = [
        "x∈ℕ∧y∈ℤ",
        "x+y∗z=(x+y)∗z",
        "a↦b∈r",
        "∀x·x∈S⇒x∈T",
        "∃x,y·x↦y∈f∧¬x=y",
        "(a=1⇒b=1)⇒c=1",
        "a=1⇒(b=1⇒c=1)",
        "card(S)≤max(T)",
        "f(x)∈r[s]",
        "r∼=s",
        "finite(S∖U)",
        "partition(S,T,U)",
        "{x·x∈ℕ∣x+1}⊆ℕ",
        "bool(x=1)=TRUE",
        "x=−1∧y=−(1)",
    ];

    for image in images {
        let parsed = parse_predicate(&ff, image)?;
        let printed = parsed.to_string();
        let reparsed = parse_predicate(&ff, &printed)?;
        assert_eq!(parsed, reparsed, "{} printed as {}", image, printed);
    }

    Ok(())
}

#[test]
fn printed_expressions_parse_back() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let images = ["S↔T", "x‥y", "a−b−c", "a−(b−c)", "⋃x·x∈S∣f(x)", "{a,b,c}", "prj1", "f;g;h", "λx·x∈ℕ∣x+1"];

    for image in images {
        let parsed = parse_expression(&ff, image)?;
        let reparsed = parse_expression(&ff, &parsed.to_string())?;
        assert_eq!(parsed, reparsed, "{}", image);
    }

    Ok(())
}

#[test]
fn parentheses_are_transparent() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();

    let plain = parse_predicate(&ff, "x=y")?;
    assert_eq!(parse_predicate(&ff, "(x=y)")?, plain);
    assert_eq!(parse_predicate(&ff, "((((x))=((y))))")?, plain);

    let sum = parse_expression(&ff, "a+b")?;
    assert_eq!(parse_expression(&ff, "((a)+(b))")?, sum);

    Ok(())
}

#[test]
fn deeply_nested_parentheses() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let wrap = |text: &str, depth: usize| format!("{}{}{}", "(".repeat(depth), text, ")".repeat(depth));

    assert_eq!(parse_expression(&ff, &wrap("x", 600))?, parse_expression(&ff, "x")?);
    assert_eq!(parse_predicate(&ff, &wrap("x=y", 600))?, parse_predicate(&ff, "x=y")?);
    assert_eq!(
        parse_predicate(&ff, &format!("{}=y", wrap("x+1", 300)))?,
        parse_predicate(&ff, "x+1=y")?
    );

    let too_deep = ff.parse_expression(&wrap("x", 1001), None);
    assert!(too_deep.parsed().is_none());
    assert_eq!(too_deep.problems().next().map(|p| p.kind()), Some(ProblemKind::SyntaxError));

    let negations = ff.parse_predicate(&format!("{}x=y", "¬".repeat(1001)), None);
    assert_eq!(negations.problems().next().map(|p| p.kind()), Some(ProblemKind::SyntaxError));

    Ok(())
}

#[test]
fn invalid_inputs_are_rejected() {
    let ff = FormulaFactory::default_factory();

    for image in ["x/x/x", "x domsub y + z", "x+", "(x", "x∪y∩z", "f(", "∀·x=y"] {
        let result = ff.parse_expression(image, None);
        assert!(result.has_problem(), "{} was accepted", image);
        assert!(result.parsed().is_none());
    }

    for image in ["x=y∧", "a=1∧b=1∨c=1", "x=y=z", "x ≔ 1"] {
        assert!(ff.parse_predicate(image, None).has_problem(), "{} was accepted", image);
    }

    let lexical = ff.parse_expression("x/x/x", None);
    assert_eq!(lexical.problems().next().map(|p| p.kind()), Some(ProblemKind::LexicalError));
}

#[test]
fn source_locations_are_exact() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let text = "x∈S ∧ (y+1)∗2≤z ⇒ ¬(card(S)=0)";
    let formula = Formula::from(parse_predicate(&ff, text)?);

    let positions = formula.get_positions(|tag, node| tag != Tag::BoundIdentDecl && node.is_well_formed());
    assert!(positions.len() > 10);

    for position in positions {
        let node = formula
            .get_sub_formula(&position)
            .ok_or_else(|| format!("no node at {}", position))?;
        let location = node.location().ok_or_else(|| format!("no location at {}", position))?;
        let image = location.slice(text).ok_or_else(|| format!("bad location {}", location))?;

        let reparsed = match &node {
            Formula::Expression(_) => Formula::from(parse_expression(&ff, image)?),
            Formula::Predicate(_) => Formula::from(parse_predicate(&ff, image)?),
            _ => continue,
        };
        assert_eq!(reparsed, node, "{} at {}", image, position);
    }

    Ok(())
}

#[test]
fn origin_is_recorded() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();
    let pred = ff
        .parse_predicate("x=y", Some("inv1"))
        .into_result()
        .map_err(|problems| problems.head)?;

    let location = pred.location().ok_or("no location")?;
    assert_eq!(location.origin(), Some("inv1"));
    assert_eq!(location.range(), 0..3);

    Ok(())
}

#[test]
fn assignments() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();

    for image in ["x ≔ x+1", "x,y ≔ y,x", "x :∈ S", "x :∣ x'>x"] {
        let parsed = ff.parse_assignment(image, None).into_result().map_err(|p| p.head)?;
        let reparsed = ff
            .parse_assignment(&parsed.to_string(), None)
            .into_result()
            .map_err(|p| p.head)?;
        assert_eq!(parsed, reparsed);
    }

    assert!(ff.parse_assignment("x,y ≔ 1", None).has_problem());
    assert!(ff.parse_assignment("x,x ≔ 1,2", None).has_problem());

    Ok(())
}

#[test]
fn types() -> Result<(), Box<dyn Error>> {
    let ff = FormulaFactory::default_factory();

    let relation = ff.parse_type("ℙ(S)↔ℤ").into_result().map_err(|p| p.head)?;
    let expected = ff.make_relational_type(ff.make_power_set_type(ff.make_given_type("S")?)?, ff.make_integer_type())?;
    assert_eq!(relation, expected);

    assert!(ff.parse_type("x+1").has_problem());

    Ok(())
}
