//! Tokenizer for the mathematical notation.
//!
//! Operators are mostly single Unicode glyphs. ASCII keywords (`card`, `NAT`, `POW`, ...) are
//! read as identifiers first and then mapped to the glyph of the operator they stand for, so the
//! parser only ever deals with canonical symbols.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use nom::bytes::complete::take_while;
use nom::character::complete::{char, digit1, satisfy};
use nom::combinator::{map_res, opt, recognize};
use nom::error::{Error, ErrorKind};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use num_bigint::BigInt;

use crate::error::{Problem, ProblemKind};
use crate::factory::OPERATOR_LETTERS;
use crate::location::SourceLocation;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Identifier(String),
    Integer(BigInt),
    PredicateVariable(String),
    Symbol(&'static str),
    End,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Identifier(name) | Token::PredicateVariable(name) => f.write_str(name),
            Token::Integer(value) => write!(f, "{}", value),
            Token::Symbol(symbol) => f.write_str(symbol),
            Token::End => f.write_str("end of input"),
        }
    }
}

/// A token with its byte range in the source text.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Symbols, longest first among those sharing a prefix.
const SYMBOLS: &[&str] = &[
    "ℕ1", "ℙ1", "ℕ", "ℤ", "ℙ", "λ", ":∈", ":∣", "≔", "⦂", "·", "∣", "(", ")", "[", "]", "{", "}", ",", "↦", "↔",
    "\u{e100}", "\u{e101}", "\u{e102}", "⇸", "→", "⤔", "↣", "⤀", "↠", "⤖", "∖", "×", "⊗", "∥", "◁", "⩤", "▷", "⩥",
    "‥", "−", "+", "∗", "÷", "^", "∼", "∪", "∩", "∘", ";", "\u{e103}", "∅", "⋃", "⋂", "⊤", "⊥", "¬", "⇒", "⇔", "∧",
    "∨", "=", "≠", "<", "≤", ">", "≥", "∈", "∉", "⊂", "⊄", "⊆", "⊈", "∀", "∃",
];

/// Words read as operators rather than identifiers, with the symbol they denote.
const KEYWORDS: &[(&str, &str)] = &[
    ("BOOL", "BOOL"),
    ("TRUE", "TRUE"),
    ("FALSE", "FALSE"),
    ("bool", "bool"),
    ("card", "card"),
    ("dom", "dom"),
    ("ran", "ran"),
    ("finite", "finite"),
    ("partition", "partition"),
    ("min", "min"),
    ("max", "max"),
    ("union", "union"),
    ("inter", "inter"),
    ("pred", "pred"),
    ("succ", "succ"),
    ("prj1", "prj1"),
    ("prj2", "prj2"),
    ("id", "id"),
    ("mod", "mod"),
    ("NAT", "ℕ"),
    ("NAT1", "ℕ1"),
    ("INT", "ℤ"),
    ("POW", "ℙ"),
    ("POW1", "ℙ1"),
];

fn is_identifier_start(c: char) -> bool {
    (c.is_alphabetic() || c == '_') && !OPERATOR_LETTERS.contains(&c)
}

fn is_identifier_part(c: char) -> bool {
    (c.is_alphanumeric() || c == '_') && !OPERATOR_LETTERS.contains(&c)
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace)(input)
}

fn symbol(input: &str) -> IResult<&str, Token> {
    SYMBOLS
        .iter()
        .find_map(|&symbol| input.strip_prefix(symbol).map(|rest| (rest, Token::Symbol(symbol))))
        .ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    let mut parser = recognize(tuple((
        satisfy(is_identifier_start),
        take_while(is_identifier_part),
        opt(char('\'')),
    )));

    parser(input)
}

fn word(input: &str) -> IResult<&str, Token> {
    let (rest, name) = identifier(input)?;
    let token = KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == name)
        .map_or_else(|| Token::Identifier(name.to_string()), |&(_, symbol)| Token::Symbol(symbol));

    Ok((rest, token))
}

fn predicate_variable(input: &str) -> IResult<&str, Token> {
    let mut parser = recognize(preceded(char('$'), identifier));
    let (rest, name) = parser(input)?;

    Ok((rest, Token::PredicateVariable(name.to_string())))
}

fn integer(input: &str) -> IResult<&str, Token> {
    let mut parser = map_res(digit1, BigInt::from_str);
    let (rest, value) = parser(input)?;

    Ok((rest, Token::Integer(value)))
}

fn token(input: &str) -> IResult<&str, Token> {
    symbol(input)
        .or_else(|_| predicate_variable(input))
        .or_else(|_| word(input))
        .or_else(|_| integer(input))
}

/// Split `text` into lexemes, ending with [`Token::End`].
///
/// Lexing stops at the first character that starts no token.
pub(crate) fn tokenize(text: &str, origin: Option<&Arc<str>>) -> Result<Vec<Lexeme>, Problem> {
    let offset = |rest: &str| text.len() - rest.len();
    let mut lexemes = Vec::new();
    let mut input = text;

    loop {
        let (rest, _) = whitespace(input).map_err(|_| unrecognized(text, offset(input), origin))?;
        input = rest;

        if input.is_empty() {
            let end = text.len();
            lexemes.push(Lexeme {
                token: Token::End,
                start: end,
                end,
            });
            return Ok(lexemes);
        }

        let start = offset(input);
        let (rest, token) = token(input).map_err(|_| unrecognized(text, start, origin))?;
        lexemes.push(Lexeme {
            token,
            start,
            end: offset(rest),
        });
        input = rest;
    }
}

fn unrecognized(text: &str, start: usize, origin: Option<&Arc<str>>) -> Problem {
    let found = text[start..].chars().next();
    let end = start + found.map_or(0, char::len_utf8);
    let location = SourceLocation::with_origin(start, end, origin.cloned());
    let message = match found {
        Some(c) => format!("unrecognized character {:?}", c),
        None => "unexpected end of input".to_string(),
    };

    Problem::new(ProblemKind::LexicalError, Some(location), message)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{tokenize, Token};
    use crate::error::ProblemKind;

    fn tokens(text: &str) -> Result<Vec<Token>, Box<dyn Error>> {
        Ok(tokenize(text, None)?.into_iter().map(|lexeme| lexeme.token).collect())
    }

    #[test]
    fn symbols_and_identifiers() -> Result<(), Box<dyn Error>> {
        assert_eq!(
            tokens("x' ∈ ℕ1")?,
            vec![
                Token::Identifier("x'".to_string()),
                Token::Symbol("∈"),
                Token::Symbol("ℕ1"),
                Token::End
            ]
        );

        assert_eq!(
            tokens("λx·card(x)")?,
            vec![
                Token::Symbol("λ"),
                Token::Identifier("x".to_string()),
                Token::Symbol("·"),
                Token::Symbol("card"),
                Token::Symbol("("),
                Token::Identifier("x".to_string()),
                Token::Symbol(")"),
                Token::End
            ]
        );

        Ok(())
    }

    #[test]
    fn keywords_map_to_symbols() -> Result<(), Box<dyn Error>> {
        assert_eq!(tokens("POW(NAT)")?[..2], [Token::Symbol("ℙ"), Token::Symbol("(")]);
        assert_eq!(tokens("x mod 12")?[1..], [Token::Symbol("mod"), Token::Integer(12.into()), Token::End]);
        assert_eq!(tokens("$P")?[0], Token::PredicateVariable("$P".to_string()));

        Ok(())
    }

    #[test]
    fn offsets_and_whitespace() -> Result<(), Box<dyn Error>> {
        let lexemes = tokenize("a\u{00a0}\u{2007}∪\tb", None)?;
        let ranges: Vec<_> = lexemes.iter().map(|lexeme| (lexeme.start, lexeme.end)).collect();

        assert_eq!(ranges, vec![(0, 1), (6, 9), (10, 11), (11, 11)]);

        Ok(())
    }

    #[test]
    fn unrecognized_character() {
        let problem = tokenize("x/y", None).err();

        assert_eq!(problem.as_ref().map(|p| p.kind()), Some(ProblemKind::LexicalError));
        assert_eq!(problem.and_then(|p| p.location().map(|l| l.range())), Some(1..2));
    }
}
