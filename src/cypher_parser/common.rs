//! Shared combinators: whitespace handling, keyword matching, identifiers
//! and literal fragments.

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while1};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{map, map_res, not, opt, peek, recognize, verify};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};

use super::ast::Literal;
use super::errors::CypherParseError;
use crate::lexer::is_keyword;

pub type PResult<'a, O> = IResult<&'a str, O, CypherParseError<'a>>;

/// Surround a parser with optional whitespace, the way every clause parser
/// consumes its neighborhood.
pub fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = CypherParseError<'a>>
where
    F: Parser<&'a str, Output = O, Error = CypherParseError<'a>>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ident_tail1(input: &str) -> PResult<'_, &str> {
    take_while1(is_ident_char)(input)
}

/// A case-insensitive keyword that is not a prefix of a longer identifier
/// (`OR` must not match the head of `ORDER`). Returns the matched fragment.
pub fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = CypherParseError<'a>> {
    terminated(tag_no_case(kw), not(peek(ident_tail1)))
}

/// An unquoted identifier: starts alphanumeric, continues with `_` and
/// alphanumerics, and is not a reserved keyword.
pub fn plain_identifier(input: &str) -> PResult<'_, &str> {
    verify(
        recognize(pair(
            take_while1(|c: char| c.is_alphanumeric()),
            opt(take_while1(is_ident_char)),
        )),
        |s: &str| !is_keyword(s),
    )
    .parse(input)
}

/// A backtick-quoted identifier; returns the inner fragment.
pub fn quoted_identifier(input: &str) -> PResult<'_, &str> {
    delimited(char('`'), take_while1(|c| c != '`'), char('`')).parse(input)
}

/// Identifier in either form.
pub fn identifier(input: &str) -> PResult<'_, &str> {
    alt((quoted_identifier, plain_identifier)).parse(input)
}

/// `$name` parameter; returns the name without the sigil.
pub fn parameter(input: &str) -> PResult<'_, &str> {
    preceded(tag("$"), take_while1(is_ident_char)).parse(input)
}

pub fn unsigned(input: &str) -> PResult<'_, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>()).parse(input)
}

/// A numeric literal fragment without sign; floats require digits on both
/// sides of the dot so that `1..3` range syntax lexes apart.
pub fn numeric_literal(input: &str) -> PResult<'_, Literal> {
    let (rest, fragment) = recognize((
        digit1,
        opt(recognize(pair(char('.'), digit1))),
        opt(recognize((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            digit1,
        ))),
    ))
    .parse(input)?;
    let literal = if fragment.contains('.') || fragment.contains('e') || fragment.contains('E') {
        fragment
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| nom::Err::Error(CypherParseError::new(input, "a numeric literal")))?
    } else {
        match fragment.parse::<i64>() {
            Ok(i) => Literal::Integer(i),
            Err(_) => fragment
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| nom::Err::Error(CypherParseError::new(input, "a numeric literal")))?,
        }
    };
    Ok((rest, literal))
}

/// A single- or double-quoted string literal with backslash escapes,
/// unescaped into an owned value.
pub fn string_literal(input: &str) -> PResult<'_, String> {
    let quote = match input.chars().next() {
        Some(c @ ('\'' | '"')) => c,
        _ => {
            return Err(nom::Err::Error(CypherParseError::new(
                input,
                "a string literal",
            )))
        }
    };
    let mut out = String::new();
    let mut chars = input[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => {
                    return Err(nom::Err::Error(CypherParseError::new(
                        input,
                        "a terminated string literal",
                    )))
                }
            },
            c if c == quote => return Ok((&input[1 + i + 1..], out)),
            c => out.push(c),
        }
    }
    Err(nom::Err::Error(CypherParseError::new(
        input,
        "a terminated string literal",
    )))
}

/// `TRUE`, `FALSE`, `NULL`, numbers, strings.
pub fn scalar_literal(input: &str) -> PResult<'_, Literal> {
    alt((
        map(string_literal, Literal::String),
        map(keyword("TRUE"), |_| Literal::Boolean(true)),
        map(keyword("FALSE"), |_| Literal::Boolean(false)),
        map(keyword("NULL"), |_| Literal::Null),
        numeric_literal,
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_does_not_match_longer_words() {
        assert!(keyword("OR").parse("ORDER BY").is_err());
        let (rest, frag) = keyword("OR").parse("OR a").unwrap();
        assert_eq!(frag, "OR");
        assert_eq!(rest, " a");
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert!(keyword("MATCH").parse("match (n)").is_ok());
    }

    #[test]
    fn identifiers_reject_keywords_and_leading_underscores() {
        assert!(plain_identifier("RETURN").is_err());
        assert!(plain_identifier("_x").is_err());
        assert_eq!(plain_identifier("user_id rest").unwrap().1, "user_id");
    }

    #[test]
    fn quoted_identifier_strips_backticks() {
        assert_eq!(identifier("`slack-message`").unwrap().1, "slack-message");
    }

    #[test]
    fn parameter_name() {
        assert_eq!(parameter("$who rest").unwrap().1, "who");
        assert!(parameter("who").is_err());
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(numeric_literal("42").unwrap().1, Literal::Integer(42));
        assert_eq!(numeric_literal("3.5").unwrap().1, Literal::Float(3.5));
        assert_eq!(numeric_literal("1e3").unwrap().1, Literal::Float(1000.0));
        assert_eq!(numeric_literal("2.5e1").unwrap().1, Literal::Float(25.0));
    }

    #[test]
    fn range_dots_are_not_part_of_a_float() {
        let (rest, lit) = numeric_literal("1..3").unwrap();
        assert_eq!(lit, Literal::Integer(1));
        assert_eq!(rest, "..3");
    }

    #[test]
    fn string_literal_unescapes() {
        assert_eq!(
            string_literal(r"'it\'s' rest").unwrap(),
            (" rest", "it's".to_string())
        );
        assert_eq!(
            string_literal(r#""a\nb""#).unwrap().1,
            "a\nb".to_string()
        );
    }

    #[test]
    fn scalar_literal_keywords() {
        assert_eq!(scalar_literal("true").unwrap().1, Literal::Boolean(true));
        assert_eq!(scalar_literal("NULL").unwrap().1, Literal::Null);
    }
}
