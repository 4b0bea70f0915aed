//! Grammar recognizer for the supported Cypher subset.
//!
//! The parser runs over the comment-masked source produced by the lexer and
//! builds the concrete parse tree clause by clause. Mutation keywords are
//! recognized and recorded as [`ast::UnsupportedClause`] so lowering can
//! reject them with a precise span; anything else that fails the grammar is
//! a [`errors::ParseError`].

use nom::branch::alt;
use nom::Parser;

pub mod ast;
pub mod common;
pub mod errors;
pub mod expression;
mod limit_clause;
mod match_clause;
mod order_by_clause;
pub mod path_pattern;
mod projection;
mod return_clause;
mod skip_clause;
mod unwind_clause;
mod with_clause;

use ast::{Clause, ParsedQuery, UnsupportedClause};
use common::{keyword, ws, PResult};
use errors::{CypherParseError, ParseError};

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "CALL", "UNION",
];

fn parse_unsupported_keyword(input: &str) -> PResult<'_, &str> {
    for &kw in UNSUPPORTED_KEYWORDS {
        if let Ok((rest, fragment)) = ws(keyword(kw)).parse(input) {
            return Ok((rest, fragment));
        }
    }
    Err(nom::Err::Error(CypherParseError::new(input, "a clause")))
}

fn parse_clause(input: &str) -> PResult<'_, Clause<'_>> {
    alt((
        nom::combinator::map(match_clause::parse_match_clause, Clause::Match),
        nom::combinator::map(with_clause::parse_with_clause, Clause::With),
        nom::combinator::map(unwind_clause::parse_unwind_clause, Clause::Unwind),
        nom::combinator::map(return_clause::parse_return_clause, Clause::Return),
    ))
    .parse(input)
}

/// Parse a single statement. Trailing tokens after the last clause are
/// rejected; one terminating semicolon is tolerated.
pub fn parse(masked: &str) -> Result<ParsedQuery<'_>, ParseError> {
    let mut input = masked;
    let mut clauses = Vec::new();

    loop {
        let trimmed = input.trim_start();
        if trimmed.is_empty() || trimmed == ";" {
            break;
        }

        if let Ok((_, fragment)) = parse_unsupported_keyword(input) {
            // Stop at the keyword; the rest of the statement is irrelevant
            // because lowering rejects the whole query here.
            clauses.push(Clause::Unsupported(UnsupportedClause { keyword: fragment }));
            break;
        }

        match parse_clause(input) {
            Ok((rest, clause)) => {
                clauses.push(clause);
                input = rest;
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut err = ParseError::from_nom(masked, &e);
                if !clauses.is_empty() && is_default_context(&e) {
                    err.message = "expected end of statement".into();
                }
                return Err(err);
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(ParseError::from_nom(
                    masked,
                    &CypherParseError::new(input, "a complete statement"),
                ));
            }
        }
    }

    if clauses.is_empty() {
        return Err(ParseError::from_nom(
            masked,
            &CypherParseError::new(input, "a MATCH, WITH, UNWIND or RETURN clause"),
        ));
    }

    Ok(ParsedQuery { clauses })
}

fn is_default_context(err: &CypherParseError<'_>) -> bool {
    err.errors
        .first()
        .map(|(_, ctx)| *ctx == "unexpected input")
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_query_clause_sequence() {
        let parsed = parse(
            "MATCH (u:User)-[:FOLLOWS]->(v:User) \
             WITH v, count(u) AS followers \
             RETURN v.name, followers ORDER BY followers DESC LIMIT 10",
        )
        .unwrap();
        assert_eq!(parsed.clauses.len(), 3);
        assert!(matches!(parsed.clauses[0], Clause::Match(_)));
        assert!(matches!(parsed.clauses[1], Clause::With(_)));
        assert!(matches!(parsed.clauses[2], Clause::Return(_)));
    }

    #[test]
    fn unsupported_create_is_recorded() {
        let parsed = parse("CREATE (n:User)").unwrap();
        assert_eq!(parsed.clauses.len(), 1);
        match &parsed.clauses[0] {
            Clause::Unsupported(c) => assert_eq!(c.keyword, "CREATE"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unsupported_after_match_is_recorded() {
        let parsed = parse("MATCH (n) SET n.x = 1").unwrap();
        assert_eq!(parsed.clauses.len(), 2);
        assert!(matches!(parsed.clauses[1], Clause::Unsupported(_)));
    }

    #[test]
    fn empty_statement_is_a_parse_error() {
        assert!(parse("   ").is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = parse("MATCH (n) RETURN n ???").unwrap_err();
        assert!(err.span.start_offset > 0);
    }

    #[test]
    fn trailing_semicolon_is_tolerated() {
        assert!(parse("MATCH (n) RETURN n;").is_ok());
    }

    #[test]
    fn multiple_match_clauses() {
        let parsed = parse("MATCH (a) MATCH (b) RETURN a, b").unwrap();
        assert_eq!(parsed.clauses.len(), 3);
    }

    #[test]
    fn optional_match_sequence() {
        let parsed = parse("MATCH (a) OPTIONAL MATCH (a)-[:LIKES]->(p) RETURN a, p").unwrap();
        assert_eq!(parsed.clauses.len(), 3);
    }
}
