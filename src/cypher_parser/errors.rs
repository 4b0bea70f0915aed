//! Parser error plumbing.
//!
//! During parsing, errors accumulate `(remaining input, context)` pairs in
//! the nom error type; at the parser boundary the deepest pair is turned
//! into a [`ParseError`] with a real span.

use nom::error::{ContextError, FromExternalError, ParseError as NomParseError};
use std::fmt;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Span};

/// nom-side error: each entry pairs the input at the failure point with a
/// static context label from the grammar.
#[derive(Debug, PartialEq)]
pub struct CypherParseError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> CypherParseError<'a> {
    pub fn new(input: &'a str, ctx: &'static str) -> Self {
        CypherParseError {
            errors: vec![(input, ctx)],
        }
    }
}

impl<'a> NomParseError<&'a str> for CypherParseError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        CypherParseError {
            errors: vec![(input, "unexpected input")],
        }
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "unexpected input"));
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for CypherParseError<'a> {
    fn from_external_error(input: &'a str, _kind: nom::error::ErrorKind, _e: E) -> Self {
        CypherParseError {
            errors: vec![(input, "unexpected input")],
        }
    }
}

impl<'a> ContextError<&'a str> for CypherParseError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for CypherParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            let snippet: String = input.chars().take(24).collect();
            writeln!(f, "{ctx}: {snippet:?}")?;
        }
        Ok(())
    }
}

/// Public, owned parse failure with the offending span.
#[derive(Debug, Clone, Error)]
#[error("{message} at line {}, column {}", .span.line, .span.column)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: "ParseError",
            message: self.message.clone(),
            span: self.span,
            secondary_span: None,
        }
    }

    /// Build from the nom error: the deepest recorded context wins, and its
    /// remaining input locates the span in the masked source.
    pub fn from_nom(source: &str, err: &CypherParseError<'_>) -> ParseError {
        let (input, ctx) = err
            .errors
            .first()
            .copied()
            .unwrap_or((source, "unexpected input"));
        let trimmed = input.trim_start();
        let span = match trimmed.split_whitespace().next() {
            Some(word) => Span::of(source, &trimmed[..word.len()]),
            None => Span::at(source, source.len(), 0),
        };
        let message = if ctx.ends_with("not supported") {
            ctx.to_string()
        } else {
            format!("expected {ctx}")
        };
        ParseError { message, span }
    }
}
