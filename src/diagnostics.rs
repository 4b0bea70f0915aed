//! Source spans and the diagnostic surface shared by every pipeline stage.
//!
//! Each stage fails with its own error type (`LexError`, `ParseError`,
//! `LowerError`, `EmitError`); all of them convert into [`TranslateError`]
//! at the public boundary and expose a uniform [`Diagnostic`] for adapters.

use serde::Serialize;
use thiserror::Error;

use crate::cypher_parser::errors::ParseError;
use crate::lexer::LexError;
use crate::lowerer::LowerError;
use crate::sql_emitter::EmitError;

/// A half-open byte range into the query source, with the 1-based line and
/// column of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    /// Span of `fragment`, which must be a sub-slice of `source`.
    ///
    /// Every parse-tree node keeps `&str` fragments borrowed from the scanned
    /// source, so the byte offset falls out of pointer arithmetic and the
    /// line/column from a single scan of the prefix.
    pub fn of(source: &str, fragment: &str) -> Span {
        let start = fragment_offset(source, fragment);
        Span::at(source, start, fragment.len())
    }

    /// Span starting at `offset` covering `len` bytes.
    pub fn at(source: &str, offset: usize, len: usize) -> Span {
        let offset = offset.min(source.len());
        let (line, column) = line_column(source, offset);
        Span {
            start_offset: offset,
            end_offset: (offset + len).min(source.len()),
            line,
            column,
        }
    }
}

fn fragment_offset(source: &str, fragment: &str) -> usize {
    let base = source.as_ptr() as usize;
    let frag = fragment.as_ptr() as usize;
    if frag >= base && frag + fragment.len() <= base + source.len() {
        frag - base
    } else {
        0
    }
}

fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut column = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Adapter-facing error report: a kind from the closed taxonomy, a message,
/// the offending span, and optionally a second span pointing at an earlier
/// conflicting construct.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    pub span: Span,
    pub secondary_span: Option<Span>,
}

/// Any failure of the translation pipeline.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("semantic error: {0}")]
    Lower(#[from] LowerError),
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
}

impl TranslateError {
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            TranslateError::Lex(e) => e.diagnostic(),
            TranslateError::Parse(e) => e.diagnostic(),
            TranslateError::Lower(e) => e.diagnostic(),
            TranslateError::Emit(e) => e.diagnostic(),
        }
    }
}
