//! Token scanner for the Cypher source.
//!
//! Scanning does three jobs before the grammar sees the input:
//! lexical validation (unterminated strings and block comments, disallowed
//! code points), span assignment for every token, and comment masking.
//! Comments are blanked to spaces rather than removed so that every byte
//! offset in the masked text equals the offset in the original source, which
//! keeps downstream diagnostics honest.

use thiserror::Error;

use crate::diagnostics::{Diagnostic, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Ident,
    QuotedIdent,
    Integer,
    Float,
    Str,
    Parameter,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    DotDot,
    Comma,
    Colon,
    Semicolon,
    Pipe,
    Arrow,
    LeftArrow,
    Dash,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Star,
    Slash,
    Percent,
    Caret,
}

/// One token: a kind tag, the raw lexeme, and its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

/// The scan result: the token list plus the comment-masked source the
/// grammar parser runs over.
#[derive(Debug)]
pub struct TokenStream<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    masked: String,
}

impl<'a> TokenStream<'a> {
    pub fn tokens(&self) -> &[Token<'a>] {
        &self.tokens
    }

    /// Source text with comments blanked to spaces; identical length and
    /// line structure to the original.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn source(&self) -> &'a str {
        self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedBlockComment,
    DisallowedCharacter,
}

impl LexErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LexErrorKind::UnterminatedString => "UnterminatedString",
            LexErrorKind::UnterminatedBlockComment => "UnterminatedBlockComment",
            LexErrorKind::DisallowedCharacter => "DisallowedCharacter",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind.as_str(),
            message: self.message.clone(),
            span: self.span,
            secondary_span: None,
        }
    }
}

const KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "WHERE", "RETURN", "WITH", "UNWIND", "AS", "ORDER", "BY", "SKIP",
    "LIMIT", "ASC", "DESC", "DISTINCT", "AND", "OR", "NOT", "IS", "NULL", "TRUE", "FALSE", "IN",
    "STARTS", "ENDS", "CONTAINS", "CASE", "WHEN", "THEN", "ELSE", "END", "EXISTS", "CREATE",
    "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "CALL", "UNION",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scan `source` into a token stream, masking comments as it goes.
pub fn scan(source: &str) -> Result<TokenStream<'_>, LexError> {
    let mut tokens = Vec::new();
    let mut masked: Vec<u8> = source.as_bytes().to_vec();
    let bytes = source.as_bytes();
    let mut i = 0usize;

    macro_rules! push {
        ($kind:expr, $start:expr, $end:expr) => {
            tokens.push(Token {
                kind: $kind,
                text: &source[$start..$end],
                span: Span::at(source, $start, $end - $start),
            })
        };
    }

    while i < source.len() {
        let rest = &source[i..];
        let c = rest.chars().next().unwrap();

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        // Line comments. Only `//` opens one: `--` is the bare undirected
        // relationship syntax (`(a)--(b)`) and must reach the grammar.
        if rest.starts_with("//") {
            let start = i;
            while i < source.len() && bytes[i] != b'\n' {
                i += 1;
            }
            blank(&mut masked, start, i);
            continue;
        }

        // Block comments.
        if rest.starts_with("/*") {
            let start = i;
            match rest[2..].find("*/") {
                Some(pos) => {
                    i += 2 + pos + 2;
                    blank(&mut masked, start, i);
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedBlockComment,
                        message: "unterminated block comment".into(),
                        span: Span::at(source, start, source.len() - start),
                    });
                }
            }
            continue;
        }

        // String literals, single or double quoted, with backslash escapes.
        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            let mut closed = false;
            while i < source.len() {
                let ch = source[i..].chars().next().unwrap();
                if ch == '\\' {
                    i += 1;
                    if i < source.len() {
                        i += source[i..].chars().next().unwrap().len_utf8();
                    }
                    continue;
                }
                i += ch.len_utf8();
                if ch == c {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(LexError {
                    kind: LexErrorKind::UnterminatedString,
                    message: "unterminated string literal".into(),
                    span: Span::at(source, start, source.len() - start),
                });
            }
            push!(TokenKind::Str, start, i);
            continue;
        }

        // Backtick-quoted identifiers.
        if c == '`' {
            let start = i;
            match rest[1..].find('`') {
                Some(pos) => {
                    i += 1 + pos + 1;
                    push!(TokenKind::QuotedIdent, start, i);
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        message: "unterminated quoted identifier".into(),
                        span: Span::at(source, start, source.len() - start),
                    });
                }
            }
            continue;
        }

        // Parameters: `$name` or `$0`.
        if c == '$' {
            let start = i;
            i += 1;
            let tail = source[i..]
                .find(|ch: char| !is_ident_char(ch))
                .unwrap_or(source.len() - i);
            if tail == 0 {
                return Err(LexError {
                    kind: LexErrorKind::DisallowedCharacter,
                    message: "expected a parameter name after '$'".into(),
                    span: Span::at(source, start, 1),
                });
            }
            i += tail;
            push!(TokenKind::Parameter, start, i);
            continue;
        }

        // Numbers. `1..3` must lex as Integer DotDot Integer, so a dot only
        // starts the fractional part when a digit follows it.
        if c.is_ascii_digit() {
            let start = i;
            while i < source.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let mut kind = TokenKind::Integer;
            if i + 1 < source.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                kind = TokenKind::Float;
                i += 1;
                while i < source.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < source.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < source.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < source.len() && bytes[j].is_ascii_digit() {
                    kind = TokenKind::Float;
                    i = j;
                    while i < source.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            push!(kind, start, i);
            continue;
        }

        // Identifiers and keywords.
        if is_ident_start(c) {
            let start = i;
            while i < source.len() {
                let ch = source[i..].chars().next().unwrap();
                if !is_ident_char(ch) {
                    break;
                }
                i += ch.len_utf8();
            }
            let word = &source[start..i];
            let kind = if is_keyword(word) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            push!(kind, start, i);
            continue;
        }

        if !c.is_ascii() {
            return Err(LexError {
                kind: LexErrorKind::DisallowedCharacter,
                message: format!("disallowed character {c:?}"),
                span: Span::at(source, i, c.len_utf8()),
            });
        }

        // Arrows and two-byte operators before their single-byte prefixes.
        let two = if rest.len() >= 2 && rest.is_char_boundary(2) {
            &rest[..2]
        } else {
            &rest[..1]
        };
        let (kind, len) = match two {
            "->" => (TokenKind::Arrow, 2),
            "<-" => (TokenKind::LeftArrow, 2),
            "<=" => (TokenKind::Lte, 2),
            ">=" => (TokenKind::Gte, 2),
            "<>" => (TokenKind::Neq, 2),
            ".." => (TokenKind::DotDot, 2),
            _ => match c {
                '(' => (TokenKind::LParen, 1),
                ')' => (TokenKind::RParen, 1),
                '[' => (TokenKind::LBracket, 1),
                ']' => (TokenKind::RBracket, 1),
                '{' => (TokenKind::LBrace, 1),
                '}' => (TokenKind::RBrace, 1),
                '.' => (TokenKind::Dot, 1),
                ',' => (TokenKind::Comma, 1),
                ':' => (TokenKind::Colon, 1),
                ';' => (TokenKind::Semicolon, 1),
                '|' => (TokenKind::Pipe, 1),
                '-' => (TokenKind::Dash, 1),
                '=' => (TokenKind::Eq, 1),
                '<' => (TokenKind::Lt, 1),
                '>' => (TokenKind::Gt, 1),
                '+' => (TokenKind::Plus, 1),
                '*' => (TokenKind::Star, 1),
                '/' => (TokenKind::Slash, 1),
                '%' => (TokenKind::Percent, 1),
                '^' => (TokenKind::Caret, 1),
                _ => {
                    return Err(LexError {
                        kind: LexErrorKind::DisallowedCharacter,
                        message: format!("disallowed character {c:?}"),
                        span: Span::at(source, i, c.len_utf8()),
                    });
                }
            },
        };
        push!(kind, i, i + len);
        i += len;
    }

    let masked = String::from_utf8(masked).expect("masking only replaces ascii bytes");
    Ok(TokenStream {
        source,
        tokens,
        masked,
    })
}

fn blank(masked: &mut [u8], start: usize, end: usize) {
    for b in &mut masked[start..end] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source)
            .unwrap()
            .tokens()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_a_simple_match() {
        assert_eq!(
            kinds("MATCH (n:User) RETURN n"),
            vec![
                TokenKind::Keyword,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Keyword,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn range_does_not_eat_the_dots() {
        assert_eq!(
            kinds("*1..3"),
            vec![
                TokenKind::Star,
                TokenKind::Integer,
                TokenKind::DotDot,
                TokenKind::Integer,
            ]
        );
    }

    #[test]
    fn floats_and_scientific_notation() {
        assert_eq!(kinds("3.14 1e10 2.5e-3"), vec![TokenKind::Float; 3]);
    }

    #[test]
    fn comments_are_masked_in_place() {
        let stream = scan("MATCH (n) // trailing\nRETURN n").unwrap();
        assert_eq!(stream.masked().len(), stream.source().len());
        assert!(!stream.masked().contains("trailing"));
        assert!(stream.masked().contains('\n'));
    }

    #[test]
    fn block_comment_masked() {
        let stream = scan("MATCH /* c */ (n) RETURN n").unwrap();
        assert!(!stream.masked().contains("c */"));
        assert_eq!(stream.masked().len(), stream.source().len());
    }

    #[test]
    fn string_with_comment_lookalike_survives() {
        let stream = scan("RETURN 'http://x--y'").unwrap();
        assert!(stream.masked().contains("http://x--y"));
    }

    #[test]
    fn double_dash_is_relationship_syntax_not_a_comment() {
        let stream = scan("MATCH (a)--(b) RETURN a").unwrap();
        assert!(stream.masked().contains("(a)--(b) RETURN a"));
        let dashes = stream
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Dash)
            .count();
        assert_eq!(dashes, 2);
    }

    #[test]
    fn unterminated_string() {
        let err = scan("MATCH (n) WHERE n.a = 'oops").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.span.start_offset, 22);
    }

    #[test]
    fn unterminated_block_comment() {
        let err = scan("MATCH (n) /* oops").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedBlockComment);
    }

    #[test]
    fn disallowed_character() {
        let err = scan("MATCH (n) WHERE n.a ? 1").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::DisallowedCharacter);
        assert_eq!(err.span.line, 1);
        assert_eq!(err.span.column, 21);
    }

    #[test]
    fn escaped_quote_inside_string() {
        let stream = scan(r"RETURN 'it\'s fine'").unwrap();
        let strings: Vec<_> = stream
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Str)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].text, r"'it\'s fine'");
    }

    #[test]
    fn parameter_token() {
        let stream = scan("WHERE n.name = $who").unwrap();
        let param = stream
            .tokens()
            .iter()
            .find(|t| t.kind == TokenKind::Parameter)
            .unwrap();
        assert_eq!(param.text, "$who");
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let stream = scan("match (n) return n").unwrap();
        assert_eq!(stream.tokens()[0].kind, TokenKind::Keyword);
    }
}
