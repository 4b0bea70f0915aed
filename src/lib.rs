//! pgraf-cypher — Cypher to PostgreSQL translation over the pgraf
//! property-graph schema.
//!
//! The graph lives in two tables:
//! `nodes(id uuid, labels text[], properties jsonb, ...)` and
//! `edges(source uuid, target uuid, labels text[], properties jsonb, ...)`.
//! [`translate`] turns a read-only Cypher query into parameterized SQL over
//! that schema:
//!
//! ```
//! let translation = pgraf_cypher::translate(
//!     "MATCH (u:User) WHERE u.age > $min RETURN u.name LIMIT 5",
//! )
//! .unwrap();
//! assert!(translation.sql.contains("'User' = ANY"));
//! assert_eq!(translation.parameters.get("min"), Some(1));
//! ```
//!
//! The pipeline is lexing → parsing → lowering → SQL emission; each stage
//! is a pure function and nothing outlives a call. The optional
//! [`executor::PgrafCypher`] façade executes translations against a pooled
//! Postgres connection and streams rows.

pub mod config;
pub mod cypher_parser;
pub mod diagnostics;
pub mod executor;
pub mod lexer;
pub mod lowerer;
pub mod sql_emitter;

use serde::Serialize;

pub use config::PgrafConfig;
pub use diagnostics::{Diagnostic, Span, TranslateError};
pub use executor::{ExecuteError, NodeRow, PgrafCypher, QueryStream};
pub use sql_emitter::context::ParameterMap;
pub use sql_emitter::EmitterOptions;

/// Per-call translation options.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Schema holding the `nodes` and `edges` tables.
    pub schema: String,
    /// Upper bound applied to unbounded variable-length traversals.
    pub max_variable_path_depth: u32,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        let emitter = EmitterOptions::default();
        TranslateOptions {
            schema: emitter.schema,
            max_variable_path_depth: emitter.max_variable_path_depth,
        }
    }
}

impl TranslateOptions {
    fn emitter_options(&self) -> EmitterOptions {
        EmitterOptions {
            schema: self.schema.clone(),
            max_variable_path_depth: self.max_variable_path_depth,
        }
    }
}

/// A translated query: SQL text plus the parameter-name → placeholder
/// position binding.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub sql: String,
    pub parameters: ParameterMap,
}

/// Translate a Cypher query with default options.
pub fn translate(source: &str) -> Result<Translation, TranslateError> {
    translate_with_options(source, &TranslateOptions::default())
}

/// Translate a Cypher query.
///
/// Deterministic: the same source and options produce byte-identical SQL
/// and the same parameter map.
pub fn translate_with_options(
    source: &str,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let tokens = lexer::scan(source)?;
    log::debug!("scanned {} token(s)", tokens.tokens().len());

    let parsed = cypher_parser::parse(tokens.masked())?;
    let query = lowerer::lower(&parsed, tokens.masked())?;
    let (sql, parameters) = sql_emitter::emit(&query, &options.emitter_options())?;

    Ok(Translation { sql, parameters })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_smoke() {
        let translation = translate("MATCH (n:User) RETURN n.name LIMIT 5").unwrap();
        assert!(translation.sql.starts_with("SELECT"));
        assert!(translation.parameters.is_empty());
    }

    #[test]
    fn lex_errors_surface_as_diagnostics() {
        let err = translate("MATCH (n) WHERE n.a = 'oops").unwrap_err();
        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.kind, "UnterminatedString");
        assert_eq!(diagnostic.span.line, 1);
    }

    #[test]
    fn parse_errors_carry_spans() {
        let err = translate("MATCH (n RETURN n").unwrap_err();
        assert!(matches!(err, TranslateError::Parse(_)));
    }

    #[test]
    fn lower_errors_carry_kinds() {
        let err = translate("CREATE (n:User)").unwrap_err();
        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.kind, "UnsupportedConstruct");
        assert_eq!(diagnostic.span.start_offset, 0);
    }

    #[test]
    fn comments_do_not_shift_spans() {
        let err = translate("// leading comment\nMATCH (n) RETURN m").unwrap_err();
        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.kind, "UnknownVariable");
        assert_eq!(diagnostic.span.line, 2);
    }

    #[test]
    fn options_reach_the_emitter() {
        let options = TranslateOptions {
            schema: "g".into(),
            max_variable_path_depth: 4,
        };
        let translation =
            translate_with_options("MATCH (a)-[:R*]->(b) RETURN a", &options).unwrap();
        assert!(translation.sql.contains("g.edges"));
        assert!(translation.sql.contains("p.depth < 4"));
    }
}
