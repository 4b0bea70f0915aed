//! Lexer and grammar boundary behavior seen through the public API.

use pgraf_cypher::{translate, TranslateError};

#[test]
fn keywords_are_case_insensitive() {
    let lower = translate("match (n:User) return n.name").unwrap();
    let upper = translate("MATCH (n:User) RETURN n.name").unwrap();
    assert_eq!(lower.sql, upper.sql);
}

#[test]
fn comments_are_ignored_everywhere() {
    let t = translate(
        "// leading\nMATCH (n:User) // trailing\n/* block\ncomment */ RETURN n.name",
    )
    .unwrap();
    let plain = translate("MATCH (n:User) RETURN n.name").unwrap();
    assert_eq!(t.sql, plain.sql);
}

#[test]
fn comment_lookalikes_inside_strings_survive() {
    let t = translate("MATCH (n) WHERE n.url = 'http://x--y/*z*/' RETURN n").unwrap();
    assert!(t.sql.contains("http://x--y/*z*/"));
}

#[test]
fn backtick_identifiers() {
    let t = translate("MATCH (m:`slack-message`) RETURN m.`thread-ts`").unwrap();
    assert!(t.sql.contains("'slack-message' = ANY(m_0.labels)"));
    assert!(t.sql.contains("m_0.properties ->> 'thread-ts'"));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let err = translate("MATCH (n) WHERE n.x = 'oops RETURN n").unwrap_err();
    assert!(matches!(err, TranslateError::Lex(_)));
    assert_eq!(err.diagnostic().kind, "UnterminatedString");
}

#[test]
fn unterminated_block_comment_is_a_lex_error() {
    let err = translate("MATCH (n) /* never closed RETURN n").unwrap_err();
    assert_eq!(err.diagnostic().kind, "UnterminatedBlockComment");
}

#[test]
fn disallowed_character_is_a_lex_error() {
    let err = translate("MATCH (n) WHERE n.x @ 1 RETURN n").unwrap_err();
    let d = err.diagnostic();
    assert_eq!(d.kind, "DisallowedCharacter");
    assert_eq!(d.span.start_offset, 20);
}

#[test]
fn syntax_error_reports_line_and_column() {
    let err = translate("MATCH (n:User)\nRETURN n.name FROM x").unwrap_err();
    let d = err.diagnostic();
    assert_eq!(d.kind, "ParseError");
    assert_eq!(d.span.line, 2);
}

#[test]
fn trailing_tokens_are_rejected() {
    let err = translate("MATCH (n) RETURN n n").unwrap_err();
    assert!(matches!(err, TranslateError::Parse(_)));
}

#[test]
fn missing_closing_paren_is_a_parse_error() {
    let err = translate("MATCH (n RETURN n").unwrap_err();
    assert!(matches!(err, TranslateError::Parse(_)));
}

#[test]
fn empty_input_is_a_parse_error() {
    let err = translate("   ").unwrap_err();
    assert!(matches!(err, TranslateError::Parse(_)));
}

#[test]
fn trailing_semicolon_is_accepted() {
    assert!(translate("MATCH (n) RETURN n;").is_ok());
}

#[test]
fn whitespace_and_newlines_are_insignificant() {
    let compact = translate("MATCH (a:User)-[:F]->(b) RETURN a.name").unwrap();
    let spread = translate("MATCH (a:User)\n  -[:F]->\n  (b)\nRETURN a.name").unwrap();
    assert_eq!(compact.sql, spread.sql);
}

#[test]
fn float_and_scientific_literals() {
    let t = translate("MATCH (n) WHERE n.score > 2.5 AND n.mass < 1e3 RETURN n").unwrap();
    assert!(t.sql.contains("> 2.5"));
    assert!(t.sql.contains("< 1000"));
}

#[test]
fn negative_literal_comparison() {
    let t = translate("MATCH (n) WHERE n.delta > -4 RETURN n").unwrap();
    assert!(t.sql.contains("> -4"));
}

#[test]
fn multiple_labels_on_a_node() {
    let t = translate("MATCH (u:User:Admin) RETURN u").unwrap();
    assert!(t.sql.contains("'User' = ANY(u_0.labels)"));
    assert!(t.sql.contains("'Admin' = ANY(u_0.labels)"));
}

#[test]
fn parenthesized_boolean_grouping() {
    let t =
        translate("MATCH (n) WHERE (n.a = 1 OR n.b = 2) AND n.c = 3 RETURN n").unwrap();
    // The OR stays grouped so the AND split cannot flatten it.
    assert!(t.sql.contains("OR"));
    let where_clause = t.sql.split(" WHERE ").nth(1).unwrap();
    assert!(where_clause.contains("(n_0.properties ->> 'a')::numeric = 1"));
}
