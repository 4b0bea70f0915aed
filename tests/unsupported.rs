//! Every construct outside the supported surface must fail with a specific
//! error kind and a span pointing at the offending token.

use pgraf_cypher::{translate, TranslateError};

fn diagnostic_for(source: &str) -> pgraf_cypher::Diagnostic {
    translate(source)
        .expect_err(&format!("expected failure for {source:?}"))
        .diagnostic()
}

#[test]
fn mutation_keywords_are_rejected() {
    for (source, keyword) in [
        ("CREATE (n:User)", "CREATE"),
        ("MERGE (n:User {id: 1})", "MERGE"),
        ("MATCH (n) SET n.x = 1", "SET"),
        ("MATCH (n) DELETE n", "DELETE"),
        ("MATCH (n) DETACH DELETE n", "DETACH"),
        ("MATCH (n) REMOVE n.x", "REMOVE"),
        ("CALL db.labels()", "CALL"),
    ] {
        let d = diagnostic_for(source);
        assert_eq!(d.kind, "UnsupportedConstruct", "{source}");
        let offset = source.find(keyword).unwrap();
        assert_eq!(d.span.start_offset, offset, "{source}");
        assert_eq!(d.span.end_offset, offset + keyword.len(), "{source}");
        assert!(d.message.contains(keyword), "{source}: {}", d.message);
    }
}

#[test]
fn union_is_rejected() {
    let d = diagnostic_for("MATCH (a) RETURN a UNION MATCH (b) RETURN b");
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert!(d.message.contains("UNION"));
}

#[test]
fn shortest_path_is_rejected() {
    let d = diagnostic_for("MATCH shortestPath((a)-[*]-(b)) RETURN a");
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert!(d.message.contains("shortestPath"));
}

#[test]
fn all_shortest_paths_is_rejected() {
    let d = diagnostic_for("MATCH allShortestPaths((a)-[*]-(b)) RETURN a");
    assert_eq!(d.kind, "UnsupportedConstruct");
}

#[test]
fn path_variables_are_rejected() {
    let d = diagnostic_for("MATCH p = (a)-[:KNOWS]-(b) RETURN p");
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert!(d.message.contains("path variables"));
    // Span points at `p`.
    assert_eq!(d.span.start_offset, 6);
    assert_eq!(d.span.end_offset, 7);
}

#[test]
fn map_projections_are_rejected() {
    let err = translate("MATCH (n) RETURN n { .name, .age }").unwrap_err();
    assert!(matches!(err, TranslateError::Parse(_)));
    assert!(err.diagnostic().message.contains("map projections"));
}

#[test]
fn list_comprehensions_are_rejected() {
    let err = translate("MATCH (n) RETURN [x IN n.tags | x]").unwrap_err();
    assert!(matches!(err, TranslateError::Parse(_)));
    assert!(err.diagnostic().message.contains("list comprehensions"));
}

#[test]
fn unknown_variable_has_precise_span() {
    let d = diagnostic_for("MATCH (n) RETURN missing");
    assert_eq!(d.kind, "UnknownVariable");
    assert_eq!(d.span.start_offset, 17);
    assert_eq!(d.span.end_offset, 24);
}

#[test]
fn kind_conflict_reports_both_sites() {
    let d = diagnostic_for("MATCH (x)-[x:KNOWS]->(y) RETURN x");
    assert_eq!(d.kind, "VariableKindConflict");
    let secondary = d.secondary_span.expect("secondary span");
    assert!(secondary.start_offset < d.span.start_offset);
}

#[test]
fn nested_aggregates_are_rejected() {
    let d = diagnostic_for("MATCH (n) RETURN max(count(n))");
    assert_eq!(d.kind, "NestedAggregate");
}

#[test]
fn property_access_on_variable_length_relationship() {
    let d = diagnostic_for("MATCH (a)-[r:KNOWS*]->(b) RETURN r.since");
    assert_eq!(d.kind, "InvalidPropertyAccess");
}

#[test]
fn unsupported_scalar_function_is_an_emit_error() {
    let err = translate("MATCH (n) RETURN frobnicate(n.name)").unwrap_err();
    let d = err.diagnostic();
    assert_eq!(d.kind, "UnsupportedFunction");
    assert_eq!(d.span.start_offset, 17);
}

#[test]
fn query_without_return_is_rejected() {
    let d = diagnostic_for("MATCH (n)");
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert!(d.message.contains("RETURN"));
}

#[test]
fn return_only_query_is_rejected() {
    let d = diagnostic_for("RETURN 1");
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert!(d.message.contains("MATCH"));
}
