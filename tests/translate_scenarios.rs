//! End-to-end translation scenarios: expected SQL shape is asserted as a
//! set of conjuncts so the tests stay stable across alias numbering.

use pgraf_cypher::{translate, translate_with_options, TranslateOptions, Translation};

fn ok(source: &str) -> Translation {
    translate(source).unwrap_or_else(|e| panic!("translation failed for {source:?}: {e}"))
}

#[test]
fn s1_single_label_with_limit() {
    let t = ok("MATCH (n:User) RETURN n.name LIMIT 5");
    assert!(t.sql.contains("FROM pgraf.nodes AS"));
    assert!(t.sql.contains("'User' = ANY(n_0.labels)"));
    assert!(t.sql.contains("properties ->> 'name'"));
    assert!(t.sql.contains("LIMIT 5"));
    assert!(t.parameters.is_empty());
}

#[test]
fn s2_single_hop_join() {
    let t = ok("MATCH (a:User)-[:FOLLOWS]->(b:User) RETURN a.name, b.name");
    // Two node aliases, one edge alias, with the canonical join conjuncts.
    assert!(t.sql.contains("a_0.id = _anon0_0.source"));
    assert!(t.sql.contains("_anon0_0.target = b_0.id"));
    assert!(t.sql.contains("'User' = ANY(a_0.labels)"));
    assert!(t.sql.contains("'User' = ANY(b_0.labels)"));
    assert!(t.sql.contains("'FOLLOWS' = ANY(_anon0_0.labels)"));
}

#[test]
fn s3_count_without_group_by() {
    let t = ok("MATCH (u:User) WHERE u.age > 25 RETURN COUNT(u)");
    assert!(t.sql.contains("COUNT(*)"));
    assert!(t.sql.contains("(u_0.properties ->> 'age')::numeric > 25"));
    assert!(!t.sql.contains("GROUP BY"));
}

#[test]
fn s4_exists_subquery() {
    let t = ok("MATCH (u:User) WHERE EXISTS { MATCH (u)-[:POSTED]->(:Post) } RETURN u.name");
    assert!(t.sql.contains("EXISTS (SELECT 1 FROM"));
    assert!(t.sql.contains("u_0.id = _anon1_0.source"));
    assert!(t.sql.contains("'POSTED' = ANY(_anon1_0.labels)"));
    assert!(t.sql.contains("'Post' = ANY(_anon0_0.labels)"));
}

#[test]
fn s5_variable_length_distinct() {
    let t = ok("MATCH (a:User)-[:FOLLOWS*1..3]->(b:User) RETURN DISTINCT b.name");
    assert!(t.sql.starts_with("WITH RECURSIVE"));
    assert!(t.sql.contains("1 AS depth"));
    assert!(t.sql.contains("p.depth < 3"));
    assert!(t.sql.contains("NOT e.target = ANY(p.path)"));
    assert!(t.sql.contains(".start_id = a_0.id"));
    assert!(t.sql.contains(".end_id = b_0.id"));
    assert!(t.sql.contains("SELECT DISTINCT"));
}

#[test]
fn s6_create_is_rejected_with_span() {
    let err = translate("CREATE (n:User)").unwrap_err();
    let d = err.diagnostic();
    assert_eq!(d.kind, "UnsupportedConstruct");
    assert_eq!(d.span.start_offset, 0);
    assert_eq!(d.span.end_offset, "CREATE".len());
}

// ---- invariants -------------------------------------------------------

#[test]
fn translation_is_deterministic() {
    let source = "MATCH (a:User {name: $who})-[:FOLLOWS*1..2]->(b) \
                  WITH b, count(a) AS c WHERE c > 1 \
                  RETURN b.name ORDER BY c DESC LIMIT 3";
    let first = ok(source);
    let second = ok(source);
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.parameters, second.parameters);
}

#[test]
fn every_placeholder_has_a_parameter_entry() {
    let t = ok("MATCH (u:User {email: $email}) WHERE u.age > $min RETURN u SKIP $s LIMIT $n");
    for (_, position) in t.parameters.iter() {
        assert!(
            t.sql.contains(&format!("${position}")),
            "placeholder ${position} missing from SQL: {}",
            t.sql
        );
    }
    // And no placeholder beyond the map.
    assert!(!t.sql.contains(&format!("${}", t.parameters.len() + 1)));
}

#[test]
fn parameter_positions_follow_source_order() {
    let t = ok("MATCH (u {a: $second}) WHERE u.b = $third AND u.c = $second RETURN $first");
    assert_eq!(t.parameters.get("second"), Some(1));
    assert_eq!(t.parameters.get("third"), Some(2));
    assert_eq!(t.parameters.get("first"), Some(3));
}

#[test]
fn label_predicates_for_every_labeled_node() {
    let t = ok("MATCH (a:User)-[:R]->(b:Post), (c:Tag) RETURN a, b, c");
    for label in ["User", "Post", "Tag"] {
        assert!(
            t.sql.contains(&format!("'{label}' = ANY(")),
            "missing label predicate for {label}"
        );
    }
}

#[test]
fn group_by_lists_every_non_aggregate_projection() {
    let t = ok("MATCH (u:User) RETURN u.city, u.country, count(u)");
    let group = t.sql.split(" GROUP BY ").nth(1).unwrap();
    assert!(group.contains("u_0.properties ->> 'city'"));
    assert!(group.contains("u_0.properties ->> 'country'"));
}

#[test]
fn depth_bound_respects_options() {
    let options = TranslateOptions {
        schema: "pgraf".into(),
        max_variable_path_depth: 42,
    };
    let t = translate_with_options("MATCH (a)-[:R*2..]->(b) RETURN a", &options).unwrap();
    assert!(t.sql.contains("p.depth < 42"));
    assert!(t.sql.contains(".depth >= 2"));
}

#[test]
fn reversed_pattern_is_equivalent_to_forward() {
    let reversed = ok("MATCH (a)<-[:T]-(b) RETURN a.name");
    let forward = ok("MATCH (b)-[:T]->(a) RETURN a.name");
    // Same join conjuncts modulo alias numbering: b feeds source, a target.
    assert!(reversed.sql.contains("b_0.id = _anon0_0.source"));
    assert!(reversed.sql.contains("_anon0_0.target = a_0.id"));
    assert!(forward.sql.contains("b_0.id = _anon0_0.source"));
    assert!(forward.sql.contains("_anon0_0.target = a_0.id"));
}

// ---- broader surface --------------------------------------------------

#[test]
fn multi_segment_chain() {
    let t = ok("MATCH (a:User)-[:WROTE]->(p:Post)-[:TAGGED]->(t:Tag) RETURN a.name, t.name");
    assert!(t.sql.contains("a_0.id = _anon0_0.source"));
    assert!(t.sql.contains("_anon0_0.target = p_0.id"));
    assert!(t.sql.contains("p_0.id = _anon1_0.source"));
    assert!(t.sql.contains("_anon1_0.target = t_0.id"));
}

#[test]
fn property_map_in_pattern_becomes_predicates() {
    let t = ok("MATCH (u:User {email: 'x@y.z', active: true, age: 30}) RETURN u");
    assert!(t.sql.contains("u_0.properties ->> 'email' = 'x@y.z'"));
    assert!(t.sql.contains("(u_0.properties ->> 'active')::boolean = TRUE"));
    assert!(t.sql.contains("(u_0.properties ->> 'age')::numeric = 30"));
}

#[test]
fn pattern_property_parameter() {
    let t = ok("MATCH (u:User {email: $email}) RETURN u");
    assert!(t.sql.contains("u_0.properties ->> 'email' = $1"));
    assert_eq!(t.parameters.get("email"), Some(1));
}

#[test]
fn with_aggregation_then_filter() {
    let t = ok(
        "MATCH (u:User)-[:WROTE]->(p:Post) \
         WITH u, count(p) AS posts WHERE posts > 3 \
         RETURN u.name ORDER BY posts DESC",
    );
    assert!(t.sql.contains("WITH with_0 AS ("));
    assert!(t.sql.contains("COUNT(*) AS posts"));
    assert!(t.sql.contains("GROUP BY u_0.id, u_0.labels, u_0.properties"));
    assert!(t.sql.contains("(with_0.posts)::numeric > 3"));
    assert!(t.sql.contains("with_0.u_properties ->> 'name'"));
    assert!(t.sql.contains("ORDER BY with_0.posts DESC"));
}

#[test]
fn match_after_with_joins_back() {
    let t = ok("MATCH (u:User) WITH u MATCH (u)-[:WROTE]->(p:Post) RETURN p.id");
    assert!(t.sql.contains("WITH with_0 AS ("));
    assert!(t.sql.contains("u_1.id = with_0.u_id"));
    assert!(t.sql.contains("u_1.id = _anon0_0.source"));
}

#[test]
fn unwind_parameter_list() {
    let t = ok("MATCH (u) UNWIND $tags AS tag RETURN u.name, tag");
    assert!(t.sql.contains("unnest($1) AS tag_0(tag)"));
    assert_eq!(t.parameters.get("tags"), Some(1));
}

#[test]
fn case_expression_renders() {
    let t = ok("MATCH (u:User) RETURN CASE WHEN u.age > 60 THEN 'senior' ELSE 'other' END");
    assert!(t.sql.contains("CASE WHEN"));
    assert!(t.sql.contains("THEN 'senior'"));
    assert!(t.sql.contains("ELSE 'other'"));
    assert!(t.sql.contains("END"));
}

#[test]
fn order_by_property_and_alias() {
    let t = ok("MATCH (m:Message) RETURN m.ts AS ts ORDER BY ts DESC LIMIT 100");
    assert!(t.sql.contains("ORDER BY ts DESC"));
    assert!(t.sql.contains("LIMIT 100"));
}

#[test]
fn is_null_predicates() {
    let t = ok("MATCH (u) WHERE u.deleted_at IS NULL AND u.email IS NOT NULL RETURN u");
    assert!(t.sql.contains("u_0.properties ->> 'deleted_at' IS NULL"));
    assert!(t.sql.contains("u_0.properties ->> 'email' IS NOT NULL"));
}

#[test]
fn string_predicates_use_ilike() {
    let t = ok(
        "MATCH (u) WHERE u.name CONTAINS 'an' AND u.email STARTS WITH 'a' \
         AND u.host ENDS WITH '.com' RETURN u",
    );
    assert!(t.sql.contains("ILIKE '%an%'"));
    assert!(t.sql.contains("ILIKE 'a%'"));
    assert!(t.sql.contains("ILIKE '%.com'"));
}

#[test]
fn string_escaping_in_literals() {
    let t = ok(r"MATCH (u) WHERE u.name = 'O\'Brien' RETURN u");
    assert!(t.sql.contains("= 'O''Brien'"));
}

#[test]
fn comparison_between_two_properties_stays_text() {
    let t = ok("MATCH (m1:Msg), (m2:Msg) WHERE m1.thread = m2.thread AND m1 <> m2 RETURN m1");
    assert!(t
        .sql
        .contains("m1_0.properties ->> 'thread' = m2_0.properties ->> 'thread'"));
    assert!(t.sql.contains("m1_0.id <> m2_0.id"));
}

#[test]
fn not_exists_combination() {
    let t = ok(
        "MATCH (m:Message) WHERE NOT EXISTS { MATCH (m)-[:IN]->(:Channel {name: 'private'}) } \
         RETURN m.id",
    );
    assert!(t.sql.contains("NOT (EXISTS (SELECT 1 FROM"));
    assert!(t.sql.contains("properties ->> 'name' = 'private'"));
}

#[test]
fn empty_parameterless_query_has_empty_map() {
    let t = ok("MATCH (n) RETURN n");
    assert!(t.parameters.is_empty());
    assert!(!t.sql.contains('$'));
}

#[test]
fn optional_match_null_safe() {
    let t = ok(
        "MATCH (u:User) OPTIONAL MATCH (u)-[:LIKES]->(p:Post) WHERE p.score > 5 \
         RETURN u.name, p.id",
    );
    assert!(t.sql.contains("LEFT JOIN"));
    // The optional WHERE is part of the join, not the global filter.
    let where_clause = t.sql.split(" WHERE ").last().unwrap();
    assert!(!where_clause.contains("p_0.properties ->> 'score'"));
}

#[test]
fn bare_undirected_pattern_translates_end_to_end() {
    // `--` must survive the lexer as relationship syntax, not a comment.
    let t = ok("MATCH (a)--(b) RETURN a, b");
    assert!(t.sql.contains(
        "((a_0.id = _anon0_0.source AND b_0.id = _anon0_0.target) \
         OR (a_0.id = _anon0_0.target AND b_0.id = _anon0_0.source))"
    ));
    assert!(t.sql.contains("FROM pgraf.nodes AS a_0"));
}

#[test]
fn bare_undirected_chain_with_arrows() {
    let t = ok("MATCH (a)-->(b)--(c) RETURN a.name");
    assert!(t.sql.contains("a_0.id = _anon0_0.source"));
    assert!(t.sql.contains("_anon0_0.target = b_0.id"));
    assert!(t.sql.contains(
        "((b_0.id = _anon1_0.source AND c_0.id = _anon1_0.target) \
         OR (b_0.id = _anon1_0.target AND c_0.id = _anon1_0.source))"
    ));
}

#[test]
fn undirected_variable_length() {
    let t = ok("MATCH (a)-[:KNOWS*1..2]-(b) RETURN a, b");
    assert!(t.sql.contains("WITH RECURSIVE"));
    assert!(t.sql.contains("e.target AS start_id, e.source AS end_id"));
}

#[test]
fn schema_option_applies_everywhere() {
    let options = TranslateOptions {
        schema: "graphdata".into(),
        max_variable_path_depth: 10,
    };
    let t = translate_with_options(
        "MATCH (a:User)-[:F*1..2]->(b) WHERE EXISTS { MATCH (b)-[:G]->(:X) } RETURN a",
        &options,
    )
    .unwrap();
    assert!(t.sql.contains("graphdata.nodes"));
    assert!(t.sql.contains("graphdata.edges"));
    assert!(!t.sql.contains("pgraf."));
}
