//! Node and relationship pattern grammar:
//! `(a:Label {k: v})-[r:TYPE|OTHER *1..3 {k: v}]->(b)` chains, in all three
//! directions, plus the bare `--`, `-->`, `<--` arrow forms.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, preceded, terminated};
use nom::Parser;

use super::ast::{
    Direction, NodePattern, PathPattern, PropertyKVPair, PropertyValue, RelationshipPattern,
    VariableLengthSpec,
};
use super::common::{identifier, parameter, scalar_literal, unsigned, ws, PResult};
use super::errors::CypherParseError;

fn sym<'a>(
    t: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = CypherParseError<'a>> {
    tag(t)
}

/// Up to `want` bytes of `input`, clamped to a char boundary.
fn prefix(input: &str, want: usize) -> &str {
    let mut end = want.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

pub fn parse_path_pattern(input: &str) -> PResult<'_, PathPattern<'_>> {
    let (input, _) = multispace0(input)?;
    let (input, path_variable) =
        opt(terminated(identifier, ws(char('=')))).parse(input)?;
    let (input, _) = multispace0(input)?;

    // shortestPath(...) / allShortestPaths(...) are recognized so lowering
    // can reject them with the call's span instead of a grammar error.
    let (input, shortest) = opt(alt((
        tag("shortestPath"),
        tag("allShortestPaths"),
    )))
    .parse(input)?;
    if let Some(kw) = shortest {
        let (input, mut inner) =
            delimited(ws(char('(')), parse_path_pattern, ws(char(')'))).parse(input)?;
        inner.path_variable = path_variable.or(inner.path_variable);
        inner.shortest = Some(kw);
        return Ok((input, inner));
    }

    let (input, start) = parse_node_pattern(input)?;
    let (input, segments) = many0((parse_relationship_pattern, parse_node_pattern)).parse(input)?;
    Ok((
        input,
        PathPattern {
            path_variable,
            shortest: None,
            start,
            segments,
        },
    ))
}

pub fn parse_node_pattern(input: &str) -> PResult<'_, NodePattern<'_>> {
    let (input, _) = multispace0(input)?;
    let fragment = prefix(input, 1);
    let (input, _) = char('(')(input)?;
    let (input, name) = opt(ws(identifier)).parse(input)?;
    let (input, labels) = many0(preceded(ws(char(':')), identifier)).parse(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        NodePattern {
            fragment,
            name,
            labels,
            properties: properties.unwrap_or_default(),
        },
    ))
}

struct RelBody<'a> {
    name: Option<&'a str>,
    labels: Vec<&'a str>,
    length: Option<VariableLengthSpec>,
    properties: Vec<PropertyKVPair<'a>>,
}

fn parse_rel_body(input: &str) -> PResult<'_, RelBody<'_>> {
    let (input, _) = ws(char('[')).parse(input)?;
    let (input, name) = opt(ws(identifier)).parse(input)?;
    let (input, labels) = opt(preceded(
        ws(char(':')),
        nom::multi::separated_list1(ws(char('|')), identifier),
    ))
    .parse(input)?;
    let (input, length) = opt(parse_variable_length).parse(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((
        input,
        RelBody {
            name,
            labels: labels.unwrap_or_default(),
            length,
            properties: properties.unwrap_or_default(),
        },
    ))
}

/// `*`, `*2`, `*1..3`, `*..3`, `*2..`.
fn parse_variable_length(input: &str) -> PResult<'_, VariableLengthSpec> {
    let (input, _) = ws(char('*')).parse(input)?;
    let (input, lower) = opt(ws(unsigned)).parse(input)?;
    let (input, range) = opt(preceded(ws(tag("..")), opt(ws(unsigned)))).parse(input)?;
    let spec = match (lower, range) {
        // `*n` is an exact hop count.
        (Some(n), None) => VariableLengthSpec {
            min_hops: Some(n),
            max_hops: Some(n),
        },
        (min, Some(max)) => VariableLengthSpec {
            min_hops: min,
            max_hops: max,
        },
        (None, None) => VariableLengthSpec {
            min_hops: None,
            max_hops: None,
        },
    };
    Ok((input, spec))
}

pub fn parse_relationship_pattern(input: &str) -> PResult<'_, RelationshipPattern<'_>> {
    let (input, _) = multispace0(input)?;
    let fragment = prefix(input, 2);

    // `<-[...]-` / `<--`
    if let Ok((rest, _)) = sym("<-").parse(input) {
        let (rest, body) = opt(parse_rel_body).parse(rest)?;
        let (rest, _) = ws(char('-')).parse(rest)?;
        return Ok((rest, build_rel(fragment, Direction::Incoming, body)));
    }

    // `-[...]->` / `-->` / `-[...]-` / `--`
    let (rest, _) = char('-')(input)?;
    let (rest, body) = opt(parse_rel_body).parse(rest)?;
    if let Ok((rest, _)) = ws(sym("->")).parse(rest) {
        return Ok((rest, build_rel(fragment, Direction::Outgoing, body)));
    }
    let (rest, _) = ws(char('-')).parse(rest)?;
    Ok((rest, build_rel(fragment, Direction::Either, body)))
}

fn build_rel<'a>(
    fragment: &'a str,
    direction: Direction,
    body: Option<RelBody<'a>>,
) -> RelationshipPattern<'a> {
    match body {
        Some(body) => RelationshipPattern {
            fragment,
            name: body.name,
            direction,
            labels: body.labels,
            properties: body.properties,
            length: body.length,
        },
        None => RelationshipPattern {
            fragment,
            name: None,
            direction,
            labels: Vec::new(),
            properties: Vec::new(),
            length: None,
        },
    }
}

fn parse_property_map(input: &str) -> PResult<'_, Vec<PropertyKVPair<'_>>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            map(
                (ws(identifier), char(':'), ws(parse_property_value)),
                |(key, _, value)| PropertyKVPair { key, value },
            ),
        ),
        ws(char('}')),
    )
    .parse(input)
}

fn parse_property_value(input: &str) -> PResult<'_, PropertyValue<'_>> {
    alt((
        map(parameter, PropertyValue::Parameter),
        map(scalar_literal, PropertyValue::Literal),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::Literal;

    fn pattern(input: &str) -> PathPattern<'_> {
        let (rest, p) = parse_path_pattern(input).unwrap();
        assert_eq!(rest.trim(), "", "unparsed input: {rest:?}");
        p
    }

    #[test]
    fn bare_node() {
        let p = pattern("(n)");
        assert_eq!(p.start.name, Some("n"));
        assert!(p.start.labels.is_empty());
        assert!(p.segments.is_empty());
    }

    #[test]
    fn node_with_labels_and_properties() {
        let p = pattern("(u:User:Admin {email: 'x@y.z', active: true})");
        assert_eq!(p.start.labels, vec!["User", "Admin"]);
        assert_eq!(p.start.properties.len(), 2);
        assert_eq!(p.start.properties[0].key, "email");
        assert_eq!(
            p.start.properties[0].value,
            PropertyValue::Literal(Literal::String("x@y.z".into()))
        );
    }

    #[test]
    fn anonymous_node_with_label() {
        let p = pattern("(:Post)");
        assert_eq!(p.start.name, None);
        assert_eq!(p.start.labels, vec!["Post"]);
    }

    #[test]
    fn outgoing_chain() {
        let p = pattern("(a:User)-[:FOLLOWS]->(b:User)");
        assert_eq!(p.segments.len(), 1);
        let (rel, end) = &p.segments[0];
        assert_eq!(rel.direction, Direction::Outgoing);
        assert_eq!(rel.labels, vec!["FOLLOWS"]);
        assert_eq!(end.name, Some("b"));
    }

    #[test]
    fn incoming_and_undirected() {
        let p = pattern("(a)<-[:KNOWS]-(b)--(c)");
        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.segments[0].0.direction, Direction::Incoming);
        assert_eq!(p.segments[1].0.direction, Direction::Either);
    }

    #[test]
    fn bare_arrows() {
        let p = pattern("(a)-->(b)<--(c)");
        assert_eq!(p.segments[0].0.direction, Direction::Outgoing);
        assert_eq!(p.segments[1].0.direction, Direction::Incoming);
    }

    #[test]
    fn multi_label_relationship() {
        let p = pattern("(a)-[r:LIKES|FOLLOWS]->(b)");
        assert_eq!(p.segments[0].0.name, Some("r"));
        assert_eq!(p.segments[0].0.labels, vec!["LIKES", "FOLLOWS"]);
    }

    #[test]
    fn variable_length_forms() {
        let cases = [
            ("(a)-[*]->(b)", VariableLengthSpec { min_hops: None, max_hops: None }),
            (
                "(a)-[*2]->(b)",
                VariableLengthSpec { min_hops: Some(2), max_hops: Some(2) },
            ),
            (
                "(a)-[*1..3]->(b)",
                VariableLengthSpec { min_hops: Some(1), max_hops: Some(3) },
            ),
            (
                "(a)-[*..3]->(b)",
                VariableLengthSpec { min_hops: None, max_hops: Some(3) },
            ),
            (
                "(a)-[*2..]->(b)",
                VariableLengthSpec { min_hops: Some(2), max_hops: None },
            ),
        ];
        for (src, expected) in cases {
            let p = pattern(src);
            assert_eq!(p.segments[0].0.length, Some(expected), "{src}");
        }
    }

    #[test]
    fn variable_length_with_type() {
        let p = pattern("(a)-[:FOLLOWS*1..3]->(b)");
        let rel = &p.segments[0].0;
        assert_eq!(rel.labels, vec!["FOLLOWS"]);
        assert_eq!(
            rel.length,
            Some(VariableLengthSpec { min_hops: Some(1), max_hops: Some(3) })
        );
    }

    #[test]
    fn relationship_properties_with_parameter() {
        let p = pattern("(a)-[r:RATED {stars: $stars}]->(b)");
        assert_eq!(
            p.segments[0].0.properties[0].value,
            PropertyValue::Parameter("stars")
        );
    }

    #[test]
    fn path_variable_is_captured() {
        let p = pattern("p = (a)-->(b)");
        assert_eq!(p.path_variable, Some("p"));
    }

    #[test]
    fn shortest_path_is_captured() {
        let p = pattern("shortestPath((a)-[*]-(b))");
        assert_eq!(p.shortest, Some("shortestPath"));
    }

    #[test]
    fn backtick_label() {
        let p = pattern("(m:`slack-message`)");
        assert_eq!(p.start.labels, vec!["slack-message"]);
    }
}
