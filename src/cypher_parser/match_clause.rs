//! `MATCH` / `OPTIONAL MATCH` with comma-separated patterns and an optional
//! trailing `WHERE`.

use nom::combinator::{map, opt};
use nom::multi::separated_list1;
use nom::sequence::preceded;
use nom::Parser;

use super::ast::MatchClause;
use super::common::{keyword, ws, PResult};
use super::expression::parse_expression;
use super::path_pattern::parse_path_pattern;

pub fn parse_match_clause(input: &str) -> PResult<'_, MatchClause<'_>> {
    let (input, optional) = opt(ws(keyword("OPTIONAL"))).parse(input)?;
    let (input, kw) = ws(keyword("MATCH")).parse(input)?;
    let (input, patterns) =
        separated_list1(ws(nom::character::complete::char(',')), parse_path_pattern)
            .parse(input)?;
    let (input, where_clause) = opt(preceded(
        ws(keyword("WHERE")),
        map(parse_expression, |e| e),
    ))
    .parse(input)?;
    Ok((
        input,
        MatchClause {
            keyword: optional.unwrap_or(kw),
            optional: optional.is_some(),
            patterns,
            where_clause,
        },
    ))
}
