//! `RETURN [DISTINCT] items [ORDER BY ...] [SKIP n] [LIMIT n]`.

use nom::combinator::opt;
use nom::Parser;

use super::ast::ReturnClause;
use super::common::{keyword, ws, PResult};
use super::limit_clause::parse_limit;
use super::order_by_clause::parse_order_by;
use super::projection::parse_star_or_items;
use super::skip_clause::parse_skip;

pub fn parse_return_clause(input: &str) -> PResult<'_, ReturnClause<'_>> {
    let (input, kw) = ws(keyword("RETURN")).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, (star, items)) = parse_star_or_items(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(parse_skip).parse(input)?;
    let (input, limit) = opt(parse_limit).parse(input)?;
    Ok((
        input,
        ReturnClause {
            keyword: kw,
            distinct: distinct.is_some(),
            star,
            items,
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        },
    ))
}
