//! `WITH [DISTINCT] items [WHERE ...] [ORDER BY ...] [SKIP n] [LIMIT n]`.

use nom::combinator::opt;
use nom::sequence::preceded;
use nom::Parser;

use super::ast::WithClause;
use super::common::{keyword, ws, PResult};
use super::expression::parse_expression;
use super::limit_clause::parse_limit;
use super::order_by_clause::parse_order_by;
use super::projection::parse_star_or_items;
use super::skip_clause::parse_skip;

pub fn parse_with_clause(input: &str) -> PResult<'_, WithClause<'_>> {
    let (input, kw) = ws(keyword("WITH")).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;
    let (input, (star, items)) = parse_star_or_items(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(parse_skip).parse(input)?;
    let (input, limit) = opt(parse_limit).parse(input)?;
    let (input, where_clause) =
        opt(preceded(ws(keyword("WHERE")), parse_expression)).parse(input)?;
    Ok((
        input,
        WithClause {
            keyword: kw,
            distinct: distinct.is_some(),
            star,
            items,
            where_clause,
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_projection_and_where() {
        let (rest, clause) =
            parse_with_clause("WITH u.name AS name WHERE name CONTAINS 'x'").unwrap();
        assert_eq!(rest.trim(), "");
        assert_eq!(clause.items.len(), 1);
        assert!(clause.where_clause.is_some());
    }

    #[test]
    fn with_distinct_entity() {
        let (_, clause) = parse_with_clause("WITH DISTINCT u").unwrap();
        assert!(clause.distinct);
        assert_eq!(clause.items.len(), 1);
    }

    #[test]
    fn with_order_and_limit() {
        let (_, clause) =
            parse_with_clause("WITH u, count(p) AS posts ORDER BY posts DESC LIMIT 3").unwrap();
        assert_eq!(clause.items.len(), 2);
        assert_eq!(clause.order_by.len(), 1);
        assert!(clause.limit.is_some());
    }
}
