//! `ORDER BY expr [ASC|DESC], ...`.

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::multi::separated_list1;
use nom::Parser;

use super::ast::OrderByItem;
use super::common::{keyword, ws, PResult};
use super::expression::parse_expression;

pub fn parse_order_by(input: &str) -> PResult<'_, Vec<OrderByItem<'_>>> {
    let (input, _) = ws(keyword("ORDER")).parse(input)?;
    let (input, _) = ws(keyword("BY")).parse(input)?;
    separated_list1(ws(char(',')), parse_order_by_item).parse(input)
}

fn parse_order_by_item(input: &str) -> PResult<'_, OrderByItem<'_>> {
    let (input, expression) = parse_expression(input)?;
    let (input, direction) = opt(alt((
        map(ws(keyword("ASC")), |_| false),
        map(ws(keyword("DESC")), |_| true),
    )))
    .parse(input)?;
    Ok((
        input,
        OrderByItem {
            expression,
            descending: direction.unwrap_or(false),
        },
    ))
}
