//! Projection item grammar shared by `RETURN` and `WITH`.

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::multi::separated_list1;
use nom::sequence::preceded;
use nom::Parser;

use super::ast::ProjectionItem;
use super::common::{identifier, keyword, ws, PResult};
use super::expression::parse_expression;

/// `*` or a comma-separated item list; star expansion happens in lowering.
pub fn parse_star_or_items(input: &str) -> PResult<'_, (bool, Vec<ProjectionItem<'_>>)> {
    alt((
        map(ws(char('*')), |_| (true, Vec::new())),
        map(parse_projection_items, |items| (false, items)),
    ))
    .parse(input)
}

pub fn parse_projection_items(input: &str) -> PResult<'_, Vec<ProjectionItem<'_>>> {
    separated_list1(ws(char(',')), parse_projection_item).parse(input)
}

fn parse_projection_item(input: &str) -> PResult<'_, ProjectionItem<'_>> {
    let (input, expression) = parse_expression(input)?;
    let (input, alias) = opt(preceded(ws(keyword("AS")), identifier)).parse(input)?;
    Ok((input, ProjectionItem { expression, alias }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::Expression;

    #[test]
    fn items_with_and_without_alias() {
        let (_, items) = parse_projection_items("u.name AS name, count(*)").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].alias, Some("name"));
        assert_eq!(items[1].alias, None);
    }

    #[test]
    fn star_projection() {
        let (_, (star, items)) = parse_star_or_items("*").unwrap();
        assert!(star);
        assert!(items.is_empty());
    }

    #[test]
    fn bare_variable_item() {
        let (_, items) = parse_projection_items("n").unwrap();
        assert!(matches!(items[0].expression, Expression::Variable("n")));
    }
}
