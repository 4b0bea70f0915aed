//! `SKIP n` — an integer literal or a parameter.

use nom::sequence::preceded;
use nom::Parser;

use super::ast::Expression;
use super::common::{keyword, ws, PResult};
use super::expression::parse_expression;

pub fn parse_skip(input: &str) -> PResult<'_, Expression<'_>> {
    preceded(ws(keyword("SKIP")), parse_expression).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::Literal;

    #[test]
    fn skip_integer() {
        let (_, expr) = parse_skip("SKIP 10").unwrap();
        assert_eq!(expr, Expression::Literal(Literal::Integer(10)));
    }
}
