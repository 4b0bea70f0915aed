//! `LIMIT n` — an integer literal or a parameter.

use nom::sequence::preceded;
use nom::Parser;

use super::ast::Expression;
use super::common::{keyword, ws, PResult};
use super::expression::parse_expression;

pub fn parse_limit(input: &str) -> PResult<'_, Expression<'_>> {
    preceded(ws(keyword("LIMIT")), parse_expression).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::Literal;

    #[test]
    fn limit_integer() {
        let (_, expr) = parse_limit("LIMIT 5").unwrap();
        assert_eq!(expr, Expression::Literal(Literal::Integer(5)));
    }

    #[test]
    fn limit_parameter() {
        let (_, expr) = parse_limit("LIMIT $n").unwrap();
        assert_eq!(expr, Expression::Parameter("n"));
    }
}
