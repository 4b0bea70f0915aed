//! `UNWIND expr AS variable`.

use nom::Parser;

use super::ast::UnwindClause;
use super::common::{identifier, keyword, ws, PResult};
use super::expression::parse_expression;

pub fn parse_unwind_clause(input: &str) -> PResult<'_, UnwindClause<'_>> {
    let (input, kw) = ws(keyword("UNWIND")).parse(input)?;
    let (input, expression) = parse_expression(input)?;
    let (input, _) = ws(keyword("AS")).parse(input)?;
    let (input, alias) = ws(identifier).parse(input)?;
    Ok((
        input,
        UnwindClause {
            keyword: kw,
            expression,
            alias,
        },
    ))
}
