//! Expression grammar.
//!
//! Precedence, loosest first: OR, AND, NOT, comparison (including IN,
//! CONTAINS, STARTS WITH, ENDS WITH), additive, multiplicative, unary
//! sign, postfix IS [NOT] NULL, primary.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{map, opt, peek};
use nom::multi::{many1, separated_list0, separated_list1};
use nom::sequence::{delimited, preceded, terminated};
use nom::Parser;

use super::ast::{
    CaseExpression, ExistsSubquery, Expression, FunctionCall, LabelTest, Literal, Operator,
    OperatorApplication, PropertyAccess,
};
use super::common::{identifier, keyword, parameter, scalar_literal, ws, PResult};
use super::errors::CypherParseError;
use super::path_pattern::parse_path_pattern;

pub fn parse_expression(input: &str) -> PResult<'_, Expression<'_>> {
    parse_or(input)
}

fn apply<'a>(op: Operator, operands: Vec<Expression<'a>>) -> Expression<'a> {
    Expression::OperatorApplicationExp(OperatorApplication {
        operator: op,
        operands,
    })
}

fn parse_or(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut expr) = parse_and(input)?;
    loop {
        match preceded(ws(keyword("OR")), parse_and).parse(input) {
            Ok((rest, rhs)) => {
                expr = apply(Operator::Or, vec![expr, rhs]);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

fn parse_and(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut expr) = parse_not(input)?;
    loop {
        match preceded(ws(keyword("AND")), parse_not).parse(input) {
            Ok((rest, rhs)) => {
                expr = apply(Operator::And, vec![expr, rhs]);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

fn parse_not(input: &str) -> PResult<'_, Expression<'_>> {
    alt((
        map(preceded(ws(keyword("NOT")), parse_not), |expr| {
            apply(Operator::Not, vec![expr])
        }),
        parse_comparison,
    ))
    .parse(input)
}

fn comparison_operator(input: &str) -> PResult<'_, Operator> {
    alt((
        map(tag("<>"), |_| Operator::NotEqual),
        map(tag("<="), |_| Operator::LessThanEqual),
        map(tag(">="), |_| Operator::GreaterThanEqual),
        map(tag("<"), |_| Operator::LessThan),
        map(tag(">"), |_| Operator::GreaterThan),
        map(tag("="), |_| Operator::Equal),
        map(keyword("IN"), |_| Operator::In),
        map(keyword("CONTAINS"), |_| Operator::Contains),
        map((keyword("STARTS"), ws(keyword("WITH"))), |_| {
            Operator::StartsWith
        }),
        map((keyword("ENDS"), ws(keyword("WITH"))), |_| {
            Operator::EndsWith
        }),
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, lhs) = parse_additive(input)?;

    // IS [NOT] NULL binds here: it ends the comparison chain.
    if let Ok((rest, op)) = preceded(
        ws(keyword("IS")),
        alt((
            map(preceded(ws(keyword("NOT")), keyword("NULL")), |_| {
                Operator::IsNotNull
            }),
            map(keyword("NULL"), |_| Operator::IsNull),
        )),
    )
    .parse(input)
    {
        return Ok((rest, apply(op, vec![lhs])));
    }

    let (mut input, mut expr) = (input, lhs);
    loop {
        match (ws(comparison_operator), parse_additive).parse(input) {
            Ok((rest, (op, rhs))) => {
                expr = apply(op, vec![expr, rhs]);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

/// `-` only joins an additive chain when it is not the head of a
/// relationship arrow, so `(a)-[:T]->(b)` never tears apart here.
fn additive_operator(input: &str) -> PResult<'_, Operator> {
    alt((
        map(char('+'), |_| Operator::Addition),
        map(
            terminated(
                char('-'),
                nom::combinator::not(alt((char('['), char('-'), char('>')))),
            ),
            |_| Operator::Subtraction,
        ),
    ))
    .parse(input)
}

fn parse_additive(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut expr) = parse_multiplicative(input)?;
    loop {
        match (ws(additive_operator), parse_multiplicative).parse(input) {
            Ok((rest, (op, rhs))) => {
                expr = apply(op, vec![expr, rhs]);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

fn multiplicative_operator(input: &str) -> PResult<'_, Operator> {
    alt((
        map(char('*'), |_| Operator::Multiplication),
        map(char('/'), |_| Operator::Division),
        map(char('%'), |_| Operator::ModuloDivision),
        map(char('^'), |_| Operator::Exponentiation),
    ))
    .parse(input)
}

fn parse_multiplicative(input: &str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut expr) = parse_unary(input)?;
    loop {
        match (ws(multiplicative_operator), parse_unary).parse(input) {
            Ok((rest, (op, rhs))) => {
                expr = apply(op, vec![expr, rhs]);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

fn parse_unary(input: &str) -> PResult<'_, Expression<'_>> {
    alt((
        preceded(ws(char('+')), parse_unary),
        map(preceded(ws(char('-')), parse_unary), |expr| match expr {
            Expression::Literal(Literal::Integer(i)) => {
                Expression::Literal(Literal::Integer(-i))
            }
            Expression::Literal(Literal::Float(f)) => Expression::Literal(Literal::Float(-f)),
            other => apply(
                Operator::Subtraction,
                vec![Expression::Literal(Literal::Integer(0)), other],
            ),
        }),
        parse_primary,
    ))
    .parse(input)
}

fn parse_primary(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = nom::character::complete::multispace0(input)?;
    let (input, expr) = alt((
        parse_case,
        parse_exists,
        parse_function_call,
        parse_property_access,
        parse_label_test,
        map(parameter, Expression::Parameter),
        map(scalar_literal, Expression::Literal),
        parse_list,
        parse_map,
        parse_variable,
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
    ))
    .parse(input)?;
    reject_map_projection(input, &expr)?;
    Ok((input, expr))
}

/// `n { .name, .age }` map projections are out of scope; catching the brace
/// here gives a targeted message instead of a trailing-input error.
fn reject_map_projection<'a>(
    input: &'a str,
    expr: &Expression<'a>,
) -> Result<(), nom::Err<CypherParseError<'a>>> {
    if matches!(expr, Expression::Variable(_)) {
        let trimmed = input.trim_start();
        if trimmed.starts_with('{') {
            return Err(nom::Err::Failure(CypherParseError::new(
                trimmed,
                "map projections are not supported",
            )));
        }
    }
    Ok(())
}

fn parse_variable(input: &str) -> PResult<'_, Expression<'_>> {
    map(identifier, Expression::Variable).parse(input)
}

fn parse_property_access(input: &str) -> PResult<'_, Expression<'_>> {
    map(
        (identifier, char('.'), identifier),
        |(base, _, key)| Expression::PropertyAccessExp(PropertyAccess { base, key }),
    )
    .parse(input)
}

fn parse_label_test(input: &str) -> PResult<'_, Expression<'_>> {
    map(
        (identifier, char(':'), identifier),
        |(base, _, label)| Expression::LabelTestExp(LabelTest { base, label }),
    )
    .parse(input)
}

fn parse_function_call(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, name) = identifier(input)?;
    let (input, _) = ws(char('(')).parse(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT"))).parse(input)?;

    // `count(*)`.
    if let Ok((rest, _)) = (ws(char('*')), ws(char(')'))).parse(input) {
        return Ok((
            rest,
            Expression::FunctionCallExp(FunctionCall {
                name,
                distinct: distinct.is_some(),
                star: true,
                args: Vec::new(),
            }),
        ));
    }

    let (input, args) =
        separated_list0(ws(char(',')), parse_expression).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        Expression::FunctionCallExp(FunctionCall {
            name,
            distinct: distinct.is_some(),
            star: false,
            args,
        }),
    ))
}

/// `[a, b, c]`. A `[x IN list | ...]` comprehension is recognized and
/// rejected with its own message.
fn parse_list(input: &str) -> PResult<'_, Expression<'_>> {
    let (after_bracket, _) = ws(char('[')).parse(input)?;

    if let Ok((rest, _)) = (ws(identifier), ws(keyword("IN"))).parse(after_bracket) {
        let _ = rest;
        return Err(nom::Err::Failure(CypherParseError::new(
            after_bracket.trim_start(),
            "list comprehensions are not supported",
        )));
    }

    let (input, exprs) =
        separated_list0(ws(char(',')), parse_expression).parse(after_bracket)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((input, Expression::List(exprs)))
}

/// `{key: expr, ...}` map constructor.
fn parse_map(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, entries) = delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            map(
                (ws(identifier), char(':'), parse_expression),
                |(key, _, value)| (key, value),
            ),
        ),
        ws(char('}')),
    )
    .parse(input)?;
    Ok((input, Expression::Map(entries)))
}

fn parse_case(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, _) = keyword("CASE").parse(input)?;
    let (input, subject) = opt(map(
        preceded(
            peek(nom::combinator::not(ws(keyword("WHEN")))),
            parse_expression,
        ),
        Box::new,
    ))
    .parse(input)?;
    let (input, when_then) = many1(map(
        (
            ws(keyword("WHEN")),
            parse_expression,
            ws(keyword("THEN")),
            parse_expression,
        ),
        |(_, when, _, then)| (when, then),
    ))
    .parse(input)?;
    let (input, else_expr) = opt(map(
        preceded(ws(keyword("ELSE")), parse_expression),
        Box::new,
    ))
    .parse(input)?;
    let (input, _) = ws(keyword("END")).parse(input)?;
    Ok((
        input,
        Expression::CaseExp(CaseExpression {
            subject,
            when_then,
            else_expr,
        }),
    ))
}

/// `EXISTS { [MATCH] pattern, ... [WHERE expr] }` existential subquery.
fn parse_exists(input: &str) -> PResult<'_, Expression<'_>> {
    let (input, kw) = keyword("EXISTS").parse(input)?;
    let (input, _) = ws(char('{')).parse(input)?;
    let (input, _) = opt(ws(keyword("MATCH"))).parse(input)?;
    let (input, patterns) =
        separated_list1(ws(char(',')), parse_path_pattern).parse(input)?;
    let (input, where_clause) = opt(map(
        preceded(ws(keyword("WHERE")), parse_expression),
        Box::new,
    ))
    .parse(input)?;
    let (input, _) = ws(char('}')).parse(input)?;
    Ok((
        input,
        Expression::ExistsExp(ExistsSubquery {
            keyword: kw,
            patterns,
            where_clause,
        }),
    ))
}
