//! Typed-AST expression → SQL scalar expression.
//!
//! Coercion is decided here: comparing a JSON property against a numeric
//! or boolean operand casts the `->>` text accessor; everything else
//! compares as text. String predicates (`CONTAINS`, `STARTS WITH`,
//! `ENDS WITH`) translate to case-insensitive `ILIKE` patterns.

use crate::diagnostics::Span;
use crate::lowerer::ast::{
    AggregateArg, AggregateFn, EntityKind, Expr, Literal, Match, Operator,
};

use super::context::{EmissionContext, VarTarget};
use super::{emit_exists_subquery, EmitError, EmitErrorKind, EmitterOptions};

/// Cast applied to a JSON property accessor when the other operand calls
/// for a typed comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    Numeric,
    Boolean,
}

fn internal(message: impl Into<String>) -> EmitError {
    EmitError {
        kind: EmitErrorKind::Internal,
        message: message.into(),
        span: None,
    }
}

pub fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn literal_sql(lit: &Literal) -> String {
    match lit {
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::String(s) => format!("'{}'", escape_string(s)),
        Literal::Null => "NULL".to_string(),
    }
}

/// The coercion an operand suggests for the opposite side of a comparison.
fn suggested_coercion(expr: &Expr) -> Coercion {
    match expr {
        Expr::Literal(Literal::Integer(_)) | Expr::Literal(Literal::Float(_)) => Coercion::Numeric,
        Expr::Literal(Literal::Boolean(_)) => Coercion::Boolean,
        Expr::Apply { operator, .. } => match operator {
            Operator::Addition
            | Operator::Subtraction
            | Operator::Multiplication
            | Operator::Division
            | Operator::ModuloDivision
            | Operator::Exponentiation => Coercion::Numeric,
            _ => Coercion::Text,
        },
        Expr::Aggregate { func, .. } => match func {
            AggregateFn::Count | AggregateFn::Sum | AggregateFn::Avg => Coercion::Numeric,
            _ => Coercion::Text,
        },
        _ => Coercion::Text,
    }
}

/// Entity variable reference → its id column (or CTE/path equivalent).
pub fn render_variable(ctx: &EmissionContext, name: &str) -> Result<String, EmitError> {
    match ctx.vars.get(name) {
        Some(VarTarget::Table { alias }) => Ok(format!("{alias}.id")),
        Some(VarTarget::CteEntity { from_alias, prefix }) => {
            Ok(format!("{from_alias}.{prefix}_id"))
        }
        Some(VarTarget::CteScalar { from_alias, column }) => {
            Ok(format!("{from_alias}.{column}"))
        }
        Some(VarTarget::PathCte { alias }) => Ok(format!("{alias}.path")),
        None => Err(internal(format!("no alias allocated for variable `{name}`"))),
    }
}

pub fn render_property(
    ctx: &EmissionContext,
    variable: &str,
    key: &str,
    coercion: Coercion,
) -> Result<String, EmitError> {
    let accessor = match ctx.vars.get(variable) {
        Some(VarTarget::Table { alias }) => {
            format!("{alias}.properties ->> '{}'", escape_string(key))
        }
        Some(VarTarget::CteEntity { from_alias, prefix }) => {
            format!("{from_alias}.{prefix}_properties ->> '{}'", escape_string(key))
        }
        _ => {
            return Err(internal(format!(
                "property access on `{variable}` which has no table or CTE target"
            )))
        }
    };
    Ok(match coercion {
        Coercion::Text => accessor,
        Coercion::Numeric => format!("({accessor})::numeric"),
        Coercion::Boolean => format!("({accessor})::boolean"),
    })
}

fn render_label_test(
    ctx: &EmissionContext,
    variable: &str,
    label: &str,
) -> Result<String, EmitError> {
    let labels = match ctx.vars.get(variable) {
        Some(VarTarget::Table { alias }) => format!("{alias}.labels"),
        Some(VarTarget::CteEntity { from_alias, prefix }) => {
            format!("{from_alias}.{prefix}_labels")
        }
        _ => {
            return Err(internal(format!(
                "label test on `{variable}` which has no table or CTE target"
            )))
        }
    };
    Ok(format!("'{}' = ANY({labels})", escape_string(label)))
}

/// Render an operand, applying `coercion` when it is a JSON property.
fn render_operand(
    ctx: &mut EmissionContext,
    expr: &Expr,
    coercion: Coercion,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    match expr {
        Expr::Property { variable, key, .. } => render_property(ctx, variable, key, coercion),
        // A scalar carried through a WITH barrier is a text column extracted
        // from jsonb; typed comparisons need the same cast as a property.
        Expr::Variable {
            kind: EntityKind::Scalar,
            name,
        } if coercion != Coercion::Text => {
            let sql = render_variable(ctx, name)?;
            Ok(match coercion {
                Coercion::Numeric => format!("({sql})::numeric"),
                Coercion::Boolean => format!("({sql})::boolean"),
                Coercion::Text => sql,
            })
        }
        Expr::Apply { .. } => Ok(format!("({})", render_expr(ctx, expr, options)?)),
        _ => render_expr(ctx, expr, options),
    }
}

fn render_ilike(
    ctx: &mut EmissionContext,
    operator: Operator,
    lhs: &Expr,
    rhs: &Expr,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let lhs_sql = render_operand(ctx, lhs, Coercion::Text, options)?;
    let (prefix, suffix) = match operator {
        Operator::Contains => ("%", "%"),
        Operator::StartsWith => ("", "%"),
        Operator::EndsWith => ("%", ""),
        _ => unreachable!("not a string predicate"),
    };
    if let Expr::Literal(Literal::String(s)) = rhs {
        let pattern = format!("{prefix}{}{suffix}", escape_string(s));
        return Ok(format!("{lhs_sql} ILIKE '{pattern}'"));
    }
    let rhs_sql = render_operand(ctx, rhs, Coercion::Text, options)?;
    let mut pattern = rhs_sql;
    if !prefix.is_empty() {
        pattern = format!("'%' || {pattern}");
    }
    if !suffix.is_empty() {
        pattern = format!("{pattern} || '%'");
    }
    Ok(format!("{lhs_sql} ILIKE {pattern}"))
}

fn render_in(
    ctx: &mut EmissionContext,
    lhs: &Expr,
    rhs: &Expr,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    match rhs {
        Expr::List(items) => {
            let coercion = items
                .first()
                .map(suggested_coercion)
                .unwrap_or(Coercion::Text);
            let lhs_sql = render_operand(ctx, lhs, coercion, options)?;
            let rendered: Vec<String> = items
                .iter()
                .map(|item| render_expr(ctx, item, options))
                .collect::<Result<_, _>>()?;
            Ok(format!("{lhs_sql} IN ({})", rendered.join(", ")))
        }
        Expr::Parameter(name) => {
            let lhs_sql = render_operand(ctx, lhs, Coercion::Text, options)?;
            let pos = ctx.params.position(name);
            Ok(format!("{lhs_sql} = ANY(${pos})"))
        }
        other => {
            let lhs_sql = render_operand(ctx, lhs, Coercion::Text, options)?;
            let rhs_sql = render_expr(ctx, other, options)?;
            Ok(format!("{lhs_sql} = ANY({rhs_sql})"))
        }
    }
}

fn render_comparison(
    ctx: &mut EmissionContext,
    operator: Operator,
    lhs: &Expr,
    rhs: &Expr,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let coercion_for_lhs = suggested_coercion(rhs);
    let coercion_for_rhs = suggested_coercion(lhs);
    let lhs_sql = render_operand(ctx, lhs, coercion_for_lhs, options)?;
    let rhs_sql = render_operand(ctx, rhs, coercion_for_rhs, options)?;
    Ok(format!("{lhs_sql} {} {rhs_sql}", operator.as_sql()))
}

fn render_arithmetic(
    ctx: &mut EmissionContext,
    operator: Operator,
    operands: &[Expr],
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    // `+` over a string operand is concatenation.
    if operator == Operator::Addition
        && operands
            .iter()
            .any(|o| matches!(o, Expr::Literal(Literal::String(_))))
    {
        let parts: Vec<String> = operands
            .iter()
            .map(|o| render_operand(ctx, o, Coercion::Text, options))
            .collect::<Result<_, _>>()?;
        return Ok(parts.join(" || "));
    }
    let parts: Vec<String> = operands
        .iter()
        .map(|o| render_operand(ctx, o, Coercion::Numeric, options))
        .collect::<Result<_, _>>()?;
    Ok(parts.join(&format!(" {} ", operator.as_sql())))
}

fn render_logical(
    ctx: &mut EmissionContext,
    operator: Operator,
    operands: &[Expr],
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let parts: Vec<String> = operands
        .iter()
        .map(|o| {
            let sql = render_expr(ctx, o, options)?;
            Ok(match o {
                Expr::Apply {
                    operator: inner, ..
                } if matches!(inner, Operator::And | Operator::Or | Operator::Not) => {
                    format!("({sql})")
                }
                _ => sql,
            })
        })
        .collect::<Result<_, EmitError>>()?;
    Ok(parts.join(&format!(" {} ", operator.as_sql())))
}

fn render_aggregate(
    ctx: &mut EmissionContext,
    func: AggregateFn,
    distinct: bool,
    arg: &AggregateArg,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let inner = match arg {
        AggregateArg::Star => return Ok("COUNT(*)".to_string()),
        AggregateArg::Expr(e) => e.as_ref(),
    };

    // Counting a bare entity row degenerates to COUNT(*) on an inner join.
    if func == AggregateFn::Count && !distinct {
        if let Expr::Variable { kind, .. } = inner {
            if matches!(kind, EntityKind::Node | EntityKind::Relationship) {
                return Ok("COUNT(*)".to_string());
            }
        }
    }

    let coercion = match func {
        AggregateFn::Sum | AggregateFn::Avg => Coercion::Numeric,
        _ => Coercion::Text,
    };
    let arg_sql = render_operand(ctx, inner, coercion, options)?;
    let distinct_sql = if distinct { "DISTINCT " } else { "" };
    Ok(format!("{}({distinct_sql}{arg_sql})", func.as_sql()))
}

fn render_function(
    ctx: &mut EmissionContext,
    name: &str,
    args: &[Expr],
    span: Span,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let unsupported = || EmitError {
        kind: EmitErrorKind::UnsupportedFunction,
        message: format!("function `{name}` is not supported"),
        span: Some(span),
    };

    let entity_arg = |args: &[Expr]| -> Option<String> {
        match args {
            [Expr::Variable { name, kind }]
                if matches!(kind, EntityKind::Node | EntityKind::Relationship) =>
            {
                Some(name.clone())
            }
            _ => None,
        }
    };

    if name.eq_ignore_ascii_case("id") {
        let var = entity_arg(args).ok_or_else(unsupported)?;
        return render_variable(ctx, &var);
    }
    if name.eq_ignore_ascii_case("labels") {
        let var = entity_arg(args).ok_or_else(unsupported)?;
        return match ctx.vars.get(&var) {
            Some(VarTarget::Table { alias }) => Ok(format!("{alias}.labels")),
            Some(VarTarget::CteEntity { from_alias, prefix }) => {
                Ok(format!("{from_alias}.{prefix}_labels"))
            }
            _ => Err(internal(format!("no target for `{var}`"))),
        };
    }
    if name.eq_ignore_ascii_case("properties") {
        let var = entity_arg(args).ok_or_else(unsupported)?;
        return match ctx.vars.get(&var) {
            Some(VarTarget::Table { alias }) => Ok(format!("{alias}.properties")),
            Some(VarTarget::CteEntity { from_alias, prefix }) => {
                Ok(format!("{from_alias}.{prefix}_properties"))
            }
            _ => Err(internal(format!("no target for `{var}`"))),
        };
    }
    if name.eq_ignore_ascii_case("toUpper") || name.eq_ignore_ascii_case("toLower") {
        let [arg] = args else { return Err(unsupported()) };
        let f = if name.eq_ignore_ascii_case("toUpper") {
            "upper"
        } else {
            "lower"
        };
        let arg_sql = render_operand(ctx, arg, Coercion::Text, options)?;
        return Ok(format!("{f}({arg_sql})"));
    }
    if name.eq_ignore_ascii_case("coalesce") {
        let rendered: Vec<String> = args
            .iter()
            .map(|a| render_expr(ctx, a, options))
            .collect::<Result<_, _>>()?;
        return Ok(format!("coalesce({})", rendered.join(", ")));
    }
    if name.eq_ignore_ascii_case("size") {
        // Only the stored-list case has a meaningful translation: the `->`
        // accessor keeps the jsonb array for jsonb_array_length.
        if let [Expr::Property { variable, key, .. }] = args {
            if let Some(VarTarget::Table { alias }) = ctx.vars.get(variable.as_str()) {
                return Ok(format!(
                    "jsonb_array_length({alias}.properties -> '{}')",
                    escape_string(key)
                ));
            }
        }
        return Err(unsupported());
    }

    Err(unsupported())
}

pub fn render_expr(
    ctx: &mut EmissionContext,
    expr: &Expr,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_sql(lit)),
        Expr::Parameter(name) => {
            let pos = ctx.params.position(name);
            Ok(format!("${pos}"))
        }
        Expr::Variable { name, .. } => render_variable(ctx, name),
        Expr::Property { variable, key, .. } => {
            render_property(ctx, variable, key, Coercion::Text)
        }
        Expr::LabelTest { variable, label } => render_label_test(ctx, variable, label),
        Expr::List(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|i| render_expr(ctx, i, options))
                .collect::<Result<_, _>>()?;
            Ok(format!("ARRAY[{}]", rendered.join(", ")))
        }
        Expr::Map(entries) => {
            let rendered: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    Ok(format!(
                        "'{}', {}",
                        escape_string(k),
                        render_expr(ctx, v, options)?
                    ))
                })
                .collect::<Result<_, EmitError>>()?;
            Ok(format!("jsonb_build_object({})", rendered.join(", ")))
        }
        Expr::Apply { operator, operands } => match operator {
            Operator::And | Operator::Or => {
                render_logical(ctx, *operator, operands, options)
            }
            Operator::Not => {
                let inner = render_expr(ctx, &operands[0], options)?;
                Ok(format!("NOT ({inner})"))
            }
            Operator::IsNull | Operator::IsNotNull => {
                let inner = render_operand(ctx, &operands[0], Coercion::Text, options)?;
                Ok(format!("{inner} {}", operator.as_sql()))
            }
            Operator::In => render_in(ctx, &operands[0], &operands[1], options),
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                render_ilike(ctx, *operator, &operands[0], &operands[1], options)
            }
            Operator::Equal
            | Operator::NotEqual
            | Operator::LessThan
            | Operator::LessThanEqual
            | Operator::GreaterThan
            | Operator::GreaterThanEqual => {
                render_comparison(ctx, *operator, &operands[0], &operands[1], options)
            }
            Operator::Addition
            | Operator::Subtraction
            | Operator::Multiplication
            | Operator::Division
            | Operator::ModuloDivision
            | Operator::Exponentiation => {
                render_arithmetic(ctx, *operator, operands, options)
            }
        },
        Expr::Aggregate {
            func,
            distinct,
            arg,
            ..
        } => render_aggregate(ctx, *func, *distinct, arg, options),
        Expr::FunctionCall { name, args, span } => {
            render_function(ctx, name, args, *span, options)
        }
        Expr::Exists(inner) => render_exists(ctx, inner, options),
        Expr::Case {
            subject,
            when_then,
            else_expr,
        } => {
            let mut sql = String::from("CASE");
            if let Some(subject) = subject {
                sql.push(' ');
                sql.push_str(&render_expr(ctx, subject, options)?);
            }
            for (when, then) in when_then {
                sql.push_str(" WHEN ");
                sql.push_str(&render_expr(ctx, when, options)?);
                sql.push_str(" THEN ");
                sql.push_str(&render_expr(ctx, then, options)?);
            }
            if let Some(else_expr) = else_expr {
                sql.push_str(" ELSE ");
                sql.push_str(&render_expr(ctx, else_expr, options)?);
            }
            sql.push_str(" END");
            Ok(sql)
        }
    }
}

fn render_exists(
    ctx: &mut EmissionContext,
    inner: &Match,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    emit_exists_subquery(ctx, inner, options)
}

/// Split a boolean expression into its top-level AND conjuncts.
pub fn split_conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Apply {
            operator: Operator::And,
            operands,
        } => operands.iter().flat_map(split_conjuncts).collect(),
        other => vec![other],
    }
}
