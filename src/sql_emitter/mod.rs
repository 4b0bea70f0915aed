//! SQL emission: typed AST → (sql, parameters).
//!
//! The emitter walks clauses in order, assembling an [`EmissionContext`]:
//! node patterns become `FROM` entries over the nodes table, relationship
//! segments become edge joins (or recursive CTEs for variable-length
//! traversals), `WITH` wraps the accumulated query into a CTE and rebuilds
//! the context around the projected names, and `RETURN` fills the final
//! select list. Rendering is string assembly; the parameter map carries the
//! `$name` → placeholder-position binding out to the caller.

pub mod context;
pub mod render_expr;
pub mod variable_length;

use std::collections::HashMap;

use thiserror::Error;

use crate::diagnostics::{Diagnostic, Span};
use crate::lowerer::ast::{
    Clause, EntityKind, Expr, Length, Literal, Match, NodePattern, OrderItem, Projection,
    PropValue, Query, Return, Segment, Unwind, With,
};

use context::{
    sanitize_identifier, Cte, EmissionContext, FromEntry, JoinKind, ParameterMap, SelectItem,
    VarTarget,
};
use render_expr::{escape_string, render_expr, render_variable, split_conjuncts};
use variable_length::VariableLengthCte;

/// Render one WHERE/ON conjunct; a top-level OR keeps its grouping so the
/// later `AND` join cannot re-associate it.
fn render_conjunct(
    ctx: &mut EmissionContext,
    expr: &Expr,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let sql = render_expr(ctx, expr, options)?;
    Ok(match expr {
        Expr::Apply {
            operator: crate::lowerer::ast::Operator::Or,
            ..
        } => format!("({sql})"),
        _ => sql,
    })
}

/// Per-call emitter configuration. No process-wide state: a fresh options
/// record accompanies every translation.
#[derive(Debug, Clone)]
pub struct EmitterOptions {
    /// Schema the nodes/edges tables live in.
    pub schema: String,
    /// Upper bound applied to `*` and `*n..` traversals.
    pub max_variable_path_depth: u32,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        EmitterOptions {
            schema: "pgraf".to_string(),
            max_variable_path_depth: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitErrorKind {
    UnsupportedFunction,
    Internal,
}

impl EmitErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitErrorKind::UnsupportedFunction => "UnsupportedFunction",
            EmitErrorKind::Internal => "EmitError",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EmitError {
    pub kind: EmitErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl EmitError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind.as_str(),
            message: self.message.clone(),
            span: self.span.unwrap_or(Span {
                start_offset: 0,
                end_offset: 0,
                line: 1,
                column: 1,
            }),
            secondary_span: None,
        }
    }
}

fn internal(message: impl Into<String>) -> EmitError {
    EmitError {
        kind: EmitErrorKind::Internal,
        message: message.into(),
        span: None,
    }
}

/// Emit SQL for a lowered query.
pub fn emit(query: &Query, options: &EmitterOptions) -> Result<(String, ParameterMap), EmitError> {
    let mut ctx = EmissionContext::new();

    // Placeholder positions follow parameter order in the source, not the
    // order fragments happen to be rendered in.
    for name in &query.parameters {
        ctx.params.position(name);
    }

    for clause in &query.clauses {
        match clause {
            Clause::Match(m) => emit_match(&mut ctx, m, options)?,
            Clause::Unwind(u) => emit_unwind(&mut ctx, u, options)?,
            Clause::With(w) => emit_with(&mut ctx, w, options)?,
            Clause::Return(r) => emit_return(&mut ctx, r, options)?,
        }
    }

    let mut sql = String::new();
    if !ctx.ctes.is_empty() {
        sql.push_str(&render_cte_prefix(&ctx.ctes));
        sql.push(' ');
    }
    sql.push_str(&render_select_body(&ctx));
    let params = std::mem::take(&mut ctx.params);
    Ok((sql, params))
}

// ---- MATCH ------------------------------------------------------------

fn emit_match(
    ctx: &mut EmissionContext,
    m: &Match,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    let first_new_entry = ctx.from.len();

    for pattern in &m.patterns {
        emit_pattern(ctx, pattern, m.optional, options)?;
    }

    if let Some(where_clause) = &m.where_clause {
        for conjunct in split_conjuncts(where_clause) {
            let sql = render_conjunct(ctx, conjunct, options)?;
            if m.optional {
                attach_to_optional_join(ctx, first_new_entry, sql);
            } else {
                ctx.where_conjuncts.push(sql);
            }
        }
    }
    Ok(())
}

/// An OPTIONAL MATCH's WHERE belongs to its join, not the global filter:
/// it must not turn absent matches into dropped rows.
fn attach_to_optional_join(ctx: &mut EmissionContext, first_new_entry: usize, condition: String) {
    for entry in ctx.from[first_new_entry..].iter_mut().rev() {
        if entry.kind == JoinKind::Left {
            entry.on.push(condition);
            return;
        }
    }
    ctx.where_conjuncts.push(condition);
}

fn route_condition(
    ctx: &mut EmissionContext,
    optional: bool,
    created_idx: Option<usize>,
    condition: String,
) {
    if optional {
        if let Some(i) = created_idx {
            if ctx.from[i].kind == JoinKind::Left {
                ctx.from[i].on.push(condition);
                return;
            }
        }
    }
    ctx.where_conjuncts.push(condition);
}

/// Emit one path pattern: endpoints and relationship entries interleaved so
/// that every JOIN's ON references only earlier entries, and so that the
/// entries of an OPTIONAL MATCH chain left-join in traversal order.
fn emit_pattern(
    ctx: &mut EmissionContext,
    pattern: &crate::lowerer::ast::Pattern,
    optional: bool,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    let mut node_by_var: HashMap<&str, &NodePattern> = HashMap::new();
    for node in &pattern.nodes {
        node_by_var.entry(node.variable.as_str()).or_insert(node);
    }

    if pattern.segments.is_empty() {
        for node in &pattern.nodes {
            ensure_node_entry(ctx, node, optional, options)?;
        }
        return Ok(());
    }

    let mut placed: std::collections::HashSet<String> = std::collections::HashSet::new();
    for segment in &pattern.segments {
        if placed.insert(segment.source.clone()) {
            let node = node_by_var
                .get(segment.source.as_str())
                .ok_or_else(|| internal(format!("segment source `{}` not in pattern", segment.source)))?;
            ensure_node_entry(ctx, node, optional, options)?;
        }
        let target_first_occurrence = placed.insert(segment.target.clone());
        let target_node = node_by_var
            .get(segment.target.as_str())
            .ok_or_else(|| internal(format!("segment target `{}` not in pattern", segment.target)))?;
        emit_segment(
            ctx,
            segment,
            target_node,
            target_first_occurrence,
            optional,
            options,
        )?;
    }
    Ok(())
}

/// Make sure a node variable has a SQL target, creating a `FROM` entry for
/// a first occurrence, and apply this occurrence's label and property
/// predicates. Returns the alias and the created entry index, if any.
fn ensure_node_entry(
    ctx: &mut EmissionContext,
    node: &NodePattern,
    optional: bool,
    options: &EmitterOptions,
) -> Result<(String, Option<usize>), EmitError> {
    let schema = &options.schema;
    let target = ctx.vars.get(&node.variable).cloned();

    let (alias, created_idx) = match target {
        None => {
            let alias = ctx.allocate_alias(&node.variable);
            let kind = if ctx.from.is_empty() {
                JoinKind::Base
            } else if optional {
                JoinKind::Left
            } else {
                JoinKind::Inner
            };
            ctx.from.push(FromEntry {
                sql: format!("{schema}.nodes AS {alias}"),
                kind,
                on: Vec::new(),
            });
            ctx.vars.insert(
                node.variable.clone(),
                VarTarget::Table {
                    alias: alias.clone(),
                },
            );
            (alias, Some(ctx.from.len() - 1))
        }
        // Re-occurrence in a later pattern: reuse the existing alias, the
        // shared variable is the join constraint.
        Some(VarTarget::Table { alias }) => (alias, None),
        // A variable carried through a WITH reappears in a pattern: join a
        // fresh nodes alias back to the CTE row.
        Some(VarTarget::CteEntity { from_alias, prefix }) => {
            let alias = ctx.allocate_alias(&node.variable);
            let kind = if optional {
                JoinKind::Left
            } else {
                JoinKind::Inner
            };
            ctx.from.push(FromEntry {
                sql: format!("{schema}.nodes AS {alias}"),
                kind,
                on: vec![format!("{alias}.id = {from_alias}.{prefix}_id")],
            });
            ctx.vars.insert(
                node.variable.clone(),
                VarTarget::Table {
                    alias: alias.clone(),
                },
            );
            (alias, Some(ctx.from.len() - 1))
        }
        Some(_) => {
            return Err(internal(format!(
                "`{}` cannot be used as a node pattern",
                node.variable
            )))
        }
    };

    for label in &node.labels {
        let condition = format!("'{}' = ANY({alias}.labels)", escape_string(label));
        route_condition(ctx, optional, created_idx, condition);
    }
    for (key, value) in &node.properties {
        let condition = property_condition(ctx, &alias, key, value);
        route_condition(ctx, optional, created_idx, condition);
    }
    Ok((alias, created_idx))
}

/// `{k: v}` pattern entry → predicate on the JSON property bag, with the
/// cast decided by the literal's type.
fn property_condition(
    ctx: &mut EmissionContext,
    alias: &str,
    key: &str,
    value: &PropValue,
) -> String {
    let accessor = format!("{alias}.properties ->> '{}'", escape_string(key));
    match value {
        PropValue::Parameter(name) => {
            let pos = ctx.params.position(name);
            format!("{accessor} = ${pos}")
        }
        PropValue::Literal(Literal::Null) => format!("{accessor} IS NULL"),
        PropValue::Literal(lit @ (Literal::Integer(_) | Literal::Float(_))) => {
            format!("({accessor})::numeric = {}", render_literal(lit))
        }
        PropValue::Literal(Literal::Boolean(b)) => {
            format!("({accessor})::boolean = {}", if *b { "TRUE" } else { "FALSE" })
        }
        PropValue::Literal(Literal::String(s)) => {
            format!("{accessor} = '{}'", escape_string(s))
        }
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::String(s) => format!("'{}'", escape_string(s)),
        Literal::Null => "NULL".to_string(),
    }
}

/// Emit one `(source)-[rel]->(target)` triple: the relationship entry first
/// (edge table or recursive CTE), then the target endpoint, so the target's
/// join can consume the relationship columns.
fn emit_segment(
    ctx: &mut EmissionContext,
    segment: &Segment,
    target_node: &NodePattern,
    target_first_occurrence: bool,
    optional: bool,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    let source_id = render_variable(ctx, &segment.source)?;
    let rel = &segment.rel;

    let alias = ctx.allocate_alias(&rel.variable);
    let rel_is_base = ctx.from.is_empty();
    let kind = if rel_is_base {
        JoinKind::Base
    } else if optional {
        JoinKind::Left
    } else {
        JoinKind::Inner
    };

    // Relationship entry with its source linkage; min depth for ranges.
    let mut range_min = None;
    let (entry_sql, mut on) = match rel.length {
        Length::Single => {
            // Undirected linkage is symmetric over both endpoints and is
            // attached once the target alias exists.
            let on = if rel.undirected {
                Vec::new()
            } else {
                vec![format!("{source_id} = {alias}.source")]
            };
            (format!("{}.edges AS {alias}", options.schema), on)
        }
        Length::Range { min, max } => {
            let min = min.unwrap_or(1).max(1);
            let max_depth = max.unwrap_or(options.max_variable_path_depth);
            range_min = Some(min);

            let mut edge_conjuncts = Vec::new();
            if let Some(condition) = label_disjunction(&rel.labels, "e.labels") {
                edge_conjuncts.push(condition);
            }
            for (key, value) in &rel.properties {
                edge_conjuncts.push(property_condition(ctx, "e", key, value));
            }

            let name = ctx.next_cte_name("path");
            let body = VariableLengthCte {
                name: name.clone(),
                schema: options.schema.clone(),
                edge_conjuncts,
                max_depth,
                undirected: rel.undirected,
            }
            .render();
            ctx.ctes.push(Cte {
                name: name.clone(),
                recursive: true,
                body,
            });

            (
                format!("{name} AS {alias}"),
                vec![format!("{alias}.start_id = {source_id}")],
            )
        }
    };

    if rel_is_base {
        // The relationship opens the FROM list (correlated subqueries): its
        // join conditions have nowhere to go but WHERE.
        ctx.where_conjuncts.append(&mut on);
    }
    let rel_idx = ctx.from.len();
    ctx.from.push(FromEntry {
        sql: entry_sql,
        kind,
        on,
    });
    match rel.length {
        Length::Single => {
            ctx.vars.insert(
                rel.variable.clone(),
                VarTarget::Table {
                    alias: alias.clone(),
                },
            );
            if let Some(condition) = label_disjunction(&rel.labels, &format!("{alias}.labels")) {
                route_condition(ctx, optional, Some(rel_idx), condition);
            }
            for (key, value) in &rel.properties {
                let condition = property_condition(ctx, &alias, key, value);
                route_condition(ctx, optional, Some(rel_idx), condition);
            }
        }
        Length::Range { .. } => {
            ctx.vars.insert(
                rel.variable.clone(),
                VarTarget::PathCte {
                    alias: alias.clone(),
                },
            );
        }
    }

    // Target endpoint. A repeated occurrence within this pattern (a cycle)
    // applies no predicates twice.
    let target_created = if target_first_occurrence {
        ensure_node_entry(ctx, target_node, optional, options)?.1
    } else {
        None
    };
    let target_id = render_variable(ctx, &segment.target)?;

    let mut link = match rel.length {
        Length::Single if rel.undirected => vec![format!(
            "(({source_id} = {alias}.source AND {target_id} = {alias}.target) \
             OR ({source_id} = {alias}.target AND {target_id} = {alias}.source))"
        )],
        Length::Single => vec![format!("{alias}.target = {target_id}")],
        Length::Range { .. } => {
            let mut link = vec![format!("{alias}.end_id = {target_id}")];
            if let Some(min) = range_min {
                if min > 1 {
                    link.push(format!("{alias}.depth >= {min}"));
                }
            }
            link
        }
    };

    match target_created {
        // Fresh target entry: linkage rides on its join.
        Some(idx) if ctx.from[idx].kind != JoinKind::Base => ctx.from[idx].on.append(&mut link),
        // Pre-bound target (anchor, cycle, or base entry): linkage falls
        // back to the relationship entry, or WHERE when that is the base.
        _ => {
            if rel_is_base {
                ctx.where_conjuncts.append(&mut link);
            } else {
                ctx.from[rel_idx].on.append(&mut link);
            }
        }
    }
    Ok(())
}

fn label_disjunction(labels: &[String], column: &str) -> Option<String> {
    match labels {
        [] => None,
        [single] => Some(format!("'{}' = ANY({column})", escape_string(single))),
        many => {
            let parts: Vec<String> = many
                .iter()
                .map(|l| format!("'{}' = ANY({column})", escape_string(l)))
                .collect();
            Some(format!("({})", parts.join(" OR ")))
        }
    }
}

// ---- UNWIND -----------------------------------------------------------

fn emit_unwind(
    ctx: &mut EmissionContext,
    u: &Unwind,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    let alias = ctx.allocate_alias(&u.variable);

    let set_expr = match &u.expression {
        // Stored lists live in the JSON bag; `->` keeps the jsonb array.
        Expr::Property { variable, key, .. } => {
            let json = match ctx.vars.get(variable.as_str()) {
                Some(VarTarget::Table { alias }) => {
                    format!("{alias}.properties -> '{}'", escape_string(key))
                }
                Some(VarTarget::CteEntity { from_alias, prefix }) => {
                    format!("{from_alias}.{prefix}_properties -> '{}'", escape_string(key))
                }
                _ => {
                    return Err(internal(format!(
                        "UNWIND over `{variable}` which has no table or CTE target"
                    )))
                }
            };
            format!("jsonb_array_elements_text({json})")
        }
        other => format!("unnest({})", render_expr(ctx, other, options)?),
    };

    let kind = if ctx.from.is_empty() {
        JoinKind::Base
    } else {
        JoinKind::CrossLateral
    };
    let column = sanitize_identifier(&u.variable);
    ctx.from.push(FromEntry {
        sql: format!("{set_expr} AS {alias}({column})"),
        kind,
        on: Vec::new(),
    });
    ctx.vars.insert(
        u.variable.clone(),
        VarTarget::CteScalar {
            from_alias: alias,
            column,
        },
    );
    Ok(())
}

// ---- projections ------------------------------------------------------

struct ProjectedItem {
    select: Vec<SelectItem>,
    /// Expressions this projection contributes to GROUP BY when aggregation
    /// is inferred; empty for aggregate projections.
    group_exprs: Vec<String>,
    aggregate: bool,
}

fn build_projection(
    ctx: &mut EmissionContext,
    proj: &Projection,
    final_return: bool,
    options: &EmitterOptions,
) -> Result<ProjectedItem, EmitError> {
    let out_alias = sanitize_identifier(&proj.alias);

    if let Expr::Variable { name, kind } = &proj.expression {
        if matches!(kind, EntityKind::Node | EntityKind::Relationship) {
            let target = ctx
                .vars
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| internal(format!("no alias allocated for `{name}`")))?;
            let entity_columns = |id: String, labels: String, properties: String| {
                let columns = [
                    (id, format!("{out_alias}_id")),
                    (labels, format!("{out_alias}_labels")),
                    (properties, format!("{out_alias}_properties")),
                ];
                ProjectedItem {
                    select: columns
                        .iter()
                        .map(|(sql, col)| SelectItem {
                            sql: sql.clone(),
                            alias: Some(col.clone()),
                            aggregate: false,
                        })
                        .collect(),
                    group_exprs: columns.iter().map(|(sql, _)| sql.clone()).collect(),
                    aggregate: false,
                }
            };
            return Ok(match target {
                VarTarget::Table { alias } => {
                    if final_return {
                        ProjectedItem {
                            select: vec![SelectItem {
                                sql: format!("{alias}.*"),
                                alias: None,
                                aggregate: false,
                            }],
                            group_exprs: vec![format!("{alias}.id")],
                            aggregate: false,
                        }
                    } else {
                        entity_columns(
                            format!("{alias}.id"),
                            format!("{alias}.labels"),
                            format!("{alias}.properties"),
                        )
                    }
                }
                VarTarget::CteEntity { from_alias, prefix } => entity_columns(
                    format!("{from_alias}.{prefix}_id"),
                    format!("{from_alias}.{prefix}_labels"),
                    format!("{from_alias}.{prefix}_properties"),
                ),
                VarTarget::PathCte { alias } => ProjectedItem {
                    select: vec![SelectItem {
                        sql: format!("{alias}.path"),
                        alias: Some(out_alias.clone()),
                        aggregate: false,
                    }],
                    group_exprs: vec![format!("{alias}.path")],
                    aggregate: false,
                },
                VarTarget::CteScalar { from_alias, column } => {
                    let sql = format!("{from_alias}.{column}");
                    ProjectedItem {
                        select: vec![SelectItem {
                            sql: sql.clone(),
                            alias: Some(out_alias.clone()),
                            aggregate: false,
                        }],
                        group_exprs: vec![sql],
                        aggregate: false,
                    }
                }
            });
        }
    }

    let aggregate = proj.expression.contains_aggregate();
    let sql = render_expr(ctx, &proj.expression, options)?;
    Ok(ProjectedItem {
        select: vec![SelectItem {
            sql: sql.clone(),
            alias: Some(out_alias.clone()),
            aggregate,
        }],
        group_exprs: if aggregate { Vec::new() } else { vec![sql] },
        aggregate,
    })
}

fn fill_projection(
    ctx: &mut EmissionContext,
    items: &[Projection],
    distinct: bool,
    final_return: bool,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    let mut select = Vec::new();
    let mut group_exprs = Vec::new();
    let mut has_aggregate = false;

    for proj in items {
        let projected = build_projection(ctx, proj, final_return, options)?;
        has_aggregate |= projected.aggregate;
        select.extend(projected.select);
        group_exprs.extend(projected.group_exprs);
    }

    ctx.select = select;
    ctx.distinct = distinct;
    // Aggregation makes every non-aggregate projection a grouping key.
    if has_aggregate {
        ctx.group_by = group_exprs;
    }
    Ok(())
}

fn render_order_item(
    ctx: &mut EmissionContext,
    item: &OrderItem,
    projections: &[Projection],
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let direction = if item.descending { " DESC" } else { "" };

    // A bare reference to a projection alias orders by the output column.
    if let Expr::Variable { name, .. } = &item.expression {
        if projections.iter().any(|p| &p.alias == name) {
            return Ok(format!("{}{direction}", sanitize_identifier(name)));
        }
    }
    let sql = render_expr(ctx, &item.expression, options)?;
    Ok(format!("{sql}{direction}"))
}

fn pagination_sql(ctx: &mut EmissionContext, expr: &Expr) -> Result<String, EmitError> {
    match expr {
        Expr::Literal(Literal::Integer(n)) => Ok(n.to_string()),
        Expr::Parameter(name) => {
            let pos = ctx.params.position(name);
            Ok(format!("${pos}"))
        }
        _ => Err(internal("SKIP/LIMIT must be an integer or parameter")),
    }
}

// ---- WITH -------------------------------------------------------------

fn emit_with(
    ctx: &mut EmissionContext,
    w: &With,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    fill_projection(ctx, &w.items, w.distinct, false, options)?;

    for item in &w.order_by {
        let sql = render_order_item(ctx, item, &w.items, options)?;
        ctx.order_by.push(sql);
    }
    if let Some(skip) = &w.skip {
        let sql = pagination_sql(ctx, skip)?;
        ctx.offset = Some(sql);
    }
    if let Some(limit) = &w.limit {
        let sql = pagination_sql(ctx, limit)?;
        ctx.limit = Some(sql);
    }

    // Wrap the accumulated query and rebuild the context around the
    // projected names.
    let name = ctx.next_cte_name("with");
    let body = render_select_body(ctx);
    ctx.ctes.push(Cte {
        name: name.clone(),
        recursive: false,
        body,
    });

    let mut vars: HashMap<String, VarTarget> = HashMap::new();
    for proj in &w.items {
        let column = sanitize_identifier(&proj.alias);
        let target = match &proj.expression {
            Expr::Variable { kind, .. }
                if matches!(kind, EntityKind::Node | EntityKind::Relationship) =>
            {
                VarTarget::CteEntity {
                    from_alias: name.clone(),
                    prefix: column,
                }
            }
            _ => VarTarget::CteScalar {
                from_alias: name.clone(),
                column,
            },
        };
        vars.insert(proj.alias.clone(), target);
    }

    ctx.reset_for_with(
        FromEntry {
            sql: name,
            kind: JoinKind::Base,
            on: Vec::new(),
        },
        vars,
    );

    // WITH ... WHERE filters the projected rows, which by now are CTE
    // columns; aggregation inside the CTE has already happened, so this is
    // the post-aggregation filter as well.
    if let Some(where_clause) = &w.where_clause {
        for conjunct in split_conjuncts(where_clause) {
            let sql = render_conjunct(ctx, conjunct, options)?;
            ctx.where_conjuncts.push(sql);
        }
    }
    Ok(())
}

// ---- RETURN -----------------------------------------------------------

fn emit_return(
    ctx: &mut EmissionContext,
    r: &Return,
    options: &EmitterOptions,
) -> Result<(), EmitError> {
    fill_projection(ctx, &r.items, r.distinct, true, options)?;

    for item in &r.order_by {
        let sql = render_order_item(ctx, item, &r.items, options)?;
        ctx.order_by.push(sql);
    }
    if let Some(skip) = &r.skip {
        let sql = pagination_sql(ctx, skip)?;
        ctx.offset = Some(sql);
    }
    if let Some(limit) = &r.limit {
        let sql = pagination_sql(ctx, limit)?;
        ctx.limit = Some(sql);
    }
    Ok(())
}

// ---- EXISTS -----------------------------------------------------------

/// Correlated existential subquery. The child context sees the outer
/// variable targets, so a shared variable inside the pattern turns into an
/// equality against the outer alias instead of a new FROM entry.
pub(crate) fn emit_exists_subquery(
    ctx: &mut EmissionContext,
    inner: &Match,
    options: &EmitterOptions,
) -> Result<String, EmitError> {
    let mut child = ctx.fork_subquery();
    let result = emit_match(&mut child, inner, options);

    let sql = match result {
        Ok(()) => {
            child.select = vec![SelectItem {
                sql: "1".to_string(),
                alias: None,
                aggregate: false,
            }];
            let mut body = render_select_body(&child);
            if !child.ctes.is_empty() {
                body = format!("{} {body}", render_cte_prefix(&child.ctes));
            }
            Ok(format!("EXISTS ({body})"))
        }
        Err(e) => Err(e),
    };
    ctx.absorb_subquery(child);
    sql
}

// ---- rendering --------------------------------------------------------

fn render_cte_prefix(ctes: &[Cte]) -> String {
    let recursive = if ctes.iter().any(|c| c.recursive) {
        "RECURSIVE "
    } else {
        ""
    };
    let bodies: Vec<String> = ctes
        .iter()
        .map(|c| format!("{} AS (\n{}\n)", c.name, c.body))
        .collect();
    format!("WITH {recursive}{}", bodies.join(", "))
}

fn render_select_body(ctx: &EmissionContext) -> String {
    let mut sql = String::new();

    sql.push_str(if ctx.distinct {
        "SELECT DISTINCT "
    } else {
        "SELECT "
    });
    let items: Vec<String> = ctx
        .select
        .iter()
        .map(|item| match &item.alias {
            Some(alias) => format!("{} AS {alias}", item.sql),
            None => item.sql.clone(),
        })
        .collect();
    sql.push_str(&items.join(", "));

    for (i, entry) in ctx.from.iter().enumerate() {
        if i == 0 {
            sql.push_str(" FROM ");
            sql.push_str(&entry.sql);
            continue;
        }
        match entry.kind {
            JoinKind::CrossLateral => {
                sql.push_str(" CROSS JOIN LATERAL ");
                sql.push_str(&entry.sql);
            }
            JoinKind::Left => {
                sql.push_str(" LEFT JOIN ");
                sql.push_str(&entry.sql);
                sql.push_str(" ON ");
                sql.push_str(&render_on(&entry.on));
            }
            _ => {
                sql.push_str(" JOIN ");
                sql.push_str(&entry.sql);
                sql.push_str(" ON ");
                sql.push_str(&render_on(&entry.on));
            }
        }
    }

    if !ctx.where_conjuncts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&ctx.where_conjuncts.join(" AND "));
    }
    if !ctx.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&ctx.group_by.join(", "));
    }
    if !ctx.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&ctx.order_by.join(", "));
    }
    if let Some(limit) = &ctx.limit {
        sql.push_str(" LIMIT ");
        sql.push_str(limit);
    }
    if let Some(offset) = &ctx.offset {
        sql.push_str(" OFFSET ");
        sql.push_str(offset);
    }
    sql
}

fn render_on(conditions: &[String]) -> String {
    if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    }
}
