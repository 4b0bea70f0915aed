//! Lowering: parse tree → typed AST.
//!
//! This pass owns all semantic checks. It resolves every variable against
//! the binding environment, gives anonymous pattern positions fresh names,
//! canonicalizes relationship direction to outbound, collects `$parameters`
//! in source order, and rejects the constructs the grammar recognizes but
//! the pipeline does not translate.

pub mod ast;
pub mod scope;

use thiserror::Error;

use crate::cypher_parser::ast as cst;
use crate::diagnostics::{Diagnostic, Span};

use ast::{
    AggregateArg, AggregateFn, Clause, EntityKind, Expr, Length, Match, NodePattern, OrderItem,
    Pattern, Projection, PropValue, Query, RelPattern, Return, Segment, Unwind, With,
};
use scope::{Binding, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerErrorKind {
    UnknownVariable,
    VariableKindConflict,
    InvalidPropertyAccess,
    NestedAggregate,
    UnsupportedConstruct,
}

impl LowerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LowerErrorKind::UnknownVariable => "UnknownVariable",
            LowerErrorKind::VariableKindConflict => "VariableKindConflict",
            LowerErrorKind::InvalidPropertyAccess => "InvalidPropertyAccess",
            LowerErrorKind::NestedAggregate => "NestedAggregate",
            LowerErrorKind::UnsupportedConstruct => "UnsupportedConstruct",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message} at line {}, column {}", .span.line, .span.column)]
pub struct LowerError {
    pub kind: LowerErrorKind,
    pub message: String,
    pub span: Span,
    pub secondary_span: Option<Span>,
}

impl LowerError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind.as_str(),
            message: self.message.clone(),
            span: self.span,
            secondary_span: self.secondary_span,
        }
    }
}

/// Lower a parsed query. `source` is the (masked) text the parse tree
/// borrows from; spans are resolved against it.
pub fn lower(parsed: &cst::ParsedQuery<'_>, source: &str) -> Result<Query, LowerError> {
    Lowerer {
        source,
        scope: Scope::new(),
        anon_counter: 0,
        parameters: Vec::new(),
    }
    .lower_query(parsed)
}

#[derive(Debug, Clone, Copy, Default)]
struct ExprCtx {
    in_aggregate: bool,
    in_where: bool,
}

struct Lowerer<'a> {
    source: &'a str,
    scope: Scope<'a>,
    anon_counter: u32,
    parameters: Vec<String>,
}

fn clause_keyword<'a>(clause: &cst::Clause<'a>) -> &'a str {
    match clause {
        cst::Clause::Match(c) => c.keyword,
        cst::Clause::With(c) => c.keyword,
        cst::Clause::Unwind(c) => c.keyword,
        cst::Clause::Return(c) => c.keyword,
        cst::Clause::Unsupported(c) => c.keyword,
    }
}

impl<'a> Lowerer<'a> {
    fn span(&self, fragment: &str) -> Span {
        Span::of(self.source, fragment)
    }

    fn err(&self, kind: LowerErrorKind, message: impl Into<String>, fragment: &str) -> LowerError {
        LowerError {
            kind,
            message: message.into(),
            span: self.span(fragment),
            secondary_span: None,
        }
    }

    fn fresh_name(&mut self) -> String {
        // A leading underscore is not a legal identifier in this grammar,
        // so internal names cannot collide with user variables.
        let name = format!("_anon{}", self.anon_counter);
        self.anon_counter += 1;
        name
    }

    fn record_parameter(&mut self, name: &str) {
        if !self.parameters.iter().any(|p| p == name) {
            self.parameters.push(name.to_string());
        }
    }

    fn lower_query(mut self, parsed: &cst::ParsedQuery<'a>) -> Result<Query, LowerError> {
        self.validate_shape(parsed)?;

        let mut clauses = Vec::new();
        for clause in &parsed.clauses {
            match clause {
                cst::Clause::Match(m) => clauses.push(Clause::Match(self.lower_match(m)?)),
                cst::Clause::With(w) => clauses.push(Clause::With(self.lower_with(w)?)),
                cst::Clause::Unwind(u) => clauses.push(Clause::Unwind(self.lower_unwind(u)?)),
                cst::Clause::Return(r) => clauses.push(Clause::Return(self.lower_return(r)?)),
                cst::Clause::Unsupported(_) => unreachable!("rejected by validate_shape"),
            }
        }

        Ok(Query {
            clauses,
            parameters: self.parameters,
        })
    }

    fn validate_shape(&self, parsed: &cst::ParsedQuery<'a>) -> Result<(), LowerError> {
        let mut saw_match = false;
        let mut return_at = None;

        for (i, clause) in parsed.clauses.iter().enumerate() {
            match clause {
                cst::Clause::Unsupported(c) => {
                    return Err(self.err(
                        LowerErrorKind::UnsupportedConstruct,
                        format!("{} is not supported", c.keyword.to_uppercase()),
                        c.keyword,
                    ));
                }
                cst::Clause::Match(_) => saw_match = true,
                cst::Clause::Return(r) => {
                    if return_at.is_some() {
                        return Err(self.err(
                            LowerErrorKind::UnsupportedConstruct,
                            "multiple RETURN clauses",
                            r.keyword,
                        ));
                    }
                    return_at = Some(i);
                }
                _ => {}
            }
        }

        let last = parsed.clauses.len() - 1;
        match return_at {
            None => {
                let kw = clause_keyword(&parsed.clauses[last]);
                return Err(self.err(
                    LowerErrorKind::UnsupportedConstruct,
                    "query must end with a RETURN clause",
                    kw,
                ));
            }
            Some(i) if i != last => {
                let kw = clause_keyword(&parsed.clauses[i]);
                return Err(self.err(
                    LowerErrorKind::UnsupportedConstruct,
                    "RETURN must be the final clause",
                    kw,
                ));
            }
            _ => {}
        }

        if !saw_match {
            let kw = clause_keyword(&parsed.clauses[0]);
            return Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                "query must contain a MATCH clause",
                kw,
            ));
        }
        Ok(())
    }

    // ---- patterns ----------------------------------------------------

    fn lower_match(&mut self, m: &cst::MatchClause<'a>) -> Result<Match, LowerError> {
        let mut patterns = Vec::new();
        for pattern in &m.patterns {
            patterns.push(self.lower_pattern(pattern)?);
        }
        let where_clause = m
            .where_clause
            .as_ref()
            .map(|w| {
                self.lower_expression(
                    w,
                    ExprCtx {
                        in_where: true,
                        ..Default::default()
                    },
                )
            })
            .transpose()?;
        Ok(Match {
            optional: m.optional,
            patterns,
            where_clause,
        })
    }

    fn lower_pattern(&mut self, p: &cst::PathPattern<'a>) -> Result<Pattern, LowerError> {
        if let Some(kw) = p.shortest {
            return Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                format!("{kw} is not supported"),
                kw,
            ));
        }
        if let Some(var) = p.path_variable {
            return Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                "path variables are not supported",
                var,
            ));
        }

        let mut nodes = Vec::new();
        let mut segments = Vec::new();

        let first = self.lower_node_pattern(&p.start)?;
        let mut previous = first.variable.clone();
        nodes.push(first);

        for (rel, node) in &p.segments {
            let target = self.lower_node_pattern(node)?;
            let target_var = target.variable.clone();
            nodes.push(target);

            let lowered = self.lower_rel_pattern(rel)?;
            let segment = match rel.direction {
                cst::Direction::Outgoing | cst::Direction::Either => Segment {
                    source: previous.clone(),
                    rel: lowered,
                    target: target_var.clone(),
                },
                // `(a)<-[r]-(b)` is the same edge as `(b)-[r]->(a)`.
                cst::Direction::Incoming => Segment {
                    source: target_var.clone(),
                    rel: lowered,
                    target: previous.clone(),
                },
            };
            segments.push(segment);
            previous = target_var;
        }

        Ok(Pattern { nodes, segments })
    }

    fn lower_node_pattern(
        &mut self,
        np: &cst::NodePattern<'a>,
    ) -> Result<NodePattern, LowerError> {
        let (variable, fragment, user_named) = match np.name {
            Some(name) => (name.to_string(), name, true),
            None => (self.fresh_name(), np.fragment, false),
        };
        self.bind_entity(&variable, EntityKind::Node, user_named, fragment)?;

        Ok(NodePattern {
            variable,
            labels: np.labels.iter().map(|l| l.to_string()).collect(),
            properties: self.lower_properties(&np.properties),
        })
    }

    fn lower_rel_pattern(
        &mut self,
        rp: &cst::RelationshipPattern<'a>,
    ) -> Result<RelPattern, LowerError> {
        let length = match rp.length {
            None => Length::Single,
            Some(spec) => {
                if let (Some(min), Some(max)) = (spec.min_hops, spec.max_hops) {
                    if min > max {
                        return Err(self.err(
                            LowerErrorKind::UnsupportedConstruct,
                            format!("invalid variable-length range: {min} > {max}"),
                            rp.fragment,
                        ));
                    }
                }
                Length::Range {
                    min: spec.min_hops,
                    max: spec.max_hops,
                }
            }
        };
        let kind = match length {
            Length::Single => EntityKind::Relationship,
            Length::Range { .. } => EntityKind::Path,
        };

        let (variable, fragment, user_named) = match rp.name {
            Some(name) => (name.to_string(), name, true),
            None => (self.fresh_name(), rp.fragment, false),
        };
        self.bind_entity(&variable, kind, user_named, fragment)?;

        Ok(RelPattern {
            variable,
            labels: rp.labels.iter().map(|l| l.to_string()).collect(),
            properties: self.lower_properties(&rp.properties),
            undirected: rp.direction == cst::Direction::Either,
            length,
        })
    }

    fn bind_entity(
        &mut self,
        variable: &str,
        kind: EntityKind,
        user_named: bool,
        fragment: &'a str,
    ) -> Result<(), LowerError> {
        if let Some(existing) = self.scope.get(variable) {
            if existing.kind != kind {
                let secondary = existing.fragment.map(|f| self.span(f));
                return Err(LowerError {
                    kind: LowerErrorKind::VariableKindConflict,
                    message: format!(
                        "variable `{variable}` is already bound to a different entity kind"
                    ),
                    span: self.span(fragment),
                    secondary_span: secondary,
                });
            }
            // Re-occurrence of the same variable: a join constraint, the
            // emitter reuses the existing alias.
            return Ok(());
        }
        self.scope.bind(
            variable,
            Binding {
                kind,
                user_named,
                fragment: Some(fragment),
            },
        );
        Ok(())
    }

    fn lower_properties(&mut self, props: &[cst::PropertyKVPair<'a>]) -> Vec<(String, PropValue)> {
        props
            .iter()
            .map(|kv| {
                let value = match &kv.value {
                    cst::PropertyValue::Literal(lit) => PropValue::Literal(lit.clone()),
                    cst::PropertyValue::Parameter(name) => {
                        self.record_parameter(name);
                        PropValue::Parameter(name.to_string())
                    }
                };
                (kv.key.to_string(), value)
            })
            .collect()
    }

    // ---- projections --------------------------------------------------

    fn lower_projections(
        &mut self,
        star: bool,
        items: &[cst::ProjectionItem<'a>],
        keyword: &'a str,
    ) -> Result<Vec<Projection>, LowerError> {
        let mut projections = Vec::new();

        if star {
            let entities = self.scope.entity_variables();
            if entities.is_empty() {
                return Err(self.err(
                    LowerErrorKind::UnsupportedConstruct,
                    "star projection requires at least one named node or relationship variable",
                    keyword,
                ));
            }
            for (name, kind) in entities {
                projections.push(Projection {
                    expression: Expr::Variable {
                        name: name.to_string(),
                        kind,
                    },
                    alias: name.to_string(),
                });
            }
            return Ok(projections);
        }

        for (i, item) in items.iter().enumerate() {
            let expression = self.lower_expression(&item.expression, ExprCtx::default())?;
            let alias = match item.alias {
                Some(alias) => alias.to_string(),
                None => match &item.expression {
                    cst::Expression::Variable(name) => name.to_string(),
                    cst::Expression::PropertyAccessExp(pa) => format!("{}_{}", pa.base, pa.key),
                    _ => format!("col{}", i + 1),
                },
            };
            projections.push(Projection { expression, alias });
        }

        for (i, p) in projections.iter().enumerate() {
            if projections[..i].iter().any(|q| q.alias == p.alias) {
                return Err(self.err(
                    LowerErrorKind::UnsupportedConstruct,
                    format!("duplicate projection alias `{}`", p.alias),
                    keyword,
                ));
            }
        }
        Ok(projections)
    }

    fn projection_bindings(projections: &[Projection]) -> Vec<(String, Binding<'a>)> {
        projections
            .iter()
            .map(|p| {
                let kind = match &p.expression {
                    Expr::Variable { kind, .. } => *kind,
                    _ => EntityKind::Scalar,
                };
                (
                    p.alias.clone(),
                    Binding {
                        kind,
                        user_named: true,
                        fragment: None,
                    },
                )
            })
            .collect()
    }

    fn replace_scope_with_projections(&mut self, projections: &[Projection]) {
        let bindings = Self::projection_bindings(projections);
        self.scope.replace(bindings);
    }

    /// ORDER BY (and SKIP/LIMIT) may reference both the projected aliases
    /// and the variables still in scope before the projection.
    fn extend_scope_with_projections(&mut self, projections: &[Projection]) {
        for (name, binding) in Self::projection_bindings(projections) {
            self.scope.bind(&name, binding);
        }
    }

    fn lower_order_by(
        &mut self,
        items: &[cst::OrderByItem<'a>],
    ) -> Result<Vec<OrderItem>, LowerError> {
        items
            .iter()
            .map(|item| {
                Ok(OrderItem {
                    expression: self.lower_expression(&item.expression, ExprCtx::default())?,
                    descending: item.descending,
                })
            })
            .collect()
    }

    fn lower_pagination(
        &mut self,
        expr: Option<&cst::Expression<'a>>,
        keyword: &'a str,
        what: &str,
    ) -> Result<Option<Expr>, LowerError> {
        let Some(expr) = expr else { return Ok(None) };
        let lowered = self.lower_expression(expr, ExprCtx::default())?;
        match &lowered {
            Expr::Literal(ast::Literal::Integer(n)) if *n >= 0 => Ok(Some(lowered)),
            Expr::Parameter(_) => Ok(Some(lowered)),
            _ => Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                format!("{what} must be a non-negative integer literal or a parameter"),
                keyword,
            )),
        }
    }

    fn lower_with(&mut self, w: &cst::WithClause<'a>) -> Result<With, LowerError> {
        let items = self.lower_projections(w.star, &w.items, w.keyword)?;

        self.extend_scope_with_projections(&items);
        let order_by = self.lower_order_by(&w.order_by)?;
        let skip = self.lower_pagination(w.skip.as_ref(), w.keyword, "SKIP")?;
        let limit = self.lower_pagination(w.limit.as_ref(), w.keyword, "LIMIT")?;

        // WITH is the scope barrier: its WHERE applies to the projected
        // names only, and everything downstream sees just those.
        self.replace_scope_with_projections(&items);
        let where_clause = w
            .where_clause
            .as_ref()
            .map(|e| {
                self.lower_expression(
                    e,
                    ExprCtx {
                        in_where: true,
                        ..Default::default()
                    },
                )
            })
            .transpose()?;

        Ok(With {
            distinct: w.distinct,
            items,
            where_clause,
            order_by,
            skip,
            limit,
        })
    }

    fn lower_return(&mut self, r: &cst::ReturnClause<'a>) -> Result<Return, LowerError> {
        let items = self.lower_projections(r.star, &r.items, r.keyword)?;
        self.extend_scope_with_projections(&items);
        let order_by = self.lower_order_by(&r.order_by)?;
        let skip = self.lower_pagination(r.skip.as_ref(), r.keyword, "SKIP")?;
        let limit = self.lower_pagination(r.limit.as_ref(), r.keyword, "LIMIT")?;

        Ok(Return {
            distinct: r.distinct,
            items,
            order_by,
            skip,
            limit,
        })
    }

    fn lower_unwind(&mut self, u: &cst::UnwindClause<'a>) -> Result<Unwind, LowerError> {
        let expression = self.lower_expression(&u.expression, ExprCtx::default())?;
        if self.scope.get(u.alias).is_some() {
            return Err(self.err(
                LowerErrorKind::VariableKindConflict,
                format!("variable `{}` is already bound", u.alias),
                u.alias,
            ));
        }
        self.scope.bind(
            u.alias,
            Binding {
                kind: EntityKind::Scalar,
                user_named: true,
                fragment: Some(u.alias),
            },
        );
        Ok(Unwind {
            expression,
            variable: u.alias.to_string(),
        })
    }

    // ---- expressions ---------------------------------------------------

    fn lower_expression(
        &mut self,
        expr: &cst::Expression<'a>,
        ctx: ExprCtx,
    ) -> Result<Expr, LowerError> {
        match expr {
            cst::Expression::Literal(lit) => Ok(Expr::Literal(lit.clone())),
            cst::Expression::Parameter(name) => {
                self.record_parameter(name);
                Ok(Expr::Parameter(name.to_string()))
            }
            cst::Expression::Variable(name) => match self.scope.get(name) {
                Some(binding) => Ok(Expr::Variable {
                    name: name.to_string(),
                    kind: binding.kind,
                }),
                None => Err(self.err(
                    LowerErrorKind::UnknownVariable,
                    format!("unknown variable `{name}`"),
                    name,
                )),
            },
            cst::Expression::PropertyAccessExp(pa) => {
                let binding = self.scope.get(pa.base).ok_or_else(|| {
                    self.err(
                        LowerErrorKind::UnknownVariable,
                        format!("unknown variable `{}`", pa.base),
                        pa.base,
                    )
                })?;
                match binding.kind {
                    EntityKind::Node | EntityKind::Relationship => Ok(Expr::Property {
                        variable: pa.base.to_string(),
                        kind: binding.kind,
                        key: pa.key.to_string(),
                    }),
                    EntityKind::Path => Err(self.err(
                        LowerErrorKind::InvalidPropertyAccess,
                        format!(
                            "`{}` is a variable-length relationship; property access on a path is not allowed",
                            pa.base
                        ),
                        pa.base,
                    )),
                    EntityKind::Scalar => Err(self.err(
                        LowerErrorKind::InvalidPropertyAccess,
                        format!("`{}` is not a node or relationship variable", pa.base),
                        pa.base,
                    )),
                }
            }
            cst::Expression::LabelTestExp(lt) => {
                let binding = self.scope.get(lt.base).ok_or_else(|| {
                    self.err(
                        LowerErrorKind::UnknownVariable,
                        format!("unknown variable `{}`", lt.base),
                        lt.base,
                    )
                })?;
                match binding.kind {
                    EntityKind::Node | EntityKind::Relationship => Ok(Expr::LabelTest {
                        variable: lt.base.to_string(),
                        label: lt.label.to_string(),
                    }),
                    _ => Err(self.err(
                        LowerErrorKind::InvalidPropertyAccess,
                        format!("`{}` is not a node or relationship variable", lt.base),
                        lt.base,
                    )),
                }
            }
            cst::Expression::List(items) => Ok(Expr::List(
                items
                    .iter()
                    .map(|e| self.lower_expression(e, ctx))
                    .collect::<Result<_, _>>()?,
            )),
            cst::Expression::Map(entries) => Ok(Expr::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_string(), self.lower_expression(v, ctx)?)))
                    .collect::<Result<_, LowerError>>()?,
            )),
            cst::Expression::OperatorApplicationExp(app) => Ok(Expr::Apply {
                operator: app.operator,
                operands: app
                    .operands
                    .iter()
                    .map(|e| self.lower_expression(e, ctx))
                    .collect::<Result<_, _>>()?,
            }),
            cst::Expression::FunctionCallExp(call) => self.lower_function_call(call, ctx),
            cst::Expression::CaseExp(case) => Ok(Expr::Case {
                subject: case
                    .subject
                    .as_deref()
                    .map(|e| self.lower_expression(e, ctx).map(Box::new))
                    .transpose()?,
                when_then: case
                    .when_then
                    .iter()
                    .map(|(w, t)| {
                        Ok((
                            self.lower_expression(w, ctx)?,
                            self.lower_expression(t, ctx)?,
                        ))
                    })
                    .collect::<Result<_, LowerError>>()?,
                else_expr: case
                    .else_expr
                    .as_deref()
                    .map(|e| self.lower_expression(e, ctx).map(Box::new))
                    .transpose()?,
            }),
            cst::Expression::ExistsExp(sub) => self.lower_exists(sub),
        }
    }

    fn lower_function_call(
        &mut self,
        call: &cst::FunctionCall<'a>,
        ctx: ExprCtx,
    ) -> Result<Expr, LowerError> {
        let span = self.span(call.name);

        if let Some(func) = AggregateFn::from_name(call.name) {
            if ctx.in_aggregate {
                return Err(self.err(
                    LowerErrorKind::NestedAggregate,
                    format!("aggregate `{}` nested inside another aggregate", call.name),
                    call.name,
                ));
            }
            if ctx.in_where {
                return Err(self.err(
                    LowerErrorKind::UnsupportedConstruct,
                    "aggregates are not allowed in WHERE",
                    call.name,
                ));
            }
            let arg = if call.star {
                if func != AggregateFn::Count {
                    return Err(self.err(
                        LowerErrorKind::UnsupportedConstruct,
                        format!("`{}(*)` is not supported; only COUNT(*)", call.name),
                        call.name,
                    ));
                }
                if call.distinct {
                    return Err(self.err(
                        LowerErrorKind::UnsupportedConstruct,
                        "COUNT(DISTINCT *) is not supported",
                        call.name,
                    ));
                }
                AggregateArg::Star
            } else {
                if call.args.len() != 1 {
                    return Err(self.err(
                        LowerErrorKind::UnsupportedConstruct,
                        format!("`{}` takes exactly one argument", call.name),
                        call.name,
                    ));
                }
                let inner = self.lower_expression(
                    &call.args[0],
                    ExprCtx {
                        in_aggregate: true,
                        ..ctx
                    },
                )?;
                AggregateArg::Expr(Box::new(inner))
            };
            return Ok(Expr::Aggregate {
                func,
                distinct: call.distinct,
                arg,
                span,
            });
        }

        if call.star {
            return Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                format!("`{}(*)` is not supported", call.name),
                call.name,
            ));
        }
        if call.distinct {
            return Err(self.err(
                LowerErrorKind::UnsupportedConstruct,
                "DISTINCT is only valid inside an aggregate call",
                call.name,
            ));
        }
        let args = call
            .args
            .iter()
            .map(|e| self.lower_expression(e, ctx))
            .collect::<Result<_, _>>()?;
        Ok(Expr::FunctionCall {
            name: call.name.to_string(),
            args,
            span,
        })
    }

    /// Inner pattern variables are scoped to the subquery; outer variables
    /// stay visible, which is what makes the emitted subquery correlated.
    fn lower_exists(&mut self, sub: &cst::ExistsSubquery<'a>) -> Result<Expr, LowerError> {
        let saved = self.scope.clone();
        let mut patterns = Vec::new();
        for pattern in &sub.patterns {
            patterns.push(self.lower_pattern(pattern)?);
        }
        let where_clause = sub
            .where_clause
            .as_deref()
            .map(|e| {
                self.lower_expression(
                    e,
                    ExprCtx {
                        in_where: true,
                        ..Default::default()
                    },
                )
            })
            .transpose()?;
        self.scope = saved;

        Ok(Expr::Exists(Box::new(Match {
            optional: false,
            patterns,
            where_clause,
        })))
    }
}
