//! Concrete parse tree for the supported Cypher subset.
//!
//! Nodes borrow fragments from the scanned source so that lowering can
//! recover exact spans without the parser threading positions by hand.
//! The tree is untyped: variable resolution, kind checks and pattern
//! normalization all happen in the lowerer.

#[derive(Debug, PartialEq, Clone)]
pub struct ParsedQuery<'a> {
    pub clauses: Vec<Clause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Clause<'a> {
    Match(MatchClause<'a>),
    With(WithClause<'a>),
    Unwind(UnwindClause<'a>),
    Return(ReturnClause<'a>),
    /// A recognized but unsupported statement keyword (CREATE, MERGE, ...).
    /// Parsing stops at the keyword; lowering rejects it with its span.
    Unsupported(UnsupportedClause<'a>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct UnsupportedClause<'a> {
    pub keyword: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause<'a> {
    pub keyword: &'a str,
    pub optional: bool,
    pub patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern<'a> {
    /// `p` in `p = (a)-->(b)`; bound paths are not supported and rejected
    /// in lowering with this fragment as the span.
    pub path_variable: Option<&'a str>,
    /// The `shortestPath` / `allShortestPaths` keyword when present.
    pub shortest: Option<&'a str>,
    pub start: NodePattern<'a>,
    pub segments: Vec<(RelationshipPattern<'a>, NodePattern<'a>)>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NodePattern<'a> {
    /// The opening parenthesis, kept for span reporting.
    pub fragment: &'a str,
    pub name: Option<&'a str>,
    pub labels: Vec<&'a str>,
    pub properties: Vec<PropertyKVPair<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelationshipPattern<'a> {
    pub fragment: &'a str,
    pub name: Option<&'a str>,
    pub direction: Direction,
    pub labels: Vec<&'a str>,
    pub properties: Vec<PropertyKVPair<'a>>,
    pub length: Option<VariableLengthSpec>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

/// `*`, `*2`, `*1..3`, `*..5`, `*2..` — absent bounds stay `None`; the
/// emitter applies its configured maximum to an open upper bound.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VariableLengthSpec {
    pub min_hops: Option<u32>,
    pub max_hops: Option<u32>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyKVPair<'a> {
    pub key: &'a str,
    pub value: PropertyValue<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyValue<'a> {
    Literal(Literal),
    Parameter(&'a str),
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithClause<'a> {
    pub keyword: &'a str,
    pub distinct: bool,
    pub star: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub where_clause: Option<Expression<'a>>,
    pub order_by: Vec<OrderByItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnClause<'a> {
    pub keyword: &'a str,
    pub distinct: bool,
    pub star: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<OrderByItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct UnwindClause<'a> {
    pub keyword: &'a str,
    pub expression: Expression<'a>,
    pub alias: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionItem<'a> {
    pub expression: Expression<'a>,
    pub alias: Option<&'a str>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByItem<'a> {
    pub expression: Expression<'a>,
    pub descending: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Exponentiation,
    And,
    Or,
    Not,
    In,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::ModuloDivision => "%",
            Operator::Exponentiation => "^",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::In => "IN",
            Operator::Contains => "ILIKE",
            Operator::StartsWith => "ILIKE",
            Operator::EndsWith => "ILIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication<'a> {
    pub operator: Operator,
    pub operands: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyAccess<'a> {
    pub base: &'a str,
    pub key: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct LabelTest<'a> {
    pub base: &'a str,
    pub label: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall<'a> {
    /// The name fragment, kept for span reporting on unsupported functions.
    pub name: &'a str,
    pub distinct: bool,
    /// `count(*)`.
    pub star: bool,
    pub args: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CaseExpression<'a> {
    /// Present for the simple form `CASE x WHEN ...`, absent for the
    /// searched form.
    pub subject: Option<Box<Expression<'a>>>,
    pub when_then: Vec<(Expression<'a>, Expression<'a>)>,
    pub else_expr: Option<Box<Expression<'a>>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ExistsSubquery<'a> {
    pub keyword: &'a str,
    pub patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<Box<Expression<'a>>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression<'a> {
    Literal(Literal),
    Variable(&'a str),
    Parameter(&'a str),
    List(Vec<Expression<'a>>),
    Map(Vec<(&'a str, Expression<'a>)>),
    PropertyAccessExp(PropertyAccess<'a>),
    LabelTestExp(LabelTest<'a>),
    OperatorApplicationExp(OperatorApplication<'a>),
    FunctionCallExp(FunctionCall<'a>),
    CaseExp(CaseExpression<'a>),
    ExistsExp(ExistsSubquery<'a>),
}
