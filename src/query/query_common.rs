use serde_json::Value;

use crate::ident::ident_eq;

/// A complete SELECT statement: optional WITH clause followed by a query body.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub with: Option<WithClause>,
    pub body: QueryBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    // Optional column list: name(a, b) AS (...)
    pub columns: Vec<String>,
    pub statement: Box<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator { Union, UnionAll, Intersect, Except }

impl SetOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            SetOperator::Union => "union",
            SetOperator::UnionAll => "union all",
            SetOperator::Intersect => "intersect",
            SetOperator::Except => "except",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Select(Box<Query>),
    // Set operations chain left-associatively: ((a UNION b) UNION c)
    SetOp { left: Box<QueryBody>, op: SetOperator, right: Box<QueryBody> },
    // Parenthesized statement used as a set-operation operand
    Nested(Box<Statement>),
}

impl QueryBody {
    /// Leftmost simple select; it names the output columns of the whole body.
    pub fn leftmost(&self) -> Option<&Query> {
        match self {
            QueryBody::Select(q) => Some(q),
            QueryBody::SetOp { left, .. } => left.leftmost(),
            QueryBody::Nested(s) => s.body.leftmost(),
        }
    }

    pub fn rightmost_mut(&mut self) -> Option<&mut Query> {
        match self {
            QueryBody::Select(q) => Some(q),
            QueryBody::SetOp { right, .. } => right.rightmost_mut(),
            QueryBody::Nested(_) => None,
        }
    }

    /// Every simple select reachable through set operations (not through nesting).
    pub fn leaves_mut(&mut self) -> Vec<&mut Query> {
        match self {
            QueryBody::Select(q) => vec![q.as_mut()],
            QueryBody::SetOp { left, right, .. } => {
                let mut out = left.leaves_mut();
                out.extend(right.leaves_mut());
                out
            }
            QueryBody::Nested(s) => s.body.leaves_mut(),
        }
    }

    pub fn leaves(&self) -> Vec<&Query> {
        match self {
            QueryBody::Select(q) => vec![q.as_ref()],
            QueryBody::SetOp { left, right, .. } => {
                let mut out = left.leaves();
                out.extend(right.leaves());
                out
            }
            QueryBody::Nested(s) => s.body.leaves(),
        }
    }
}

impl Statement {
    pub fn from_query(query: Query) -> Self {
        Statement { with: None, body: QueryBody::Select(Box::new(query)) }
    }

    /// The root simple select, if the body is not a set operation.
    pub fn as_select(&self) -> Option<&Query> {
        match &self.body {
            QueryBody::Select(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_select_mut(&mut self) -> Option<&mut Query> {
        match &mut self.body {
            QueryBody::Select(q) => Some(q),
            _ => None,
        }
    }

    pub fn ctes(&self) -> &[Cte] {
        self.with.as_ref().map(|w| w.ctes.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    // FROM base source; JOINs (including comma-separated sources) follow in `joins`
    pub base_table: Option<TableRef>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl Query {
    pub fn new(select: Vec<SelectItem>) -> Self {
        Query {
            distinct: false,
            select,
            base_table: None,
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_from(mut self, table: TableRef) -> Self {
        self.base_table = Some(table);
        self
    }

    /// FROM sources in declaration order: base table then each join's right side.
    pub fn sources(&self) -> Vec<&TableRef> {
        let mut out: Vec<&TableRef> = Vec::new();
        if let Some(b) = &self.base_table { out.push(b); }
        for j in &self.joins { out.push(&j.right); }
        out
    }

    pub fn find_source(&self, name: &str) -> Option<&TableRef> {
        self.sources().into_iter().find(|s| ident_eq(s.effective_name(), name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self { SelectItem { expr, alias: None } }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        SelectItem { expr, alias: Some(alias.into()) }
    }

    /// Output column name: the alias, or the column name of a bare column reference.
    pub fn output_name(&self) -> Option<&str> {
        if let Some(a) = &self.alias { return Some(a.as_str()); }
        match &self.expr {
            Expr::Column(c) => Some(c.name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection { Asc, Desc }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder { First, Last }

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType { Inner, Left, Right, Full, Cross, Comma }

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner join",
            JoinType::Left => "left join",
            JoinType::Right => "right join",
            JoinType::Full => "full join",
            JoinType::Cross => "cross join",
            JoinType::Comma => ",",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<String>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub right: TableRef,
    pub constraint: JoinConstraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A table name reference (optionally schema-qualified) with optional alias
    Table { namespaces: Vec<String>, name: String, alias: Option<String> },
    /// A subquery in FROM clause with required alias
    Subquery { statement: Box<Statement>, alias: String },
}

impl TableRef {
    pub fn table(name: impl Into<String>, alias: Option<&str>) -> Self {
        TableRef::Table { namespaces: Vec::new(), name: name.into(), alias: alias.map(|a| a.to_string()) }
    }

    /// Get the table name if this is a Table variant, None for Subquery
    pub fn table_name(&self) -> Option<&str> {
        match self {
            TableRef::Table { name, .. } => Some(name.as_str()),
            TableRef::Subquery { .. } => None,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            TableRef::Table { alias, .. } => alias.as_deref(),
            TableRef::Subquery { alias, .. } => Some(alias.as_str()),
        }
    }

    /// Name other clauses use to qualify this source: alias if present, else the table name.
    pub fn effective_name(&self) -> &str {
        match self {
            TableRef::Table { name, alias, .. } => alias.as_deref().unwrap_or(name.as_str()),
            TableRef::Subquery { alias, .. } => alias.as_str(),
        }
    }

    /// Dotted `schema.table` form for table references.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            TableRef::Table { namespaces, name, .. } => {
                let mut parts = namespaces.clone();
                parts.push(name.clone());
                Some(parts.join("."))
            }
            TableRef::Subquery { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    // Qualifying path, innermost last: ["public", "users"] for public.users.id
    pub namespaces: Vec<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self { ColumnRef { namespaces: Vec::new(), name: name.into() } }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        ColumnRef { namespaces: vec![qualifier.into()], name: name.into() }
    }

    /// The table/alias qualifier, if any.
    pub fn qualifier(&self) -> Option<&str> {
        self.namespaces.last().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    // Numbers keep their source text; they are never evaluated
    Number(String),
    String(String),
    Boolean(bool),
    Null,
    // type-prefixed string: interval '1 day', date '2024-01-01'
    Typed { type_name: String, value: String },
}

/// A bind parameter. `name` is None for anonymous `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub value: Option<Value>,
}

impl Param {
    pub fn bound(name: impl Into<String>, value: Value) -> Self {
        Param { name: Some(name.into()), value: Some(value) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
    // aggregate FILTER (WHERE ...)
    pub filter: Option<Box<Expr>>,
    pub over: Option<WindowSpec>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        FunctionCall { name: name.into(), args, distinct: false, filter: None, over: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq, NotEq, Lt, LtEq, Gt, GtEq,
    Like, NotLike, ILike, NotILike,
    And, Or,
    Plus, Minus, Multiply, Divide, Modulo,
    Concat, JsonGet, JsonGetText,
}

impl BinaryOp {
    /// Binding strength shared by the parser and the renderer.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
            | BinaryOp::Like | BinaryOp::NotLike | BinaryOp::ILike | BinaryOp::NotILike => PREC_COMPARISON,
            BinaryOp::Concat | BinaryOp::JsonGet | BinaryOp::JsonGetText => 5,
            BinaryOp::Plus | BinaryOp::Minus => 6,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 7,
        }
    }

    /// Operator text; keyword operators are lowercase and cased by the renderer.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Like => "like",
            BinaryOp::NotLike => "not like",
            BinaryOp::ILike => "ilike",
            BinaryOp::NotILike => "not ilike",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Concat => "||",
            BinaryOp::JsonGet => "->",
            BinaryOp::JsonGetText => "->>",
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self, BinaryOp::Like | BinaryOp::NotLike | BinaryOp::ILike | BinaryOp::NotILike | BinaryOp::And | BinaryOp::Or)
    }
}

pub const PREC_NOT: u8 = 3;
pub const PREC_COMPARISON: u8 = 4;
pub const PREC_UNARY_MINUS: u8 = 8;
pub const PREC_CAST: u8 = 9;
pub const PREC_ATOM: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp { Not, Minus, Plus }

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    // `*` or `t.*`; expansion is deferred to column resolution
    Wildcard { qualifier: Option<String> },
    Literal(Literal),
    Param(Param),
    Function(FunctionCall),
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    Between { expr: Box<Expr>, low: Box<Expr>, high: Box<Expr>, negated: bool },
    InList { expr: Box<Expr>, list: Vec<Expr>, negated: bool },
    InSubquery { expr: Box<Expr>, subquery: Box<Statement>, negated: bool },
    Exists(Box<Statement>),
    Subquery(Box<Statement>),
    // CASE [operand] WHEN cond THEN val [...] [ELSE val] END
    Case { operand: Option<Box<Expr>>, branches: Vec<(Expr, Expr)>, else_expr: Option<Box<Expr>> },
    // CAST(expr AS ty) or expr::ty when `shorthand`
    Cast { expr: Box<Expr>, ty: String, shorthand: bool },
    // Parentheses written in the source
    Nested(Box<Expr>),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Expr { Expr::Column(ColumnRef::new(name)) }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Column(ColumnRef::qualified(qualifier, name))
    }

    pub fn string(s: impl Into<String>) -> Expr { Expr::Literal(Literal::String(s.into())) }

    pub fn null() -> Expr { Expr::Literal(Literal::Null) }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn and(left: Expr, right: Expr) -> Expr { Expr::binary(left, BinaryOp::And, right) }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Expr { Expr::Function(FunctionCall::new(name, args)) }

    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { op: UnaryOp::Not, .. } => PREC_NOT,
            Expr::Unary { .. } => PREC_UNARY_MINUS,
            Expr::IsNull { .. } | Expr::Between { .. } | Expr::InList { .. } | Expr::InSubquery { .. } => PREC_COMPARISON,
            Expr::Cast { shorthand: true, .. } => PREC_CAST,
            _ => PREC_ATOM,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }
}

/// Aggregate functions that make an expression unusable in WHERE.
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "count", "sum", "avg", "min", "max", "array_agg", "string_agg", "json_agg", "jsonb_agg",
    "json_object_agg", "jsonb_object_agg", "bool_and", "bool_or", "every", "stddev", "variance",
];

pub fn is_aggregate_function(name: &str) -> bool {
    let base = name.rsplit('.').next().unwrap_or(name);
    AGGREGATE_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(base))
}
