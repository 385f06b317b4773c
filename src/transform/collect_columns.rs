//! Column resolution
//! -----------------
//! Works out which column names can be referenced inside a select's scope and
//! which expression yields each of them. Physical tables are expanded through a
//! `TableSchemaLookup`; CTE references and FROM subqueries through their own
//! output columns. Without a lookup, a table's columns are inferred from the
//! qualified references the query text itself makes.

use tracing::{debug, warn};

use crate::error::{SqlError, SqlResult};
use crate::ident::ident_eq;
use crate::query::query_common::*;
use crate::schema::{lookup_table_columns, TableSchemaLookup};
use crate::transform::walk::{contains_aggregate, query_exprs, visit_expr};

const MAX_CTE_DEPTH: usize = 256;

/// A name referenceable in a scope plus the expression that produces it there.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableColumn {
    pub name: String,
    pub expr: Expr,
}

impl SelectableColumn {
    pub fn is_aggregate(&self) -> bool {
        contains_aggregate(&self.expr)
    }
}

/// Columns one FROM/JOIN source exposes. `inferred` is set when the list was
/// guessed from query text instead of coming from a lookup or a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceColumns {
    pub source: String,
    pub columns: Vec<String>,
    pub inferred: bool,
}

impl SourceColumns {
    pub fn exposes(&self, column: &str) -> bool {
        self.columns.iter().any(|c| ident_eq(c, column))
    }
}

/// Output column names of a statement; `complete` is false when a wildcard
/// could only be expanded by inference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputColumns {
    pub names: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CteEntry<'s> {
    pub cte: &'s Cte,
    // declared in a WITH RECURSIVE clause
    pub recursive: bool,
}

/// CTEs visible at some point of the tree. Later entries shadow earlier ones and a
/// CTE only sees the entries before it.
#[derive(Debug, Clone, Default)]
pub struct CteEnv<'s> {
    ctes: Vec<CteEntry<'s>>,
    depth: usize,
}

impl<'s> CteEnv<'s> {
    pub fn root(stmt: &'s Statement) -> Self {
        CteEnv::default().with_statement(stmt)
    }

    pub fn with_statement(&self, stmt: &'s Statement) -> Self {
        let mut ctes = self.ctes.clone();
        if let Some(with) = &stmt.with {
            ctes.extend(with.ctes.iter().map(|cte| CteEntry { cte, recursive: with.recursive }));
        }
        CteEnv { ctes, depth: self.depth }
    }

    /// The CTE a bare table name refers to and the environment its body sees.
    pub fn find(&self, name: &str) -> Option<(CteEntry<'s>, CteEnv<'s>)> {
        let idx = self.ctes.iter().rposition(|e| ident_eq(&e.cte.name, name))?;
        Some((self.ctes[idx], CteEnv { ctes: self.ctes[..idx].to_vec(), depth: self.depth + 1 }))
    }

    /// The CTE a FROM source refers to, if it is a CTE reference.
    pub fn resolve(&self, source: &TableRef) -> Option<(CteEntry<'s>, CteEnv<'s>)> {
        match source {
            TableRef::Table { namespaces, name, .. } if namespaces.is_empty() => self.find(name),
            _ => None,
        }
    }

    pub fn is_cte(&self, source: &TableRef) -> bool {
        self.resolve(source).is_some()
    }
}

/// The simple select that names a body's output columns, with the CTEs it sees.
pub fn leftmost_scope<'s>(body: &'s QueryBody, env: &CteEnv<'s>) -> Option<(&'s Query, CteEnv<'s>)> {
    match body {
        QueryBody::Select(q) => Some((q.as_ref(), env.clone())),
        QueryBody::SetOp { left, .. } => leftmost_scope(left, env),
        QueryBody::Nested(s) => leftmost_scope(&s.body, &env.with_statement(s)),
    }
}

/// Every simple select of a body reachable through set operations, with its CTE environment.
pub fn leaves_with_env<'s>(body: &'s QueryBody, env: &CteEnv<'s>) -> Vec<(&'s Query, CteEnv<'s>)> {
    match body {
        QueryBody::Select(q) => vec![(q.as_ref(), env.clone())],
        QueryBody::SetOp { left, right, .. } => {
            let mut out = leaves_with_env(left, env);
            out.extend(leaves_with_env(right, env));
            out
        }
        QueryBody::Nested(s) => leaves_with_env(&s.body, &env.with_statement(s)),
    }
}

/// Name a projection item gets when it has no alias: the column name, or the
/// function name for calls.
pub fn implicit_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column(c) => Some(c.name.as_str()),
        Expr::Function(f) => f.name.rsplit('.').next(),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => implicit_name(expr),
        _ => None,
    }
}

fn item_output_name(item: &SelectItem) -> Option<&str> {
    item.alias.as_deref().or_else(|| implicit_name(&item.expr))
}

pub fn scope_label(q: &Query) -> String {
    match &q.base_table {
        Some(t) => format!("select from {}", t.effective_name()),
        None => "select".to_string(),
    }
}

pub struct SelectableColumnCollector<'l> {
    lookup: Option<&'l dyn TableSchemaLookup>,
}

impl<'l> SelectableColumnCollector<'l> {
    pub fn new(lookup: Option<&'l dyn TableSchemaLookup>) -> Self {
        SelectableColumnCollector { lookup }
    }

    /// Columns selectable in the statement's root scope. For a set operation this is
    /// the leftmost select.
    pub fn collect(&self, stmt: &Statement) -> SqlResult<Vec<SelectableColumn>> {
        let env = CteEnv::root(stmt);
        match leftmost_scope(&stmt.body, &env) {
            Some((q, qenv)) => self.collect_query(q, &qenv),
            None => Ok(Vec::new()),
        }
    }

    /// Projection items with a derivable name first, then every source column;
    /// the first occurrence of a name wins.
    pub fn collect_query<'s>(&self, q: &'s Query, env: &CteEnv<'s>) -> SqlResult<Vec<SelectableColumn>> {
        let mut out: Vec<SelectableColumn> = Vec::new();
        fn push(out: &mut Vec<SelectableColumn>, name: &str, expr: Expr) {
            if !out.iter().any(|c| ident_eq(&c.name, name)) {
                out.push(SelectableColumn { name: name.to_string(), expr });
            }
        }
        for item in &q.select {
            if let Some(name) = item.output_name() {
                push(&mut out, name, item.expr.clone());
            }
        }
        let sources = self.source_columns(q, env)?;
        let qualify = sources.len() > 1;
        for src in &sources {
            for c in &src.columns {
                let expr = if qualify { Expr::qualified(src.source.clone(), c.clone()) } else { Expr::column(c.clone()) };
                push(&mut out, c, expr);
            }
        }
        debug!(target: "sqlweave::inject", "{} selectable column(s) in {}", out.len(), scope_label(q));
        Ok(out)
    }

    /// Per-source view of a select's FROM clause, in declaration order.
    pub fn source_columns<'s>(&self, q: &'s Query, env: &CteEnv<'s>) -> SqlResult<Vec<SourceColumns>> {
        q.sources().into_iter().map(|s| self.table_ref_columns(s, q, env)).collect()
    }

    pub fn table_ref_columns<'s>(&self, source: &'s TableRef, q: &'s Query, env: &CteEnv<'s>) -> SqlResult<SourceColumns> {
        let effective = source.effective_name().to_string();
        match source {
            TableRef::Subquery { statement, .. } => {
                let out = self.output_columns(statement, env)?;
                Ok(SourceColumns { source: effective, columns: out.names, inferred: !out.complete })
            }
            TableRef::Table { namespaces, name, .. } => {
                if namespaces.is_empty() {
                    if let Some((entry, cte_env)) = env.find(name) {
                        let out = self.cte_columns(entry.cte, &cte_env)?;
                        return Ok(SourceColumns { source: effective, columns: out.names, inferred: !out.complete });
                    }
                }
                let qualified = source.qualified_name().unwrap_or_else(|| name.clone());
                if let Some(columns) = lookup_table_columns(self.lookup, &qualified, name)? {
                    return Ok(SourceColumns { source: effective, columns, inferred: false });
                }
                let columns = infer_columns(q, source);
                let wildcard = q.select.iter().any(|i| match &i.expr {
                    Expr::Wildcard { qualifier: None } => true,
                    Expr::Wildcard { qualifier: Some(qn) } => ident_eq(qn, &effective),
                    _ => false,
                });
                if wildcard {
                    warn!(target: "sqlweave::inject", "no schema for {}; wildcard expansion inferred {} column(s) from query text", qualified, columns.len());
                } else {
                    debug!(target: "sqlweave::inject", "no schema for {}; inferred {} column(s)", qualified, columns.len());
                }
                Ok(SourceColumns { source: effective, columns, inferred: true })
            }
        }
    }

    pub fn cte_columns<'s>(&self, cte: &'s Cte, env: &CteEnv<'s>) -> SqlResult<OutputColumns> {
        if !cte.columns.is_empty() {
            return Ok(OutputColumns { names: cte.columns.clone(), complete: true });
        }
        self.output_columns(&cte.statement, env)
    }

    /// Output column names of a statement: its leftmost select's projection with
    /// wildcards expanded.
    pub fn output_columns<'s>(&self, stmt: &'s Statement, env: &CteEnv<'s>) -> SqlResult<OutputColumns> {
        if env.depth > MAX_CTE_DEPTH {
            return Err(SqlError::invalid("CTE references nested too deeply to resolve columns"));
        }
        let inner = env.with_statement(stmt);
        let Some((q, qenv)) = leftmost_scope(&stmt.body, &inner) else {
            return Ok(OutputColumns { names: Vec::new(), complete: true });
        };
        let has_wildcard = q.select.iter().any(|i| matches!(i.expr, Expr::Wildcard { .. }));
        let sources = if has_wildcard { self.source_columns(q, &qenv)? } else { Vec::new() };
        let mut out = OutputColumns { names: Vec::new(), complete: true };
        for item in &q.select {
            match &item.expr {
                Expr::Wildcard { qualifier } => {
                    let mut matched = false;
                    for s in sources.iter().filter(|s| qualifier.as_deref().map(|qn| ident_eq(qn, &s.source)).unwrap_or(true)) {
                        matched = true;
                        if s.inferred { out.complete = false; }
                        for c in &s.columns {
                            if !out.names.iter().any(|n| ident_eq(n, c)) { out.names.push(c.clone()); }
                        }
                    }
                    if !matched { out.complete = false; }
                }
                _ => {
                    if let Some(name) = item_output_name(item) {
                        out.names.push(name.to_string());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolve `names` in the statement's root scope; every missing name is reported.
    pub fn require(&self, stmt: &Statement, names: &[String]) -> SqlResult<Vec<SelectableColumn>> {
        let scope = self.collect(stmt)?;
        let label = stmt.body.leftmost().map(scope_label).unwrap_or_else(|| "select".to_string());
        resolve_names(&scope, names, &label)
    }
}

/// Look each name up in `scope`, failing with the full list of unresolved names.
pub fn resolve_names(scope: &[SelectableColumn], names: &[String], label: &str) -> SqlResult<Vec<SelectableColumn>> {
    let mut found: Vec<SelectableColumn> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    for n in names {
        match scope.iter().find(|c| ident_eq(&c.name, n)) {
            Some(c) => found.push(c.clone()),
            None => missing.push(n.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(SqlError::column(missing, label));
    }
    Ok(found)
}

/// Columns a lookup-less table must have, judging by the query text: references
/// qualified by its name, unqualified references when it is the only source
/// (select aliases excluded), and USING columns.
fn infer_columns(q: &Query, source: &TableRef) -> Vec<String> {
    let name = source.effective_name();
    let single = q.joins.is_empty();
    let aliases: Vec<&str> = q.select.iter().filter_map(|i| i.alias.as_deref()).collect();
    let mut out: Vec<String> = Vec::new();
    fn add(out: &mut Vec<String>, c: &str) {
        if !out.iter().any(|o| ident_eq(o, c)) { out.push(c.to_string()); }
    }
    for e in query_exprs(q) {
        visit_expr(e, &mut |x| {
            if let Expr::Column(c) = x {
                match c.qualifier() {
                    Some(qn) if ident_eq(qn, name) => add(&mut out, &c.name),
                    None if single && !aliases.iter().any(|a| ident_eq(a, &c.name)) => add(&mut out, &c.name),
                    _ => {}
                }
            }
        });
    }
    for j in &q.joins {
        if let JoinConstraint::Using(cols) = &j.constraint {
            for c in cols { add(&mut out, c); }
        }
    }
    out
}

/// Columns selectable in the statement's root scope.
pub fn resolve_scope(stmt: &Statement, lookup: Option<&dyn TableSchemaLookup>) -> SqlResult<Vec<SelectableColumn>> {
    SelectableColumnCollector::new(lookup).collect(stmt)
}
