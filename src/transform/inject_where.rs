//! Predicate injection
//! -------------------
//! Raw predicates are ANDed onto the WHERE clause of every target select.
//! Criteria become one predicate per key with bound parameters; with
//! `upstream` they are pushed into the deepest CTE or subquery that produces
//! the column. All entry points leave the statement untouched on error.

use serde_json::Value;
use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::ident::{ident_eq, is_simple_name};
use crate::query::parse_expression;
use crate::query::query_common::*;
use crate::schema::TableSchemaLookup;
use crate::transform::collect_columns::{
    leaves_with_env, scope_label, CteEnv, SelectableColumn, SelectableColumnCollector,
};
use crate::transform::criteria::{Criteria, CriteriaValue};
use crate::transform::walk::{and_predicate, contains_aggregate, contains_window, for_each_query_mut, query_id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectOptions {
    /// Push each predicate down to the scopes that produce its column.
    pub upstream: bool,
}

/// Parse `raw` as a boolean expression and AND it onto the root select's WHERE,
/// or onto every leaf select of a set operation.
pub fn inject_where(stmt: &mut Statement, raw: &str) -> SqlResult<()> {
    let predicate = parse_expression(raw)?;
    inject_predicate(stmt, predicate);
    Ok(())
}

pub fn inject_predicate(stmt: &mut Statement, predicate: Expr) {
    let leaves = stmt.body.leaves_mut();
    debug!(target: "sqlweave::inject", "injecting predicate into {} select(s)", leaves.len());
    for leaf in leaves {
        leaf.where_clause = Some(and_predicate(leaf.where_clause.take(), predicate.clone()));
    }
}

// A predicate destined for one query node, found during the read-only pass.
struct Placement {
    query: usize,
    predicate: Expr,
    having: bool,
}

/// Parameter name derived from a criteria key; keys that are not simple
/// names are squashed to `[A-Za-z0-9_]`.
fn param_base(key: &str) -> String {
    if is_simple_name(key) {
        return key.to_string();
    }
    let mut out: String = key.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert(0, 'p');
    }
    out
}

fn bound(name: String, value: Value) -> Expr {
    Expr::Param(Param::bound(name, value))
}

/// Predicate for one criteria entry against the column expression.
pub fn criteria_predicate(column: &Expr, key: &str, value: &CriteriaValue) -> SqlResult<Expr> {
    let base = param_base(key);
    let col = || column.clone();
    let pred = match value {
        CriteriaValue::Equals(Value::Null) => Expr::IsNull { expr: Box::new(col()), negated: false },
        CriteriaValue::Equals(v) => Expr::binary(col(), BinaryOp::Eq, bound(base, v.clone())),
        CriteriaValue::Like(p) => Expr::binary(col(), BinaryOp::Like, bound(format!("{}_like", base), Value::String(p.clone()))),
        CriteriaValue::GreaterOrEqual(v) => Expr::binary(col(), BinaryOp::GtEq, bound(format!("{}_min", base), v.clone())),
        CriteriaValue::LessOrEqual(v) => Expr::binary(col(), BinaryOp::LtEq, bound(format!("{}_max", base), v.clone())),
        CriteriaValue::Range { min, max } => match (min, max) {
            (Some(lo), Some(hi)) => Expr::and(
                Expr::binary(col(), BinaryOp::GtEq, bound(format!("{}_min", base), lo.clone())),
                Expr::binary(col(), BinaryOp::LtEq, bound(format!("{}_max", base), hi.clone())),
            ),
            (Some(lo), None) => Expr::binary(col(), BinaryOp::GtEq, bound(format!("{}_min", base), lo.clone())),
            (None, Some(hi)) => Expr::binary(col(), BinaryOp::LtEq, bound(format!("{}_max", base), hi.clone())),
            (None, None) => return Err(SqlError::invalid(format!("criteria '{}' has an empty range", key))),
        },
        CriteriaValue::In(values) => {
            if values.is_empty() {
                return Err(SqlError::invalid(format!("criteria '{}' has an empty IN list", key)));
            }
            let list = values
                .iter()
                .enumerate()
                .map(|(i, v)| bound(format!("{}_in_{}", base, i), v.clone()))
                .collect();
            Expr::InList { expr: Box::new(col()), list, negated: false }
        }
        CriteriaValue::Omitted => return Err(SqlError::invalid(format!("criteria '{}' is omitted", key))),
    };
    Ok(pred)
}

struct Injector<'l> {
    collector: SelectableColumnCollector<'l>,
    upstream: bool,
}

impl<'l> Injector<'l> {
    /// Resolve `key` inside one leaf select. Non-leftmost leaves of a set
    /// operation map output columns by position.
    fn resolve_in_leaf<'s>(
        &self,
        leaf: &'s Query,
        env: &CteEnv<'s>,
        key: &str,
        position: Option<usize>,
    ) -> SqlResult<Option<SelectableColumn>> {
        if let Some(p) = position {
            if let Some(item) = leaf.select.get(p) {
                if !matches!(item.expr, Expr::Wildcard { .. }) {
                    return Ok(Some(SelectableColumn { name: key.to_string(), expr: item.expr.clone() }));
                }
            }
        }
        let scope = self.collector.collect_query(leaf, env)?;
        Ok(scope.into_iter().find(|c| ident_eq(&c.name, key)))
    }

    /// Record where the predicate for `column` lands, descending into the
    /// producing CTE or subquery when pushing upstream.
    fn place<'s>(
        &self,
        q: &'s Query,
        env: &CteEnv<'s>,
        column: &SelectableColumn,
        key: &str,
        value: &CriteriaValue,
        out: &mut Vec<Placement>,
    ) -> SqlResult<()> {
        if contains_window(&column.expr) {
            return Err(SqlError::column(
                vec![key.to_string()],
                format!("{} (window function results cannot be filtered in the same select)", scope_label(q)),
            ));
        }
        let aggregate = contains_aggregate(&column.expr);
        if self.upstream && !aggregate {
            if let Some(inner) = self.push_down(q, env, column, key, value)? {
                out.extend(inner);
                return Ok(());
            }
        }
        let predicate = criteria_predicate(&column.expr, key, value)?;
        out.push(Placement { query: query_id(q), predicate, having: aggregate });
        Ok(())
    }

    // Placements inside the source producing `column`, or None to keep the predicate at `q`.
    fn push_down<'s>(
        &self,
        q: &'s Query,
        env: &CteEnv<'s>,
        column: &SelectableColumn,
        key: &str,
        value: &CriteriaValue,
    ) -> SqlResult<Option<Vec<Placement>>> {
        let Expr::Column(cref) = &column.expr else { return Ok(None) };
        let source = match cref.qualifier() {
            Some(qn) => q.find_source(qn),
            None => {
                let sources = q.sources();
                if sources.len() == 1 {
                    Some(sources[0])
                } else {
                    let exposing: Vec<String> = self
                        .collector
                        .source_columns(q, env)?
                        .into_iter()
                        .filter(|s| s.exposes(&cref.name))
                        .map(|s| s.source)
                        .collect();
                    if exposing.len() == 1 { q.find_source(&exposing[0]) } else { None }
                }
            }
        };
        let Some(source) = source else { return Ok(None) };

        // the statement producing the source's rows, its environment, and the
        // position of the column when the CTE renames its outputs
        let (inner, inner_env, position): (&'s Statement, CteEnv<'s>, Option<usize>) = match source {
            TableRef::Subquery { statement, .. } => (statement.as_ref(), env.clone(), None),
            TableRef::Table { .. } => match env.resolve(source) {
                Some((entry, cte_env)) if !entry.recursive => {
                    let pos = if entry.cte.columns.is_empty() {
                        None
                    } else {
                        match entry.cte.columns.iter().position(|c| ident_eq(c, &cref.name)) {
                            Some(p) => Some(p),
                            None => return Ok(None),
                        }
                    };
                    (entry.cte.statement.as_ref(), cte_env, pos)
                }
                _ => return Ok(None),
            },
        };

        let scoped_env = inner_env.with_statement(inner);
        let leaves = leaves_with_env(&inner.body, &scoped_env);
        let leaf_count = leaves.len();
        // positional mapping for the non-leftmost leaves of a set operation
        let output_pos = match position {
            Some(p) => Some(p),
            None if leaf_count > 1 => {
                let names = self.collector.output_columns(inner, &inner_env)?.names;
                names.iter().position(|n| ident_eq(n, &cref.name))
            }
            None => None,
        };
        let mut placed: Vec<Placement> = Vec::new();
        for (i, (leaf, leaf_env)) in leaves.into_iter().enumerate() {
            // rows past a LIMIT would change if filtered earlier
            if leaf.limit.is_some() || leaf.offset.is_some() {
                return Ok(None);
            }
            let pos = if i == 0 && position.is_none() { None } else { output_pos };
            match self.resolve_in_leaf(leaf, &leaf_env, &cref.name, pos)? {
                Some(inner_col) if !contains_window(&inner_col.expr) => {
                    self.place(leaf, &leaf_env, &inner_col, key, value, &mut placed)?
                }
                _ => return Ok(None),
            }
        }
        debug!(target: "sqlweave::inject", "pushed criteria '{}' below {}", key, scope_label(q));
        Ok(Some(placed))
    }
}

/// Inject one predicate per non-omitted criteria entry. Every key must name a
/// column selectable in the statement's root scope.
pub fn inject_criteria(
    stmt: &mut Statement,
    criteria: &Criteria,
    options: &InjectOptions,
    lookup: Option<&dyn TableSchemaLookup>,
) -> SqlResult<()> {
    let active = criteria.active();
    if active.is_empty() {
        debug!(target: "sqlweave::inject", "criteria empty; statement unchanged");
        return Ok(());
    }
    let injector = Injector { collector: SelectableColumnCollector::new(lookup), upstream: options.upstream };
    let keys: Vec<String> = active.iter().map(|(k, _)| k.clone()).collect();
    injector.collector.require(stmt, &keys)?;

    let mut work = stmt.clone();
    let mut placements: Vec<Placement> = Vec::new();
    {
        let env = CteEnv::root(&work);
        let leaves = leaves_with_env(&work.body, &env);
        let root_names = if leaves.len() > 1 {
            injector.collector.output_columns(&work, &CteEnv::default())?.names
        } else {
            Vec::new()
        };
        for (key, value) in &active {
            let position = root_names.iter().position(|n| ident_eq(n, key));
            for (i, (leaf, leaf_env)) in leaves.iter().enumerate() {
                let pos = if i == 0 { None } else { position };
                let column = match injector.resolve_in_leaf(leaf, leaf_env, key, pos)? {
                    Some(c) => c,
                    None => return Err(SqlError::column(vec![key.clone()], scope_label(leaf))),
                };
                injector.place(leaf, leaf_env, &column, key, value, &mut placements)?;
            }
        }
    }

    // one predicate per (query, text) even when several paths reach a shared CTE
    let mut seen: Vec<(usize, Expr)> = Vec::new();
    placements.retain(|p| {
        if seen.iter().any(|(q, e)| *q == p.query && e == &p.predicate) { return false; }
        seen.push((p.query, p.predicate.clone()));
        true
    });
    let ids: Vec<usize> = placements.iter().map(|p| p.query).collect();
    for_each_query_mut(&mut work, &mut |q| {
        let id = query_id(q);
        if !ids.contains(&id) { return; }
        for p in placements.iter().filter(|p| p.query == id) {
            if p.having {
                q.having = Some(and_predicate(q.having.take(), p.predicate.clone()));
            } else {
                q.where_clause = Some(and_predicate(q.where_clause.take(), p.predicate.clone()));
            }
        }
    });
    debug!(target: "sqlweave::inject", "injected {} criteria predicate(s)", placements.len());
    *stmt = work;
    Ok(())
}
