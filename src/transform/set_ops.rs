use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::ident::ident_eq;
use crate::query::query_common::*;

fn has_trailing_clauses(q: &Query) -> bool {
    !q.order_by.is_empty() || q.limit.is_some() || q.offset.is_some()
}

// ORDER BY / LIMIT written after the last select of a chain would apply to
// the whole chain once more operands follow.
fn ends_with_trailing_clauses(body: &QueryBody) -> bool {
    match body {
        QueryBody::Select(q) => has_trailing_clauses(q),
        QueryBody::SetOp { right, .. } => ends_with_trailing_clauses(right),
        QueryBody::Nested(_) => false,
    }
}

fn nested(body: QueryBody) -> QueryBody {
    QueryBody::Nested(Box::new(Statement { with: None, body }))
}

/// Move the statement's CTEs into the shared list and return its bare body.
fn hoist(stmt: Statement, ctes: &mut Vec<Cte>, recursive: &mut bool) -> SqlResult<QueryBody> {
    if let Some(with) = stmt.with {
        *recursive |= with.recursive;
        for cte in with.ctes {
            if ctes.iter().any(|c| ident_eq(&c.name, &cte.name)) {
                return Err(SqlError::DuplicateCte(cte.name));
            }
            ctes.push(cte);
        }
    }
    Ok(stmt.body)
}

/// Left-fold `statements` into one chain of `op`. Every input's CTEs are
/// hoisted into a single WITH clause in input order.
pub fn combine(statements: Vec<Statement>, op: SetOperator) -> SqlResult<Statement> {
    let count = statements.len();
    let mut inputs = statements.into_iter();
    let Some(first) = inputs.next() else {
        return Err(SqlError::invalid("set operation needs at least one statement"));
    };
    if count == 1 {
        return Ok(first);
    }
    let mut ctes: Vec<Cte> = Vec::new();
    let mut recursive = false;
    let mut body = hoist(first, &mut ctes, &mut recursive)?;
    let mixed = matches!(&body, QueryBody::SetOp { op: first_op, .. } if *first_op != op);
    if mixed || ends_with_trailing_clauses(&body) {
        body = nested(body);
    }
    for stmt in inputs {
        let mut right = hoist(stmt, &mut ctes, &mut recursive)?;
        if matches!(right, QueryBody::SetOp { .. }) || ends_with_trailing_clauses(&right) {
            right = nested(right);
        }
        body = QueryBody::SetOp { left: Box::new(body), op, right: Box::new(right) };
    }
    debug!(target: "sqlweave::inject", "combined {} statement(s) with {} hoisted CTE(s)", count, ctes.len());
    let with = if ctes.is_empty() { None } else { Some(WithClause { recursive, ctes }) };
    Ok(Statement { with, body })
}

impl Statement {
    pub fn union(self, other: Statement) -> SqlResult<Statement> {
        combine(vec![self, other], SetOperator::Union)
    }

    pub fn union_all(self, other: Statement) -> SqlResult<Statement> {
        combine(vec![self, other], SetOperator::UnionAll)
    }

    pub fn intersect(self, other: Statement) -> SqlResult<Statement> {
        combine(vec![self, other], SetOperator::Intersect)
    }

    pub fn except(self, other: Statement) -> SqlResult<Statement> {
        combine(vec![self, other], SetOperator::Except)
    }
}
