//! Tree walking helpers shared by the collectors and injectors.
//! Expression visitors stay inside one expression tree; statement visitors also
//! descend into CTE bodies, FROM subqueries and expression subqueries.

use crate::query::query_common::*;

/// Direct child expressions, not descending into nested statements.
pub fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Column(_) | Expr::Wildcard { .. } | Expr::Literal(_) | Expr::Param(_) => Vec::new(),
        Expr::Exists(_) | Expr::Subquery(_) => Vec::new(),
        Expr::Function(f) => {
            let mut out: Vec<&Expr> = f.args.iter().collect();
            if let Some(filter) = &f.filter { out.push(filter); }
            if let Some(over) = &f.over {
                out.extend(over.partition_by.iter());
                out.extend(over.order_by.iter().map(|o| &o.expr));
            }
            out
        }
        Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } | Expr::Nested(expr) => vec![expr.as_ref()],
        Expr::InSubquery { expr, .. } => vec![expr.as_ref()],
        Expr::Between { expr, low, high, .. } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
        Expr::InList { expr, list, .. } => {
            let mut out = vec![expr.as_ref()];
            out.extend(list.iter());
            out
        }
        Expr::Case { operand, branches, else_expr } => {
            let mut out: Vec<&Expr> = Vec::new();
            if let Some(o) = operand { out.push(o); }
            for (w, t) in branches { out.push(w); out.push(t); }
            if let Some(e) = else_expr { out.push(e); }
            out
        }
    }
}

pub fn expr_children_mut(expr: &mut Expr) -> Vec<&mut Expr> {
    match expr {
        Expr::Column(_) | Expr::Wildcard { .. } | Expr::Literal(_) | Expr::Param(_) => Vec::new(),
        Expr::Exists(_) | Expr::Subquery(_) => Vec::new(),
        Expr::Function(f) => {
            let mut out: Vec<&mut Expr> = f.args.iter_mut().collect();
            if let Some(filter) = &mut f.filter { out.push(filter); }
            if let Some(over) = &mut f.over {
                out.extend(over.partition_by.iter_mut());
                out.extend(over.order_by.iter_mut().map(|o| &mut o.expr));
            }
            out
        }
        Expr::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } | Expr::Nested(expr) => vec![expr.as_mut()],
        Expr::InSubquery { expr, .. } => vec![expr.as_mut()],
        Expr::Between { expr, low, high, .. } => vec![expr.as_mut(), low.as_mut(), high.as_mut()],
        Expr::InList { expr, list, .. } => {
            let mut out = vec![expr.as_mut()];
            out.extend(list.iter_mut());
            out
        }
        Expr::Case { operand, branches, else_expr } => {
            let mut out: Vec<&mut Expr> = Vec::new();
            if let Some(o) = operand { out.push(o); }
            for (w, t) in branches { out.push(w); out.push(t); }
            if let Some(e) = else_expr { out.push(e); }
            out
        }
    }
}

/// Statements nested directly in this expression node.
pub fn expr_statement(expr: &Expr) -> Option<&Statement> {
    match expr {
        Expr::Exists(s) | Expr::Subquery(s) | Expr::InSubquery { subquery: s, .. } => Some(s.as_ref()),
        _ => None,
    }
}

pub fn expr_statement_mut(expr: &mut Expr) -> Option<&mut Statement> {
    match expr {
        Expr::Exists(s) | Expr::Subquery(s) | Expr::InSubquery { subquery: s, .. } => Some(s.as_mut()),
        _ => None,
    }
}

/// Pre-order visit of every node in one expression tree.
pub fn visit_expr<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Expr)) {
    f(expr);
    for child in expr_children(expr) {
        visit_expr(child, f);
    }
}

pub fn visit_expr_mut(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    f(expr);
    for child in expr_children_mut(expr) {
        visit_expr_mut(child, f);
    }
}

/// Top-level expressions of every clause of a query, in clause order.
pub fn query_exprs(q: &Query) -> Vec<&Expr> {
    let mut out: Vec<&Expr> = q.select.iter().map(|s| &s.expr).collect();
    for j in &q.joins {
        if let JoinConstraint::On(e) = &j.constraint { out.push(e); }
    }
    if let Some(w) = &q.where_clause { out.push(w); }
    out.extend(q.group_by.iter());
    if let Some(h) = &q.having { out.push(h); }
    out.extend(q.order_by.iter().map(|o| &o.expr));
    if let Some(l) = &q.limit { out.push(l); }
    if let Some(o) = &q.offset { out.push(o); }
    out
}

pub fn query_exprs_mut(q: &mut Query) -> Vec<&mut Expr> {
    let mut out: Vec<&mut Expr> = q.select.iter_mut().map(|s| &mut s.expr).collect();
    for j in q.joins.iter_mut() {
        if let JoinConstraint::On(e) = &mut j.constraint { out.push(e); }
    }
    if let Some(w) = &mut q.where_clause { out.push(w); }
    out.extend(q.group_by.iter_mut());
    if let Some(h) = &mut q.having { out.push(h); }
    out.extend(q.order_by.iter_mut().map(|o| &mut o.expr));
    if let Some(l) = &mut q.limit { out.push(l); }
    if let Some(o) = &mut q.offset { out.push(o); }
    out
}

/// Statements nested anywhere inside a query: FROM subqueries and expression subqueries.
/// CTEs of the query's own statement are not included.
pub fn query_child_statements(q: &Query) -> Vec<&Statement> {
    let mut out: Vec<&Statement> = Vec::new();
    for source in q.sources() {
        if let TableRef::Subquery { statement, .. } = source { out.push(statement); }
    }
    for e in query_exprs(q) {
        visit_expr(e, &mut |x| {
            if let Some(s) = expr_statement(x) { out.push(s); }
        });
    }
    out
}

fn body_queries<'a>(body: &'a QueryBody, f: &mut dyn FnMut(&'a Query)) {
    match body {
        QueryBody::Select(q) => {
            f(q.as_ref());
            for child in query_child_statements(q) {
                for_each_query(child, f);
            }
        }
        QueryBody::SetOp { left, right, .. } => {
            body_queries(left, f);
            body_queries(right, f);
        }
        QueryBody::Nested(s) => for_each_query(s, f),
    }
}

/// Every `Query` in the statement tree, parents before children, CTEs first.
pub fn for_each_query<'a>(stmt: &'a Statement, f: &mut dyn FnMut(&'a Query)) {
    for cte in stmt.ctes() {
        for_each_query(&cte.statement, f);
    }
    body_queries(&stmt.body, f);
}

fn query_children_mut(q: &mut Query, f: &mut dyn FnMut(&mut Query)) {
    if let Some(TableRef::Subquery { statement, .. }) = &mut q.base_table {
        for_each_query_mut(statement, f);
    }
    for j in q.joins.iter_mut() {
        if let TableRef::Subquery { statement, .. } = &mut j.right {
            for_each_query_mut(statement, f);
        }
    }
    for e in query_exprs_mut(q) {
        visit_expr_mut(e, &mut |x| {
            if let Some(s) = expr_statement_mut(x) { for_each_query_mut(s, &mut *f); }
        });
    }
}

fn body_queries_mut(body: &mut QueryBody, f: &mut dyn FnMut(&mut Query)) {
    match body {
        QueryBody::Select(q) => {
            f(q.as_mut());
            query_children_mut(q, f);
        }
        QueryBody::SetOp { left, right, .. } => {
            body_queries_mut(left, f);
            body_queries_mut(right, f);
        }
        QueryBody::Nested(s) => for_each_query_mut(s, f),
    }
}

pub fn for_each_query_mut(stmt: &mut Statement, f: &mut dyn FnMut(&mut Query)) {
    if let Some(with) = &mut stmt.with {
        for cte in with.ctes.iter_mut() {
            for_each_query_mut(&mut cte.statement, f);
        }
    }
    body_queries_mut(&mut stmt.body, f);
}

/// Every expression node anywhere in the statement, including nested statements.
pub fn for_each_expr_deep<'a>(stmt: &'a Statement, f: &mut dyn FnMut(&'a Expr)) {
    for_each_query(stmt, &mut |q| {
        for e in query_exprs(q) {
            visit_expr(e, &mut *f);
        }
    });
}

pub fn for_each_expr_deep_mut(stmt: &mut Statement, f: &mut dyn FnMut(&mut Expr)) {
    for_each_query_mut(stmt, &mut |q| {
        for e in query_exprs_mut(q) {
            visit_expr_mut(e, &mut *f);
        }
    });
}

/// Visit expressions in the order they appear in rendered SQL text, descending
/// into every nested statement at its textual position.
pub fn visit_statement_in_order<'a>(stmt: &'a Statement, f: &mut dyn FnMut(&'a Expr)) {
    for cte in stmt.ctes() {
        visit_statement_in_order(&cte.statement, f);
    }
    visit_body_in_order(&stmt.body, f);
}

fn visit_body_in_order<'a>(body: &'a QueryBody, f: &mut dyn FnMut(&'a Expr)) {
    match body {
        QueryBody::Select(q) => visit_query_in_order(q, f),
        QueryBody::SetOp { left, right, .. } => {
            visit_body_in_order(left, f);
            visit_body_in_order(right, f);
        }
        QueryBody::Nested(s) => visit_statement_in_order(s, f),
    }
}

fn visit_source_in_order<'a>(source: &'a TableRef, f: &mut dyn FnMut(&'a Expr)) {
    if let TableRef::Subquery { statement, .. } = source {
        visit_statement_in_order(statement, f);
    }
}

fn visit_query_in_order<'a>(q: &'a Query, f: &mut dyn FnMut(&'a Expr)) {
    for item in &q.select {
        visit_expr_in_order(&item.expr, f);
    }
    if let Some(base) = &q.base_table {
        visit_source_in_order(base, f);
    }
    for j in &q.joins {
        visit_source_in_order(&j.right, f);
        if let JoinConstraint::On(e) = &j.constraint { visit_expr_in_order(e, f); }
    }
    let tail = q.where_clause.iter()
        .chain(q.group_by.iter())
        .chain(q.having.iter())
        .chain(q.order_by.iter().map(|o| &o.expr))
        .chain(q.limit.iter())
        .chain(q.offset.iter());
    for e in tail {
        visit_expr_in_order(e, f);
    }
}

pub fn visit_expr_in_order<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Expr)) {
    f(expr);
    for child in expr_children(expr) {
        visit_expr_in_order(child, f);
    }
    if let Some(s) = expr_statement(expr) {
        visit_statement_in_order(s, f);
    }
}

/// Stable identity of a query node for the duration of one borrow-free analysis pass.
pub fn query_id(q: &Query) -> usize {
    q as *const Query as usize
}

pub fn contains_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    visit_expr(expr, &mut |e| {
        if let Expr::Function(f) = e {
            if f.over.is_none() && is_aggregate_function(&f.name) { found = true; }
        }
    });
    found
}

/// True when `expr` calls a window function; its value only exists after
/// WHERE and HAVING have run.
pub fn contains_window(expr: &Expr) -> bool {
    let mut found = false;
    visit_expr(expr, &mut |e| {
        if let Expr::Function(f) = e {
            if f.over.is_some() { found = true; }
        }
    });
    found
}

/// AND `extra` onto an optional existing predicate. OR-rooted operands are
/// parenthesised so the rendered text keeps its meaning.
pub fn and_predicate(existing: Option<Expr>, extra: Expr) -> Expr {
    let wrap_or = |e: Expr| match e {
        Expr::Binary { op: BinaryOp::Or, .. } => Expr::Nested(Box::new(e)),
        other => other,
    };
    match existing {
        None => extra,
        Some(cur) => {
            let right = match extra {
                Expr::Binary { op: BinaryOp::And, .. } | Expr::Binary { op: BinaryOp::Or, .. } => Expr::Nested(Box::new(extra)),
                other => other,
            };
            Expr::and(wrap_or(cur), right)
        }
    }
}
