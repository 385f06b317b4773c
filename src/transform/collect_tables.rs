use crate::ident::ident_eq;
use crate::query::query_common::*;
use crate::transform::collect_columns::CteEnv;
use crate::transform::walk::{expr_statement, query_exprs, visit_expr};

/// A physical table referenced somewhere in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSource {
    pub namespaces: Vec<String>,
    pub name: String,
}

impl TableSource {
    pub fn qualified_name(&self) -> String {
        let mut parts = self.namespaces.clone();
        parts.push(self.name.clone());
        parts.join(".")
    }
}

/// Physical tables reachable from a statement: CTE bodies, FROM subqueries,
/// set-operation branches and expression subqueries included, CTE references
/// excluded. Deduplicated by qualified name, in first-seen order.
#[derive(Debug, Default)]
pub struct TableSourceCollector {
    tables: Vec<TableSource>,
}

impl TableSourceCollector {
    pub fn new() -> Self { Self::default() }

    pub fn collect(mut self, stmt: &Statement) -> Vec<TableSource> {
        self.visit_statement(stmt, &CteEnv::default());
        self.tables
    }

    fn visit_statement<'s>(&mut self, stmt: &'s Statement, outer: &CteEnv<'s>) {
        let env = outer.with_statement(stmt);
        let recursive = stmt.with.as_ref().is_some_and(|w| w.recursive);
        for cte in stmt.ctes() {
            // outside WITH RECURSIVE a body sees only the CTEs declared before it
            match env.find(&cte.name) {
                Some((_, before)) if !recursive => self.visit_statement(&cte.statement, &before),
                _ => self.visit_statement(&cte.statement, &env),
            }
        }
        self.visit_body(&stmt.body, &env);
    }

    fn visit_body<'s>(&mut self, body: &'s QueryBody, env: &CteEnv<'s>) {
        match body {
            QueryBody::Select(q) => self.visit_query(q, env),
            QueryBody::SetOp { left, right, .. } => {
                self.visit_body(left, env);
                self.visit_body(right, env);
            }
            QueryBody::Nested(s) => self.visit_statement(s, env),
        }
    }

    fn visit_query<'s>(&mut self, q: &'s Query, env: &CteEnv<'s>) {
        for source in q.sources() {
            match source {
                TableRef::Subquery { statement, .. } => self.visit_statement(statement, env),
                TableRef::Table { .. } if env.is_cte(source) => {}
                TableRef::Table { namespaces, name, .. } => {
                    self.add(TableSource { namespaces: namespaces.clone(), name: name.clone() });
                }
            }
        }
        let mut nested: Vec<&'s Statement> = Vec::new();
        for e in query_exprs(q) {
            visit_expr(e, &mut |x| {
                if let Some(s) = expr_statement(x) { nested.push(s); }
            });
        }
        for s in nested {
            self.visit_statement(s, env);
        }
    }

    fn add(&mut self, table: TableSource) {
        let qualified = table.qualified_name();
        if !self.tables.iter().any(|t| ident_eq(&t.qualified_name(), &qualified)) {
            self.tables.push(table);
        }
    }
}

pub fn collect_tables(stmt: &Statement) -> Vec<TableSource> {
    TableSourceCollector::new().collect(stmt)
}
