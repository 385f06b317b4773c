use crate::query::query_common::*;
use crate::transform::walk::query_child_statements;

/// Every CTE definition in the tree in the order its name is written: a CTE
/// comes before the CTEs nested inside its own body.
#[derive(Debug, Default)]
pub struct CteCollector<'s> {
    ctes: Vec<&'s Cte>,
}

impl<'s> CteCollector<'s> {
    pub fn new() -> Self { CteCollector { ctes: Vec::new() } }

    pub fn collect(mut self, stmt: &'s Statement) -> Vec<&'s Cte> {
        self.visit_statement(stmt);
        self.ctes
    }

    fn visit_statement(&mut self, stmt: &'s Statement) {
        for cte in stmt.ctes() {
            self.ctes.push(cte);
            self.visit_statement(&cte.statement);
        }
        self.visit_body(&stmt.body);
    }

    fn visit_body(&mut self, body: &'s QueryBody) {
        match body {
            QueryBody::Select(q) => {
                for child in query_child_statements(q) {
                    self.visit_statement(child);
                }
            }
            QueryBody::SetOp { left, right, .. } => {
                self.visit_body(left);
                self.visit_body(right);
            }
            QueryBody::Nested(s) => self.visit_statement(s),
        }
    }
}

pub fn collect_ctes(stmt: &Statement) -> Vec<&Cte> {
    CteCollector::new().collect(stmt)
}
