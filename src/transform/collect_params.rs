use serde_json::Value;

use crate::query::query_common::*;
use crate::transform::walk::visit_statement_in_order;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedParam {
    pub name: String,
    // First bound value seen for the name
    pub value: Option<Value>,
    pub occurrences: usize,
}

/// Named parameters in the order they appear in rendered text. Anonymous `?`
/// placeholders are only counted.
#[derive(Debug, Default)]
pub struct ParameterCollector {
    params: Vec<CollectedParam>,
    anonymous: usize,
}

impl ParameterCollector {
    pub fn new() -> Self { Self::default() }

    pub fn collect(mut self, stmt: &Statement) -> Self {
        visit_statement_in_order(stmt, &mut |e| {
            if let Expr::Param(p) = e {
                self.record(p);
            }
        });
        self
    }

    fn record(&mut self, p: &Param) {
        let Some(name) = p.name.as_deref() else {
            self.anonymous += 1;
            return;
        };
        match self.params.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                existing.occurrences += 1;
                if existing.value.is_none() { existing.value = p.value.clone(); }
            }
            None => self.params.push(CollectedParam { name: name.to_string(), value: p.value.clone(), occurrences: 1 }),
        }
    }

    pub fn params(&self) -> &[CollectedParam] { &self.params }

    pub fn anonymous(&self) -> usize { self.anonymous }

    pub fn into_params(self) -> Vec<CollectedParam> { self.params }
}

pub fn collect_params(stmt: &Statement) -> Vec<CollectedParam> {
    ParameterCollector::new().collect(stmt).into_params()
}
