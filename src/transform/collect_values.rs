use crate::error::SqlResult;
use crate::format::{format_expr, DialectConfig};
use crate::ident::ident_eq;
use crate::query::query_common::*;
use crate::schema::TableSchemaLookup;
use crate::transform::collect_columns::{implicit_name, leftmost_scope, CteEnv, SelectableColumnCollector};

/// Name given to a projection item that has neither an alias nor a derivable name.
pub const UNNAMED_COLUMN: &str = "?column?";

/// One projection item: its output name and its expression as SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectValue {
    pub name: String,
    pub value: String,
}

/// The root select's own projection list. Wildcards are expanded through the
/// lookup when one is given and the source's columns are known; otherwise they
/// are reported as written.
pub struct SelectValueCollector<'l> {
    lookup: Option<&'l dyn TableSchemaLookup>,
    config: DialectConfig,
}

impl<'l> SelectValueCollector<'l> {
    pub fn new(lookup: Option<&'l dyn TableSchemaLookup>) -> Self {
        SelectValueCollector { lookup, config: DialectConfig::generic() }
    }

    pub fn with_dialect(mut self, config: DialectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn collect(&self, stmt: &Statement) -> SqlResult<Vec<SelectValue>> {
        let env = CteEnv::root(stmt);
        let Some((q, qenv)) = leftmost_scope(&stmt.body, &env) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<SelectValue> = Vec::with_capacity(q.select.len());
        for item in &q.select {
            if let Expr::Wildcard { qualifier } = &item.expr {
                if self.lookup.is_some() && self.expand(q, &qenv, qualifier.as_deref(), &mut out)? {
                    continue;
                }
            }
            let name = item
                .alias
                .as_deref()
                .or_else(|| implicit_name(&item.expr))
                .or(match &item.expr { Expr::Wildcard { .. } => Some("*"), _ => None })
                .unwrap_or(UNNAMED_COLUMN);
            out.push(SelectValue { name: name.to_string(), value: format_expr(&item.expr, &self.config)? });
        }
        Ok(out)
    }

    // false when some matching source's columns are unknown
    fn expand<'s>(&self, q: &'s Query, env: &CteEnv<'s>, qualifier: Option<&str>, out: &mut Vec<SelectValue>) -> SqlResult<bool> {
        let sources = SelectableColumnCollector::new(self.lookup).source_columns(q, env)?;
        let matching: Vec<_> = sources
            .iter()
            .filter(|s| qualifier.map(|qn| ident_eq(qn, &s.source)).unwrap_or(true))
            .collect();
        if matching.is_empty() || matching.iter().any(|s| s.inferred) {
            return Ok(false);
        }
        let qualify = qualifier.is_some() || sources.len() > 1;
        for s in matching {
            for c in &s.columns {
                let expr = if qualify { Expr::qualified(s.source.clone(), c.clone()) } else { Expr::column(c.clone()) };
                out.push(SelectValue { name: c.clone(), value: format_expr(&expr, &self.config)? });
            }
        }
        Ok(true)
    }
}

pub fn collect_values(stmt: &Statement, lookup: Option<&dyn TableSchemaLookup>) -> SqlResult<Vec<SelectValue>> {
    SelectValueCollector::new(lookup).collect(stmt)
}
