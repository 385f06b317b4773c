//! SQL rendering
//! -------------
//! Turns a statement tree back into text for one dialect and extracts the bound
//! parameter values in placeholder order. Layout options are purely textual;
//! the rendered statement always parses back to the same tree.

pub mod dialect;
pub mod format_params;
pub mod format_render;


use serde::Serialize;
use tracing::debug;

use crate::error::SqlResult;
use crate::query::query_common::{Expr, Statement};

pub use dialect::{Dialect, DialectConfig, KeywordCase, LineBreak, ParameterStyle};
pub use format_params::Params;
use format_render::SqlRenderer;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedQuery {
    pub sql: String,
    pub params: Params,
}

pub fn format(stmt: &Statement, config: &DialectConfig) -> SqlResult<FormattedQuery> {
    config.validate()?;
    let mut renderer = SqlRenderer::new(config);
    let sql = renderer.render_statement(stmt)?;
    let params = renderer.finish();
    debug!(target: "sqlweave::format", "rendered {} bytes with {} parameter value(s)", sql.len(), params.len());
    Ok(FormattedQuery { sql, params })
}

/// Render a single expression; parameter values are discarded.
pub fn format_expr(expr: &Expr, config: &DialectConfig) -> SqlResult<String> {
    config.validate()?;
    let mut renderer = SqlRenderer::new(config);
    renderer.render_expr(expr)
}

impl Statement {
    pub fn to_sql(&self, dialect: Dialect) -> SqlResult<FormattedQuery> {
        format(self, &dialect.config())
    }
}
