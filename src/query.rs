//! SQL SELECT parsing
//! -----------------
//! Text goes through `query_lexer::tokenize` and then a recursive-descent
//! `Parser` whose clause, select-list and expression rules live in the
//! `query_parse_*` files. The statement tree types are in `query_common`.

pub mod query_common;
pub mod query_lexer;
pub mod query_parse_select;
pub mod query_parse_select_list;
pub mod query_parse_expr;


use std::str::FromStr;

use tracing::debug;

use crate::error::{SqlError, SqlResult};
use query_lexer::{tokenize, TokenKind};
use query_parse_select::Parser;

pub use query_common::*;

/// Parse one SELECT statement (optionally WITH-prefixed, optionally a chain of
/// set operations). A single trailing `;` is allowed; anything else after the
/// statement is a syntax error.
pub fn parse(text: &str) -> SqlResult<Statement> {
    debug!(target: "sqlweave::parse", "parse: {} bytes", text.len());
    let tokens = tokenize(text)?;
    if tokens.first().map(|t| t.kind == TokenKind::Eof).unwrap_or(true) {
        return Err(SqlError::syntax(text, 0, "empty statement"));
    }
    let mut parser = Parser::new(text, tokens);
    let stmt = parser.parse_complete_statement()?;
    debug!(target: "sqlweave::parse", "parsed statement with {} CTE(s)", stmt.ctes().len());
    Ok(stmt)
}

/// Same result as [`parse`]; yields to the runtime once before doing the work so
/// callers on a busy executor do not monopolise a worker.
pub async fn parse_async(text: &str) -> SqlResult<Statement> {
    tokio::task::yield_now().await;
    parse(text)
}

/// Parse a standalone scalar or boolean expression such as `o.order_id IS NULL`.
pub fn parse_expression(text: &str) -> SqlResult<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(text, tokens);
    if parser.at(&TokenKind::Eof) {
        return Err(SqlError::syntax(text, 0, "empty expression"));
    }
    let expr = parser.parse_expr()?;
    if !parser.at(&TokenKind::Eof) {
        let t = parser.peek();
        let msg = if t.kind == TokenKind::RParen {
            "unbalanced parenthesis".to_string()
        } else {
            format!("unexpected {} after expression", t.describe())
        };
        return Err(SqlError::syntax(text, t.pos, msg));
    }
    Ok(expr)
}

impl FromStr for Statement {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
