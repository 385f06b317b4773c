use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::ident::{ident_eq, is_reserved_keyword};
use crate::query::query_common::*;
use crate::query::query_lexer::{Token, TokenKind};

// Nesting limit for parenthesised expressions and subqueries.
const MAX_DEPTH: usize = 64;

/// Recursive-descent parser over a token vector produced by `tokenize`.
/// Clause parsing lives here; select-list and expression parsing are split into
/// sibling files as additional `impl Parser` blocks.
pub struct Parser<'a> {
    pub(crate) src: &'a str,
    pub(crate) tokens: Vec<Token>,
    pub(crate) idx: usize,
    pub(crate) depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Parser { src, tokens, idx: 0, depth: 0 }
    }

    // ---- token helpers ----

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.idx.min(last)]
    }

    pub(crate) fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.idx + ahead).min(last)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.idx < self.tokens.len() { self.idx += 1; }
        t
    }

    pub(crate) fn at_keyword(&self, kw: &str) -> bool { self.peek().is_keyword(kw) }

    pub(crate) fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) { self.idx += 1; true } else { false }
    }

    pub(crate) fn expect_keyword(&mut self, kw: &str) -> SqlResult<()> {
        if self.eat_keyword(kw) { return Ok(()); }
        Err(self.unexpected(&format!("expected {}", kw.to_uppercase())))
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool { &self.peek().kind == kind }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) { self.idx += 1; true } else { false }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> SqlResult<()> {
        if self.eat(&kind) { return Ok(()); }
        Err(self.unexpected(&format!("expected {}", what)))
    }

    pub(crate) fn error_at(&self, pos: usize, msg: impl Into<String>) -> SqlError {
        SqlError::syntax(self.src, pos, msg)
    }

    pub(crate) fn unexpected(&self, context: &str) -> SqlError {
        let t = self.peek();
        self.error_at(t.pos, format!("{} but found {}", context, t.describe()))
    }

    pub(crate) fn enter(&mut self) -> SqlResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_at(self.peek().pos, "statement nested too deeply"));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) { self.depth = self.depth.saturating_sub(1); }

    /// Identifier usable as a name: quoted, or a bare word that is not reserved.
    pub(crate) fn at_identifier(&self) -> bool {
        match &self.peek().kind {
            TokenKind::QuotedIdent(_) => true,
            TokenKind::Ident(w) => !is_reserved_keyword(w),
            _ => false,
        }
    }

    pub(crate) fn parse_identifier(&mut self, what: &str) -> SqlResult<String> {
        if !self.at_identifier() {
            return Err(self.unexpected(&format!("expected {}", what)));
        }
        match self.advance().kind {
            TokenKind::Ident(w) | TokenKind::QuotedIdent(w) => Ok(w),
            _ => Err(self.unexpected(&format!("expected {}", what))),
        }
    }

    pub(crate) fn parse_identifier_list(&mut self, what: &str) -> SqlResult<Vec<String>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut out = vec![self.parse_identifier(what)?];
        while self.eat(&TokenKind::Comma) {
            out.push(self.parse_identifier(what)?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(out)
    }

    /// `[AS] alias` after a table source or projection.
    pub(crate) fn parse_optional_alias(&mut self) -> SqlResult<Option<String>> {
        if self.eat_keyword("as") {
            return self.parse_identifier("alias after AS").map(Some);
        }
        if self.at_identifier() {
            return self.parse_identifier("alias").map(Some);
        }
        Ok(None)
    }

    pub(crate) fn at_query_start(&self) -> bool {
        self.at_keyword("select") || self.at_keyword("with")
    }

    // ---- statements ----

    /// Parse a full statement and require that nothing but an optional `;` follows.
    pub fn parse_complete_statement(&mut self) -> SqlResult<Statement> {
        let stmt = self.parse_statement()?;
        self.eat(&TokenKind::Semicolon);
        if !self.at(&TokenKind::Eof) {
            let t = self.peek();
            let msg = if t.kind == TokenKind::RParen {
                "unbalanced parenthesis".to_string()
            } else {
                format!("unexpected {} after end of statement", t.describe())
            };
            return Err(self.error_at(t.pos, msg));
        }
        Ok(stmt)
    }

    pub fn parse_statement(&mut self) -> SqlResult<Statement> {
        self.enter()?;
        let with = if self.at_keyword("with") { Some(self.parse_with_clause()?) } else { None };
        let body = self.parse_query_body()?;
        self.leave();
        Ok(Statement { with, body })
    }

    fn parse_with_clause(&mut self) -> SqlResult<WithClause> {
        self.expect_keyword("with")?;
        let recursive = self.eat_keyword("recursive");
        let mut ctes: Vec<Cte> = Vec::new();
        loop {
            let name_pos = self.peek().pos;
            let name = self.parse_identifier("CTE name")?;
            if ctes.iter().any(|c| ident_eq(&c.name, &name)) {
                return Err(self.error_at(name_pos, format!("duplicate CTE name '{}'", name)));
            }
            let columns = if self.at(&TokenKind::LParen) { self.parse_identifier_list("CTE column name")? } else { Vec::new() };
            self.expect_keyword("as")?;
            self.expect(TokenKind::LParen, "'(' before CTE body")?;
            let statement = self.parse_statement()?;
            self.expect(TokenKind::RParen, "')' after CTE body")?;
            debug!(target: "sqlweave::parse", "parsed CTE '{}' ({} declared columns)", name, columns.len());
            ctes.push(Cte { name, columns, statement: Box::new(statement) });
            if !self.eat(&TokenKind::Comma) { break; }
        }
        Ok(WithClause { recursive, ctes })
    }

    fn parse_set_operator(&mut self) -> Option<SetOperator> {
        if self.eat_keyword("union") {
            if self.eat_keyword("all") { return Some(SetOperator::UnionAll); }
            self.eat_keyword("distinct");
            return Some(SetOperator::Union);
        }
        if self.eat_keyword("intersect") { return Some(SetOperator::Intersect); }
        if self.eat_keyword("except") { return Some(SetOperator::Except); }
        None
    }

    // All set operators share one precedence level and associate to the left.
    fn parse_query_body(&mut self) -> SqlResult<QueryBody> {
        let mut body = self.parse_query_term()?;
        while let Some(op) = self.parse_set_operator() {
            let right = self.parse_query_term()?;
            body = QueryBody::SetOp { left: Box::new(body), op, right: Box::new(right) };
        }
        Ok(body)
    }

    fn parse_query_term(&mut self) -> SqlResult<QueryBody> {
        if self.at(&TokenKind::LParen) {
            let open = self.advance();
            if !self.at_query_start() && !self.at(&TokenKind::LParen) {
                return Err(self.unexpected("expected SELECT"));
            }
            let inner = self.parse_statement()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(self.error_at(open.pos, "unbalanced parenthesis"));
            }
            return Ok(QueryBody::Nested(Box::new(inner)));
        }
        Ok(QueryBody::Select(Box::new(self.parse_select_core()?)))
    }

    fn parse_select_core(&mut self) -> SqlResult<Query> {
        self.expect_keyword("select")?;
        let distinct = if self.eat_keyword("distinct") { true } else { self.eat_keyword("all"); false };
        let select = self.parse_select_list()?;
        let mut q = Query::new(select);
        q.distinct = distinct;
        if self.eat_keyword("from") {
            self.parse_from_list(&mut q)?;
        }
        if self.eat_keyword("where") {
            q.where_clause = Some(self.parse_expr()?);
        }
        if self.at_keyword("group") {
            self.advance();
            self.expect_keyword("by")?;
            q.group_by = self.parse_expr_list()?;
        }
        if self.eat_keyword("having") {
            q.having = Some(self.parse_expr()?);
        }
        if self.at_keyword("order") {
            self.advance();
            self.expect_keyword("by")?;
            q.order_by = self.parse_order_items()?;
        }
        // LIMIT and OFFSET are accepted in either order
        loop {
            if q.limit.is_none() && self.eat_keyword("limit") {
                q.limit = Some(self.parse_expr()?);
                continue;
            }
            if q.offset.is_none() && self.eat_keyword("offset") {
                q.offset = Some(self.parse_expr()?);
                self.eat_keyword("rows");
                continue;
            }
            break;
        }
        Ok(q)
    }

    // ---- FROM / JOIN ----

    fn parse_from_list(&mut self, q: &mut Query) -> SqlResult<()> {
        let mut seen: Vec<String> = Vec::new();
        let first_pos = self.peek().pos;
        let base = self.parse_table_ref()?;
        self.register_source(&mut seen, &base, first_pos)?;
        q.base_table = Some(base);
        loop {
            let pos = self.peek().pos;
            if self.eat(&TokenKind::Comma) {
                let src_pos = self.peek().pos;
                let right = self.parse_table_ref()?;
                self.register_source(&mut seen, &right, src_pos)?;
                q.joins.push(JoinClause { join_type: JoinType::Comma, right, constraint: JoinConstraint::None });
                continue;
            }
            let join_type = match self.parse_join_keyword()? {
                Some(jt) => jt,
                None => break,
            };
            let src_pos = self.peek().pos;
            let right = self.parse_table_ref()?;
            self.register_source(&mut seen, &right, src_pos)?;
            let constraint = if join_type == JoinType::Cross {
                JoinConstraint::None
            } else if self.eat_keyword("on") {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.eat_keyword("using") {
                JoinConstraint::Using(self.parse_identifier_list("USING column")?)
            } else {
                return Err(self.error_at(pos, "JOIN requires ON or USING"));
            };
            q.joins.push(JoinClause { join_type, right, constraint });
        }
        Ok(())
    }

    fn register_source(&self, seen: &mut Vec<String>, source: &TableRef, pos: usize) -> SqlResult<()> {
        let name = source.effective_name().to_string();
        if seen.iter().any(|s| ident_eq(s, &name)) {
            return Err(self.error_at(pos, format!("table name \"{}\" specified more than once", name)));
        }
        seen.push(name);
        Ok(())
    }

    fn parse_join_keyword(&mut self) -> SqlResult<Option<JoinType>> {
        let jt = if self.at_keyword("join") {
            JoinType::Inner
        } else if self.at_keyword("inner") {
            self.advance();
            JoinType::Inner
        } else if self.at_keyword("left") || self.at_keyword("right") || self.at_keyword("full") {
            let t = self.advance();
            self.eat_keyword("outer");
            if t.is_keyword("left") { JoinType::Left } else if t.is_keyword("right") { JoinType::Right } else { JoinType::Full }
        } else if self.at_keyword("cross") {
            self.advance();
            JoinType::Cross
        } else {
            return Ok(None);
        };
        self.expect_keyword("join")?;
        Ok(Some(jt))
    }

    fn parse_table_ref(&mut self) -> SqlResult<TableRef> {
        if self.at(&TokenKind::LParen) {
            let open = self.advance();
            if !self.at_query_start() && !self.at(&TokenKind::LParen) {
                return Err(self.unexpected("expected subquery"));
            }
            let statement = self.parse_statement()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(self.error_at(open.pos, "unbalanced parenthesis"));
            }
            let alias_pos = self.peek().pos;
            let alias = match self.parse_optional_alias()? {
                Some(a) => a,
                None => return Err(self.error_at(alias_pos, "subquery in FROM must have an alias")),
            };
            return Ok(TableRef::Subquery { statement: Box::new(statement), alias });
        }
        let mut parts = vec![self.parse_identifier("table name")?];
        while self.eat(&TokenKind::Dot) {
            parts.push(self.parse_identifier("table name")?);
        }
        let name = parts.pop().unwrap_or_default();
        let alias = self.parse_optional_alias()?;
        Ok(TableRef::Table { namespaces: parts, name, alias })
    }
}
