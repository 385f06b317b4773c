use crate::error::SqlResult;
use crate::ident::{is_reserved_keyword, is_simple_name, quote_identifier};
use crate::query::query_common::*;
use crate::query::query_lexer::TokenKind;
use crate::query::query_parse_select::Parser;

// Words that may continue a multi-word type name: double precision, character varying,
// timestamp with time zone.
const TYPE_CONTINUATIONS: &[&str] = &["precision", "varying", "with", "without", "time", "zone"];

// Keywords that introduce a typed string literal: date '2024-01-01'
const TYPED_LITERAL_PREFIXES: &[&str] = &["interval", "date", "timestamp", "time", "timestamptz"];

// Function and type names are stored as written; a part that only reads back
// inside quotes keeps them.
fn written_part(part: String) -> String {
    if is_simple_name(&part) { part } else { quote_identifier(&part, "\"", "\"") }
}

impl<'a> Parser<'a> {
    pub fn parse_expr(&mut self) -> SqlResult<Expr> {
        self.enter()?;
        let e = self.parse_or();
        self.leave();
        e
    }

    fn parse_or(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::and(left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> SqlResult<Expr> {
        if self.eat_keyword("not") {
            self.enter()?;
            let inner = self.parse_not();
            self.leave();
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(inner?) });
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match &self.peek().kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    // Comparison level: binary comparisons and the postfix predicates
    // (IS NULL, LIKE, BETWEEN, IN) all bind tighter than NOT and looser than `||`.
    fn parse_comparison(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_concat()?;
        loop {
            if let Some(op) = self.comparison_op() {
                self.advance();
                let right = self.parse_concat()?;
                left = Expr::binary(left, op, right);
                continue;
            }
            if self.eat_keyword("is") {
                let negated = self.eat_keyword("not");
                self.expect_keyword("null")?;
                left = Expr::IsNull { expr: Box::new(left), negated };
                continue;
            }
            let negated = self.at_keyword("not")
                && ["like", "ilike", "between", "in"].iter().any(|k| self.peek_at(1).is_keyword(k));
            if negated { self.advance(); }
            if self.eat_keyword("like") {
                let right = self.parse_concat()?;
                left = Expr::binary(left, if negated { BinaryOp::NotLike } else { BinaryOp::Like }, right);
                continue;
            }
            if self.eat_keyword("ilike") {
                let right = self.parse_concat()?;
                left = Expr::binary(left, if negated { BinaryOp::NotILike } else { BinaryOp::ILike }, right);
                continue;
            }
            if self.eat_keyword("between") {
                let low = self.parse_concat()?;
                self.expect_keyword("and")?;
                let high = self.parse_concat()?;
                left = Expr::Between { expr: Box::new(left), low: Box::new(low), high: Box::new(high), negated };
                continue;
            }
            if self.eat_keyword("in") {
                let open_pos = self.peek().pos;
                self.expect(TokenKind::LParen, "'(' after IN")?;
                if self.at_query_start() {
                    let subquery = self.parse_statement()?;
                    if !self.eat(&TokenKind::RParen) { return Err(self.error_at(open_pos, "unbalanced parenthesis")); }
                    left = Expr::InSubquery { expr: Box::new(left), subquery: Box::new(subquery), negated };
                    continue;
                }
                if self.at(&TokenKind::RParen) {
                    return Err(self.error_at(open_pos, "IN list must not be empty"));
                }
                let list = self.parse_expr_list()?;
                if !self.eat(&TokenKind::RParen) { return Err(self.error_at(open_pos, "unbalanced parenthesis")); }
                left = Expr::InList { expr: Box::new(left), list, negated };
                continue;
            }
            break;
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Concat => BinaryOp::Concat,
                TokenKind::Arrow => BinaryOp::JsonGet,
                TokenKind::LongArrow => BinaryOp::JsonGetText,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Plus,
                TokenKind::Minus => BinaryOp::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> SqlResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_cast(),
        };
        self.advance();
        self.enter()?;
        let inner = self.parse_unary();
        self.leave();
        Ok(Expr::Unary { op, expr: Box::new(inner?) })
    }

    fn parse_cast(&mut self) -> SqlResult<Expr> {
        let mut e = self.parse_primary()?;
        while self.eat(&TokenKind::DoubleColon) {
            let ty = self.parse_type_name()?;
            e = Expr::Cast { expr: Box::new(e), ty, shorthand: true };
        }
        Ok(e)
    }

    /// Type name as written, with optional modifiers: `numeric(10, 2)`, `double precision`.
    pub(crate) fn parse_type_name(&mut self) -> SqlResult<String> {
        let mut ty = match self.advance().kind {
            TokenKind::Ident(w) => w,
            TokenKind::QuotedIdent(w) => written_part(w),
            _ => {
                self.idx -= 1;
                return Err(self.unexpected("expected type name"));
            }
        };
        while self.eat(&TokenKind::Dot) {
            match self.advance().kind {
                TokenKind::Ident(w) => { ty.push('.'); ty.push_str(&w); }
                TokenKind::QuotedIdent(w) => { ty.push('.'); ty.push_str(&written_part(w)); }
                _ => {
                    self.idx -= 1;
                    return Err(self.unexpected("expected type name"));
                }
            }
        }
        while let TokenKind::Ident(w) = self.peek().kind.clone() {
            if !TYPE_CONTINUATIONS.iter().any(|c| c.eq_ignore_ascii_case(&w)) { break; }
            ty.push(' ');
            ty.push_str(&w);
            self.advance();
        }
        if self.eat(&TokenKind::LParen) {
            let mut mods: Vec<String> = Vec::new();
            loop {
                match self.advance().kind {
                    TokenKind::Number(n) => mods.push(n),
                    _ => {
                        self.idx -= 1;
                        return Err(self.unexpected("expected type modifier"));
                    }
                }
                if !self.eat(&TokenKind::Comma) { break; }
            }
            self.expect(TokenKind::RParen, "')' after type modifiers")?;
            ty.push_str(&format!("({})", mods.join(", ")));
        }
        Ok(ty)
    }

    fn parse_primary(&mut self) -> SqlResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::string(s))
            }
            TokenKind::Param { name, .. } => {
                self.advance();
                Ok(Expr::Param(Param { name, value: None }))
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Wildcard { qualifier: None })
            }
            TokenKind::LParen => {
                self.advance();
                if self.at_query_start() {
                    let stmt = self.parse_statement()?;
                    if !self.eat(&TokenKind::RParen) { return Err(self.error_at(tok.pos, "unbalanced parenthesis")); }
                    return Ok(Expr::Subquery(Box::new(stmt)));
                }
                let inner = self.parse_expr()?;
                if !self.eat(&TokenKind::RParen) { return Err(self.error_at(tok.pos, "unbalanced parenthesis")); }
                Ok(Expr::Nested(Box::new(inner)))
            }
            TokenKind::Ident(ref w) => self.parse_word(w.clone(), tok.pos),
            TokenKind::QuotedIdent(_) => self.parse_name_path(),
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn parse_word(&mut self, word: String, pos: usize) -> SqlResult<Expr> {
        let lower = word.to_ascii_lowercase();
        match lower.as_str() {
            "null" => { self.advance(); return Ok(Expr::null()); }
            "true" => { self.advance(); return Ok(Expr::Literal(Literal::Boolean(true))); }
            "false" => { self.advance(); return Ok(Expr::Literal(Literal::Boolean(false))); }
            "case" => { self.advance(); return self.parse_case(); }
            "cast" => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after CAST")?;
                let expr = self.parse_expr()?;
                self.expect_keyword("as")?;
                let ty = self.parse_type_name()?;
                if !self.eat(&TokenKind::RParen) { return Err(self.error_at(pos, "unbalanced parenthesis")); }
                return Ok(Expr::Cast { expr: Box::new(expr), ty, shorthand: false });
            }
            "exists" => {
                self.advance();
                let open_pos = self.peek().pos;
                self.expect(TokenKind::LParen, "'(' after EXISTS")?;
                let stmt = self.parse_statement()?;
                if !self.eat(&TokenKind::RParen) { return Err(self.error_at(open_pos, "unbalanced parenthesis")); }
                return Ok(Expr::Exists(Box::new(stmt)));
            }
            _ => {}
        }
        if TYPED_LITERAL_PREFIXES.contains(&lower.as_str()) {
            if let TokenKind::String(s) = &self.peek_at(1).kind {
                let value = s.clone();
                self.advance();
                self.advance();
                return Ok(Expr::Literal(Literal::Typed { type_name: lower, value }));
            }
        }
        // left(..)/right(..) are string functions despite being join keywords
        let keyword_function = matches!(lower.as_str(), "left" | "right") && self.peek_at(1).kind == TokenKind::LParen;
        if is_reserved_keyword(&word) && !keyword_function {
            return Err(self.error_at(pos, format!("unexpected keyword {}", word.to_uppercase())));
        }
        self.parse_name_path()
    }

    // name, a.b.c, t.*, or a function call f(..)
    fn parse_name_path(&mut self) -> SqlResult<Expr> {
        let mut parts: Vec<String> = Vec::new();
        match self.advance().kind {
            TokenKind::Ident(w) | TokenKind::QuotedIdent(w) => parts.push(w),
            _ => {
                self.idx -= 1;
                return Err(self.unexpected("expected identifier"));
            }
        }
        while self.at(&TokenKind::Dot) {
            self.advance();
            if self.eat(&TokenKind::Star) {
                return Ok(Expr::Wildcard { qualifier: parts.pop() });
            }
            parts.push(self.parse_identifier("column name")?);
        }
        if self.at(&TokenKind::LParen) {
            let name: Vec<String> = parts.into_iter().map(written_part).collect();
            return self.parse_function_call(name.join("."));
        }
        let name = parts.pop().unwrap_or_default();
        Ok(Expr::Column(ColumnRef { namespaces: parts, name }))
    }

    fn parse_function_call(&mut self, name: String) -> SqlResult<Expr> {
        let open_pos = self.peek().pos;
        self.expect(TokenKind::LParen, "'('")?;
        let mut call = FunctionCall::new(name, Vec::new());
        if !self.at(&TokenKind::RParen) {
            call.distinct = self.eat_keyword("distinct");
            call.args = self.parse_expr_list()?;
        }
        if !self.eat(&TokenKind::RParen) { return Err(self.error_at(open_pos, "unbalanced parenthesis")); }
        if self.at_keyword("filter") && self.peek_at(1).kind == TokenKind::LParen {
            self.advance();
            self.advance();
            self.expect_keyword("where")?;
            let cond = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')' after FILTER")?;
            call.filter = Some(Box::new(cond));
        }
        if self.at_keyword("over") && self.peek_at(1).kind == TokenKind::LParen {
            self.advance();
            self.advance();
            let mut spec = WindowSpec { partition_by: Vec::new(), order_by: Vec::new() };
            if self.eat_keyword("partition") {
                self.expect_keyword("by")?;
                spec.partition_by = self.parse_expr_list()?;
            }
            if self.at_keyword("order") {
                self.advance();
                self.expect_keyword("by")?;
                spec.order_by = self.parse_order_items()?;
            }
            self.expect(TokenKind::RParen, "')' after window specification")?;
            call.over = Some(spec);
        }
        Ok(Expr::Function(call))
    }

    fn parse_case(&mut self) -> SqlResult<Expr> {
        let operand = if self.at_keyword("when") { None } else { Some(Box::new(self.parse_expr()?)) };
        let mut branches: Vec<(Expr, Expr)> = Vec::new();
        while self.eat_keyword("when") {
            let cond = self.parse_expr()?;
            self.expect_keyword("then")?;
            let value = self.parse_expr()?;
            branches.push((cond, value));
        }
        if branches.is_empty() {
            return Err(self.unexpected("expected WHEN"));
        }
        let else_expr = if self.eat_keyword("else") { Some(Box::new(self.parse_expr()?)) } else { None };
        self.expect_keyword("end")?;
        Ok(Expr::Case { operand, branches, else_expr })
    }
}
