use crate::error::SqlResult;
use crate::format::dialect::{DialectConfig, KeywordCase, LineBreak};
use crate::format::format_params::{ParamSink, Params};
use crate::ident::{is_plain_identifier, is_simple_name, quote_identifier, split_qualified};
use crate::query::query_common::*;

/// Single-pass renderer from statement tree to SQL text. Parameter values are
/// pushed into the sink in exactly the order their placeholders are written.
pub struct SqlRenderer<'c> {
    config: &'c DialectConfig,
    sink: ParamSink,
    depth: usize,
}

impl<'c> SqlRenderer<'c> {
    pub fn new(config: &'c DialectConfig) -> Self {
        SqlRenderer { config, sink: ParamSink::new(config.parameter_style, &config.parameter_symbol), depth: 0 }
    }

    pub fn finish(self) -> Params {
        self.sink.finish()
    }

    fn kw(&self, word: &str) -> String {
        match self.config.keyword_case {
            KeywordCase::Upper => word.to_ascii_uppercase(),
            KeywordCase::Lower => word.to_ascii_lowercase(),
        }
    }

    fn ident(&self, name: &str) -> String {
        match &self.config.identifier_quote {
            Some((open, close)) => quote_identifier(name, open, close),
            None if is_plain_identifier(name) => name.to_string(),
            None => quote_identifier(name, "\"", "\""),
        }
    }

    // Builtins stay bare whatever the dialect; only parts that need quotes get them.
    fn function_name(&self, name: &str) -> String {
        let parts: Vec<String> = split_qualified(name)
            .into_iter()
            .map(|p| if is_simple_name(&p) { p } else { self.ident(&p) })
            .collect();
        parts.join(".")
    }

    fn multiline(&self) -> bool {
        self.config.newline.contains('\n')
    }

    fn nl_at(&self, depth: usize) -> String {
        if self.multiline() {
            format!("{}{}", self.config.newline, self.config.indent.repeat(depth))
        } else {
            self.config.newline.clone()
        }
    }

    fn nl(&self) -> String {
        self.nl_at(self.depth)
    }

    fn separator(&self, brk: LineBreak, word: &str) -> String {
        let word = word.trim();
        match brk {
            LineBreak::None if word == "," => ", ".to_string(),
            LineBreak::None => format!(" {} ", word),
            LineBreak::After => format!(" {}{}", word, self.nl_at(self.depth + 1)).replacen(" ,", ",", 1),
            LineBreak::Before => format!("{}{} ", self.nl_at(self.depth + 1), word),
        }
    }

    /// Parenthesised statement one level deeper.
    fn block(&mut self, stmt: &Statement) -> SqlResult<String> {
        self.depth += 1;
        let inner = self.render_statement(stmt);
        self.depth -= 1;
        let inner = inner?;
        if self.multiline() {
            Ok(format!("({}{}{})", self.nl_at(self.depth + 1), inner, self.nl()))
        } else {
            Ok(format!("({})", inner))
        }
    }

    pub fn render_statement(&mut self, stmt: &Statement) -> SqlResult<String> {
        let mut out = String::new();
        if let Some(with) = &stmt.with {
            out.push_str(&self.kw("with"));
            if with.recursive {
                out.push(' ');
                out.push_str(&self.kw("recursive"));
            }
            let mut defs: Vec<String> = Vec::with_capacity(with.ctes.len());
            for cte in &with.ctes {
                let mut def = self.ident(&cte.name);
                if !cte.columns.is_empty() {
                    let cols: Vec<String> = cte.columns.iter().map(|c| self.ident(c)).collect();
                    def.push_str(&format!(" ({})", cols.join(", ")));
                }
                def.push(' ');
                def.push_str(&self.kw("as"));
                def.push(' ');
                def.push_str(&self.block(&cte.statement)?);
                defs.push(def);
            }
            out.push(' ');
            out.push_str(&defs.join(&format!(",{}", self.nl())));
            out.push_str(&self.nl());
        }
        out.push_str(&self.render_body(&stmt.body)?);
        Ok(out)
    }

    fn render_body(&mut self, body: &QueryBody) -> SqlResult<String> {
        match body {
            QueryBody::Select(q) => self.render_query(q),
            QueryBody::SetOp { left, op, right } => {
                let l = self.render_body(left)?;
                let r = self.render_body(right)?;
                let nl = self.nl();
                Ok(format!("{}{}{}{}{}", l, nl, self.kw(op.keyword()), nl, r))
            }
            QueryBody::Nested(s) => self.block(s),
        }
    }

    fn render_query(&mut self, q: &Query) -> SqlResult<String> {
        let mut out = self.kw("select");
        if q.distinct {
            out.push(' ');
            out.push_str(&self.kw("distinct"));
        }
        let mut items: Vec<String> = Vec::with_capacity(q.select.len());
        for item in &q.select {
            let mut s = self.render_expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                s.push_str(&format!(" {} {}", self.kw("as"), self.ident(alias)));
            }
            items.push(s);
        }
        out.push(' ');
        out.push_str(&items.join(&self.separator(self.config.comma_break, ",")));

        if let Some(base) = &q.base_table {
            out.push_str(&self.nl());
            out.push_str(&self.kw("from"));
            out.push(' ');
            out.push_str(&self.render_table(base)?);
            for join in &q.joins {
                out.push_str(&self.render_join(join)?);
            }
        }
        if let Some(w) = &q.where_clause {
            out.push_str(&self.nl());
            out.push_str(&self.kw("where"));
            out.push(' ');
            out.push_str(&self.render_predicate(w)?);
        }
        if !q.group_by.is_empty() {
            out.push_str(&self.nl());
            out.push_str(&self.kw("group by"));
            out.push(' ');
            out.push_str(&self.render_list(&q.group_by)?);
        }
        if let Some(h) = &q.having {
            out.push_str(&self.nl());
            out.push_str(&self.kw("having"));
            out.push(' ');
            out.push_str(&self.render_predicate(h)?);
        }
        if !q.order_by.is_empty() {
            out.push_str(&self.nl());
            out.push_str(&self.kw("order by"));
            out.push(' ');
            out.push_str(&self.render_order(&q.order_by)?);
        }
        if let Some(l) = &q.limit {
            out.push_str(&self.nl());
            out.push_str(&self.kw("limit"));
            out.push(' ');
            out.push_str(&self.render_expr(l)?);
        }
        if let Some(o) = &q.offset {
            out.push_str(&self.nl());
            out.push_str(&self.kw("offset"));
            out.push(' ');
            out.push_str(&self.render_expr(o)?);
        }
        Ok(out)
    }

    fn render_table(&mut self, t: &TableRef) -> SqlResult<String> {
        match t {
            TableRef::Table { namespaces, name, alias } => {
                let mut parts: Vec<String> = namespaces.iter().map(|n| self.ident(n)).collect();
                parts.push(self.ident(name));
                let mut s = parts.join(".");
                if let Some(a) = alias {
                    s.push_str(&format!(" {} {}", self.kw("as"), self.ident(a)));
                }
                Ok(s)
            }
            TableRef::Subquery { statement, alias } => {
                let b = self.block(statement)?;
                Ok(format!("{} {} {}", b, self.kw("as"), self.ident(alias)))
            }
        }
    }

    fn render_join(&mut self, join: &JoinClause) -> SqlResult<String> {
        let right = self.render_table(&join.right)?;
        if join.join_type == JoinType::Comma {
            return Ok(format!(", {}", right));
        }
        let mut s = format!("{}{} {}", self.nl(), self.kw(join.join_type.keyword()), right);
        match &join.constraint {
            JoinConstraint::On(e) => {
                s.push_str(&format!(" {} ", self.kw("on")));
                s.push_str(&self.render_predicate(e)?);
            }
            JoinConstraint::Using(cols) => {
                let cols: Vec<String> = cols.iter().map(|c| self.ident(c)).collect();
                s.push_str(&format!(" {} ({})", self.kw("using"), cols.join(", ")));
            }
            JoinConstraint::None => {}
        }
        Ok(s)
    }

    fn render_list(&mut self, exprs: &[Expr]) -> SqlResult<String> {
        let mut parts: Vec<String> = Vec::with_capacity(exprs.len());
        for e in exprs {
            parts.push(self.render_expr(e)?);
        }
        Ok(parts.join(", "))
    }

    fn render_order(&mut self, items: &[OrderItem]) -> SqlResult<String> {
        let mut parts: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let mut s = self.render_expr(&item.expr)?;
            match item.direction {
                Some(SortDirection::Asc) => { s.push(' '); s.push_str(&self.kw("asc")); }
                Some(SortDirection::Desc) => { s.push(' '); s.push_str(&self.kw("desc")); }
                None => {}
            }
            match item.nulls {
                Some(NullsOrder::First) => { s.push(' '); s.push_str(&self.kw("nulls first")); }
                Some(NullsOrder::Last) => { s.push(' '); s.push_str(&self.kw("nulls last")); }
                None => {}
            }
            parts.push(s);
        }
        Ok(parts.join(", "))
    }

    /// WHERE/HAVING/ON condition; the top-level AND chain honours `and_break`.
    fn render_predicate(&mut self, e: &Expr) -> SqlResult<String> {
        if self.config.and_break == LineBreak::None {
            return self.render_expr(e);
        }
        let mut chain: Vec<&Expr> = Vec::new();
        let mut cur = e;
        while let Expr::Binary { left, op: BinaryOp::And, right } = cur {
            chain.push(right);
            cur = left;
        }
        chain.push(cur);
        chain.reverse();
        if chain.len() == 1 {
            return self.render_expr(e);
        }
        let mut parts: Vec<String> = Vec::with_capacity(chain.len());
        for (i, operand) in chain.into_iter().enumerate() {
            parts.push(self.render_child(operand, BinaryOp::And.precedence(), i > 0)?);
        }
        let sep = self.separator(self.config.and_break, &self.kw("and"));
        Ok(parts.join(&sep))
    }

    /// Render `e` as an operand of an operator binding at `prec`. The right
    /// operand of a left-associative operator also needs parentheses at equal
    /// precedence.
    fn render_child(&mut self, e: &Expr, prec: u8, right: bool) -> SqlResult<String> {
        let s = self.render_expr(e)?;
        let p = e.precedence();
        if p < prec || (right && p == prec) {
            Ok(format!("({})", s))
        } else {
            Ok(s)
        }
    }

    fn render_literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::Number(n) => n.clone(),
            Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Boolean(b) => if *b { "true".to_string() } else { "false".to_string() },
            Literal::Null => self.kw("null"),
            Literal::Typed { type_name, value } => format!("{} '{}'", self.kw(type_name), value.replace('\'', "''")),
        }
    }

    pub fn render_expr(&mut self, e: &Expr) -> SqlResult<String> {
        Ok(match e {
            Expr::Column(c) => {
                let mut parts: Vec<String> = c.namespaces.iter().map(|n| self.ident(n)).collect();
                parts.push(self.ident(&c.name));
                parts.join(".")
            }
            Expr::Wildcard { qualifier: Some(q) } => format!("{}.*", self.ident(q)),
            Expr::Wildcard { qualifier: None } => "*".to_string(),
            Expr::Literal(l) => self.render_literal(l),
            Expr::Param(p) => self.sink.placeholder(p)?,
            Expr::Function(f) => self.render_function(f)?,
            Expr::Binary { left, op, right } => {
                let p = op.precedence();
                let l = self.render_child(left, p, false)?;
                let r = self.render_child(right, p, true)?;
                let sym = if op.is_keyword() { self.kw(op.symbol()) } else { op.symbol().to_string() };
                format!("{} {} {}", l, sym, r)
            }
            Expr::Unary { op: UnaryOp::Not, expr } => {
                let inner = self.render_child(expr, PREC_NOT, false)?;
                format!("{} {}", self.kw("not"), inner)
            }
            Expr::Unary { op, expr } => {
                let sign = if *op == UnaryOp::Minus { "-" } else { "+" };
                let inner = self.render_child(expr, PREC_UNARY_MINUS, false)?;
                // `- -1` must not collapse into a line comment
                if inner.starts_with('-') || inner.starts_with('+') {
                    format!("{} {}", sign, inner)
                } else {
                    format!("{}{}", sign, inner)
                }
            }
            Expr::IsNull { expr, negated } => {
                let inner = self.render_child(expr, PREC_COMPARISON, false)?;
                let tail = if *negated { self.kw("is not null") } else { self.kw("is null") };
                format!("{} {}", inner, tail)
            }
            Expr::Between { expr, low, high, negated } => {
                let inner = self.render_child(expr, PREC_COMPARISON, false)?;
                let lo = self.render_child(low, PREC_COMPARISON + 1, false)?;
                let hi = self.render_child(high, PREC_COMPARISON + 1, false)?;
                let word = if *negated { self.kw("not between") } else { self.kw("between") };
                format!("{} {} {} {} {}", inner, word, lo, self.kw("and"), hi)
            }
            Expr::InList { expr, list, negated } => {
                let inner = self.render_child(expr, PREC_COMPARISON, false)?;
                let items = self.render_list(list)?;
                let word = if *negated { self.kw("not in") } else { self.kw("in") };
                format!("{} {} ({})", inner, word, items)
            }
            Expr::InSubquery { expr, subquery, negated } => {
                let inner = self.render_child(expr, PREC_COMPARISON, false)?;
                let b = self.block(subquery)?;
                let word = if *negated { self.kw("not in") } else { self.kw("in") };
                format!("{} {} {}", inner, word, b)
            }
            Expr::Exists(s) => {
                let b = self.block(s)?;
                format!("{} {}", self.kw("exists"), b)
            }
            Expr::Subquery(s) => self.block(s)?,
            Expr::Case { operand, branches, else_expr } => {
                let mut s = self.kw("case");
                if let Some(o) = operand {
                    s.push(' ');
                    s.push_str(&self.render_expr(o)?);
                }
                for (cond, val) in branches {
                    let c = self.render_expr(cond)?;
                    let v = self.render_expr(val)?;
                    s.push_str(&format!(" {} {} {} {}", self.kw("when"), c, self.kw("then"), v));
                }
                if let Some(e) = else_expr {
                    let v = self.render_expr(e)?;
                    s.push_str(&format!(" {} {}", self.kw("else"), v));
                }
                s.push(' ');
                s.push_str(&self.kw("end"));
                s
            }
            Expr::Cast { expr, ty, shorthand: true } => {
                let inner = self.render_child(expr, PREC_CAST, false)?;
                format!("{}::{}", inner, ty)
            }
            Expr::Cast { expr, ty, shorthand: false } => {
                let inner = self.render_expr(expr)?;
                format!("{}({} {} {})", self.kw("cast"), inner, self.kw("as"), ty)
            }
            Expr::Nested(inner) => format!("({})", self.render_expr(inner)?),
        })
    }

    fn render_function(&mut self, f: &FunctionCall) -> SqlResult<String> {
        let args = self.render_list(&f.args)?;
        let name = self.function_name(&f.name);
        let mut s = if f.distinct {
            format!("{}({} {})", name, self.kw("distinct"), args)
        } else {
            format!("{}({})", name, args)
        };
        if let Some(filter) = &f.filter {
            let cond = self.render_expr(filter)?;
            s.push_str(&format!(" {} ({} {})", self.kw("filter"), self.kw("where"), cond));
        }
        if let Some(over) = &f.over {
            let mut parts: Vec<String> = Vec::new();
            if !over.partition_by.is_empty() {
                parts.push(format!("{} {}", self.kw("partition by"), self.render_list(&over.partition_by)?));
            }
            if !over.order_by.is_empty() {
                parts.push(format!("{} {}", self.kw("order by"), self.render_order(&over.order_by)?));
            }
            s.push_str(&format!(" {} ({})", self.kw("over"), parts.join(" ")));
        }
        Ok(s)
    }
}
