use crate::error::SqlResult;
use crate::query::query_common::*;
use crate::query::query_lexer::TokenKind;
use crate::query::query_parse_select::Parser;

impl<'a> Parser<'a> {
    /// Comma-separated projection list. Each item is an expression (including
    /// `*` and `t.*`) with an optional alias written with or without AS.
    pub(crate) fn parse_select_list(&mut self) -> SqlResult<Vec<SelectItem>> {
        let mut items: Vec<SelectItem> = Vec::new();
        loop {
            if self.at_keyword("from") || self.at(&TokenKind::Eof) {
                return Err(self.unexpected("expected select list item"));
            }
            let expr = self.parse_expr()?;
            // a wildcard cannot carry an alias
            let alias = if matches!(expr, Expr::Wildcard { .. }) { None } else { self.parse_optional_alias()? };
            items.push(SelectItem { expr, alias });
            if !self.eat(&TokenKind::Comma) { break; }
        }
        Ok(items)
    }

    pub(crate) fn parse_expr_list(&mut self) -> SqlResult<Vec<Expr>> {
        let mut out = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            out.push(self.parse_expr()?);
        }
        Ok(out)
    }

    /// ORDER BY items: `expr [ASC|DESC] [NULLS FIRST|LAST]`.
    pub(crate) fn parse_order_items(&mut self) -> SqlResult<Vec<OrderItem>> {
        let mut out: Vec<OrderItem> = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let direction = if self.eat_keyword("asc") {
                Some(SortDirection::Asc)
            } else if self.eat_keyword("desc") {
                Some(SortDirection::Desc)
            } else {
                None
            };
            let nulls = if self.eat_keyword("nulls") {
                if self.eat_keyword("first") {
                    Some(NullsOrder::First)
                } else if self.eat_keyword("last") {
                    Some(NullsOrder::Last)
                } else {
                    return Err(self.unexpected("expected FIRST or LAST after NULLS"));
                }
            } else {
                None
            };
            out.push(OrderItem { expr, direction, nulls });
            if !self.eat(&TokenKind::Comma) { break; }
        }
        Ok(out)
    }
}
