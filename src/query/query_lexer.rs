use crate::error::{SqlError, SqlResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Bare word; keywords are recognised by the parser, not here
    Ident(String),
    // "x", `x` or [x], already unquoted
    QuotedIdent(String),
    Number(String),
    // Unescaped string literal contents
    String(String),
    // :name, @name, $1; name None for bare `?`
    Param { symbol: char, name: Option<String> },
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Concat,
    DoubleColon,
    Arrow,
    LongArrow,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    // Byte offset of the first character in the source text
    pub pos: usize,
}

impl Token {
    /// True for a bare word equal (case-insensitively) to `kw`.
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(w) if w.eq_ignore_ascii_case(kw))
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(w) => format!("'{}'", w),
            TokenKind::QuotedIdent(w) => format!("identifier \"{}\"", w),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::String(_) => "string literal".to_string(),
            TokenKind::Param { symbol, name } => match name {
                Some(n) => format!("parameter {}{}", symbol, n),
                None => "parameter ?".to_string(),
            },
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", punct_text(other)),
        }
    }
}

fn punct_text(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::Comma => ",",
        TokenKind::Dot => ".",
        TokenKind::Semicolon => ";",
        TokenKind::Star => "*",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::Eq => "=",
        TokenKind::NotEq => "<>",
        TokenKind::Lt => "<",
        TokenKind::LtEq => "<=",
        TokenKind::Gt => ">",
        TokenKind::GtEq => ">=",
        TokenKind::Concat => "||",
        TokenKind::DoubleColon => "::",
        TokenKind::Arrow => "->",
        TokenKind::LongArrow => "->>",
        _ => "?",
    }
}

fn is_ident_start(c: char) -> bool { c.is_alphabetic() || c == '_' }
fn is_ident_char(c: char) -> bool { c.is_alphanumeric() || c == '_' || c == '$' }

/// Split SQL text into tokens. Whitespace and comments (`--` to end of line,
/// nested `/* */`) are dropped. The returned vector always ends with `Eof`.
pub fn tokenize(src: &str) -> SqlResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let n = chars.len();
    let at = |i: usize| -> Option<char> { chars.get(i).map(|(_, c)| *c) };
    let offset = |i: usize| -> usize { chars.get(i).map(|(p, _)| *p).unwrap_or(src.len()) };
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;
    while i < n {
        let c = chars[i].1;
        let pos = chars[i].0;
        if c.is_whitespace() { i += 1; continue; }
        // line comment
        if c == '-' && at(i + 1) == Some('-') {
            while i < n && chars[i].1 != '\n' { i += 1; }
            continue;
        }
        // block comment, nesting allowed
        if c == '/' && at(i + 1) == Some('*') {
            let mut depth = 1usize;
            i += 2;
            while i < n && depth > 0 {
                if chars[i].1 == '/' && at(i + 1) == Some('*') { depth += 1; i += 2; continue; }
                if chars[i].1 == '*' && at(i + 1) == Some('/') { depth -= 1; i += 2; continue; }
                i += 1;
            }
            if depth > 0 { return Err(SqlError::syntax(src, pos, "unterminated block comment")); }
            continue;
        }
        if c == '\'' {
            let mut s = String::new();
            i += 1;
            loop {
                match at(i) {
                    None => return Err(SqlError::syntax(src, pos, "unterminated string literal")),
                    Some('\'') if at(i + 1) == Some('\'') => { s.push('\''); i += 2; }
                    Some('\'') => { i += 1; break; }
                    Some(ch) => { s.push(ch); i += 1; }
                }
            }
            out.push(Token { kind: TokenKind::String(s), pos });
            continue;
        }
        if c == '"' || c == '`' || c == '[' {
            let close = match c { '"' => '"', '`' => '`', _ => ']' };
            let mut s = String::new();
            i += 1;
            loop {
                match at(i) {
                    None => return Err(SqlError::syntax(src, pos, "unterminated quoted identifier")),
                    Some(ch) if ch == close && at(i + 1) == Some(close) => { s.push(close); i += 2; }
                    Some(ch) if ch == close => { i += 1; break; }
                    Some(ch) => { s.push(ch); i += 1; }
                }
            }
            if s.is_empty() { return Err(SqlError::syntax(src, pos, "empty quoted identifier")); }
            out.push(Token { kind: TokenKind::QuotedIdent(s), pos });
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && at(i + 1).map(|d| d.is_ascii_digit()).unwrap_or(false)) {
            while at(i).map(|d| d.is_ascii_digit()).unwrap_or(false) { i += 1; }
            if at(i) == Some('.') && at(i + 1) != Some('.') {
                i += 1;
                while at(i).map(|d| d.is_ascii_digit()).unwrap_or(false) { i += 1; }
            }
            if matches!(at(i), Some('e') | Some('E')) {
                let mut j = i + 1;
                if matches!(at(j), Some('+') | Some('-')) { j += 1; }
                if at(j).map(|d| d.is_ascii_digit()).unwrap_or(false) {
                    i = j;
                    while at(i).map(|d| d.is_ascii_digit()).unwrap_or(false) { i += 1; }
                }
            }
            if at(i).map(is_ident_start).unwrap_or(false) {
                return Err(SqlError::syntax(src, offset(i), "invalid character in number"));
            }
            out.push(Token { kind: TokenKind::Number(src[pos..offset(i)].to_string()), pos });
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            while at(i).map(is_ident_char).unwrap_or(false) { i += 1; }
            out.push(Token { kind: TokenKind::Ident(src[offset(start)..offset(i)].to_string()), pos });
            continue;
        }
        // parameters: `:name`, `@name`, `$1`, `?`
        if (c == ':' || c == '@') && at(i + 1).map(|d| is_ident_start(d) || d.is_ascii_digit()).unwrap_or(false) {
            i += 1;
            let start = i;
            while at(i).map(is_ident_char).unwrap_or(false) { i += 1; }
            out.push(Token { kind: TokenKind::Param { symbol: c, name: Some(src[offset(start)..offset(i)].to_string()) }, pos });
            continue;
        }
        if c == '$' && at(i + 1).map(|d| d.is_ascii_digit()).unwrap_or(false) {
            i += 1;
            let start = i;
            while at(i).map(|d| d.is_ascii_digit()).unwrap_or(false) { i += 1; }
            out.push(Token { kind: TokenKind::Param { symbol: '$', name: Some(src[offset(start)..offset(i)].to_string()) }, pos });
            continue;
        }
        let two = (c, at(i + 1));
        let (kind, width) = match two {
            (':', Some(':')) => (TokenKind::DoubleColon, 2),
            ('<', Some('>')) => (TokenKind::NotEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LtEq, 2),
            ('>', Some('=')) => (TokenKind::GtEq, 2),
            ('|', Some('|')) => (TokenKind::Concat, 2),
            ('-', Some('>')) if at(i + 2) == Some('>') => (TokenKind::LongArrow, 3),
            ('-', Some('>')) => (TokenKind::Arrow, 2),
            ('?', _) => (TokenKind::Param { symbol: '?', name: None }, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('=', _) => (TokenKind::Eq, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            _ => return Err(SqlError::syntax(src, pos, format!("unexpected character '{}'", c))),
        };
        out.push(Token { kind, pos });
        i += width;
    }
    out.push(Token { kind: TokenKind::Eof, pos: src.len() });
    Ok(out)
}
