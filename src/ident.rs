//! Identifier normalization and quoting utilities
//! ---------------------------------------------
//! Single source of truth for turning quoted identifiers into their canonical
//! unquoted form and for deciding how an identifier must be written back out.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static PLAIN_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier regex"));

/// Words that cannot appear as bare aliases or bare identifiers.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "cast", "cross", "desc", "distinct", "else",
    "end", "except", "exists", "false", "from", "full", "group", "having", "ilike", "in", "inner",
    "intersect", "is", "join", "left", "like", "limit", "not", "null", "nulls", "offset", "on", "or",
    "order", "outer", "recursive", "right", "select", "then", "true", "union", "using", "when", "where",
    "with",
];

/// Reserved words of PostgreSQL and SQL:2016 beyond the parser's own stop
/// words; a bare name from either list must be quoted on output.
pub const QUOTE_REQUIRED_KEYWORDS: &[&str] = &[
    "alter", "analyse", "analyze", "any", "array", "asymmetric", "at", "authorization", "begin",
    "bigint", "binary", "blob", "boolean", "both", "call", "called", "cascaded", "char", "character",
    "check", "clob", "close", "collate", "collation", "column", "commit", "concurrently", "condition",
    "connect", "constraint", "corresponding", "create", "cube", "current", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "cursor", "cycle", "date", "day", "deallocate", "dec", "decimal", "declare",
    "default", "deferrable", "delete", "deref", "describe", "deterministic", "disconnect", "do",
    "double", "drop", "dynamic", "each", "element", "escape", "exec", "execute", "external", "fetch",
    "filter", "float", "for", "foreign", "free", "freeze", "function", "get", "global", "grant",
    "grouping", "hold", "hour", "identity", "indicator", "initially", "inout", "insensitive", "insert",
    "int", "integer", "interval", "into", "isnull", "language", "large", "lateral", "leading", "local",
    "localtime", "localtimestamp", "match", "member", "merge", "method", "minute", "modifies", "module",
    "month", "multiset", "national", "natural", "nchar", "nclob", "new", "no", "none", "notnull",
    "numeric", "of", "old", "only", "open", "out", "over", "overlaps", "parameter", "partition",
    "placing", "precision", "prepare", "primary", "procedure", "range", "reads", "real", "ref",
    "references", "referencing", "release", "return", "returning", "returns", "revoke", "rollback",
    "rollup", "row", "rows", "savepoint", "scope", "scroll", "search", "second", "sensitive",
    "session_user", "set", "similar", "smallint", "some", "specific", "specifictype", "sql",
    "sqlexception", "sqlstate", "sqlwarning", "start", "static", "submultiset", "symmetric", "system",
    "system_user", "table", "tablesample", "time", "timestamp", "timezone_hour", "timezone_minute",
    "to", "trailing", "translation", "treat", "trigger", "unique", "unknown", "unnest", "update",
    "user", "value", "values", "varchar", "variadic", "varying", "verbose", "whenever", "window",
    "within", "without", "year",
];

static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| RESERVED_KEYWORDS.iter().copied().collect());

static QUOTE_REQUIRED: Lazy<HashSet<&'static str>> =
    Lazy::new(|| RESERVED_KEYWORDS.iter().chain(QUOTE_REQUIRED_KEYWORDS).copied().collect());

/// Parser stop word: never read as a bare alias or column name.
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED.contains(word.to_ascii_lowercase().as_str())
}

/// Reserved in any target dialect, so a bare occurrence must be quoted.
pub fn requires_quoting(word: &str) -> bool {
    QUOTE_REQUIRED.contains(word.to_ascii_lowercase().as_str())
}

/// Normalize an identifier to its canonical unquoted form:
/// - `"name"`, `` `name` `` and `[name]` have their quotes stripped and doubled
///   closing quotes unescaped; case is preserved
/// - bare identifiers are returned trimmed, case preserved
pub fn normalize_identifier(ident: &str) -> String {
    let t = ident.trim();
    let quoted = |open: char, close: char| t.len() >= 2 && t.starts_with(open) && t.ends_with(close);
    if quoted('"', '"') {
        t[1..t.len() - 1].replace("\"\"", "\"")
    } else if quoted('`', '`') {
        t[1..t.len() - 1].replace("``", "`")
    } else if quoted('[', ']') {
        t[1..t.len() - 1].replace("]]", "]")
    } else {
        t.to_string()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, reserved or not.
pub fn is_simple_name(name: &str) -> bool {
    PLAIN_IDENT.is_match(name)
}

/// True when `name` can be written without quotes and read back unchanged.
pub fn is_plain_identifier(name: &str) -> bool {
    is_simple_name(name) && !requires_quoting(name)
}

/// Wrap `name` in the given quote pair, doubling any embedded closing quote.
pub fn quote_identifier(name: &str, open: &str, close: &str) -> String {
    let escaped = if close.is_empty() { name.to_string() } else { name.replace(close, &format!("{}{}", close, close)) };
    format!("{}{}{}", open, escaped, close)
}

/// SQL identifiers compare case-insensitively once normalized.
pub fn ident_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Split a dotted name (`schema.table`) into normalized parts, respecting quotes.
pub fn split_qualified(name: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    for ch in name.chars() {
        match quote {
            Some(close) => {
                cur.push(ch);
                if ch == close { quote = None; }
            }
            None => match ch {
                '"' => { quote = Some('"'); cur.push(ch); }
                '`' => { quote = Some('`'); cur.push(ch); }
                '[' => { quote = Some(']'); cur.push(ch); }
                '.' => { parts.push(normalize_identifier(&cur)); cur.clear(); }
                _ => cur.push(ch),
            },
        }
    }
    parts.push(normalize_identifier(&cur));
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_all_quote_styles() {
        assert_eq!(normalize_identifier("\"User Name\""), "User Name");
        assert_eq!(normalize_identifier("`order`"), "order");
        assert_eq!(normalize_identifier("[select]"), "select");
        assert_eq!(normalize_identifier("\"a\"\"b\""), "a\"b");
        assert_eq!(normalize_identifier("  plain  "), "plain");
    }

    #[test]
    fn plain_identifier_detection() {
        assert!(is_plain_identifier("user_id"));
        assert!(!is_plain_identifier("user id"));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier("select"));
        assert!(!is_plain_identifier("Order"));
    }

    #[test]
    fn dialect_reserved_words_need_quotes_but_still_parse_bare() {
        for word in ["user", "table", "column", "check", "default", "to", "only", "array", "current_user", "window"] {
            assert!(!is_plain_identifier(word), "{}", word);
            assert!(!is_reserved_keyword(word), "{}", word);
            assert!(is_simple_name(word));
        }
        assert!(!is_plain_identifier("USER"));
        assert!(is_plain_identifier("users"));
        assert!(is_plain_identifier("user_id"));
    }

    #[test]
    fn quoting_escapes_closing_quote() {
        assert_eq!(quote_identifier("a]b", "[", "]"), "[a]]b]");
        assert_eq!(quote_identifier("x\"y", "\"", "\""), "\"x\"\"y\"");
    }

    #[test]
    fn split_qualified_respects_quotes() {
        assert_eq!(split_qualified("public.users"), vec!["public", "users"]);
        assert_eq!(split_qualified("\"my.schema\".users"), vec!["my.schema", "users"]);
        assert_eq!(split_qualified("[dbo].[Order Lines]"), vec!["dbo", "Order Lines"]);
    }
}
