//! Unified error model for the query pipeline.
//! Every stage either succeeds or returns one of these variants; nothing is retried
//! internally. Each variant maps to a stable code and a PostgreSQL SQLSTATE so an
//! embedding server can surface it without string matching.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// Malformed SQL text. `position` is a byte offset into the parsed input.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax { position: usize, line: usize, column: usize, message: String },

    #[error("cannot resolve column(s) {} in {scope}", .columns.join(", "))]
    ColumnResolution { columns: Vec<String>, scope: String },

    #[error("cannot join {table}: {reason} ({})", .columns.join(", "))]
    JoinResolution { table: String, columns: Vec<String>, reason: String },

    #[error("invalid json mapping: {0}")]
    Mapping(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("duplicate CTE name: {0}")]
    DuplicateCte(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding application's schema lookup failed.
    #[error("schema lookup for {table} failed: {message}")]
    Lookup { table: String, message: String },
}

pub type SqlResult<T> = Result<T, SqlError>;

impl SqlError {
    /// Build a syntax error, deriving 1-based line/column from the byte offset.
    pub fn syntax(src: &str, position: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_col(src, position);
        SqlError::Syntax { position, line, column, message: message.into() }
    }

    pub fn column<S: Into<String>>(columns: Vec<String>, scope: S) -> Self {
        SqlError::ColumnResolution { columns, scope: scope.into() }
    }

    pub fn join<T: Into<String>, R: Into<String>>(table: T, columns: Vec<String>, reason: R) -> Self {
        SqlError::JoinResolution { table: table.into(), columns, reason: reason.into() }
    }

    pub fn mapping<S: Into<String>>(msg: S) -> Self { SqlError::Mapping(msg.into()) }
    pub fn format<S: Into<String>>(msg: S) -> Self { SqlError::Format(msg.into()) }
    pub fn invalid<S: Into<String>>(msg: S) -> Self { SqlError::InvalidArgument(msg.into()) }

    pub fn lookup(table: &str, err: anyhow::Error) -> Self {
        SqlError::Lookup { table: table.to_string(), message: format!("{:#}", err) }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            SqlError::Syntax { .. } => "syntax_error",
            SqlError::ColumnResolution { .. } => "column_resolution",
            SqlError::JoinResolution { .. } => "join_resolution",
            SqlError::Mapping(_) => "mapping_error",
            SqlError::Format(_) => "format_error",
            SqlError::DuplicateCte(_) => "duplicate_cte",
            SqlError::UnknownParameter(_) => "unknown_parameter",
            SqlError::InvalidArgument(_) => "invalid_argument",
            SqlError::Lookup { .. } => "lookup_error",
        }
    }

    /// SQLSTATE a postgres-speaking frontend should report for this error.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            SqlError::Syntax { .. } => "42601",            // syntax_error
            SqlError::ColumnResolution { .. } => "42703",  // undefined_column
            SqlError::JoinResolution { .. } => "42702",    // ambiguous_column
            SqlError::Mapping(_) => "22023",               // invalid_parameter_value
            SqlError::Format(_) => "0A000",                // feature_not_supported
            SqlError::DuplicateCte(_) => "42712",          // duplicate_alias
            SqlError::UnknownParameter(_) => "42P02",      // undefined_parameter
            SqlError::InvalidArgument(_) => "22023",
            SqlError::Lookup { .. } => "58000",            // system_error
        }
    }

    /// The columns an error is about, when it is about columns.
    pub fn columns(&self) -> &[String] {
        match self {
            SqlError::ColumnResolution { columns, .. } | SqlError::JoinResolution { columns, .. } => columns,
            _ => &[],
        }
    }
}

/// 1-based (line, column) for a byte offset; columns count characters, not bytes.
pub fn line_col(src: &str, position: usize) -> (usize, usize) {
    let end = position.min(src.len());
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, ch) in src.char_indices() {
        if i >= end { break; }
        if ch == '\n' { line += 1; col = 1; } else { col += 1; }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_reports_line_and_column() {
        let src = "SELECT a\nFROM (t";
        let err = SqlError::syntax(src, 14, "unbalanced parenthesis");
        match &err {
            SqlError::Syntax { position, line, column, .. } => {
                assert_eq!(*position, 14);
                assert_eq!(*line, 2);
                assert_eq!(*column, 6);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.to_string(), "syntax error at line 2, column 6: unbalanced parenthesis");
    }

    #[test]
    fn sqlstate_mapping() {
        assert_eq!(SqlError::syntax("x", 0, "bad").sqlstate(), "42601");
        assert_eq!(SqlError::column(vec!["a".into()], "select").sqlstate(), "42703");
        assert_eq!(SqlError::join("orders", vec!["user_id".into()], "no source exposes").sqlstate(), "42702");
        assert_eq!(SqlError::mapping("cycle").sqlstate(), "22023");
        assert_eq!(SqlError::format("bad").sqlstate(), "0A000");
        assert_eq!(SqlError::DuplicateCte("a".into()).code_str(), "duplicate_cte");
    }

    #[test]
    fn join_error_names_columns() {
        let err = SqlError::join("orders", vec!["user_id".into(), "tenant_id".into()], "no source exposes");
        assert_eq!(err.columns(), &["user_id".to_string(), "tenant_id".to_string()]);
        assert_eq!(err.to_string(), "cannot join orders: no source exposes (user_id, tenant_id)");
    }

    #[test]
    fn lookup_error_keeps_context() {
        let err = SqlError::lookup("users", anyhow::anyhow!("catalog offline").context("loading columns"));
        assert_eq!(err.code_str(), "lookup_error");
        assert!(err.to_string().contains("catalog offline"));
    }
}
