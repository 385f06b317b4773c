//! Dialect configuration
//! ---------------------
//! A `DialectConfig` is plain data: identifier quoting, parameter placeholder
//! style and purely textual layout options. `Dialect` names the built-in presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SqlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterStyle {
    /// `<symbol><name>`, one value per distinct name
    #[default]
    Named,
    /// `<symbol>1, <symbol>2, ..`, one value per occurrence
    Indexed,
    /// the bare symbol, one value per occurrence
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCase {
    Lower,
    #[default]
    Upper,
}

/// Where a line break goes relative to a separator (comma or AND).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineBreak {
    #[default]
    None,
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    /// Opening and closing identifier quote; `None` emits bare identifiers and
    /// falls back to `"` only for names that need quoting.
    pub identifier_quote: Option<(String, String)>,
    pub parameter_symbol: String,
    pub parameter_style: ParameterStyle,
    pub keyword_case: KeywordCase,
    // A single space keeps the whole statement on one line
    pub newline: String,
    pub indent: String,
    pub comma_break: LineBreak,
    pub and_break: LineBreak,
}

impl Default for DialectConfig {
    fn default() -> Self {
        DialectConfig::generic()
    }
}

impl DialectConfig {
    pub fn generic() -> Self {
        DialectConfig {
            identifier_quote: None,
            parameter_symbol: ":".to_string(),
            parameter_style: ParameterStyle::Named,
            keyword_case: KeywordCase::Upper,
            newline: " ".to_string(),
            indent: String::new(),
            comma_break: LineBreak::None,
            and_break: LineBreak::None,
        }
    }

    fn quoted(open: &str, close: &str, symbol: &str, style: ParameterStyle) -> Self {
        DialectConfig {
            identifier_quote: Some((open.to_string(), close.to_string())),
            parameter_symbol: symbol.to_string(),
            parameter_style: style,
            keyword_case: KeywordCase::Lower,
            ..DialectConfig::generic()
        }
    }

    pub fn with_keyword_case(mut self, case: KeywordCase) -> Self {
        self.keyword_case = case;
        self
    }

    pub fn with_parameters<S: Into<String>>(mut self, symbol: S, style: ParameterStyle) -> Self {
        self.parameter_symbol = symbol.into();
        self.parameter_style = style;
        self
    }

    pub fn with_identifier_quote<S: Into<String>>(mut self, open: S, close: S) -> Self {
        self.identifier_quote = Some((open.into(), close.into()));
        self
    }

    /// Multi-line layout: `newline` between clauses, `indent` per nesting level.
    pub fn with_layout<S: Into<String>>(mut self, newline: S, indent: S, comma_break: LineBreak, and_break: LineBreak) -> Self {
        self.newline = newline.into();
        self.indent = indent.into();
        self.comma_break = comma_break;
        self.and_break = and_break;
        self
    }

    /// Reject configurations that would render text with a different meaning:
    /// placeholders without a symbol, half-open quote pairs, or layout strings
    /// that are not whitespace.
    pub fn validate(&self) -> Result<(), SqlError> {
        if self.parameter_symbol.is_empty() {
            return Err(SqlError::format("dialect config: parameter_symbol must not be empty"));
        }
        if let Some((open, close)) = &self.identifier_quote {
            if open.is_empty() || close.is_empty() {
                return Err(SqlError::format("dialect config: identifier_quote needs both an opening and a closing string"));
            }
        }
        if self.newline.is_empty() || !self.newline.chars().all(char::is_whitespace) {
            return Err(SqlError::format("dialect config: newline must be non-empty whitespace"));
        }
        if !self.indent.chars().all(char::is_whitespace) {
            return Err(SqlError::format("dialect config: indent must be whitespace"));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, SqlError> {
        serde_json::from_str(json).map_err(|e| SqlError::invalid(format!("dialect config: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Generic,
    Postgres,
    Sqlite,
    MySql,
    SqlServer,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [Dialect::Generic, Dialect::Postgres, Dialect::Sqlite, Dialect::MySql, Dialect::SqlServer];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
        }
    }

    pub fn config(&self) -> DialectConfig {
        match self {
            Dialect::Generic => DialectConfig::generic(),
            Dialect::Postgres => DialectConfig::quoted("\"", "\"", ":", ParameterStyle::Named),
            Dialect::Sqlite => DialectConfig::quoted("\"", "\"", ":", ParameterStyle::Named),
            Dialect::MySql => DialectConfig::quoted("`", "`", "?", ParameterStyle::Anonymous),
            Dialect::SqlServer => DialectConfig::quoted("[", "]", "@", ParameterStyle::Named),
        }
    }
}

impl From<Dialect> for DialectConfig {
    fn from(d: Dialect) -> Self {
        d.config()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Dialect::Generic),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlserver" | "mssql" | "tsql" => Ok(Dialect::SqlServer),
            other => Err(SqlError::invalid(format!("unknown dialect '{}'", other))),
        }
    }
}
