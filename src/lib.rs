//! sqlweave: parse SELECT statements, weave predicates, joins, ordering, paging
//! and parameters into them, fold flat results into hierarchical JSON with
//! staged CTEs, and render the result for a target SQL dialect.
//!
//! The usual sequence is parse → inject → (build json) → format:
//!
//! ```no_run
//! use sqlweave::{format, parse, Criteria, Dialect, InjectOptions};
//!
//! let mut stmt = parse("SELECT id, name FROM users WHERE active = true")?;
//! let criteria = Criteria::new().equals("id", 42);
//! sqlweave::inject_criteria(&mut stmt, &criteria, &InjectOptions::default(), None)?;
//! let out = format(&stmt, &Dialect::Generic.config())?;
//! assert_eq!(out.sql, "SELECT id, name FROM users WHERE active = true AND id = :id");
//! # Ok::<(), sqlweave::SqlError>(())
//! ```

pub mod ident;
pub mod error;
pub mod query;
pub mod schema;
pub mod transform;
pub mod format;

pub use error::{SqlError, SqlResult};
pub use format::{format, format_expr, Dialect, DialectConfig, FormattedQuery, KeywordCase, LineBreak, ParameterStyle, Params};
pub use query::{parse, parse_async, parse_expression, Statement};
pub use schema::{StaticSchema, TableSchemaLookup};
pub use transform::*;
