use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::ident::{ident_eq, split_qualified};
use crate::query::query_common::*;
use crate::schema::{lookup_table_columns, TableSchemaLookup};
use crate::transform::collect_columns::{CteEnv, SelectableColumnCollector};

/// Append `JOIN table AS alias ON src.c = alias.c AND ..` to the root select,
/// where `src` is the one existing source that exposes every join column.
pub fn inject_join(
    stmt: &mut Statement,
    table: &str,
    alias: &str,
    join_columns: &[&str],
    join_type: JoinType,
    lookup: Option<&dyn TableSchemaLookup>,
) -> SqlResult<()> {
    let columns: Vec<String> = join_columns.iter().map(|c| c.to_string()).collect();
    if columns.is_empty() {
        return Err(SqlError::invalid("join requires at least one column"));
    }
    if matches!(join_type, JoinType::Cross | JoinType::Comma) {
        return Err(SqlError::invalid("injected joins need an ON condition; use inner, left, right or full"));
    }
    let mut parts = split_qualified(table);
    let Some(name) = parts.pop() else {
        return Err(SqlError::invalid("join table name is empty"));
    };
    let alias = if alias.trim().is_empty() { name.clone() } else { alias.trim().to_string() };

    let env = CteEnv::root(stmt);
    let Some(q) = stmt.as_select() else {
        return Err(SqlError::invalid("cannot inject a join into a set operation"));
    };
    if q.base_table.is_none() {
        return Err(SqlError::join(table, columns, "the select has no FROM clause"));
    }
    if q.sources().iter().any(|s| ident_eq(s.effective_name(), &alias)) {
        return Err(SqlError::join(table.to_string(), columns, format!("alias '{}' is already in use", alias)));
    }

    // when the lookup knows the joined table it must have the join columns
    let qualified = {
        let mut all = parts.clone();
        all.push(name.clone());
        all.join(".")
    };
    if let Some(target_cols) = lookup_table_columns(lookup, &qualified, &name)? {
        let absent: Vec<String> = columns.iter().filter(|c| !target_cols.iter().any(|t| ident_eq(t, c))).cloned().collect();
        if !absent.is_empty() {
            return Err(SqlError::join(table.to_string(), absent, format!("{} does not have the join column(s)", qualified)));
        }
    }

    let collector = SelectableColumnCollector::new(lookup);
    let sources = collector.source_columns(q, &env)?;
    let candidates: Vec<&str> = sources
        .iter()
        .filter(|s| columns.iter().all(|c| s.exposes(c)))
        .map(|s| s.source.as_str())
        .collect();
    let source = match candidates.as_slice() {
        [one] => one.to_string(),
        [] => {
            let unexposed: Vec<String> = columns.iter().filter(|c| !sources.iter().any(|s| s.exposes(c))).cloned().collect();
            if unexposed.is_empty() {
                return Err(SqlError::join(table.to_string(), columns, "join columns are spread across sources; no single source exposes all of them".to_string()));
            }
            return Err(SqlError::join(table.to_string(), unexposed, "no source exposes the join column(s)".to_string()));
        }
        many => {
            return Err(SqlError::join(table.to_string(), columns, format!("join columns are ambiguous between sources {}", many.join(", "))));
        }
    };

    let mut on: Option<Expr> = None;
    for c in &columns {
        let eq = Expr::binary(Expr::qualified(source.clone(), c.clone()), BinaryOp::Eq, Expr::qualified(alias.clone(), c.clone()));
        on = Some(match on {
            None => eq,
            Some(prev) => Expr::and(prev, eq),
        });
    }
    let Some(on) = on else { return Err(SqlError::invalid("join requires at least one column")) };
    let right = TableRef::Table {
        namespaces: parts,
        alias: if ident_eq(&alias, &name) { None } else { Some(alias.clone()) },
        name,
    };
    debug!(target: "sqlweave::inject", "joining {} as {} on {} via {}", table, alias, columns.join(", "), source);
    let clause = JoinClause { join_type, right, constraint: JoinConstraint::On(on) };
    if let Some(q) = stmt.as_select_mut() {
        q.joins.push(clause);
    }
    Ok(())
}
