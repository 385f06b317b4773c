use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::query::query_common::*;
use crate::schema::TableSchemaLookup;
use crate::transform::collect_columns::SelectableColumnCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsPlacement {
    First,
    Last,
}

/// One ORDER BY request: `{"column": "name", "direction": "desc", "nulls": "last"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortOrder,
    #[serde(default)]
    pub nulls: Option<NullsPlacement>,
}

impl SortSpec {
    pub fn asc<S: Into<String>>(column: S) -> Self {
        SortSpec { column: column.into(), direction: SortOrder::Asc, nulls: None }
    }

    pub fn desc<S: Into<String>>(column: S) -> Self {
        SortSpec { column: column.into(), direction: SortOrder::Desc, nulls: None }
    }

    pub fn nulls(mut self, nulls: NullsPlacement) -> Self {
        self.nulls = Some(nulls);
        self
    }

    fn order_item(&self, expr: Expr) -> OrderItem {
        OrderItem {
            expr,
            direction: Some(match self.direction {
                SortOrder::Asc => SortDirection::Asc,
                SortOrder::Desc => SortDirection::Desc,
            }),
            nulls: self.nulls.map(|n| match n {
                NullsPlacement::First => NullsOrder::First,
                NullsPlacement::Last => NullsOrder::Last,
            }),
        }
    }
}

/// Append ORDER BY items after resolving each column in the root scope. A set
/// operation is ordered by output column name on its last select.
pub fn inject_sort(stmt: &mut Statement, specs: &[SortSpec], lookup: Option<&dyn TableSchemaLookup>) -> SqlResult<()> {
    if specs.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = specs.iter().map(|s| s.column.clone()).collect();
    let resolved = SelectableColumnCollector::new(lookup).require(stmt, &names)?;
    let items: Vec<OrderItem> = match &stmt.body {
        QueryBody::Select(_) => specs.iter().zip(resolved).map(|(s, c)| s.order_item(c.expr)).collect(),
        _ => specs.iter().zip(resolved).map(|(s, c)| s.order_item(Expr::column(c.name))).collect(),
    };
    let Some(target) = stmt.body.rightmost_mut() else {
        return Err(SqlError::invalid("cannot order a set operation whose last operand is parenthesised"));
    };
    target.order_by.extend(items);
    debug!(target: "sqlweave::inject", "appended {} sort item(s)", specs.len());
    Ok(())
}
