use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::query::query_common::*;

pub const PAGING_LIMIT_PARAM: &str = "paging_limit";
pub const PAGING_OFFSET_PARAM: &str = "paging_offset";

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    pub page: u64,
    pub page_size: u64,
}

impl PageSpec {
    pub fn new(page: u64, page_size: u64) -> Self { PageSpec { page, page_size } }

    pub fn offset(&self) -> u64 { self.page.saturating_sub(1).saturating_mul(self.page_size) }
}

/// Set `LIMIT :paging_limit OFFSET :paging_offset` on the root select (the last
/// select of a set operation) with both values bound.
pub fn inject_paging(stmt: &mut Statement, spec: PageSpec) -> SqlResult<()> {
    if spec.page == 0 {
        return Err(SqlError::invalid("page numbers start at 1"));
    }
    if spec.page_size == 0 {
        return Err(SqlError::invalid("page size must be positive"));
    }
    let Some(target) = stmt.body.rightmost_mut() else {
        return Err(SqlError::invalid("cannot page a set operation whose last operand is parenthesised"));
    };
    if target.limit.is_some() || target.offset.is_some() {
        return Err(SqlError::invalid("statement already has LIMIT or OFFSET"));
    }
    target.limit = Some(Expr::Param(Param::bound(PAGING_LIMIT_PARAM, Value::from(spec.page_size))));
    target.offset = Some(Expr::Param(Param::bound(PAGING_OFFSET_PARAM, Value::from(spec.offset()))));
    debug!(target: "sqlweave::inject", "paging: page {} of size {}", spec.page, spec.page_size);
    Ok(())
}
