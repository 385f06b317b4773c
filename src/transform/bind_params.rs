use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::query::query_common::*;
use crate::transform::walk::for_each_expr_deep_mut;

/// Bind `value` to every occurrence of the named parameter. Returns the number
/// of occurrences bound; a name that does not occur is an error.
pub fn set_parameter(stmt: &mut Statement, name: &str, value: Value) -> SqlResult<usize> {
    let mut count = 0usize;
    for_each_expr_deep_mut(stmt, &mut |e| {
        if let Expr::Param(p) = e {
            if p.name.as_deref() == Some(name) {
                p.value = Some(value.clone());
                count += 1;
            }
        }
    });
    if count == 0 {
        return Err(SqlError::UnknownParameter(name.to_string()));
    }
    debug!(target: "sqlweave::inject", "bound :{} at {} site(s)", name, count);
    Ok(count)
}

/// Bind several parameters at once; nothing is bound if any name is unknown.
pub fn set_parameters(stmt: &mut Statement, values: &Map<String, Value>) -> SqlResult<()> {
    let mut work = stmt.clone();
    for (name, value) in values {
        set_parameter(&mut work, name, value.clone())?;
    }
    *stmt = work;
    Ok(())
}
