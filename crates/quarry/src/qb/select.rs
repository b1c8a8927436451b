//! SELECT and COUNT statement compilation.

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::state::QueryState;

/// Append the WHERE clause, if any conditions were accumulated.
pub(crate) fn append_where(sql: &mut String, state: &QueryState) {
    if !state.where_.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&state.where_.join(" "));
    }
}

/// Compile the accumulated state into a SELECT statement.
pub(crate) fn compile_select(dialect: &dyn Dialect, state: &QueryState) -> QbResult<String> {
    if state.from.is_empty() {
        return Err(QbError::compile(
            "no FROM target: call from() or pass a table",
        ));
    }

    let mut sql = String::from("SELECT ");
    if state.distinct {
        sql.push_str("DISTINCT ");
    }
    if let Some(modifier) = dialect.select_modifier(state.limit, state.offset) {
        sql.push_str(&modifier);
    }
    if state.select.is_empty() {
        sql.push('*');
    } else {
        sql.push_str(&state.select.join(", "));
    }

    sql.push_str(" FROM ");
    sql.push_str(&state.from.join(", "));
    for join in &state.join {
        sql.push(' ');
        sql.push_str(join);
    }

    append_where(&mut sql, state);

    if !state.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&state.group_by.join(", "));
    }
    if !state.having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&state.having.join(" "));
    }

    let has_order_by = !state.order_by.is_empty();
    if has_order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&state.order_by.join(", "));
    }
    sql.push_str(&dialect.select_paging_tail(state.limit, state.offset, has_order_by));

    Ok(sql)
}

/// Compile `SELECT COUNT(*) AS numrows` over the current FROM/JOIN/WHERE.
pub(crate) fn compile_count(state: &QueryState) -> QbResult<String> {
    if state.from.is_empty() {
        return Err(QbError::compile(
            "no FROM target: call from() or pass a table",
        ));
    }

    let mut sql = String::from("SELECT COUNT(*) AS numrows FROM ");
    sql.push_str(&state.from.join(", "));
    for join in &state.join {
        sql.push(' ');
        sql.push_str(join);
    }
    append_where(&mut sql, state);
    Ok(sql)
}
