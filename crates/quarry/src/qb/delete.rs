//! DELETE, EMPTY TABLE, and TRUNCATE statement compilation.

use super::select::append_where;
use crate::dialect::Dialect;
use crate::error::QbResult;
use crate::state::QueryState;

/// Compile the accumulated conditions into a DELETE statement.
pub(crate) fn compile_delete(
    dialect: &dyn Dialect,
    state: &QueryState,
    table_sql: &str,
) -> QbResult<String> {
    dialect.check_delete_offset(state.offset)?;

    let mut sql = String::from("DELETE ");
    if let Some(modifier) = dialect.delete_modifier(state.limit) {
        sql.push_str(&modifier);
    }
    sql.push_str("FROM ");
    sql.push_str(table_sql);
    append_where(&mut sql, state);
    sql.push_str(&dialect.delete_paging_tail(state.limit));
    Ok(sql)
}

/// Compile `DELETE FROM <table>`, ignoring every accumulator.
pub(crate) fn compile_empty_table(table_sql: &str) -> String {
    format!("DELETE FROM {table_sql}")
}

/// Compile a TRUNCATE statement, ignoring every accumulator.
pub(crate) fn compile_truncate(dialect: &dyn Dialect, table_sql: &str) -> String {
    format!("{}{table_sql}", dialect.truncate_keyword())
}
