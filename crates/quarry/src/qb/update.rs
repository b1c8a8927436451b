//! UPDATE statement compilation, single and batched.

use super::select::append_where;
use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::ident::escape_identifier;
use crate::state::QueryState;
use crate::value::{Value, escape_value};

/// Compile the staged SET assignments into an UPDATE statement.
pub(crate) fn compile_update(
    dialect: &dyn Dialect,
    state: &QueryState,
    table_sql: &str,
) -> QbResult<String> {
    if state.set.is_empty() {
        return Err(QbError::compile(
            "update requires at least one staged column: call set() or pass data",
        ));
    }

    let assignments: Vec<String> = state
        .set
        .iter()
        .map(|e| format!("{} = {}", e.key_sql, e.value_sql))
        .collect();

    let mut sql = String::from("UPDATE ");
    if let Some(modifier) = dialect.update_modifier(state.limit) {
        sql.push_str(&modifier);
    }
    sql.push_str(table_sql);
    sql.push_str(" SET ");
    sql.push_str(&assignments.join(", "));
    append_where(&mut sql, state);

    if dialect.update_takes_tails() {
        if !state.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&state.order_by.join(", "));
        }
        if let Some(n) = state.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
    }
    Ok(sql)
}

/// Compile rows into chunked CASE-WHEN UPDATE statements keyed on `index_col`.
///
/// Each chunk renders one statement assigning every non-index column via
/// `CASE WHEN <index> = id THEN value … ELSE <column> END`, guarded by the
/// accumulated conditions plus `<index> IN (<chunk ids>)`.
pub(crate) fn compile_update_batch(
    dialect: &dyn Dialect,
    state: &QueryState,
    table_sql: &str,
    rows: &[Vec<(&str, Value)>],
    index_col: &str,
    batch_size: usize,
) -> QbResult<Vec<String>> {
    if rows.is_empty() {
        return Err(QbError::invalid_argument(
            "update_batch requires at least one row",
        ));
    }
    let index_col = index_col.trim();
    if index_col.is_empty() {
        return Err(QbError::invalid_argument(
            "update_batch requires an index column",
        ));
    }
    for (i, row) in rows.iter().enumerate() {
        if !row.iter().any(|(k, _)| *k == index_col) {
            return Err(QbError::invalid_argument(format!(
                "update_batch row {i} is missing the index column '{index_col}'"
            )));
        }
    }

    let index_sql = escape_identifier(dialect, index_col);
    let where_prefix = state.where_.join(" ");

    let mut stmts = Vec::with_capacity(rows.len().div_ceil(batch_size));
    for chunk in rows.chunks(batch_size) {
        // Column order is first appearance across the chunk.
        let mut columns: Vec<&str> = Vec::new();
        for row in chunk {
            for (k, _) in row {
                if *k != index_col && !columns.contains(k) {
                    columns.push(*k);
                }
            }
        }
        if columns.is_empty() {
            return Err(QbError::invalid_argument(
                "update_batch rows carry no columns besides the index",
            ));
        }

        let mut ids = Vec::with_capacity(chunk.len());
        for row in chunk {
            let id = row
                .iter()
                .find(|(k, _)| *k == index_col)
                .map(|(_, v)| v)
                .expect("index presence validated above");
            ids.push(escape_value(dialect, id)?);
        }

        let mut cases = Vec::with_capacity(columns.len());
        for col in &columns {
            let col_sql = escape_identifier(dialect, col);
            let mut case = format!("{col_sql} = CASE");
            for (row, id) in chunk.iter().zip(&ids) {
                if let Some((_, value)) = row.iter().find(|(k, _)| k == col) {
                    case.push_str(&format!(
                        " WHEN {index_sql} = {id} THEN {}",
                        escape_value(dialect, value)?
                    ));
                }
            }
            case.push_str(&format!(" ELSE {col_sql} END"));
            cases.push(case);
        }

        let mut sql = format!("UPDATE {table_sql} SET {}", cases.join(", "));
        sql.push_str(" WHERE ");
        if !where_prefix.is_empty() {
            sql.push_str(&where_prefix);
            sql.push_str(" AND ");
        }
        sql.push_str(&format!("{index_sql} IN ({})", ids.join(", ")));
        stmts.push(sql);
    }
    Ok(stmts)
}
