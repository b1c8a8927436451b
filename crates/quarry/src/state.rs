//! The mutable "current query" owned by one builder instance.

use std::collections::HashSet;

/// One SET assignment, keyed by the unescaped logical column name.
///
/// The rendered key/value text is produced once, at the `set` call; a
/// later call against the same logical column overwrites the entry in
/// place so insertion order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SetEntry {
    /// Unescaped column name; the overwrite identity.
    pub column: String,
    /// Rendered key text as it appears in the statement.
    pub key_sql: String,
    /// Rendered value text as it appears in the statement.
    pub value_sql: String,
}

/// Accumulated clause fragments for the in-flight query.
///
/// Every field is empty immediately after construction and immediately
/// after any executing terminal completes.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryState {
    /// Escaped table references; the first is authoritative for
    /// single-table statements.
    pub from: Vec<String>,
    /// Escaped select expressions; empty compiles to `*`.
    pub select: Vec<String>,
    /// Pre-rendered conditions, joiner-prefixed after the first.
    pub where_: Vec<String>,
    /// Pre-rendered `[DIR ]JOIN … ON/USING (…)` fragments.
    pub join: Vec<String>,
    /// Escaped group-by fields, comma-joined at compile time.
    pub group_by: Vec<String>,
    /// Pre-rendered having conditions, joiner-prefixed after the first.
    pub having: Vec<String>,
    /// Pre-rendered `field DIRECTION` items, comma-joined at compile time.
    pub order_by: Vec<String>,
    /// SET assignments in insertion order.
    pub set: Vec<SetEntry>,
    /// Row cap; never zero.
    pub limit: Option<u64>,
    /// Pagination offset.
    pub offset: Option<u64>,
    /// DISTINCT marker.
    pub distinct: bool,
    /// Columns surfaced by the dialect's returning clause.
    pub returning: Vec<String>,
    /// Alias tokens discovered while processing `from`/`join`.
    pub aliased_tables: HashSet<String>,
}

impl QueryState {
    /// Append a condition fragment, prefixing the joiner after the first.
    pub fn push_where(&mut self, fragment: String, joiner: &str) {
        if self.where_.is_empty() {
            self.where_.push(fragment);
        } else {
            self.where_.push(format!("{joiner} {fragment}"));
        }
    }

    /// Append a having fragment, prefixing the joiner after the first.
    pub fn push_having(&mut self, fragment: String, joiner: &str) {
        if self.having.is_empty() {
            self.having.push(fragment);
        } else {
            self.having.push(format!("{joiner} {fragment}"));
        }
    }

    /// Store a SET assignment, overwriting an existing logical column in place.
    pub fn push_set(&mut self, entry: SetEntry) {
        match self.set.iter_mut().find(|e| e.column == entry.column) {
            Some(existing) => *existing = entry,
            None => self.set.push(entry),
        }
    }

    /// Wipe every accumulator back to the freshly-constructed state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
