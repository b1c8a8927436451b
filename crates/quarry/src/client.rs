//! Connection adapter boundary and the result-normalization contract.
//!
//! The builder never talks to a network driver directly. A driver binding
//! implements [`Connection`] and normalizes its native result shapes into
//! [`Payload`]: row-producing statements yield an array of row mappings,
//! mutating statements yield a [`QueryResponse`].

use crate::error::{QbError, QbResult};
use serde::Serialize;

/// One result row, as a column-name → JSON-scalar mapping.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Normalized outcome of a mutating statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    /// Auto-generated key of the inserted row, when the driver reports one.
    pub insert_id: Option<u64>,
    /// Rows matched/affected by the statement.
    pub affected_rows: u64,
    /// Rows whose content actually changed. Meaningful for UPDATE only.
    pub changed_rows: u64,
}

/// Normalized result of executing one statement.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Result set of a SELECT-type statement.
    Rows(Vec<Row>),
    /// Summary of a mutating statement.
    Mutation(QueryResponse),
}

impl Payload {
    /// Unwrap a row set; a mutation summary here is a driver contract breach.
    pub fn into_rows(self) -> QbResult<Vec<Row>> {
        match self {
            Payload::Rows(rows) => Ok(rows),
            Payload::Mutation(_) => Err(QbError::execution(
                "driver returned a mutation summary where a row set was expected",
            )),
        }
    }

    /// Unwrap a mutation summary; a row set here is a driver contract breach.
    pub fn into_response(self) -> QbResult<QueryResponse> {
        match self {
            Payload::Mutation(resp) => Ok(resp),
            Payload::Rows(_) => Err(QbError::execution(
                "driver returned a row set where a mutation summary was expected",
            )),
        }
    }
}

/// A live database connection the builder can dispatch compiled SQL through.
///
/// Implementations wrap a concrete driver and normalize its result shapes;
/// timeouts and cancellation belong to the driver's transport, not here.
pub trait Connection: Send + Sync {
    /// Execute one statement and return its normalized result.
    fn execute(&self, sql: &str) -> impl std::future::Future<Output = QbResult<Payload>> + Send;
}

impl<C: Connection> Connection for &C {
    fn execute(&self, sql: &str) -> impl std::future::Future<Output = QbResult<Payload>> + Send {
        (*self).execute(sql)
    }
}
