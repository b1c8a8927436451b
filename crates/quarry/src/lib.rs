//! # quarry
//!
//! A fluent, dialect-aware SQL query builder and execution facade.
//!
//! ## Features
//!
//! - **Chainable builder**: mutators accumulate clause fragments against a
//!   single in-flight query; terminals compile, execute, and reset
//! - **Dialect strategy**: one builder, MySQL- and SQL-Server-flavored
//!   output (quoting, paging, random ordering, OUTPUT/IGNORE)
//! - **Escaping done once**: identifiers and values are rendered at the
//!   call that accepts them; identifier escaping is idempotent
//! - **Pluggable execution**: drivers implement a small [`Connection`]
//!   trait and normalize results into rows or a [`QueryResponse`]
//! - **Pooling**: `deadpool`-backed connection pool with explicit release
//!   semantics (behind the default `pool` feature)
//!
//! ## Query builder
//!
//! ```ignore
//! use quarry::{QueryBuilder, Value};
//!
//! let mut qb = QueryBuilder::mysql();
//!
//! // SELECT `id`, `name` FROM `galaxies` WHERE `class` = 'M'
//! let rows = qb
//!     .select("id, name")?
//!     .where_("class", "M")?
//!     .get(&conn, Some("galaxies"))
//!     .await?;
//!
//! // Compile without executing (state is kept):
//! let sql = qb.where_("class", "M")?.get_compiled_select(Some("galaxies"))?;
//! ```

pub mod client;
pub mod dialect;
pub mod error;
pub mod qb;
pub mod value;

mod ident;
mod state;

pub use client::{Connection, Payload, QueryResponse, Row};
pub use dialect::{Dialect, MSSQL, MYSQL, MssqlDialect, MysqlDialect};
pub use error::{QbError, QbResult};
pub use qb::{LikeSide, QueryBuilder};
pub use value::Value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{ConnectionManager, ConnectionPool, DbHandle, checkout, create_pool};
