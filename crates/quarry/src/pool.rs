//! Connection pool utilities
//!
//! Pools are built on `deadpool`'s managed API over a caller-supplied
//! async connection factory. A checked-out connection is bound to one
//! builder at a time and handed back with [`DbHandle::release`]; releasing
//! a handle that was never pooled is a programming error.

use crate::client::{Connection, Payload};
use crate::error::{QbError, QbResult};
use deadpool::managed::{Manager, Metrics, Object, Pool, RecycleResult};
use std::marker::PhantomData;

/// `deadpool` manager that creates connections through an async factory.
pub struct ConnectionManager<C, F> {
    factory: F,
    _conn: PhantomData<fn() -> C>,
}

impl<C, F> ConnectionManager<C, F> {
    /// Create a manager from a connection factory.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _conn: PhantomData,
        }
    }
}

impl<C, F, Fut> Manager for ConnectionManager<C, F>
where
    C: Connection,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = QbResult<C>> + Send,
{
    type Type = C;
    type Error = QbError;

    async fn create(&self) -> QbResult<C> {
        (self.factory)().await
    }

    async fn recycle(&self, _conn: &mut C, _metrics: &Metrics) -> RecycleResult<QbError> {
        Ok(())
    }
}

/// Pool of connections produced by a [`ConnectionManager`].
pub type ConnectionPool<C, F> = Pool<ConnectionManager<C, F>>;

/// Create a connection pool from an async factory.
///
/// # Example
///
/// ```ignore
/// let pool = quarry::pool::create_pool(|| async { MyConn::connect().await }, 16)?;
/// let handle = quarry::pool::checkout(&pool).await?;
/// ```
pub fn create_pool<C, F, Fut>(factory: F, max_size: usize) -> QbResult<ConnectionPool<C, F>>
where
    C: Connection,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = QbResult<C>> + Send,
{
    Pool::builder(ConnectionManager::new(factory))
        .max_size(max_size)
        .build()
        .map_err(|e| QbError::Pool(e.to_string()))
}

/// Check a connection out of a pool, wrapped for explicit release.
pub async fn checkout<M>(pool: &Pool<M>) -> QbResult<DbHandle<M::Type, M>>
where
    M: Manager<Error = QbError>,
    M::Type: Connection,
{
    Ok(DbHandle::Pooled(pool.get().await?))
}

/// Placeholder manager for handles that never came from a pool.
///
/// This only exists so `DbHandle<C>` can be named without a real pool in
/// play; it cannot create connections.
pub struct NoPool<C>(PhantomData<fn() -> C>);

impl<C: Connection> Manager for NoPool<C> {
    type Type = C;
    type Error = QbError;

    async fn create(&self) -> QbResult<C> {
        Err(QbError::Pool(
            "NoPool cannot create connections".to_string(),
        ))
    }

    async fn recycle(&self, _conn: &mut C, _metrics: &Metrics) -> RecycleResult<QbError> {
        Ok(())
    }
}

/// A live connection bound to a builder: standalone or checked out of a pool.
pub enum DbHandle<C: Connection, M: Manager<Type = C> = NoPool<C>> {
    /// A singly-connected handle owned outright.
    Direct(C),
    /// A handle checked out of a pool.
    Pooled(Object<M>),
}

impl<C, M> DbHandle<C, M>
where
    C: Connection,
    M: Manager<Type = C>,
{
    /// Hand a pooled connection back to its pool.
    ///
    /// Calling this on a [`DbHandle::Direct`] handle is a programming
    /// error: there is no pool to return the connection to.
    pub fn release(self) -> QbResult<()> {
        match self {
            DbHandle::Pooled(obj) => {
                drop(obj);
                Ok(())
            }
            DbHandle::Direct(_) => Err(QbError::Pool(
                "release() called on a non-pooled connection".to_string(),
            )),
        }
    }
}

impl<C, M> Connection for DbHandle<C, M>
where
    C: Connection,
    M: Manager<Type = C> + Send + Sync,
{
    async fn execute(&self, sql: &str) -> QbResult<Payload> {
        match self {
            DbHandle::Direct(conn) => conn.execute(sql).await,
            DbHandle::Pooled(obj) => (**obj).execute(sql).await,
        }
    }
}
