//! R2D2 support for memberstore: the pooled connection strategy.
use std::fmt;

use r2d2::event::{CheckinEvent, CheckoutEvent, HandleEvent, TimeoutEvent};
pub use r2d2::ManageConnection;

use super::{Backend, BackendConnection, BackendStatement, Connection, ConnectionId};
use super::{ConnectionMethods, ConnectionProvider, ConnectionSpec, PoolConfig};
use crate::{debug, info, warn, Result};

/// Implements [`r2d2::ManageConnection`] by dialing through the backend named in a [`ConnectionSpec`].
pub struct ConnectionManager {
    spec: ConnectionSpec,
    backend: Box<dyn Backend>,
}
impl ConnectionManager {
    /// Create a manager for `spec`. Fails if the spec names an unknown backend.
    pub fn new(spec: ConnectionSpec) -> Result<Self> {
        let backend = spec.get_backend()?;
        Ok(ConnectionManager { spec, backend })
    }
}
impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("spec", &self.spec)
            .finish()
    }
}

impl ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = crate::Error;

    fn connect(&self) -> Result<Self::Connection> {
        self.backend.connect(&self.spec)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<()> {
        let mut stmt = conn.prepare("SELECT 1")?;
        let checked = stmt.execute_query().and_then(|cursor| cursor.close());
        stmt.close()?;
        checked
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

impl ConnectionMethods for r2d2::PooledConnection<ConnectionManager> {
    fn prepare(&self, sql: &str) -> Result<Box<dyn BackendStatement>> {
        (**self).prepare(sql)
    }
    fn id(&self) -> ConnectionId {
        (**self).id()
    }
}

/// Logs pool checkouts and checkins with r2d2's connection id.
#[derive(Debug)]
struct PoolEventLogger {
    pool_name: String,
}

impl HandleEvent for PoolEventLogger {
    fn handle_checkout(&self, event: CheckoutEvent) {
        debug!(
            "{} checkout pool connection {} after {:?}",
            self.pool_name,
            event.connection_id(),
            event.duration()
        );
    }
    fn handle_checkin(&self, event: CheckinEvent) {
        debug!(
            "{} checkin pool connection {} after {:?} in use",
            self.pool_name,
            event.connection_id(),
            event.duration()
        );
    }
    fn handle_timeout(&self, event: TimeoutEvent) {
        warn!(
            "{} timed out after {:?} waiting for a connection",
            self.pool_name,
            event.timeout()
        );
    }
}

/// Provider that leases connections from a fixed-capacity r2d2 pool.
///
/// `release` hands the connection back to the pool's free list rather than
/// closing it, so the next `acquire` on any thread may receive it again.
pub struct PooledProvider {
    pool: r2d2::Pool<ConnectionManager>,
    name: String,
}
impl PooledProvider {
    /// Build the pool. Blocks until the pool's minimum idle connections are open.
    pub fn new(spec: ConnectionSpec, config: &PoolConfig) -> Result<Self> {
        let manager = ConnectionManager::new(spec)?;
        let pool = r2d2::Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .event_handler(Box::new(PoolEventLogger {
                pool_name: config.name.clone(),
            }))
            .build(manager)?;
        info!(
            "{} started with max_size={}",
            config.name, config.max_size
        );
        Ok(PooledProvider {
            pool,
            name: config.name.clone(),
        })
    }
    /// Label given to the pool in its config.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Current connection counts.
    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }
    /// Upper bound on concurrently leased connections.
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}
impl fmt::Debug for PooledProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledProvider")
            .field("name", &self.name)
            .field("state", &self.pool.state())
            .finish()
    }
}

impl ConnectionProvider for PooledProvider {
    type Connection = r2d2::PooledConnection<ConnectionManager>;

    fn acquire(&self) -> Result<Self::Connection> {
        let conn = self.pool.get()?;
        info!("get connection={}, pool={}", conn.id(), self.name);
        Ok(conn)
    }

    fn release(&self, conn: Self::Connection) -> Result<()> {
        debug!("return connection={} to pool={}", conn.id(), self.name);
        drop(conn);
        Ok(())
    }
}
