use std::fmt::Debug;
use std::sync::Arc;

use super::{Backend, Connection, ConnectionMethods, ConnectionSpec};
use crate::{info, Result};

/// Source of connections for a unit of work.
///
/// Implementations are shared by every caller of a repository, so `acquire`
/// and `release` may be called concurrently and must do their own
/// synchronization. Every connection handed out by `acquire` is handed back
/// exactly once through `release`, after which the caller never touches it
/// again.
pub trait ConnectionProvider: Send + Sync {
    /// The handle leased to the caller.
    type Connection: ConnectionMethods + Send;

    /// Lease a connection. May block until one becomes available.
    fn acquire(&self) -> Result<Self::Connection>;

    /// Give a leased connection back. Depending on the strategy this either
    /// closes the physical connection or returns it for reuse.
    fn release(&self, conn: Self::Connection) -> Result<()>;
}

impl<P: ConnectionProvider> ConnectionProvider for Arc<P> {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        (**self).acquire()
    }
    fn release(&self, conn: Self::Connection) -> Result<()> {
        (**self).release(conn)
    }
}

/// Provider that dials a new physical connection on every `acquire` and
/// closes it on `release`. Nothing is reused.
pub struct DirectDial {
    spec: ConnectionSpec,
    backend: Box<dyn Backend>,
}
impl DirectDial {
    /// Create a provider for `spec`. Fails if the spec names an unknown backend.
    pub fn new(spec: ConnectionSpec) -> Result<Self> {
        let backend = spec.get_backend()?;
        Ok(DirectDial { spec, backend })
    }
    /// The spec every connection is dialed with.
    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }
}
impl Debug for DirectDial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectDial")
            .field("spec", &self.spec)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ConnectionProvider for DirectDial {
    type Connection = Connection;

    fn acquire(&self) -> Result<Connection> {
        let conn = self.backend.connect(&self.spec)?;
        info!(
            "get connection={}, backend={}, endpoint={}",
            conn.id(),
            self.backend.name(),
            self.spec.endpoint
        );
        Ok(conn)
    }

    fn release(&self, conn: Connection) -> Result<()> {
        conn.close()
    }
}
