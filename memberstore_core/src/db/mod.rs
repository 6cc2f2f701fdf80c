//! Types, traits, and methods for talking to the backing store.
//!
//! The handles follow the lifecycle of a single unit of work:
//! * A connection is leased from a [`ConnectionProvider`]. The provider decides
//!   whether that means dialing a new physical connection ([`DirectDial`]) or
//!   checking one out of a pool (`PooledProvider`, with the `r2d2` feature).
//! * `ConnectionMethods` is the trait for anything that can prepare a statement:
//!   a [`Connection`], a concrete backend connection, or a pooled lease.
//! * A [`BackendStatement`] is prepared on a connection and owns its bound parameters.
//! * A [`BackendCursor`] is produced by executing a query statement and yields
//!   [`BackendRow`]s one at a time.
//!
//! Release runs in the reverse order (cursor, statement, connection) through
//! [`closer::release`], normally by way of a [`Scope`].

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::fs;
use std::io::Write;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, FromSql, Result, SqlVal};

pub mod closer;
mod provider;
#[cfg(feature = "r2d2")]
pub mod r2;
mod scope;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use provider::{ConnectionProvider, DirectDial};
#[cfg(feature = "r2d2")]
pub use r2::{ConnectionManager, PooledProvider};
pub use scope::Scope;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a physical connection, used for monitoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);
impl ConnectionId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
    /// The raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}
impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn{}", self.0)
    }
}

/// Methods available on anything that can prepare statements.
pub trait ConnectionMethods: Debug {
    /// Prepare `sql`. Placeholders are bound positionally, starting at 1.
    fn prepare(&self, sql: &str) -> Result<Box<dyn BackendStatement>>;
    /// Identity of the underlying physical connection.
    fn id(&self) -> ConnectionId;
}

/// Database connection.
pub trait BackendConnection: ConnectionMethods + Send + 'static {
    /// Name of the backend this connection belongs to.
    fn backend_name(&self) -> &'static str;
    /// Tests if the connection has been closed. Backends which do not
    /// support this check should return false.
    fn is_closed(&self) -> bool;
    /// Physically close the connection.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A prepared, parameterized statement bound to one connection.
pub trait BackendStatement: Debug + Send {
    /// Bind `val` to the 1-based placeholder `index`.
    fn bind(&mut self, index: usize, val: SqlVal) -> Result<()>;
    /// Execute a mutation, returning the number of affected rows.
    fn execute_update(&mut self) -> Result<usize>;
    /// Execute a query. The returned cursor is positioned before the first row.
    fn execute_query(&mut self) -> Result<Box<dyn BackendCursor>>;
    /// Release the statement.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Iterator over the rows produced by a query statement.
pub trait BackendCursor: Debug + Send {
    /// Advance one row. Returns `None` once the rows are exhausted.
    fn next(&mut self) -> Result<Option<&dyn BackendRow>>;
    /// Release the cursor.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A single row produced by a [`BackendCursor`].
pub trait BackendRow {
    /// Number of columns in the row.
    fn len(&self) -> usize;
    /// Name of the column at `idx`.
    fn column_name(&self, idx: usize) -> Option<&str>;
    /// Value of the column at `idx`.
    fn get(&self, idx: usize) -> Result<&SqlVal>;
    /// Returns true if there are no columns in the row.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl dyn BackendRow + '_ {
    /// Read the column named `column`, converting it to `T`.
    pub fn get_as<T: FromSql>(&self, column: &str) -> Result<T> {
        let idx = (0..self.len())
            .find(|i| {
                self.column_name(*i)
                    .is_some_and(|name| name.eq_ignore_ascii_case(column))
            })
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        T::from_sql(self.get(idx)?.clone())
    }
}

/// Database connection. May be a connection to any type of database
/// as it is a boxed abstraction over a specific connection.
#[derive(Debug)]
pub struct Connection {
    conn: Box<dyn BackendConnection>,
}
impl Connection {
    /// Physically close the connection.
    pub fn close(self) -> Result<()> {
        self.conn.close()
    }
    /// Prepare and run a statement that takes no parameters.
    pub fn execute(&self, sql: impl AsRef<str>) -> Result<usize> {
        let mut stmt = self.conn.prepare(sql.as_ref())?;
        let affected = stmt.execute_update();
        stmt.close()?;
        affected
    }
}
impl ConnectionMethods for Connection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn BackendStatement>> {
        self.conn.prepare(sql)
    }
    fn id(&self) -> ConnectionId {
        self.conn.id()
    }
}
impl BackendConnection for Connection {
    fn backend_name(&self) -> &'static str {
        self.conn.backend_name()
    }
    fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
    fn close(self: Box<Self>) -> Result<()> {
        (*self).close()
    }
}

/// Connection specification. Contains the name of a database backend, the
/// network location (or path) of the store, and the credentials to present.
/// See [connect][crate::db::connect] to make a [Connection][crate::db::Connection]
/// from a `ConnectionSpec`.
#[allow(missing_docs)]
#[derive(Clone, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConnectionSpec {
    /// Backend to connect with, see [`get_backend`].
    pub backend_name: String,
    /// Network location of the store. For SQLite, the database path.
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}
impl ConnectionSpec {
    /// Create a spec without credentials.
    pub fn new(backend_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        ConnectionSpec {
            backend_name: backend_name.into(),
            endpoint: endpoint.into(),
            username: None,
            password: None,
        }
    }
    /// Attach credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
    /// Save the connection spec to the filesystem for later use.
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = conn_complete_if_dir(path);
        let mut f = fs::File::create(path)?;
        f.write_all(serde_json::to_string(self)?.as_bytes())
            .map_err(|e| e.into())
    }
    /// Load a previously saved connection spec.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = conn_complete_if_dir(path.as_ref());
        serde_json::from_reader(fs::File::open(path)?).map_err(|e| e.into())
    }
    /// Look up the backend named by this spec.
    pub fn get_backend(&self) -> Result<Box<dyn Backend>> {
        get_backend(&self.backend_name)
            .ok_or_else(|| Error::UnknownBackend(self.backend_name.clone()))
    }
}
impl Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("backend_name", &self.backend_name)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

fn conn_complete_if_dir(path: &Path) -> Cow<Path> {
    if path.is_dir() {
        Cow::from(path.join("connection.json"))
    } else {
        Cow::from(path)
    }
}

/// Pool settings used by the pooled provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on concurrently leased connections.
    pub max_size: u32,
    /// Label attached to pool log lines.
    pub name: String,
    /// How long `acquire` waits for a free connection before failing.
    pub connection_timeout: Duration,
    /// Idle connections to keep open. `None` keeps `max_size` open.
    pub min_idle: Option<u32>,
}
impl PoolConfig {
    /// Create a config with the given size and name, and default timeouts.
    pub fn new(max_size: u32, name: impl Into<String>) -> Self {
        PoolConfig {
            max_size,
            name: name.into(),
            ..Default::default()
        }
    }
}
impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_size: 10,
            name: "memberstore-pool".to_string(),
            connection_timeout: Duration::from_secs(30),
            min_idle: None,
        }
    }
}

/// Database backend. A boxed implementation can be returned by name via [get_backend][crate::db::get_backend].
pub trait Backend: Send + Sync {
    /// Name used to select this backend in a [`ConnectionSpec`].
    fn name(&self) -> &'static str;
    /// Open a new physical connection.
    fn connect(&self, spec: &ConnectionSpec) -> Result<Connection>;
}

impl Backend for Box<dyn Backend> {
    fn name(&self) -> &'static str {
        self.deref().name()
    }
    fn connect(&self, spec: &ConnectionSpec) -> Result<Connection> {
        self.deref().connect(spec)
    }
}

/// Find a backend by name.
pub fn get_backend(name: &str) -> Option<Box<dyn Backend>> {
    match name {
        #[cfg(feature = "sqlite")]
        sqlite::BACKEND_NAME => Some(Box::new(sqlite::SQLiteBackend::new())),
        _ => None,
    }
}

/// Connect to a database. For non-boxed connections, see individual
/// [Backend][crate::db::Backend] implementations.
pub fn connect(spec: &ConnectionSpec) -> Result<Connection> {
    spec.get_backend()?.connect(spec)
}
