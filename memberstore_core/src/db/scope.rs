use std::fmt;

use super::{closer, BackendCursor, BackendStatement, ConnectionMethods, ConnectionProvider};
use crate::{Error, Result};

/// Resources opened for one unit of work.
///
/// A scope holds at most one connection, one statement and one cursor,
/// acquired in that order. Dropping the scope releases whatever it holds
/// through [`closer::release`], whether the work returned normally, bailed
/// out early with `?`, or is unwinding from a panic.
pub struct Scope<'p, P: ConnectionProvider + ?Sized> {
    provider: &'p P,
    conn: Option<P::Connection>,
    statement: Option<Box<dyn BackendStatement>>,
    cursor: Option<Box<dyn BackendCursor>>,
}

impl<'p, P: ConnectionProvider + ?Sized> Scope<'p, P> {
    /// Acquire a connection from `provider`.
    pub fn open(provider: &'p P) -> Result<Self> {
        let conn = provider.acquire()?;
        Ok(Scope {
            provider,
            conn: Some(conn),
            statement: None,
            cursor: None,
        })
    }

    /// The leased connection.
    pub fn connection(&self) -> Result<&P::Connection> {
        self.conn.as_ref().ok_or(Error::Released("connection"))
    }

    /// Prepare the scope's statement on its connection.
    pub fn prepare(&mut self, sql: &str) -> Result<&mut dyn BackendStatement> {
        if self.statement.is_some() {
            return Err(Error::AlreadyOpen("statement"));
        }
        let stmt = self.connection()?.prepare(sql)?;
        Ok(&mut **self.statement.insert(stmt))
    }

    /// The prepared statement.
    pub fn statement(&mut self) -> Result<&mut dyn BackendStatement> {
        match self.statement.as_mut() {
            Some(stmt) => Ok(&mut **stmt),
            None => Err(Error::NotOpen("statement")),
        }
    }

    /// Execute the prepared statement as a query and open the scope's cursor.
    pub fn query(&mut self) -> Result<&mut dyn BackendCursor> {
        if self.cursor.is_some() {
            return Err(Error::AlreadyOpen("cursor"));
        }
        let cursor = self.statement()?.execute_query()?;
        Ok(&mut **self.cursor.insert(cursor))
    }
}

impl<P: ConnectionProvider + ?Sized> Drop for Scope<'_, P> {
    fn drop(&mut self) {
        closer::release(
            self.provider,
            self.conn.take(),
            self.statement.take(),
            self.cursor.take(),
        );
    }
}

impl<P: ConnectionProvider + ?Sized> fmt::Debug for Scope<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("connection", &self.conn.as_ref().map(|c| c.id()))
            .field("statement", &self.statement.is_some())
            .field("cursor", &self.cursor.is_some())
            .finish()
    }
}
