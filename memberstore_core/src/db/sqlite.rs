//! SQLite database backend
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
#[cfg(feature = "log")]
use std::sync::Once;
use std::time::Duration;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};

use super::{Backend, BackendConnection, BackendCursor, BackendRow, BackendStatement};
use super::{Connection, ConnectionId, ConnectionMethods, ConnectionSpec};
use crate::{debug, Error, Result, SqlVal};

/// The name of the sqlite backend.
pub const BACKEND_NAME: &str = "sqlite";

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(feature = "log")]
fn log_callback(error_code: std::ffi::c_int, message: &str) {
    match error_code {
        rusqlite::ffi::SQLITE_NOTICE => {
            #[cfg(feature = "debug")]
            log::trace!("{}", message)
        }
        rusqlite::ffi::SQLITE_OK
        | rusqlite::ffi::SQLITE_DONE
        | rusqlite::ffi::SQLITE_NOTICE_RECOVER_WAL
        | rusqlite::ffi::SQLITE_NOTICE_RECOVER_ROLLBACK => log::info!("{}", message),
        rusqlite::ffi::SQLITE_WARNING | rusqlite::ffi::SQLITE_WARNING_AUTOINDEX => {
            log::warn!("{}", message)
        }
        _ => log::error!("{error_code} {}", message),
    }
}

/// SQLite [`Backend`] implementation.
#[derive(Debug, Default, Clone)]
pub struct SQLiteBackend;
impl SQLiteBackend {
    /// Create the backend.
    pub fn new() -> SQLiteBackend {
        SQLiteBackend {}
    }
}
impl SQLiteBackend {
    /// Open a concrete (unboxed) connection to the database at `spec.endpoint`.
    ///
    /// SQLite has no notion of users, so credentials in the spec are accepted
    /// and ignored.
    pub fn connect_sqlite(&self, spec: &ConnectionSpec) -> Result<SQLiteConnection> {
        if spec.username.is_some() {
            debug!("sqlite ignores credentials for {}", spec.endpoint);
        }
        let connection = SQLiteConnection::open(Path::new(&spec.endpoint))?;
        connection.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(connection)
    }
}

impl Backend for SQLiteBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn connect(&self, spec: &ConnectionSpec) -> Result<Connection> {
        Ok(Connection {
            conn: Box::new(self.connect_sqlite(spec)?),
        })
    }
}

type SharedConnection = Arc<Mutex<rusqlite::Connection>>;

fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, rusqlite::Connection>> {
    conn.lock().map_err(|_| Error::PoisonedConnection)
}

/// SQLite database connection.
///
/// Statements prepared on the connection share the underlying handle, so the
/// connection can only be closed once every statement has been released.
#[derive(Debug)]
pub struct SQLiteConnection {
    conn: SharedConnection,
    id: ConnectionId,
}
impl SQLiteConnection {
    fn open(path: impl AsRef<Path>) -> Result<Self> {
        #[cfg(feature = "log")]
        static INIT_SQLITE_LOGGING: Once = Once::new();

        #[cfg(feature = "log")]
        INIT_SQLITE_LOGGING.call_once(|| {
            _ = unsafe { rusqlite::trace::config_log(Some(log_callback)) };
        });

        let conn = rusqlite::Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(SQLiteConnection {
            conn: Arc::new(Mutex::new(conn)),
            id: ConnectionId::next(),
        })
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!("execute sql {}", sql);
        lock(&self.conn)?.execute_batch(sql)?;
        Ok(())
    }
}

impl ConnectionMethods for SQLiteConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn BackendStatement>> {
        debug!("prepare sql {} on {}", sql, self.id);
        // Compile once up front so syntax and schema errors surface at prepare
        // time. The compiled statement stays in the connection's cache.
        let param_count = lock(&self.conn)?.prepare_cached(sql)?.parameter_count();
        Ok(Box::new(SQLiteStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_string(),
            params: vec![None; param_count],
        }))
    }
    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl BackendConnection for SQLiteConnection {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
    fn is_closed(&self) -> bool {
        false
    }
    fn close(self: Box<Self>) -> Result<()> {
        let SQLiteConnection { conn, id } = *self;
        let conn = Arc::try_unwrap(conn).map_err(|_| Error::ConnectionInUse(id))?;
        let conn = conn.into_inner().map_err(|_| Error::PoisonedConnection)?;
        debug!("closing sqlite connection {}", id);
        conn.close().map_err(|(_, e)| e.into())
    }
}

/// A prepared statement on a [`SQLiteConnection`].
#[derive(Debug)]
pub struct SQLiteStatement {
    conn: SharedConnection,
    sql: String,
    params: Vec<Option<SqlVal>>,
}
impl SQLiteStatement {
    fn bound_params(&self) -> Result<Vec<&SqlVal>> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| p.as_ref().ok_or(Error::UnboundParameter(i + 1)))
            .collect()
    }
}

impl BackendStatement for SQLiteStatement {
    fn bind(&mut self, index: usize, val: SqlVal) -> Result<()> {
        let count = self.params.len();
        match index.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            Some(slot) => {
                *slot = Some(val);
                Ok(())
            }
            None => Err(Error::BoundsError { index, count }),
        }
    }

    fn execute_update(&mut self) -> Result<usize> {
        let params = self.bound_params()?;
        debug!("execute sql {} with {} parameters", self.sql, params.len());
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let affected = stmt.execute(rusqlite::params_from_iter(params))?;
        Ok(affected)
    }

    fn execute_query(&mut self) -> Result<Box<dyn BackendCursor>> {
        let params = self.bound_params()?;
        debug!("query sql {} with {} parameters", self.sql, params.len());
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut buffered = VecDeque::new();
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i).map(sql_val_from_value))
                .collect::<rusqlite::Result<Vec<SqlVal>>>()?;
            buffered.push_back(values);
        }
        Ok(Box::new(SQLiteCursor {
            columns,
            rows: buffered,
            current: None,
        }))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Cursor over the rows of a [`SQLiteStatement`] query.
///
/// The rows are read out of SQLite when the query executes, so the cursor
/// does not hold the connection lock while the caller walks it.
#[derive(Debug)]
pub struct SQLiteCursor {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<SqlVal>>,
    current: Option<SQLiteRow>,
}

impl BackendCursor for SQLiteCursor {
    fn next(&mut self) -> Result<Option<&dyn BackendRow>> {
        self.current = self.rows.pop_front().map(|values| SQLiteRow {
            columns: Arc::clone(&self.columns),
            values,
        });
        Ok(self.current.as_ref().map(|r| r as &dyn BackendRow))
    }
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct SQLiteRow {
    columns: Arc<[String]>,
    values: Vec<SqlVal>,
}

impl BackendRow for SQLiteRow {
    fn len(&self) -> usize {
        self.values.len()
    }
    fn column_name(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(String::as_str)
    }
    fn get(&self, idx: usize) -> Result<&SqlVal> {
        self.values.get(idx).ok_or(Error::BoundsError {
            index: idx,
            count: self.values.len(),
        })
    }
}

fn sql_val_from_value(val: Value) -> SqlVal {
    match val {
        Value::Null => SqlVal::Null,
        Value::Integer(i) => SqlVal::BigInt(i),
        Value::Real(f) => SqlVal::Real(f),
        Value::Text(s) => SqlVal::Text(s),
        Value::Blob(b) => SqlVal::Blob(b),
    }
}

impl rusqlite::ToSql for SqlVal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlVal::Null => ToSqlOutput::Owned(Value::Null),
            SqlVal::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            SqlVal::Int(i) => ToSqlOutput::Owned(Value::Integer(*i as i64)),
            SqlVal::BigInt(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlVal::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlVal::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlVal::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SQLiteConnection {
        SQLiteBackend::new()
            .connect_sqlite(&ConnectionSpec::new(BACKEND_NAME, ":memory:"))
            .unwrap()
    }

    #[test]
    fn bind_rejects_out_of_range_index() {
        let conn = memory();
        let mut stmt = conn.prepare("select ?").unwrap();
        assert!(matches!(
            stmt.bind(0, SqlVal::Int(1)),
            Err(Error::BoundsError { index: 0, count: 1 })
        ));
        assert!(matches!(
            stmt.bind(2, SqlVal::Int(1)),
            Err(Error::BoundsError { index: 2, count: 1 })
        ));
    }

    #[test]
    fn unbound_parameter_fails_execution() {
        let conn = memory();
        let mut stmt = conn.prepare("select ?, ?").unwrap();
        stmt.bind(1, SqlVal::Int(1)).unwrap();
        assert!(matches!(
            stmt.execute_query(),
            Err(Error::UnboundParameter(2))
        ));
    }

    #[test]
    fn cursor_starts_before_first_row() {
        let conn = memory();
        let mut stmt = conn
            .prepare("select 'memberA' as member_id, 10 as money")
            .unwrap();
        let mut cursor = stmt.execute_query().unwrap();
        let row = cursor.next().unwrap().unwrap();
        assert_eq!(row.get_as::<String>("member_id").unwrap(), "memberA");
        assert_eq!(row.get_as::<i64>("MONEY").unwrap(), 10);
        assert!(cursor.next().unwrap().is_none());
    }

    #[test]
    fn close_refused_while_statement_open() {
        let conn = Box::new(memory());
        let id = conn.id();
        let stmt = conn.prepare("select 1").unwrap();
        assert!(matches!(conn.close(), Err(Error::ConnectionInUse(i)) if i == id));
        drop(stmt);
    }

    #[test]
    fn close_after_statement_released() {
        let conn = Box::new(memory());
        let stmt = conn.prepare("select 1").unwrap();
        stmt.close().unwrap();
        conn.close().unwrap();
    }
}
