use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use memberstore_core::db::{
    BackendCursor, BackendRow, BackendStatement, ConnectionId, ConnectionMethods,
    ConnectionProvider,
};
use memberstore_core::{Error, Result, SqlVal};

/// Which steps of a unit of work should fail.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub acquire: bool,
    pub prepare: bool,
    pub execute: bool,
    pub cursor_close: bool,
    pub statement_close: bool,
    pub connection_release: bool,
}

/// Something that happened to a [`FaultyProvider`] resource.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Acquire(ConnectionId),
    Prepare(String),
    Bind(usize, SqlVal),
    ExecuteUpdate,
    ExecuteQuery,
    CursorClose,
    StatementClose,
    ConnectionRelease(ConnectionId),
}
impl Event {
    /// True for the three release events.
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            Event::CursorClose | Event::StatementClose | Event::ConnectionRelease(_)
        )
    }
}

type EventLog = Arc<Mutex<Vec<Event>>>;

fn injected(step: &str) -> Error {
    Error::Internal(format!("injected {step} failure"))
}

#[derive(Clone, Debug)]
struct Script {
    faults: Faults,
    columns: Vec<String>,
    rows: Vec<Vec<SqlVal>>,
    affected: usize,
}

/// Scripted in-memory provider. Every resource it hands out records what is
/// done to it in a shared event log, and fails where its [`Faults`] say so.
#[derive(Debug)]
pub struct FaultyProvider {
    script: Script,
    events: EventLog,
}

impl FaultyProvider {
    /// A provider that fails where `faults` says, returns no rows from
    /// queries and reports one affected row from updates.
    pub fn new(faults: Faults) -> Self {
        FaultyProvider {
            script: Script {
                faults,
                columns: vec!["member_id".to_string(), "money".to_string()],
                rows: Vec::new(),
                affected: 1,
            },
            events: Arc::default(),
        }
    }
    /// Make queries return `rows`.
    pub fn with_rows(mut self, rows: Vec<Vec<SqlVal>>) -> Self {
        self.script.rows = rows;
        self
    }
    /// Make updates report `affected` rows.
    pub fn with_affected(mut self, affected: usize) -> Self {
        self.script.affected = affected;
        self
    }
    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
    /// Only the release events, in order.
    pub fn releases(&self) -> Vec<Event> {
        self.events().into_iter().filter(Event::is_release).collect()
    }
    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConnectionProvider for FaultyProvider {
    type Connection = FaultyConnection;

    fn acquire(&self) -> Result<FaultyConnection> {
        if self.script.faults.acquire {
            return Err(injected("acquire"));
        }
        let id = ConnectionId::next();
        self.record(Event::Acquire(id));
        Ok(FaultyConnection {
            id,
            script: self.script.clone(),
            events: Arc::clone(&self.events),
        })
    }

    fn release(&self, conn: FaultyConnection) -> Result<()> {
        self.record(Event::ConnectionRelease(conn.id));
        if self.script.faults.connection_release {
            return Err(injected("connection release"));
        }
        Ok(())
    }
}

/// Connection handed out by [`FaultyProvider`].
#[derive(Debug)]
pub struct FaultyConnection {
    id: ConnectionId,
    script: Script,
    events: EventLog,
}

impl ConnectionMethods for FaultyConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn BackendStatement>> {
        if self.script.faults.prepare {
            return Err(injected("prepare"));
        }
        self.events
            .lock()
            .unwrap()
            .push(Event::Prepare(sql.to_string()));
        Ok(Box::new(FaultyStatement {
            script: self.script.clone(),
            events: Arc::clone(&self.events),
        }))
    }
    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[derive(Debug)]
struct FaultyStatement {
    script: Script,
    events: EventLog,
}

impl FaultyStatement {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl BackendStatement for FaultyStatement {
    fn bind(&mut self, index: usize, val: SqlVal) -> Result<()> {
        self.record(Event::Bind(index, val));
        Ok(())
    }
    fn execute_update(&mut self) -> Result<usize> {
        self.record(Event::ExecuteUpdate);
        if self.script.faults.execute {
            return Err(injected("execute"));
        }
        Ok(self.script.affected)
    }
    fn execute_query(&mut self) -> Result<Box<dyn BackendCursor>> {
        self.record(Event::ExecuteQuery);
        if self.script.faults.execute {
            return Err(injected("execute"));
        }
        Ok(Box::new(FaultyCursor {
            columns: self.script.columns.clone(),
            rows: self.script.rows.iter().cloned().collect(),
            current: None,
            fail_close: self.script.faults.cursor_close,
            events: Arc::clone(&self.events),
        }))
    }
    fn close(self: Box<Self>) -> Result<()> {
        self.record(Event::StatementClose);
        if self.script.faults.statement_close {
            return Err(injected("statement close"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FaultyCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<SqlVal>>,
    current: Option<FaultyRow>,
    fail_close: bool,
    events: EventLog,
}

impl BackendCursor for FaultyCursor {
    fn next(&mut self) -> Result<Option<&dyn BackendRow>> {
        self.current = self.rows.pop_front().map(|values| FaultyRow {
            columns: self.columns.clone(),
            values,
        });
        Ok(self.current.as_ref().map(|r| r as &dyn BackendRow))
    }
    fn close(self: Box<Self>) -> Result<()> {
        self.events.lock().unwrap().push(Event::CursorClose);
        if self.fail_close {
            return Err(injected("cursor close"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FaultyRow {
    columns: Vec<String>,
    values: Vec<SqlVal>,
}

impl BackendRow for FaultyRow {
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
