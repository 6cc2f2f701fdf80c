//! Test helpers to set up member stores and instrumented connection providers.
//!
//! * [`sqlite_setup`] creates a temporary SQLite database holding the
//!   `member` relation; [`sqlite_setup_without_schema`] creates one without
//!   it, so every statement against it fails.
//! * [`CountingProvider`] wraps any provider and counts leases.
//! * [`FaultyProvider`] is a scripted in-memory backend which fails on
//!   demand and records the order in which resources were released.
#![deny(missing_docs)]

mod counting;
mod faulty;

use std::path::PathBuf;

use memberstore_core::db::sqlite::BACKEND_NAME;
use memberstore_core::db::{connect, ConnectionSpec, DirectDial, PoolConfig, PooledProvider};
use tempfile::TempDir;

pub use counting::CountingProvider;
pub use faulty::{Event, Faults, FaultyConnection, FaultyProvider};

/// DDL for the relation the repository works against.
pub const MEMBER_SCHEMA: &str = "create table member (
    member_id varchar(10) not null,
    money integer not null default 0,
    primary key (member_id)
)";

/// A temporary SQLite database file. Removed when dropped.
pub struct SQLiteSetupData {
    _dir: TempDir,
    path: PathBuf,
    conn_str: String,
}
impl SQLiteSetupData {
    /// Path of the database file, as a connection string.
    pub fn connection_string(&self) -> &str {
        &self.conn_str
    }
    /// Path of the database file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
    /// A [`ConnectionSpec`] for the database, with throwaway credentials.
    pub fn connspec(&self) -> ConnectionSpec {
        ConnectionSpec::new(BACKEND_NAME, self.conn_str.clone()).with_credentials("sa", "")
    }
    /// A direct-dial provider for the database.
    pub fn direct_dial(&self) -> DirectDial {
        DirectDial::new(self.connspec()).expect("sqlite backend is available")
    }
    /// A pooled provider for the database.
    pub fn pooled(&self, max_size: u32) -> PooledProvider {
        let config = PoolConfig::new(max_size, "MyPool");
        PooledProvider::new(self.connspec(), &config).expect("could not build pool")
    }
}

fn temp_database() -> SQLiteSetupData {
    common_setup();
    let dir = tempfile::Builder::new()
        .prefix("memberstore")
        .tempdir()
        .expect("could not create temp dir");
    let path = dir.path().join("member.db");
    let conn_str = path.to_string_lossy().into_owned();
    SQLiteSetupData {
        _dir: dir,
        path,
        conn_str,
    }
}

/// Create a temporary SQLite database holding an empty `member` relation.
pub fn sqlite_setup() -> SQLiteSetupData {
    let data = temp_database();
    log::info!("creating member schema in {}", data.connection_string());
    let conn = connect(&data.connspec()).expect("could not connect sqlite backend");
    conn.execute(MEMBER_SCHEMA).expect("could not create member table");
    conn.close().expect("could not close setup connection");
    data
}

/// Create a temporary SQLite database with no relations at all.
pub fn sqlite_setup_without_schema() -> SQLiteSetupData {
    temp_database()
}

/// Tear down a test database.
pub fn sqlite_teardown(_: SQLiteSetupData) {}

/// Initialise test logging. Safe to call repeatedly.
pub fn common_setup() {
    env_logger::try_init().ok();
}
