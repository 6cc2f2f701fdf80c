//! Library providing the connection lifecycle used by the memberstore repository.
//!
//! Everything a repository operation opens (a connection, a prepared
//! statement, a result cursor) is obtained through the types in [`db`] and
//! released through [`db::closer`], in reverse order of acquisition.
#![allow(clippy::upper_case_acronyms)]
#![deny(missing_docs)]

use thiserror::Error as ThisError;

pub mod db;
pub mod sqlval;

pub use sqlval::{FromSql, SqlType, SqlVal, ToSql};

/// Result type that uses [`crate::Error`].
pub type Result<T> = std::result::Result<T, crate::Error>;

/// Errors raised by backends, providers and statement handles.
#[allow(missing_docs)]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Parameter index {index} out of bounds, statement has {count} parameters")]
    BoundsError { index: usize, count: usize },
    #[error("Parameter {0} was never bound")]
    UnboundParameter(usize),
    #[error("Type mismatch converting SqlVal. Expected {0}, found value {1:?}")]
    CannotConvertSqlVal(SqlType, SqlVal),
    #[error("Column \"{0}\" not present in result row")]
    ColumnNotFound(String),
    #[error("The {0} has already been released")]
    Released(&'static str),
    #[error("A {0} is already open in this scope")]
    AlreadyOpen(&'static str),
    #[error("No {0} has been opened in this scope")]
    NotOpen(&'static str),
    #[error("Connection {0} is still referenced by an open statement")]
    ConnectionInUse(db::ConnectionId),
    #[error("This connection has been poisoned by a panicking thread.")]
    PoisonedConnection,
    #[error("Unknown backend {0}")]
    UnknownBackend(String),
    #[error("Internal logic error {0}")]
    Internal(String),
    #[error("(De)serialization error {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
    #[cfg(feature = "sqlite")]
    #[error("Sqlite error {0}")]
    SQLite(#[from] rusqlite::Error),
    #[cfg(feature = "r2d2")]
    #[error("Pool error {0}")]
    Pool(#[from] r2d2::Error),
}

#[cfg(feature = "log")]
pub use log::debug;
#[cfg(feature = "log")]
pub use log::error;
#[cfg(feature = "log")]
pub use log::info;
#[cfg(feature = "log")]
pub use log::warn;

#[cfg(not(feature = "log"))]
mod mslog {
    // this module is just for grouping -- macro_export puts them in the crate root

    /// Noop for when feature log is not enabled.
    #[macro_export]
    macro_rules! debug {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }

    /// Noop for when feature log is not enabled.
    #[macro_export]
    macro_rules! info {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }

    /// Noop for when feature log is not enabled.
    #[macro_export]
    macro_rules! warn {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }

    /// Noop for when feature log is not enabled.
    #[macro_export]
    macro_rules! error {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }
}
