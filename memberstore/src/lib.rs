//! Member account storage over a pluggable connection strategy.
//!
//! A [`MemberRepository`] runs one statement per operation against the
//! `member` relation. Every connection, statement and cursor it opens is
//! released before the operation returns, on success and on failure alike.
//!
//! ```no_run
//! use memberstore::db::{ConnectionSpec, PoolConfig, PooledProvider};
//! use memberstore::{Member, MemberRepository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = ConnectionSpec::new("sqlite", "members.db");
//! let provider = PooledProvider::new(spec, &PoolConfig::new(10, "MyPool"))?;
//! let repository = MemberRepository::new(provider);
//!
//! repository.create(Member::new("memberV100", 70000))?;
//! assert_eq!(repository.update("memberV100", 20000)?, 1);
//! assert_eq!(repository.find_by_id("memberV100")?.balance, 20000);
//! repository.delete("memberV100")?;
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

use thiserror::Error as ThisError;

pub mod db {
    //! Connection providers and the handles they lease. See [`memberstore_core::db`].
    pub use memberstore_core::db::*;
}

mod member;
mod repository;

pub use member::Member;
pub use repository::MemberRepository;

/// Result type that uses [`crate::Error`].
pub type Result<T> = std::result::Result<T, crate::Error>;

/// Outcome of a failed repository operation.
///
/// Exactly one kind is reported per call. Release problems during cleanup
/// are logged and never reach the caller.
#[derive(Debug, ThisError)]
pub enum Error {
    /// No connection could be acquired from the provider.
    #[error("Could not acquire a connection: {0}")]
    Connection(#[source] memberstore_core::Error),
    /// A statement could not be prepared, executed or read after a
    /// connection was acquired.
    #[error("Storage error: {0}")]
    Storage(#[source] memberstore_core::Error),
    /// No member exists with the requested id.
    #[error("No member found with id {0}")]
    NotFound(String),
}

impl Error {
    /// True if this is the expected "no such member" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
