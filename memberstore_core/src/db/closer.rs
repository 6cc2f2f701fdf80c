//! Ordered, failure-isolated release of the resources opened for one unit of work.
use std::fmt;

use thiserror::Error as ThisError;

use super::{BackendCursor, BackendStatement, ConnectionProvider};
use crate::{warn, Error};

/// Kind of resource being released, for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resource {
    Cursor,
    Statement,
    Connection,
}
impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cursor => "cursor",
            Resource::Statement => "statement",
            Resource::Connection => "connection",
        }
        .fmt(f)
    }
}

/// A failed release step. Only ever logged.
#[derive(Debug, ThisError)]
#[error("{resource} release error: {source}")]
struct ReleaseError {
    resource: Resource,
    source: Error,
}

fn attempt(resource: Resource, step: impl FnOnce() -> crate::Result<()>) {
    if let Err(source) = step() {
        warn!("{}", ReleaseError { resource, source });
    }
}

/// Release a cursor, a statement and a connection, in that order.
///
/// Any of the three may be absent. Each step is attempted even if an earlier
/// one failed; failures are logged and never returned, so this is safe to
/// call on every exit path of an operation without masking the operation's
/// own result.
pub fn release<P>(
    provider: &P,
    conn: Option<P::Connection>,
    statement: Option<Box<dyn BackendStatement>>,
    cursor: Option<Box<dyn BackendCursor>>,
) where
    P: ConnectionProvider + ?Sized,
{
    if let Some(cursor) = cursor {
        attempt(Resource::Cursor, || cursor.close());
    }
    if let Some(statement) = statement {
        attempt(Resource::Statement, || statement.close());
    }
    if let Some(conn) = conn {
        attempt(Resource::Connection, || provider.release(conn));
    }
}
