use memberstore_core::db::{BackendRow, ConnectionProvider, Scope};
use memberstore_core::{error, info, ToSql};

use crate::{Error, Member, Result};

const INSERT_SQL: &str = "insert into member(member_id, money) values(?, ?)";
const SELECT_SQL: &str = "select member_id, money from member where member_id = ?";
const UPDATE_SQL: &str = "update member set money = ? where member_id = ?";
const DELETE_SQL: &str = "delete from member where member_id = ?";

/// CRUD over the `member` relation.
///
/// Each operation is an independent unit of work: it acquires its own
/// connection from the provider, runs a single statement and releases
/// everything it opened before returning. The repository holds no other
/// state, so one instance can be shared across threads as long as the
/// provider can.
#[derive(Debug)]
pub struct MemberRepository<P> {
    provider: P,
}

/// Map a failure after acquisition to [`Error::Storage`], logging it where it was detected.
fn storage(op: &'static str) -> impl FnOnce(memberstore_core::Error) -> Error {
    move |e| {
        error!("db error during {}: {}", op, e);
        Error::Storage(e)
    }
}

fn member_from_row(row: &dyn BackendRow) -> memberstore_core::Result<Member> {
    Ok(Member {
        id: row.get_as("member_id")?,
        balance: row.get_as("money")?,
    })
}

impl<P: ConnectionProvider> MemberRepository<P> {
    /// Create a repository drawing connections from `provider`.
    pub fn new(provider: P) -> Self {
        MemberRepository { provider }
    }

    /// The provider connections are drawn from.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn open(&self, op: &'static str) -> Result<Scope<'_, P>> {
        Scope::open(&self.provider).map_err(|e| {
            error!("could not acquire connection for {}: {}", op, e);
            Error::Connection(e)
        })
    }

    /// Insert `member`. Returns it unchanged, since the store generates no fields.
    pub fn create(&self, member: Member) -> Result<Member> {
        let mut scope = self.open("create")?;
        let stmt = scope.prepare(INSERT_SQL).map_err(storage("create"))?;
        stmt.bind(1, member.id.to_sql())
            .and_then(|_| stmt.bind(2, member.balance.to_sql()))
            .and_then(|_| stmt.execute_update())
            .map_err(storage("create"))?;
        Ok(member)
    }

    /// Load the member with the given id.
    ///
    /// Fails with [`Error::NotFound`] if there is no such member.
    pub fn find_by_id(&self, id: &str) -> Result<Member> {
        let mut scope = self.open("find_by_id")?;
        scope
            .prepare(SELECT_SQL)
            .and_then(|stmt| stmt.bind(1, id.to_sql()))
            .map_err(storage("find_by_id"))?;
        let cursor = scope.query().map_err(storage("find_by_id"))?;
        let found = match cursor.next().map_err(storage("find_by_id"))? {
            Some(row) => Some(member_from_row(row).map_err(storage("find_by_id"))?),
            None => None,
        };
        found.ok_or_else(|| {
            info!("member not found id={}", id);
            Error::NotFound(id.to_string())
        })
    }

    /// Set the balance of the member with the given id.
    ///
    /// Returns the number of rows changed: 1 if the member exists, 0 if not.
    /// A missing member is not an error here; the caller decides what a
    /// count of 0 means.
    pub fn update(&self, id: &str, balance: i64) -> Result<usize> {
        let mut scope = self.open("update")?;
        let stmt = scope.prepare(UPDATE_SQL).map_err(storage("update"))?;
        let affected = stmt
            .bind(1, balance.to_sql())
            .and_then(|_| stmt.bind(2, id.to_sql()))
            .and_then(|_| stmt.execute_update())
            .map_err(storage("update"))?;
        info!("update member {}: affected={}", id, affected);
        Ok(affected)
    }

    /// Remove the member with the given id.
    ///
    /// Failures propagate as [`Error::Storage`] like every other operation.
    /// Deleting an id that does not exist succeeds.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut scope = self.open("delete")?;
        let stmt = scope.prepare(DELETE_SQL).map_err(storage("delete"))?;
        let affected = stmt
            .bind(1, id.to_sql())
            .and_then(|_| stmt.execute_update())
            .map_err(storage("delete"))?;
        info!("delete member {}: affected={}", id, affected);
        Ok(())
    }
}
