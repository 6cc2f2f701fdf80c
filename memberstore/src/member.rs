use std::fmt;

use serde::{Deserialize, Serialize};

/// A member account.
///
/// `id` is the external identifier and never changes once the member has
/// been created. Only `balance` is mutable in storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Unique external identifier, stored as `member_id`.
    pub id: String,
    /// Account balance, stored as `money`.
    pub balance: i64,
}

impl Member {
    /// Create a member record.
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        Member {
            id: id.into(),
            balance,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member(id={}, balance={})", self.id, self.balance)
    }
}
