//! Shared models for the spendwise REST and push contracts.
//!
//! Wire types mirror the backend's JSON field names exactly; the domain
//! types they convert into ([`BalanceSnapshot`], [`TransactionRecord`])
//! are what the rest of the crate works with.

pub mod balance;
pub mod push;
pub mod transaction;
pub mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use balance::{BalanceSnapshot, BalancesResponse};
pub use push::PushMessage;
pub use transaction::{
    NewTransaction, TransactionId, TransactionKind, TransactionRecord, TransactionResponse,
};
pub use user::{UserProfile, ValidateResponse};

/// Identifier of the account whose balances and transactions are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Returns the raw integer id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        AccountId(id)
    }
}

/// Error body returned by the backend on non-success responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
