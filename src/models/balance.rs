//! Balance models.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::transaction::{TransactionRecord, TransactionResponse, into_records};
use crate::{Result, SpendwiseError};

/// Response from `GET /api/transactions/balances/{userId}`, also pushed
/// verbatim over the balance socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub total_balance: Decimal,
    /// Per-wallet balances keyed by wallet name (e.g. "Cash", "Card").
    /// Required: a frame without it would blank every wallet.
    pub wallets: BTreeMap<String, Decimal>,
    /// Server-assigned version; older backends omit it.
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub transactions: Option<Vec<TransactionResponse>>,
}

/// Authoritative state of an account at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub total_balance: Decimal,
    pub wallet_balances: BTreeMap<String, Decimal>,
    pub sequence: Option<u64>,
    /// Latest-first; `None` when the source did not include transactions.
    pub transactions: Option<Vec<TransactionRecord>>,
}

impl BalanceSnapshot {
    /// Returns the balance of a wallet, or zero if the wallet is unknown.
    pub fn wallet(&self, name: &str) -> Decimal {
        self.wallet_balances
            .get(name)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// CRC32 over the snapshot's content, ignoring `sequence`.
    ///
    /// Amounts are normalized first, so `100` and `100.00` hash alike.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.total_balance.normalize().to_string().as_bytes());
        for (name, amount) in &self.wallet_balances {
            hasher.update(b"\x1fw");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(amount.normalize().to_string().as_bytes());
        }
        if let Some(transactions) = &self.transactions {
            for tx in transactions {
                hasher.update(b"\x1ft");
                hasher.update(tx.id.as_str().as_bytes());
                hasher.update(tx.kind.as_str().as_bytes());
                hasher.update(tx.amount.normalize().to_string().as_bytes());
                hasher.update(tx.occurred_at.to_string().as_bytes());
                hasher.update(tx.category.as_bytes());
            }
        }
        hasher.finalize()
    }

    /// Returns a copy of this snapshot with its transaction list replaced.
    pub fn with_transactions(
        &self,
        sequence: Option<u64>,
        transactions: Vec<TransactionRecord>,
    ) -> BalanceSnapshot {
        BalanceSnapshot {
            total_balance: self.total_balance,
            wallet_balances: self.wallet_balances.clone(),
            sequence,
            transactions: Some(transactions),
        }
    }
}

impl TryFrom<BalancesResponse> for BalanceSnapshot {
    type Error = SpendwiseError;

    fn try_from(raw: BalancesResponse) -> Result<Self> {
        let transactions = raw.transactions.map(into_records).transpose()?;

        Ok(BalanceSnapshot {
            total_balance: raw.total_balance,
            wallet_balances: raw.wallets,
            sequence: raw.sequence,
            transactions,
        })
    }
}
