//! Push channel payloads.
//!
//! The balance socket sends JSON text frames in one of two shapes:
//! a bare balances object (a full snapshot), or
//! `{"type": "update", "transactions": [...]}` carrying only the
//! transaction list.

use serde::Deserialize;

use super::balance::{BalanceSnapshot, BalancesResponse};
use super::transaction::{TransactionRecord, TransactionResponse, into_records};
use crate::{Result, SpendwiseError};

/// A parsed push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// A full account snapshot.
    Balances(BalanceSnapshot),
    /// A replacement transaction list for the currently held snapshot.
    Transactions {
        sequence: Option<u64>,
        transactions: Vec<TransactionRecord>,
    },
}

#[derive(Deserialize)]
struct TransactionsUpdate {
    transactions: Vec<TransactionResponse>,
    #[serde(default)]
    sequence: Option<u64>,
}

impl PushMessage {
    /// Parses a text frame from the balance socket.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::MalformedMessage`] if the frame is not
    /// JSON, matches neither shape, or has missing or invalid fields.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SpendwiseError::MalformedMessage(e.to_string()))?;

        let msg_type = value.get("type").and_then(|t| t.as_str());

        if msg_type == Some("update") && value.get("transactions").is_some() {
            let update: TransactionsUpdate = serde_json::from_value(value)
                .map_err(|e| SpendwiseError::MalformedMessage(e.to_string()))?;
            return Ok(PushMessage::Transactions {
                sequence: update.sequence,
                transactions: into_records(update.transactions)?,
            });
        }

        if value.get("totalBalance").is_some() {
            let balances: BalancesResponse = serde_json::from_value(value)
                .map_err(|e| SpendwiseError::MalformedMessage(e.to_string()))?;
            return Ok(PushMessage::Balances(balances.try_into()?));
        }

        Err(SpendwiseError::MalformedMessage(
            "payload is neither a balances object nor a transactions update".into(),
        ))
    }

    /// Returns the sequence number carried by the message, if any.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            PushMessage::Balances(snapshot) => snapshot.sequence,
            PushMessage::Transactions { sequence, .. } => *sequence,
        }
    }
}
