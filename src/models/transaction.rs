//! Transaction models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::AccountId;
use crate::{Result, SpendwiseError};

/// Stable identifier of a transaction.
///
/// The backend emits numeric ids, but the contract allows strings, so both
/// are accepted and normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => TransactionId(id.to_string()),
            RawId::Str(id) => TransactionId(id),
        })
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// Returns the wire-format value sent to the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = SpendwiseError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("income") {
            Ok(TransactionKind::Income)
        } else if s.eq_ignore_ascii_case("expense") {
            Ok(TransactionKind::Expense)
        } else {
            Err(SpendwiseError::MalformedMessage(format!(
                "unknown transaction type: {s}"
            )))
        }
    }
}

impl Serialize for TransactionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A transaction as returned by `GET /api/transactions/all/{userId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub category: String,
    pub amount: Decimal,
    pub transaction_type: String,
    pub transaction_date: String,
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// An immutable transaction in domain form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Display label (the transaction's category).
    pub category: String,
    /// Unsigned magnitude; direction lives in `kind`.
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Wall-clock time as reported by the server, not normalized to UTC.
    pub occurred_at: NaiveDateTime,
    pub wallet: Option<String>,
    pub note: Option<String>,
}

impl TryFrom<TransactionResponse> for TransactionRecord {
    type Error = SpendwiseError;

    fn try_from(raw: TransactionResponse) -> Result<Self> {
        let kind = raw.transaction_type.parse()?;
        let occurred_at = parse_timestamp(&raw.transaction_date).ok_or_else(|| {
            SpendwiseError::MalformedMessage(format!(
                "transaction {} has unparseable date {:?}",
                raw.id, raw.transaction_date
            ))
        })?;

        Ok(TransactionRecord {
            id: raw.id,
            category: raw.category,
            amount: raw.amount.abs(),
            kind,
            occurred_at,
            wallet: raw.wallet,
            note: raw.note,
        })
    }
}

/// Converts wire transactions into records ordered latest-first.
///
/// # Errors
///
/// Returns [`SpendwiseError::MalformedMessage`] if any entry has an
/// unknown type or an unparseable date.
pub fn into_records(raw: Vec<TransactionResponse>) -> Result<Vec<TransactionRecord>> {
    let mut records = raw
        .into_iter()
        .map(TransactionRecord::try_from)
        .collect::<Result<Vec<_>>>()?;
    sort_latest_first(&mut records);
    Ok(records)
}

/// Sorts records newest first; records with equal timestamps keep their order.
pub fn sort_latest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
}

/// Parses the timestamp formats the backend is known to emit.
///
/// RFC 3339 values keep their own offset's wall time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Body of `POST /api/transactions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub transaction_type: TransactionKind,
    pub wallet: String,
    pub category: String,
    pub amount: Decimal,
    pub note: String,
    /// Formatted as `YYYY-MM-DD`.
    #[serde(serialize_with = "serialize_date")]
    pub transaction_date: NaiveDate,
    pub user_id: AccountId,
}

impl NewTransaction {
    /// Checks the request before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::InvalidInput`] for a non-positive amount
    /// or an empty wallet or category.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(SpendwiseError::InvalidInput(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.wallet.trim().is_empty() {
            return Err(SpendwiseError::InvalidInput("wallet is required".into()));
        }
        if self.category.trim().is_empty() {
            return Err(SpendwiseError::InvalidInput("category is required".into()));
        }
        Ok(())
    }
}

fn serialize_date<S: Serializer>(
    date: &NaiveDate,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format("%Y-%m-%d"))
}
