//! spendwise REST API client.
//!
//! Thin typed wrappers over the backend's request/response endpoints.
//! [`ApiClient`] also serves as the live balance channel's
//! [`SnapshotSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::channel::SnapshotSource;
use crate::models::transaction::into_records;
use crate::models::user::{LoginRequest, ValidateRequest};
use crate::models::{
    AccountId, ApiErrorBody, BalanceSnapshot, BalancesResponse, NewTransaction, TransactionRecord,
    TransactionResponse, UserProfile, ValidateResponse,
};
use crate::{Result, SpendwiseError};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// REST client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    include_transactions: bool,
}

impl ApiClient {
    /// Creates a client for `base_url`, e.g. `http://10.0.2.2:8080/spendwise`.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            include_transactions: true,
        })
    }

    /// Controls whether snapshots fetched for the channel also carry the
    /// transaction list (one extra request per fetch). On by default.
    #[must_use]
    pub fn with_transactions(mut self, include: bool) -> Self {
        self.include_transactions = include;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Signs in and returns the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Api`] with the server's message on a
    /// rejected login, or an HTTP/JSON error if the call itself fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let response = self
            .http
            .post(self.url("/api/users/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let profile: UserProfile = parse_json(response, "Login failed").await?;
        info!(user_id = %profile.id, "Logged in");
        Ok(profile)
    }

    /// Asks the backend whether a stored session's email is still valid.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Api`] on a non-success status.
    pub async fn validate(&self, email: &str) -> Result<bool> {
        let response = self
            .http
            .post(self.url("/api/users/validate"))
            .json(&ValidateRequest { email })
            .send()
            .await?;

        let body: ValidateResponse = parse_json(response, "Validation failed").await?;
        debug!(valid = body.valid, "Validated stored session");
        Ok(body.valid)
    }

    /// Lists every transaction of a user, latest first.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Api`] on a non-success status, or
    /// [`SpendwiseError::MalformedMessage`] if an entry cannot be converted.
    pub async fn transactions(&self, user_id: AccountId) -> Result<Vec<TransactionRecord>> {
        let response = self
            .http
            .get(self.url(&format!("/api/transactions/all/{user_id}")))
            .send()
            .await?;

        let raw: Vec<TransactionResponse> =
            parse_json(response, "Failed to fetch transactions").await?;
        into_records(raw)
    }

    /// Fetches the balances snapshot of a user.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Api`] on a non-success status.
    pub async fn balances(&self, user_id: AccountId) -> Result<BalanceSnapshot> {
        let response = self
            .http
            .get(self.url(&format!("/api/transactions/balances/{user_id}")))
            .send()
            .await?;

        let raw: BalancesResponse = parse_json(response, "Failed to fetch balances").await?;
        raw.try_into()
    }

    /// Records a new transaction and returns it as stored by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::InvalidInput`] without contacting the
    /// backend if the request fails local validation.
    pub async fn create_transaction(&self, request: &NewTransaction) -> Result<TransactionRecord> {
        request.validate()?;

        let response = self
            .http
            .post(self.url("/api/transactions"))
            .json(request)
            .send()
            .await?;

        let raw: TransactionResponse =
            parse_json(response, "Failed to create transaction").await?;
        let record = TransactionRecord::try_from(raw)?;
        info!(
            id = %record.id,
            kind = record.kind.as_str(),
            amount = %record.amount,
            "Created transaction"
        );
        Ok(record)
    }
}

#[async_trait]
impl SnapshotSource for ApiClient {
    async fn fetch_snapshot(&self, account: AccountId) -> Result<BalanceSnapshot> {
        if !self.include_transactions {
            return self.balances(account).await;
        }

        let (mut snapshot, transactions) =
            tokio::try_join!(self.balances(account), self.transactions(account))?;
        if snapshot.transactions.is_none() {
            snapshot.transactions = Some(transactions);
        }
        Ok(snapshot)
    }
}

/// Decodes a success body, or turns an error status into [`SpendwiseError::Api`].
async fn parse_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Err(SpendwiseError::api(status, message))
}
