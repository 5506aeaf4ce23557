//! User and session models.

use serde::{Deserialize, Serialize};

use super::AccountId;

/// Body of `POST /api/users/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/users/validate`.
#[derive(Debug, Serialize)]
pub struct ValidateRequest<'a> {
    pub email: &'a str,
}

/// Response of `POST /api/users/validate`.
#[derive(Debug, Deserialize)]
pub struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
}

/// The signed-in user's profile, as returned by login and kept in the
/// local store under `user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: AccountId,
    #[serde(default)]
    pub name: String,
    pub email: String,
    /// Fields the client does not interpret, kept so the blob round-trips.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
