//! Session bootstrap: reuse a stored profile or sign in.

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::models::UserProfile;
use crate::store::{LocalStore, StoreKey};
use crate::{Result, SpendwiseError};

/// Email and password used when no stored session is usable.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Returns the stored profile if the backend still accepts it.
///
/// A profile the backend rejects (invalid, or a non-success status) is
/// removed from the store.
///
/// # Errors
///
/// Returns an HTTP error if the backend cannot be reached, leaving the
/// stored profile in place.
pub async fn restore(api: &ApiClient, store: &mut LocalStore) -> Result<Option<UserProfile>> {
    let Some(profile) = store.profile() else {
        return Ok(None);
    };

    match api.validate(&profile.email).await {
        Ok(true) => {
            info!(user_id = %profile.id, "Restored stored session");
            return Ok(Some(profile));
        }
        Ok(false) => warn!(user_id = %profile.id, "Stored session no longer valid"),
        Err(SpendwiseError::Api { status, message }) => {
            warn!(user_id = %profile.id, status, "Stored session rejected: {message}");
        }
        Err(e) => return Err(e),
    }

    store.remove(StoreKey::User)?;
    Ok(None)
}

/// Signs in and stores the returned profile.
///
/// # Errors
///
/// Propagates login and store errors.
pub async fn sign_in(
    api: &ApiClient,
    store: &mut LocalStore,
    credentials: &Credentials,
) -> Result<UserProfile> {
    let profile = api.login(&credentials.email, &credentials.password).await?;
    store.set_profile(&profile)?;
    Ok(profile)
}

/// Restores the stored session, falling back to signing in.
///
/// # Errors
///
/// Returns [`SpendwiseError::Config`] if there is no usable stored
/// session and no credentials were configured.
pub async fn establish(
    api: &ApiClient,
    store: &mut LocalStore,
    credentials: Option<&Credentials>,
) -> Result<UserProfile> {
    if let Some(profile) = restore(api, store).await? {
        return Ok(profile);
    }

    match credentials {
        Some(credentials) => sign_in(api, store, credentials).await,
        None => Err(SpendwiseError::Config(
            "no stored session; set SPENDWISE_EMAIL and SPENDWISE_PASSWORD to sign in".to_string(),
        )),
    }
}
