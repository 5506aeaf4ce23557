//! Application configuration loaded from environment variables.
//!
//! All values are optional:
//! - `SPENDWISE_API_URL`: REST base URL
//! - `SPENDWISE_WEBSOCKET_URL`: balance feed root (account id is appended)
//! - `SPENDWISE_EMAIL` / `SPENDWISE_PASSWORD`: sign-in credentials, both or neither
//! - `SPENDWISE_STORE_PATH`: local key-value store file
//! - `SPENDWISE_LOG_FILE`: log output file
//! - `SPENDWISE_FETCH_RETRIES`: retries of the initial snapshot fetch
//! - `SPENDWISE_BACKOFF_BASE_MS` / `SPENDWISE_BACKOFF_CAP_MS`: reconnect backoff bounds
//! - `SPENDWISE_CONNECT_TIMEOUT_MS`: push connection attempt timeout
//! - `SPENDWISE_IDLE_TIMEOUT_MS`: silence allowed on a live push connection

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::session::Credentials;

/// Default REST endpoint (the Android emulator's view of the host).
const DEFAULT_API_URL: &str = "http://10.0.2.2:8080/spendwise";

/// Default balance feed root.
const DEFAULT_WEBSOCKET_URL: &str = "ws://10.0.2.2:8080/spendwise/ws/balance";

const DEFAULT_STORE_PATH: &str = "spendwise-store.json";

const DEFAULT_LOG_FILE: &str = "spendwise.log";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub channel: ChannelConfig,
    pub store_path: PathBuf,
    pub log_file: PathBuf,
}

/// Backend endpoints and credentials.
#[derive(Debug)]
pub struct BackendConfig {
    pub api_url: String,
    pub websocket_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl BackendConfig {
    /// Returns sign-in credentials when both halves are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`SpendwiseError::Config`](crate::SpendwiseError::Config) if
/// only one of the two credential variables is set, a numeric variable
/// does not parse, the backoff base exceeds the cap, or a timeout is zero.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let api_url = non_empty_var("SPENDWISE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let websocket_url = non_empty_var("SPENDWISE_WEBSOCKET_URL")
        .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());

    let email = non_empty_var("SPENDWISE_EMAIL");
    let password = non_empty_var("SPENDWISE_PASSWORD");

    match (&email, &password) {
        (Some(_), None) => {
            return Err(crate::SpendwiseError::Config(
                "SPENDWISE_EMAIL is set but SPENDWISE_PASSWORD is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(crate::SpendwiseError::Config(
                "SPENDWISE_PASSWORD is set but SPENDWISE_EMAIL is missing".to_string(),
            ));
        }
        _ => {}
    }

    let defaults = ChannelConfig::default();
    let fetch_retries = parsed_var("SPENDWISE_FETCH_RETRIES")?.unwrap_or(defaults.fetch_retries);
    let backoff_base = parsed_var::<u64>("SPENDWISE_BACKOFF_BASE_MS")?
        .map_or(defaults.backoff_base, Duration::from_millis);
    let backoff_cap = parsed_var::<u64>("SPENDWISE_BACKOFF_CAP_MS")?
        .map_or(defaults.backoff_cap, Duration::from_millis);
    let connect_timeout = parsed_var::<u64>("SPENDWISE_CONNECT_TIMEOUT_MS")?
        .map_or(defaults.connect_timeout, Duration::from_millis);
    let idle_timeout = parsed_var::<u64>("SPENDWISE_IDLE_TIMEOUT_MS")?
        .map_or(defaults.idle_timeout, Duration::from_millis);

    if backoff_base > backoff_cap {
        return Err(crate::SpendwiseError::Config(format!(
            "backoff base ({}ms) exceeds cap ({}ms)",
            backoff_base.as_millis(),
            backoff_cap.as_millis()
        )));
    }
    if connect_timeout.is_zero() || idle_timeout.is_zero() {
        return Err(crate::SpendwiseError::Config(
            "connect and idle timeouts must be positive".to_string(),
        ));
    }

    Ok(AppConfig {
        backend: BackendConfig {
            api_url,
            websocket_url,
            email,
            password,
        },
        channel: ChannelConfig {
            backoff_base,
            backoff_cap,
            fetch_retries,
            connect_timeout,
            idle_timeout,
        },
        store_path: non_empty_var("SPENDWISE_STORE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from),
        log_file: non_empty_var("SPENDWISE_LOG_FILE")
            .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses a non-empty environment variable.
fn parsed_var<T: FromStr>(name: &str) -> crate::Result<Option<T>> {
    non_empty_var(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                crate::SpendwiseError::Config(format!("{name} is not a valid number: {raw:?}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 11] = [
        "SPENDWISE_API_URL",
        "SPENDWISE_WEBSOCKET_URL",
        "SPENDWISE_EMAIL",
        "SPENDWISE_PASSWORD",
        "SPENDWISE_STORE_PATH",
        "SPENDWISE_LOG_FILE",
        "SPENDWISE_FETCH_RETRIES",
        "SPENDWISE_BACKOFF_BASE_MS",
        "SPENDWISE_BACKOFF_CAP_MS",
        "SPENDWISE_CONNECT_TIMEOUT_MS",
        "SPENDWISE_IDLE_TIMEOUT_MS",
    ];

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Clears every config variable, applies `vars`, runs `f`, then restores originals.
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let originals: Vec<(&str, Option<String>)> = ALL_VARS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        for k in ALL_VARS {
            // SAFETY: env access in this module is serialized by ENV_LOCK.
            unsafe { std::env::remove_var(k) };
        }
        for (k, v) in vars {
            // SAFETY: env access in this module is serialized by ENV_LOCK.
            unsafe {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values under the same lock.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn defaults_without_env_vars() {
        with_env(&[], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.backend.api_url, DEFAULT_API_URL);
            assert_eq!(config.backend.websocket_url, DEFAULT_WEBSOCKET_URL);
            assert!(config.backend.credentials().is_none());
            assert_eq!(config.channel, ChannelConfig::default());
            assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        });
    }

    #[test]
    fn loads_credentials_from_env() {
        with_env(
            &[
                ("SPENDWISE_EMAIL", Some("kasun@example.com")),
                ("SPENDWISE_PASSWORD", Some("hunter2")),
            ],
            || {
                let credentials = fetch_config().unwrap().backend.credentials().unwrap();
                assert_eq!(credentials.email, "kasun@example.com");
                assert_eq!(credentials.password, "hunter2");
            },
        );
    }

    #[test]
    fn rejects_email_without_password() {
        with_env(&[("SPENDWISE_EMAIL", Some("only@example.com"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("SPENDWISE_PASSWORD is missing"));
        });
    }

    #[test]
    fn rejects_password_without_email() {
        with_env(&[("SPENDWISE_PASSWORD", Some("secret"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("SPENDWISE_EMAIL is missing"));
        });
    }

    #[test]
    fn custom_channel_tuning() {
        with_env(
            &[
                ("SPENDWISE_FETCH_RETRIES", Some("5")),
                ("SPENDWISE_BACKOFF_BASE_MS", Some("250")),
                ("SPENDWISE_BACKOFF_CAP_MS", Some("4000")),
                ("SPENDWISE_CONNECT_TIMEOUT_MS", Some("1500")),
                ("SPENDWISE_IDLE_TIMEOUT_MS", Some("20000")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.channel.fetch_retries, 5);
                assert_eq!(config.channel.backoff_base, Duration::from_millis(250));
                assert_eq!(config.channel.backoff_cap, Duration::from_millis(4000));
                assert_eq!(config.channel.connect_timeout, Duration::from_millis(1500));
                assert_eq!(config.channel.idle_timeout, Duration::from_secs(20));
            },
        );
    }

    #[test]
    fn rejects_zero_idle_timeout() {
        with_env(&[("SPENDWISE_IDLE_TIMEOUT_MS", Some("0"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("timeouts must be positive"));
        });
    }

    #[test]
    fn rejects_unparseable_numbers() {
        with_env(&[("SPENDWISE_FETCH_RETRIES", Some("three"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("SPENDWISE_FETCH_RETRIES"));
        });
    }

    #[test]
    fn rejects_base_above_cap() {
        with_env(
            &[
                ("SPENDWISE_BACKOFF_BASE_MS", Some("5000")),
                ("SPENDWISE_BACKOFF_CAP_MS", Some("1000")),
            ],
            || {
                let err = fetch_config().unwrap_err();
                assert!(err.to_string().contains("exceeds cap"));
            },
        );
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &[
                ("SPENDWISE_EMAIL", Some("")),
                ("SPENDWISE_PASSWORD", Some("")),
                ("SPENDWISE_API_URL", Some("")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.backend.api_url, DEFAULT_API_URL);
                assert!(config.backend.credentials().is_none());
            },
        );
    }
}
