//! Live balance channel.
//!
//! A [`LiveBalanceChannel`] keeps one consistent, continuously updated view
//! of an account by reconciling an authoritative REST snapshot with an
//! unreliable push stream:
//!
//! - [`state`] - sequence gating and the connectivity state machine
//! - [`observer`] - listener registry and serialized dispatch
//! - [`connection`] - reconnect loop with backoff and gap-closing refetch
//! - [`backoff`] - exponential backoff with full jitter
//! - [`transport`] - the traits the network sits behind
//!
//! Each call to [`LiveBalanceChannel::open`] yields an independent
//! [`ChannelHandle`]; nothing is shared between accounts.

pub mod backoff;
mod connection;
mod observer;
pub mod state;
pub mod transport;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{AccountId, BalanceSnapshot};
use crate::{Result, SpendwiseError};

use backoff::Backoff;
use connection::ConnectionManager;
use observer::Shared;

pub use observer::{ChannelEvent, ListenerId};
pub use state::{ChannelState, ConnectionStatus, Freshness};
pub use transport::{PushFrame, PushStream, PushTransport, SnapshotSource};

/// Initial backoff duration between reconnection attempts.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum backoff duration between reconnection attempts.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Retries of the initial snapshot fetch before `open` gives up.
pub const DEFAULT_FETCH_RETRIES: u32 = 3;

/// How long a push connection attempt may take before it counts as failed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a live connection may stay silent before it is treated as dropped.
///
/// The backend sends no heartbeat, so transports should keep the link
/// busy (e.g. with pings) well within this window.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

/// Tunables for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Extra attempts after the first failed initial fetch.
    pub fetch_retries: u32,
    pub connect_timeout: Duration,
    /// Silence on a live connection longer than this forces a reconnect.
    pub idle_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Factory for per-account channels.
pub struct LiveBalanceChannel {
    source: Arc<dyn SnapshotSource>,
    transport: Arc<dyn PushTransport>,
    config: ChannelConfig,
}

impl LiveBalanceChannel {
    #[must_use]
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        transport: Arc<dyn PushTransport>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            source,
            transport,
            config,
        }
    }

    /// Fetches the initial snapshot and starts the push connection.
    ///
    /// `account` must already be authenticated; the channel does not check.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Connection`] if the initial fetch fails on
    /// every attempt. No state is kept in that case and `open` may be
    /// called again.
    pub async fn open(&self, account: AccountId) -> Result<ChannelHandle> {
        let snapshot = self.initial_fetch(account).await?;

        let shared = Arc::new(Shared::new());
        shared.accept(snapshot);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = ConnectionManager::new(
            account,
            Arc::clone(&self.source),
            Arc::clone(&self.transport),
            &self.config,
            Arc::clone(&shared),
            shutdown_rx,
        );
        let task = tokio::spawn(manager.run());
        info!(%account, sequence = ?shared.sequence(), "Balance channel opened");

        Ok(ChannelHandle {
            inner: Arc::new(HandleInner {
                account,
                shared,
                shutdown: shutdown_tx,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    async fn initial_fetch(&self, account: AccountId) -> Result<BalanceSnapshot> {
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_cap);
        let attempts = self.config.fetch_retries.saturating_add(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.source.fetch_snapshot(account).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    warn!(%account, attempt, attempts, "Initial snapshot fetch failed: {e}");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }

        let reason = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        Err(SpendwiseError::Connection(format!(
            "initial snapshot for account {account} failed after {attempts} attempts: {reason}"
        )))
    }
}

/// A subscriber's handle on an open channel.
///
/// Clones share the same channel. The channel closes when [`close`] is
/// called or the last clone is dropped.
///
/// [`close`]: ChannelHandle::close
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    account: AccountId,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HandleInner {
    fn close(&self) -> bool {
        if !self.shared.close() {
            return false;
        }
        self.shutdown.send_replace(true);
        info!(account = %self.account, "Balance channel closed");
        true
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl ChannelHandle {
    pub fn account_id(&self) -> AccountId {
        self.inner.account
    }

    /// Registers a listener for accepted state transitions.
    ///
    /// The listener is immediately handed the current snapshot (if any) and
    /// the current status, then every later transition in acceptance order.
    /// It runs on the channel's task and must not block.
    pub fn on_update<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.inner.shared.add_listener(Arc::new(callback))
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.shared.remove_listener(id)
    }

    /// The most recently accepted snapshot.
    pub fn snapshot(&self) -> Option<Arc<BalanceSnapshot>> {
        self.inner.shared.snapshot()
    }

    /// Highest sequence accepted so far.
    pub fn sequence(&self) -> Option<u64> {
        self.inner.shared.sequence()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.shared.status()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.is_closed()
    }

    /// Tears down the push connection and silences every listener.
    ///
    /// Idempotent, and safe to call from inside a listener. Once it
    /// returns, no listener will be invoked again.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Closes the channel and waits for its connection task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(account = %self.inner.account, "Connection task ended abnormally: {e}");
        }
    }
}
