//! Push connection lifecycle management.
//!
//! [`ConnectionManager`] owns one channel's push connection: it connects,
//! reads frames, reconnects with jittered exponential backoff after a drop,
//! and refetches the REST snapshot after every reconnect before it trusts
//! the stream again. A connect that hangs or a live connection that goes
//! silent for longer than the configured timeouts counts as a drop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::ChannelConfig;
use super::backoff::Backoff;
use super::observer::Shared;
use super::state::ConnectionStatus;
use super::transport::{PushFrame, PushStream, PushTransport, SnapshotSource};
use crate::SpendwiseError;
use crate::models::{AccountId, PushMessage};

/// Why the reader loop exited.
#[derive(Debug, PartialEq, Eq)]
enum DisconnectReason {
    /// The connection was lost or errored.
    TransportDrop,
    /// The channel was closed.
    Shutdown,
}

/// Drives the push side of one channel until it is closed.
pub(crate) struct ConnectionManager {
    account: AccountId,
    source: Arc<dyn SnapshotSource>,
    transport: Arc<dyn PushTransport>,
    shared: Arc<Shared>,
    shutdown: watch::Receiver<bool>,
    backoff: Backoff,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolves once shutdown is requested or the handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

impl ConnectionManager {
    pub(crate) fn new(
        account: AccountId,
        source: Arc<dyn SnapshotSource>,
        transport: Arc<dyn PushTransport>,
        config: &ChannelConfig,
        shared: Arc<Shared>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            account,
            source,
            transport,
            shared,
            shutdown,
            backoff: Backoff::new(config.backoff_base, config.backoff_cap),
            connect_timeout: config.connect_timeout,
            idle_timeout: config.idle_timeout,
        }
    }

    /// Runs the connection loop until shutdown.
    ///
    /// The first connection after `open` trusts the snapshot `open` just
    /// fetched. Every later connection, including one that follows failed
    /// first attempts, refetches before reading pushes.
    pub(crate) async fn run(mut self) {
        let mut needs_refetch = false;

        loop {
            if self.shared.is_closed() {
                break;
            }

            info!(account = %self.account, "Connecting to balance feed");
            let attempt =
                tokio::time::timeout(self.connect_timeout, self.transport.connect(self.account));
            let connected = tokio::select! {
                result = attempt => result.unwrap_or_else(|_| {
                    Err(SpendwiseError::Connection(format!(
                        "connect timed out after {}ms",
                        millis(self.connect_timeout)
                    )))
                }),
                () = shutdown_requested(&mut self.shutdown) => break,
            };

            let mut stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(account = %self.account, "Connection failed: {e}");
                    needs_refetch = true;
                    if self.pause().await {
                        continue;
                    }
                    break;
                }
            };

            if needs_refetch && !self.refetch().await {
                stream.close().await;
                if self.pause().await {
                    continue;
                }
                break;
            }

            self.shared.set_status(ConnectionStatus::Live);
            self.backoff.reset();
            needs_refetch = true;
            info!(account = %self.account, "Balance feed live");

            match self.read_loop(&mut *stream).await {
                DisconnectReason::TransportDrop => {
                    self.shared.set_status(ConnectionStatus::Reconnecting);
                    if !self.pause().await {
                        break;
                    }
                }
                DisconnectReason::Shutdown => {
                    stream.close().await;
                    break;
                }
            }
        }

        debug!(account = %self.account, "Connection manager stopped");
    }

    /// Pulls a fresh snapshot to close any gap left by the disconnect.
    ///
    /// Returns `false` if the fetch failed or shutdown was requested.
    async fn refetch(&mut self) -> bool {
        let fetched = tokio::select! {
            result = self.source.fetch_snapshot(self.account) => result,
            () = shutdown_requested(&mut self.shutdown) => return false,
        };

        match fetched {
            Ok(snapshot) => {
                debug!(account = %self.account, sequence = ?snapshot.sequence, "Refetched snapshot");
                self.shared.accept(snapshot);
                true
            }
            Err(e) => {
                warn!(account = %self.account, "Snapshot refetch failed: {e}");
                false
            }
        }
    }

    /// Sleeps for the next backoff delay.
    ///
    /// Returns `false` if shutdown was requested meanwhile.
    async fn pause(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        info!(
            account = %self.account,
            attempt = self.backoff.attempt(),
            delay_ms = millis(delay),
            "Backing off before retry"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => !self.shared.is_closed(),
            () = shutdown_requested(&mut self.shutdown) => false,
        }
    }

    /// Reads frames until the connection drops, goes silent for longer
    /// than the idle timeout, or shutdown is requested.
    async fn read_loop(&mut self, stream: &mut dyn PushStream) -> DisconnectReason {
        loop {
            tokio::select! {
                frame = tokio::time::timeout(self.idle_timeout, stream.next_frame()) => {
                    match frame {
                        Ok(Some(Ok(PushFrame::Text(text)))) => self.handle_frame(&text),
                        Ok(Some(Ok(PushFrame::Heartbeat))) => {
                            trace!(account = %self.account, "Push connection heartbeat");
                        }
                        Ok(Some(Err(e))) => {
                            warn!(account = %self.account, "Push connection error: {e}");
                            return DisconnectReason::TransportDrop;
                        }
                        Ok(None) => {
                            warn!(account = %self.account, "Push stream ended");
                            return DisconnectReason::TransportDrop;
                        }
                        Err(_) => {
                            warn!(
                                account = %self.account,
                                idle_ms = millis(self.idle_timeout),
                                "Push connection went silent"
                            );
                            return DisconnectReason::TransportDrop;
                        }
                    }
                }

                () = shutdown_requested(&mut self.shutdown) => {
                    return DisconnectReason::Shutdown;
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let message = match PushMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(account = %self.account, "Dropping malformed push payload: {e}");
                return;
            }
        };

        let sequence = message.sequence();
        let applied = match message {
            PushMessage::Balances(snapshot) => self.shared.accept(snapshot),
            PushMessage::Transactions {
                sequence,
                transactions,
            } => self.shared.accept_transactions(sequence, transactions),
        };
        if applied {
            debug!(account = %self.account, ?sequence, "Applied push");
        }
    }
}
