//! Seams between the channel and the network.
//!
//! The channel pulls authoritative snapshots from a [`SnapshotSource`]
//! and receives pushes from a [`PushTransport`]. Production code uses
//! [`ApiClient`](crate::api::ApiClient) and
//! [`WsTransport`](crate::websocket::WsTransport); tests substitute
//! scripted fakes.

use async_trait::async_trait;

use crate::Result;
use crate::models::{AccountId, BalanceSnapshot};

/// Authoritative pull of an account's current state.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current snapshot for `account`.
    async fn fetch_snapshot(&self, account: AccountId) -> Result<BalanceSnapshot>;
}

/// Opens push connections scoped to one account.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Establishes a connection; returns once the handshake completes.
    async fn connect(&self, account: AccountId) -> Result<Box<dyn PushStream>>;
}

/// What a push connection delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    /// A text payload for the channel to parse.
    Text(String),
    /// Proof of life without a payload, such as a pong.
    Heartbeat,
}

/// One established push connection.
#[async_trait]
pub trait PushStream: Send {
    /// Waits for the next frame.
    ///
    /// Returns `None` when the peer closed the connection. Transports that
    /// ping the peer should surface the replies as [`PushFrame::Heartbeat`]
    /// so a quiet but healthy connection is not mistaken for a dead one.
    async fn next_frame(&mut self) -> Option<Result<PushFrame>>;

    /// Closes the connection. Errors are swallowed; the peer may be gone.
    async fn close(&mut self);
}
