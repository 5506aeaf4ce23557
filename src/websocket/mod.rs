//! Async WebSocket client for the spendwise balance feed.
//!
//! The backend exposes one socket per account at
//! `{websocket_url}/{userId}`. [`WsTransport`] implements
//! [`PushTransport`] on top of it for the live balance channel.
//!
//! The backend never pings, so each connection pings the server on a
//! fixed interval and reports the pongs as heartbeats.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use tungstenite::Message;

use crate::Result;
use crate::channel::{PushFrame, PushStream, PushTransport};
use crate::models::AccountId;

/// Write half of a balance feed connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a balance feed connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default interval between client pings.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`SpendwiseError`](crate::SpendwiseError) if the connection or handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await?;
    info!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Builds the per-account feed URL.
pub fn feed_url(base: &str, account: AccountId) -> String {
    format!("{}/{account}", base.trim_end_matches('/'))
}

/// [`PushTransport`] over the backend's balance socket.
#[derive(Debug, Clone)]
pub struct WsTransport {
    base_url: String,
    keepalive: Duration,
}

impl WsTransport {
    /// `base_url` is the feed root without the account segment,
    /// e.g. `ws://10.0.2.2:8080/spendwise/ws/balance`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            keepalive: DEFAULT_KEEPALIVE,
        }
    }

    /// Sets the ping interval. Keep it well below the channel's idle timeout.
    #[must_use]
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = interval.max(Duration::from_millis(1));
        self
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self, account: AccountId) -> Result<Box<dyn PushStream>> {
        let url = feed_url(&self.base_url, account);
        let (write, read) = connect(&url).await?;

        let mut keepalive =
            tokio::time::interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Box::new(WsPushStream {
            write,
            read,
            keepalive,
        }))
    }
}

/// One open balance feed connection.
pub struct WsPushStream {
    write: WsWriter,
    read: WsReader,
    keepalive: Interval,
}

#[async_trait]
impl PushStream for WsPushStream {
    async fn next_frame(&mut self) -> Option<Result<PushFrame>> {
        loop {
            tokio::select! {
                message = self.read.next() => {
                    let Some(message) = message else {
                        return None;
                    };
                    match message {
                        Ok(Message::Text(text)) => {
                            return Some(Ok(PushFrame::Text(text.to_string())));
                        }
                        Ok(Message::Pong(_) | Message::Ping(_)) => {
                            return Some(Ok(PushFrame::Heartbeat));
                        }
                        Ok(Message::Close(frame)) => {
                            debug!(?frame, "Received close frame");
                            return None;
                        }
                        Ok(_) => {} // Binary/Frame
                        Err(e) => return Some(Err(e.into())),
                    }
                }

                _ = self.keepalive.tick() => {
                    if let Err(e) = self.write.send(Message::Ping(Vec::new().into())).await {
                        return Some(Err(e.into()));
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.write.send(Message::Close(None)).await;
        let _ = self.write.close().await;
        debug!("Closed balance feed connection");
    }
}
