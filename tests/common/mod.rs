//! Shared test utilities: scripted fakes for the channel's network seams.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use spendwise::channel::{
    ChannelConfig, ChannelEvent, ChannelHandle, ConnectionStatus, PushFrame, PushStream,
    PushTransport, SnapshotSource,
};
use spendwise::models::{AccountId, BalanceSnapshot};
use spendwise::{Result, SpendwiseError};

/// How long a test waits for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Channel tuning with millisecond backoff so reconnect tests run fast.
pub fn fast_config() -> ChannelConfig {
    ChannelConfig {
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(5),
        fetch_retries: 2,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(10),
    }
}

/// A snapshot with a single `Cash` wallet holding the whole balance.
pub fn snapshot(sequence: u64, total: i64) -> BalanceSnapshot {
    BalanceSnapshot {
        total_balance: Decimal::from(total),
        wallet_balances: BTreeMap::from([("Cash".to_string(), Decimal::from(total))]),
        sequence: Some(sequence),
        transactions: None,
    }
}

/// The JSON text frame the backend pushes for a full snapshot.
pub fn balances_frame(sequence: u64, total: i64) -> String {
    serde_json::json!({
        "totalBalance": total,
        "wallets": { "Cash": total },
        "sequence": sequence,
    })
    .to_string()
}

/// [`SnapshotSource`] that replays a scripted queue of results.
///
/// Once the script is exhausted every fetch fails.
#[derive(Default)]
pub struct FakeSource {
    script: Mutex<VecDeque<std::result::Result<BalanceSnapshot, String>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, snapshot: BalanceSnapshot) {
        self.script.lock().unwrap().push_back(Ok(snapshot));
    }

    pub fn push_err(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn fetch_snapshot(&self, _account: AccountId) -> Result<BalanceSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(SpendwiseError::Api {
                status: 503,
                message,
            }),
            None => Err(SpendwiseError::Api {
                status: 503,
                message: "script exhausted".to_string(),
            }),
        }
    }
}

enum Connect {
    Stream(mpsc::UnboundedReceiver<String>),
    Fail(String),
    Hang,
}

/// [`PushTransport`] that hands out scripted in-memory streams.
///
/// Once the script is exhausted `connect` never completes.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Connect>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a successful connection and returns its server side.
    ///
    /// Dropping the returned sender drops the connection.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Connect::Stream(rx));
        tx
    }

    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Connect::Fail(message.to_string()));
    }

    /// Queues a connection attempt that never completes.
    pub fn push_hang(&self) {
        self.script.lock().unwrap().push_back(Connect::Hang);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of streams the channel closed itself.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self, _account: AccountId) -> Result<Box<dyn PushStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connect::Stream(frames)) => Ok(Box::new(FakeStream {
                frames,
                closes: Arc::clone(&self.closes),
            })),
            Some(Connect::Fail(message)) => Err(SpendwiseError::Connection(message)),
            Some(Connect::Hang) | None => std::future::pending().await,
        }
    }
}

struct FakeStream {
    frames: mpsc::UnboundedReceiver<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PushStream for FakeStream {
    async fn next_frame(&mut self) -> Option<Result<PushFrame>> {
        self.frames.recv().await.map(|text| Ok(PushFrame::Text(text)))
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.frames.close();
    }
}

/// Registers a listener that forwards every event to the returned receiver.
pub fn record(handle: &ChannelHandle) -> mpsc::UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    handle.on_update(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Waits for the next event, failing the test on timeout.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a channel event")
        .expect("listener was dropped")
}

/// Consumes events up to and including the given status.
pub async fn wait_for_status(
    events: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    status: ConnectionStatus,
) {
    loop {
        if next_event(events).await == ChannelEvent::Status(status) {
            return;
        }
    }
}

/// Polls `condition` until it holds, failing the test on timeout.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Describes an event by its sequence or status, for compact assertions.
pub fn describe(event: &ChannelEvent) -> String {
    match event {
        ChannelEvent::Snapshot(s) => format!("snapshot:{}", s.sequence.unwrap_or_default()),
        ChannelEvent::Status(status) => format!("status:{}", status.label()),
    }
}

/// Loads a JSON fixture from `tests/fixtures`.
pub fn fixture(name: &str) -> serde_json::Value {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let raw = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {path}: {e}"));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("parse {path}: {e}"))
}
