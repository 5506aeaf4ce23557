//! Listener registry and serialized event dispatch.
//!
//! Every state mutation and the notification it produces happen under one
//! dispatch lock, so listeners observe events in acceptance order. The
//! dispatching thread is recorded so that a listener calling back into the
//! channel (registering, closing) does not wait on its own lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::debug;

use super::state::{ChannelState, ConnectionStatus, Freshness};
use crate::models::{BalanceSnapshot, TransactionRecord};

/// A state transition delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A snapshot was accepted.
    Snapshot(Arc<BalanceSnapshot>),
    /// Connectivity changed; the data did not.
    Status(ConnectionStatus),
}

/// Handle returned by registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// State shared between a channel handle and its connection task.
pub(crate) struct Shared {
    /// Held while mutating state and notifying listeners.
    turn: Mutex<()>,
    state: Mutex<ChannelState>,
    listeners: Mutex<Vec<Listener>>,
    dispatcher: Mutex<Option<ThreadId>>,
    closed: AtomicBool,
    next_listener: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            turn: Mutex::new(()),
            state: Mutex::new(ChannelState::new()),
            listeners: Mutex::new(Vec::new()),
            dispatcher: Mutex::new(None),
            closed: AtomicBool::new(false),
            next_listener: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> Option<Arc<BalanceSnapshot>> {
        lock(&self.state).snapshot().cloned()
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        lock(&self.state).sequence()
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        lock(&self.state).status()
    }

    fn is_dispatching_here(&self) -> bool {
        *lock(&self.dispatcher) == Some(thread::current().id())
    }

    /// Offers a full snapshot; notifies listeners if it is accepted.
    pub(crate) fn accept(&self, snapshot: BalanceSnapshot) -> bool {
        self.mutate(|state| Some(state.apply(snapshot)))
    }

    /// Offers a transaction-list update for the held snapshot.
    pub(crate) fn accept_transactions(
        &self,
        sequence: Option<u64>,
        transactions: Vec<TransactionRecord>,
    ) -> bool {
        self.mutate(|state| state.apply_transactions(sequence, transactions))
    }

    fn mutate<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut ChannelState) -> Option<Result<Arc<BalanceSnapshot>, Freshness>>,
    {
        let _turn = lock(&self.turn);
        if self.is_closed() {
            return false;
        }

        let outcome = apply(&mut lock(&self.state));
        match outcome {
            Some(Ok(snapshot)) => {
                self.dispatch(&ChannelEvent::Snapshot(snapshot));
                true
            }
            Some(Err(Freshness::Stale)) => {
                debug!("Discarded stale snapshot");
                false
            }
            Some(Err(Freshness::Duplicate)) => {
                debug!("Discarded duplicate snapshot");
                false
            }
            Some(Err(Freshness::Newer)) => false,
            None => {
                debug!("Discarded transactions update received before any snapshot");
                false
            }
        }
    }

    /// Moves to a new status and notifies listeners if it changed.
    pub(crate) fn set_status(&self, next: ConnectionStatus) -> bool {
        let _turn = lock(&self.turn);
        if self.is_closed() {
            return false;
        }

        let changed = lock(&self.state).transition(next);
        if changed {
            debug!(status = next.label(), "Channel status changed");
            self.dispatch(&ChannelEvent::Status(next));
        }
        changed
    }

    /// Calls each listener with `event`. Caller holds the turn lock.
    fn dispatch(&self, event: &ChannelEvent) {
        let callbacks: Vec<Callback> = lock(&self.listeners)
            .iter()
            .map(|l| Arc::clone(&l.callback))
            .collect();

        *lock(&self.dispatcher) = Some(thread::current().id());
        for callback in callbacks {
            if self.is_closed() {
                break;
            }
            callback(event);
        }
        *lock(&self.dispatcher) = None;
    }

    /// Registers a listener and replays the current view to it.
    pub(crate) fn add_listener(&self, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));

        let reentrant = self.is_dispatching_here();
        let _turn = if reentrant {
            None
        } else {
            Some(lock(&self.turn))
        };
        if self.is_closed() {
            return id;
        }

        let (snapshot, status) = {
            let state = lock(&self.state);
            (state.snapshot().cloned(), state.status())
        };
        if !reentrant {
            *lock(&self.dispatcher) = Some(thread::current().id());
        }
        if let Some(snapshot) = snapshot {
            callback(&ChannelEvent::Snapshot(snapshot));
        }
        if !self.is_closed() {
            callback(&ChannelEvent::Status(status));
        }
        if !reentrant {
            *lock(&self.dispatcher) = None;
        }

        // The replay may have closed the channel.
        if !self.is_closed() {
            lock(&self.listeners).push(Listener { id, callback });
        }
        id
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Marks the channel closed and drops every listener.
    ///
    /// Returns `false` if it was already closed. When called from a thread
    /// other than the one dispatching, waits for the in-flight dispatch so
    /// that no callback runs after this returns.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let turn = if self.is_dispatching_here() {
            None
        } else {
            Some(lock(&self.turn))
        };
        lock(&self.state).transition(ConnectionStatus::Closed);
        let dropped = std::mem::take(&mut *lock(&self.listeners));
        drop(turn);
        drop(dropped);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    use rust_decimal::Decimal;

    use super::*;

    fn snap(seq: u64) -> BalanceSnapshot {
        BalanceSnapshot {
            total_balance: Decimal::from(seq),
            wallet_balances: BTreeMap::new(),
            sequence: Some(seq),
            transactions: None,
        }
    }

    fn recorder(shared: &Shared) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel();
        shared.add_listener(Arc::new(move |event: &ChannelEvent| {
            let _ = tx.send(event.clone());
        }));
        rx
    }

    #[test]
    fn new_listener_receives_current_view() {
        let shared = Shared::new();
        shared.accept(snap(1));
        let rx = recorder(&shared);

        assert!(matches!(rx.try_recv().unwrap(), ChannelEvent::Snapshot(s) if s.sequence == Some(1)));
        assert_eq!(rx.try_recv().unwrap(), ChannelEvent::Status(ConnectionStatus::Connecting));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rejected_snapshots_do_not_notify() {
        let shared = Shared::new();
        shared.accept(snap(1));
        let rx = recorder(&shared);
        while rx.try_recv().is_ok() {}

        assert!(!shared.accept(snap(1)));
        assert!(rx.try_recv().is_err());
        assert!(shared.accept(snap(2)));
        assert!(matches!(rx.try_recv().unwrap(), ChannelEvent::Snapshot(s) if s.sequence == Some(2)));
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let shared = Shared::new();
        let (tx, rx) = mpsc::channel();
        let id = shared.add_listener(Arc::new(move |event: &ChannelEvent| {
            let _ = tx.send(event.clone());
        }));
        while rx.try_recv().is_ok() {}

        assert!(shared.remove_listener(id));
        assert!(!shared.remove_listener(id));
        shared.accept(snap(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_is_idempotent_and_silences_listeners() {
        let shared = Shared::new();
        let rx = recorder(&shared);
        while rx.try_recv().is_ok() {}

        assert!(shared.close());
        assert!(!shared.close());
        assert_eq!(shared.status(), ConnectionStatus::Closed);
        assert!(!shared.accept(snap(9)));
        assert!(!shared.set_status(ConnectionStatus::Live));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_from_inside_a_listener_does_not_deadlock() {
        let shared = Arc::new(Shared::new());
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&shared);
        shared.add_listener(Arc::new(move |event: &ChannelEvent| {
            let _ = tx.send(event.clone());
            if matches!(event, ChannelEvent::Snapshot(s) if s.sequence == Some(2)) {
                inner.close();
            }
        }));
        while rx.try_recv().is_ok() {}

        assert!(shared.accept(snap(2)));
        assert!(shared.is_closed());
        assert!(!shared.accept(snap(3)));

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen.len(), 1);
    }
}
