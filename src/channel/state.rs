//! Client-side view of an account: the last accepted snapshot plus
//! connectivity status.

use std::sync::Arc;

use crate::models::{BalanceSnapshot, TransactionRecord};

/// Connectivity status of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Live,
    Reconnecting,
    Closed,
}

impl ConnectionStatus {
    /// Returns a display string for the status.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Live => "Live",
            ConnectionStatus::Reconnecting => "Reconnecting...",
            ConnectionStatus::Closed => "Closed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Connecting, Live) | (Live, Reconnecting) | (Reconnecting, Live)
        ) || (next == Closed && self != Closed)
    }
}

/// How an incoming snapshot relates to the one currently held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Should replace the held snapshot.
    Newer,
    /// Sequence is at or below the held one.
    Stale,
    /// Unsequenced and identical in content to the held snapshot.
    Duplicate,
}

/// The mutable view combining the last accepted snapshot with status.
#[derive(Debug, Default)]
pub struct ChannelState {
    snapshot: Option<Arc<BalanceSnapshot>>,
    high_water: Option<u64>,
    fingerprint: Option<u32>,
    status: ConnectionStatus,
}

impl ChannelState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&Arc<BalanceSnapshot>> {
        self.snapshot.as_ref()
    }

    /// Highest sequence accepted so far.
    pub fn sequence(&self) -> Option<u64> {
        self.high_water
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Classifies an incoming snapshot against the held state.
    ///
    /// Sequenced snapshots are ordered by sequence. A snapshot without a
    /// sequence can only be recognised as a duplicate by content, so any
    /// change in content is treated as newer.
    pub fn freshness(&self, incoming: &BalanceSnapshot) -> Freshness {
        if self.snapshot.is_none() {
            return Freshness::Newer;
        }
        match (self.high_water, incoming.sequence) {
            (Some(held), Some(seq)) if seq <= held => Freshness::Stale,
            (_, Some(_)) => Freshness::Newer,
            (_, None) if self.fingerprint == Some(incoming.fingerprint()) => Freshness::Duplicate,
            (_, None) => Freshness::Newer,
        }
    }

    /// Replaces the held snapshot if `incoming` is newer.
    ///
    /// Returns the accepted snapshot, or the rejection reason.
    pub fn apply(
        &mut self,
        incoming: BalanceSnapshot,
    ) -> Result<Arc<BalanceSnapshot>, Freshness> {
        match self.freshness(&incoming) {
            Freshness::Newer => {}
            rejected => return Err(rejected),
        }

        if let Some(seq) = incoming.sequence {
            self.high_water = Some(self.high_water.map_or(seq, |held| held.max(seq)));
        }
        self.fingerprint = Some(incoming.fingerprint());
        let snapshot = Arc::new(incoming);
        self.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Replaces only the transaction list of the held snapshot.
    ///
    /// Returns `None` when no snapshot is held yet, since there are no
    /// balances to attach the list to.
    pub fn apply_transactions(
        &mut self,
        sequence: Option<u64>,
        transactions: Vec<TransactionRecord>,
    ) -> Option<Result<Arc<BalanceSnapshot>, Freshness>> {
        let merged = self
            .snapshot
            .as_ref()?
            .with_transactions(sequence, transactions);
        Some(self.apply(merged))
    }

    /// Moves to `next` if the state machine allows it.
    ///
    /// Returns `true` when the status changed.
    pub fn transition(&mut self, next: ConnectionStatus) -> bool {
        if self.status.can_transition(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn snap(total: Decimal, sequence: Option<u64>) -> BalanceSnapshot {
        BalanceSnapshot {
            total_balance: total,
            wallet_balances: BTreeMap::new(),
            sequence,
            transactions: None,
        }
    }

    #[test]
    fn first_snapshot_is_always_accepted() {
        let mut state = ChannelState::new();
        assert!(state.apply(snap(dec!(100), Some(1))).is_ok());
        assert_eq!(state.sequence(), Some(1));
    }

    #[test]
    fn duplicate_sequence_is_stale() {
        let mut state = ChannelState::new();
        state.apply(snap(dec!(100), Some(1))).unwrap();

        assert_eq!(state.apply(snap(dec!(100), Some(1))), Err(Freshness::Stale));
        let accepted = state.apply(snap(dec!(150), Some(2))).unwrap();
        assert_eq!(accepted.total_balance, dec!(150));
        assert_eq!(state.sequence(), Some(2));
    }

    #[test]
    fn late_lower_sequence_is_discarded() {
        let mut state = ChannelState::new();
        state.apply(snap(dec!(100), Some(1))).unwrap();
        state.apply(snap(dec!(500), Some(5))).unwrap();

        assert_eq!(state.apply(snap(dec!(300), Some(3))), Err(Freshness::Stale));
        assert_eq!(state.sequence(), Some(5));
        assert_eq!(state.snapshot().unwrap().total_balance, dec!(500));
    }

    #[test]
    fn final_sequence_is_the_maximum_in_any_order() {
        let orders: [&[u64]; 4] = [
            &[2, 3, 4, 5],
            &[5, 4, 3, 2],
            &[3, 5, 2, 4, 5, 3],
            &[4, 2, 2, 5, 1],
        ];
        for order in orders {
            let mut state = ChannelState::new();
            state.apply(snap(dec!(0), Some(1))).unwrap();
            for &seq in order {
                let _ = state.apply(snap(Decimal::from(seq), Some(seq)));
            }
            assert_eq!(state.sequence(), Some(5), "order {order:?}");
            assert_eq!(state.snapshot().unwrap().total_balance, dec!(5));
        }
    }

    #[test]
    fn unsequenced_duplicates_are_detected_by_content() {
        let mut state = ChannelState::new();
        state.apply(snap(dec!(100), None)).unwrap();

        assert_eq!(state.apply(snap(dec!(100), None)), Err(Freshness::Duplicate));
        assert!(state.apply(snap(dec!(120), None)).is_ok());
    }

    #[test]
    fn unsequenced_update_keeps_high_water_mark() {
        let mut state = ChannelState::new();
        state.apply(snap(dec!(100), Some(4))).unwrap();
        state.apply(snap(dec!(90), None)).unwrap();

        assert_eq!(state.sequence(), Some(4));
        assert_eq!(state.apply(snap(dec!(80), Some(4))), Err(Freshness::Stale));
    }

    #[test]
    fn transactions_update_needs_a_held_snapshot() {
        let mut state = ChannelState::new();
        assert!(state.apply_transactions(Some(1), Vec::new()).is_none());

        state.apply(snap(dec!(100), Some(1))).unwrap();
        let merged = state.apply_transactions(Some(2), Vec::new()).unwrap().unwrap();
        assert_eq!(merged.total_balance, dec!(100));
        assert_eq!(merged.transactions.as_deref(), Some(&[][..]));
    }

    #[test]
    fn status_follows_the_state_machine() {
        let mut state = ChannelState::new();
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert!(!state.transition(ConnectionStatus::Reconnecting));
        assert!(state.transition(ConnectionStatus::Live));
        assert!(!state.transition(ConnectionStatus::Live));
        assert!(state.transition(ConnectionStatus::Reconnecting));
        assert!(state.transition(ConnectionStatus::Live));
        assert!(state.transition(ConnectionStatus::Closed));
        assert!(!state.transition(ConnectionStatus::Live));
        assert!(!state.transition(ConnectionStatus::Closed));
        assert_eq!(state.status(), ConnectionStatus::Closed);
    }
}
