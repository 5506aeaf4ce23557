//! Application state for the TUI.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::channel::ConnectionStatus;
use crate::models::{BalanceSnapshot, TransactionKind, TransactionRecord, UserProfile};

/// How long an error stays in the status bar.
const ERROR_DISPLAY_TIME: Duration = Duration::from_secs(5);

/// Central application state container.
pub struct App {
    /// The signed-in user.
    pub profile: UserProfile,
    /// Last snapshot shown on screen.
    pub snapshot: Option<Arc<BalanceSnapshot>>,
    /// Balance feed connectivity.
    pub connection_status: ConnectionStatus,
    /// Which transactions are listed.
    pub active_tab: TransactionTab,
    /// Palette selection, read once from the local store.
    pub dark_mode: bool,
    /// Error message to display (clears after timeout).
    pub error_message: Option<ErrorDisplay>,
    /// Flag to signal application should quit.
    pub should_quit: bool,
}

impl App {
    pub fn new(profile: UserProfile, dark_mode: bool) -> Self {
        Self {
            profile,
            snapshot: None,
            connection_status: ConnectionStatus::Connecting,
            active_tab: TransactionTab::default(),
            dark_mode,
            error_message: None,
            should_quit: false,
        }
    }

    /// Shows a snapshot unless it is older than the one on screen.
    ///
    /// Returns `true` if the display changed.
    pub fn show_snapshot(&mut self, snapshot: Arc<BalanceSnapshot>) -> bool {
        if let (Some(shown), Some(incoming)) = (
            self.snapshot.as_ref().and_then(|s| s.sequence),
            snapshot.sequence,
        ) && incoming < shown
        {
            debug!(shown, incoming, "Ignoring snapshot older than the one displayed");
            return false;
        }
        self.snapshot = Some(snapshot);
        true
    }

    /// Transactions of the active tab, latest first.
    pub fn visible_transactions(&self) -> Vec<&TransactionRecord> {
        let kind = self.active_tab.kind();
        self.snapshot
            .as_ref()
            .and_then(|s| s.transactions.as_ref())
            .map(|txs| txs.iter().filter(|tx| tx.kind == kind).collect())
            .unwrap_or_default()
    }

    /// Sets an error message to display.
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(ErrorDisplay {
            message: message.into(),
            timestamp: Instant::now(),
        });
    }

    /// Clears error messages older than the display time.
    pub fn clear_stale_errors(&mut self) {
        if let Some(ref error) = self.error_message
            && error.timestamp.elapsed() > ERROR_DISPLAY_TIME
        {
            self.error_message = None;
        }
    }
}

/// Transaction list filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransactionTab {
    #[default]
    Income,
    Expense,
}

impl TransactionTab {
    pub const ALL: [TransactionTab; 2] = [TransactionTab::Income, TransactionTab::Expense];

    /// Returns the display title for the tab.
    pub fn title(&self) -> &'static str {
        self.kind().label()
    }

    /// The transaction kind listed under this tab.
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionTab::Income => TransactionKind::Income,
            TransactionTab::Expense => TransactionKind::Expense,
        }
    }

    /// Toggles between tabs.
    pub fn toggle(&mut self) {
        *self = match self {
            TransactionTab::Income => TransactionTab::Expense,
            TransactionTab::Expense => TransactionTab::Income,
        };
    }
}

/// Error message with timestamp for auto-clear.
#[derive(Clone, Debug)]
pub struct ErrorDisplay {
    /// The error message.
    pub message: String,
    /// When the error was shown.
    pub timestamp: Instant,
}
