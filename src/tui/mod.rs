//! Terminal dashboard for the spendwise client.
//!
//! Provides a Ratatui-based view of the live balance channel: total and
//! per-wallet balances, recent transactions, and connectivity status.

pub mod app;
pub mod components;
pub mod event;
pub mod terminal;
pub mod ui;

pub use app::App;
pub use event::{Event, Message};
pub use terminal::{Tui, restore_terminal, setup_terminal};
pub use ui::render;
