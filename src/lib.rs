//! Spendwise client library.
//!
//! Keeps an always-current view of an account's balances by combining a
//! REST snapshot with the backend's WebSocket push feed, and exposes it
//! through [`channel::LiveBalanceChannel`]. Also provides the REST client,
//! the session bootstrap, a small local store, and a terminal dashboard.

pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod tui;
pub mod websocket;

pub use error::{Result, SpendwiseError};
