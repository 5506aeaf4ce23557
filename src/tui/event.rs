//! Event handling for the TUI.

use std::time::Duration;

use crossterm::event::{
    Event as CrosstermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::channel::{ChannelEvent, ConnectionStatus};

use super::app::{App, TransactionTab};

/// Terminal-side input.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Drives redraws and expires the error banner.
    Tick,
}

/// Everything the dashboard loop reacts to.
#[derive(Debug)]
pub enum Message {
    Input(Event),
    /// Accepted transition from the balance channel.
    Channel(ChannelEvent),
    Quit,
}

/// Forwards terminal key presses and resizes until the receiver is gone.
pub fn spawn_event_reader(tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
                Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                Ok(_) => continue,
                Err(e) => {
                    warn!("Terminal event stream failed: {e}");
                    break;
                }
            };
            if tx.send(Message::Input(event)).is_err() {
                break;
            }
        }
    });
}

/// Sends a [`Event::Tick`] every `interval_ms`, skipping missed ticks.
pub fn spawn_tick_timer(tx: mpsc::UnboundedSender<Message>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while !tx.is_closed() {
            interval.tick().await;
            let _ = tx.send(Message::Input(Event::Tick));
        }
    });
}

/// Sends [`Message::Quit`] on Ctrl-C delivered as a signal.
pub fn spawn_interrupt_listener(tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Message::Quit);
        }
    });
}

/// Applies one message to the dashboard state.
pub fn update(app: &mut App, message: Message) {
    match message {
        Message::Input(event) => handle_input(app, event),
        Message::Channel(ChannelEvent::Snapshot(snapshot)) => {
            app.show_snapshot(snapshot);
        }
        Message::Channel(ChannelEvent::Status(status)) => {
            if status == ConnectionStatus::Reconnecting {
                app.show_error("Balance feed lost, reconnecting");
            }
            app.connection_status = status;
        }
        Message::Quit => app.should_quit = true,
    }
}

fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::Resize(_, _) => {}
        Event::Tick => app.clear_stale_errors(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') if key.modifiers.is_empty() => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Tab | KeyCode::Left | KeyCode::Right => app.active_tab.toggle(),
        KeyCode::Char('i') => app.active_tab = TransactionTab::Income,
        KeyCode::Char('e') => app.active_tab = TransactionTab::Expense,
        _ => {}
    }
}
