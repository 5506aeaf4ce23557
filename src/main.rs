use std::fs::File;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spendwise::SpendwiseError;
use spendwise::api::ApiClient;
use spendwise::channel::{ChannelHandle, LiveBalanceChannel};
use spendwise::config::fetch_config;
use spendwise::session;
use spendwise::store::LocalStore;
use spendwise::tui::{self, App, Message, Tui};
use spendwise::websocket::WsTransport;

/// Dashboard refresh interval.
const TICK_MS: u64 = 250;

#[tokio::main]
async fn main() -> Result<(), SpendwiseError> {
    let app_config = fetch_config()?;

    // The dashboard owns the terminal, so logs go to a file.
    let log_file = File::create(&app_config.log_file)
        .map_err(|e| SpendwiseError::Io(format!("failed to create log file: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    let api = Arc::new(ApiClient::new(&app_config.backend.api_url)?);
    let mut store = LocalStore::open(&app_config.store_path)?;

    let credentials = app_config.backend.credentials();
    let profile = session::establish(&api, &mut store, credentials.as_ref()).await?;
    info!(user = %profile.id, "Session established");

    let channel = LiveBalanceChannel::new(
        api.clone(),
        Arc::new(
            WsTransport::new(&app_config.backend.websocket_url)
                .with_keepalive(app_config.channel.idle_timeout / 3),
        ),
        app_config.channel.clone(),
    );
    let handle = channel.open(profile.id).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let channel_tx = tx.clone();
    handle.on_update(move |event| {
        let _ = channel_tx.send(Message::Channel(event.clone()));
    });

    let mut app = App::new(profile, store.dark_mode());

    let mut terminal = tui::setup_terminal()?;
    let result = run(&mut terminal, &mut app, tx, rx).await;
    let restored = tui::restore_terminal(&mut terminal);

    close_down(&handle, restored).await?;
    result
}

/// Drives the dashboard until the user quits.
async fn run(
    terminal: &mut Tui,
    app: &mut App,
    tx: mpsc::UnboundedSender<Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> Result<(), SpendwiseError> {
    tui::event::spawn_event_reader(tx.clone());
    tui::event::spawn_interrupt_listener(tx.clone());
    tui::event::spawn_tick_timer(tx, TICK_MS);

    while !app.should_quit {
        terminal
            .draw(|frame| tui::render(frame, app))
            .map_err(|e| SpendwiseError::Io(format!("failed to draw: {e}")))?;

        match rx.recv().await {
            Some(message) => tui::event::update(app, message),
            None => {
                error!("Event channel closed");
                break;
            }
        }
    }

    Ok(())
}

/// Closes the channel, then reports any terminal restore failure.
async fn close_down(
    handle: &ChannelHandle,
    restored: Result<(), SpendwiseError>,
) -> Result<(), SpendwiseError> {
    handle.shutdown().await;
    info!(account = %handle.account_id(), "Balance channel closed");
    restored
}
