//! Raw-mode terminal lifecycle for the dashboard.

use std::io::{self, IsTerminal, Stdout};

use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::{Result, SpendwiseError};

/// Terminal type driven by the dashboard.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

fn io_error(context: &'static str) -> impl FnOnce(io::Error) -> SpendwiseError {
    move |e| SpendwiseError::Io(format!("{context}: {e}"))
}

/// Puts the terminal into raw mode on the alternate screen.
///
/// Also installs a panic hook that puts the terminal back before the
/// panic message is printed, so a crash does not leave the shell in raw
/// mode.
///
/// # Errors
///
/// Returns [`SpendwiseError::Io`] if stdout is not a TTY or the terminal
/// cannot be switched.
pub fn setup_terminal() -> Result<Tui> {
    if !io::stdout().is_terminal() {
        return Err(SpendwiseError::Io(
            "the dashboard needs an interactive terminal (TTY)".to_string(),
        ));
    }

    enable_raw_mode().map_err(io_error("failed to enable raw mode"))?;
    if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, cursor::Hide) {
        let _ = disable_raw_mode();
        return Err(io_error("failed to enter alternate screen")(e));
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = reset();
        previous(info);
    }));

    Terminal::new(CrosstermBackend::new(io::stdout())).map_err(|e| {
        let _ = reset();
        io_error("failed to create terminal")(e)
    })
}

/// Leaves the alternate screen and disables raw mode.
///
/// # Errors
///
/// Returns [`SpendwiseError::Io`] if the terminal cannot be restored.
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    reset()?;
    terminal
        .show_cursor()
        .map_err(io_error("failed to show cursor"))
}

fn reset() -> Result<()> {
    // Leave the screen even if raw mode is already off.
    let raw = disable_raw_mode().map_err(io_error("failed to disable raw mode"));
    execute!(io::stdout(), LeaveAlternateScreen, cursor::Show)
        .map_err(io_error("failed to leave alternate screen"))?;
    raw
}
