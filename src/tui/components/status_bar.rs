//! Status bar component.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::channel::ConnectionStatus;
use crate::tui::app::App;

/// Renders the status bar.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let status_style = match app.connection_status {
        ConnectionStatus::Live => Style::default().fg(Color::Green),
        ConnectionStatus::Connecting => Style::default().fg(Color::Yellow),
        // The one state the user must notice: balances may be out of date.
        ConnectionStatus::Reconnecting => Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        ConnectionStatus::Closed => Style::default().fg(Color::Red),
    };

    let sequence_span = match app.snapshot.as_ref().and_then(|s| s.sequence) {
        Some(seq) => Span::styled(format!(" #{seq} "), Style::default().fg(Color::White)),
        None => Span::styled(" #- ", Style::default().fg(Color::Gray)),
    };

    let error_span = if let Some(ref error) = app.error_message {
        Span::styled(
            format!(" {} ", error.message),
            Style::default().fg(Color::Red),
        )
    } else {
        Span::raw("")
    };

    let user = format!(" {} ", app.profile.email);

    let line = Line::from(vec![
        Span::styled(format!(" {} ", app.connection_status.label()), status_style),
        Span::raw("│"),
        sequence_span,
        Span::raw("│"),
        error_span,
        Span::raw(format!(
            "{:>width$}",
            user,
            width = area.width.saturating_sub(40) as usize
        )),
    ]);

    let para = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}
