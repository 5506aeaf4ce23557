//! Tab bar component.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::tui::app::{App, TransactionTab};

/// Renders the income/expense tab bar.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans: Vec<Span> = Vec::new();

    for tab in TransactionTab::ALL {
        let style = if tab == app.active_tab {
            Style::default()
                .fg(Color::Black)
                .bg(accent(tab))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };

        spans.push(Span::styled(format!(" {} ", tab.title()), style));
        spans.push(Span::raw(" "));
    }

    let para = Paragraph::new(Line::from(spans));
    frame.render_widget(para, area);
}

/// Colour associated with a tab's transactions.
pub fn accent(tab: TransactionTab) -> Color {
    match tab {
        TransactionTab::Income => Color::Green,
        TransactionTab::Expense => Color::Red,
    }
}
