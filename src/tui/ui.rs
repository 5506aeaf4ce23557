//! Dashboard layout and rendering.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use rust_decimal::Decimal;

use super::app::App;
use super::components::{status_bar, tab_bar};

/// Renders the entire application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Tab bar
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Balance header
            Constraint::Min(8),    // Wallets | Transactions
            Constraint::Length(1), // Keybindings help
        ])
        .split(area);

    tab_bar::render(frame, main_layout[0], app);
    status_bar::render(frame, main_layout[1], app);
    render_balance_header(frame, main_layout[2], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(main_layout[3]);

    render_wallets(frame, content[0], app);
    render_transactions(frame, content[1], app);

    render_keybindings(frame, main_layout[4]);
}

/// Formats an amount the way the dashboard shows money.
pub fn format_amount(amount: Decimal) -> String {
    format!("Rs {:.2}", amount.round_dp(2))
}

/// Foreground and border colours for the selected palette.
fn palette(app: &App) -> (Color, Color) {
    if app.dark_mode {
        (Color::White, Color::DarkGray)
    } else {
        (Color::Black, Color::Gray)
    }
}

/// Renders the greeting and total balance.
fn render_balance_header(frame: &mut Frame, area: Rect, app: &App) {
    let total = match &app.snapshot {
        Some(s) => Span::styled(
            format_amount(s.total_balance),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::styled(" -- ", Style::default().fg(Color::Gray)),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" Hi, {} ", app.profile.name),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("Total: "),
        total,
    ]);

    let para = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}

/// Renders one line per wallet balance.
fn render_wallets(frame: &mut Frame, area: Rect, app: &App) {
    let (fg, border) = palette(app);
    let block = Block::default()
        .title(" Wallets ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    match &app.snapshot {
        Some(snapshot) if !snapshot.wallet_balances.is_empty() => {
            let name_width = inner.width.saturating_sub(18) as usize;
            for (name, balance) in &snapshot.wallet_balances {
                let color = if *balance < Decimal::ZERO { Color::Red } else { fg };
                lines.push(Line::from(Span::styled(
                    format!(" {:<name_width$}{:>16}", name, format_amount(*balance)),
                    Style::default().fg(color),
                )));
            }
        }
        Some(_) => lines.push(Line::from(Span::styled(
            " No wallets",
            Style::default().fg(Color::Gray),
        ))),
        None => lines.push(Line::from(Span::styled(
            " Loading...",
            Style::default().fg(Color::Gray),
        ))),
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Renders the transactions of the active tab.
fn render_transactions(frame: &mut Frame, area: Rect, app: &App) {
    let (_, border) = palette(app);
    let accent = tab_bar::accent(app.active_tab);
    let block = Block::default()
        .title(format!(" {} ", app.active_tab.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        format!(" {:<16} {:<20} {:>14}", "Date", "Category", "Amount"),
        Style::default().fg(Color::Gray),
    ))];

    let transactions = app.visible_transactions();
    let max_rows = inner.height.saturating_sub(1) as usize;
    for tx in transactions.iter().take(max_rows) {
        lines.push(Line::from(vec![
            Span::raw(format!(
                " {:<16} {:<20} ",
                tx.occurred_at.format("%Y-%m-%d %H:%M"),
                truncate(&tx.category, 20)
            )),
            Span::styled(
                format!("{:>14}", format_amount(tx.amount)),
                Style::default().fg(accent),
            ),
        ]));
    }

    if transactions.is_empty() {
        lines.push(Line::from(Span::styled(
            " No transactions",
            Style::default().fg(Color::Gray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn render_keybindings(frame: &mut Frame, area: Rect) {
    let help = "[Tab/←/→]switch tab [i]ncome [e]xpense [q]quit";

    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_have_two_decimals() {
        assert_eq!(format_amount(dec!(1500)), "Rs 1500.00");
        assert_eq!(format_amount(dec!(12.345)), "Rs 12.34");
        assert_eq!(format_amount(dec!(-3.5)), "Rs -3.50");
    }

    #[test]
    fn long_categories_are_truncated() {
        assert_eq!(truncate("Food", 20), "Food");
        assert_eq!(truncate("Groceries and household", 10), "Groceries…");
    }
}
