use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

use salescope_core::format::{format_count, format_currency};
use salescope_core::UNIDENTIFIED_COURSE;

use super::widgets::{kpi_card, muted, render_month_chart};
use crate::tui::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(45),
            Constraint::Min(0),
        ])
        .split(area);

    render_kpis(frame, app, chunks[0]);
    render_month_chart(frame, chunks[1], "Revenue by month", &app.data.timeline);
    render_recent(frame, app, chunks[2]);
}

fn render_kpis(frame: &mut Frame, app: &App, area: Rect) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let stats = &app.data.overview;
    kpi_card(
        frame,
        cards[0],
        "Revenue (month)",
        &format_currency(stats.month_revenue),
        Color::Green,
    );
    kpi_card(
        frame,
        cards[1],
        "New students",
        &format_count(u64::from(stats.new_students)),
        Color::Cyan,
    );
    if app.data.leads_error.is_some() {
        kpi_card(frame, cards[2], "New leads", "unavailable", Color::Red);
    } else {
        kpi_card(
            frame,
            cards[2],
            "New leads",
            &format_count(u64::from(stats.new_leads)),
            Color::Yellow,
        );
    }
    kpi_card(
        frame,
        cards[3],
        "Average ticket",
        &format_currency(stats.average_ticket),
        Color::Magenta,
    );
}

fn render_recent(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(error) = &app.data.recent_error {
        let block = Block::default().borders(Borders::ALL).title(" Recent sales ");
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            ratatui::widgets::Paragraph::new(format!("error: {error}"))
                .style(Style::default().fg(Color::Red))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let rows: Vec<Row> = app
        .data
        .recent
        .iter()
        .map(|sale| {
            Row::new(vec![
                Cell::from(
                    sale.purchase_day()
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| sale.purchase_date.clone()),
                ),
                Cell::from(sale.buyer_name().unwrap_or("Unknown").to_string()),
                Cell::from(sale.course_name().unwrap_or(UNIDENTIFIED_COURSE).to_string()),
                Cell::from(sale.source().unwrap_or("-").to_string()),
                Cell::from(format_currency(sale.amount())),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Percentage(20),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(vec!["Date", "Buyer", "Course", "Source", "Amount"]).style(muted()),
    )
    .block(Block::default().borders(Borders::ALL).title(" Recent sales "));

    frame.render_widget(table, area);
}
