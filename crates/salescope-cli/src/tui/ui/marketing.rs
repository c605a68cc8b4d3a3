use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use salescope_core::format::{format_currency, format_percentage};

use super::widgets::{muted, render_summary_bars, BarMetric};
use crate::tui::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    render_kpis(frame, app, chunks[0]);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(chunks[1]);

    render_summary_bars(
        frame,
        charts[0],
        "Revenue by campaign",
        &app.data.campaigns,
        BarMetric::Revenue,
    );
    render_summary_bars(
        frame,
        charts[1],
        "Revenue by channel",
        &app.data.channels,
        BarMetric::Revenue,
    );
    render_summary_bars(
        frame,
        charts[2],
        "Students by state",
        &app.data.states,
        BarMetric::Count,
    );
}

fn render_kpis(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Marketing ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let stats = &app.data.marketing;
    let best_channel = stats
        .best_channel
        .as_ref()
        .map(|b| format!("{} ({})", b.name, format_currency(b.total)))
        .unwrap_or_else(|| "-".to_string());
    let best_campaign = stats
        .best_campaign
        .as_ref()
        .map(|b| format!("{} ({})", b.name, format_currency(b.total)))
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled("Channels: ", muted()),
            Span::raw(stats.channel_count.to_string()),
            Span::styled("   Campaigns: ", muted()),
            Span::raw(stats.campaign_count.to_string()),
            Span::styled("   Conversion: ", muted()),
            // lead-derived, so a failed leads fetch blanks only this number
            if app.data.leads_error.is_some() {
                Span::styled("unavailable", Style::default().fg(Color::Red))
            } else {
                Span::styled(
                    format_percentage(stats.conversion_rate),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )
            },
        ]),
        Line::from(vec![
            Span::styled("Best channel: ", muted()),
            Span::raw(best_channel),
            Span::styled("   Best campaign: ", muted()),
            Span::raw(best_campaign),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}
