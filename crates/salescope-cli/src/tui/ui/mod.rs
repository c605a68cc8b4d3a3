mod footer;
mod marketing;
mod overview;
mod products;
mod widgets;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};

use crate::tui::app::{App, Tab};

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(area);

    render_tabs(frame, app, chunks[0]);

    // only a failed sales fetch blanks the tabs; leads/recent failures
    // render inside their own widgets
    if let Some(ref error) = app.data.sales_error {
        render_error(frame, chunks[1], error);
    } else {
        match app.current_tab {
            Tab::Overview => overview::render(frame, app, chunks[1]),
            Tab::Marketing => marketing::render(frame, app, chunks[1]),
            Tab::Products => products::render(frame, app, chunks[1]),
        }
    }

    footer::render(frame, app, chunks[2]);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = Tab::all()
        .iter()
        .map(|t| Line::from(t.as_str()))
        .collect();
    let selected = Tab::all()
        .iter()
        .position(|t| *t == app.current_tab)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" salescope "))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_error(frame: &mut Frame, area: Rect, error: &str) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let center = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Percentage(40),
        ])
        .split(inner)[1];

    let paragraph = Paragraph::new(format!("Error: {error}"))
        .style(Style::default().fg(Color::Red))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, center);
}
