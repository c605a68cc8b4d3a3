use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use salescope_core::format::{format_count, format_currency_whole, format_percentage};
use salescope_core::{MonthlyPoint, SummaryRow};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BarMetric {
    Revenue,
    /// Revenue plus each row's share of the retained total.
    RevenueShare,
    Count,
}

/// Horizontal bar list for a ranked dimension. One row per group:
/// label, value, and a bar scaled against the dimension's maximum.
pub fn render_summary_bars(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[SummaryRow],
    metric: BarMetric,
) {
    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if rows.is_empty() {
        frame.render_widget(Paragraph::new("no data").style(muted()), inner);
        return;
    }

    let by_count = metric == BarMetric::Count;
    let max = rows
        .iter()
        .map(|r| if by_count { f64::from(r.count) } else { r.total })
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let retained_total: f64 = rows.iter().map(|r| r.total).sum();

    let label_width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    let mut lines = Vec::new();
    for row in rows.iter().take(inner.height as usize) {
        let value = if by_count { f64::from(row.count) } else { row.total };
        let rendered = match metric {
            BarMetric::Count => format_count(u64::from(row.count)),
            BarMetric::Revenue => format_currency_whole(row.total),
            BarMetric::RevenueShare => format!(
                "{} ({})",
                format_currency_whole(row.total),
                format_percentage(if retained_total > 0.0 {
                    row.total / retained_total
                } else {
                    0.0
                })
            ),
        };

        let bar_space = (inner.width as usize)
            .saturating_sub(label_width + rendered.chars().count() + 4)
            .max(1);
        let filled = ((value / max) * bar_space as f64).round() as usize;

        lines.push(Line::from(vec![
            Span::raw(format!("{:<label_width$}  ", row.label)),
            Span::styled("█".repeat(filled.min(bar_space)), Style::default().fg(Color::Cyan)),
            Span::styled(format!(" {rendered}"), muted()),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Vertical month series as a compact column chart with pt-BR month labels.
pub fn render_month_chart(frame: &mut Frame, area: Rect, title: &str, points: &[MonthlyPoint]) {
    use ratatui::widgets::{Bar, BarChart, BarGroup};

    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if points.is_empty() {
        frame.render_widget(Paragraph::new("no data").style(muted()), inner);
        return;
    }

    let bar_width = ((inner.width / points.len().max(1) as u16).saturating_sub(1)).clamp(3, 9);
    let bars: Vec<Bar> = points
        .iter()
        .map(|p| {
            Bar::default()
                .label(Line::from(p.bucket.label()))
                .value(p.total.max(0.0).round() as u64)
                .text_value(format_currency_whole(p.total))
        })
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    frame.render_widget(chart, inner);
}

pub fn muted() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn kpi_card(frame: &mut Frame, area: Rect, title: &str, value: &str, color: Color) {
    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(value.to_string())
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}
