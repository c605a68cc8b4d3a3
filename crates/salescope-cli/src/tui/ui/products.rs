use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use salescope_core::format::{format_count, format_currency};
use salescope_core::CourseSortField;

use super::widgets::{muted, render_month_chart, render_summary_bars, BarMetric};
use crate::tui::app::App;
use crate::tui::data::TimelineState;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_course_table(frame, app, columns[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(columns[1]);

    render_summary_bars(
        frame,
        side[0],
        "Revenue by course",
        &app.data.course_revenue,
        BarMetric::RevenueShare,
    );
    render_timeline(frame, app, side[1]);
}

fn sort_marker(app: &App, field: CourseSortField) -> &'static str {
    use salescope_core::SortDirection;
    if app.sort_field != field {
        return "";
    }
    match app.sort_direction {
        SortDirection::Ascending => " ↑",
        SortDirection::Descending => " ↓",
    }
}

fn render_course_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec![
        Cell::from("Code"),
        Cell::from(format!("Course{}", sort_marker(app, CourseSortField::Name))),
        Cell::from(format!("Students{}", sort_marker(app, CourseSortField::Students))),
        Cell::from(format!("Revenue{}", sort_marker(app, CourseSortField::Revenue))),
        Cell::from(format!("Avg{}", sort_marker(app, CourseSortField::AverageTicket))),
        Cell::from(format!("Last sale{}", sort_marker(app, CourseSortField::LastSale))),
    ])
    .style(muted());

    let rows: Vec<Row> = app
        .data
        .courses
        .iter()
        .enumerate()
        .map(|(i, course)| {
            let row = Row::new(vec![
                Cell::from(course.code.clone()),
                Cell::from(course.name.clone()),
                Cell::from(format_count(u64::from(course.students))),
                Cell::from(format_currency(course.revenue)),
                Cell::from(format_currency(course.average_ticket)),
                Cell::from(
                    course
                        .last_sale
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
            if app.selected_course == Some(i) {
                row.style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(40),
            Constraint::Length(9),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(11),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Courses "));

    frame.render_widget(table, area);
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.selected_course_name() {
        Some(name) => format!("Timeline: {name}"),
        None => "Timeline: all courses".to_string(),
    };

    match &app.timeline {
        TimelineState::Idle => {
            // the unfiltered series doubles as the idle view
            render_month_chart(frame, area, &title, &app.data.timeline);
        }
        TimelineState::Loaded(points) => render_month_chart(frame, area, &title, points),
        TimelineState::Loading => render_message(frame, area, &title, "loading...", muted()),
        TimelineState::Empty => render_message(
            frame,
            area,
            &title,
            "no sales for this course in the window",
            muted(),
        ),
        TimelineState::Error(e) => render_message(
            frame,
            area,
            &title,
            &format!("error: {e}"),
            Style::default().fg(Color::Red),
        ),
    }
}

fn render_message(frame: &mut Frame, area: Rect, title: &str, message: &str, style: Style) {
    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(message.to_string())
            .style(style)
            .alignment(Alignment::Center),
        inner,
    );
}
