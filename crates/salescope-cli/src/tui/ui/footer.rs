use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::widgets::muted;
use crate::tui::app::{App, Tab};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.current_tab {
        Tab::Products => "q quit · tab switch · r reload · s sort · d direction · ←/→ course",
        _ => "q quit · tab switch · 1/2/3 tabs · r reload",
    };

    let mut lines = vec![Line::from(Span::styled(hints, muted()))];
    if let Some(status) = &app.status_message {
        lines.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}
