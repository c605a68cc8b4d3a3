use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use salescope_core::{sort_course_rows, CourseSortField, SortDirection};

use super::data::{DashboardData, DataLoader, TimelineResult, TimelineState};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Marketing,
    Products,
}

impl Tab {
    pub fn all() -> &'static [Tab] {
        &[Tab::Overview, Tab::Marketing, Tab::Products]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Marketing => "Marketing",
            Tab::Products => "Products",
        }
    }

    pub fn next(self) -> Tab {
        match self {
            Tab::Overview => Tab::Marketing,
            Tab::Marketing => Tab::Products,
            Tab::Products => Tab::Overview,
        }
    }

    pub fn prev(self) -> Tab {
        match self {
            Tab::Overview => Tab::Products,
            Tab::Marketing => Tab::Overview,
            Tab::Products => Tab::Marketing,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub current_tab: Tab,
    pub data: DashboardData,
    loader: DataLoader,

    pub sort_field: CourseSortField,
    pub sort_direction: SortDirection,

    /// Index into `data.courses`; `None` means the all-course series.
    pub selected_course: Option<usize>,
    pub timeline: TimelineState,
    timeline_generation: u64,
    timeline_tx: Sender<TimelineResult>,
    timeline_rx: Receiver<TimelineResult>,

    pub status_message: Option<String>,
    status_message_time: Option<Instant>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let loader = DataLoader::new(&config)?;
        let (timeline_tx, timeline_rx) = mpsc::channel();
        Ok(Self {
            should_quit: false,
            current_tab: Tab::Overview,
            data: DashboardData::default(),
            loader,
            sort_field: CourseSortField::Revenue,
            sort_direction: SortDirection::Descending,
            selected_course: None,
            timeline: TimelineState::Idle,
            timeline_generation: 0,
            timeline_tx,
            timeline_rx,
            status_message: None,
            status_message_time: None,
        })
    }

    pub fn load_data(&mut self) {
        self.data = self.loader.load();
        self.selected_course = None;
        self.timeline = TimelineState::Idle;
        self.resort_courses();
        let error = self.data.first_error().map(str::to_string);
        match error {
            Some(e) => self.set_status(&format!("Error: {e}")),
            None => self.set_status("Data loaded"),
        }
    }

    pub fn on_tick(&mut self) {
        while let Ok(result) = self.timeline_rx.try_recv() {
            self.on_timeline_result(result);
        }

        if let Some(status_time) = self.status_message_time {
            if status_time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    /// Only the newest selection's fetch may land; completions tagged with
    /// an older generation are dropped no matter the arrival order.
    pub fn on_timeline_result(&mut self, result: TimelineResult) {
        if result.generation != self.timeline_generation {
            return;
        }
        self.timeline = match result.points {
            Ok(points) if points.is_empty() => TimelineState::Empty,
            Ok(points) => TimelineState::Loaded(points),
            Err(e) => TimelineState::Error(e),
        };
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                return true;
            }
            KeyCode::Tab => self.current_tab = self.current_tab.next(),
            KeyCode::BackTab => self.current_tab = self.current_tab.prev(),
            KeyCode::Char('1') => self.current_tab = Tab::Overview,
            KeyCode::Char('2') => self.current_tab = Tab::Marketing,
            KeyCode::Char('3') => self.current_tab = Tab::Products,
            KeyCode::Char('r') => self.load_data(),
            KeyCode::Char('s') if self.current_tab == Tab::Products => {
                self.sort_field = next_sort_field(self.sort_field);
                self.resort_courses();
            }
            KeyCode::Char('d') if self.current_tab == Tab::Products => {
                self.sort_direction = self.sort_direction.toggled();
                self.resort_courses();
            }
            KeyCode::Left if self.current_tab == Tab::Products => self.select_prev_course(),
            KeyCode::Right if self.current_tab == Tab::Products => self.select_next_course(),
            _ => {}
        }
        false
    }

    fn resort_courses(&mut self) {
        let selected_code = self
            .selected_course
            .and_then(|i| self.data.courses.get(i))
            .map(|c| c.code.clone());
        sort_course_rows(&mut self.data.courses, self.sort_field, self.sort_direction);
        // keep the selection pinned to the course, not the row position
        if let Some(code) = selected_code {
            self.selected_course = self.data.courses.iter().position(|c| c.code == code);
        }
    }

    fn select_next_course(&mut self) {
        if self.data.courses.is_empty() {
            return;
        }
        let next = match self.selected_course {
            None => Some(0),
            Some(i) if i + 1 < self.data.courses.len() => Some(i + 1),
            Some(_) => None,
        };
        self.set_selected_course(next);
    }

    fn select_prev_course(&mut self) {
        if self.data.courses.is_empty() {
            return;
        }
        let prev = match self.selected_course {
            None => Some(self.data.courses.len() - 1),
            Some(0) => None,
            Some(i) => Some(i - 1),
        };
        self.set_selected_course(prev);
    }

    fn set_selected_course(&mut self, index: Option<usize>) {
        self.selected_course = index;
        self.timeline_generation += 1;

        match index.and_then(|i| self.data.courses.get(i)) {
            Some(course) => {
                self.timeline = TimelineState::Loading;
                self.loader.spawn_timeline(
                    self.timeline_generation,
                    course.code.clone(),
                    self.timeline_tx.clone(),
                );
            }
            None => self.timeline = TimelineState::Idle,
        }
    }

    pub fn selected_course_name(&self) -> Option<&str> {
        self.selected_course
            .and_then(|i| self.data.courses.get(i))
            .map(|c| c.name.as_str())
    }

    fn set_status(&mut self, message: &str) {
        self.status_message = Some(message.to_string());
        self.status_message_time = Some(Instant::now());
    }
}

fn next_sort_field(field: CourseSortField) -> CourseSortField {
    match field {
        CourseSortField::Revenue => CourseSortField::Students,
        CourseSortField::Students => CourseSortField::AverageTicket,
        CourseSortField::AverageTicket => CourseSortField::LastSale,
        CourseSortField::LastSale => CourseSortField::Name,
        CourseSortField::Name => CourseSortField::Revenue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Operator;
    use salescope_core::MonthlyPoint;

    fn test_app() -> App {
        let config = Config {
            store_url: "https://store.invalid".to_string(),
            store_key: "key".to_string(),
            operator: Operator {
                username: "admin".to_string(),
                password_sha256: String::new(),
            },
        };
        App::new(config).unwrap()
    }

    fn point(month: u32, total: f64) -> MonthlyPoint {
        let bucket = salescope_core::MonthBucket { year: 2025, month };
        MonthlyPoint {
            label: bucket.label(),
            bucket,
            count: 1,
            total,
        }
    }

    #[test]
    fn stale_timeline_results_are_dropped() {
        let mut app = test_app();
        app.timeline_generation = 2;
        app.timeline = TimelineState::Loading;

        // a slow response from an earlier selection arrives late
        app.on_timeline_result(TimelineResult {
            generation: 1,
            points: Ok(vec![point(1, 999.0)]),
        });
        assert!(matches!(app.timeline, TimelineState::Loading));

        app.on_timeline_result(TimelineResult {
            generation: 2,
            points: Ok(vec![point(2, 10.0)]),
        });
        match &app.timeline {
            TimelineState::Loaded(points) => assert_eq!(points[0].total, 10.0),
            other => panic!("expected Loaded, got a different state: {}", state_name(other)),
        }
    }

    #[test]
    fn empty_result_maps_to_empty_state() {
        let mut app = test_app();
        app.timeline_generation = 1;
        app.on_timeline_result(TimelineResult {
            generation: 1,
            points: Ok(vec![]),
        });
        assert!(matches!(app.timeline, TimelineState::Empty));
    }

    #[test]
    fn failed_result_maps_to_error_state() {
        let mut app = test_app();
        app.timeline_generation = 1;
        app.on_timeline_result(TimelineResult {
            generation: 1,
            points: Err("boom".to_string()),
        });
        match &app.timeline {
            TimelineState::Error(e) => assert_eq!(e, "boom"),
            other => panic!("expected Error, got {}", state_name(other)),
        }
    }

    #[test]
    fn tabs_cycle_in_both_directions() {
        for tab in Tab::all() {
            assert_eq!(tab.next().prev(), *tab);
        }
    }

    #[test]
    fn sort_field_cycle_covers_all_columns() {
        let mut field = CourseSortField::Revenue;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(field);
            field = next_sort_field(field);
        }
        assert_eq!(field, CourseSortField::Revenue);
        assert_eq!(seen.len(), 5);
    }

    fn state_name(state: &TimelineState) -> &'static str {
        match state {
            TimelineState::Idle => "Idle",
            TimelineState::Loading => "Loading",
            TimelineState::Loaded(_) => "Loaded",
            TimelineState::Empty => "Empty",
            TimelineState::Error(_) => "Error",
        }
    }
}
