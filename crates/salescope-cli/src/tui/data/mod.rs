use std::sync::mpsc::Sender;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::runtime::Runtime;

use salescope_core::{
    course_table, marketing_stats, monthly_revenue, overview_stats, parse_day,
    revenue_by_campaign, revenue_by_course, revenue_by_source, students_by_state,
    trailing_window, CourseRow, DateOrder, LeadRecord, MarketingStats, MonthlyPoint,
    OverviewStats, RecordStore, SaleQuery, SaleRecord, SummaryRow,
};

use crate::config::Config;

const RECENT_LIMIT: u32 = 10;
const TIMELINE_MONTHS: u32 = 6;

/// Everything the dashboard renders, aggregated once per load. Each fetch
/// keeps its own error so one failed widget never blanks its siblings;
/// only a failed sales fetch is fatal for the aggregated views.
#[derive(Default)]
pub struct DashboardData {
    pub overview: OverviewStats,
    pub marketing: MarketingStats,
    pub campaigns: Vec<SummaryRow>,
    pub channels: Vec<SummaryRow>,
    pub course_revenue: Vec<SummaryRow>,
    pub states: Vec<SummaryRow>,
    pub timeline: Vec<MonthlyPoint>,
    pub courses: Vec<CourseRow>,
    pub recent: Vec<SaleRecord>,
    pub sales_error: Option<String>,
    pub leads_error: Option<String>,
    pub recent_error: Option<String>,
}

impl DashboardData {
    pub fn first_error(&self) -> Option<&str> {
        self.sales_error
            .as_deref()
            .or(self.leads_error.as_deref())
            .or(self.recent_error.as_deref())
    }
}

/// Lifecycle of the selection-scoped timeline widget.
pub enum TimelineState {
    /// No course selected; the widget shows the all-course series.
    Idle,
    Loading,
    Loaded(Vec<MonthlyPoint>),
    Empty,
    Error(String),
}

/// Completion of one timeline fetch. Results from superseded selections
/// carry an old generation and are discarded on receipt.
pub struct TimelineResult {
    pub generation: u64,
    pub points: Result<Vec<MonthlyPoint>, String>,
}

pub struct DataLoader {
    store: Arc<RecordStore>,
    runtime: Runtime,
}

impl DataLoader {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            store: Arc::new(RecordStore::new(
                config.store_url.clone(),
                config.store_key.clone(),
            )),
            runtime: Runtime::new()?,
        })
    }

    pub fn load(&self) -> DashboardData {
        let since = trailing_window(12);

        let query = SaleQuery::window(since);
        let (sales, leads, recent) = self.runtime.block_on(async {
            tokio::join!(
                self.store.fetch_sales(&query),
                self.store.fetch_leads_since(since),
                self.store.fetch_recent_sales(RECENT_LIMIT),
            )
        });

        let sales = sales.map_err(|e| {
            tracing::warn!(error = %e, "sales fetch failed");
            e.to_string()
        });
        let leads = leads.map_err(|e| {
            tracing::warn!(error = %e, "leads fetch failed");
            e.to_string()
        });
        let recent = recent.map_err(|e| {
            tracing::warn!(error = %e, "recent sales fetch failed");
            e.to_string()
        });

        assemble(sales, leads, recent, Utc::now().date_naive())
    }

    /// Fire a background fetch for one course's 6-month series. The caller
    /// tags it with a generation and filters stale completions itself.
    pub fn spawn_timeline(
        &self,
        generation: u64,
        course_id: String,
        tx: Sender<TimelineResult>,
    ) {
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let query = SaleQuery::window(trailing_window(TIMELINE_MONTHS))
                .course(course_id)
                .order(DateOrder::Ascending);
            let points = store
                .fetch_sales(&query)
                .await
                .map(|sales| monthly_revenue(&sales))
                .map_err(|e| e.to_string());
            let _ = tx.send(TimelineResult { generation, points });
        });
    }
}

/// Reduce the three fetch outcomes into renderable dashboard state.
/// Pure so the error-isolation rules are testable without a store.
fn assemble(
    sales: Result<Vec<SaleRecord>, String>,
    leads: Result<Vec<LeadRecord>, String>,
    recent: Result<Vec<SaleRecord>, String>,
    today: NaiveDate,
) -> DashboardData {
    let mut data = DashboardData::default();

    match recent {
        Ok(recent) => data.recent = recent,
        Err(e) => data.recent_error = Some(e),
    }

    let (lead_count, month_leads) = match leads {
        Ok(leads) => {
            let month_leads = leads
                .iter()
                .filter(|l| {
                    l.created_at
                        .as_deref()
                        .and_then(parse_day)
                        .is_some_and(|d| d.year() == today.year() && d.month() == today.month())
                })
                .count() as u32;
            (leads.len() as u32, month_leads)
        }
        Err(e) => {
            data.leads_error = Some(e);
            (0, 0)
        }
    };

    let sales = match sales {
        Ok(sales) => sales,
        Err(e) => {
            data.sales_error = Some(e);
            return data;
        }
    };

    data.overview = overview_stats(&sales, month_leads, today);
    data.marketing = marketing_stats(&sales, lead_count);
    data.campaigns = revenue_by_campaign(&sales);
    data.channels = revenue_by_source(&sales);
    data.course_revenue = revenue_by_course(&sales);
    data.states = students_by_state(&sales);
    data.courses = course_table(&sales);

    // the revenue timeline uses the shorter window, anchored like the KPIs
    let timeline_since = today
        .checked_sub_months(chrono::Months::new(TIMELINE_MONTHS))
        .unwrap_or(today);
    let timeline_sales: Vec<SaleRecord> = sales
        .iter()
        .filter(|s| s.purchase_day().is_some_and(|d| d >= timeline_since))
        .cloned()
        .collect();
    data.timeline = monthly_revenue(&timeline_sales);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sale(amount: f64, campaign: &str, course: &str) -> SaleRecord {
        serde_json::from_value(json!({
            "valor_pago": amount,
            "data_compra": "2025-08-10",
            "utm_campaign": campaign,
            "cursos": { "codigo": course, "nome": course },
        }))
        .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn leads_failure_leaves_sales_widgets_intact() {
        let sales = vec![sale(100.0, "launch", "C01"), sale(50.0, "launch", "C02")];
        let data = assemble(
            Ok(sales),
            Err("leads down".to_string()),
            Ok(vec![]),
            day(2025, 8, 15),
        );

        assert!(data.sales_error.is_none());
        assert_eq!(data.leads_error.as_deref(), Some("leads down"));
        assert!(!data.campaigns.is_empty());
        assert_eq!(data.courses.len(), 2);
        assert!(!data.timeline.is_empty());
        // lead-derived numbers degrade to zero, nothing else changes
        assert_eq!(data.overview.new_leads, 0);
        assert_eq!(data.marketing.conversion_rate, 0.0);
        assert_eq!(data.overview.new_students, 2);
    }

    #[test]
    fn recent_failure_is_local_to_the_recent_widget() {
        let data = assemble(
            Ok(vec![sale(10.0, "x", "C01")]),
            Ok(vec![]),
            Err("recent down".to_string()),
            day(2025, 8, 15),
        );

        assert_eq!(data.recent_error.as_deref(), Some("recent down"));
        assert!(data.sales_error.is_none());
        assert!(!data.campaigns.is_empty());
        assert!(data.recent.is_empty());
    }

    #[test]
    fn sales_failure_is_fatal_for_aggregated_views() {
        let data = assemble(
            Err("store unreachable".to_string()),
            Ok(vec![]),
            Ok(vec![]),
            day(2025, 8, 15),
        );

        assert_eq!(data.sales_error.as_deref(), Some("store unreachable"));
        assert!(data.campaigns.is_empty());
        assert!(data.courses.is_empty());
    }

    #[test]
    fn concurrent_failures_keep_distinct_messages() {
        let data = assemble(
            Ok(vec![sale(10.0, "x", "C01")]),
            Err("leads down".to_string()),
            Err("recent down".to_string()),
            day(2025, 8, 15),
        );

        assert_eq!(data.leads_error.as_deref(), Some("leads down"));
        assert_eq!(data.recent_error.as_deref(), Some("recent down"));
        assert_eq!(data.first_error(), Some("leads down"));
    }
}
