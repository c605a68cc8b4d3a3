//! Client-side reduction of flat sale records into grouped, ranked,
//! time-bucketed summaries.
//!
//! Every dimension shares one skeleton: partition records by a derived key
//! (absent fields fall into a fixed sentinel bucket, never dropped),
//! accumulate per group, derive ratios, sort by the ranking metric, then
//! truncate to the dimension's top-N. Truncation happens strictly after the
//! full aggregation, so retained totals are never affected by it.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::records::{
    MonthBucket, SaleRecord, DIRECT_UNIDENTIFIED, NO_CAMPAIGN, UNIDENTIFIED_COURSE, UNKNOWN_STATE,
};

/// Top-N cuts, fixed per dimension.
pub const TOP_SOURCES: usize = 8;
pub const TOP_CAMPAIGNS: usize = 10;
pub const TOP_COURSES: usize = 7;
pub const TOP_STATES: usize = 15;

const CAMPAIGN_LABEL_MAX: usize = 20;
const COURSE_LABEL_MAX: usize = 30;

/// One ranked group. `label` may be shortened for axis/legend rendering;
/// `full_label` is always the untruncated key for tooltips and detail rows.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub label: String,
    pub full_label: String,
    pub count: u32,
    pub total: f64,
    pub average: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy)]
enum RankBy {
    Total,
    Count,
}

/// Group records into a key → accumulator map. Grouping is a total
/// partition: each record lands in exactly one bucket.
fn group_records<'a, K, A>(
    records: &'a [SaleRecord],
    key_of: impl Fn(&SaleRecord) -> K,
    init: impl Fn() -> A,
    mut accumulate: impl FnMut(&mut A, &'a SaleRecord),
) -> HashMap<K, A>
where
    K: Eq + Hash,
{
    let mut groups: HashMap<K, A> = HashMap::new();
    for record in records {
        let entry = groups.entry(key_of(record)).or_insert_with(&init);
        accumulate(entry, record);
    }
    groups
}

#[derive(Debug, Clone, Copy, Default)]
struct RevenueAcc {
    count: u32,
    total: f64,
}

impl RevenueAcc {
    fn add(&mut self, record: &SaleRecord) {
        self.count += 1;
        self.total += record.amount();
    }
}

fn into_summary_rows(
    groups: HashMap<String, RevenueAcc>,
    label_max: Option<usize>,
) -> Vec<SummaryRow> {
    groups
        .into_iter()
        .map(|(key, acc)| {
            // groups only exist once a record contributed, so count >= 1
            let average = if acc.count > 0 {
                acc.total / f64::from(acc.count)
            } else {
                0.0
            };
            SummaryRow {
                label: display_label(&key, label_max),
                full_label: key,
                count: acc.count,
                total: acc.total,
                average,
                rank: 0,
            }
        })
        .collect()
}

fn rank_descending(
    mut rows: Vec<SummaryRow>,
    rank_by: RankBy,
    top_n: Option<usize>,
) -> Vec<SummaryRow> {
    match rank_by {
        RankBy::Total => rows.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.full_label.cmp(&b.full_label))
        }),
        RankBy::Count => rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.full_label.cmp(&b.full_label))
        }),
    }
    if let Some(n) = top_n {
        rows.truncate(n);
    }
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
    rows
}

fn display_label(full: &str, max: Option<usize>) -> String {
    match max {
        Some(limit) if full.chars().count() > limit => {
            let mut short: String = full.chars().take(limit).collect();
            short.push('…');
            short
        }
        _ => full.to_string(),
    }
}

/// Revenue per marketing campaign, descending, top 10.
pub fn revenue_by_campaign(records: &[SaleRecord]) -> Vec<SummaryRow> {
    let groups = group_records(
        records,
        |r| r.campaign().unwrap_or(NO_CAMPAIGN).to_string(),
        RevenueAcc::default,
        RevenueAcc::add,
    );
    rank_descending(
        into_summary_rows(groups, Some(CAMPAIGN_LABEL_MAX)),
        RankBy::Total,
        Some(TOP_CAMPAIGNS),
    )
}

/// Revenue per traffic source, descending, top 8.
pub fn revenue_by_source(records: &[SaleRecord]) -> Vec<SummaryRow> {
    let groups = group_records(
        records,
        |r| r.source().unwrap_or(DIRECT_UNIDENTIFIED).to_string(),
        RevenueAcc::default,
        RevenueAcc::add,
    );
    rank_descending(into_summary_rows(groups, None), RankBy::Total, Some(TOP_SOURCES))
}

/// Revenue per course, descending, top 7 (pie-chart cut).
pub fn revenue_by_course(records: &[SaleRecord]) -> Vec<SummaryRow> {
    let groups = group_records(
        records,
        |r| r.course_name().unwrap_or(UNIDENTIFIED_COURSE).to_string(),
        RevenueAcc::default,
        RevenueAcc::add,
    );
    rank_descending(
        into_summary_rows(groups, Some(COURSE_LABEL_MAX)),
        RankBy::Total,
        Some(TOP_COURSES),
    )
}

/// Enrollment count per address state, descending by count, top 15.
pub fn students_by_state(records: &[SaleRecord]) -> Vec<SummaryRow> {
    let groups = group_records(
        records,
        |r| r.lead_state().unwrap_or(UNKNOWN_STATE).to_string(),
        RevenueAcc::default,
        RevenueAcc::add,
    );
    rank_descending(into_summary_rows(groups, None), RankBy::Count, Some(TOP_STATES))
}

/// One point of a month-bucketed series.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPoint {
    pub bucket: MonthBucket,
    pub label: String,
    pub count: u32,
    pub total: f64,
}

/// Revenue and sales per calendar month, chronologically ascending. The
/// ascending order is the documented exception to the descending rank rule.
pub fn monthly_revenue(records: &[SaleRecord]) -> Vec<MonthlyPoint> {
    let groups = group_records(
        records,
        SaleRecord::month_bucket,
        RevenueAcc::default,
        RevenueAcc::add,
    );

    let mut points: Vec<MonthlyPoint> = groups
        .into_iter()
        .filter_map(|(bucket, acc)| {
            let bucket = match bucket {
                Some(b) => b,
                None => {
                    tracing::warn!(
                        sales = acc.count,
                        "skipping sales with unparsable purchase dates in timeline"
                    );
                    return None;
                }
            };
            Some(MonthlyPoint {
                label: bucket.label(),
                bucket,
                count: acc.count,
                total: acc.total,
            })
        })
        .collect();

    points.sort_by_key(|p| p.bucket);
    points
}

/// One row of the course analysis table.
#[derive(Debug, Clone, Serialize)]
pub struct CourseRow {
    pub code: String,
    pub name: String,
    pub abbr: String,
    pub students: u32,
    pub revenue: f64,
    pub average_ticket: f64,
    pub first_sale: Option<NaiveDate>,
    pub last_sale: Option<NaiveDate>,
}

#[derive(Default)]
struct CourseAcc {
    name: Option<String>,
    abbr: Option<String>,
    students: u32,
    revenue: f64,
    first_sale: Option<NaiveDate>,
    last_sale: Option<NaiveDate>,
}

impl CourseAcc {
    fn add(&mut self, record: &SaleRecord) {
        self.students += 1;
        self.revenue += record.amount();

        if let Some(course) = &record.course {
            if self.name.is_none() {
                self.name = course.nome.clone().filter(|s| !s.is_empty());
            }
            if self.abbr.is_none() {
                self.abbr = course.sigla.clone().filter(|s| !s.is_empty());
            }
        }

        if let Some(day) = record.purchase_day() {
            self.first_sale = Some(match self.first_sale {
                Some(first) => first.min(day),
                None => day,
            });
            self.last_sale = Some(match self.last_sale {
                Some(last) => last.max(day),
                None => day,
            });
        }
    }
}

/// Per-course stats over the full window, unlimited rows, revenue-descending
/// by default. Sales without a course reference share one sentinel row.
pub fn course_table(records: &[SaleRecord]) -> Vec<CourseRow> {
    let groups = group_records(
        records,
        |r| r.course_code().unwrap_or(UNIDENTIFIED_COURSE).to_string(),
        CourseAcc::default,
        CourseAcc::add,
    );

    let mut rows: Vec<CourseRow> = groups
        .into_iter()
        .map(|(code, acc)| {
            let average_ticket = if acc.students > 0 {
                acc.revenue / f64::from(acc.students)
            } else {
                0.0
            };
            CourseRow {
                name: acc.name.unwrap_or_else(|| UNIDENTIFIED_COURSE.to_string()),
                abbr: acc.abbr.unwrap_or_else(|| code.clone()),
                code,
                students: acc.students,
                revenue: acc.revenue,
                average_ticket,
                first_sale: acc.first_sale,
                last_sale: acc.last_sale,
            }
        })
        .collect();

    sort_course_rows(&mut rows, CourseSortField::Revenue, SortDirection::Descending);
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseSortField {
    Name,
    Students,
    Revenue,
    AverageTicket,
    LastSale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Re-sort already-materialized course rows. Operates on the summary rows
/// only; the raw records are long gone by the time this runs.
pub fn sort_course_rows(rows: &mut [CourseRow], field: CourseSortField, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ordering = match field {
            CourseSortField::Name => a.name.cmp(&b.name),
            CourseSortField::Students => a.students.cmp(&b.students),
            CourseSortField::Revenue => a.revenue.total_cmp(&b.revenue),
            CourseSortField::AverageTicket => a.average_ticket.total_cmp(&b.average_ticket),
            CourseSortField::LastSale => a.last_sale.cmp(&b.last_sale),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Headline numbers for the overview tab, scoped to the calendar month of
/// `today`. The lead count comes from a separate collection, so the caller
/// supplies it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverviewStats {
    pub month_revenue: f64,
    pub new_students: u32,
    pub new_leads: u32,
    pub average_ticket: f64,
}

pub fn overview_stats(sales: &[SaleRecord], new_leads: u32, today: NaiveDate) -> OverviewStats {
    let mut month_revenue = 0.0;
    let mut new_students = 0u32;

    for sale in sales {
        if let Some(day) = sale.purchase_day() {
            if day.year() == today.year() && day.month() == today.month() {
                month_revenue += sale.amount();
                new_students += 1;
            }
        }
    }

    let average_ticket = if new_students > 0 {
        month_revenue / f64::from(new_students)
    } else {
        0.0
    };

    OverviewStats {
        month_revenue,
        new_students,
        new_leads,
        average_ticket,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopEntry {
    pub name: String,
    pub total: f64,
    pub count: u32,
}

/// Marketing KPIs over the full window. `conversion_rate` is a fraction
/// (sales over leads), not a percentage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketingStats {
    pub channel_count: usize,
    pub campaign_count: usize,
    pub best_channel: Option<TopEntry>,
    pub best_campaign: Option<TopEntry>,
    pub conversion_rate: f64,
}

pub fn marketing_stats(sales: &[SaleRecord], lead_count: u32) -> MarketingStats {
    // pre-truncation groupings: counts cover every channel/campaign, not a top-N
    let channels = rank_descending(
        into_summary_rows(
            group_records(
                sales,
                |r| r.source().unwrap_or(DIRECT_UNIDENTIFIED).to_string(),
                RevenueAcc::default,
                RevenueAcc::add,
            ),
            None,
        ),
        RankBy::Total,
        None,
    );
    let campaigns = rank_descending(
        into_summary_rows(
            group_records(
                sales,
                |r| r.campaign().unwrap_or(NO_CAMPAIGN).to_string(),
                RevenueAcc::default,
                RevenueAcc::add,
            ),
            None,
        ),
        RankBy::Total,
        None,
    );

    let best_of = |rows: &[SummaryRow]| {
        rows.first().map(|row| TopEntry {
            name: row.full_label.clone(),
            total: row.total,
            count: row.count,
        })
    };

    let conversion_rate = if lead_count > 0 {
        sales.len() as f64 / f64::from(lead_count)
    } else {
        0.0
    };

    MarketingStats {
        channel_count: channels.len(),
        campaign_count: campaigns.len(),
        best_channel: best_of(&channels),
        best_campaign: best_of(&campaigns),
        conversion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AddressRef, CourseRef, LeadRef};
    use serde_json::json;

    fn sale(amount: f64, date: &str) -> SaleRecord {
        SaleRecord {
            amount_raw: Some(json!(amount)),
            purchase_date: date.to_string(),
            utm_source: None,
            utm_campaign: None,
            platform: None,
            course: None,
            lead: None,
        }
    }

    fn campaign_sale(amount: f64, campaign: Option<&str>) -> SaleRecord {
        let mut s = sale(amount, "2025-02-10");
        s.utm_campaign = campaign.map(str::to_string);
        s
    }

    fn course_sale(amount: f64, date: &str, code: &str, name: &str) -> SaleRecord {
        let mut s = sale(amount, date);
        s.course = Some(CourseRef {
            codigo: code.to_string(),
            nome: Some(name.to_string()),
            sigla: None,
        });
        s
    }

    fn state_sale(amount: f64, state: Option<&str>) -> SaleRecord {
        let mut s = sale(amount, "2025-02-10");
        s.lead = Some(LeadRef {
            nome: None,
            email: None,
            enderecos: Some(AddressRef {
                estado: state.map(str::to_string),
            }),
        });
        s
    }

    #[test]
    fn campaign_rows_group_rank_and_average() {
        // spec scenario: two X sales and one untagged sale
        let records = vec![
            campaign_sale(100.0, Some("X")),
            campaign_sale(50.0, Some("X")),
            campaign_sale(30.0, None),
        ];

        let rows = revenue_by_campaign(&records);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].full_label, "X");
        assert_eq!(rows[0].total, 150.0);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].average, 75.0);
        assert_eq!(rows[0].rank, 1);

        assert_eq!(rows[1].full_label, NO_CAMPAIGN);
        assert_eq!(rows[1].total, 30.0);
        assert_eq!(rows[1].count, 1);
        assert_eq!(rows[1].average, 30.0);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn campaign_top_n_keeps_ten_highest() {
        // 13 campaigns with totals 10, 20, ... 130
        let records: Vec<SaleRecord> = (1..=13)
            .map(|i| campaign_sale(f64::from(i) * 10.0, Some(&format!("camp-{i:02}"))))
            .collect();

        let rows = revenue_by_campaign(&records);
        assert_eq!(rows.len(), TOP_CAMPAIGNS);
        assert_eq!(rows[0].full_label, "camp-13");
        assert_eq!(rows[0].total, 130.0);
        assert_eq!(rows[9].full_label, "camp-04");
        assert_eq!(rows[9].total, 40.0);
        for pair in rows.windows(2) {
            assert!(pair[0].total >= pair[1].total);
        }
    }

    #[test]
    fn partition_is_complete_and_totals_conserved() {
        let mut records = vec![
            campaign_sale(10.0, Some("a")),
            campaign_sale(20.0, Some("b")),
            campaign_sale(0.0, None),
            campaign_sale(5.5, Some("a")),
        ];
        // malformed amount still counts, as zero
        let mut bad = campaign_sale(0.0, Some("b"));
        bad.amount_raw = Some(json!("not-a-number"));
        records.push(bad);

        let rows = revenue_by_campaign(&records);
        let total_count: u32 = rows.iter().map(|r| r.count).sum();
        let total_amount: f64 = rows.iter().map(|r| r.total).sum();
        assert_eq!(total_count as usize, records.len());
        assert!((total_amount - 35.5).abs() < 1e-9);
    }

    #[test]
    fn source_sentinel_and_top_n() {
        let mut records: Vec<SaleRecord> = (0..9)
            .map(|i| {
                let mut s = sale(f64::from(i + 1), "2025-01-05");
                s.utm_source = Some(format!("src{i}"));
                s
            })
            .collect();
        records.push(sale(100.0, "2025-01-05")); // no source

        let rows = revenue_by_source(&records);
        assert_eq!(rows.len(), TOP_SOURCES);
        assert_eq!(rows[0].full_label, DIRECT_UNIDENTIFIED);
        assert_eq!(rows[0].total, 100.0);
    }

    #[test]
    fn course_labels_truncate_but_full_label_survives() {
        let long_name = "Curso Avançado de Odontologia Estética Completa";
        let records = vec![course_sale(500.0, "2025-01-10", "C01", long_name)];

        let rows = revenue_by_course(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_label, long_name);
        assert_eq!(rows[0].label.chars().count(), 31); // 30 chars + ellipsis
        assert!(rows[0].label.ends_with('…'));
    }

    #[test]
    fn short_labels_are_left_alone() {
        let rows = revenue_by_course(&[course_sale(10.0, "2025-01-10", "C01", "Curso B")]);
        assert_eq!(rows[0].label, "Curso B");
    }

    #[test]
    fn states_rank_by_count_not_revenue() {
        let records = vec![
            state_sale(1000.0, Some("SP")),
            state_sale(1.0, Some("MG")),
            state_sale(1.0, Some("MG")),
            state_sale(1.0, None),
        ];

        let rows = students_by_state(&records);
        assert_eq!(rows[0].full_label, "MG");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].count, 1);
        assert!(rows.iter().any(|r| r.full_label == UNKNOWN_STATE));
    }

    #[test]
    fn timeline_buckets_sort_chronologically() {
        // deliberately out of input order, crossing a year boundary
        let records = vec![
            sale(30.0, "2025-02-14"),
            sale(10.0, "2024-12-01"),
            sale(20.0, "2025-01-20"),
            sale(5.0, "2025-01-03"),
        ];

        let points = monthly_revenue(&records);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].bucket.key(), "2024-12");
        assert_eq!(points[1].bucket.key(), "2025-01");
        assert_eq!(points[2].bucket.key(), "2025-02");
        assert_eq!(points[1].count, 2);
        assert_eq!(points[1].total, 25.0);
        assert_eq!(points[0].label, "dez 2024");
    }

    #[test]
    fn course_table_tracks_first_and_last_sale() {
        let records = vec![
            course_sale(100.0, "2024-11-05", "C01", "Curso A"),
            course_sale(200.0, "2025-02-20", "C01", "Curso A"),
            course_sale(50.0, "2025-01-01", "C01", "Curso A"),
            course_sale(999.0, "2025-01-15", "C02", "Curso B"),
        ];

        let rows = course_table(&records);
        assert_eq!(rows.len(), 2);
        // default order: revenue descending
        assert_eq!(rows[0].code, "C02");

        let a = rows.iter().find(|r| r.code == "C01").unwrap();
        assert_eq!(a.students, 3);
        assert_eq!(a.revenue, 350.0);
        assert!((a.average_ticket - 350.0 / 3.0).abs() < 1e-9);
        assert_eq!(a.first_sale, NaiveDate::from_ymd_opt(2024, 11, 5));
        assert_eq!(a.last_sale, NaiveDate::from_ymd_opt(2025, 2, 20));
    }

    #[test]
    fn course_table_keeps_unreferenced_sales_in_sentinel_row() {
        let records = vec![
            course_sale(100.0, "2025-01-10", "C01", "Curso A"),
            sale(40.0, "2025-01-11"),
        ];

        let rows = course_table(&records);
        assert_eq!(rows.len(), 2);
        let sentinel = rows.iter().find(|r| r.code == UNIDENTIFIED_COURSE).unwrap();
        assert_eq!(sentinel.students, 1);
        assert_eq!(sentinel.revenue, 40.0);
    }

    #[test]
    fn course_rows_resort_by_any_field() {
        let mut rows = course_table(&[
            course_sale(100.0, "2025-01-10", "C01", "Beta"),
            course_sale(300.0, "2025-01-11", "C02", "Alpha"),
        ]);

        sort_course_rows(&mut rows, CourseSortField::Name, SortDirection::Ascending);
        assert_eq!(rows[0].name, "Alpha");

        sort_course_rows(&mut rows, CourseSortField::Revenue, SortDirection::Ascending);
        assert_eq!(rows[0].revenue, 100.0);

        sort_course_rows(&mut rows, CourseSortField::Students, SortDirection::Descending);
        assert_eq!(rows[0].students, 1); // tie: stable on equal keys
    }

    #[test]
    fn overview_stats_scope_to_current_month() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let sales = vec![
            sale(100.0, "2025-02-01"),
            sale(50.0, "2025-02-28"),
            sale(999.0, "2025-01-31"),
            sale(999.0, "2024-02-10"), // same month, wrong year
        ];

        let stats = overview_stats(&sales, 30, today);
        assert_eq!(stats.month_revenue, 150.0);
        assert_eq!(stats.new_students, 2);
        assert_eq!(stats.new_leads, 30);
        assert_eq!(stats.average_ticket, 75.0);
    }

    #[test]
    fn overview_stats_empty_month_has_zero_ticket() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let stats = overview_stats(&[sale(10.0, "2025-01-01")], 0, today);
        assert_eq!(stats.new_students, 0);
        assert_eq!(stats.average_ticket, 0.0);
    }

    #[test]
    fn marketing_stats_pick_best_and_count_everything() {
        let mut records = vec![
            campaign_sale(100.0, Some("launch")),
            campaign_sale(40.0, Some("retarget")),
            campaign_sale(10.0, None),
        ];
        records[0].utm_source = Some("instagram".to_string());
        records[1].utm_source = Some("google".to_string());

        let stats = marketing_stats(&records, 30);
        assert_eq!(stats.campaign_count, 3); // launch, retarget, sentinel
        assert_eq!(stats.channel_count, 3); // instagram, google, sentinel
        assert_eq!(stats.best_campaign.as_ref().unwrap().name, "launch");
        assert_eq!(stats.best_channel.as_ref().unwrap().name, "instagram");
        assert!((stats.conversion_rate - 0.1).abs() < 1e-9);
    }

    #[test]
    fn marketing_stats_without_leads_have_zero_conversion() {
        let stats = marketing_stats(&[campaign_sale(10.0, Some("x"))], 0);
        assert_eq!(stats.conversion_rate, 0.0);
    }
}
