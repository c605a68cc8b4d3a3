//! Read-only client for the remote record store.
//!
//! The store speaks the PostgREST query grammar: one GET per collection with
//! `select`/filter/`order`/`limit` query parameters, embedded foreign rows
//! requested through the `select` clause. No aggregation is pushed down and
//! no writes originate here.

use chrono::{Months, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 200;

const SALES_TABLE: &str = "matriculas";
const LEADS_TABLE: &str = "Leads";

/// Columns every sales query selects, embedded course and lead rows included.
/// Fetching the full shape unconditionally keeps the query surface to
/// equality/range filters only.
const SALE_COLUMNS: &str = "valor_pago,data_compra,utm_source,utm_campaign,plataforma_compra,\
cursos(codigo,nome,sigla),Leads(nome,email,enderecos(estado))";

const LEAD_COLUMNS: &str = "id,created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("record store returned {status} for {table}")]
    Status {
        table: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("could not decode {table} rows: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Ascending,
    Descending,
}

/// Filter set for a sales fetch. `since` is mandatory: there is no
/// unbounded query against the store.
#[derive(Debug, Clone)]
pub struct SaleQuery {
    pub course_id: Option<String>,
    pub since: NaiveDate,
    pub until: Option<NaiveDate>,
    pub order: Option<DateOrder>,
    pub limit: Option<u32>,
}

impl SaleQuery {
    pub fn window(since: NaiveDate) -> Self {
        Self {
            course_id: None,
            since,
            until: None,
            order: None,
            limit: None,
        }
    }

    pub fn course(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self
    }

    pub fn until(mut self, until: NaiveDate) -> Self {
        self.until = Some(until);
        self
    }

    pub fn order(mut self, order: DateOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Lower bound of a trailing window: today minus `months` calendar months.
/// Recomputed at every call site, never cached.
pub fn trailing_window(months: u32) -> NaiveDate {
    let today = Utc::now().date_naive();
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(today)
}

pub struct RecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RecordStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn fetch_sales(&self, query: &SaleQuery) -> Result<Vec<crate::SaleRecord>, StoreError> {
        self.get_rows(SALES_TABLE, sale_params(query)).await
    }

    pub async fn fetch_leads_since(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<crate::LeadRecord>, StoreError> {
        self.get_rows(LEADS_TABLE, lead_params(since)).await
    }

    /// Newest sales first, embedded buyer and course included.
    pub async fn fetch_recent_sales(
        &self,
        limit: u32,
    ) -> Result<Vec<crate::SaleRecord>, StoreError> {
        let query = SaleQuery::window(trailing_window(12))
            .order(DateOrder::Descending)
            .limit(limit);
        self.fetch_sales(&query).await
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &'static str,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let mut last_transport: Option<reqwest::Error> = None;

        for attempt in 0..MAX_RETRIES {
            let response = match self
                .client
                .get(&url)
                .query(&params)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(table, attempt, error = %e, "record store request failed");
                    last_transport = Some(e);
                    backoff(attempt).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(table, attempt, %status, "record store returned retryable status");
                let _ = response.bytes().await;
                backoff(attempt).await;
                if attempt == MAX_RETRIES - 1 {
                    return Err(StoreError::Status { table, status });
                }
                continue;
            }

            if !status.is_success() {
                return Err(StoreError::Status { table, status });
            }

            return response
                .json::<Vec<T>>()
                .await
                .map_err(|source| StoreError::Decode { table, source });
        }

        match last_transport {
            Some(e) => Err(StoreError::Transport(e)),
            // retries exhausted on retryable statuses only
            None => Err(StoreError::Status {
                table,
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            }),
        }
    }
}

async fn backoff(attempt: u32) {
    if attempt < MAX_RETRIES - 1 {
        let delay = INITIAL_BACKOFF_MS * (1 << attempt);
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
}

fn sale_params(query: &SaleQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", SALE_COLUMNS.to_string()),
        ("data_compra", format!("gte.{}", query.since)),
    ];
    if let Some(until) = query.until {
        params.push(("data_compra", format!("lte.{until}")));
    }
    if let Some(course_id) = &query.course_id {
        params.push(("curso_id", format!("eq.{course_id}")));
    }
    match query.order {
        Some(DateOrder::Ascending) => params.push(("order", "data_compra.asc".to_string())),
        Some(DateOrder::Descending) => params.push(("order", "data_compra.desc".to_string())),
        None => {}
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

fn lead_params(since: NaiveDate) -> Vec<(&'static str, String)> {
    vec![
        ("select", LEAD_COLUMNS.to_string()),
        ("created_at", format!("gte.{since}")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sale_params_window_only() {
        let params = sale_params(&SaleQuery::window(day(2025, 1, 15)));
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].0, "select");
        assert_eq!(params[1], ("data_compra", "gte.2025-01-15".to_string()));
    }

    #[test]
    fn sale_params_full_query() {
        let query = SaleQuery::window(day(2024, 9, 1))
            .until(day(2025, 3, 1))
            .course("C042")
            .order(DateOrder::Ascending)
            .limit(500);
        let params = sale_params(&query);
        assert!(params.contains(&("data_compra", "gte.2024-09-01".to_string())));
        assert!(params.contains(&("data_compra", "lte.2025-03-01".to_string())));
        assert!(params.contains(&("curso_id", "eq.C042".to_string())));
        assert!(params.contains(&("order", "data_compra.asc".to_string())));
        assert!(params.contains(&("limit", "500".to_string())));
    }

    #[test]
    fn sale_params_descending_order() {
        let query = SaleQuery::window(day(2025, 1, 1)).order(DateOrder::Descending);
        let params = sale_params(&query);
        assert!(params.contains(&("order", "data_compra.desc".to_string())));
    }

    #[test]
    fn lead_params_filter_on_created_at() {
        let params = lead_params(day(2025, 1, 1));
        assert_eq!(params[0], ("select", "id,created_at".to_string()));
        assert_eq!(params[1], ("created_at", "gte.2025-01-01".to_string()));
    }

    #[test]
    fn trailing_window_is_in_the_past() {
        let today = Utc::now().date_naive();
        assert!(trailing_window(6) < today);
        assert!(trailing_window(12) < trailing_window(6));
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let store = RecordStore::new("https://example.test/", "key");
        assert_eq!(store.base_url, "https://example.test");
    }
}
