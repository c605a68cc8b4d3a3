//! Wire record types and field-resolution helpers.
//!
//! Records arrive from the store with their original (Portuguese) column
//! names; serde renames keep that boundary in one place. All nested
//! references are optional at every level, and the accessors below collapse
//! the option chains to a single fallback point.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback bucket for sales with no campaign tag.
pub const NO_CAMPAIGN: &str = "No campaign";
/// Fallback bucket for sales with no traffic source tag.
pub const DIRECT_UNIDENTIFIED: &str = "Direct/Unidentified";
/// Fallback bucket for sales whose course reference is missing.
pub const UNIDENTIFIED_COURSE: &str = "Unidentified course";
/// Fallback bucket for sales whose lead has no address state.
pub const UNKNOWN_STATE: &str = "Unknown";

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRef {
    pub codigo: String,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub sigla: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressRef {
    #[serde(default)]
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadRef {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enderecos: Option<AddressRef>,
}

/// One enrollment row from the `matriculas` collection.
///
/// Immutable once fetched; aggregation only ever reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleRecord {
    /// Raw amount as it came off the wire. The store is not strict about
    /// the column type, so this can be a number, a numeric string, or null.
    #[serde(rename = "valor_pago", default)]
    pub amount_raw: Option<Value>,
    #[serde(rename = "data_compra")]
    pub purchase_date: String,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(rename = "plataforma_compra", default)]
    pub platform: Option<String>,
    #[serde(rename = "cursos", default)]
    pub course: Option<CourseRef>,
    #[serde(rename = "Leads", default)]
    pub lead: Option<LeadRef>,
}

impl SaleRecord {
    /// Amount in currency units. Malformed or missing values coerce to
    /// zero so the record still counts toward its group.
    pub fn amount(&self) -> f64 {
        match &self.amount_raw {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    tracing::warn!(raw = %s, "unparsable sale amount, counting as zero");
                    0.0
                }
            },
            Some(other) => {
                tracing::warn!(raw = %other, "unexpected sale amount shape, counting as zero");
                0.0
            }
        }
    }

    pub fn purchase_day(&self) -> Option<NaiveDate> {
        parse_day(&self.purchase_date)
    }

    pub fn month_bucket(&self) -> Option<MonthBucket> {
        self.purchase_day().map(MonthBucket::from)
    }

    pub fn campaign(&self) -> Option<&str> {
        self.utm_campaign.as_deref().filter(|s| !s.is_empty())
    }

    pub fn source(&self) -> Option<&str> {
        self.utm_source.as_deref().filter(|s| !s.is_empty())
    }

    /// sale → course → name, `None` if any link is missing.
    pub fn course_name(&self) -> Option<&str> {
        self.course
            .as_ref()
            .and_then(|c| c.nome.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn course_code(&self) -> Option<&str> {
        self.course
            .as_ref()
            .map(|c| c.codigo.as_str())
            .filter(|s| !s.is_empty())
    }

    /// sale → lead → address → state, `None` if any link is missing.
    pub fn lead_state(&self) -> Option<&str> {
        self.lead
            .as_ref()
            .and_then(|l| l.enderecos.as_ref())
            .and_then(|a| a.estado.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn buyer_name(&self) -> Option<&str> {
        self.lead.as_ref().and_then(|l| l.nome.as_deref())
    }
}

/// One lead row, fetched only to be counted.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Parse the date prefix of a store date column. The column is a calendar
/// date, but some rows carry a full RFC 3339 timestamp; the first ten
/// characters are enough either way.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

const SHORT_MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Calendar month bucket. Ordering is chronological on `(year, month)`,
/// never lexical on the display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
}

impl MonthBucket {
    /// Stable `YYYY-MM` key.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Short display label, e.g. `jan 2025`.
    pub fn label(&self) -> String {
        let idx = (self.month.clamp(1, 12) - 1) as usize;
        format!("{} {}", SHORT_MONTHS[idx], self.year)
    }
}

impl From<NaiveDate> for MonthBucket {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}
