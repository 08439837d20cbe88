// src/engine/model.rs

use crate::sources::Document;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";

/// Whether the applicant holds a KI card. Anything we cannot read is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KiCard {
    Yes,
    No,
    Unknown,
}

/// A loan application as shown on the dashboard.
///
/// Every descriptive field is optional. A field that is missing, empty or of an
/// unexpected type is stored as `None` and rendered as "Unavailable".
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub id: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub loan_amount: Option<String>,
    pub monthly_salary: Option<String>,
    pub has_ki_card: KiCard,
    /// The value as stored, kept even when it cannot be parsed.
    pub created_date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub current_page: Option<String>,
    /// Preserved verbatim. `None` means pending.
    pub status: Option<String>,
}

impl ApplicationRecord {
    pub fn from_document(doc: &Document) -> Self {
        let fields = &doc.fields;
        let (created_date, created_at) = created_field(fields.get("createdDate"));

        Self {
            id: doc.id.clone(),
            full_name: text_field(fields, "fullName"),
            phone_number: text_field(fields, "phoneNumber"),
            loan_amount: text_field(fields, "loanAmount"),
            monthly_salary: text_field(fields, "monthlySalary"),
            has_ki_card: ki_card_field(fields.get("hasKiCard")),
            created_date,
            created_at,
            current_page: text_field(fields, "currentPage"),
            status: text_field(fields, "status"),
        }
    }

    pub fn is_pending(&self) -> bool {
        match self.status.as_deref() {
            None => true,
            Some(s) => s == STATUS_PENDING,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status.as_deref() == Some(STATUS_APPROVED)
    }

    /// Sort key: creation time in epoch millis, undated records sort as the epoch.
    pub fn sort_key(&self) -> i64 {
        self.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    /// Case-insensitive match of an already-lowercased term against
    /// name, phone and loan amount.
    pub fn matches_search(&self, term_lower: &str) -> bool {
        [&self.full_name, &self.phone_number, &self.loan_amount]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(term_lower))
    }
}

/// Sort newest first. Ties keep no particular order.
pub fn sort_newest_first(records: &mut [ApplicationRecord]) {
    records.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ki_card_field(value: Option<&Value>) -> KiCard {
    match value {
        Some(Value::String(s)) if s == "yes" => KiCard::Yes,
        Some(Value::String(s)) if s == "no" => KiCard::No,
        Some(Value::Bool(true)) => KiCard::Yes,
        Some(Value::Bool(false)) => KiCard::No,
        _ => KiCard::Unknown,
    }
}

fn created_field(value: Option<&Value>) -> (Option<String>, Option<DateTime<Utc>>) {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => (Some(s.clone()), parse_timestamp(s)),
        Some(Value::Number(n)) => {
            let parsed = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            (Some(n.to_string()), parsed)
        }
        _ => (None, None),
    }
}

/// Parse the date formats applicants' records are known to carry.
/// Returns `None` for anything else; callers fall back to the epoch.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
