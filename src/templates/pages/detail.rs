// templates/pages/detail.rs
use crate::engine::model::{ApplicationRecord, KiCard};
use crate::engine::RecordDetail;
use crate::templates::components::badge;
use crate::templates::desktop_layout;
use crate::templates::format::{or_unavailable, relative_time, UNAVAILABLE};
use chrono::{DateTime, Utc};
use maud::{html, Markup};

fn ki_card_label(card: KiCard) -> &'static str {
    match card {
        KiCard::Yes => "Yes",
        KiCard::No => "No",
        KiCard::Unknown => UNAVAILABLE,
    }
}

pub fn status_label(record: &ApplicationRecord) -> &str {
    if record.is_approved() {
        "Approved"
    } else if record.is_pending() {
        "Pending"
    } else {
        record.status.as_deref().unwrap_or("Pending")
    }
}

pub fn created_label(record: &ApplicationRecord, now: DateTime<Utc>) -> String {
    match record.created_at {
        Some(at) => relative_time(at, now),
        None => UNAVAILABLE.to_string(),
    }
}

fn field(label: &str, value: &str, test_id: &str) -> Markup {
    html! {
        div class="field" {
            span class="field-label" { (label) }
            span class="field-value" data-testid=(test_id) { (value) }
        }
    }
}

/// Every field of one application, read-only.
pub fn application_info_card(detail: &RecordDetail, now: DateTime<Utc>) -> Markup {
    let r = &detail.record;
    html! {
        section class="card" data-testid=(format!("detail-{}", r.id)) {
            h2 { "Application details" }
            p class="muted" data-testid="detail-created" { (created_label(r, now)) }
            p {
                (badge(status_label(r), if r.is_approved() { "green" } else { "outline" }))
                @if detail.online {
                    (badge("Online", "green"))
                }
            }
            div class="fields" {
                (field("Full name", or_unavailable(r.full_name.as_deref()), "detail-name"))
                (field("Phone number", or_unavailable(r.phone_number.as_deref()), "detail-phone"))
                (field("Loan amount", or_unavailable(r.loan_amount.as_deref()), "detail-loan"))
                (field("Monthly salary", or_unavailable(r.monthly_salary.as_deref()), "detail-salary"))
                (field("KI card", ki_card_label(r.has_ki_card), "detail-ki-card"))
                (field("Current page", or_unavailable(r.current_page.as_deref()), "detail-current-page"))
                (field("Submitted", or_unavailable(r.created_date.as_deref()), "detail-created-raw"))
            }
        }
    }
}

pub fn detail_page(detail: &RecordDetail, now: DateTime<Utc>) -> Markup {
    desktop_layout(
        "Application",
        html! {
            main class="container" {
                p { a href="/dashboard" { "← Back to dashboard" } }
                (application_info_card(detail, now))
            }
        },
    )
}
