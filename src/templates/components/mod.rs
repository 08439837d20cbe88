use maud::{html, Markup};

pub mod error;
pub mod notifications;

pub use error::html_error_response;
pub use notifications::notification_list;

pub fn card(title: &str, body: Markup) -> Markup {
    html! {
        div class="card" {
            h2 { (title) }
            div class="card-body" {
                (body)
            }
        }
    }
}

pub fn stat_card(label: &str, value: usize, tone: &str, test_id: &str) -> Markup {
    html! {
        div class=(format!("stat stat-{tone}")) {
            p class="stat-label" { (label) }
            p class="stat-value" data-testid=(test_id) { (value) }
        }
    }
}

pub fn badge(text: &str, tone: &str) -> Markup {
    html! {
        span class=(format!("badge badge-{tone}")) { (text) }
    }
}

/// A one-button POST form. Writes always go through POST.
pub fn action_button(action: &str, label: &str, class: &str, test_id: &str) -> Markup {
    html! {
        form method="post" action=(action) class="inline-form" {
            button type="submit" class=(class) data-testid=(test_id) { (label) }
        }
    }
}
