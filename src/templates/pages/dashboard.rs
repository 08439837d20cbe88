use crate::engine::model::KiCard;
use crate::engine::view::{DerivedView, FilterType, VisibleRecord};
use crate::engine::{DashboardSnapshot, RecordDetail};
use crate::router::{application_action, DashboardParams};
use crate::templates::components::{action_button, badge, notification_list, stat_card};
use crate::templates::desktop_layout;
use crate::templates::format::or_unavailable;
use crate::templates::pages::detail::{application_info_card, created_label, status_label};
use chrono::{DateTime, Utc};
use maud::{html, Markup};

const LIVE_REFRESH: &str = "every 2s";

pub struct DashboardVm {
    pub snapshot: DashboardSnapshot,
    pub params: DashboardParams,
    pub selected: Option<RecordDetail>,
    pub now: DateTime<Utc>,
}

pub fn dashboard_page(vm: &DashboardVm) -> Markup {
    desktop_layout(
        "Dashboard",
        html! {
            main class="container" {
                h1 data-testid="text-dashboard-title" { "Dashboard" }
                p class="muted" { "Loan applications" }

                (search_and_filters(&vm.params))

                @if let Some(detail) = &vm.selected {
                    div {
                        (application_info_card(detail, vm.now))
                        a href=(format!("/dashboard?{}", vm.params.with_selected(None).to_query())) { "Close details" }
                    }
                }

                (live_section(vm))
            }
        },
    )
}

/// The part of the page that re-renders on every poll.
pub fn live_section(vm: &DashboardVm) -> Markup {
    let snap = &vm.snapshot;
    let view = &snap.view;
    // Links and forms always point at the clamped page.
    let params = vm.params.with_page(view.page);
    let query = params.to_query();

    html! {
        div id="live"
            hx-get=(format!("/dashboard/live?{query}"))
            hx-trigger=(LIVE_REFRESH)
            hx-swap="outerHTML"
        {
            (notification_list(&snap.notifications, &query))

            div class="stats" {
                (stat_card("Total applications", view.counts.total, "blue", "text-total-applications"))
                (stat_card("Pending", view.counts.pending, "yellow", "text-pending-count"))
                (stat_card("Approved", view.counts.approved, "green", "text-approved-count"))
                (stat_card("Online now", snap.online_now, "purple", "text-online-count"))
            }
            @if !snap.presence_enabled {
                p class="muted" data-testid="text-presence-off" {
                    "Presence tracking is not configured, so nobody shows as online."
                }
            }

            section class="card" {
                h2 { "Loan applications" }
                p class="muted" data-testid="text-showing" {
                    "Showing " (view.items.len()) " of " (view.counts.filtered) " applications"
                }

                @if snap.loading {
                    div class="empty" data-testid="loading" { "Loading data..." }
                } @else if view.is_empty() {
                    div class="empty" data-testid="empty-state" { "No applications" }
                } @else {
                    @for item in &view.items {
                        (application_row(item, &params, vm.now))
                    }
                }

                @if view.total_pages > 1 {
                    (pager(&params, view))
                }
            }
        }
    }
}

fn search_and_filters(params: &DashboardParams) -> Markup {
    let filters = [
        (FilterType::All, "All"),
        (FilterType::Pending, "Pending"),
        (FilterType::Approved, "Approved"),
    ];

    html! {
        section class="card toolbar" {
            form method="get" action="/dashboard" class="toolbar" style="flex: 1;" {
                input type="hidden" name="filter" value=(params.filter.as_str());
                input
                    type="search"
                    name="q"
                    value=(params.search)
                    placeholder="Search by name, phone or loan amount..."
                    data-testid="input-search";
                button type="submit" class="btn" { "Search" }
            }
            @for (filter, label) in filters {
                @let class = if params.filter == filter { "btn btn-active" } else { "btn" };
                a class=(class)
                    href=(format!("/dashboard?{}", params.with_filter(filter).to_query()))
                    data-testid=(format!("button-filter-{}", filter.as_str()))
                { (label) }
            }
        }
    }
}

fn application_row(item: &VisibleRecord, params: &DashboardParams, now: DateTime<Utc>) -> Markup {
    let r = &item.record;
    let query = params.to_query();
    let view_href = format!("/dashboard?{}", params.with_selected(Some(&r.id)).to_query());

    html! {
        div class="application" data-testid=(format!("card-application-{}", r.id)) {
            div {
                h3 data-testid=(format!("text-name-{}", r.id)) {
                    (r.full_name.as_deref().unwrap_or("No name"))
                }
                div class="muted" {
                    "Phone: "
                    span data-testid=(format!("text-phone-{}", r.id)) {
                        (or_unavailable(r.phone_number.as_deref()))
                    }
                }
            }

            div {
                (badge(r.loan_amount.as_deref().unwrap_or("Not specified"), "outline"))
                @if r.has_ki_card == KiCard::Yes {
                    (badge("Has KI card", "blue"))
                } @else {
                    (badge("No KI card", "outline"))
                }
                (badge(status_label(r), if r.is_approved() { "green" } else { "outline" }))
                @if item.online {
                    span data-testid=(format!("online-{}", r.id)) { (badge("Online", "green")) }
                }
            }

            div {
                a class="btn" href=(view_href) data-testid=(format!("button-view-{}", r.id)) { "View" }
                @if !r.is_approved() {
                    (action_button(
                        &application_action(&r.id, "approve", &query),
                        "Approve",
                        "btn btn-approve",
                        &format!("button-approve-{}", r.id),
                    ))
                }
                (action_button(
                    &application_action(&r.id, "delete", &query),
                    "Delete",
                    "btn btn-delete",
                    &format!("button-delete-{}", r.id),
                ))
            }

            @if r.created_at.is_some() {
                div class="muted" style="width: 100%;" { (created_label(r, now)) }
            }
        }
    }
}

fn pager(params: &DashboardParams, view: &DerivedView) -> Markup {
    let (page, total_pages) = (view.page, view.total_pages);
    let prev = params.with_page(page.saturating_sub(1).max(1)).to_query();
    let next = params.with_page((page + 1).min(total_pages)).to_query();

    html! {
        div class="pager" {
            a class="btn"
                href=(format!("/dashboard?{prev}"))
                aria-disabled=(if view.has_prev() { "false" } else { "true" })
                data-testid="button-prev-page"
            { "Previous" }
            span class="muted" data-testid="text-page" { "Page " (page) " of " (total_pages) }
            a class="btn"
                href=(format!("/dashboard?{next}"))
                aria-disabled=(if view.has_next() { "false" } else { "true" })
                data-testid="button-next-page"
            { "Next" }
        }
    }
}
