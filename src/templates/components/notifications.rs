use crate::engine::notifications::Notification;
use maud::{html, Markup};

/// Transient, dismissible notices. `return_query` keeps the viewer's place.
pub fn notification_list(items: &[Notification], return_query: &str) -> Markup {
    html! {
        @if !items.is_empty() {
            div class="toasts" role="status" {
                @for n in items {
                    div class=(n.kind.css_class()) data-testid=(format!("toast-{}", n.id)) {
                        div {
                            strong { (n.title) }
                            p { (n.message) }
                        }
                        form method="post" action=(format!("/notifications/{}/dismiss?{}", n.id, return_query)) {
                            button type="submit" class="ghost" aria-label="Dismiss" { "×" }
                        }
                    }
                }
            }
        }
    }
}
