// templates/pages/home.rs

use crate::templates::{card, desktop_layout};
use maud::{html, Markup};

pub fn home_page() -> Markup {
    desktop_layout(
        "Home",
        html! {
            main class="container" {
                h1 { "Loan Desk" }

                (card("Applications", html! {
                    p { "Review, approve and remove loan applications as they arrive." }
                    a class="btn" href="/dashboard" data-testid="link-dashboard" { "Open dashboard" }
                }))
            }
        },
    )
}
