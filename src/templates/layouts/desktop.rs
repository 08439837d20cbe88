use maud::{html, Markup, PreEscaped, DOCTYPE};

const STYLES: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f3f4f6; color: #1f2937; }
header { display: flex; align-items: center; justify-content: space-between; padding: 0.75rem 1.5rem; background: #fff; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
header nav ul { display: flex; gap: 1rem; list-style: none; margin: 0; padding: 0; }
a { color: #2563eb; text-decoration: none; }
.container { max-width: 1100px; margin: 1.5rem auto; padding: 0 1rem; }
.card { background: #fff; border-radius: 10px; padding: 1rem 1.25rem; margin-bottom: 1rem; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
.stats { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin-bottom: 1rem; }
.stat { border-radius: 10px; padding: 1rem; color: #fff; }
.stat-label { margin: 0; font-size: 0.85rem; opacity: .85; }
.stat-value { margin: .5rem 0 0; font-size: 2rem; font-weight: 700; }
.stat-blue { background: #2563eb; } .stat-yellow { background: #d97706; }
.stat-green { background: #16a34a; } .stat-purple { background: #7c3aed; }
.toolbar { display: flex; gap: .5rem; flex-wrap: wrap; align-items: center; }
.toolbar input[type=search] { flex: 1; min-width: 220px; padding: .5rem; border: 1px solid #d1d5db; border-radius: 6px; }
.btn { padding: .45rem .9rem; border: 1px solid #d1d5db; border-radius: 6px; background: #fff; cursor: pointer; }
.btn-active { background: #1f2937; color: #fff; border-color: #1f2937; }
.btn-approve { color: #16a34a; } .btn-delete { color: #dc2626; }
.btn[aria-disabled=true] { opacity: .4; pointer-events: none; }
.application { display: flex; flex-wrap: wrap; justify-content: space-between; gap: .75rem; border: 1px solid #e5e7eb; border-radius: 8px; padding: .75rem 1rem; margin-bottom: .75rem; }
.application h3 { margin: 0; }
.muted { color: #6b7280; font-size: .85rem; }
.badge { display: inline-block; padding: 2px 8px; border-radius: 999px; font-size: .8rem; margin-right: 4px; background: #e5e7eb; }
.badge-green { background: #16a34a; color: #fff; } .badge-blue { background: #2563eb; color: #fff; }
.badge-outline { background: transparent; border: 1px solid #d1d5db; }
.inline-form { display: inline; margin: 0; }
.pager { display: flex; justify-content: center; align-items: center; gap: .75rem; margin-top: 1rem; }
.empty { text-align: center; padding: 3rem 0; color: #6b7280; }
.toasts { display: flex; flex-direction: column; gap: .5rem; margin-bottom: 1rem; }
.toast { display: flex; justify-content: space-between; align-items: flex-start; border-radius: 8px; padding: .5rem .75rem; }
.toast p { margin: .25rem 0 0; }
.toast-success { background: #dcfce7; } .toast-error { background: #fee2e2; }
.ghost { background: none; border: none; cursor: pointer; font-size: 1.1rem; }
.fields { display: grid; gap: .75rem; }
.field { display: flex; flex-direction: column; border: 1px solid #dbeafe; border-radius: 8px; padding: .75rem; background: #fff; }
.field-label { font-size: .75rem; color: #6b7280; }
.field-value { font-weight: 700; }
"#;

pub fn desktop_layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(STYLES)) }
                script src="https://unpkg.com/htmx.org@1.9.12" defer {};
            }
            body {
              header {
                  h3 { "Loan Desk" }
                  nav {
                      ul {
                          li { a href="/" data-testid="button-back-home" { "Home" } }
                          li { a href="/dashboard" { "Dashboard" } }
                      }
                  }
              }
                (content)
            }
        }
    }
}
