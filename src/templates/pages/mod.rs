pub mod dashboard;
pub mod detail;
pub mod home;

pub use dashboard::{dashboard_page, live_section, DashboardVm};
pub use detail::detail_page;
pub use home::home_page;
