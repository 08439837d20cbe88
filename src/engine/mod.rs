pub mod engine;
pub mod model;
pub mod notifications;
pub mod presence;
pub mod runtime;
pub mod view;

use thiserror::Error;

pub use engine::{DashboardSnapshot, EngineEvent, MergeEngine, RecordDetail, WriteIntent};
pub use runtime::EngineHandle;
pub use view::{FilterType, ViewQuery};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine thread is not running")]
    Unavailable,
    #[error("could not start engine thread: {0}")]
    Spawn(String),
}
