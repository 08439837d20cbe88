pub mod rtdb;
pub mod sse;

pub use rtdb::RtdbPresenceSource;
