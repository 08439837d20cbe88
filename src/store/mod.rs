pub mod collection;
pub mod connection;
pub mod documents;

pub use collection::SqliteCollectionSource;
pub use connection::{init_db, Database};
