//! Niti Store — SQLite-backed tables for profiles, the scheme catalog,
//! eligibility links and login state, plus a directory-backed photo bucket.

pub mod bucket;
pub mod schema;
pub mod sqlite;

pub use bucket::PhotoBucket;
pub use sqlite::{AuthSession, ProfileUpdate, SqliteStore};
