// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - DbSessionStore: implements SessionStore for session persistence

pub mod models;
pub mod repositories;
pub mod session_store;

pub use models::SessionRow;
pub use repositories::Database;
pub use session_store::{create_db_session_store, DbSessionStore};
