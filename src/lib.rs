//! calisthenics30 - 30-day bodyweight training program
//!
//! A fixed day-by-day plan, a guided session with set and rest timers,
//! and a completion log kept in SQLite and optionally synced to a hosted
//! account.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod session;
pub mod stats;
pub mod store;
pub mod timer;
pub mod tui;

pub use catalog::Catalog;
pub use db::{CompletionRecord, Database};
