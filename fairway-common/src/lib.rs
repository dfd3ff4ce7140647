//! # Fairway Common Library
//!
//! Shared code for the Fairway roster service:
//! - Roster store (SQLite schema and queries)
//! - Allocation engine (positions, waitlist, promotion)
//! - Message parser and phone normalizer
//! - Roster summaries
//! - Notification dispatch
//! - Configuration and error types

pub mod allocation;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod parser;
pub mod phone;
pub mod summary;

pub use error::{Error, Result};
