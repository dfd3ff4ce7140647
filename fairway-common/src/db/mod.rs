//! Roster store: golfers, events, responses and guests in SQLite
//!
//! Query functions take `&mut SqliteConnection` so they run equally on a
//! pooled connection or inside a transaction.

pub mod events;
pub mod golfers;
pub mod init;
pub mod models;
pub mod responses;

pub use init::*;
pub use models::*;
