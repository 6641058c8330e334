//! SQLite journal for the Nudge engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The engine itself stays in memory; this
//! crate only makes its signals, matches and affinity profiles survive a
//! restart.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
