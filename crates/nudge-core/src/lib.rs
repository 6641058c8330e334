//! Core types, components and collaborator traits for the Nudge proximity
//! matching engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! components hold their state in memory; durable storage and profile data
//! are reached through the [`store::LedgerStore`] and
//! [`directory::Directory`] traits.

pub mod actor;
pub mod affinity;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod matching;
pub mod presence;
pub mod ranking;
pub mod service;
pub mod signal;
pub mod store;

pub use actor::ActorId;
pub use error::{Error, Result};
pub use service::NudgeService;
