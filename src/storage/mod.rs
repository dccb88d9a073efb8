//! SQLite storage layer for immosync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`listings`] - Listing queries usable inside a transaction
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod listings;
pub mod schema;
pub mod sqlite;

pub use sqlite::{
    Agent, AgentDetails, FileIndexStats, IndexedFile, MutationContext, Provider, SqliteStorage,
};
