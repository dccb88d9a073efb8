//! Immosync - OpenImmo archive import
//!
//! This crate provides the core functionality for the `immosync` CLI tool:
//! it reads OpenImmo zip deliveries and reconciles their listings and
//! attachments into a local SQLite listing store.
//!
//! # Architecture
//!
//! - [`openimmo`] - Archive reader and typed OpenImmo document
//! - [`import`] - Normalization, resource linking, diff/merge, orchestration
//! - [`storage`] - SQLite database layer
//! - [`files`] - Resource files on disk and their index
//! - [`prune`] - Housekeeping for long-unpublished listings
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod import;
pub mod openimmo;
pub mod prune;
pub mod storage;

pub use error::{Error, Result};
