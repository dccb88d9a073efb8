//! Import pipeline for OpenImmo archives.
//!
//! - [`normalize`] - Listing → flat [`ObjectData`] record
//! - [`serialized`] - Canonical list encoding for flag groups and resource lists
//! - [`resources`] - Attachment paths and uuid references
//! - [`synchronize`] - Diff and merge per provider
//! - [`importer`] - Orchestration over one archive

pub mod importer;
pub mod normalize;
pub mod record;
pub mod resources;
pub mod serialized;
pub mod synchronize;

pub use importer::{ImportStats, Importer};
pub use record::{Columns, ObjectData, ResourceKind, Value};
pub use resources::ResourceLinker;
pub use synchronize::{MergePlan, SyncStats, Synchronizer};
