//! OpenImmo exchange format.
//!
//! - [`model`] - Typed document tree (quick-xml + serde)
//! - [`archive`] - Zip delivery with one document and its attachments
//! - [`mode`] - Transfer envelope / import mode derivation

pub mod archive;
pub mod mode;
pub mod model;

pub use archive::OpenImmoArchive;
pub use mode::{ImportMode, derive_mode};
pub use model::OpenImmo;
