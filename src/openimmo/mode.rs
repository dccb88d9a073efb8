//! Transfer envelope interpretation.
//!
//! An OpenImmo delivery is either a full snapshot (`umfang="VOLL"`) or an
//! incremental change set described by `modus`. Some exporters leave the
//! envelope empty and tag every listing's `<aktion>` instead; a global
//! mode can only be emulated when all listings agree.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::openimmo::model::OpenImmo;

const UMFANG_VOLL: &str = "VOLL";
const MODUS_NEW: &str = "NEW";
const MODUS_CHANGE: &str = "CHANGE";
const MODUS_DELETE: &str = "DELETE";

/// How a provider's listings are merged into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Full diff: create, update and soft-delete.
    Synchronize,
    /// Only create and update.
    Patch,
    /// Soft-delete the referenced listings instead of merging them.
    Delete,
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synchronize => write!(f, "synchronize"),
            Self::Patch => write!(f, "patch"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Derive the import mode of a parsed document.
///
/// # Errors
///
/// Returns [`Error::UndeterminedMode`] if neither the envelope nor a
/// homogeneous set of per-listing actions names a known mode.
pub fn derive_mode(data: &OpenImmo) -> Result<ImportMode> {
    let envelope = data.uebertragung.as_ref();

    if envelope.and_then(|u| u.umfang.as_deref()).map(str::trim) == Some(UMFANG_VOLL) {
        return Ok(ImportMode::Synchronize);
    }

    let modus = match envelope.and_then(|u| u.modus.clone()) {
        Some(modus) => Some(modus),
        None => homogeneous(
            data.anbieter
                .iter()
                .flat_map(|anbieter| &anbieter.immobilie)
                .map(|immobilie| {
                    immobilie
                        .verwaltung_techn
                        .as_ref()
                        .and_then(|v| v.aktion.as_ref())
                        .and_then(|a| a.aktionart.clone())
                }),
        )
        .flatten(),
    };

    match modus.as_deref().map(str::trim) {
        Some(MODUS_NEW | MODUS_CHANGE) => Ok(ImportMode::Patch),
        Some(MODUS_DELETE) => Ok(ImportMode::Delete),
        other => Err(Error::UndeterminedMode {
            found: other.unwrap_or_default().to_string(),
        }),
    }
}

/// Collect distinct values; succeed only if exactly one remains.
fn homogeneous<T: Ord>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut distinct: BTreeSet<T> = values.into_iter().collect();

    if distinct.len() == 1 {
        distinct.pop_first()
    } else {
        None
    }
}
