//! Resource linking.
//!
//! Attachments of a listing live in one directory per object:
//! `<upload_dir>/<immo_dir>/<provider>/<object>/<file>`. The listing row
//! references them by the stable uuid the file index assigned, never by
//! path.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::config::ImportConfig;
use crate::error::Result;
use crate::import::record::{Columns, ObjectData, Value};
use crate::import::serialized::encode_list;
use crate::storage::listings::resource_uuids;

/// Maps attachments of normalized records to storage paths and uuids.
#[derive(Debug, Clone)]
pub struct ResourceLinker {
    config: ImportConfig,
}

impl ResourceLinker {
    #[must_use]
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Directory holding the attachments of one object, relative to the
    /// project directory.
    #[must_use]
    pub fn resource_base_path(&self, provider_key: &str, object_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.resource_root(),
            path_segment(provider_key),
            path_segment(object_id)
        )
    }

    /// Archive file name → storage path, for every attachment stored
    /// directly in the object directory.
    #[must_use]
    pub fn resource_path_map(&self, record: &ObjectData) -> BTreeMap<String, String> {
        let base = self.resource_base_path(record.provider_key(), record.object_id());

        record
            .resource_files()
            .filter(|name| !name.contains(['/', '\\']))
            .map(|name| (name.to_string(), format!("{base}/{name}")))
            .collect()
    }

    /// Resource columns of a listing row.
    ///
    /// Attachments whose storage path is not indexed are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the file index cannot be queried.
    pub fn resource_references(&self, conn: &Connection, record: &ObjectData) -> Result<Columns> {
        let paths = self.resource_path_map(record);
        let uuids = resource_uuids(conn, paths.values().map(String::as_str))?;

        let resolve = |name: &str| paths.get(name).and_then(|path| uuids.get(path)).cloned();
        let resolve_all = |names: Vec<&str>| -> Vec<String> {
            names.into_iter().filter_map(|name| resolve(name)).collect()
        };

        let gallery = encode_list(&resolve_all(record.gallery_images()));
        let expose = encode_list(&resolve_all(record.documents()));
        let documents = encode_list(&resolve_all(record.other_attachments()));

        Ok(Columns::from([
            (
                "image".to_string(),
                Value::from(record.title_image().and_then(resolve)),
            ),
            ("gallery".to_string(), Value::from(gallery.clone())),
            ("ordersrc_gallery".to_string(), Value::from(gallery)),
            ("gallery_fullsize".to_string(), Value::flag(true)),
            ("expose".to_string(), Value::from(expose.clone())),
            ("ordersrc_expose".to_string(), Value::from(expose)),
            ("documents".to_string(), Value::from(documents.clone())),
            ("ordersrc_documents".to_string(), Value::from(documents)),
        ]))
    }
}

/// Keep a key usable as a single directory name.
fn path_segment(key: &str) -> String {
    match key.trim() {
        "" | "." | ".." => "_".to_string(),
        key => key.replace(['/', '\\'], "_"),
    }
}
