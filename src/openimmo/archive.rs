//! OpenImmo zip archives.
//!
//! An archive holds exactly one `.xml` document and any number of
//! attachment files. The document is parsed lazily, once, and cached for
//! the archive's lifetime. The underlying file handle is released when the
//! archive is dropped.

use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};
use crate::openimmo::mode::{ImportMode, derive_mode};
use crate::openimmo::model::OpenImmo;

const DATA_EXTENSION: &str = "xml";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// An opened OpenImmo delivery.
pub struct OpenImmoArchive {
    path: PathBuf,
    zip: RefCell<ZipArchive<File>>,
    data_entry: String,
    resource_files: Vec<String>,
    data: OnceCell<OpenImmo>,
}

impl std::fmt::Debug for OpenImmoArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenImmoArchive")
            .field("path", &self.path)
            .field("data_entry", &self.data_entry)
            .field("resource_files", &self.resource_files)
            .finish_non_exhaustive()
    }
}

impl OpenImmoArchive {
    /// Open and index an archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnArchive`] if the file cannot be read as a zip
    /// container and [`Error::NoStructuredData`] if it holds no `.xml` file.
    pub fn open(path: &Path) -> Result<Self> {
        let not_an_archive = |source: ZipError| Error::NotAnArchive {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| not_an_archive(ZipError::Io(e)))?;
        let mut zip = ZipArchive::new(file).map_err(not_an_archive)?;

        let mut data_entry = None;
        let mut resource_files = Vec::new();
        let mut seen = HashSet::new();

        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i).map_err(not_an_archive)?;

            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();

            if has_data_extension(&name) {
                // Several documents are not expected; the last one wins.
                data_entry = Some(name);
                continue;
            }

            if seen.insert(name.clone()) {
                resource_files.push(name);
            }
        }

        let Some(data_entry) = data_entry else {
            return Err(Error::NoStructuredData {
                path: path.to_path_buf(),
            });
        };

        debug!(
            archive = %path.display(),
            document = %data_entry,
            resources = resource_files.len(),
            "Indexed archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            zip: RefCell::new(zip),
            data_entry,
            resource_files,
            data: OnceCell::new(),
        })
    }

    /// Path the archive was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed OpenImmo document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedData`] if the document cannot be decoded.
    pub fn data(&self) -> Result<&OpenImmo> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }

        let parsed = self.parse()?;
        Ok(self.data.get_or_init(|| parsed))
    }

    /// Derive the transfer mode from the envelope or the listing actions.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or the mode cannot be determined.
    pub fn import_mode(&self) -> Result<ImportMode> {
        derive_mode(self.data()?)
    }

    /// Identifier of the exporting software, if transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn sender_software(&self) -> Result<Option<&str>> {
        Ok(self
            .data()?
            .uebertragung
            .as_ref()
            .and_then(|u| u.sendersoftware.as_deref()))
    }

    /// Attachment files stored in the archive, in archive order.
    #[must_use]
    pub fn resource_files(&self) -> &[String] {
        &self.resource_files
    }

    /// Whether a file of that name is stored in the archive.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resource_files.iter().any(|f| f == name)
    }

    /// Extract the named files into `destination`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] for the first file that cannot be
    /// extracted. Files extracted before the failure are left in place.
    pub fn extract(&self, destination: &Path, names: &[&str]) -> Result<()> {
        fs::create_dir_all(destination)?;

        let mut zip = self.zip.borrow_mut();

        for name in names {
            let failed = |message: String| Error::Extraction {
                name: (*name).to_string(),
                destination: destination.to_path_buf(),
                message,
            };

            let mut entry = zip.by_name(name).map_err(|e| failed(e.to_string()))?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| failed("path escapes the destination".to_string()))?;
            let target = destination.join(relative);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
            }

            let mut out = File::create(&target).map_err(|e| failed(e.to_string()))?;
            io::copy(&mut entry, &mut out).map_err(|e| failed(e.to_string()))?;
        }

        Ok(())
    }

    fn parse(&self) -> Result<OpenImmo> {
        let malformed = |message: String| Error::MalformedData {
            file: self.data_entry.clone(),
            message,
        };

        let mut bytes = Vec::new();
        self.zip
            .borrow_mut()
            .by_name(&self.data_entry)
            .map_err(|e| malformed(e.to_string()))?
            .read_to_end(&mut bytes)
            .map_err(|e| malformed(e.to_string()))?;

        let xml = decode_text(bytes);
        quick_xml::de::from_str(&xml).map_err(|e| malformed(e.to_string()))
    }
}

fn has_data_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
}

/// Decode document bytes as UTF-8, falling back to ISO-8859-1.
fn decode_text(mut bytes: Vec<u8>) -> String {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }

    match String::from_utf8(bytes) {
        Ok(text) => text,
        // ISO-8859-1 maps every byte to the code point of the same value.
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}
