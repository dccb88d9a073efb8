//! Resource file storage.
//!
//! Files live on disk below the project directory. The database keeps an
//! index of them (see [`SqliteStorage::sync_file_index`]) so listings can
//! reference a file by uuid. Every path handed to or returned from this
//! module is `/`-separated and relative to the project directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::storage::{FileIndexStats, IndexedFile, SqliteStorage};

/// Project-rooted file storage.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute location of a relative path.
    #[must_use]
    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    #[must_use]
    pub fn exists(&self, relative: &str) -> bool {
        self.absolute(relative).exists()
    }

    /// Create a directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_dir(&self, relative: &str) -> Result<()> {
        fs::create_dir_all(self.absolute(relative))?;
        Ok(())
    }

    /// Delete a directory with everything in it. A missing directory is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn delete_dir(&self, relative: &str) -> Result<()> {
        match fs::remove_dir_all(self.absolute(relative)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Bring the file index for `relative` in line with the directory
    /// contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, a file cannot be
    /// hashed, or the index cannot be written.
    pub fn sync(
        &self,
        storage: &mut SqliteStorage,
        relative: &str,
        actor: &str,
    ) -> Result<FileIndexStats> {
        let relative = relative.trim_matches('/');
        let mut files = Vec::new();

        let dir = self.absolute(relative);
        if dir.is_dir() {
            collect_files(&dir, relative, &mut files)?;
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let stats = storage.sync_file_index(relative, &files, actor)?;
        debug!(
            directory = relative,
            added = stats.added,
            changed = stats.changed,
            removed = stats.removed,
            "Synced file index"
        );

        Ok(stats)
    }
}

fn collect_files(dir: &Path, relative: &str, files: &mut Vec<IndexedFile>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = format!("{relative}/{name}");
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_files(&entry.path(), &path, files)?;
        } else if file_type.is_file() {
            let extension = Path::new(&name)
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            files.push(IndexedFile {
                hash: hash_file(&entry.path())?,
                path,
                name,
                extension,
            });
        }
    }

    Ok(())
}

/// Hex SHA-256 of a file's content.
fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = fs::File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
