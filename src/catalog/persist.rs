//! Catalog snapshot files
//!
//! A catalog is saved as a single JSON document. Writes are atomic:
//! 1. write to a temp file next to the target
//! 2. fsync the temp file
//! 3. rename over the target
//! 4. fsync the directory
//!
//! After a crash the file holds either the previous or the new snapshot,
//! never a mix.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::errors::{CatalogError, CatalogResult};
use super::store::Catalog;

/// A catalog snapshot on disk.
pub struct CatalogFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        Self {
            path,
            temp_path: PathBuf::from(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the snapshot atomically.
    pub fn save(&self, catalog: &Catalog) -> CatalogResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::persistence(format!("failed to create directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(catalog)
            .map_err(|e| CatalogError::persistence(format!("failed to serialize catalog: {}", e)))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| CatalogError::persistence(format!("failed to create temp file: {}", e)))?;

        file.write_all(content.as_bytes())
            .map_err(|e| CatalogError::persistence(format!("failed to write catalog: {}", e)))?;

        file.sync_all()
            .map_err(|e| CatalogError::persistence(format!("failed to fsync catalog: {}", e)))?;

        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| CatalogError::persistence(format!("failed to rename catalog: {}", e)))?;

        self.sync_dir();
        Ok(())
    }

    /// Read a snapshot back.
    pub fn load(&self) -> CatalogResult<Catalog> {
        let mut file = File::open(&self.path).map_err(|e| {
            CatalogError::persistence(format!("failed to open {}: {}", self.path.display(), e))
        })?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| CatalogError::persistence(format!("failed to read catalog: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CatalogError::persistence(format!("corrupt catalog file: {}", e)))
    }

    /// Best effort: not every platform allows opening a directory.
    fn sync_dir(&self) {
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }
}
