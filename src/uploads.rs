//! Attachment storage for in-service work sheets.
//!
//! Stored names are collision-safe: sanitized original stem plus a random
//! token, original extension preserved. Removal is best effort; a file that
//! cannot be deleted is logged and forgotten.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["xls", "xlsx", "csv"];

#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Copy an uploaded file into the store under a collision-safe name and
    /// return that name.
    pub fn store(&self, original_name: &str, source: &Path) -> Result<String, AppError> {
        let (stem, ext) = split_name(original_name);
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::Validation(vec![format!(
                "Attachment must be one of: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )]));
        }

        let token = Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}.{ext}", sanitize_stem(&stem), &token[..8]);
        let target = self.dir.join(&name);
        fs::copy(source, &target)
            .map_err(|err| AppError::Internal(format!("store attachment: {err}")))?;
        Ok(name)
    }

    /// Delete a stored attachment. Failures are logged, never raised.
    pub fn remove(&self, name: &str) {
        let path = self.dir.join(name);
        if let Err(err) = fs::remove_file(&path) {
            log::warn!("Failed to delete attachment {}: {err}", path.display());
        }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

fn split_name(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), ext.to_ascii_lowercase()),
        None => (name.to_string(), String::new()),
    }
}

/// Keep letters, digits, dash and underscore; everything else becomes `_`.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with_file(content: &[u8]) -> (tempfile::TempDir, UploadStore, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads")).unwrap();
        let source = dir.path().join("source.xlsx");
        let mut file = fs::File::create(&source).unwrap();
        file.write_all(content).unwrap();
        (dir, store, source)
    }

    #[test]
    fn stored_names_are_collision_safe_and_keep_the_extension() {
        let (_dir, store, source) = store_with_file(b"worklist");
        let first = store.store("work list (final).XLSX", &source).unwrap();
        let second = store.store("work list (final).XLSX", &source).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("work_list__final__"));
        assert!(first.ends_with(".xlsx"));
        assert!(store.path_of(&first).exists());
        assert!(store.path_of(&second).exists());
    }

    #[test]
    fn disallowed_extensions_are_rejected() {
        let (_dir, store, source) = store_with_file(b"#!/bin/sh");
        assert!(matches!(
            store.store("script.sh", &source),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            store.store("no-extension", &source),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn removal_of_a_missing_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        store.remove("never-existed.xlsx");
    }
}
