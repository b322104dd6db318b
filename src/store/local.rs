//! Local filesystem sink: `{root}/{product_id}/data.json` plus image folders.

use crate::error::StoreError;
use crate::models::ProductRecord;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the serialized record inside a product directory.
pub const RECORD_FILE: &str = "data.json";
/// Sub-folder holding the primary image.
pub const PRIMARY_IMAGE_DIR: &str = "image";
/// Sub-folder holding the gallery images.
pub const GALLERY_IMAGE_DIR: &str = "images";

/// Where a downloaded image goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Primary,
    Gallery(usize),
}

/// Per-product directories under a root folder.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of one product.
    pub fn product_dir(&self, product_id: &str) -> PathBuf {
        self.root.join(product_id)
    }

    /// Ids of products that already have a directory under the root.
    pub async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.product_dirs_where(|_| async { true }).await
    }

    /// Ids of products whose directory already holds downloaded images.
    pub async fn image_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.product_dirs_where(|dir| async move {
            tokio::fs::metadata(dir.join(PRIMARY_IMAGE_DIR)).await.is_ok_and(|m| m.is_dir())
        })
        .await
    }

    async fn product_dirs_where<F, Fut>(&self, keep: F) -> Result<HashSet<String>, StoreError>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let mut ids = HashSet::new();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        while let Some(entry) =
            entries.next_entry().await.map_err(|e| StoreError::io(&self.root, e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if keep(entry.path()).await {
                    ids.insert(name.to_string());
                }
            }
        }

        Ok(ids)
    }

    /// Writes the record as pretty JSON, returning the file path.
    pub async fn write_record(&self, record: &ProductRecord) -> Result<PathBuf, StoreError> {
        let dir = self.product_dir(&record.product_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(RECORD_FILE);
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json).await.map_err(|e| StoreError::io(&path, e))?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Returns the path an image would be written to.
    pub fn image_path(&self, product_id: &str, slot: ImageSlot, stem: &str) -> PathBuf {
        let dir = self.product_dir(product_id);
        match slot {
            ImageSlot::Primary => {
                dir.join(PRIMARY_IMAGE_DIR).join(format!("{}_{}.jpg", stem, product_id))
            }
            ImageSlot::Gallery(k) => {
                dir.join(GALLERY_IMAGE_DIR).join(format!("{}_{}_{}.jpg", stem, k, product_id))
            }
        }
    }

    /// Creates the image folders of a product.
    pub async fn prepare_image_dirs(&self, product_id: &str) -> Result<(), StoreError> {
        let dir = self.product_dir(product_id);
        for sub in [PRIMARY_IMAGE_DIR, GALLERY_IMAGE_DIR] {
            let path = dir.join(sub);
            tokio::fs::create_dir_all(&path).await.map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(())
    }

    /// Writes one image, returning its path.
    pub async fn write_image(
        &self,
        product_id: &str,
        slot: ImageSlot,
        stem: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.image_path(product_id, slot, stem);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StoreError::io(parent, e))?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Removes a product directory and everything in it.
    pub async fn purge(&self, product_id: &str) -> Result<(), StoreError> {
        let dir = self.product_dir(product_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }
}
