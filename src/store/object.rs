//! Object store sink: product trees uploaded under `{folder}/{product_id}/`.

use crate::credentials::ObjectStoreCredentials;
use crate::error::StoreError;
use crate::store::local::RECORD_FILE;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Uploads product directories to an object store.
#[derive(Debug, Clone)]
pub struct ObjectSink {
    store: Arc<dyn ObjectStore>,
    folder: String,
}

impl ObjectSink {
    /// Wraps any object store; `folder` is the key prefix.
    pub fn new(store: Arc<dyn ObjectStore>, folder: impl Into<String>) -> Self {
        let folder = folder.into().trim_matches('/').to_string();
        Self { store, folder }
    }

    /// Connects to an S3 bucket.
    pub fn s3(credentials: &ObjectStoreCredentials, folder: &str) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&credentials.bucket)
            .with_region(&credentials.region)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key);

        if let Some(endpoint) = &credentials.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        let store = builder.build()?;
        debug!("Using bucket {} in {}", credentials.bucket, credentials.region);
        Ok(Self::new(Arc::new(store), folder))
    }

    /// Product ids that already have objects under the folder.
    ///
    /// A listing failure is logged and treated as an empty bucket.
    pub async fn existing_ids(&self) -> HashSet<String> {
        let prefix = ObjectPath::from(self.folder.as_str());
        match self.store.list_with_delimiter(Some(&prefix)).await {
            Ok(listing) => listing
                .common_prefixes
                .iter()
                .filter_map(|p| p.filename().map(str::to_string))
                .collect(),
            Err(e) => {
                warn!("Could not list {}/ in the object store: {}", self.folder, e);
                HashSet::new()
            }
        }
    }

    /// Uploads every file under `{local_root}/{product_id}`, returning the number of objects.
    ///
    /// Nothing is uploaded unless the directory holds the record file, since a
    /// product prefix in the bucket marks the product as stored.
    pub async fn upload_dir(&self, local_root: &Path, product_id: &str) -> Result<usize, StoreError> {
        let base = local_root.join(product_id);
        let files = list_files(&base).await?;

        let record = base.join(RECORD_FILE);
        if !files.contains(&record) {
            return Err(StoreError::io(
                &record,
                std::io::Error::new(std::io::ErrorKind::NotFound, "record file missing"),
            ));
        }

        for file in &files {
            let relative = file.strip_prefix(&base).unwrap_or(file);
            let key = self.key(product_id, relative);

            let bytes = tokio::fs::read(file).await.map_err(|e| StoreError::io(file, e))?;
            self.store.put(&key, PutPayload::from(bytes)).await?;
            debug!("Uploaded {}", key);
        }

        Ok(files.len())
    }

    fn key(&self, product_id: &str, relative: &Path) -> ObjectPath {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        ObjectPath::from(format!("{}/{}/{}", self.folder, product_id, relative))
    }
}

/// Lists regular files under `root`, depth first.
async fn list_files(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| StoreError::io(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| StoreError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
