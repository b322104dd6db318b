//! Writes each product to every enabled sink at most once.

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{PipelineError, StoreError};
use crate::models::ProductRecord;
use crate::store::{
    HttpImageFetcher, ImageFetcher, ImageSlot, LocalStore, ObjectSink, SeenSets, SinkKind,
    TableSink,
};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to one product in one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum SinkOutcome {
    Written,
    AlreadySeen,
    Failed(String),
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkOutcome::Written => write!(f, "written"),
            SinkOutcome::AlreadySeen => write!(f, "already seen"),
            SinkOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-sink outcomes of persisting one product.
#[derive(Debug, Clone, Serialize)]
pub struct PersistReport {
    pub product_id: String,
    pub outcomes: Vec<(SinkKind, SinkOutcome)>,
    pub images_saved: usize,
    pub images_failed: usize,
}

impl PersistReport {
    fn new(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            outcomes: Vec::new(),
            images_saved: 0,
            images_failed: 0,
        }
    }

    fn set(&mut self, sink: SinkKind, outcome: SinkOutcome) {
        if let SinkOutcome::Failed(reason) = &outcome {
            warn!("{} sink failed for {}: {}", sink, self.product_id, reason);
        }
        self.outcomes.push((sink, outcome));
    }

    /// Returns the outcome for a sink, or None if the sink is disabled.
    pub fn outcome(&self, sink: SinkKind) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == sink).map(|(_, o)| o)
    }

    /// Returns true if the product was newly written to the sink.
    pub fn written(&self, sink: SinkKind) -> bool {
        matches!(self.outcome(sink), Some(SinkOutcome::Written))
    }

    /// Returns the sinks that failed.
    pub fn failures(&self) -> impl Iterator<Item = (SinkKind, &str)> {
        self.outcomes.iter().filter_map(|(sink, outcome)| match outcome {
            SinkOutcome::Failed(reason) => Some((*sink, reason.as_str())),
            _ => None,
        })
    }
}

/// Counts from one product's image downloads.
#[derive(Debug, Default)]
struct ImageTally {
    saved: usize,
    failed: usize,
}

/// Fans a record out to the enabled sinks, gated by the seen-sets.
///
/// Steps run in a fixed order for every product:
/// materialize, images, upload, purge, table. When the object store is
/// enabled without the local sink, the record and images are staged in a
/// per-run temporary directory and removed after the upload attempt. The
/// local folder is never touched in that mode.
pub struct Persister {
    local: LocalStore,
    staging: LocalStore,
    local_enabled: bool,
    object: Option<ObjectSink>,
    table: Option<TableSink>,
    images: Option<Arc<dyn ImageFetcher>>,
    seen: SeenSets,
}

impl Persister {
    /// Creates a persister rooted at `folder` with every sink disabled.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalStore::new(folder),
            staging: LocalStore::new(
                std::env::temp_dir().join(format!("pipestock-staging-{}", Uuid::new_v4())),
            ),
            local_enabled: false,
            object: None,
            table: None,
            images: None,
            seen: SeenSets::new(),
        }
    }

    pub fn with_local(mut self, enabled: bool) -> Self {
        self.local_enabled = enabled;
        self
    }

    pub fn with_object_sink(mut self, sink: ObjectSink) -> Self {
        self.object = Some(sink);
        self
    }

    pub fn with_table(mut self, sink: TableSink) -> Self {
        self.table = Some(sink);
        self
    }

    pub fn with_images(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    /// Builds the sinks the config enables, connecting to remote ones.
    pub async fn connect(config: &Config, credentials: &Credentials) -> Result<Self, PipelineError> {
        let mut persister = Persister::new(&config.folder).with_local(config.local);

        if config.s3 {
            let s3 = credentials.require_object_store()?;
            let sink = ObjectSink::s3(s3, &config.folder)
                .map_err(|source| PipelineError::Connect { sink: SinkKind::ObjectStore, source })?;
            persister = persister.with_object_sink(sink);
        }

        if config.rds {
            let url = credentials.require_database()?;
            let sink = TableSink::connect(&url, &config.table)
                .await
                .map_err(|source| PipelineError::Connect { sink: SinkKind::Table, source })?;
            persister = persister.with_table(sink);
        }

        if config.imgs {
            let fetcher = HttpImageFetcher::new(config.proxy.as_deref())
                .map_err(|source| PipelineError::Connect { sink: SinkKind::Images, source })?;
            persister = persister.with_images(Arc::new(fetcher));
        }

        Ok(persister)
    }

    /// Returns the enabled sinks in persistence order.
    pub fn enabled(&self) -> Vec<SinkKind> {
        SinkKind::all()
            .iter()
            .copied()
            .filter(|sink| match sink {
                SinkKind::Local => self.local_enabled,
                SinkKind::Images => self.images.is_some(),
                SinkKind::ObjectStore => self.object.is_some(),
                SinkKind::Table => self.table.is_some(),
            })
            .collect()
    }

    fn staging_only(&self) -> bool {
        !self.local_enabled && self.object.is_some()
    }

    /// Directory the record and images are written to before upload.
    fn workdir(&self) -> &LocalStore {
        if self.staging_only() {
            &self.staging
        } else {
            &self.local
        }
    }

    /// Lists every enabled sink once to build the seen-sets.
    pub async fn load_seen(&mut self) -> Result<(), PipelineError> {
        let seen_err = |sink| move |source| PipelineError::SeenSet { sink, source };

        if self.local_enabled {
            let ids = self.local.existing_ids().await.map_err(seen_err(SinkKind::Local))?;
            self.seen.load(SinkKind::Local, ids);
        }

        let object_ids = match &self.object {
            Some(object) => Some(object.existing_ids().await),
            None => None,
        };

        if self.images.is_some() {
            let mut ids = self.local.image_ids().await.map_err(seen_err(SinkKind::Images))?;
            // Staged images only survive in the object store
            if self.staging_only() {
                ids.extend(object_ids.iter().flatten().cloned());
            }
            self.seen.load(SinkKind::Images, ids);
        }

        if let Some(ids) = object_ids {
            self.seen.load(SinkKind::ObjectStore, ids);
        }

        if let Some(table) = &self.table {
            let ids = table.existing_ids().await.map_err(seen_err(SinkKind::Table))?;
            self.seen.load(SinkKind::Table, ids);
        }

        for sink in self.enabled() {
            info!("{} sink: {} products already stored", sink, self.seen.len(sink));
        }
        Ok(())
    }

    /// Persists one record to every enabled sink that has not seen it.
    pub async fn persist(&mut self, record: &ProductRecord) -> PersistReport {
        let id = record.product_id.as_str();
        let mut report = PersistReport::new(id);
        let staging_only = self.staging_only();
        let object_pending =
            self.object.is_some() && !self.seen.contains(SinkKind::ObjectStore, id);
        // Set when this run could not write the record file it would upload
        let mut record_missing: Option<String> = None;

        // materialize
        if self.local_enabled {
            if self.seen.contains(SinkKind::Local, id) {
                report.set(SinkKind::Local, SinkOutcome::AlreadySeen);
            } else {
                match self.local.write_record(record).await {
                    Ok(_) => {
                        self.seen.record(SinkKind::Local, id);
                        report.set(SinkKind::Local, SinkOutcome::Written);
                    }
                    Err(e) => {
                        record_missing = Some(format!("record not written locally: {}", e));
                        report.set(SinkKind::Local, SinkOutcome::Failed(e.to_string()));
                    }
                }
            }
        } else if object_pending {
            match self.staging.write_record(record).await {
                Ok(path) => debug!("Staged {} for upload", path.display()),
                Err(e) => record_missing = Some(format!("record not staged: {}", e)),
            }
        }

        // images
        let mut images_staged = false;
        if let Some(fetcher) = self.images.clone() {
            if self.seen.contains(SinkKind::Images, id) {
                report.set(SinkKind::Images, SinkOutcome::AlreadySeen);
            } else if let Some(reason) = record_missing.as_ref().filter(|_| staging_only) {
                report.set(SinkKind::Images, SinkOutcome::Failed(reason.clone()));
            } else {
                match self.download_images(fetcher.as_ref(), record).await {
                    Ok(tally) => {
                        report.images_saved = tally.saved;
                        report.images_failed = tally.failed;
                        // Staged images are only stored once the upload succeeds
                        if staging_only {
                            images_staged = true;
                        } else {
                            self.seen.record(SinkKind::Images, id);
                        }
                        report.set(SinkKind::Images, SinkOutcome::Written);
                    }
                    Err(e) => report.set(SinkKind::Images, SinkOutcome::Failed(e.to_string())),
                }
            }
        }

        // upload
        if let Some(object) = &self.object {
            if !object_pending {
                report.set(SinkKind::ObjectStore, SinkOutcome::AlreadySeen);
            } else if let Some(reason) = record_missing {
                report.set(SinkKind::ObjectStore, SinkOutcome::Failed(reason));
            } else {
                let workdir = if staging_only { &self.staging } else { &self.local };
                match object.upload_dir(workdir.root(), id).await {
                    Ok(count) => {
                        debug!("Uploaded {} objects for {}", count, id);
                        self.seen.record(SinkKind::ObjectStore, id);
                        if images_staged {
                            self.seen.record(SinkKind::Images, id);
                        }
                        report.set(SinkKind::ObjectStore, SinkOutcome::Written);
                    }
                    Err(e) => {
                        report.set(SinkKind::ObjectStore, SinkOutcome::Failed(e.to_string()))
                    }
                }
            }
        }

        // purge
        if staging_only {
            if let Err(e) = self.staging.purge(id).await {
                warn!("Could not remove staging copy of {}: {}", id, e);
            }
        }

        // table
        if let Some(table) = &self.table {
            if self.seen.contains(SinkKind::Table, id) {
                report.set(SinkKind::Table, SinkOutcome::AlreadySeen);
            } else {
                match table.insert(record).await {
                    Ok(()) => {
                        self.seen.record(SinkKind::Table, id);
                        report.set(SinkKind::Table, SinkOutcome::Written);
                    }
                    Err(e) => report.set(SinkKind::Table, SinkOutcome::Failed(e.to_string())),
                }
            }
        }

        report
    }

    /// Downloads the primary and gallery images. Single image failures are counted, not raised.
    async fn download_images(
        &self,
        fetcher: &dyn ImageFetcher,
        record: &ProductRecord,
    ) -> Result<ImageTally, StoreError> {
        let id = record.product_id.as_str();
        let workdir = self.workdir();
        workdir.prepare_image_dirs(id).await?;
        debug!("Downloading {} images for {}", record.image_count(), id);

        let stem = record.image_stem();
        let slots = std::iter::once((ImageSlot::Primary, &record.primary_image_url)).chain(
            record.gallery_image_urls.iter().enumerate().map(|(k, url)| (ImageSlot::Gallery(k), url)),
        );

        let mut tally = ImageTally::default();
        for (slot, url) in slots {
            let saved = match fetcher.fetch(url).await {
                Ok(bytes) => workdir.write_image(id, slot, &stem, &bytes).await,
                Err(e) => Err(e),
            };
            match saved {
                Ok(path) => {
                    debug!("Saved {}", path.display());
                    tally.saved += 1;
                }
                Err(e) => {
                    warn!("Skipping image {} of {}: {}", url, id, e);
                    tally.failed += 1;
                }
            }
        }

        Ok(tally)
    }

    /// Releases remote connections and removes the staging directory.
    pub async fn close(&self) {
        if let Some(table) = &self.table {
            table.close().await;
        }
        if self.staging_only() {
            if let Err(e) = tokio::fs::remove_dir_all(self.staging.root()).await {
                debug!("Staging directory not removed: {}", e);
            }
        }
    }
}
