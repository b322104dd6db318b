//! Run orchestration: consent, search, collection, then extract and persist per link.

use crate::collector::LinkCollector;
use crate::config::Config;
use crate::error::{NavigatorError, PipelineError, ProductError};
use crate::extractor::ProductExtractor;
use crate::models::ProductRecord;
use crate::persister::{PersistReport, Persister, SinkOutcome};
use crate::site::{PageNavigator, Pacer};
use crate::store::SinkKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Authenticating,
    Searching,
    Collecting,
    /// 1-based index of the product link being processed
    ExtractingAndPersisting(usize),
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configuring => write!(f, "configuring"),
            Stage::Authenticating => write!(f, "authenticating"),
            Stage::Searching => write!(f, "searching"),
            Stage::Collecting => write!(f, "collecting"),
            Stage::ExtractingAndPersisting(i) => write!(f, "extracting and persisting #{}", i),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// The run parameters the pipeline reads from [`Config`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: String,
    pub word: String,
    pub pages: u32,
    pub max_products: Option<usize>,
    pub consent_timeout: Duration,
    pub scroll_steps: u32,
    pub scroll_speed: u32,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url(),
            word: config.word.clone(),
            pages: config.pages,
            max_products: config.max_products,
            consent_timeout: config.consent_timeout(),
            scroll_steps: config.scroll_steps,
            scroll_speed: config.scroll_speed,
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub links_found: usize,
    pub products_visited: usize,
    pub products_failed: usize,
    pub records_written: BTreeMap<SinkKind, usize>,
    pub already_seen: BTreeMap<SinkKind, usize>,
    pub sink_failures: usize,
    pub images_saved: usize,
    pub images_failed: usize,
}

impl RunSummary {
    /// Adds one product's persistence outcomes.
    pub fn add(&mut self, report: &PersistReport) {
        for (sink, outcome) in &report.outcomes {
            match outcome {
                SinkOutcome::Written => *self.records_written.entry(*sink).or_default() += 1,
                SinkOutcome::AlreadySeen => *self.already_seen.entry(*sink).or_default() += 1,
                SinkOutcome::Failed(_) => self.sink_failures += 1,
            }
        }
        self.images_saved += report.images_saved;
        self.images_failed += report.images_failed;
    }

    /// Number of products newly written to a sink.
    pub fn written(&self, sink: SinkKind) -> usize {
        self.records_written.get(&sink).copied().unwrap_or(0)
    }

    /// Number of products a sink already held.
    pub fn seen(&self, sink: SinkKind) -> usize {
        self.already_seen.get(&sink).copied().unwrap_or(0)
    }
}

/// Drives one scrape-and-persist run over a navigator.
pub struct Pipeline<N: PageNavigator> {
    navigator: N,
    collector: LinkCollector,
    extractor: ProductExtractor,
    persister: Persister,
    pacer: Pacer,
    settings: RunSettings,
    consent_locator: String,
    stage: Stage,
}

impl<N: PageNavigator> Pipeline<N> {
    pub fn new(navigator: N, persister: Persister, config: &Config) -> Self {
        let pacer = config.pacer();
        Self {
            navigator,
            collector: LinkCollector::new(config.locators.clone(), pacer),
            extractor: ProductExtractor::new(config.locators.clone()),
            persister,
            pacer,
            settings: RunSettings::from_config(config),
            consent_locator: config.locators.consent_accept.clone(),
            stage: Stage::Configuring,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Runs every stage. The navigator is closed whether or not the run succeeds.
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let result = self.run_stages().await;

        if let Err(e) = self.navigator.close().await {
            warn!("Failed to close navigator: {}", e);
        }
        self.persister.close().await;

        result
    }

    async fn run_stages(&mut self) -> Result<RunSummary, PipelineError> {
        self.enter(Stage::Configuring);
        self.persister.load_seen().await?;

        self.enter(Stage::Authenticating);
        let base_url = self.settings.base_url.clone();
        self.navigator.goto(&base_url).await.map_err(navigation("opening the storefront"))?;
        self.accept_consent().await;

        self.enter(Stage::Searching);
        self.collector
            .search(&mut self.navigator, &self.settings.word)
            .await
            .map_err(navigation("search"))?;
        self.collector
            .scroll(&mut self.navigator, self.settings.scroll_steps, self.settings.scroll_speed)
            .await;

        self.enter(Stage::Collecting);
        let links = self.collector.gather(&mut self.navigator, self.settings.pages).await;

        let mut summary = RunSummary { links_found: links.len(), ..Default::default() };
        let mut links = links.into_vec();
        if let Some(max) = self.settings.max_products {
            if links.len() > max {
                info!("Visiting the first {} of {} links", max, links.len());
                links.truncate(max);
            }
        }

        let total = links.len();
        for (i, link) in links.iter().enumerate() {
            self.enter(Stage::ExtractingAndPersisting(i + 1));
            self.pacer.pause().await;
            summary.products_visited += 1;

            let record = match self.visit(link).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping {}: {}", link, e);
                    summary.products_failed += 1;
                    continue;
                }
            };

            let report = self.persister.persist(&record).await;
            info!(
                "[{}/{}] {} {}: {}",
                i + 1,
                total,
                record.product_id,
                record.name,
                describe(&report)
            );
            summary.add(&report);
        }

        self.enter(Stage::Done);
        Ok(summary)
    }

    fn enter(&mut self, stage: Stage) {
        match stage {
            Stage::ExtractingAndPersisting(_) => debug!("Stage: {}", stage),
            _ => info!("Stage: {}", stage),
        }
        self.stage = stage;
    }

    /// Clicks the cookie-consent button if it shows up in time. Never fatal.
    async fn accept_consent(&mut self) {
        let locator = self.consent_locator.as_str();
        match self.navigator.wait_for(locator, self.settings.consent_timeout).await {
            Ok(()) => match self.navigator.click(locator).await {
                Ok(()) => debug!("Accepted cookie consent"),
                Err(e) => warn!("Could not accept cookie consent: {}", e),
            },
            Err(e) => warn!("No cookie consent prompt, continuing: {}", e),
        }
    }

    async fn visit(&mut self, link: &str) -> Result<ProductRecord, ProductError> {
        self.navigator.goto(link).await?;
        Ok(self.extractor.extract(&self.navigator).await?)
    }
}

fn navigation(stage: &'static str) -> impl Fn(NavigatorError) -> PipelineError {
    move |source| PipelineError::Navigation { stage, source }
}

fn describe(report: &PersistReport) -> String {
    if report.outcomes.is_empty() {
        return "no sinks enabled".to_string();
    }
    report
        .outcomes
        .iter()
        .map(|(sink, outcome)| format!("{} {}", sink, outcome))
        .collect::<Vec<_>>()
        .join(", ")
}
