//! Concurrent multi-engine link collection.
//!
//! One task per engine paginates through its results in its own browser
//! session. Each extracted page is merged into the shared [`LinkStore`] right
//! away, so a run that dies halfway keeps what it already found. When every
//! task has finished, all links are merged against the store snapshot taken
//! when the run started and persisted once more.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engines::adapter_for;
use crate::fetcher::{advance_page, dismiss_consent, BrowserSession, RetryPolicy, SessionFactory};
use crate::{
    CollectionResult, CollectionSummary, CollectorConfig, DorkError, EngineQuery, LinkMap,
    LinkStore, Result, TerminationReason,
};

/// Per-task pagination limits derived from the collector configuration.
#[derive(Debug, Clone)]
struct TaskSettings {
    max_pages: u32,
    retry: RetryPolicy,
    courtesy_delay: Option<Duration>,
    deadline: Option<Instant>,
}

/// Orchestrates one collection task per configured engine.
pub struct Collector {
    config: CollectorConfig,
    factory: Arc<dyn SessionFactory>,
    store: Arc<Mutex<LinkStore>>,
}

impl Collector {
    /// Creates a collector, loading the link store and creating output
    /// directories.
    ///
    /// Fails on invalid configuration or when the directories cannot be
    /// created; no collection work has started at that point.
    pub fn new(config: CollectorConfig, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;
        let store = LinkStore::load(&config.link_file);
        Ok(Self {
            config,
            factory,
            store: Arc::new(Mutex::new(store)),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Returns the shared link store.
    pub fn store(&self) -> Arc<Mutex<LinkStore>> {
        Arc::clone(&self.store)
    }

    /// Collects links for `query` from every configured engine.
    ///
    /// Only an empty query is an error. Engine failures are reported in the
    /// summary and never abort the run.
    pub async fn run(&self, query: &str) -> Result<CollectionSummary> {
        if query.trim().is_empty() {
            return Err(DorkError::Config("query cannot be empty".into()));
        }

        let start = Instant::now();
        let snapshot = self.store.lock().await.links().clone();
        let known: HashSet<String> = snapshot.keys().cloned().collect();

        let settings = TaskSettings {
            max_pages: self.config.max_pages,
            retry: self.config.retry_policy(),
            courtesy_delay: self.config.courtesy_delay(),
            deadline: self.config.deadline().map(|d| start + d),
        };
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));

        info!(
            "Collecting \"{}\" from {} engines ({} links already known)",
            query,
            self.config.engines.len(),
            known.len()
        );

        let tasks = self.config.engines.iter().map(|&engine| {
            let task = EngineTask {
                query: EngineQuery::new(engine, query),
                factory: Arc::clone(&self.factory),
                store: Arc::clone(&self.store),
                settings: settings.clone(),
                seen: known.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return CollectionResult::failed(engine, TerminationReason::Error, e.to_string())
                    }
                };
                task.run().await
            });

            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Engine {} task crashed: {}", engine, e);
                        CollectionResult::failed(engine, TerminationReason::Error, e.to_string())
                    }
                }
            }
        });
        let results = join_all(tasks).await;

        let mut all_links = LinkMap::new();
        for result in &results {
            match &result.error {
                Some(error) => warn!(
                    "Engine {} stopped: {} after {} pages ({})",
                    result.engine, result.reason, result.pages_visited, error
                ),
                None => info!(
                    "Engine {} stopped: {} after {} pages, {} new links",
                    result.engine,
                    result.reason,
                    result.pages_visited,
                    result.links.len()
                ),
            }
            for (url, record) in &result.links {
                all_links
                    .entry(url.clone())
                    .or_insert_with(|| record.clone());
            }
        }

        let mut store = self.store.lock().await;
        let new_links = match store.persist_merged(&snapshot, &all_links) {
            Ok(added) => added,
            Err(e) => {
                warn!("Failed to persist links to {}: {}", store.path().display(), e);
                all_links.keys().filter(|url| !snapshot.contains_key(*url)).count()
            }
        };

        let summary = CollectionSummary {
            query: query.to_string(),
            collected: all_links.len(),
            new_links,
            total_links: store.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };
        info!(
            "Collected {} links, {} new, {} unique links stored",
            summary.collected, summary.new_links, summary.total_links
        );
        Ok(summary)
    }
}

/// One engine's paginate-extract-persist loop.
struct EngineTask {
    query: EngineQuery,
    factory: Arc<dyn SessionFactory>,
    store: Arc<Mutex<LinkStore>>,
    settings: TaskSettings,
    /// Urls this task will not report again. Seeded from the pre-run store.
    seen: HashSet<String>,
}

impl EngineTask {
    async fn run(mut self) -> CollectionResult {
        let engine = self.query.engine;
        let mut session = match self.factory.open_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Engine {} could not open a browser session: {}", engine, e);
                return CollectionResult::failed(engine, TerminationReason::Error, e.to_string());
            }
        };

        let result = self.paginate(session.as_mut()).await;

        if let Err(e) = session.close().await {
            debug!("Engine {} session close failed: {}", engine, e);
        }
        result
    }

    async fn paginate(&mut self, session: &mut dyn BrowserSession) -> CollectionResult {
        let engine = self.query.engine;
        let adapter = adapter_for(engine);
        let url = self.query.url();
        let mut result = CollectionResult::new(engine, TerminationReason::Error);

        debug!("Engine {} opening {}", engine, url);
        if let Err(e) = session.navigate(&url).await {
            warn!("Engine {} failed to load {}: {}", engine, url, e);
            result.reason = TerminationReason::NavigationFailed;
            result.error = Some(e.to_string());
            return result;
        }
        dismiss_consent(session).await;

        loop {
            if self.settings.deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Engine {} hit the collection deadline", engine);
                result.reason = TerminationReason::DeadlineExceeded;
                break;
            }

            if !session.is_alive().await {
                info!(
                    "Browser for {} was closed, keeping {} links",
                    engine,
                    result.links.len()
                );
                result.reason = TerminationReason::UserAborted;
                break;
            }

            let page_links = match session.content().await {
                Ok(html) => adapter.extract(&html, &mut self.seen),
                Err(e) => Err(e),
            };
            let page_links = match page_links {
                Ok(links) => links,
                Err(e) => {
                    warn!(
                        "Engine {} failed on page {}: {}",
                        engine,
                        result.pages_visited + 1,
                        e
                    );
                    result.reason = TerminationReason::Error;
                    result.error = Some(e.to_string());
                    break;
                }
            };

            result.pages_visited += 1;
            info!(
                "Engine {} page {}: {} new links",
                engine,
                result.pages_visited,
                page_links.len()
            );

            if !page_links.is_empty() {
                self.persist(&page_links).await;
                result.links.extend(page_links);
            }

            if result.pages_visited >= self.settings.max_pages {
                result.reason = TerminationReason::MaxPagesReached;
                break;
            }

            if !advance_page(session, engine, &self.settings.retry).await {
                info!("Engine {} has no further result pages", engine);
                result.reason = TerminationReason::NoMoreResults;
                break;
            }

            if let Some(delay) = self.settings.courtesy_delay {
                tokio::time::sleep(delay).await;
            }
        }

        result
    }

    /// Merges one page of links into the shared store and flushes it.
    async fn persist(&self, links: &LinkMap) {
        let mut store = self.store.lock().await;
        if let Err(e) = store.merge_and_persist(links) {
            warn!(
                "Engine {} failed to persist links to {}: {}",
                self.query.engine,
                store.path().display(),
                e
            );
        }
    }
}
