//! Two-tier cache over the remote navigation manifest
//!
//! Reads are served from memory while the snapshot is younger than the memory
//! TTL, then from the on-disk [`CacheEntry`], then from a synchronous fetch.
//! A disk entry older than `refresh_after` is adopted and refreshed by a single
//! detached task while readers keep the adopted snapshot. Memory reads never
//! touch the disk or the network.


use anyhow::{anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, SourceConfig};
use crate::docs::manifest::{flatten_manifest, parse_manifest};
use crate::docs::models::{CacheEntry, DocumentationStructure};
use crate::docs::source::{DocsSource, ManifestResponse};
use crate::embeddings::EmbeddingIndex;
use crate::storage::{self, Clock};
use crate::{DocsError, Result};

#[derive(Debug, Clone)]
struct Snapshot {
    structure: Arc<DocumentationStructure>,
    etag: Option<String>,
}

impl Snapshot {
    fn to_entry(&self) -> CacheEntry {
        CacheEntry {
            structure: (*self.structure).clone(),
            timestamp: self.structure.last_updated,
            etag: self.etag.clone(),
        }
    }
}

/// Cheaply cloneable handle; clones share one cache
#[derive(Clone)]
pub struct DocumentationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    source: Arc<dyn DocsSource>,
    source_config: SourceConfig,
    cache_path: PathBuf,
    memory_ttl: Duration,
    refresh_after: Duration,
    clock: Clock,
    index: Option<EmbeddingIndex>,
    current: RwLock<Option<Snapshot>>,
    /// Serializes synchronous fetches
    fetch_lock: tokio::sync::Mutex<()>,
    refreshing: AtomicBool,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
}

impl DocumentationStore {
    #[inline]
    pub fn new(
        source: Arc<dyn DocsSource>,
        source_config: SourceConfig,
        cache_config: &CacheConfig,
        cache_path: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source,
                source_config,
                cache_path,
                memory_ttl: cache_config.memory_ttl(),
                refresh_after: cache_config.refresh_after(),
                clock: Clock::system(),
                index: None,
                current: RwLock::new(None),
                fetch_lock: tokio::sync::Mutex::new(()),
                refreshing: AtomicBool::new(false),
                refresh_task: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    #[inline]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.clock = clock;
        } else {
            warn!("Store handle already shared; clock ignored");
        }
        self
    }

    /// Index invalidated together with this store
    #[inline]
    pub fn with_index(mut self, index: EmbeddingIndex) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.index = Some(index);
        } else {
            warn!("Store handle already shared; index ignored");
        }
        self
    }

    #[inline]
    pub fn cache_path(&self) -> &Path {
        &self.inner.cache_path
    }

    #[inline]
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst)
    }

    /// The current documentation snapshot
    pub async fn get_structure(&self) -> Result<Arc<DocumentationStructure>> {
        if let Some(structure) = self.fresh_in_memory().await {
            return Ok(structure);
        }

        let _fetching = self.inner.fetch_lock.lock().await;
        if let Some(structure) = self.fresh_in_memory().await {
            return Ok(structure);
        }

        let disk: Option<CacheEntry> = storage::read_json(&self.inner.cache_path).await;
        if let Some(entry) = &disk {
            let age = self.inner.clock.age_of(entry.timestamp);
            if age < self.inner.memory_ttl {
                debug!("Using documentation cache from disk ({:?} old)", age);
                let structure = self.inner.adopt(entry.clone()).await;
                if age > self.inner.refresh_after {
                    self.schedule_refresh();
                }
                return Ok(structure);
            }
        }

        let previous = match disk {
            Some(entry) => Some(entry),
            None => self.inner.current.read().await.as_ref().map(Snapshot::to_entry),
        };

        match self.inner.fetch(previous.as_ref()).await {
            Ok(entry) => Ok(self.inner.install(entry).await),
            Err(e) => {
                let Some(stale) = previous else {
                    return Err(DocsError::Unavailable(format!("{:#}", e)));
                };
                warn!(
                    "Failed to refresh documentation, serving cache from {}: {:#}",
                    stale.timestamp, e
                );
                Ok(self.inner.adopt(stale).await)
            }
        }
    }

    /// Drop both cache tiers and the vector index
    pub async fn invalidate(&self) -> Result<()> {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.current.write().await = None;
        storage::remove_if_exists(&self.inner.cache_path).await?;
        info!("Documentation cache invalidated");

        if let Some(index) = &self.inner.index {
            index.invalidate().await?;
        }
        Ok(())
    }

    /// Write the in-memory snapshot to disk, including any page content
    /// resolved since it was fetched
    pub async fn persist(&self) -> Result<()> {
        let entry = self.inner.current.read().await.as_ref().map(Snapshot::to_entry);
        if let Some(entry) = entry {
            storage::write_json_atomic(&self.inner.cache_path, &entry).await?;
            debug!("Persisted documentation cache with resolved content");
        }
        Ok(())
    }

    /// Wait for the background refresh, if one is running
    pub async fn wait_for_refresh(&self) {
        let task = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Background refresh task failed: {}", e);
            }
        }
    }

    async fn fresh_in_memory(&self) -> Option<Arc<DocumentationStructure>> {
        let current = self.inner.current.read().await;
        let snapshot = current.as_ref()?;
        (self.inner.clock.age_of(snapshot.structure.last_updated) < self.inner.memory_ttl)
            .then(|| Arc::clone(&snapshot.structure))
    }

    fn schedule_refresh(&self) {
        if self.inner.refreshing.swap(true, Ordering::SeqCst) {
            debug!("Background refresh already running");
            return;
        }

        info!("Documentation cache is aging, refreshing in background");
        let guard = RefreshGuard(Arc::clone(&self.inner));
        let task = tokio::spawn(async move {
            guard.0.refresh().await;
        });

        *self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }
}

/// Clears the `refreshing` flag when the refresh task ends, including by panic
struct RefreshGuard(Arc<StoreInner>);

impl Drop for RefreshGuard {
    #[inline]
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::SeqCst);
    }
}

impl StoreInner {
    async fn refresh(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let previous = self.current.read().await.as_ref().map(Snapshot::to_entry);

        match self.fetch(previous.as_ref()).await {
            Ok(entry) if self.generation.load(Ordering::SeqCst) == generation => {
                let structure = self.install(entry).await;
                info!("Background refresh loaded {} pages", structure.len());
            }
            Ok(_) => debug!("Cache invalidated during background refresh; discarding result"),
            Err(e) => warn!("Background refresh failed, keeping current cache: {:#}", e),
        }
    }

    /// Fetch a new entry, conditionally on the etag of `previous`
    async fn fetch(&self, previous: Option<&CacheEntry>) -> anyhow::Result<CacheEntry> {
        let etag = previous.and_then(|entry| entry.etag.as_deref());

        match self.source.fetch_manifest(etag).await? {
            ManifestResponse::NotModified => {
                let previous =
                    previous.ok_or_else(|| anyhow!("Not-modified response without a cached manifest"))?;
                let now = self.clock.now();
                debug!("Navigation manifest unchanged, restamping cached structure");
                Ok(CacheEntry {
                    structure: previous.structure.restamped(now),
                    timestamp: now,
                    etag: previous.etag.clone(),
                })
            }
            ManifestResponse::Fetched { body, etag } => {
                let manifest = parse_manifest(&body)?;
                let pages = flatten_manifest(&manifest, &self.source_config);
                if pages.is_empty() {
                    bail!("Navigation manifest contains no pages");
                }

                let now = self.clock.now();
                let version = etag
                    .clone()
                    .unwrap_or_else(|| now.format("%Y%m%d%H%M%S").to_string());
                info!("Fetched navigation manifest with {} pages", pages.len());

                Ok(CacheEntry {
                    structure: DocumentationStructure::new(pages, now, version),
                    timestamp: now,
                    etag,
                })
            }
        }
    }

    /// Persist `entry` and swap it into memory
    async fn install(&self, entry: CacheEntry) -> Arc<DocumentationStructure> {
        if let Err(e) = storage::write_json_atomic(&self.cache_path, &entry).await {
            warn!("Failed to persist documentation cache: {:#}", e);
        }
        self.adopt(entry).await
    }

    async fn adopt(&self, entry: CacheEntry) -> Arc<DocumentationStructure> {
        let structure = Arc::new(entry.structure);
        *self.current.write().await = Some(Snapshot {
            structure: Arc::clone(&structure),
            etag: entry.etag,
        });
        structure
    }
}
