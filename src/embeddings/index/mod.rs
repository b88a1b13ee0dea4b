//! Similarity-searchable representation of the documentation corpus
//!
//! The index is built in full from a [`DocumentationStructure`] snapshot and
//! swapped in atomically: readers see either no index or a complete one. At
//! most one build runs at a time; concurrent callers of
//! [`EmbeddingIndex::ensure_ready`] all await the same in-flight build.


use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use super::{Embedder, QueryExpander, cosine_similarity};
use crate::config::{CacheConfig, IndexConfig};
use crate::docs::content::ContentResolver;
use crate::docs::models::{DocPage, DocumentationStructure};
use crate::storage::{self, Clock};
use crate::{DocsError, Result};

/// Path and URL tokens that carry no meaning for matching
const BOILERPLATE_TOKENS: &[&str] = &[
    "http", "https", "www", "com", "org", "net", "docs", "doc", "mdx", "html", "htm", "index",
];
const MIN_TOKEN_LENGTH: usize = 3;
const QUERY_CACHE_CAPACITY: usize = 256;

/// One embedded page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedding {
    /// The page URL
    pub id: String,
    pub vector: Vec<f32>,
    /// Exact text that was embedded
    pub content: String,
    pub page: DocPage,
}

/// Persisted form of the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub embeddings: Vec<DocumentEmbedding>,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub batch_size: usize,
    pub min_text_length: usize,
    pub content_words: usize,
    pub include_content: bool,
    pub content_concurrency: usize,
    pub max_age: Duration,
}

impl IndexSettings {
    #[inline]
    pub fn new(index: &IndexConfig, cache: &CacheConfig) -> Self {
        Self {
            batch_size: index.batch_size.max(1),
            min_text_length: index.min_text_length,
            content_words: index.content_words,
            include_content: index.include_content,
            content_concurrency: index.content_concurrency.max(1),
            max_age: cache.index_max_age(),
        }
    }
}

impl Default for IndexSettings {
    #[inline]
    fn default() -> Self {
        Self::new(&IndexConfig::default(), &CacheConfig::default())
    }
}

type BuildOutcome = std::result::Result<usize, Arc<anyhow::Error>>;
type PendingBuild = Shared<BoxFuture<'static, BuildOutcome>>;

/// An in-flight build and the generation it was started under
struct InFlight {
    generation: u64,
    build: PendingBuild,
}

/// Cheaply cloneable handle to the shared index state
#[derive(Clone)]
pub struct EmbeddingIndex {
    inner: Arc<IndexInner>,
}

struct IndexInner {
    embedder: Option<Arc<dyn Embedder>>,
    resolver: Option<Arc<ContentResolver>>,
    expander: QueryExpander,
    settings: IndexSettings,
    index_path: PathBuf,
    clock: Clock,
    ready: RwLock<Option<Arc<VectorIndex>>>,
    pending: Mutex<Option<InFlight>>,
    query_cache: Mutex<HashMap<String, Vec<f32>>>,
    /// Bumped by `invalidate`; a build started under an older generation is discarded
    generation: AtomicU64,
    /// Set when a build could not embed anything; cleared by `invalidate`
    disabled: AtomicBool,
    build_passes: AtomicUsize,
}

impl EmbeddingIndex {
    /// `embedder: None` yields an index that is never ready, so callers always
    /// take their lexical fallback
    #[inline]
    pub fn new(
        embedder: Option<Arc<dyn Embedder>>,
        settings: IndexSettings,
        index_path: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                embedder,
                resolver: None,
                expander: QueryExpander::default(),
                settings,
                index_path,
                clock: Clock::system(),
                ready: RwLock::new(None),
                pending: Mutex::new(None),
                query_cache: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                disabled: AtomicBool::new(false),
                build_passes: AtomicUsize::new(0),
            }),
        }
    }

    /// Resolve page bodies through `resolver` while building
    #[inline]
    pub fn with_resolver(self, resolver: Arc<ContentResolver>) -> Self {
        self.map_inner(|inner| inner.resolver = Some(resolver))
    }

    #[inline]
    pub fn with_expander(self, expander: QueryExpander) -> Self {
        self.map_inner(|inner| inner.expander = expander)
    }

    #[inline]
    pub fn with_clock(self, clock: Clock) -> Self {
        self.map_inner(|inner| inner.clock = clock)
    }

    fn map_inner(mut self, configure: impl FnOnce(&mut IndexInner)) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            configure(inner);
        } else {
            warn!("Index handle already shared; builder option ignored");
        }
        self
    }

    #[inline]
    pub fn has_embedder(&self) -> bool {
        self.inner.embedder.is_some()
    }

    #[inline]
    pub fn model_name(&self) -> Option<&str> {
        self.inner.embedder.as_deref().map(Embedder::model_name)
    }

    /// Number of documents in the ready index, zero when not ready
    #[inline]
    pub async fn len(&self) -> usize {
        self.inner
            .ready
            .read()
            .await
            .as_ref()
            .map_or(0, |index| index.embeddings.len())
    }

    #[inline]
    pub async fn is_ready(&self) -> bool {
        self.len().await > 0
    }

    #[inline]
    pub fn is_building(&self) -> bool {
        self.inner.lock_pending().is_some()
    }

    /// Number of full build passes run over the corpus
    #[inline]
    pub fn build_count(&self) -> usize {
        self.inner.build_passes.load(Ordering::SeqCst)
    }

    /// Make sure a fresh index for `structure` is loaded or built. Returns the
    /// number of indexed documents.
    pub async fn ensure_ready(&self, structure: Arc<DocumentationStructure>) -> Result<usize> {
        if self.inner.embedder.is_none() || self.inner.disabled.load(Ordering::SeqCst) {
            debug!("Vector search unavailable, skipping index preparation");
            return Ok(0);
        }

        let ready = self.inner.ready.read().await.clone();
        if let Some(index) = ready {
            if self.inner.is_fresh(&index) {
                return Ok(index.embeddings.len());
            }
            info!("Vector index is older than {:?}, rebuilding", self.inner.settings.max_age);
        }

        let build = {
            let mut pending = self.inner.lock_pending();
            if let Some(in_flight) = pending.as_ref() {
                debug!("Joining in-flight index build");
                in_flight.build.clone()
            } else {
                let generation = self.inner.generation.load(Ordering::SeqCst);
                let build = Arc::clone(&self.inner).spawn_build(structure, generation);
                *pending = Some(InFlight {
                    generation,
                    build: build.clone(),
                });
                build
            }
        };

        build
            .await
            .map_err(|e| DocsError::Embedding(format!("{:#}", e)))
    }

    /// Pages most similar to `query`, best first
    pub async fn search(&self, query: &str, limit: usize, threshold: f32) -> Vec<DocPage> {
        self.search_scored(query, limit, threshold)
            .await
            .into_iter()
            .map(|(page, _)| page)
            .collect()
    }

    /// Like [`search`](Self::search) with similarity scores attached. Returns an
    /// empty list when the index is not ready.
    pub async fn search_scored(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Vec<(DocPage, f32)> {
        let Some(embedder) = self.inner.embedder.as_ref() else {
            return Vec::new();
        };

        let ready = self.inner.ready.read().await.clone();
        let Some(index) = ready.filter(|index| !index.embeddings.is_empty()) else {
            debug!("Vector index not ready");
            return Vec::new();
        };

        let expanded = self.inner.expander.expand(query);
        let Some(query_vector) = self.inner.query_vector(embedder.as_ref(), &expanded).await
        else {
            return Vec::new();
        };

        let mut scored: Vec<(f32, &DocumentEmbedding)> = index
            .embeddings
            .iter()
            .map(|doc| (cosine_similarity(&query_vector, &doc.vector), doc))
            .filter(|(similarity, _)| *similarity >= threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        debug!(
            "Vector search for '{}' matched {} of {} documents",
            expanded,
            scored.len(),
            index.embeddings.len()
        );

        scored
            .into_iter()
            .take(limit)
            .map(|(similarity, doc)| (doc.page.clone(), similarity))
            .collect()
    }

    /// Drop the in-memory index and query cache and delete the persisted file.
    /// A build still in flight is detached; the next caller starts a new one.
    pub async fn invalidate(&self) -> Result<()> {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if self.inner.lock_pending().take().is_some() {
            debug!("Detached in-flight index build");
        }
        self.inner.disabled.store(false, Ordering::SeqCst);
        *self.inner.ready.write().await = None;
        self.inner
            .query_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        storage::remove_if_exists(&self.inner.index_path).await?;
        info!("Vector index invalidated");
        Ok(())
    }
}

impl IndexInner {
    fn lock_pending(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, index: &VectorIndex) -> bool {
        self.clock.age_of(index.timestamp) < self.settings.max_age
    }

    /// Run the load-or-build on its own task so it completes even if every
    /// waiting caller goes away
    fn spawn_build(
        self: Arc<Self>,
        structure: Arc<DocumentationStructure>,
        generation: u64,
    ) -> PendingBuild {
        let task = tokio::spawn(async move {
            let outcome = self
                .load_or_build(&structure, generation)
                .await
                .map_err(Arc::new);
            let mut pending = self.lock_pending();
            if pending
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == generation)
            {
                *pending = None;
            }
            drop(pending);
            outcome
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(Arc::new(anyhow!("Index build task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    async fn load_or_build(
        &self,
        structure: &DocumentationStructure,
        generation: u64,
    ) -> anyhow::Result<usize> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| anyhow!("No embedding model configured"))?;

        let ready = self.ready.read().await.clone();
        if let Some(index) = ready {
            if self.is_fresh(&index) {
                return Ok(index.embeddings.len());
            }
        }

        let index = if let Some(index) = self.load_persisted(embedder.model_name()).await {
            index
        } else {
            let index = match self.build(structure, embedder.as_ref()).await {
                Ok(index) => index,
                Err(e) => {
                    if self.generation.load(Ordering::SeqCst) == generation {
                        self.disabled.store(true, Ordering::SeqCst);
                    }
                    return Err(e);
                }
            };
            if self.generation.load(Ordering::SeqCst) == generation {
                if let Err(e) = storage::write_json_atomic(&self.index_path, &index).await {
                    warn!("Failed to persist vector index: {:#}", e);
                }
            }
            index
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            warn!("Index invalidated while building; discarding result");
            return Ok(0);
        }

        let count = index.embeddings.len();
        *self.ready.write().await = Some(Arc::new(index));
        info!("Vector index ready with {} documents", count);
        Ok(count)
    }

    async fn load_persisted(&self, model_name: &str) -> Option<VectorIndex> {
        let index: VectorIndex = storage::read_json(&self.index_path).await?;

        if index.model_name != model_name {
            info!(
                "Persisted index was built with model '{}', active model is '{}'; rebuilding",
                index.model_name, model_name
            );
            return None;
        }

        if !self.is_fresh(&index) {
            info!("Persisted index from {} is stale; rebuilding", index.timestamp);
            return None;
        }

        if index.embeddings.is_empty() {
            return None;
        }

        debug!(
            "Loaded persisted index with {} documents",
            index.embeddings.len()
        );
        Some(index)
    }

    async fn build(
        &self,
        structure: &DocumentationStructure,
        embedder: &dyn Embedder,
    ) -> anyhow::Result<VectorIndex> {
        self.build_passes.fetch_add(1, Ordering::SeqCst);
        info!(
            "Building vector index for {} pages with model {}",
            structure.len(),
            embedder.model_name()
        );

        let documents = self.searchable_documents(structure).await;
        let mut embeddings = Vec::with_capacity(documents.len());

        for batch in documents.chunks(self.settings.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

            match embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for ((page, text), vector) in batch.iter().zip(vectors) {
                        push_embedding(&mut embeddings, page, text, vector);
                    }
                }
                outcome => {
                    match outcome {
                        Ok(vectors) => warn!(
                            "Batch returned {} vectors for {} documents, retrying per document",
                            vectors.len(),
                            batch.len()
                        ),
                        Err(e) => warn!("Batch embedding failed, retrying per document: {:#}", e),
                    }
                    for (page, text) in batch {
                        match embedder.embed(text).await {
                            Ok(vector) => push_embedding(&mut embeddings, page, text, vector),
                            Err(e) => warn!("Skipping {}: embedding failed: {:#}", page.url, e),
                        }
                    }
                }
            }
        }

        if embeddings.is_empty() && !documents.is_empty() {
            return Err(anyhow!(
                "Embedding model '{}' failed for all {} documents; vector search disabled",
                embedder.model_name(),
                documents.len()
            ));
        }

        info!(
            "Embedded {} of {} searchable pages",
            embeddings.len(),
            documents.len()
        );

        Ok(VectorIndex {
            embeddings,
            model_name: embedder.model_name().to_string(),
            timestamp: self.clock.now(),
        })
    }

    /// Pages paired with their searchable text, skipping pages whose text is too short
    async fn searchable_documents<'a>(
        &self,
        structure: &'a DocumentationStructure,
    ) -> Vec<(&'a DocPage, String)> {
        let contents: Vec<Option<&'a str>> = match self.resolver.as_deref() {
            Some(resolver) if self.settings.include_content => {
                let mut lookups = Vec::with_capacity(structure.pages.len());
                for page in &structure.pages {
                    lookups.push(async move { Some(resolver.fetch_content(page).await) }.boxed());
                }
                stream::iter(lookups)
                    .buffered(self.settings.content_concurrency)
                    .collect()
                    .await
            }
            _ => structure.pages.iter().map(|page| page.cached_content()).collect(),
        };

        structure
            .pages
            .iter()
            .zip(contents)
            .filter_map(|(page, content)| {
                let text = searchable_text(page, content, self.settings.content_words);
                if text.chars().count() < self.settings.min_text_length {
                    debug!("Skipping {}: searchable text too short", page.url);
                    None
                } else {
                    Some((page, text))
                }
            })
            .collect()
    }

    async fn query_vector(&self, embedder: &dyn Embedder, query: &str) -> Option<Vec<f32>> {
        let cached = self
            .query_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned();
        if cached.is_some() {
            return cached;
        }

        match embedder.embed(query).await {
            Ok(vector) => {
                let mut cache = self.query_cache.lock().unwrap_or_else(PoisonError::into_inner);
                if cache.len() >= QUERY_CACHE_CAPACITY {
                    cache.clear();
                }
                cache.insert(query.to_string(), vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!("Failed to embed query '{}': {:#}", query, e);
                None
            }
        }
    }
}

fn push_embedding(
    embeddings: &mut Vec<DocumentEmbedding>,
    page: &DocPage,
    text: &str,
    vector: Vec<f32>,
) {
    if vector.is_empty() {
        warn!("Skipping {}: empty embedding", page.url);
        return;
    }

    let mut page = page.clone();
    page.content = OnceCell::new();
    embeddings.push(DocumentEmbedding {
        id: page.url.clone(),
        vector,
        content: text.to_string(),
        page,
    });
}

/// Text embedded for a page: the title twice, section, category, meaningful
/// path tokens and the leading words of its content
pub fn searchable_text(page: &DocPage, content: Option<&str>, content_words: usize) -> String {
    let mut parts: Vec<String> = vec![
        page.title.clone(),
        page.title.clone(),
        page.section.clone(),
        page.category.replace('-', " "),
    ];

    let locator = if page.path.is_empty() {
        page.url.as_str()
    } else {
        page.path.as_str()
    };
    let tokens = path_tokens(locator);
    if !tokens.is_empty() {
        parts.push(tokens.join(" "));
    }

    if let Some(content) = content {
        let words: Vec<&str> = content
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|word| word.chars().count() >= MIN_TOKEN_LENGTH)
            .take(content_words)
            .collect();
        if !words.is_empty() {
            parts.push(words.join(" "));
        }
    }

    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

fn path_tokens(locator: &str) -> Vec<String> {
    locator
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| {
            token.chars().count() >= MIN_TOKEN_LENGTH
                && !BOILERPLATE_TOKENS.contains(&token.as_str())
        })
        .collect()
}
