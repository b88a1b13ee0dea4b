//! Caller-facing facade: search, reindexing and category views, each
//! returning page metadata with resolved content


use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{DocsError, Result};
use crate::config::Config;
use crate::docs::content::ContentResolver;
use crate::docs::models::{DocPage, DocumentationStructure};
use crate::docs::source::{DocsSource, HttpDocsSource};
use crate::docs::store::DocumentationStore;
use crate::embeddings::index::IndexSettings;
use crate::embeddings::{Embedder, EmbeddingIndex, OllamaClient, QueryExpander};
use crate::search::SearchOrchestrator;

/// A page together with its resolved text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPage {
    pub title: String,
    pub url: String,
    pub category: String,
    pub section: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ResolvedPage>,
    pub used_vector: bool,
    pub index_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub pages: usize,
    pub indexed_documents: usize,
    pub cache_cleared: bool,
    pub vector_index_skipped: bool,
    /// No embedder is available, or it failed on every document
    pub vector_search_disabled: bool,
}

/// Category-filtered views over the documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryView {
    Examples,
    Guides,
    ApiReference,
}

impl CategoryView {
    pub fn matches(self, category: &str) -> bool {
        let category = category.to_lowercase();
        match self {
            Self::Examples => ["example", "tutorial", "cookbook", "recipe"]
                .iter()
                .any(|needle| category.contains(needle)),
            Self::Guides => category.contains("guide"),
            Self::ApiReference => category.contains("api") || category.contains("reference"),
        }
    }
}

pub struct DocsService {
    orchestrator: SearchOrchestrator,
    resolver: Arc<ContentResolver>,
    default_limit: usize,
    content_concurrency: usize,
}

impl DocsService {
    /// Wire the service against the configured HTTP source and Ollama runtime.
    /// An unreachable embedder leaves vector search disabled for the session.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let source: Arc<dyn DocsSource> = Arc::new(HttpDocsSource::new(config.source.clone()));
        let embedder = match OllamaClient::new(&config.ollama) {
            Ok(client) => {
                let probe = client.clone();
                match tokio::task::spawn_blocking(move || probe.health_check()).await {
                    Ok(Ok(())) => Some(Arc::new(client) as Arc<dyn Embedder>),
                    Ok(Err(e)) => {
                        warn!("Embedding model unavailable, vector search disabled: {:#}", e);
                        None
                    }
                    Err(e) => {
                        warn!("Embedding health check failed to run: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Invalid Ollama configuration, vector search disabled: {:#}", e);
                None
            }
        };

        Ok(Self::new(config, source, embedder))
    }

    pub fn new(
        config: &Config,
        source: Arc<dyn DocsSource>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let resolver = Arc::new(ContentResolver::new(
            Arc::clone(&source),
            config.search.min_content_length,
        ));

        let index = EmbeddingIndex::new(
            embedder,
            IndexSettings::new(&config.index, &config.cache),
            config.vector_index_path(),
        )
        .with_resolver(Arc::clone(&resolver))
        .with_expander(QueryExpander::with_synonyms(&config.search.synonyms));

        let store = DocumentationStore::new(
            source,
            config.source.clone(),
            &config.cache,
            config.structure_cache_path(),
        )
        .with_index(index.clone());

        Self {
            orchestrator: SearchOrchestrator::new(store, index, &config.search),
            resolver,
            default_limit: config.search.default_limit,
            content_concurrency: config.index.content_concurrency.max(1),
        }
    }

    #[inline]
    pub fn vector_enabled(&self) -> bool {
        self.orchestrator.index().has_embedder()
    }

    pub async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        let limit = limit.unwrap_or(self.default_limit);
        let outcome = self.orchestrator.search(query, category, limit).await?;
        let structure = self.orchestrator.store().get_structure().await?;

        Ok(SearchResponse {
            results: self.resolve(&structure, &outcome.results).await,
            used_vector: outcome.used_vector,
            index_size: outcome.index_size,
        })
    }

    /// Rebuild from scratch. `clear_cache` drops the structure cache as well as
    /// the vector index; `skip_vector_index` refreshes pages only.
    pub async fn force_reindex(
        &self,
        clear_cache: bool,
        skip_vector_index: bool,
    ) -> Result<ReindexReport> {
        let store = self.orchestrator.store();
        let index = self.orchestrator.index();

        if clear_cache {
            store.invalidate().await?;
        } else if !skip_vector_index {
            index.invalidate().await?;
        }

        let structure = store.get_structure().await?;
        let mut vector_search_disabled = !index.has_embedder();
        let indexed_documents = if skip_vector_index {
            0
        } else {
            match index.ensure_ready(Arc::clone(&structure)).await {
                Ok(count) => count,
                Err(DocsError::Embedding(e)) => {
                    warn!("Vector index build failed, text search only: {}", e);
                    vector_search_disabled = true;
                    0
                }
                Err(e) => return Err(e),
            }
        };

        if let Err(e) = store.persist().await {
            warn!("Failed to persist resolved page content: {}", e);
        }

        info!(
            "Reindex complete: {} pages, {} indexed documents",
            structure.len(),
            indexed_documents
        );

        Ok(ReindexReport {
            pages: structure.len(),
            indexed_documents,
            cache_cleared: clear_cache,
            vector_index_skipped: skip_vector_index,
            vector_search_disabled,
        })
    }

    pub async fn get_examples(&self, limit: Option<usize>) -> Result<Vec<ResolvedPage>> {
        self.category_view(CategoryView::Examples, limit).await
    }

    pub async fn get_guides(&self, limit: Option<usize>) -> Result<Vec<ResolvedPage>> {
        self.category_view(CategoryView::Guides, limit).await
    }

    pub async fn get_api_reference(&self, limit: Option<usize>) -> Result<Vec<ResolvedPage>> {
        self.category_view(CategoryView::ApiReference, limit).await
    }

    async fn category_view(
        &self,
        view: CategoryView,
        limit: Option<usize>,
    ) -> Result<Vec<ResolvedPage>> {
        let structure = self.orchestrator.store().get_structure().await?;
        let pages: Vec<DocPage> = structure
            .pages
            .iter()
            .filter(|page| view.matches(&page.category))
            .take(limit.unwrap_or(self.default_limit))
            .cloned()
            .collect();

        Ok(self.resolve(&structure, &pages).await)
    }

    /// Resolve content through the snapshot's own pages so it is cached there
    async fn resolve(
        &self,
        structure: &DocumentationStructure,
        pages: &[DocPage],
    ) -> Vec<ResolvedPage> {
        stream::iter(pages)
            .map(|page| async move {
                let canonical = structure
                    .pages
                    .iter()
                    .find(|candidate| candidate.url == page.url)
                    .unwrap_or(page);
                ResolvedPage {
                    title: page.title.clone(),
                    url: page.url.clone(),
                    category: page.category.clone(),
                    section: page.section.clone(),
                    content: self.resolver.fetch_content(canonical).await.to_string(),
                }
            })
            .buffered(self.content_concurrency)
            .collect()
            .await
    }
}
