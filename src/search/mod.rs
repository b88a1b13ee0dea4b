//! Hybrid search: vector similarity first, case-insensitive substring scan as
//! the fallback

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::Result;
use crate::config::SearchConfig;
use crate::docs::models::{DocPage, DocumentationStructure};
use crate::docs::store::DocumentationStore;
use crate::embeddings::EmbeddingIndex;

/// Ranked results plus which strategy produced them
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<DocPage>,
    pub used_vector: bool,
    /// Documents in the vector index when the query ran
    pub index_size: usize,
}

#[derive(Clone)]
pub struct SearchOrchestrator {
    store: DocumentationStore,
    index: EmbeddingIndex,
    similarity_threshold: f32,
}

impl SearchOrchestrator {
    #[inline]
    pub fn new(store: DocumentationStore, index: EmbeddingIndex, config: &SearchConfig) -> Self {
        Self {
            store,
            index,
            similarity_threshold: config.similarity_threshold,
        }
    }

    #[inline]
    pub fn store(&self) -> &DocumentationStore {
        &self.store
    }

    #[inline]
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Search the current documentation, optionally within one category.
    /// Fails only when no documentation snapshot can be obtained at all.
    pub async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<SearchOutcome> {
        let structure = self.store.get_structure().await?;

        if let Err(e) = self.index.ensure_ready(Arc::clone(&structure)).await {
            warn!("Vector index unavailable, using text search: {}", e);
        }
        let index_size = self.index.len().await;

        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(SearchOutcome {
                results: Vec::new(),
                used_vector: false,
                index_size,
            });
        }

        // With a category filter, rank every candidate above the threshold
        // before filtering so the filter does not starve the result list
        let candidates = if category.is_some() {
            index_size
        } else {
            limit
        };
        let mut results = self
            .index
            .search(query, candidates, self.similarity_threshold)
            .await;
        if let Some(category) = category {
            results.retain(|page| in_category(page, category));
        }

        if !results.is_empty() {
            results.truncate(limit);
            debug!("Vector search returned {} results for '{}'", results.len(), query);
            return Ok(SearchOutcome {
                results,
                used_vector: true,
                index_size,
            });
        }

        let results = lexical_search(&structure, query, category, limit);
        debug!("Text search returned {} results for '{}'", results.len(), query);
        Ok(SearchOutcome {
            results,
            used_vector: false,
            index_size,
        })
    }
}

#[inline]
pub fn in_category(page: &DocPage, category: &str) -> bool {
    page.category.eq_ignore_ascii_case(category)
}

/// Pages whose title, section or URL contains `query`, ignoring case. Title
/// matches come first; document order is kept within each group.
pub fn lexical_search(
    structure: &DocumentationStructure,
    query: &str,
    category: Option<&str>,
    limit: usize,
) -> Vec<DocPage> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let (title_hits, other_hits): (Vec<&DocPage>, Vec<&DocPage>) = structure
        .pages
        .iter()
        .filter(|page| category.is_none_or(|category| in_category(page, category)))
        .filter(|page| {
            page.title.to_lowercase().contains(&needle)
                || page.section.to_lowercase().contains(&needle)
                || page.url.to_lowercase().contains(&needle)
        })
        .partition(|page| page.title.to_lowercase().contains(&needle));

    title_hits
        .into_iter()
        .chain(other_hits)
        .take(limit)
        .cloned()
        .collect()
}
