use super::*;
use crate::config::{CacheConfig, SourceConfig};
use crate::docs::source::{DocsSource, ManifestResponse};
use crate::embeddings::Embedder;
use crate::embeddings::index::IndexSettings;
use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tempfile::TempDir;

const MANIFEST: &str = r#"
navigation:
  - section: Getting Started
    contents:
      - page: Getting Started
        path: quickstart/getting-started.mdx
  - section: Guides
    contents:
      - page: Phone Calls
        path: guides/phone-calls.mdx
      - page: Webhooks
        path: guides/webhooks.mdx
"#;

struct StaticSource(&'static str);

#[async_trait]
impl DocsSource for StaticSource {
    async fn fetch_manifest(&self, _etag: Option<&str>) -> AnyResult<ManifestResponse> {
        Ok(ManifestResponse::Fetched {
            body: self.0.to_string(),
            etag: None,
        })
    }

    async fn fetch_page(&self, path: &str) -> AnyResult<String> {
        Err(anyhow!("HTTP error 404 for {}", path))
    }
}

struct HashingEmbedder;

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> AnyResult<Vec<f32>> {
        let mut vector = vec![0.0; 64];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let word = word.to_lowercase();
            let mut hasher = DefaultHasher::new();
            word.strip_suffix('s').unwrap_or(&word).hash(&mut hasher);
            vector[usize::try_from(hasher.finish() % 64).unwrap()] += 1.0;
        }
        Ok(vector)
    }
}

fn orchestrator(
    manifest: &'static str,
    embedder: Option<Arc<dyn Embedder>>,
    dir: &TempDir,
) -> SearchOrchestrator {
    let settings = IndexSettings {
        batch_size: 10,
        min_text_length: 10,
        content_words: 100,
        include_content: false,
        content_concurrency: 1,
        max_age: Duration::from_secs(86_400),
    };
    let index = EmbeddingIndex::new(embedder, settings, dir.path().join("vector-index.json"));
    let store = DocumentationStore::new(
        Arc::new(StaticSource(manifest)),
        SourceConfig {
            site_base_url: "https://docs.example.com".to_string(),
            ..SourceConfig::default()
        },
        &CacheConfig::default(),
        dir.path().join("docs-structure.json"),
    )
    .with_index(index.clone());

    SearchOrchestrator::new(store, index, &SearchConfig::default())
}

#[tokio::test]
async fn exact_keyword_falls_back_to_text_search() {
    let manifest = r#"
navigation:
  - section: Guides
    contents:
      - page: Webhooks Guide
        path: guides/webhooks.mdx
      - page: Phone Calls
        path: guides/phone-calls.mdx
"#;
    let dir = TempDir::new().unwrap();
    let search = orchestrator(manifest, None, &dir);

    let outcome = search.search("webhook", None, 10).await.unwrap();

    assert!(!outcome.used_vector);
    assert_eq!(outcome.index_size, 0);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].title, "Webhooks Guide");
}

#[tokio::test]
async fn category_scoped_text_search() {
    let dir = TempDir::new().unwrap();
    let search = orchestrator(MANIFEST, None, &dir);

    let outcome = search.search("guide", Some("guides"), 5).await.unwrap();

    assert!(!outcome.used_vector);
    let mut titles: Vec<&str> = outcome.results.iter().map(|p| p.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, ["Phone Calls", "Webhooks"]);
}

#[tokio::test]
async fn category_scoped_vector_search() {
    let dir = TempDir::new().unwrap();
    let search = orchestrator(MANIFEST, Some(Arc::new(HashingEmbedder)), &dir);

    let outcome = search.search("guide", Some("guides"), 5).await.unwrap();

    assert!(outcome.used_vector);
    assert_eq!(outcome.index_size, 3);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|page| page.category == "guides"));
}

#[tokio::test]
async fn no_matches_is_an_empty_result() {
    let dir = TempDir::new().unwrap();
    let search = orchestrator(MANIFEST, None, &dir);

    let outcome = search.search("kubernetes", None, 10).await.unwrap();

    assert!(outcome.results.is_empty());
    assert!(!outcome.used_vector);
}

#[tokio::test]
async fn blank_query_returns_nothing() {
    let dir = TempDir::new().unwrap();
    let search = orchestrator(MANIFEST, None, &dir);

    assert!(search.search("   ", None, 10).await.unwrap().results.is_empty());
}

#[test]
fn title_matches_rank_ahead_of_section_matches() {
    let page = |title: &str, section: &str, path: &str| DocPage {
        title: title.to_string(),
        path: path.to_string(),
        url: format!("https://docs.example.com/{}", path),
        category: "guides".to_string(),
        section: section.to_string(),
        subsection: None,
        level: 1,
        content: tokio::sync::OnceCell::new(),
    };
    let structure = DocumentationStructure::new(
        vec![
            page("Retries", "Calls", "guides/retries"),
            page("Overview", "Assistants", "guides/overview"),
            page("Call Recording", "Recording", "guides/recording"),
        ],
        chrono::Utc::now(),
        "test".to_string(),
    );

    let results = lexical_search(&structure, "CALL", None, 10);
    let titles: Vec<&str> = results.iter().map(|p| p.title.as_str()).collect();

    assert_eq!(titles, ["Call Recording", "Retries"]);
    assert_eq!(lexical_search(&structure, "call", None, 1).len(), 1);
    assert!(lexical_search(&structure, "call", Some("api"), 10).is_empty());
}
