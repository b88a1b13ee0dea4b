use super::*;
use crate::docs::source::ManifestResponse;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

struct FakeSource {
    pages: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new(pages: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|(path, body)| ((*path).to_string(), (*body).to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DocsSource for FakeSource {
    async fn fetch_manifest(&self, _etag: Option<&str>) -> Result<ManifestResponse> {
        Err(anyhow!("not used"))
    }

    async fn fetch_page(&self, path: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP error 404 for {}", path))
    }
}

fn page(title: &str, path: &str, category: &str) -> DocPage {
    DocPage {
        title: title.to_string(),
        path: path.to_string(),
        url: format!("https://docs.example.com/{}", path.trim_end_matches(".mdx")),
        category: category.to_string(),
        section: "Guides".to_string(),
        subsection: None,
        level: 1,
        content: OnceCell::new(),
    }
}

const WEBHOOKS_MDX: &str = r#"---
title: Webhooks
description: Receive events
---
import { Callout } from "@/components";
export const meta = { hidden: true };

# Server events

<Callout type="info">Webhooks are delivered as **POST** requests to your server URL.</Callout>

Each event carries a `type` field such as {props.eventName} and a JSON payload.
Respond within a few seconds or the delivery is retried with exponential backoff.
"#;

#[test]
fn clean_markup_strips_noise() {
    let cleaned = clean_markup(WEBHOOKS_MDX);

    assert!(!cleaned.contains("title: Webhooks"));
    assert!(!cleaned.contains("import"));
    assert!(!cleaned.contains("export"));
    assert!(!cleaned.contains("<Callout"));
    assert!(!cleaned.contains("props.eventName"));
    assert!(cleaned.contains("Server events"));
    assert!(cleaned.contains("Webhooks are delivered as POST requests to your server URL."));
    assert!(cleaned.contains("type"));
}

#[test]
fn clean_markup_keeps_fenced_code() {
    let cleaned = clean_markup(
        "# Setup\n\nSet your key first:\n\n```bash\nexport VAPI_API_KEY=sk-test\nnpm install @vapi-ai/server-sdk\n```\n",
    );

    assert!(cleaned.contains("Set your key first:"));
    assert!(cleaned.contains("export VAPI_API_KEY=sk-test"));
    assert!(cleaned.contains("npm install @vapi-ai/server-sdk"));
}

#[test]
fn clean_markup_keeps_generics_in_inline_code() {
    let cleaned = clean_markup("Returns `Promise<Call>` and `Vec<String>` values.");
    assert_eq!(cleaned, "Returns Promise<Call> and Vec<String> values.");
}

#[test]
fn clean_markup_removes_nested_template_braces() {
    let cleaned = clean_markup("Use {{ assistant.name }} in the prompt template for greeting.");
    assert_eq!(cleaned, "Use in the prompt template for greeting.");
}

#[test]
fn clean_markup_keeps_text_inside_component_blocks() {
    let cleaned = clean_markup(
        "<Note>\nCalls are billed per second.\n</Note>\n\n<!-- internal only -->\n\nDone.",
    );

    assert!(cleaned.contains("Calls are billed per second."));
    assert!(!cleaned.contains("Note"));
    assert!(!cleaned.contains("internal only"));
    assert!(cleaned.contains("Done."));
}

#[test]
fn clean_markup_collapses_whitespace() {
    let cleaned = clean_markup("Hello    world\n\n\n\nSecond   paragraph");
    assert_eq!(cleaned, "Hello world\nSecond paragraph");
}

#[tokio::test]
async fn resolves_and_caches_cleaned_content() {
    let source = FakeSource::new(&[("guides/webhooks.mdx", WEBHOOKS_MDX)]);
    let resolver = ContentResolver::new(source.clone(), 100);
    let page = page("Webhooks", "guides/webhooks.mdx", "guides");

    let first = resolver.fetch_content(&page).await.to_string();
    let second = resolver.fetch_content(&page).await;

    assert!(first.contains("Server events"));
    assert_eq!(first, second);
    assert_eq!(page.cached_content(), Some(first.as_str()));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_yields_category_summary() {
    let source = FakeSource::new(&[]);
    let resolver = ContentResolver::new(source, 100);
    let page = page("Phone Calls", "guides/phone-calls.mdx", "guides");

    let content = resolver.fetch_content(&page).await;

    assert!(!content.is_empty());
    assert!(content.contains("is a guide in Guides"));
    assert!(content.contains("https://docs.example.com/guides/phone-calls"));
}

#[tokio::test]
async fn short_content_yields_summary() {
    let source = FakeSource::new(&[("quickstart/intro.mdx", "# Intro\n\nComing soon.")]);
    let resolver = ContentResolver::new(source, 100);
    let page = page("Introduction", "quickstart/intro.mdx", "quickstart");

    let content = resolver.fetch_content(&page).await;

    assert!(content.contains("getting started"));
    assert!(content.contains(&page.url));
}

#[tokio::test]
async fn external_links_are_never_fetched() {
    let source = FakeSource::new(&[]);
    let resolver = ContentResolver::new(source.clone(), 100);
    let mut link = page("Status", "", "external");
    link.url = "https://status.example.com".to_string();

    let content = resolver.fetch_content(&link).await;

    assert_eq!(content, "External resource: Status (https://status.example.com)");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn summary_kinds_by_category() {
    assert_eq!(
        SummaryKind::from_category("quickstart"),
        SummaryKind::GettingStarted
    );
    assert_eq!(
        SummaryKind::from_category("api-reference"),
        SummaryKind::ApiReference
    );
    assert_eq!(SummaryKind::from_category("examples"), SummaryKind::Example);
    assert_eq!(SummaryKind::from_category("server-sdks"), SummaryKind::Sdk);
    assert_eq!(SummaryKind::from_category("guides"), SummaryKind::Guide);
    assert_eq!(SummaryKind::from_category("misc"), SummaryKind::General);
}
