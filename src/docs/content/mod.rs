#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::docs::models::DocPage;
use crate::docs::source::DocsSource;

static FRONT_MATTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*---\r?\n.*?\r?\n---[ \t]*(\r?\n|\z)").expect("valid regex")
});
static MODULE_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*(import|export)\s").expect("valid regex"));
static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|\{/\*.*?\*/\}").expect("valid regex"));
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*/?>").expect("valid regex"));
static BRACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));
static SPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

/// Resolves pages to readable text, never to an empty string
pub struct ContentResolver {
    source: Arc<dyn DocsSource>,
    min_content_length: usize,
}

impl ContentResolver {
    #[inline]
    pub fn new(source: Arc<dyn DocsSource>, min_content_length: usize) -> Self {
        Self {
            source,
            min_content_length,
        }
    }

    /// Resolve a page's text, caching it on the page for the lifetime of its snapshot
    #[inline]
    pub async fn fetch_content<'p>(&self, page: &'p DocPage) -> &'p str {
        page.content.get_or_init(|| self.resolve(page)).await
    }

    async fn resolve(&self, page: &DocPage) -> String {
        if page.is_external() {
            return external_stub(page);
        }

        match self.source.fetch_page(&page.path).await {
            Ok(raw) => {
                let cleaned = clean_markup(&raw);
                let length = cleaned.chars().count();
                if length >= self.min_content_length {
                    cleaned
                } else {
                    debug!(
                        "Content for {} too short ({} chars), using summary",
                        page.url, length
                    );
                    synthetic_summary(page)
                }
            }
            Err(e) => {
                debug!("Failed to fetch content for {}: {:#}", page.url, e);
                synthetic_summary(page)
            }
        }
    }
}

/// One-line stand-in for pages hosted outside the documentation source
#[inline]
pub fn external_stub(page: &DocPage) -> String {
    format!("External resource: {} ({})", page.title, page.url)
}

/// Strip front matter, module directives, markup tags and templating braces,
/// then flatten the remaining markdown to plain text. Inline code and code
/// blocks are kept verbatim.
pub fn clean_markup(raw: &str) -> String {
    let text = FRONT_MATTER_REGEX.replace(raw, "");
    let text = strip_module_lines(&text);

    let mut plain = String::with_capacity(text.len());
    let mut prose = String::new();
    let mut html = String::new();
    let mut in_code_block = false;

    for event in Parser::new(&text) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                flush_prose(&mut plain, &mut prose);
                in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                plain.push('\n');
            }
            Event::Text(t) if in_code_block => plain.push_str(&t),
            Event::Text(t) => prose.push_str(&t),
            Event::Code(t) => {
                flush_prose(&mut plain, &mut prose);
                plain.push_str(&t);
            }
            Event::Html(t) => html.push_str(&t),
            Event::End(TagEnd::HtmlBlock) => {
                let stripped = COMMENT_REGEX.replace_all(&html, "");
                let stripped = TAG_REGEX.replace_all(&stripped, "");
                plain.push_str(&strip_braces(&stripped));
                plain.push('\n');
                html.clear();
            }
            Event::SoftBreak => prose.push(' '),
            Event::HardBreak => prose.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableRow,
            ) => {
                flush_prose(&mut plain, &mut prose);
                plain.push('\n');
            }
            Event::End(TagEnd::TableCell) => {
                flush_prose(&mut plain, &mut prose);
                plain.push(' ');
            }
            _ => {}
        }
    }
    flush_prose(&mut plain, &mut prose);

    plain
        .lines()
        .map(|line| SPACE_REGEX.replace_all(line.trim(), " "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop MDX `import`/`export` lines outside fenced code
fn strip_module_lines(text: &str) -> String {
    let mut open_fence: Option<char> = None;
    let mut kept = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        let fence = if trimmed.starts_with("```") {
            Some('`')
        } else if trimmed.starts_with("~~~") {
            Some('~')
        } else {
            None
        };

        match (open_fence, fence) {
            (None, Some(marker)) => open_fence = Some(marker),
            (Some(open), Some(marker)) if open == marker => open_fence = None,
            (None, None) if MODULE_LINE_REGEX.is_match(line).unwrap_or(false) => continue,
            _ => {}
        }
        kept.push(line);
    }

    kept.join("\n")
}

fn flush_prose(plain: &mut String, prose: &mut String) {
    plain.push_str(&strip_braces(prose));
    prose.clear();
}

/// Remove `{...}` expressions, innermost first, until none remain
fn strip_braces(text: &str) -> String {
    let mut text = text.to_string();
    while BRACE_REGEX.is_match(&text).unwrap_or(false) {
        text = BRACE_REGEX.replace_all(&text, "").into_owned();
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryKind {
    GettingStarted,
    Guide,
    ApiReference,
    Example,
    Sdk,
    General,
}

impl SummaryKind {
    fn from_category(category: &str) -> Self {
        let category = category.to_lowercase();
        let has = |needle: &str| category.contains(needle);

        if has("quickstart") || has("getting-started") || has("introduction") {
            Self::GettingStarted
        } else if has("api") || has("reference") {
            Self::ApiReference
        } else if has("example") || has("tutorial") {
            Self::Example
        } else if has("sdk") || has("client") {
            Self::Sdk
        } else if has("guide") {
            Self::Guide
        } else {
            Self::General
        }
    }
}

/// Category-aware summary used when a page body is missing or unusable
pub fn synthetic_summary(page: &DocPage) -> String {
    let section = if page.section.is_empty() {
        page.category.as_str()
    } else {
        page.section.as_str()
    };

    let intro = match SummaryKind::from_category(&page.category) {
        SummaryKind::GettingStarted => format!(
            "{} is part of the getting started material in {}. It introduces the core \
             concepts and the first steps needed to set up a working project.",
            page.title, section
        ),
        SummaryKind::Guide => format!(
            "{} is a guide in {}. It explains how to accomplish a specific task, \
             with configuration details and recommended practices.",
            page.title, section
        ),
        SummaryKind::ApiReference => format!(
            "{} is an API reference page in {}. It documents endpoints, request \
             parameters, response fields and error codes.",
            page.title, section
        ),
        SummaryKind::Example => format!(
            "{} is an example in {}. It shows a complete, working implementation \
             that can be adapted to similar use cases.",
            page.title, section
        ),
        SummaryKind::Sdk => format!(
            "{} documents a client SDK in {}. It covers installation, \
             initialization and the main methods the SDK exposes.",
            page.title, section
        ),
        SummaryKind::General => format!(
            "{} is a documentation page in {}.",
            page.title, section
        ),
    };

    format!(
        "{}\n\nFull documentation: {}\n\nNext steps: open the page above for complete \
         details, code samples and related topics.",
        intro, page.url
    )
}
