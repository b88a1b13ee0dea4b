//! Navigation manifest parsing
//!
//! The manifest is a tree of sections and leaf pages/links. Flattening walks it
//! depth-first, carrying a breadcrumb of section names that becomes each page's
//! `section`.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::SourceConfig;
use crate::docs::models::DocPage;

pub const SECTION_SEPARATOR: &str = " > ";
const ROOT_SECTION: &str = "General";
const EXTERNAL_CATEGORY: &str = "external";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavigationManifest {
    #[serde(default)]
    pub navigation: Vec<NavNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NavNode {
    Section {
        #[serde(rename = "section")]
        name: String,
        #[serde(rename = "contents", default)]
        children: Vec<NavNode>,
    },
    Page {
        #[serde(rename = "page")]
        title: String,
        path: String,
        #[serde(default)]
        icon: Option<String>,
    },
    ExternalLink {
        #[serde(rename = "link")]
        title: String,
        href: String,
    },
    /// Node kinds this crate does not index (API playgrounds, changelogs, ...)
    Unknown(IgnoredAny),
}

/// Parse a manifest body, accepting JSON or YAML
pub fn parse_manifest(body: &str) -> Result<NavigationManifest> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).context("Failed to parse JSON navigation manifest");
    }

    serde_yaml::from_str(body).context("Failed to parse YAML navigation manifest")
}

/// Flatten the navigation tree into pages in document order
pub fn flatten_manifest(manifest: &NavigationManifest, source: &SourceConfig) -> Vec<DocPage> {
    let mut pages = Vec::new();
    let mut breadcrumb: Vec<&str> = Vec::new();

    for node in &manifest.navigation {
        visit(node, &mut breadcrumb, source, &mut pages);
    }

    debug!("Flattened navigation manifest into {} pages", pages.len());
    pages
}

fn visit<'a>(
    node: &'a NavNode,
    breadcrumb: &mut Vec<&'a str>,
    source: &SourceConfig,
    pages: &mut Vec<DocPage>,
) {
    match node {
        NavNode::Section { name, children } => {
            breadcrumb.push(name.as_str());
            for child in children {
                visit(child, breadcrumb, source, pages);
            }
            breadcrumb.pop();
        }
        NavNode::Page { title, path, .. } => {
            let category = path_category(path)
                .unwrap_or_else(|| section_category(breadcrumb, ROOT_SECTION));
            pages.push(leaf(
                title,
                path.clone(),
                source.page_url(path),
                category,
                breadcrumb,
            ));
        }
        NavNode::ExternalLink { title, href } => {
            let category = section_category(breadcrumb, EXTERNAL_CATEGORY);
            pages.push(leaf(title, String::new(), href.clone(), category, breadcrumb));
        }
        NavNode::Unknown(_) => {}
    }
}

fn leaf(
    title: &str,
    path: String,
    url: String,
    category: String,
    breadcrumb: &[&str],
) -> DocPage {
    let section = if breadcrumb.is_empty() {
        ROOT_SECTION.to_string()
    } else {
        breadcrumb.join(SECTION_SEPARATOR)
    };

    let subsection = match breadcrumb {
        [_, .., innermost] => Some((*innermost).to_string()),
        _ => None,
    };

    DocPage {
        title: title.trim().to_string(),
        path,
        url,
        category,
        section,
        subsection,
        level: breadcrumb.len(),
        content: OnceCell::new(),
    }
}

/// Category from the first directory of a source path, e.g. `guides/calls.mdx`
fn path_category(path: &str) -> Option<String> {
    let trimmed = path.trim_start_matches('/');
    let (dir, _) = trimmed.split_once('/')?;
    (!dir.is_empty()).then(|| slugify(dir))
}

fn section_category(breadcrumb: &[&str], fallback: &str) -> String {
    breadcrumb
        .first()
        .map(|top| slugify(top))
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[inline]
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
