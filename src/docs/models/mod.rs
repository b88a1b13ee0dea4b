#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::OnceCell;

/// One documentation unit from the navigation manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocPage {
    pub title: String,
    /// Source-relative path; empty for external links
    pub path: String,
    /// Canonical public URL
    pub url: String,
    pub category: String,
    /// Breadcrumb of the enclosing navigation sections, e.g. "Guides > Calls"
    pub section: String,
    pub subsection: Option<String>,
    /// Depth in the navigation tree
    pub level: usize,
    /// Resolved page text, filled at most once per snapshot
    #[serde(default, with = "content_cell")]
    pub content: OnceCell<String>,
}

impl DocPage {
    #[inline]
    pub fn is_external(&self) -> bool {
        self.path.is_empty()
    }

    #[inline]
    pub fn cached_content(&self) -> Option<&str> {
        self.content.get().map(String::as_str)
    }
}

mod content_cell {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use tokio::sync::OnceCell;

    pub(super) fn serialize<S: Serializer>(
        cell: &OnceCell<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        cell.get().serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OnceCell<String>, D::Error> {
        Option::<String>::deserialize(deserializer).map(OnceCell::new_with)
    }
}

/// Immutable snapshot of the documentation site. Groupings hold indices into
/// `pages`, so every page sits in exactly one section list and one category list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationStructure {
    pub pages: Vec<DocPage>,
    sections: HashMap<String, Vec<usize>>,
    categories: HashMap<String, Vec<usize>>,
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

impl DocumentationStructure {
    #[inline]
    pub fn new(pages: Vec<DocPage>, last_updated: DateTime<Utc>, version: String) -> Self {
        let mut sections: HashMap<String, Vec<usize>> = HashMap::new();
        let mut categories: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, page) in pages.iter().enumerate() {
            sections.entry(page.section.clone()).or_default().push(idx);
            categories.entry(page.category.clone()).or_default().push(idx);
        }

        Self {
            pages,
            sections,
            categories,
            last_updated,
            version,
        }
    }

    /// Same pages under a new timestamp
    #[inline]
    pub fn restamped(&self, last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            ..self.clone()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[inline]
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    #[inline]
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    #[inline]
    pub fn pages_in_section<'a>(
        &'a self,
        section: &str,
    ) -> impl Iterator<Item = &'a DocPage> + use<'a> {
        self.indexed(self.sections.get(section))
    }

    #[inline]
    pub fn pages_in_category<'a>(
        &'a self,
        category: &str,
    ) -> impl Iterator<Item = &'a DocPage> + use<'a> {
        self.indexed(self.categories.get(category))
    }

    fn indexed<'a>(
        &'a self,
        indices: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a DocPage> {
        indices
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.pages.get(idx))
    }
}

/// The single persisted record of the structure cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub structure: DocumentationStructure,
    pub timestamp: DateTime<Utc>,
    pub etag: Option<String>,
}
