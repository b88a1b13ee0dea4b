// Documentation retrieval
// Manifest parsing, page content resolution and the two-tier structure cache

pub mod content;
pub mod manifest;
pub mod models;
pub mod source;
pub mod store;

pub use content::ContentResolver;
pub use models::{CacheEntry, DocPage, DocumentationStructure};
pub use source::{DocsSource, HttpDocsSource, ManifestResponse};
pub use store::DocumentationStore;
