use super::*;
use chrono::TimeZone;

fn page(title: &str, section: &str, category: &str) -> DocPage {
    let slug = title.to_lowercase().replace(' ', "-");
    DocPage {
        title: title.to_string(),
        path: format!("{}/{}.mdx", category, slug),
        url: format!("https://docs.example.com/{}/{}", category, slug),
        category: category.to_string(),
        section: section.to_string(),
        subsection: None,
        level: 1,
        content: OnceCell::new(),
    }
}

fn sample_structure() -> DocumentationStructure {
    let pages = vec![
        page("Getting Started", "Introduction", "quickstart"),
        page("Phone Calls", "Guides > Calls", "guides"),
        page("Webhooks", "Guides > Server", "guides"),
        page("Assistants", "API Reference", "api-reference"),
    ];
    let updated = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();
    DocumentationStructure::new(pages, updated, "v1".to_string())
}

#[test]
fn groupings_cover_every_page_once() {
    let structure = sample_structure();

    let section_total: usize = structure
        .section_names()
        .map(|name| structure.pages_in_section(name).count())
        .sum();
    let category_total: usize = structure
        .category_names()
        .map(|name| structure.pages_in_category(name).count())
        .sum();

    assert_eq!(section_total, structure.len());
    assert_eq!(category_total, structure.len());

    let guides: Vec<&str> = structure
        .pages_in_category("guides")
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(guides, vec!["Phone Calls", "Webhooks"]);
    assert_eq!(structure.pages_in_category("missing").count(), 0);
}

#[test]
fn cache_entry_round_trip() {
    let structure = sample_structure();
    structure.pages[1]
        .content
        .set("Make outbound phone calls.".to_string())
        .expect("cell should be empty");

    let entry = CacheEntry {
        timestamp: structure.last_updated,
        structure,
        etag: Some("\"abc123\"".to_string()),
    };

    let json = serde_json::to_string(&entry).expect("should serialize cache entry");
    let restored: CacheEntry = serde_json::from_str(&json).expect("should deserialize entry");

    assert_eq!(restored, entry);
    assert_eq!(restored.structure.len(), 4);
    assert_eq!(restored.structure.pages_in_section("Guides > Calls").count(), 1);
    assert_eq!(restored.structure.pages_in_category("guides").count(), 2);
    assert_eq!(
        restored.structure.pages[1].cached_content(),
        Some("Make outbound phone calls.")
    );
    assert_eq!(restored.structure.pages[0].cached_content(), None);
}

#[test]
fn groupings_serialize_as_key_value_objects() {
    let structure = sample_structure();
    let value = serde_json::to_value(&structure).expect("should serialize structure");

    let categories = value
        .get("categories")
        .and_then(|c| c.as_object())
        .expect("categories should be a JSON object");
    assert_eq!(categories.len(), 3);
    assert!(categories.contains_key("guides"));
}

#[test]
fn restamp_keeps_pages() {
    let structure = sample_structure();
    let later = structure.last_updated + chrono::Duration::hours(2);
    let restamped = structure.restamped(later);

    assert_eq!(restamped.last_updated, later);
    assert_eq!(restamped.pages, structure.pages);
    assert_eq!(restamped.version, structure.version);
}

#[test]
fn external_link_detection() {
    let mut external = page("Status Page", "Resources", "external");
    external.path = String::new();
    assert!(external.is_external());
    assert!(!page("Webhooks", "Guides", "guides").is_external());
}
