use super::*;

const YAML_MANIFEST: &str = r#"
instances:
  - url: docs.example.com
navigation:
  - section: Getting Started
    contents:
      - page: Introduction
        path: introduction.mdx
        icon: fa-light fa-door-open
      - page: Quickstart
        path: quickstart/phone.mdx
  - section: Guides
    contents:
      - section: Calls
        contents:
          - page: Phone Calls
            path: guides/phone-calls.mdx
            hidden: false
      - page: Webhooks
        path: guides/webhooks.mdx
      - api: API Reference
  - link: Status Page
    href: https://status.example.com
"#;

fn source() -> SourceConfig {
    SourceConfig {
        site_base_url: "https://docs.example.com".to_string(),
        ..SourceConfig::default()
    }
}

#[test]
fn parse_yaml_manifest_ignores_unknown_fields() {
    let manifest = parse_manifest(YAML_MANIFEST).expect("manifest should parse");
    assert_eq!(manifest.navigation.len(), 3);
    assert!(matches!(
        &manifest.navigation[0],
        NavNode::Section { name, children } if name == "Getting Started" && children.len() == 2
    ));
    assert!(matches!(
        &manifest.navigation[2],
        NavNode::ExternalLink { href, .. } if href == "https://status.example.com"
    ));
}

#[test]
fn parse_json_manifest() {
    let json = r#"{
        "version": 3,
        "navigation": [
            {"section": "Guides", "contents": [
                {"page": "Webhooks", "path": "guides/webhooks.mdx", "icon": "bolt"}
            ]}
        ]
    }"#;

    let manifest = parse_manifest(json).expect("manifest should parse");
    let pages = flatten_manifest(&manifest, &source());
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "Webhooks");
    assert_eq!(pages[0].url, "https://docs.example.com/guides/webhooks");
}

#[test]
fn malformed_manifest_is_an_error() {
    assert!(parse_manifest("{\"navigation\": [").is_err());
    assert!(parse_manifest("navigation: [section: : :").is_err());
}

#[test]
fn flatten_builds_breadcrumbs_and_levels() {
    let manifest = parse_manifest(YAML_MANIFEST).expect("manifest should parse");
    let pages = flatten_manifest(&manifest, &source());

    let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Introduction",
            "Quickstart",
            "Phone Calls",
            "Webhooks",
            "Status Page"
        ]
    );

    let phone = &pages[2];
    assert_eq!(phone.section, "Guides > Calls");
    assert_eq!(phone.subsection.as_deref(), Some("Calls"));
    assert_eq!(phone.level, 2);
    assert_eq!(phone.category, "guides");

    let webhooks = &pages[3];
    assert_eq!(webhooks.section, "Guides");
    assert_eq!(webhooks.subsection, None);
    assert_eq!(webhooks.level, 1);
}

#[test]
fn categories_come_from_path_or_top_section() {
    let manifest = parse_manifest(YAML_MANIFEST).expect("manifest should parse");
    let pages = flatten_manifest(&manifest, &source());

    assert_eq!(pages[0].category, "getting-started");
    assert_eq!(pages[1].category, "quickstart");
}

#[test]
fn external_links_have_no_path() {
    let manifest = parse_manifest(YAML_MANIFEST).expect("manifest should parse");
    let pages = flatten_manifest(&manifest, &source());

    let status = pages.last().expect("should have pages");
    assert!(status.is_external());
    assert_eq!(status.url, "https://status.example.com");
    assert_eq!(status.category, "external");
    assert_eq!(status.section, "General");
    assert_eq!(status.level, 0);
}

#[test]
fn slugify_names() {
    assert_eq!(slugify("Getting Started"), "getting-started");
    assert_eq!(slugify("API  Reference!"), "api-reference");
    assert_eq!(slugify("  "), "");
}
