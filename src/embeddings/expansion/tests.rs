use super::*;

#[test]
fn voice_query_gains_speech_terms() {
    let expanded = QueryExpander::default().expand("voice settings");
    assert!(expanded.starts_with("voice settings"));
    for term in ["speech", "audio", "tts"] {
        assert!(expanded.contains(term), "missing {} in {}", term, expanded);
    }
}

#[test]
fn plural_triggers_match() {
    let expanded = QueryExpander::default().expand("Webhooks");
    assert!(expanded.contains("callback"));
}

#[test]
fn unrelated_query_is_unchanged() {
    assert_eq!(QueryExpander::default().expand("billing"), "billing");
}

#[test]
fn terms_already_present_are_not_repeated() {
    let expanded = QueryExpander::default().expand("phone call");
    assert_eq!(expanded.matches("phone").count(), 1);
    assert_eq!(expanded.split(' ').filter(|w| *w == "call").count(), 1);
    assert!(expanded.contains("telephony"));
    assert_eq!(expanded.matches("telephony").count(), 1);
}

#[test]
fn configured_synonyms_merge_with_defaults() {
    let mut extra = HashMap::new();
    extra.insert(
        "SMS".to_string(),
        vec!["Text".to_string(), "message".to_string()],
    );
    extra.insert("voice".to_string(), vec!["narration".to_string()]);

    let expander = QueryExpander::with_synonyms(&extra);

    assert_eq!(
        expander.terms_for("sms"),
        Some(&["text".to_string(), "message".to_string()][..])
    );
    let voice = expander.terms_for("voice").expect("voice should exist");
    assert!(voice.contains(&"speech".to_string()));
    assert!(voice.contains(&"narration".to_string()));
}
