#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};

/// Built-in trigger keyword -> expansion terms
const DEFAULT_EXPANSIONS: &[(&str, &[&str])] = &[
    ("voice", &["speech", "audio", "tts", "text-to-speech"]),
    ("speech", &["voice", "audio", "transcription"]),
    ("transcribe", &["transcriber", "speech-to-text", "stt"]),
    ("call", &["phone", "telephony", "calling"]),
    ("phone", &["call", "number", "telephony", "sip"]),
    ("assistant", &["agent", "bot", "ai"]),
    ("agent", &["assistant", "bot"]),
    ("webhook", &["server", "events", "callback", "url"]),
    ("tool", &["function", "tools", "integration"]),
    ("function", &["tool", "function-calling"]),
    ("squad", &["team", "transfer", "multi-assistant"]),
    ("workflow", &["flow", "nodes", "automation"]),
    ("llm", &["model", "openai", "provider"]),
    ("sdk", &["client", "library", "package"]),
    ("api", &["endpoint", "reference", "rest"]),
    ("auth", &["authentication", "api-key", "token"]),
];

/// Expands short queries with related vocabulary before embedding them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpander {
    table: BTreeMap<String, Vec<String>>,
}

impl Default for QueryExpander {
    #[inline]
    fn default() -> Self {
        let table = DEFAULT_EXPANSIONS
            .iter()
            .map(|(trigger, terms)| {
                (
                    (*trigger).to_string(),
                    terms.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect();
        Self { table }
    }
}

impl QueryExpander {
    /// Built-in table with `extra` entries merged in; extra terms are appended
    #[inline]
    pub fn with_synonyms(extra: &HashMap<String, Vec<String>>) -> Self {
        let mut expander = Self::default();
        for (trigger, terms) in extra {
            expander.insert(trigger, terms.iter().map(String::as_str));
        }
        expander
    }

    pub fn insert<'a>(&mut self, trigger: &str, terms: impl IntoIterator<Item = &'a str>) {
        let entry = self.table.entry(trigger.trim().to_lowercase()).or_default();
        for term in terms {
            let term = term.trim().to_lowercase();
            if !term.is_empty() && !entry.contains(&term) {
                entry.push(term);
            }
        }
    }

    /// Terms that `keyword` triggers, if any
    #[inline]
    pub fn terms_for(&self, keyword: &str) -> Option<&[String]> {
        self.table.get(keyword).map(Vec::as_slice)
    }

    /// The query followed by every expansion term it triggers that it does not
    /// already contain. Triggers match whole words or their plural.
    pub fn expand(&self, query: &str) -> String {
        let words: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut additions: Vec<&str> = Vec::new();
        for word in &words {
            let singular = word.strip_suffix('s').unwrap_or(word);
            let terms = self
                .terms_for(word)
                .or_else(|| self.terms_for(singular))
                .unwrap_or_default();

            for term in terms {
                if !words.contains(term) && !additions.contains(&term.as_str()) {
                    additions.push(term);
                }
            }
        }

        if additions.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query.trim(), additions.join(" "))
        }
    }
}
