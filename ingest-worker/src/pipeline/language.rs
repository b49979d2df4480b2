//! Script-based language tagging.
//!
//! Classifies words by Unicode ranges (Hebrew, Arabic, Cyrillic, Latin) and
//! aggregates them into a per-chunk profile. Latin-script words default to
//! English; this is the built-in tagger and any richer model can replace it
//! behind the `LanguageTagger` port.

use std::collections::BTreeMap;

use doc_base::{LanguageProfile, LanguageTagger};

/// Default tagger implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptLanguageTagger;

impl LanguageTagger for ScriptLanguageTagger {
    fn analyze(&self, text: &str) -> LanguageProfile {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        // Appearance order, for the `languages` list.
        let mut order: Vec<&'static str> = Vec::new();

        for word in text.split_whitespace() {
            let clean: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if clean.chars().count() < 2 || clean.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let Some(lang) = classify(&clean) else {
                continue;
            };
            if !order.contains(&lang) {
                order.push(lang);
            }
            *counts.entry(lang).or_insert(0) += 1;
        }

        let total: usize = counts.values().sum();
        if total == 0 {
            return LanguageProfile::unknown();
        }

        let mut distribution = BTreeMap::new();
        for (lang, count) in &counts {
            distribution.insert(lang.to_string(), *count as f64 / total as f64);
        }

        // Highest count wins; ties break lexicographically for determinism.
        let primary = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lang, _)| lang.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        LanguageProfile {
            primary_language: primary,
            is_multilingual: counts.len() > 1,
            languages: order.iter().map(|l| l.to_string()).collect(),
            distribution,
        }
    }
}

/// Script classification by character ranges; Latin falls back to English.
fn classify(word: &str) -> Option<&'static str> {
    if word.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c)) {
        Some("he")
    } else if word.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
        Some("ar")
    } else if word.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c)) {
        Some("ru")
    } else if word.chars().any(|c| c.is_ascii_alphabetic()) {
        Some("en")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monolingual_english() {
        let profile = ScriptLanguageTagger.analyze("Hello world. This is a test.");
        assert_eq!(profile.primary_language, "en");
        assert!(!profile.is_multilingual);
        assert_eq!(profile.languages, vec!["en".to_string()]);
        assert!((profile.distribution["en"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mixed_hebrew_english_chunk() {
        let profile = ScriptLanguageTagger.analyze("שלום my name is דוד and I live in ירושלים");
        assert_eq!(profile.primary_language, "en");
        assert!(profile.is_multilingual);
        assert_eq!(profile.languages, vec!["he".to_string(), "en".to_string()]);
        let sum: f64 = profile.distribution.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn digits_and_short_words_are_neutral() {
        let profile = ScriptLanguageTagger.analyze("42 a 7");
        assert_eq!(profile.primary_language, "unknown");
        assert!(profile.languages.is_empty());
    }
}
