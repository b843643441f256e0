use handbook_core::types::Category;
use handbook_text::expand::DEFAULT_SYNONYMS;
use handbook_text::{clean_text, Categorizer, QueryExpander};
use proptest::prelude::*;

fn table_keys() -> Vec<&'static str> { DEFAULT_SYNONYMS.iter().map(|(k, _)| *k).collect() }

proptest! {
    #[test]
    fn expansion_keeps_query_as_prefix(s in ".{0,80}") {
        let e = QueryExpander::default();
        let out = e.expand(&s);
        prop_assert!(out.starts_with(&s));
        prop_assert_eq!(out, e.expand(&s));
    }

    #[test]
    fn expansion_contains_every_synonym_of_present_keys(
        keys in prop::sample::subsequence(table_keys(), 0..5),
        upper in any::<bool>(),
    ) {
        let query = keys.iter().map(|k| if upper { k.to_uppercase() } else { k.to_string() }).collect::<Vec<_>>().join(" ");
        let out = QueryExpander::default().expand(&query);
        let added: Vec<&str> = out[query.len()..].split_whitespace().collect();
        for key in &keys {
            let (_, syns) = DEFAULT_SYNONYMS.iter().find(|(k, _)| k == key).expect("key in table");
            for syn in syns.iter() {
                prop_assert!(added.contains(syn), "{} missing from {}", syn, out);
            }
        }
    }

    #[test]
    fn categorization_is_total_and_deterministic(s in "(?s).{0,200}") {
        let c = Categorizer::default();
        let first = c.categorize(&s);
        prop_assert!(Category::ALL.contains(&first));
        prop_assert_eq!(first, c.categorize(&s));
    }

    #[test]
    fn cleaned_text_uses_allowed_alphabet(s in "(?s).{0,120}") {
        let out = clean_text(&s);
        prop_assert_eq!(out.trim(), out.as_str());
        let allowed_punct = " -+*/()[]{}.:;,";
        prop_assert!(out.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || allowed_punct.contains(ch)));
        let mut run = 0;
        for ch in out.chars() {
            run = if ch.is_ascii_digit() { run + 1 } else { 0 };
            prop_assert!(run < 4);
        }
    }
}
