//! Wikipedia-title evidence aggregation.
//!
//! Purely additive: nothing here feeds back into mentions or assertions.

use std::collections::BTreeMap;

use elementary_assertions_document::{
    utf16_slice, Assertion, Mention, WikiMentionMatch, WikiNormalization, WikiPredicateMatch,
    WikiTitleEvidence,
};

use crate::token_index::TokenIndex;

/// Lowercased surface with whitespace runs collapsed to one space.
pub fn normalize_surface(surface: &str) -> String {
    surface
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn mention_match(index: &TokenIndex<'_>, mention: &Mention) -> Option<WikiMentionMatch> {
    let evidence = &mention.provenance.lexicon_evidence.as_ref()?.wikipedia_title_index;
    let mut signal_token_ids: Vec<String> = evidence
        .token_signals
        .iter()
        .filter(|signal| signal.signals.is_positive())
        .map(|signal| signal.token_id.clone())
        .collect();
    signal_token_ids.sort();
    signal_token_ids.dedup();

    let mwe_exact = evidence
        .mwe_signals
        .as_ref()
        .and_then(|signals| signals.get("wiki_exact_match"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if signal_token_ids.is_empty() && evidence.mwe_signals.is_none() {
        return None;
    }
    let exact_match = mwe_exact
        || (mention.token_ids.len() == 1
            && evidence.token_signals.iter().any(|signal| signal.signals.is_exact()));

    let surface = utf16_slice(&index.document().canonical_text, mention.span).unwrap_or_default();
    Some(WikiMentionMatch {
        mention_id: mention.id.clone(),
        normalized_surface: normalize_surface(&surface),
        token_ids: mention.token_ids.clone(),
        signal_token_ids,
        exact_match,
    })
}

pub(crate) fn build_wiki_evidence(
    index: &TokenIndex<'_>,
    mentions: &[Mention],
    assertions: &[Assertion],
) -> WikiTitleEvidence {
    let matches: BTreeMap<String, WikiMentionMatch> = mentions
        .iter()
        .filter_map(|mention| mention_match(index, mention))
        .map(|m| (m.mention_id.clone(), m))
        .collect();

    let mut assertion_predicate_matches: Vec<WikiPredicateMatch> = assertions
        .iter()
        .filter_map(|assertion| {
            let found = matches.get(&assertion.predicate.mention_id)?;
            Some(WikiPredicateMatch {
                assertion_id: assertion.id.clone(),
                predicate_mention_id: found.mention_id.clone(),
                normalized_surface: found.normalized_surface.clone(),
                exact_match: found.exact_match,
            })
        })
        .collect();
    assertion_predicate_matches.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));

    WikiTitleEvidence {
        normalization: WikiNormalization::default(),
        mention_matches: matches.into_values().collect(),
        assertion_predicate_matches,
    }
}

#[cfg(test)]
mod tests {
    use crate::mention::build_mentions;
    use crate::tests::fixtures::DocBuilder;

    use super::*;

    #[test]
    fn test_normalize_surface() {
        assert_eq!(normalize_surface("  New\tYork  City "), "new york city");
    }

    #[test]
    fn test_mention_matches_follow_signals() {
        let doc = DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("builds", "VBZ"), ("carts", "NNS")])
            .wiki_exact("t0")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index).into_vec();
        let evidence = build_wiki_evidence(&index, &mentions, &[]);
        assert_eq!(evidence.mention_matches.len(), 1);
        let found = &evidence.mention_matches[0];
        assert_eq!(found.mention_id, "m:s1:0-5:token");
        assert_eq!(found.normalized_surface, "alpha");
        assert_eq!(found.signal_token_ids, vec!["t0"]);
        assert!(found.exact_match);
        assert_eq!(evidence.normalization.case, "lowercase");
    }
}
