//! Validated lookup tables over the upstream tokens.
//!
//! Building a [`TokenIndex`] is where malformed upstream input is rejected:
//! every later stage assumes the tokens and segments are consistent.

use std::collections::{BTreeMap, HashMap};

use elementary_assertions_document::{utf16_len, RelationsDocument, Segment, Token};

use crate::error::{Error, Result};
use crate::lexical;

/// Token and segment lookups for one relations document.
#[derive(Debug)]
pub struct TokenIndex<'a> {
    doc: &'a RelationsDocument,
    by_id: HashMap<&'a str, &'a Token>,
    /// Tokens ordered by sequence index.
    ordered: Vec<&'a Token>,
    by_segment: BTreeMap<&'a str, Vec<&'a Token>>,
    segments: HashMap<&'a str, &'a Segment>,
}

impl<'a> TokenIndex<'a> {
    pub fn new(doc: &'a RelationsDocument) -> Result<Self> {
        if doc.segments.is_empty() {
            return Err(Error::precondition("relations document has no segments"));
        }
        if doc.tokens.is_empty() {
            return Err(Error::precondition("relations document has no tokens"));
        }

        let mut segments = HashMap::new();
        for segment in &doc.segments {
            if segments.insert(segment.id.as_str(), segment).is_some() {
                return Err(Error::precondition(format!(
                    "duplicate segment id {}",
                    segment.id
                )));
            }
        }

        let text_len = utf16_len(&doc.canonical_text);
        let mut by_id = HashMap::new();
        let mut by_segment: BTreeMap<&str, Vec<&Token>> = BTreeMap::new();
        for token in &doc.tokens {
            if by_id.insert(token.id.as_str(), token).is_some() {
                return Err(Error::precondition(format!("duplicate token id {}", token.id)));
            }
            let segment = segments.get(token.segment_id.as_str()).ok_or_else(|| {
                Error::precondition(format!(
                    "token {} references unknown segment {}",
                    token.id, token.segment_id
                ))
            })?;
            if token.span.start > token.span.end || token.span.end > text_len {
                return Err(Error::precondition(format!(
                    "token {} span {}..{} lies outside canonical_text ({} code units)",
                    token.id, token.span.start, token.span.end, text_len
                )));
            }
            if !segment.token_range.contains(token.i) {
                return Err(Error::precondition(format!(
                    "token {} (i={}) is outside the token range of segment {}",
                    token.id, token.i, segment.id
                )));
            }
            by_segment
                .entry(token.segment_id.as_str())
                .or_default()
                .push(token);
        }

        let mut ordered: Vec<&Token> = doc.tokens.iter().collect();
        ordered.sort_by(|a, b| a.i.cmp(&b.i).then_with(|| a.id.cmp(&b.id)));
        for tokens in by_segment.values_mut() {
            tokens.sort_by(|a, b| a.i.cmp(&b.i).then_with(|| a.id.cmp(&b.id)));
        }

        Ok(Self {
            doc,
            by_id,
            ordered,
            by_segment,
            segments,
        })
    }

    pub fn document(&self) -> &'a RelationsDocument {
        self.doc
    }

    pub fn get(&self, token_id: &str) -> Option<&'a Token> {
        self.by_id.get(token_id).copied()
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.by_id.contains_key(token_id)
    }

    pub fn segment(&self, segment_id: &str) -> Option<&'a Segment> {
        self.segments.get(segment_id).copied()
    }

    /// All tokens in sequence order.
    pub fn tokens(&self) -> &[&'a Token] {
        &self.ordered
    }

    /// Tokens of one segment in sequence order.
    pub fn segment_tokens(&self, segment_id: &str) -> &[&'a Token] {
        self.by_segment
            .get(segment_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sequence index of a token, if known.
    pub fn position(&self, token_id: &str) -> Option<usize> {
        self.get(token_id).map(|token| token.i)
    }

    /// Token distance between two tokens; unknown tokens are infinitely far.
    pub fn distance(&self, a: &str, b: &str) -> usize {
        match (self.position(a), self.position(b)) {
            (Some(a), Some(b)) => a.abs_diff(b),
            _ => usize::MAX,
        }
    }

    /// Token ids of the clause around `token_id`: the run of segment tokens
    /// not separated from it by clause punctuation.
    pub fn clause_window(&self, token_id: &str) -> Vec<&'a str> {
        let Some(token) = self.get(token_id) else {
            return Vec::new();
        };
        let tokens = self.segment_tokens(&token.segment_id);
        let Some(at) = tokens.iter().position(|candidate| candidate.id == token.id) else {
            return Vec::new();
        };

        let mut start = at;
        while start > 0 && !lexical::is_clause_boundary(tokens[start - 1]) {
            start -= 1;
        }
        let mut end = at + 1;
        while end < tokens.len() && !lexical::is_clause_boundary(tokens[end]) {
            end += 1;
        }
        tokens[start..end].iter().map(|t| t.id.as_str()).collect()
    }

    /// Number of tokens carrying a positive wikipedia-title-index signal.
    pub fn positive_wiki_signal_count(&self) -> usize {
        self.ordered
            .iter()
            .filter(|token| token.wiki_signals().map_or(false, |s| s.is_positive()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::fixtures::DocBuilder;

    use super::*;

    #[test]
    fn test_index_orders_tokens_and_windows_clauses() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("stays", "VBZ"),
                (",", ","),
                ("Beta", "NNP"),
                ("leaves", "VBZ"),
                (".", "."),
            ])
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        assert_eq!(index.tokens().len(), 6);
        assert_eq!(index.segment_tokens("s1").len(), 6);
        assert_eq!(index.distance("t0", "t4"), 4);
        assert_eq!(index.clause_window("t1"), vec!["t0", "t1"]);
        assert_eq!(index.clause_window("t4"), vec!["t3", "t4"]);
    }

    #[test]
    fn test_rejects_duplicate_token_ids() {
        let mut doc = DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("builds", "VBZ")])
            .build();
        doc.tokens[1].id = "t0".to_string();
        let err = TokenIndex::new(&doc).unwrap_err();
        assert_eq!(err.code(), "EA_PRECONDITION");
        assert!(err.to_string().contains("duplicate token id t0"));
    }

    #[test]
    fn test_rejects_empty_documents() {
        let mut doc = DocBuilder::new().sentence(&[("Alpha", "NNP")]).build();
        doc.tokens.clear();
        assert!(TokenIndex::new(&doc)
            .unwrap_err()
            .to_string()
            .contains("no tokens"));
    }

    #[test]
    fn test_rejects_span_past_text() {
        let mut doc = DocBuilder::new().sentence(&[("Alpha", "NNP")]).build();
        doc.tokens[0].span.end = 99;
        assert!(TokenIndex::new(&doc)
            .unwrap_err()
            .to_string()
            .contains("outside canonical_text"));
    }

    #[test]
    fn test_counts_positive_wiki_signals() {
        let doc = DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("builds", "VBZ")])
            .wiki_exact("t0")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        assert_eq!(index.positive_wiki_signal_count(), 1);
    }
}
