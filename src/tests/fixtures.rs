//! Builders for small relations documents used throughout the tests.

use elementary_assertions_document::{
    Anchor, Annotation, AnnotationKind, AnnotationSource, AnnotationStatus, PartOfSpeech,
    RelationsDocument, Segment, Selector, Span, Token, TokenLexicon, TokenRange, TokenRef,
    WikiSignals,
};
use serde_json::{json, Value};

use crate::assertion::{build_assertions, AssertionSet, BuildContext};
use crate::config::BuilderConfig;
use crate::mention::build_mentions;
use crate::projection::project_relations;
use crate::token_index::TokenIndex;

/// Assembles a relations document sentence by sentence.
///
/// Tokens are numbered `t0, t1, ...` across the whole document and segments
/// `s1, s2, ...`. Relations are `r1, r2, ...`, MWEs `mwe1, ...` and chunks
/// `c1, ...` in the order they are added.
#[derive(Debug, Default)]
pub struct DocBuilder {
    text: String,
    segments: Vec<Segment>,
    tokens: Vec<Token>,
    annotations: Vec<Annotation>,
    relation_count: usize,
    mwe_count: usize,
    chunk_count: usize,
}

fn hugs_previous(surface: &str) -> bool {
    surface.chars().all(|c| c.is_ascii_punctuation()) && !matches!(surface, "(" | "\"" | "``")
}

fn utf16(text: &str) -> usize {
    text.encode_utf16().count()
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment made of `(surface, tag)` pairs.
    pub fn sentence(mut self, words: &[(&str, &str)]) -> Self {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        let segment_start = utf16(&self.text);
        let first_i = self.tokens.len();
        for (n, (surface, tag)) in words.iter().enumerate() {
            if n > 0 && !hugs_previous(surface) {
                self.text.push(' ');
            }
            let start = utf16(&self.text);
            self.text.push_str(surface);
            let i = self.tokens.len();
            self.tokens.push(Token {
                id: format!("t{i}"),
                i,
                segment_id: format!("s{}", self.segments.len() + 1),
                span: Span::new(start, utf16(&self.text)),
                surface: surface.to_string(),
                pos: PartOfSpeech {
                    tag: tag.to_string(),
                    coarse: None,
                },
                lexicon: None,
            });
        }
        self.segments.push(Segment {
            id: format!("s{}", self.segments.len() + 1),
            span: Span::new(segment_start, utf16(&self.text)),
            token_range: TokenRange {
                start: first_i,
                end: self.tokens.len(),
            },
        });
        self
    }

    /// Accepted dependency `head --label--> dep` with empty evidence.
    pub fn relation(self, head: &str, label: &str, dep: &str) -> Self {
        self.relation_with(head, label, dep, json!({}))
    }

    pub fn relation_with(mut self, head: &str, label: &str, dep: &str, evidence: Value) -> Self {
        self.relation_count += 1;
        self.annotations.push(Annotation {
            id: format!("r{}", self.relation_count),
            kind: AnnotationKind::Dependency,
            status: AnnotationStatus::Accepted,
            anchor: token_anchor(&[head, dep]),
            sources: vec![AnnotationSource {
                name: "relation-extraction".to_string(),
                kind: None,
                evidence,
            }],
            label: Some(label.to_string()),
            head: Some(TokenRef {
                id: head.to_string(),
            }),
            dep: Some(TokenRef {
                id: dep.to_string(),
            }),
            chunk_id: None,
        });
        self
    }

    /// Accepted MWE over the given token ids.
    pub fn mwe(self, token_ids: &[&str]) -> Self {
        self.mwe_with_sources(token_ids, Vec::new())
    }

    /// Accepted MWE whose materialization names an explicit head token.
    pub fn mwe_with_head(self, token_ids: &[&str], head: &str) -> Self {
        let source = AnnotationSource {
            name: "mwe-materialization".to_string(),
            kind: None,
            evidence: json!({ "head_token_id": head }),
        };
        self.mwe_with_sources(token_ids, vec![source])
    }

    pub fn mwe_with_sources(mut self, token_ids: &[&str], sources: Vec<AnnotationSource>) -> Self {
        self.mwe_count += 1;
        self.annotations.push(Annotation {
            id: format!("mwe{}", self.mwe_count),
            kind: AnnotationKind::Mwe,
            status: AnnotationStatus::Accepted,
            anchor: token_anchor(token_ids),
            sources,
            label: None,
            head: None,
            dep: None,
            chunk_id: None,
        });
        self
    }

    pub fn chunk(mut self, token_ids: &[&str]) -> Self {
        self.chunk_count += 1;
        self.annotations.push(Annotation {
            id: format!("c{}", self.chunk_count),
            kind: AnnotationKind::Chunk,
            status: AnnotationStatus::Accepted,
            anchor: token_anchor(token_ids),
            sources: Vec::new(),
            label: None,
            head: None,
            dep: None,
            chunk_id: None,
        });
        self
    }

    pub fn chunk_head(mut self, chunk_id: &str, head: &str) -> Self {
        self.annotations.push(Annotation {
            id: format!("{chunk_id}-head"),
            kind: AnnotationKind::ChunkHead,
            status: AnnotationStatus::Accepted,
            anchor: token_anchor(&[head]),
            sources: Vec::new(),
            label: None,
            head: Some(TokenRef {
                id: head.to_string(),
            }),
            dep: None,
            chunk_id: Some(chunk_id.to_string()),
        });
        self
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn wiki(mut self, token_id: &str, signals: WikiSignals) -> Self {
        if let Some(token) = self.tokens.iter_mut().find(|t| t.id == token_id) {
            token.lexicon = Some(TokenLexicon {
                wikipedia_title_index: Some(signals),
            });
        }
        self
    }

    /// Marks a token as an exact wikipedia title match.
    pub fn wiki_exact(self, token_id: &str) -> Self {
        self.wiki(
            token_id,
            WikiSignals {
                wiki_any_signal: Some(true),
                wiki_exact_match: Some(true),
                ..Default::default()
            },
        )
    }

    pub fn build(self) -> RelationsDocument {
        RelationsDocument {
            seed_id: Some("seed-1".to_string()),
            stage: Some("relations_extracted".to_string()),
            canonical_text: self.text,
            segments: self.segments,
            tokens: self.tokens,
            annotations: self.annotations,
        }
    }
}

/// Runs `f` against a build context over `doc` with default heuristics.
pub(crate) fn with_context<T>(doc: &RelationsDocument, f: impl FnOnce(&BuildContext<'_>) -> T) -> T {
    let index = TokenIndex::new(doc).unwrap();
    let mentions = build_mentions(&index);
    let projection = project_relations(&index, &mentions);
    let config = BuilderConfig::default();
    let ctx = BuildContext {
        index: &index,
        mentions: &mentions,
        projection: &projection,
        config: &config,
    };
    f(&ctx)
}

/// Every assertion phase over `doc`, without diagnostics or validation.
pub(crate) fn assertion_set(doc: &RelationsDocument) -> AssertionSet {
    with_context(doc, build_assertions)
}

fn token_anchor(token_ids: &[&str]) -> Anchor {
    Anchor {
        selectors: vec![Selector::TokenSelector {
            token_ids: token_ids.iter().map(|id| id.to_string()).collect(),
        }],
    }
}

#[test]
fn test_builder_spans_follow_text() {
    let doc = DocBuilder::new()
        .sentence(&[("Alpha", "NNP"), ("builds", "VBZ"), ("carts", "NNS"), (".", ".")])
        .sentence(&[("Beta", "NNP"), ("waits", "VBZ"), (".", ".")])
        .build();
    assert_eq!(doc.canonical_text, "Alpha builds carts. Beta waits.");
    assert_eq!(doc.tokens[3].span, Span::new(18, 19));
    assert_eq!(doc.tokens[4].segment_id, "s2");
    assert_eq!(doc.tokens[4].span, Span::new(20, 24));
    assert_eq!(doc.segments[1].token_range, TokenRange { start: 4, end: 7 });
}
