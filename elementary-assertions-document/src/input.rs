//! The relations document produced by the upstream enrichment pipeline.
//!
//! This is an opaque input contract: the types mirror the JSON shape and do
//! not interpret anything beyond what serde needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Span, TokenRange};

/// Top-level upstream document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub canonical_text: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A sentence-like unit of the canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub span: Span,
    pub token_range: TokenRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartOfSpeech {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coarse: Option<String>,
}

/// An upstream token. Immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub i: usize,
    pub segment_id: String,
    pub span: Span,
    pub surface: String,
    pub pos: PartOfSpeech,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon: Option<TokenLexicon>,
}

impl Token {
    pub fn tag(&self) -> &str {
        &self.pos.tag
    }

    pub fn coarse(&self) -> Option<&str> {
        self.pos.coarse.as_deref()
    }

    /// WTI payload attached upstream, if any.
    pub fn wiki_signals(&self) -> Option<&WikiSignals> {
        self.lexicon
            .as_ref()
            .and_then(|lexicon| lexicon.wikipedia_title_index.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenLexicon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_title_index: Option<WikiSignals>,
}

/// Evidence from the wikipedia-title-index service for one token.
///
/// Carried through verbatim; unknown keys land in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WikiSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_any_signal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_exact_match: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_prefix_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_parenthetical_variant_count: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WikiSignals {
    /// True when the payload reports at least one positive lookup signal.
    pub fn is_positive(&self) -> bool {
        self.wiki_any_signal == Some(true)
            || self.wiki_exact_match == Some(true)
            || self.wiki_prefix_count.map_or(false, |n| n > 0)
            || self.wiki_parenthetical_variant_count.map_or(false, |n| n > 0)
    }

    pub fn is_exact(&self) -> bool {
        self.wiki_exact_match == Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Mwe,
    Chunk,
    ChunkHead,
    Dependency,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    Accepted,
    Observation,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub id: String,
}

/// How an annotation points into the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selector {
    TokenSelector {
        token_ids: Vec<String>,
    },
    TextPositionSelector {
        span: Span,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub evidence: Value,
}

/// A single upstream annotation (MWE, chunk, chunk head or dependency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub kind: AnnotationKind,
    pub status: AnnotationStatus,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub sources: Vec<AnnotationSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<TokenRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep: Option<TokenRef>,
    /// For `chunk_head`: the chunk annotation this head belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

impl Annotation {
    pub fn is_accepted(&self) -> bool {
        self.status == AnnotationStatus::Accepted
    }

    /// Token ids named by a `TokenSelector`, if the anchor has one.
    pub fn selector_token_ids(&self) -> Option<&[String]> {
        self.anchor.selectors.iter().find_map(|selector| match selector {
            Selector::TokenSelector { token_ids } => Some(token_ids.as_slice()),
            _ => None,
        })
    }

    /// Span named by a `TextPositionSelector`, if the anchor has one.
    pub fn selector_span(&self) -> Option<Span> {
        self.anchor.selectors.iter().find_map(|selector| match selector {
            Selector::TextPositionSelector { span } => Some(*span),
            _ => None,
        })
    }

    /// Evidence of the first source named `name`.
    pub fn source_evidence(&self, name: &str) -> Option<&Value> {
        self.sources
            .iter()
            .find(|source| source.name == name)
            .map(|source| &source.evidence)
    }

    /// First non-null source evidence, or an empty object.
    pub fn primary_evidence(&self) -> Value {
        self.sources
            .iter()
            .map(|source| &source.evidence)
            .find(|evidence| !evidence.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}
