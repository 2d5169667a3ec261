//! Mention building: resolves MWE, chunk and token candidates into a
//! conflict-free primary partition per segment.
//!
//! Every token ends up in exactly one primary mention. Tokens absorbed into
//! a winning MWE stay addressable through a non-primary shadow mention, and
//! losing MWEs and chunks are kept as non-primary mentions over the same
//! tokens.
//!
//! | source          | kind    | priority | primary |
//! |-----------------|---------|----------|---------|
//! | winning MWE     | `mwe`   | 0        | yes     |
//! | token fallback  | `token` | 1        | yes     |
//! | alternative MWE | `mwe`   | 2        | no      |
//! | chunk           | `chunk` | 3        | no      |
//! | token shadow    | `token` | 4        | no      |

mod choose;
mod head;

use std::collections::{HashMap, HashSet};

use elementary_assertions_document::{
    Annotation, AnnotationKind, Mention, MentionKind, MentionLexiconEvidence, MentionProvenance,
    MentionSource, Span, Token, TokenWikiSignal, WikiMentionEvidence,
};
use tracing::{debug, trace};

use crate::token_index::TokenIndex;

pub use choose::{
    choose_best_mention_for_token, compare_mention_priority, Exclusion, MentionPreference,
};
use head::HeadEvidence;

/// All mentions of a document with token lookups.
#[derive(Debug, Clone, Default)]
pub struct MentionSet {
    mentions: Vec<Mention>,
    by_id: HashMap<String, usize>,
    by_token: HashMap<String, Vec<usize>>,
}

impl MentionSet {
    fn from_sorted(mentions: Vec<Mention>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_token: HashMap<String, Vec<usize>> = HashMap::new();
        for (ix, mention) in mentions.iter().enumerate() {
            by_id.insert(mention.id.clone(), ix);
            for token_id in &mention.token_ids {
                by_token.entry(token_id.clone()).or_default().push(ix);
            }
        }
        Self {
            mentions,
            by_id,
            by_token,
        }
    }

    /// Mentions in `(segment_id, span.start, span.end, kind, id)` order.
    pub fn all(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn get(&self, id: &str) -> Option<&Mention> {
        self.by_id.get(id).map(|&ix| &self.mentions[ix])
    }

    /// Every mention containing `token_id`.
    pub fn covering<'s>(&'s self, token_id: &str) -> impl Iterator<Item = &'s Mention> + 's {
        self.by_token
            .get(token_id)
            .into_iter()
            .flatten()
            .map(move |&ix| &self.mentions[ix])
    }

    pub fn primary_for_token(&self, token_id: &str) -> Option<&Mention> {
        self.covering(token_id).find(|mention| mention.is_primary)
    }

    pub fn primaries(&self) -> impl Iterator<Item = &Mention> {
        self.mentions.iter().filter(|mention| mention.is_primary)
    }

    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    pub fn into_vec(self) -> Vec<Mention> {
        self.mentions
    }
}

/// Tokens an annotation's selectors point at, in sequence order.
///
/// A `TokenSelector` wins over a `TextPositionSelector`. Returns `None` when
/// the selector names an unknown token or selects nothing.
pub fn selector_tokens<'a>(annotation: &Annotation, index: &TokenIndex<'a>) -> Option<Vec<&'a Token>> {
    let mut tokens: Vec<&Token> = if let Some(ids) = annotation.selector_token_ids() {
        let mut seen = HashSet::new();
        let mut tokens = Vec::with_capacity(ids.len());
        for id in ids {
            let token = index.get(id)?;
            if seen.insert(id.as_str()) {
                tokens.push(token);
            }
        }
        tokens
    } else if let Some(span) = annotation.selector_span() {
        index
            .tokens()
            .iter()
            .copied()
            .filter(|token| span.contains(&token.span))
            .collect()
    } else {
        return None;
    };
    if tokens.is_empty() {
        return None;
    }
    tokens.sort_by(|a, b| a.i.cmp(&b.i).then_with(|| a.id.cmp(&b.id)));
    Some(tokens)
}

/// Like [`selector_tokens`], additionally requiring a single segment.
fn candidate_tokens<'a>(annotation: &Annotation, index: &TokenIndex<'a>) -> Option<Vec<&'a Token>> {
    let tokens = selector_tokens(annotation, index)?;
    let segment = &tokens[0].segment_id;
    if tokens.iter().any(|token| &token.segment_id != segment) {
        return None;
    }
    Some(tokens)
}

fn tokens_span(tokens: &[&Token]) -> Span {
    tokens
        .iter()
        .fold(tokens[0].span, |span, token| span.union(&token.span))
}

struct Candidate<'a> {
    kind: MentionKind,
    priority: u8,
    is_primary: bool,
    source_kind: MentionSource,
    tokens: Vec<&'a Token>,
    annotation: Option<&'a Annotation>,
}

impl Candidate<'_> {
    fn span(&self) -> Span {
        tokens_span(&self.tokens)
    }

    fn token_ids(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.id.clone()).collect()
    }
}

fn lexicon_evidence(candidate: &Candidate<'_>) -> Option<MentionLexiconEvidence> {
    let token_signals: Vec<TokenWikiSignal> = candidate
        .tokens
        .iter()
        .filter_map(|token| {
            token.wiki_signals().map(|signals| TokenWikiSignal {
                token_id: token.id.clone(),
                signals: signals.clone(),
            })
        })
        .collect();
    let mwe_signals = candidate
        .annotation
        .filter(|annotation| annotation.kind == AnnotationKind::Mwe)
        .and_then(|annotation| annotation.source_evidence("wikipedia-title-index"))
        .filter(|evidence| !evidence.is_null())
        .cloned();
    if token_signals.is_empty() && mwe_signals.is_none() {
        return None;
    }
    Some(MentionLexiconEvidence {
        wikipedia_title_index: WikiMentionEvidence {
            token_signals,
            mwe_signals,
        },
    })
}

/// Builds every mention of the document.
pub fn build_mentions(index: &TokenIndex<'_>) -> MentionSet {
    let doc = index.document();
    let accepted: Vec<&Annotation> = doc.annotations.iter().filter(|a| a.is_accepted()).collect();
    let heads = HeadEvidence::collect(&doc.annotations);

    // MWE candidates, biggest first
    let mut mwes: Vec<(Vec<&Token>, &Annotation)> = Vec::new();
    for annotation in accepted.iter().copied().filter(|a| a.kind == AnnotationKind::Mwe) {
        match candidate_tokens(annotation, index) {
            Some(tokens) => mwes.push((tokens, annotation)),
            None => trace!(annotation = %annotation.id, "dropping unresolvable mwe candidate"),
        }
    }
    mwes.sort_by(|(a_tokens, a), (b_tokens, b)| {
        let (a_span, b_span) = (tokens_span(a_tokens), tokens_span(b_tokens));
        b_tokens
            .len()
            .cmp(&a_tokens.len())
            .then_with(|| b_span.len().cmp(&a_span.len()))
            .then_with(|| a_span.start.cmp(&b_span.start))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut claimed: HashSet<String> = HashSet::new();
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for (tokens, annotation) in mwes {
        let wins = tokens.iter().all(|token| !claimed.contains(token.id.as_str()));
        if wins {
            claimed.extend(tokens.iter().map(|token| token.id.clone()));
        }
        candidates.push(Candidate {
            kind: MentionKind::Mwe,
            priority: if wins { 0 } else { 2 },
            is_primary: wins,
            source_kind: if wins {
                MentionSource::Mwe
            } else {
                MentionSource::MweAlternative
            },
            tokens,
            annotation: Some(annotation),
        });
    }

    for token in index.tokens() {
        let absorbed = claimed.contains(token.id.as_str());
        candidates.push(Candidate {
            kind: MentionKind::Token,
            priority: if absorbed { 4 } else { 1 },
            is_primary: !absorbed,
            source_kind: if absorbed {
                MentionSource::TokenShadow
            } else {
                MentionSource::TokenFallback
            },
            tokens: vec![*token],
            annotation: None,
        });
    }

    for annotation in accepted.iter().copied().filter(|a| a.kind == AnnotationKind::Chunk) {
        match candidate_tokens(annotation, index) {
            Some(tokens) => candidates.push(Candidate {
                kind: MentionKind::Chunk,
                priority: 3,
                is_primary: false,
                source_kind: MentionSource::Chunk,
                tokens,
                annotation: Some(annotation),
            }),
            None => trace!(annotation = %annotation.id, "dropping unresolvable chunk candidate"),
        }
    }

    let mut mentions: Vec<Mention> = candidates
        .iter()
        .map(|candidate| {
            let (head_token_id, head_strategy) =
                heads.resolve(&candidate.tokens, candidate.annotation);
            Mention {
                id: String::new(),
                kind: candidate.kind,
                priority: candidate.priority,
                token_ids: candidate.token_ids(),
                head_token_id,
                span: candidate.span(),
                segment_id: candidate.tokens[0].segment_id.clone(),
                is_primary: candidate.is_primary,
                provenance: MentionProvenance {
                    source_kind: candidate.source_kind,
                    source_annotation_id: candidate.annotation.map(|a| a.id.clone()),
                    head_strategy,
                    lexicon_evidence: lexicon_evidence(candidate),
                },
            }
        })
        .collect();

    assign_mention_ids(&mut mentions);
    debug!(
        mentions = mentions.len(),
        primary = mentions.iter().filter(|m| m.is_primary).count(),
        "built mentions"
    );
    MentionSet::from_sorted(mentions)
}

/// Sorts mentions and gives each a `m:<segment>:<start>-<end>:<kind>` id,
/// suffixing `:2`, `:3`, ... on collision.
fn assign_mention_ids(mentions: &mut [Mention]) {
    mentions.sort_by(|a, b| {
        a.segment_id
            .cmp(&b.segment_id)
            .then_with(|| a.span.cmp(&b.span))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| a.token_ids.cmp(&b.token_ids))
            .then_with(|| {
                a.provenance
                    .source_annotation_id
                    .cmp(&b.provenance.source_annotation_id)
            })
    });
    let mut seen: HashMap<String, usize> = HashMap::new();
    for mention in mentions.iter_mut() {
        let base = format!(
            "m:{}:{}-{}:{}",
            mention.segment_id,
            mention.span.start,
            mention.span.end,
            mention.kind.as_str()
        );
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        mention.id = if *count == 1 {
            base
        } else {
            format!("{base}:{count}")
        };
    }
}
