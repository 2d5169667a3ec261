//! The one mention tie-break shared by projection and assertion building.

use std::cmp::Ordering;

use elementary_assertions_document::{Mention, MentionKind};

/// Which ordering to apply among the mentions covering a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionPreference {
    /// Primary first, then kind rank (token < mwe < chunk), then segment and
    /// span order, then id. Used to project relation endpoints.
    Projection,
    /// Widest mention first, then lower priority value, then mentions with
    /// lexicon evidence, then id. Used for assertion dependents.
    Dependent,
}

/// Mentions a caller refuses to receive.
#[derive(Debug, Clone, Copy)]
pub enum Exclusion<'a> {
    None,
    /// Reject any mention sharing a token with these.
    Overlapping(&'a [String]),
    /// Reject mentions whose tokens all lie inside these.
    ContainedIn(&'a [String]),
}

impl Exclusion<'_> {
    fn rejects(&self, mention: &Mention) -> bool {
        match self {
            Exclusion::None => false,
            Exclusion::Overlapping(tokens) => mention.token_ids.iter().any(|t| tokens.contains(t)),
            Exclusion::ContainedIn(tokens) => {
                mention.token_ids.iter().all(|t| tokens.contains(t))
            }
        }
    }
}

fn kind_rank(kind: MentionKind) -> u8 {
    match kind {
        MentionKind::Token => 0,
        MentionKind::Mwe => 1,
        MentionKind::Chunk => 2,
    }
}

/// Total order over candidate mentions under `preference`; smaller is better.
pub fn compare_mention_priority(a: &Mention, b: &Mention, preference: MentionPreference) -> Ordering {
    match preference {
        MentionPreference::Projection => b
            .is_primary
            .cmp(&a.is_primary)
            .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
            .then_with(|| a.segment_id.cmp(&b.segment_id))
            .then_with(|| a.span.cmp(&b.span))
            .then_with(|| a.id.cmp(&b.id)),
        MentionPreference::Dependent => b
            .token_ids
            .len()
            .cmp(&a.token_ids.len())
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| b.has_lexicon_evidence().cmp(&a.has_lexicon_evidence()))
            .then_with(|| a.id.cmp(&b.id)),
    }
}

/// Best mention covering `token_id` in `segment_id`, or `None`.
pub fn choose_best_mention_for_token<'m>(
    token_id: &str,
    segment_id: &str,
    candidates: impl IntoIterator<Item = &'m Mention>,
    preference: MentionPreference,
    exclusion: Exclusion<'_>,
) -> Option<&'m Mention> {
    candidates
        .into_iter()
        .filter(|mention| mention.segment_id == segment_id && mention.contains_token(token_id))
        .filter(|mention| !exclusion.rejects(mention))
        .min_by(|a, b| compare_mention_priority(a, b, preference))
}
