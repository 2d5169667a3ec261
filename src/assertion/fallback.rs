//! Assertions for verbs the relation graph missed.
//!
//! The fallback looks at raw token order around a verb for a theme or a
//! location, but only when the verb or what it finds takes part in the
//! projected graph. Coordination peers inherit assertability from an
//! asserted conjunct.

use std::collections::BTreeSet;

use elementary_assertions_document::{Assertion, Mention, MentionKind, ProjectedRelation, Token};
use tracing::{debug, trace};

use crate::lexical::{self, CoreRole, COORDINATION_LABEL};

use super::draft::{Draft, Rejection};
use super::synthesis::{build_draft, is_make_sure_scaffold, sorted_relations};
use super::{predicate_mentions, BuildContext};

fn graph_tokens<'c>(ctx: &BuildContext<'c>) -> BTreeSet<&'c str> {
    ctx.projection
        .projected()
        .iter()
        .flat_map(|relation| [relation.head_token_id.as_str(), relation.dep_token_id.as_str()])
        .collect()
}

fn overlaps(a: &Mention, b: &Mention) -> bool {
    a.token_ids.iter().any(|id| b.contains_token(id))
}

/// Position of a mention's first token.
fn first_position(ctx: &BuildContext<'_>, mention: &Mention) -> Option<usize> {
    mention
        .token_ids
        .iter()
        .filter_map(|id| ctx.index.position(id))
        .min()
}

fn is_fallback_target(token: &Token) -> bool {
    lexical::is_verb_like(token) || lexical::lower_surface(token) == "complete"
}

/// Noun-headed primary token mentions and MWEs following `after` within
/// `window` tokens, nearest first.
fn following_nominals<'c>(
    ctx: &BuildContext<'c>,
    segment_id: &str,
    after: usize,
    window: usize,
) -> Vec<&'c Mention> {
    let mut found: Vec<(usize, &Mention)> = ctx
        .mentions
        .all()
        .iter()
        .filter(|m| m.segment_id == segment_id)
        .filter(|m| m.kind == MentionKind::Mwe || (m.kind == MentionKind::Token && m.is_primary))
        .filter(|m| {
            m.kind == MentionKind::Mwe
                || ctx.index.get(&m.head_token_id).map_or(false, lexical::is_noun_like)
        })
        .filter_map(|m| {
            let start = first_position(ctx, m)?;
            (start > after && start - after <= window).then_some((start, m))
        })
        .collect();
    found.sort_by(|(a_start, a), (b_start, b)| {
        a_start
            .cmp(b_start)
            .then_with(|| a.token_ids.len().cmp(&b.token_ids.len()))
            .then_with(|| a.id.cmp(&b.id))
    });
    found.into_iter().map(|(_, m)| m).collect()
}

fn fallback_theme<'c>(
    ctx: &BuildContext<'c>,
    predicate: &Mention,
    token: &Token,
    used: &BTreeSet<String>,
) -> Option<&'c Mention> {
    following_nominals(
        ctx,
        &predicate.segment_id,
        token.i,
        ctx.config.fallback_theme_window,
    )
    .into_iter()
    .find(|m| !used.contains(&m.id) && !overlaps(m, predicate))
}

/// Spatial preposition after the verb, then the noun phrase after it.
fn fallback_location<'c>(
    ctx: &BuildContext<'c>,
    predicate: &Mention,
    token: &Token,
    used: &BTreeSet<String>,
) -> Option<&'c Mention> {
    let preposition = ctx
        .index
        .segment_tokens(&token.segment_id)
        .iter()
        .find(|other| {
            other.i > token.i
                && other.i - token.i <= ctx.config.fallback_location_preposition_window
                && lexical::is_spatial_preposition(other)
        })?;
    following_nominals(
        ctx,
        &predicate.segment_id,
        preposition.i,
        ctx.config.fallback_location_np_window,
    )
    .into_iter()
    .find(|m| m.kind == MentionKind::Token && !used.contains(&m.id) && !overlaps(m, predicate))
}

/// Assertions for graph-participating verbs that synthesis never handled.
pub(crate) fn synthesize_fallbacks(
    ctx: &BuildContext<'_>,
    assertions: &[Assertion],
    handled: &BTreeSet<String>,
) -> Vec<Assertion> {
    let graph = graph_tokens(ctx);
    let mut used: BTreeSet<String> = assertions
        .iter()
        .flat_map(|a| a.role_mention_ids().map(str::to_string))
        .collect();
    let asserted: BTreeSet<String> = predicate_mentions(assertions)
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut out = Vec::new();
    for mention in ctx.mentions.primaries() {
        if mention.kind != MentionKind::Token
            || handled.contains(&mention.id)
            || asserted.contains(&mention.id)
        {
            continue;
        }
        let Some(token) = ctx.index.get(&mention.head_token_id) else {
            continue;
        };
        if !is_fallback_target(token)
            || lexical::is_be_form(token)
            || lexical::is_modal(token)
            || lexical::is_gerund(token)
            || is_make_sure_scaffold(ctx, token)
        {
            continue;
        }

        let location = fallback_location(ctx, mention, token, &used);
        let theme = fallback_theme(ctx, mention, token, &used)
            .filter(|theme| location.map_or(true, |location| !overlaps(theme, location)));
        if theme.is_none() && location.is_none() {
            continue;
        }
        let participates = graph.contains(token.id.as_str())
            || theme
                .iter()
                .chain(location.iter())
                .flat_map(|m| m.token_ids.iter())
                .any(|id| graph.contains(id.as_str()));
        if !participates {
            trace!(predicate = %mention.id, "fallback skipped outside relation graph");
            continue;
        }

        let mut draft = Draft::new(mention, token);
        if let Some(theme) = theme {
            draft.push_slot(CoreRole::Theme.as_str(), &theme.id, None);
            used.insert(theme.id.clone());
        }
        if let Some(location) = location {
            draft.push_slot(CoreRole::Location.as_str(), &location.id, None);
            used.insert(location.id.clone());
        }
        trace!(predicate = %mention.id, "fallback assertion");
        out.push(draft.into_assertion(ctx));
    }
    debug!(fallbacks = out.len(), "synthesized fallback assertions");
    out
}

/// Coordination neighbours of `mention_id` in the projected graph.
fn coordination_peers<'c>(ctx: &BuildContext<'c>, mention_id: &str) -> Vec<&'c str> {
    ctx.projection
        .projected()
        .iter()
        .filter(|relation| relation.label == COORDINATION_LABEL)
        .filter_map(|relation| {
            if relation.head_mention_id == mention_id {
                Some(relation.dep_mention_id.as_str())
            } else if relation.dep_mention_id == mention_id {
                Some(relation.head_mention_id.as_str())
            } else {
                None
            }
        })
        .collect()
}

/// Verb conjuncts of an asserted predicate get their own assertion.
pub(crate) fn synthesize_coordination_peers(
    ctx: &BuildContext<'_>,
    assertions: &[Assertion],
) -> Vec<Assertion> {
    let mut asserted: BTreeSet<String> = predicate_mentions(assertions)
        .into_iter()
        .map(str::to_string)
        .collect();
    let graph = graph_tokens(ctx);
    let mut tokens: Vec<&Token> = graph.iter().filter_map(|id| ctx.index.get(id)).collect();
    tokens.sort_by(|a, b| a.i.cmp(&b.i).then_with(|| a.id.cmp(&b.id)));

    let mut out = Vec::new();
    for token in tokens {
        if !lexical::is_verb_like(token) || is_make_sure_scaffold(ctx, token) {
            continue;
        }
        let Some(mention) = ctx.mentions.primary_for_token(&token.id) else {
            continue;
        };
        if asserted.contains(&mention.id) {
            continue;
        }
        let peers = coordination_peers(ctx, &mention.id);
        if !peers.iter().any(|peer| asserted.contains(*peer)) {
            continue;
        }
        let relations: Vec<&ProjectedRelation> = sorted_relations(
            ctx.projection
                .outgoing(&mention.id)
                .filter(|r| r.label != COORDINATION_LABEL && !lexical::is_structural_label(&r.label)),
        );
        let Some(draft) = build_draft(ctx, mention, &relations) else {
            continue;
        };
        if draft.rejection() == Some(Rejection::Empty) {
            continue;
        }
        trace!(predicate = %mention.id, "coordination peer assertion");
        asserted.insert(mention.id.clone());
        out.push(draft.into_assertion(ctx));
    }
    debug!(peers = out.len(), "synthesized coordination peers");
    out
}

#[cfg(test)]
mod tests {
    use crate::config::BuilderConfig;
    use crate::mention::build_mentions;
    use crate::projection::project_relations;
    use crate::tests::fixtures::DocBuilder;
    use crate::token_index::TokenIndex;

    use super::super::synthesis::synthesize;
    use super::*;

    #[test]
    fn test_fallback_finds_theme_and_location() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Workers", "NNS"),
                ("stack", "VBP"),
                ("boxes", "NNS"),
                ("near", "IN"),
                ("the", "DT"),
                ("door", "NN"),
            ])
            .relation("t5", "det", "t4")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index);
        let projection = project_relations(&index, &mentions);
        let config = BuilderConfig::default();
        let ctx = BuildContext {
            index: &index,
            mentions: &mentions,
            projection: &projection,
            config: &config,
        };
        let synthesis = synthesize(&ctx);
        let fallbacks = synthesize_fallbacks(&ctx, &synthesis.assertions, &synthesis.handled);
        assert_eq!(fallbacks.len(), 1);
        let assertion = &fallbacks[0];
        assert_eq!(assertion.predicate.head_token_id, "t1");
        let theme = assertion.role("theme").unwrap();
        assert_eq!(theme.mention_ids, vec!["m:s1:14-19:token"]);
        let location = assertion.role("location").unwrap();
        assert_eq!(location.mention_ids, vec!["m:s1:29-33:token"]);
        assert!(assertion.evidence.relations.is_empty());
    }

    #[test]
    fn test_fallback_needs_graph_participation() {
        let doc = DocBuilder::new()
            .sentence(&[("Workers", "NNS"), ("stack", "VBP"), ("boxes", "NNS")])
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index);
        let projection = project_relations(&index, &mentions);
        let config = BuilderConfig::default();
        let ctx = BuildContext {
            index: &index,
            mentions: &mentions,
            projection: &projection,
            config: &config,
        };
        let fallbacks = synthesize_fallbacks(&ctx, &[], &BTreeSet::new());
        assert!(fallbacks.is_empty());
    }

    #[test]
    fn test_coordination_peer_gets_assertion() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("and", "CC"),
                ("sells", "VBZ"),
                ("carts", "NNS"),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t3", "coordination", "t1")
            .relation("t3", "obj", "t4")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index);
        let projection = project_relations(&index, &mentions);
        let config = BuilderConfig::default();
        let ctx = BuildContext {
            index: &index,
            mentions: &mentions,
            projection: &projection,
            config: &config,
        };
        // only the `builds` assertion exists up front
        let synthesis = synthesize(&ctx);
        let builds: Vec<Assertion> = synthesis
            .assertions
            .into_iter()
            .filter(|a| a.predicate.head_token_id == "t1")
            .collect();
        assert_eq!(builds.len(), 1);

        let peers = synthesize_coordination_peers(&ctx, &builds);
        assert_eq!(peers.len(), 1);
        let sells = &peers[0];
        assert_eq!(sells.predicate.head_token_id, "t3");
        assert_eq!(sells.role("theme").unwrap().mention_ids, vec!["m:s1:23-28:token"]);
        assert!(!sells.has_operator("coordination_group"));
    }
}
