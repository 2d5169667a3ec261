//! Moves bare modality assertions onto the lexical verb they govern.

use std::collections::BTreeSet;

use elementary_assertions_document::{
    Assertion, PredicateClass, PredicateQuality, PredicateRef, SuppressedAssertion, SuppressedBy,
    SuppressedDiagnostics, SuppressionEvidence, SuppressionKind, SuppressionReason,
};
use pathfinding::directed::bfs::bfs_reach;
use tracing::{debug, trace};

use crate::lexical::{self, OperatorKind, MODALITY_LINK_LABELS};

use super::{head_distance, shape, BuildContext};

/// Modal or copular predicate with only modality operators and no roles.
fn is_modality_source(ctx: &BuildContext<'_>, assertion: &Assertion) -> bool {
    let Some(token) = ctx.index.get(&assertion.predicate.head_token_id) else {
        return false;
    };
    (lexical::is_modal(token) || lexical::is_be_form(token))
        && assertion.diagnostics.predicate_quality == PredicateQuality::Low
        && !assertion.operators.is_empty()
        && assertion
            .operators
            .iter()
            .all(|op| op.kind == OperatorKind::Modality.as_str())
        && assertion.arguments.is_empty()
        && assertion.modifiers.is_empty()
}

/// Mentions reachable from `start` over clause-link edges, plus the
/// relations walked.
fn linked_mentions(ctx: &BuildContext<'_>, start: &str, segment_id: &str) -> (BTreeSet<String>, Vec<String>) {
    let links: Vec<_> = ctx
        .projection
        .projected()
        .iter()
        .filter(|r| r.segment_id == segment_id && MODALITY_LINK_LABELS.contains(&r.label.as_str()))
        .collect();
    let reached: BTreeSet<String> = bfs_reach(start.to_string(), |mention: &String| {
        links
            .iter()
            .filter(|r| &r.head_mention_id == mention)
            .map(|r| r.dep_mention_id.clone())
            .collect::<Vec<_>>()
    })
    .filter(|mention| mention != start)
    .collect();
    let walked = links
        .iter()
        .filter(|r| {
            (r.head_mention_id == start || reached.contains(&r.head_mention_id))
                && reached.contains(&r.dep_mention_id)
        })
        .map(|r| r.relation_id.clone())
        .collect();
    (reached, walked)
}

pub(crate) fn merge_modality(
    ctx: &BuildContext<'_>,
    assertions: &mut Vec<Assertion>,
    suppressed: &mut Vec<SuppressedAssertion>,
) {
    let mut sources: Vec<String> = assertions
        .iter()
        .filter(|a| is_modality_source(ctx, a))
        .map(|a| a.id.clone())
        .collect();
    sources.sort();

    let mut merged = 0usize;
    for source_id in sources {
        let Some(source_ix) = assertions.iter().position(|a| a.id == source_id) else {
            continue;
        };
        let source = &assertions[source_ix];
        let (reached, walked) =
            linked_mentions(ctx, &source.predicate.mention_id, &source.segment_id);
        let host_ix = assertions
            .iter()
            .enumerate()
            .filter(|(_, host)| host.id != source.id && host.segment_id == source.segment_id)
            .filter(|(_, host)| host.diagnostics.predicate_class == PredicateClass::LexicalVerb)
            .filter(|(_, host)| reached.contains(&host.predicate.mention_id))
            .min_by(|(_, a), (_, b)| {
                head_distance(ctx.index, source, a)
                    .cmp(&head_distance(ctx.index, source, b))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(ix, _)| ix);
        let Some(host_ix) = host_ix else {
            trace!(source = %source.id, "no clause-linked lexical host for modality");
            continue;
        };

        let source = assertions.remove(source_ix);
        let host_ix = if host_ix > source_ix { host_ix - 1 } else { host_ix };
        let host = &mut assertions[host_ix];

        for operator in source.operators.iter().cloned() {
            shape::add_operator(host, operator);
        }
        for item in source.evidence.relations.iter().cloned() {
            shape::add_evidence(host, item);
        }
        host.evidence
            .token_ids
            .extend(source.evidence.token_ids.iter().cloned());
        shape::normalize(host, ctx.mentions);

        let mut relation_ids: Vec<String> = source
            .evidence
            .relations
            .iter()
            .map(|item| item.relation_id.clone())
            .chain(walked)
            .collect();
        relation_ids.sort();
        relation_ids.dedup();
        let mut token_ids = vec![
            source.predicate.head_token_id.clone(),
            host.predicate.head_token_id.clone(),
        ];
        token_ids.sort();
        token_ids.dedup();

        trace!(source = %source.id, host = %host.id, "modality merged into lexical host");
        suppressed.push(SuppressedAssertion {
            id: source.id.clone(),
            segment_id: source.segment_id.clone(),
            predicate: PredicateRef {
                mention_id: source.predicate.mention_id.clone(),
                head_token_id: source.predicate.head_token_id.clone(),
            },
            diagnostics: SuppressedDiagnostics {
                suppressed_by: SuppressedBy {
                    kind: SuppressionKind::ModalityMerge,
                    target_assertion_id: host.id.clone(),
                    reason: SuppressionReason::ModalityMovedToLexical,
                    evidence: SuppressionEvidence {
                        relation_ids,
                        token_ids,
                    },
                },
            },
            transferred_buckets: None,
            transferred_mention_ids: None,
        });
        merged += 1;
    }
    debug!(merged, "merged modality assertions");
}
