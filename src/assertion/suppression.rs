//! Role-carrier suppression.
//!
//! Nominal, prepositional, auxiliary and copular predicates that only carry
//! roles for a nearby lexical verb are folded into it. Residual mentions land
//! in `attached_<role>` buckets on the host and the source leaves a trace.

use std::collections::BTreeSet;

use elementary_assertions_document::{
    Assertion, Mention, PredicateClass, PredicateQuality, PredicateRef, SuppressedAssertion,
    SuppressedBy, SuppressedDiagnostics, SuppressionEvidence, SuppressionKind, SuppressionReason,
};
use tracing::{debug, trace};

use crate::lexical::{CoreRole, OperatorKind};
use crate::mention::{choose_best_mention_for_token, Exclusion, MentionPreference};

use super::eligibility::{lexical_hosts, missing_in_host, source_non_operator_tokens};
use super::{shape, BuildContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carrier {
    Nominal,
    Preposition,
    Auxiliary,
    Copula,
}

impl Carrier {
    fn reason(self) -> SuppressionReason {
        match self {
            Carrier::Nominal => SuppressionReason::RoleCarrierSuppressedV2Nominal,
            Carrier::Preposition | Carrier::Auxiliary => SuppressionReason::RoleCarrierSuppressed,
            Carrier::Copula => SuppressionReason::CopulaBucketSinkSuppressed,
        }
    }
}

fn operator_kinds(assertion: &Assertion) -> BTreeSet<&str> {
    assertion.operators.iter().map(|op| op.kind.as_str()).collect()
}

fn classify(source: &Assertion) -> Option<Carrier> {
    let class = source.diagnostics.predicate_class;
    let low = source.diagnostics.predicate_quality == PredicateQuality::Low;
    let kinds = operator_kinds(source);
    let is = |kind: &str, expected: OperatorKind| kind == expected.as_str();

    match class {
        PredicateClass::NominalHead
            if kinds.is_empty() && source.role(CoreRole::Actor.as_str()).is_none() =>
        {
            Some(Carrier::Nominal)
        }
        PredicateClass::Preposition if kinds.is_empty() => Some(Carrier::Preposition),
        PredicateClass::Preposition
            if !kinds.iter().any(|&k| is(k, OperatorKind::Modality) || is(k, OperatorKind::Negation))
                && source.arguments.is_empty() =>
        {
            Some(Carrier::Preposition)
        }
        PredicateClass::Auxiliary if low => Some(Carrier::Auxiliary),
        PredicateClass::Copula
            if low
                && (source.role(CoreRole::Theme.as_str()).is_some()
                    || source.role(CoreRole::Attr.as_str()).is_some()
                    || !source.modifiers.is_empty())
                && kinds.iter().all(|&k| {
                    is(k, OperatorKind::Modality) || is(k, OperatorKind::CoordinationGroup)
                }) =>
        {
            Some(Carrier::Copula)
        }
        _ => None,
    }
}

fn actor_ids(assertion: &Assertion) -> BTreeSet<&str> {
    assertion
        .role(CoreRole::Actor.as_str())
        .map(|entry| entry.mention_ids.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Lexical hosts whose evidence tokens contain the source's non-operator
/// tokens, best first.
fn candidate_hosts<'s>(
    ctx: &BuildContext<'_>,
    source: &Assertion,
    carrier: Carrier,
    assertions: &'s [Assertion],
) -> Vec<&'s Assertion> {
    let needed = source_non_operator_tokens(ctx, source);
    let same_clause = !source.arguments.is_empty();
    let source_actors = actor_ids(source);

    let mut hosts: Vec<&Assertion> = lexical_hosts(ctx, source, assertions, same_clause)
        .into_iter()
        .filter(|host| missing_in_host(host, &needed).is_empty())
        .filter(|host| {
            carrier != Carrier::Auxiliary || {
                let host_roles: BTreeSet<&str> = host.role_mention_ids().collect();
                source_actors.iter().all(|id| host_roles.contains(id))
            }
        })
        .collect();
    if carrier == Carrier::Copula && !source_actors.is_empty() {
        // stable: keeps distance order within each group
        hosts.sort_by_key(|host| actor_ids(host).is_disjoint(&source_actors));
    }
    hosts
}

/// One mention landing in an `attached_*` bucket of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Move {
    bucket: String,
    mention_id: String,
    relation_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct Transfer {
    buckets: BTreeSet<String>,
    mention_ids: BTreeSet<String>,
}

fn attached_role(role: &str) -> String {
    if role.starts_with("attached_") {
        role.to_string()
    } else {
        format!("attached_{role}")
    }
}

/// Where each source role mention goes on `host`.
///
/// Mentions whose tokens the host already represents stay behind. A mention
/// overlapping the host predicate is replaced, token by token, by the best
/// dependent mention disjoint from it. Returns `None` when some token finds
/// no such mention, so the source must be kept.
fn plan_transfer(ctx: &BuildContext<'_>, source: &Assertion, host: &Assertion) -> Option<Vec<Move>> {
    let host_predicate: Vec<String> = ctx
        .mentions
        .get(&host.predicate.mention_id)
        .map(|m| m.token_ids.clone())
        .unwrap_or_else(|| vec![host.predicate.head_token_id.clone()]);
    let mut host_mentions: BTreeSet<String> = host.role_mention_ids().map(str::to_string).collect();
    let mut represented: BTreeSet<String> = shape::role_tokens(host, ctx.mentions)
        .into_iter()
        .map(str::to_string)
        .collect();
    represented.extend(host_predicate.iter().cloned());

    let mut moves = Vec::new();
    for entry in source.roles() {
        let bucket = attached_role(&entry.role);
        for mention_id in &entry.mention_ids {
            if host_mentions.contains(mention_id) {
                continue;
            }
            let Some(mention) = ctx.mentions.get(mention_id) else {
                continue;
            };
            let mut open: Vec<&str> = mention
                .token_ids
                .iter()
                .map(String::as_str)
                .filter(|id| !represented.contains(*id))
                .collect();
            if open.is_empty() {
                continue;
            }

            let overlaps_predicate = mention.token_ids.iter().any(|id| host_predicate.contains(id));
            let replacements: Vec<&Mention> = if overlaps_predicate {
                open.sort_by_key(|id| ctx.index.position(id));
                let mut picked: Vec<&Mention> = Vec::new();
                for token_id in open {
                    if picked.iter().any(|m| m.contains_token(token_id)) {
                        continue;
                    }
                    let replacement = choose_best_mention_for_token(
                        token_id,
                        &mention.segment_id,
                        ctx.mentions.covering(token_id),
                        MentionPreference::Dependent,
                        Exclusion::Overlapping(&host_predicate),
                    );
                    let Some(replacement) = replacement else {
                        trace!(
                            source = %source.id,
                            token = token_id,
                            "no mention disjoint from host predicate"
                        );
                        return None;
                    };
                    picked.push(replacement);
                }
                picked
            } else {
                vec![mention]
            };

            for replacement in replacements {
                if !host_mentions.insert(replacement.id.clone()) {
                    continue;
                }
                represented.extend(replacement.token_ids.iter().cloned());
                moves.push(Move {
                    bucket: bucket.clone(),
                    mention_id: replacement.id.clone(),
                    relation_ids: entry.evidence.relation_ids.clone(),
                });
            }
        }
    }
    Some(moves)
}

/// Applies planned moves and folds the source's operators and evidence into
/// the host.
fn apply_transfer(ctx: &BuildContext<'_>, source: &Assertion, host: &mut Assertion, moves: Vec<Move>) -> Transfer {
    let mut out = Transfer::default();
    for planned in moves {
        shape::add_role_mention(host, &planned.bucket, &planned.mention_id, &planned.relation_ids);
        out.buckets.insert(planned.bucket);
        out.mention_ids.insert(planned.mention_id);
    }
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
    out
}

pub(crate) fn suppress_role_carriers(
    ctx: &BuildContext<'_>,
    assertions: &mut Vec<Assertion>,
    suppressed: &mut Vec<SuppressedAssertion>,
) {
    let mut sources: Vec<String> = assertions
        .iter()
        .filter(|a| classify(a).is_some())
        .map(|a| a.id.clone())
        .collect();
    sources.sort();

    let mut count = 0usize;
    for source_id in sources {
        let Some(source_ix) = assertions.iter().position(|a| a.id == source_id) else {
            continue;
        };
        // an earlier transfer may have changed it
        let Some(carrier) = classify(&assertions[source_ix]) else {
            continue;
        };
        let planned = candidate_hosts(ctx, &assertions[source_ix], carrier, assertions)
            .into_iter()
            .find_map(|host| {
                plan_transfer(ctx, &assertions[source_ix], host).map(|moves| (host.id.clone(), moves))
            });
        let Some((host_id, moves)) = planned else {
            trace!(source = %source_id, "no host for role carrier");
            continue;
        };

        let source = assertions.remove(source_ix);
        let Some(host) = assertions.iter_mut().find(|a| a.id == host_id) else {
            continue;
        };
        let moved = apply_transfer(ctx, &source, host, moves);

        let mut relation_ids: Vec<String> = source
            .evidence
            .relations
            .iter()
            .map(|item| item.relation_id.clone())
            .collect();
        relation_ids.sort();
        relation_ids.dedup();
        let mut token_ids = vec![
            source.predicate.head_token_id.clone(),
            host.predicate.head_token_id.clone(),
        ];
        token_ids.sort();
        token_ids.dedup();

        trace!(
            source = %source.id,
            host = %host.id,
            reason = carrier.reason().as_str(),
            moved = moved.mention_ids.len(),
            "role carrier suppressed"
        );
        suppressed.push(SuppressedAssertion {
            id: source.id.clone(),
            segment_id: source.segment_id.clone(),
            predicate: PredicateRef {
                mention_id: source.predicate.mention_id.clone(),
                head_token_id: source.predicate.head_token_id.clone(),
            },
            diagnostics: SuppressedDiagnostics {
                suppressed_by: SuppressedBy {
                    kind: SuppressionKind::RoleCarrier,
                    target_assertion_id: host.id.clone(),
                    reason: carrier.reason(),
                    evidence: SuppressionEvidence {
                        relation_ids,
                        token_ids,
                    },
                },
            },
            transferred_buckets: Some(moved.buckets.into_iter().collect()),
            transferred_mention_ids: Some(moved.mention_ids.into_iter().collect()),
        });
        count += 1;
    }
    debug!(suppressed = count, "suppressed role carriers");
}
