//! Per-predicate assertion synthesis.
//!
//! Every mention heading a projected relation is a candidate predicate.
//! Low-quality and structural predicates may be redirected to a lexical verb
//! named by their relation evidence; the redirected source leaves a trace.

use std::collections::{BTreeMap, BTreeSet};

use elementary_assertions_document::{
    Assertion, Mention, PredicateClass, PredicateQuality, PredicateRef, ProjectedRelation,
    SlotProjectionChoice, SuppressedAssertion, SuppressedBy, SuppressedDiagnostics,
    SuppressionEvidence, SuppressionKind, SuppressionReason, Token,
};
use tracing::{debug, trace};

use crate::lexical::{self, CoreRole, CLAUSE_LINK_LABELS, MODALITY_LINK_LABELS};
use crate::mention::{choose_best_mention_for_token, Exclusion, MentionPreference};

use super::draft::Draft;
use super::BuildContext;

/// Output of the synthesis phase.
#[derive(Debug, Default)]
pub(crate) struct Synthesis {
    pub assertions: Vec<Assertion>,
    pub suppressed: Vec<SuppressedAssertion>,
    /// Every candidate predicate and redirect target seen.
    pub handled: BTreeSet<String>,
    /// Candidates that were dropped, rejected or skipped as scaffolding.
    pub invalid: BTreeSet<String>,
}

/// Upgrade evidence, lowest rank first.
const UPGRADE_MODALITY_UNIFIED: u8 = 0;
const UPGRADE_COPULA_FRAME: u8 = 1;
const UPGRADE_CLAUSE_LINK: u8 = 2;

struct Group<'c> {
    predicate: &'c Mention,
    relations: BTreeMap<String, &'c ProjectedRelation>,
    sources: Vec<&'c Mention>,
}

/// Runs synthesis over all candidate predicates.
pub(crate) fn synthesize(ctx: &BuildContext<'_>) -> Synthesis {
    let mut out = Synthesis::default();
    let mut groups: BTreeMap<&str, Group<'_>> = BTreeMap::new();

    for candidate in candidate_predicates(ctx) {
        out.handled.insert(candidate.id.clone());
        let Some(token) = ctx.index.get(&candidate.head_token_id) else {
            continue;
        };
        if is_make_sure_scaffold(ctx, token) {
            trace!(predicate = %candidate.id, "skipping make-sure scaffold");
            out.invalid.insert(candidate.id.clone());
            continue;
        }

        let class = lexical::classify_predicate(token);
        let quality = lexical::predicate_quality(token);
        let mut effective = candidate;
        let mut redirected = false;
        if quality == PredicateQuality::Low || class.is_structural() {
            if let Some(target) = find_upgrade(ctx, candidate, token, class) {
                trace!(source = %candidate.id, target = %target.id, "predicate upgraded");
                effective = target;
                redirected = true;
            }
        }
        if !redirected && class == PredicateClass::Preposition && candidate.token_ids.len() == 1 {
            trace!(predicate = %candidate.id, "dropping bare preposition predicate");
            out.invalid.insert(candidate.id.clone());
            continue;
        }

        out.handled.insert(effective.id.clone());
        let group = groups.entry(effective.id.as_str()).or_insert_with(|| Group {
            predicate: effective,
            relations: BTreeMap::new(),
            sources: Vec::new(),
        });
        for relation in ctx.projection.outgoing(&candidate.id) {
            group.relations.insert(relation.relation_id.clone(), relation);
        }
        if redirected {
            group.sources.push(candidate);
        }
    }

    for group in groups.into_values() {
        let relations: Vec<&ProjectedRelation> = sorted_relations(group.relations.values().copied());
        let Some(draft) = build_draft(ctx, group.predicate, &relations) else {
            continue;
        };
        if let Some(rejection) = draft.rejection() {
            trace!(
                predicate = %group.predicate.id,
                reason = rejection.as_str(),
                "rejecting scaffold assertion"
            );
            out.invalid.insert(group.predicate.id.clone());
            out.invalid
                .extend(group.sources.iter().map(|source| source.id.clone()));
            continue;
        }
        let assertion = draft.into_assertion(ctx);
        for source in &group.sources {
            out.suppressed
                .push(upgrade_trace(ctx, source, group.predicate, &assertion));
        }
        out.assertions.push(assertion);
    }

    debug!(
        assertions = out.assertions.len(),
        redirected = out.suppressed.len(),
        invalid = out.invalid.len(),
        "synthesized assertions"
    );
    out
}

/// Mentions heading at least one projected relation, in
/// `(segment_id, span.start, id)` order.
fn candidate_predicates<'c>(ctx: &BuildContext<'c>) -> Vec<&'c Mention> {
    let heads: BTreeSet<&str> = ctx
        .projection
        .projected()
        .iter()
        .map(|relation| relation.head_mention_id.as_str())
        .collect();
    let mut candidates: Vec<&Mention> = heads
        .into_iter()
        .filter_map(|id| ctx.mentions.get(id))
        .collect();
    candidates.sort_by(|a, b| {
        a.segment_id
            .cmp(&b.segment_id)
            .then_with(|| a.span.start.cmp(&b.span.start))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}

pub(crate) fn sorted_relations<'c>(
    relations: impl IntoIterator<Item = &'c ProjectedRelation>,
) -> Vec<&'c ProjectedRelation> {
    let mut relations: Vec<&ProjectedRelation> = relations.into_iter().collect();
    relations.sort_by(|a, b| {
        (&a.head_token_id, &a.dep_token_id, &a.label, &a.relation_id).cmp(&(
            &b.head_token_id,
            &b.dep_token_id,
            &b.label,
            &b.relation_id,
        ))
    });
    relations
}

/// `make` under a clause link with `sure` close behind, or that `sure`.
pub(crate) fn is_make_sure_scaffold(ctx: &BuildContext<'_>, token: &Token) -> bool {
    let window = ctx.config.make_sure_window;
    let segment = ctx.index.segment_tokens(&token.segment_id);
    match lexical::lower_surface(token).as_str() {
        "make" => {
            let linked = ctx.projection.projected().iter().any(|relation| {
                relation.dep_token_id == token.id
                    && CLAUSE_LINK_LABELS.contains(&relation.label.as_str())
            });
            linked
                && segment.iter().any(|other| {
                    other.i > token.i
                        && other.i - token.i <= window
                        && lexical::lower_surface(other) == "sure"
                })
        }
        "sure" => segment.iter().any(|other| {
            other.i < token.i
                && token.i - other.i <= window
                && lexical::lower_surface(other) == "make"
                && is_make_sure_scaffold(ctx, other)
        }),
        _ => false,
    }
}

/// Lexical-verb mention a low-quality or structural predicate should cede
/// its assertion to, if its outgoing relations name one.
fn find_upgrade<'c>(
    ctx: &BuildContext<'c>,
    source: &'c Mention,
    token: &Token,
    class: PredicateClass,
) -> Option<&'c Mention> {
    let clause_link_allowed = class.is_structural() || lexical::lower_surface(token) == "given";
    let mut candidates: Vec<(u8, String)> = Vec::new();
    for relation in ctx.projection.outgoing(&source.id) {
        let pattern = relation.evidence.get("pattern").and_then(|v| v.as_str());
        let named = |key: &str| {
            relation
                .evidence
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        match pattern {
            Some("modality_unified") => {
                if let Some(target) = named("chosen_predicate_token_id") {
                    candidates.push((UPGRADE_MODALITY_UNIFIED, target));
                }
            }
            Some("copula_frame") => {
                if let Some(target) = named("verb_token_id") {
                    candidates.push((UPGRADE_COPULA_FRAME, target));
                }
            }
            _ => {}
        }
        if clause_link_allowed && MODALITY_LINK_LABELS.contains(&relation.label.as_str()) {
            candidates.push((UPGRADE_CLAUSE_LINK, relation.dep_token_id.clone()));
        }
    }

    let (_, _, target_token) = candidates
        .into_iter()
        .filter(|(_, token_id)| !source.contains_token(token_id))
        .filter_map(|(rank, token_id)| {
            ctx.index
                .position(&token_id)
                .map(|position| (rank, position, token_id))
        })
        .min()?;

    let target = choose_best_mention_for_token(
        &target_token,
        &source.segment_id,
        ctx.mentions.covering(&target_token),
        MentionPreference::Projection,
        Exclusion::Overlapping(&source.token_ids),
    )?;
    let head = ctx.index.get(&target.head_token_id)?;
    (lexical::classify_predicate(head) == PredicateClass::LexicalVerb).then_some(target)
}

/// Routes relations into a draft and applies the bucket post-processing.
pub(crate) fn build_draft<'c>(
    ctx: &BuildContext<'c>,
    predicate: &'c Mention,
    relations: &[&ProjectedRelation],
) -> Option<Draft<'c>> {
    let token = ctx.index.get(&predicate.head_token_id)?;
    let mut draft = Draft::new(predicate, token);
    for relation in relations {
        draft.route(ctx, relation);
    }
    if draft.class == PredicateClass::Copula && draft.quality == PredicateQuality::Low {
        trim_copula_buckets(ctx, &mut draft);
    }
    trim_oversized_theme(ctx, &mut draft);
    Some(draft)
}

/// Keeps copula content before the next relative-clause marker and at most
/// one theme.
fn trim_copula_buckets(ctx: &BuildContext<'_>, draft: &mut Draft<'_>) {
    let boundary = ctx
        .index
        .segment_tokens(&draft.token.segment_id)
        .iter()
        .find(|token| token.i > draft.token.i && lexical::is_relative_marker(token))
        .map(|token| token.i);

    for role in [CoreRole::Theme, CoreRole::Attr, CoreRole::Topic, CoreRole::Location] {
        let Some(slots) = draft.buckets.get_mut(role.as_str()) else {
            continue;
        };
        if let Some(boundary) = boundary {
            slots.retain(|slot| {
                ctx.mentions.get(&slot.mention_id).map_or(false, |mention| {
                    mention
                        .token_ids
                        .iter()
                        .all(|id| ctx.index.position(id).map_or(false, |i| i < boundary))
                })
            });
        }
    }

    if let Some(themes) = draft.buckets.get_mut(CoreRole::Theme.as_str()) {
        let smallest = themes
            .iter()
            .filter_map(|slot| ctx.mentions.get(&slot.mention_id).map(|m| (slot, m)))
            .min_by(|(_, a), (_, b)| {
                a.token_ids
                    .len()
                    .cmp(&b.token_ids.len())
                    .then_with(|| a.span.start.cmp(&b.span.start))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(slot, _)| slot.clone());
        themes.retain(|slot| Some(slot) == smallest.as_ref());
    }
    draft.buckets.retain(|_, slots| !slots.is_empty());
}

fn is_foreign_clause_token(token: &Token, predicate: &Token) -> bool {
    token.id != predicate.id
        && (lexical::is_verb_like(token)
            || lexical::is_relative_marker(token)
            || lexical::is_clause_boundary(token))
}

/// Replaces a catch-all theme that swallowed another clause with the
/// nearest noun-headed mention inside it.
fn trim_oversized_theme(ctx: &BuildContext<'_>, draft: &mut Draft<'_>) {
    let min_tokens = ctx.config.oversized_theme_min_tokens;
    let predicate_start = draft.predicate.span.start;
    let Some(themes) = draft.buckets.get_mut(CoreRole::Theme.as_str()) else {
        return;
    };
    for slot in themes.iter_mut() {
        let Some(theme) = ctx.mentions.get(&slot.mention_id) else {
            continue;
        };
        if theme.token_ids.len() < min_tokens {
            continue;
        }
        let foreign: BTreeSet<&str> = theme
            .token_ids
            .iter()
            .filter_map(|id| ctx.index.get(id))
            .filter(|token| is_foreign_clause_token(token, draft.token))
            .map(|token| token.id.as_str())
            .collect();
        if foreign.is_empty() {
            continue;
        }

        let after_predicate = theme.span.start > predicate_start;
        let replacement = ctx
            .mentions
            .all()
            .iter()
            .filter(|m| m.segment_id == theme.segment_id && m.id != theme.id)
            .filter(|m| m.token_ids.len() < theme.token_ids.len())
            .filter(|m| m.token_ids.iter().all(|id| theme.contains_token(id)))
            .filter(|m| !m.token_ids.iter().any(|id| foreign.contains(id.as_str())))
            .filter(|m| !m.token_ids.iter().any(|id| draft.predicate.contains_token(id)))
            .filter(|m| ctx.index.get(&m.head_token_id).map_or(false, lexical::is_noun_like))
            .min_by(|a, b| {
                let side = if after_predicate {
                    a.span.start.cmp(&b.span.start)
                } else {
                    b.span.end.cmp(&a.span.end)
                };
                side.then_with(|| a.token_ids.len().cmp(&b.token_ids.len()))
                    .then_with(|| a.id.cmp(&b.id))
            });
        if let Some(replacement) = replacement {
            trace!(from = %theme.id, to = %replacement.id, "trimming oversized theme");
            draft.choices.push(SlotProjectionChoice {
                slot: CoreRole::Theme.as_str().to_string(),
                original_mention_id: theme.id.clone(),
                chosen_mention_id: Some(replacement.id.clone()),
                reason: "oversized_theme_trimmed".to_string(),
            });
            slot.mention_id = replacement.id.clone();
        }
    }
}

/// Trace left by a predicate that ceded its assertion to `target`.
fn upgrade_trace(
    ctx: &BuildContext<'_>,
    source: &Mention,
    target: &Mention,
    assertion: &Assertion,
) -> SuppressedAssertion {
    let relations: Vec<&ProjectedRelation> = sorted_relations(ctx.projection.outgoing(&source.id));
    let synthetic_id = match build_draft(ctx, source, &relations) {
        Some(draft) => draft.into_assertion(ctx).id,
        None => crate::ids::assertion_id(&super::shape::empty_assertion(source, ctx.index)),
    };
    let mut relation_ids: Vec<String> = relations.iter().map(|r| r.relation_id.clone()).collect();
    relation_ids.sort();
    relation_ids.dedup();
    let mut token_ids = vec![source.head_token_id.clone(), target.head_token_id.clone()];
    token_ids.sort();
    token_ids.dedup();

    SuppressedAssertion {
        id: synthetic_id,
        segment_id: source.segment_id.clone(),
        predicate: PredicateRef {
            mention_id: source.id.clone(),
            head_token_id: source.head_token_id.clone(),
        },
        diagnostics: SuppressedDiagnostics {
            suppressed_by: SuppressedBy {
                kind: SuppressionKind::PredicateRedirect,
                target_assertion_id: assertion.id.clone(),
                reason: SuppressionReason::PredicateUpgradedToLexical,
                evidence: SuppressionEvidence {
                    relation_ids,
                    token_ids,
                },
            },
        },
        transferred_buckets: None,
        transferred_mention_ids: None,
    }
}

#[cfg(test)]
mod tests {
    use elementary_assertions_document::RelationsDocument;
    use serde_json::json;

    use crate::tests::fixtures::{with_context, DocBuilder};

    use super::super::draft::Rejection;
    use super::*;

    fn synthesized(doc: &RelationsDocument) -> Synthesis {
        with_context(doc, synthesize)
    }

    fn heads(synthesis: &Synthesis) -> Vec<&str> {
        let mut heads: Vec<&str> = synthesis
            .assertions
            .iter()
            .map(|a| a.predicate.head_token_id.as_str())
            .collect();
        heads.sort();
        heads
    }

    fn rejection_of(doc: &RelationsDocument, mention_id: &str) -> Option<Rejection> {
        with_context(doc, |ctx| {
            let predicate = ctx.mentions.get(mention_id).unwrap();
            let relations = sorted_relations(ctx.projection.outgoing(mention_id));
            build_draft(ctx, predicate, &relations).unwrap().rejection()
        })
    }

    #[test]
    fn test_make_sure_scaffold_is_skipped() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("We", "PRP"),
                ("need", "VBP"),
                ("to", "TO"),
                ("make", "VB"),
                ("sure", "JJ"),
                ("doors", "NNS"),
                ("close", "VBP"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "xcomp", "t3")
            .relation("t3", "ccomp", "t6")
            .relation("t6", "nsubj", "t5")
            .build();
        let synthesis = synthesized(&doc);

        assert_eq!(heads(&synthesis), vec!["t1", "t6"]);
        assert!(synthesis.invalid.contains("m:s1:11-15:token"));
    }

    #[test]
    fn test_modality_unified_redirects_modal() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("may", "MD"),
                ("build", "VB"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation_with(
                "t1",
                "nsubj",
                "t0",
                json!({ "pattern": "modality_unified", "chosen_predicate_token_id": "t2" }),
            )
            .relation("t2", "obj", "t3")
            .build();
        let synthesis = synthesized(&doc);

        assert_eq!(heads(&synthesis), vec!["t2"]);
        let host = &synthesis.assertions[0];
        assert_eq!(host.role("actor").unwrap().mention_ids, vec!["m:s1:0-5:token"]);
        assert_eq!(host.role("theme").unwrap().mention_ids, vec!["m:s1:16-21:token"]);

        assert_eq!(synthesis.suppressed.len(), 1);
        let trace = &synthesis.suppressed[0];
        assert_eq!(trace.predicate.head_token_id, "t1");
        assert_eq!(
            trace.diagnostics.suppressed_by.reason,
            SuppressionReason::PredicateUpgradedToLexical
        );
        assert_eq!(trace.diagnostics.suppressed_by.target_assertion_id, host.id);
    }

    #[test]
    fn test_clause_link_upgrade_for_nominal_head() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Plans", "NNS"),
                ("to", "TO"),
                ("build", "VB"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t0", "xcomp", "t2")
            .relation("t2", "obj", "t3")
            .build();
        let synthesis = synthesized(&doc);

        assert_eq!(heads(&synthesis), vec!["t2"]);
        assert_eq!(synthesis.suppressed.len(), 1);
        assert_eq!(synthesis.suppressed[0].predicate.mention_id, "m:s1:0-5:token");
        assert_eq!(
            synthesis.suppressed[0].diagnostics.suppressed_by.reason,
            SuppressionReason::PredicateUpgradedToLexical
        );
    }

    #[test]
    fn test_clause_link_upgrade_for_given() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Given", "VBN"),
                ("time", "NN"),
                (",", ","),
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t0", "obj", "t1")
            .relation("t0", "complement_clause", "t4")
            .relation("t4", "nsubj", "t3")
            .relation("t4", "obj", "t5")
            .build();
        let synthesis = synthesized(&doc);

        assert_eq!(heads(&synthesis), vec!["t4"]);
        let host = &synthesis.assertions[0];
        let themes = &host.role("theme").unwrap().mention_ids;
        assert!(themes.contains(&"m:s1:6-10:token".to_string()));
        assert!(themes.contains(&"m:s1:25-30:token".to_string()));
        assert_eq!(synthesis.suppressed[0].predicate.head_token_id, "t0");
    }

    #[test]
    fn test_copula_is_not_upgraded_through_clause_link() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("is", "VBZ"),
                ("happy", "JJ"),
                ("to", "TO"),
                ("build", "VB"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "acomp", "t2")
            .relation("t1", "xcomp", "t4")
            .relation("t4", "obj", "t5")
            .build();
        let synthesis = synthesized(&doc);

        assert_eq!(heads(&synthesis), vec!["t1", "t4"]);
        assert!(synthesis.suppressed.is_empty());
    }

    #[test]
    fn test_copula_buckets_stop_at_relative_marker() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("is", "VBZ"),
                ("a", "DT"),
                ("company", "NN"),
                ("that", "WDT"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "attr", "t3")
            .relation("t1", "attr", "t6")
            .relation("t5", "nsubj", "t4")
            .relation("t5", "obj", "t6")
            .build();
        let synthesis = synthesized(&doc);

        let copula = synthesis
            .assertions
            .iter()
            .find(|a| a.predicate.head_token_id == "t1")
            .unwrap();
        assert_eq!(copula.diagnostics.predicate_class, PredicateClass::Copula);
        assert_eq!(copula.role("attr").unwrap().mention_ids, vec!["m:s1:11-18:token"]);
        assert_eq!(copula.role("actor").unwrap().mention_ids, vec!["m:s1:0-5:token"]);
    }

    #[test]
    fn test_oversized_theme_is_trimmed_with_trace() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("sees", "VBZ"),
                ("the", "DT"),
                ("carts", "NNS"),
                ("that", "WDT"),
                ("Beta", "NNP"),
                ("built", "VBD"),
                (".", "."),
            ])
            .chunk(&["t2", "t3", "t4", "t5", "t6"])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t3")
            .build();
        let synthesis = synthesized(&doc);

        let sees = synthesis
            .assertions
            .iter()
            .find(|a| a.predicate.head_token_id == "t1")
            .unwrap();
        assert_eq!(sees.role("theme").unwrap().mention_ids, vec!["m:s1:15-20:token"]);
        assert_eq!(
            sees.diagnostics.slot_projection_choice,
            vec![SlotProjectionChoice {
                slot: "theme".to_string(),
                original_mention_id: "m:s1:11-36:chunk".to_string(),
                chosen_mention_id: Some("m:s1:15-20:token".to_string()),
                reason: "oversized_theme_trimmed".to_string(),
            }]
        );
    }

    #[test]
    fn test_bare_gerund_is_rejected() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("enjoys", "VBZ"),
                ("building", "VBG"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation("t2", "obj", "t3")
            .build();

        assert_eq!(
            rejection_of(&doc, "m:s1:13-21:token"),
            Some(Rejection::BareGerund)
        );
        let synthesis = synthesized(&doc);
        assert_eq!(heads(&synthesis), vec!["t1"]);
        assert!(synthesis.invalid.contains("m:s1:13-21:token"));
    }

    #[test]
    fn test_coordination_only_nominal_is_rejected() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                ("and", "CC"),
                ("wagons", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation_with("t2", "coordination", "t4", json!({ "coord_type": "and" }))
            .build();

        assert_eq!(
            rejection_of(&doc, "m:s1:13-18:token"),
            Some(Rejection::CoordinationOnly)
        );
        assert_eq!(heads(&synthesized(&doc)), vec!["t1"]);
    }

    #[test]
    fn test_modifier_only_nominal_is_rejected() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("old", "JJ"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t3")
            .relation("t3", "modifier", "t2")
            .build();

        assert_eq!(
            rejection_of(&doc, "m:s1:17-22:token"),
            Some(Rejection::ModifierOnlyNominal)
        );
        assert_eq!(heads(&synthesized(&doc)), vec!["t1"]);
    }
}
