//! Coverage and diagnostics over the final assertion set.

use std::collections::{BTreeMap, BTreeSet};

use elementary_assertions_document::{
    Assertion, CoordinationGroup, Coverage, Diagnostics, Fragmentation, GapSignals, Mention,
    PredicateClass, PredicateQuality, RoleEvidence, SegmentFragmentation, SubjectRoleGap,
    UnresolvedMention, UnresolvedReason,
};
use tracing::{debug, warn};

use crate::assertion::AssertionSet;
use crate::lexical::{self, COORDINATION_LABEL, SUBJECT_LABELS};
use crate::mention::MentionSet;
use crate::projection::Projection;
use crate::token_index::TokenIndex;

/// Reasons in precedence order; the first that holds wins.
pub const UNRESOLVED_REASON_PRECEDENCE: [UnresolvedReason; 5] = [
    UnresolvedReason::PredicateInvalid,
    UnresolvedReason::CoordTypeMissing,
    UnresolvedReason::OperatorScopeOpen,
    UnresolvedReason::MissingRelation,
    UnresolvedReason::ProjectionFailed,
];

/// What the graph says about one uncovered mention.
#[derive(Debug, Default)]
struct MentionSignals {
    invalid_predicate: bool,
    coord_type_missing: bool,
    operator_only: bool,
    has_role_relation: bool,
}

impl MentionSignals {
    fn holds(&self, reason: UnresolvedReason) -> bool {
        match reason {
            UnresolvedReason::PredicateInvalid => self.invalid_predicate,
            UnresolvedReason::CoordTypeMissing => self.coord_type_missing,
            UnresolvedReason::OperatorScopeOpen => self.operator_only,
            UnresolvedReason::MissingRelation => !self.has_role_relation,
            UnresolvedReason::ProjectionFailed => true,
        }
    }
}

fn classify_unresolved(signals: &MentionSignals) -> UnresolvedReason {
    UNRESOLVED_REASON_PRECEDENCE
        .into_iter()
        .find(|reason| signals.holds(*reason))
        .unwrap_or(UnresolvedReason::ProjectionFailed)
}

fn is_content_bearing(index: &TokenIndex<'_>, mention: &Mention) -> bool {
    let tokens: Vec<_> = mention.token_ids.iter().filter_map(|id| index.get(id)).collect();
    !tokens.iter().all(|token| lexical::is_punctuation(token))
        && tokens.iter().any(|token| lexical::is_content(token))
}

fn unresolved_for(
    index: &TokenIndex<'_>,
    projection: &Projection,
    mention: &Mention,
    invalid: &BTreeSet<String>,
) -> UnresolvedMention {
    let touching: Vec<_> = projection
        .projected()
        .iter()
        .filter(|r| r.head_mention_id == mention.id || r.dep_mention_id == mention.id)
        .collect();
    let head_low = index
        .get(&mention.head_token_id)
        .map_or(false, |token| lexical::predicate_quality(token) == PredicateQuality::Low);
    let signals = MentionSignals {
        invalid_predicate: invalid.contains(&mention.id)
            || (head_low && touching.iter().any(|r| r.head_mention_id == mention.id)),
        coord_type_missing: touching.iter().any(|r| {
            r.label == COORDINATION_LABEL
                && r.evidence.get("coord_type").and_then(|v| v.as_str()).is_none()
        }),
        operator_only: !touching.is_empty()
            && touching.iter().all(|r| lexical::is_operator_label(&r.label)),
        has_role_relation: touching.iter().any(|r| lexical::is_role_label(&r.label)),
    };

    let mut relation_ids: Vec<String> = touching.iter().map(|r| r.relation_id.clone()).collect();
    relation_ids.extend(
        projection
            .relations
            .dropped_relations
            .iter()
            .filter(|r| mention.contains_token(&r.head_token_id) || mention.contains_token(&r.dep_token_id))
            .map(|r| r.relation_id.clone()),
    );
    relation_ids.sort();
    relation_ids.dedup();
    let mut token_ids = mention.token_ids.clone();
    token_ids.sort();

    UnresolvedMention {
        mention_id: mention.id.clone(),
        segment_id: mention.segment_id.clone(),
        reason: classify_unresolved(&signals),
        evidence: RoleEvidence {
            relation_ids,
            token_ids,
        },
    }
}

/// Partitions content-bearing primary mentions into covered and uncovered.
pub(crate) fn build_coverage(
    index: &TokenIndex<'_>,
    mentions: &MentionSet,
    projection: &Projection,
    assertions: &AssertionSet,
) -> Coverage {
    let mut attached: BTreeSet<&str> = BTreeSet::new();
    for assertion in &assertions.assertions {
        attached.insert(assertion.predicate.mention_id.as_str());
        attached.extend(assertion.role_mention_ids());
    }
    let evidence_sets: Vec<BTreeSet<&str>> = assertions
        .assertions
        .iter()
        .map(|a| a.evidence.token_ids.iter().map(String::as_str).collect())
        .collect();

    let mut coverage = Coverage::default();
    let mut primaries: Vec<&Mention> = mentions
        .primaries()
        .filter(|mention| is_content_bearing(index, mention))
        .collect();
    primaries.sort_by(|a, b| a.id.cmp(&b.id));

    for mention in primaries {
        coverage.primary_mention_ids.push(mention.id.clone());
        let covered = attached.contains(mention.id.as_str())
            || evidence_sets.iter().any(|tokens| {
                mention
                    .token_ids
                    .iter()
                    .all(|id| tokens.contains(id.as_str()))
            });
        if covered {
            coverage.covered_primary_mention_ids.push(mention.id.clone());
        } else {
            coverage.uncovered_primary_mention_ids.push(mention.id.clone());
            coverage.unresolved.push(unresolved_for(
                index,
                projection,
                mention,
                &assertions.invalid_predicates,
            ));
        }
    }
    debug!(
        primary = coverage.primary_mention_ids.len(),
        uncovered = coverage.uncovered_primary_mention_ids.len(),
        "computed coverage"
    );
    coverage
}

fn subject_role_gaps(projection: &Projection, assertions: &[Assertion]) -> Vec<SubjectRoleGap> {
    let mut gaps: Vec<SubjectRoleGap> = assertions
        .iter()
        .filter(|a| a.diagnostics.predicate_class == PredicateClass::LexicalVerb)
        .filter(|a| a.role("actor").map_or(true, |entry| entry.mention_ids.is_empty()))
        .filter(|a| {
            !projection.outgoing(&a.predicate.mention_id).any(|r| SUBJECT_LABELS.contains(&r.label.as_str()))
        })
        .map(|a| SubjectRoleGap {
            assertion_id: a.id.clone(),
            segment_id: a.segment_id.clone(),
            predicate_mention_id: a.predicate.mention_id.clone(),
            predicate_head_token_id: a.predicate.head_token_id.clone(),
            reason: "no_subject_relation".to_string(),
        })
        .collect();
    gaps.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
    gaps
}

fn fragmentation(index: &TokenIndex<'_>, assertions: &[Assertion]) -> (Fragmentation, Vec<String>) {
    let mut warnings = Vec::new();
    let mut segments = Vec::new();
    let mut segment_ids: Vec<&str> = index
        .document()
        .segments
        .iter()
        .map(|segment| segment.id.as_str())
        .collect();
    segment_ids.sort();

    for segment_id in segment_ids {
        let in_segment: Vec<&Assertion> =
            assertions.iter().filter(|a| a.segment_id == segment_id).collect();
        let count = |class: PredicateClass| {
            in_segment
                .iter()
                .filter(|a| a.diagnostics.predicate_class == class)
                .count()
        };
        let lexical_verb_count = count(PredicateClass::LexicalVerb);
        let fragment_count = in_segment
            .iter()
            .filter(|a| a.diagnostics.structural_fragment)
            .count();
        let warning = fragment_count > lexical_verb_count;
        if warning {
            warn!(
                segment = segment_id,
                fragments = fragment_count,
                tolerated = lexical_verb_count,
                "fragmentation exceeds tolerance"
            );
            warnings.push(format!("fragmentation_exceeds_tolerance:{segment_id}"));
        }
        segments.push(SegmentFragmentation {
            segment_id: segment_id.to_string(),
            predicate_count: in_segment.len(),
            lexical_verb_count,
            copula_count: count(PredicateClass::Copula),
            auxiliary_count: count(PredicateClass::Auxiliary),
            fragment_count,
            tolerated_predicate_count: lexical_verb_count,
            warning,
        });
    }

    let structural = assertions
        .iter()
        .filter(|a| a.diagnostics.predicate_class.is_structural())
        .count();
    let predicate_noise_index = if assertions.is_empty() {
        0.0
    } else {
        structural as f64 / assertions.len() as f64
    };
    (
        Fragmentation {
            segments,
            predicate_noise_index,
        },
        warnings,
    )
}

fn coordination_summaries(projection: &Projection, assertions: &[Assertion]) -> Vec<CoordinationGroup> {
    projection
        .coordination_groups
        .iter()
        .cloned()
        .map(|mut group| {
            let mut ids: Vec<String> = assertions
                .iter()
                .filter(|a| group.member_mention_ids.contains(&a.predicate.mention_id))
                .map(|a| a.id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            group.predicate_assertion_ids = ids;
            group
        })
        .collect()
}

pub(crate) fn build_diagnostics(
    index: &TokenIndex<'_>,
    projection: &Projection,
    assertions: &AssertionSet,
    coverage: &Coverage,
) -> Diagnostics {
    let (fragmentation, mut warnings) = fragmentation(index, &assertions.assertions);
    let subject_role_gaps = subject_role_gaps(projection, &assertions.assertions);

    let mut unresolved_by_reason: BTreeMap<String, usize> = BTreeMap::new();
    for unresolved in &coverage.unresolved {
        *unresolved_by_reason
            .entry(unresolved.reason.as_str().to_string())
            .or_default() += 1;
    }
    let gap_signals = GapSignals {
        uncovered_primary_count: coverage.uncovered_primary_mention_ids.len(),
        unresolved_by_reason,
        dropped_relation_count: projection.relations.dropped_relations.len(),
        subject_role_gap_count: subject_role_gaps.len(),
        structural_fragment_count: assertions
            .assertions
            .iter()
            .filter(|a| a.diagnostics.structural_fragment)
            .count(),
    };

    warnings.sort();
    warnings.dedup();
    Diagnostics {
        fragmentation,
        gap_signals,
        coordination_groups: coordination_summaries(projection, &assertions.assertions),
        subject_role_gaps,
        suppressed_assertions: assertions.suppressed.clone(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use elementary_assertions_document::{ElementaryAssertionsDocument, RelationsDocument};

    use crate::tests::fixtures::DocBuilder;
    use crate::{build_elementary_assertions, validate_document, BuilderConfig};

    use super::*;

    fn build(doc: &RelationsDocument) -> ElementaryAssertionsDocument {
        build_elementary_assertions(doc, &BuilderConfig::default()).unwrap()
    }

    fn reason_of(out: &ElementaryAssertionsDocument, mention_id: &str) -> UnresolvedReason {
        out.coverage
            .unresolved
            .iter()
            .find(|u| u.mention_id == mention_id)
            .map(|u| u.reason)
            .unwrap()
    }

    #[test]
    fn test_precedence_picks_first_holding_reason() {
        let signals = MentionSignals {
            invalid_predicate: false,
            coord_type_missing: true,
            operator_only: true,
            has_role_relation: false,
        };
        assert_eq!(classify_unresolved(&signals), UnresolvedReason::CoordTypeMissing);

        let signals = MentionSignals {
            has_role_relation: true,
            ..Default::default()
        };
        assert_eq!(classify_unresolved(&signals), UnresolvedReason::ProjectionFailed);
        assert_eq!(
            classify_unresolved(&MentionSignals::default()),
            UnresolvedReason::MissingRelation
        );
    }

    #[test]
    fn test_precedence_table_order() {
        let names: Vec<&str> = UNRESOLVED_REASON_PRECEDENCE.iter().map(|r| r.as_str()).collect();
        insta::assert_debug_snapshot!(names, @r###"
        [
            "predicate_invalid",
            "coord_type_missing",
            "operator_scope_open",
            "missing_relation",
            "projection_failed",
        ]
        "###);
    }

    #[test]
    fn test_scaffold_and_orphan_mentions_are_classified() {
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
        let out = build(&doc);

        assert_eq!(
            out.coverage.uncovered_primary_mention_ids,
            vec!["m:s1:11-15:token", "m:s1:16-20:token"]
        );
        assert_eq!(reason_of(&out, "m:s1:11-15:token"), UnresolvedReason::PredicateInvalid);
        assert_eq!(reason_of(&out, "m:s1:16-20:token"), UnresolvedReason::MissingRelation);
        assert_eq!(out.diagnostics.gap_signals.uncovered_primary_count, 2);
        validate_document(&out, true).unwrap();
    }

    #[test]
    fn test_untyped_coordination_member_is_classified() {
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
            .relation("t2", "coordination", "t4")
            .build();
        let out = build(&doc);

        assert_eq!(out.coverage.uncovered_primary_mention_ids, vec!["m:s1:23-29:token"]);
        assert_eq!(reason_of(&out, "m:s1:23-29:token"), UnresolvedReason::CoordTypeMissing);
        assert_eq!(
            out.diagnostics.gap_signals.unresolved_by_reason.get("coord_type_missing"),
            Some(&1)
        );
    }

    #[test]
    fn test_operator_and_projection_reasons() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("waits", "VBZ"),
                ("not", "RB"),
                ("in", "IN"),
                ("Berlin", "NNP"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t3", "location", "t4")
            .relation("t3", "negation", "t2")
            .build();
        let out = build(&doc);

        assert_eq!(reason_of(&out, "m:s1:12-15:token"), UnresolvedReason::OperatorScopeOpen);
        assert_eq!(reason_of(&out, "m:s1:19-25:token"), UnresolvedReason::ProjectionFailed);
        let berlin = out
            .coverage
            .unresolved
            .iter()
            .find(|u| u.mention_id == "m:s1:19-25:token")
            .unwrap();
        assert_eq!(berlin.evidence.relation_ids, vec!["r2"]);
        assert_eq!(berlin.evidence.token_ids, vec!["t4"]);
        validate_document(&out, true).unwrap();
    }

    #[test]
    fn test_subject_role_gap_for_bare_verb() {
        let doc = DocBuilder::new()
            .sentence(&[("Build", "VB"), ("carts", "NNS"), (".", ".")])
            .relation("t0", "obj", "t1")
            .build();
        let out = build(&doc);

        let gaps = &out.diagnostics.subject_role_gaps;
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].assertion_id, out.assertions[0].id);
        assert_eq!(gaps[0].predicate_mention_id, "m:s1:0-5:token");
        assert_eq!(gaps[0].predicate_head_token_id, "t0");
        assert_eq!(gaps[0].reason, "no_subject_relation");
        assert_eq!(out.diagnostics.gap_signals.subject_role_gap_count, 1);
        validate_document(&out, true).unwrap();
    }

    #[test]
    fn test_fragmentation_beyond_tolerance_warns() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                ("with", "IN"),
                ("wheels", "NNS"),
                ("and", "CC"),
                ("wagons", "NNS"),
                ("with", "IN"),
                ("doors", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation("t2", "nmod", "t4")
            .relation("t6", "nmod", "t8")
            .build();
        let out = build(&doc);

        assert_eq!(out.assertions.len(), 3);
        let segment = &out.diagnostics.fragmentation.segments[0];
        assert_eq!(segment.fragment_count, 2);
        assert_eq!(segment.tolerated_predicate_count, 1);
        assert!(segment.warning);
        assert_eq!(out.diagnostics.warnings, vec!["fragmentation_exceeds_tolerance:s1"]);
        assert_eq!(out.diagnostics.gap_signals.structural_fragment_count, 2);
        validate_document(&out, true).unwrap();
    }
}
