//! Contract checks over a produced document.
//!
//! Standard validation covers shape, id uniqueness, cross references, the
//! primary partition, the coverage partition, determinism ordering, token
//! disjointness and suppression traces. Strict mode adds diagnostic
//! coherence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use elementary_assertions_document::{
    Assertion, ElementaryAssertionsDocument, IndexBasis, Mention, RoleEntry, SuppressionReason,
    STAGE,
};

use crate::error::{ValidationCode, ValidationError};
use crate::lexical;

type Checked = std::result::Result<(), ValidationError>;

fn ensure(condition: bool, code: ValidationCode, message: impl FnOnce() -> String) -> Checked {
    if condition {
        Ok(())
    } else {
        Err(ValidationError::new(code, message()))
    }
}

fn ensure_sorted_unique(values: &[String], what: &str) -> Checked {
    ensure(
        values.windows(2).all(|pair| pair[0] < pair[1]),
        ValidationCode::SortOrder,
        || format!("{what} is not sorted and unique"),
    )
}

fn ensure_unique<'a>(ids: impl IntoIterator<Item = &'a str>, what: &str) -> Checked {
    let mut seen = HashSet::new();
    for id in ids {
        ensure(seen.insert(id), ValidationCode::DuplicateId, || {
            format!("duplicate {what} id {id}")
        })?;
    }
    Ok(())
}

/// Validates `doc`, running the diagnostic-coherence checks when `strict`.
pub fn validate_document(doc: &ElementaryAssertionsDocument, strict: bool) -> Checked {
    check_shape(doc)?;
    check_ids(doc)?;
    let mentions: HashMap<&str, &Mention> =
        doc.mentions.iter().map(|m| (m.id.as_str(), m)).collect();
    check_references(doc, &mentions)?;
    check_primary_partition(doc)?;
    check_coverage(doc, &mentions)?;
    check_sort_order(doc)?;
    check_disjointness(doc, &mentions)?;
    check_suppression_traces(doc)?;
    if strict {
        check_diagnostic_coherence(doc)?;
    }
    Ok(())
}

fn check_shape(doc: &ElementaryAssertionsDocument) -> Checked {
    ensure(doc.stage == STAGE, ValidationCode::SchemaShape, || {
        format!("stage must be {STAGE}, found {}", doc.stage)
    })?;
    ensure(
        doc.index_basis == IndexBasis::default(),
        ValidationCode::SchemaShape,
        || "index_basis must be canonical_text/utf16_code_units".to_string(),
    )?;
    for token in &doc.tokens {
        ensure(token.span.start <= token.span.end, ValidationCode::SchemaShape, || {
            format!("token {} has an inverted span", token.id)
        })?;
    }
    for mention in &doc.mentions {
        ensure(!mention.token_ids.is_empty(), ValidationCode::SchemaShape, || {
            format!("mention {} has no tokens", mention.id)
        })?;
    }
    for assertion in &doc.assertions {
        ensure(
            assertion.roles().all(|entry| !entry.mention_ids.is_empty()),
            ValidationCode::SchemaShape,
            || format!("assertion {} has an empty role entry", assertion.id),
        )?;
    }
    for trace in &doc.diagnostics.suppressed_assertions {
        let reason = trace.diagnostics.suppressed_by.reason;
        ensure(
            !reason.is_role_carrier()
                || (trace.transferred_buckets.is_some() && trace.transferred_mention_ids.is_some()),
            ValidationCode::SchemaShape,
            || format!("role-carrier trace {} lacks its transfer payload", trace.id),
        )?;
    }
    Ok(())
}

fn check_ids(doc: &ElementaryAssertionsDocument) -> Checked {
    ensure_unique(doc.segments.iter().map(|s| s.id.as_str()), "segment")?;
    ensure_unique(doc.tokens.iter().map(|t| t.id.as_str()), "token")?;
    ensure_unique(doc.mentions.iter().map(|m| m.id.as_str()), "mention")?;
    ensure_unique(
        doc.assertions
            .iter()
            .map(|a| a.id.as_str())
            .chain(doc.diagnostics.suppressed_assertions.iter().map(|s| s.id.as_str())),
        "assertion",
    )?;
    ensure_unique(
        doc.relation_projection
            .all_relations
            .iter()
            .map(|r| r.relation_id.as_str()),
        "relation",
    )
}

fn unknown(what: &str, id: &str) -> ValidationError {
    ValidationError::new(ValidationCode::UnknownReference, format!("unknown {what} {id}"))
}

fn check_references(doc: &ElementaryAssertionsDocument, mentions: &HashMap<&str, &Mention>) -> Checked {
    let tokens: HashSet<&str> = doc.tokens.iter().map(|t| t.id.as_str()).collect();
    let segments: HashSet<&str> = doc.segments.iter().map(|s| s.id.as_str()).collect();
    let assertions: HashSet<&str> = doc.assertions.iter().map(|a| a.id.as_str()).collect();
    for token in &doc.tokens {
        if !segments.contains(token.segment_id.as_str()) {
            return Err(unknown("segment", &token.segment_id));
        }
    }
    for mention in &doc.mentions {
        if let Some(id) = mention.token_ids.iter().find(|id| !tokens.contains(id.as_str())) {
            return Err(unknown("token", id));
        }
        ensure(
            mention.contains_token(&mention.head_token_id),
            ValidationCode::UnknownReference,
            || format!("mention {} head is outside the mention", mention.id),
        )?;
    }
    for assertion in &doc.assertions {
        let Some(predicate) = mentions.get(assertion.predicate.mention_id.as_str()) else {
            return Err(unknown("predicate mention", &assertion.predicate.mention_id));
        };
        ensure(
            predicate.head_token_id == assertion.predicate.head_token_id,
            ValidationCode::UnknownReference,
            || format!("assertion {} predicate head does not match its mention", assertion.id),
        )?;
        if let Some(id) = assertion.role_mention_ids().find(|id| !mentions.contains_key(id)) {
            return Err(unknown("role mention", id));
        }
        if let Some(id) = assertion
            .evidence
            .token_ids
            .iter()
            .find(|id| !tokens.contains(id.as_str()))
        {
            return Err(unknown("evidence token", id));
        }
    }
    for relation in &doc.relation_projection.projected_relations {
        for id in [&relation.head_mention_id, &relation.dep_mention_id] {
            if !mentions.contains_key(id.as_str()) {
                return Err(unknown("relation mention", id));
            }
        }
    }
    for trace in &doc.diagnostics.suppressed_assertions {
        let target = &trace.diagnostics.suppressed_by.target_assertion_id;
        if !assertions.contains(target.as_str()) {
            return Err(unknown("suppression target", target));
        }
    }
    Ok(())
}

fn check_primary_partition(doc: &ElementaryAssertionsDocument) -> Checked {
    let mut owners: HashMap<&str, usize> = HashMap::new();
    for mention in doc.mentions.iter().filter(|m| m.is_primary) {
        for id in &mention.token_ids {
            *owners.entry(id.as_str()).or_default() += 1;
        }
    }
    for token in &doc.tokens {
        let count = owners.get(token.id.as_str()).copied().unwrap_or(0);
        ensure(count == 1, ValidationCode::PrimaryPartition, || {
            format!("token {} is in {count} primary mentions", token.id)
        })?;
    }
    Ok(())
}

fn check_coverage(doc: &ElementaryAssertionsDocument, mentions: &HashMap<&str, &Mention>) -> Checked {
    let coverage = &doc.coverage;
    let primary: BTreeSet<&str> = coverage.primary_mention_ids.iter().map(String::as_str).collect();
    let covered: BTreeSet<&str> = coverage
        .covered_primary_mention_ids
        .iter()
        .map(String::as_str)
        .collect();
    let uncovered: BTreeSet<&str> = coverage
        .uncovered_primary_mention_ids
        .iter()
        .map(String::as_str)
        .collect();
    let unresolved: BTreeSet<&str> = coverage
        .unresolved
        .iter()
        .map(|u| u.mention_id.as_str())
        .collect();

    ensure(
        primary
            .iter()
            .all(|id| mentions.get(id).map_or(false, |m| m.is_primary)),
        ValidationCode::CoveragePartition,
        || "coverage lists a mention that is not primary".to_string(),
    )?;
    ensure(
        covered.is_disjoint(&uncovered)
            && covered.union(&uncovered).copied().collect::<BTreeSet<_>>() == primary,
        ValidationCode::CoveragePartition,
        || "covered and uncovered do not partition the primary mentions".to_string(),
    )?;
    ensure(
        coverage.unresolved.len() == uncovered.len() && unresolved == uncovered,
        ValidationCode::CoveragePartition,
        || "unresolved entries do not match uncovered mentions".to_string(),
    )
}

fn role_sort_key(entry: &RoleEntry) -> (usize, &str) {
    (lexical::role_priority(&entry.role), entry.role.as_str())
}

fn check_assertion_order(assertion: &Assertion) -> Checked {
    let what = |field: &str| format!("assertion {} {field}", assertion.id);
    ensure_sorted_unique(&assertion.evidence.token_ids, &what("evidence.token_ids"))?;
    for entries in [&assertion.arguments, &assertion.modifiers] {
        ensure(
            entries
                .windows(2)
                .all(|pair| role_sort_key(&pair[0]) < role_sort_key(&pair[1])),
            ValidationCode::SortOrder,
            || what("role entries"),
        )?;
        for entry in entries {
            ensure_sorted_unique(&entry.mention_ids, &what("mention_ids"))?;
            ensure_sorted_unique(&entry.evidence.relation_ids, &what("role relation_ids"))?;
            ensure_sorted_unique(&entry.evidence.token_ids, &what("role token_ids"))?;
        }
    }
    ensure(
        assertion
            .evidence
            .relations
            .windows(2)
            .all(|pair| pair[0].sort_key() < pair[1].sort_key()),
        ValidationCode::SortOrder,
        || what("evidence.relations"),
    )?;
    ensure(
        assertion
            .operators
            .windows(2)
            .all(|pair| pair[0].sort_key() < pair[1].sort_key()),
        ValidationCode::SortOrder,
        || what("operators"),
    )
}

fn check_sort_order(doc: &ElementaryAssertionsDocument) -> Checked {
    let starts: HashMap<&str, usize> = doc.tokens.iter().map(|t| (t.id.as_str(), t.span.start)).collect();
    let key = |a: &Assertion| {
        (
            a.segment_id.clone(),
            starts.get(a.predicate.head_token_id.as_str()).copied().unwrap_or(usize::MAX),
            a.id.clone(),
        )
    };
    ensure(
        doc.assertions.windows(2).all(|pair| key(&pair[0]) < key(&pair[1])),
        ValidationCode::SortOrder,
        || "assertions are not in (segment, predicate start, id) order".to_string(),
    )?;
    for assertion in &doc.assertions {
        check_assertion_order(assertion)?;
    }
    ensure(
        doc.mentions.windows(2).all(|pair| {
            (&pair[0].segment_id, pair[0].span) <= (&pair[1].segment_id, pair[1].span)
        }),
        ValidationCode::SortOrder,
        || "mentions are not in (segment, span) order".to_string(),
    )?;
    ensure(
        doc.tokens.windows(2).all(|pair| pair[0].i < pair[1].i),
        ValidationCode::SortOrder,
        || "tokens are not in sequence order".to_string(),
    )?;
    let suppressed: Vec<String> = doc
        .diagnostics
        .suppressed_assertions
        .iter()
        .map(|s| s.id.clone())
        .collect();
    ensure_sorted_unique(&suppressed, "suppressed_assertions")?;
    for trace in &doc.diagnostics.suppressed_assertions {
        let evidence = &trace.diagnostics.suppressed_by.evidence;
        ensure_sorted_unique(&evidence.relation_ids, "suppression relation_ids")?;
        ensure_sorted_unique(&evidence.token_ids, "suppression token_ids")?;
        for ids in [&trace.transferred_buckets, &trace.transferred_mention_ids]
            .into_iter()
            .flatten()
        {
            ensure_sorted_unique(ids, "transferred ids")?;
        }
    }
    let coverage = &doc.coverage;
    ensure_sorted_unique(&coverage.primary_mention_ids, "coverage.primary_mention_ids")?;
    ensure_sorted_unique(&coverage.covered_primary_mention_ids, "coverage.covered_primary_mention_ids")?;
    ensure_sorted_unique(
        &coverage.uncovered_primary_mention_ids,
        "coverage.uncovered_primary_mention_ids",
    )?;
    let groups: Vec<String> = doc
        .diagnostics
        .coordination_groups
        .iter()
        .map(|g| g.id.clone())
        .collect();
    ensure_sorted_unique(&groups, "coordination_groups")?;
    for group in &doc.diagnostics.coordination_groups {
        ensure_sorted_unique(&group.member_mention_ids, "coordination member_mention_ids")?;
        ensure_sorted_unique(&group.predicate_assertion_ids, "coordination predicate_assertion_ids")?;
    }
    let accepted: Vec<String> = doc.accepted_annotations.iter().map(|a| a.id.clone()).collect();
    ensure_sorted_unique(&accepted, "accepted_annotations")?;
    ensure_sorted_unique(&doc.diagnostics.warnings, "warnings")
}

fn check_disjointness(doc: &ElementaryAssertionsDocument, mentions: &HashMap<&str, &Mention>) -> Checked {
    for assertion in &doc.assertions {
        let Some(predicate) = mentions.get(assertion.predicate.mention_id.as_str()) else {
            continue;
        };
        let verbal = assertion.diagnostics.predicate_class.is_verbal();
        for id in assertion.role_mention_ids() {
            let Some(mention) = mentions.get(id) else {
                continue;
            };
            let shared = mention
                .token_ids
                .iter()
                .filter(|token| predicate.contains_token(token))
                .count();
            let clash = if verbal {
                shared > 0
            } else {
                shared == mention.token_ids.len()
            };
            ensure(!clash, ValidationCode::TokenDisjointness, || {
                format!("assertion {} role mention {id} overlaps its predicate", assertion.id)
            })?;
        }
    }
    Ok(())
}

fn check_suppression_traces(doc: &ElementaryAssertionsDocument) -> Checked {
    let hosts: HashMap<&str, &Assertion> = doc.assertions.iter().map(|a| (a.id.as_str(), a)).collect();
    for trace in &doc.diagnostics.suppressed_assertions {
        let by = &trace.diagnostics.suppressed_by;
        let Some(host) = hosts.get(by.target_assertion_id.as_str()) else {
            continue;
        };
        let must_carry = matches!(
            by.reason,
            SuppressionReason::RoleCarrierSuppressedV2Nominal
                | SuppressionReason::CopulaBucketSinkSuppressed
        );
        if !must_carry {
            continue;
        }
        let host_mentions: BTreeSet<&str> = host.role_mention_ids().collect();
        for id in trace.transferred_mention_ids.iter().flatten() {
            ensure(
                host_mentions.contains(id.as_str()),
                ValidationCode::SuppressionTrace,
                || format!("trace {} transferred {id} but host {} lacks it", trace.id, host.id),
            )?;
        }
    }
    Ok(())
}

fn check_diagnostic_coherence(doc: &ElementaryAssertionsDocument) -> Checked {
    let incoherent = |what: &str| {
        ValidationError::new(ValidationCode::DiagnosticCoherence, format!("{what} is incoherent"))
    };
    let gaps = &doc.diagnostics.gap_signals;
    if gaps.uncovered_primary_count != doc.coverage.uncovered_primary_mention_ids.len() {
        return Err(incoherent("gap_signals.uncovered_primary_count"));
    }
    if gaps.dropped_relation_count != doc.relation_projection.dropped_relations.len() {
        return Err(incoherent("gap_signals.dropped_relation_count"));
    }
    if gaps.subject_role_gap_count != doc.diagnostics.subject_role_gaps.len() {
        return Err(incoherent("gap_signals.subject_role_gap_count"));
    }
    let mut by_reason: BTreeMap<String, usize> = BTreeMap::new();
    for unresolved in &doc.coverage.unresolved {
        *by_reason.entry(unresolved.reason.as_str().to_string()).or_default() += 1;
    }
    if gaps.unresolved_by_reason != by_reason {
        return Err(incoherent("gap_signals.unresolved_by_reason"));
    }
    let fragments = doc
        .assertions
        .iter()
        .filter(|a| a.diagnostics.structural_fragment)
        .count();
    if gaps.structural_fragment_count != fragments {
        return Err(incoherent("gap_signals.structural_fragment_count"));
    }

    for assertion in &doc.assertions {
        let diagnostics = &assertion.diagnostics;
        if diagnostics.structural_fragment && !diagnostics.predicate_class.is_structural() {
            return Err(incoherent(&format!("assertion {} structural_fragment", assertion.id)));
        }
        if let Some(eligibility) = &diagnostics.suppression_eligibility {
            if eligibility.eligible != eligibility.failure_reason.is_none() {
                return Err(incoherent(&format!("assertion {} suppression_eligibility", assertion.id)));
            }
        }
    }

    for segment in &doc.diagnostics.fragmentation.segments {
        let in_segment: Vec<&Assertion> = doc
            .assertions
            .iter()
            .filter(|a| a.segment_id == segment.segment_id)
            .collect();
        let fragments = in_segment.iter().filter(|a| a.diagnostics.structural_fragment).count();
        let expected_warning = segment.fragment_count > segment.tolerated_predicate_count;
        let warned = doc
            .diagnostics
            .warnings
            .contains(&format!("fragmentation_exceeds_tolerance:{}", segment.segment_id));
        if segment.predicate_count != in_segment.len()
            || segment.fragment_count != fragments
            || segment.warning != expected_warning
            || warned != expected_warning
        {
            return Err(incoherent(&format!("fragmentation of {}", segment.segment_id)));
        }
    }

    let assertion_ids: HashSet<&str> = doc.assertions.iter().map(|a| a.id.as_str()).collect();
    for gap in &doc.diagnostics.subject_role_gaps {
        if !assertion_ids.contains(gap.assertion_id.as_str()) {
            return Err(incoherent(&format!("subject role gap {}", gap.assertion_id)));
        }
    }
    for group in &doc.diagnostics.coordination_groups {
        if group
            .predicate_assertion_ids
            .iter()
            .any(|id| !assertion_ids.contains(id.as_str()))
        {
            return Err(incoherent(&format!("coordination group {}", group.id)));
        }
    }
    Ok(())
}
