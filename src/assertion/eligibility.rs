//! Structural fragment tagging and suppression eligibility.
//!
//! Prepositional and nominal predicates in a segment that already has a
//! lexical verb are fragments of that verb's clause. Eligibility explains
//! whether such a fragment could be folded into a host.

use std::collections::BTreeSet;

use elementary_assertions_document::{
    Assertion, EligibilityFailure, PredicateClass, SuppressionEligibility,
};

use super::{head_distance, shape, BuildContext};

/// Evidence tokens of `source` minus its predicate and operator tokens.
pub(crate) fn source_non_operator_tokens(ctx: &BuildContext<'_>, source: &Assertion) -> BTreeSet<String> {
    let predicate: BTreeSet<&str> = ctx
        .mentions
        .get(&source.predicate.mention_id)
        .map(|m| m.token_ids.iter().map(String::as_str).collect())
        .unwrap_or_else(|| BTreeSet::from([source.predicate.head_token_id.as_str()]));
    let operators = shape::operator_tokens(source);
    source
        .evidence
        .token_ids
        .iter()
        .filter(|id| !predicate.contains(id.as_str()) && !operators.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Tokens of `needed` missing from the host's evidence tokens.
pub(crate) fn missing_in_host(host: &Assertion, needed: &BTreeSet<String>) -> Vec<String> {
    let host_tokens: BTreeSet<&str> = host.evidence.token_ids.iter().map(String::as_str).collect();
    needed
        .iter()
        .filter(|id| !host_tokens.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Lexical-verb assertions in the source's segment, nearest first. With
/// `same_clause`, the host head must sit in the source's clause window.
pub(crate) fn lexical_hosts<'s>(
    ctx: &BuildContext<'_>,
    source: &Assertion,
    assertions: &'s [Assertion],
    same_clause: bool,
) -> Vec<&'s Assertion> {
    let window: BTreeSet<&str> = ctx
        .index
        .clause_window(&source.predicate.head_token_id)
        .into_iter()
        .collect();
    let mut hosts: Vec<&Assertion> = assertions
        .iter()
        .filter(|host| host.id != source.id && host.segment_id == source.segment_id)
        .filter(|host| host.diagnostics.predicate_class == PredicateClass::LexicalVerb)
        .filter(|host| !same_clause || window.contains(host.predicate.head_token_id.as_str()))
        .collect();
    hosts.sort_by(|a, b| {
        head_distance(ctx.index, source, a)
            .cmp(&head_distance(ctx.index, source, b))
            .then_with(|| a.id.cmp(&b.id))
    });
    hosts
}

fn eligibility(ctx: &BuildContext<'_>, source: &Assertion, assertions: &[Assertion]) -> SuppressionEligibility {
    let non_operator = source_non_operator_tokens(ctx, source);
    let hosts = lexical_hosts(ctx, source, assertions, true);
    let missing_in = |host: &Assertion| missing_in_host(host, &non_operator);

    let mut result = SuppressionEligibility {
        eligible: false,
        failure_reason: Some(EligibilityFailure::NoHost),
        candidate_host_assertion_id: None,
        source_non_operator_token_ids: non_operator.iter().cloned().collect(),
        missing_in_host_token_ids: Vec::new(),
    };
    let Some(&nearest) = hosts.first() else {
        return result;
    };
    if !source.arguments.is_empty() {
        result.failure_reason = Some(EligibilityFailure::HasCoreSlots);
        result.candidate_host_assertion_id = Some(nearest.id.clone());
        result.missing_in_host_token_ids = missing_in(nearest);
        return result;
    }
    match hosts.iter().copied().find(|host| missing_in(host).is_empty()) {
        Some(host) => {
            result.eligible = true;
            result.failure_reason = None;
            result.candidate_host_assertion_id = Some(host.id.clone());
        }
        None => {
            result.failure_reason = Some(EligibilityFailure::NoContainment);
            result.candidate_host_assertion_id = Some(nearest.id.clone());
            result.missing_in_host_token_ids = missing_in(nearest);
        }
    }
    result
}

/// Sets `structural_fragment` and `suppression_eligibility` on every
/// assertion.
pub(crate) fn tag_structural_fragments(ctx: &BuildContext<'_>, assertions: &mut [Assertion]) {
    let lexical_segments: BTreeSet<String> = assertions
        .iter()
        .filter(|a| a.diagnostics.predicate_class == PredicateClass::LexicalVerb)
        .map(|a| a.segment_id.clone())
        .collect();

    let tagged: Vec<(bool, Option<SuppressionEligibility>)> = assertions
        .iter()
        .map(|assertion| {
            let class = assertion.diagnostics.predicate_class;
            let has_lexical = lexical_segments.contains(&assertion.segment_id);
            let fragment = class.is_structural() && has_lexical;
            let checked = fragment || (class == PredicateClass::Auxiliary && has_lexical);
            (fragment, checked.then(|| eligibility(ctx, assertion, assertions)))
        })
        .collect();

    for (assertion, (fragment, eligibility)) in assertions.iter_mut().zip(tagged) {
        assertion.diagnostics.structural_fragment = fragment;
        assertion.diagnostics.suppression_eligibility = eligibility;
    }
}

#[cfg(test)]
mod tests {
    use elementary_assertions_document::RelationsDocument;

    use crate::tests::fixtures::{with_context, DocBuilder};

    use super::super::synthesis::synthesize;
    use super::*;

    /// Synthesized assertions with fragments tagged.
    fn tagged(doc: &RelationsDocument) -> Vec<Assertion> {
        with_context(doc, |ctx| {
            let mut assertions = synthesize(ctx).assertions;
            tag_structural_fragments(ctx, &mut assertions);
            assertions
        })
    }

    fn headed<'a>(assertions: &'a [Assertion], token_id: &str) -> &'a Assertion {
        assertions
            .iter()
            .find(|a| a.predicate.head_token_id == token_id)
            .unwrap()
    }

    fn carts_with_wheels() -> DocBuilder {
        DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                ("with", "IN"),
                ("wheels", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation("t2", "nmod", "t4")
    }

    #[test]
    fn test_fragment_contained_in_host_is_eligible() {
        let assertions = tagged(&carts_with_wheels().relation("t1", "obl", "t4").build());
        let host = headed(&assertions, "t1");
        let carts = headed(&assertions, "t2");

        assert!(carts.diagnostics.structural_fragment);
        let eligibility = carts.diagnostics.suppression_eligibility.as_ref().unwrap();
        assert!(eligibility.eligible);
        assert_eq!(eligibility.failure_reason, None);
        assert_eq!(eligibility.candidate_host_assertion_id.as_deref(), Some(host.id.as_str()));
        assert_eq!(eligibility.source_non_operator_token_ids, vec!["t4"]);
        assert!(eligibility.missing_in_host_token_ids.is_empty());
        assert!(!host.diagnostics.structural_fragment);
        assert!(host.diagnostics.suppression_eligibility.is_none());
    }

    #[test]
    fn test_fragment_with_unshared_tokens_lacks_containment() {
        let assertions = tagged(&carts_with_wheels().build());
        let host = headed(&assertions, "t1");
        let eligibility = headed(&assertions, "t2")
            .diagnostics
            .suppression_eligibility
            .clone()
            .unwrap();

        assert!(!eligibility.eligible);
        assert_eq!(eligibility.failure_reason, Some(EligibilityFailure::NoContainment));
        assert_eq!(eligibility.candidate_host_assertion_id, Some(host.id.clone()));
        assert_eq!(eligibility.missing_in_host_token_ids, vec!["t4"]);
    }

    #[test]
    fn test_fragment_in_another_clause_has_no_host() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("carts", "NNS"),
                (";", ":"),
                ("trips", "NNS"),
                ("with", "IN"),
                ("wheels", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation("t4", "nmod", "t6")
            .build();
        let assertions = tagged(&doc);
        let trips = headed(&assertions, "t4");

        assert!(trips.diagnostics.structural_fragment);
        let eligibility = trips.diagnostics.suppression_eligibility.as_ref().unwrap();
        assert_eq!(eligibility.failure_reason, Some(EligibilityFailure::NoHost));
        assert_eq!(eligibility.candidate_host_assertion_id, None);
        assert_eq!(eligibility.source_non_operator_token_ids, vec!["t6"]);
    }

    #[test]
    fn test_fragment_with_arguments_has_core_slots() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("starts", "VBZ"),
                ("construction", "NN"),
                ("of", "IN"),
                ("carts", "NNS"),
                (".", "."),
            ])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .relation("t2", "obj", "t4")
            .build();
        let assertions = tagged(&doc);
        let host = headed(&assertions, "t1");
        let eligibility = headed(&assertions, "t2")
            .diagnostics
            .suppression_eligibility
            .clone()
            .unwrap();

        assert_eq!(eligibility.failure_reason, Some(EligibilityFailure::HasCoreSlots));
        assert_eq!(eligibility.candidate_host_assertion_id, Some(host.id.clone()));
        assert_eq!(eligibility.missing_in_host_token_ids, vec!["t4"]);
    }

    #[test]
    fn test_missing_in_host_lists_absent_tokens() {
        let assertions = tagged(&carts_with_wheels().build());
        let host = headed(&assertions, "t1");
        let needed: BTreeSet<String> = ["t0", "t4", "t5"].iter().map(|t| t.to_string()).collect();
        assert_eq!(missing_in_host(host, &needed), vec!["t4", "t5"]);
    }
}
