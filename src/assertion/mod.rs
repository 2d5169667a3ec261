//! Assertion building over projected relations.
//!
//! Phases run in a fixed order:
//!
//! 1. synthesis per candidate predicate, with lexical upgrades
//! 2. fallback for verbs the relation graph left without an assertion
//! 3. coordination peers of asserted predicates
//! 4. structural fragment tagging
//! 5. modality merge into lexical hosts
//! 6. role-carrier suppression
//!
//! A final pass recomputes content ids, remaps every trace target and sorts
//! the output.

mod draft;
mod eligibility;
mod fallback;
mod merge;
mod shape;
mod suppression;
mod synthesis;

use std::collections::{BTreeSet, HashMap};

use elementary_assertions_document::{Assertion, SuppressedAssertion};
use tracing::debug;

use crate::config::BuilderConfig;
use crate::lexical;
use crate::mention::MentionSet;
use crate::projection::Projection;
use crate::token_index::TokenIndex;

pub(crate) use shape::role_tokens;

/// Everything the phases read from.
pub(crate) struct BuildContext<'a> {
    pub index: &'a TokenIndex<'a>,
    pub mentions: &'a MentionSet,
    pub projection: &'a Projection,
    pub config: &'a BuilderConfig,
}

/// Surviving assertions plus what was folded away.
#[derive(Debug, Clone, Default)]
pub struct AssertionSet {
    pub assertions: Vec<Assertion>,
    pub suppressed: Vec<SuppressedAssertion>,
    /// Predicate mentions rejected as scaffolding or dropped outright.
    pub invalid_predicates: BTreeSet<String>,
}

pub(crate) fn build_assertions(ctx: &BuildContext<'_>) -> AssertionSet {
    let synthesis = synthesis::synthesize(ctx);
    let mut assertions = synthesis.assertions;
    let mut suppressed = synthesis.suppressed;

    let fallbacks = fallback::synthesize_fallbacks(ctx, &assertions, &synthesis.handled);
    assertions.extend(fallbacks);
    let peers = fallback::synthesize_coordination_peers(ctx, &assertions);
    assertions.extend(peers);

    eligibility::tag_structural_fragments(ctx, &mut assertions);
    merge::merge_modality(ctx, &mut assertions, &mut suppressed);
    suppression::suppress_role_carriers(ctx, &mut assertions, &mut suppressed);

    finish(ctx, &mut assertions, &mut suppressed);
    debug!(
        assertions = assertions.len(),
        suppressed = suppressed.len(),
        "built assertions"
    );
    AssertionSet {
        assertions,
        suppressed,
        invalid_predicates: synthesis.invalid,
    }
}

/// Rekeys, remaps trace targets, re-tags fragments and sorts.
fn finish(
    ctx: &BuildContext<'_>,
    assertions: &mut Vec<Assertion>,
    suppressed: &mut Vec<SuppressedAssertion>,
) {
    let mut rekeyed: HashMap<String, String> = HashMap::new();
    for assertion in assertions.iter_mut() {
        if let Some(token) = ctx.index.get(&assertion.predicate.head_token_id) {
            assertion.diagnostics.predicate_class = lexical::classify_predicate(token);
            assertion.diagnostics.predicate_quality = lexical::predicate_quality(token);
        }
        let previous = shape::rekey(assertion, ctx.mentions);
        if previous != assertion.id {
            rekeyed.insert(previous, assertion.id.clone());
        }
    }
    for trace in suppressed.iter_mut() {
        let target = &mut trace.diagnostics.suppressed_by.target_assertion_id;
        if let Some(current) = rekeyed.get(target.as_str()) {
            *target = current.clone();
        }
    }

    // host ids may have changed, so eligibility is recomputed
    eligibility::tag_structural_fragments(ctx, assertions);

    assertions.sort_by_cached_key(|assertion| {
        let start = ctx
            .index
            .get(&assertion.predicate.head_token_id)
            .map_or(usize::MAX, |token| token.span.start);
        (assertion.segment_id.clone(), start, assertion.id.clone())
    });
    suppressed.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Mention-level view of who heads which assertion.
pub(crate) fn predicate_mentions(assertions: &[Assertion]) -> BTreeSet<&str> {
    assertions
        .iter()
        .map(|assertion| assertion.predicate.mention_id.as_str())
        .collect()
}

/// Token distance between two assertions' predicate heads.
pub(crate) fn head_distance(index: &TokenIndex<'_>, a: &Assertion, b: &Assertion) -> usize {
    index.distance(&a.predicate.head_token_id, &b.predicate.head_token_id)
}
