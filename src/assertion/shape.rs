//! Constructors and normalization for assertion records.
//!
//! Every phase mutates assertions through these helpers and calls
//! [`normalize`] afterwards, so ordering and ids stay canonical.

use std::collections::BTreeSet;

use elementary_assertions_document::{
    Assertion, AssertionDiagnostics, AssertionEvidence, EvidenceItem, Mention, Operator,
    PredicateRef, ProjectedRelation, RoleEntry, RoleEvidence,
};

use crate::ids;
use crate::lexical::{self, CoreRole};
use crate::mention::MentionSet;
use crate::token_index::TokenIndex;

/// An assertion with no roles, operators or relation evidence yet.
pub(crate) fn empty_assertion(predicate: &Mention, index: &TokenIndex<'_>) -> Assertion {
    let (class, quality) = match index.get(&predicate.head_token_id) {
        Some(token) => (
            lexical::classify_predicate(token),
            lexical::predicate_quality(token),
        ),
        None => (
            elementary_assertions_document::PredicateClass::NominalHead,
            elementary_assertions_document::PredicateQuality::Ok,
        ),
    };
    Assertion {
        id: String::new(),
        segment_id: predicate.segment_id.clone(),
        predicate: PredicateRef {
            mention_id: predicate.id.clone(),
            head_token_id: predicate.head_token_id.clone(),
        },
        arguments: Vec::new(),
        modifiers: Vec::new(),
        operators: Vec::new(),
        evidence: AssertionEvidence {
            relations: Vec::new(),
            token_ids: predicate.token_ids.clone(),
        },
        diagnostics: AssertionDiagnostics {
            predicate_quality: quality,
            predicate_class: class,
            structural_fragment: false,
            suppression_eligibility: None,
            slot_projection_choice: Vec::new(),
        },
    }
}

pub(crate) fn evidence_item(relation: &ProjectedRelation) -> EvidenceItem {
    EvidenceItem {
        relation_id: relation.relation_id.clone(),
        label: relation.label.clone(),
        from_token_id: relation.head_token_id.clone(),
        to_token_id: relation.dep_token_id.clone(),
        evidence: relation.evidence.clone(),
    }
}

/// Adds `mention_id` to the `role` bucket, creating the bucket if needed.
pub(crate) fn add_role_mention(
    assertion: &mut Assertion,
    role: &str,
    mention_id: &str,
    relation_ids: &[String],
) {
    let entries = if CoreRole::parse(role).is_some() {
        &mut assertion.arguments
    } else {
        &mut assertion.modifiers
    };
    let entry = match entries.iter().position(|entry| entry.role == role) {
        Some(ix) => &mut entries[ix],
        None => {
            entries.push(RoleEntry {
                role: role.to_string(),
                mention_ids: Vec::new(),
                evidence: RoleEvidence::default(),
            });
            let last = entries.len() - 1;
            &mut entries[last]
        }
    };
    if !entry.mention_ids.iter().any(|id| id == mention_id) {
        entry.mention_ids.push(mention_id.to_string());
    }
    for relation_id in relation_ids {
        if !entry.evidence.relation_ids.contains(relation_id) {
            entry.evidence.relation_ids.push(relation_id.clone());
        }
    }
}

/// Merges `operator` into the assertion, joining evidence on duplicates.
pub(crate) fn add_operator(assertion: &mut Assertion, operator: Operator) {
    match assertion
        .operators
        .iter_mut()
        .find(|existing| existing.sort_key() == operator.sort_key())
    {
        Some(existing) => existing.evidence.extend(operator.evidence),
        None => assertion.operators.push(operator),
    }
}

pub(crate) fn add_evidence(assertion: &mut Assertion, item: EvidenceItem) {
    if !assertion
        .evidence
        .relations
        .iter()
        .any(|existing| existing.relation_id == item.relation_id)
    {
        assertion.evidence.relations.push(item);
    }
}

/// Tokens of every role mention.
pub(crate) fn role_tokens<'m>(assertion: &Assertion, mentions: &'m MentionSet) -> BTreeSet<&'m str> {
    assertion
        .role_mention_ids()
        .filter_map(|id| mentions.get(id))
        .flat_map(|mention| mention.token_ids.iter().map(String::as_str))
        .collect()
}

/// Token ids referenced by operators, including their evidence endpoints.
pub(crate) fn operator_tokens(assertion: &Assertion) -> BTreeSet<&str> {
    let mut tokens = BTreeSet::new();
    for operator in &assertion.operators {
        if let Some(token_id) = &operator.token_id {
            tokens.insert(token_id.as_str());
        }
        for item in &operator.evidence {
            tokens.insert(item.to_token_id.as_str());
        }
    }
    tokens
}

fn sort_dedup(values: &mut Vec<String>) {
    values.sort();
    values.dedup();
}

fn sort_evidence(items: &mut Vec<EvidenceItem>) {
    items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    items.dedup_by(|a, b| a.relation_id == b.relation_id);
}

fn normalize_entries(entries: &mut Vec<RoleEntry>, mentions: &MentionSet) {
    entries.retain(|entry| !entry.mention_ids.is_empty());
    for entry in entries.iter_mut() {
        sort_dedup(&mut entry.mention_ids);
        sort_dedup(&mut entry.evidence.relation_ids);
        let mut tokens: Vec<String> = entry
            .mention_ids
            .iter()
            .filter_map(|id| mentions.get(id))
            .flat_map(|mention| mention.token_ids.iter().cloned())
            .collect();
        sort_dedup(&mut tokens);
        entry.evidence.token_ids = tokens;
    }
    entries.sort_by(|a, b| {
        lexical::role_priority(&a.role)
            .cmp(&lexical::role_priority(&b.role))
            .then_with(|| a.role.cmp(&b.role))
    });
}

/// Puts every array of the assertion in canonical order and recomputes the
/// evidence token set. The id is left alone; see [`rekey`].
pub(crate) fn normalize(assertion: &mut Assertion, mentions: &MentionSet) {
    normalize_entries(&mut assertion.arguments, mentions);
    normalize_entries(&mut assertion.modifiers, mentions);

    let mut merged: Vec<Operator> = Vec::new();
    for operator in assertion.operators.drain(..) {
        match merged
            .iter_mut()
            .find(|existing| existing.sort_key() == operator.sort_key())
        {
            Some(existing) => existing.evidence.extend(operator.evidence),
            None => merged.push(operator),
        }
    }
    for operator in &mut merged {
        sort_evidence(&mut operator.evidence);
    }
    merged.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    assertion.operators = merged;

    sort_evidence(&mut assertion.evidence.relations);

    let mut tokens: BTreeSet<String> = assertion.evidence.token_ids.drain(..).collect();
    if let Some(predicate) = mentions.get(&assertion.predicate.mention_id) {
        tokens.extend(predicate.token_ids.iter().cloned());
    }
    tokens.extend(role_tokens(assertion, mentions).into_iter().map(str::to_string));
    tokens.extend(operator_tokens(assertion).into_iter().map(str::to_string));
    for item in &assertion.evidence.relations {
        tokens.insert(item.from_token_id.clone());
        tokens.insert(item.to_token_id.clone());
    }
    assertion.evidence.token_ids = tokens.into_iter().collect();
}

/// Normalizes and assigns the content id. Returns the previous id.
pub(crate) fn rekey(assertion: &mut Assertion, mentions: &MentionSet) -> String {
    normalize(assertion, mentions);
    let id = ids::assertion_id(assertion);
    std::mem::replace(&mut assertion.id, id)
}

/// True when the assertion has no roles and no operators.
pub(crate) fn is_empty(assertion: &Assertion) -> bool {
    assertion.arguments.is_empty() && assertion.modifiers.is_empty() && assertion.operators.is_empty()
}
