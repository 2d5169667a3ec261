//! Working representation of an assertion while its buckets are assembled.

use std::collections::BTreeMap;

use elementary_assertions_document::{
    Assertion, EvidenceItem, Mention, MentionKind, Operator, PredicateClass, PredicateQuality,
    ProjectedRelation, SlotProjectionChoice, Token,
};
use tracing::trace;

use crate::lexical::{self, CoreRole, LabelRoute, OperatorKind};
use crate::mention::{choose_best_mention_for_token, Exclusion, MentionPreference};

use super::shape;
use super::BuildContext;

/// One mention placed in a role bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub mention_id: String,
    pub relation_id: Option<String>,
}

/// Why a draft is not turned into an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Empty,
    BareGerund,
    CoordinationOnly,
    ModifierOnlyNominal,
}

impl Rejection {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Rejection::Empty => "empty",
            Rejection::BareGerund => "bare_gerund",
            Rejection::CoordinationOnly => "coordination_only",
            Rejection::ModifierOnlyNominal => "modifier_only_nominal",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Draft<'c> {
    pub predicate: &'c Mention,
    pub token: &'c Token,
    pub class: PredicateClass,
    pub quality: PredicateQuality,
    pub buckets: BTreeMap<String, Vec<Slot>>,
    pub operators: Vec<Operator>,
    pub evidence: Vec<EvidenceItem>,
    pub choices: Vec<SlotProjectionChoice>,
}

impl<'c> Draft<'c> {
    pub(crate) fn new(predicate: &'c Mention, token: &'c Token) -> Self {
        Self {
            predicate,
            token,
            class: lexical::classify_predicate(token),
            quality: lexical::predicate_quality(token),
            buckets: BTreeMap::new(),
            operators: Vec::new(),
            evidence: Vec::new(),
            choices: Vec::new(),
        }
    }

    /// Exclusion applied when choosing dependent mentions: verbal predicates
    /// refuse any overlap, other predicates only refuse mentions inside them.
    pub(crate) fn exclusion(&self) -> Exclusion<'c> {
        if self.class.is_verbal() {
            Exclusion::Overlapping(&self.predicate.token_ids)
        } else {
            Exclusion::ContainedIn(&self.predicate.token_ids)
        }
    }

    pub(crate) fn push_slot(&mut self, role: &str, mention_id: &str, relation_id: Option<&str>) {
        let slots = self.buckets.entry(role.to_string()).or_default();
        let slot = Slot {
            mention_id: mention_id.to_string(),
            relation_id: relation_id.map(str::to_string),
        };
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }

    pub(crate) fn has_core_roles(&self) -> bool {
        self.buckets
            .iter()
            .any(|(role, slots)| !slots.is_empty() && CoreRole::parse(role).is_some())
    }

    fn non_empty_roles(&self) -> impl Iterator<Item = &str> {
        self.buckets
            .iter()
            .filter(|(_, slots)| !slots.is_empty())
            .map(|(role, _)| role.as_str())
    }

    /// Routes `relation` (headed at this predicate or one it absorbed) into
    /// a bucket or an operator.
    pub(crate) fn route(&mut self, ctx: &BuildContext<'c>, relation: &ProjectedRelation) {
        match lexical::route_label(&relation.label) {
            LabelRoute::Structural => {}
            LabelRoute::Operator(kind) => {
                let item = shape::evidence_item(relation);
                self.operators.push(build_operator(ctx, relation, &kind, item.clone()));
                self.evidence.push(item);
            }
            LabelRoute::Core(role) => self.route_role(ctx, relation, role.as_str()),
            LabelRoute::Other(role) => self.route_role(ctx, relation, &role),
        }
    }

    fn route_role(&mut self, ctx: &BuildContext<'c>, relation: &ProjectedRelation, role: &str) {
        let dependent = choose_best_mention_for_token(
            &relation.dep_token_id,
            &self.predicate.segment_id,
            ctx.mentions.covering(&relation.dep_token_id),
            MentionPreference::Dependent,
            self.exclusion(),
        );
        match dependent {
            Some(mention) => {
                self.push_slot(role, &mention.id, Some(&relation.relation_id));
                self.evidence.push(shape::evidence_item(relation));
            }
            None => trace!(
                relation = %relation.relation_id,
                predicate = %self.predicate.id,
                "no dependent mention disjoint from predicate"
            ),
        }
    }

    /// Scaffolding that must not become an assertion.
    pub(crate) fn rejection(&self) -> Option<Rejection> {
        let roles: Vec<&str> = self.non_empty_roles().collect();
        if roles.is_empty() && self.operators.is_empty() {
            return Some(Rejection::Empty);
        }
        if self.predicate.kind == MentionKind::Token
            && lexical::is_gerund(self.token)
            && roles == ["theme"]
            && self.operators.is_empty()
        {
            return Some(Rejection::BareGerund);
        }
        if !self.class.is_verbal()
            && !self.has_core_roles()
            && !self.operators.is_empty()
            && self
                .operators
                .iter()
                .all(|op| op.kind == OperatorKind::CoordinationGroup.as_str())
        {
            return Some(Rejection::CoordinationOnly);
        }
        if self.class == PredicateClass::NominalHead
            && self.operators.is_empty()
            && roles.iter().all(|role| *role == "modifier")
        {
            return Some(Rejection::ModifierOnlyNominal);
        }
        None
    }

    /// Relation ids cited by surviving slots.
    fn slot_relation_ids(&self) -> Vec<&str> {
        self.buckets
            .values()
            .flatten()
            .filter_map(|slot| slot.relation_id.as_deref())
            .collect()
    }

    /// Builds the normalized assertion. Only evidence for relations that
    /// still back a slot or an operator is kept.
    pub(crate) fn into_assertion(self, ctx: &BuildContext<'c>) -> Assertion {
        let mut assertion = shape::empty_assertion(self.predicate, ctx.index);
        assertion.diagnostics.predicate_class = self.class;
        assertion.diagnostics.predicate_quality = self.quality;

        let kept: Vec<String> = self.slot_relation_ids().into_iter().map(str::to_string).collect();
        for (role, slots) in &self.buckets {
            for slot in slots {
                let relation_ids: Vec<String> = slot.relation_id.iter().cloned().collect();
                shape::add_role_mention(&mut assertion, role, &slot.mention_id, &relation_ids);
            }
        }
        let operator_relations: Vec<String> = self
            .operators
            .iter()
            .flat_map(|op| op.evidence.iter().map(|item| item.relation_id.clone()))
            .collect();
        for operator in self.operators {
            shape::add_operator(&mut assertion, operator);
        }
        for item in self.evidence {
            if kept.contains(&item.relation_id) || operator_relations.contains(&item.relation_id) {
                shape::add_evidence(&mut assertion, item);
            }
        }
        assertion.diagnostics.slot_projection_choice = self.choices;
        shape::rekey(&mut assertion, ctx.mentions);
        assertion
    }
}

fn build_operator(
    ctx: &BuildContext<'_>,
    relation: &ProjectedRelation,
    kind: &OperatorKind,
    item: EvidenceItem,
) -> Operator {
    match kind {
        OperatorKind::CoordinationGroup => Operator {
            kind: kind.as_str().to_string(),
            value: relation
                .evidence
                .get("coord_type")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            token_id: Some(relation.dep_token_id.clone()),
            group_id: ctx
                .projection
                .group_of(&relation.dep_mention_id)
                .map(|group| group.id.clone()),
            evidence: vec![item],
        },
        _ => Operator {
            kind: kind.as_str().to_string(),
            value: ctx.index.get(&relation.dep_token_id).map(lexical::lower_surface),
            token_id: Some(relation.dep_token_id.clone()),
            group_id: None,
            evidence: vec![item],
        },
    }
}
