//! Projects token-level dependency relations onto mentions.
//!
//! Each endpoint token is replaced by its owning primary mention. Relations
//! that cannot land on two distinct mentions in one segment are kept as
//! dropped records rather than errors.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use elementary_assertions_document::{
    AnnotationKind, CoordinationGroup, DropReason, DroppedRelation, ProjectedRelation,
    ProjectionStatus, RelationProjection, RelationRecord,
};
use pathfinding::undirected::connected_components::connected_components;
use tracing::{debug, trace};

use crate::ids;
use crate::lexical::COORDINATION_LABEL;
use crate::mention::{choose_best_mention_for_token, Exclusion, MentionPreference, MentionSet};
use crate::token_index::TokenIndex;

/// Projection result plus the coordination components over it.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub relations: RelationProjection,
    pub coordination_groups: Vec<CoordinationGroup>,
}

impl Projection {
    pub fn projected(&self) -> &[ProjectedRelation] {
        &self.relations.projected_relations
    }

    /// Projected relations headed at `mention_id`.
    pub fn outgoing<'s>(&'s self, mention_id: &'s str) -> impl Iterator<Item = &'s ProjectedRelation> {
        self.projected()
            .iter()
            .filter(move |relation| relation.head_mention_id == mention_id)
    }

    /// Projected relations touching `token_id` at either end.
    pub fn touching_token<'s>(&'s self, token_id: &'s str) -> impl Iterator<Item = &'s ProjectedRelation> {
        self.projected().iter().filter(move |relation| {
            relation.head_token_id == token_id || relation.dep_token_id == token_id
        })
    }

    pub fn group_of(&self, mention_id: &str) -> Option<&CoordinationGroup> {
        self.coordination_groups
            .iter()
            .find(|group| group.member_mention_ids.iter().any(|m| m == mention_id))
    }
}

fn sort_key(head: &str, dep: &str, label: &str, id: &str) -> (String, String, String, String) {
    (head.to_string(), dep.to_string(), label.to_string(), id.to_string())
}

/// Projects every accepted dependency annotation.
pub fn project_relations(index: &TokenIndex<'_>, mentions: &MentionSet) -> Projection {
    let mut all = Vec::new();
    let mut projected = Vec::new();
    let mut dropped = Vec::new();

    let dependencies = index
        .document()
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Dependency && a.is_accepted());

    for annotation in dependencies {
        let label = annotation.label.clone().unwrap_or_default();
        let head_token_id = annotation.head.as_ref().map(|h| h.id.clone()).unwrap_or_default();
        let dep_token_id = annotation.dep.as_ref().map(|d| d.id.clone()).unwrap_or_default();

        let mut record = RelationRecord {
            relation_id: annotation.id.clone(),
            label: label.clone(),
            head_token_id: head_token_id.clone(),
            dep_token_id: dep_token_id.clone(),
            head_mention_id: None,
            dep_mention_id: None,
            status: ProjectionStatus::Dropped,
            reason: None,
        };

        let resolved = resolve_endpoints(index, mentions, &head_token_id, &dep_token_id);
        match resolved {
            Ok((segment_id, head_mention_id, dep_mention_id)) => {
                record.status = ProjectionStatus::Projected;
                record.head_mention_id = Some(head_mention_id.clone());
                record.dep_mention_id = Some(dep_mention_id.clone());
                projected.push(ProjectedRelation {
                    relation_id: annotation.id.clone(),
                    label,
                    segment_id,
                    head_token_id,
                    dep_token_id,
                    head_mention_id,
                    dep_mention_id,
                    evidence: annotation.primary_evidence(),
                });
            }
            Err((reason, head_mention_id, dep_mention_id)) => {
                trace!(relation = %annotation.id, reason = reason.as_str(), "dropping relation");
                record.reason = Some(reason);
                record.head_mention_id = head_mention_id;
                record.dep_mention_id = dep_mention_id;
                dropped.push(DroppedRelation {
                    relation_id: annotation.id.clone(),
                    label,
                    head_token_id,
                    dep_token_id,
                    reason,
                });
            }
        }
        all.push(record);
    }

    all.sort_by_cached_key(|r| sort_key(&r.head_token_id, &r.dep_token_id, &r.label, &r.relation_id));
    projected.sort_by_cached_key(|r| {
        sort_key(&r.head_token_id, &r.dep_token_id, &r.label, &r.relation_id)
    });
    dropped.sort_by_cached_key(|r| {
        sort_key(&r.head_token_id, &r.dep_token_id, &r.label, &r.relation_id)
    });

    let coordination_groups = coordination_groups(&projected);
    debug!(
        projected = projected.len(),
        dropped = dropped.len(),
        groups = coordination_groups.len(),
        "projected relations"
    );

    Projection {
        relations: RelationProjection {
            all_relations: all,
            projected_relations: projected,
            dropped_relations: dropped,
        },
        coordination_groups,
    }
}

type Endpoints = (String, String, String);
type Failure = (DropReason, Option<String>, Option<String>);

fn resolve_endpoints(
    index: &TokenIndex<'_>,
    mentions: &MentionSet,
    head_token_id: &str,
    dep_token_id: &str,
) -> Result<Endpoints, Failure> {
    let (Some(head), Some(dep)) = (index.get(head_token_id), index.get(dep_token_id)) else {
        return Err((DropReason::UnknownToken, None, None));
    };
    if head.segment_id != dep.segment_id {
        return Err((DropReason::CrossSegment, None, None));
    }
    let pick = |token_id: &str| {
        choose_best_mention_for_token(
            token_id,
            &head.segment_id,
            mentions.covering(token_id),
            MentionPreference::Projection,
            Exclusion::None,
        )
        .map(|mention| mention.id.clone())
    };
    let head_mention = pick(head_token_id);
    let dep_mention = pick(dep_token_id);
    match (head_mention, dep_mention) {
        (Some(h), Some(d)) if h == d => {
            Err((DropReason::SelfLoopAfterPrimaryProjection, Some(h), Some(d)))
        }
        (Some(h), Some(d)) => Ok((head.segment_id.clone(), h, d)),
        (h, d) => Err((DropReason::MissingMention, h, d)),
    }
}

/// Connected components over `coordination` edges, in id order.
fn coordination_groups(projected: &[ProjectedRelation]) -> Vec<CoordinationGroup> {
    let edges: Vec<&ProjectedRelation> = projected
        .iter()
        .filter(|relation| relation.label == COORDINATION_LABEL)
        .collect();
    if edges.is_empty() {
        return Vec::new();
    }

    let mut neighbours: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in &edges {
        let (head, dep) = (edge.head_mention_id.as_str(), edge.dep_mention_id.as_str());
        neighbours.entry(head).or_default().insert(dep);
        neighbours.entry(dep).or_default().insert(head);
    }
    let starts: Vec<&str> = neighbours.keys().copied().collect();
    let components = connected_components(&starts, |node| {
        neighbours
            .get(node)
            .map(|next| next.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default()
    });

    let segment_of: HashMap<&str, &str> = edges
        .iter()
        .map(|edge| (edge.head_mention_id.as_str(), edge.segment_id.as_str()))
        .collect();

    let mut groups: Vec<CoordinationGroup> = components
        .into_iter()
        .map(|component| {
            let mut members: Vec<String> = component.iter().map(|m| m.to_string()).collect();
            members.sort();
            let group_edges: Vec<&&ProjectedRelation> = edges
                .iter()
                .filter(|edge| component.contains(edge.head_mention_id.as_str()))
                .collect();
            let mut relation_ids: Vec<String> =
                group_edges.iter().map(|edge| edge.relation_id.clone()).collect();
            relation_ids.sort();
            relation_ids.dedup();
            let coord_types: BTreeSet<&str> = group_edges
                .iter()
                .filter_map(|edge| edge.evidence.get("coord_type").and_then(|v| v.as_str()))
                .collect();
            let coord_type = match (coord_types.len(), coord_types.iter().next()) {
                (1, Some(only)) => Some(only.to_string()),
                _ => None,
            };
            let segment_id = members
                .iter()
                .find_map(|m| segment_of.get(m.as_str()))
                .map(|s| s.to_string())
                .unwrap_or_default();
            CoordinationGroup {
                id: ids::coordination_group_id(&members),
                segment_id,
                member_mention_ids: members,
                relation_ids,
                coord_type,
                predicate_assertion_ids: Vec::new(),
            }
        })
        .collect();
    groups.sort_by(|a, b| a.id.cmp(&b.id));
    groups
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::mention::build_mentions;
    use crate::tests::fixtures::DocBuilder;

    use super::*;

    #[test]
    fn test_projects_and_drops() {
        let doc = DocBuilder::new()
            .sentence(&[("New", "NNP"), ("York", "NNP"), ("grows", "VBZ")])
            .sentence(&[("Beta", "NNP"), ("waits", "VBZ")])
            .mwe(&["t0", "t1"])
            .relation("t2", "nsubj", "t1")
            .relation("t0", "compound", "t1")
            .relation("t2", "obj", "t3")
            .relation("t4", "nsubj", "t9")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index);
        let projection = project_relations(&index, &mentions);

        let projected = projection.projected();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].head_mention_id, "m:s1:9-14:token");
        assert_eq!(projected[0].dep_mention_id, "m:s1:0-8:mwe");

        let reasons: Vec<(&str, &str)> = projection
            .relations
            .dropped_relations
            .iter()
            .map(|r| (r.relation_id.as_str(), r.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("r2", "self_loop_after_primary_projection"),
                ("r3", "cross_segment"),
                ("r4", "unknown_token"),
            ]
        );
        assert_eq!(projection.relations.all_relations.len(), 4);
    }

    #[test]
    fn test_relation_order_does_not_matter() {
        let doc = DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("builds", "VBZ"), ("carts", "NNS")])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .build();
        let mut reversed = doc.clone();
        reversed.annotations.reverse();

        let run = |doc: &elementary_assertions_document::RelationsDocument| {
            let index = TokenIndex::new(doc).unwrap();
            let mentions = build_mentions(&index);
            project_relations(&index, &mentions).relations
        };
        assert_eq!(run(&doc), run(&reversed));
    }

    #[test]
    fn test_coordination_components() {
        let doc = DocBuilder::new()
            .sentence(&[
                ("Alpha", "NNP"),
                ("builds", "VBZ"),
                ("and", "CC"),
                ("sells", "VBZ"),
                ("carts", "NNS"),
            ])
            .relation_with("t1", "coordination", "t3", json!({ "coord_type": "and" }))
            .relation("t1", "nsubj", "t0")
            .build();
        let index = TokenIndex::new(&doc).unwrap();
        let mentions = build_mentions(&index);
        let projection = project_relations(&index, &mentions);

        assert_eq!(projection.coordination_groups.len(), 1);
        let group = &projection.coordination_groups[0];
        assert_eq!(
            group.member_mention_ids,
            vec!["m:s1:17-22:token", "m:s1:6-12:token"]
        );
        assert_eq!(group.relation_ids, vec!["r1"]);
        assert_eq!(group.coord_type.as_deref(), Some("and"));
        assert_eq!(group.segment_id, "s1");
        assert!(group.id.starts_with("cg:"));
        assert_eq!(
            projection.group_of("m:s1:6-12:token").map(|g| g.id.as_str()),
            Some(group.id.as_str())
        );
    }
}
