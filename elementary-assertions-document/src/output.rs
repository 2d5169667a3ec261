//! The elementary assertions document and every record it contains.
//!
//! Field order in these structs is the serialized field order, so keep it
//! stable: byte-identical output on repeat runs depends on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnnotationKind, PartOfSpeech, Segment, Span, TokenLexicon};

/// Value of the `stage` field.
pub const STAGE: &str = "elementary_assertions";

/// Current output schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBasis {
    pub text_field: String,
    pub span_unit: String,
}

impl Default for IndexBasis {
    fn default() -> Self {
        Self {
            text_field: "canonical_text".to_string(),
            span_unit: "utf16_code_units".to_string(),
        }
    }
}

/// Root output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementaryAssertionsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_id: Option<String>,
    pub stage: String,
    pub index_basis: IndexBasis,
    pub canonical_text: String,
    pub segments: Vec<Segment>,
    pub tokens: Vec<OutputToken>,
    pub mentions: Vec<Mention>,
    pub assertions: Vec<Assertion>,
    pub relation_projection: RelationProjection,
    pub accepted_annotations: Vec<AcceptedAnnotation>,
    pub wiki_title_evidence: WikiTitleEvidence,
    pub diagnostics: Diagnostics,
    pub coverage: Coverage,
    pub sources: Sources,
}

/// Token as re-projected into the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputToken {
    pub id: String,
    pub i: usize,
    pub segment_id: String,
    pub span: Span,
    pub surface: String,
    pub pos: PartOfSpeech,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon: Option<TokenLexicon>,
}

// ============================================================================
// Mentions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    Mwe,
    Chunk,
    Token,
}

impl MentionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionKind::Mwe => "mwe",
            MentionKind::Chunk => "chunk",
            MentionKind::Token => "token",
        }
    }
}

/// Where a mention came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionSource {
    Mwe,
    MweAlternative,
    Chunk,
    TokenFallback,
    TokenShadow,
}

/// How the head token of a mention was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadStrategy {
    SingleToken,
    MweMaterialization,
    ChunkHead,
    Dependency,
    PosFallback,
    FirstToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWikiSignal {
    pub token_id: String,
    pub signals: crate::WikiSignals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiMentionEvidence {
    pub token_signals: Vec<TokenWikiSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mwe_signals: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionLexiconEvidence {
    pub wikipedia_title_index: WikiMentionEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionProvenance {
    pub source_kind: MentionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_annotation_id: Option<String>,
    pub head_strategy: HeadStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon_evidence: Option<MentionLexiconEvidence>,
}

/// A contiguous token span that may be referenced by assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub kind: MentionKind,
    pub priority: u8,
    pub token_ids: Vec<String>,
    pub head_token_id: String,
    pub span: Span,
    pub segment_id: String,
    pub is_primary: bool,
    pub provenance: MentionProvenance,
}

impl Mention {
    pub fn contains_token(&self, token_id: &str) -> bool {
        self.token_ids.iter().any(|id| id == token_id)
    }

    pub fn has_lexicon_evidence(&self) -> bool {
        self.provenance.lexicon_evidence.is_some()
    }
}

// ============================================================================
// Relation projection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UnknownToken,
    MissingMention,
    CrossSegment,
    SelfLoopAfterPrimaryProjection,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnknownToken => "unknown_token",
            DropReason::MissingMention => "missing_mention",
            DropReason::CrossSegment => "cross_segment",
            DropReason::SelfLoopAfterPrimaryProjection => "self_loop_after_primary_projection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionStatus {
    Projected,
    Dropped,
}

/// A relation whose endpoints resolved to two distinct mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRelation {
    pub relation_id: String,
    pub label: String,
    pub segment_id: String,
    pub head_token_id: String,
    pub dep_token_id: String,
    pub head_mention_id: String,
    pub dep_mention_id: String,
    #[serde(default)]
    pub evidence: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedRelation {
    pub relation_id: String,
    pub label: String,
    pub head_token_id: String,
    pub dep_token_id: String,
    pub reason: DropReason,
}

/// Audit record for every accepted dependency relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub relation_id: String,
    pub label: String,
    pub head_token_id: String,
    pub dep_token_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_mention_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep_mention_id: Option<String>,
    pub status: ProjectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DropReason>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationProjection {
    pub all_relations: Vec<RelationRecord>,
    pub projected_relations: Vec<ProjectedRelation>,
    pub dropped_relations: Vec<DroppedRelation>,
}

// ============================================================================
// Assertions
// ============================================================================

/// One upstream relation as cited by an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub relation_id: String,
    pub label: String,
    pub from_token_id: String,
    pub to_token_id: String,
    #[serde(default)]
    pub evidence: Value,
}

impl EvidenceItem {
    /// Sort key: `(from_token_id, to_token_id, label, relation_id)`.
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.from_token_id,
            &self.to_token_id,
            &self.label,
            &self.relation_id,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleEvidence {
    pub relation_ids: Vec<String>,
    pub token_ids: Vec<String>,
}

/// One role bucket of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: String,
    pub mention_ids: Vec<String>,
    pub evidence: RoleEvidence,
}

/// Modality, negation, coordination, comparison, quantifier or control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub evidence: Vec<EvidenceItem>,
}

impl Operator {
    /// Identity used for dedup and ordering.
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.kind,
            self.value.as_deref().unwrap_or(""),
            self.token_id.as_deref().unwrap_or(""),
            self.group_id.as_deref().unwrap_or(""),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredicateRef {
    pub mention_id: String,
    pub head_token_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssertionEvidence {
    pub relations: Vec<EvidenceItem>,
    pub token_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateQuality {
    Ok,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateClass {
    LexicalVerb,
    Copula,
    Auxiliary,
    Preposition,
    NominalHead,
}

impl PredicateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateClass::LexicalVerb => "lexical_verb",
            PredicateClass::Copula => "copula",
            PredicateClass::Auxiliary => "auxiliary",
            PredicateClass::Preposition => "preposition",
            PredicateClass::NominalHead => "nominal_head",
        }
    }

    /// Preposition and nominal-head predicates count as predicate noise.
    pub fn is_structural(&self) -> bool {
        matches!(self, PredicateClass::Preposition | PredicateClass::NominalHead)
    }

    pub fn is_verbal(&self) -> bool {
        matches!(
            self,
            PredicateClass::LexicalVerb | PredicateClass::Copula | PredicateClass::Auxiliary
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityFailure {
    NoHost,
    NoContainment,
    HasCoreSlots,
}

/// Whether a structural fragment could be folded into a lexical host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionEligibility {
    pub eligible: bool,
    pub failure_reason: Option<EligibilityFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_host_assertion_id: Option<String>,
    pub source_non_operator_token_ids: Vec<String>,
    pub missing_in_host_token_ids: Vec<String>,
}

/// Records a slot mention that was replaced while building an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotProjectionChoice {
    pub slot: String,
    pub original_mention_id: String,
    pub chosen_mention_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionDiagnostics {
    pub predicate_quality: PredicateQuality,
    pub predicate_class: PredicateClass,
    pub structural_fragment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression_eligibility: Option<SuppressionEligibility>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slot_projection_choice: Vec<SlotProjectionChoice>,
}

/// A minimal predicate-argument proposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub segment_id: String,
    pub predicate: PredicateRef,
    pub arguments: Vec<RoleEntry>,
    pub modifiers: Vec<RoleEntry>,
    pub operators: Vec<Operator>,
    pub evidence: AssertionEvidence,
    pub diagnostics: AssertionDiagnostics,
}

impl Assertion {
    /// All role entries, arguments first.
    pub fn roles(&self) -> impl Iterator<Item = &RoleEntry> {
        self.arguments.iter().chain(self.modifiers.iter())
    }

    pub fn role(&self, role: &str) -> Option<&RoleEntry> {
        self.roles().find(|entry| entry.role == role)
    }

    /// Mention ids across arguments and modifiers, unsorted.
    pub fn role_mention_ids(&self) -> impl Iterator<Item = &str> {
        self.roles()
            .flat_map(|entry| entry.mention_ids.iter().map(String::as_str))
    }

    pub fn has_operator(&self, kind: &str) -> bool {
        self.operators.iter().any(|op| op.kind == kind)
    }
}

// ============================================================================
// Suppression traces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionKind {
    PredicateRedirect,
    ModalityMerge,
    RoleCarrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    PredicateUpgradedToLexical,
    ModalityMovedToLexical,
    RoleCarrierSuppressed,
    #[serde(rename = "role_carrier_suppressed_v2_nominal")]
    RoleCarrierSuppressedV2Nominal,
    CopulaBucketSinkSuppressed,
}

impl SuppressionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionReason::PredicateUpgradedToLexical => "predicate_upgraded_to_lexical",
            SuppressionReason::ModalityMovedToLexical => "modality_moved_to_lexical",
            SuppressionReason::RoleCarrierSuppressed => "role_carrier_suppressed",
            SuppressionReason::RoleCarrierSuppressedV2Nominal => {
                "role_carrier_suppressed_v2_nominal"
            }
            SuppressionReason::CopulaBucketSinkSuppressed => "copula_bucket_sink_suppressed",
        }
    }

    /// Reasons that must carry transferred buckets and mention ids.
    pub fn is_role_carrier(&self) -> bool {
        matches!(
            self,
            SuppressionReason::RoleCarrierSuppressed
                | SuppressionReason::RoleCarrierSuppressedV2Nominal
                | SuppressionReason::CopulaBucketSinkSuppressed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuppressionEvidence {
    pub relation_ids: Vec<String>,
    pub token_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedBy {
    pub kind: SuppressionKind,
    pub target_assertion_id: String,
    pub reason: SuppressionReason,
    pub evidence: SuppressionEvidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedDiagnostics {
    pub suppressed_by: SuppressedBy,
}

/// Trace left behind by an assertion that was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedAssertion {
    pub id: String,
    pub segment_id: String,
    pub predicate: PredicateRef,
    pub diagnostics: SuppressedDiagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transferred_buckets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transferred_mention_ids: Option<Vec<String>>,
}

// ============================================================================
// Diagnostics and coverage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFragmentation {
    pub segment_id: String,
    pub predicate_count: usize,
    pub lexical_verb_count: usize,
    pub copula_count: usize,
    pub auxiliary_count: usize,
    pub fragment_count: usize,
    pub tolerated_predicate_count: usize,
    pub warning: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fragmentation {
    pub segments: Vec<SegmentFragmentation>,
    pub predicate_noise_index: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapSignals {
    pub uncovered_primary_count: usize,
    pub unresolved_by_reason: BTreeMap<String, usize>,
    pub dropped_relation_count: usize,
    pub subject_role_gap_count: usize,
    pub structural_fragment_count: usize,
}

/// Connected component over `coordination` edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationGroup {
    pub id: String,
    pub segment_id: String,
    pub member_mention_ids: Vec<String>,
    pub relation_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_type: Option<String>,
    pub predicate_assertion_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRoleGap {
    pub assertion_id: String,
    pub segment_id: String,
    pub predicate_mention_id: String,
    pub predicate_head_token_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub fragmentation: Fragmentation,
    pub gap_signals: GapSignals,
    pub coordination_groups: Vec<CoordinationGroup>,
    pub subject_role_gaps: Vec<SubjectRoleGap>,
    pub suppressed_assertions: Vec<SuppressedAssertion>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    PredicateInvalid,
    CoordTypeMissing,
    OperatorScopeOpen,
    MissingRelation,
    ProjectionFailed,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::PredicateInvalid => "predicate_invalid",
            UnresolvedReason::CoordTypeMissing => "coord_type_missing",
            UnresolvedReason::OperatorScopeOpen => "operator_scope_open",
            UnresolvedReason::MissingRelation => "missing_relation",
            UnresolvedReason::ProjectionFailed => "projection_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedMention {
    pub mention_id: String,
    pub segment_id: String,
    pub reason: UnresolvedReason,
    pub evidence: RoleEvidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coverage {
    pub primary_mention_ids: Vec<String>,
    pub covered_primary_mention_ids: Vec<String>,
    pub uncovered_primary_mention_ids: Vec<String>,
    pub unresolved: Vec<UnresolvedMention>,
}

// ============================================================================
// Provenance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedAnnotation {
    pub id: String,
    pub kind: AnnotationKind,
    pub token_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiNormalization {
    pub case: String,
    pub whitespace: String,
}

impl Default for WikiNormalization {
    fn default() -> Self {
        Self {
            case: "lowercase".to_string(),
            whitespace: "collapse".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiMentionMatch {
    pub mention_id: String,
    pub normalized_surface: String,
    pub token_ids: Vec<String>,
    pub signal_token_ids: Vec<String>,
    pub exact_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPredicateMatch {
    pub assertion_id: String,
    pub predicate_mention_id: String,
    pub normalized_surface: String,
    pub exact_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WikiTitleEvidence {
    pub normalization: WikiNormalization,
    pub mention_matches: Vec<WikiMentionMatch>,
    pub assertion_predicate_matches: Vec<WikiPredicateMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInput {
    pub artifact: String,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub inputs: Vec<SourceInput>,
    pub pipeline: PipelineInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression_reason_wire_names() {
        let reasons = [
            SuppressionReason::PredicateUpgradedToLexical,
            SuppressionReason::ModalityMovedToLexical,
            SuppressionReason::RoleCarrierSuppressed,
            SuppressionReason::RoleCarrierSuppressedV2Nominal,
            SuppressionReason::CopulaBucketSinkSuppressed,
        ];
        for reason in reasons {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }

    #[test]
    fn test_index_basis_default() {
        let basis = IndexBasis::default();
        insta::assert_snapshot!(
            serde_json::to_string(&basis).unwrap(),
            @r###"{"text_field":"canonical_text","span_unit":"utf16_code_units"}"###
        );
    }

    #[test]
    fn test_predicate_class_groups() {
        assert!(PredicateClass::Preposition.is_structural());
        assert!(PredicateClass::NominalHead.is_structural());
        assert!(!PredicateClass::Copula.is_structural());
        assert!(PredicateClass::Auxiliary.is_verbal());
        assert!(!PredicateClass::NominalHead.is_verbal());
    }
}
