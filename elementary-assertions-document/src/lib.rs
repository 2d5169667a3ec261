//! Document model for elementary-assertions.
//!
//! This crate holds the serde shapes of both ends of the pipeline:
//!
//! ## Input
//!
//! - [`RelationsDocument`] - tokens, segments and annotations produced by the
//!   upstream enrichment pipeline
//!
//! ## Output
//!
//! - [`ElementaryAssertionsDocument`] - mentions, assertions, relation
//!   projection, diagnostics and coverage
//!
//! ## Example
//!
//! ```
//! use elementary_assertions_document::{utf16_slice, Span};
//!
//! let text = "Alpha builds carts.";
//! assert_eq!(utf16_slice(text, Span::new(0, 5)).as_deref(), Some("Alpha"));
//! ```

mod input;
mod output;
mod span;

pub use input::{
    Anchor, Annotation, AnnotationKind, AnnotationSource, AnnotationStatus, PartOfSpeech,
    RelationsDocument, Segment, Selector, Token, TokenLexicon, TokenRef, WikiSignals,
};
pub use output::{
    AcceptedAnnotation, Assertion, AssertionDiagnostics, AssertionEvidence, CoordinationGroup,
    Coverage, Diagnostics, DropReason, DroppedRelation, ElementaryAssertionsDocument,
    EligibilityFailure, EvidenceItem, Fragmentation, GapSignals, HeadStrategy, IndexBasis,
    Mention, MentionKind, MentionLexiconEvidence, MentionProvenance, MentionSource, Operator,
    OutputToken, PipelineInfo, PredicateClass, PredicateQuality, PredicateRef,
    ProjectedRelation, ProjectionStatus, RelationProjection, RelationRecord, RoleEntry,
    RoleEvidence, SegmentFragmentation, SlotProjectionChoice, SourceInput, Sources,
    SubjectRoleGap, SuppressedAssertion, SuppressedBy, SuppressedDiagnostics,
    SuppressionEligibility, SuppressionEvidence, SuppressionKind, SuppressionReason,
    TokenWikiSignal, UnresolvedMention, UnresolvedReason, WikiMentionEvidence,
    WikiMentionMatch, WikiNormalization, WikiPredicateMatch, WikiTitleEvidence,
    SCHEMA_VERSION, STAGE,
};
pub use span::{utf16_len, utf16_slice, Span, TokenRange};
