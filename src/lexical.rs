//! Part-of-speech predicates, predicate classification and label routing.
//!
//! Every policy table lives here as data. The rest of the crate consults
//! these tables through the lookup functions below and never re-derives them.

use elementary_assertions_document::{PredicateClass, PredicateQuality, Token};
use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION_SURFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{P}\p{S}]+$").expect("valid punctuation regex"));

/// Forms of "be" that make a copula.
pub const BE_FORMS: &[&str] = &[
    "be", "is", "am", "are", "was", "were", "been", "being", "'s", "'re", "'m",
];

/// Words opening a relative clause.
pub const RELATIVE_CLAUSE_MARKERS: &[&str] =
    &["who", "whom", "whose", "that", "which", "where", "when"];

/// Prepositions the fallback location heuristic accepts.
pub const SPATIAL_PREPOSITIONS: &[&str] = &[
    "in", "on", "at", "near", "inside", "within", "under", "over", "from", "into", "onto",
    "across", "between", "behind", "beside", "above", "below", "around", "through",
];

/// Tags that carry content for coverage purposes.
const CONTENT_TAG_PREFIXES: &[&str] = &["NN", "VB", "JJ", "RB"];
const CONTENT_TAGS: &[&str] = &["CD", "FW", "PRP"];

const PUNCTUATION_TAGS: &[&str] = &[
    ".", ",", ":", "``", "''", "-LRB-", "-RRB-", "HYPH", "NFP", "(", ")", "\"", "#", "$",
];

const CLAUSE_PUNCTUATION: &[&str] = &[",", ";", ":", ".", "!", "?", "(", ")"];

pub fn lower_surface(token: &Token) -> String {
    token.surface.to_lowercase()
}

pub fn is_punctuation(token: &Token) -> bool {
    token.coarse() == Some("PUNCT")
        || PUNCTUATION_TAGS.contains(&token.tag())
        || PUNCTUATION_SURFACE.is_match(&token.surface)
}

/// Punctuation that closes a clause window.
pub fn is_clause_boundary(token: &Token) -> bool {
    CLAUSE_PUNCTUATION.contains(&token.surface.as_str())
}

pub fn is_content(token: &Token) -> bool {
    if is_punctuation(token) {
        return false;
    }
    let tag = token.tag();
    CONTENT_TAG_PREFIXES.iter().any(|prefix| tag.starts_with(prefix)) || CONTENT_TAGS.contains(&tag)
}

/// `VB*` tags only; modals are auxiliaries, not verb-like.
pub fn is_verb_like(token: &Token) -> bool {
    token.tag().starts_with("VB")
}

pub fn is_noun_like(token: &Token) -> bool {
    let tag = token.tag();
    tag.starts_with("NN")
        || tag == "PRP"
        || tag == "CD"
        || matches!(token.coarse(), Some("NOUN") | Some("PROPN") | Some("PRON") | Some("NUM"))
}

pub fn is_modal(token: &Token) -> bool {
    token.tag() == "MD"
}

pub fn is_gerund(token: &Token) -> bool {
    token.tag() == "VBG"
}

pub fn is_be_form(token: &Token) -> bool {
    BE_FORMS.contains(&lower_surface(token).as_str())
}

pub fn is_relative_marker(token: &Token) -> bool {
    RELATIVE_CLAUSE_MARKERS.contains(&lower_surface(token).as_str())
}

pub fn is_spatial_preposition(token: &Token) -> bool {
    SPATIAL_PREPOSITIONS.contains(&lower_surface(token).as_str())
}

fn is_preposition_tag(token: &Token) -> bool {
    matches!(token.tag(), "IN" | "TO") || token.coarse() == Some("ADP")
}

/// Class of a predicate head token.
pub fn classify_predicate(token: &Token) -> PredicateClass {
    let verbal = is_verb_like(token)
        || is_modal(token)
        || matches!(token.coarse(), Some("VERB") | Some("AUX"));
    if verbal {
        if is_be_form(token) {
            PredicateClass::Copula
        } else if is_modal(token) || token.coarse() == Some("AUX") {
            PredicateClass::Auxiliary
        } else {
            PredicateClass::LexicalVerb
        }
    } else if is_preposition_tag(token) {
        PredicateClass::Preposition
    } else {
        PredicateClass::NominalHead
    }
}

/// Modals, copular be-forms and "given" are low-quality predicates.
pub fn predicate_quality(token: &Token) -> PredicateQuality {
    let low = is_modal(token)
        || (is_be_form(token) && classify_predicate(token) == PredicateClass::Copula)
        || lower_surface(token) == "given";
    if low {
        PredicateQuality::Low
    } else {
        PredicateQuality::Ok
    }
}

// ============================================================================
// Relation label routing
// ============================================================================

/// Core argument slots, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoreRole {
    Actor,
    Theme,
    Attr,
    Topic,
    Location,
}

impl CoreRole {
    pub const ALL: [CoreRole; 5] = [
        CoreRole::Actor,
        CoreRole::Theme,
        CoreRole::Attr,
        CoreRole::Topic,
        CoreRole::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoreRole::Actor => "actor",
            CoreRole::Theme => "theme",
            CoreRole::Attr => "attr",
            CoreRole::Topic => "topic",
            CoreRole::Location => "location",
        }
    }

    pub fn parse(role: &str) -> Option<CoreRole> {
        CoreRole::ALL.iter().copied().find(|core| core.as_str() == role)
    }
}

/// Operator kinds an upstream relation can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Modality,
    Negation,
    CoordinationGroup,
    /// `compare`, `compare_gt`, `compare_lt`, ... carried by name.
    Compare(String),
    Quantifier,
    ControlInheritSubject,
    ControlPropagation,
}

impl OperatorKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperatorKind::Modality => "modality",
            OperatorKind::Negation => "negation",
            OperatorKind::CoordinationGroup => "coordination_group",
            OperatorKind::Compare(name) => name,
            OperatorKind::Quantifier => "quantifier",
            OperatorKind::ControlInheritSubject => "control_inherit_subject",
            OperatorKind::ControlPropagation => "control_propagation",
        }
    }
}

/// Where a relation label goes when it is anchored at a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRoute {
    Core(CoreRole),
    Other(String),
    Operator(OperatorKind),
    /// Clause links and punctuation: used for linkage, never a bucket.
    Structural,
}

pub const SUBJECT_LABELS: &[&str] =
    &["actor", "agent", "nsubj", "csubj", "subject", "experiencer"];
const THEME_LABELS: &[&str] = &[
    "theme", "patient", "obj", "dobj", "object", "nsubjpass", "nsubj:pass",
];
const ATTR_LABELS: &[&str] = &["attribute", "attr", "acomp"];
const TOPIC_LABELS: &[&str] = &["topic"];
const LOCATION_LABELS: &[&str] = &["location"];

/// Labels that link clauses to each other.
pub const CLAUSE_LINK_LABELS: &[&str] = &["complement_clause", "xcomp", "ccomp", "clause_link"];
/// Labels that may carry a modality/copula assertion to its lexical verb.
pub const MODALITY_LINK_LABELS: &[&str] = &["complement_clause", "xcomp"];
const STRUCTURAL_LABELS: &[&str] = &["complement_clause", "xcomp", "ccomp", "clause_link", "punct"];

pub const COORDINATION_LABEL: &str = "coordination";

/// Single lookup for label routing.
pub fn route_label(label: &str) -> LabelRoute {
    if SUBJECT_LABELS.contains(&label) {
        return LabelRoute::Core(CoreRole::Actor);
    }
    if THEME_LABELS.contains(&label) {
        return LabelRoute::Core(CoreRole::Theme);
    }
    if ATTR_LABELS.contains(&label) {
        return LabelRoute::Core(CoreRole::Attr);
    }
    if TOPIC_LABELS.contains(&label) {
        return LabelRoute::Core(CoreRole::Topic);
    }
    if LOCATION_LABELS.contains(&label) {
        return LabelRoute::Core(CoreRole::Location);
    }
    if STRUCTURAL_LABELS.contains(&label) {
        return LabelRoute::Structural;
    }
    match label {
        "modality" => LabelRoute::Operator(OperatorKind::Modality),
        "negation" => LabelRoute::Operator(OperatorKind::Negation),
        COORDINATION_LABEL => LabelRoute::Operator(OperatorKind::CoordinationGroup),
        "quantifier" => LabelRoute::Operator(OperatorKind::Quantifier),
        "control_inherit_subject" => LabelRoute::Operator(OperatorKind::ControlInheritSubject),
        "control_propagation" => LabelRoute::Operator(OperatorKind::ControlPropagation),
        compare if compare.starts_with("compare") => {
            LabelRoute::Operator(OperatorKind::Compare(compare.to_string()))
        }
        other => LabelRoute::Other(other.to_string()),
    }
}

pub fn is_operator_label(label: &str) -> bool {
    matches!(route_label(label), LabelRoute::Operator(_))
}

pub fn is_structural_label(label: &str) -> bool {
    route_label(label) == LabelRoute::Structural
}

/// Role labels fill buckets (core or other).
pub fn is_role_label(label: &str) -> bool {
    matches!(route_label(label), LabelRoute::Core(_) | LabelRoute::Other(_))
}

/// Position of a role in output ordering: core roles first, then the rest.
pub fn role_priority(role: &str) -> usize {
    CoreRole::parse(role).map_or(CoreRole::ALL.len(), |core| core as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementary_assertions_document::{PartOfSpeech, Span};

    fn token(surface: &str, tag: &str) -> Token {
        Token {
            id: "t0".to_string(),
            i: 0,
            segment_id: "s1".to_string(),
            span: Span::new(0, surface.len()),
            surface: surface.to_string(),
            pos: PartOfSpeech {
                tag: tag.to_string(),
                coarse: None,
            },
            lexicon: None,
        }
    }

    #[test]
    fn test_classify_predicate() {
        assert_eq!(classify_predicate(&token("builds", "VBZ")), PredicateClass::LexicalVerb);
        assert_eq!(classify_predicate(&token("is", "VBZ")), PredicateClass::Copula);
        assert_eq!(classify_predicate(&token("may", "MD")), PredicateClass::Auxiliary);
        assert_eq!(classify_predicate(&token("in", "IN")), PredicateClass::Preposition);
        assert_eq!(classify_predicate(&token("to", "TO")), PredicateClass::Preposition);
        assert_eq!(classify_predicate(&token("contract", "NN")), PredicateClass::NominalHead);
    }

    #[test]
    fn test_predicate_quality() {
        assert_eq!(predicate_quality(&token("may", "MD")), PredicateQuality::Low);
        assert_eq!(predicate_quality(&token("be", "VB")), PredicateQuality::Low);
        assert_eq!(predicate_quality(&token("given", "VBN")), PredicateQuality::Low);
        assert_eq!(predicate_quality(&token("builds", "VBZ")), PredicateQuality::Ok);
        // "is" as a noun-tagged token is not a copula
        assert_eq!(predicate_quality(&token("is", "NN")), PredicateQuality::Ok);
    }

    #[test]
    fn test_route_label() {
        assert_eq!(route_label("nsubj"), LabelRoute::Core(CoreRole::Actor));
        assert_eq!(route_label("obj"), LabelRoute::Core(CoreRole::Theme));
        assert_eq!(route_label("attribute"), LabelRoute::Core(CoreRole::Attr));
        assert_eq!(route_label("xcomp"), LabelRoute::Structural);
        assert_eq!(
            route_label("compare_gt"),
            LabelRoute::Operator(OperatorKind::Compare("compare_gt".to_string()))
        );
        assert_eq!(
            route_label("coordination"),
            LabelRoute::Operator(OperatorKind::CoordinationGroup)
        );
        assert_eq!(route_label("recipient"), LabelRoute::Other("recipient".to_string()));
    }

    #[test]
    fn test_role_priority_orders_core_roles_first() {
        assert!(role_priority("actor") < role_priority("theme"));
        assert!(role_priority("location") < role_priority("recipient"));
        assert_eq!(role_priority("attached_theme"), role_priority("recipient"));
    }

    #[test]
    fn test_punctuation_and_content() {
        assert!(is_punctuation(&token(".", ".")));
        assert!(is_punctuation(&token("--", ":")));
        assert!(!is_content(&token(".", ".")));
        assert!(is_content(&token("carts", "NNS")));
        assert!(!is_content(&token("the", "DT")));
        assert!(!is_content(&token("may", "MD")));
    }
}
