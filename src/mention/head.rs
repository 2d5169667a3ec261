//! Head-token resolution for multi-token mentions.

use std::collections::{HashMap, HashSet};

use elementary_assertions_document::{Annotation, AnnotationKind, HeadStrategy, Token};

use crate::lexical;

/// Upstream evidence the head strategies consult.
#[derive(Debug, Default)]
pub(crate) struct HeadEvidence<'a> {
    /// chunk annotation id -> head token id, from `chunk_head` annotations.
    chunk_heads: HashMap<&'a str, &'a str>,
    /// Accepted dependency edges as `(head token, dep token)`.
    edges: Vec<(&'a str, &'a str)>,
}

impl<'a> HeadEvidence<'a> {
    pub(crate) fn collect(annotations: &'a [Annotation]) -> Self {
        let mut chunk_heads: HashMap<&str, (&str, &str)> = HashMap::new();
        let mut edges = Vec::new();
        for annotation in annotations.iter().filter(|a| a.is_accepted()) {
            match annotation.kind {
                AnnotationKind::ChunkHead => {
                    let Some(chunk_id) = annotation.chunk_id.as_deref() else {
                        continue;
                    };
                    let head = annotation.head.as_ref().map(|h| h.id.as_str()).or_else(|| {
                        match annotation.selector_token_ids() {
                            Some([only]) => Some(only.as_str()),
                            _ => None,
                        }
                    });
                    let Some(head) = head else { continue };
                    // smallest annotation id wins when a chunk has several heads
                    let entry = chunk_heads
                        .entry(chunk_id)
                        .or_insert((annotation.id.as_str(), head));
                    if annotation.id.as_str() < entry.0 {
                        *entry = (annotation.id.as_str(), head);
                    }
                }
                AnnotationKind::Dependency => {
                    if let (Some(head), Some(dep)) = (&annotation.head, &annotation.dep) {
                        edges.push((head.id.as_str(), dep.id.as_str()));
                    }
                }
                _ => {}
            }
        }
        Self {
            chunk_heads: chunk_heads
                .into_iter()
                .map(|(chunk, (_, head))| (chunk, head))
                .collect(),
            edges,
        }
    }

    /// Picks the head of `tokens` (in sequence order).
    pub(crate) fn resolve(
        &self,
        tokens: &[&Token],
        annotation: Option<&Annotation>,
    ) -> (String, HeadStrategy) {
        let Some(first) = tokens.first() else {
            return (String::new(), HeadStrategy::FirstToken);
        };
        if tokens.len() == 1 {
            return (first.id.clone(), HeadStrategy::SingleToken);
        }
        let member = |id: &str| tokens.iter().any(|t| t.id == id);

        if let Some(annotation) = annotation {
            if annotation.kind == AnnotationKind::Mwe {
                let materialized = annotation
                    .source_evidence("mwe-materialization")
                    .and_then(|evidence| evidence.get("head_token_id"))
                    .and_then(|value| value.as_str());
                if let Some(head) = materialized.filter(|head| member(*head)) {
                    return (head.to_string(), HeadStrategy::MweMaterialization);
                }
            }
            if annotation.kind == AnnotationKind::Chunk {
                if let Some(head) = self
                    .chunk_heads
                    .get(annotation.id.as_str())
                    .filter(|head| member(**head))
                {
                    return (head.to_string(), HeadStrategy::ChunkHead);
                }
            }
        }

        if let Some(head) = self.dependency_root(tokens) {
            return (head, HeadStrategy::Dependency);
        }

        let noun = tokens.iter().rev().find(|t| lexical::is_noun_like(t));
        let verb = tokens.iter().find(|t| lexical::is_verb_like(t));
        if let Some(token) = noun.or(verb) {
            return (token.id.clone(), HeadStrategy::PosFallback);
        }

        (first.id.clone(), HeadStrategy::FirstToken)
    }

    /// The single span token without an incoming edge from inside the span.
    fn dependency_root(&self, tokens: &[&Token]) -> Option<String> {
        let inside: HashSet<&str> = tokens.iter().map(|t| t.id.as_str()).collect();
        let internal: Vec<&(&str, &str)> = self
            .edges
            .iter()
            .filter(|(head, dep)| head != dep && inside.contains(head) && inside.contains(dep))
            .collect();
        if internal.is_empty() {
            return None;
        }
        let with_incoming: HashSet<&str> = internal.iter().map(|(_, dep)| *dep).collect();
        let mut roots = tokens
            .iter()
            .filter(|t| !with_incoming.contains(t.id.as_str()));
        match (roots.next(), roots.next()) {
            (Some(root), None) => Some(root.id.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::fixtures::DocBuilder;

    use super::*;

    fn tokens(doc: &elementary_assertions_document::RelationsDocument) -> Vec<&Token> {
        doc.tokens.iter().collect()
    }

    #[test]
    fn test_dependency_root_wins_over_pos() {
        let doc = DocBuilder::new()
            .sentence(&[("the", "DT"), ("red", "JJ"), ("cart", "NN")])
            .relation("t2", "det", "t0")
            .relation("t2", "amod", "t1")
            .build();
        let evidence = HeadEvidence::collect(&doc.annotations);
        let (head, strategy) = evidence.resolve(&tokens(&doc), None);
        assert_eq!(head, "t2");
        assert_eq!(strategy, HeadStrategy::Dependency);
    }

    #[test]
    fn test_pos_fallback_prefers_last_noun() {
        let doc = DocBuilder::new()
            .sentence(&[("New", "NNP"), ("York", "NNP"), ("office", "NN")])
            .build();
        let evidence = HeadEvidence::collect(&doc.annotations);
        assert_eq!(
            evidence.resolve(&tokens(&doc), None),
            ("t2".to_string(), HeadStrategy::PosFallback)
        );
    }

    #[test]
    fn test_first_token_when_nothing_else_applies() {
        let doc = DocBuilder::new()
            .sentence(&[("in", "IN"), ("front", "JJ"), ("of", "IN")])
            .build();
        let evidence = HeadEvidence::collect(&doc.annotations);
        assert_eq!(
            evidence.resolve(&tokens(&doc), None),
            ("t0".to_string(), HeadStrategy::FirstToken)
        );
    }

    #[test]
    fn test_materialized_mwe_head() {
        let doc = DocBuilder::new()
            .sentence(&[("New", "NNP"), ("York", "NNP")])
            .mwe_with_head(&["t0", "t1"], "t0")
            .build();
        let evidence = HeadEvidence::collect(&doc.annotations);
        assert_eq!(
            evidence.resolve(&tokens(&doc), doc.annotations.first()),
            ("t0".to_string(), HeadStrategy::MweMaterialization)
        );
    }
}
