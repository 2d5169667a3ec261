//! Puts every stage together into one output document.

use elementary_assertions_document::{
    AcceptedAnnotation, AnnotationKind, ElementaryAssertionsDocument, IndexBasis, OutputToken,
    PipelineInfo, RelationsDocument, SourceInput, Sources, SCHEMA_VERSION, STAGE,
};
use tracing::{debug, info_span};

use crate::assertion::{build_assertions, BuildContext};
use crate::config::BuilderConfig;
use crate::diagnostics::{build_coverage, build_diagnostics};
use crate::error::{Error, Result};
use crate::ids;
use crate::mention::{build_mentions, selector_tokens};
use crate::projection::project_relations;
use crate::token_index::TokenIndex;
use crate::wiki::build_wiki_evidence;

/// Name reported in `sources.pipeline`.
pub const PIPELINE_NAME: &str = "elementary-assertions";

fn accepted_annotations(index: &TokenIndex<'_>) -> Vec<AcceptedAnnotation> {
    let mut accepted: Vec<AcceptedAnnotation> = index
        .document()
        .annotations
        .iter()
        .filter(|annotation| annotation.is_accepted())
        .map(|annotation| {
            let mut token_ids: Vec<String> = match annotation.kind {
                AnnotationKind::Dependency => annotation
                    .head
                    .iter()
                    .chain(annotation.dep.iter())
                    .filter(|token| index.contains(&token.id))
                    .map(|token| token.id.clone())
                    .collect(),
                _ => selector_tokens(annotation, index)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|token| token.id.clone())
                    .collect(),
            };
            token_ids.sort();
            token_ids.dedup();
            AcceptedAnnotation {
                id: annotation.id.clone(),
                kind: annotation.kind,
                token_ids,
                label: annotation.label.clone(),
            }
        })
        .collect();
    accepted.sort_by(|a, b| a.id.cmp(&b.id));
    accepted
}

fn output_tokens(index: &TokenIndex<'_>) -> Vec<OutputToken> {
    index
        .tokens()
        .iter()
        .map(|token| OutputToken {
            id: token.id.clone(),
            i: token.i,
            segment_id: token.segment_id.clone(),
            span: token.span,
            surface: token.surface.clone(),
            pos: token.pos.clone(),
            lexicon: token.lexicon.clone(),
        })
        .collect()
}

/// Runs the core over a relations document.
///
/// This does not touch the WTI gate; see
/// [`run_elementary_assertions`](crate::run_elementary_assertions) for the
/// full run.
pub fn build_elementary_assertions(
    doc: &RelationsDocument,
    config: &BuilderConfig,
) -> Result<ElementaryAssertionsDocument> {
    let _span = info_span!("build_elementary_assertions").entered();
    let index = TokenIndex::new(doc)?;
    let mentions = build_mentions(&index);
    let projection = project_relations(&index, &mentions);
    let ctx = BuildContext {
        index: &index,
        mentions: &mentions,
        projection: &projection,
        config,
    };
    let assertions = build_assertions(&ctx);
    let coverage = build_coverage(&index, &mentions, &projection, &assertions);
    let diagnostics = build_diagnostics(&index, &projection, &assertions, &coverage);

    let input = serde_json::to_value(doc)
        .map_err(|err| Error::precondition(format!("input is not serializable: {err}")))?;
    let mut segments = doc.segments.clone();
    segments.sort_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.id.cmp(&b.id)));

    let tokens = output_tokens(&index);
    let accepted_annotations = accepted_annotations(&index);
    let mentions = mentions.into_vec();
    let wiki_title_evidence = build_wiki_evidence(&index, &mentions, &assertions.assertions);
    debug!(
        mentions = mentions.len(),
        assertions = assertions.assertions.len(),
        "assembled output document"
    );

    Ok(ElementaryAssertionsDocument {
        schema_version: Some(SCHEMA_VERSION.to_string()),
        seed_id: doc.seed_id.clone(),
        stage: STAGE.to_string(),
        index_basis: IndexBasis::default(),
        canonical_text: doc.canonical_text.clone(),
        segments,
        tokens,
        mentions,
        assertions: assertions.assertions,
        relation_projection: projection.relations,
        accepted_annotations,
        wiki_title_evidence,
        diagnostics,
        coverage,
        sources: Sources {
            inputs: vec![SourceInput {
                artifact: "relations".to_string(),
                digest: ids::input_digest(&input),
            }],
            pipeline: PipelineInfo {
                name: PIPELINE_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        },
    })
}
