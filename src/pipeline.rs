//! Full run: evidence gate, core build, validation.

use std::time::Duration;

use elementary_assertions_document::{ElementaryAssertionsDocument, RelationsDocument};
use tracing::{debug, info};

use crate::assemble::build_elementary_assertions;
use crate::config::RunOptions;
use crate::error::{Error, Result};
use crate::token_index::TokenIndex;
use crate::validate::validate_document;

/// Reachability check against the wikipedia-title-index service.
///
/// Implementations make exactly one attempt and report any failure as a
/// human-readable reason.
pub trait HealthProbe {
    fn check(&self, endpoint: &str, timeout: Duration) -> std::result::Result<(), String>;
}

/// Gates on WTI evidence, builds the document and validates it.
///
/// Nothing is computed before the endpoint is configured, the probe
/// succeeds and the input carries at least one positive signal.
pub fn run_elementary_assertions(
    doc: &RelationsDocument,
    options: &RunOptions,
    probe: &dyn HealthProbe,
) -> Result<ElementaryAssertionsDocument> {
    let endpoint = options
        .wti_endpoint
        .as_deref()
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
        .ok_or_else(|| {
            Error::mandatory_evidence(
                "WTI endpoint is required for elementary-assertions runs (wikipedia-title-index service).",
            )
        })?;

    let timeout = Duration::from_millis(options.wti_timeout_ms);
    probe.check(endpoint, timeout).map_err(|reason| {
        Error::mandatory_evidence(format!("WTI health check failed for {endpoint}: {reason}"))
    })?;
    debug!(endpoint, "WTI health check passed");

    let signals = TokenIndex::new(doc)?.positive_wiki_signal_count();
    if signals == 0 {
        return Err(Error::mandatory_evidence(
            "No positive wikipedia-title-index signals found in the input tokens; \
             WTI evidence is mandatory for elementary-assertions runs.",
        ));
    }

    let output = build_elementary_assertions(doc, &options.builder)?;
    validate_document(&output, options.strict)?;
    info!(
        assertions = output.assertions.len(),
        suppressed = output.diagnostics.suppressed_assertions.len(),
        signals,
        "elementary assertions run complete"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::tests::fixtures::DocBuilder;

    use super::*;

    struct CountingProbe {
        calls: Cell<usize>,
        result: std::result::Result<(), String>,
    }

    impl CountingProbe {
        fn new(result: std::result::Result<(), String>) -> Self {
            Self {
                calls: Cell::new(0),
                result,
            }
        }
    }

    impl HealthProbe for CountingProbe {
        fn check(&self, _endpoint: &str, _timeout: Duration) -> std::result::Result<(), String> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }
    }

    fn signalled() -> RelationsDocument {
        DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("builds", "VBZ"), ("carts", "NNS"), (".", ".")])
            .relation("t1", "nsubj", "t0")
            .relation("t1", "obj", "t2")
            .wiki_exact("t0")
            .build()
    }

    #[test]
    fn test_missing_endpoint_fails_before_probe() {
        let probe = CountingProbe::new(Ok(()));
        let err = run_elementary_assertions(&signalled(), &RunOptions::default(), &probe).unwrap_err();
        assert_eq!(
            err.to_string(),
            "WTI endpoint is required for elementary-assertions runs (wikipedia-title-index service)."
        );
        assert_eq!(err.code(), "EA_MANDATORY_EVIDENCE");
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_probe_failure_is_attempted_once() {
        let probe = CountingProbe::new(Err("status 503".to_string()));
        let options = RunOptions::with_endpoint("http://127.0.0.1:9");
        let err = run_elementary_assertions(&signalled(), &options, &probe).unwrap_err();
        assert_eq!(
            err.to_string(),
            "WTI health check failed for http://127.0.0.1:9: status 503"
        );
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn test_zero_signals_is_mandatory_evidence_failure() {
        let doc = DocBuilder::new()
            .sentence(&[("Alpha", "NNP"), ("waits", "VBZ")])
            .relation("t1", "nsubj", "t0")
            .build();
        let probe = CountingProbe::new(Ok(()));
        let err = run_elementary_assertions(&doc, &RunOptions::with_endpoint("http://wti"), &probe)
            .unwrap_err();
        assert!(matches!(err, Error::MandatoryEvidence { .. }));
    }

    #[test]
    fn test_successful_run_validates() {
        let probe = CountingProbe::new(Ok(()));
        let mut options = RunOptions::with_endpoint("http://wti");
        options.strict = true;
        let output = run_elementary_assertions(&signalled(), &options, &probe).unwrap();
        assert_eq!(output.assertions.len(), 1);
        assert_eq!(output.wiki_title_evidence.mention_matches.len(), 1);
        assert_eq!(probe.calls.get(), 1);
    }
}
