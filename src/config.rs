//! Tunable heuristics for the assertion builder.
//!
//! The token windows here were tuned against golden outputs. Changing a value
//! changes output for real documents, so regenerate baselines when you do.

use serde::{Deserialize, Serialize};

/// Token-distance windows used by the fallback and scaffold heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// How far after `make` a `sure` may appear for a make-sure scaffold.
    pub make_sure_window: usize,
    /// Fallback predicates look this far ahead for a theme mention.
    pub fallback_theme_window: usize,
    /// Fallback predicates look this far ahead for a spatial preposition.
    pub fallback_location_preposition_window: usize,
    /// Distance between that preposition and its noun phrase.
    pub fallback_location_np_window: usize,
    /// Theme mentions at least this long are candidates for trimming.
    pub oversized_theme_min_tokens: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            make_sure_window: 3,
            fallback_theme_window: 8,
            fallback_location_preposition_window: 9,
            fallback_location_np_window: 5,
            oversized_theme_min_tokens: 5,
        }
    }
}

/// Default WTI health-check timeout.
pub const DEFAULT_WTI_TIMEOUT_MS: u64 = 2500;

/// Options for a full run, including the evidence gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub wti_endpoint: Option<String>,
    pub wti_timeout_ms: u64,
    /// Run the diagnostic-coherence checks on top of the standard validation.
    pub strict: bool,
    pub builder: BuilderConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wti_endpoint: None,
            wti_timeout_ms: DEFAULT_WTI_TIMEOUT_MS,
            strict: false,
            builder: BuilderConfig::default(),
        }
    }
}

impl RunOptions {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            wti_endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: BuilderConfig =
            serde_json::from_str(r#"{ "fallback_theme_window": 6 }"#).unwrap();
        assert_eq!(config.fallback_theme_window, 6);
        assert_eq!(config.make_sure_window, 3);
        assert_eq!(config.fallback_location_np_window, 5);
    }
}
