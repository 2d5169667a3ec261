//! Optional TOML configuration file.
//!
//! ```toml
//! [wti]
//! endpoint = "http://localhost:32123"
//! timeout_ms = 2500
//!
//! [heuristics]
//! fallback_theme_window = 8
//! ```

use std::path::Path;

use elementary_assertions::{BuilderConfig, RunOptions, DEFAULT_WTI_TIMEOUT_MS};
use serde::Deserialize;

use crate::errors::CliError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub wti: WtiConfig,
    pub heuristics: BuilderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WtiConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for WtiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_WTI_TIMEOUT_MS,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub wti_endpoint: Option<String>,
    pub wti_timeout_ms: Option<u64>,
    pub strict: bool,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_run_options(self, overrides: Overrides) -> RunOptions {
        RunOptions {
            wti_endpoint: overrides.wti_endpoint.or(self.wti.endpoint),
            wti_timeout_ms: overrides.wti_timeout_ms.unwrap_or(self.wti.timeout_ms),
            strict: overrides.strict,
            builder: self.heuristics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let config: FileConfig = toml::from_str(
            r#"
            [wti]
            endpoint = "http://from-file:1"
            timeout_ms = 900

            [heuristics]
            fallback_theme_window = 6
            "#,
        )
        .unwrap();
        let options = config.clone().into_run_options(Overrides {
            wti_endpoint: Some("http://from-flag:2".to_string()),
            ..Default::default()
        });
        assert_eq!(options.wti_endpoint.as_deref(), Some("http://from-flag:2"));
        assert_eq!(options.wti_timeout_ms, 900);
        assert_eq!(options.builder.fallback_theme_window, 6);
        assert_eq!(options.builder.make_sure_window, 3);

        let options = config.into_run_options(Overrides::default());
        assert_eq!(options.wti_endpoint.as_deref(), Some("http://from-file:1"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.wti.timeout_ms, DEFAULT_WTI_TIMEOUT_MS);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("[wti]\nendpont = \"x\"\n").is_err());
    }
}
