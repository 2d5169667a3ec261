//! File-level `run` and `validate` commands.

use std::io::Write;
use std::path::{Path, PathBuf};

use elementary_assertions::document::{ElementaryAssertionsDocument, RelationsDocument};
use elementary_assertions::{run_elementary_assertions, validate_document, HealthProbe};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::{FileConfig, Overrides};
use crate::errors::CliError;

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub input: PathBuf,
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub compact: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs the full pipeline and writes the document to `--out` or `stdout`.
pub fn run(request: &RunRequest, probe: &dyn HealthProbe, stdout: &mut dyn Write) -> Result<(), CliError> {
    let file_config = match &request.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let options = file_config.into_run_options(request.overrides.clone());
    let doc: RelationsDocument = read_json(&request.input)?;

    let output = run_elementary_assertions(&doc, &options, probe)?;
    let mut rendered = if request.compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    }
    .map_err(CliError::Serialize)?;
    rendered.push('\n');

    match &request.out {
        Some(path) => {
            std::fs::write(path, rendered).map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
            info!(out = %path.display(), assertions = output.assertions.len(), "wrote output");
        }
        None => stdout
            .write_all(rendered.as_bytes())
            .map_err(|source| CliError::Write {
                path: PathBuf::from("<stdout>"),
                source,
            })?,
    }
    Ok(())
}

/// Validates an existing output file.
pub fn validate(input: &Path, strict: bool) -> Result<(), CliError> {
    let doc: ElementaryAssertionsDocument = read_json(input)?;
    validate_document(&doc, strict).map_err(elementary_assertions::Error::from)?;
    Ok(())
}
