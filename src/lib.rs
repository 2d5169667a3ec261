//! Deterministic elementary assertion extraction.
//!
//! Takes an enriched relations document (tokens, segments and accepted
//! dependency annotations with wikipedia-title-index signals) and produces
//! an `elementary_assertions` document: mentions, predicate-argument
//! assertions, projected relations, coverage and diagnostics.
//!
//! ## Entry points
//!
//! - [`build_elementary_assertions`] - core build without the evidence gate
//! - [`run_elementary_assertions`] - full run: WTI gate, build, validation
//! - [`validate_document`] - structural and referential checks on an output
//!
//! Output is byte-stable: the same input and configuration always serialize
//! to the same JSON.

mod assemble;
mod assertion;
pub mod config;
mod diagnostics;
pub mod error;
pub mod ids;
pub mod lexical;
pub mod mention;
mod pipeline;
pub mod projection;
pub mod token_index;
mod validate;
pub mod wiki;

pub use elementary_assertions_document as document;

pub use assemble::{build_elementary_assertions, PIPELINE_NAME};
pub use assertion::AssertionSet;
pub use config::{BuilderConfig, RunOptions, DEFAULT_WTI_TIMEOUT_MS};
pub use diagnostics::UNRESOLVED_REASON_PRECEDENCE;
pub use error::{Error, Result, ValidationCode, ValidationError};
pub use pipeline::{run_elementary_assertions, HealthProbe};
pub use validate::validate_document;
