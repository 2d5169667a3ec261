//! Command line adapter for `elementary-assertions`.
//!
//! Reads a relations document, probes the wikipedia-title-index service,
//! runs the core and writes the elementary assertions document.

pub mod config;
pub mod errors;
pub mod health;
pub mod runner;

pub use config::{FileConfig, Overrides};
pub use errors::CliError;
pub use health::UreqHealthProbe;
pub use runner::{run, validate, RunRequest};
