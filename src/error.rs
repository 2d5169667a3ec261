//! Error types for elementary assertion runs.
//!
//! Candidate-resolution mismatches inside the core are not errors; they are
//! recorded as dropped relations or diagnostics instead. Everything here
//! aborts the run.

use thiserror::Error;

/// Stable machine-readable codes for validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCode {
    SchemaShape,
    DuplicateId,
    UnknownReference,
    PrimaryPartition,
    CoveragePartition,
    SortOrder,
    TokenDisjointness,
    SuppressionTrace,
    DiagnosticCoherence,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::SchemaShape => "EA_VALIDATE_SCHEMA_SHAPE",
            ValidationCode::DuplicateId => "EA_VALIDATE_DUPLICATE_ID",
            ValidationCode::UnknownReference => "EA_VALIDATE_UNKNOWN_REFERENCE",
            ValidationCode::PrimaryPartition => "EA_VALIDATE_PRIMARY_PARTITION",
            ValidationCode::CoveragePartition => "EA_VALIDATE_COVERAGE_PARTITION",
            ValidationCode::SortOrder => "EA_VALIDATE_SORT_ORDER",
            ValidationCode::TokenDisjointness => "EA_VALIDATE_TOKEN_DISJOINTNESS",
            ValidationCode::SuppressionTrace => "EA_VALIDATE_SUPPRESSION_TRACE",
            ValidationCode::DiagnosticCoherence => "EA_VALIDATE_DIAGNOSTIC_COHERENCE",
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed validation check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors that abort an elementary assertions run.
#[derive(Debug, Error)]
pub enum Error {
    /// The upstream document is missing something the core cannot do without.
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// The wikipedia-title-index evidence gate did not pass.
    #[error("{message}")]
    MandatoryEvidence { message: String },

    /// The produced document failed a validation check.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition {
            message: message.into(),
        }
    }

    pub fn mandatory_evidence(message: impl Into<String>) -> Self {
        Error::MandatoryEvidence {
            message: message.into(),
        }
    }

    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Precondition { .. } => "EA_PRECONDITION",
            Error::MandatoryEvidence { .. } => "EA_MANDATORY_EVIDENCE",
            Error::Validation(err) => err.code.as_str(),
        }
    }
}

/// Result type for elementary assertion operations.
pub type Result<T> = std::result::Result<T, Error>;
