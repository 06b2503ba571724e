//! Error types for the extraction core.

use thiserror::Error;

/// Errors surfaced to the caller. Per-field conditions never appear here;
/// they become [`Warning`]s on the assembled record instead.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("document '{0}' has no pages")]
    EmptyDocument(String),

    #[error("unknown canonical field: {0}")]
    UnknownField(String),

    #[error("unknown bank: {0}")]
    UnknownBank(String),

    #[error("invalid pattern for {field}: {source}")]
    BadPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern for {field} selects capture group {group}, but the regex has {available}")]
    BadCaptureGroup {
        field: String,
        group: usize,
        available: usize,
    },

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Non-fatal conditions accumulated while normalizing a document. The record
/// is always produced; consumers decide whether a warning blocks acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An identifier field failed its format validation; the cleaned value
    /// is still carried best-effort.
    MalformedIdentifier { field: String, value: String },
    /// RUT and DV are both present but the modulo-11 check digit disagrees.
    CheckDigitMismatch { rut: String, dv: String, expected: String },
    /// A date field matched no accepted format; the raw text is kept.
    UnparsedDate { field: String, value: String },
    /// The comuna string stayed below the fuzzy acceptance threshold.
    ComunaUnresolved { value: String },
}

impl Warning {
    /// Stable code for downstream filtering.
    pub fn code(&self) -> &'static str {
        match self {
            Warning::MalformedIdentifier { .. } => "MALFORMED_IDENTIFIER",
            Warning::CheckDigitMismatch { .. } => "CHECK_DIGIT_MISMATCH",
            Warning::UnparsedDate { .. } => "UNPARSED_DATE",
            Warning::ComunaUnresolved { .. } => "COMUNA_UNRESOLVED",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MalformedIdentifier { field, value } => {
                write!(f, "{}: malformed identifier '{}'", field, value)
            }
            Warning::CheckDigitMismatch { rut, dv, expected } => {
                write!(f, "RUT {}-{}: check digit should be {}", rut, dv, expected)
            }
            Warning::UnparsedDate { field, value } => {
                write!(f, "{}: unparsed date '{}'", field, value)
            }
            Warning::ComunaUnresolved { value } => {
                write!(f, "comuna '{}' not found in gazetteer", value)
            }
        }
    }
}
