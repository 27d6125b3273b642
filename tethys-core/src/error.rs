//! Structured error types for the Tethys index.

use thiserror::Error;

/// Unified error type for all Tethys operations.
///
/// The variants mirror how the index reacts to a failure: `Parse` and
/// `Consistency` are attributed to one record during batch indexing and
/// never abort a run; `Codec` and `Dictionary` are recoverable at the
/// call site but indicate a data-format or configuration mismatch;
/// `Cancelled` signals a match timeout and leaves the session usable;
/// `Internal` propagates and aborts the current run.
#[derive(Debug, Error)]
pub enum TethysError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input text (SMILES, formula expressions, option strings)
    #[error("parse error: {0}")]
    Parse(String),

    /// Valid syntax but invalid chemistry (bad valence, broken stereo center)
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Malformed or truncated binary blob
    #[error("codec error: {0}")]
    Codec(String),

    /// Compression dictionary mismatch or corruption
    #[error("dictionary error: {0}")]
    Dictionary(String),

    /// A match call exceeded its deadline
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Unexpected internal fault; aborts the surrounding run
    #[error("internal error: {0}")]
    Internal(String),
}

impl TethysError {
    /// Whether this error can be attributed to a single record without
    /// aborting a batch run.
    pub fn is_record_level(&self) -> bool {
        matches!(self, TethysError::Parse(_) | TethysError::Consistency(_))
    }
}

/// Convenience alias used throughout the Tethys crates.
pub type Result<T> = std::result::Result<T, TethysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_level_classification() {
        assert!(TethysError::Parse("bad smiles".into()).is_record_level());
        assert!(TethysError::Consistency("valence".into()).is_record_level());
        assert!(!TethysError::Codec("truncated".into()).is_record_level());
        assert!(!TethysError::Internal("bug".into()).is_record_level());
    }

    #[test]
    fn display_includes_kind() {
        let err = TethysError::Dictionary("checksum mismatch".into());
        assert!(err.to_string().contains("dictionary"));
    }
}
