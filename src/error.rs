//! Error taxonomy for the notice pipeline.
//!
//! Load and parse failures abort a run. Per-domain resolution failures never
//! leave the resolver; they are absorbed as the `"N/A"` sentinel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network or IO failure while fetching or opening the document
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Content decoded but is not a notice document
    #[error("Invalid document format: {0}")]
    InvalidFormat(String),

    /// Remote host wants confirmation or credentials we cannot supply
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Flattening produced zero rows
    #[error("No rows produced from {source_name}: the document has no infringing URLs")]
    EmptyResultSet { source_name: String },
}

impl PipelineError {
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    /// Whether this is the "ran fine, nothing to report" terminal state
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResultSet { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::SourceUnavailable(e.to_string())
    }
}

/// Failure of a single name lookup. Recovered locally by the resolver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("lookup for {domain} timed out after {timeout_ms}ms")]
    Timeout { domain: String, timeout_ms: u64 },

    #[error("lookup for {domain} failed: {reason}")]
    Failure { domain: String, reason: String },
}

impl ResolutionError {
    pub fn failure(domain: &str, reason: impl Into<String>) -> Self {
        Self::Failure {
            domain: domain.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_is_distinguishable() {
        let empty = PipelineError::EmptyResultSet { source_name: "notices.json".to_string() };
        assert!(empty.is_empty_result());
        assert!(!PipelineError::invalid_format("bad").is_empty_result());
    }

    #[test]
    fn test_io_error_maps_to_source_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::SourceUnavailable(ref m) if m.contains("missing.json")));
    }
}
