//! Error types for abstract and topic analysis

use std::time::Duration;

use thiserror::Error;

use super::validation::ParseError;

/// Error type for the analysis pipeline
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model provider did not respond within {timeout:?} after {attempts} attempt(s)")]
    Timeout { attempts: u32, timeout: Duration },

    #[error("Model provider error after {attempts} attempt(s): {message}")]
    Provider { message: String, attempts: u32 },

    #[error("Failed to parse model output: {0}")]
    Parse(#[from] ParseError),

    #[error("No analyzable content for topic '{topic}': {reason}")]
    NoAnalyzableContent { topic: String, reason: String },

    #[error("Topic analysis was cancelled")]
    Cancelled,

    #[error("Topic analysis exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl AnalysisError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "invalid_request",
            AnalysisError::Timeout { .. } => "timeout",
            AnalysisError::Provider { .. } => "provider_error",
            AnalysisError::Parse(_) => "parse_error",
            AnalysisError::NoAnalyzableContent { .. } => "no_analyzable_content",
            AnalysisError::Cancelled => "cancelled",
            AnalysisError::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }
}
