//! Error types for expectation declaration, request logging and verification.

use thiserror::Error;

/// Errors raised while declaring expectations or logging requests.
///
/// Configuration errors abort the declaring call; parse errors abort the
/// processing of a single logged request. Neither is recoverable within the
/// test that caused it.
#[derive(Debug, Clone, Error)]
pub enum ExpectError {
    // ===== Configuration errors (declaration time) =====
    #[error("cannot use {0} when matching against strings")]
    UnsupportedMatcher(String),

    #[error("field matchers accept at most 2 arguments, got {0}")]
    TooManyArguments(usize),

    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("a quantifier was added multiple times to expectation '{0}'")]
    QuantifierAlreadySet(String),

    #[error("quantifier range {min}..{max} can never be satisfied")]
    InvalidQuantifier { min: usize, max: usize },

    #[error("multiple responses defined for expectation '{0}'")]
    ResponseAlreadySet(String),

    #[error("invalid response status code {0}")]
    InvalidStatus(u16),

    #[error(
        "and_call_through called on expectation '{0}' which has no mock response; \
         use respond_with before and_call_through"
    )]
    CallThroughWithoutResponse(String),

    #[error("expectation {0} is not in the current scope chain")]
    ScopeNotOpen(String),

    // ===== Parse errors (request logging time) =====
    #[error("failed to parse form body: {0}")]
    FormBody(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl ExpectError {
    /// True for errors caused by a mis-specified expectation.
    pub fn is_configuration(&self) -> bool {
        !self.is_parse()
    }

    /// True for errors caused by malformed request data.
    pub fn is_parse(&self) -> bool {
        matches!(self, ExpectError::FormBody(_) | ExpectError::BodyRead(_))
    }
}

/// Aggregate verification failure, carrying the rendered summary.
#[derive(Debug, Clone, Error)]
#[error("{failed} HTTP expectation(s) failed\n{summary}")]
pub struct VerificationError {
    pub failed: usize,
    pub summary: String,
}
