//! Translation of failed upstream responses into provider errors.
//!
//! Adapters hand every non-success response to an [`ErrorTranslator`]. The
//! translator either returns the error to propagate or `None`, meaning the
//! response is acceptable after all and normal processing continues.

use crate::error::ProviderError;

/// Longest body excerpt kept in error messages.
const BODY_EXCERPT_CHARS: usize = 512;

/// A raw upstream response, as seen by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl UpstreamResponse {
    /// Creates a new upstream response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body truncated for inclusion in error messages.
    pub fn body_excerpt(&self) -> String {
        let body = self.body.trim();
        if body.chars().count() <= BODY_EXCERPT_CHARS {
            body.to_string()
        } else {
            let cut: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
            format!("{}...", cut)
        }
    }
}

/// Policy turning failed upstream responses into domain errors.
pub trait ErrorTranslator: Send + Sync {
    /// Returns the error for `response`, or `None` to continue normally.
    ///
    /// `operation` names the adapter call (e.g. "schedule") for messages.
    fn translate(&self, operation: &str, response: &UpstreamResponse) -> Option<ProviderError>;
}

/// Fail-fast translator used unless another one is injected.
///
/// - 2xx: continue
/// - 401/403: `AuthenticationFailed`
/// - 429: `RateLimited`
/// - anything else: `Upstream` carrying the status
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorTranslator;

impl ErrorTranslator for DefaultErrorTranslator {
    fn translate(&self, operation: &str, response: &UpstreamResponse) -> Option<ProviderError> {
        if response.is_success() {
            return None;
        }

        let error = match response.status {
            401 | 403 => ProviderError::authentication(format!(
                "{} rejected credentials: {}",
                operation,
                response.body_excerpt()
            )),
            429 => ProviderError::rate_limited(format!("{} rate limit exceeded", operation)),
            status => ProviderError::upstream(
                status,
                format!("{} failed: {}", operation, response.body_excerpt()),
            ),
        };

        Some(error.with_status(response.status))
    }
}
