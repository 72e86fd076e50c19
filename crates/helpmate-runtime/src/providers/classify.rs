//! Default heuristic classification of raw provider failures.
//!
//! Drivers with precise status-code knowledge classify their own errors; this
//! fallback maps everything else into the taxonomy by message substrings,
//! plus a bounded scan of the cause chain for low-level timeout failures.

use std::collections::HashSet;
use std::error::Error;
use std::io;

use super::ProviderError;

/// Maximum ancestors inspected when scanning a cause chain.
const CAUSE_SCAN_MAX_DEPTH: usize = 10;

const RATE_LIMIT_NEEDLES: [&str; 4] = ["rate limit", "429", "too many requests", "quota exceeded"];
const INVALID_REQUEST_NEEDLES: [&str; 4] = ["400", "bad request", "invalid request", "validation"];
const AUTH_NEEDLES: [&str; 6] = [
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "authentication",
    "api key",
];
const TIMEOUT_NEEDLES: [&str; 3] = ["timeout", "timed out", "deadline"];

/// Classify a raw failure into a [`ProviderError`].
///
/// Checks run in the same order as the original heuristics: rate limit,
/// invalid request, timeout, auth, then generic provider. The raw error is
/// kept as the cause of the classified error.
pub fn classify(err: Box<dyn Error + Send + Sync>) -> ProviderError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    if contains_any(&lower, &RATE_LIMIT_NEEDLES) {
        return ProviderError::rate_limit(message, None).with_source(err);
    }
    if contains_any(&lower, &INVALID_REQUEST_NEEDLES) {
        return ProviderError::invalid_request(message).with_source(err);
    }
    if is_timeout(err.as_ref()) {
        return ProviderError::timeout(message).with_source(err);
    }
    if contains_any(&lower, &AUTH_NEEDLES) {
        return ProviderError::auth(message).with_source(err);
    }

    ProviderError::provider(message).with_source(err)
}

fn contains_any(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| message.contains(needle))
}

fn mentions_timeout(message: &str) -> bool {
    contains_any(message, &TIMEOUT_NEEDLES)
}

/// Whether the failure is timeout-shaped: its own message mentions a timeout,
/// or a timeout-indicating failure sits somewhere in its cause chain.
fn is_timeout(err: &(dyn Error + 'static)) -> bool {
    if mentions_timeout(&err.to_string().to_lowercase()) {
        return true;
    }
    has_timeout_cause(err)
}

/// Scan up to [`CAUSE_SCAN_MAX_DEPTH`] ancestors for a timeout indicator.
///
/// The visited set is keyed by pointer identity so a self-referential chain
/// terminates instead of looping.
fn has_timeout_cause(err: &(dyn Error + 'static)) -> bool {
    let mut visited: HashSet<*const ()> = HashSet::new();
    let mut current = err.source();
    let mut depth = 0;

    while let Some(cause) = current {
        if depth >= CAUSE_SCAN_MAX_DEPTH {
            break;
        }
        if !visited.insert(cause as *const dyn Error as *const ()) {
            break;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        if mentions_timeout(&cause.to_string().to_lowercase()) {
            return true;
        }

        current = cause.source();
        depth += 1;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderErrorKind;
    use std::fmt;

    /// Test error with an explicit cause, for exercising chain scans.
    #[derive(Debug)]
    struct ChainError {
        message: String,
        cause: Option<Box<dyn Error + Send + Sync>>,
    }

    impl ChainError {
        fn new(message: &str) -> Self {
            Self {
                message: message.to_string(),
                cause: None,
            }
        }

        fn caused_by(message: &str, cause: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
            Self {
                message: message.to_string(),
                cause: Some(cause.into()),
            }
        }
    }

    impl fmt::Display for ChainError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Error for ChainError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.cause
                .as_ref()
                .map(|c| c.as_ref() as &(dyn Error + 'static))
        }
    }

    fn classify_message(message: &str) -> ProviderError {
        classify(Box::new(ChainError::new(message)))
    }

    #[test]
    fn test_rate_limit_message() {
        let err = classify_message("rate limit exceeded");
        assert!(matches!(err.kind(), ProviderErrorKind::RateLimit { .. }));
        assert!(err.is_retryable());
        assert_eq!(err.message(), "rate limit exceeded");
    }

    #[test]
    fn test_status_429_message() {
        let err = classify_message("HTTP 429 from upstream");
        assert!(matches!(err.kind(), ProviderErrorKind::RateLimit { .. }));
    }

    #[test]
    fn test_invalid_request_message() {
        let err = classify_message("request failed validation");
        assert!(matches!(err.kind(), ProviderErrorKind::InvalidRequest));
        assert!(err.is_not_retryable());
    }

    #[test]
    fn test_auth_message() {
        for message in ["401 from server", "forbidden", "bad api key"] {
            let err = classify_message(message);
            assert!(
                matches!(err.kind(), ProviderErrorKind::Auth),
                "expected Auth for {message:?}"
            );
        }
    }

    #[test]
    fn test_timeout_message() {
        let err = classify_message("connection timed out");
        assert!(matches!(err.kind(), ProviderErrorKind::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unmatched_message_is_generic_provider() {
        let err = classify_message("something odd happened");
        assert!(matches!(err.kind(), ProviderErrorKind::Provider { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rate_limit_wins_over_timeout_wording() {
        // Same precedence as the original heuristics.
        let err = classify_message("429 while waiting, request timed out");
        assert!(matches!(err.kind(), ProviderErrorKind::RateLimit { .. }));
    }

    #[test]
    fn test_io_timeout_deep_in_cause_chain() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "read stalled");
        let chain = ChainError::caused_by(
            "transport error",
            ChainError::caused_by("connection layer gave up", io_err),
        );
        let err = classify(Box::new(chain));
        assert!(matches!(err.kind(), ProviderErrorKind::Timeout));
    }

    #[test]
    fn test_timeout_wording_in_cause_chain() {
        let chain = ChainError::caused_by(
            "upstream call failed",
            ChainError::new("socket operation timed out"),
        );
        let err = classify(Box::new(chain));
        assert!(matches!(err.kind(), ProviderErrorKind::Timeout));
    }

    #[test]
    fn test_chain_scan_is_depth_bounded() {
        // Timeout buried below the scan depth must not be found.
        let mut inner: ChainError =
            ChainError::caused_by("level", io::Error::new(io::ErrorKind::TimedOut, "stalled"));
        for _ in 0..CAUSE_SCAN_MAX_DEPTH + 2 {
            inner = ChainError::caused_by("level", inner);
        }
        let err = classify(Box::new(inner));
        assert!(matches!(err.kind(), ProviderErrorKind::Provider { .. }));
    }

    #[test]
    fn test_timeout_within_scan_depth_is_found() {
        let mut inner: ChainError =
            ChainError::caused_by("level", io::Error::new(io::ErrorKind::TimedOut, "stalled"));
        for _ in 0..CAUSE_SCAN_MAX_DEPTH - 2 {
            inner = ChainError::caused_by("level", inner);
        }
        let err = classify(Box::new(inner));
        assert!(matches!(err.kind(), ProviderErrorKind::Timeout));
    }

    #[test]
    fn test_classified_error_keeps_cause() {
        use std::error::Error as _;
        let err = classify(Box::new(ChainError::new("rate limit exceeded")));
        assert!(err.source().is_some());
    }
}
