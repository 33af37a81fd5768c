use thiserror::Error;

/// Failure taxonomy for the upstream activities API. Every upstream failure
/// is mapped into one of these kinds and re-raised; nothing is swallowed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-checkable kind tag, surfaced alongside the message at the
    /// protocol boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidParameters(_) => "invalid_parameters",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Maps a non-success upstream HTTP status to the taxonomy. The upstream
    /// distinguishes rate limiting from bad credentials only by the message
    /// text of its 403 responses. 404 means not-found only on the details
    /// lookup path; the search endpoint never 404s for an empty result set.
    pub fn from_status(status: u16, message: &str, details_lookup: bool) -> ApiError {
        let msg = if message.is_empty() {
            format!("upstream returned status {status}")
        } else {
            message.to_string()
        };
        match status {
            400 => ApiError::InvalidParameters(msg),
            403 => {
                let lower = msg.to_lowercase();
                if lower.contains("rate limit") {
                    ApiError::RateLimited(msg)
                } else {
                    ApiError::Unauthorized(msg)
                }
            }
            414 => ApiError::InvalidParameters(format!("too many parameters: {msg}")),
            404 if details_lookup => ApiError::NotFound(msg),
            502 | 503 | 504 => ApiError::UpstreamUnavailable(msg),
            _ => ApiError::Internal(msg),
        }
    }

    /// Prefixes the message with operation context, keeping the kind. Used by
    /// the operation layer before errors cross the protocol boundary.
    pub fn with_context(self, op: &str) -> ApiError {
        match self {
            ApiError::InvalidParameters(m) => ApiError::InvalidParameters(format!("{op}: {m}")),
            ApiError::Unauthorized(m) => ApiError::Unauthorized(format!("{op}: {m}")),
            ApiError::RateLimited(m) => ApiError::RateLimited(format!("{op}: {m}")),
            ApiError::UpstreamUnavailable(m) => ApiError::UpstreamUnavailable(format!("{op}: {m}")),
            ApiError::NotFound(m) => ApiError::NotFound(format!("{op}: {m}")),
            ApiError::Internal(m) => ApiError::Internal(format!("{op}: {m}")),
        }
    }

    /// JSON body surfaced to tool callers.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ApiError::UpstreamUnavailable(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_400_to_invalid_parameters() {
        let err = ApiError::from_status(400, "bad bbox", false);
        assert!(matches!(err, ApiError::InvalidParameters(_)));
    }

    #[test]
    fn maps_403_rate_limit_message() {
        let err = ApiError::from_status(403, "Over Rate Limit for key", false);
        assert!(matches!(err, ApiError::RateLimited(_)));
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn maps_403_not_authorized_message() {
        let err = ApiError::from_status(403, "Not Authorized", false);
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn maps_other_403_to_unauthorized() {
        let err = ApiError::from_status(403, "Account Inactive", false);
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn maps_414_to_invalid_parameters() {
        let err = ApiError::from_status(414, "", false);
        match err {
            ApiError::InvalidParameters(m) => assert!(m.contains("too many parameters")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn maps_5xx_to_unavailable() {
        for status in [502, 503, 504] {
            let err = ApiError::from_status(status, "gateway", false);
            assert!(matches!(err, ApiError::UpstreamUnavailable(_)));
        }
    }

    #[test]
    fn maps_404_by_lookup_kind() {
        assert!(matches!(
            ApiError::from_status(404, "no asset", true),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(404, "no asset", false),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn context_preserves_kind() {
        let err = ApiError::RateLimited("Over Rate Limit".into()).with_context("search failed");
        assert_eq!(err.kind(), "rate_limited");
        assert!(err.to_string().contains("search failed"));
    }
}
