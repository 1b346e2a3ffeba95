//! Error types for the thyme-feeds crate.
//!
//! Every fetch failure is reduced to one of these variants before it leaves a
//! provider. They are `Clone` because the orchestrator delivers them to the
//! display as data alongside the last known good value. Messages never carry
//! access tokens.

/// Reasons a single feed fetch can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The fetch did not complete within the caller-imposed timeout.
    #[error("fetch timed out: {0}")]
    Timeout(String),

    /// Transport failure or an unexpected HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote service rejected our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The source is not usable right now (missing directory, no images,
    /// fetch task died).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Invalid feed configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl FetchError {
    /// Short machine-readable label, used in logs and the JSON event stream.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unavailable(_) => "unavailable",
            Self::Config(_) => "config",
        }
    }

    /// Map a reqwest error onto the taxonomy.
    pub(crate) fn from_reqwest(source: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(format!("{source}: {err}"));
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Self::Unauthorized(format!("{source} returned {status}"));
            }
        }
        if err.is_decode() {
            return Self::Parse(format!("{source}: {err}"));
        }
        Self::Network(format!("{source}: {err}"))
    }
}

/// Convenience type alias for feed results.
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let err = FetchError::Timeout("weather exceeded 10s".into());
        assert_eq!(err.to_string(), "fetch timed out: weather exceeded 10s");
    }

    #[test]
    fn display_unauthorized() {
        let err = FetchError::Unauthorized("calendar returned 401".into());
        assert_eq!(err.to_string(), "unauthorized: calendar returned 401");
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(FetchError::Timeout(String::new()).kind(), "timeout");
        assert_eq!(FetchError::Network(String::new()).kind(), "network");
        assert_eq!(FetchError::Parse(String::new()).kind(), "parse");
        assert_eq!(FetchError::Unauthorized(String::new()).kind(), "unauthorized");
        assert_eq!(FetchError::Unavailable(String::new()).kind(), "unavailable");
        assert_eq!(FetchError::Config(String::new()).kind(), "config");
    }

    #[test]
    fn error_is_send_sync_clone() {
        fn assert_bounds<T: Send + Sync + Clone>() {}
        assert_bounds::<FetchError>();
    }
}
