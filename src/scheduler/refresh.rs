//! What a refresh task hands to its result callback.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;
use thyme_feeds::FetchError;

/// A value is overdue once its last success is older than this many intervals.
pub const OVERDUE_FACTOR: u32 = 2;

/// Outcome of one refresh cycle.
///
/// A failure never arrives without context: if an earlier fetch succeeded
/// the retained value comes along as [`Refresh::Stale`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Refresh<T> {
    /// The fetch just succeeded.
    Fresh { value: T },
    /// The fetch failed; `value` is the last known good one.
    Stale {
        value: T,
        last_success_at: DateTime<Local>,
        #[serde(serialize_with = "serialize_error")]
        error: FetchError,
        overdue: bool,
    },
    /// The fetch failed and nothing has ever succeeded.
    Unavailable {
        #[serde(serialize_with = "serialize_error")]
        error: FetchError,
    },
}

impl<T> Refresh<T> {
    /// The value to show, fresh or retained.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fresh { value } | Self::Stale { value, .. } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }

    /// The failure behind this delivery, if any.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Fresh { .. } => None,
            Self::Stale { error, .. } | Self::Unavailable { error } => Some(error),
        }
    }

    /// Convert the carried value, keeping freshness and error.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Refresh<U> {
        match self {
            Self::Fresh { value } => Refresh::Fresh { value: f(value) },
            Self::Stale {
                value,
                last_success_at,
                error,
                overdue,
            } => Refresh::Stale {
                value: f(value),
                last_success_at,
                error,
                overdue,
            },
            Self::Unavailable { error } => Refresh::Unavailable { error },
        }
    }
}

/// Whether a value last refreshed `age` ago is overdue for a task that
/// refreshes every `interval`.
pub fn is_overdue(age: Duration, interval: Duration) -> bool {
    age > interval.saturating_mul(OVERDUE_FACTOR)
}

fn serialize_error<S: serde::Serializer>(error: &FetchError, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    let mut state = s.serialize_struct("FetchError", 2)?;
    state.serialize_field("kind", error.kind())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn overdue_after_twice_the_interval() {
        let interval = Duration::from_secs(10);
        assert!(!is_overdue(Duration::from_secs(5), interval));
        assert!(!is_overdue(Duration::from_secs(20), interval));
        assert!(is_overdue(Duration::from_secs(21), interval));
    }

    #[test]
    fn value_and_error_accessors() {
        let fresh: Refresh<u32> = Refresh::Fresh { value: 3 };
        assert_eq!(fresh.value(), Some(&3));
        assert!(fresh.error().is_none());
        assert!(fresh.is_fresh());

        let gone: Refresh<u32> = Refresh::Unavailable {
            error: FetchError::Timeout("slow".into()),
        };
        assert_eq!(gone.value(), None);
        assert_eq!(gone.error().map(FetchError::kind), Some("timeout"));
    }

    #[test]
    fn map_keeps_staleness() {
        let stale = Refresh::Stale {
            value: 21,
            last_success_at: Local::now(),
            error: FetchError::Network("down".into()),
            overdue: true,
        };
        match stale.map(|v| v * 2) {
            Refresh::Stale { value, overdue, .. } => {
                assert_eq!(value, 42);
                assert!(overdue);
            }
            other => panic!("expected stale, got {other:?}"),
        }
    }

    #[test]
    fn serializes_with_status_tag() {
        let gone: Refresh<u32> = Refresh::Unavailable {
            error: FetchError::Unauthorized("calendar returned 401".into()),
        };
        let json = serde_json::to_value(&gone).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["error"]["kind"], "unauthorized");
    }
}
