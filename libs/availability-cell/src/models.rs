use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What is currently believed about the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Unknown,
    Available { checked_at: DateTime<Utc> },
    Unavailable { checked_at: DateTime<Utc> },
}

impl Availability {
    pub fn decided(available: bool, at: DateTime<Utc>) -> Self {
        if available {
            Availability::Available { checked_at: at }
        } else {
            Availability::Unavailable { checked_at: at }
        }
    }

    /// The cached answer, or `None` when a probe is needed. An `Unavailable`
    /// verdict expires after `recheck_after`; `Available` holds until a
    /// failure is reported.
    pub fn verdict(&self, recheck_after: Option<Duration>, now: DateTime<Utc>) -> Option<bool> {
        match self {
            Availability::Unknown => None,
            Availability::Available { .. } => Some(true),
            Availability::Unavailable { checked_at } => match recheck_after {
                Some(window) if now - *checked_at >= window => None,
                _ => Some(false),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub availability: Availability,
    pub health_url: String,
    pub probes_sent: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendStatusQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_needs_probe() {
        assert_eq!(Availability::Unknown.verdict(None, Utc::now()), None);
    }

    #[test]
    fn test_unavailable_is_sticky_without_recheck_window() {
        let decided = Availability::decided(false, Utc::now() - Duration::hours(5));

        assert_eq!(decided.verdict(None, Utc::now()), Some(false));
    }

    #[test]
    fn test_unavailable_expires_after_window() {
        let now = Utc::now();
        let decided = Availability::decided(false, now - Duration::seconds(61));

        assert_eq!(decided.verdict(Some(Duration::seconds(60)), now), None);
        assert_eq!(decided.verdict(Some(Duration::seconds(120)), now), Some(false));
    }

    #[test]
    fn test_available_holds() {
        let decided = Availability::decided(true, Utc::now() - Duration::days(1));

        assert_eq!(decided.verdict(Some(Duration::seconds(1)), Utc::now()), Some(true));
    }
}
