use std::collections::HashMap;

use bmh_domain::keys::BMH_ERROR_TIMESTAMP_ANNOTATION;
use chrono::{DateTime, Utc};

/// Transient vs. persistent classification of a host in `Error` (§4.E). The
/// stamped annotation is the arbiter's only durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Retry. Carries whether the caller still needs to stamp the
    /// annotation (it was absent) — `stamp_needed == false` means a prior
    /// cycle already stamped it and nothing further need be written.
    Transient { stamp_needed: bool },
    /// Beyond the retry window (or the stamp is unparseable, treated as
    /// already expired). The caller clears the stamp and fails hard.
    Persistent,
}

/// Classify a host currently observed in `Error`, given `now` and the
/// configured retry window. A missing stamp is transient-and-unstamped: the
/// first `Error` observation always gets one retry before any window check.
pub fn classify(annotations: &HashMap<String, String>, now: DateTime<Utc>, window_secs: u64) -> Verdict {
    let Some(stamp) = annotations.get(BMH_ERROR_TIMESTAMP_ANNOTATION) else {
        return Verdict::Transient { stamp_needed: true };
    };
    let Ok(stamped_at) = DateTime::parse_from_rfc3339(stamp) else {
        // Malformed timestamp can't be trusted to represent an in-window
        // error; treat it as already expired rather than retry forever.
        return Verdict::Persistent;
    };
    let age = now.signed_duration_since(stamped_at.with_timezone(&Utc));
    if age < chrono::Duration::seconds(window_secs as i64) {
        Verdict::Transient { stamp_needed: false }
    } else {
        Verdict::Persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn absent_stamp_is_transient_and_needs_stamping() {
        let v = classify(&HashMap::new(), Utc::now(), 300);
        assert_eq!(v, Verdict::Transient { stamp_needed: true });
    }

    #[test]
    fn recent_stamp_is_transient_without_restamping() {
        let now = Utc::now();
        let annotations = HashMap::from([(
            BMH_ERROR_TIMESTAMP_ANNOTATION.to_string(),
            (now - Duration::seconds(60)).to_rfc3339(),
        )]);
        assert_eq!(classify(&annotations, now, 300), Verdict::Transient { stamp_needed: false });
    }

    #[test]
    fn stamp_older_than_window_is_persistent() {
        let now = Utc::now();
        let annotations = HashMap::from([(
            BMH_ERROR_TIMESTAMP_ANNOTATION.to_string(),
            (now - Duration::seconds(600)).to_rfc3339(),
        )]);
        assert_eq!(classify(&annotations, now, 300), Verdict::Persistent);
    }

    #[test]
    fn malformed_stamp_is_persistent() {
        let now = Utc::now();
        let annotations = HashMap::from([(BMH_ERROR_TIMESTAMP_ANNOTATION.to_string(), "not-a-timestamp".to_string())]);
        assert_eq!(classify(&annotations, now, 300), Verdict::Persistent);
    }
}
