use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Requeue hint returned by every reconciler entry point (spec §6).
///
/// A bare `Duration` would let call sites silently drift from the two named
/// intervals the spec fixes (15s / 1min); keeping them as enum variants means
/// "what does this reconciler wait for" stays greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequeueHint {
    /// Do not requeue — this object is fully reconciled.
    #[default]
    None,
    /// 15 seconds. Used while waiting for the external operator to observe
    /// a label/annotation change or advance a provisioning state.
    Short,
    /// 1 minute. Used after promoting a node in the rolling scheduler.
    Medium,
    /// An explicit, non-standard interval.
    Long(Duration),
}

pub const SHORT: Duration = Duration::from_secs(15);
pub const MEDIUM: Duration = Duration::from_secs(60);

impl RequeueHint {
    pub fn duration(self) -> Option<Duration> {
        match self {
            RequeueHint::None => None,
            RequeueHint::Short => Some(SHORT),
            RequeueHint::Medium => Some(MEDIUM),
            RequeueHint::Long(d) => Some(d),
        }
    }

    pub fn is_requeue(self) -> bool {
        !matches!(self, RequeueHint::None)
    }

    /// Combine two hints from independent concurrent tasks: the shorter
    /// non-`None` backoff wins, matching the Allocator's "first error is
    /// retained; shortest requested backoff wins" aggregation rule (§4.A).
    pub fn combine(self, other: RequeueHint) -> RequeueHint {
        match (self.duration(), other.duration()) {
            (None, None) => RequeueHint::None,
            (Some(_), None) => self,
            (None, Some(_)) => other,
            (Some(a), Some(b)) => {
                if a <= b {
                    self
                } else {
                    other
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_picks_shortest_nonzero_backoff() {
        let combined = RequeueHint::Medium.combine(RequeueHint::Short);
        assert_eq!(combined, RequeueHint::Short);
    }

    #[test]
    fn combine_prefers_any_requeue_over_none() {
        assert_eq!(RequeueHint::None.combine(RequeueHint::Short), RequeueHint::Short);
        assert_eq!(RequeueHint::Short.combine(RequeueHint::None), RequeueHint::Short);
    }

    #[test]
    fn combine_of_two_nones_is_none() {
        assert_eq!(RequeueHint::None.combine(RequeueHint::None), RequeueHint::None);
    }
}
