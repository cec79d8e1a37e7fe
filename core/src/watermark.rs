//! Sequence watermarks for idempotent re-delivery.
//!
//! A watermark is the highest event sequence a projection has committed for one
//! scope: `(projection, aggregate type, instance)`. Sequences are assigned by the
//! event log and increase across the whole log, so one watermark covers every
//! aggregate of a type inside an instance.
//!
//! Delivery is at-least-once. Before reducing an event the consumption loop asks
//! [`admit`] whether the event is new, already applied, or arrives ahead of its
//! predecessor.

use crate::aggregate::InstanceId;
use crate::event::EventHeader;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit a watermark is tracked for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatermarkScope {
    /// Projection name
    pub projection: String,
    /// Aggregate type tag of the events counted by this watermark
    pub aggregate_type: String,
    /// Instance (tenant)
    pub instance_id: InstanceId,
}

impl WatermarkScope {
    /// Create a new scope.
    #[must_use]
    pub fn new(
        projection: impl Into<String>,
        aggregate_type: impl Into<String>,
        instance_id: impl Into<InstanceId>,
    ) -> Self {
        Self {
            projection: projection.into(),
            aggregate_type: aggregate_type.into(),
            instance_id: instance_id.into(),
        }
    }

    /// The scope an event is counted in for the given projection.
    #[must_use]
    pub fn for_event(projection: &str, header: &EventHeader) -> Self {
        Self::new(
            projection,
            header.aggregate_type.clone(),
            header.instance_id.clone(),
        )
    }
}

impl fmt::Display for WatermarkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.projection, self.aggregate_type, self.instance_id
        )
    }
}

/// Decision for one delivered event against the current watermark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The event is new and must be reduced and committed.
    Apply,
    /// The event is at or below the watermark; it was committed before.
    AlreadyApplied {
        /// Current watermark
        watermark: u64,
    },
    /// The event's predecessor has not been committed yet.
    Gap {
        /// Current watermark
        watermark: u64,
    },
}

/// Decide what to do with an event given the scope's current watermark.
///
/// A missing watermark means nothing has been applied to the scope yet and
/// counts as 0. Gap detection only runs when `check_gaps` is set; it requires
/// the event source to deliver every event of the subscribed aggregate types.
///
/// ```
/// use iam_projection_core::watermark::{Admission, admit};
///
/// assert_eq!(admit(None, 1, 0, true), Admission::Apply);
/// assert_eq!(admit(Some(15), 15, 10, true), Admission::AlreadyApplied { watermark: 15 });
/// assert_eq!(admit(Some(5), 15, 10, true), Admission::Gap { watermark: 5 });
/// assert_eq!(admit(Some(5), 15, 10, false), Admission::Apply);
/// ```
#[must_use]
pub fn admit(
    watermark: Option<u64>,
    sequence: u64,
    previous_sequence: u64,
    check_gaps: bool,
) -> Admission {
    let watermark = watermark.unwrap_or(0);

    if sequence <= watermark {
        return Admission::AlreadyApplied { watermark };
    }

    if check_gaps && previous_sequence > watermark {
        return Admission::Gap { watermark };
    }

    Admission::Apply
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_event_of_scope_is_applied() {
        assert_eq!(admit(None, 15, 10, false), Admission::Apply);
        assert_eq!(admit(None, 1, 0, true), Admission::Apply);
    }

    #[test]
    fn redelivered_event_is_skipped() {
        assert_eq!(
            admit(Some(15), 15, 10, true),
            Admission::AlreadyApplied { watermark: 15 }
        );
        assert_eq!(
            admit(Some(20), 15, 10, false),
            Admission::AlreadyApplied { watermark: 20 }
        );
    }

    #[test]
    fn predecessor_at_watermark_is_not_a_gap() {
        assert_eq!(admit(Some(10), 15, 10, true), Admission::Apply);
        assert_eq!(admit(Some(12), 15, 10, true), Admission::Apply);
    }

    #[test]
    fn scope_display() {
        let scope = WatermarkScope::new("org_domains", "org", "instance-id");
        assert_eq!(scope.to_string(), "org_domains/org/instance-id");
    }

    proptest! {
        #[test]
        fn never_applies_at_or_below_watermark(
            watermark in 0_u64..10_000,
            sequence in 0_u64..10_000,
            previous in 0_u64..10_000,
            check in any::<bool>(),
        ) {
            let admission = admit(Some(watermark), sequence, previous, check);
            if sequence <= watermark {
                prop_assert_eq!(admission, Admission::AlreadyApplied { watermark });
            } else {
                prop_assert_ne!(admission, Admission::AlreadyApplied { watermark });
            }
        }

        #[test]
        fn gaps_only_reported_when_checking(
            watermark in 0_u64..10_000,
            sequence in 0_u64..10_000,
            previous in 0_u64..10_000,
        ) {
            let admission = admit(Some(watermark), sequence, previous, false);
            prop_assert!(
                !matches!(admission, Admission::Gap { .. }),
                "gap reported with checking disabled"
            );
        }
    }
}
