//! Plan modifier: projects slot transitions onto the planned new state the
//! host shows the user before apply.
//!
//! Stable slots carry their computed attributes forward verbatim so the plan
//! shows no diff. Introduced and rotated slots mark the handle unknown; it is
//! determined at apply. Version tags are user-facing and diff normally.

use serde::{Deserialize, Serialize};

use super::fingerprint::SlotTransition;
use super::types::{OpaqueHandle, SlotId, VersionTag};

/// A computed attribute's value in the planned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedValue<T> {
    /// Carried forward from prior state; shows no diff.
    Known(T),
    /// Determined at apply; rendered as "(known after apply)".
    Unknown,
    /// Not part of the planned state.
    Absent,
}

impl<T> PlannedValue<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Absent,
        }
    }
}

/// Planned outcome for one secret slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    pub slot_id: SlotId,
    pub transition: SlotTransition,
    /// The tag that will be persisted after apply (absent on retire).
    pub version: PlannedValue<VersionTag>,
    /// The handle as shown in the plan.
    pub handle: PlannedValue<OpaqueHandle>,
}

/// Project one classified slot onto the planned state.
///
/// A stable slot whose prior handle is missing was flagged as drift on the
/// last refresh; it is upgraded to an introduce here so the apply re-seeds
/// the remote. Classification itself stays pure, the upgrade is a plan-layer
/// concern.
pub fn plan_slot(
    slot_id: SlotId,
    transition: SlotTransition,
    prior_handle: Option<&OpaqueHandle>,
    proposed_version: Option<&VersionTag>,
) -> SlotPlan {
    let transition = match transition {
        SlotTransition::Stable if prior_handle.is_none() => SlotTransition::Introduce,
        other => other,
    };

    let (version, handle) = match transition {
        SlotTransition::Stable => (
            PlannedValue::from_option(proposed_version.cloned()),
            // Invariant: stable slots never change their handle.
            PlannedValue::Known(
                prior_handle.cloned().expect("stable slot always has a prior handle"),
            ),
        ),
        SlotTransition::Introduce | SlotTransition::Rotate => {
            (PlannedValue::from_option(proposed_version.cloned()), PlannedValue::Unknown)
        }
        SlotTransition::NoOp | SlotTransition::Retire => {
            (PlannedValue::Absent, PlannedValue::Absent)
        }
    };

    SlotPlan { slot_id, transition, version, handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(v: &str) -> VersionTag {
        VersionTag::new(v)
    }

    fn handle(v: &str) -> OpaqueHandle {
        OpaqueHandle::new(v)
    }

    #[test]
    fn stable_carries_handle_forward_verbatim() {
        let prior = handle("enc:aaaa");
        let plan = plan_slot(
            SlotId::new("smtp.password"),
            SlotTransition::Stable,
            Some(&prior),
            Some(&tag("1")),
        );
        assert_eq!(plan.handle, PlannedValue::Known(handle("enc:aaaa")));
        assert_eq!(plan.version, PlannedValue::Known(tag("1")));
        assert_eq!(plan.transition, SlotTransition::Stable);
    }

    #[test]
    fn rotate_marks_handle_unknown() {
        let prior = handle("enc:aaaa");
        let plan = plan_slot(
            SlotId::new("smtp.password"),
            SlotTransition::Rotate,
            Some(&prior),
            Some(&tag("2")),
        );
        assert!(plan.handle.is_unknown());
        assert_eq!(plan.version, PlannedValue::Known(tag("2")));
    }

    #[test]
    fn introduce_marks_handle_unknown() {
        let plan = plan_slot(
            SlotId::new("jira.api_key"),
            SlotTransition::Introduce,
            None,
            Some(&tag("1")),
        );
        assert!(plan.handle.is_unknown());
    }

    #[test]
    fn retire_drops_both_attributes() {
        let prior = handle("enc:aaaa");
        let plan =
            plan_slot(SlotId::new("smtp.password"), SlotTransition::Retire, Some(&prior), None);
        assert_eq!(plan.handle, PlannedValue::Absent);
        assert_eq!(plan.version, PlannedValue::Absent);
    }

    #[test]
    fn drifted_stable_slot_is_reintroduced() {
        // Refresh cleared the handle but kept the tag; the next plan must
        // resubmit even though the tags still compare equal.
        let plan =
            plan_slot(SlotId::new("smtp.password"), SlotTransition::Stable, None, Some(&tag("1")));
        assert_eq!(plan.transition, SlotTransition::Introduce);
        assert!(plan.handle.is_unknown());
        assert_eq!(plan.version, PlannedValue::Known(tag("1")));
    }
}
