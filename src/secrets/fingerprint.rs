//! Fingerprint register: classifies what happened to a secret slot between
//! the prior state and the proposed configuration.
//!
//! Classification looks at exactly one pair of values: the prior and the
//! proposed [`VersionTag`]. Plaintext is write-only and unavailable at plan
//! time, so it is never an input here. Two consecutive configurations with
//! the same tag but different plaintext classify as [`SlotTransition::Stable`]
//! on purpose: the tag is the user's assertion, not the provider's.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::VersionTag;

/// The transition a secret slot undergoes between two applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotTransition {
    /// Absent before, absent now. The slot stays absent.
    NoOp,
    /// Absent before, declared now. The slot is created and its handle is
    /// unknown until apply.
    Introduce,
    /// Same tag on both sides. The slot is untouched and its handle is
    /// carried forward verbatim.
    Stable,
    /// Different tag. The slot is resubmitted and the remote assigns a new
    /// handle.
    Rotate,
    /// Declared before, absent now. The slot is removed, which forces
    /// replacement of the parent.
    Retire,
}

impl SlotTransition {
    /// Whether this transition sends secret material to the remote.
    pub fn submits_plaintext(&self) -> bool {
        matches!(self, Self::Introduce | Self::Rotate)
    }
}

impl fmt::Display for SlotTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOp => "no-op",
            Self::Introduce => "introduce",
            Self::Stable => "stable",
            Self::Rotate => "rotate",
            Self::Retire => "retire",
        };
        write!(f, "{}", name)
    }
}

/// Classify a slot from its prior and proposed version tags.
///
/// Pure: the result depends on nothing but the two arguments.
pub fn classify(prior: Option<&VersionTag>, proposed: Option<&VersionTag>) -> SlotTransition {
    match (prior, proposed) {
        (None, None) => SlotTransition::NoOp,
        (None, Some(_)) => SlotTransition::Introduce,
        (Some(p), Some(n)) if p == n => SlotTransition::Stable,
        (Some(_), Some(_)) => SlotTransition::Rotate,
        (Some(_), None) => SlotTransition::Retire,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(v: &str) -> VersionTag {
        VersionTag::new(v)
    }

    #[test]
    fn classification_table() {
        assert_eq!(classify(None, None), SlotTransition::NoOp);
        assert_eq!(classify(None, Some(&tag("1"))), SlotTransition::Introduce);
        assert_eq!(classify(Some(&tag("1")), Some(&tag("1"))), SlotTransition::Stable);
        assert_eq!(classify(Some(&tag("1")), Some(&tag("2"))), SlotTransition::Rotate);
        assert_eq!(classify(Some(&tag("1")), None), SlotTransition::Retire);
    }

    #[test]
    fn imported_sentinel_always_rotates() {
        // After import the stored tag compares unequal to any user tag, so
        // the first apply re-seeds the secret.
        assert_eq!(
            classify(Some(&VersionTag::Imported), Some(&tag("1"))),
            SlotTransition::Rotate
        );
        assert_eq!(
            classify(Some(&VersionTag::Imported), Some(&tag("~imported~"))),
            SlotTransition::Rotate
        );
    }

    #[test]
    fn only_submitting_transitions_carry_plaintext() {
        assert!(SlotTransition::Introduce.submits_plaintext());
        assert!(SlotTransition::Rotate.submits_plaintext());
        assert!(!SlotTransition::Stable.submits_plaintext());
        assert!(!SlotTransition::Retire.submits_plaintext());
        assert!(!SlotTransition::NoOp.submits_plaintext());
    }
}
