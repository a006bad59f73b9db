//! Write-once secret lifecycle.
//!
//! A secret slot is a named location on a parent resource that holds exactly
//! one piece of sensitive data. The user supplies a write-only plaintext and
//! an opaque version tag; the remote store answers with an opaque handle.
//! Between any two applies the slot undergoes one of five transitions
//! (no-op, introduce, stable, rotate, retire) classified purely from the
//! version tag pair, and the plan, submission, and replacement rules all
//! derive from that classification.

pub mod fingerprint;
pub mod plan;
pub mod replacement;
pub mod sink;
pub mod types;

pub use fingerprint::{classify, SlotTransition};
pub use plan::{plan_slot, PlannedValue, SlotPlan};
pub use replacement::{PlanAction, ReplacementPolicy};
pub use sink::{SlotDeclaration, ValueSource, WriteOnceInput};
pub use types::{OpaqueHandle, SecretString, SlotId, VersionTag};
