//! Replacement policy: decides whether a configuration change is an in-place
//! update or a destroy-then-recreate of the parent resource.
//!
//! Initialization-only attributes are declared statically per resource kind;
//! the remote has no API to add or remove them after creation. The policy is
//! a table lookup plus presence/equality checks, never a runtime inference.

use serde_json::{Map, Value};

use super::fingerprint::SlotTransition;
use super::types::SlotId;

/// Plan-level decision for the parent resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// No prior state: the parent is created.
    Create,
    /// Nothing changed.
    NoOp,
    /// Changes are applied with a single update submission.
    UpdateInPlace,
    /// The parent is destroyed and recreated.
    Replace,
}

/// Static declaration of a resource kind's replacement rules.
#[derive(Debug, Clone, Copy)]
pub struct ReplacementPolicy {
    /// Attribute or slot names whose presence can only be chosen at
    /// creation (e.g. `expires_at`, `access_config`).
    pub initialization_only: &'static [&'static str],
    /// Attributes the remote keys the resource by. Any change forces
    /// replacement.
    pub immutable: &'static [&'static str],
}

impl ReplacementPolicy {
    /// A kind with no initialization-only or immutable attributes.
    pub const fn unrestricted() -> Self {
        Self { initialization_only: &[], immutable: &[] }
    }

    /// Decide the plan action for a parent resource.
    ///
    /// `prior` is `None` on first create. Attribute maps hold only
    /// non-secret fields; secret slots arrive as classified `transitions`.
    pub fn decide(
        &self,
        prior: Option<&Map<String, Value>>,
        proposed: &Map<String, Value>,
        transitions: &[(SlotId, SlotTransition)],
    ) -> PlanAction {
        let prior = match prior {
            Some(p) => p,
            None => return PlanAction::Create,
        };

        for field in self.immutable {
            if field_of(prior, field) != field_of(proposed, field) {
                return PlanAction::Replace;
            }
        }

        for field in self.initialization_only {
            if is_present(prior, field) != is_present(proposed, field) {
                return PlanAction::Replace;
            }
        }

        for (slot_id, transition) in transitions {
            match transition {
                // Removing a declared slot always recreates the parent: the
                // remote cannot unset stored secret material in place.
                SlotTransition::Retire => return PlanAction::Replace,
                SlotTransition::Introduce if self.is_initialization_only(slot_id) => {
                    return PlanAction::Replace;
                }
                _ => {}
            }
        }

        let slots_changing = transitions
            .iter()
            .any(|(_, t)| matches!(t, SlotTransition::Introduce | SlotTransition::Rotate));

        if slots_changing || prior != proposed {
            PlanAction::UpdateInPlace
        } else {
            PlanAction::NoOp
        }
    }

    fn is_initialization_only(&self, slot_id: &SlotId) -> bool {
        let root = slot_root(slot_id);
        self.initialization_only.contains(&root)
    }
}

/// The leading component of a slot path: `webhook[0].url` → `webhook`,
/// `smtp.password` → `smtp`.
fn slot_root(slot_id: &SlotId) -> &str {
    let path = slot_id.as_str();
    let end = path.find(['[', '.']).unwrap_or(path.len());
    &path[..end]
}

fn field_of<'a>(attrs: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    attrs.get(field).filter(|v| !v.is_null())
}

fn is_present(attrs: &Map<String, Value>, field: &str) -> bool {
    field_of(attrs, field).is_some()
}
