//! State projector: builds the snapshot the host persists after each
//! operation.
//!
//! A snapshot holds the non-secret attributes, and per slot the version tag
//! and opaque handle. Plaintext is structurally absent: nothing in
//! [`ResourceState`] can carry a [`crate::secrets::SecretString`].
//!
//! Refresh semantics: handles come from the remote, version tags are purely
//! client-side and are preserved from prior state. A slot present in prior
//! state but missing remotely is drift; its handle is cleared and its tag
//! retained so the next plan re-introduces it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::secrets::{OpaqueHandle, SlotId, VersionTag};

/// Persisted record of one secret slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub slot_id: SlotId,
    /// Present iff plaintext was declared at last apply.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<VersionTag>,
    /// Present iff the slot currently exists on the remote.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub handle: Option<OpaqueHandle>,
}

/// Persisted state of one parent resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Server-assigned identifier.
    pub id: String,
    /// Resource kind (e.g. `email`, `teams`).
    pub kind: String,
    /// Non-secret fields, flat JSON object.
    pub attributes: Map<String, Value>,
    pub slots: Vec<SlotRecord>,
}

impl ResourceState {
    pub fn find_slot(&self, slot_id: &SlotId) -> Option<&SlotRecord> {
        self.slots.iter().find(|s| &s.slot_id == slot_id)
    }

    pub fn slot_handle(&self, slot_id: &SlotId) -> Option<&OpaqueHandle> {
        self.find_slot(slot_id).and_then(|s| s.handle.as_ref())
    }

    pub fn slot_version(&self, slot_id: &SlotId) -> Option<&VersionTag> {
        self.find_slot(slot_id).and_then(|s| s.version.as_ref())
    }
}

/// Project a refresh read onto prior state.
///
/// `handles` are the per-slot handles observed on the remote, already
/// aligned to prior slot ids by the resource's read mapping.
pub fn merge_refresh(
    prior: &ResourceState,
    attributes: Map<String, Value>,
    handles: &[(SlotId, OpaqueHandle)],
) -> ResourceState {
    let mut slots: Vec<SlotRecord> = Vec::with_capacity(prior.slots.len());

    for record in &prior.slots {
        let observed = handles
            .iter()
            .find(|(slot_id, _)| slot_id == &record.slot_id)
            .map(|(_, handle)| handle.clone());

        if observed.is_none() && record.handle.is_some() {
            warn!(
                resource_id = %prior.id,
                kind = %prior.kind,
                slot = %record.slot_id,
                "secret slot missing on the remote; marking drift"
            );
        }

        slots.push(SlotRecord {
            slot_id: record.slot_id.clone(),
            // The remote does not echo the tag; it is a client-side
            // fingerprint and survives refresh untouched.
            version: record.version.clone(),
            handle: observed,
        });
    }

    // Slots that exist remotely but not in prior state: record the handle
    // with no tag so the next plan sees them.
    for (slot_id, handle) in handles {
        if prior.find_slot(slot_id).is_none() {
            slots.push(SlotRecord {
                slot_id: slot_id.clone(),
                version: None,
                handle: Some(handle.clone()),
            });
        }
    }

    ResourceState { id: prior.id.clone(), kind: prior.kind.clone(), attributes, slots }
}

/// Build state for an imported resource.
///
/// Every observed slot gets the import sentinel tag, which compares unequal
/// to any user-supplied tag, so the next apply rotates and re-seeds the
/// relationship.
pub fn import_state(
    kind: impl Into<String>,
    id: impl Into<String>,
    attributes: Map<String, Value>,
    handles: &[(SlotId, OpaqueHandle)],
) -> ResourceState {
    let slots = handles
        .iter()
        .map(|(slot_id, handle)| SlotRecord {
            slot_id: slot_id.clone(),
            version: Some(VersionTag::Imported),
            handle: Some(handle.clone()),
        })
        .collect();

    ResourceState { id: id.into(), kind: kind.into(), attributes, slots }
}

/// Reorder a remote list to match the prior list's `name` order.
///
/// The remote may return list elements in any order on read. Refresh treats
/// list-valued attributes as order-insensitive by keying elements on their
/// non-secret `name` sibling: remote elements are placed in prior order, and
/// elements unknown to prior state are appended in remote order. Plan-time
/// diffing stays positional.
pub fn align_by_name(prior: &[Value], remote: Vec<Value>) -> Vec<Value> {
    let mut remaining: Vec<Option<Value>> = remote.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(remaining.len());

    for prior_element in prior {
        let prior_name = prior_element.get("name").and_then(Value::as_str);
        if prior_name.is_none() {
            continue;
        }
        if let Some(slot) = remaining.iter_mut().find(|candidate| {
            candidate
                .as_ref()
                .and_then(|v| v.get("name"))
                .and_then(Value::as_str)
                == prior_name
        }) {
            aligned.push(slot.take().expect("matched element is present"));
        }
    }

    aligned.extend(remaining.into_iter().flatten());
    aligned
}
