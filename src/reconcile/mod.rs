//! Reconciliation: ties the fingerprint register, plan modifier, write-once
//! sink, replacement policy, and state projector into the four operations
//! the plugin host drives: plan, apply, refresh, and import.
//!
//! The remote side is abstracted behind [`RemoteStore`], implemented per
//! resource kind over the shared GraphQL client. The host serializes
//! operations per resource instance; nothing here locks.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::errors::{ProviderError, Result};
use crate::secrets::{
    classify, plan_slot, OpaqueHandle, PlanAction, PlannedValue, ReplacementPolicy, SecretString,
    SlotDeclaration, SlotId, SlotPlan, SlotTransition,
};
use crate::state::{import_state, merge_refresh, ResourceState, SlotRecord};

/// Plaintext for one slot, on its way to the remote. Exists only inside a
/// [`Submission`]; dropped (and zeroed) once the call returns.
#[derive(Debug)]
pub struct SecretSubmission {
    pub slot_id: SlotId,
    pub plaintext: SecretString,
}

/// One create or update call to the remote: the full set of non-secret
/// attributes (list parents submit the whole declared list in config order)
/// plus plaintext for exactly the slots being introduced or rotated.
#[derive(Debug)]
pub struct Submission {
    pub attributes: Map<String, Value>,
    pub secrets: Vec<SecretSubmission>,
}

/// What the remote reported for a parent resource: its identifier, the
/// canonical non-secret attributes, and per-slot opaque handles.
#[derive(Debug, Clone)]
pub struct RemoteObservation {
    pub id: String,
    pub attributes: Map<String, Value>,
    pub handles: Vec<(SlotId, OpaqueHandle)>,
}

impl RemoteObservation {
    pub fn handle_for(&self, slot_id: &SlotId) -> Option<&OpaqueHandle> {
        self.handles.iter().find(|(id, _)| id == slot_id).map(|(_, h)| h)
    }
}

/// Remote store seam for one resource kind.
///
/// `read` receives the prior state (when one exists) so list-valued
/// attributes can be aligned to prior order by their `name` sibling,
/// keeping refresh order-insensitive.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Resource kind, used in state snapshots and diagnostics.
    fn kind(&self) -> &'static str;

    async fn create(&self, submission: Submission) -> Result<RemoteObservation>;

    async fn update(&self, id: &str, submission: Submission) -> Result<RemoteObservation>;

    async fn read(
        &self,
        id: &str,
        prior: Option<&ResourceState>,
    ) -> Result<Option<RemoteObservation>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// A parent resource as declared in the current configuration.
#[derive(Debug)]
pub struct ParentConfig {
    pub kind: &'static str,
    /// Non-secret fields, in the shape the state snapshot persists.
    pub attributes: Map<String, Value>,
    /// Secret slots in declared order.
    pub slots: Vec<SlotDeclaration>,
    pub policy: ReplacementPolicy,
}

/// The computed plan for one parent resource.
#[derive(Debug)]
pub struct ResourcePlan {
    pub action: PlanAction,
    /// Per-slot projections, declared slots first (config order), then
    /// retired slots.
    pub slots: Vec<SlotPlan>,
}

impl ResourcePlan {
    pub fn slot(&self, slot_id: &SlotId) -> Option<&SlotPlan> {
        self.slots.iter().find(|s| &s.slot_id == slot_id)
    }
}

/// Compute the plan for a parent resource. Pure with respect to the remote:
/// only prior state and proposed configuration are consulted.
pub fn plan(prior: Option<&ResourceState>, config: &ParentConfig) -> ResourcePlan {
    let mut slots = Vec::with_capacity(config.slots.len());

    for declaration in &config.slots {
        let prior_record = prior.and_then(|state| state.find_slot(&declaration.slot_id));
        let transition = classify(
            prior_record.and_then(|record| record.version.as_ref()),
            declaration.version.as_ref(),
        );
        slots.push(plan_slot(
            declaration.slot_id.clone(),
            transition,
            prior_record.and_then(|record| record.handle.as_ref()),
            declaration.version.as_ref(),
        ));
    }

    // Slots in prior state that the configuration no longer declares.
    if let Some(state) = prior {
        for record in &state.slots {
            let declared = config.slots.iter().any(|d| d.slot_id == record.slot_id);
            if !declared && record.version.is_some() {
                slots.push(plan_slot(
                    record.slot_id.clone(),
                    SlotTransition::Retire,
                    record.handle.as_ref(),
                    None,
                ));
            }
        }
    }

    let transitions: Vec<(SlotId, SlotTransition)> =
        slots.iter().map(|s| (s.slot_id.clone(), s.transition)).collect();

    let action = config.policy.decide(
        prior.map(|state| &state.attributes),
        &config.attributes,
        &transitions,
    );

    // Replacement destroys the remote object, so every slot surviving into
    // the recreated parent must be re-seeded; its prior handle dies with
    // the old object.
    if action == PlanAction::Replace {
        for slot_plan in &mut slots {
            if slot_plan.transition == SlotTransition::Stable {
                slot_plan.transition = SlotTransition::Introduce;
                slot_plan.handle = PlannedValue::Unknown;
            }
        }
    }

    ResourcePlan { action, slots }
}

/// Execute a plan. Consumes the configuration because the write-once inputs
/// are taken by value; each plaintext crosses the process boundary exactly
/// once and is dropped when the submission goes out of scope.
#[instrument(skip_all, fields(kind = config.kind, action = ?plan.action))]
pub async fn apply<S: RemoteStore>(
    prior: Option<&ResourceState>,
    config: ParentConfig,
    plan: &ResourcePlan,
    store: &S,
) -> Result<ResourceState> {
    match plan.action {
        PlanAction::NoOp => {
            let state = prior.expect("no-op plan requires prior state").clone();
            return Ok(state);
        }
        PlanAction::Create | PlanAction::UpdateInPlace | PlanAction::Replace => {}
    }

    let ParentConfig { kind, attributes, slots, .. } = config;
    let mut secrets = Vec::new();
    for declaration in slots {
        let transition = plan
            .slot(&declaration.slot_id)
            .map(|s| s.transition)
            .unwrap_or(SlotTransition::NoOp);
        let slot_id = declaration.slot_id.clone();
        if let Some(plaintext) = declaration.input.take(transition)? {
            secrets.push(SecretSubmission { slot_id, plaintext });
        }
    }

    info!(
        kind,
        submitted_slots = secrets.len(),
        planned_slots = plan.slots.len(),
        "applying resource plan"
    );

    let submission = Submission { attributes, secrets };

    let observation = match plan.action {
        PlanAction::Create => store.create(submission).await?,
        PlanAction::Replace => {
            let state = prior.expect("replace plan requires prior state");
            store.delete(&state.id).await?;
            store.create(submission).await?
        }
        PlanAction::UpdateInPlace => {
            let state = prior.expect("update plan requires prior state");
            store.update(&state.id, submission).await?
        }
        PlanAction::NoOp => unreachable!("handled above"),
    };

    project_after_apply(kind, &observation, plan)
}

/// Build the post-apply snapshot from the plan and the remote's response.
///
/// Stable slots carry their prior handle forward byte-identically;
/// introduced and rotated slots must find their handle in the response or
/// the apply fails without writing state.
fn project_after_apply(
    kind: &'static str,
    observation: &RemoteObservation,
    plan: &ResourcePlan,
) -> Result<ResourceState> {
    let mut slots = Vec::new();

    for slot_plan in &plan.slots {
        match slot_plan.transition {
            SlotTransition::NoOp | SlotTransition::Retire => continue,
            SlotTransition::Stable => {
                let handle = match &slot_plan.handle {
                    PlannedValue::Known(handle) => handle.clone(),
                    _ => {
                        return Err(ProviderError::partial_response(slot_plan.slot_id.as_str()));
                    }
                };
                slots.push(SlotRecord {
                    slot_id: slot_plan.slot_id.clone(),
                    version: slot_plan.version.known().cloned(),
                    handle: Some(handle),
                });
            }
            SlotTransition::Introduce | SlotTransition::Rotate => {
                let handle = observation
                    .handle_for(&slot_plan.slot_id)
                    .cloned()
                    .ok_or_else(|| ProviderError::partial_response(slot_plan.slot_id.as_str()))?;
                slots.push(SlotRecord {
                    slot_id: slot_plan.slot_id.clone(),
                    version: slot_plan.version.known().cloned(),
                    handle: Some(handle),
                });
            }
        }
    }

    Ok(ResourceState {
        id: observation.id.clone(),
        kind: kind.to_string(),
        attributes: observation.attributes.clone(),
        slots,
    })
}

/// Refresh a resource from the remote. Returns `None` when the parent no
/// longer exists there; per-slot drift is recorded in the returned state,
/// not treated as an error.
#[instrument(skip_all, fields(kind = store.kind(), id = %prior.id))]
pub async fn refresh<S: RemoteStore>(
    prior: &ResourceState,
    store: &S,
) -> Result<Option<ResourceState>> {
    let observation = match store.read(&prior.id, Some(prior)).await? {
        Some(observation) => observation,
        None => {
            info!(id = %prior.id, "resource vanished from the remote");
            return Ok(None);
        }
    };

    Ok(Some(merge_refresh(prior, observation.attributes, &observation.handles)))
}

/// Import a resource from its remote identifier. All observed slots get the
/// import sentinel tag, so the first apply after import rotates.
#[instrument(skip_all, fields(kind = store.kind(), id = %id))]
pub async fn import<S: RemoteStore>(id: &str, store: &S) -> Result<ResourceState> {
    let observation = store
        .read(id, None)
        .await?
        .ok_or_else(|| ProviderError::not_found(store.kind(), id))?;

    Ok(import_state(store.kind(), observation.id, observation.attributes, &observation.handles))
}

/// Destroy a resource.
#[instrument(skip_all, fields(kind = store.kind(), id = %prior.id))]
pub async fn destroy<S: RemoteStore>(prior: &ResourceState, store: &S) -> Result<()> {
    store.delete(&prior.id).await
}
