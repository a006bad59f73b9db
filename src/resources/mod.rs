//! Managed resource kinds.
//!
//! Each module declares one parent resource: its configuration surface, the
//! static replacement policy, and a [`crate::reconcile::RemoteStore`]
//! implementation over the shared GraphQL client. Secret-bearing attributes
//! follow the `<slot>_plaintext` / `<slot>_version` / computed handle
//! convention throughout.

pub mod account;
pub mod email;
pub mod jira;
pub mod slack;
pub mod symphony;
pub mod teams;

use serde_json::{json, Map, Value};

use crate::secrets::{OpaqueHandle, SecretString, SlotDeclaration, SlotId, VersionTag};
use crate::state::{align_by_name, ResourceState};

/// Insert an optional attribute, omitting it entirely when absent so
/// presence checks in the replacement policy see a clean map.
pub(crate) fn insert_optional<T: serde::Serialize>(
    attributes: &mut Map<String, Value>,
    key: &str,
    value: Option<T>,
) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), json!(v));
    }
}

/// One webhook as declared in configuration. Shared by the Teams and Slack
/// resources; the URL is the secret.
#[derive(Debug, Default)]
pub struct Webhook {
    pub name: String,
    /// Write-only webhook URL.
    pub url: Option<SecretString>,
    /// Version tag asserting whether the URL changed.
    pub url_version: Option<String>,
}

/// Non-secret projection of the webhook list for the attribute map, in
/// declared order.
pub(crate) fn webhook_attributes(webhooks: &[Webhook]) -> Value {
    Value::Array(webhooks.iter().map(|w| json!({"name": w.name})).collect())
}

/// Slot declarations for the webhook list, positionally keyed.
pub(crate) fn webhook_slots(webhooks: Vec<Webhook>) -> Vec<SlotDeclaration> {
    webhooks
        .into_iter()
        .enumerate()
        .map(|(index, webhook)| {
            SlotDeclaration::new(
                SlotId::indexed("webhook", index, "url"),
                webhook.url_version.map(VersionTag::new),
                webhook.url,
                format!("webhook[{}].url_plaintext", index),
            )
        })
        .collect()
}

/// A webhook as echoed by the remote: its name plus the opaque URL handle.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct RemoteWebhook {
    pub name: String,
    pub url: Option<String>,
}

/// Map a remote webhook list onto attributes and handles.
///
/// On refresh the remote may return the list in any order; elements are
/// re-aligned to the prior list by name before positional slot ids are
/// assigned, so a pure reorder shows no drift.
pub(crate) fn webhook_observation(
    remote: Vec<RemoteWebhook>,
    prior: Option<&ResourceState>,
) -> (Value, Vec<(SlotId, OpaqueHandle)>) {
    let remote: Vec<Value> = remote
        .into_iter()
        .map(|w| json!({"name": w.name, "url": w.url}))
        .collect();

    let aligned = match prior
        .and_then(|state| state.attributes.get("webhook"))
        .and_then(Value::as_array)
    {
        Some(prior_list) => align_by_name(prior_list, remote),
        None => remote,
    };

    let mut attributes = Vec::with_capacity(aligned.len());
    let mut handles = Vec::new();
    for (index, element) in aligned.into_iter().enumerate() {
        if let Some(name) = element.get("name").and_then(Value::as_str) {
            attributes.push(json!({"name": name}));
        }
        if let Some(url) = element.get("url").and_then(Value::as_str) {
            handles.push((SlotId::indexed("webhook", index, "url"), OpaqueHandle::new(url)));
        }
    }

    (Value::Array(attributes), handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SlotRecord;

    fn webhook(name: &str, url: Option<&str>, version: Option<&str>) -> Webhook {
        Webhook {
            name: name.into(),
            url: url.map(SecretString::new),
            url_version: version.map(String::from),
        }
    }

    #[test]
    fn webhook_slots_are_positional() {
        let slots = webhook_slots(vec![
            webhook("a", Some("https://hook/a"), Some("1")),
            webhook("b", Some("https://hook/b"), Some("1")),
        ]);
        assert_eq!(slots[0].slot_id, SlotId::indexed("webhook", 0, "url"));
        assert_eq!(slots[1].slot_id, SlotId::indexed("webhook", 1, "url"));
    }

    #[test]
    fn webhook_observation_realigns_to_prior_order() {
        let prior = ResourceState {
            id: "t-1".into(),
            kind: "teams".into(),
            attributes: json!({"name": "alerts", "webhook": [{"name": "foo"}, {"name": "bar"}]})
                .as_object()
                .cloned()
                .unwrap(),
            slots: Vec::<SlotRecord>::new(),
        };

        let remote = vec![
            RemoteWebhook { name: "bar".into(), url: Some("enc:b".into()) },
            RemoteWebhook { name: "foo".into(), url: Some("enc:f".into()) },
        ];

        let (attributes, handles) = webhook_observation(remote, Some(&prior));
        assert_eq!(attributes, json!([{"name": "foo"}, {"name": "bar"}]));
        assert_eq!(handles[0], (SlotId::indexed("webhook", 0, "url"), OpaqueHandle::new("enc:f")));
        assert_eq!(handles[1], (SlotId::indexed("webhook", 1, "url"), OpaqueHandle::new("enc:b")));
    }

    #[test]
    fn webhook_observation_without_prior_keeps_remote_order() {
        let remote = vec![
            RemoteWebhook { name: "bar".into(), url: Some("enc:b".into()) },
            RemoteWebhook { name: "foo".into(), url: None },
        ];
        let (attributes, handles) = webhook_observation(remote, None);
        assert_eq!(attributes, json!([{"name": "bar"}, {"name": "foo"}]));
        assert_eq!(handles.len(), 1, "webhook without a url contributes no handle");
    }
}
