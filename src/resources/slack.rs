//! Slack notification resource.
//!
//! Structurally a sibling of the Teams resource: a named list of webhooks
//! whose URLs are the secrets. No initialization-only attributes; the
//! remote keys the integration by name.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::Result;
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::{ReplacementPolicy, SlotId};
use crate::state::ResourceState;

use super::{webhook_attributes, webhook_observation, webhook_slots, RemoteWebhook, Webhook};

pub const KIND: &str = "slack";

const POLICY: ReplacementPolicy =
    ReplacementPolicy { initialization_only: &[], immutable: &["name"] };

/// Declarative configuration for a Slack notification target.
#[derive(Debug, Default)]
pub struct SlackIntegration {
    pub name: String,
    pub webhooks: Vec<Webhook>,
}

impl SlackIntegration {
    pub fn into_parent_config(self) -> ParentConfig {
        let mut attributes = Map::new();
        attributes.insert("name".into(), json!(self.name));
        attributes.insert("webhook".into(), webhook_attributes(&self.webhooks));

        ParentConfig {
            kind: KIND,
            attributes,
            slots: webhook_slots(self.webhooks),
            policy: POLICY,
        }
    }
}

const UPSERT_SLACK: &str = r#"
mutation UpsertSlackIntegration($input: SlackIntegrationInput!) {
  upsertSlackIntegration(input: $input) {
    id name webhooks { name url }
  }
}"#;

const GET_SLACK: &str = r#"
query GetSlackIntegration($id: ID!) {
  slackIntegration(id: $id) {
    id name webhooks { name url }
  }
}"#;

const DELETE_SLACK: &str = r#"
mutation DeleteSlackIntegration($id: ID!) {
  deleteSlackIntegration(id: $id)
}"#;

#[derive(Debug, Deserialize)]
struct SlackPayload {
    id: String,
    name: String,
    #[serde(default)]
    webhooks: Vec<RemoteWebhook>,
}

impl SlackPayload {
    fn into_observation(self, prior: Option<&ResourceState>) -> RemoteObservation {
        let mut attributes = Map::new();
        attributes.insert("name".into(), json!(self.name));

        let (webhooks, handles) = webhook_observation(self.webhooks, prior);
        attributes.insert("webhook".into(), webhooks);

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertSlackData {
    #[serde(rename = "upsertSlackIntegration")]
    integration: SlackPayload,
}

#[derive(Debug, Deserialize)]
struct GetSlackData {
    #[serde(rename = "slackIntegration")]
    integration: Option<SlackPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteSlackData {
    #[serde(rename = "deleteSlackIntegration")]
    _deleted: bool,
}

/// Remote store for Slack integrations.
#[derive(Debug, Clone)]
pub struct SlackStore {
    client: ApiClient,
}

impl SlackStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert("name".into(), attrs.get("name").cloned().unwrap_or(Value::Null));

        let declared = attrs.get("webhook").and_then(Value::as_array).cloned().unwrap_or_default();
        let webhooks: Vec<Value> = declared
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let name = element.get("name").cloned().unwrap_or(Value::Null);
                let slot_id = SlotId::indexed("webhook", index, "url");
                match submission.secrets.iter().find(|s| s.slot_id == slot_id) {
                    Some(secret) => json!({"name": name, "url": secret.plaintext.expose()}),
                    None => json!({"name": name}),
                }
            })
            .collect();
        input.insert("webhooks".into(), Value::Array(webhooks));

        Value::Object(input)
    }
}

#[async_trait]
impl RemoteStore for SlackStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertSlackData = self
            .client
            .execute("UpsertSlackIntegration", UPSERT_SLACK, json!({"input": input}))
            .await?;
        Ok(data.integration.into_observation(None))
    }

    async fn update(&self, _id: &str, submission: Submission) -> Result<RemoteObservation> {
        self.create(submission).await
    }

    async fn read(
        &self,
        id: &str,
        prior: Option<&ResourceState>,
    ) -> Result<Option<RemoteObservation>> {
        let data: GetSlackData =
            self.client.execute("GetSlackIntegration", GET_SLACK, json!({"id": id})).await?;
        Ok(data.integration.map(|payload| payload.into_observation(prior)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteSlackData =
            self.client.execute("DeleteSlackIntegration", DELETE_SLACK, json!({"id": id})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretString;

    #[test]
    fn parent_config_mirrors_the_teams_shape() {
        let config = SlackIntegration {
            name: "alerts".into(),
            webhooks: vec![Webhook {
                name: "ops".into(),
                url: Some(SecretString::new("https://hooks.slack.example/T0/B0/x")),
                url_version: Some("1".into()),
            }],
        }
        .into_parent_config();

        assert_eq!(config.kind, "slack");
        assert_eq!(config.slots.len(), 1);
        assert_eq!(config.attributes.get("webhook"), Some(&json!([{"name": "ops"}])));
    }

    #[test]
    fn name_change_forces_replacement() {
        let prior = SlackIntegration { name: "alerts".into(), webhooks: vec![] }
            .into_parent_config();
        let renamed = SlackIntegration { name: "oncall".into(), webhooks: vec![] }
            .into_parent_config();
        assert_eq!(
            POLICY.decide(Some(&prior.attributes), &renamed.attributes, &[]),
            crate::secrets::PlanAction::Replace
        );
    }
}
