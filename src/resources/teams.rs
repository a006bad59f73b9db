//! Microsoft Teams notification resource.
//!
//! A list of webhooks whose URLs are the secrets, keyed positionally on
//! plan and by name on refresh. The optional access configuration can only
//! be chosen at creation; adding or removing it replaces the resource.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::Result;
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::ReplacementPolicy;
use crate::state::ResourceState;

use super::{insert_optional, webhook_attributes, webhook_observation, webhook_slots, RemoteWebhook, Webhook};

pub const KIND: &str = "teams";

const POLICY: ReplacementPolicy =
    ReplacementPolicy { initialization_only: &["access_config"], immutable: &["name"] };

/// Access configuration for private channels. Opaque to the provider;
/// passed through to the remote as-is at creation time.
pub type AccessConfig = Value;

/// Declarative configuration for a Teams notification target.
#[derive(Debug, Default)]
pub struct TeamsIntegration {
    pub name: String,
    pub access_config: Option<AccessConfig>,
    pub webhooks: Vec<Webhook>,
}

impl TeamsIntegration {
    pub fn into_parent_config(self) -> ParentConfig {
        let mut attributes = Map::new();
        attributes.insert("name".into(), json!(self.name));
        insert_optional(&mut attributes, "access_config", self.access_config);
        attributes.insert("webhook".into(), webhook_attributes(&self.webhooks));

        ParentConfig {
            kind: KIND,
            attributes,
            slots: webhook_slots(self.webhooks),
            policy: POLICY,
        }
    }
}

const UPSERT_TEAMS: &str = r#"
mutation UpsertTeamsIntegration($input: TeamsIntegrationInput!) {
  upsertTeamsIntegration(input: $input) {
    id name accessConfig webhooks { name url }
  }
}"#;

const GET_TEAMS: &str = r#"
query GetTeamsIntegration($id: ID!) {
  teamsIntegration(id: $id) {
    id name accessConfig webhooks { name url }
  }
}"#;

const DELETE_TEAMS: &str = r#"
mutation DeleteTeamsIntegration($id: ID!) {
  deleteTeamsIntegration(id: $id)
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamsPayload {
    id: String,
    name: String,
    access_config: Option<Value>,
    #[serde(default)]
    webhooks: Vec<RemoteWebhook>,
}

impl TeamsPayload {
    fn into_observation(self, prior: Option<&ResourceState>) -> RemoteObservation {
        let mut attributes = Map::new();
        attributes.insert("name".into(), json!(self.name));
        insert_optional(&mut attributes, "access_config", self.access_config);

        let (webhooks, handles) = webhook_observation(self.webhooks, prior);
        attributes.insert("webhook".into(), webhooks);

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertTeamsData {
    #[serde(rename = "upsertTeamsIntegration")]
    integration: TeamsPayload,
}

#[derive(Debug, Deserialize)]
struct GetTeamsData {
    #[serde(rename = "teamsIntegration")]
    integration: Option<TeamsPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteTeamsData {
    #[serde(rename = "deleteTeamsIntegration")]
    _deleted: bool,
}

/// Remote store for Teams integrations.
#[derive(Debug, Clone)]
pub struct TeamsStore {
    client: ApiClient,
}

impl TeamsStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build the mutation input. Webhooks are submitted as the full declared
    /// list in config order; a URL is attached only for slots being
    /// introduced or rotated, which is how the remote distinguishes "store
    /// this secret" from "keep what you have".
    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert("name".into(), attrs.get("name").cloned().unwrap_or(Value::Null));
        if let Some(access) = attrs.get("access_config") {
            input.insert("accessConfig".into(), access.clone());
        }

        let declared = attrs.get("webhook").and_then(Value::as_array).cloned().unwrap_or_default();
        let webhooks: Vec<Value> = declared
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let name = element.get("name").cloned().unwrap_or(Value::Null);
                let slot_id = crate::secrets::SlotId::indexed("webhook", index, "url");
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
impl RemoteStore for TeamsStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertTeamsData = self
            .client
            .execute("UpsertTeamsIntegration", UPSERT_TEAMS, json!({"input": input}))
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
        let data: GetTeamsData =
            self.client.execute("GetTeamsIntegration", GET_TEAMS, json!({"id": id})).await?;
        Ok(data.integration.map(|payload| payload.into_observation(prior)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteTeamsData =
            self.client.execute("DeleteTeamsIntegration", DELETE_TEAMS, json!({"id": id})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::SecretSubmission;
    use crate::secrets::{PlanAction, SecretString, SlotId};

    fn integration() -> TeamsIntegration {
        TeamsIntegration {
            name: "alerts".into(),
            access_config: None,
            webhooks: vec![
                Webhook {
                    name: "foo".into(),
                    url: Some(SecretString::new("https://hook/foo")),
                    url_version: Some("1".into()),
                },
                Webhook {
                    name: "bar".into(),
                    url: Some(SecretString::new("https://hook/bar")),
                    url_version: Some("1".into()),
                },
            ],
        }
    }

    #[test]
    fn parent_config_declares_positional_url_slots() {
        let config = integration().into_parent_config();
        assert_eq!(config.slots.len(), 2);
        assert_eq!(config.slots[0].slot_id, SlotId::indexed("webhook", 0, "url"));
        assert_eq!(config.slots[1].slot_id, SlotId::indexed("webhook", 1, "url"));
    }

    #[test]
    fn adding_access_config_forces_replacement() {
        let without = integration().into_parent_config();
        let mut with = TeamsIntegration {
            access_config: Some(json!({"tenant": "t-1"})),
            ..Default::default()
        };
        with.name = "alerts".into();
        let with = with.into_parent_config();

        assert_eq!(
            POLICY.decide(Some(&without.attributes), &with.attributes, &[]),
            PlanAction::Replace
        );
    }

    #[test]
    fn build_input_attaches_urls_only_for_submitted_slots() {
        let config = integration().into_parent_config();
        let submission = Submission {
            attributes: config.attributes,
            secrets: vec![SecretSubmission {
                slot_id: SlotId::indexed("webhook", 0, "url"),
                plaintext: SecretString::new("https://hook/foo2"),
            }],
        };

        let input = TeamsStore::build_input(&submission);
        let webhooks = input.get("webhooks").and_then(Value::as_array).unwrap();
        assert_eq!(webhooks[0], json!({"name": "foo", "url": "https://hook/foo2"}));
        assert_eq!(webhooks[1], json!({"name": "bar"}), "stable webhook is not re-sent");
    }

    #[test]
    fn observation_realigns_webhooks_by_name() {
        use crate::state::SlotRecord;

        let prior = ResourceState {
            id: "t-1".into(),
            kind: KIND.into(),
            attributes: integration().into_parent_config().attributes,
            slots: Vec::<SlotRecord>::new(),
        };

        let payload = TeamsPayload {
            id: "t-1".into(),
            name: "alerts".into(),
            access_config: None,
            webhooks: vec![
                RemoteWebhook { name: "bar".into(), url: Some("enc:b".into()) },
                RemoteWebhook { name: "foo".into(), url: Some("enc:f".into()) },
            ],
        };

        let observation = payload.into_observation(Some(&prior));
        assert_eq!(
            observation.handle_for(&SlotId::indexed("webhook", 0, "url")).unwrap().as_str(),
            "enc:f"
        );
        assert_eq!(
            observation.handle_for(&SlotId::indexed("webhook", 1, "url")).unwrap().as_str(),
            "enc:b"
        );
    }
}
