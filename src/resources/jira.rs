//! Jira integration resource.
//!
//! One secret slot (the API key) plus a list of projects the integration
//! files issues into. The project list is non-secret but list-valued: the
//! remote may return it in any order on read, so refresh re-aligns it to
//! prior order by project name. The Jira base URL is the remote's key for
//! the integration; changing it replaces the resource.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::Result;
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::{
    OpaqueHandle, ReplacementPolicy, SecretString, SlotDeclaration, SlotId, VersionTag,
};
use crate::state::{align_by_name, ResourceState};

pub const KIND: &str = "jira";

const POLICY: ReplacementPolicy =
    ReplacementPolicy { initialization_only: &[], immutable: &["url"] };

/// One Jira project the integration targets.
#[derive(Debug, Clone)]
pub struct JiraProject {
    pub name: String,
    pub key: String,
}

/// Declarative configuration for the Jira integration.
#[derive(Debug, Default)]
pub struct JiraIntegration {
    pub url: String,
    pub user: String,
    /// Write-only Jira API key.
    pub api_key: Option<SecretString>,
    /// Version tag asserting whether the API key changed.
    pub api_key_version: Option<String>,
    pub projects: Vec<JiraProject>,
}

impl JiraIntegration {
    pub fn into_parent_config(self) -> ParentConfig {
        let mut attributes = Map::new();
        attributes.insert("url".into(), json!(self.url));
        attributes.insert("user".into(), json!(self.user));
        attributes.insert("projects".into(), projects_value(&self.projects));

        ParentConfig {
            kind: KIND,
            attributes,
            slots: vec![SlotDeclaration::new(
                SlotId::new("jira.api_key"),
                self.api_key_version.map(VersionTag::new),
                self.api_key,
                "api_key_plaintext",
            )],
            policy: POLICY,
        }
    }
}

fn projects_value(projects: &[JiraProject]) -> Value {
    Value::Array(projects.iter().map(|p| json!({"name": p.name, "key": p.key})).collect())
}

const UPSERT_JIRA: &str = r#"
mutation UpsertJiraIntegration($input: JiraIntegrationInput!) {
  upsertJiraIntegration(input: $input) {
    id url user apiKey projects { name key }
  }
}"#;

const GET_JIRA: &str = r#"
query GetJiraIntegration($id: ID!) {
  jiraIntegration(id: $id) {
    id url user apiKey projects { name key }
  }
}"#;

const DELETE_JIRA: &str = r#"
mutation DeleteJiraIntegration($id: ID!) {
  deleteJiraIntegration(id: $id)
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraPayload {
    id: String,
    url: String,
    user: String,
    /// Opaque ciphertext of the stored API key.
    api_key: Option<String>,
    #[serde(default)]
    projects: Vec<JiraProjectPayload>,
}

#[derive(Debug, Deserialize)]
struct JiraProjectPayload {
    name: String,
    key: String,
}

impl JiraPayload {
    fn into_observation(self, prior: Option<&ResourceState>) -> RemoteObservation {
        let remote_projects: Vec<Value> = self
            .projects
            .into_iter()
            .map(|p| json!({"name": p.name, "key": p.key}))
            .collect();

        // Order-insensitive refresh: put projects back into prior order.
        let projects = match prior
            .and_then(|state| state.attributes.get("projects"))
            .and_then(Value::as_array)
        {
            Some(prior_list) => align_by_name(prior_list, remote_projects),
            None => remote_projects,
        };

        let mut attributes = Map::new();
        attributes.insert("url".into(), json!(self.url));
        attributes.insert("user".into(), json!(self.user));
        attributes.insert("projects".into(), Value::Array(projects));

        let handles = self
            .api_key
            .map(|ciphertext| vec![(SlotId::new("jira.api_key"), OpaqueHandle::new(ciphertext))])
            .unwrap_or_default();

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertJiraData {
    #[serde(rename = "upsertJiraIntegration")]
    integration: JiraPayload,
}

#[derive(Debug, Deserialize)]
struct GetJiraData {
    #[serde(rename = "jiraIntegration")]
    integration: Option<JiraPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteJiraData {
    #[serde(rename = "deleteJiraIntegration")]
    _deleted: bool,
}

/// Remote store for the Jira integration.
#[derive(Debug, Clone)]
pub struct JiraStore {
    client: ApiClient,
}

impl JiraStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert("url".into(), attrs.get("url").cloned().unwrap_or(Value::Null));
        input.insert("user".into(), attrs.get("user").cloned().unwrap_or(Value::Null));
        // The full declared project list, in config order.
        input.insert("projects".into(), attrs.get("projects").cloned().unwrap_or(json!([])));
        for secret in &submission.secrets {
            if secret.slot_id == SlotId::new("jira.api_key") {
                input.insert("apiKey".into(), json!(secret.plaintext.expose()));
            }
        }
        Value::Object(input)
    }
}

#[async_trait]
impl RemoteStore for JiraStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertJiraData =
            self.client.execute("UpsertJiraIntegration", UPSERT_JIRA, json!({"input": input})).await?;
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
        let data: GetJiraData =
            self.client.execute("GetJiraIntegration", GET_JIRA, json!({"id": id})).await?;
        Ok(data.integration.map(|payload| payload.into_observation(prior)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteJiraData =
            self.client.execute("DeleteJiraIntegration", DELETE_JIRA, json!({"id": id})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SlotRecord;

    fn integration() -> JiraIntegration {
        JiraIntegration {
            url: "https://jira.x.example".into(),
            user: "bot@x.example".into(),
            api_key: Some(SecretString::new("jira-key-value")),
            api_key_version: Some("1".into()),
            projects: vec![
                JiraProject { name: "foo".into(), key: "FOO".into() },
                JiraProject { name: "bar".into(), key: "BAR".into() },
            ],
        }
    }

    #[test]
    fn parent_config_keeps_projects_in_declared_order() {
        let config = integration().into_parent_config();
        let projects = config.attributes.get("projects").and_then(Value::as_array).unwrap();
        assert_eq!(projects[0].get("name"), Some(&json!("foo")));
        assert_eq!(projects[1].get("name"), Some(&json!("bar")));
    }

    #[test]
    fn url_change_forces_replacement() {
        let config = integration().into_parent_config();
        let mut moved = config.attributes.clone();
        moved.insert("url".into(), json!("https://other.x.example"));
        assert_eq!(
            POLICY.decide(Some(&config.attributes), &moved, &[]),
            crate::secrets::PlanAction::Replace
        );
    }

    #[test]
    fn refresh_realigns_projects_to_prior_order() {
        let prior = ResourceState {
            id: "jira-1".into(),
            kind: KIND.into(),
            attributes: integration().into_parent_config().attributes,
            slots: Vec::<SlotRecord>::new(),
        };

        let payload = JiraPayload {
            id: "jira-1".into(),
            url: "https://jira.x.example".into(),
            user: "bot@x.example".into(),
            api_key: Some("enc:key".into()),
            projects: vec![
                JiraProjectPayload { name: "bar".into(), key: "BAR".into() },
                JiraProjectPayload { name: "foo".into(), key: "FOO".into() },
            ],
        };

        let observation = payload.into_observation(Some(&prior));
        let projects = observation.attributes.get("projects").and_then(Value::as_array).unwrap();
        assert_eq!(projects[0].get("name"), Some(&json!("foo")));
        assert_eq!(projects[1].get("name"), Some(&json!("bar")));
        // Reorder-only refresh produces attributes identical to prior state.
        assert_eq!(observation.attributes, prior.attributes);
    }

    #[test]
    fn build_input_omits_api_key_for_stable_submissions() {
        let config = integration().into_parent_config();
        let submission = Submission { attributes: config.attributes, secrets: vec![] };
        let input = JiraStore::build_input(&submission);
        assert!(input.get("apiKey").is_none());
        assert_eq!(
            input.get("projects").and_then(Value::as_array).map(Vec::len),
            Some(2),
            "full project list is always submitted"
        );
    }
}
