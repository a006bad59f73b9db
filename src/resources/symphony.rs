//! Symphony messaging integration resource.
//!
//! One secret slot: the bot's RSA private key, supplied base64-encoded.
//! The encoding is validated locally before planning so a malformed key
//! fails fast instead of as a remote rejection mid-apply.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::{ProviderError, Result};
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::{
    OpaqueHandle, ReplacementPolicy, SecretString, SlotDeclaration, SlotId, VersionTag,
};
use crate::state::ResourceState;

pub const KIND: &str = "symphony";

const POLICY: ReplacementPolicy = ReplacementPolicy::unrestricted();

/// Declarative configuration for the Symphony integration.
#[derive(Debug, Default)]
pub struct SymphonyIntegration {
    pub host: String,
    pub bot_username: String,
    /// Write-only base64-encoded RSA private key.
    pub private_key: Option<SecretString>,
    /// Version tag asserting whether the private key changed.
    pub private_key_version: Option<String>,
}

impl SymphonyIntegration {
    /// Validates and lowers the configuration into a plannable form.
    /// Fails when the supplied private key is not valid base64.
    pub fn try_into_parent_config(self) -> Result<ParentConfig> {
        if let Some(key) = &self.private_key {
            base64::engine::general_purpose::STANDARD
                .decode(key.expose())
                .map_err(|_| {
                    ProviderError::validation(
                        "private key must be base64-encoded",
                        "private_key_plaintext",
                    )
                })?;
        }

        let mut attributes = Map::new();
        attributes.insert("host".into(), json!(self.host));
        attributes.insert("bot_username".into(), json!(self.bot_username));

        Ok(ParentConfig {
            kind: KIND,
            attributes,
            slots: vec![SlotDeclaration::new(
                SlotId::new("symphony.private_key"),
                self.private_key_version.map(VersionTag::new),
                self.private_key,
                "private_key_plaintext",
            )],
            policy: POLICY,
        })
    }
}

const UPSERT_SYMPHONY: &str = r#"
mutation UpsertSymphonyIntegration($input: SymphonyIntegrationInput!) {
  upsertSymphonyIntegration(input: $input) {
    id host botUsername privateKey
  }
}"#;

const GET_SYMPHONY: &str = r#"
query GetSymphonyIntegration($id: ID!) {
  symphonyIntegration(id: $id) {
    id host botUsername privateKey
  }
}"#;

const DELETE_SYMPHONY: &str = r#"
mutation DeleteSymphonyIntegration($id: ID!) {
  deleteSymphonyIntegration(id: $id)
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymphonyPayload {
    id: String,
    host: String,
    bot_username: String,
    /// Opaque ciphertext of the stored private key.
    private_key: Option<String>,
}

impl SymphonyPayload {
    fn into_observation(self) -> RemoteObservation {
        let mut attributes = Map::new();
        attributes.insert("host".into(), json!(self.host));
        attributes.insert("bot_username".into(), json!(self.bot_username));

        let handles = self
            .private_key
            .map(|ciphertext| {
                vec![(SlotId::new("symphony.private_key"), OpaqueHandle::new(ciphertext))]
            })
            .unwrap_or_default();

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertSymphonyData {
    #[serde(rename = "upsertSymphonyIntegration")]
    integration: SymphonyPayload,
}

#[derive(Debug, Deserialize)]
struct GetSymphonyData {
    #[serde(rename = "symphonyIntegration")]
    integration: Option<SymphonyPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteSymphonyData {
    #[serde(rename = "deleteSymphonyIntegration")]
    _deleted: bool,
}

/// Remote store for the Symphony integration.
#[derive(Debug, Clone)]
pub struct SymphonyStore {
    client: ApiClient,
}

impl SymphonyStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert("host".into(), attrs.get("host").cloned().unwrap_or(Value::Null));
        input.insert(
            "botUsername".into(),
            attrs.get("bot_username").cloned().unwrap_or(Value::Null),
        );
        for secret in &submission.secrets {
            if secret.slot_id == SlotId::new("symphony.private_key") {
                input.insert("privateKey".into(), json!(secret.plaintext.expose()));
            }
        }
        Value::Object(input)
    }
}

#[async_trait]
impl RemoteStore for SymphonyStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertSymphonyData = self
            .client
            .execute("UpsertSymphonyIntegration", UPSERT_SYMPHONY, json!({"input": input}))
            .await?;
        Ok(data.integration.into_observation())
    }

    async fn update(&self, _id: &str, submission: Submission) -> Result<RemoteObservation> {
        self.create(submission).await
    }

    async fn read(
        &self,
        id: &str,
        _prior: Option<&ResourceState>,
    ) -> Result<Option<RemoteObservation>> {
        let data: GetSymphonyData = self
            .client
            .execute("GetSymphonyIntegration", GET_SYMPHONY, json!({"id": id}))
            .await?;
        Ok(data.integration.map(SymphonyPayload::into_observation))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteSymphonyData = self
            .client
            .execute("DeleteSymphonyIntegration", DELETE_SYMPHONY, json!({"id": id}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration(key: &str) -> SymphonyIntegration {
        SymphonyIntegration {
            host: "corp.symphony.example".into(),
            bot_username: "governance-bot".into(),
            private_key: Some(SecretString::new(key)),
            private_key_version: Some("1".into()),
        }
    }

    #[test]
    fn accepts_a_base64_private_key() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"-----BEGIN RSA KEY-----");
        let config = integration(&encoded).try_into_parent_config().unwrap();
        assert_eq!(config.slots[0].slot_id, SlotId::new("symphony.private_key"));
    }

    #[test]
    fn rejects_a_non_base64_private_key() {
        let err = integration("not base64!!").try_into_parent_config().unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }

    #[test]
    fn payload_maps_ciphertext_to_the_key_handle() {
        let payload = SymphonyPayload {
            id: "sym-1".into(),
            host: "corp.symphony.example".into(),
            bot_username: "governance-bot".into(),
            private_key: Some("enc:key".into()),
        };
        let observation = payload.into_observation();
        assert_eq!(
            observation.handle_for(&SlotId::new("symphony.private_key")),
            Some(&OpaqueHandle::new("enc:key"))
        );
    }
}
