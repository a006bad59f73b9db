//! E-mail notification settings resource.
//!
//! One secret slot: the SMTP password. The remote stores the whole settings
//! document as a singleton keyed by a server-assigned id and echoes the
//! password back only as ciphertext.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::Result;
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::{
    OpaqueHandle, ReplacementPolicy, SecretString, SlotDeclaration, SlotId, VersionTag,
};
use crate::state::ResourceState;

use super::insert_optional;

pub const KIND: &str = "email";

const POLICY: ReplacementPolicy = ReplacementPolicy::unrestricted();

/// Declarative configuration for e-mail notifications.
#[derive(Debug, Default)]
pub struct EmailSettings {
    pub from_address: String,
    pub smtp_server: String,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_ssl: Option<bool>,
    /// Write-only SMTP password.
    pub password: Option<SecretString>,
    /// Version tag asserting whether the password changed.
    pub password_version: Option<String>,
}

impl EmailSettings {
    pub fn into_parent_config(self) -> ParentConfig {
        let mut attributes = Map::new();
        attributes.insert("from_address".into(), json!(self.from_address));
        attributes.insert("smtp_server".into(), json!(self.smtp_server));
        insert_optional(&mut attributes, "smtp_port", self.smtp_port);
        insert_optional(&mut attributes, "smtp_username", self.smtp_username);
        insert_optional(&mut attributes, "smtp_ssl", self.smtp_ssl);

        ParentConfig {
            kind: KIND,
            attributes,
            slots: vec![SlotDeclaration::new(
                SlotId::new("smtp.password"),
                self.password_version.map(VersionTag::new),
                self.password,
                "smtp.password_plaintext",
            )],
            policy: POLICY,
        }
    }
}

const UPSERT_EMAIL_SETTINGS: &str = r#"
mutation UpsertEmailSettings($input: EmailSettingsInput!) {
  upsertEmailSettings(input: $input) {
    id fromAddress smtpServer smtpPort smtpUsername smtpSsl password
  }
}"#;

const GET_EMAIL_SETTINGS: &str = r#"
query GetEmailSettings($id: ID!) {
  emailSettings(id: $id) {
    id fromAddress smtpServer smtpPort smtpUsername smtpSsl password
  }
}"#;

const DELETE_EMAIL_SETTINGS: &str = r#"
mutation DeleteEmailSettings($id: ID!) {
  deleteEmailSettings(id: $id)
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailSettingsPayload {
    id: String,
    from_address: String,
    smtp_server: String,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_ssl: Option<bool>,
    /// Opaque ciphertext of the stored password.
    password: Option<String>,
}

impl EmailSettingsPayload {
    fn into_observation(self) -> RemoteObservation {
        let mut attributes = Map::new();
        attributes.insert("from_address".into(), json!(self.from_address));
        attributes.insert("smtp_server".into(), json!(self.smtp_server));
        insert_optional(&mut attributes, "smtp_port", self.smtp_port);
        insert_optional(&mut attributes, "smtp_username", self.smtp_username);
        insert_optional(&mut attributes, "smtp_ssl", self.smtp_ssl);

        let handles = self
            .password
            .map(|ciphertext| vec![(SlotId::new("smtp.password"), OpaqueHandle::new(ciphertext))])
            .unwrap_or_default();

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertEmailData {
    #[serde(rename = "upsertEmailSettings")]
    settings: EmailSettingsPayload,
}

#[derive(Debug, Deserialize)]
struct GetEmailData {
    #[serde(rename = "emailSettings")]
    settings: Option<EmailSettingsPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteEmailData {
    #[serde(rename = "deleteEmailSettings")]
    _deleted: bool,
}

/// Remote store for e-mail settings.
#[derive(Debug, Clone)]
pub struct EmailStore {
    client: ApiClient,
}

impl EmailStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The mutation input: camelCase attributes plus the password for
    /// submissions that rotate or introduce it. Plaintext crosses into the
    /// request body here and nowhere else.
    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert(
            "fromAddress".into(),
            attrs.get("from_address").cloned().unwrap_or(Value::Null),
        );
        input.insert("smtpServer".into(), attrs.get("smtp_server").cloned().unwrap_or(Value::Null));
        if let Some(port) = attrs.get("smtp_port") {
            input.insert("smtpPort".into(), port.clone());
        }
        if let Some(username) = attrs.get("smtp_username") {
            input.insert("smtpUsername".into(), username.clone());
        }
        if let Some(ssl) = attrs.get("smtp_ssl") {
            input.insert("smtpSsl".into(), ssl.clone());
        }
        for secret in &submission.secrets {
            if secret.slot_id == SlotId::new("smtp.password") {
                input.insert("password".into(), json!(secret.plaintext.expose()));
            }
        }
        Value::Object(input)
    }
}

#[async_trait]
impl RemoteStore for EmailStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertEmailData = self
            .client
            .execute("UpsertEmailSettings", UPSERT_EMAIL_SETTINGS, json!({"input": input}))
            .await?;
        Ok(data.settings.into_observation())
    }

    async fn update(&self, _id: &str, submission: Submission) -> Result<RemoteObservation> {
        // The remote treats settings as a singleton upsert.
        self.create(submission).await
    }

    async fn read(
        &self,
        id: &str,
        _prior: Option<&ResourceState>,
    ) -> Result<Option<RemoteObservation>> {
        let data: GetEmailData = self
            .client
            .execute("GetEmailSettings", GET_EMAIL_SETTINGS, json!({"id": id}))
            .await?;
        Ok(data.settings.map(EmailSettingsPayload::into_observation))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteEmailData = self
            .client
            .execute("DeleteEmailSettings", DELETE_EMAIL_SETTINGS, json!({"id": id}))
            .await?;
        Ok(())
    }
}
