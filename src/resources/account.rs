//! Cloud account resource.
//!
//! Registers a cloud account with its write-only API key. The remote
//! identifies an account by its `(provider, key)` pair, so both are
//! immutable; the optional key expiry can only be chosen when the key is
//! first stored, making it initialization-only. Import ids take the form
//! `provider:key`, e.g. `aws:123456789012`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::errors::{ProviderError, Result};
use crate::reconcile::{ParentConfig, RemoteObservation, RemoteStore, Submission};
use crate::secrets::{
    OpaqueHandle, ReplacementPolicy, SecretString, SlotDeclaration, SlotId, VersionTag,
};
use crate::state::ResourceState;

use super::insert_optional;

pub const KIND: &str = "account";

const POLICY: ReplacementPolicy =
    ReplacementPolicy { initialization_only: &["expires_at"], immutable: &["provider", "key"] };

/// Declarative configuration for a cloud account.
#[derive(Debug, Default)]
pub struct CloudAccount {
    /// Cloud provider discriminator, e.g. `aws`, `azure`, `gcp`.
    pub provider: String,
    /// Provider-scoped account identifier (AWS account id, Azure
    /// subscription, GCP project).
    pub key: String,
    pub name: String,
    /// Write-only account credential.
    pub api_key: Option<SecretString>,
    /// Version tag asserting whether the credential changed.
    pub api_key_version: Option<String>,
    /// When the stored credential expires. Chosen at creation only.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CloudAccount {
    pub fn into_parent_config(self) -> ParentConfig {
        let mut attributes = Map::new();
        attributes.insert("provider".into(), json!(self.provider));
        attributes.insert("key".into(), json!(self.key));
        attributes.insert("name".into(), json!(self.name));
        insert_optional(&mut attributes, "expires_at", self.expires_at);

        ParentConfig {
            kind: KIND,
            attributes,
            slots: vec![SlotDeclaration::new(
                SlotId::new("api_key"),
                self.api_key_version.map(VersionTag::new),
                self.api_key,
                "api_key_plaintext",
            )],
            policy: POLICY,
        }
    }
}

/// Split an import id of the form `provider:key` into its parts.
pub fn parse_import_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once(':') {
        Some((provider, key)) if !provider.is_empty() && !key.is_empty() => Ok((provider, key)),
        _ => Err(ProviderError::invalid_import_id(
            id,
            "expected `provider:key`, e.g. `aws:123456789012`",
        )),
    }
}

const UPSERT_ACCOUNT: &str = r#"
mutation UpsertAccount($input: AccountInput!) {
  upsertAccount(input: $input) {
    id provider key name apiKey expiresAt
  }
}"#;

const GET_ACCOUNT: &str = r#"
query GetAccount($id: ID!) {
  account(id: $id) {
    id provider key name apiKey expiresAt
  }
}"#;

const GET_ACCOUNT_BY_KEY: &str = r#"
query GetAccountByKey($provider: String!, $key: String!) {
  accountByKey(provider: $provider, key: $key) {
    id provider key name apiKey expiresAt
  }
}"#;

const DELETE_ACCOUNT: &str = r#"
mutation DeleteAccount($id: ID!) {
  deleteAccount(id: $id)
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountPayload {
    id: String,
    provider: String,
    key: String,
    name: String,
    /// Opaque ciphertext of the stored credential.
    api_key: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl AccountPayload {
    fn into_observation(self) -> RemoteObservation {
        let mut attributes = Map::new();
        attributes.insert("provider".into(), json!(self.provider));
        attributes.insert("key".into(), json!(self.key));
        attributes.insert("name".into(), json!(self.name));
        insert_optional(&mut attributes, "expires_at", self.expires_at);

        let handles = self
            .api_key
            .map(|ciphertext| vec![(SlotId::new("api_key"), OpaqueHandle::new(ciphertext))])
            .unwrap_or_default();

        RemoteObservation { id: self.id, attributes, handles }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertAccountData {
    #[serde(rename = "upsertAccount")]
    account: AccountPayload,
}

#[derive(Debug, Deserialize)]
struct GetAccountData {
    account: Option<AccountPayload>,
}

#[derive(Debug, Deserialize)]
struct GetAccountByKeyData {
    #[serde(rename = "accountByKey")]
    account: Option<AccountPayload>,
}

#[derive(Debug, Deserialize)]
struct DeleteAccountData {
    #[serde(rename = "deleteAccount")]
    _deleted: bool,
}

/// Remote store for cloud accounts.
#[derive(Debug, Clone)]
pub struct AccountStore {
    client: ApiClient,
}

impl AccountStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn build_input(submission: &Submission) -> Value {
        let attrs = &submission.attributes;
        let mut input = Map::new();
        input.insert("provider".into(), attrs.get("provider").cloned().unwrap_or(Value::Null));
        input.insert("key".into(), attrs.get("key").cloned().unwrap_or(Value::Null));
        input.insert("name".into(), attrs.get("name").cloned().unwrap_or(Value::Null));
        if let Some(expires) = attrs.get("expires_at") {
            input.insert("expiresAt".into(), expires.clone());
        }
        for secret in &submission.secrets {
            if secret.slot_id == SlotId::new("api_key") {
                input.insert("apiKey".into(), json!(secret.plaintext.expose()));
            }
        }
        Value::Object(input)
    }
}

#[async_trait]
impl RemoteStore for AccountStore {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn create(&self, submission: Submission) -> Result<RemoteObservation> {
        let input = Self::build_input(&submission);
        let data: UpsertAccountData = self
            .client
            .execute("UpsertAccount", UPSERT_ACCOUNT, json!({"input": input}))
            .await?;
        Ok(data.account.into_observation())
    }

    async fn update(&self, _id: &str, submission: Submission) -> Result<RemoteObservation> {
        self.create(submission).await
    }

    async fn read(
        &self,
        id: &str,
        _prior: Option<&ResourceState>,
    ) -> Result<Option<RemoteObservation>> {
        // Import hands the user-facing `provider:key` pair through here;
        // refresh uses the server-assigned id, which never contains a colon.
        if id.contains(':') {
            let (provider, key) = parse_import_id(id)?;
            let data: GetAccountByKeyData = self
                .client
                .execute(
                    "GetAccountByKey",
                    GET_ACCOUNT_BY_KEY,
                    json!({"provider": provider, "key": key}),
                )
                .await?;
            return Ok(data.account.map(AccountPayload::into_observation));
        }

        let data: GetAccountData =
            self.client.execute("GetAccount", GET_ACCOUNT, json!({"id": id})).await?;
        Ok(data.account.map(AccountPayload::into_observation))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _: DeleteAccountData =
            self.client.execute("DeleteAccount", DELETE_ACCOUNT, json!({"id": id})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::plan;
    use crate::secrets::PlanAction;
    use crate::state::SlotRecord;
    use chrono::TimeZone;

    fn account() -> CloudAccount {
        CloudAccount {
            provider: "aws".into(),
            key: "123456789012".into(),
            name: "prod".into(),
            api_key: Some(SecretString::new("AKIA-secret-material")),
            api_key_version: Some("1".into()),
            expires_at: None,
        }
    }

    #[test]
    fn import_id_splits_on_the_first_colon() {
        assert_eq!(parse_import_id("aws:123456789012").unwrap(), ("aws", "123456789012"));
        // Azure subscription ids may themselves contain colons downstream;
        // only the first one delimits the provider.
        assert_eq!(parse_import_id("azure:sub:extra").unwrap(), ("azure", "sub:extra"));
    }

    #[test]
    fn malformed_import_ids_are_rejected() {
        for id in ["aws", "aws:", ":123", ""] {
            let err = parse_import_id(id).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidImportId { .. }), "id {id:?}");
        }
    }

    #[test]
    fn provider_or_key_change_forces_replacement() {
        let prior = account().into_parent_config();
        let mut moved = prior.attributes.clone();
        moved.insert("key".into(), json!("210987654321"));
        assert_eq!(POLICY.decide(Some(&prior.attributes), &moved, &[]), PlanAction::Replace);
    }

    #[test]
    fn adding_an_expiry_plans_a_replacement() {
        let prior_config = account().into_parent_config();
        let prior = ResourceState {
            id: "acct-1".into(),
            kind: KIND.into(),
            attributes: prior_config.attributes,
            slots: vec![SlotRecord {
                slot_id: SlotId::new("api_key"),
                version: Some(VersionTag::new("1")),
                handle: Some(OpaqueHandle::new("enc:key")),
            }],
        };

        let mut with_expiry = account();
        with_expiry.expires_at = Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        let resource_plan = plan(Some(&prior), &with_expiry.into_parent_config());

        assert_eq!(resource_plan.action, PlanAction::Replace);
    }

    #[test]
    fn build_input_formats_expiry_as_rfc3339() {
        let mut config = account();
        config.expires_at = Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        let submission =
            Submission { attributes: config.into_parent_config().attributes, secrets: vec![] };
        let input = AccountStore::build_input(&submission);
        assert_eq!(input.get("expiresAt"), Some(&json!("2027-01-01T00:00:00Z")));
        assert!(input.get("apiKey").is_none());
    }
}
