//! # Configuration Management
//!
//! Provider configuration: where the Stacklet API lives and how to
//! authenticate to it. Values come from environment variables first, with a
//! JSON credential file as fallback:
//!
//! - `STACKLET_ENDPOINT`: GraphQL endpoint URL
//! - `STACKLET_API_KEY`: bearer token for the API
//! - `STACKLET_CREDENTIALS_FILE`: path to a JSON file with `endpoint` and
//!   `api_key` fields, consulted for whichever value the environment omits

use serde::Deserialize;
use url::Url;

use crate::errors::{ProviderError, Result};
use crate::secrets::SecretString;

const ENDPOINT_VAR: &str = "STACKLET_ENDPOINT";
const API_KEY_VAR: &str = "STACKLET_API_KEY";
const CREDENTIALS_FILE_VAR: &str = "STACKLET_CREDENTIALS_FILE";

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// GraphQL endpoint of the Stacklet deployment.
    pub endpoint: Url,
    /// API key, held redacted and zeroed on drop.
    pub api_key: SecretString,
}

/// On-disk credential document.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    endpoint: Option<String>,
    api_key: Option<SecretString>,
}

impl ProviderConfig {
    /// Build a configuration from explicit values.
    pub fn new(endpoint: &str, api_key: impl Into<SecretString>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProviderError::config(format!("invalid endpoint URL: {}", e)))?;
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::config("API key must not be empty"));
        }
        Ok(Self { endpoint, api_key })
    }

    /// Discover configuration from the environment, falling back to the
    /// credential file for missing values.
    pub fn from_env() -> Result<Self> {
        let mut endpoint = std::env::var(ENDPOINT_VAR).ok();
        let mut api_key = std::env::var(API_KEY_VAR).ok().map(SecretString::new);

        if endpoint.is_none() || api_key.is_none() {
            if let Ok(path) = std::env::var(CREDENTIALS_FILE_VAR) {
                let file = load_credentials_file(&path)?;
                if endpoint.is_none() {
                    endpoint = file.endpoint;
                }
                if api_key.is_none() {
                    api_key = file.api_key;
                }
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            ProviderError::config(format!(
                "no endpoint configured: set {} or provide a credentials file",
                ENDPOINT_VAR
            ))
        })?;
        let api_key = api_key.ok_or_else(|| {
            ProviderError::config(format!(
                "no API key configured: set {} or provide a credentials file",
                API_KEY_VAR
            ))
        })?;

        Self::new(&endpoint, api_key)
    }
}

fn load_credentials_file(path: &str) -> Result<CredentialsFile> {
    let contents = std::fs::read_to_string(path)?;
    let file: CredentialsFile = serde_json::from_str(&contents)?;
    Ok(file)
}
