//! # Error Handling
//!
//! Error taxonomy for the provider core, built on `thiserror`.
//!
//! Everything here is a hard failure of the current operation: no partial
//! state is written, and the prior state is preserved so the next plan can
//! retry. Drift and forced replacement are deliberately *not* errors; they
//! are plan outcomes expressed through
//! [`crate::secrets::replacement::PlanAction`] and refresh projection.

/// Custom result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Main error type for the provider core.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// A slot was introduced or rotated but configuration carries no
    /// plaintext. Actionable by the user on the named attribute path.
    #[error("missing plaintext for '{path}': the version tag changed but no value was supplied")]
    MissingPlaintext { path: String },

    /// Something attempted to read a write-only value from state. This is a
    /// programmer error; the message is surfaced verbatim for bug reporting.
    #[error("write-only attribute '{path}' was read from state; this is a provider bug")]
    BadWriteOnlyRead { path: String },

    /// The remote rejected a submission. Carries the remote's own message;
    /// no state mutation happened.
    #[error("remote rejected the request: {message}")]
    RemoteReject { message: String },

    /// The remote's response omitted a handle for a submitted slot. Failing
    /// the apply beats writing an incomplete state.
    #[error("provider protocol violation: response carried no handle for '{path}'")]
    PartialResponse { path: String },

    /// The requested resource does not exist on the remote.
    #[error("{kind} '{id}' not found on the remote")]
    NotFound { kind: String, id: String },

    /// An import identifier could not be parsed for the resource kind.
    #[error("invalid import identifier '{id}': {reason}")]
    InvalidImportId { id: String, reason: String },

    /// Configuration value failed validation before any remote call.
    #[error("validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Configuration errors (endpoint, credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failures talking to the remote.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors (credential file loading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Create a missing-plaintext error for an attribute path.
    pub fn missing_plaintext(path: impl Into<String>) -> Self {
        Self::MissingPlaintext { path: path.into() }
    }

    /// Create a bad write-only read error for an attribute path.
    pub fn bad_write_only_read(path: impl Into<String>) -> Self {
        Self::BadWriteOnlyRead { path: path.into() }
    }

    /// Create a remote-reject error from the remote's message.
    pub fn remote_reject(message: impl Into<String>) -> Self {
        Self::RemoteReject { message: message.into() }
    }

    /// Create a partial-response error for an attribute path.
    pub fn partial_response(path: impl Into<String>) -> Self {
        Self::PartialResponse { path: path.into() }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { kind: kind.into(), id: id.into() }
    }

    /// Create an invalid import identifier error.
    pub fn invalid_import_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidImportId { id: id.into(), reason: reason.into() }
    }

    /// Create a validation error on a specific field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_build_matching_variants() {
        let err = ProviderError::missing_plaintext("smtp.password_plaintext");
        assert!(matches!(err, ProviderError::MissingPlaintext { .. }));
        assert!(err.to_string().contains("smtp.password_plaintext"));

        let err = ProviderError::remote_reject("api key expired");
        assert_eq!(err.to_string(), "remote rejected the request: api key expired");

        let err = ProviderError::partial_response("webhook[1].url");
        assert!(err.to_string().contains("protocol violation"));
    }

    #[test]
    fn bad_write_only_read_names_the_path() {
        let err = ProviderError::bad_write_only_read("symphony.private_key_plaintext");
        assert!(err.to_string().contains("provider bug"));
        assert!(err.to_string().contains("symphony.private_key_plaintext"));
    }

    #[test]
    fn not_found_display() {
        let err = ProviderError::not_found("account", "aws:123456789012");
        assert_eq!(err.to_string(), "account 'aws:123456789012' not found on the remote");
    }
}
