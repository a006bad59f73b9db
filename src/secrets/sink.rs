//! Write-once input sink: the only path by which plaintext reaches a remote
//! submission.
//!
//! Plaintext is consumed from the current configuration view, never from
//! state. State never holds it, so an attempt to read it from there is a
//! provider bug and fails loudly with `BadWriteOnlyRead`. The value lives in
//! memory for the duration of one apply and is zeroed when the
//! [`SecretString`] drops.

use crate::errors::{ProviderError, Result};

use super::fingerprint::SlotTransition;
use super::types::{SecretString, SlotId, VersionTag};

/// Where a write-once value was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The live configuration presented for this operation.
    Configuration,
    /// The persisted state snapshot. Plaintext can never legitimately come
    /// from here.
    State,
}

/// One secret slot as declared in the current configuration: its path, the
/// user's version tag, and the write-once plaintext input.
#[derive(Debug)]
pub struct SlotDeclaration {
    pub slot_id: SlotId,
    pub version: Option<VersionTag>,
    pub input: WriteOnceInput,
}

impl SlotDeclaration {
    /// Declare a slot from configuration values. `attribute_path` names the
    /// `<slot>_plaintext` attribute for diagnostics.
    pub fn new(
        slot_id: SlotId,
        version: Option<VersionTag>,
        plaintext: Option<SecretString>,
        attribute_path: impl Into<String>,
    ) -> Self {
        let path = attribute_path.into();
        Self { slot_id, version, input: WriteOnceInput::from_config(path, plaintext) }
    }
}

/// Holder for one write-once plaintext value.
///
/// Consumed at most once, by [`WriteOnceInput::take`], and only for
/// transitions that actually submit secret material.
#[derive(Debug)]
pub struct WriteOnceInput {
    path: String,
    source: ValueSource,
    plaintext: Option<SecretString>,
}

impl WriteOnceInput {
    /// A value read from the live configuration.
    pub fn from_config(path: impl Into<String>, plaintext: Option<SecretString>) -> Self {
        Self { path: path.into(), source: ValueSource::Configuration, plaintext }
    }

    /// A view of the attribute as it appears in state. Carries no value by
    /// construction; taking plaintext from it is a provider bug.
    pub fn from_state(path: impl Into<String>) -> Self {
        Self { path: path.into(), source: ValueSource::State, plaintext: None }
    }

    /// The `<slot>_plaintext` attribute path, for diagnostics.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Consume the plaintext for the given transition.
    ///
    /// Returns `None` for transitions that do not submit secret material.
    /// Fails with `MissingPlaintext` when an introduce or rotate has no
    /// value, and with `BadWriteOnlyRead` when the value was requested from
    /// a state view.
    pub fn take(mut self, transition: SlotTransition) -> Result<Option<SecretString>> {
        if !transition.submits_plaintext() {
            // Stable, retire and no-op never touch the plaintext, even when
            // configuration happens to carry one.
            return Ok(None);
        }

        match self.source {
            ValueSource::State => Err(ProviderError::bad_write_only_read(&self.path)),
            ValueSource::Configuration => match self.plaintext.take() {
                Some(value) => Ok(Some(value)),
                None => Err(ProviderError::missing_plaintext(&self.path)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introduce_consumes_the_configured_value() {
        let input = WriteOnceInput::from_config(
            "smtp.password_plaintext",
            Some(SecretString::new("s3cr3t")),
        );
        let taken = input.take(SlotTransition::Introduce).unwrap();
        assert_eq!(taken.unwrap().expose(), "s3cr3t");
    }

    #[test]
    fn stable_never_reads_the_plaintext() {
        // Even with a (changed) plaintext present, a stable slot must not
        // consume it: same tag means no resubmission.
        let input = WriteOnceInput::from_config(
            "smtp.password_plaintext",
            Some(SecretString::new("different-now")),
        );
        assert!(input.take(SlotTransition::Stable).unwrap().is_none());
    }

    #[test]
    fn rotate_without_plaintext_is_missing_plaintext() {
        let input = WriteOnceInput::from_config("jira.api_key_plaintext", None);
        let err = input.take(SlotTransition::Rotate).unwrap_err();
        assert!(matches!(err, ProviderError::MissingPlaintext { .. }));
        assert!(err.to_string().contains("jira.api_key_plaintext"));
    }

    #[test]
    fn reading_from_state_is_a_provider_bug() {
        let input = WriteOnceInput::from_state("smtp.password_plaintext");
        let err = input.take(SlotTransition::Rotate).unwrap_err();
        assert!(matches!(err, ProviderError::BadWriteOnlyRead { .. }));
    }

    #[test]
    fn retire_ignores_state_source() {
        // Retire does not submit, so a state-sourced view is fine to hold.
        let input = WriteOnceInput::from_state("smtp.password_plaintext");
        assert!(input.take(SlotTransition::Retire).unwrap().is_none());
    }

    #[test]
    fn slot_declaration_wires_the_attribute_path() {
        let decl = SlotDeclaration::new(
            SlotId::new("smtp.password"),
            Some(VersionTag::new("1")),
            None,
            "smtp.password_plaintext",
        );
        assert_eq!(decl.input.path(), "smtp.password_plaintext");
        let err = decl.input.take(SlotTransition::Introduce).unwrap_err();
        assert!(err.to_string().contains("smtp.password_plaintext"));
    }
}
