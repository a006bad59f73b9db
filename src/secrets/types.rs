//! Core value types for the secret lifecycle.
//!
//! Three values travel through the provider for every secret slot:
//!
//! - [`SecretString`]: the write-only plaintext supplied by configuration.
//!   It exists in memory for the duration of one apply, is redacted from all
//!   Debug/Display/serde output, and is zeroed on drop.
//! - [`VersionTag`]: the user-chosen fingerprint. Equality is its only
//!   semantic; the provider never interprets, hashes, or validates it.
//! - [`OpaqueHandle`]: the ciphertext-or-identifier the remote store returns.
//!   Treated as opaque bytes, never parsed or decrypted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A plaintext secret supplied by configuration.
///
/// Debug and Display show `[REDACTED]`, serialization emits `"[REDACTED]"`,
/// and the backing memory is overwritten with zeros on drop. The value can
/// only be reached through [`SecretString::expose`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the plaintext. Callers must not log or persist the result;
    /// the only legitimate consumer is the remote submission body.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Never the actual value. Persisted state and diagnostics both pass
        // through serde, so this is the last line of defense for the
        // plaintext-never-persists invariant.
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Configuration documents carry real plaintext.
        Ok(SecretString(String::deserialize(deserializer)?))
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Serialized form of [`VersionTag::Imported`] in provider-written state.
///
/// User-supplied tags always construct [`VersionTag::Value`], so a user who
/// literally types this string still gets a `Value` that compares unequal to
/// the sentinel. Only state the provider itself wrote round-trips to
/// `Imported`.
const IMPORTED_SENTINEL: &str = "~imported~";

/// User-chosen fingerprint for a secret slot.
///
/// Two tags are either equal (caller asserts the material is unchanged) or
/// unequal (caller asserts a change). Nothing else about the string matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionTag {
    /// A tag supplied by the user in configuration.
    Value(String),
    /// Sentinel written on import. Compares unequal to every user-supplied
    /// tag, so the first apply after an import always rotates.
    Imported,
}

impl VersionTag {
    /// Build a tag from user configuration. Always a [`VersionTag::Value`].
    pub fn new(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Imported => write!(f, "{}", IMPORTED_SENTINEL),
        }
    }
}

impl Serialize for VersionTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Value(v) => serializer.serialize_str(v),
            Self::Imported => serializer.serialize_str(IMPORTED_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for VersionTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Deserialization only ever reads provider-written state, where the
        // sentinel spelling is reserved.
        let value = String::deserialize(deserializer)?;
        if value == IMPORTED_SENTINEL {
            Ok(Self::Imported)
        } else {
            Ok(Self::Value(value))
        }
    }
}

/// The ciphertext-or-identifier the remote store hands back for a stored
/// secret. Opaque: stored, compared for equality, echoed to the user
/// read-only, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueHandle(String);

impl OpaqueHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OpaqueHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Stable semantic path of a secret slot within its parent resource, e.g.
/// `smtp.password` or `webhook[0].url`. For list-of-slots parents the index
/// is part of the identity (positional keying on plan).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path for element `index` of a list-of-slots attribute, e.g.
    /// `indexed("webhook", 0, "url")` → `webhook[0].url`.
    pub fn indexed(list: &str, index: usize, leaf: &str) -> Self {
        Self(format!("{}[{}].{}", list, index, leaf))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_redacts_debug_and_display() {
        let secret = SecretString::new("hunter2-hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn secret_string_serializes_redacted() {
        #[derive(Serialize)]
        struct Wrapper {
            password: SecretString,
        }

        let json = serde_json::to_string(&Wrapper { password: SecretString::new("s3cr3t-value") })
            .unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("s3cr3t-value"));
    }

    #[test]
    fn secret_string_deserializes_plaintext() {
        let secret: SecretString = serde_json::from_str("\"from-config\"").unwrap();
        assert_eq!(secret.expose(), "from-config");
    }

    #[test]
    fn version_tag_equality_is_the_only_semantic() {
        assert_eq!(VersionTag::new("1"), VersionTag::new("1"));
        assert_ne!(VersionTag::new("1"), VersionTag::new("2"));
        // Not interpreted: "1" and "01" are different tags.
        assert_ne!(VersionTag::new("1"), VersionTag::new("01"));
    }

    #[test]
    fn imported_sentinel_never_equals_a_user_tag() {
        let user = VersionTag::new(IMPORTED_SENTINEL);
        assert_ne!(user, VersionTag::Imported);
        assert_ne!(VersionTag::new("1"), VersionTag::Imported);
    }

    #[test]
    fn version_tag_state_round_trip() {
        let json = serde_json::to_string(&VersionTag::Imported).unwrap();
        let back: VersionTag = serde_json::from_str(&json).unwrap();
        assert!(back.is_imported());

        let json = serde_json::to_string(&VersionTag::new("v7")).unwrap();
        let back: VersionTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VersionTag::new("v7"));
    }

    #[test]
    fn slot_id_indexed_paths() {
        assert_eq!(SlotId::indexed("webhook", 2, "url").as_str(), "webhook[2].url");
        assert_eq!(SlotId::new("smtp.password").to_string(), "smtp.password");
    }
}
