//! Staging key derivation.

use std::fmt;

/// Bytes of randomness in a generated staging suffix.
pub const RANDOM_SUFFIX_BYTES: usize = 15;

/// Private key that accumulates a session's data before promotion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StagingKey(String);

impl StagingKey {
    /// `public_key` followed by a caller-chosen suffix.
    ///
    /// Deterministic: two sessions using the same suffix against the same
    /// public key share a staging key.
    pub fn with_suffix(public_key: &str, suffix: &str) -> Self {
        Self(format!("{public_key}{suffix}"))
    }

    /// `public_key` followed by `.` and hex-encoded fresh random bytes.
    pub fn random(public_key: &str) -> Self {
        let mut bytes = [0u8; RANDOM_SUFFIX_BYTES];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(format!("{public_key}.{}", hex::encode(bytes)))
    }

    /// Derive the staging key for a session.
    pub fn derive(public_key: &str, suffix: Option<&str>) -> Self {
        match suffix {
            Some(suffix) => Self::with_suffix(public_key, suffix),
            None => Self::random(public_key),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StagingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
